//! Domain types for waste-report.
//!
//! Source rows, derived view payloads, and configuration. Everything here
//! is plain data: loading lives in `store`, computation in `pipeline`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// PRIMITIVES
// ============================================================================

/// INEI geographic code (ubigeo) for a district.
///
/// Stored numerically: "010101" and "10101" name the same district.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeoCode(pub u32);

/// Reporting year of a record (the `PERIODO` column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Year(pub i32);

impl fmt::Display for GeoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SOURCE ROWS
// ============================================================================

/// One row of the primary waste table.
///
/// `municipal_waste` is expected to equal domestic + non-domestic but this
/// is not checked; aggregates always sum the column as given.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub ubigeo: GeoCode,
    pub period: Year,
    pub department: String,
    pub province: String,
    pub district: String,
    /// Tonnes/year of household waste (`QRESIDUOS_DOM`).
    pub domestic_waste: f64,
    /// Tonnes/year of non-household waste (`QRESIDUOS_NO_DOM`).
    pub non_domestic_waste: f64,
    /// Tonnes/year of municipal waste (`QRESIDUOS_MUN`).
    pub municipal_waste: f64,
    /// Household waste per capita, kg/person/day (`GPC_DOM`).
    pub per_capita_domestic: f64,
}

/// One row of the geo lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoLocation {
    pub geo_code: GeoCode,
    pub latitude: f64,
    pub longitude: f64,
}

/// An immutable, ordered collection of rows.
///
/// Callers only ever get shared references; there is no mutating API.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<T> {
    rows: Vec<T>,
}

impl<T> Table<T> {
    pub fn new(rows: Vec<T>) -> Self {
        Table { rows }
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<'a, T> IntoIterator for &'a Table<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

// ============================================================================
// VIEW IDENTIFIERS
// ============================================================================

/// Every view the registry knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewId {
    PeriodDonut,
    DepartmentScatter,
    PeriodDepartmentLine,
    DistrictDrilldown,
    About,
    Team,
}

impl ViewId {
    pub const ALL: [ViewId; 6] = [
        ViewId::PeriodDonut,
        ViewId::DepartmentScatter,
        ViewId::PeriodDepartmentLine,
        ViewId::DistrictDrilldown,
        ViewId::About,
        ViewId::Team,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ViewId::PeriodDonut => "period-donut",
            ViewId::DepartmentScatter => "department-scatter",
            ViewId::PeriodDepartmentLine => "period-department-line",
            ViewId::DistrictDrilldown => "district-drilldown",
            ViewId::About => "about",
            ViewId::Team => "team",
        }
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("unknown view id '{}'", s))
    }
}

// ============================================================================
// VIEW PAYLOADS
// ============================================================================

/// Chart kinds understood by the rendering sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Donut,
    Scatter,
    Line,
    Bar,
    ScatterMap,
}

/// A single table cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Int(n) => write!(f, "{}", n),
            Cell::Float(x) => write!(f, "{:.2}", x),
        }
    }
}

impl Cell {
    /// Numeric value of the cell, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Text(_) => None,
            Cell::Int(n) => Some(*n as f64),
            Cell::Float(x) => Some(*x),
        }
    }
}

/// Column-named tabular payload handed to the sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl DataTable {
    pub fn new(columns: &[&str]) -> Self {
        DataTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    /// Index of a column by name.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Presentation hints for a chart. The sink is free to ignore any of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartOptions {
    /// Column plotted on the x axis (or used as slice label).
    pub x: String,
    /// Value columns, one series each.
    pub series: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Pull the first slice/point out for emphasis.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub highlight_first: bool,
    /// Map center as (latitude, longitude).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<(f64, f64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom: Option<u8>,
}

/// Table + chart kind + options: everything the sink needs to draw one chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub table: DataTable,
    pub options: ChartOptions,
}

/// Which transient input an in-view selector drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKey {
    Period,
    Department,
    Province,
    District,
}

impl SelectorKey {
    /// Label shown next to the dropdown.
    pub fn label(self) -> &'static str {
        match self {
            SelectorKey::Period => "Periodo",
            SelectorKey::Department => "Departamento",
            SelectorKey::Province => "Provincia",
            SelectorKey::District => "Distrito",
        }
    }
}

/// An in-view dropdown and its legal options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selector {
    pub key: SelectorKey,
    pub options: Vec<String>,
    /// Index into `options`; None when the domain is empty or the current
    /// value is not one of them.
    pub selected: Option<usize>,
}

impl Selector {
    /// Build a selector, marking `current` if it is among `options`.
    pub fn new(key: SelectorKey, options: Vec<String>, current: Option<&str>) -> Self {
        let selected = current.and_then(|c| options.iter().position(|o| o == c));
        Selector { key, options, selected }
    }

    pub fn selected_label(&self) -> Option<&str> {
        self.selected
            .and_then(|i| self.options.get(i))
            .map(String::as_str)
    }
}

/// Selectors followed by the charts they drive.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartPanel {
    pub selectors: Vec<Selector>,
    pub charts: Vec<ChartSpec>,
}

/// A block of static page content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Heading { text: String },
    Paragraph { text: String },
    Link { label: String, url: String },
    Person { name: String, program: String, email: String },
}

/// Output of a view function.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum ViewResult {
    Chart(ChartPanel),
    StaticContent(Vec<ContentBlock>),
    /// Valid query, zero rows. Carries the user-facing explanation.
    NoData {
        selectors: Vec<Selector>,
        message: String,
    },
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Text encoding of the input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// ISO-8859-1, as exported by the ministry's portal.
    #[default]
    Latin1,
    Utf8,
}

/// Output format for headless rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable pretty output.
    #[default]
    Human,
    /// Machine-readable JSON.
    Json,
}

/// Where and how to read the two input tables.
#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Primary waste table.
    pub primary_path: PathBuf,
    /// Ubigeo → coordinates table.
    pub geo_path: PathBuf,
    /// Field delimiter.
    pub delimiter: u8,
    pub encoding: Encoding,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            primary_path: PathBuf::from("residuos_municipales.csv"),
            geo_path: PathBuf::from("TB_UBIGEOS.csv"),
            delimiter: b';',
            encoding: Encoding::Latin1,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
