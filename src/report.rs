//! Text rendering of view results for the headless commands.
//!
//! The `format_*` functions are pure: data in, String out. [`RenderSink`]
//! is the one place output is written, and its failures are logged
//! rather than returned.

use std::collections::HashSet;
use std::io::{self, Write};

use humansize::{format_size, BINARY};
use serde::Serialize;
use tracing::warn;

use crate::error::ViewError;
use crate::navigation::{NavigationTree, Orientation, RenderTarget};
use crate::pipeline::periods;
use crate::store::Dataset;
use crate::types::{
    ChartKind, ChartSpec, ContentBlock, DataTable, OutputFormat, Selector, ViewId, ViewResult,
    Year,
};

/// One invoked view and what it produced.
pub type Rendered = (ViewId, Result<ViewResult, ViewError>);

// ============================================================================
// SINK
// ============================================================================

/// Destination for rendered views.
pub trait RenderSink {
    fn render(&mut self, view: ViewId, result: &Result<ViewResult, ViewError>) -> io::Result<()>;

    /// Everything one navigation produced. Defaults to each view in turn.
    fn page(&mut self, _path: &[&str], views: &[Rendered]) -> io::Result<()> {
        for (id, result) in views {
            self.render(*id, result)?;
        }
        Ok(())
    }
}

/// Writes formatted views to any `Write`.
pub struct WriterSink<W> {
    writer: W,
    format: OutputFormat,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        WriterSink { writer, format }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RenderSink for WriterSink<W> {
    fn render(&mut self, view: ViewId, result: &Result<ViewResult, ViewError>) -> io::Result<()> {
        let text = format_view(view, result, self.format);
        write_line(&mut self.writer, &text)
    }

    fn page(&mut self, path: &[&str], views: &[Rendered]) -> io::Result<()> {
        let text = format_page(path, views, self.format);
        write_line(&mut self.writer, &text)
    }
}

/// Hand a page to the sink. A failing sink is logged, never returned.
pub fn emit<S: RenderSink + ?Sized>(sink: &mut S, path: &[&str], views: &[Rendered]) {
    if let Err(e) = sink.page(path, views) {
        warn!(path = ?path, views = views.len(), error = %e, "render sink failed");
    }
}

/// Write plain command output, logging a closed or failing writer.
pub fn emit_text<W: Write>(writer: &mut W, text: &str) {
    if let Err(e) = write_line(writer, text) {
        warn!(error = %e, "output writer failed");
    }
}

fn write_line<W: Write>(writer: &mut W, text: &str) -> io::Result<()> {
    writeln!(writer, "{}", text)?;
    writer.flush()
}

// ============================================================================
// VIEWS
// ============================================================================

/// Format one view result.
pub fn format_view(
    view: ViewId,
    result: &Result<ViewResult, ViewError>,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Human => match result {
            Ok(r) => format_view_human(r),
            Err(e) => format!("Error in view {}: {}\n", view, e),
        },
        OutputFormat::Json => to_json(&ViewOutput::new(view, result)),
    }
}

#[derive(Serialize)]
struct ViewOutput<'a> {
    view: ViewId,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a ViewResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> ViewOutput<'a> {
    fn new(view: ViewId, result: &'a Result<ViewResult, ViewError>) -> Self {
        ViewOutput {
            view,
            result: result.as_ref().ok(),
            error: result.as_ref().err().map(ToString::to_string),
        }
    }
}

fn format_view_human(result: &ViewResult) -> String {
    let mut out = String::new();
    match result {
        ViewResult::Chart(panel) => {
            out.push_str(&format_selectors(&panel.selectors));
            for chart in &panel.charts {
                out.push_str(&format_chart(chart));
                out.push('\n');
            }
        }
        ViewResult::StaticContent(blocks) => {
            for block in blocks {
                out.push_str(&format_block(block));
            }
        }
        ViewResult::NoData { selectors, message } => {
            out.push_str(&format_selectors(selectors));
            out.push_str(&format!("No data: {}\n", message));
        }
    }
    out
}

fn format_selectors(selectors: &[Selector]) -> String {
    let mut out = String::new();
    for s in selectors {
        let current = s.selected_label().unwrap_or("(none)");
        out.push_str(&format!(
            "{}: {} ({} options)\n",
            s.key.label(),
            current,
            s.options.len()
        ));
    }
    if !selectors.is_empty() {
        out.push('\n');
    }
    out
}

fn format_block(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Heading { text } => format!("## {}\n\n", text),
        ContentBlock::Paragraph { text } => format!("{}\n\n", text),
        ContentBlock::Link { label, url } => format!("{} <{}>\n\n", label, url),
        ContentBlock::Person {
            name,
            program,
            email,
        } => format!("{}\n  {}\n  correo: {}\n\n", name, program, email),
    }
}

/// Title, aligned table, then kind-specific extras and the caption.
pub fn format_chart(chart: &ChartSpec) -> String {
    let mut out = format!("=== {} ({}) ===\n", chart.title, kind_name(chart.kind));

    let mut table = chart.table.clone();
    if chart.kind == ChartKind::Donut {
        add_share_column(&mut table, chart.options.series.first().map(String::as_str));
    }
    out.push_str(&format_table(&table, chart.options.highlight_first));

    if let Some((lat, lon)) = chart.options.center {
        out.push_str(&format!("center: {:.4}, {:.4}", lat, lon));
        if let Some(zoom) = chart.options.zoom {
            out.push_str(&format!("  zoom {}", zoom));
        }
        out.push('\n');
    }
    if let Some(caption) = &chart.options.caption {
        out.push_str(&format!("{}\n", caption));
    }
    out
}

pub fn kind_name(kind: ChartKind) -> &'static str {
    match kind {
        ChartKind::Donut => "donut",
        ChartKind::Scatter => "scatter",
        ChartKind::Line => "line",
        ChartKind::Bar => "bar",
        ChartKind::ScatterMap => "map",
    }
}

/// Percentage of each row's value in `column` over the column total.
pub fn shares(table: &DataTable, column: Option<&str>) -> Option<Vec<f64>> {
    let idx = table.column(column?)?;
    let values: Vec<f64> = table
        .rows
        .iter()
        .map(|r| r.get(idx).and_then(|c| c.as_f64()).unwrap_or(0.0))
        .collect();
    let total: f64 = values.iter().sum();
    if total == 0.0 {
        return None;
    }
    Some(values.iter().map(|v| v / total * 100.0).collect())
}

fn add_share_column(table: &mut DataTable, column: Option<&str>) {
    if let Some(shares) = shares(table, column) {
        table.columns.push("%".to_string());
        for (row, share) in table.rows.iter_mut().zip(shares) {
            row.push(crate::types::Cell::Text(format!("{:.2}%", share)));
        }
    }
}

fn format_table(table: &DataTable, mark_first: bool) -> String {
    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|r| r.iter().map(ToString::to_string).collect())
        .collect();

    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |values: &[String], marker: &str| -> String {
        let padded: Vec<String> = values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect();
        format!("{}{}\n", marker, padded.join("  ").trim_end())
    };

    let mut out = line(&table.columns, "  ");
    for (i, row) in cells.iter().enumerate() {
        let marker = if mark_first && i == 0 { "* " } else { "  " };
        out.push_str(&line(row, marker));
    }
    out
}

/// Format everything one navigation produced.
pub fn format_page(path: &[&str], views: &[Rendered], format: OutputFormat) -> String {
    match format {
        OutputFormat::Human => {
            let mut out = format!("> {}\n\n", path.join(" > "));
            if views.is_empty() {
                out.push_str("(no view bound to this selection)\n");
            }
            for (id, result) in views {
                out.push_str(&format_view(*id, result, format));
            }
            out
        }
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Page<'a> {
                path: &'a [&'a str],
                views: Vec<ViewOutput<'a>>,
            }
            let page = Page {
                path,
                views: views.iter().map(|(id, r)| ViewOutput::new(*id, r)).collect(),
            };
            to_json(&page)
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"cannot serialize output: {}\"}}", e))
}

// ============================================================================
// DATASET SUMMARY
// ============================================================================

/// Headline numbers about the loaded tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub records: usize,
    pub geo_rows: usize,
    pub periods: Vec<Year>,
    pub departments: usize,
    pub districts: usize,
    /// Records whose ubigeo has no coordinates.
    pub records_without_coordinates: usize,
    pub total_municipal_waste: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_bytes: Option<u64>,
}

impl DatasetSummary {
    pub fn from_dataset(data: &Dataset<'_>) -> Self {
        let located: HashSet<_> = data.geo.iter().map(|g| g.geo_code).collect();
        let departments: HashSet<&str> =
            data.records.iter().map(|r| r.department.as_str()).collect();
        let districts: HashSet<_> = data.records.iter().map(|r| r.ubigeo).collect();

        DatasetSummary {
            records: data.records.len(),
            geo_rows: data.geo.len(),
            periods: periods(data.records),
            departments: departments.len(),
            districts: districts.len(),
            records_without_coordinates: data
                .records
                .iter()
                .filter(|r| !located.contains(&r.ubigeo))
                .count(),
            total_municipal_waste: data.records.iter().map(|r| r.municipal_waste).sum(),
            primary_bytes: None,
            geo_bytes: None,
        }
    }
}

pub fn format_summary(summary: &DatasetSummary, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(summary),
        OutputFormat::Human => {
            let span = match (summary.periods.first(), summary.periods.last()) {
                (Some(first), Some(last)) => format!("{} - {}", first, last),
                _ => "none".to_string(),
            };
            let mut out = String::new();
            out.push_str("=== Summary ===\n");
            out.push_str(&format!("Records:             {}\n", summary.records));
            out.push_str(&format!("Periods:             {}\n", span));
            out.push_str(&format!("Departments:         {}\n", summary.departments));
            out.push_str(&format!("Districts:           {}\n", summary.districts));
            out.push_str(&format!("Geo rows:            {}\n", summary.geo_rows));
            if summary.records_without_coordinates > 0 {
                out.push_str(&format!(
                    "Without coordinates: {}\n",
                    summary.records_without_coordinates
                ));
            }
            out.push_str(&format!(
                "Municipal waste:     {:.2} Ton\n",
                summary.total_municipal_waste
            ));
            if let Some(bytes) = summary.primary_bytes {
                out.push_str(&format!("Primary file:        {}\n", format_size(bytes, BINARY)));
            }
            if let Some(bytes) = summary.geo_bytes {
                out.push_str(&format!("Geo file:            {}\n", format_size(bytes, BINARY)));
            }
            out
        }
    }
}

// ============================================================================
// MENU TREE
// ============================================================================

/// Indented outline of a validated menu.
pub fn format_tree(tree: &NavigationTree) -> String {
    let mut out = String::new();
    write_level(tree, 0, &mut out);
    out
}

fn write_level(tree: &NavigationTree, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let target = match tree.render_target {
        RenderTarget::Sidebar => "sidebar",
        RenderTarget::Main => "main",
    };
    let orientation = match tree.orientation {
        Orientation::Horizontal => "horizontal",
        Orientation::Vertical => "vertical",
    };
    out.push_str(&format!(
        "{}[{}, {}, default {}]{}\n",
        indent,
        target,
        orientation,
        tree.default_index,
        tree.title
            .as_ref()
            .map(|t| format!(" {}", t))
            .unwrap_or_default()
    ));
    for item in &tree.items {
        let view = item
            .bound_view
            .map(|v| format!(" -> {}", v))
            .unwrap_or_default();
        out.push_str(&format!("{}- {} ({}){}\n", indent, item.label, item.icon_id, view));
        if let Some(children) = &item.children {
            write_level(children, depth + 1, out);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CascadeStage, InvalidSelectionError};
    use crate::types::{
        Cell, ChartOptions, ChartPanel, GeoCode, GeoLocation, Record, SelectorKey, Table,
    };

    fn donut() -> ViewResult {
        let mut table = DataTable::new(&["PERIODO", "QRESIDUOS_MUN"]);
        table.push(vec![Cell::Int(2014), Cell::Float(100.0)]);
        table.push(vec![Cell::Int(2015), Cell::Float(300.0)]);
        ViewResult::Chart(ChartPanel {
            selectors: vec![],
            charts: vec![ChartSpec {
                kind: ChartKind::Donut,
                title: "Residuos".into(),
                table,
                options: ChartOptions {
                    x: "PERIODO".into(),
                    series: vec!["QRESIDUOS_MUN".into()],
                    caption: Some("Gráfica 1".into()),
                    highlight_first: true,
                    ..ChartOptions::default()
                },
            }],
        })
    }

    /// Sink that always fails.
    struct BrokenSink;

    impl RenderSink for BrokenSink {
        fn render(&mut self, _: ViewId, _: &Result<ViewResult, ViewError>) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn human_chart_has_title_rows_shares_and_caption() {
        let out = format_view(ViewId::PeriodDonut, &Ok(donut()), OutputFormat::Human);
        assert!(out.contains("=== Residuos (donut) ==="));
        assert!(out.contains("* 2014"));
        assert!(out.contains("25.00%"));
        assert!(out.contains("75.00%"));
        assert!(out.contains("Gráfica 1"));
    }

    #[test]
    fn human_no_data_shows_message_and_selectors() {
        let result = Ok(ViewResult::NoData {
            selectors: vec![Selector::new(
                SelectorKey::Department,
                vec!["LIMA".into()],
                Some("LIMA"),
            )],
            message: "No data found for department 'LIMA'".into(),
        });
        let out = format_view(ViewId::DistrictDrilldown, &result, OutputFormat::Human);
        assert!(out.contains("Departamento: LIMA (1 options)"));
        assert!(out.contains("No data: No data found for department 'LIMA'"));
    }

    #[test]
    fn errors_are_shown_in_place_of_the_view() {
        let result = Err(ViewError::InvalidSelection(InvalidSelectionError {
            stage: CascadeStage::Province,
            value: "CUSCO".into(),
            parent: "department 'LIMA'".into(),
        }));
        let out = format_view(ViewId::DistrictDrilldown, &result, OutputFormat::Human);
        assert!(out.starts_with("Error in view district-drilldown: province 'CUSCO'"));

        let json = format_view(ViewId::DistrictDrilldown, &result, OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["view"], "district-drilldown");
        assert!(parsed["error"].as_str().unwrap().contains("CUSCO"));
        assert!(parsed.get("result").is_none());
    }

    #[test]
    fn json_view_is_tagged_by_kind() {
        let json = format_view(ViewId::PeriodDonut, &Ok(donut()), OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["result"]["kind"], "chart");
        assert_eq!(parsed["result"]["body"]["charts"][0]["kind"], "donut");
        assert_eq!(parsed["result"]["body"]["charts"][0]["table"]["rows"][0][0], 2014);
    }

    #[test]
    fn static_content_renders_people() {
        let result = Ok(ViewResult::StaticContent(vec![
            ContentBlock::Heading { text: "Equipo".into() },
            ContentBlock::Person {
                name: "Ana".into(),
                program: "Ingeniería".into(),
                email: "ana@example.org".into(),
            },
        ]));
        let out = format_view(ViewId::Team, &result, OutputFormat::Human);
        assert!(out.contains("## Equipo"));
        assert!(out.contains("correo: ana@example.org"));
    }

    /// Writer whose every write fails, like stdout after the reader exits.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn writer_sink_writes_the_whole_page() {
        let views: Vec<Rendered> = vec![(ViewId::PeriodDonut, Ok(donut()))];

        let mut sink = WriterSink::new(Vec::new(), OutputFormat::Human);
        emit(&mut sink, &["Inicio", "Gráfico 1"], &views);
        let written = String::from_utf8(sink.into_inner()).unwrap();
        assert!(written.starts_with("> Inicio > Gráfico 1"));
        assert!(written.contains("Residuos"));

        let mut sink = WriterSink::new(Vec::new(), OutputFormat::Json);
        emit(&mut sink, &["Inicio"], &views);
        let parsed: serde_json::Value = serde_json::from_slice(&sink.into_inner()).unwrap();
        assert_eq!(parsed["path"][0], "Inicio");
        assert_eq!(parsed["views"][0]["view"], "period-donut");
    }

    #[test]
    fn failing_sinks_are_tolerated() {
        let views: Vec<Rendered> = vec![(ViewId::PeriodDonut, Ok(donut()))];
        emit(&mut BrokenSink, &["Inicio"], &views);
        emit(&mut WriterSink::new(ClosedPipe, OutputFormat::Human), &["Inicio"], &views);
        emit_text(&mut ClosedPipe, "summary");
    }

    #[test]
    fn default_page_renders_each_view() {
        struct Recording(Vec<ViewId>);
        impl RenderSink for Recording {
            fn render(
                &mut self,
                view: ViewId,
                _: &Result<ViewResult, ViewError>,
            ) -> io::Result<()> {
                self.0.push(view);
                Ok(())
            }
        }
        let views: Vec<Rendered> = vec![
            (ViewId::DistrictDrilldown, Ok(donut())),
            (ViewId::About, Ok(ViewResult::StaticContent(vec![]))),
        ];
        let mut sink = Recording(Vec::new());
        emit(&mut sink, &["Acerca"], &views);
        assert_eq!(sink.0, [ViewId::DistrictDrilldown, ViewId::About]);
    }

    #[test]
    fn page_lists_path_and_handles_unbound_selection() {
        let out = format_page(&["Acerca", "Definición"], &[], OutputFormat::Human);
        assert!(out.starts_with("> Acerca > Definición"));
        assert!(out.contains("no view bound"));

        let views = [(ViewId::PeriodDonut, Ok(donut()))];
        let json = format_page(&["Inicio"], &views, OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["path"][0], "Inicio");
        assert_eq!(parsed["views"][0]["view"], "period-donut");
    }

    #[test]
    fn summary_counts_and_sizes() {
        let record = |ubigeo, period, dep: &str, mun| Record {
            ubigeo: GeoCode(ubigeo),
            period: Year(period),
            department: dep.into(),
            province: dep.into(),
            district: dep.into(),
            domestic_waste: 0.0,
            non_domestic_waste: 0.0,
            municipal_waste: mun,
            per_capita_domestic: 0.0,
        };
        let records = Table::new(vec![
            record(150101, 2014, "LIMA", 10.0),
            record(150101, 2021, "LIMA", 20.0),
            record(10101, 2014, "AMAZONAS", 5.0),
        ]);
        let geo = Table::new(vec![GeoLocation {
            geo_code: GeoCode(150101),
            latitude: -12.0,
            longitude: -77.0,
        }]);
        let mut summary = DatasetSummary::from_dataset(&Dataset {
            records: &records,
            geo: &geo,
        });
        assert_eq!(summary.departments, 2);
        assert_eq!(summary.districts, 2);
        assert_eq!(summary.records_without_coordinates, 1);
        assert_eq!(summary.total_municipal_waste, 35.0);

        summary.primary_bytes = Some(5 * 1024 * 1024);
        let out = format_summary(&summary, OutputFormat::Human);
        assert!(out.contains("Periods:             2014 - 2021"));
        assert!(out.contains("Without coordinates: 1"));
        assert!(out.contains("5 MiB"));
    }

    #[test]
    fn tree_outline_shows_bindings() {
        let tree = NavigationTree::builtin().unwrap();
        let out = format_tree(&tree);
        assert!(out.starts_with("[sidebar, vertical, default 0] Menu principal"));
        assert!(out.contains("  - Gráfico 4 (bar-chart-line-fill) -> district-drilldown"));
        assert!(out.contains("- Acerca (info-square) -> about"));
    }
}
