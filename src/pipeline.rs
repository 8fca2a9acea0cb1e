//! Aggregation pipeline: group, filter and join the loaded tables.
//!
//! Pure functions: rows in, derived rows out. No I/O, no hidden state.
//! Sums are plain f64 accumulation; rounding is the sink's business.
//! Empty input always yields empty output, never an error.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{CascadeStage, InvalidSelectionError};
use crate::types::{GeoCode, GeoLocation, Record, Table, Year};

// ============================================================================
// DOMAINS
// ============================================================================

/// Distinct periods in first-encounter order.
pub fn periods<'a>(rows: impl IntoIterator<Item = &'a Record>) -> Vec<Year> {
    let mut seen = Vec::new();
    for record in rows {
        if !seen.contains(&record.period) {
            seen.push(record.period);
        }
    }
    seen
}

/// Distinct departments in first-encounter order.
pub fn departments<'a>(rows: impl IntoIterator<Item = &'a Record>) -> Vec<String> {
    distinct(rows, |r| &r.department)
}

fn distinct<'a>(
    rows: impl IntoIterator<Item = &'a Record>,
    key: impl Fn(&'a Record) -> &'a String,
) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    let mut seen: HashSet<&'a str> = HashSet::new();
    for record in rows {
        let k = key(record);
        if seen.insert(k.as_str()) {
            order.push(k.clone());
        }
    }
    order
}

// ============================================================================
// GROUPING
// ============================================================================

/// Total municipal waste per period, ascending by period.
pub fn sum_by_period<'a>(rows: impl IntoIterator<Item = &'a Record>) -> Vec<(Year, f64)> {
    let mut totals: BTreeMap<Year, f64> = BTreeMap::new();
    for record in rows {
        *totals.entry(record.period).or_insert(0.0) += record.municipal_waste;
    }
    totals.into_iter().collect()
}

/// Total municipal waste per department across all periods, in order of
/// first appearance.
pub fn sum_by_department<'a>(rows: impl IntoIterator<Item = &'a Record>) -> Vec<(String, f64)> {
    let mut totals: Vec<(String, f64)> = Vec::new();
    let mut slot: HashMap<&'a str, usize> = HashMap::new();
    for record in rows {
        match slot.entry(record.department.as_str()) {
            Entry::Occupied(e) => totals[*e.get()].1 += record.municipal_waste,
            Entry::Vacant(e) => {
                e.insert(totals.len());
                totals.push((record.department.clone(), record.municipal_waste));
            }
        }
    }
    totals
}

/// [`sum_by_department`] restricted to one period. A period with no rows
/// gives an empty result.
pub fn sum_by_department_for_period<'a>(
    rows: impl IntoIterator<Item = &'a Record>,
    period: Year,
) -> Vec<(String, f64)> {
    sum_by_department(rows.into_iter().filter(|r| r.period == period))
}

// ============================================================================
// CASCADING FILTER
// ============================================================================

/// Result of narrowing by department, then province, then district.
///
/// Each legal set is computed from the rows that survived the previous
/// stage, so it only ever offers values that exist under the current
/// parent selection.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredView<'a> {
    pub department: String,
    pub province: Option<String>,
    pub district: Option<String>,
    /// Provinces present within `department`.
    pub provinces: Vec<String>,
    /// Districts present within `province`; None until a province is chosen.
    pub districts: Option<Vec<String>>,
    /// Rows matching every selection made.
    pub rows: Vec<&'a Record>,
}

impl FilteredView<'_> {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of municipal waste over the selected rows.
    pub fn total_municipal_waste(&self) -> f64 {
        self.rows.iter().map(|r| r.municipal_waste).sum()
    }

    /// "department 'X', province 'Y', district 'Z'" for the selections made.
    pub fn describe(&self) -> String {
        let mut parts = vec![format!("department '{}'", self.department)];
        if let Some(p) = &self.province {
            parts.push(format!("province '{}'", p));
        }
        if let Some(d) = &self.district {
            parts.push(format!("district '{}'", d));
        }
        parts.join(", ")
    }
}

/// Narrow `table` through the department → province → district cascade.
///
/// Department is the entry point: a department with no rows is a valid,
/// empty selection. Province and district must come from the legal set
/// the previous stage produced; when that set is empty there is nothing
/// to choose from and the view stays empty.
///
/// # Errors
/// `InvalidSelectionError` when a province or district is not offered by
/// its parent stage, or a district is given without a province.
pub fn cascading_filter<'a>(
    table: &'a Table<Record>,
    department: &str,
    province: Option<&str>,
    district: Option<&str>,
) -> Result<FilteredView<'a>, InvalidSelectionError> {
    // Stage 1: department.
    let rows: Vec<&Record> = table.iter().filter(|r| r.department == department).collect();
    let provinces = distinct(rows.iter().copied(), |r| &r.province);

    let mut view = FilteredView {
        department: department.to_string(),
        province: None,
        district: None,
        provinces,
        districts: None,
        rows,
    };

    let Some(province) = province else {
        if let Some(district) = district {
            return Err(InvalidSelectionError {
                stage: CascadeStage::District,
                value: district.to_string(),
                parent: format!("{} with no province selected", view.describe()),
            });
        }
        return Ok(view);
    };

    // Stage 2: province, drawn from stage 1's legal set.
    check_legal(&view.provinces, province, CascadeStage::Province, &view)?;
    view.rows.retain(|r| r.province == province);
    view.districts = Some(distinct(view.rows.iter().copied(), |r| &r.district));
    view.province = Some(province.to_string());

    let Some(district) = district else {
        return Ok(view);
    };

    // Stage 3: district, drawn from stage 2's legal set.
    let legal = view.districts.as_deref().unwrap_or_default();
    check_legal(legal, district, CascadeStage::District, &view)?;
    view.rows.retain(|r| r.district == district);
    view.district = Some(district.to_string());

    Ok(view)
}

fn check_legal(
    legal: &[String],
    value: &str,
    stage: CascadeStage,
    parent: &FilteredView<'_>,
) -> Result<(), InvalidSelectionError> {
    if legal.is_empty() || legal.iter().any(|v| v == value) {
        Ok(())
    } else {
        Err(InvalidSelectionError {
            stage,
            value: value.to_string(),
            parent: parent.describe(),
        })
    }
}

// ============================================================================
// GEO JOIN
// ============================================================================

/// A filtered row with its coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoJoinedRow<'a> {
    pub record: &'a Record,
    pub location: &'a GeoLocation,
}

/// Inner join of a [`FilteredView`] with the geo table.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoJoinedTable<'a> {
    /// Description of the selection that produced the rows.
    pub selection: String,
    /// Municipal waste total over the whole selection, matched or not.
    pub selection_total: f64,
    pub rows: Vec<GeoJoinedRow<'a>>,
}

impl GeoJoinedTable<'_> {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Mean (latitude, longitude) of the joined rows.
    pub fn center(&self) -> Option<(f64, f64)> {
        if self.rows.is_empty() {
            return None;
        }
        let n = self.rows.len() as f64;
        let lat = self.rows.iter().map(|r| r.location.latitude).sum::<f64>() / n;
        let lon = self.rows.iter().map(|r| r.location.longitude).sum::<f64>() / n;
        Some((lat, lon))
    }
}

/// Join on `ubigeo = geo_code`. Rows without coordinates are dropped
/// silently; if the geo table repeats a code, its first row is used so no
/// record is ever duplicated.
pub fn join_with_geo<'a>(
    view: &FilteredView<'a>,
    geo: &'a Table<GeoLocation>,
) -> GeoJoinedTable<'a> {
    let mut index: HashMap<GeoCode, &'a GeoLocation> = HashMap::with_capacity(geo.len());
    for location in geo {
        index.entry(location.geo_code).or_insert(location);
    }

    let rows = view
        .rows
        .iter()
        .filter_map(|&record| {
            index
                .get(&record.ubigeo)
                .map(|&location| GeoJoinedRow { record, location })
        })
        .collect();

    GeoJoinedTable {
        selection: view.describe(),
        selection_total: view.total_municipal_waste(),
        rows,
    }
}

// ============================================================================
// BREAKDOWN
// ============================================================================

/// (period, domestic, non-domestic) for each selected row, by period.
///
/// At district level there is at most one row per period, so nothing is
/// grouped here.
pub fn waste_type_breakdown(view: &FilteredView<'_>) -> Vec<(Year, f64, f64)> {
    let mut out: Vec<(Year, f64, f64)> = view
        .rows
        .iter()
        .map(|r| (r.period, r.domestic_waste, r.non_domestic_waste))
        .collect();
    out.sort_by_key(|(period, _, _)| *period);
    out
}

// ============================================================================
// TESTS
// ============================================================================
