//! View registry and the dashboard's views.
//!
//! A view turns the loaded dataset plus the user's transient selections
//! into a [`ViewResult`]. Views are plain functions: they never touch
//! shared state and only see selections through [`ViewInput`].

use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use crate::error::ViewError;
use crate::pipeline::{
    cascading_filter, departments, join_with_geo, periods, sum_by_department,
    sum_by_department_for_period, sum_by_period, waste_type_breakdown, FilteredView,
};
use crate::store::Dataset;
use crate::types::{
    Cell, ChartKind, ChartOptions, ChartPanel, ChartSpec, ContentBlock, DataTable, Selector,
    SelectorKey, ViewId, ViewResult, Year,
};

/// Zoom level used for district maps.
const DISTRICT_ZOOM: u8 = 11;

// ============================================================================
// INPUT
// ============================================================================

/// Transient in-view selections. A missing value selects the first option
/// of that selector's domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewInput {
    pub period: Option<Year>,
    pub department: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
}

impl ViewInput {
    /// Apply one selector change. Changing a cascade stage resets the
    /// stages below it, since their old values may not exist under the
    /// new parent.
    pub fn apply(&mut self, key: SelectorKey, value: &str) -> Result<(), ViewError> {
        match key {
            SelectorKey::Period => {
                let year = value.trim().parse::<i32>().map_err(|_| ViewError::UnknownOption {
                    selector: "period",
                    value: value.to_string(),
                })?;
                self.period = Some(Year(year));
            }
            SelectorKey::Department => {
                self.department = Some(value.to_string());
                self.province = None;
                self.district = None;
            }
            SelectorKey::Province => {
                self.province = Some(value.to_string());
                self.district = None;
            }
            SelectorKey::District => {
                self.district = Some(value.to_string());
            }
        }
        Ok(())
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Signature every view implements.
pub type ViewFn = fn(&Dataset<'_>, &ViewInput) -> Result<ViewResult, ViewError>;

/// Flat mapping from view id to view function.
#[derive(Debug, Clone)]
pub struct ViewRegistry {
    views: HashMap<ViewId, ViewFn>,
}

impl ViewRegistry {
    /// Registry with every built-in view.
    pub fn standard() -> Self {
        let mut views: HashMap<ViewId, ViewFn> = HashMap::new();
        views.insert(ViewId::PeriodDonut, period_donut);
        views.insert(ViewId::DepartmentScatter, department_scatter);
        views.insert(ViewId::PeriodDepartmentLine, period_department_line);
        views.insert(ViewId::DistrictDrilldown, district_drilldown);
        views.insert(ViewId::About, about);
        views.insert(ViewId::Team, team);
        ViewRegistry { views }
    }

    /// Registry with no views, for callers that assemble their own.
    pub fn empty() -> Self {
        ViewRegistry {
            views: HashMap::new(),
        }
    }

    pub fn register(&mut self, id: ViewId, view: ViewFn) {
        self.views.insert(id, view);
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.views.contains_key(&id)
    }

    /// Run one view.
    pub fn invoke(
        &self,
        id: ViewId,
        data: &Dataset<'_>,
        input: &ViewInput,
    ) -> Result<ViewResult, ViewError> {
        let view = self.views.get(&id).ok_or(ViewError::Unregistered(id))?;
        let started = Instant::now();
        let result = view(data, input);
        debug!(
            view = %id,
            ok = result.is_ok(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "view rendered"
        );
        result
    }
}

// ============================================================================
// CHART VIEWS
// ============================================================================

/// Share of municipal waste per year.
pub fn period_donut(data: &Dataset<'_>, _input: &ViewInput) -> Result<ViewResult, ViewError> {
    let sums = sum_by_period(data.records);
    if sums.is_empty() {
        return Ok(no_data(Vec::new(), "the dataset has no records"));
    }

    let mut table = DataTable::new(&["PERIODO", "QRESIDUOS_MUN"]);
    for (period, total) in sums {
        table.push(vec![Cell::Int(period.0 as i64), Cell::Float(total)]);
    }

    Ok(ViewResult::Chart(ChartPanel {
        selectors: Vec::new(),
        charts: vec![ChartSpec {
            kind: ChartKind::Donut,
            title: "Residuos municipales Ton/Año | 2014 - 2021".to_string(),
            table,
            options: ChartOptions {
                x: "PERIODO".to_string(),
                series: vec!["QRESIDUOS_MUN".to_string()],
                caption: Some(
                    "Gráfica 1: Proporción, en porcentaje, de la cantidad de residuos \
                     sólidos municipales por año."
                        .to_string(),
                ),
                highlight_first: true,
                ..ChartOptions::default()
            },
        }],
    }))
}

/// Total municipal waste per department, one point each.
pub fn department_scatter(
    data: &Dataset<'_>,
    _input: &ViewInput,
) -> Result<ViewResult, ViewError> {
    let sums = sum_by_department(data.records);
    if sums.is_empty() {
        return Ok(no_data(Vec::new(), "the dataset has no records"));
    }

    let mut table = DataTable::new(&["DEPARTAMENTO", "Residuos Municipales"]);
    for (department, total) in sums {
        table.push(vec![Cell::Text(department), Cell::Float(total)]);
    }

    Ok(ViewResult::Chart(ChartPanel {
        selectors: Vec::new(),
        charts: vec![ChartSpec {
            kind: ChartKind::Scatter,
            title: "Residuos Municipales Ton/Año por Departamento".to_string(),
            table,
            options: ChartOptions {
                x: "DEPARTAMENTO".to_string(),
                series: vec!["Residuos Municipales".to_string()],
                caption: Some(
                    "Gráfica 2: Residuos municipales por departamento, 2014 - 2021.".to_string(),
                ),
                ..ChartOptions::default()
            },
        }],
    }))
}

/// Municipal waste per department for one chosen period.
pub fn period_department_line(
    data: &Dataset<'_>,
    input: &ViewInput,
) -> Result<ViewResult, ViewError> {
    let domain = periods(data.records);
    let options: Vec<String> = domain.iter().map(Year::to_string).collect();

    let Some(period) = input.period.or_else(|| domain.first().copied()) else {
        return Ok(no_data(Vec::new(), "the dataset has no periods"));
    };

    let current = period.to_string();
    let selectors = vec![Selector::new(SelectorKey::Period, options, Some(&current))];

    let sums = sum_by_department_for_period(data.records, period);
    if sums.is_empty() {
        return Ok(no_data(
            selectors,
            format!("No data found for period {}", period),
        ));
    }

    let mut table = DataTable::new(&["DEPARTAMENTO", "QRESIDUOS_MUN"]);
    for (department, total) in sums {
        table.push(vec![Cell::Text(department), Cell::Float(total)]);
    }

    Ok(ViewResult::Chart(ChartPanel {
        selectors,
        charts: vec![ChartSpec {
            kind: ChartKind::Line,
            title: format!("Residuos por departamento - {}", period),
            table,
            options: ChartOptions {
                x: "DEPARTAMENTO".to_string(),
                series: vec!["QRESIDUOS_MUN".to_string()],
                caption: Some(
                    "Gráfica 3: Cantidad de residuos sólidos municipales por departamento \
                     en el periodo seleccionado."
                        .to_string(),
                ),
                ..ChartOptions::default()
            },
        }],
    }))
}

/// Department → province → district drill-down with a map and a
/// domestic/non-domestic breakdown.
pub fn district_drilldown(
    data: &Dataset<'_>,
    input: &ViewInput,
) -> Result<ViewResult, ViewError> {
    let all_departments = departments(data.records);
    let department = match input
        .department
        .as_deref()
        .or(all_departments.first().map(String::as_str))
    {
        Some(d) => d.to_string(),
        None => return Ok(no_data(Vec::new(), "the dataset has no records")),
    };

    // Walk the cascade one stage at a time so each default comes from the
    // legal set of the stage above it.
    let by_department = cascading_filter(data.records, &department, None, None)?;
    let province = input
        .province
        .clone()
        .or_else(|| by_department.provinces.first().cloned());

    let by_province = match &province {
        Some(p) => cascading_filter(data.records, &department, Some(p.as_str()), None)?,
        None => by_department,
    };
    let district = input.district.clone().or_else(|| {
        by_province
            .districts
            .as_ref()
            .and_then(|ds| ds.first().cloned())
    });

    let view = match &district {
        Some(d) => {
            cascading_filter(data.records, &department, province.as_deref(), Some(d.as_str()))?
        }
        None => by_province,
    };

    let selectors = cascade_selectors(&all_departments, &view);
    let joined = join_with_geo(&view, data.geo);
    if joined.is_empty() {
        return Ok(no_data(
            selectors,
            format!("No data found for {}", joined.selection),
        ));
    }

    let mut map = DataTable::new(&[
        "UBIGEO",
        "DISTRITO",
        "DEPARTAMENTO",
        "PROVINCIA",
        "PERIODO",
        "latitud",
        "longitud",
        "QRESIDUOS_MUN",
        "QRESIDUOS_MUN_SUM",
    ]);
    for row in &joined.rows {
        let r = row.record;
        map.push(vec![
            Cell::Int(r.ubigeo.0 as i64),
            Cell::Text(r.district.clone()),
            Cell::Text(r.department.clone()),
            Cell::Text(r.province.clone()),
            Cell::Int(r.period.0 as i64),
            Cell::Float(row.location.latitude),
            Cell::Float(row.location.longitude),
            Cell::Float(r.municipal_waste),
            Cell::Float(joined.selection_total),
        ]);
    }

    let mut bars = DataTable::new(&["PERIODO", "QRESIDUOS_DOM", "QRESIDUOS_NO_DOM"]);
    for (period, domestic, non_domestic) in waste_type_breakdown(&view) {
        bars.push(vec![
            Cell::Int(period.0 as i64),
            Cell::Float(domestic),
            Cell::Float(non_domestic),
        ]);
    }

    Ok(ViewResult::Chart(ChartPanel {
        selectors,
        charts: vec![
            ChartSpec {
                kind: ChartKind::ScatterMap,
                title: "Total de Residuos por Distrito del 2014 al 2021".to_string(),
                table: map,
                options: ChartOptions {
                    x: "DISTRITO".to_string(),
                    series: vec!["QRESIDUOS_MUN_SUM".to_string()],
                    center: joined.center(),
                    zoom: Some(DISTRICT_ZOOM),
                    ..ChartOptions::default()
                },
            },
            ChartSpec {
                kind: ChartKind::Bar,
                title: "QRESIDUOS_DOM y QRESIDUOS_NO_DOM por PERIODO".to_string(),
                table: bars,
                options: ChartOptions {
                    x: "PERIODO".to_string(),
                    series: vec!["QRESIDUOS_DOM".to_string(), "QRESIDUOS_NO_DOM".to_string()],
                    caption: Some(
                        "Residuos domiciliarios y no domiciliarios del distrito por año."
                            .to_string(),
                    ),
                    ..ChartOptions::default()
                },
            },
        ],
    }))
}

fn cascade_selectors(all_departments: &[String], view: &FilteredView<'_>) -> Vec<Selector> {
    vec![
        Selector::new(
            SelectorKey::Department,
            all_departments.to_vec(),
            Some(&view.department),
        ),
        Selector::new(
            SelectorKey::Province,
            view.provinces.clone(),
            view.province.as_deref(),
        ),
        Selector::new(
            SelectorKey::District,
            view.districts.clone().unwrap_or_default(),
            view.district.as_deref(),
        ),
    ]
}

fn no_data(selectors: Vec<Selector>, message: impl Into<String>) -> ViewResult {
    ViewResult::NoData {
        selectors,
        message: message.into(),
    }
}

// ============================================================================
// STATIC VIEWS
// ============================================================================

pub fn about(_data: &Dataset<'_>, _input: &ViewInput) -> Result<ViewResult, ViewError> {
    let blocks = vec![
        ContentBlock::Link {
            label: "Ir a código del proyecto".to_string(),
            url: "https://github.com/summermp/streamlit".to_string(),
        },
        ContentBlock::Paragraph {
            text: "La base de datos de composición de residuos sólidos domiciliarios \
                   corresponde a la información sobre la distribución de los residuos \
                   sólidos del ámbito domiciliario generados por tipo (medido en tonelada), \
                   obtenida desde 2014 hasta 2021 para todos los departamentos del país."
                .to_string(),
        },
        ContentBlock::Paragraph {
            text: "Las fuentes son el Sistema de Información para la Gestión de los \
                   Residuos Sólidos (SIGERSOL), administrado por el Ministerio del Ambiente \
                   (MINAM), y los estudios de caracterización de residuos sólidos \
                   municipales estandarizados desde 2014 (R.M. N° 457-2018-MINAM)."
                .to_string(),
        },
        ContentBlock::Heading {
            text: "¿Qué buscamos?".to_string(),
        },
        ContentBlock::Paragraph {
            text: "Brindar información sobre la distribución de los residuos sólidos en el \
                   ámbito domiciliario en todos los departamentos del Perú, mediante \
                   gráficas y tablas para un mejor entendimiento."
                .to_string(),
        },
        ContentBlock::Heading {
            text: "¿Qué son los residuos sólidos domiciliarios?".to_string(),
        },
        ContentBlock::Paragraph {
            text: "Son aquellos provenientes del consumo o uso de un bien o servicio, cuya \
                   fuente de generación son las viviendas."
                .to_string(),
        },
    ];
    Ok(ViewResult::StaticContent(blocks))
}

pub fn team(_data: &Dataset<'_>, _input: &ViewInput) -> Result<ViewResult, ViewError> {
    const PROGRAM: &str = "Carrera profesional de Ingeniería Ambiental";
    let members = [
        ("Meyli Flores Huaman", "meyli.flores@upch.pe"),
        ("Iory Huarca Astete", "iory.huarca@upch.pe"),
        ("Maximiliana Ramos Guelac", "maximiliana.ramos@upch.pe"),
        ("Mayerly Orosco Taype", "mayerly.orosco@upch.pe"),
    ];

    let mut blocks = vec![ContentBlock::Paragraph {
        text: "Somos estudiantes de ingeniería ambiental de la Universidad Peruana \
               Cayetano Heredia (UPCH). Nos apasiona el procesamiento y visualización de \
               datos para comprender la problemática ambiental de los residuos sólidos \
               generados en el Perú."
            .to_string(),
    }];
    blocks.extend(members.iter().map(|(name, email)| ContentBlock::Person {
        name: name.to_string(),
        program: PROGRAM.to_string(),
        email: email.to_string(),
    }));
    blocks.push(ContentBlock::Heading {
        text: "¡Conocer nuestra huella de basura es el primer paso para dejar una huella verde!"
            .to_string(),
    });
    Ok(ViewResult::StaticContent(blocks))
}

// ============================================================================
// TESTS
// ============================================================================
