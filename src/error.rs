//! Error taxonomy.
//!
//! Two families: startup failures (`DataSourceError`, `ConfigurationError`)
//! end the session; selection failures (`InvalidSelectionError`,
//! `UnknownSelectionError`) are recoverable and only abort the view or
//! level they came from. An empty result is never an error.

use std::path::PathBuf;

use thiserror::Error;

/// The input tables could not be loaded.
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid delimited text in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{} has no '{column}' column", .path.display())]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("{}:{line}: column '{column}' has unparseable value '{value}'", .path.display())]
    Malformed {
        path: PathBuf,
        line: u64,
        column: &'static str,
        value: String,
    },

    #[error("{}:{line}: text is not valid UTF-8 (try --encoding latin1)", .path.display())]
    Decode { path: PathBuf, line: u64 },
}

/// Which validated step of the department → province → district cascade.
/// The department itself is never rejected, only narrowed to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStage {
    Province,
    District,
}

impl std::fmt::Display for CascadeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CascadeStage::Province => f.write_str("province"),
            CascadeStage::District => f.write_str("district"),
        }
    }
}

/// A cascade selection that is not in the legal set produced by the
/// previous stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} '{value}' is not available for {parent}")]
pub struct InvalidSelectionError {
    pub stage: CascadeStage,
    pub value: String,
    /// Human description of the parent selection, e.g. "department 'LIMA'".
    pub parent: String,
}

/// A menu selection naming a label the current level does not offer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnknownSelectionError {
    #[error("no option '{label}' under {}", display_path(.path))]
    Label { path: Vec<String>, label: String },

    #[error("menu level {level} is not rendered (active depth is {depth})")]
    Level { level: usize, depth: usize },
}

/// The navigation tree failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("menu configuration error at {}: {reason}", display_path(.path))]
pub struct ConfigurationError {
    /// Labels from the root to the offending level.
    pub path: Vec<String>,
    pub reason: String,
}

impl ConfigurationError {
    pub fn new(path: &[String], reason: impl Into<String>) -> Self {
        ConfigurationError {
            path: path.to_vec(),
            reason: reason.into(),
        }
    }
}

/// A view could not be produced for the current selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error(transparent)]
    InvalidSelection(#[from] InvalidSelectionError),

    #[error("{selector} '{value}' is not one of the offered options")]
    UnknownOption { selector: &'static str, value: String },

    #[error("no view registered for '{0}'")]
    Unregistered(crate::types::ViewId),
}

fn display_path(path: &[String]) -> String {
    if path.is_empty() {
        "the root menu".to_string()
    } else {
        format!("'{}'", path.join(" > "))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_selection_names_stage_and_parent() {
        let err = InvalidSelectionError {
            stage: CascadeStage::Province,
            value: "CUSCO".into(),
            parent: "department 'LIMA'".into(),
        };
        assert_eq!(
            err.to_string(),
            "province 'CUSCO' is not available for department 'LIMA'"
        );
    }

    #[test]
    fn unknown_label_names_menu_path() {
        let err = UnknownSelectionError::Label {
            path: vec!["Inicio".into()],
            label: "Gráfico 9".into(),
        };
        assert_eq!(err.to_string(), "no option 'Gráfico 9' under 'Inicio'");

        let root = UnknownSelectionError::Label {
            path: vec![],
            label: "Salir".into(),
        };
        assert!(root.to_string().contains("the root menu"));
    }

    #[test]
    fn configuration_error_joins_path() {
        let err = ConfigurationError::new(
            &["Inicio".to_string(), "Gráfico 1".to_string()],
            "unknown render target 'footer'",
        );
        assert_eq!(
            err.to_string(),
            "menu configuration error at 'Inicio > Gráfico 1': unknown render target 'footer'"
        );
    }

    #[test]
    fn missing_column_mentions_file() {
        let err = DataSourceError::MissingColumn {
            path: PathBuf::from("TB_UBIGEOS.csv"),
            column: "latitud",
        };
        assert_eq!(err.to_string(), "TB_UBIGEOS.csv has no 'latitud' column");
    }
}
