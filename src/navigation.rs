//! The navigation tree.
//!
//! Menus come in two forms. [`MenuConfig`] is the raw, string-typed shape
//! read from JSON (or built in code for the default dashboard).
//! [`NavigationTree`] is the validated form the dispatcher walks; once a
//! tree exists, every render target, orientation and view id in it is
//! known to be valid.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigurationError;
use crate::types::ViewId;

/// Deepest allowed nesting of menus, counting the root as 1.
pub const MAX_DEPTH: usize = 8;

// ============================================================================
// TYPED TREE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Where a menu level is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderTarget {
    Sidebar,
    Main,
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "horizontal" => Ok(Orientation::Horizontal),
            "vertical" => Ok(Orientation::Vertical),
            other => Err(format!(
                "unknown orientation '{}' (expected horizontal or vertical)",
                other
            )),
        }
    }
}

impl FromStr for RenderTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sidebar" => Ok(RenderTarget::Sidebar),
            "main" => Ok(RenderTarget::Main),
            other => Err(format!(
                "unknown render target '{}' (expected sidebar or main)",
                other
            )),
        }
    }
}

/// One menu level: its options and how it is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationTree {
    pub title: Option<String>,
    pub menu_icon: Option<String>,
    /// Non-empty; labels are unique.
    pub items: Vec<NavigationNode>,
    /// Always a valid index into `items`.
    pub default_index: usize,
    pub orientation: Orientation,
    pub render_target: RenderTarget,
}

/// One option of a menu level.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationNode {
    pub label: String,
    pub icon_id: String,
    pub bound_view: Option<ViewId>,
    pub children: Option<NavigationTree>,
}

impl NavigationTree {
    /// Validate a raw menu into a tree.
    pub fn from_config(config: &MenuConfig) -> Result<Self, ConfigurationError> {
        let tree = build(config, &mut Vec::new())?;
        info!(
            depth = tree.depth(),
            views = tree.bound_views().len(),
            "navigation tree validated"
        );
        Ok(tree)
    }

    /// Parse and validate a JSON menu.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let config: MenuConfig = serde_json::from_str(json)
            .map_err(|e| ConfigurationError::new(&[], format!("invalid menu JSON: {}", e)))?;
        Self::from_config(&config)
    }

    /// Read, parse and validate a JSON menu file.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let json = fs::read_to_string(path).map_err(|e| {
            ConfigurationError::new(&[], format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// The dashboard's own menu.
    pub fn builtin() -> Result<Self, ConfigurationError> {
        Self::from_config(&MenuConfig::builtin())
    }

    /// Number of nested levels, counting this one.
    pub fn depth(&self) -> usize {
        1 + self
            .items
            .iter()
            .filter_map(|item| item.children.as_ref())
            .map(NavigationTree::depth)
            .max()
            .unwrap_or(0)
    }

    /// Every view bound anywhere in the tree, in depth-first order.
    pub fn bound_views(&self) -> Vec<ViewId> {
        let mut out = Vec::new();
        for item in &self.items {
            if let Some(children) = &item.children {
                out.extend(children.bound_views());
            }
            if let Some(view) = item.bound_view {
                out.push(view);
            }
        }
        out
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.label.as_str())
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.items.iter().position(|item| item.label == label)
    }
}

fn build(
    config: &MenuConfig,
    path: &mut Vec<String>,
) -> Result<NavigationTree, ConfigurationError> {
    if path.len() >= MAX_DEPTH {
        return Err(ConfigurationError::new(
            path,
            format!("menus are nested deeper than {} levels", MAX_DEPTH),
        ));
    }
    if config.items.is_empty() {
        return Err(ConfigurationError::new(path, "menu has no items"));
    }

    let render_target: RenderTarget = config
        .render_target
        .parse()
        .map_err(|e: String| ConfigurationError::new(path, e))?;
    let orientation: Orientation = config
        .orientation
        .parse()
        .map_err(|e: String| ConfigurationError::new(path, e))?;

    let default_index = usize::try_from(config.default_index)
        .ok()
        .filter(|&i| i < config.items.len())
        .ok_or_else(|| {
            ConfigurationError::new(
                path,
                format!(
                    "default_index {} is out of range for {} items",
                    config.default_index,
                    config.items.len()
                ),
            )
        })?;

    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(config.items.len());
    for item in &config.items {
        if !seen.insert(item.label.as_str()) {
            return Err(ConfigurationError::new(
                path,
                format!("duplicate label '{}'", item.label),
            ));
        }

        path.push(item.label.clone());
        let bound_view = match &item.action {
            Some(id) => Some(
                id.parse::<ViewId>()
                    .map_err(|e| ConfigurationError::new(path, e))?,
            ),
            None => None,
        };
        let children = match &item.submenu {
            Some(sub) => Some(build(sub, path)?),
            None => None,
        };
        path.pop();

        items.push(NavigationNode {
            label: item.label.clone(),
            icon_id: item.icon.clone(),
            bound_view,
            children,
        });
    }

    Ok(NavigationTree {
        title: config.title.clone(),
        menu_icon: config.menu_icon.clone(),
        items,
        default_index,
        orientation,
        render_target,
    })
}

// ============================================================================
// RAW CONFIG
// ============================================================================

/// A menu level as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_icon: Option<String>,
    #[serde(default)]
    pub default_index: i64,
    #[serde(default = "default_orientation")]
    pub orientation: String,
    #[serde(alias = "with_view_panel")]
    pub render_target: String,
    pub items: Vec<ItemConfig>,
}

/// A menu option as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemConfig {
    pub label: String,
    #[serde(default = "default_icon", alias = "item_icon")]
    pub icon: String,
    /// View id bound to this option.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submenu: Option<MenuConfig>,
}

fn default_orientation() -> String {
    "vertical".to_string()
}

fn default_icon() -> String {
    "-".to_string()
}

impl ItemConfig {
    fn leaf(label: &str, icon: &str, action: Option<ViewId>) -> Self {
        ItemConfig {
            label: label.to_string(),
            icon: icon.to_string(),
            action: action.map(|v| v.as_str().to_string()),
            submenu: None,
        }
    }

    fn with_submenu(mut self, submenu: MenuConfig) -> Self {
        self.submenu = Some(submenu);
        self
    }
}

impl MenuConfig {
    fn tabs(items: Vec<ItemConfig>) -> Self {
        MenuConfig {
            title: None,
            menu_icon: None,
            default_index: 0,
            orientation: "horizontal".to_string(),
            render_target: "main".to_string(),
            items,
        }
    }

    /// Sidebar with Inicio (four charts), Acerca and Nosotros.
    pub fn builtin() -> Self {
        let charts = MenuConfig::tabs(vec![
            ItemConfig::leaf("Gráfico 1", "pie-chart-fill", Some(ViewId::PeriodDonut)),
            ItemConfig::leaf("Gráfico 2", "bar-chart-fill", Some(ViewId::DepartmentScatter)),
            ItemConfig::leaf("Gráfico 3", "bar-chart-line", Some(ViewId::PeriodDepartmentLine)),
            ItemConfig::leaf("Gráfico 4", "bar-chart-line-fill", Some(ViewId::DistrictDrilldown)),
        ]);
        let about = MenuConfig::tabs(vec![ItemConfig::leaf("Definición", "-", None)]);
        let team = MenuConfig::tabs(vec![ItemConfig::leaf(
            "¿Quiénes somos?",
            "-",
            Some(ViewId::Team),
        )]);

        MenuConfig {
            title: Some("Menu principal".to_string()),
            menu_icon: Some("clipboard2-check-fill".to_string()),
            default_index: 0,
            orientation: "vertical".to_string(),
            render_target: "sidebar".to_string(),
            items: vec![
                ItemConfig::leaf("Inicio", "house", None).with_submenu(charts),
                ItemConfig::leaf("Acerca", "info-square", Some(ViewId::About)).with_submenu(about),
                ItemConfig::leaf("Nosotros", "people", None).with_submenu(team),
            ],
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_menu(labels: &[&str]) -> MenuConfig {
        MenuConfig::tabs(labels.iter().map(|l| ItemConfig::leaf(l, "-", None)).collect())
    }

    #[test]
    fn builtin_menu_is_valid() {
        let tree = NavigationTree::builtin().unwrap();
        assert_eq!(tree.title.as_deref(), Some("Menu principal"));
        assert_eq!(tree.render_target, RenderTarget::Sidebar);
        assert_eq!(tree.orientation, Orientation::Vertical);
        assert_eq!(tree.labels().collect::<Vec<_>>(), ["Inicio", "Acerca", "Nosotros"]);
        assert_eq!(tree.depth(), 2);

        let inicio = tree.items[0].children.as_ref().unwrap();
        assert_eq!(inicio.render_target, RenderTarget::Main);
        assert_eq!(inicio.orientation, Orientation::Horizontal);
        assert_eq!(inicio.items[3].bound_view, Some(ViewId::DistrictDrilldown));
    }

    #[test]
    fn bound_views_list_children_before_parent() {
        let tree = NavigationTree::builtin().unwrap();
        let views = tree.bound_views();
        assert_eq!(views.len(), 6);
        assert_eq!(views[4], ViewId::About);
        assert_eq!(views[5], ViewId::Team);
    }

    #[test]
    fn parses_json_with_original_key_names() {
        let json = r#"{
            "title": "Menu",
            "with_view_panel": "sidebar",
            "orientation": "vertical",
            "items": [
                {"label": "Gráfico 1", "item_icon": "pie-chart-fill", "action": "period-donut"},
                {"label": "Acerca", "action": "about"}
            ]
        }"#;
        let tree = NavigationTree::from_json(json).unwrap();
        assert_eq!(tree.items[0].icon_id, "pie-chart-fill");
        assert_eq!(tree.items[1].icon_id, "-");
        assert_eq!(tree.items[1].bound_view, Some(ViewId::About));
    }

    #[test]
    fn rejects_unknown_render_target_with_path() {
        let mut config = MenuConfig::builtin();
        config.items[0].submenu.as_mut().unwrap().render_target = "footer".into();
        let err = NavigationTree::from_config(&config).unwrap_err();
        assert_eq!(err.path, vec!["Inicio".to_string()]);
        assert!(err.reason.contains("footer"));
    }

    #[test]
    fn rejects_unknown_orientation() {
        let mut config = leaf_menu(&["a"]);
        config.orientation = "diagonal".into();
        let err = NavigationTree::from_config(&config).unwrap_err();
        assert!(err.reason.contains("diagonal"));
    }

    #[test]
    fn rejects_unknown_view_id() {
        let mut config = leaf_menu(&["a"]);
        config.items[0].action = Some("gráfico-9".into());
        let err = NavigationTree::from_config(&config).unwrap_err();
        assert_eq!(err.path, vec!["a".to_string()]);
        assert!(err.reason.contains("gráfico-9"));
    }

    #[test]
    fn rejects_empty_menu() {
        let err = NavigationTree::from_config(&leaf_menu(&[])).unwrap_err();
        assert_eq!(err.reason, "menu has no items");
    }

    #[test]
    fn rejects_default_index_out_of_range() {
        let mut config = leaf_menu(&["a", "b"]);
        config.default_index = 2;
        assert!(NavigationTree::from_config(&config).is_err());
        config.default_index = -1;
        assert!(NavigationTree::from_config(&config).is_err());
        config.default_index = 1;
        assert_eq!(NavigationTree::from_config(&config).unwrap().default_index, 1);
    }

    #[test]
    fn rejects_duplicate_labels() {
        let err = NavigationTree::from_config(&leaf_menu(&["a", "a"])).unwrap_err();
        assert!(err.reason.contains("duplicate label 'a'"));
    }

    #[test]
    fn rejects_excessive_nesting() {
        let mut config = leaf_menu(&["leaf"]);
        for level in 0..MAX_DEPTH {
            config = MenuConfig::tabs(vec![
                ItemConfig::leaf(&format!("level {}", level), "-", None).with_submenu(config),
            ]);
        }
        let err = NavigationTree::from_config(&config).unwrap_err();
        assert!(err.reason.contains("nested deeper"));
        assert_eq!(err.path.len(), MAX_DEPTH);
    }

    #[test]
    fn accepts_nesting_at_the_bound() {
        let mut config = leaf_menu(&["leaf"]);
        for level in 1..MAX_DEPTH {
            config = MenuConfig::tabs(vec![
                ItemConfig::leaf(&format!("level {}", level), "-", None).with_submenu(config),
            ]);
        }
        assert_eq!(NavigationTree::from_config(&config).unwrap().depth(), MAX_DEPTH);
    }

    #[test]
    fn invalid_json_is_a_configuration_error() {
        let err = NavigationTree::from_json("{ not json").unwrap_err();
        assert!(err.path.is_empty());
        assert!(err.reason.starts_with("invalid menu JSON"));
    }

    #[test]
    fn builtin_config_round_trips_through_json() {
        let json = serde_json::to_string_pretty(&MenuConfig::builtin()).unwrap();
        let tree = NavigationTree::from_json(&json).unwrap();
        assert_eq!(tree, NavigationTree::builtin().unwrap());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("menu.json");
        fs::write(&path, serde_json::to_string(&leaf_menu(&["solo"])).unwrap()).unwrap();
        let tree = NavigationTree::load(&path).unwrap();
        assert_eq!(tree.labels().collect::<Vec<_>>(), ["solo"]);

        let missing = NavigationTree::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(missing.reason.starts_with("cannot read"));
    }
}
