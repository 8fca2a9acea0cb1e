//! TUI state algebra.
//!
//! `App` owns the long-lived pieces (dataset, dispatcher, selection
//! caches) plus a derived [`Page`]: the levels and view results for the
//! current choices. The page is rebuilt from scratch after every
//! selection, so it never drifts from the dispatcher's view of the tree.
//! [`Focus`] is the only per-keystroke state.

use std::collections::HashMap;

use crossterm::event::KeyEvent;

use crate::dispatch::{Dispatcher, SelectionCache};
use crate::error::ViewError;
use crate::navigation::{NavigationTree, Orientation, RenderTarget};
use crate::store::Dataset;
use crate::types::{Selector, SelectorKey, ViewId, ViewResult};
use crate::views::{ViewInput, ViewRegistry};

// ============================================================================
// APP EVENTS
// ============================================================================

/// Everything the event loop can receive from its channel.
#[derive(Debug)]
pub enum AppEvent {
    /// A terminal key event from the crossterm reader thread.
    Key(KeyEvent),
    /// The terminal was resized; redraw.
    Resize,
}

// ============================================================================
// PAGE
// ============================================================================

/// One rendered menu level, copied out of the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuLevel {
    pub title: Option<String>,
    pub menu_icon: Option<String>,
    pub options: Vec<String>,
    pub icons: Vec<String>,
    pub selected: usize,
    pub orientation: Orientation,
    pub target: RenderTarget,
}

/// A view that ran for the current path.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedView {
    pub id: ViewId,
    pub result: Result<ViewResult, ViewError>,
}

impl RenderedView {
    /// In-view selectors, if the result carries any.
    pub fn selectors(&self) -> &[Selector] {
        match &self.result {
            Ok(ViewResult::Chart(panel)) => &panel.selectors,
            Ok(ViewResult::NoData { selectors, .. }) => selectors,
            _ => &[],
        }
    }
}

/// Everything drawn for the current selections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub levels: Vec<MenuLevel>,
    /// In invocation order: deepest bound view first.
    pub views: Vec<RenderedView>,
}

impl Page {
    /// Labels chosen from the root down.
    pub fn path(&self) -> Vec<&str> {
        self.levels
            .iter()
            .filter_map(|l| l.options.get(l.selected).map(String::as_str))
            .collect()
    }

    pub fn selector(&self, view: usize, index: usize) -> Option<&Selector> {
        self.views.get(view)?.selectors().get(index)
    }

    /// Every focus target, menus first, then selectors in view order.
    pub fn focus_slots(&self) -> Vec<Focus> {
        let menus = self.levels.iter().enumerate().map(|(level, l)| Focus::Menu {
            level,
            cursor: l.selected,
        });
        let selectors = self.views.iter().enumerate().flat_map(|(view, v)| {
            v.selectors()
                .iter()
                .enumerate()
                .map(move |(index, s)| Focus::Selector {
                    view,
                    index,
                    cursor: s.selected.unwrap_or(0),
                })
        });
        menus.chain(selectors).collect()
    }
}

// ============================================================================
// FOCUS
// ============================================================================

/// Which control receives movement keys, and where its cursor is.
///
/// The cursor is a preview: nothing changes until Enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Menu { level: usize, cursor: usize },
    Selector { view: usize, index: usize, cursor: usize },
}

impl Focus {
    /// Same control, ignoring the cursor.
    pub fn same_slot(&self, other: &Focus) -> bool {
        match (self, other) {
            (Focus::Menu { level: a, .. }, Focus::Menu { level: b, .. }) => a == b,
            (
                Focus::Selector { view: a, index: i, .. },
                Focus::Selector { view: b, index: j, .. },
            ) => a == b && i == j,
            _ => false,
        }
    }
}

// ============================================================================
// APPLICATION STATE
// ============================================================================

/// Top-level TUI model.
#[derive(Debug)]
pub struct App<'a> {
    pub data: Dataset<'a>,
    pub dispatcher: Dispatcher<'a>,
    pub registry: &'a ViewRegistry,
    /// Last menu choice per level.
    pub selections: SelectionCache,
    /// Last in-view selections per view.
    pub inputs: HashMap<ViewId, ViewInput>,
    pub page: Page,
    pub focus: Focus,
    /// Last recoverable error, cleared by the next successful action.
    pub status: Option<String>,
    pub should_quit: bool,
}

impl<'a> App<'a> {
    /// Start on the default path with focus on the root menu.
    pub fn new(data: Dataset<'a>, tree: &'a NavigationTree, registry: &'a ViewRegistry) -> Self {
        let mut app = App {
            data,
            dispatcher: Dispatcher::new(tree),
            registry,
            selections: SelectionCache::new(),
            inputs: HashMap::new(),
            page: Page::default(),
            focus: Focus::Menu {
                level: 0,
                cursor: tree.default_index,
            },
            status: None,
            should_quit: false,
        };
        app.refresh();
        app
    }

    /// Re-resolve the path and re-run its views.
    pub fn refresh(&mut self) {
        let active = self.dispatcher.resolve(&self.selections);

        let levels = active
            .levels
            .iter()
            .map(|l| MenuLevel {
                title: l.menu.title.clone(),
                menu_icon: l.menu.menu_icon.clone(),
                options: l.options().into_iter().map(str::to_string).collect(),
                icons: l.icons().into_iter().map(str::to_string).collect(),
                selected: l.selected,
                orientation: l.orientation(),
                target: l.render_target(),
            })
            .collect();

        let views = active
            .invocations()
            .into_iter()
            .map(|id| {
                let input = self.inputs.get(&id).cloned().unwrap_or_default();
                RenderedView {
                    id,
                    result: self.registry.invoke(id, &self.data, &input),
                }
            })
            .collect();

        self.page = Page { levels, views };
    }

    /// Record an in-view selection for `view`.
    pub fn set_input(
        &mut self,
        view: ViewId,
        key: SelectorKey,
        value: &str,
    ) -> Result<(), ViewError> {
        self.inputs.entry(view).or_default().apply(key, value)
    }
}

// ============================================================================
// ACTIONS
// ============================================================================

/// Semantic user action, decoupled from raw key events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Previous option in the focused control.
    MoveUp,
    /// Next option in the focused control.
    MoveDown,
    MoveLeft,
    MoveRight,
    /// Focus the next menu level or selector.
    NextFocus,
    PrevFocus,
    /// Commit the option under the cursor.
    Enter,
    /// Focus the menu one level up.
    Back,
    Quit,
}

// ============================================================================
// TRANSITIONS
// ============================================================================

/// Result of a pure state transition.
#[derive(Debug, PartialEq)]
pub enum Transition {
    /// Keep the page, move focus or cursor.
    Focus(Focus),
    /// Change a selection; the page must be rebuilt.
    Effect(Effect),
    Quit,
}

/// A selection change requested by a pure transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Choose `label` at menu `level`.
    SelectMenu { level: usize, label: String },
    /// Set one in-view selector of `view`.
    SetInput {
        view: ViewId,
        key: SelectorKey,
        value: String,
    },
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoCode, GeoLocation, Record, Table, Year};

    fn sample_tables() -> (Table<Record>, Table<GeoLocation>) {
        let record = |ubigeo, period, dep: &str, prov: &str, dist: &str, mun: f64| Record {
            ubigeo: GeoCode(ubigeo),
            period: Year(period),
            department: dep.into(),
            province: prov.into(),
            district: dist.into(),
            domestic_waste: mun * 0.8,
            non_domestic_waste: mun * 0.2,
            municipal_waste: mun,
            per_capita_domestic: 0.6,
        };
        let records = Table::new(vec![
            record(150101, 2014, "LIMA", "LIMA", "LIMA", 100.0),
            record(150101, 2015, "LIMA", "LIMA", "LIMA", 120.0),
            record(80101, 2014, "CUSCO", "CUSCO", "CUSCO", 30.0),
        ]);
        let geo = Table::new(vec![GeoLocation {
            geo_code: GeoCode(150101),
            latitude: -12.05,
            longitude: -77.04,
        }]);
        (records, geo)
    }

    #[test]
    fn app_starts_on_the_default_path() {
        let (records, geo) = sample_tables();
        let tree = NavigationTree::builtin().unwrap();
        let registry = ViewRegistry::standard();
        let app = App::new(Dataset { records: &records, geo: &geo }, &tree, &registry);

        assert_eq!(app.page.path(), ["Inicio", "Gráfico 1"]);
        assert_eq!(app.page.views.len(), 1);
        assert_eq!(app.page.views[0].id, ViewId::PeriodDonut);
        assert_eq!(app.focus, Focus::Menu { level: 0, cursor: 0 });
        assert!(!app.should_quit);
    }

    #[test]
    fn focus_slots_list_menus_then_selectors() {
        let (records, geo) = sample_tables();
        let tree = NavigationTree::builtin().unwrap();
        let registry = ViewRegistry::standard();
        let mut app = App::new(Dataset { records: &records, geo: &geo }, &tree, &registry);
        app.dispatcher
            .select(&mut app.selections, 1, "Gráfico 4")
            .unwrap();
        app.refresh();

        let slots = app.page.focus_slots();
        assert_eq!(slots.len(), 2 + 3);
        assert_eq!(slots[0], Focus::Menu { level: 0, cursor: 0 });
        assert_eq!(slots[1], Focus::Menu { level: 1, cursor: 3 });
        assert_eq!(slots[2], Focus::Selector { view: 0, index: 0, cursor: 0 });
    }

    #[test]
    fn inputs_are_kept_per_view() {
        let (records, geo) = sample_tables();
        let tree = NavigationTree::builtin().unwrap();
        let registry = ViewRegistry::standard();
        let mut app = App::new(Dataset { records: &records, geo: &geo }, &tree, &registry);

        app.set_input(ViewId::PeriodDepartmentLine, SelectorKey::Period, "2015")
            .unwrap();
        assert_eq!(app.inputs[&ViewId::PeriodDepartmentLine].period, Some(Year(2015)));
        assert!(!app.inputs.contains_key(&ViewId::DistrictDrilldown));
    }

    #[test]
    fn same_slot_ignores_cursor() {
        let a = Focus::Menu { level: 1, cursor: 0 };
        let b = Focus::Menu { level: 1, cursor: 3 };
        let c = Focus::Selector { view: 0, index: 1, cursor: 0 };
        assert!(a.same_slot(&b));
        assert!(!a.same_slot(&c));
    }
}
