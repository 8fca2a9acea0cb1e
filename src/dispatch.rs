//! Menu dispatch.
//!
//! Every interaction re-evaluates the tree from the root in two phases:
//! [`Dispatcher::resolve`] walks the remembered choices down to the
//! deepest rendered level, and [`ActivePath::invocations`] lists the views
//! to run. Views bound to an intermediate node run after the views below
//! them, so a parent always sees its sub-tree's narrowing first.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::UnknownSelectionError;
use crate::navigation::{NavigationNode, NavigationTree, Orientation, RenderTarget};
use crate::types::ViewId;

/// Last choice made at each menu, keyed by the labels leading to it.
///
/// The root menu's key is the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionCache {
    choices: HashMap<Vec<String>, usize>,
}

impl SelectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, menu: &[String]) -> Option<usize> {
        self.choices.get(menu).copied()
    }

    pub fn set(&mut self, menu: Vec<String>, index: usize) {
        self.choices.insert(menu, index);
    }
}

/// One rendered menu level.
#[derive(Debug, Clone, Copy)]
pub struct Level<'t> {
    pub menu: &'t NavigationTree,
    pub selected: usize,
}

impl<'t> Level<'t> {
    pub fn selected_node(&self) -> &'t NavigationNode {
        &self.menu.items[self.selected]
    }

    pub fn options(&self) -> Vec<&'t str> {
        self.menu.labels().collect()
    }

    pub fn icons(&self) -> Vec<&'t str> {
        self.menu.items.iter().map(|i| i.icon_id.as_str()).collect()
    }

    pub fn orientation(&self) -> Orientation {
        self.menu.orientation
    }

    pub fn render_target(&self) -> RenderTarget {
        self.menu.render_target
    }
}

/// Levels rendered for the current choices, root first.
#[derive(Debug, Clone)]
pub struct ActivePath<'t> {
    pub levels: Vec<Level<'t>>,
}

impl<'t> ActivePath<'t> {
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Label chosen at each level.
    pub fn labels(&self) -> Vec<&'t str> {
        self.levels
            .iter()
            .map(|l| l.selected_node().label.as_str())
            .collect()
    }

    /// Cache key of the menu shown at `level`.
    pub fn menu_key(&self, level: usize) -> Vec<String> {
        self.labels()
            .into_iter()
            .take(level)
            .map(str::to_string)
            .collect()
    }

    /// The deepest chosen node.
    pub fn current(&self) -> Option<&'t NavigationNode> {
        self.levels.last().map(Level::selected_node)
    }

    /// Bound views along the path, deepest first.
    pub fn invocations(&self) -> Vec<ViewId> {
        self.levels
            .iter()
            .rev()
            .filter_map(|l| l.selected_node().bound_view)
            .collect()
    }
}

/// Applies selection events to a tree.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher<'t> {
    tree: &'t NavigationTree,
}

impl<'t> Dispatcher<'t> {
    pub fn new(tree: &'t NavigationTree) -> Self {
        Dispatcher { tree }
    }

    pub fn tree(&self) -> &'t NavigationTree {
        self.tree
    }

    /// Walk from the root, taking the cached choice at each menu (or its
    /// default) and descending while the choice has children.
    pub fn resolve(&self, cache: &SelectionCache) -> ActivePath<'t> {
        let mut levels = Vec::new();
        let mut key: Vec<String> = Vec::new();
        let mut menu = self.tree;

        loop {
            let selected = cache
                .get(&key)
                .filter(|&i| i < menu.items.len())
                .unwrap_or(menu.default_index);
            levels.push(Level { menu, selected });

            let node = &menu.items[selected];
            match &node.children {
                Some(children) => {
                    key.push(node.label.clone());
                    menu = children;
                }
                None => break,
            }
        }

        ActivePath { levels }
    }

    /// Choose `label` at a rendered `level`.
    ///
    /// Deeper cached choices are kept; they apply again if that branch is
    /// re-entered.
    pub fn select(
        &self,
        cache: &mut SelectionCache,
        level: usize,
        label: &str,
    ) -> Result<ActivePath<'t>, UnknownSelectionError> {
        let active = self.resolve(cache);
        let menu = active
            .levels
            .get(level)
            .map(|l| l.menu)
            .ok_or(UnknownSelectionError::Level {
                level,
                depth: active.depth(),
            })?;
        let key = active.menu_key(level);
        let index = menu.position(label).ok_or_else(|| UnknownSelectionError::Label {
            path: key.clone(),
            label: label.to_string(),
        })?;

        debug!(level, label, "menu selection");
        cache.set(key, index);
        Ok(self.resolve(cache))
    }

    /// Apply a sequence of labels, one per level from the root.
    pub fn select_path(
        &self,
        cache: &mut SelectionCache,
        labels: &[&str],
    ) -> Result<ActivePath<'t>, UnknownSelectionError> {
        let mut active = self.resolve(cache);
        for (level, label) in labels.iter().enumerate() {
            active = self.select(cache, level, label)?;
        }
        info!(path = ?active.labels(), "navigated");
        Ok(active)
    }
}

// ============================================================================
// TESTS
// ============================================================================
