//! Pure state transitions: (Focus, Action, Page) → Transition.
//!
//! Movement only touches the focus cursor. Enter turns the option under
//! the cursor into an [`Effect`]; the effects boundary applies it and
//! rebuilds the page. Fully testable without a terminal.

use super::state::{Action, Effect, Focus, Page, Transition};

/// Pure state transition function.
pub fn update(focus: Focus, action: &Action, page: &Page) -> Transition {
    match action {
        Action::Quit => Transition::Quit,
        Action::NextFocus => Transition::Focus(cycle_focus(focus, page, true)),
        Action::PrevFocus => Transition::Focus(cycle_focus(focus, page, false)),
        _ => match focus {
            Focus::Menu { level, cursor } => update_menu(level, cursor, action, page),
            Focus::Selector {
                view,
                index,
                cursor,
            } => update_selector(view, index, cursor, action, page),
        },
    }
}

/// Bring a focus back in range after the page was rebuilt.
///
/// Levels and selectors can disappear when a selection changes. A focus
/// that still exists keeps its slot and lands on the committed option;
/// one that vanished falls back to the deepest menu level.
pub fn settle(focus: Focus, page: &Page) -> Focus {
    let slots = page.focus_slots();
    if let Some(slot) = slots.iter().find(|s| s.same_slot(&focus)) {
        return *slot;
    }
    slots
        .iter()
        .filter(|s| matches!(s, Focus::Menu { .. }))
        .last()
        .copied()
        .unwrap_or(Focus::Menu { level: 0, cursor: 0 })
}

// ============================================================================
// PER-CONTROL HANDLERS
// ============================================================================

fn update_menu(level: usize, cursor: usize, action: &Action, page: &Page) -> Transition {
    let Some(menu) = page.levels.get(level) else {
        return Transition::Focus(settle(Focus::Menu { level, cursor }, page));
    };
    let len = menu.options.len();

    match action {
        Action::MoveUp | Action::MoveLeft => Transition::Focus(Focus::Menu {
            level,
            cursor: cursor.saturating_sub(1),
        }),
        Action::MoveDown | Action::MoveRight => Transition::Focus(Focus::Menu {
            level,
            cursor: step_down(cursor, len),
        }),
        Action::Enter => match menu.options.get(cursor) {
            Some(label) => Transition::Effect(Effect::SelectMenu {
                level,
                label: label.clone(),
            }),
            None => Transition::Focus(Focus::Menu { level, cursor }),
        },
        Action::Back => match level
            .checked_sub(1)
            .and_then(|up| page.levels.get(up).map(|l| (up, l)))
        {
            Some((up, parent)) => Transition::Focus(Focus::Menu {
                level: up,
                cursor: parent.selected,
            }),
            None => Transition::Focus(Focus::Menu { level, cursor }),
        },
        _ => Transition::Focus(Focus::Menu { level, cursor }),
    }
}

fn update_selector(
    view: usize,
    index: usize,
    cursor: usize,
    action: &Action,
    page: &Page,
) -> Transition {
    let focus = Focus::Selector {
        view,
        index,
        cursor,
    };
    let Some(selector) = page.selector(view, index) else {
        return Transition::Focus(settle(focus, page));
    };
    let len = selector.options.len();

    match action {
        Action::MoveUp | Action::MoveLeft => Transition::Focus(Focus::Selector {
            view,
            index,
            cursor: cursor.saturating_sub(1),
        }),
        Action::MoveDown | Action::MoveRight => Transition::Focus(Focus::Selector {
            view,
            index,
            cursor: step_down(cursor, len),
        }),
        Action::Enter => match (selector.options.get(cursor), page.views.get(view)) {
            (Some(value), Some(rendered)) => Transition::Effect(Effect::SetInput {
                view: rendered.id,
                key: selector.key,
                value: value.clone(),
            }),
            _ => Transition::Focus(focus),
        },
        Action::Back => {
            let deepest = page.levels.len().saturating_sub(1);
            let cursor = page.levels.get(deepest).map(|l| l.selected).unwrap_or(0);
            Transition::Focus(Focus::Menu {
                level: deepest,
                cursor,
            })
        }
        _ => Transition::Focus(focus),
    }
}

fn cycle_focus(focus: Focus, page: &Page, forward: bool) -> Focus {
    let slots = page.focus_slots();
    if slots.is_empty() {
        return focus;
    }
    let n = slots.len();
    let next = match slots.iter().position(|s| s.same_slot(&focus)) {
        Some(i) if forward => (i + 1) % n,
        Some(i) => (i + n - 1) % n,
        None => 0,
    };
    slots[next]
}

fn step_down(cursor: usize, len: usize) -> usize {
    if len == 0 { 0 } else { (cursor + 1).min(len - 1) }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewError;
    use crate::navigation::{Orientation, RenderTarget};
    use crate::tui::state::{MenuLevel, RenderedView};
    use crate::types::{ChartPanel, Selector, SelectorKey, ViewId, ViewResult};

    fn level(options: &[&str], selected: usize, target: RenderTarget) -> MenuLevel {
        MenuLevel {
            title: None,
            menu_icon: None,
            options: options.iter().map(|s| s.to_string()).collect(),
            icons: options.iter().map(|_| "-".to_string()).collect(),
            selected,
            orientation: match target {
                RenderTarget::Sidebar => Orientation::Vertical,
                RenderTarget::Main => Orientation::Horizontal,
            },
            target,
        }
    }

    /// Sidebar + chart tabs, with the line chart's period selector showing.
    fn page() -> Page {
        Page {
            levels: vec![
                level(&["Inicio", "Acerca", "Nosotros"], 0, RenderTarget::Sidebar),
                level(&["Gráfico 1", "Gráfico 2", "Gráfico 3"], 2, RenderTarget::Main),
            ],
            views: vec![RenderedView {
                id: ViewId::PeriodDepartmentLine,
                result: Ok(ViewResult::Chart(ChartPanel {
                    selectors: vec![Selector::new(
                        SelectorKey::Period,
                        vec!["2014".into(), "2015".into(), "2016".into()],
                        Some("2014"),
                    )],
                    charts: vec![],
                })),
            }],
        }
    }

    fn menu(level: usize, cursor: usize) -> Focus {
        Focus::Menu { level, cursor }
    }

    fn selector(cursor: usize) -> Focus {
        Focus::Selector {
            view: 0,
            index: 0,
            cursor,
        }
    }

    #[test]
    fn quit_from_anywhere() {
        assert_eq!(update(menu(0, 0), &Action::Quit, &page()), Transition::Quit);
        assert_eq!(update(selector(1), &Action::Quit, &page()), Transition::Quit);
    }

    #[test]
    fn menu_cursor_moves_within_bounds() {
        let page = page();
        assert_eq!(
            update(menu(0, 0), &Action::MoveUp, &page),
            Transition::Focus(menu(0, 0))
        );
        assert_eq!(
            update(menu(0, 0), &Action::MoveDown, &page),
            Transition::Focus(menu(0, 1))
        );
        assert_eq!(
            update(menu(0, 2), &Action::MoveDown, &page),
            Transition::Focus(menu(0, 2))
        );
        assert_eq!(
            update(menu(1, 2), &Action::MoveLeft, &page),
            Transition::Focus(menu(1, 1))
        );
    }

    #[test]
    fn enter_on_menu_selects_label_under_cursor() {
        let t = update(menu(0, 1), &Action::Enter, &page());
        assert_eq!(
            t,
            Transition::Effect(Effect::SelectMenu {
                level: 0,
                label: "Acerca".into(),
            })
        );
    }

    #[test]
    fn back_moves_focus_to_parent_selection() {
        let page = page();
        assert_eq!(
            update(menu(1, 0), &Action::Back, &page),
            Transition::Focus(menu(0, 0))
        );
        assert_eq!(
            update(menu(0, 2), &Action::Back, &page),
            Transition::Focus(menu(0, 2))
        );
        assert_eq!(
            update(selector(0), &Action::Back, &page),
            Transition::Focus(menu(1, 2))
        );
    }

    #[test]
    fn tab_cycles_through_menus_and_selectors() {
        let page = page();
        let first = update(menu(0, 1), &Action::NextFocus, &page);
        assert_eq!(first, Transition::Focus(menu(1, 2)));
        let second = update(menu(1, 0), &Action::NextFocus, &page);
        assert_eq!(second, Transition::Focus(selector(0)));
        let wrapped = update(selector(2), &Action::NextFocus, &page);
        assert_eq!(wrapped, Transition::Focus(menu(0, 0)));
        let back = update(menu(0, 0), &Action::PrevFocus, &page);
        assert_eq!(back, Transition::Focus(selector(0)));
    }

    #[test]
    fn enter_on_selector_sets_view_input() {
        let t = update(selector(2), &Action::Enter, &page());
        assert_eq!(
            t,
            Transition::Effect(Effect::SetInput {
                view: ViewId::PeriodDepartmentLine,
                key: SelectorKey::Period,
                value: "2016".into(),
            })
        );
    }

    #[test]
    fn selector_cursor_is_bounded_by_options() {
        let page = page();
        assert_eq!(
            update(selector(2), &Action::MoveDown, &page),
            Transition::Focus(selector(2))
        );
        assert_eq!(
            update(selector(2), &Action::MoveUp, &page),
            Transition::Focus(selector(1))
        );
    }

    #[test]
    fn settle_keeps_surviving_slot_and_drops_vanished_one() {
        let mut page = page();
        assert_eq!(settle(selector(2), &page), selector(0));

        page.views[0].result = Err(ViewError::Unregistered(ViewId::PeriodDepartmentLine));
        assert_eq!(settle(selector(2), &page), menu(1, 2));
        assert_eq!(settle(menu(5, 0), &page), menu(1, 2));
    }

    #[test]
    fn empty_page_is_inert() {
        let page = Page::default();
        assert_eq!(
            update(menu(0, 0), &Action::Enter, &page),
            Transition::Focus(menu(0, 0))
        );
        assert_eq!(
            update(menu(0, 0), &Action::NextFocus, &page),
            Transition::Focus(menu(0, 0))
        );
    }
}
