//! Pure rendering: map App state to ratatui widget trees.
//!
//! Sidebar-targeted menu levels are drawn in a left column; main-targeted
//! levels, the in-view selectors and the view bodies share the right
//! column. Widget-building functions are pure (state in, lines out); the
//! only effect is Frame::render_widget().

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::navigation::{Orientation, RenderTarget};
use crate::report::{kind_name, shares};
use crate::types::{Cell, ChartKind, ChartSpec, ContentBlock, Selector, ViewResult};

use super::state::{App, Focus, MenuLevel, RenderedView};
use super::theme;

const APP_TITLE: &str = "Residuos Municipales (2014-2021)";
const SIDEBAR_WIDTH: u16 = 28;
const LABEL_WIDTH: usize = 22;
const MAX_BAR: usize = 30;

// ============================================================================
// DISPATCH
// ============================================================================

/// Render the whole dashboard to the terminal frame.
pub fn render(app: &App, frame: &mut Frame) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Length(1), // title
        Constraint::Min(0),    // body
        Constraint::Length(1), // status / help
    ])
    .split(area);

    frame.render_widget(render_title(app), chunks[0]);
    frame.render_widget(render_footer(app), chunks[2]);

    let has_sidebar = app
        .page
        .levels
        .iter()
        .any(|l| l.target == RenderTarget::Sidebar);

    let main_area = if has_sidebar {
        let cols = Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)])
            .split(chunks[1]);
        render_sidebar(app, frame, cols[0]);
        cols[1]
    } else {
        chunks[1]
    };

    render_main(app, frame, main_area);
}

// ============================================================================
// SHARED LAYOUT
// ============================================================================

/// App name followed by the active path.
fn render_title(app: &App) -> Paragraph<'static> {
    let mut spans = vec![Span::styled(APP_TITLE, theme::STYLE_TITLE)];
    for label in app.page.path() {
        spans.push(Span::styled(" › ", theme::STYLE_DIM));
        spans.push(Span::raw(label.to_string()));
    }
    Paragraph::new(Line::from(spans))
}

/// Last error if there is one, otherwise key hints.
fn render_footer(app: &App) -> Paragraph<'static> {
    match &app.status {
        Some(message) => Paragraph::new(Span::styled(message.clone(), theme::STYLE_DANGER)),
        None => Paragraph::new(Span::styled(
            "[Tab] focus  [j/k h/l] move  [Enter] select  [Esc] up  [q] quit",
            theme::STYLE_HELP,
        )),
    }
}

// ============================================================================
// MENUS
// ============================================================================

fn render_sidebar(app: &App, frame: &mut Frame, area: Rect) {
    let mut lines = Vec::new();
    for (i, level) in app.page.levels.iter().enumerate() {
        if level.target == RenderTarget::Sidebar {
            lines.extend(menu_lines(level, cursor_at(app.focus, i)));
            lines.push(Line::from(""));
        }
    }
    let block = Block::default().borders(Borders::RIGHT).border_style(theme::STYLE_DIM);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_main(app: &App, frame: &mut Frame, area: Rect) {
    let mut lines = Vec::new();

    for (i, level) in app.page.levels.iter().enumerate() {
        if level.target == RenderTarget::Main {
            lines.extend(menu_lines(level, cursor_at(app.focus, i)));
        }
    }
    if !lines.is_empty() {
        lines.push(Line::from(""));
    }

    let width = area.width as usize;
    for (v, rendered) in app.page.views.iter().enumerate() {
        lines.extend(selector_lines(rendered.selectors(), app.focus, v));
        lines.extend(view_lines(rendered, width));
        lines.push(Line::from(""));
    }

    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// Cursor position if `level` has focus.
fn cursor_at(focus: Focus, level: usize) -> Option<usize> {
    match focus {
        Focus::Menu { level: l, cursor } if l == level => Some(cursor),
        _ => None,
    }
}

fn menu_lines(level: &MenuLevel, cursor: Option<usize>) -> Vec<Line<'static>> {
    let style_for = |i: usize| -> Style {
        if cursor == Some(i) {
            theme::STYLE_CURSOR
        } else if i == level.selected {
            theme::STYLE_SELECTED
        } else {
            Style::default()
        }
    };
    let label_for = |i: usize| -> String {
        let glyph = level.icons.get(i).map(|s| theme::icon_glyph(s)).unwrap_or("");
        if glyph.is_empty() {
            level.options[i].clone()
        } else {
            format!("{} {}", glyph, level.options[i])
        }
    };

    let mut lines = Vec::new();
    if let Some(title) = &level.title {
        let glyph = level
            .menu_icon
            .as_deref()
            .map(theme::icon_glyph)
            .unwrap_or("");
        lines.push(Line::from(Span::styled(
            format!("{} {}", glyph, title).trim().to_string(),
            theme::STYLE_IMPORTANT,
        )));
    }

    match level.orientation {
        Orientation::Vertical => {
            for i in 0..level.options.len() {
                lines.push(Line::from(Span::styled(
                    format!(" {} ", label_for(i)),
                    style_for(i),
                )));
            }
        }
        Orientation::Horizontal => {
            let mut spans = Vec::new();
            for i in 0..level.options.len() {
                if i > 0 {
                    spans.push(Span::styled("│", theme::STYLE_DIM));
                }
                spans.push(Span::styled(format!(" {} ", label_for(i)), style_for(i)));
            }
            lines.push(Line::from(spans));
        }
    }
    lines
}

// ============================================================================
// SELECTORS
// ============================================================================

fn selector_lines(selectors: &[Selector], focus: Focus, view: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (index, selector) in selectors.iter().enumerate() {
        let cursor = match focus {
            Focus::Selector {
                view: v,
                index: i,
                cursor,
            } if v == view && i == index => Some(cursor),
            _ => None,
        };

        let mut spans = vec![Span::styled(
            format!("{:<13}", format!("{}:", selector.key.label())),
            theme::STYLE_IMPORTANT,
        )];
        match cursor {
            Some(c) => {
                let option = selector.options.get(c).cloned().unwrap_or_default();
                spans.push(Span::styled(format!(" ◂ {} ▸ ", option), theme::STYLE_CURSOR));
                spans.push(Span::styled(
                    format!("  {}/{}  [Enter] apply", c + 1, selector.options.len()),
                    theme::STYLE_DIM,
                ));
            }
            None => {
                let current = selector.selected_label().unwrap_or("(none)").to_string();
                spans.push(Span::styled(format!(" {} ", current), theme::STYLE_SELECTED));
                spans.push(Span::styled(
                    format!("  {} options", selector.options.len()),
                    theme::STYLE_DIM,
                ));
            }
        }
        lines.push(Line::from(spans));
    }
    if !selectors.is_empty() {
        lines.push(Line::from(""));
    }
    lines
}

// ============================================================================
// VIEW BODIES
// ============================================================================

fn view_lines(rendered: &RenderedView, width: usize) -> Vec<Line<'static>> {
    match &rendered.result {
        Err(e) => vec![Line::from(Span::styled(
            format!("Error: {}", e),
            theme::STYLE_DANGER,
        ))],
        Ok(ViewResult::NoData { message, .. }) => vec![Line::from(Span::styled(
            format!("No data: {}", message),
            theme::STYLE_WARNING,
        ))],
        Ok(ViewResult::StaticContent(blocks)) => blocks.iter().flat_map(block_lines).collect(),
        Ok(ViewResult::Chart(panel)) => {
            let mut lines = Vec::new();
            for chart in &panel.charts {
                lines.extend(chart_lines(chart, width));
                lines.push(Line::from(""));
            }
            lines
        }
    }
}

fn block_lines(block: &ContentBlock) -> Vec<Line<'static>> {
    match block {
        ContentBlock::Heading { text } => vec![
            Line::from(Span::styled(text.clone(), theme::STYLE_IMPORTANT)),
            Line::from(""),
        ],
        ContentBlock::Paragraph { text } => vec![Line::from(text.clone()), Line::from("")],
        ContentBlock::Link { label, url } => vec![
            Line::from(vec![
                Span::styled(format!("{} ", label), theme::STYLE_INTERACTIVE),
                Span::styled(url.clone(), theme::STYLE_DIM),
            ]),
            Line::from(""),
        ],
        ContentBlock::Person {
            name,
            program,
            email,
        } => vec![
            Line::from(Span::styled(name.clone(), theme::STYLE_IMPORTANT)),
            Line::from(Span::styled(format!("  {}", program), theme::STYLE_DIM)),
            Line::from(format!("  correo: {}", email)),
            Line::from(""),
        ],
    }
}

/// Title, one row per table row with bars for each series, then caption.
fn chart_lines(chart: &ChartSpec, width: usize) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(vec![
        Span::styled(chart.title.clone(), theme::STYLE_IMPORTANT),
        Span::styled(format!("  [{}]", kind_name(chart.kind)), theme::STYLE_DIM),
    ])];

    if chart.kind == ChartKind::ScatterMap {
        lines.extend(map_lines(chart));
    } else {
        lines.extend(series_lines(chart, width));
    }

    if let Some(caption) = &chart.options.caption {
        lines.push(Line::from(Span::styled(caption.clone(), theme::STYLE_CAPTION)));
    }
    lines
}

fn series_lines(chart: &ChartSpec, width: usize) -> Vec<Line<'static>> {
    let table = &chart.table;
    let Some(x) = table.column(&chart.options.x) else {
        return Vec::new();
    };
    let series: Vec<usize> = chart
        .options
        .series
        .iter()
        .filter_map(|s| table.column(s))
        .collect();
    if series.is_empty() {
        return Vec::new();
    }

    let value = |row: &[Cell], col: usize| row.get(col).and_then(Cell::as_f64).unwrap_or(0.0);
    let max = table
        .rows
        .iter()
        .flat_map(|r| series.iter().map(move |&c| value(r.as_slice(), c)))
        .fold(0.0_f64, f64::max);
    let percents = if chart.kind == ChartKind::Donut {
        shares(table, chart.options.series.first().map(String::as_str))
    } else {
        None
    };

    // label + per series: value (12) + bar + gaps
    let fixed = 2 + LABEL_WIDTH + series.len() * 14 + 10;
    let bar_width = (width.saturating_sub(fixed) / series.len()).min(MAX_BAR);

    let mut lines = Vec::new();
    for (i, row) in table.rows.iter().enumerate() {
        let marker = if chart.options.highlight_first && i == 0 { "▶ " } else { "  " };
        let label = row.get(x).map(ToString::to_string).unwrap_or_default();
        let mut spans = vec![
            Span::styled(marker, theme::STYLE_INTERACTIVE),
            Span::raw(format!("{:<w$.w$}", label, w = LABEL_WIDTH)),
        ];
        for (n, &col) in series.iter().enumerate() {
            let v = value(row.as_slice(), col);
            let filled = if max > 0.0 {
                ((v / max) * bar_width as f64).round() as usize
            } else {
                0
            };
            spans.push(Span::raw(format!(" {:>12.2} ", v)));
            spans.push(Span::styled("█".repeat(filled), theme::series_style(n)));
        }
        if let Some(p) = percents.as_ref().and_then(|p| p.get(i)) {
            spans.push(Span::styled(format!(" {:.2}%", p), theme::STYLE_DIM));
        }
        lines.push(Line::from(spans));
    }

    if series.len() > 1 {
        let legend: Vec<Span<'static>> = chart
            .options
            .series
            .iter()
            .enumerate()
            .flat_map(|(n, name)| {
                [
                    Span::styled("█ ", theme::series_style(n)),
                    Span::raw(format!("{}  ", name)),
                ]
            })
            .collect();
        lines.push(Line::from(legend));
    }
    lines
}

/// Distinct labelled points with their coordinates, then the map center.
fn map_lines(chart: &ChartSpec) -> Vec<Line<'static>> {
    let table = &chart.table;
    let (Some(x), Some(lat), Some(lon)) = (
        table.column(&chart.options.x),
        table.column("latitud"),
        table.column("longitud"),
    ) else {
        return Vec::new();
    };
    let size = chart
        .options
        .series
        .first()
        .and_then(|s| table.column(s));

    let mut lines = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for row in &table.rows {
        let label = row.get(x).map(ToString::to_string).unwrap_or_default();
        if seen.contains(&label) {
            continue;
        }
        let coord = |c: usize| row.get(c).and_then(Cell::as_f64).unwrap_or(0.0);
        let mut spans = vec![
            Span::styled("◉ ", theme::STYLE_SERIES),
            Span::styled(label.clone(), theme::STYLE_IMPORTANT),
            Span::raw(format!("  {:.4}, {:.4}", coord(lat), coord(lon))),
        ];
        if let Some(c) = size {
            spans.push(Span::styled(
                format!("  total {:.2} Ton", coord(c)),
                theme::STYLE_DIM,
            ));
        }
        lines.push(Line::from(spans));
        seen.push(label);
    }

    if let Some((clat, clon)) = chart.options.center {
        let zoom = chart
            .options
            .zoom
            .map(|z| format!("  zoom {}", z))
            .unwrap_or_default();
        lines.push(Line::from(Span::styled(
            format!("center {:.4}, {:.4}{}", clat, clon, zoom),
            theme::STYLE_DIM,
        )));
    }
    lines
}

// ============================================================================
// TESTS
// ============================================================================
