use chrono::Local;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols,
    text::{Line, Span, Text},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Cell, Chart, Clear, Dataset, GraphType,
        List, ListItem, Paragraph, Row, Table, Tabs, Wrap,
    },
    Frame,
};

use cortex_core::samples::{setup_sql, PREREQUISITES};
use cortex_core::{ChartData, ChatRole, RenderedBlock, ResultView, ResultViews, TurnState};

use crate::app::{sample_items, App, FocusPane, InputMode, Tab};

/// Bar groups drawn per chart; the rest of the rows stay in the table view.
const MAX_BAR_GROUPS: usize = 60;

const SERIES_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Yellow,
    Color::Magenta,
    Color::Green,
    Color::Red,
    Color::Blue,
];

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, tabs_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_tabs(app, frame, tabs_area);

    match app.tab {
        Tab::Chat => render_chat_screen(app, frame, body_area),
        Tab::Samples => render_samples_screen(app, frame, body_area),
        Tab::Setup => render_setup_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    if let Some(message) = app.banner.clone() {
        render_banner(frame, body_area, &message);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let connected = match app.sessions.query.identity() {
        Some(identity) => format!(" connected as {} with role {} ", identity.user, identity.role),
        None => " connected ".to_string(),
    };

    let title = Line::from(vec![
        Span::styled(" Consultant Utilization Analytics ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(connected, Style::default().fg(Color::Green)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    frame.render_widget(Paragraph::new(title).style(Style::default().bg(Color::DarkGray)), area);
}

fn render_tabs(app: &App, frame: &mut Frame, area: Rect) {
    let titles: Vec<String> = Tab::ALL
        .iter()
        .enumerate()
        .map(|(i, tab)| format!(" {} {} ", i + 1, tab.title()))
        .collect();

    let tabs = Tabs::new(titles)
        .select(app.tab.index())
        .style(Style::default().fg(Color::Gray))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .divider("|");
    frame.render_widget(tabs, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let (mode_text, mode_style) = match (app.input_mode, app.processor.state()) {
        (_, TurnState::Sending) => (" ASKING ", Style::default().bg(Color::Magenta).fg(Color::White)),
        (InputMode::Editing, _) => (" TYPE ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        (InputMode::Normal, TurnState::Failed) => (" FAILED ", Style::default().bg(Color::Red).fg(Color::White)),
        (InputMode::Normal, _) => (" READY ", Style::default().bg(Color::Blue).fg(Color::White)),
    };

    let keys: &[(&str, &str)] = match (app.tab, app.input_mode) {
        (_, InputMode::Editing) => &[("Enter", "ask"), ("Esc", "stop typing"), ("Tab", "samples")],
        (Tab::Chat, InputMode::Normal) => match app.focus {
            FocusPane::Chat => &[
                ("i", "type"), ("Tab", "focus"), ("j/k", "scroll"), ("1-6", "example"),
                ("e", "export"), ("C", "clear"), ("R", "replay"), ("q", "quit"),
            ],
            FocusPane::Results => &[
                ("Tab", "focus"), ("h/l", "result"), ("v", "view"), ("j/k", "rows"),
                ("e", "export csv"), ("q", "quit"),
            ],
            FocusPane::Suggestions => &[
                ("Tab", "focus"), ("j/k", "nav"), ("Enter", "ask"), ("q", "quit"),
            ],
        },
        (Tab::Samples, InputMode::Normal) => &[
            ("j/k", "nav"), ("Enter", "ask"), ("1/2/3", "tab"), ("q", "quit"),
        ],
        (Tab::Setup, InputMode::Normal) => &[
            ("t", "test connection"), ("1/2/3", "tab"), ("q", "quit"),
        ],
    };

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
    ];
    for (key, label) in keys {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }
    if let Some(status) = &app.status {
        spans.push(Span::styled(format!("  {}", status), Style::default().fg(Color::Green)));
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black)),
        area,
    );
}

fn render_banner(frame: &mut Frame, area: Rect, message: &str) {
    let width = area.width.saturating_sub(4);
    let banner_area = Rect::new(area.x + 2, area.y, width, 3.min(area.height));
    frame.render_widget(Clear, banner_area);
    let banner = Paragraph::new(Span::styled(message, Style::default().fg(Color::White)))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title(" Error (Esc to dismiss) "),
        )
        .style(Style::default().bg(Color::Red))
        .wrap(Wrap { trim: true });
    frame.render_widget(banner, banner_area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [main_area, sidebar_area] = Layout::horizontal([
        Constraint::Percentage(72),
        Constraint::Percentage(28),
    ])
    .areas(area);

    let suggestions = app.current_suggestions();
    let results_height = if app.result_blocks().is_empty() { 0 } else { main_area.height / 2 };
    let suggestions_height = if suggestions.is_empty() {
        0
    } else {
        (suggestions.len().min(4) + 2) as u16
    };

    let [chat_area, results_area, suggestions_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(results_height),
        Constraint::Length(suggestions_height),
        Constraint::Length(3),
    ])
    .areas(main_area);

    render_transcript(app, frame, chat_area);
    if results_height > 0 {
        render_results(app, frame, results_area);
    }
    if suggestions_height > 0 {
        render_suggestions(app, frame, suggestions_area, &suggestions);
    }
    render_input(app, frame, input_area);
    render_sidebar(app, frame, sidebar_area);
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }))
        .title(title)
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let mut lines: Vec<Line> = Vec::new();
    let store = app.processor.store();

    if store.is_empty() && !app.processor.is_sending() {
        lines.push(Line::from(Span::styled(
            "Ask me anything about your utilization data...",
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::default());
        lines.push(Line::from("Try an example (press 1-6 in normal mode):"));
        for (i, question) in cortex_core::samples::EXAMPLE_QUESTIONS.iter().enumerate() {
            lines.push(Line::from(Span::styled(
                format!("  {}. {}", i + 1, question),
                Style::default().fg(Color::Gray),
            )));
        }
    }

    for (index, turn) in store.turns().iter().enumerate() {
        match turn.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled(
                    format!("You ({})", turn.timestamp.with_timezone(&Local).format("%H:%M:%S")),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                for line in turn.first_text().unwrap_or_default().lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            ChatRole::Assistant => {
                let mut header = vec![Span::styled(
                    "Analyst",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )];
                if let Some(id) = &turn.request_id {
                    header.push(Span::styled(
                        format!("  request id: {}", id),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                lines.push(Line::from(header));

                match app.renders.get(&index) {
                    Some(rendered) => push_rendered(&mut lines, &rendered.blocks),
                    None => {
                        for text in turn.content.iter().filter_map(|b| match b {
                            cortex_core::ContentBlock::Text { text } => Some(text),
                            _ => None,
                        }) {
                            lines.extend(text.lines().map(|l| Line::from(l.to_string())));
                        }
                        if app.is_rendering(index) {
                            lines.push(Line::from(Span::styled(
                                format!(
                                    "Running generated SQL{}",
                                    ".".repeat(app.animation_frame as usize + 1)
                                ),
                                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                            )));
                        }
                    }
                }
            }
        }
        lines.push(Line::default());
    }

    if let Some(prompt) = app.processor.in_flight() {
        let dots = ".".repeat(app.animation_frame as usize + 1);
        lines.push(Line::from(Span::styled(
            "Analyst",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            format!("Analyzing \"{}\"{}", prompt, dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    if app.follow_chat {
        let total = wrapped_height(&lines, app.chat_width);
        app.chat_scroll = total.saturating_sub(app.chat_height);
    }

    let turns = app.processor.store().user_turn_count();
    let chat = Paragraph::new(Text::from(lines))
        .block(pane_block(
            format!(" Conversation ({} questions) ", turns),
            app.focus == FocusPane::Chat && app.input_mode == InputMode::Normal,
        ))
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);
}

fn push_rendered(lines: &mut Vec<Line<'static>>, blocks: &[RenderedBlock]) {
    let mut sql_number = 0;
    for block in blocks {
        match block {
            RenderedBlock::Prose(text) => {
                lines.extend(text.lines().map(|l| Line::from(l.to_string())));
            }
            RenderedBlock::Suggestions(items) => {
                lines.push(Line::from(Span::styled(
                    "Suggested follow-ups:",
                    Style::default().fg(Color::Magenta),
                )));
                for item in items {
                    lines.push(Line::from(Span::styled(
                        format!("  > {}", item),
                        Style::default().fg(Color::Magenta),
                    )));
                }
            }
            RenderedBlock::Sql { statement, outcome } => {
                sql_number += 1;
                lines.push(Line::from(Span::styled(
                    format!("Generated SQL #{}:", sql_number),
                    Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
                )));
                for line in statement.lines() {
                    lines.push(Line::from(Span::styled(
                        format!("  {}", line),
                        Style::default().fg(Color::Gray),
                    )));
                }
                lines.push(match outcome {
                    Ok(views) => Line::from(Span::styled(
                        format!(
                            "  {} rows, {} columns (see results below)",
                            views.result.row_count(),
                            views.result.columns.len()
                        ),
                        Style::default().fg(Color::Green),
                    )),
                    Err(err) => Line::from(Span::styled(
                        format!("  Error executing SQL: {}", err),
                        Style::default().fg(Color::Red),
                    )),
                });
            }
        }
    }
}

/// Rows the transcript occupies once wrapped to `width`.
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = width.max(1) as usize;
    lines
        .iter()
        .map(|line| {
            let chars = line.width();
            if chars == 0 {
                1
            } else {
                chars.div_ceil(width) as u16
            }
        })
        .fold(0u16, |acc, h| acc.saturating_add(h))
}

fn render_results(app: &App, frame: &mut Frame, area: Rect) {
    let blocks = app.result_blocks();
    let count = blocks.len();
    let Some((_, outcome)) = blocks.get(app.result_index) else {
        return;
    };
    let focused = app.focus == FocusPane::Results;

    let views = match outcome {
        Ok(views) => views,
        Err(err) => {
            let paragraph = Paragraph::new(Span::styled(
                format!("Error executing SQL: {}", err),
                Style::default().fg(Color::Red),
            ))
            .block(pane_block(format!(" Result {}/{} ", app.result_index + 1, count), focused))
            .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, area);
            return;
        }
    };

    let view_labels: Vec<Span> = views
        .available()
        .into_iter()
        .map(|view| {
            if view == app.result_view {
                Span::styled(format!("[{}]", view.label()), Style::default().fg(Color::Cyan).bold())
            } else {
                Span::styled(format!(" {} ", view.label()), Style::default().fg(Color::Gray))
            }
        })
        .collect();
    let mut title = vec![Span::raw(format!(
        " Result {}/{} · {} rows ",
        app.result_index + 1,
        count,
        views.result.row_count()
    ))];
    title.extend(view_labels);
    title.push(Span::raw(" "));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }))
        .title(Line::from(title));

    match (app.result_view, views.chart.as_ref()) {
        (ResultView::Line, Some(chart)) => render_line_chart(frame, area, block, chart),
        (ResultView::Bar, Some(chart)) => render_bar_chart(frame, area, block, chart),
        _ => render_table(frame, area, block, views, app.result_scroll),
    }
}

fn render_table(frame: &mut Frame, area: Rect, block: Block, views: &ResultViews, scroll: usize) {
    let result = &views.result;
    if result.columns.is_empty() {
        frame.render_widget(Paragraph::new("Statement returned no columns").block(block), area);
        return;
    }

    let header = Row::new(result.columns.iter().map(|c| Cell::from(c.name.clone())))
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    let visible = area.height.saturating_sub(3) as usize;
    let start = scroll.min(result.row_count().saturating_sub(1));
    let rows = result.rows.iter().skip(start).take(visible).map(|row| {
        Row::new(row.iter().map(|cell| match cell {
            Some(value) => Cell::from(value.clone()),
            None => Cell::from(Span::styled("NULL", Style::default().fg(Color::DarkGray))),
        }))
    });

    let widths = vec![Constraint::Fill(1); result.columns.len()];
    let table = Table::new(rows, widths).header(header).block(block).column_spacing(2);
    frame.render_widget(table, area);
}

fn render_line_chart(frame: &mut Frame, area: Rect, block: Block, chart: &ChartData) {
    let points: Vec<Vec<(f64, f64)>> = chart
        .series
        .iter()
        .map(|series| {
            series
                .points
                .iter()
                .enumerate()
                .filter_map(|(x, y)| y.map(|y| (x as f64, y)))
                .collect()
        })
        .collect();

    let datasets: Vec<Dataset> = chart
        .series
        .iter()
        .zip(points.iter())
        .enumerate()
        .map(|(i, (series, data))| {
            Dataset::default()
                .name(series.name.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(SERIES_COLORS[i % SERIES_COLORS.len()]))
                .data(data)
        })
        .collect();

    let (lo, hi) = padded_bounds(chart);
    let last = chart.categories.len().saturating_sub(1);
    let x_labels: Vec<Span> = [0, last / 2, last]
        .iter()
        .filter_map(|&i| chart.categories.get(i))
        .map(|c| Span::raw(c.clone()))
        .collect();

    let widget = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .title(chart.category_column.clone())
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, last.max(1) as f64])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([lo, hi])
                .labels(vec![
                    Span::raw(format_value(lo)),
                    Span::raw(format_value((lo + hi) / 2.0)),
                    Span::raw(format_value(hi)),
                ]),
        );
    frame.render_widget(widget, area);
}

fn render_bar_chart(frame: &mut Frame, area: Rect, block: Block, chart: &ChartData) {
    let (_, hi) = chart.value_bounds().unwrap_or((0.0, 0.0));
    // Bars take integers; scale so the tallest bar has useful resolution
    let scale = if hi > 0.0 { 1000.0 / hi } else { 1.0 };

    let groups: Vec<BarGroup> = chart
        .categories
        .iter()
        .take(MAX_BAR_GROUPS)
        .enumerate()
        .map(|(row, category)| {
            let bars: Vec<Bar> = chart
                .series
                .iter()
                .enumerate()
                .map(|(i, series)| {
                    let value = series.points.get(row).copied().flatten().unwrap_or(0.0);
                    Bar::default()
                        .value((value.max(0.0) * scale).round() as u64)
                        .text_value(format_value(value))
                        .style(Style::default().fg(SERIES_COLORS[i % SERIES_COLORS.len()]))
                })
                .collect();
            BarGroup::default()
                .label(Line::from(category.clone()))
                .bars(&bars)
        })
        .collect();

    let mut widget = BarChart::default()
        .block(block)
        .bar_width(bar_width(area.width, chart))
        .bar_gap(0)
        .group_gap(1);
    for group in groups {
        widget = widget.data(group);
    }
    frame.render_widget(widget, area);
}

fn bar_width(width: u16, chart: &ChartData) -> u16 {
    let groups = chart.categories.len().min(MAX_BAR_GROUPS);
    let bars = groups.saturating_mul(chart.series.len().max(1)).max(1);
    let room = usize::from(width).saturating_sub(2).saturating_sub(groups);
    u16::try_from((room / bars).clamp(1, 9)).unwrap_or(u16::MAX)
}

fn padded_bounds(chart: &ChartData) -> (f64, f64) {
    match chart.value_bounds() {
        Some((lo, hi)) if (hi - lo).abs() > f64::EPSILON => {
            let pad = (hi - lo) * 0.05;
            (lo - pad, hi + pad)
        }
        Some((v, _)) => (v - 1.0, v + 1.0),
        None => (0.0, 1.0),
    }
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e12 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

fn render_suggestions(app: &mut App, frame: &mut Frame, area: Rect, suggestions: &[String]) {
    let focused = app.focus == FocusPane::Suggestions;
    let items: Vec<ListItem> = suggestions
        .iter()
        .map(|s| ListItem::new(format!(" {} ", s)))
        .collect();

    let list = List::new(items)
        .block(pane_block(" Suggestions (Enter to ask) ".to_string(), focused))
        .highlight_style(
            Style::default()
                .bg(Color::Magenta)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut app.suggestions_state);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let title = if app.processor.is_sending() {
        " Waiting for Cortex Analyst... "
    } else {
        " Ask me anything about your utilization data "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(title);

    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width > 0 && app.cursor >= inner_width {
        app.cursor - inner_width + 1
    } else {
        0
    };
    let visible: String = app.input.chars().skip(scroll_offset).take(inner_width).collect();

    frame.render_widget(
        Paragraph::new(visible).style(Style::default().fg(Color::Cyan)).block(block),
        area,
    );

    if editing {
        frame.set_cursor_position((
            area.x + (app.cursor - scroll_offset) as u16 + 1,
            area.y + 1,
        ));
    }
}

fn render_sidebar(app: &App, frame: &mut Frame, area: Rect) {
    let [status_area, history_area] = Layout::vertical([
        Constraint::Length(10),
        Constraint::Min(0),
    ])
    .areas(area);

    let label = Style::default().fg(Color::Gray);
    let query = app.sessions.query.target();
    let analyst = app.sessions.analyst.target();
    let mut lines = vec![Line::from(Span::styled(
        "Connected to Snowflake",
        Style::default().fg(Color::Green).bold(),
    ))];
    if let Some(identity) = app.sessions.query.identity() {
        lines.push(Line::from(vec![Span::styled("User: ", label), Span::raw(identity.user.clone())]));
        lines.push(Line::from(vec![Span::styled("Role: ", label), Span::raw(identity.role.clone())]));
    }
    lines.extend([
        Line::from(vec![Span::styled("Warehouse: ", label), Span::raw(query.warehouse.clone())]),
        Line::from(vec![
            Span::styled("Query: ", label),
            Span::raw(format!("{}.{}", query.database, query.schema)),
        ]),
        Line::from(vec![
            Span::styled("Analyst: ", label),
            Span::raw(format!("{}.{}", analyst.database, analyst.schema)),
        ]),
        Line::from(vec![
            Span::styled("Model: ", label),
            Span::raw(app.config.cortex.semantic_model.clone()),
        ]),
        Line::from(vec![
            Span::styled("SQL runs on: ", label),
            Span::raw(app.config.sql_session.to_string()),
        ]),
    ]);

    frame.render_widget(
        Paragraph::new(lines)
            .block(pane_block(" Status ".to_string(), false))
            .wrap(Wrap { trim: true }),
        status_area,
    );

    let history = app.processor.store().history_summary();
    let items: Vec<ListItem> = if history.is_empty() {
        vec![ListItem::new(Span::styled(" No questions yet ", Style::default().fg(Color::DarkGray)))]
    } else {
        history
            .iter()
            .map(|entry| {
                ListItem::new(vec![
                    Line::from(entry.preview.clone()),
                    Line::from(Span::styled(entry.time.clone(), Style::default().fg(Color::DarkGray))),
                ])
            })
            .collect()
    };
    frame.render_widget(
        List::new(items).block(pane_block(" Recent questions (C clears) ".to_string(), false)),
        history_area,
    );
}

fn render_samples_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let items = sample_items();
    let mut last_group = "";
    let list_items: Vec<ListItem> = items
        .iter()
        .map(|(group, question)| {
            let mut lines = Vec::new();
            if *group != last_group {
                lines.push(Line::from(Span::styled(
                    group.to_string(),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                last_group = *group;
            }
            lines.push(Line::from(format!("   {}", question)));
            ListItem::new(lines)
        })
        .collect();

    let list = List::new(list_items)
        .block(pane_block(
            " Sample Questions for Your Utilization Data (Enter to ask) ".to_string(),
            true,
        ))
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut app.samples_state);
}

fn render_setup_screen(app: &App, frame: &mut Frame, area: Rect) {
    let [left, right] = Layout::horizontal([
        Constraint::Percentage(55),
        Constraint::Percentage(45),
    ])
    .areas(area);

    let mut lines = vec![Line::from(Span::styled(
        "Prerequisites",
        Style::default().fg(Color::Yellow).bold(),
    ))];
    lines.extend(PREREQUISITES.iter().map(|p| Line::from(format!("  - {}", p))));
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Semantic model location",
        Style::default().fg(Color::Yellow).bold(),
    )));
    lines.push(Line::from(format!("  {}", app.config.semantic_model_path())));
    lines.push(Line::default());
    lines.extend(
        setup_sql(&app.config.cortex)
            .lines()
            .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(Color::Cyan)))),
    );

    frame.render_widget(
        Paragraph::new(lines)
            .block(pane_block(" Setup Guide for Cortex Analyst ".to_string(), false))
            .wrap(Wrap { trim: false }),
        left,
    );

    let [config_area, check_area] = Layout::vertical([
        Constraint::Length(11),
        Constraint::Min(0),
    ])
    .areas(right);

    let account = app.config.account.clone().unwrap_or_default();
    let rows = [
        ("Account", account),
        ("Database", app.config.cortex.database.clone()),
        ("Schema", app.config.cortex.schema.clone()),
        ("Stage", app.config.cortex.stage.clone()),
        ("Semantic Model", app.config.cortex.semantic_model.clone()),
        ("Warehouse", app.config.warehouse.clone()),
        (
            "Authentication",
            app.config
                .auth_method()
                .map(|method| method.display_name().to_string())
                .unwrap_or_else(|err| err.to_string()),
        ),
    ]
    .into_iter()
    .map(|(k, v)| Row::new(vec![Cell::from(k), Cell::from(v)]));

    let table = Table::new(rows, [Constraint::Length(16), Constraint::Fill(1)])
        .header(Row::new(vec!["Setting", "Value"]).style(Style::default().fg(Color::Yellow).bold()))
        .block(pane_block(" Current Configuration ".to_string(), false));
    frame.render_widget(table, config_area);

    let check_text = match (&app.check_task, &app.check_status) {
        (Some(_), _) => Line::from(Span::styled(
            format!("Testing{}", ".".repeat(app.animation_frame as usize + 1)),
            Style::default().fg(Color::DarkGray),
        )),
        (None, Some(Ok(message))) => Line::from(Span::styled(message.clone(), Style::default().fg(Color::Green))),
        (None, Some(Err(message))) => Line::from(Span::styled(
            format!("Connection test failed: {}", message),
            Style::default().fg(Color::Red),
        )),
        (None, None) => Line::from(Span::styled(
            "Press t to send a greeting to Cortex Analyst",
            Style::default().fg(Color::Gray),
        )),
    };
    frame.render_widget(
        Paragraph::new(check_text)
            .block(pane_block(" Test Cortex Connection ".to_string(), false))
            .wrap(Wrap { trim: true }),
        check_area,
    );
}
