use crate::{
    app::{App, OpKind, PendingAction},
    config,
    hardware::{self, GameProfile},
    logger::ExportMode,
    wow::Version,
    wtf::Preset,
};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use std::{io, time::Duration};

#[derive(Clone)]
struct Theme {
    accent: Color,
    border: Color,
    text: Color,
    muted: Color,
    success: Color,
    warning: Color,
    error: Color,
    header_bg: Color,
}

impl Theme {
    fn from_name(name: &str) -> Self {
        match name {
            "light" => Self {
                accent: Color::Rgb(30, 90, 170),
                border: Color::Rgb(150, 155, 165),
                text: Color::Rgb(30, 35, 40),
                muted: Color::Rgb(110, 115, 125),
                success: Color::Rgb(30, 130, 60),
                warning: Color::Rgb(160, 120, 20),
                error: Color::Rgb(170, 40, 40),
                header_bg: Color::Rgb(230, 233, 238),
            },
            _ => Self {
                accent: Color::Rgb(120, 190, 255),
                border: Color::Rgb(65, 75, 90),
                text: Color::Rgb(220, 230, 240),
                muted: Color::Rgb(135, 145, 155),
                success: Color::Rgb(120, 220, 140),
                warning: Color::Rgb(230, 200, 120),
                error: Color::Rgb(235, 100, 95),
                header_bg: Color::Rgb(22, 28, 36),
            },
        }
    }

    fn block(&self, title: &'static str) -> Block<'static> {
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(self.border))
            .title(Span::styled(
                title,
                Style::default().fg(self.accent).add_modifier(Modifier::BOLD),
            ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Backups,
    Folders,
    AddOns,
    Optimize,
    Log,
}

const TABS: &[(Tab, &str)] = &[
    (Tab::Backups, "1 Backups"),
    (Tab::Folders, "2 Folders"),
    (Tab::AddOns, "3 AddOns"),
    (Tab::Optimize, "4 Optimize"),
    (Tab::Log, "5 Log"),
];

impl Tab {
    fn op(self) -> Option<OpKind> {
        match self {
            Tab::Backups => Some(OpKind::Stale),
            Tab::Folders => Some(OpKind::Folders),
            Tab::AddOns => Some(OpKind::Orphans),
            Tab::Optimize | Tab::Log => None,
        }
    }

    fn index(self) -> usize {
        TABS.iter().position(|(tab, _)| *tab == self).unwrap_or(0)
    }
}

enum RowRef {
    Header(usize),
    Item(usize, usize),
}

struct UiState {
    tab: Tab,
    cursors: [usize; 3],
    optimize_versions: Vec<Version>,
    optimize_cursor: usize,
    chosen_preset: Option<Preset>,
}

impl UiState {
    fn new() -> Self {
        Self {
            tab: Tab::Backups,
            cursors: [0; 3],
            optimize_versions: Vec::new(),
            optimize_cursor: 0,
            chosen_preset: None,
        }
    }

    fn cursor(&mut self, tab: Tab) -> &mut usize {
        let slot = match tab {
            Tab::Backups => 0,
            Tab::Folders => 1,
            _ => 2,
        };
        &mut self.cursors[slot]
    }
}

pub fn run(app: &mut App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_loop(terminal: &mut Terminal<impl Backend>, app: &mut App) -> Result<()> {
    let mut state = UiState::new();
    app.start_update_check();
    if app.root().is_some() {
        app.start_scan(OpKind::Stale);
    }

    loop {
        app.tick();
        clamp_cursor(app, &mut state);
        terminal.draw(|frame| draw(frame, app, &mut state))?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                handle_key(app, &mut state, key);
            }
        }
    }

    Ok(())
}

fn flatten(app: &App, op: OpKind) -> Vec<RowRef> {
    let mut rows = Vec::new();
    for (group_idx, group) in app.pane(op).groups.iter().enumerate() {
        rows.push(RowRef::Header(group_idx));
        for item_idx in 0..group.items.len() {
            rows.push(RowRef::Item(group_idx, item_idx));
        }
    }
    rows
}

fn clamp_cursor(app: &App, state: &mut UiState) {
    if let Some(op) = state.tab.op() {
        let rows = flatten(app, op);
        let cursor = state.cursor(state.tab);
        if rows.is_empty() {
            *cursor = 0;
        } else {
            if *cursor >= rows.len() {
                *cursor = rows.len() - 1;
            }
            // Never rest on a group header.
            if matches!(rows[*cursor], RowRef::Header(_)) {
                let below = rows
                    .iter()
                    .enumerate()
                    .skip(*cursor)
                    .find(|(_, row)| matches!(row, RowRef::Item(..)))
                    .map(|(idx, _)| idx);
                let above = rows
                    .iter()
                    .enumerate()
                    .take(*cursor)
                    .rev()
                    .find(|(_, row)| matches!(row, RowRef::Item(..)))
                    .map(|(idx, _)| idx);
                if let Some(idx) = below.or(above) {
                    *cursor = idx;
                }
            }
        }
    }
    if state.optimize_cursor >= state.optimize_versions.len() {
        state.optimize_cursor = state.optimize_versions.len().saturating_sub(1);
    }
}

fn refresh_optimize(app: &mut App, state: &mut UiState) {
    state.optimize_versions = app.complete_versions().unwrap_or_default();
}

fn handle_key(app: &mut App, state: &mut UiState, key: KeyEvent) {
    if app.pending.is_some() {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.confirm_pending(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.cancel_pending(),
            _ => {}
        }
        return;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
            app.should_quit = true;
            return;
        }
        (KeyCode::Char(digit @ '1'..='5'), _) => {
            let idx = digit as usize - '1' as usize;
            state.tab = TABS[idx].0;
            if state.tab == Tab::Optimize {
                refresh_optimize(app, state);
            }
            return;
        }
        (KeyCode::Tab, _) => {
            let next = (state.tab.index() + 1) % TABS.len();
            state.tab = TABS[next].0;
            if state.tab == Tab::Optimize {
                refresh_optimize(app, state);
            }
            return;
        }
        (KeyCode::Char('v'), _) => {
            let verbose = !app.global.verbose;
            app.set_verbose(verbose);
            app.status = format!("Verbose logging {}", if verbose { "on" } else { "off" });
            return;
        }
        (KeyCode::Char('e'), _) => {
            if let Some(path) = config::default_log_path() {
                let mode = if app.ui_config.last_export_append {
                    ExportMode::Append
                } else {
                    ExportMode::Fresh
                };
                match app.export_log(&path, mode) {
                    Ok(()) => app.status = format!("Log exported to {}", path.display()),
                    Err(err) => app.status = format!("Log export failed: {err}"),
                }
            }
            return;
        }
        _ => {}
    }

    match state.tab {
        Tab::Backups | Tab::Folders | Tab::AddOns => {
            let op = state.tab.op().expect("op tab");
            handle_op_key(app, state, op, key);
        }
        Tab::Optimize => handle_optimize_key(app, state, key),
        Tab::Log => {}
    }
}

fn handle_op_key(app: &mut App, state: &mut UiState, op: OpKind, key: KeyEvent) {
    let rows = flatten(app, op);
    let cursor = *state.cursor(state.tab);

    match key.code {
        KeyCode::Down | KeyCode::Char('j') => {
            let mut next = cursor;
            while next + 1 < rows.len() {
                next += 1;
                if matches!(rows[next], RowRef::Item(..)) {
                    *state.cursor(state.tab) = next;
                    break;
                }
            }
        }
        KeyCode::Up | KeyCode::Char('k') => {
            let mut prev = cursor;
            while prev > 0 {
                prev -= 1;
                if matches!(rows[prev], RowRef::Item(..)) {
                    *state.cursor(state.tab) = prev;
                    break;
                }
            }
        }
        KeyCode::Char(' ') => {
            if let Some(RowRef::Item(group_idx, item_idx)) = rows.get(cursor) {
                let pane = app.pane_mut(op);
                let item = &mut pane.groups[*group_idx].items[*item_idx];
                item.selected = !item.selected;
            }
        }
        KeyCode::Char('a') => {
            for group in &mut app.pane_mut(op).groups {
                for item in &mut group.items {
                    item.selected = true;
                }
            }
        }
        KeyCode::Char('n') => {
            for group in &mut app.pane_mut(op).groups {
                for item in &mut group.items {
                    item.selected = false;
                }
            }
        }
        KeyCode::Char('s') => app.start_scan(op),
        KeyCode::Char('m') if op == OpKind::Orphans => app.request_manifest_rebuild(),
        KeyCode::Enter => app.request_delete(op),
        _ => {}
    }
}

fn handle_optimize_key(app: &mut App, state: &mut UiState, key: KeyEvent) {
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => {
            if state.optimize_cursor + 1 < state.optimize_versions.len() {
                state.optimize_cursor += 1;
            }
        }
        KeyCode::Up | KeyCode::Char('k') => {
            state.optimize_cursor = state.optimize_cursor.saturating_sub(1);
        }
        KeyCode::Char('s') => refresh_optimize(app, state),
        KeyCode::Char('h') => {
            app.status = "Probing hardware...".to_string();
            app.start_hardware_probe();
        }
        KeyCode::Char('u') => {
            app.status = "Checking for updates...".to_string();
            app.start_update_check();
        }
        KeyCode::Char('l') => state.chosen_preset = Some(Preset::Low),
        KeyCode::Char('d') => state.chosen_preset = Some(Preset::Medium),
        KeyCode::Char('g') => state.chosen_preset = Some(Preset::High),
        KeyCode::Char('x') => state.chosen_preset = Some(Preset::Ultra),
        KeyCode::Char('c') => state.chosen_preset = None,
        KeyCode::Enter => {
            let Some(version) = state.optimize_versions.get(state.optimize_cursor).cloned()
            else {
                app.status = "No complete version selected".to_string();
                return;
            };
            let preset = state
                .chosen_preset
                .unwrap_or_else(|| app.suggested_preset_for(&version));
            app.request_preset(version, preset);
        }
        _ => {}
    }
}

fn draw(frame: &mut Frame<'_>, app: &App, state: &mut UiState) {
    let theme = Theme::from_name(&app.ui_config.theme);
    let area = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(area);

    draw_header(frame, app, state, &theme, chunks[0]);

    match state.tab {
        Tab::Backups | Tab::Folders | Tab::AddOns => {
            let op = state.tab.op().expect("op tab");
            draw_op_pane(frame, app, state, op, &theme, chunks[1]);
        }
        Tab::Optimize => draw_optimize(frame, app, state, &theme, chunks[1]),
        Tab::Log => draw_log(frame, app, &theme, chunks[1]),
    }

    draw_footer(frame, app, state, &theme, chunks[2]);

    if app.pending.is_some() {
        draw_dialog(frame, app, &theme, area);
    }
}

fn draw_header(frame: &mut Frame<'_>, app: &App, state: &UiState, theme: &Theme, area: Rect) {
    let root_label = app
        .root()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "no install root (pass --root or edit global.json)".to_string());

    let mut tab_spans: Vec<Span> = vec![Span::styled(
        "RuneKeeper",
        Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
    )];
    tab_spans.push(Span::raw("   "));
    for (tab, label) in TABS {
        let style = if *tab == state.tab {
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.muted)
        };
        tab_spans.push(Span::styled(*label, style));
        tab_spans.push(Span::raw("  "));
    }

    let header = Paragraph::new(vec![
        Line::from(tab_spans),
        Line::from(vec![
            Span::styled("Root: ", Style::default().fg(theme.muted)),
            Span::styled(root_label, Style::default().fg(theme.text)),
        ]),
    ])
    .style(Style::default().bg(theme.header_bg));
    frame.render_widget(header, area);
}

fn draw_op_pane(
    frame: &mut Frame<'_>,
    app: &App,
    state: &mut UiState,
    op: OpKind,
    theme: &Theme,
    area: Rect,
) {
    let pane = app.pane(op);
    let rows = flatten(app, op);
    let cursor = *state.cursor(state.tab);

    let title = match op {
        OpKind::Stale => "Stale Backups (.bak / .old)",
        OpKind::Folders => "Regenerable Folders & Screenshots",
        OpKind::Orphans => "Orphan SavedVariables",
        OpKind::Optimize => "",
    };

    let mut items: Vec<ListItem> = Vec::new();
    for row in &rows {
        match row {
            RowRef::Header(group_idx) => {
                let group = &pane.groups[*group_idx];
                items.push(ListItem::new(Line::from(Span::styled(
                    format!("{} ({})", group.version_label, group.items.len()),
                    Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
                ))));
            }
            RowRef::Item(group_idx, item_idx) => {
                let item = &pane.groups[*group_idx].items[*item_idx];
                let mark = if item.selected { "[x]" } else { "[ ]" };
                items.push(ListItem::new(Line::from(vec![
                    Span::styled(format!("  {mark} "), Style::default().fg(theme.success)),
                    Span::styled(item.label.clone(), Style::default().fg(theme.text)),
                ])));
            }
        }
    }

    if items.is_empty() {
        let message = if pane.scanning {
            "Scanning..."
        } else {
            "Nothing found. Press s to scan."
        };
        let empty = Paragraph::new(message)
            .style(Style::default().fg(theme.muted))
            .block(theme.block(title));
        frame.render_widget(empty, area);
        return;
    }

    let mut list_state = ListState::default();
    list_state.select(Some(cursor));
    let list = List::new(items)
        .block(theme.block(title))
        .highlight_style(
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn draw_optimize(frame: &mut Frame<'_>, app: &App, state: &UiState, theme: &Theme, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(4)])
        .split(area);

    let hw_lines: Vec<Line> = match &app.global.hardware {
        Some(hw) => {
            let mut lines = vec![
                Line::from(vec![
                    Span::styled("CPU:  ", Style::default().fg(theme.muted)),
                    Span::styled(
                        format!(
                            "{} ({} cores / {} threads)",
                            hw.cpu_name, hw.cpu_cores, hw.cpu_threads
                        ),
                        Style::default().fg(theme.text),
                    ),
                ]),
                Line::from(vec![
                    Span::styled("RAM:  ", Style::default().fg(theme.muted)),
                    Span::styled(format!("{:.1} GiB", hw.ram_gb), Style::default().fg(theme.text)),
                ]),
            ];
            for gpu in &hw.gpus {
                lines.push(Line::from(vec![
                    Span::styled("GPU:  ", Style::default().fg(theme.muted)),
                    Span::styled(gpu.clone(), Style::default().fg(theme.text)),
                ]));
            }
            lines
        }
        None => vec![Line::from(Span::styled(
            "No hardware profile yet. Press h to probe.",
            Style::default().fg(theme.muted),
        ))],
    };
    let hardware_block = Paragraph::new(hw_lines)
        .wrap(Wrap { trim: true })
        .block(theme.block("Hardware"));
    frame.render_widget(hardware_block, chunks[0]);

    let mut rows: Vec<ListItem> = Vec::new();
    let hardware_profile = app.global.hardware.clone();
    for (idx, version) in state.optimize_versions.iter().enumerate() {
        let (tier_label, suggested) = match &hardware_profile {
            Some(hw) => {
                let tiers = hardware::classify(hw, GameProfile::for_version(version));
                (
                    tiers.overall.label(),
                    hardware::suggested_preset(tiers.overall).label(),
                )
            }
            None => ("?", "?"),
        };
        let marker = if idx == state.optimize_cursor { "> " } else { "  " };
        let chosen = state
            .chosen_preset
            .map(Preset::label)
            .unwrap_or(suggested);
        rows.push(ListItem::new(Line::from(vec![
            Span::styled(marker.to_string(), Style::default().fg(theme.accent)),
            Span::styled(
                format!("{:<16}", version.label()),
                Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("tier {tier_label}  ->  preset {chosen}"),
                Style::default().fg(theme.success),
            ),
        ])));
    }
    if rows.is_empty() {
        rows.push(ListItem::new(Span::styled(
            "No complete versions. Launch the game once per install.",
            Style::default().fg(theme.warning),
        )));
    }
    let list = List::new(rows).block(theme.block(
        "Installs  (l/d/g/x pick Low/Medium/High/Ultra, c auto, Enter apply)",
    ));
    frame.render_widget(list, chunks[1]);
}

fn draw_log(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let visible = area.height.saturating_sub(2) as usize;
    let lines = app.logger.lines();
    let start = lines.len().saturating_sub(visible);
    let items: Vec<Line> = lines[start..]
        .iter()
        .map(|line| Line::from(Span::styled(line.clone(), Style::default().fg(theme.text))))
        .collect();
    let log = Paragraph::new(items).block(theme.block("Log"));
    frame.render_widget(log, area);
}

fn draw_footer(frame: &mut Frame<'_>, app: &App, state: &UiState, theme: &Theme, area: Rect) {
    let keys = match state.tab {
        Tab::Backups | Tab::Folders => "space mark  a all  n none  s scan  Enter delete",
        Tab::AddOns => "space mark  a all  n none  s scan  m rebuild manifests  Enter delete",
        Tab::Optimize => "h probe  u update  s refresh  Enter apply preset",
        Tab::Log => "v verbose  e export",
    };
    let footer = Paragraph::new(vec![
        Line::from(Span::styled(
            app.status.clone(),
            Style::default().fg(theme.warning),
        )),
        Line::from(Span::styled(
            format!("{keys}  |  1-5 tabs  v verbose  e export log  q quit"),
            Style::default().fg(theme.muted),
        )),
    ])
    .block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(theme.border)),
    );
    frame.render_widget(footer, area);
}

fn draw_dialog(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let message = match &app.pending {
        Some(PendingAction::Delete { op, paths, mode }) => format!(
            "Delete {} {} item(s) in {} mode?",
            paths.len(),
            op.label(),
            mode.label()
        ),
        Some(PendingAction::ApplyPreset { version, preset }) => format!(
            "Apply the {} preset to {} ({} setting(s))? A Config.wtf.bak backup is written first.",
            preset.label(),
            version.label(),
            preset.assignments().len()
        ),
        Some(PendingAction::RebuildManifests { versions }) => format!(
            "Rebuild AddOns.txt manifests for {} version(s)?",
            versions.len()
        ),
        None => return,
    };

    let width = area.width.clamp(20, 64);
    let height = 7;
    let dialog_area = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    };

    frame.render_widget(Clear, dialog_area);
    let body = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(message, Style::default().fg(theme.text))),
        Line::from(""),
        Line::from(vec![
            Span::styled("[y] confirm   ", Style::default().fg(theme.success)),
            Span::styled("[n] cancel", Style::default().fg(theme.error)),
        ]),
    ])
    .wrap(Wrap { trim: true })
    .alignment(Alignment::Center)
    .block(theme.block("Confirm"));
    frame.render_widget(body, dialog_area);
}
