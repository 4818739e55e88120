// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use lensgrid_app::{
    AppCommand, AppMode, AppState, BandKind, Category, CategoryId, CellView, Cylinder,
    DEFAULT_CATEGORY, FetchError, FetchReply, FetchRequest, FetchTicket, GridCommand, GridError,
    GridEvent, GridMode, GridSession, LineTotal, RecordForm, RecordKind, RecordPayload, SphereId,
    format_form_date, format_hundredths, parse_form_date,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;

const SIDE_PANEL_WIDTH: u16 = 38;
const SPHERE_COLUMN_WIDTH: u16 = 8;
const CELL_COLUMN_WIDTH: u16 = 8;
const MAX_INPUT_LEN: usize = 16;
const MAX_PANEL_LINES: usize = 12;
const BONUS_LABEL: &str = "Bonificado";

/// Backend seam for the grid screen. `spawn_fetch` defaults to running the
/// fetch inline; runtimes with a real network override it with a thread.
pub trait GridRuntime {
    fn fetch(&mut self, request: FetchRequest) -> Result<FetchReply, FetchError>;
    fn list_categories(&mut self) -> Result<Vec<Category>>;
    fn submit_record(&mut self, kind: RecordKind, payload: &RecordPayload) -> Result<()>;
    fn spawn_fetch(&mut self, ticket: FetchTicket, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self.fetch(ticket.request);
        tx.send(InternalEvent::Fetch { ticket, result })
            .map_err(|_| anyhow::anyhow!("fetch event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    Fetch {
        ticket: FetchTicket,
        result: Result<FetchReply, FetchError>,
    },
}

/// Everything one screen owns: UI mode, the grid, and for record entry the
/// form the grid reports to. Read-only views carry no form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordScreen {
    pub state: AppState,
    pub session: GridSession,
    pub form: Option<RecordForm>,
}

impl RecordScreen {
    pub fn new(session: GridSession, form: RecordForm) -> Self {
        Self {
            state: AppState::default(),
            session,
            form: Some(form),
        }
    }

    pub fn viewer(session: GridSession) -> Self {
        Self {
            state: AppState::default(),
            session,
            form: None,
        }
    }

    fn apply_grid_events(&mut self, events: &[GridEvent]) {
        if let Some(form) = &mut self.form {
            form.apply_all(events);
        }
        self.state.observe_grid(events);
    }

    fn read_only(&self) -> bool {
        self.form.is_none() || self.session.mode().is_read_only()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    cursor_row: usize,
    cursor_col: usize,
    input: String,
    categories: Vec<Category>,
    help_visible: bool,
    status_token: u64,
}

pub fn run_app<R: GridRuntime>(screen: &mut RecordScreen, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();
    start_session(screen, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(screen, &mut view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, screen, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event
            && let Event::Key(key) = event::read().context("read event")?
            && handle_key_event(screen, runtime, &mut view_data, &internal_tx, key)
        {
            break;
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn start_session<R: GridRuntime>(
    screen: &mut RecordScreen,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    match runtime.list_categories() {
        Ok(categories) => view_data.categories = categories,
        Err(error) => {
            tracing::warn!(error = %format!("{error:#}"), "category list unavailable");
            emit_status(
                screen,
                view_data,
                tx,
                format!("categories unavailable: {error}"),
            );
        }
    }
    reload(screen, runtime, view_data, tx);
}

fn reload<R: GridRuntime>(
    screen: &mut RecordScreen,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    for ticket in screen.session.initial_requests() {
        dispatch_fetch(screen, runtime, view_data, tx, ticket);
    }
}

fn dispatch_fetch<R: GridRuntime>(
    screen: &mut RecordScreen,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    ticket: FetchTicket,
) {
    tracing::debug!(
        lane = ticket.lane().as_str(),
        generation = ticket.generation,
        "fetch issued"
    );
    if let Err(error) = runtime.spawn_fetch(ticket, tx.clone()) {
        emit_status(
            screen,
            view_data,
            tx,
            format!("could not start {} fetch: {error}", ticket.lane().as_str()),
        );
    }
}

fn process_internal_events(
    screen: &mut RecordScreen,
    view_data: &mut ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                screen.state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Fetch { ticket, result } => {
                let events = screen.session.complete_fetch(ticket, result);
                screen.apply_grid_events(&events);
                clamp_cursor(screen, view_data);
            }
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    screen: &mut RecordScreen,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    screen
        .state
        .dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn report_grid_error(
    screen: &mut RecordScreen,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    error: &GridError,
) {
    screen.state.report_grid_error(error);
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<R: GridRuntime>(
    screen: &mut RecordScreen,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('c') => return true,
            KeyCode::Char('s') => submit_record(screen, runtime, view_data, internal_tx),
            _ => {}
        }
        return false;
    }

    match screen.state.mode {
        AppMode::Nav => handle_nav_key(screen, runtime, view_data, internal_tx, key),
        AppMode::EditQuantity | AppMode::EditPrice | AppMode::EditDate => {
            handle_edit_key(screen, view_data, internal_tx, key);
            false
        }
    }
}

fn handle_nav_key<R: GridRuntime>(
    screen: &mut RecordScreen,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            view_data.help_visible = false;
        }
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => view_data.help_visible = true,
        KeyCode::Esc => {
            if screen.state.banner.is_some() {
                screen.state.dispatch(AppCommand::DismissBanner);
            }
        }
        KeyCode::Tab => run_grid_command(screen, view_data, internal_tx, GridCommand::NextBand),
        KeyCode::BackTab => {
            run_grid_command(screen, view_data, internal_tx, GridCommand::PrevBand);
        }
        KeyCode::F(number @ 1..=3) => {
            let index = usize::from(number - 1);
            run_grid_command(screen, view_data, internal_tx, GridCommand::SelectBand(index));
        }
        KeyCode::Left | KeyCode::Char('h') => move_cursor(screen, view_data, 0, -1),
        KeyCode::Right | KeyCode::Char('l') => move_cursor(screen, view_data, 0, 1),
        KeyCode::Up | KeyCode::Char('k') => move_cursor(screen, view_data, -1, 0),
        KeyCode::Down | KeyCode::Char('j') => move_cursor(screen, view_data, 1, 0),
        KeyCode::Char(ch) if ch.is_ascii_digit() => {
            begin_quantity_edit(screen, view_data, internal_tx, Some(ch));
        }
        KeyCode::Enter | KeyCode::Char('e') => {
            begin_quantity_edit(screen, view_data, internal_tx, None);
        }
        KeyCode::Char('x') | KeyCode::Delete => {
            view_data.input.clear();
            commit_quantity(screen, view_data, internal_tx);
        }
        KeyCode::Char('p') => begin_price_edit(screen, view_data, internal_tx),
        KeyCode::Char('b') => toggle_bonus(screen, view_data, internal_tx),
        KeyCode::Char('s') => {
            let ticket = screen.session.toggle_sign();
            view_data.cursor_row = 0;
            dispatch_fetch(screen, runtime, view_data, internal_tx, ticket);
        }
        KeyCode::Char('c') => cycle_category(screen, runtime, view_data, internal_tx),
        KeyCode::Char('r') => {
            reload(screen, runtime, view_data, internal_tx);
            emit_status(screen, view_data, internal_tx, "reloading");
        }
        KeyCode::Char('d') => match &screen.form {
            Some(form) => {
                view_data.input = form.date_input.clone();
                screen.state.dispatch(AppCommand::BeginDateEdit);
            }
            None => report_grid_error(screen, view_data, internal_tx, &GridError::ReadOnly),
        },
        _ => {}
    }
    false
}

fn run_grid_command(
    screen: &mut RecordScreen,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: GridCommand,
) {
    match screen.session.dispatch(command) {
        Ok(events) => {
            screen.apply_grid_events(&events);
            clamp_cursor(screen, view_data);
        }
        Err(error) => report_grid_error(screen, view_data, internal_tx, &error),
    }
}

fn handle_edit_key(
    screen: &mut RecordScreen,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            view_data.input.clear();
            screen.state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Enter => match screen.state.mode {
            AppMode::EditQuantity => commit_quantity(screen, view_data, internal_tx),
            AppMode::EditPrice => commit_price(screen, view_data, internal_tx),
            AppMode::EditDate => commit_date(screen, view_data, internal_tx),
            AppMode::Nav => {}
        },
        KeyCode::Backspace => {
            view_data.input.pop();
        }
        KeyCode::Char(ch) if view_data.input.chars().count() < MAX_INPUT_LEN => {
            view_data.input.push(ch);
        }
        _ => {}
    }
}

fn selected_cell(screen: &RecordScreen, view_data: &ViewData) -> Option<(SphereId, Cylinder)> {
    let sphere = screen.session.rows().get(view_data.cursor_row)?;
    let cylinder = screen.session.columns().get(view_data.cursor_col)?;
    Some((sphere.id, cylinder.clone()))
}

fn move_cursor(screen: &RecordScreen, view_data: &mut ViewData, rows: isize, cols: isize) {
    view_data.cursor_row = view_data.cursor_row.saturating_add_signed(rows);
    view_data.cursor_col = view_data.cursor_col.saturating_add_signed(cols);
    clamp_cursor(screen, view_data);
}

fn clamp_cursor(screen: &RecordScreen, view_data: &mut ViewData) {
    let rows = screen.session.rows().len();
    let cols = screen.session.columns().len();
    view_data.cursor_row = view_data.cursor_row.min(rows.saturating_sub(1));
    view_data.cursor_col = view_data.cursor_col.min(cols.saturating_sub(1));
}

fn begin_quantity_edit(
    screen: &mut RecordScreen,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    seed: Option<char>,
) {
    if screen.read_only() {
        report_grid_error(screen, view_data, internal_tx, &GridError::ReadOnly);
        return;
    }
    let Some((sph, cylinder)) = selected_cell(screen, view_data) else {
        emit_status(screen, view_data, internal_tx, "grid is still loading");
        return;
    };
    let view = screen.session.cell_view(sph, &cylinder);
    if !view.editable {
        report_grid_error(
            screen,
            view_data,
            internal_tx,
            &GridError::CellDisabled(view.key),
        );
        return;
    }

    view_data.input = match seed {
        Some(ch) => ch.to_string(),
        None if view.quantity > 0 => view.quantity.to_string(),
        None => String::new(),
    };
    screen.state.dispatch(AppCommand::BeginQuantityEdit);
}

fn begin_price_edit(
    screen: &mut RecordScreen,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if screen.read_only() {
        report_grid_error(screen, view_data, internal_tx, &GridError::ReadOnly);
        return;
    }
    if !screen.session.mode().is_priced() {
        report_grid_error(screen, view_data, internal_tx, &GridError::NotPriced);
        return;
    }
    let Some((sph, cylinder)) = selected_cell(screen, view_data) else {
        return;
    };
    let view = screen.session.cell_view(sph, &cylinder);
    if view.bonus {
        report_grid_error(
            screen,
            view_data,
            internal_tx,
            &GridError::BonusLocked(view.key),
        );
        return;
    }
    if !view.editable {
        report_grid_error(
            screen,
            view_data,
            internal_tx,
            &GridError::CellDisabled(view.key),
        );
        return;
    }

    view_data.input = view.unit_price.map(format_hundredths).unwrap_or_default();
    screen.state.dispatch(AppCommand::BeginPriceEdit);
}

fn commit_quantity(
    screen: &mut RecordScreen,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let raw = std::mem::take(&mut view_data.input);
    screen.state.dispatch(AppCommand::ExitToNav);
    let Some((sph, cylinder)) = selected_cell(screen, view_data) else {
        return;
    };
    let command = GridCommand::SetCell {
        sph,
        cyl: cylinder.id,
        raw,
    };
    match screen.session.dispatch(command) {
        Ok(events) => {
            screen.apply_grid_events(&events);
            let quantity = screen.session.cell_view(sph, &cylinder).quantity;
            let message = format!(
                "SPH {} / CYL {} = {quantity}",
                screen.session.sphere_label(sph),
                cylinder.value
            );
            emit_status(screen, view_data, internal_tx, message);
        }
        Err(error) => report_grid_error(screen, view_data, internal_tx, &error),
    }
}

fn commit_price(
    screen: &mut RecordScreen,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let raw = std::mem::take(&mut view_data.input);
    screen.state.dispatch(AppCommand::ExitToNav);
    let Some((sph, cylinder)) = selected_cell(screen, view_data) else {
        return;
    };
    let command = GridCommand::SetUnitPrice {
        sph,
        cyl: cylinder.id,
        raw,
    };
    run_grid_command(screen, view_data, internal_tx, command);
}

fn commit_date(
    screen: &mut RecordScreen,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let raw = std::mem::take(&mut view_data.input);
    screen.state.dispatch(AppCommand::ExitToNav);
    let value = if raw.trim().is_empty() {
        format_form_date(OffsetDateTime::now_utc())
    } else {
        raw.trim().to_owned()
    };
    let Some(form) = &mut screen.form else {
        return;
    };
    match parse_form_date(&value) {
        Ok(_) => {
            let message = format!("date {value}");
            form.date_input = value;
            emit_status(screen, view_data, internal_tx, message);
        }
        Err(error) => emit_status(screen, view_data, internal_tx, format!("{error:#}")),
    }
}

fn toggle_bonus(
    screen: &mut RecordScreen,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if screen.read_only() {
        report_grid_error(screen, view_data, internal_tx, &GridError::ReadOnly);
        return;
    }
    let Some((sph, cylinder)) = selected_cell(screen, view_data) else {
        return;
    };
    let bonus = !screen.session.cell_view(sph, &cylinder).bonus;
    let command = GridCommand::SetBonus {
        sph,
        cyl: cylinder.id,
        bonus,
    };
    run_grid_command(screen, view_data, internal_tx, command);
}

fn cycle_category<R: GridRuntime>(
    screen: &mut RecordScreen,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if screen.session.mode() == GridMode::RecordDetail {
        emit_status(screen, view_data, internal_tx, "a stored record keeps its material");
        return;
    }
    let current = screen.session.category().unwrap_or(DEFAULT_CATEGORY);
    let Some(next) = next_category(&view_data.categories, current) else {
        emit_status(screen, view_data, internal_tx, "no categories loaded");
        return;
    };
    let (events, ticket) = screen.session.select_category(next.id);
    screen.apply_grid_events(&events);
    emit_status(
        screen,
        view_data,
        internal_tx,
        format!("material: {}", next.name),
    );
    if let Some(ticket) = ticket {
        dispatch_fetch(screen, runtime, view_data, internal_tx, ticket);
    }
}

fn next_category(categories: &[Category], current: CategoryId) -> Option<Category> {
    if categories.is_empty() {
        return None;
    }
    let next = categories
        .iter()
        .position(|category| category.id == current)
        .map_or(0, |index| (index + 1) % categories.len());
    categories.get(next).cloned()
}

fn submit_record<R: GridRuntime>(
    screen: &mut RecordScreen,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(form) = &screen.form else {
        emit_status(screen, view_data, internal_tx, "read-only view; nothing to submit");
        return;
    };
    let kind = form.kind;
    let payload = match form.payload() {
        Ok(payload) => payload,
        Err(error) => {
            emit_status(
                screen,
                view_data,
                internal_tx,
                format!("cannot submit: {error}"),
            );
            return;
        }
    };

    match runtime.submit_record(kind, &payload) {
        Ok(()) => {
            let message = format!(
                "{} record submitted: {} lenses",
                kind.label(),
                payload.quantity
            );
            emit_status(screen, view_data, internal_tx, message);
        }
        Err(error) => {
            tracing::warn!(kind = kind.label(), error = %format!("{error:#}"), "submit failed");
            screen
                .state
                .dispatch(AppCommand::ShowBanner(format!("submit failed: {error:#}")));
        }
    }
}

fn band_style(kind: BandKind) -> Style {
    let background = match kind {
        BandKind::Low => Color::LightYellow,
        BandKind::Mid => Color::LightBlue,
        BandKind::High => Color::White,
    };
    Style::default().bg(background).fg(Color::Black)
}

fn cell_style(view: &CellView, selected: bool, dim_disabled: bool) -> Style {
    let mut style = band_style(view.color);
    if dim_disabled && !view.editable {
        style = style.fg(Color::DarkGray).add_modifier(Modifier::DIM);
    }
    if view.quantity > 0 {
        style = style.add_modifier(Modifier::BOLD);
    }
    if selected {
        style = style.add_modifier(Modifier::REVERSED);
    }
    style
}

fn cell_text(view: &CellView) -> String {
    let mut text = match view.available {
        Some(available) if view.quantity > 0 => format!("{}/{available}", view.quantity),
        Some(0) => "-".to_owned(),
        Some(available) => format!("({available})"),
        None if view.quantity > 0 => view.quantity.to_string(),
        None => "·".to_owned(),
    };
    if view.bonus {
        text.push('*');
    }
    text
}

fn format_money(cents: i64) -> String {
    format!("${}", format_hundredths(cents))
}

fn line_total_text(total: LineTotal) -> String {
    match total {
        LineTotal::Amount(cents) => format_money(cents),
        LineTotal::Bonus => BONUS_LABEL.to_owned(),
    }
}

/// Row range that keeps the cursor on screen for a table body of `height`.
fn visible_rows(total: usize, cursor: usize, height: usize) -> std::ops::Range<usize> {
    if height == 0 || total == 0 {
        return 0..0;
    }
    let start = cursor.saturating_add(1).saturating_sub(height);
    start..(start + height).min(total)
}

fn category_name(view_data: &ViewData, id: CategoryId) -> String {
    view_data
        .categories
        .iter()
        .find(|category| category.id == id)
        .map_or_else(|| format!("#{id}"), |category| category.name.clone())
}

fn screen_label(screen: &RecordScreen) -> String {
    if let Some(form) = &screen.form {
        return form.kind.label().to_owned();
    }
    match (screen.session.mode(), screen.session.record()) {
        (GridMode::RecordDetail, Some(id)) => format!("record #{id}"),
        (GridMode::RecordDetail, None) => "record".to_owned(),
        _ => "stock".to_owned(),
    }
}

fn tab_strip_title(screen: &RecordScreen) -> String {
    format!(
        "lensgrid · {} · SPH {}",
        screen_label(screen),
        screen.session.sign().symbol()
    )
}

fn render(frame: &mut ratatui::Frame<'_>, screen: &RecordScreen, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let band_titles = screen
        .session
        .bands()
        .iter()
        .map(|band| band.name.clone())
        .collect::<Vec<String>>();
    let tabs = Tabs::new(band_titles)
        .block(
            Block::default()
                .title(tab_strip_title(screen))
                .borders(Borders::ALL),
        )
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(screen.session.active_band_index());
    frame.render_widget(tabs, layout[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(SIDE_PANEL_WIDTH)])
        .split(layout[1]);

    let grid_area = match &screen.state.banner {
        Some(banner) => {
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Min(1)])
                .split(body[0]);
            let widget = Paragraph::new(banner.clone())
                .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
                .wrap(Wrap { trim: true })
                .block(Block::default().borders(Borders::ALL).title("error"));
            frame.render_widget(widget, parts[0]);
            parts[1]
        }
        None => body[0],
    };
    render_grid(frame, grid_area, screen, view_data);

    let panel_title = if screen.form.is_some() { "record" } else { "view" };
    let panel = Paragraph::new(side_panel_text(screen, view_data))
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(panel_title));
    frame.render_widget(panel, body[1]);

    let status = Paragraph::new(status_text(screen, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if view_data.help_visible {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_grid(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    screen: &RecordScreen,
    view_data: &ViewData,
) {
    let session = &screen.session;
    let dim_disabled = !screen.read_only();
    let title = session
        .active_band()
        .map_or_else(|| "no cylinders loaded".to_owned(), |band| band.name.clone());
    let columns = session.columns();
    let rows = session.rows();
    if columns.is_empty() || rows.is_empty() {
        let empty = Paragraph::new("waiting for grid data -- press r to reload")
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(empty, area);
        return;
    }

    let mut widths = vec![Constraint::Length(SPHERE_COLUMN_WIDTH)];
    widths.extend(columns.iter().map(|_| Constraint::Length(CELL_COLUMN_WIDTH)));

    let header_style = Style::default()
        .fg(Color::White)
        .add_modifier(Modifier::BOLD);
    let mut header = vec![Cell::from("SPH\\CYL").style(header_style)];
    header.extend(
        columns
            .iter()
            .map(|cylinder| Cell::from(cylinder.value.clone()).style(header_style)),
    );

    let body_height = usize::from(area.height.saturating_sub(3));
    let window = visible_rows(rows.len(), view_data.cursor_row, body_height);
    let table_rows = rows[window.clone()]
        .iter()
        .enumerate()
        .map(|(offset, sphere)| {
            let row_index = window.start + offset;
            let mut cells = vec![Cell::from(sphere.display_value()).style(header_style)];
            cells.extend(columns.iter().enumerate().map(|(col_index, cylinder)| {
                let view = session.cell_view(sphere.id, cylinder);
                let selected =
                    row_index == view_data.cursor_row && col_index == view_data.cursor_col;
                Cell::from(cell_text(&view)).style(cell_style(&view, selected, dim_disabled))
            }));
            Row::new(cells)
        })
        .collect::<Vec<Row>>();

    let table = Table::new(table_rows, widths)
        .header(Row::new(header))
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(table, area);
}

fn side_panel_text(screen: &RecordScreen, view_data: &ViewData) -> String {
    let Some(form) = &screen.form else {
        return view_panel_text(screen, view_data);
    };
    let session = &screen.session;
    let date = if form.date_input.is_empty() {
        "(unset, press d)".to_owned()
    } else {
        form.date_input.clone()
    };

    let mut lines = vec![
        format!("client: {} (#{})", form.client_name, form.client_id),
        format!("record: {}", form.kind.label()),
        format!("material: {}", category_name(view_data, form.category_id)),
        format!("date: {date}"),
        format!(
            "user: {} ({})",
            form.identity.full_name,
            form.identity.role.as_str()
        ),
        String::new(),
        format!("lenses: {}", form.total_quantity()),
    ];
    if session.mode().checks_stock() {
        let available = session
            .stock()
            .map_or_else(|| "loading".to_owned(), |stock| stock.total_quantity.to_string());
        lines.push(format!("available: {available}"));
    }
    if session.mode().is_priced() {
        lines.push(format!("total: {}", format_money(form.total_price())));
    }

    if let Some((sph, cylinder)) = selected_cell(screen, view_data) {
        let view = session.cell_view(sph, &cylinder);
        lines.push(String::new());
        lines.extend(selected_cell_lines(session, sph, &cylinder, &view));
        if session.mode().is_priced() {
            let price = if view.bonus {
                BONUS_LABEL.to_owned()
            } else {
                format_money(view.unit_price.unwrap_or(0))
            };
            lines.push(format!("price: {price}"));
        }
    }

    if session.mode().is_priced() {
        let priced_lines = session.lines();
        if !priced_lines.is_empty() {
            lines.push(String::new());
            for (key, cell) in priced_lines.iter().take(MAX_PANEL_LINES) {
                let total = cell
                    .line_total()
                    .map(line_total_text)
                    .unwrap_or_default();
                lines.push(format!(
                    "{} x {}: {} = {total}",
                    session.sphere_label(key.sph),
                    session.cylinder_label(key.cyl),
                    cell.quantity()
                ));
            }
            if priced_lines.len() > MAX_PANEL_LINES {
                lines.push(format!("+{} more", priced_lines.len() - MAX_PANEL_LINES));
            }
        }
    }

    lines.join("\n")
}

fn selected_cell_lines(
    session: &GridSession,
    sph: SphereId,
    cylinder: &Cylinder,
    view: &CellView,
) -> Vec<String> {
    let mut detail = format!("qty: {}", view.quantity);
    if let Some(available) = view.available {
        detail.push_str(&format!("  available: {available}"));
    }
    vec![
        format!("SPH {} / CYL {}", session.sphere_label(sph), cylinder.value),
        detail,
    ]
}

fn view_panel_text(screen: &RecordScreen, view_data: &ViewData) -> String {
    let session = &screen.session;
    let mut lines = match session.detail() {
        Some(detail) => vec![
            format!("record #{} ({})", detail.id, detail.kind),
            format!("date: {}", detail.date),
            format!("client: {}", detail.client.full_name),
            format!("address: {}", detail.client.address),
            format!("user: {} ({})", detail.user.full_name, detail.user.role),
            format!("material: {}", detail.category.name),
            String::new(),
            format!("lenses: {}", detail.quantity),
        ],
        None if session.mode() == GridMode::RecordDetail => {
            vec!["record: loading".to_owned()]
        }
        None => {
            let material = session
                .category()
                .map_or_else(|| "none".to_owned(), |id| category_name(view_data, id));
            let total = session
                .stock()
                .map_or_else(|| "loading".to_owned(), |stock| stock.total_quantity.to_string());
            vec![
                "stock overview".to_owned(),
                format!("material: {material}"),
                String::new(),
                format!("in stock: {total}"),
            ]
        }
    };
    lines.push(format!(
        "SPH {}: {}",
        session.sign().symbol(),
        session.derive_total_quantity()
    ));

    if let Some((sph, cylinder)) = selected_cell(screen, view_data) {
        let view = session.cell_view(sph, &cylinder);
        lines.push(String::new());
        lines.extend(selected_cell_lines(session, sph, &cylinder, &view));
    }
    lines.join("\n")
}

fn status_text(screen: &RecordScreen, view_data: &ViewData) -> String {
    let state = &screen.state;
    let nav_hints = if screen.read_only() {
        "hjkl move | tab/F1-F3 band | s sign | c material | r reload | ? help | q quit"
    } else {
        "hjkl move | tab/F1-F3 band | 0-9 qty | p price | b bonus | s sign | c material | d date | ctrl+s submit | ? help | q quit"
    };
    let (mode, hints) = match state.mode {
        AppMode::Nav => ("NAV", nav_hints),
        AppMode::EditQuantity => ("QTY", "enter save | esc cancel"),
        AppMode::EditPrice => ("PRICE", "enter save | empty = 0 | esc cancel"),
        AppMode::EditDate => ("DATE", "YYYY-MM-DDTHH:MM | empty = now | enter save | esc cancel"),
    };
    let mut out = mode.to_owned();
    if state.mode != AppMode::Nav {
        out.push_str(&format!(" > {}_", view_data.input));
    }
    if let Some(status) = &state.status_line {
        out.push_str(&format!(" | {status}"));
    }
    out.push_str(&format!(" | {hints}"));
    out
}

fn help_overlay_text() -> &'static str {
    "grid: h/j/k/l or arrows move | tab/shift+tab or F1-F3 cylinder band\n\
cells: 0-9 or enter edit quantity | x clear | non-numbers count as 0\n\
sales: p unit price | b toggle bonus (price fixed at 0)\n\
data: s toggle sphere sign | c next material | r reload\n\
record: d date (empty = now) | ctrl+s submit\n\
views: --view stock and --view record <id> are read-only\n\
global: esc dismiss error | ? help | q or ctrl+q quit"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
