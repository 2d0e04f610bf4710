use crate::db::{
    delete_submission, get_all_submissions, get_recent_events, get_submission_stats, Event,
    Submission, SubmissionStats,
};
use crate::numerology::{BirthChart, CellStatus, Gender};
use anyhow::Result;
use crossterm::{
    event::{self, Event as TermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use rusqlite::Connection;
use std::io::{self, Write};

const RECENT_EVENTS: usize = 200;
const PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Records,
    Aggregates,
    Events,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Records => Page::Aggregates,
            Page::Aggregates => Page::Events,
            Page::Events => Page::Records,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Records => Page::Events,
            Page::Aggregates => Page::Records,
            Page::Events => Page::Aggregates,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Records => "Records",
            Page::Aggregates => "Aggregates",
            Page::Events => "Audit Log",
        }
    }
}

pub struct App {
    pub submissions: Vec<Submission>,
    pub stats: SubmissionStats,
    pub events: Vec<Event>,
    pub state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    pub gender_filter: Option<Gender>,
    /// Phone number waiting for a y/n answer
    pub pending_delete: Option<String>,
    pub status_message: Option<String>,
    pub actor: String,
}

impl App {
    pub fn new(
        submissions: Vec<Submission>,
        stats: SubmissionStats,
        events: Vec<Event>,
        actor: &str,
    ) -> Self {
        let mut state = TableState::default();
        if !submissions.is_empty() {
            state.select(Some(0));
        }

        Self {
            submissions,
            stats,
            events,
            state,
            current_page: Page::Records,
            show_detail: false,
            gender_filter: None,
            pending_delete: None,
            status_message: None,
            actor: actor.to_string(),
        }
    }

    pub fn load(conn: &Connection, actor: &str) -> Result<Self> {
        Ok(Self::new(
            get_all_submissions(conn)?,
            get_submission_stats(conn)?,
            get_recent_events(conn, RECENT_EVENTS)?,
            actor,
        ))
    }

    /// Re-read everything from the database, keeping the selection in range
    pub fn reload(&mut self, conn: &Connection) -> Result<()> {
        self.submissions = get_all_submissions(conn)?;
        self.stats = get_submission_stats(conn)?;
        self.events = get_recent_events(conn, RECENT_EVENTS)?;
        self.clamp_selection();
        Ok(())
    }

    pub fn visible_submissions(&self) -> Vec<&Submission> {
        self.submissions
            .iter()
            .filter(|s| match self.gender_filter {
                Some(g) => s.gender == g.as_str(),
                None => true,
            })
            .collect()
    }

    pub fn selected_submission(&self) -> Option<&Submission> {
        self.state
            .selected()
            .and_then(|i| self.visible_submissions().get(i).copied())
    }

    /// Chart rebuilt from the stored row, for the detail panel
    pub fn selected_chart(&self) -> Option<BirthChart> {
        let record = self.selected_submission()?.to_record()?;
        BirthChart::compute(&record).ok()
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    /// Cycle All → Male → Female → NA → All
    pub fn cycle_gender_filter(&mut self) {
        self.gender_filter = match self.gender_filter {
            None => Some(Gender::Male),
            Some(Gender::Male) => Some(Gender::Female),
            Some(Gender::Female) => Some(Gender::Unspecified),
            Some(Gender::Unspecified) => None,
        };
        self.reset_selection();
    }

    pub fn clear_filter(&mut self) {
        self.gender_filter = None;
        self.reset_selection();
    }

    fn reset_selection(&mut self) {
        if self.visible_submissions().is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_submissions().len();
        match self.state.selected() {
            _ if len == 0 => self.state.select(None),
            Some(i) if i >= len => self.state.select(Some(len - 1)),
            None => self.state.select(Some(0)),
            _ => {}
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn next(&mut self) {
        let len = self.visible_submissions().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible_submissions().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) => len - 1,
            Some(i) => i - 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.visible_submissions().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => (i + PAGE_SIZE).min(len - 1),
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = self.state.selected().map(|i| i.saturating_sub(PAGE_SIZE)).unwrap_or(0);
        self.state.select(Some(i));
    }

    /// Ask for confirmation before deleting the selected record
    pub fn request_delete(&mut self) {
        if self.current_page != Page::Records {
            return;
        }
        if let Some(phone) = self.selected_submission().map(|s| s.phone_number.clone()) {
            self.status_message = Some(format!("Delete {}? (y/n)", phone));
            self.pending_delete = Some(phone);
        }
    }

    pub fn cancel_delete(&mut self) {
        if self.pending_delete.take().is_some() {
            self.status_message = Some("Delete cancelled".to_string());
        }
    }

    /// Delete the pending record and reload. Returns whether a row was removed.
    pub fn confirm_delete(&mut self, conn: &Connection) -> Result<bool> {
        let Some(phone) = self.pending_delete.take() else {
            return Ok(false);
        };

        let deleted = delete_submission(conn, &phone, &self.actor)?;
        self.status_message = Some(if deleted {
            format!("Deleted {}", phone)
        } else {
            format!("{} was already gone", phone)
        });
        self.reload(conn)?;
        Ok(deleted)
    }
}

pub fn run_ui(app: &mut App, conn: &Connection) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app, conn);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    conn: &Connection,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        let TermEvent::Key(key) = event::read()? else {
            continue;
        };

        if app.pending_delete.is_some() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    if let Err(e) = app.confirm_delete(conn) {
                        app.status_message = Some(format!("Delete failed: {}", e));
                    }
                }
                _ => app.cancel_delete(),
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
            KeyCode::Enter => app.toggle_detail(),
            KeyCode::Tab => app.next_page(),
            KeyCode::BackTab => app.previous_page(),
            KeyCode::Char('d') => app.request_delete(),
            KeyCode::Char('f') => app.cycle_gender_filter(),
            KeyCode::Char('c') => app.clear_filter(),
            KeyCode::Char('r') => {
                app.status_message = Some(match app.reload(conn) {
                    Ok(()) => "Reloaded".to_string(),
                    Err(e) => format!("Reload failed: {}", e),
                });
            }
            KeyCode::Down | KeyCode::Char('j') => app.next(),
            KeyCode::Up | KeyCode::Char('k') => app.previous(),
            KeyCode::PageDown => app.page_down(),
            KeyCode::PageUp => app.page_up(),
            KeyCode::Home => app.state.select(Some(0)),
            KeyCode::End => {
                let len = app.visible_submissions().len();
                if len > 0 {
                    app.state.select(Some(len - 1));
                }
            }
            _ => {}
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Records {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_records(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Records => render_records(f, chunks[1], app),
            Page::Aggregates => render_aggregates(f, chunks[1], app),
            Page::Events => render_events(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Records, Page::Aggregates, Page::Events];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Submissions: {}", app.stats.total),
        Style::default().fg(Color::White),
    ));
    if let Some(g) = app.gender_filter {
        tab_spans.push(Span::raw("  |  "));
        tab_spans.push(Span::styled(
            format!("Filter: {}", g),
            Style::default().fg(Color::Magenta),
        ));
    }

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Birth Chart Admin "),
    );

    f.render_widget(header, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn render_records(f: &mut Frame, area: Rect, app: &mut App) {
    let header = header_row(&["Name", "DOB", "Gender", "Phone", "Drv", "Cnd", "Kuaa", "Chaldean", "Updated"]);

    let rows: Vec<Row> = app
        .visible_submissions()
        .into_iter()
        .map(|s| {
            let color = match s.gender.as_str() {
                "Male" => Color::Cyan,
                "Female" => Color::Magenta,
                _ => Color::White,
            };

            Row::new(vec![
                Cell::from(truncate(&s.full_name(), 24)),
                Cell::from(s.dob.clone()),
                Cell::from(s.gender.clone()).style(Style::default().fg(color)),
                Cell::from(s.phone_number.clone()),
                Cell::from(s.driver.to_string()),
                Cell::from(s.conductor.to_string()),
                Cell::from(s.kuaa.map(|k| k.to_string()).unwrap_or_else(|| "-".to_string())),
                Cell::from(s.chaldean.to_string()),
                Cell::from(s.updated_at.format("%Y-%m-%d %H:%M").to_string()),
            ])
            .height(1)
        })
        .collect();

    let title = format!(" Submissions ({}) ", rows.len());
    let table = Table::new(
        rows,
        [
            Constraint::Length(26),
            Constraint::Length(11),
            Constraint::Length(7),
            Constraint::Length(16),
            Constraint::Length(4),
            Constraint::Length(4),
            Constraint::Length(5),
            Constraint::Length(9),
            Constraint::Length(17),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let label = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);

    let mut lines = vec![];
    match (app.selected_submission(), app.selected_chart()) {
        (Some(s), Some(chart)) => {
            let field = |name: &str, value: String| {
                Line::from(vec![Span::styled(format!("{:<16}", name), label), Span::raw(value)])
            };

            lines.push(field("Name", chart.full_name.clone()));
            lines.push(field("Date of Birth", chart.date_of_birth.clone()));
            lines.push(field("Gender", chart.gender.to_string()));
            lines.push(field("Phone", s.phone_number.clone()));
            if let Some(t) = &s.birth_time {
                lines.push(field("Birth Time", t.clone()));
            }
            if let Some(p) = &s.place_of_birth {
                lines.push(field("Place of Birth", truncate(p, 30)));
            }
            lines.push(Line::from(""));
            lines.push(field("Driver", chart.driver.to_string()));
            lines.push(field("Conductor", chart.conductor.to_string()));
            lines.push(field("Kuaa", chart.kuaa_display()));
            lines.push(field("Chaldean", chart.chaldean.to_string()));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled("Lo Shu Grid", label)));

            for row in chart.grid.rows() {
                let mut spans = vec![Span::raw("  ")];
                for (digit, count) in row {
                    let (text, style) = match CellStatus::from_count(count) {
                        CellStatus::Missing => (" · ".to_string(), Style::default().fg(Color::Red)),
                        CellStatus::Present => (format!(" {} ", digit), Style::default().fg(Color::White)),
                        CellStatus::Repeated(n) => (
                            format!("{}x{}", digit, n),
                            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                        ),
                    };
                    spans.push(Span::styled(format!("[{:^5}]", text.trim()), style));
                }
                lines.push(Line::from(spans));
            }

            let missing = chart.grid.missing();
            if !missing.is_empty() {
                lines.push(Line::from(""));
                let digits: Vec<String> = missing.iter().map(|d| d.to_string()).collect();
                lines.push(field("Missing", digits.join(", ")));
            }
        }
        (Some(_), None) => lines.push(Line::from(Span::styled(
            "Stored row could not be re-read as a chart",
            Style::default().fg(Color::Red),
        ))),
        _ => lines.push(Line::from("No record selected")),
    }

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Chart "),
    );

    f.render_widget(panel, area);
}

fn count_lines<T: ToString>(title: &str, counts: &[(T, i64)], total: i64) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(
        title.to_string(),
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    ))];

    for (value, count) in counts {
        let width = if total > 0 { (*count * 30 / total) as usize } else { 0 };
        lines.push(Line::from(vec![
            Span::raw(format!("  {:<14}", value.to_string())),
            Span::styled(format!("{:>5}  ", count), Style::default().fg(Color::White)),
            Span::styled("█".repeat(width.max(1)), Style::default().fg(Color::Green)),
        ]));
    }
    lines.push(Line::from(""));
    lines
}

fn render_aggregates(f: &mut Frame, area: Rect, app: &App) {
    let stats = &app.stats;
    let kuaa: Vec<(String, i64)> = stats
        .by_kuaa
        .iter()
        .map(|(k, c)| (k.map(|k| k.to_string()).unwrap_or_else(|| "Not Available".to_string()), *c))
        .collect();

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let mut left = count_lines("By Gender", &stats.by_gender, stats.total);
    left.extend(count_lines("By Driver", &stats.by_driver, stats.total));
    left.extend(count_lines("By Conductor", &stats.by_conductor, stats.total));

    let mut right = count_lines("By Kuaa", &kuaa, stats.total);
    right.extend(count_lines("By Chaldean", &stats.by_chaldean, stats.total));

    let block = |title: &'static str| {
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title)
    };

    f.render_widget(Paragraph::new(left).block(block(" Demographics ")), columns[0]);
    f.render_widget(Paragraph::new(right).block(block(" Numbers ")), columns[1]);
}

fn render_events(f: &mut Frame, area: Rect, app: &App) {
    let header = header_row(&["Time", "Event", "Entity", "Actor"]);

    let rows = app.events.iter().map(|e| {
        let color = match e.event_type.as_str() {
            "submission_deleted" | "admin_login_failed" => Color::Red,
            "admin_login" => Color::Cyan,
            _ => Color::Green,
        };
        Row::new(vec![
            Cell::from(e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::from(e.event_type.clone()).style(Style::default().fg(color)),
            Cell::from(truncate(&format!("{}:{}", e.entity_type, e.entity_id), 30)),
            Cell::from(e.actor.clone()),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(20),
            Constraint::Length(20),
            Constraint::Length(32),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Last {} events ", app.events.len())),
    );

    f.render_widget(table, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let hint = match app.current_page {
        Page::Records => "j/k: Move  Enter: Chart  d: Delete  f: Filter  c: Clear  r: Reload  Tab: Page  q: Quit",
        _ => "Tab: Page  r: Reload  q: Quit",
    };

    let mut spans = vec![Span::styled(hint, Style::default().fg(Color::DarkGray))];
    if let Some(msg) = &app.status_message {
        let color = if app.pending_delete.is_some() { Color::Red } else { Color::Yellow };
        spans.insert(0, Span::raw("  "));
        spans.insert(0, Span::styled(msg.clone(), Style::default().fg(color).add_modifier(Modifier::BOLD)));
    }

    let status = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(status, area);
}

// ============================================================================
// PASSWORD PROMPT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    Editing,
    Done,
    Cancelled,
}

/// Apply one key press to a hidden input buffer
pub fn password_key(buffer: &mut String, key: KeyEvent) -> PromptState {
    if key.kind == KeyEventKind::Release {
        return PromptState::Editing;
    }
    match key.code {
        KeyCode::Enter => PromptState::Done,
        KeyCode::Esc => PromptState::Cancelled,
        KeyCode::Char('c') | KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            PromptState::Cancelled
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            buffer.clear();
            PromptState::Editing
        }
        KeyCode::Backspace => {
            buffer.pop();
            PromptState::Editing
        }
        KeyCode::Char(c) => {
            buffer.push(c);
            PromptState::Editing
        }
        _ => PromptState::Editing,
    }
}

/// Read a line from the terminal without echoing it
pub fn read_password(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    enable_raw_mode()?;
    let res = read_hidden_line();
    disable_raw_mode()?;
    println!();

    match res? {
        Some(password) => Ok(password),
        None => anyhow::bail!("Password entry cancelled"),
    }
}

fn read_hidden_line() -> Result<Option<String>> {
    let mut buffer = String::new();
    loop {
        let TermEvent::Key(key) = event::read()? else {
            continue;
        };
        match password_key(&mut buffer, key) {
            PromptState::Editing => {}
            PromptState::Done => return Ok(Some(buffer)),
            PromptState::Cancelled => return Ok(None),
        }
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{setup_database, upsert_submission};
    use crate::numerology::BirthRecord;
    use chrono::NaiveDate;

    fn seeded_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let people = [
            ("Mohan", Gender::Male, "+91-9000000001"),
            ("Priya", Gender::Female, "+91-9000000002"),
            ("Sam", Gender::Unspecified, "+91-9000000003"),
        ];
        for (name, gender, phone) in people {
            let record = BirthRecord {
                first_name: name.to_string(),
                last_name: "Kumar".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(1987, 11, 25).unwrap(),
                gender,
                birth_time: None,
                place_of_birth: None,
                phone_number: Some(phone.to_string()),
            };
            let chart = BirthChart::compute(&record).unwrap();
            upsert_submission(&conn, &record, &chart).unwrap();
        }
        conn
    }

    #[test]
    fn test_page_cycle() {
        assert_eq!(Page::Records.next(), Page::Aggregates);
        assert_eq!(Page::Events.next(), Page::Records);
        assert_eq!(Page::Records.previous(), Page::Events);
    }

    #[test]
    fn test_navigation_wraps() {
        let conn = seeded_conn();
        let mut app = App::load(&conn, "admin").unwrap();

        assert_eq!(app.state.selected(), Some(0));
        app.previous();
        assert_eq!(app.state.selected(), Some(2));
        app.next();
        assert_eq!(app.state.selected(), Some(0));
        app.page_down();
        assert_eq!(app.state.selected(), Some(2));
        app.page_up();
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_gender_filter() {
        let conn = seeded_conn();
        let mut app = App::load(&conn, "admin").unwrap();

        app.cycle_gender_filter();
        assert_eq!(app.gender_filter, Some(Gender::Male));
        let visible = app.visible_submissions();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].first_name, "Mohan");

        app.clear_filter();
        assert_eq!(app.visible_submissions().len(), 3);
    }

    #[test]
    fn test_selected_chart_matches_stored_numbers() {
        let conn = seeded_conn();
        let mut app = App::load(&conn, "admin").unwrap();
        app.gender_filter = Some(Gender::Female);
        app.state.select(Some(0));

        let chart = app.selected_chart().unwrap();
        let stored = app.selected_submission().unwrap();
        assert_eq!(chart.driver, stored.driver);
        assert_eq!(chart.kuaa, stored.kuaa);
        assert_eq!(chart.chaldean, stored.chaldean);
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let conn = seeded_conn();
        let mut app = App::load(&conn, "admin").unwrap();

        app.request_delete();
        let phone = app.pending_delete.clone().unwrap();
        app.cancel_delete();
        assert!(app.pending_delete.is_none());
        assert_eq!(app.submissions.len(), 3);

        app.request_delete();
        assert!(app.confirm_delete(&conn).unwrap());
        assert_eq!(app.submissions.len(), 2);
        assert_eq!(app.stats.total, 2);
        assert!(app.submissions.iter().all(|s| s.phone_number != phone));
        assert_eq!(app.events[0].event_type, "submission_deleted");
        assert_eq!(app.events[0].actor, "admin");

        // Nothing pending any more
        assert!(!app.confirm_delete(&conn).unwrap());
    }

    #[test]
    fn test_delete_only_from_records_page() {
        let conn = seeded_conn();
        let mut app = App::load(&conn, "admin").unwrap();
        app.next_page();
        app.request_delete();
        assert!(app.pending_delete.is_none());
    }

    #[test]
    fn test_selection_clamped_after_reload() {
        let conn = seeded_conn();
        let mut app = App::load(&conn, "admin").unwrap();
        app.state.select(Some(2));

        let phone = app.selected_submission().unwrap().phone_number.clone();
        delete_submission(&conn, &phone, "admin").unwrap();
        app.reload(&conn).unwrap();
        assert_eq!(app.state.selected(), Some(1));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long name indeed", 10), "a very ...");
    }

    fn type_keys(buffer: &mut String, keys: &[KeyEvent]) -> PromptState {
        let mut state = PromptState::Editing;
        for key in keys {
            state = password_key(buffer, *key);
        }
        state
    }

    #[test]
    fn test_password_key_collects_hidden_input() {
        let press = |code| KeyEvent::new(code, KeyModifiers::NONE);
        let mut buffer = String::new();

        let state = type_keys(
            &mut buffer,
            &[
                press(KeyCode::Char('s')),
                press(KeyCode::Char('3')),
                press(KeyCode::Char('x')),
                press(KeyCode::Backspace),
                press(KeyCode::Char('c')),
                KeyEvent::new(KeyCode::Char('R'), KeyModifiers::SHIFT),
                press(KeyCode::Left),
            ],
        );
        assert_eq!(state, PromptState::Editing);
        assert_eq!(buffer, "s3cR");

        assert_eq!(password_key(&mut buffer, press(KeyCode::Enter)), PromptState::Done);
        assert_eq!(buffer, "s3cR");
    }

    #[test]
    fn test_password_key_cancel_and_clear() {
        let mut buffer = "secret".to_string();

        let ctrl_u = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL);
        assert_eq!(password_key(&mut buffer, ctrl_u), PromptState::Editing);
        assert!(buffer.is_empty());

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(password_key(&mut buffer, ctrl_c), PromptState::Cancelled);
        assert!(buffer.is_empty());

        let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(password_key(&mut buffer, esc), PromptState::Cancelled);
    }

    #[test]
    fn test_password_key_ignores_release() {
        let mut buffer = String::new();
        let release = KeyEvent::new_with_kind(KeyCode::Char('a'), KeyModifiers::NONE, KeyEventKind::Release);
        assert_eq!(password_key(&mut buffer, release), PromptState::Editing);
        assert!(buffer.is_empty());
    }
}
