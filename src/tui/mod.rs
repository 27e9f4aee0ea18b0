use anyhow::{Context, Result};
use crossterm::{
    event::{
        self, DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
        Event, KeyCode, KeyEvent, KeyModifiers,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::dispatch::BackgroundDispatcher;
use crate::editor::Editor;
use crate::highlight::Highlighter;
use crate::session::Session;
use crate::{Action, LANGUAGES, markdown};

const SPINNER: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];
const STATUS_TTL: Duration = Duration::from_secs(3);
const PAGE: usize = 20;

/// Application state for the TUI.
pub struct App {
    session: Session,
    editor: Editor,
    background: BackgroundDispatcher,
    highlighter: Highlighter,
    /// Highlighted row while the language picker is open.
    picker: Option<usize>,
    show_help: bool,
    should_quit: bool,
    response_scroll: u16,
    response_lines: Option<(u64, Vec<Line<'static>>)>,
    spinner_frame: usize,
    status_message: Option<(String, Instant)>,
}

impl App {
    /// Create an App around a session; the editor starts with the session's code.
    pub fn new(session: Session, background: BackgroundDispatcher) -> Self {
        let editor = Editor::with_text(session.code());
        Self {
            session,
            editor,
            background,
            highlighter: Highlighter::new(),
            picker: None,
            show_help: false,
            should_quit: false,
            response_scroll: 0,
            response_lines: None,
            spinner_frame: 0,
            status_message: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    /// Apply finished background requests. Returns true if anything changed.
    pub fn poll_completions(&mut self) -> bool {
        let applied = self.background.drain(&mut self.session);
        if applied > 0 {
            self.response_scroll = 0;
        }
        applied > 0
    }

    /// Handle keyboard input, dispatching to overlays first.
    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if self.show_help {
            // Any key closes help
            self.show_help = false;
            return Ok(());
        }

        if self.picker.is_some() {
            self.handle_picker_key(key);
            return Ok(());
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('c') if ctrl => self.should_quit = true,
            KeyCode::Char('r') if ctrl => self.submit(Action::Review),
            KeyCode::Char('f') if ctrl => self.submit(Action::Fix),
            KeyCode::Char('l') if ctrl => self.picker = Some(self.session.language().index()),
            KeyCode::F(1) => self.show_help = true,
            KeyCode::PageDown => {
                self.response_scroll = self.response_scroll.saturating_add(PAGE as u16);
            }
            KeyCode::PageUp => {
                self.response_scroll = self.response_scroll.saturating_sub(PAGE as u16);
            }
            _ => self.handle_edit_key(key),
        }
        Ok(())
    }

    /// Insert pasted text into the editor.
    pub fn handle_paste(&mut self, text: &str) {
        if self.show_help || self.picker.is_some() {
            return;
        }
        self.editor.insert_str(text);
        self.sync_code();
    }

    fn handle_picker_key(&mut self, key: KeyEvent) {
        let Some(selected) = self.picker else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.picker = None,
            KeyCode::Char('j') | KeyCode::Down => {
                self.picker = Some((selected + 1).min(LANGUAGES.len() - 1));
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.picker = Some(selected.saturating_sub(1));
            }
            KeyCode::Home => self.picker = Some(0),
            KeyCode::End => self.picker = Some(LANGUAGES.len() - 1),
            KeyCode::Enter => {
                let language = LANGUAGES[selected];
                self.session.set_language(language);
                self.picker = None;
                debug!(language = language.code, "language selected");
                self.set_status(format!("Language: {}", language.label));
            }
            _ => {}
        }
    }

    fn handle_edit_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char(ch) if !ctrl => self.editor.insert_char(ch),
            KeyCode::Enter => self.editor.newline(),
            KeyCode::Tab => self.editor.tab(),
            KeyCode::Backspace => self.editor.backspace(),
            KeyCode::Delete => self.editor.delete(),
            KeyCode::Left => self.editor.move_left(),
            KeyCode::Right => self.editor.move_right(),
            KeyCode::Up => self.editor.move_up(1),
            KeyCode::Down => self.editor.move_down(1),
            KeyCode::Home => self.editor.home(),
            KeyCode::End => self.editor.end(),
            _ => return,
        }
        self.sync_code();
    }

    fn sync_code(&mut self) {
        self.session.set_code(self.editor.text());
    }

    fn submit(&mut self, action: Action) {
        if let Some(token) = self.background.submit(&mut self.session, action) {
            self.response_scroll = 0;
            self.set_status(format!(
                "Sent {} #{} to {}",
                action.verb(),
                token,
                self.background.model()
            ));
        }
    }

    /// Render the UI.
    fn render(&mut self, frame: &mut Frame) {
        let expired = self
            .status_message
            .as_ref()
            .map(|(_, time)| time.elapsed() >= STATUS_TTL)
            .unwrap_or(false);
        if expired {
            self.status_message = None;
        }
        self.spinner_frame = (self.spinner_frame + 1) % SPINNER.len();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(3)].as_ref())
            .split(frame.area());

        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
            .split(chunks[0]);

        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(1)].as_ref())
            .split(panes[0]);

        self.render_toolbar(frame, left[0]);
        self.render_editor(frame, left[1]);
        self.render_response(frame, panes[1]);
        self.render_status_bar(frame, chunks[1]);

        if self.picker.is_some() {
            self.render_picker(frame);
        }
        if self.show_help {
            self.render_help(frame);
        }
    }

    /// Language selector and action hints above the editor.
    fn render_toolbar(&self, frame: &mut Frame, area: Rect) {
        let language = self.session.language();
        let line = Line::from(vec![
            Span::styled(
                format!(" {} ▾ ", language.label),
                Style::default()
                    .fg(Color::White)
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled("Ctrl+F", Style::default().fg(Color::Blue)),
            Span::raw(" Fix Code  "),
            Span::styled("Ctrl+R", Style::default().fg(Color::Magenta)),
            Span::raw(" Review"),
        ]);
        let paragraph = Paragraph::new(line).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Language (Ctrl+L)"),
        );
        frame.render_widget(paragraph, area);
    }

    /// Render the code editor with line numbers and highlighting.
    fn render_editor(&mut self, frame: &mut Frame, area: Rect) {
        let inner_height = area.height.saturating_sub(2) as usize;
        self.editor.scroll_to_cursor(inner_height);

        let total = self.editor.lines().len();
        let gutter_width = total.to_string().len().max(3);
        let gutter_style = Style::default().fg(Color::DarkGray);

        // Highlight from the top so multi-line constructs carry their state.
        let mut highlighter = self.highlighter.for_language(self.session.language());
        let scroll = self.editor.scroll();
        let mut lines = Vec::with_capacity(inner_height);
        for (idx, source) in self.editor.lines().iter().enumerate() {
            if idx >= scroll + inner_height {
                break;
            }
            let spans = highlighter.highlight_line(source);
            if idx < scroll {
                continue;
            }
            let mut line = vec![Span::styled(
                format!("{:>width$} ", idx + 1, width = gutter_width),
                gutter_style,
            )];
            line.extend(spans);
            lines.push(Line::from(line));
        }

        let placeholder = self.session.code().is_empty();
        let text = if placeholder {
            Text::from(Line::from(vec![
                Span::styled(format!("{:>width$} ", 1, width = gutter_width), gutter_style),
                Span::styled(
                    "Type or paste code here…",
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                ),
            ]))
        } else {
            Text::from(lines)
        };

        let paragraph = Paragraph::new(text).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Code ({})", self.session.language().label)),
        );
        frame.render_widget(paragraph, area);

        if self.picker.is_none() && !self.show_help {
            let (row, _) = self.editor.cursor();
            let prefix_width = Span::raw(self.editor.cursor_prefix()).width() as u16;
            let max_x = area.x + area.width.saturating_sub(2);
            let x = (area.x + 1 + gutter_width as u16 + 1 + prefix_width).min(max_x);
            let y = area.y + 1 + row.saturating_sub(scroll) as u16;
            frame.set_cursor_position((x, y));
        }
    }

    /// Render the response pane: spinner while loading, markdown otherwise.
    fn render_response(&mut self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("AI Response ({})", self.background.model()));

        if self.session.is_loading() {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Percentage(45),
                    Constraint::Length(1),
                    Constraint::Min(0),
                ])
                .split(inner);
            let spinner = Paragraph::new(Line::from(vec![
                Span::styled(
                    SPINNER[self.spinner_frame],
                    Style::default().fg(Color::Magenta),
                ),
                Span::raw(" Waiting for the model…"),
            ]))
            .alignment(Alignment::Center);
            frame.render_widget(spinner, rows[1]);
            return;
        }

        let revision = self.session.revision();
        let cached = matches!(&self.response_lines, Some((rev, _)) if *rev == revision);
        if !cached {
            let lines = markdown::render(self.session.response().text(), &self.highlighter);
            self.response_lines = Some((revision, lines));
        }
        let lines = self
            .response_lines
            .as_ref()
            .map(|(_, lines)| lines.clone())
            .unwrap_or_default();

        let paragraph = Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((self.response_scroll, 0));
        frame.render_widget(paragraph, area);
    }

    /// Render the status bar.
    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let status_text = match &self.status_message {
            Some((msg, _)) => msg.clone(),
            None => {
                let in_flight = self.session.in_flight();
                let pending = if in_flight > 0 {
                    format!("{} in flight | ", in_flight)
                } else {
                    String::new()
                };
                format!(
                    "{}{} lines | Keys: Ctrl+R=review Ctrl+F=fix Ctrl+L=language PgUp/PgDn=scroll F1=help Ctrl+Q=quit",
                    pending,
                    self.editor.lines().len()
                )
            }
        };

        let paragraph = Paragraph::new(status_text)
            .block(Block::default().borders(Borders::ALL))
            .wrap(Wrap { trim: false });

        frame.render_widget(paragraph, area);
    }

    /// Render the language picker popup.
    fn render_picker(&self, frame: &mut Frame) {
        let current = self.session.language();
        let items: Vec<ListItem> = LANGUAGES
            .iter()
            .map(|language| {
                let marker = if *language == current { "● " } else { "  " };
                ListItem::new(format!("{}{:<12} {}", marker, language.label, language.code))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Select language (Enter/Esc)"),
            )
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");

        let mut state = ListState::default().with_selected(self.picker);
        let area = centered_rect(40, 70, frame.area());
        frame.render_widget(Clear, area);
        frame.render_stateful_widget(list, area, &mut state);
    }

    /// Render the help overlay.
    fn render_help(&self, frame: &mut Frame) {
        let help_text = [
            "Code Review - Keyboard Shortcuts",
            "",
            "Actions:",
            "  Ctrl+R        - Review code",
            "  Ctrl+F        - Fix code",
            "  Ctrl+L        - Choose language",
            "",
            "Editing:",
            "  Type / paste  - Edit code",
            "  Arrows        - Move cursor",
            "  Home / End    - Line start / end",
            "",
            "Response:",
            "  PgUp / PgDn   - Scroll",
            "",
            "Other:",
            "  F1            - Show this help",
            "  Ctrl+Q        - Quit",
            "",
            "Press any key to close this help",
        ];

        let text = Text::from(help_text.iter().map(|&s| Line::from(s)).collect::<Vec<_>>());

        let paragraph = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title("Help"))
            .wrap(Wrap { trim: false });

        let area = centered_rect(60, 80, frame.area());
        frame.render_widget(Clear, area);
        frame.render_widget(paragraph, area);
    }
}

/// Create a centered rectangle.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Setup the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste
    )
    .context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("Failed to create terminal")
}

/// Restore the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Launch the interactive editor.
pub fn run_tui(mut app: App) -> Result<()> {
    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(
            io::stdout(),
            DisableBracketedPaste,
            LeaveAlternateScreen,
            DisableMouseCapture
        );
        original_hook(panic_info);
    }));

    let mut terminal = setup_terminal()?;

    // Main event loop
    let result = (|| -> Result<()> {
        let mut drawn_revision = None;
        let mut dirty = true;
        loop {
            app.poll_completions();

            let revision = app.session.revision();
            if dirty
                || drawn_revision != Some(revision)
                || app.session.is_loading()
                || app.status_message.is_some()
            {
                terminal
                    .draw(|f| app.render(f))
                    .context("Failed to draw frame")?;
                drawn_revision = Some(revision);
                dirty = false;
            }

            if app.should_quit {
                break;
            }

            if event::poll(Duration::from_millis(100)).context("Failed to poll events")? {
                match event::read().context("Failed to read event")? {
                    // Ignore key release events
                    Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                        app.handle_key(key)?;
                        dirty = true;
                    }
                    Event::Paste(text) => {
                        app.handle_paste(&text);
                        dirty = true;
                    }
                    Event::Resize(..) => dirty = true,
                    _ => {}
                }
            }
        }
        Ok(())
    })();

    // Restore terminal in all cases
    restore_terminal(&mut terminal)?;

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RacePolicy;
    use crate::client::{GenerationClient, Result as ClientResult};
    use crate::dispatch::Dispatcher;
    use crate::prompt;
    use async_trait::async_trait;
    use ratatui::backend::TestBackend;
    use std::sync::Arc;
    use tokio::runtime::Handle;

    struct Echo;

    #[async_trait]
    impl GenerationClient for Echo {
        async fn generate(&self, _model: &str, _prompt: &str) -> ClientResult<String> {
            Ok("## Rating\nGood".to_string())
        }
    }

    fn app() -> App {
        let dispatcher = Dispatcher::new(Arc::new(Echo), "test-model");
        let background = BackgroundDispatcher::new(dispatcher, Handle::current());
        App::new(Session::new(RacePolicy::default()), background)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn screen(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| app.render(f)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn typing_updates_session_code() {
        let mut app = app();
        for ch in "x = 1".chars() {
            app.handle_key(key(KeyCode::Char(ch))).unwrap();
        }
        app.handle_key(key(KeyCode::Enter)).unwrap();
        app.handle_paste("y = 2");
        assert_eq!(app.session().code(), "x = 1\ny = 2");
    }

    #[tokio::test]
    async fn blank_review_shows_warning_without_loading() {
        let mut app = app();
        app.handle_key(ctrl('r')).unwrap();
        assert!(!app.session().is_loading());
        assert_eq!(app.session().response().text(), prompt::REVIEW_EMPTY_WARNING);
        assert!(screen(&mut app).contains("Please enter some code to review."));
    }

    #[tokio::test]
    async fn review_round_trip_renders_markdown() {
        let mut app = app();
        app.handle_paste("print('hi')");
        app.handle_key(ctrl('r')).unwrap();
        assert!(app.session().is_loading());
        assert!(screen(&mut app).contains("Waiting for the model"));

        let deadline = Instant::now() + Duration::from_secs(5);
        while !app.poll_completions() {
            assert!(Instant::now() < deadline, "completion never arrived");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!app.session().is_loading());
        assert!(screen(&mut app).contains("## Rating"));
    }

    #[tokio::test]
    async fn picker_changes_language() {
        let mut app = app();
        app.handle_key(ctrl('l')).unwrap();
        app.handle_key(key(KeyCode::Down)).unwrap();
        app.handle_key(key(KeyCode::Enter)).unwrap();
        assert_eq!(app.session().language().code, "python");

        // Typing while the picker is open does not reach the editor.
        app.handle_key(ctrl('l')).unwrap();
        app.handle_key(key(KeyCode::Char('k'))).unwrap();
        app.handle_key(key(KeyCode::Esc)).unwrap();
        assert_eq!(app.session().code(), "");
        assert_eq!(app.session().language().code, "python");
    }

    #[tokio::test]
    async fn help_and_quit_keys() {
        let mut app = app();
        app.handle_key(key(KeyCode::F(1))).unwrap();
        assert!(screen(&mut app).contains("Keyboard Shortcuts"));
        app.handle_key(key(KeyCode::Char('x'))).unwrap();
        assert_eq!(app.session().code(), "");

        app.handle_key(ctrl('q')).unwrap();
        assert!(app.should_quit());
    }
}
