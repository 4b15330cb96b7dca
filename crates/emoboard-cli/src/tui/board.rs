//! Full-screen board: dots, legend, tooltip, add dialog.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use emoboard_core::backend::EmotionBackend;
use emoboard_core::board::{Tooltip, TooltipLayout, dot_cell, nearest_dot};
use emoboard_core::legend::Legend;
use emoboard_core::position::PositionSource;
use emoboard_core::{Emotion, FeedSession};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use tracing::debug;

use super::add_dialog::{AddDialog, DialogAction};
use super::category_color;

const DOT: &str = "●";
const LEGEND_WIDTH: u16 = 30;

/// Whether the event loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardAction {
    Continue,
    Quit,
}

/// State of the interactive board.
pub struct BoardView<B, P> {
    session: FeedSession<B, P>,
    /// Highlighted post, tracked by id since pushes shift indexes.
    selected: Option<String>,
    dialog: Option<AddDialog>,
    /// Inner board area from the last render, for mouse hit testing.
    board_area: Rect,
}

impl<B: EmotionBackend, P: PositionSource> BoardView<B, P> {
    /// Wrap a session and start it: load, then subscribe.
    #[must_use]
    pub fn new(mut session: FeedSession<B, P>) -> Self {
        session.start();
        Self {
            session,
            selected: None,
            dialog: None,
            board_area: Rect::default(),
        }
    }

    #[must_use]
    pub const fn session(&self) -> &FeedSession<B, P> {
        &self.session
    }

    #[must_use]
    pub fn selected(&self) -> Option<&Emotion> {
        self.selected.as_deref().and_then(|id| self.session.get(id))
    }

    #[must_use]
    pub const fn dialog_open(&self) -> bool {
        self.dialog.is_some()
    }

    /// Merge whatever arrived on the change stream.
    pub fn tick(&mut self) {
        let stats = self.session.pump();
        if stats.handled() > 0 {
            debug!(merged = stats.merged, duplicates = stats.duplicates, "board tick");
        }
    }

    /// Stop the change stream. Called once when the board closes.
    pub fn close(&mut self) {
        self.session.stop();
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> BoardAction {
        if let Some(dialog) = self.dialog.as_mut() {
            match dialog.handle_key(key, &mut self.session) {
                DialogAction::Stay => {}
                DialogAction::Close => self.dialog = None,
                DialogAction::Posted(emotion) => {
                    self.dialog = None;
                    self.selected = Some(emotion.id);
                }
            }
            return BoardAction::Continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return BoardAction::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return BoardAction::Quit;
            }
            KeyCode::Char('a') => self.dialog = Some(AddDialog::new()),
            KeyCode::Char('r') => {
                // Failures land in the session's error line.
                let _ = self.session.load();
            }
            KeyCode::Tab | KeyCode::Right | KeyCode::Down => self.step_selection(true),
            KeyCode::BackTab | KeyCode::Left | KeyCode::Up => self.step_selection(false),
            _ => {}
        }
        BoardAction::Continue
    }

    /// Hovering or clicking near a dot selects it.
    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.dialog.is_some() {
            return;
        }
        if !matches!(mouse.kind, MouseEventKind::Moved | MouseEventKind::Down(_)) {
            return;
        }
        let area = self.board_area;
        if !area.contains((mouse.column, mouse.row).into()) {
            self.selected = None;
            return;
        }
        let local = (mouse.column - area.x, mouse.row - area.y);
        let emotions = self.session.emotions();
        self.selected = nearest_dot(emotions, local, (area.width, area.height), 1)
            .map(|idx| emotions[idx].id.clone());
    }

    fn step_selection(&mut self, forward: bool) {
        let emotions = self.session.emotions();
        if emotions.is_empty() {
            self.selected = None;
            return;
        }
        let len = emotions.len();
        let current = self
            .selected
            .as_deref()
            .and_then(|id| emotions.iter().position(|e| e.id == id));
        let next = match current {
            None => 0,
            Some(idx) if forward => (idx + 1) % len,
            Some(idx) => (idx + len - 1) % len,
        };
        self.selected = Some(emotions[next].id.clone());
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(LEGEND_WIDTH)])
            .split(area);

        self.render_board(frame, columns[0]);
        self.render_side(frame, columns[1]);

        if let Some(dialog) = &self.dialog {
            dialog.render(frame, area);
        }
    }

    fn render_board(&mut self, frame: &mut Frame, area: Rect) {
        let live = if self.session.is_live() { " live " } else { " offline " };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Emotion Board ")
            .title(Line::from(live).alignment(Alignment::Right));
        let inner = block.inner(area);
        frame.render_widget(block, area);
        self.board_area = inner;

        if self.session.loading() {
            frame.render_widget(Paragraph::new("Loading...").alignment(Alignment::Center), inner);
            return;
        }

        let emotions = self.session.emotions();
        if emotions.is_empty() && self.session.error().is_none() {
            let empty = Paragraph::new("No emotions yet. Press a to share one.")
                .alignment(Alignment::Center);
            frame.render_widget(empty, inner);
        }

        let selected = self.selected.as_deref();
        // Oldest first so the newest dot wins a shared cell.
        for emotion in emotions.iter().rev() {
            let Some((col, row)) = dot_cell(emotion.x, emotion.y, inner.width, inner.height) else {
                continue;
            };
            let mut style = Style::default().fg(category_color(emotion.emotion));
            if selected == Some(emotion.id.as_str()) {
                style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
            }
            frame
                .buffer_mut()
                .set_string(inner.x + col, inner.y + row, DOT, style);
        }

        if let Some(error) = self.session.error() {
            let line = Rect {
                y: inner.bottom().saturating_sub(1),
                height: inner.height.min(1),
                ..inner
            };
            let error = Paragraph::new(error.to_string()).style(Style::default().fg(Color::Red));
            frame.render_widget(error, line);
        }

        if let Some(emotion) = self.selected() {
            let tooltip = Tooltip::for_emotion(emotion);
            if let Some(cell) = dot_cell(emotion.x, emotion.y, inner.width, inner.height) {
                render_tooltip(frame, inner, cell, &tooltip, category_color(emotion.emotion));
            }
        }
    }

    fn render_side(&self, frame: &mut Frame, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(10), Constraint::Min(0)])
            .split(area);

        let legend = Legend::from_emotions(self.session.emotions());
        let mut lines: Vec<Line> = legend
            .rows
            .iter()
            .map(|row| {
                Line::from(vec![
                    Span::styled(format!("{DOT} "), Style::default().fg(category_color(row.category))),
                    Span::raw(format!("{:<10}{:>4} {:>5.1}%", row.label, row.count, row.percentage)),
                ])
            })
            .collect();
        lines.push(Line::from(""));
        lines.push(Line::from(legend.total_label()).style(Style::default().fg(Color::Gray)));
        let legend = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Emotions "));
        frame.render_widget(legend, rows[0]);

        let help = Paragraph::new(vec![
            Line::from("a  share a feeling"),
            Line::from("⇥  next dot"),
            Line::from("r  reload"),
            Line::from("q  quit"),
        ])
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL).title(" Keys "));
        frame.render_widget(help, rows[1]);
    }
}

/// Tooltip box next to the dot at `cell`, kept inside `area`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn render_tooltip(
    frame: &mut Frame,
    area: Rect,
    (col, row): (u16, u16),
    tooltip: &Tooltip,
    color: Color,
) {
    let layout = TooltipLayout::cells();
    let (left, top) = layout.origin((f64::from(col), f64::from(row)), f64::from(area.width));
    let width = (layout.width as u16).min(area.width);
    let height = area.height.min(5);
    let x = area.x + (left as u16).min(area.width.saturating_sub(width));
    let y = area.y + (top as u16).min(area.height.saturating_sub(height));
    let rect = Rect {
        x,
        y,
        width,
        height,
    };

    let body = Paragraph::new(vec![
        Line::from(tooltip.text.clone()),
        Line::from(Span::styled(
            tooltip.timestamp.clone(),
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(Span::styled(
                format!(" {} ", tooltip.label),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )),
    );
    frame.render_widget(Clear, rect);
    frame.render_widget(body, rect);
}

impl<B, P> std::fmt::Debug for BoardView<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardView")
            .field("selected", &self.selected)
            .field("dialog_open", &self.dialog.is_some())
            .finish_non_exhaustive()
    }
}
