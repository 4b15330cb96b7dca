//! "Share your feeling" overlay.
//!
//! Typing edits the text, Tab/Shift-Tab cycle the emotion, Enter posts and
//! Esc closes. The form rules live in [`AddForm`]; this module only maps keys
//! and draws.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use emoboard_core::backend::EmotionBackend;
use emoboard_core::form::{AddForm, FormOutcome};
use emoboard_core::position::PositionSource;
use emoboard_core::{Category, Emotion, FeedSession};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use super::category_color;

/// What the board should do after a key went to the dialog.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogAction {
    /// Keep the dialog open.
    Stay,
    /// Close without posting.
    Close,
    /// The post was created; close and highlight it.
    Posted(Emotion),
}

#[derive(Debug, Default)]
pub struct AddDialog {
    form: AddForm,
}

impl AddDialog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn form(&self) -> &AddForm {
        &self.form
    }

    pub fn handle_key<B, P>(&mut self, key: KeyEvent, session: &mut FeedSession<B, P>) -> DialogAction
    where
        B: EmotionBackend,
        P: PositionSource,
    {
        match key.code {
            KeyCode::Esc if self.form.can_close() => DialogAction::Close,
            KeyCode::Enter => match self.form.submit(session) {
                FormOutcome::Submitted(emotion) => DialogAction::Posted(emotion),
                FormOutcome::Ignored | FormOutcome::Failed => DialogAction::Stay,
            },
            KeyCode::Tab | KeyCode::Down => {
                self.form.select_next();
                DialogAction::Stay
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.form.select_prev();
                DialogAction::Stay
            }
            KeyCode::Backspace => {
                self.form.pop_char();
                DialogAction::Stay
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.form.push_char(c);
                DialogAction::Stay
            }
            _ => DialogAction::Stay,
        }
    }

    /// Draw the dialog centered on `area`.
    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let width = area.width.saturating_sub(4).min(60);
        let height = area.height.saturating_sub(2).min(11);
        let dialog_area = Rect {
            x: area.x + area.width.saturating_sub(width) / 2,
            y: area.y + area.height.saturating_sub(height) / 2,
            width,
            height,
        };

        frame.render_widget(Clear, dialog_area);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Share your feeling ")
            .title_style(Style::default().add_modifier(Modifier::BOLD))
            .style(Style::default().bg(Color::Black));
        let inner = block.inner(dialog_area);
        frame.render_widget(block, dialog_area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(2),
                Constraint::Min(1),
                Constraint::Length(1),
            ])
            .split(inner);

        let text = Paragraph::new(format!("{}_", self.form.text()))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" What do you feel? {} ", self.form.counter()))
                    .border_style(Style::default().fg(Color::Yellow)),
            );
        frame.render_widget(text, chunks[0]);

        let selected = self.form.selected();
        let spans: Vec<Span> = Category::ALL
            .into_iter()
            .map(|category| {
                let mut style = Style::default().fg(category_color(category));
                if category == selected {
                    style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
                }
                Span::styled(format!(" {} ", category.label()), style)
            })
            .collect();
        frame.render_widget(Paragraph::new(Line::from(spans)).wrap(Wrap { trim: true }), chunks[1]);

        if let Some(error) = self.form.error() {
            let error = Paragraph::new(error)
                .style(Style::default().fg(Color::Red))
                .wrap(Wrap { trim: true });
            frame.render_widget(error, chunks[2]);
        } else if self.form.submitting() {
            frame.render_widget(Paragraph::new("Sending..."), chunks[2]);
        }

        let hints = Line::from(vec![
            Span::styled("Enter", Style::default().fg(Color::Yellow)),
            Span::raw(" share  "),
            Span::styled("Tab", Style::default().fg(Color::Yellow)),
            Span::raw(" emotion  "),
            Span::styled("Esc", Style::default().fg(Color::Yellow)),
            Span::raw(" cancel"),
        ]);
        frame.render_widget(Paragraph::new(hints), chunks[3]);
    }
}
