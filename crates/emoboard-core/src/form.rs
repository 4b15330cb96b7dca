//! State of the "share your feeling" form.
//!
//! Renderers own drawing and key handling; this type owns the rules: the
//! text is capped at [`MAX_TEXT_CHARS`], submit needs non-blank text and no
//! submission in flight, and the form cannot be closed mid-submit.

use crate::backend::EmotionBackend;
use crate::feed::FeedSession;
use crate::model::emotion::{Category, Emotion};
use crate::position::PositionSource;
use crate::validate::MAX_TEXT_CHARS;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddForm {
    text: String,
    selected: Category,
    submitting: bool,
    error: Option<String>,
}

/// Result of [`AddForm::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum FormOutcome {
    /// Submit was not allowed; nothing was sent.
    Ignored,
    /// The post was created and the form reset.
    Submitted(Emotion),
    /// The add failed; the message is in [`AddForm::error`].
    Failed,
}

impl AddForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn selected(&self) -> Category {
        self.selected
    }

    #[must_use]
    pub const fn submitting(&self) -> bool {
        self.submitting
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Append a character unless the text is already at the limit.
    pub fn push_char(&mut self, c: char) -> bool {
        if self.submitting || self.text.chars().count() >= MAX_TEXT_CHARS {
            return false;
        }
        self.text.push(c);
        true
    }

    pub fn pop_char(&mut self) {
        if !self.submitting {
            self.text.pop();
        }
    }

    pub fn select(&mut self, category: Category) {
        if !self.submitting {
            self.selected = category;
        }
    }

    pub fn select_next(&mut self) {
        self.select(self.selected.next());
    }

    pub fn select_prev(&mut self) {
        self.select(self.selected.prev());
    }

    /// Character counter, e.g. `12/100`.
    #[must_use]
    pub fn counter(&self) -> String {
        format!("{}/{MAX_TEXT_CHARS}", self.text.chars().count())
    }

    #[must_use]
    pub fn can_submit(&self) -> bool {
        !self.submitting && !self.text.trim().is_empty()
    }

    #[must_use]
    pub const fn can_close(&self) -> bool {
        !self.submitting
    }

    /// Back to defaults: empty text, `sadness`, no error.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Send the form through `session`.
    ///
    /// On success the form resets. On failure the text and category are kept
    /// and the message is shown on the form.
    pub fn submit<B, P>(&mut self, session: &mut FeedSession<B, P>) -> FormOutcome
    where
        B: EmotionBackend,
        P: PositionSource,
    {
        if !self.can_submit() {
            return FormOutcome::Ignored;
        }

        self.submitting = true;
        self.error = None;
        let result = session.add(&self.text, self.selected);
        self.submitting = false;

        match result {
            Ok(emotion) => {
                self.reset();
                FormOutcome::Submitted(emotion)
            }
            Err(error) => {
                self.error = Some(error.to_string());
                FormOutcome::Failed
            }
        }
    }
}
