//! Newest-first list of emotions with an id index.
//!
//! Merges are idempotent: an id that is already present is never added a
//! second time, whichever path (load, push, or add confirmation) brings it in.

use crate::model::emotion::Emotion;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedState {
    emotions: Vec<Emotion>,
    ids: HashSet<String>,
}

impl FeedState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list. The first occurrence of each id wins.
    ///
    /// Returns the number of duplicates that were dropped.
    pub fn replace(&mut self, emotions: impl IntoIterator<Item = Emotion>) -> usize {
        self.emotions.clear();
        self.ids.clear();
        let mut dropped = 0;
        for emotion in emotions {
            if self.ids.insert(emotion.id.clone()) {
                self.emotions.push(emotion);
            } else {
                dropped += 1;
            }
        }
        dropped
    }

    /// Put `emotion` at the head unless its id is already present.
    ///
    /// Returns `true` if the list changed.
    pub fn prepend_unique(&mut self, emotion: Emotion) -> bool {
        if !self.ids.insert(emotion.id.clone()) {
            return false;
        }
        self.emotions.insert(0, emotion);
        true
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Emotion> {
        if !self.contains(id) {
            return None;
        }
        self.emotions.iter().find(|emotion| emotion.id == id)
    }

    #[must_use]
    pub fn emotions(&self) -> &[Emotion] {
        &self.emotions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.emotions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emotions.is_empty()
    }
}
