//! Per-category counts for the board legend.

use crate::model::emotion::{Category, Emotion};
use serde::Serialize;

/// One legend line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendRow {
    pub category: Category,
    pub label: &'static str,
    pub color: &'static str,
    pub count: usize,
    /// Share of the total in percent; 0 when the board is empty.
    pub percentage: f64,
}

/// Legend rows in category order, plus the total they were computed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub rows: Vec<LegendRow>,
    pub total: usize,
}

impl Legend {
    #[must_use]
    pub fn from_emotions(emotions: &[Emotion]) -> Self {
        let total = emotions.len();
        let rows = Category::ALL
            .into_iter()
            .map(|category| {
                let count = emotions.iter().filter(|e| e.emotion == category).count();
                let style = category.style();
                LegendRow {
                    category,
                    label: style.label,
                    color: style.color,
                    count,
                    percentage: percentage(count, total),
                }
            })
            .collect();
        Self { rows, total }
    }

    #[must_use]
    pub fn count(&self, category: Category) -> usize {
        self.rows
            .iter()
            .find(|row| row.category == category)
            .map_or(0, |row| row.count)
    }

    /// Footer text, e.g. `Total: 1 emotion` or `Total: 3 emotions`.
    #[must_use]
    pub fn total_label(&self) -> String {
        let noun = if self.total == 1 { "emotion" } else { "emotions" };
        format!("Total: {} {noun}", self.total)
    }
}

#[allow(clippy::cast_precision_loss)]
fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64 * 100.0
}
