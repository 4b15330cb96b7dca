//! Board geometry: where dots land and where the tooltip goes.
//!
//! Positions are percentages of the board extent. Renderers map them onto
//! whatever grid they draw on, pixels or terminal cells.

use crate::model::emotion::Emotion;
use chrono::{Local, TimeZone, Utc};
use serde::Serialize;

/// Cell holding a dot at `(x%, y%)` on a `width × height` grid.
///
/// Returns `None` for an empty grid.
#[must_use]
pub fn dot_cell(x: f64, y: f64, width: u16, height: u16) -> Option<(u16, u16)> {
    if width == 0 || height == 0 {
        return None;
    }
    Some((scale(x, width), scale(y, height)))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale(percent: f64, extent: u16) -> u16 {
    let last = f64::from(extent - 1);
    let cell = (percent / 100.0 * last).round();
    if cell.is_nan() {
        return 0;
    }
    cell.clamp(0.0, last) as u16
}

/// Index of the dot closest to `(col, row)`, if one lies within `reach`
/// cells on both axes.
#[must_use]
pub fn nearest_dot(
    emotions: &[Emotion],
    (col, row): (u16, u16),
    (width, height): (u16, u16),
    reach: u16,
) -> Option<usize> {
    emotions
        .iter()
        .enumerate()
        .filter_map(|(idx, emotion)| {
            let (c, r) = dot_cell(emotion.x, emotion.y, width, height)?;
            let dx = c.abs_diff(col);
            let dy = r.abs_diff(row);
            let distance = u32::from(dx).pow(2) + u32::from(dy).pow(2);
            (dx <= reach && dy <= reach).then_some((idx, distance))
        })
        .min_by_key(|&(_, distance)| distance)
        .map(|(idx, _)| idx)
}

/// Tooltip placement constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TooltipLayout {
    pub offset_x: f64,
    pub offset_y: f64,
    pub width: f64,
    pub margin: f64,
    pub min_top: f64,
}

impl Default for TooltipLayout {
    /// Pixel units.
    fn default() -> Self {
        Self {
            offset_x: 15.0,
            offset_y: 10.0,
            width: 280.0,
            margin: 16.0,
            min_top: 8.0,
        }
    }
}

impl TooltipLayout {
    /// Terminal cell units.
    #[must_use]
    pub const fn cells() -> Self {
        Self {
            offset_x: 2.0,
            offset_y: 1.0,
            width: 36.0,
            margin: 1.0,
            min_top: 1.0,
        }
    }

    /// Top-left corner of the tooltip for a pointer at `(x, y)`.
    ///
    /// The tooltip sits right of the pointer but never past the viewport's
    /// right margin, and never above `min_top`. On a viewport narrower than
    /// the tooltip, `left` is pinned to 0.
    #[must_use]
    pub fn origin(&self, (x, y): (f64, f64), viewport_width: f64) -> (f64, f64) {
        let left = (x + self.offset_x)
            .min(viewport_width - self.width - self.margin)
            .max(0.0);
        let top = (y - self.offset_y).max(self.min_top);
        (left, top)
    }
}

/// Text content of a tooltip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tooltip {
    pub label: &'static str,
    pub color: &'static str,
    pub text: String,
    pub timestamp: String,
}

impl Tooltip {
    /// Tooltip with the timestamp in the local time zone.
    #[must_use]
    pub fn for_emotion(emotion: &Emotion) -> Self {
        Self::for_emotion_in(emotion, &Local)
    }

    #[must_use]
    pub fn for_emotion_in<Tz: TimeZone>(emotion: &Emotion, tz: &Tz) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let style = emotion.emotion.style();
        Self {
            label: style.label,
            color: style.color,
            text: emotion.text.clone(),
            timestamp: format_timestamp_in(emotion.timestamp, tz),
        }
    }
}

/// Render epoch milliseconds as `D.MM.YYYY, HH:MM:SS` in `tz`.
#[must_use]
pub fn format_timestamp_in<Tz: TimeZone>(millis: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    Utc.timestamp_millis_opt(millis).single().map_or_else(
        || millis.to_string(),
        |utc| {
            utc.with_timezone(tz)
                .format("%-d.%m.%Y, %H:%M:%S")
                .to_string()
        },
    )
}
