use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, de};
use std::{fmt, str::FromStr};

/// The six emotion categories a post can be tagged with.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Sadness,
    Anger,
    Hope,
    Joy,
    Emptiness,
    Anxiety,
}

/// Display metadata for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryStyle {
    pub label: &'static str,
    pub color: &'static str,
    pub glow: &'static str,
}

impl Category {
    /// Every category, in legend order.
    pub const ALL: [Self; 6] = [
        Self::Sadness,
        Self::Anger,
        Self::Hope,
        Self::Joy,
        Self::Emptiness,
        Self::Anxiety,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sadness => "sadness",
            Self::Anger => "anger",
            Self::Hope => "hope",
            Self::Joy => "joy",
            Self::Emptiness => "emptiness",
            Self::Anxiety => "anxiety",
        }
    }

    #[must_use]
    pub const fn style(self) -> CategoryStyle {
        match self {
            Self::Sadness => CategoryStyle {
                label: "Sadness",
                color: "#3B82F6",
                glow: "#3B82F680",
            },
            Self::Anger => CategoryStyle {
                label: "Anger",
                color: "#EF4444",
                glow: "#EF444480",
            },
            Self::Hope => CategoryStyle {
                label: "Hope",
                color: "#10B981",
                glow: "#10B98180",
            },
            Self::Joy => CategoryStyle {
                label: "Joy",
                color: "#F59E0B",
                glow: "#F59E0B80",
            },
            Self::Emptiness => CategoryStyle {
                label: "Emptiness",
                color: "#E5E7EB",
                glow: "#E5E7EB80",
            },
            Self::Anxiety => CategoryStyle {
                label: "Anxiety",
                color: "#8B5CF6",
                glow: "#8B5CF680",
            },
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        self.style().label
    }

    /// Color as an `(r, g, b)` triple, parsed from the hex style color.
    #[must_use]
    pub fn rgb(self) -> (u8, u8, u8) {
        let hex = &self.style().color[1..];
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).unwrap_or(u8::MAX)
        };
        (channel(0..2), channel(2..4), channel(4..6))
    }

    /// The category following `self` in legend order, wrapping around.
    #[must_use]
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    /// The category preceding `self` in legend order, wrapping around.
    #[must_use]
    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a category tag is not one of the six known values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCategoryError {
    pub got: String,
}

impl fmt::Display for ParseCategoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid emotion: '{}' (expected one of sadness, anger, hope, joy, emptiness, anxiety)",
            self.got
        )
    }
}

impl std::error::Error for ParseCategoryError {}

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| ParseCategoryError { got: s.to_string() })
    }
}

/// A board entry as held in the local feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emotion {
    pub id: String,
    pub text: String,
    pub emotion: Category,
    /// Horizontal position in percent of the board width.
    pub x: f64,
    /// Vertical position in percent of the board height.
    pub y: f64,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// A row of the remote `emotions` table.
///
/// Numeric columns may arrive as JSON numbers or as decimal strings
/// (Postgres `numeric`), so both are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionRow {
    pub id: String,
    pub text: String,
    pub emotion: String,
    #[serde(deserialize_with = "number_or_string")]
    pub x: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub y: f64,
    pub created_at: String,
}

/// Insert payload for a new post. `id` and `created_at` are assigned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEmotion {
    pub text: String,
    pub emotion: Category,
    pub x: f64,
    pub y: f64,
}

/// A "row inserted" notification from the backend change stream.
///
/// The row is kept as raw JSON until it is merged, so a malformed payload can
/// be dropped without failing the whole subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEvent {
    pub new: serde_json::Value,
}

impl PushEvent {
    #[must_use]
    pub fn from_row(row: &EmotionRow) -> Self {
        Self {
            new: serde_json::to_value(row).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Decode the pushed row into a local record.
    ///
    /// # Errors
    ///
    /// Returns [`RowError`] if the payload is not a well-formed row.
    pub fn into_emotion(self) -> Result<Emotion, RowError> {
        let row: EmotionRow = serde_json::from_value(self.new)?;
        Emotion::try_from(row)
    }
}

/// Failure converting a backend row into an [`Emotion`].
#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error("malformed row payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Category(#[from] ParseCategoryError),
    #[error("invalid created_at timestamp '{0}'")]
    Timestamp(String),
    #[error("coordinate {axis} is not a finite number")]
    Coordinate { axis: char },
}

impl TryFrom<EmotionRow> for Emotion {
    type Error = RowError;

    fn try_from(row: EmotionRow) -> Result<Self, Self::Error> {
        let emotion = Category::from_str(&row.emotion)?;
        if !row.x.is_finite() {
            return Err(RowError::Coordinate { axis: 'x' });
        }
        if !row.y.is_finite() {
            return Err(RowError::Coordinate { axis: 'y' });
        }
        let timestamp = parse_created_at(&row.created_at)?;

        Ok(Self {
            id: row.id,
            text: row.text,
            emotion,
            x: row.x,
            y: row.y,
            timestamp,
        })
    }
}

/// Parse a backend `created_at` into epoch milliseconds.
///
/// Accepts RFC 3339 and offset-less timestamps (treated as UTC).
///
/// # Errors
///
/// Returns [`RowError::Timestamp`] if the value matches neither form.
pub fn parse_created_at(raw: &str) -> Result<i64, RowError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.timestamp_millis());
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
        .ok_or_else(|| RowError::Timestamp(raw.to_string()))
}

fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Numeric {
        Number(f64),
        Text(String),
    }

    match Numeric::deserialize(deserializer)? {
        Numeric::Number(value) => Ok(value),
        Numeric::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("expected a number, got '{text}'"))),
    }
}
