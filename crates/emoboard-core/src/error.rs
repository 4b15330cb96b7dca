use std::fmt;

/// Machine-readable error codes for scripts and JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MissingEndpoint,
    MissingAccessKey,
    UnsupportedEndpoint,
    ConfigParseError,
    EmptyText,
    TextTooLong,
    InvalidCategory,
    LoadFailed,
    InsertFailed,
    EmptyInsertResult,
    SubscribeFailed,
    RecordNotFound,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingEndpoint => "E1001",
            Self::MissingAccessKey => "E1002",
            Self::UnsupportedEndpoint => "E1003",
            Self::ConfigParseError => "E1004",
            Self::EmptyText => "E2001",
            Self::TextTooLong => "E2002",
            Self::InvalidCategory => "E2003",
            Self::LoadFailed => "E3001",
            Self::InsertFailed => "E3002",
            Self::EmptyInsertResult => "E3003",
            Self::SubscribeFailed => "E3004",
            Self::RecordNotFound => "E4001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingEndpoint => "Backend endpoint URL not configured",
            Self::MissingAccessKey => "Backend access key not configured",
            Self::UnsupportedEndpoint => "Unsupported backend endpoint",
            Self::ConfigParseError => "Config file parse error",
            Self::EmptyText => "Text is empty",
            Self::TextTooLong => "Text is too long",
            Self::InvalidCategory => "Unknown emotion category",
            Self::LoadFailed => "Failed to load emotions",
            Self::InsertFailed => "Failed to add emotion",
            Self::EmptyInsertResult => "Backend returned no created row",
            Self::SubscribeFailed => "Live feed subscription failed",
            Self::RecordNotFound => "Emotion not found",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::MissingEndpoint => {
                Some("Set EMOBOARD_URL, pass --endpoint, or add `endpoint` to .emoboard/config.toml.")
            }
            Self::MissingAccessKey => {
                Some("Set EMOBOARD_KEY, pass --key, or add `access_key` to .emoboard/config.toml.")
            }
            Self::UnsupportedEndpoint => {
                Some("Use an http(s):// URL, sqlite://<path>, or memory: as the endpoint.")
            }
            Self::ConfigParseError => Some("Fix syntax in .emoboard/config.toml and retry."),
            Self::EmptyText => Some("Write a few words about how you feel."),
            Self::TextTooLong => Some("Shorten the text to at most 100 characters."),
            Self::InvalidCategory => {
                Some("Use one of: sadness, anger, hope, joy, emptiness, anxiety.")
            }
            Self::LoadFailed | Self::SubscribeFailed => {
                Some("Check the endpoint and key, then reload.")
            }
            Self::InsertFailed | Self::EmptyInsertResult => Some("Retry the submission."),
            Self::RecordNotFound => Some("Run `eb list` to see the ids currently on the board."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
