//! emoboard-core library.
//!
//! Records, validation, backend adapters, and the [`feed::FeedSession`] that
//! keeps a local, newest-first view of the board in sync with a remote table.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums at module boundaries; every user-facing
//!   failure carries a stable [`error::ErrorCode`].
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod backend;
pub mod board;
pub mod config;
pub mod error;
pub mod feed;
pub mod form;
pub mod legend;
pub mod model;
pub mod position;
pub mod validate;

pub use feed::{FeedError, FeedSession, FeedSnapshot};
pub use model::emotion::{Category, Emotion, EmotionRow, NewEmotion, PushEvent};
