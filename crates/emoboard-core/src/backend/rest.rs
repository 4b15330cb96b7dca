//! Hosted REST backend (PostgREST dialect).
//!
//! - read: `GET {url}/rest/v1/emotions?select=*&order=created_at.desc&limit=N`
//! - insert: `POST {url}/rest/v1/emotions` with `Prefer: return=representation`
//!
//! Every request carries the access key as both `apikey` and bearer token.
//! The change stream polls for rows at or after the newest `created_at` seen.
//!
//! Responses are decoded row by row. A row that does not fit [`EmotionRow`]
//! is skipped on load and forwarded raw on the change stream, where the feed
//! drops it, so one bad row never blocks the rest.

use super::poller::{self, ChangeSource};
use super::{BackendError, EmotionBackend, Subscription, TABLE};
use crate::config::FeedSettings;
use crate::model::emotion::{EmotionRow, NewEmotion};
use std::collections::HashSet;
use std::time::Duration;
use serde_json::Value;
use tracing::{debug, trace, warn};

const POLL_BATCH: usize = 256;

#[derive(Clone)]
struct RestClient {
    agent: ureq::Agent,
    table_url: String,
    key: String,
}

impl RestClient {
    fn get(&self) -> ureq::Request {
        self.authorize(self.agent.get(&self.table_url))
    }

    fn post(&self) -> ureq::Request {
        self.authorize(self.agent.post(&self.table_url))
    }

    fn authorize(&self, request: ureq::Request) -> ureq::Request {
        request
            .set("apikey", &self.key)
            .set("Authorization", &format!("Bearer {}", self.key))
            .set("Accept", "application/json")
    }

    /// Run `request` and return the raw rows of the JSON array it answers with.
    fn fetch(&self, request: ureq::Request) -> Result<Vec<Value>, BackendError> {
        let response = request.call().map_err(map_ureq_error)?;
        response
            .into_json::<Vec<Value>>()
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

/// `emotions` table behind a hosted REST endpoint.
pub struct RestBackend {
    client: RestClient,
    poll_interval: Duration,
}

impl RestBackend {
    /// Client for the service at `base_url`, authenticated with `key`.
    #[must_use]
    pub fn new(base_url: &str, key: &str, feed: &FeedSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(feed.http_timeout())
            .user_agent(concat!("emoboard/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            client: RestClient {
                agent,
                table_url: table_url(base_url),
                key: key.to_string(),
            },
            poll_interval: feed.poll_interval(),
        }
    }

    /// Full URL of the `emotions` resource.
    #[must_use]
    pub fn table_url(&self) -> &str {
        &self.client.table_url
    }
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("table_url", &self.client.table_url)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

fn table_url(base_url: &str) -> String {
    format!("{}/rest/v1/{TABLE}", base_url.trim_end_matches('/'))
}

/// Pull the service's `message` field out of an error body, if it has one.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(ToString::to_string)
}

/// `created_at` and `id` of a raw row, the two columns the cursor needs.
fn cursor_key(row: &Value) -> Option<(&str, String)> {
    let created_at = row.get("created_at")?.as_str()?;
    let id = match row.get("id")? {
        Value::String(id) => id.clone(),
        Value::Null => return None,
        other => other.to_string(),
    };
    Some((created_at, id))
}

fn display_id(row: &Value) -> String {
    match row.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(other) => other.to_string(),
        None => "?".to_string(),
    }
}

fn map_ureq_error(error: ureq::Error) -> BackendError {
    match error {
        ureq::Error::Status(status, response) => {
            let status_text = response.status_text().to_string();
            let body = response.into_string().unwrap_or_default();
            let message = error_message(&body)
                .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
                .unwrap_or(status_text);
            BackendError::Status { status, message }
        }
        ureq::Error::Transport(transport) => BackendError::Transport(transport.to_string()),
    }
}

impl EmotionBackend for RestBackend {
    fn fetch_recent(&self, limit: usize) -> Result<Vec<EmotionRow>, BackendError> {
        let request = self
            .client
            .get()
            .query("select", "*")
            .query("order", "created_at.desc")
            .query("limit", &limit.to_string());
        let raw = self.client.fetch(request)?;
        let fetched = raw.len();
        let rows: Vec<EmotionRow> = raw
            .into_iter()
            .filter_map(|value| {
                let id = display_id(&value);
                serde_json::from_value(value)
                    .map_err(|error| warn!(%id, %error, "skipping undecodable row"))
                    .ok()
            })
            .collect();
        debug!(rows = rows.len(), fetched, limit, "rest fetch");
        Ok(rows)
    }

    fn insert(&self, row: &NewEmotion) -> Result<Option<EmotionRow>, BackendError> {
        let response = self
            .client
            .post()
            .set("Prefer", "return=representation")
            .send_json(serde_json::json!([row]))
            .map_err(map_ureq_error)?;
        let mut rows = response
            .into_json::<Vec<EmotionRow>>()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows.swap_remove(0)))
    }

    fn subscribe(&self) -> Result<Subscription, BackendError> {
        let newest = self.client.fetch(
            self.client
                .get()
                .query("select", "*")
                .query("order", "created_at.desc")
                .query("limit", "1"),
        )?;
        let mut changes = RestChanges {
            client: self.client.clone(),
            cursor: None,
            seen_at_cursor: HashSet::new(),
        };
        if let Some((created_at, id)) = newest.first().and_then(cursor_key) {
            changes.advance(created_at, &id);
        }
        poller::spawn(changes, self.poll_interval)
    }
}

/// Cursor over `created_at`. Rows sharing the cursor timestamp are told
/// apart by id so a `gte` query never redelivers them.
struct RestChanges {
    client: RestClient,
    cursor: Option<String>,
    seen_at_cursor: HashSet<String>,
}

impl RestChanges {
    /// Record the row `id` at `created_at` as delivered. Returns `false` if it
    /// already was.
    fn advance(&mut self, created_at: &str, id: &str) -> bool {
        if self.cursor.as_deref() == Some(created_at) {
            return self.seen_at_cursor.insert(id.to_string());
        }
        self.cursor = Some(created_at.to_string());
        self.seen_at_cursor.clear();
        self.seen_at_cursor.insert(id.to_string());
        true
    }
}

impl ChangeSource for RestChanges {
    fn name(&self) -> &'static str {
        "rest"
    }

    fn poll_new(&mut self) -> Result<Vec<Value>, BackendError> {
        let mut request = self
            .client
            .get()
            .query("select", "*")
            .query("order", "created_at.asc")
            .query("limit", &POLL_BATCH.to_string());
        if let Some(cursor) = &self.cursor {
            request = request.query("created_at", &format!("gte.{cursor}"));
        }

        let rows = self.client.fetch(request)?;
        let mut fresh = Vec::new();
        for row in rows {
            // Without these two columns a row can't be placed against the
            // cursor and would come back on every poll.
            let Some((created_at, id)) = cursor_key(&row) else {
                warn!(id = %display_id(&row), "skipping change row without created_at or id");
                continue;
            };
            if self.advance(created_at, &id) {
                fresh.push(row);
            }
        }
        trace!(fresh = fresh.len(), "rest change poll");
        Ok(fresh)
    }
}
