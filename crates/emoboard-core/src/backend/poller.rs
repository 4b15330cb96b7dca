//! Polling change stream shared by the out-of-process adapters.

use super::{BackendError, Subscription};
use crate::model::emotion::PushEvent;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Something that can report rows inserted since its last call.
pub(super) trait ChangeSource: Send + 'static {
    /// Short name used for the thread and log fields.
    fn name(&self) -> &'static str;

    /// Rows inserted since the previous call, oldest first.
    fn poll_new(&mut self) -> Result<Vec<serde_json::Value>, BackendError>;
}

/// Start a poller thread for `source` and hand back its subscription.
///
/// The thread exits when the subscription is dropped or the receiver hangs up.
pub(super) fn spawn<S: ChangeSource>(
    source: S,
    interval: Duration,
) -> Result<Subscription, BackendError> {
    let (tx, rx) = mpsc::channel();
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let name = source.name();

    let handle = thread::Builder::new()
        .name(format!("emoboard-{name}-poller"))
        .spawn(move || run(source, &tx, &stop_flag, interval))
        .map_err(|e| BackendError::Unavailable(format!("failed to start {name} poller: {e}")))?;

    let thread = handle.thread().clone();
    debug!(source = name, ?interval, "change poller started");

    Ok(Subscription::new(
        rx,
        Some(Box::new(move || {
            stop.store(true, Ordering::SeqCst);
            thread.unpark();
        })),
    ))
}

fn run<S: ChangeSource>(
    mut source: S,
    tx: &Sender<PushEvent>,
    stop: &AtomicBool,
    interval: Duration,
) {
    let name = source.name();
    while !stop.load(Ordering::SeqCst) {
        match source.poll_new() {
            Ok(rows) => {
                trace!(source = name, rows = rows.len(), "change poll");
                for row in rows {
                    if tx.send(PushEvent { new: row }).is_err() {
                        debug!(source = name, "subscriber hung up, stopping poller");
                        return;
                    }
                }
            }
            Err(error) => warn!(source = name, %error, "change poll failed"),
        }
        thread::park_timeout(interval);
    }
    debug!(source = name, "change poller stopped");
}
