//! Realtime updates for the selected chat.
//!
//! A background task re-reads the chat's rows on a fixed interval and sends
//! only what changed since the previous read. The UI merges the changes by
//! id, so a duplicate or out-of-order delivery is harmless.

use crate::event::AppEvent;
use crate::model::state::TableName;
use crate::model::{BrowserEvent, CoderunEvent, Keyed, Message, RowChange};
use crate::store::{fetch_chat_rows, ChatRows, ChatStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{self, MissedTickBehavior};

/// Last rows seen per table, used to turn full reads into row changes.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    messages: HashMap<String, Message>,
    coderun_events: HashMap<String, CoderunEvent>,
    browser_events: HashMap<String, BrowserEvent>,
}

impl ChangeTracker {
    pub fn diff(&mut self, rows: ChatRows) -> Vec<RowChange> {
        let mut changes = Vec::new();
        diff_table(
            &mut self.messages,
            rows.messages,
            TableName::Messages,
            RowChange::Message,
            &mut changes,
        );
        diff_table(
            &mut self.coderun_events,
            rows.coderun_events,
            TableName::CoderunEvents,
            RowChange::CoderunEvent,
            &mut changes,
        );
        diff_table(
            &mut self.browser_events,
            rows.browser_events,
            TableName::BrowserEvents,
            RowChange::BrowserEvent,
            &mut changes,
        );
        changes
    }
}

fn diff_table<T>(
    seen: &mut HashMap<String, T>,
    rows: Vec<T>,
    table: TableName,
    wrap: fn(T) -> RowChange,
    changes: &mut Vec<RowChange>,
) where
    T: Keyed + Clone + PartialEq,
{
    let mut current = HashMap::with_capacity(rows.len());
    for row in rows {
        if seen.get(row.key()) != Some(&row) {
            changes.push(wrap(row.clone()));
        }
        current.insert(row.key().to_string(), row);
    }
    let mut removed: Vec<&String> = seen.keys().filter(|id| !current.contains_key(*id)).collect();
    removed.sort();
    for id in removed {
        changes.push(RowChange::Removed {
            table,
            id: id.clone(),
        });
    }
    *seen = current;
}

/// Stops the poller when dropped.
#[derive(Debug)]
pub struct RealtimeHandle {
    chat_id: String,
    stop: Arc<AtomicBool>,
}

impl RealtimeHandle {
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }
}

impl Drop for RealtimeHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

pub fn spawn_poller(
    runtime: &Handle,
    store: Arc<dyn ChatStore>,
    chat_id: String,
    interval: Duration,
    tx: mpsc::Sender<AppEvent>,
) -> RealtimeHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let handle = RealtimeHandle {
        chat_id: chat_id.clone(),
        stop: Arc::clone(&stop),
    };

    runtime.spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tracker = ChangeTracker::default();
        let mut failing = false;
        tracing::debug!(chat = %chat_id, "realtime poller started");

        loop {
            ticker.tick().await;
            if stop.load(Ordering::SeqCst) {
                break;
            }
            let event = match fetch_chat_rows(store.as_ref(), &chat_id).await {
                Ok(rows) => {
                    failing = false;
                    let changes = tracker.diff(rows);
                    if changes.is_empty() {
                        continue;
                    }
                    AppEvent::Realtime {
                        chat_id: chat_id.clone(),
                        changes,
                    }
                }
                // Report the first failure of a streak only.
                Err(_) if failing => continue,
                Err(error) => {
                    failing = true;
                    tracing::warn!(chat = %chat_id, %error, "realtime poll failed");
                    AppEvent::RealtimeError {
                        chat_id: chat_id.clone(),
                        error,
                    }
                }
            };
            if stop.load(Ordering::SeqCst) || tx.send(event).is_err() {
                break;
            }
        }
        tracing::debug!(chat = %chat_id, "realtime poller stopped");
    });

    handle
}
