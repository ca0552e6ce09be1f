//! Message operations for the selected chat: loading its rows, sending a
//! prompt, and pausing/resuming/stopping code runs.

use crate::error::RemoteError;
use crate::model::{
    CodeRunAction, CodeRunState, DataState, Message, MessageKind, NewMessage, Role, RowChange,
};
use crate::notify::Notifications;
use crate::store::{fetch_chat_rows, ChatRows, ChatStore};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    Loaded {
        chat_id: String,
        result: Result<ChatRows, RemoteError>,
    },
    Sent {
        chat_id: String,
        content: String,
        result: Result<Message, RemoteError>,
    },
    StateChanged {
        message_id: String,
        action: CodeRunAction,
        result: Result<Message, RemoteError>,
    },
}

pub async fn load_chat(store: &dyn ChatStore, chat_id: &str) -> MessageOutcome {
    tracing::info!(chat = chat_id, "loading messages");
    MessageOutcome::Loaded {
        chat_id: chat_id.to_string(),
        result: fetch_chat_rows(store, chat_id).await,
    }
}

pub async fn send_message(
    store: &dyn ChatStore,
    owner: &str,
    chat_id: &str,
    content: String,
) -> MessageOutcome {
    tracing::info!(chat = chat_id, chars = content.chars().count(), "sending message");
    let message = NewMessage {
        chat_id: chat_id.to_string(),
        uid: owner.to_string(),
        role: Role::User,
        content: content.clone(),
        kind: MessageKind::Text,
    };
    MessageOutcome::Sent {
        chat_id: chat_id.to_string(),
        content,
        result: store.insert_message(message).await,
    }
}

pub async fn change_code_run_state(
    store: &dyn ChatStore,
    message_id: &str,
    action: CodeRunAction,
    target: CodeRunState,
) -> MessageOutcome {
    tracing::info!(message = message_id, %action, state = %target, "changing code run state");
    MessageOutcome::StateChanged {
        message_id: message_id.to_string(),
        action,
        result: store.update_code_run_state(message_id, target).await,
    }
}

/// Prompt input with an explicit in-flight flag, so a prompt cannot be
/// submitted twice while the first is still being stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    pub input: String,
    in_flight: bool,
}

impl Composer {
    pub fn is_sending(&self) -> bool {
        self.in_flight
    }

    pub fn can_submit(&self) -> bool {
        !self.in_flight && !self.input.trim().is_empty()
    }

    /// Takes the trimmed prompt and marks a request in flight.
    pub fn begin_submit(&mut self) -> Option<String> {
        if !self.can_submit() {
            return None;
        }
        self.in_flight = true;
        let content = self.input.trim().to_string();
        self.input.clear();
        Some(content)
    }

    /// Clears the flag. A failed prompt goes back into an empty input box.
    pub fn finish(&mut self, failed: Option<String>) {
        self.in_flight = false;
        if let Some(content) = failed {
            if self.input.trim().is_empty() {
                self.input = content;
            }
        }
    }
}

/// Per-message busy flags for the run controls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunControls {
    busy: HashSet<String>,
}

impl RunControls {
    /// Returns `false` when the control is already busy.
    pub fn begin(&mut self, message_id: &str) -> bool {
        self.busy.insert(message_id.to_string())
    }

    pub fn finish(&mut self, message_id: &str) {
        self.busy.remove(message_id);
    }

    pub fn is_busy(&self, message_id: &str) -> bool {
        self.busy.contains(message_id)
    }
}

/// Everything the chat panel holds for the selected chat.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    chat_id: String,
    pub state: DataState,
    loading: bool,
    synced: bool,
    pub composer: Composer,
    pub controls: RunControls,
}

impl ChatSession {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            state: DataState::default(),
            loading: true,
            synced: false,
            composer: Composer::default(),
            controls: RunControls::default(),
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn apply(&mut self, outcome: MessageOutcome, notifications: &mut Notifications) {
        match outcome {
            MessageOutcome::Loaded { chat_id, result } => {
                if chat_id != self.chat_id {
                    tracing::debug!(chat = %chat_id, "discarding messages for another chat");
                    return;
                }
                self.loading = false;
                match result {
                    // The poller's diff may already be newer than this snapshot.
                    Ok(_) if self.synced => {
                        tracing::debug!(chat = %chat_id, "realtime already synced, skipping snapshot");
                    }
                    Ok(rows) => {
                        self.state = DataState::from_rows(
                            rows.messages,
                            rows.coderun_events,
                            rows.browser_events,
                        );
                        tracing::debug!(
                            chat = %chat_id,
                            messages = self.state.messages.len(),
                            "messages loaded"
                        );
                    }
                    Err(error) => {
                        notifications.error("Error fetching messages", &error);
                    }
                }
            }
            MessageOutcome::Sent {
                chat_id,
                content,
                result,
            } => {
                if chat_id != self.chat_id {
                    tracing::debug!(chat = %chat_id, "discarding send result for another chat");
                    return;
                }
                match result {
                    Ok(message) => {
                        self.state.apply(RowChange::Message(message));
                        self.composer.finish(None);
                    }
                    Err(error) => {
                        notifications.error("Error sending message", &error);
                        self.composer.finish(Some(content));
                    }
                }
            }
            MessageOutcome::StateChanged {
                message_id,
                action,
                result,
            } => {
                self.controls.finish(&message_id);
                match result {
                    Ok(message) if message.chat_id == self.chat_id => {
                        self.state.apply(RowChange::Message(message));
                    }
                    Ok(_) => {}
                    Err(error) => {
                        notifications.error(format!("Could not {action} the run"), &error);
                    }
                }
            }
        }
    }

    /// Realtime changes for this chat. Once applied, a later initial load
    /// no longer overwrites the cache.
    pub fn apply_changes(&mut self, changes: Vec<RowChange>) {
        self.synced = true;
        self.loading = false;
        self.state.apply_all(changes);
    }

    /// Validates a run action locally and marks its control busy.
    ///
    /// Returns the target state to write, or `None` when the action is
    /// rejected or already pending.
    pub fn request_transition(
        &mut self,
        message_id: &str,
        action: CodeRunAction,
        notifications: &mut Notifications,
    ) -> Option<CodeRunState> {
        if self.controls.is_busy(message_id) {
            return None;
        }
        let current = self
            .state
            .messages
            .get(message_id)
            .and_then(|message| message.code_run_state);
        let Some(current) = current else {
            tracing::warn!(message = message_id, "run action on a message without a run");
            return None;
        };
        match current.apply(action) {
            Ok(target) => {
                self.controls.begin(message_id);
                Some(target)
            }
            Err(error) => {
                notifications.error("Cannot change run state", &error);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{code_run_message, text_message};
    use crate::model::NewChat;
    use crate::store::{MemoryStore, Operation};
    use crate::sync::ChangeTracker;
    use serde_json::json;

    async fn store_with_chat() -> (MemoryStore, String) {
        let store = MemoryStore::new();
        let chat = store
            .insert_chat(NewChat {
                title: "t".to_string(),
                uid: "u1".to_string(),
            })
            .await
            .expect("insert chat");
        (store, chat.id)
    }

    #[test]
    fn composer_ignores_blank_and_duplicate_submits() {
        let mut composer = Composer::default();
        composer.input = "   ".to_string();
        assert_eq!(composer.begin_submit(), None);

        composer.input = " hello ".to_string();
        assert_eq!(composer.begin_submit().as_deref(), Some("hello"));
        assert!(composer.is_sending());

        composer.input = "again".to_string();
        assert_eq!(composer.begin_submit(), None);

        composer.finish(None);
        assert!(!composer.is_sending());
        assert_eq!(composer.input, "again");
    }

    #[test]
    fn failed_prompt_returns_to_empty_input() {
        let mut composer = Composer::default();
        composer.input = "book a flight".to_string();
        let content = composer.begin_submit();
        composer.finish(content);
        assert_eq!(composer.input, "book a flight");
    }

    #[tokio::test]
    async fn send_then_load_round_trips_through_the_store() {
        let (store, chat_id) = store_with_chat().await;
        let mut session = ChatSession::new(chat_id.clone());
        let mut notifications = Notifications::default();

        session.composer.input = "hello".to_string();
        let content = session.composer.begin_submit().expect("content");
        session.apply(
            send_message(&store, "u1", &chat_id, content).await,
            &mut notifications,
        );
        assert!(!session.composer.is_sending());
        assert_eq!(session.state.messages.len(), 1);

        let mut fresh = ChatSession::new(chat_id.clone());
        assert!(fresh.is_loading());
        fresh.apply(load_chat(&store, &chat_id).await, &mut notifications);
        assert!(!fresh.is_loading());
        assert_eq!(fresh.state.messages.len(), 1);
        assert!(notifications.is_empty());
    }

    #[tokio::test]
    async fn failed_send_restores_input_and_notifies() {
        let (store, chat_id) = store_with_chat().await;
        store.fail_next(Operation::InsertMessage, "too long");
        let mut session = ChatSession::new(chat_id.clone());
        let mut notifications = Notifications::default();

        session.composer.input = "hello".to_string();
        let content = session.composer.begin_submit().expect("content");
        session.apply(
            send_message(&store, "u1", &chat_id, content).await,
            &mut notifications,
        );
        assert_eq!(session.composer.input, "hello");
        assert!(session.state.messages.is_empty());
        assert_eq!(notifications.iter().count(), 1);
    }

    #[tokio::test]
    async fn results_for_another_chat_are_discarded() {
        let (store, chat_id) = store_with_chat().await;
        let mut session = ChatSession::new("other-chat");
        let mut notifications = Notifications::default();

        session.apply(load_chat(&store, &chat_id).await, &mut notifications);
        assert!(session.is_loading());
    }

    #[test]
    fn late_snapshot_does_not_overwrite_realtime_rows() {
        let mut tracker = ChangeTracker::default();
        let mut session = ChatSession::new("chat-1");
        let mut notifications = Notifications::default();

        let stale = text_message("m1", 0);
        let mut current = stale.clone();
        current.content = "partial, now complete".to_string();
        let server = ChatRows {
            messages: vec![current.clone()],
            ..ChatRows::default()
        };
        session.apply_changes(tracker.diff(server.clone()));
        assert!(!session.is_loading());

        session.apply(
            MessageOutcome::Loaded {
                chat_id: "chat-1".to_string(),
                result: Ok(ChatRows {
                    messages: vec![stale, text_message("gone", 1)],
                    ..ChatRows::default()
                }),
            },
            &mut notifications,
        );
        assert!(tracker.diff(server).is_empty());
        assert_eq!(
            session.state.messages.get("m1").map(|m| m.content.as_str()),
            Some("partial, now complete")
        );
        assert!(!session.state.messages.contains("gone"));
    }

    #[test]
    fn snapshot_before_realtime_is_merged_by_later_diffs() {
        let mut tracker = ChangeTracker::default();
        let mut session = ChatSession::new("chat-1");
        let mut notifications = Notifications::default();

        session.apply(
            MessageOutcome::Loaded {
                chat_id: "chat-1".to_string(),
                result: Ok(ChatRows {
                    messages: vec![text_message("m1", 0), text_message("m2", 1)],
                    ..ChatRows::default()
                }),
            },
            &mut notifications,
        );
        let mut edited = text_message("m1", 0);
        edited.content = "edited".to_string();
        session.apply_changes(tracker.diff(ChatRows {
            messages: vec![edited],
            ..ChatRows::default()
        }));
        assert_eq!(
            session.state.messages.get("m1").map(|m| m.content.as_str()),
            Some("edited")
        );
        assert_eq!(session.state.messages.len(), 2);
    }

    #[tokio::test]
    async fn run_transition_validates_then_marks_busy() {
        let store = MemoryStore::new();
        let message = code_run_message("m1", 0, json!([]));
        store.put_message(message.clone());
        let mut session = ChatSession::new("chat-1");
        session.state.apply(RowChange::Message(message));
        let mut notifications = Notifications::default();

        let target = session
            .request_transition("m1", CodeRunAction::Pause, &mut notifications)
            .expect("running can pause");
        assert_eq!(target, CodeRunState::Paused);
        assert!(session.controls.is_busy("m1"));
        assert_eq!(
            session.request_transition("m1", CodeRunAction::Stop, &mut notifications),
            None
        );

        let outcome = change_code_run_state(&store, "m1", CodeRunAction::Pause, target).await;
        session.apply(outcome, &mut notifications);
        assert!(!session.controls.is_busy("m1"));
        assert_eq!(
            session.state.messages.get("m1").and_then(|m| m.code_run_state),
            Some(CodeRunState::Paused)
        );
        assert!(notifications.is_empty());
    }

    #[test]
    fn invalid_transition_never_reaches_the_store() {
        let mut message = code_run_message("m1", 0, json!([]));
        message.code_run_state = Some(CodeRunState::Finished);
        let mut session = ChatSession::new("chat-1");
        session.state.apply(RowChange::Message(message));
        let mut notifications = Notifications::default();

        assert_eq!(
            session.request_transition("m1", CodeRunAction::Resume, &mut notifications),
            None
        );
        assert!(!session.controls.is_busy("m1"));
        assert_eq!(
            notifications.iter().next().map(|n| n.description.as_str()),
            Some("cannot resume a code run that is finished")
        );
    }
}
