use crate::chats::ChatOutcome;
use crate::error::RemoteError;
use crate::messages::MessageOutcome;
use crate::model::RowChange;
use crate::store::Principal;

/// Results of background work, delivered to the UI thread.
#[derive(Debug, Clone)]
pub enum AppEvent {
    SessionRestored(Result<Option<Principal>, RemoteError>),
    SignedIn(Result<Principal, RemoteError>),
    SignedOut(Result<(), RemoteError>),
    Chats(ChatOutcome),
    Messages(MessageOutcome),
    Realtime {
        chat_id: String,
        changes: Vec<RowChange>,
    },
    RealtimeError {
        chat_id: String,
        error: RemoteError,
    },
}
