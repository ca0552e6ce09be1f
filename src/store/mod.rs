//! Remote persistence seams. The UI never talks to a backend directly; it
//! goes through [`ChatStore`] and [`AuthProvider`] so the hosted REST service
//! and the in-process store are interchangeable.

use crate::error::RemoteError;
use crate::model::{BrowserEvent, Chat, CodeRunState, CoderunEvent, Message, NewChat, NewMessage};
use async_trait::async_trait;
use serde::Deserialize;

pub mod memory;
pub mod rest;

pub use memory::MemoryStore;
#[cfg(test)]
pub use memory::Operation;
pub use rest::{RestBackend, RestConfig};

/// Signed-in user as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(skip)]
    pub access_token: String,
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// All chats owned by `owner`, newest first.
    async fn select_chats(&self, owner: &str) -> Result<Vec<Chat>, RemoteError>;
    /// Inserts and returns the stored row, including server-assigned fields.
    async fn insert_chat(&self, chat: NewChat) -> Result<Chat, RemoteError>;
    async fn update_chat_title(&self, id: &str, title: &str) -> Result<Chat, RemoteError>;
    async fn delete_chat(&self, id: &str) -> Result<(), RemoteError>;

    async fn select_messages(&self, chat_id: &str) -> Result<Vec<Message>, RemoteError>;
    async fn select_coderun_events(&self, chat_id: &str)
        -> Result<Vec<CoderunEvent>, RemoteError>;
    async fn select_browser_events(&self, chat_id: &str)
        -> Result<Vec<BrowserEvent>, RemoteError>;
    async fn insert_message(&self, message: NewMessage) -> Result<Message, RemoteError>;
    async fn update_code_run_state(
        &self,
        message_id: &str,
        state: CodeRunState,
    ) -> Result<Message, RemoteError>;
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, RemoteError>;
    async fn sign_out(&self) -> Result<(), RemoteError>;
    /// The principal of a session that is still valid, if any.
    async fn current(&self) -> Result<Option<Principal>, RemoteError>;
}

/// Everything stored for one chat, fetched together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRows {
    pub messages: Vec<Message>,
    pub coderun_events: Vec<CoderunEvent>,
    pub browser_events: Vec<BrowserEvent>,
}

pub async fn fetch_chat_rows(store: &dyn ChatStore, chat_id: &str) -> Result<ChatRows, RemoteError> {
    let (messages, coderun_events, browser_events) = tokio::try_join!(
        store.select_messages(chat_id),
        store.select_coderun_events(chat_id),
        store.select_browser_events(chat_id),
    )?;
    Ok(ChatRows {
        messages,
        coderun_events,
        browser_events,
    })
}
