use crate::chats;
use crate::error::RemoteError;
use crate::event::AppEvent;
use crate::messages;
use crate::model::{CodeRunAction, CodeRunState};
use crate::store::{AuthProvider, ChatStore};
use crate::sync::{spawn_poller, RealtimeHandle};
use std::future::Future;
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tokio::runtime::Handle;

/// Runs store and auth calls on the tokio runtime and reports each result
/// back to the UI thread as an [`AppEvent`].
#[derive(Clone)]
pub struct BackendClient {
    store: Arc<dyn ChatStore>,
    auth: Arc<dyn AuthProvider>,
    tx: mpsc::Sender<AppEvent>,
    runtime_handle: Handle,
    poll_interval: Duration,
}

impl BackendClient {
    pub fn new(
        store: Arc<dyn ChatStore>,
        auth: Arc<dyn AuthProvider>,
        tx: mpsc::Sender<AppEvent>,
        poll_interval: Duration,
    ) -> Result<Self, RemoteError> {
        let runtime_handle = Handle::try_current().map_err(|err| {
            RemoteError::Transport(format!("tokio runtime unavailable: {err}"))
        })?;
        Ok(Self {
            store,
            auth,
            tx,
            runtime_handle,
            poll_interval,
        })
    }

    fn dispatch<F>(&self, task: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        let tx = self.tx.clone();
        self.runtime_handle.spawn(async move {
            // The window may already be gone.
            let _ = tx.send(task.await);
        });
    }

    pub fn restore_session(&self) {
        let auth = Arc::clone(&self.auth);
        self.dispatch(async move { AppEvent::SessionRestored(auth.current().await) });
    }

    pub fn sign_in(&self, email: String, password: String) {
        let auth = Arc::clone(&self.auth);
        self.dispatch(async move { AppEvent::SignedIn(auth.sign_in(&email, &password).await) });
    }

    pub fn sign_out(&self) {
        let auth = Arc::clone(&self.auth);
        self.dispatch(async move { AppEvent::SignedOut(auth.sign_out().await) });
    }

    pub fn fetch_chats(&self, owner: &str) {
        let store = Arc::clone(&self.store);
        let owner = owner.to_string();
        self.dispatch(async move { AppEvent::Chats(chats::fetch(store.as_ref(), &owner).await) });
    }

    pub fn create_chat(&self, owner: &str, title: &str) {
        let store = Arc::clone(&self.store);
        let owner = owner.to_string();
        let title = title.to_string();
        self.dispatch(async move {
            AppEvent::Chats(chats::create(store.as_ref(), &owner, &title).await)
        });
    }

    pub fn delete_chat(&self, id: &str) {
        let store = Arc::clone(&self.store);
        let id = id.to_string();
        self.dispatch(async move { AppEvent::Chats(chats::delete(store.as_ref(), &id).await) });
    }

    pub fn rename_chat(&self, id: &str, title: &str) {
        let store = Arc::clone(&self.store);
        let id = id.to_string();
        let title = title.to_string();
        self.dispatch(async move {
            AppEvent::Chats(chats::rename(store.as_ref(), &id, &title).await)
        });
    }

    pub fn load_chat(&self, chat_id: &str) {
        let store = Arc::clone(&self.store);
        let chat_id = chat_id.to_string();
        self.dispatch(async move {
            AppEvent::Messages(messages::load_chat(store.as_ref(), &chat_id).await)
        });
    }

    pub fn send_message(&self, owner: &str, chat_id: &str, content: String) {
        let store = Arc::clone(&self.store);
        let owner = owner.to_string();
        let chat_id = chat_id.to_string();
        self.dispatch(async move {
            AppEvent::Messages(
                messages::send_message(store.as_ref(), &owner, &chat_id, content).await,
            )
        });
    }

    pub fn change_code_run_state(
        &self,
        message_id: &str,
        action: CodeRunAction,
        target: CodeRunState,
    ) {
        let store = Arc::clone(&self.store);
        let message_id = message_id.to_string();
        self.dispatch(async move {
            AppEvent::Messages(
                messages::change_code_run_state(store.as_ref(), &message_id, action, target)
                    .await,
            )
        });
    }

    /// Starts realtime updates for `chat_id`; they stop when the handle drops.
    pub fn watch_chat(&self, chat_id: &str) -> RealtimeHandle {
        spawn_poller(
            &self.runtime_handle,
            Arc::clone(&self.store),
            chat_id.to_string(),
            self.poll_interval,
            self.tx.clone(),
        )
    }
}
