//! The signed-in user's chat list.
//!
//! Remote calls are plain async functions returning a [`ChatOutcome`]; the UI
//! thread folds outcomes into a [`ChatCollection`]. Local state only changes
//! after the store acknowledges, so a failure leaves the list as it was.

use crate::error::RemoteError;
use crate::model::{Chat, NewChat};
use crate::notify::Notifications;
use crate::store::ChatStore;

pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

pub fn normalize_title(title: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        DEFAULT_CHAT_TITLE.to_string()
    } else {
        title.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    Fetched {
        owner: String,
        result: Result<Vec<Chat>, RemoteError>,
    },
    Created(Result<Chat, RemoteError>),
    Deleted {
        id: String,
        result: Result<(), RemoteError>,
    },
    Renamed {
        id: String,
        result: Result<Chat, RemoteError>,
    },
}

pub async fn fetch(store: &dyn ChatStore, owner: &str) -> ChatOutcome {
    tracing::info!(owner, "fetching chats");
    ChatOutcome::Fetched {
        owner: owner.to_string(),
        result: store.select_chats(owner).await,
    }
}

pub async fn create(store: &dyn ChatStore, owner: &str, title: &str) -> ChatOutcome {
    let chat = NewChat {
        title: normalize_title(title),
        uid: owner.to_string(),
    };
    tracing::info!(owner, title = %chat.title, "creating chat");
    ChatOutcome::Created(store.insert_chat(chat).await)
}

pub async fn delete(store: &dyn ChatStore, id: &str) -> ChatOutcome {
    tracing::info!(chat = id, "deleting chat");
    ChatOutcome::Deleted {
        id: id.to_string(),
        result: store.delete_chat(id).await,
    }
}

/// Writes the title as given; only `create` falls back to the default.
pub async fn rename(store: &dyn ChatStore, id: &str, title: &str) -> ChatOutcome {
    tracing::info!(chat = id, title, "renaming chat");
    ChatOutcome::Renamed {
        id: id.to_string(),
        result: store.update_chat_title(id, title).await,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatCollection {
    chats: Vec<Chat>,
    selected: Option<String>,
    loading: bool,
}

impl ChatCollection {
    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn get(&self, id: &str) -> Option<&Chat> {
        self.chats.iter().find(|chat| chat.id == id)
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_chat(&self) -> Option<&Chat> {
        self.selected.as_deref().and_then(|id| self.get(id))
    }

    pub fn select(&mut self, id: Option<String>) {
        self.selected = id;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn begin_fetch(&mut self) {
        self.loading = true;
    }

    /// Drops everything; used when the principal goes away.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Folds a finished operation into the list, raising a toast on failure.
    ///
    /// Returns the id of a chat that was just created, so the caller can
    /// select it.
    pub fn apply(&mut self, outcome: ChatOutcome, notifications: &mut Notifications) -> Option<String> {
        match outcome {
            ChatOutcome::Fetched { result, .. } => {
                self.loading = false;
                match result {
                    Ok(chats) => self.chats = chats,
                    Err(error) => {
                        notifications.error("Error fetching chats", &error);
                    }
                }
                None
            }
            ChatOutcome::Created(Ok(chat)) => {
                let id = chat.id.clone();
                self.chats.retain(|existing| existing.id != id);
                self.chats.insert(0, chat);
                Some(id)
            }
            ChatOutcome::Created(Err(error)) => {
                notifications.error("Error creating chat", &error);
                None
            }
            ChatOutcome::Deleted { id, result } => {
                match result {
                    Ok(()) => {
                        self.chats.retain(|chat| chat.id != id);
                        if self.selected.as_deref() == Some(id.as_str()) {
                            self.selected = None;
                        }
                    }
                    Err(error) => {
                        notifications.error("Error deleting chat", &error);
                    }
                }
                None
            }
            ChatOutcome::Renamed { id, result } => {
                match result {
                    Ok(updated) => {
                        if let Some(chat) = self.chats.iter_mut().find(|chat| chat.id == id) {
                            chat.title = updated.title;
                        }
                    }
                    Err(error) => {
                        notifications.error("Error updating chat", &error);
                    }
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Operation};

    const OWNER: &str = "user-1";

    async fn seeded() -> (MemoryStore, ChatCollection, Notifications) {
        let store = MemoryStore::new();
        let mut chats = ChatCollection::default();
        let mut notifications = Notifications::default();
        for title in ["one", "two"] {
            let outcome = create(&store, OWNER, title).await;
            chats.apply(outcome, &mut notifications);
        }
        (store, chats, notifications)
    }

    fn titles(chats: &ChatCollection) -> Vec<&str> {
        chats.chats().iter().map(|chat| chat.title.as_str()).collect()
    }

    #[test]
    fn blank_titles_become_default() {
        assert_eq!(normalize_title("   "), "New Chat");
        assert_eq!(normalize_title(" Trip "), "Trip");
    }

    #[tokio::test]
    async fn create_prepends_and_returns_new_id() {
        let store = MemoryStore::new();
        let mut chats = ChatCollection::default();
        let mut notifications = Notifications::default();

        chats.apply(create(&store, OWNER, "first").await, &mut notifications);
        let created = chats.apply(create(&store, OWNER, "").await, &mut notifications);

        assert_eq!(titles(&chats), vec!["New Chat", "first"]);
        assert_eq!(created.as_deref(), Some(chats.chats()[0].id.as_str()));
        assert!(notifications.is_empty());
    }

    #[tokio::test]
    async fn failed_create_leaves_list_and_raises_one_toast() {
        let (store, mut chats, mut notifications) = seeded().await;
        let before = chats.clone();
        store.fail_next(Operation::InsertChat, "insert denied");

        let created = chats.apply(create(&store, OWNER, "three").await, &mut notifications);

        assert_eq!(created, None);
        assert_eq!(chats, before);
        assert_eq!(notifications.iter().count(), 1);
        let toast = notifications.iter().next().expect("toast");
        assert_eq!(toast.title, "Error creating chat");
        assert_eq!(toast.description, "insert denied");
    }

    #[tokio::test]
    async fn fetch_orders_newest_first_and_clears_loading() {
        let (store, _, mut notifications) = seeded().await;
        let mut chats = ChatCollection::default();
        chats.begin_fetch();
        assert!(chats.is_loading());

        chats.apply(fetch(&store, OWNER).await, &mut notifications);
        assert!(!chats.is_loading());
        assert_eq!(titles(&chats), vec!["two", "one"]);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_existing_rows() {
        let (store, mut chats, mut notifications) = seeded().await;
        store.fail_next(Operation::SelectChats, "offline");
        chats.apply(fetch(&store, OWNER).await, &mut notifications);
        assert_eq!(titles(&chats), vec!["two", "one"]);
        assert_eq!(notifications.iter().next().map(|n| n.title.as_str()), Some("Error fetching chats"));
    }

    #[tokio::test]
    async fn deleting_selected_chat_clears_selection() {
        let (store, mut chats, mut notifications) = seeded().await;
        let id = chats.chats()[0].id.clone();
        chats.select(Some(id.clone()));

        chats.apply(delete(&store, &id).await, &mut notifications);
        assert_eq!(titles(&chats), vec!["one"]);
        assert_eq!(chats.selected(), None);
        assert!(chats.get(&id).is_none());
    }

    #[tokio::test]
    async fn rename_patches_in_place() {
        let (store, mut chats, mut notifications) = seeded().await;
        let id = chats.chats()[1].id.clone();

        chats.apply(rename(&store, &id, "renamed").await, &mut notifications);
        assert_eq!(titles(&chats), vec!["two", "renamed"]);

        chats.apply(rename(&store, &id, "  ").await, &mut notifications);
        assert_eq!(titles(&chats), vec!["two", "  "]);

        store.fail_next(Operation::UpdateChat, "nope");
        chats.apply(rename(&store, &id, "again").await, &mut notifications);
        assert_eq!(titles(&chats), vec!["two", "  "]);
        assert_eq!(notifications.iter().count(), 1);
    }

    #[tokio::test]
    async fn delete_is_retry_safe() {
        let (store, mut chats, mut notifications) = seeded().await;
        let id = chats.chats()[0].id.clone();
        chats.apply(delete(&store, &id).await, &mut notifications);
        chats.apply(delete(&store, &id).await, &mut notifications);
        assert_eq!(chats.chats().len(), 1);
        assert!(notifications.is_empty());
    }
}
