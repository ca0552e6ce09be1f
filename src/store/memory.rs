use super::{AuthProvider, ChatStore, Principal};
use crate::error::RemoteError;
use crate::model::{
    BrowserEvent, Chat, CodeRunState, CoderunEvent, Message, MessageKind, NewChat, NewMessage,
    Role, Steps,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Store operation that can be made to fail once, for exercising error paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SelectChats,
    InsertChat,
    UpdateChat,
    DeleteChat,
    SelectMessages,
    SelectCoderunEvents,
    SelectBrowserEvents,
    InsertMessage,
    UpdateMessage,
    SignIn,
}

#[derive(Debug, Default)]
struct Tables {
    chats: Vec<Chat>,
    messages: Vec<Message>,
    coderun_events: Vec<CoderunEvent>,
    browser_events: Vec<BrowserEvent>,
    failures: HashMap<Operation, String>,
    session: Option<Principal>,
    next_id: u64,
    clock: Option<DateTime<Utc>>,
}

impl Tables {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    /// Wall-clock time, nudged forward so successive rows never tie.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.clock {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.clock = Some(stamp);
        stamp
    }

    fn check(&mut self, operation: Operation) -> Result<(), RemoteError> {
        match self.failures.remove(&operation) {
            Some(message) => Err(RemoteError::Rejected(message)),
            None => Ok(()),
        }
    }
}

/// In-process backend used by tests and the offline mode.
///
/// Any non-empty email and password sign in; the principal id is derived
/// from the email so a returning user sees their own chats.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    demo: bool,
}

impl MemoryStore {
    /// Seeds an example conversation for each user on first sign-in.
    pub fn with_demo_data() -> Self {
        Self {
            tables: Mutex::default(),
            demo: true,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn seed_demo(tables: &mut Tables, uid: &str) {
        let chat_id = tables.next_id("chat");
        let created_at = tables.tick();
        tables.chats.push(blank_chat(&chat_id, "Book a table for two", uid, created_at));

        let prompt_id = tables.next_id("message");
        let prompt_at = tables.tick();
        let mut prompt = blank_message(&prompt_id, &chat_id, uid, Role::User, prompt_at);
        prompt.content = "Find an Italian restaurant near the office and book for 7pm".to_string();
        tables.messages.push(prompt);

        let run_id = tables.next_id("message");
        let run_at = tables.tick();
        let mut run = blank_message(&run_id, &chat_id, uid, Role::Assistant, run_at);
        run.kind = MessageKind::CodeRun;
        run.content = "Running your workflow".to_string();
        run.code_run_state = Some(CodeRunState::Running);
        run.steps = Steps::from_value(&json!([
            {
                "type": "function",
                "function_name": "mock_search_restaurants",
                "description": "Search nearby restaurants",
                "input": {"cuisine": "italian", "radius_km": 2},
                "output": [
                    {"name": "Trattoria Roma", "rating": 4.6, "open": true},
                    {"name": "Osteria Verde", "rating": 4.3, "open": false}
                ]
            },
            {
                "type": "control",
                "control_type": "if",
                "control_value": "restaurant.open",
                "control_description": "Only book places that are open",
                "steps": [
                    {
                        "type": "function",
                        "function_name": "book_table",
                        "description": "Reserve a table",
                        "input": {"party_size": 2, "time": "19:00"}
                    }
                ]
            }
        ]));

        let coderun_id = tables.next_id("coderun");
        let browser_id = tables.next_id("browser");
        let event_at = tables.tick();
        tables.coderun_events.push(CoderunEvent {
            id: coderun_id.clone(),
            message_id: run_id.clone(),
            created_at: event_at,
            browser_events: vec![browser_id.clone()],
            chat_id: chat_id.clone(),
            uid: uid.to_string(),
            input: Some(json!({"cuisine": "italian"})),
            output: None,
            n_progress: Some(1),
            n_total: Some(2),
            requires_browser: true,
            function_name: Some("mock_search_restaurants".to_string()),
            progress_title: Some("Searching restaurants".to_string()),
            description: Some("Looking up places near the office".to_string()),
            control_value: None,
            control_description: None,
            disabled: false,
        });
        tables.browser_events.push(BrowserEvent {
            id: browser_id,
            coderun_event_id: coderun_id.clone(),
            message_id: run_id.clone(),
            created_at: event_at,
            data: json!({"action": "navigate", "url": "https://maps.example.com/?q=italian"}),
            chat_id: chat_id.clone(),
            uid: uid.to_string(),
            function_name: Some("mock_search_restaurants".to_string()),
        });
        run.coderun_events = vec![coderun_id];
        tables.messages.push(run);
    }
}

/// Hooks for tests that play the part of the remote writer.
#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next call of `operation` fails with `message`.
    pub fn fail_next(&self, operation: Operation, message: impl Into<String>) {
        self.lock().failures.insert(operation, message.into());
    }

    pub fn chat_count(&self) -> usize {
        self.lock().chats.len()
    }

    /// Stores or replaces a message as an external writer would.
    pub fn put_message(&self, message: Message) {
        let mut tables = self.lock();
        match tables.messages.iter_mut().find(|row| row.id == message.id) {
            Some(row) => *row = message,
            None => tables.messages.push(message),
        }
    }

    pub fn put_coderun_event(&self, event: CoderunEvent) {
        let mut tables = self.lock();
        match tables.coderun_events.iter_mut().find(|row| row.id == event.id) {
            Some(row) => *row = event,
            None => tables.coderun_events.push(event),
        }
    }

    pub fn put_browser_event(&self, event: BrowserEvent) {
        let mut tables = self.lock();
        match tables.browser_events.iter_mut().find(|row| row.id == event.id) {
            Some(row) => *row = event,
            None => tables.browser_events.push(event),
        }
    }

    pub fn remove_message(&self, id: &str) {
        self.lock().messages.retain(|row| row.id != id);
    }
}

fn blank_chat(id: &str, title: &str, uid: &str, created_at: DateTime<Utc>) -> Chat {
    Chat {
        id: id.to_string(),
        title: title.to_string(),
        created_at,
        uid: uid.to_string(),
        is_example: false,
        steps: Steps::default(),
        script: None,
        response_id: None,
        requires_code_rewrite: None,
        code_approved: false,
        model_cost: None,
        apps: Vec::new(),
        user_inputs: Map::new(),
    }
}

fn blank_message(
    id: &str,
    chat_id: &str,
    uid: &str,
    role: Role,
    created_at: DateTime<Utc>,
) -> Message {
    Message {
        id: id.to_string(),
        chat_id: chat_id.to_string(),
        role,
        content: String::new(),
        created_at,
        kind: MessageKind::Text,
        coderun_events: Vec::new(),
        uid: uid.to_string(),
        code_output: None,
        steps: Steps::default(),
        text_is_currently_streaming: false,
        from_template: false,
        script: None,
        screenrecording_url: None,
        user_inputs: Map::new(),
        code_run_state: None,
        model_cost: None,
        code_run_error: None,
        apps: Vec::new(),
    }
}

fn not_found(table: &'static str, id: &str) -> RemoteError {
    RemoteError::NotFound {
        table,
        id: id.to_string(),
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn select_chats(&self, owner: &str) -> Result<Vec<Chat>, RemoteError> {
        let mut tables = self.lock();
        tables.check(Operation::SelectChats)?;
        let mut chats: Vec<Chat> = tables
            .chats
            .iter()
            .filter(|chat| chat.uid == owner)
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(chats)
    }

    async fn insert_chat(&self, chat: NewChat) -> Result<Chat, RemoteError> {
        let mut tables = self.lock();
        tables.check(Operation::InsertChat)?;
        let id = tables.next_id("chat");
        let created_at = tables.tick();
        let row = blank_chat(&id, &chat.title, &chat.uid, created_at);
        tables.chats.push(row.clone());
        Ok(row)
    }

    async fn update_chat_title(&self, id: &str, title: &str) -> Result<Chat, RemoteError> {
        let mut tables = self.lock();
        tables.check(Operation::UpdateChat)?;
        let chat = tables
            .chats
            .iter_mut()
            .find(|chat| chat.id == id)
            .ok_or_else(|| not_found("chats", id))?;
        chat.title = title.to_string();
        Ok(chat.clone())
    }

    async fn delete_chat(&self, id: &str) -> Result<(), RemoteError> {
        let mut tables = self.lock();
        tables.check(Operation::DeleteChat)?;
        tables.chats.retain(|chat| chat.id != id);
        tables.messages.retain(|message| message.chat_id != id);
        tables.coderun_events.retain(|event| event.chat_id != id);
        tables.browser_events.retain(|event| event.chat_id != id);
        Ok(())
    }

    async fn select_messages(&self, chat_id: &str) -> Result<Vec<Message>, RemoteError> {
        let mut tables = self.lock();
        tables.check(Operation::SelectMessages)?;
        Ok(tables
            .messages
            .iter()
            .filter(|message| message.chat_id == chat_id)
            .cloned()
            .collect())
    }

    async fn select_coderun_events(
        &self,
        chat_id: &str,
    ) -> Result<Vec<CoderunEvent>, RemoteError> {
        let mut tables = self.lock();
        tables.check(Operation::SelectCoderunEvents)?;
        Ok(tables
            .coderun_events
            .iter()
            .filter(|event| event.chat_id == chat_id)
            .cloned()
            .collect())
    }

    async fn select_browser_events(
        &self,
        chat_id: &str,
    ) -> Result<Vec<BrowserEvent>, RemoteError> {
        let mut tables = self.lock();
        tables.check(Operation::SelectBrowserEvents)?;
        Ok(tables
            .browser_events
            .iter()
            .filter(|event| event.chat_id == chat_id)
            .cloned()
            .collect())
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message, RemoteError> {
        let mut tables = self.lock();
        tables.check(Operation::InsertMessage)?;
        if !tables.chats.iter().any(|chat| chat.id == message.chat_id) {
            return Err(not_found("chats", &message.chat_id));
        }
        let id = tables.next_id("message");
        let created_at = tables.tick();
        let mut row = blank_message(&id, &message.chat_id, &message.uid, message.role, created_at);
        row.content = message.content;
        row.kind = message.kind;
        tables.messages.push(row.clone());
        Ok(row)
    }

    async fn update_code_run_state(
        &self,
        message_id: &str,
        state: CodeRunState,
    ) -> Result<Message, RemoteError> {
        let mut tables = self.lock();
        tables.check(Operation::UpdateMessage)?;
        let message = tables
            .messages
            .iter_mut()
            .find(|message| message.id == message_id)
            .ok_or_else(|| not_found("messages", message_id))?;
        message.code_run_state = Some(state);
        Ok(message.clone())
    }
}

#[async_trait]
impl AuthProvider for MemoryStore {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, RemoteError> {
        let mut tables = self.lock();
        tables.check(Operation::SignIn)?;
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(RemoteError::Rejected(
                "Email and password are required".to_string(),
            ));
        }
        let uid = format!("user-{}", email.to_lowercase());
        if self.demo && !tables.chats.iter().any(|chat| chat.uid == uid) {
            Self::seed_demo(&mut tables, &uid);
        }
        let principal = Principal {
            id: uid,
            email: Some(email.to_string()),
            access_token: String::new(),
        };
        tables.session = Some(principal.clone());
        Ok(principal)
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        self.lock().session = None;
        Ok(())
    }

    async fn current(&self) -> Result<Option<Principal>, RemoteError> {
        Ok(self.lock().session.clone())
    }
}
