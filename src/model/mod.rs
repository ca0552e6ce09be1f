use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

pub mod aggregate;
pub mod state;
pub mod steps;

pub use state::{DataState, Keyed, RowChange};
pub use steps::{Steps, WorkflowStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    CodeRun,
    ScreenRecording,
    ConnectApp,
    Unknown(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text_message",
            Self::CodeRun => "code_run",
            Self::ScreenRecording => "screen_recording",
            Self::ConnectApp => "connect_app",
            Self::Unknown(kind) => kind.as_str(),
        }
    }
}

impl Default for MessageKind {
    fn default() -> Self {
        Self::Text
    }
}

impl<'de> Deserialize<'de> for MessageKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "text_message" => Self::Text,
            "code_run" => Self::CodeRun,
            "screen_recording" => Self::ScreenRecording,
            "connect_app" => Self::ConnectApp,
            _ => Self::Unknown(raw),
        })
    }
}

impl Serialize for MessageKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeRunState {
    Stopped,
    Paused,
    Running,
    Aborted,
    Finished,
    WaitingForUser,
    WindowClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeRunAction {
    Pause,
    Resume,
    Stop,
}

impl CodeRunAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pause => "Pause",
            Self::Resume => "Resume",
            Self::Stop => "Stop",
        }
    }
}

impl fmt::Display for CodeRunAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {action} a code run that is {from}")]
pub struct TransitionError {
    pub from: CodeRunState,
    pub action: CodeRunAction,
}

impl CodeRunState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Paused => "paused",
            Self::Running => "running",
            Self::Aborted => "aborted",
            Self::Finished => "finished",
            Self::WaitingForUser => "waiting_for_user",
            Self::WindowClosed => "window_closed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Paused => "Paused",
            Self::Running => "Running",
            Self::Aborted => "Aborted",
            Self::Finished => "Finished",
            Self::WaitingForUser => "Waiting for you",
            Self::WindowClosed => "Window closed",
        }
    }

    /// States set by the executor; the client only observes them.
    pub fn is_external(self) -> bool {
        matches!(
            self,
            Self::Aborted | Self::Finished | Self::WaitingForUser | Self::WindowClosed
        )
    }

    pub fn apply(self, action: CodeRunAction) -> Result<Self, TransitionError> {
        match (self, action) {
            (Self::Running, CodeRunAction::Pause) => Ok(Self::Paused),
            (Self::Paused, CodeRunAction::Resume) => Ok(Self::Running),
            (Self::Running | Self::Paused, CodeRunAction::Stop) => Ok(Self::Stopped),
            (from, action) => Err(TransitionError { from, action }),
        }
    }

    pub fn available_actions(self) -> &'static [CodeRunAction] {
        match self {
            Self::Running => &[CodeRunAction::Pause, CodeRunAction::Stop],
            Self::Paused => &[CodeRunAction::Resume, CodeRunAction::Stop],
            _ => &[],
        }
    }
}

impl fmt::Display for CodeRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub uid: String,
    #[serde(default, deserialize_with = "nullable")]
    pub is_example: bool,
    #[serde(default)]
    pub steps: Steps,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub requires_code_rewrite: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub code_approved: bool,
    #[serde(default)]
    pub model_cost: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub apps: Vec<String>,
    #[serde(default, deserialize_with = "object_or_empty")]
    pub user_inputs: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    #[serde(default, deserialize_with = "nullable")]
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(rename = "coderunEvents", default, deserialize_with = "nullable")]
    pub coderun_events: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub uid: String,
    #[serde(default)]
    pub code_output: Option<Value>,
    #[serde(default)]
    pub steps: Steps,
    #[serde(default, deserialize_with = "nullable")]
    pub text_is_currently_streaming: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub from_template: bool,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub screenrecording_url: Option<String>,
    #[serde(default, deserialize_with = "object_or_empty")]
    pub user_inputs: Map<String, Value>,
    #[serde(default)]
    pub code_run_state: Option<CodeRunState>,
    #[serde(default)]
    pub model_cost: Option<f64>,
    #[serde(default)]
    pub code_run_error: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub apps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoderunEvent {
    pub id: String,
    pub message_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "browserEvents", default, deserialize_with = "nullable")]
    pub browser_events: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub chat_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub uid: String,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub n_progress: Option<u32>,
    #[serde(default)]
    pub n_total: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    pub requires_browser: bool,
    #[serde(default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub progress_title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub control_value: Option<Value>,
    #[serde(default)]
    pub control_description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub disabled: bool,
}

impl CoderunEvent {
    /// Completed fraction in `0.0..=1.0`, when both counters are known.
    pub fn progress(&self) -> Option<f32> {
        match (self.n_progress, self.n_total) {
            (Some(done), Some(total)) if total > 0 => {
                Some((done.min(total) as f32) / (total as f32))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserEvent {
    pub id: String,
    pub coderun_event_id: String,
    pub message_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub data: Value,
    #[serde(default, deserialize_with = "nullable")]
    pub chat_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub uid: String,
    #[serde(default)]
    pub function_name: Option<String>,
}

/// Insert payload for the `chats` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewChat {
    pub title: String,
    pub uid: String,
}

/// Insert payload for the `messages` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessage {
    pub chat_id: String,
    pub uid: String,
    pub role: Role,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn object_or_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(map)) => Ok(map),
        Some(Value::Null) | None => Ok(Map::new()),
        Some(other) => {
            tracing::warn!(value = %other, "ignoring non-object user_inputs");
            Ok(Map::new())
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    pub fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0)
            .single()
            .expect("fixture timestamp should be valid")
    }

    pub fn text_message(id: &str, seconds: i64) -> Message {
        serde_json::from_value(json!({
            "id": id,
            "chat_id": "chat-1",
            "role": "user",
            "content": format!("message {id}"),
            "created_at": at(seconds),
            "type": "text_message"
        }))
        .expect("text message fixture should deserialize")
    }

    pub fn code_run_message(id: &str, seconds: i64, steps: Value) -> Message {
        serde_json::from_value(json!({
            "id": id,
            "chat_id": "chat-1",
            "role": "assistant",
            "content": "Running workflow",
            "created_at": at(seconds),
            "type": "code_run",
            "steps": steps,
            "code_run_state": "running"
        }))
        .expect("code run fixture should deserialize")
    }

    pub fn browser_event(id: &str, message_id: &str, function_name: Option<&str>) -> BrowserEvent {
        BrowserEvent {
            id: id.to_string(),
            coderun_event_id: format!("cre-{message_id}"),
            message_id: message_id.to_string(),
            created_at: at(0),
            data: json!({"action": "click", "event": id}),
            chat_id: "chat-1".to_string(),
            uid: "user-1".to_string(),
            function_name: function_name.map(ToString::to_string),
        }
    }

    pub fn coderun_event(id: &str, message_id: &str, browser_events: &[&str]) -> CoderunEvent {
        serde_json::from_value(json!({
            "id": id,
            "message_id": message_id,
            "created_at": at(0),
            "browserEvents": browser_events,
            "description": "Open the dashboard",
            "n_progress": 1,
            "n_total": 4
        }))
        .expect("coderun event fixture should deserialize")
    }
}
