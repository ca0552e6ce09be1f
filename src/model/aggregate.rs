//! Read-only derivations from a [`DataState`] snapshot into what the chat and
//! workflow panels draw. Nothing here mutates its input, so every function is
//! safe to call once per frame.

use super::steps::WorkflowStep;
use super::{BrowserEvent, CoderunEvent, DataState, Message, MessageKind, Role};
use std::collections::BTreeMap;

/// A workflow step together with the browser events correlated to it.
#[derive(Debug, Clone, PartialEq)]
pub struct StepView<'a> {
    pub step: &'a WorkflowStep,
    pub browser_events: Vec<&'a BrowserEvent>,
    pub children: Vec<StepView<'a>>,
}

impl StepView<'_> {
    pub fn is_augmented(&self) -> bool {
        !self.browser_events.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoderunView<'a> {
    pub event: &'a CoderunEvent,
    pub browser_events: Vec<&'a BrowserEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageView<'a> {
    Text(&'a Message),
    CodeRun {
        message: &'a Message,
        steps: Vec<StepView<'a>>,
        coderun: Vec<CoderunView<'a>>,
    },
    ScreenRecording {
        message: &'a Message,
        url: Option<&'a str>,
    },
    ConnectApp {
        message: &'a Message,
        apps: &'a [String],
    },
    /// Message type this client does not know; drawn as plain text.
    Fallback(&'a Message),
}

impl<'a> MessageView<'a> {
    pub fn message(&self) -> &'a Message {
        match self {
            Self::Text(message) | Self::Fallback(message) => *message,
            Self::CodeRun { message, .. }
            | Self::ScreenRecording { message, .. }
            | Self::ConnectApp { message, .. } => *message,
        }
    }
}

/// Messages ascending by `created_at`; equal timestamps keep table order.
pub fn sorted_messages(state: &DataState) -> Vec<&Message> {
    let mut messages: Vec<&Message> = state.messages.iter().collect();
    messages.sort_by_key(|message| message.created_at);
    messages
}

/// The last user message sorted before `message`: the prompt it answers.
pub fn prompt_for<'a>(state: &'a DataState, message: &Message) -> Option<&'a Message> {
    sorted_messages(state)
        .into_iter()
        .take_while(|candidate| candidate.id != message.id)
        .filter(|candidate| candidate.role == Role::User)
        .last()
}

pub fn workflow_steps<'a>(state: &'a DataState, message: &'a Message) -> Vec<StepView<'a>> {
    if message.kind != MessageKind::CodeRun {
        return Vec::new();
    }
    message
        .steps
        .items()
        .iter()
        .map(|step| step_view(state, &message.id, step))
        .collect()
}

fn step_view<'a>(state: &'a DataState, message_id: &str, step: &'a WorkflowStep) -> StepView<'a> {
    StepView {
        step,
        browser_events: step
            .function_name()
            .map(|name| matching_browser_events(state, message_id, name))
            .unwrap_or_default(),
        children: step
            .children()
            .iter()
            .map(|child| step_view(state, message_id, child))
            .collect(),
    }
}

/// Browser events of `message_id` recorded for `function_name`, in table order.
///
/// Every step of the message that calls the same function receives this same
/// list.
pub fn matching_browser_events<'a>(
    state: &'a DataState,
    message_id: &str,
    function_name: &str,
) -> Vec<&'a BrowserEvent> {
    state
        .browser_events
        .iter()
        .filter(|event| {
            event.message_id == message_id && event.function_name.as_deref() == Some(function_name)
        })
        .collect()
}

pub fn browser_events_by_function<'a>(
    state: &'a DataState,
    message_id: &str,
) -> BTreeMap<&'a str, Vec<&'a BrowserEvent>> {
    let mut grouped: BTreeMap<&str, Vec<&BrowserEvent>> = BTreeMap::new();
    for event in state.browser_events.iter() {
        if event.message_id != message_id {
            continue;
        }
        if let Some(name) = event.function_name.as_deref() {
            grouped.entry(name).or_default().push(event);
        }
    }
    grouped
}

/// Resolves the message's run-event ids; ids with no row are skipped.
pub fn coderun_views<'a>(state: &'a DataState, message: &'a Message) -> Vec<CoderunView<'a>> {
    message
        .coderun_events
        .iter()
        .filter_map(|id| state.coderun_events.get(id))
        .map(|event| CoderunView {
            event,
            browser_events: event
                .browser_events
                .iter()
                .filter_map(|id| state.browser_events.get(id))
                .collect(),
        })
        .collect()
}

pub fn message_view<'a>(state: &'a DataState, message: &'a Message) -> MessageView<'a> {
    match &message.kind {
        MessageKind::Text => MessageView::Text(message),
        MessageKind::CodeRun => MessageView::CodeRun {
            message,
            steps: workflow_steps(state, message),
            coderun: coderun_views(state, message),
        },
        MessageKind::ScreenRecording => MessageView::ScreenRecording {
            message,
            url: message
                .screenrecording_url
                .as_deref()
                .filter(|url| !url.is_empty()),
        },
        MessageKind::ConnectApp => MessageView::ConnectApp {
            message,
            apps: &message.apps,
        },
        MessageKind::Unknown(kind) => {
            tracing::debug!(message_id = %message.id, %kind, "rendering unknown message type as text");
            MessageView::Fallback(message)
        }
    }
}

pub fn render_model(state: &DataState) -> Vec<MessageView<'_>> {
    sorted_messages(state)
        .into_iter()
        .map(|message| message_view(state, message))
        .collect()
}
