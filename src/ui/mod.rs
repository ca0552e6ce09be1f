//! egui renderers. Each one draws from borrowed state and reports user intent
//! through an `emit` callback; the app applies it after the frame.

pub mod chat_list;
pub mod event;
pub mod key_value;
pub mod login;
pub mod message_list;
pub mod table;
pub mod toasts;
pub mod workflow;

pub use chat_list::{render_chat_list, RenameDraft};
pub use event::UiAction;
pub use login::render_login;
pub use message_list::render_messages;
pub use toasts::render_toasts;
pub use workflow::{render_workflow, WorkflowEditors};
