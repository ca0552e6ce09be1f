use crate::model::CodeRunAction;
use serde_json::Value;

/// Something the user did in a panel, handled by the app after the frame.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    SelectChat(String),
    CreateChat,
    DeleteChat(String),
    RenameChat { id: String, title: String },
    SignOut,
    SendPrompt,
    RunAction {
        message_id: String,
        action: CodeRunAction,
    },
    OpenWorkflow(String),
    CloseWorkflow,
    Jump(String),
    InputCommitted {
        message_id: String,
        step: String,
        value: Value,
    },
}

impl UiAction {
    pub fn to_log_line(&self) -> String {
        match self {
            Self::SelectChat(id) => format!("select_chat id={id}"),
            Self::CreateChat => "create_chat".to_string(),
            Self::DeleteChat(id) => format!("delete_chat id={id}"),
            Self::RenameChat { id, title } => format!("rename_chat id={id} title={title}"),
            Self::SignOut => "sign_out".to_string(),
            Self::SendPrompt => "send_prompt".to_string(),
            Self::RunAction { message_id, action } => {
                format!("run_action message_id={message_id} action={action}")
            }
            Self::OpenWorkflow(id) => format!("open_workflow message_id={id}"),
            Self::CloseWorkflow => "close_workflow".to_string(),
            Self::Jump(id) => format!("jump message_id={id}"),
            Self::InputCommitted {
                message_id,
                step,
                value,
            } => format!("input_committed message_id={message_id} step={step} value={value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn log_lines_name_the_action_and_its_target() {
        assert_eq!(
            UiAction::RunAction {
                message_id: "m1".to_string(),
                action: CodeRunAction::Pause,
            }
            .to_log_line(),
            "run_action message_id=m1 action=pause"
        );
        assert_eq!(
            UiAction::InputCommitted {
                message_id: "m1".to_string(),
                step: "step 0".to_string(),
                value: json!({"city": "Porto"}),
            }
            .to_log_line(),
            r#"input_committed message_id=m1 step=step 0 value={"city":"Porto"}"#
        );
    }
}
