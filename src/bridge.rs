//! Messages between the chat view and detached views of the same session.
//!
//! Fire-and-forget: nothing is acknowledged, and publishing with nobody
//! listening is fine.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BridgeMessage {
    Jump {
        #[serde(rename = "messageId")]
        message_id: String,
    },
}

impl BridgeMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct WindowBridge {
    tx: broadcast::Sender<BridgeMessage>,
}

impl Default for WindowBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowBridge {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeMessage> {
        self.tx.subscribe()
    }

    /// Asks every view to bring `message_id` into sight.
    pub fn jump(&self, message_id: &str) {
        self.publish(BridgeMessage::Jump {
            message_id: message_id.to_string(),
        });
    }

    pub fn publish(&self, message: BridgeMessage) {
        tracing::debug!(message = %message.to_json(), "bridge publish");
        // An error only means there are no subscribers.
        let _ = self.tx.send(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn jump_has_the_window_message_shape() {
        let message = BridgeMessage::Jump {
            message_id: "m-7".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&message).expect("serialize"),
            json!({"type": "jump", "payload": {"messageId": "m-7"}})
        );
        let parsed: BridgeMessage =
            serde_json::from_value(json!({"type": "jump", "payload": {"messageId": "m-7"}}))
                .expect("deserialize");
        assert_eq!(parsed, message);
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        WindowBridge::new().jump("m-1");
    }

    #[tokio::test]
    async fn every_subscriber_receives_the_jump() {
        let bridge = WindowBridge::new();
        let mut first = bridge.subscribe();
        let mut second = bridge.subscribe();

        bridge.jump("m-3");

        let expected = BridgeMessage::Jump {
            message_id: "m-3".to_string(),
        };
        assert_eq!(first.recv().await.expect("first"), expected);
        assert_eq!(second.recv().await.expect("second"), expected);
    }
}
