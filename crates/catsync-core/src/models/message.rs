//! Wire messages of the `/ws/category-updates/` channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the backend did to a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateAction {
    Create,
    Update,
    Delete,
    #[serde(other)]
    Other,
}

/// Body of a `category_update` message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CategoryUpdate {
    pub action: UpdateAction,
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    /// Milliseconds since the epoch when the server emitted the change.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Server → client messages, keyed by their `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    CategoryUpdate {
        payload: CategoryUpdate,
    },
    ConnectionEstablished {
        #[serde(default)]
        message: Option<String>,
    },
    CategoriesList {
        #[serde(default)]
        categories: Option<Vec<Value>>,
        #[serde(default)]
        message: Option<String>,
    },
    Pong,
    #[serde(other)]
    Unknown,
}

/// A text frame after decoding. Frames that aren't valid JSON or don't match
/// a known shape are kept as `Unparseable` so the caller can log and drop them.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Message(ServerMessage),
    Unparseable(String),
}

impl Inbound {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(msg) => Inbound::Message(msg),
            Err(e) => Inbound::Unparseable(e.to_string()),
        }
    }
}

/// Client → server messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_category_delete() {
        let text = r#"{"type":"category_update","payload":{"action":"delete","id":10,"name":"Shoes","is_active":true,"timestamp":1714000000000}}"#;
        match Inbound::parse(text) {
            Inbound::Message(ServerMessage::CategoryUpdate { payload }) => {
                assert_eq!(payload.action, UpdateAction::Delete);
                assert_eq!(payload.id, 10);
                assert_eq!(payload.name.as_deref(), Some("Shoes"));
            }
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_action() {
        let text = r#"{"type":"category_update","payload":{"action":"reorder","id":3}}"#;
        match Inbound::parse(text) {
            Inbound::Message(ServerMessage::CategoryUpdate { payload }) => {
                assert_eq!(payload.action, UpdateAction::Other);
            }
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_categories_list() {
        let text = r#"{"type":"categories_list","message":"snapshot","categories":[{"id":1,"name":"A","is_active":true,"parent":null,"order":0,"image":"","slug":"a"}]}"#;
        match Inbound::parse(text) {
            Inbound::Message(ServerMessage::CategoriesList { categories, .. }) => {
                assert_eq!(categories.map(|c| c.len()), Some(1));
            }
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_pong_with_data() {
        assert_eq!(
            Inbound::parse(r#"{"type":"pong","data":{}}"#),
            Inbound::Message(ServerMessage::Pong)
        );
    }

    #[test]
    fn test_parse_unknown_type() {
        assert_eq!(
            Inbound::parse(r#"{"type":"promo_banner","message":"sale"}"#),
            Inbound::Message(ServerMessage::Unknown)
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(Inbound::parse("not json"), Inbound::Unparseable(_)));
        assert!(matches!(Inbound::parse(r#"{"no_type":1}"#), Inbound::Unparseable(_)));
        assert!(matches!(
            Inbound::parse(r#"{"type":"category_update"}"#),
            Inbound::Unparseable(_)
        ));
    }

    #[test]
    fn test_ping_wire_format() {
        let json = ClientMessage::Ping.to_json().expect("ping serializes");
        assert_eq!(json, r#"{"type":"ping"}"#);
    }
}
