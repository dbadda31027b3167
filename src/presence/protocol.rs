//! Realtime wire messages. Every frame is a JSON object tagged by `type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Operation, OperationRequest};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorPosition {
    pub position: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

/// Public view of one connected session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub session_id: String,
    pub user_id: String,
    pub user_name: String,
    pub color: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<Selection>,
    pub is_typing: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerCursor {
    pub session_id: String,
    pub user_id: String,
    pub user_name: String,
    pub color: &'static str,
    #[serde(flatten)]
    pub cursor: CursorPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerSelection {
    pub session_id: String,
    pub user_id: String,
    pub user_name: String,
    pub color: &'static str,
    #[serde(flatten)]
    pub selection: Selection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JoinUser {
    pub name: Option<String>,
}

/// Frames sent by clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinDocument {
        document_id: String,
        #[serde(default)]
        user: Option<JoinUser>,
    },
    Operation {
        operation: OperationRequest,
    },
    CursorUpdate(CursorPosition),
    SelectionUpdate(Selection),
    Typing {
        is_typing: bool,
    },
    Heartbeat,
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    DocumentState {
        document_id: String,
        session_id: String,
        color: &'static str,
        content: String,
        version: u64,
        cursors: Vec<PeerCursor>,
        selections: Vec<PeerSelection>,
    },
    Operation {
        document_id: String,
        operation: Operation,
        version: u64,
    },
    OperationAck {
        operation_id: String,
        version: u64,
    },
    CursorUpdate(PeerCursor),
    SelectionUpdate(PeerSelection),
    UserTyping {
        session_id: String,
        user_id: String,
        user_name: String,
        is_typing: bool,
    },
    UserJoined {
        user: Collaborator,
    },
    UserLeft {
        session_id: String,
        user_id: String,
        user_name: String,
    },
    UsersUpdate {
        users: Vec<Collaborator>,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerMessage {
    #[must_use]
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Broadcast form of a committed operation.
    #[must_use]
    pub fn operation(document_id: &str, operation: Operation) -> Self {
        ServerMessage::Operation {
            document_id: document_id.to_string(),
            version: operation.version,
            operation,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::OperationKind;

    #[test]
    fn test_parse_client_frames() {
        let join: ClientMessage = serde_json::from_value(json!({
            "type": "join-document",
            "documentId": "p1",
            "user": {"name": "Mia"}
        }))
        .unwrap();
        assert!(matches!(
            join,
            ClientMessage::JoinDocument { ref document_id, user: Some(JoinUser { name: Some(ref n) }) }
                if document_id == "p1" && n == "Mia"
        ));

        let op: ClientMessage = serde_json::from_value(json!({
            "type": "operation",
            "operation": {"type": "insert", "position": 3, "text": "x", "baseVersion": 4}
        }))
        .unwrap();
        let ClientMessage::Operation { operation } = op else {
            panic!("expected operation");
        };
        assert_eq!(operation.kind, OperationKind::Insert);
        assert_eq!(operation.base_version, Some(4));

        let cursor: ClientMessage =
            serde_json::from_value(json!({"type": "cursor-update", "position": 7, "line": 2}))
                .unwrap();
        assert!(matches!(
            cursor,
            ClientMessage::CursorUpdate(CursorPosition { position: 7, line: 2, column: 0 })
        ));

        let typing: ClientMessage =
            serde_json::from_value(json!({"type": "typing", "isTyping": true})).unwrap();
        assert!(matches!(typing, ClientMessage::Typing { is_typing: true }));

        assert!(serde_json::from_value::<ClientMessage>(json!({"type": "bogus"})).is_err());
    }

    #[test]
    fn test_server_frame_shape() {
        let ack = serde_json::to_value(ServerMessage::OperationAck {
            operation_id: "op-1".into(),
            version: 9,
        })
        .unwrap();
        assert_eq!(
            ack,
            json!({"type": "operation-ack", "operationId": "op-1", "version": 9})
        );

        let cursor = serde_json::to_value(ServerMessage::CursorUpdate(PeerCursor {
            session_id: "s".into(),
            user_id: "u".into(),
            user_name: "U".into(),
            color: "#FF6B6B",
            cursor: CursorPosition {
                position: 1,
                line: 1,
                column: 2,
            },
        }))
        .unwrap();
        assert_eq!(cursor["type"], "cursor-update");
        assert_eq!(cursor["userName"], "U");
        assert_eq!(cursor["column"], 2);
    }
}
