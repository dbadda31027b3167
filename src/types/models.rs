use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Project metadata. Canonical content and version live in the project's
/// [`Document`](crate::document::Document).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    /// Join order.
    pub members: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Project {
    #[must_use]
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Delete,
    Replace,
}

/// An applied text mutation. Positions and lengths count Unicode scalar values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    pub author_id: String,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
}

/// An operation as submitted by a client, before it is sequenced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub position: usize,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub length: Option<usize>,
    /// When present, the operation is only applied on top of this version.
    #[serde(default)]
    pub base_version: Option<u64>,
}

impl OperationRequest {
    #[must_use]
    pub fn insert(position: usize, text: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Insert,
            position,
            text: Some(text.into()),
            length: None,
            base_version: None,
        }
    }

    #[must_use]
    pub fn delete(position: usize, length: usize) -> Self {
        Self {
            kind: OperationKind::Delete,
            position,
            text: None,
            length: Some(length),
            base_version: None,
        }
    }

    #[must_use]
    pub fn replace(position: usize, length: usize, text: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Replace,
            position,
            text: Some(text.into()),
            length: Some(length),
            base_version: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffTag {
    Added,
    Removed,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffLine {
    #[serde(rename = "type")]
    pub tag: DiffTag,
    /// 1-based line number on the side the line comes from.
    pub line_number: usize,
    pub content: String,
}

/// Size statistics attached to edit history entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditStats {
    pub old_length: usize,
    pub new_length: usize,
    pub old_word_count: usize,
    pub new_word_count: usize,
    pub characters_added: usize,
    pub characters_removed: usize,
    pub words_added: usize,
    pub words_removed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedChange {
    pub id: String,
    pub project_id: String,
    pub proposer_id: String,
    pub proposer_name: String,
    /// Content snapshot at proposal time.
    pub original_content: String,
    pub proposed_content: String,
    /// Computed once, against `original_content`.
    pub diff: Vec<DiffLine>,
    pub status: ChangeStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl StagedChange {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == ChangeStatus::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Commit,
    Proposal,
    Merge,
    Close,
    Activity,
}

impl HistoryKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryKind::Commit => "commit",
            HistoryKind::Proposal => "proposal",
            HistoryKind::Merge => "merge",
            HistoryKind::Close => "close",
            HistoryKind::Activity => "activity",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub project_id: String,
    pub kind: HistoryKind,
    pub actor_id: String,
    pub actor_name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Vec<DiffLine>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<EditStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// Activity type for `activity` entries, e.g. `member_added`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Resolved identity of a user, as reported by the role oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub role: super::Role,
}
