//! Canonical document state and its append-only operation log.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Operation, OperationKind, OperationRequest};

/// Content, version, and every operation ever committed to one project.
///
/// `version` always equals `operations.len()`, and `content` is the fold of
/// `operations` over the empty string.
#[derive(Debug, Clone)]
pub struct Document {
    content: String,
    operations: Vec<Operation>,
    updated_at: DateTime<Utc>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self {
            content: String::new(),
            operations: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.operations.len() as u64
    }

    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Validates, sequences, and applies an operation.
    ///
    /// Out-of-range positions or lengths fail with `InvalidOperation` and
    /// leave the document untouched. A `base_version` that does not match the
    /// current version fails with `Conflict`.
    pub fn apply(&mut self, request: OperationRequest, author_id: &str) -> Result<Operation> {
        if let Some(base) = request.base_version {
            if base != self.version() {
                return Err(Error::Conflict(format!(
                    "operation based on version {base}, document is at {}",
                    self.version()
                )));
            }
        }

        let op = Operation {
            id: Uuid::new_v4().to_string(),
            kind: request.kind,
            position: request.position,
            text: request.text,
            length: request.length,
            author_id: author_id.to_string(),
            version: self.version() + 1,
            timestamp: Utc::now(),
        };

        self.content = transform(&self.content, &op)?;
        self.updated_at = op.timestamp;
        self.operations.push(op.clone());
        Ok(op)
    }

    /// Replaces the whole content as one `replace` operation.
    pub fn replace_all(&mut self, new_content: &str, author_id: &str) -> Result<Operation> {
        let length = self.content.chars().count();
        self.apply(OperationRequest::replace(0, length, new_content), author_id)
    }
}

/// Pure function of (content, operation) -> content.
pub fn transform(content: &str, op: &Operation) -> Result<String> {
    let len = content.chars().count();
    if op.position > len {
        return Err(Error::InvalidOperation(format!(
            "position {} is past the end of the document ({len})",
            op.position
        )));
    }

    let removed = match op.kind {
        OperationKind::Insert => 0,
        OperationKind::Delete | OperationKind::Replace => op.length.ok_or_else(|| {
            Error::InvalidOperation(format!("{:?} requires a length", op.kind).to_lowercase())
        })?,
    };
    let end = op
        .position
        .checked_add(removed)
        .filter(|end| *end <= len)
        .ok_or_else(|| {
            Error::InvalidOperation(format!(
                "range {}+{removed} exceeds document length {len}",
                op.position
            ))
        })?;

    let inserted = match op.kind {
        OperationKind::Delete => "",
        OperationKind::Insert | OperationKind::Replace => op.text.as_deref().ok_or_else(|| {
            Error::InvalidOperation(format!("{:?} requires text", op.kind).to_lowercase())
        })?,
    };

    let start_byte = byte_offset(content, op.position);
    let end_byte = byte_offset(content, end);

    let mut out = String::with_capacity(content.len() - (end_byte - start_byte) + inserted.len());
    out.push_str(&content[..start_byte]);
    out.push_str(inserted);
    out.push_str(&content[end_byte..]);
    Ok(out)
}

/// Byte index of the `char_pos`-th character; `char_pos` may equal the length.
fn byte_offset(s: &str, char_pos: usize) -> usize {
    s.char_indices()
        .nth(char_pos)
        .map_or(s.len(), |(byte, _)| byte)
}
