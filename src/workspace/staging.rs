//! Direct commits, proposals, and reviews.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ProjectState, Workspace};
use crate::config::StalePolicy;
use crate::diff::{diff, edit_stats};
use crate::error::{Error, Result};
use crate::types::{
    Capability, ChangeStatus, DiffLine, HistoryKind, Identity, Operation, OperationRequest,
    StagedChange,
};

/// Result of an edit attempt.
#[derive(Debug, Clone)]
pub enum EditOutcome {
    /// The actor could commit directly; content changed.
    Committed {
        operation: Operation,
        diff: Vec<DiffLine>,
    },
    /// The edit now waits for review; content is unchanged.
    Staged { change: StagedChange },
}

impl EditOutcome {
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            EditOutcome::Committed { .. } => "Content updated directly",
            EditOutcome::Staged { .. } => "Changes staged for approval",
        }
    }

    #[must_use]
    pub fn operation(&self) -> Option<&Operation> {
        match self {
            EditOutcome::Committed { operation, .. } => Some(operation),
            EditOutcome::Staged { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub change: StagedChange,
    /// The commit produced by an approval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
}

impl ReviewOutcome {
    #[must_use]
    pub fn approved(&self) -> bool {
        self.change.status == ChangeStatus::Approved
    }

    #[must_use]
    pub fn message(&self) -> &'static str {
        if self.approved() {
            "Changes approved and applied"
        } else {
            "Changes rejected"
        }
    }
}

impl Workspace {
    /// Submits new full content for a project.
    ///
    /// Owners and admins commit directly. Every other member gets a pending
    /// [`StagedChange`] and the content stays as it is.
    pub async fn propose_edit(
        &self,
        project_id: &str,
        actor_id: &str,
        new_content: &str,
    ) -> Result<EditOutcome> {
        let actor = self.identify(actor_id).await?;
        let handle = self.project(project_id)?;
        let mut state = handle.lock().await;

        state.require(&actor, Capability::Propose)?;

        if state.allows(&actor, Capability::CommitDirect) {
            let (operation, lines) = commit_content(&mut state, &actor, new_content)?;
            self.announce(project_id, None, &operation);
            tracing::info!(
                "{} committed version {} of project {project_id}",
                actor.id,
                operation.version
            );
            return Ok(EditOutcome::Committed {
                operation,
                diff: lines,
            });
        }

        let original = state.document.content().to_string();
        let lines = diff(&original, new_content);
        let change = StagedChange {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            proposer_id: actor.id.clone(),
            proposer_name: actor.display_name.clone(),
            original_content: original,
            proposed_content: new_content.to_string(),
            diff: lines.clone(),
            status: ChangeStatus::Pending,
            created_at: Utc::now(),
            reviewer_id: None,
            reviewer_name: None,
            reviewed_at: None,
            feedback: None,
        };

        let mut entry = state.entry(
            &actor,
            HistoryKind::Proposal,
            format!("{} proposed a change", actor.display_name),
        );
        entry.change_id = Some(change.id.clone());
        entry.changes = Some(edit_stats(&change.original_content, new_content));
        entry.diff = Some(lines);
        state.history.append(entry);

        state.changes.push(change.clone());
        state.touch();
        self.change_index
            .insert(change.id.clone(), project_id.to_string());

        tracing::info!("{} staged change {} on project {project_id}", actor.id, change.id);
        Ok(EditOutcome::Staged { change })
    }

    /// Applies one positional operation from a realtime client.
    ///
    /// Only actors who may commit directly can stream operations. `origin` is
    /// the sending session, passed through to the listener.
    pub async fn apply_operation(
        &self,
        project_id: &str,
        actor_id: &str,
        request: OperationRequest,
        origin: Option<&str>,
    ) -> Result<Operation> {
        let actor = self.identify(actor_id).await?;
        let handle = self.project(project_id)?;
        let mut state = handle.lock().await;

        state.require(&actor, Capability::View)?;
        if !state.allows(&actor, Capability::CommitDirect) {
            return Err(Error::access_denied(
                "live edits need commit rights; submit a proposal instead",
            ));
        }

        let operation = state.document.apply(request, &actor.id)?;
        state.touch();
        self.announce(project_id, origin, &operation);
        Ok(operation)
    }

    /// Pending changes for a project, oldest first.
    pub async fn staged_changes(&self, project_id: &str, actor_id: &str) -> Result<Vec<StagedChange>> {
        let actor = self.identify(actor_id).await?;
        let handle = self.project(project_id)?;
        let state = handle.lock().await;
        state.require(&actor, Capability::Review)?;
        Ok(state
            .changes
            .iter()
            .filter(|c| c.is_pending())
            .cloned()
            .collect())
    }

    /// One change in any status, visible to reviewers and to its proposer.
    pub async fn get_change(&self, change_id: &str, actor_id: &str) -> Result<StagedChange> {
        let actor = self.identify(actor_id).await?;
        let handle = self.change_project(change_id)?;
        let state = handle.lock().await;
        let change = find_change(&state, change_id)?;

        if change.proposer_id != actor.id {
            state.require(&actor, Capability::Review)?;
        }
        Ok(change.clone())
    }

    /// Approves or rejects a pending change.
    ///
    /// The reviewer's authority is checked before the change is touched. A
    /// change leaves `pending` exactly once; any later review fails with
    /// `AlreadyReviewed`.
    pub async fn review_change(
        &self,
        change_id: &str,
        reviewer_id: &str,
        approve: bool,
        feedback: Option<String>,
    ) -> Result<ReviewOutcome> {
        let reviewer = self.identify(reviewer_id).await?;
        let handle = self.change_project(change_id)?;
        let mut state = handle.lock().await;

        state.require(&reviewer, Capability::Review)?;
        let outcome = settle(&mut state, change_id, &reviewer, approve, feedback, self.stale_policy)?;
        if let Some(operation) = &outcome.operation {
            self.announce(&outcome.change.project_id, None, operation);
        }
        Ok(outcome)
    }

    fn change_project(&self, change_id: &str) -> Result<Arc<Mutex<ProjectState>>> {
        let project_id = self
            .change_index
            .get(change_id)
            .map(|p| p.value().clone())
            .ok_or_else(|| Error::not_found(format!("staged change {change_id}")))?;
        self.project(&project_id)
    }
}

fn find_change<'a>(state: &'a ProjectState, change_id: &str) -> Result<&'a StagedChange> {
    state
        .changes
        .iter()
        .find(|c| c.id == change_id)
        .ok_or_else(|| Error::not_found(format!("staged change {change_id}")))
}

/// Replaces the content in one operation and records a `commit` entry.
fn commit_content(
    state: &mut ProjectState,
    actor: &Identity,
    new_content: &str,
) -> Result<(Operation, Vec<DiffLine>)> {
    let old = state.document.content().to_string();
    let operation = state.document.replace_all(new_content, &actor.id)?;
    let lines = diff(&old, new_content);

    let mut entry = state.entry(
        actor,
        HistoryKind::Commit,
        format!("{} updated the content directly", actor.display_name),
    );
    entry.changes = Some(edit_stats(&old, new_content));
    entry.diff = Some(lines.clone());
    state.history.append(entry);
    state.touch();

    Ok((operation, lines))
}

/// The pending -> terminal transition, run under the project lock.
fn settle(
    state: &mut ProjectState,
    change_id: &str,
    reviewer: &Identity,
    approve: bool,
    feedback: Option<String>,
    stale_policy: StalePolicy,
) -> Result<ReviewOutcome> {
    let index = state
        .changes
        .iter()
        .position(|c| c.id == change_id)
        .ok_or_else(|| Error::not_found(format!("staged change {change_id}")))?;

    let change = &state.changes[index];
    if !change.is_pending() {
        return Err(Error::AlreadyReviewed);
    }

    let mut operation = None;
    let (kind, verb) = if approve {
        if stale_policy == StalePolicy::Conflict
            && change.original_content != state.document.content()
        {
            return Err(Error::Conflict(
                "content changed since this proposal was made; it must be proposed again".into(),
            ));
        }

        let proposed = change.proposed_content.clone();
        let old = state.document.content().to_string();
        let op = state.document.replace_all(&proposed, &reviewer.id)?;
        operation = Some((op, diff(&old, &proposed), edit_stats(&old, &proposed)));
        (HistoryKind::Merge, "approved")
    } else {
        (HistoryKind::Close, "rejected")
    };

    let now = Utc::now();
    let change = &mut state.changes[index];
    change.status = if approve {
        ChangeStatus::Approved
    } else {
        ChangeStatus::Rejected
    };
    change.reviewer_id = Some(reviewer.id.clone());
    change.reviewer_name = Some(reviewer.display_name.clone());
    change.reviewed_at = Some(now);
    change.feedback = feedback.clone();
    let change = change.clone();

    let mut entry = state.entry(
        reviewer,
        kind,
        format!(
            "{} {verb} the change proposed by {}",
            reviewer.display_name, change.proposer_name
        ),
    );
    entry.change_id = Some(change.id.clone());
    entry.feedback = feedback;
    let operation = operation.map(|(op, lines, stats)| {
        entry.diff = Some(lines);
        entry.changes = Some(stats);
        op
    });
    state.history.append(entry);
    state.touch();

    tracing::info!(
        "{} {verb} change {} on project {}",
        reviewer.id,
        change.id,
        change.project_id
    );
    Ok(ReviewOutcome { change, operation })
}
