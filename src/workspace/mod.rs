//! Project registry and the staging workflow.
//!
//! Every project owns one [`ProjectState`] behind its own async mutex, so all
//! commits, proposals, and reviews for a project are applied one at a time
//! while different projects proceed in parallel. Role lookups happen before
//! the lock is taken; nothing awaits while it is held. Commits are announced
//! to the [`CommitListener`] before the lock is released, so listeners see a
//! project's operations in version order.

mod staging;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

pub use staging::{EditOutcome, ReviewOutcome};

use crate::config::{ProjectSeed, ServerConfig, StalePolicy};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::history::HistoryLedger;
use crate::identity::{self, RoleOracle};
use crate::types::{
    Capability, HistoryEntry, HistoryKind, Identity, Operation, OperationRequest, Project,
    Relation, StagedChange,
};

const MAX_PROJECT_NAME_LEN: usize = 100;

/// Receives every committed operation while its project is still locked.
pub trait CommitListener: Send + Sync {
    /// `origin` is the realtime session that sent the operation, if any.
    fn committed(&self, project_id: &str, origin: Option<&str>, operation: &Operation);
}

pub(crate) struct ProjectState {
    project: Project,
    document: Document,
    /// Proposal order.
    changes: Vec<StagedChange>,
    history: HistoryLedger,
}

impl ProjectState {
    fn relation(&self, user_id: &str) -> Relation {
        if self.project.owner_id == user_id {
            Relation::Owner
        } else if self.project.is_member(user_id) {
            Relation::Member
        } else {
            Relation::Outsider
        }
    }

    fn allows(&self, actor: &Identity, capability: Capability) -> bool {
        actor.role.allows(self.relation(&actor.id), capability)
    }

    fn require(&self, actor: &Identity, capability: Capability) -> Result<()> {
        if self.allows(actor, capability) {
            return Ok(());
        }
        let reason = match self.relation(&actor.id) {
            Relation::Outsider => "not a member of this project".to_string(),
            _ => format!("not allowed to {capability} on this project"),
        };
        Err(Error::access_denied(reason))
    }

    fn touch(&mut self) {
        self.project.last_activity = Utc::now();
    }

    fn has_pending(&self) -> bool {
        self.changes.iter().any(StagedChange::is_pending)
    }

    fn entry(&self, actor: &Identity, kind: HistoryKind, message: String) -> HistoryEntry {
        HistoryEntry {
            id: Uuid::new_v4().to_string(),
            project_id: self.project.id.clone(),
            kind,
            actor_id: actor.id.clone(),
            actor_name: actor.display_name.clone(),
            message,
            change_id: None,
            diff: None,
            changes: None,
            feedback: None,
            activity: None,
            timestamp: Utc::now(),
        }
    }

    fn record_activity(&mut self, actor: &Identity, activity: &str, message: String) {
        let mut entry = self.entry(actor, HistoryKind::Activity, message);
        entry.activity = Some(activity.to_string());
        self.history.append(entry);
    }

    fn view(&self, actor: &Identity) -> ProjectView {
        ProjectView {
            id: self.project.id.clone(),
            name: self.project.name.clone(),
            description: self.project.description.clone(),
            owner_id: self.project.owner_id.clone(),
            members: self.project.members.clone(),
            content: self.document.content().to_string(),
            version: self.document.version(),
            created_at: self.project.created_at,
            last_activity: self.project.last_activity,
            has_pending_changes: self.has_pending(),
            can_edit: self.allows(actor, Capability::CommitDirect),
            can_review: self.allows(actor, Capability::Review),
        }
    }

    fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.project.id.clone(),
            name: self.project.name.clone(),
            description: self.project.description.clone(),
            owner_id: self.project.owner_id.clone(),
            members: self.project.members.clone(),
            version: self.document.version(),
            last_activity: self.project.last_activity,
            has_pending_changes: self.has_pending(),
        }
    }
}

/// A project as seen by one actor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub members: Vec<String>,
    pub content: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub has_pending_changes: bool,
    pub can_edit: bool,
    pub can_review: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub members: Vec<String>,
    pub version: u64,
    pub last_activity: DateTime<Utc>,
    pub has_pending_changes: bool,
}

/// Content and version at one instant, for realtime joins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSnapshot {
    pub content: String,
    pub version: u64,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub content: String,
}

pub struct Workspace {
    projects: DashMap<String, Arc<Mutex<ProjectState>>>,
    /// Staged change id to owning project id.
    change_index: DashMap<String, String>,
    oracle: Arc<dyn RoleOracle>,
    lookup_timeout: Duration,
    edit_capacity: usize,
    activity_capacity: usize,
    stale_policy: StalePolicy,
    listener: Option<Arc<dyn CommitListener>>,
}

impl Workspace {
    pub fn new(oracle: Arc<dyn RoleOracle>, config: &ServerConfig) -> Self {
        Self {
            projects: DashMap::new(),
            change_index: DashMap::new(),
            oracle,
            lookup_timeout: config.lookup_timeout,
            edit_capacity: config.edit_history_capacity,
            activity_capacity: config.activity_history_capacity,
            stale_policy: config.stale_policy,
            listener: None,
        }
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn CommitListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Call with the project lock held.
    fn announce(&self, project_id: &str, origin: Option<&str>, operation: &Operation) {
        if let Some(listener) = &self.listener {
            listener.committed(project_id, origin, operation);
        }
    }

    /// Resolves an actor through the oracle. Unknown users are denied.
    pub async fn identify(&self, user_id: &str) -> Result<Identity> {
        match identity::resolve(self.oracle.as_ref(), user_id, self.lookup_timeout).await {
            Err(Error::NotFound(_)) => Err(Error::access_denied(format!("unknown user {user_id}"))),
            other => other,
        }
    }

    fn project(&self, project_id: &str) -> Result<Arc<Mutex<ProjectState>>> {
        self.projects
            .get(project_id)
            .map(|p| Arc::clone(p.value()))
            .ok_or_else(|| Error::not_found(format!("project {project_id}")))
    }

    /// Creates a project owned by `actor_id`. Requires an admin role.
    pub async fn create_project(&self, actor_id: &str, new: NewProject) -> Result<ProjectView> {
        let actor = self.identify(actor_id).await?;
        if !actor.role.allows(Relation::Outsider, Capability::CreateProject) {
            return Err(Error::access_denied("only admins can create projects"));
        }
        if new.description.trim().is_empty() {
            return Err(Error::InvalidInput("project description cannot be empty".into()));
        }
        self.insert_project(&actor, new)
    }

    /// Creates a configured project on startup. The owner needs no admin role.
    pub async fn seed_project(&self, seed: &ProjectSeed) -> Result<ProjectView> {
        let owner = self.identify(&seed.owner_id).await?;
        let mut members = Vec::with_capacity(seed.members.len());
        for member in &seed.members {
            members.push(self.identify(member).await?);
        }

        let view = self.insert_project(
            &owner,
            NewProject {
                id: seed.id.clone(),
                name: seed.name.clone(),
                description: seed.description.clone(),
                content: seed.content.clone(),
            },
        )?;

        let handle = self.project(&view.id)?;
        let mut state = handle.lock().await;
        for member in &members {
            add_member_locked(&mut state, &owner, member);
        }
        Ok(state.view(&owner))
    }

    fn insert_project(&self, owner: &Identity, new: NewProject) -> Result<ProjectView> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("project name cannot be empty".into()));
        }
        if name.chars().count() > MAX_PROJECT_NAME_LEN {
            return Err(Error::InvalidInput(format!(
                "project name cannot exceed {MAX_PROJECT_NAME_LEN} characters"
            )));
        }

        let now = Utc::now();
        let id = new.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut state = ProjectState {
            project: Project {
                id: id.clone(),
                name: name.to_string(),
                description: new.description.trim().to_string(),
                owner_id: owner.id.clone(),
                members: vec![owner.id.clone()],
                created_at: now,
                last_activity: now,
            },
            document: Document::new(),
            changes: Vec::new(),
            history: HistoryLedger::new(self.edit_capacity, self.activity_capacity),
        };

        state.record_activity(
            owner,
            "project_created",
            format!("{} created the project", owner.display_name),
        );

        if !new.content.is_empty() {
            state
                .document
                .apply(OperationRequest::insert(0, new.content.as_str()), &owner.id)?;
        }

        let view = state.view(owner);
        match self.projects.entry(id) {
            Entry::Occupied(e) => {
                return Err(Error::Conflict(format!("project {} already exists", e.key())));
            }
            Entry::Vacant(e) => {
                e.insert(Arc::new(Mutex::new(state)));
            }
        }

        tracing::info!("Project '{}' created by {}", view.name, owner.id);
        Ok(view)
    }

    pub async fn get_project(&self, project_id: &str, actor_id: &str) -> Result<ProjectView> {
        let actor = self.identify(actor_id).await?;
        let handle = self.project(project_id)?;
        let state = handle.lock().await;
        state.require(&actor, Capability::View)?;
        Ok(state.view(&actor))
    }

    /// Projects `actor_id` belongs to, sorted by name.
    pub async fn list_projects(&self, actor_id: &str) -> Result<Vec<ProjectSummary>> {
        let actor = self.identify(actor_id).await?;
        let handles: Vec<_> = self.projects.iter().map(|p| Arc::clone(p.value())).collect();

        let mut out = Vec::new();
        for handle in handles {
            let state = handle.lock().await;
            if state.project.is_member(&actor.id) {
                out.push(state.summary());
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    /// Adds `user_id` to the project. Adding an existing member is a no-op.
    pub async fn add_member(
        &self,
        project_id: &str,
        actor_id: &str,
        user_id: &str,
    ) -> Result<ProjectView> {
        let actor = self.identify(actor_id).await?;
        let member = identity::resolve(self.oracle.as_ref(), user_id, self.lookup_timeout).await?;

        let handle = self.project(project_id)?;
        let mut state = handle.lock().await;
        state.require(&actor, Capability::ManageMembers)?;
        add_member_locked(&mut state, &actor, &member);
        Ok(state.view(&actor))
    }

    /// Current content and version, for a member opening the document.
    pub async fn open_document(&self, project_id: &str, actor_id: &str) -> Result<DocumentSnapshot> {
        let actor = self.identify(actor_id).await?;
        let handle = self.project(project_id)?;
        let state = handle.lock().await;
        state.require(&actor, Capability::View)?;
        Ok(DocumentSnapshot {
            content: state.document.content().to_string(),
            version: state.document.version(),
        })
    }

    /// Edit and activity history merged, newest first.
    ///
    /// A project without history, or one that no longer exists, yields an
    /// empty list.
    pub async fn history(
        &self,
        project_id: &str,
        actor_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryEntry>> {
        self.read_history(project_id, actor_id, |h| h.list(limit)).await
    }

    /// Edit and review history only, newest first.
    pub async fn edit_history(
        &self,
        project_id: &str,
        actor_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryEntry>> {
        self.read_history(project_id, actor_id, |h| h.edits(limit)).await
    }

    async fn read_history<F>(&self, project_id: &str, actor_id: &str, read: F) -> Result<Vec<HistoryEntry>>
    where
        F: FnOnce(&HistoryLedger) -> Vec<HistoryEntry>,
    {
        let actor = self.identify(actor_id).await?;
        let Ok(handle) = self.project(project_id) else {
            tracing::debug!("History requested for unknown project {project_id}");
            return Ok(Vec::new());
        };
        let state = handle.lock().await;
        state.require(&actor, Capability::View)?;
        Ok(read(&state.history))
    }
}

fn add_member_locked(state: &mut ProjectState, actor: &Identity, member: &Identity) {
    if state.project.is_member(&member.id) {
        return;
    }
    state.project.members.push(member.id.clone());
    state.touch();
    state.record_activity(
        actor,
        "member_added",
        format!("{} added {} to the project", actor.display_name, member.display_name),
    );
    tracing::info!("{} joined project {}", member.id, state.project.id);
}
