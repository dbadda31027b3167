//! Presence & cursor broadcast.
//!
//! Each realtime connection joins one document room and gets a session keyed
//! by a fresh session id, never by user id, so two tabs of the same user are
//! two independent collaborators. Outbound frames go through a per-session
//! unbounded channel drained by the socket's send task. A failed send only
//! means the receiver is gone; it is logged and ignored.

pub mod protocol;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub use protocol::{
    ClientMessage, Collaborator, CursorPosition, PeerCursor, PeerSelection, Selection,
    ServerMessage,
};

use crate::error::{Error, Result};
use crate::types::{Identity, Operation};
use crate::workspace::{CommitListener, DocumentSnapshot};

/// Colors handed out round-robin as sessions connect.
pub const PALETTE: [&str; 10] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F",
    "#BB8FCE", "#85C1E9",
];

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(20);

pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

struct Session {
    document_id: String,
    user_id: String,
    user_name: String,
    color: &'static str,
    cursor: Option<CursorPosition>,
    selection: Option<Selection>,
    typing: bool,
    joined_at: DateTime<Utc>,
    last_seen: Instant,
    outbox: Outbox,
}

impl Session {
    fn collaborator(&self, session_id: &str) -> Collaborator {
        Collaborator {
            session_id: session_id.to_string(),
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            color: self.color,
            cursor: self.cursor,
            selection: self.selection,
            is_typing: self.typing,
            joined_at: self.joined_at,
        }
    }
}

pub struct PresenceHub {
    sessions: DashMap<String, Session>,
    /// Document id to session ids in join order.
    rooms: DashMap<String, Vec<String>>,
    next_color: AtomicUsize,
    idle_timeout: Duration,
}

impl Default for PresenceHub {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

impl PresenceHub {
    #[must_use]
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            rooms: DashMap::new(),
            next_color: AtomicUsize::new(0),
            idle_timeout,
        }
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Registers a session in `document_id`'s room.
    ///
    /// The joiner receives `document-state` built from `snapshot` followed by
    /// `users-update`; everyone else in the room receives `user-joined` and
    /// `users-update`. Returns the new session id.
    pub fn join(
        &self,
        document_id: &str,
        user: &Identity,
        display_name: Option<&str>,
        snapshot: DocumentSnapshot,
        outbox: Outbox,
    ) -> String {
        let session_id = Uuid::new_v4().to_string();
        let color = PALETTE[self.next_color.fetch_add(1, Ordering::Relaxed) % PALETTE.len()];
        let user_name = display_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(user.display_name.as_str())
            .to_string();

        let (cursors, selections) = self.peers(document_id);
        let session = Session {
            document_id: document_id.to_string(),
            user_id: user.id.clone(),
            user_name,
            color,
            cursor: None,
            selection: None,
            typing: false,
            joined_at: Utc::now(),
            last_seen: Instant::now(),
            outbox,
        };
        let joined = session.collaborator(&session_id);
        self.sessions.insert(session_id.clone(), session);
        self.rooms
            .entry(document_id.to_string())
            .or_default()
            .push(session_id.clone());

        tracing::debug!(
            "{} joined document {document_id} as session {session_id}",
            user.id
        );

        self.send_to(
            &session_id,
            ServerMessage::DocumentState {
                document_id: document_id.to_string(),
                session_id: session_id.clone(),
                color,
                content: snapshot.content,
                version: snapshot.version,
                cursors,
                selections,
            },
        );
        let users = self.collaborators(document_id);
        self.send_to(&session_id, ServerMessage::UsersUpdate { users: users.clone() });
        self.broadcast_from(document_id, Some(&session_id), ServerMessage::UserJoined { user: joined });
        self.broadcast_from(document_id, Some(&session_id), ServerMessage::UsersUpdate { users });

        session_id
    }

    /// Refreshes the session's idle clock.
    pub fn touch(&self, session_id: &str) -> Result<()> {
        self.with_session(session_id, |_| ()).map(|_| ())
    }

    pub fn update_cursor(&self, session_id: &str, cursor: CursorPosition) -> Result<()> {
        let (document_id, peer) = self.with_session(session_id, |s| {
            s.cursor = Some(cursor);
            PeerCursor {
                session_id: session_id.to_string(),
                user_id: s.user_id.clone(),
                user_name: s.user_name.clone(),
                color: s.color,
                cursor,
            }
        })?;
        self.broadcast_from(&document_id, Some(session_id), ServerMessage::CursorUpdate(peer));
        Ok(())
    }

    pub fn update_selection(&self, session_id: &str, selection: Selection) -> Result<()> {
        let (document_id, peer) = self.with_session(session_id, |s| {
            s.selection = Some(selection);
            PeerSelection {
                session_id: session_id.to_string(),
                user_id: s.user_id.clone(),
                user_name: s.user_name.clone(),
                color: s.color,
                selection,
            }
        })?;
        self.broadcast_from(
            &document_id,
            Some(session_id),
            ServerMessage::SelectionUpdate(peer),
        );
        Ok(())
    }

    pub fn set_typing(&self, session_id: &str, is_typing: bool) -> Result<()> {
        let (document_id, message) = self.with_session(session_id, |s| {
            s.typing = is_typing;
            ServerMessage::UserTyping {
                session_id: session_id.to_string(),
                user_id: s.user_id.clone(),
                user_name: s.user_name.clone(),
                is_typing,
            }
        })?;
        self.broadcast_from(&document_id, Some(session_id), message);
        Ok(())
    }

    /// Removes a session and tells the rest of its room.
    pub fn leave(&self, session_id: &str) -> Result<()> {
        let (_, session) = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| Error::not_found(format!("session {session_id}")))?;

        let room_empty = match self.rooms.get_mut(&session.document_id) {
            Some(mut room) => {
                room.retain(|id| id != session_id);
                room.is_empty()
            }
            None => false,
        };
        if room_empty {
            self.rooms
                .remove_if(&session.document_id, |_, room| room.is_empty());
        }

        tracing::debug!(
            "{} left document {} (session {session_id})",
            session.user_id,
            session.document_id
        );

        self.broadcast_from(
            &session.document_id,
            None,
            ServerMessage::UserLeft {
                session_id: session_id.to_string(),
                user_id: session.user_id,
                user_name: session.user_name,
            },
        );
        let users = self.collaborators(&session.document_id);
        self.broadcast_from(&session.document_id, None, ServerMessage::UsersUpdate { users });
        Ok(())
    }

    /// Evicts every session idle for longer than the timeout as of `now`.
    pub fn sweep(&self, now: Instant) -> Vec<String> {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|s| now.saturating_duration_since(s.last_seen) > self.idle_timeout)
            .map(|s| s.key().clone())
            .collect();

        for session_id in &expired {
            if self.leave(session_id).is_ok() {
                tracing::info!("Presence session {session_id} expired");
            }
        }
        expired
    }

    /// Runs [`sweep`](Self::sweep) on a fixed interval until the task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sweep(Instant::now());
            }
        })
    }

    /// Sessions in a room, in join order.
    #[must_use]
    pub fn collaborators(&self, document_id: &str) -> Vec<Collaborator> {
        self.room(document_id)
            .iter()
            .filter_map(|id| self.sessions.get(id).map(|s| s.collaborator(id)))
            .collect()
    }

    pub fn send_to(&self, session_id: &str, message: ServerMessage) {
        let outbox = self.sessions.get(session_id).map(|s| s.outbox.clone());
        match outbox {
            Some(outbox) => deliver(session_id, &outbox, message),
            None => tracing::debug!("Dropping message for unknown session {session_id}"),
        }
    }

    /// Sends to every session in the room except `origin`.
    pub fn broadcast_from(&self, document_id: &str, origin: Option<&str>, message: ServerMessage) {
        let targets: Vec<(String, Outbox)> = self
            .room(document_id)
            .into_iter()
            .filter(|id| Some(id.as_str()) != origin)
            .filter_map(|id| {
                let outbox = self.sessions.get(&id).map(|s| s.outbox.clone());
                outbox.map(|o| (id, o))
            })
            .collect();

        for (session_id, outbox) in targets {
            deliver(&session_id, &outbox, message.clone());
        }
    }

    fn room(&self, document_id: &str) -> Vec<String> {
        self.rooms
            .get(document_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    fn peers(&self, document_id: &str) -> (Vec<PeerCursor>, Vec<PeerSelection>) {
        let mut cursors = Vec::new();
        let mut selections = Vec::new();
        for c in self.collaborators(document_id) {
            if let Some(cursor) = c.cursor {
                cursors.push(PeerCursor {
                    session_id: c.session_id.clone(),
                    user_id: c.user_id.clone(),
                    user_name: c.user_name.clone(),
                    color: c.color,
                    cursor,
                });
            }
            if let Some(selection) = c.selection {
                selections.push(PeerSelection {
                    session_id: c.session_id,
                    user_id: c.user_id,
                    user_name: c.user_name,
                    color: c.color,
                    selection,
                });
            }
        }
        (cursors, selections)
    }

    /// Runs `update` on a live session, refreshing `last_seen`. Returns the
    /// session's document id with the closure's result.
    fn with_session<T>(
        &self,
        session_id: &str,
        update: impl FnOnce(&mut Session) -> T,
    ) -> Result<(String, T)> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::not_found(format!("session {session_id}")))?;
        session.last_seen = Instant::now();
        let out = update(&mut *session);
        Ok((session.document_id.clone(), out))
    }
}

fn deliver(session_id: &str, outbox: &Outbox, message: ServerMessage) {
    if outbox.send(message).is_err() {
        tracing::warn!("Failed to deliver to session {session_id}: connection closed");
    }
}

/// Relays commits to the project room: an ack for the sending session, the
/// operation for everyone else.
impl CommitListener for PresenceHub {
    fn committed(&self, project_id: &str, origin: Option<&str>, operation: &Operation) {
        if let Some(session_id) = origin {
            self.send_to(
                session_id,
                ServerMessage::OperationAck {
                    operation_id: operation.id.clone(),
                    version: operation.version,
                },
            );
        }
        self.broadcast_from(
            project_id,
            origin,
            ServerMessage::operation(project_id, operation.clone()),
        );
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::types::Role;

    fn user(id: &str) -> Identity {
        Identity {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            role: Role::User,
        }
    }

    fn snapshot() -> DocumentSnapshot {
        DocumentSnapshot {
            content: "hello".into(),
            version: 3,
        }
    }

    fn connect(hub: &PresenceHub, doc: &str, id: &str) -> (String, UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = hub.join(doc, &user(id), None, snapshot(), tx);
        (session, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_join_sends_state_and_announces() {
        let hub = PresenceHub::default();
        let (_, mut a) = connect(&hub, "doc", "ann");

        let first = drain(&mut a);
        assert!(matches!(
            &first[0],
            ServerMessage::DocumentState { content, version: 3, .. } if content == "hello"
        ));
        assert!(matches!(&first[1], ServerMessage::UsersUpdate { users } if users.len() == 1));

        let (_, mut b) = connect(&hub, "doc", "bob");
        let to_a = drain(&mut a);
        assert!(matches!(&to_a[0], ServerMessage::UserJoined { user } if user.user_id == "bob"));
        assert!(matches!(&to_a[1], ServerMessage::UsersUpdate { users } if users.len() == 2));
        assert_eq!(drain(&mut b).len(), 2);
    }

    #[test]
    fn test_colors_round_robin() {
        let hub = PresenceHub::default();
        let colors: Vec<_> = (0..11)
            .map(|_| {
                let (tx, _rx) = mpsc::unbounded_channel();
                let id = hub.join("doc", &user("same"), None, snapshot(), tx);
                hub.collaborators("doc")
                    .into_iter()
                    .find(|c| c.session_id == id)
                    .map(|c| c.color)
                    .unwrap()
            })
            .collect();
        assert_eq!(colors[0], PALETTE[0]);
        assert_eq!(colors[1], PALETTE[1]);
        assert_eq!(colors[10], PALETTE[0]);
    }

    #[test]
    fn test_updates_never_echo() {
        let hub = PresenceHub::default();
        let (a, mut rx_a) = connect(&hub, "doc", "ann");
        let (_, mut rx_b) = connect(&hub, "doc", "bob");
        let (_, mut rx_other) = connect(&hub, "elsewhere", "cat");
        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut rx_other);

        hub.update_cursor(&a, CursorPosition { position: 4, line: 1, column: 4 }).unwrap();
        hub.update_selection(&a, Selection { start: 1, end: 3 }).unwrap();
        hub.set_typing(&a, true).unwrap();

        assert!(drain(&mut rx_a).is_empty());
        assert!(drain(&mut rx_other).is_empty());

        let seen = drain(&mut rx_b);
        assert_eq!(seen.len(), 3);
        assert!(matches!(&seen[0], ServerMessage::CursorUpdate(p) if p.cursor.position == 4 && p.user_name == "ANN"));
        assert!(matches!(&seen[1], ServerMessage::SelectionUpdate(p) if p.selection.end == 3));
        assert!(matches!(&seen[2], ServerMessage::UserTyping { is_typing: true, .. }));
    }

    #[test]
    fn test_late_joiner_sees_cursors() {
        let hub = PresenceHub::default();
        let (a, _rx_a) = connect(&hub, "doc", "ann");
        hub.update_cursor(&a, CursorPosition { position: 2, line: 1, column: 2 }).unwrap();

        let (_, mut rx_b) = connect(&hub, "doc", "bob");
        match drain(&mut rx_b).remove(0) {
            ServerMessage::DocumentState { cursors, selections, .. } => {
                assert_eq!(cursors.len(), 1);
                assert_eq!(cursors[0].session_id, a);
                assert!(selections.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_leave_notifies_room() {
        let hub = PresenceHub::default();
        let (a, _rx_a) = connect(&hub, "doc", "ann");
        let (_, mut rx_b) = connect(&hub, "doc", "bob");
        drain(&mut rx_b);

        hub.leave(&a).unwrap();
        let seen = drain(&mut rx_b);
        assert!(matches!(&seen[0], ServerMessage::UserLeft { user_id, .. } if user_id == "ann"));
        assert!(matches!(&seen[1], ServerMessage::UsersUpdate { users } if users.len() == 1));

        assert!(matches!(hub.leave(&a), Err(Error::NotFound(_))));
        assert!(matches!(hub.touch(&a), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_sweep_evicts_idle_sessions() {
        let hub = PresenceHub::new(Duration::from_secs(20));
        let (idle, _rx_idle) = connect(&hub, "doc", "ann");
        let (_, mut rx_b) = connect(&hub, "doc", "bob");
        drain(&mut rx_b);

        let later = Instant::now() + Duration::from_secs(21);
        // Keep bob alive right up to the sweep.
        let swept = {
            let bob = hub
                .collaborators("doc")
                .into_iter()
                .find(|c| c.user_id == "bob")
                .unwrap()
                .session_id;
            hub.sessions.get_mut(&bob).unwrap().last_seen = later;
            hub.sweep(later)
        };
        assert_eq!(swept, vec![idle]);

        let seen = drain(&mut rx_b);
        match seen.last() {
            Some(ServerMessage::UsersUpdate { users }) => {
                assert!(users.iter().all(|u| u.user_id != "ann"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(hub.sweep(later).is_empty());
    }

    #[test]
    fn test_dropped_receiver_is_swallowed() {
        let hub = PresenceHub::default();
        let (_, rx_a) = connect(&hub, "doc", "ann");
        drop(rx_a);
        let (b, _rx_b) = connect(&hub, "doc", "bob");
        hub.set_typing(&b, false).unwrap();
        assert_eq!(hub.session_count(), 2);
    }

    #[test]
    fn test_commit_acks_origin_and_relays_to_peers() {
        let hub = PresenceHub::default();
        let (a, mut rx_a) = connect(&hub, "doc", "ann");
        let (_, mut rx_b) = connect(&hub, "doc", "bob");
        drain(&mut rx_a);
        drain(&mut rx_b);

        let op = Operation {
            id: "op-4".into(),
            kind: crate::types::OperationKind::Insert,
            position: 0,
            text: Some("x".into()),
            length: None,
            author_id: "ann".into(),
            version: 4,
            timestamp: Utc::now(),
        };
        hub.committed("doc", Some(&a), &op);

        let to_a = drain(&mut rx_a);
        assert_eq!(to_a.len(), 1);
        assert!(matches!(
            &to_a[0],
            ServerMessage::OperationAck { operation_id, version: 4 } if operation_id == "op-4"
        ));
        let to_b = drain(&mut rx_b);
        assert_eq!(to_b.len(), 1);
        assert!(matches!(&to_b[0], ServerMessage::Operation { version: 4, .. }));

        // Commits from outside the room reach everyone.
        hub.committed("doc", None, &op);
        assert_eq!(drain(&mut rx_a).len(), 1);
        assert_eq!(drain(&mut rx_b).len(), 1);
    }
}
