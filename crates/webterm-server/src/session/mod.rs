//! Sessions: a pty plus the set of viewers currently attached to it.

pub mod pty;
pub mod registry;

pub use pty::{resolve_start_dir, PtyHandle, ShellSpec};
pub use registry::SessionRegistry;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use webterm_core::{status, ServerMessage, SessionSummary};

/// A live shell session. Owns its pty exclusively.
pub struct Session {
    /// Unique session identifier.
    pub id: String,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    pty: PtyHandle,
    viewers: Mutex<ViewerSet>,
}

/// Attached viewers. Broadcast, attach and detach all run under one lock.
#[derive(Default)]
struct ViewerSet {
    next_id: u64,
    senders: HashMap<u64, mpsc::UnboundedSender<ServerMessage>>,
    /// Set once the session has exited; no further attaches are accepted.
    closed: bool,
}

impl Session {
    pub fn new(id: String, pty: PtyHandle) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            pty,
            viewers: Mutex::new(ViewerSet::default()),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            created_at: self.created_at,
        }
    }

    pub fn pty(&self) -> &PtyHandle {
        &self.pty
    }

    /// Register a new viewer. Returns `None` if the shell already exited.
    pub fn attach(self: &Arc<Self>) -> Option<Viewer> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut set = self.lock_viewers();
        if set.closed || self.pty.has_exited() {
            return None;
        }
        let id = set.next_id;
        set.next_id += 1;
        set.senders.insert(id, tx);
        debug!(session_id = %self.id, viewer = id, viewers = set.senders.len(), "viewer attached");
        drop(set);

        Some(Viewer {
            id,
            session: Arc::clone(self),
            rx,
        })
    }

    fn detach(&self, viewer_id: u64) {
        let mut set = self.lock_viewers();
        if set.senders.remove(&viewer_id).is_some() {
            debug!(session_id = %self.id, viewer = viewer_id, viewers = set.senders.len(), "viewer detached");
        }
    }

    /// Send `msg` to every attached viewer. Never blocks.
    ///
    /// Returns how many viewers received it.
    pub fn broadcast(&self, msg: &ServerMessage) -> usize {
        let mut set = self.lock_viewers();
        if set.closed {
            return 0;
        }
        // A failed send means the viewer task is gone but not yet detached.
        set.senders.retain(|_, tx| tx.send(msg.clone()).is_ok());
        set.senders.len()
    }

    /// Mark the session exited: every viewer gets exactly one
    /// `"session exited"` and its channel is closed.
    ///
    /// Returns the number of viewers notified. Subsequent calls return 0.
    pub fn close_viewers(&self) -> usize {
        let mut set = self.lock_viewers();
        if set.closed {
            return 0;
        }
        set.closed = true;
        let exited = ServerMessage::status(status::SESSION_EXITED);
        let mut notified = 0;
        for (_, tx) in set.senders.drain() {
            if tx.send(exited.clone()).is_ok() {
                notified += 1;
            }
        }
        notified
    }

    pub fn viewer_count(&self) -> usize {
        self.lock_viewers().senders.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock_viewers().closed
    }

    fn lock_viewers(&self) -> MutexGuard<'_, ViewerSet> {
        // A poisoned set still holds valid senders.
        self.viewers.lock().unwrap_or_else(|poisoned| {
            warn!(session_id = %self.id, "viewer set lock poisoned");
            poisoned.into_inner()
        })
    }
}

/// One attached viewer. Detaches itself when dropped.
pub struct Viewer {
    id: u64,
    session: Arc<Session>,
    rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Viewer {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Next message for this viewer. `None` after the session closed and
    /// the final status has been delivered.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.rx.recv().await
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.session.detach(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Arc<Session> {
        let pty = PtyHandle::spawn(&ShellSpec::new("/bin/sh"), 80, 24).unwrap();
        Arc::new(Session::new("test".into(), pty))
    }

    #[tokio::test]
    async fn broadcast_reaches_every_viewer_in_order() {
        let session = session();
        let mut a = session.attach().unwrap();
        let mut b = session.attach().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(session.viewer_count(), 2);

        for chunk in ["one", "two", "three"] {
            assert_eq!(session.broadcast(&ServerMessage::output(chunk)), 2);
        }
        for viewer in [&mut a, &mut b] {
            for chunk in ["one", "two", "three"] {
                assert_eq!(viewer.recv().await, Some(ServerMessage::output(chunk)));
            }
        }
    }

    #[tokio::test]
    async fn dropped_viewer_is_detached() {
        let session = session();
        let a = session.attach().unwrap();
        let _b = session.attach().unwrap();
        drop(a);
        assert_eq!(session.viewer_count(), 1);
        assert_eq!(session.broadcast(&ServerMessage::output("x")), 1);
    }

    #[tokio::test]
    async fn close_notifies_each_viewer_once() {
        let session = session();
        let mut viewers: Vec<Viewer> = (0..3).map(|_| session.attach().unwrap()).collect();

        assert_eq!(session.close_viewers(), 3);
        assert_eq!(session.close_viewers(), 0);
        assert_eq!(session.broadcast(&ServerMessage::output("late")), 0);

        for viewer in &mut viewers {
            assert_eq!(
                viewer.recv().await,
                Some(ServerMessage::status(status::SESSION_EXITED))
            );
            assert_eq!(viewer.recv().await, None);
        }
    }

    #[tokio::test]
    async fn attach_after_close_is_refused() {
        let session = session();
        session.close_viewers();
        assert!(session.is_closed());
        assert!(session.attach().is_none());
    }
}
