//! Session lifecycle management.
//!
//! The registry is the only place sessions are inserted or removed. Each
//! session gets a pump task that forwards pty output to the viewers and,
//! when the shell exits, removes the session and notifies every viewer.

use super::pty::{PtyHandle, ShellSpec};
use super::Session;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;
use webterm_core::{
    ServerMessage, SessionSummary, TermError, TermResult, Utf8StreamDecoder, DEFAULT_COLS,
    DEFAULT_ROWS,
};

/// How long output still buffered in the pty is forwarded after the shell exits.
const EXIT_DRAIN_GRACE: Duration = Duration::from_millis(200);

/// How long shutdown waits for pumps to notify viewers.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

type SessionTable = Arc<RwLock<HashMap<String, Arc<Session>>>>;

/// Process-wide table of live sessions. Cheap to clone.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: SessionTable,
    /// Creates that passed the capacity check but are still spawning.
    spawning: Arc<AtomicUsize>,
    shell: Arc<ShellSpec>,
    max_sessions: usize,
}

/// A capacity slot held while a shell spawns. Released on drop.
struct Reservation(Arc<AtomicUsize>);

impl Drop for Reservation {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SessionRegistry {
    pub fn new(shell: ShellSpec, max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            spawning: Arc::new(AtomicUsize::new(0)),
            shell: Arc::new(shell),
            max_sessions,
        }
    }

    /// Spawn a shell and register a new session for it.
    ///
    /// Fails with [`TermError::Capacity`] when `max_sessions` are live or
    /// spawning and with [`TermError::Spawn`] when the shell cannot be
    /// started; in both cases nothing is inserted. The spawn itself runs on
    /// the blocking pool without holding the table lock.
    pub async fn create(&self) -> TermResult<Arc<Session>> {
        let reservation = self.reserve().await?;

        let shell = Arc::clone(&self.shell);
        let pty = tokio::task::spawn_blocking(move || {
            PtyHandle::spawn(&shell, DEFAULT_COLS, DEFAULT_ROWS)
        })
        .await
        .map_err(|e| TermError::Spawn(format!("spawn task failed: {e}")))??;
        let output = pty
            .take_output()
            .ok_or_else(|| TermError::Other("PTY output already taken".into()))?;

        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(id.clone(), pty));

        let mut sessions = self.sessions.write().await;
        sessions.insert(id.clone(), Arc::clone(&session));
        let live = sessions.len();
        // The slot is now counted by the table itself.
        drop(reservation);
        drop(sessions);

        tokio::spawn(pump(
            Arc::clone(&self.sessions),
            Arc::clone(&session),
            output,
        ));

        info!(session_id = %id, sessions = live, "session created");
        Ok(session)
    }

    /// Claim a slot for a new session, or fail if the registry is full.
    async fn reserve(&self) -> TermResult<Reservation> {
        let sessions = self.sessions.write().await;
        let in_use = sessions.len() + self.spawning.load(Ordering::SeqCst);
        if in_use >= self.max_sessions {
            warn!(max = self.max_sessions, "session limit reached");
            return Err(TermError::Capacity(self.max_sessions));
        }
        self.spawning.fetch_add(1, Ordering::SeqCst);
        Ok(Reservation(Arc::clone(&self.spawning)))
    }

    /// Look up a live session. A session whose shell has exited is not
    /// found, even before its pump has removed it.
    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .await
            .get(id)
            .filter(|s| !s.pty().has_exited())
            .cloned()
    }

    /// Snapshot of all live sessions, in no particular order.
    pub async fn list(&self) -> Vec<SessionSummary> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| !s.pty().has_exited())
            .map(|s| s.summary())
            .collect()
    }

    /// Remove a session and kill its shell. Unknown ids are a no-op.
    ///
    /// Returns whether a session was removed. Viewers are notified by the
    /// session's pump once the shell is gone.
    pub async fn destroy(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(session) => {
                session.pty().kill();
                info!(session_id = %id, viewers = session.viewer_count(), "session destroyed");
                true
            }
            None => {
                debug!(session_id = %id, "destroy of unknown session ignored");
                false
            }
        }
    }

    /// Get the number of active sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Kill every shell and wait briefly for viewers to be told.
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();
        if sessions.is_empty() {
            return;
        }
        info!(count = sessions.len(), "killing all sessions");
        for session in &sessions {
            session.pty().kill();
        }

        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            for session in &sessions {
                session.pty().wait().await;
            }
            while sessions.iter().any(|s| !s.is_closed()) {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        if drained.is_err() {
            let remaining = self.count().await;
            warn!(remaining, "sessions still live after shutdown grace");
        }
    }
}

/// Forward pty output to viewers until the shell exits, then tear down.
///
/// On exit the session leaves the table first, so lookups stop finding it;
/// output still buffered in the pty then reaches the viewers that were
/// already attached, and only then is each of them sent `"session exited"`.
async fn pump(
    sessions: SessionTable,
    session: Arc<Session>,
    mut output: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    let mut decoder = Utf8StreamDecoder::new();
    let mut exit = session.pty().exit_watch();

    let reached_eof = loop {
        tokio::select! {
            chunk = output.recv() => match chunk {
                Some(bytes) => forward(&session, decoder.feed(&bytes)),
                None => break true,
            },
            _ = async { let _ = exit.wait_for(Option::is_some).await; } => break false,
        }
    };

    if reached_eof {
        // EOF without an exit yet: give the waiter a moment, then make sure.
        let _ = tokio::time::timeout(EXIT_DRAIN_GRACE, async {
            let _ = exit.wait_for(Option::is_some).await;
        })
        .await;
        session.pty().kill();
    }

    sessions.write().await.remove(&session.id);

    if !reached_eof {
        // Flush whatever the shell wrote right before exiting.
        let deadline = tokio::time::sleep(EXIT_DRAIN_GRACE);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                chunk = output.recv() => match chunk {
                    Some(bytes) => forward(&session, decoder.feed(&bytes)),
                    None => break,
                },
                _ = &mut deadline => break,
            }
        }
    }
    forward(&session, decoder.finish());

    let notified = session.close_viewers();
    let code = *session.pty().exit_watch().borrow();
    info!(session_id = %session.id, viewers = notified, code = ?code, "session exited");
}

fn forward(session: &Session, text: String) {
    if text.is_empty() {
        return;
    }
    session.broadcast(&ServerMessage::output(text));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;
    use webterm_core::status;

    fn registry(max: usize) -> SessionRegistry {
        SessionRegistry::new(ShellSpec::new("/bin/sh"), max)
    }

    async fn wait_gone(registry: &SessionRegistry, id: &str) {
        timeout(Duration::from_secs(5), async {
            while registry.get(id).await.is_some() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn create_get_list_destroy() {
        let registry = registry(10);
        let a = registry.create().await.unwrap();
        let b = registry.create().await.unwrap();
        assert_ne!(a.id, b.id);

        assert!(registry.get(&a.id).await.is_some());
        let ids: Vec<String> = registry.list().await.into_iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a.id) && ids.contains(&b.id));

        assert!(registry.destroy(&a.id).await);
        assert!(registry.get(&a.id).await.is_none());
        assert!(!registry.destroy(&a.id).await);
        assert!(!registry.destroy("no-such-session").await);
        assert_eq!(registry.count().await, 1);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn shell_exit_removes_session() {
        let registry = registry(10);
        let session = registry.create().await.unwrap();
        let mut viewer = session.attach().unwrap();

        session.pty().write(b"exit\n");
        wait_gone(&registry, &session.id).await;

        let last = timeout(Duration::from_secs(5), async {
            let mut last = None;
            while let Some(msg) = viewer.recv().await {
                last = Some(msg);
            }
            last
        })
        .await
        .unwrap();
        assert_eq!(last, Some(ServerMessage::status(status::SESSION_EXITED)));
    }

    #[tokio::test]
    async fn destroy_notifies_each_viewer_once() {
        let registry = registry(10);
        let session = registry.create().await.unwrap();
        let mut viewers: Vec<_> = (0..3).map(|_| session.attach().unwrap()).collect();

        registry.destroy(&session.id).await;

        for viewer in &mut viewers {
            let exited = timeout(Duration::from_secs(5), async {
                let mut count = 0;
                let mut output_after_exit = false;
                while let Some(msg) = viewer.recv().await {
                    match msg {
                        ServerMessage::Status { status: s } if s == status::SESSION_EXITED => {
                            count += 1
                        }
                        ServerMessage::Output { .. } if count > 0 => output_after_exit = true,
                        _ => {}
                    }
                }
                assert!(!output_after_exit);
                count
            })
            .await
            .unwrap();
            assert_eq!(exited, 1);
        }
    }

    #[tokio::test]
    async fn exited_session_is_gone_once_wait_resolves() {
        let registry = registry(10);
        let session = registry.create().await.unwrap();

        session.pty().write(b"exit\n");
        timeout(Duration::from_secs(5), session.pty().wait())
            .await
            .unwrap();

        assert!(registry.get(&session.id).await.is_none());
        assert!(registry.list().await.iter().all(|s| s.id != session.id));
        assert!(session.attach().is_none());
    }

    #[tokio::test]
    async fn destroy_kills_shell_that_ignores_hangup() {
        let registry = registry(10);
        let session = registry.create().await.unwrap();
        let mut viewer = session.attach().unwrap();

        session.pty().write(b"trap '' HUP; echo hup-ignored-$((2+2))\n");
        timeout(Duration::from_secs(5), async {
            let mut seen = String::new();
            while !seen.contains("hup-ignored-4") {
                match viewer.recv().await {
                    Some(ServerMessage::Output { data }) => seen.push_str(&data),
                    other => panic!("unexpected {other:?}"),
                }
            }
        })
        .await
        .unwrap();

        assert!(registry.destroy(&session.id).await);
        timeout(Duration::from_secs(5), session.pty().wait())
            .await
            .expect("shell survived destroy");

        let last = timeout(Duration::from_secs(5), async {
            let mut last = None;
            while let Some(msg) = viewer.recv().await {
                last = Some(msg);
            }
            last
        })
        .await
        .unwrap();
        assert_eq!(last, Some(ServerMessage::status(status::SESSION_EXITED)));
        assert_eq!(session.viewer_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_creates_respect_capacity() {
        let registry = registry(2);
        let results =
            futures_util::future::join_all((0..5).map(|_| registry.create())).await;

        let created = results.iter().filter(|r| r.is_ok()).count();
        let refused = results
            .iter()
            .filter(|r| matches!(r, Err(TermError::Capacity(2))))
            .count();
        assert_eq!(created, 2);
        assert_eq!(refused, 3);
        assert_eq!(registry.count().await, 2);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn capacity_is_enforced() {
        let registry = registry(1);
        let _first = registry.create().await.unwrap();
        match registry.create().await {
            Err(TermError::Capacity(1)) => {}
            other => panic!("expected capacity error, got {:?}", other.map(|s| s.id.clone())),
        }
        assert_eq!(registry.count().await, 1);
        registry.shutdown().await;
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn spawn_failure_inserts_nothing() {
        let registry = SessionRegistry::new(ShellSpec::new("/definitely/not/a/shell"), 10);
        assert!(matches!(registry.create().await, Err(TermError::Spawn(_))));
        assert!(registry.list().await.is_empty());
    }
}
