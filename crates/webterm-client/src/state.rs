//! Remembers the last session the user attached to.

use std::path::{Path, PathBuf};
use tracing::debug;
use webterm_core::TermResult;

/// A one-line file holding the last-used session id.
#[derive(Debug, Clone)]
pub struct LastSession {
    path: PathBuf,
}

impl LastSession {
    /// `~/.webterm/last_session`, if a home directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".webterm").join("last_session"))
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The remembered id, or `None` if nothing usable is stored.
    pub fn load(&self) -> Option<String> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let id = content.trim();
        if id.is_empty() {
            None
        } else {
            Some(id.to_string())
        }
    }

    pub fn save(&self, session_id: &str) -> TermResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, format!("{session_id}\n"))?;
        debug!(path = %self.path.display(), session_id, "saved last session");
        Ok(())
    }

    /// Forget the stored id, but only if it is `session_id`.
    pub fn forget(&self, session_id: &str) -> TermResult<()> {
        if self.load().as_deref() == Some(session_id) {
            std::fs::remove_file(&self.path)?;
            debug!(path = %self.path.display(), session_id, "forgot last session");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_forget() {
        let dir = tempfile::tempdir().unwrap();
        let last = LastSession::new(dir.path().join("nested").join("last_session"));
        assert_eq!(last.load(), None);

        last.save("abc").unwrap();
        assert_eq!(last.load().as_deref(), Some("abc"));

        // A different id leaves the file alone.
        last.forget("other").unwrap();
        assert_eq!(last.load().as_deref(), Some("abc"));

        last.forget("abc").unwrap();
        assert_eq!(last.load(), None);
        last.forget("abc").unwrap();
    }

    #[test]
    fn blank_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_session");
        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(LastSession::new(path).load(), None);
    }
}
