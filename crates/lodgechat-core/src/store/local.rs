use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use crate::error::{ChatError, Result};
use crate::model::{ChatSession, Feedback, SessionOrigin};

use super::SessionStore;

/// Local session cache: one JSON array in one file slot.
///
/// The whole array is read-modify-written on every mutation, so saves are
/// idempotent upserts by `session_id` and the last writer wins across
/// processes. There is no schema versioning; a missing or unreadable file
/// reads as an empty cache. The `Mutex` only serializes writers inside this
/// process — cross-process races are an accepted limitation.
pub struct LocalCacheStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalCacheStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Default cache slot: `~/.config/lodgechat/sessions.json`
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("lodgechat").join("sessions.json"))
            .ok_or_else(|| ChatError::Config("cannot determine config directory".to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Vec<ChatSession> {
        let Ok(raw) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        let mut sessions: Vec<ChatSession> = serde_json::from_str(&raw).unwrap_or_default();
        for session in &mut sessions {
            session.origin = SessionOrigin::Local;
        }
        sessions
    }

    fn write_all(&self, sessions: &[ChatSession]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ChatError::Storage(format!("failed to create cache dir: {e}")))?;
        }
        let raw = serde_json::to_string(sessions)?;
        std::fs::write(&self.path, raw)
            .map_err(|e| ChatError::Storage(format!("failed to write session cache: {e}")))
    }

    fn mutate<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<ChatSession>) -> Result<()>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ChatError::Storage("session cache lock poisoned".into()))?;
        let mut sessions = self.read_all();
        f(&mut sessions)?;
        self.write_all(&sessions)
    }
}

impl SessionStore for LocalCacheStore {
    async fn list(&self) -> Result<Vec<ChatSession>> {
        Ok(self.read_all())
    }

    async fn get(&self, id: Uuid) -> Result<ChatSession> {
        self.read_all()
            .into_iter()
            .find(|s| s.session_id == id)
            .ok_or_else(|| ChatError::NotFound(format!("cached session {id}")))
    }

    async fn save(&self, session: &ChatSession) -> Result<()> {
        let mut entry = session.clone();
        entry.origin = SessionOrigin::Local;
        self.mutate(|sessions| {
            match sessions.iter_mut().find(|s| s.session_id == entry.session_id) {
                Some(existing) => *existing = entry,
                None => sessions.push(entry),
            }
            Ok(())
        })
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.mutate(|sessions| {
            let before = sessions.len();
            sessions.retain(|s| s.session_id != id);
            if sessions.len() == before {
                return Err(ChatError::NotFound(format!("cached session {id}")));
            }
            Ok(())
        })
    }

    async fn rename(&self, id: Uuid, title: &str) -> Result<()> {
        self.mutate(|sessions| {
            let session = sessions
                .iter_mut()
                .find(|s| s.session_id == id)
                .ok_or_else(|| ChatError::NotFound(format!("cached session {id}")))?;
            session.title = title.to_string();
            Ok(())
        })
    }

    async fn set_feedback(&self, session_id: Uuid, message_id: i64, value: Feedback) -> Result<()> {
        self.mutate(|sessions| {
            let session = sessions
                .iter_mut()
                .find(|s| s.session_id == session_id)
                .ok_or_else(|| ChatError::NotFound(format!("cached session {session_id}")))?;
            let message = session
                .message_mut(message_id)
                .ok_or_else(|| ChatError::NotFound(format!("message {message_id}")))?;
            message.feedback = value;
            Ok(())
        })
    }

    async fn clear(&self) -> Result<()> {
        self.mutate(|sessions| {
            sessions.clear();
            Ok(())
        })
    }
}
