use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use taskdeck_shared::User;
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub user: User,
}

/// Shared handle to the signed-in session. Clones see the same state, so
/// the HTTP client can clear it on a 401 while the auth store reads it.
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<RwLock<Option<StoredSession>>>,
    path: Option<PathBuf>,
}

impl Session {
    /// A session that never touches disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;
        let path = data_dir.join(SESSION_FILE);
        let stored = load_session(&path)?;
        info!(
            file = %path.display(),
            signed_in = stored.is_some(),
            "opened session"
        );
        Ok(Self {
            inner: Arc::new(RwLock::new(stored)),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn current(&self) -> Option<StoredSession> {
        self.inner.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.inner.read().as_ref().map(|s| s.token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.inner.read().as_ref().map(|s| s.user.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.inner.read().is_some()
    }

    pub fn set(&self, token: String, user: User) -> anyhow::Result<()> {
        let stored = StoredSession { token, user };
        if let Some(path) = self.path.as_deref() {
            save_session_atomic(path, &stored)?;
        }
        *self.inner.write() = Some(stored);
        Ok(())
    }

    /// Replaces the user while keeping the token. A no-op when signed out.
    pub fn set_user(&self, user: User) -> anyhow::Result<()> {
        let Some(token) = self.token() else {
            return Ok(());
        };
        self.set(token, user)
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        *self.inner.write() = None;
        if let Some(path) = self.path.as_deref()
            && path.exists()
        {
            fs::remove_file(path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
            debug!(file = %path.display(), "removed session file");
        }
        Ok(())
    }
}

#[tracing::instrument(skip(path))]
fn load_session(path: &Path) -> anyhow::Result<Option<StoredSession>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let stored = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing {}", path.display()))?;
    Ok(Some(stored))
}

#[tracing::instrument(skip(path, stored))]
fn save_session_atomic(path: &Path, stored: &StoredSession) -> anyhow::Result<()> {
    debug!(file = %path.display(), "saving session atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    let serialized = serde_json::to_string_pretty(stored)?;
    writeln!(temp, "{serialized}")?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
