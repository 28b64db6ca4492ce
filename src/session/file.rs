use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::UserIdentity;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    username: String,
    token: String,
}

/// On-disk copy of the authenticated identity so separate invocations share
/// one login.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("taskdeck");
        path.push("session.toml");
        Some(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<UserIdentity> {
        if !self.path.exists() {
            return None;
        }

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) => {
                warn!(
                    "failed to read session file '{}': {}",
                    self.path.display(),
                    error
                );
                return None;
            }
        };

        match toml::from_str::<StoredSession>(&contents) {
            Ok(stored) if !stored.token.trim().is_empty() => Some(UserIdentity {
                username: stored.username,
                token: stored.token,
            }),
            Ok(_) => None,
            Err(error) => {
                warn!(
                    "failed to parse session file '{}': {}",
                    self.path.display(),
                    error
                );
                None
            }
        }
    }

    pub fn save(&self, identity: &UserIdentity) -> anyhow::Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| anyhow!("invalid session file path"))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create session directory '{}'", parent.display()))?;

        let stored = StoredSession {
            username: identity.username.clone(),
            token: identity.token.clone(),
        };
        let contents = toml::to_string_pretty(&stored).context("failed to serialize session")?;

        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| anyhow!("invalid session file name"))?
            .to_string_lossy()
            .to_string();
        let tmp_path = self.path.with_file_name(format!(".{file_name}.tmp"));

        fs::write(&tmp_path, contents).with_context(|| {
            format!(
                "failed to write temporary session file '{}'",
                tmp_path.display()
            )
        })?;
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "failed to move session file into place at '{}'",
                self.path.display()
            )
        })?;

        Ok(())
    }

    pub fn remove(&self) -> anyhow::Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("failed to remove session file '{}'", self.path.display()))
    }
}
