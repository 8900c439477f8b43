use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::roster::Agent;

pub const JOINED_TEAM_KEY: &str = "trenchmark-joined-team";

#[derive(Debug, thiserror::Error)]
pub enum TeamError {
    #[error("team store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("team store is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("no agent with id '{0}'")]
    UnknownAgent(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Entries(BTreeMap<String, String>);

/// Key-value file recording which agent's team the viewer joined
pub struct TeamStore {
    path: PathBuf,
    entries: Entries,
}

impl TeamStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TeamError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let data = fs::read_to_string(&path)?;
            serde_json::from_str(&data)?
        } else {
            Entries::default()
        };
        Ok(Self { path, entries })
    }

    pub fn joined(&self) -> Option<&str> {
        self.entries.0.get(JOINED_TEAM_KEY).map(String::as_str)
    }

    /// Join the team of `agent_id`, which must be on the roster.
    pub fn join(&mut self, agent_id: &str, roster: &[Agent]) -> Result<(), TeamError> {
        if !roster.iter().any(|a| a.id == agent_id) {
            return Err(TeamError::UnknownAgent(agent_id.to_string()));
        }
        self.entries
            .0
            .insert(JOINED_TEAM_KEY.to_string(), agent_id.to_string());
        self.persist()?;
        info!(team = %agent_id, "joined team");
        Ok(())
    }

    pub fn leave(&mut self) -> Result<(), TeamError> {
        if let Some(team) = self.entries.0.remove(JOINED_TEAM_KEY) {
            self.persist()?;
            info!(team = %team, "left team");
        }
        Ok(())
    }

    fn persist(&self) -> Result<(), TeamError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
