//! Client-side identity: which member this device is, per team, plus the
//! teams it has visited. A cache, never the source of truth.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::member::Member;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionData {
    #[serde(default)]
    user_teams: Vec<Uuid>,
    /// team id -> member id
    #[serde(default)]
    members: BTreeMap<Uuid, Uuid>,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    path: Option<PathBuf>,
    data: SessionData,
}

impl SessionStore {
    /// Store that is never written anywhere.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// `$XDG_DATA_HOME/nextspeaker/session.json` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|d| d.join("nextspeaker").join("session.json"))
    }

    /// Load the store at `path`. A missing file is an empty session; an
    /// unreadable or corrupt one is logged and discarded.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!("Ignoring corrupt session file {}: {}", path.display(), e);
                SessionData::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SessionData::default(),
            Err(e) => {
                tracing::warn!("Could not read session file {}: {}", path.display(), e);
                SessionData::default()
            }
        };
        Self {
            path: Some(path),
            data,
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let bytes = serde_json::to_vec_pretty(&self.data)?;
        fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Teams this device has interacted with, oldest first.
    pub fn teams(&self) -> &[Uuid] {
        &self.data.user_teams
    }

    pub fn remember_team(&mut self, team_id: Uuid) {
        if !self.data.user_teams.contains(&team_id) {
            self.data.user_teams.push(team_id);
        }
    }

    /// Drop every trace of a team (used once it no longer resolves).
    pub fn forget_team(&mut self, team_id: Uuid) {
        self.data.user_teams.retain(|t| *t != team_id);
        self.data.members.remove(&team_id);
    }

    pub fn member_for(&self, team_id: Uuid) -> Option<Uuid> {
        self.data.members.get(&team_id).copied()
    }

    pub fn set_member(&mut self, team_id: Uuid, member_id: Uuid) {
        self.data.members.insert(team_id, member_id);
        self.remember_team(team_id);
    }

    pub fn forget_member(&mut self, team_id: Uuid) -> Option<Uuid> {
        self.data.members.remove(&team_id)
    }

    /// Check the stored identity for `team_id` against the team's current
    /// members. A stored id that is no longer a member is evicted and the
    /// device is treated as not being a member.
    pub fn reconcile(&mut self, team_id: Uuid, members: &[Member]) -> Option<Uuid> {
        let stored = self.member_for(team_id)?;
        if members.iter().any(|m| m.id == stored) {
            return Some(stored);
        }
        tracing::info!(
            "Stored member {} is no longer part of team {}, clearing it",
            stored,
            team_id
        );
        self.forget_member(team_id);
        None
    }
}
