//! Pocket ID allow-list (`pocket_users.json`) and its local admin edits.
//!
//! There is no write-back API: edits live in memory until [`AllowList::export`]
//! writes the file the operator uploads wherever `pocket_users.json` is served.

use crate::types::{lenient, lenient_or_default, Role};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub const STATUS_ACTIVE: &str = "active";

/// One allow-list row. Fields are read leniently so a single malformed entry
/// cannot make the whole list unreadable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowListEntry {
    /// Map key on the wire; filled in after loading.
    #[serde(skip)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub name: String,
    /// Unknown roles read as `user`.
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub role: Role,
    #[serde(default, alias = "telegramId", deserialize_with = "lenient")]
    pub telegram_id: Option<i64>,
    #[serde(default, alias = "registeredAt", deserialize_with = "lenient")]
    pub registered_at: Option<String>,
    /// Empty when the file omits it, which is not active.
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub status: String,
}

impl AllowListEntry {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_ACTIVE)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AllowListError {
    #[error("Fill in both the Pocket ID and the name")]
    MissingField,
    #[error("User {0} already exists")]
    Duplicate(String),
    #[error("User {0} not found")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowListStats {
    pub total_users: usize,
    pub admins: usize,
    pub active_users: usize,
    pub users: usize,
}

/// Entries keyed by Pocket ID. Ids are unique by construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllowList {
    entries: BTreeMap<String, AllowListEntry>,
}

impl AllowList {
    /// Built-in list: the whole list in `AUTH_MODE=seeded`, and the fallback in
    /// `allowlist` mode while `pocket_users.json` cannot be fetched.
    pub fn seeded() -> Self {
        let mut list = Self::default();
        list.entries.insert(
            "69662105".to_string(),
            AllowListEntry {
                id: "69662105".to_string(),
                name: "Admin".to_string(),
                role: Role::Admin,
                telegram_id: Some(5129282647),
                registered_at: Some("2024-01-15T10:30:00".to_string()),
                status: STATUS_ACTIVE.to_string(),
            },
        );
        list
    }

    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).context("Parse allow-list JSON")
    }

    pub fn get(&self, id: &str) -> Option<&AllowListEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = &AllowListEntry> {
        self.entries.values()
    }

    pub fn add(
        &mut self,
        id: &str,
        name: &str,
        role: Role,
        telegram_id: Option<i64>,
    ) -> Result<&AllowListEntry, AllowListError> {
        let id = id.trim();
        let name = name.trim();
        if id.is_empty() || name.is_empty() {
            return Err(AllowListError::MissingField);
        }
        if self.entries.contains_key(id) {
            return Err(AllowListError::Duplicate(id.to_string()));
        }

        let entry = AllowListEntry {
            id: id.to_string(),
            name: name.to_string(),
            role,
            telegram_id,
            registered_at: Some(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
            status: STATUS_ACTIVE.to_string(),
        };
        info!("Allow-list: added {id} ({name}, {role})");
        Ok(self.entries.entry(id.to_string()).or_insert(entry))
    }

    pub fn remove(&mut self, id: &str) -> Result<AllowListEntry, AllowListError> {
        let removed = self
            .entries
            .remove(id.trim())
            .ok_or_else(|| AllowListError::NotFound(id.trim().to_string()))?;
        info!("Allow-list: removed {}", removed.id);
        Ok(removed)
    }

    pub fn stats(&self) -> AllowListStats {
        let total_users = self.entries.len();
        let admins = self.iter().filter(|e| e.role == Role::Admin).count();
        let active_users = self.iter().filter(|e| e.is_active()).count();
        AllowListStats {
            total_users,
            admins,
            active_users,
            users: total_users - admins,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Serialize allow-list")
    }

    /// Write the list as `pocket_users.json` for manual upload.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let body = self.to_json_pretty()?;
        std::fs::write(path, body).with_context(|| format!("Write {}", path.display()))?;
        info!(
            "Allow-list exported: {} user(s) -> {} (upload it where pocket_users.json is served)",
            self.len(),
            path.display()
        );
        Ok(())
    }
}

impl Serialize for AllowList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AllowList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut entries = BTreeMap::<String, AllowListEntry>::deserialize(deserializer)?;
        for (id, entry) in entries.iter_mut() {
            entry.id = id.clone();
        }
        Ok(Self { entries })
    }
}
