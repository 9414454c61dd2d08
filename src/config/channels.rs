//! Channel bindings: where adapters should render each kind of output
//!
//! The core only reads these. Changes come from the administrative
//! configuration collaborator and are persisted to `channels.json`.

use crate::error::{LadderError, Result};
use crate::utils::write_atomically;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::info;

/// Name of the bindings file inside the data directory
pub const CHANNELS_FILE: &str = "channels.json";

/// Purpose a destination is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPurpose {
    Queue,
    Match,
    Ranking,
    Notifications,
    Logs,
}

impl ChannelPurpose {
    pub const ALL: [ChannelPurpose; 5] = [
        ChannelPurpose::Queue,
        ChannelPurpose::Match,
        ChannelPurpose::Ranking,
        ChannelPurpose::Notifications,
        ChannelPurpose::Logs,
    ];
}

impl std::str::FromStr for ChannelPurpose {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queue" => Ok(ChannelPurpose::Queue),
            "match" => Ok(ChannelPurpose::Match),
            "ranking" => Ok(ChannelPurpose::Ranking),
            "notifications" => Ok(ChannelPurpose::Notifications),
            "logs" => Ok(ChannelPurpose::Logs),
            other => Err(format!(
                "unknown channel purpose '{}' (queue, match, ranking, notifications, logs)",
                other
            )),
        }
    }
}

/// Purpose → destination id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBindings {
    pub channels: BTreeMap<ChannelPurpose, String>,
}

impl ChannelBindings {
    pub fn get(&self, purpose: ChannelPurpose) -> Option<&str> {
        self.channels.get(&purpose).map(String::as_str)
    }
}

/// Persisted channel bindings
#[derive(Debug)]
pub struct ChannelBindingStore {
    path: Option<PathBuf>,
    bindings: RwLock<ChannelBindings>,
}

impl ChannelBindingStore {
    /// Bindings that live only in memory
    pub fn in_memory() -> Self {
        Self {
            path: None,
            bindings: RwLock::new(ChannelBindings::default()),
        }
    }

    /// Load bindings from `data_dir`, starting empty if none were saved
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let path = data_dir.as_ref().join(CHANNELS_FILE);
        let bindings = if path.exists() {
            let raw = fs::read(&path)?;
            serde_json::from_slice(&raw)?
        } else {
            ChannelBindings::default()
        };

        Ok(Self {
            path: Some(path),
            bindings: RwLock::new(bindings),
        })
    }

    pub fn get(&self, purpose: ChannelPurpose) -> Result<Option<String>> {
        let bindings = self
            .bindings
            .read()
            .map_err(|_| LadderError::lock_poisoned("channel bindings"))?;
        Ok(bindings.get(purpose).map(str::to_string))
    }

    pub fn all(&self) -> Result<ChannelBindings> {
        let bindings = self
            .bindings
            .read()
            .map_err(|_| LadderError::lock_poisoned("channel bindings"))?;
        Ok(bindings.clone())
    }

    /// Bind (or with `None`, unbind) a purpose and persist the result
    pub fn set(&self, purpose: ChannelPurpose, destination: Option<String>) -> Result<()> {
        let mut bindings = self
            .bindings
            .write()
            .map_err(|_| LadderError::lock_poisoned("channel bindings"))?;

        let mut next = bindings.clone();
        match &destination {
            Some(id) => {
                next.channels.insert(purpose, id.clone());
            }
            None => {
                next.channels.remove(&purpose);
            }
        }

        if let Some(path) = &self.path {
            write_atomically(path, &serde_json::to_vec_pretty(&next)?)?;
        }
        *bindings = next;

        info!("Channel binding {:?} set to {:?}", purpose, destination);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings_persist() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChannelBindingStore::open(dir.path()).unwrap();
        assert_eq!(store.get(ChannelPurpose::Logs).unwrap(), None);

        store
            .set(ChannelPurpose::Logs, Some("1234".to_string()))
            .unwrap();
        store
            .set(ChannelPurpose::Ranking, Some("5678".to_string()))
            .unwrap();
        store.set(ChannelPurpose::Ranking, None).unwrap();

        let reopened = ChannelBindingStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get(ChannelPurpose::Logs).unwrap().as_deref(),
            Some("1234")
        );
        assert_eq!(reopened.get(ChannelPurpose::Ranking).unwrap(), None);
    }

    #[test]
    fn test_purpose_parsing() {
        assert_eq!(
            "Notifications".parse::<ChannelPurpose>().unwrap(),
            ChannelPurpose::Notifications
        );
        assert!("lobby".parse::<ChannelPurpose>().is_err());
    }
}
