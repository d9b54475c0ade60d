//! Account-level configuration and capabilities of a cached calendar account

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::FolderId;

/// Features the account's calendar provider supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountCapabilities {
    /// Whether alarms of cached events are persisted
    #[serde(default)]
    pub supports_alarms: bool,
}

impl AccountCapabilities {
    /// Capabilities with alarm support switched on
    #[must_use]
    pub const fn with_alarms() -> Self {
        Self {
            supports_alarms: true,
        }
    }
}

/// Caching bookkeeping for one folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FolderCacheState {
    /// When the folder was last synchronized; `None` means never
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

/// Typed per-account configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub folders: BTreeMap<FolderId, FolderCacheState>,
}

impl AccountConfig {
    /// Last synchronization of `folder`, if any
    #[must_use]
    pub fn last_update(&self, folder: &FolderId) -> Option<DateTime<Utc>> {
        self.folders.get(folder).and_then(|state| state.last_update)
    }

    /// Record that `folder` was synchronized at `at`
    pub fn mark_updated(&mut self, folder: &FolderId, at: DateTime<Utc>) {
        self.folders.entry(folder.clone()).or_default().last_update = Some(at);
    }

    /// Forget the synchronization time of `folder`
    pub fn clear_last_update(&mut self, folder: &FolderId) {
        self.folders.remove(folder);
    }
}
