//! Open-handle reference counting.
//!
//! The driver may hold the same path open from several processes at once.
//! The backend should see one logical open and one close, so each path
//! tracks the set of process ids currently holding it.
//!
//! Keyed by path, not by open instance: two opens of one path by the same
//! process count once, and the first close releases it.

use dashmap::DashMap;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct HandleRefTable {
    owners: DashMap<String, HashSet<u32>>,
}

impl HandleRefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `pid` holds `path` open. Returns true when this is the
    /// first owner.
    pub fn open(&self, path: &str, pid: u32) -> bool {
        let mut owners = self.owners.entry(path.to_string()).or_default();
        let first = owners.is_empty();
        owners.insert(pid);
        first
    }

    /// Drop `pid` from the owners of `path`. Returns true when no owners
    /// remain and the entry was removed.
    pub fn close(&self, path: &str, pid: u32) -> bool {
        if let Some(mut owners) = self.owners.get_mut(path) {
            owners.remove(&pid);
        } else {
            return false;
        }
        self.owners
            .remove_if(path, |_, owners| owners.is_empty())
            .is_some()
    }

    /// Carry the owners of `from` over to `to` after a move. Entries below
    /// `from` follow it, so a moved directory keeps its open descendants.
    pub fn rename(&self, from: &str, to: &str) {
        if from == to {
            return;
        }
        let prefix = format!("{from}\\");
        let moved: Vec<String> = self
            .owners
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| key.as_str() == from || key.starts_with(&prefix))
            .collect();
        for key in moved {
            if let Some((_, owners)) = self.owners.remove(&key) {
                let renamed = format!("{to}{}", &key[from.len()..]);
                self.owners.entry(renamed).or_default().extend(owners);
            }
        }
    }

    /// Number of distinct processes holding `path`.
    pub fn owner_count(&self, path: &str) -> usize {
        self.owners.get(path).map_or(0, |owners| owners.len())
    }

    pub fn is_open(&self, path: &str) -> bool {
        self.owners.contains_key(path)
    }

    /// Number of open paths.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
