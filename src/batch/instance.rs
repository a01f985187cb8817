use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

use crate::error::{PromoteError, Result};

/// Derive an instance key from a target root path.
///
/// Lowercases, collapses every run of non-alphanumeric characters into `_`,
/// and trims leading/trailing underscores: `/Drafts/My Site/` -> `drafts_my_site`.
pub fn instance_key_for(root_path: &str) -> Result<String> {
    let mut key = String::with_capacity(root_path.len());
    let mut last_was_separator = true;
    for c in root_path.chars() {
        if c.is_ascii_alphanumeric() {
            key.push(c.to_ascii_lowercase());
            last_was_separator = false;
        } else if !last_was_separator {
            key.push('_');
            last_was_separator = true;
        }
    }
    let key = key.trim_end_matches('_').to_string();
    if key.is_empty() {
        return Err(PromoteError::Configuration(format!(
            "cannot derive an instance key from root path {root_path:?}"
        )));
    }
    Ok(key)
}

/// Dispatch state of one batch within an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub number: u32,
    #[serde(default)]
    pub activation_handle: Option<String>,
    #[serde(default)]
    pub done: bool,
    /// Marked done because its worker vanished without a finished status
    #[serde(default)]
    pub abandoned: bool,
}

impl BatchEntry {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            activation_handle: None,
            done: false,
            abandoned: false,
        }
    }

    pub fn is_dispatched(&self) -> bool {
        self.activation_handle.is_some()
    }
}

/// Persisted bookkeeping for one run of one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub key: String,
    pub batches: Vec<BatchEntry>,
    pub last_batch: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub finalized_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl Instance {
    /// Fresh instance whose first batch is number 1
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            batches: vec![BatchEntry::new(1)],
            last_batch: 1,
            created_at: Utc::now(),
            finalized_at: None,
            extra: Map::new(),
        }
    }

    pub fn entry(&self, number: u32) -> Option<&BatchEntry> {
        self.batches.iter().find(|b| b.number == number)
    }

    pub fn entry_mut(&mut self, number: u32) -> Option<&mut BatchEntry> {
        self.batches.iter_mut().find(|b| b.number == number)
    }

    /// Lowest-numbered batch with no activation handle
    pub fn next_undispatched(&self) -> Option<u32> {
        self.batches
            .iter()
            .filter(|b| !b.is_dispatched())
            .map(|b| b.number)
            .min()
    }

    /// Dispatched batches not yet marked done
    pub fn outstanding(&self) -> impl Iterator<Item = &BatchEntry> {
        self.batches
            .iter()
            .filter(|b| b.is_dispatched() && !b.done)
    }

    pub fn all_done(&self) -> bool {
        self.batches.iter().all(|b| b.done)
    }
}

/// Dispatch eligibility of one instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerEntry {
    pub done: bool,
    pub proceed: bool,
}

impl TrackerEntry {
    /// Finalized and waiting for (or under) dispatch
    pub fn is_eligible(&self) -> bool {
        self.proceed && !self.done
    }
}

/// Registry of every instance for one orchestration key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTracker {
    #[serde(default, deserialize_with = "deserialize_instance_keys")]
    pub instances: Vec<String>,
    #[serde(default)]
    pub entries: BTreeMap<String, TrackerEntry>,
}

/// Accept nulls and duplicates in the stored list; keep first occurrences only
fn deserialize_instance_keys<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Option<String>> = Deserialize::deserialize(deserializer)?;
    let mut seen = HashSet::new();
    Ok(raw
        .into_iter()
        .flatten()
        .filter(|key| !key.is_empty() && seen.insert(key.clone()))
        .collect())
}

impl RunTracker {
    pub fn contains(&self, instance_key: &str) -> bool {
        self.entries.contains_key(instance_key)
    }

    pub fn entry(&self, instance_key: &str) -> Option<TrackerEntry> {
        self.entries.get(instance_key).copied()
    }

    /// Register an unseen key as `{done: false, proceed: false}`; false if already known
    pub fn register(&mut self, instance_key: &str) -> bool {
        if self.contains(instance_key) {
            return false;
        }
        if !self.instances.iter().any(|k| k == instance_key) {
            self.instances.push(instance_key.to_string());
        }
        self.entries
            .insert(instance_key.to_string(), TrackerEntry::default());
        true
    }

    pub fn set(&mut self, instance_key: &str, done: bool, proceed: bool) {
        if !self.instances.iter().any(|k| k == instance_key) {
            self.instances.push(instance_key.to_string());
        }
        self.entries
            .insert(instance_key.to_string(), TrackerEntry { done, proceed });
    }

    pub fn remove(&mut self, instance_key: &str) -> bool {
        self.instances.retain(|k| k != instance_key);
        self.entries.remove(instance_key).is_some()
    }

    /// First registered key that is eligible for dispatch
    pub fn next_eligible(&self) -> Option<&str> {
        self.instances
            .iter()
            .find(|key| self.entry(key).is_some_and(|e| e.is_eligible()))
            .map(String::as_str)
    }
}
