// Core data structures for the node placement observer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ErrorCategory;

/// Label set of a single cluster node (key -> value)
pub type Labels = BTreeMap<String, String>;

/// Placement metadata extracted from a node's well-known labels
///
/// Field names on the wire are fixed: `ip` carries the hostname label,
/// `az` the zone label and `region` the region label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementRecord {
    #[serde(rename = "ip")]
    pub hostname: String,
    #[serde(rename = "az")]
    pub zone: String,
    pub region: String,
}

impl PlacementRecord {
    pub fn new(
        hostname: impl Into<String>,
        zone: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            zone: zone.into(),
            region: region.into(),
        }
    }
}

/// Output of one complete refresh cycle
///
/// Maps each matched label key (a match group) to the placement records of
/// the nodes carrying it, in discovery order. A snapshot is never mutated
/// after it has been published to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    groups: BTreeMap<String, Vec<PlacementRecord>>,
}

impl Snapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to the group for `matched_key`
    pub fn push(&mut self, matched_key: impl Into<String>, record: PlacementRecord) {
        self.groups.entry(matched_key.into()).or_default().push(record);
    }

    /// Records of one match group
    pub fn group(&self, matched_key: &str) -> Option<&[PlacementRecord]> {
        self.groups.get(matched_key).map(Vec::as_slice)
    }

    /// Number of match groups
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Total number of records across all groups
    pub fn record_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Iterate over `(matched_key, records)` pairs
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[PlacementRecord])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl<K: Into<String>> FromIterator<(K, PlacementRecord)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, PlacementRecord)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (key, record) in iter {
            snapshot.push(key, record);
        }
        snapshot
    }
}

/// Bookkeeping about the refresh loop, kept next to the snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStatus {
    /// Cycles that published a snapshot (including failed listings)
    pub cycles: u64,

    /// Cycles whose node listing failed
    pub failed_cycles: u64,

    /// Nodes returned by the last listing
    pub last_node_count: usize,

    /// When the last snapshot was published
    pub last_published_at: Option<DateTime<Utc>>,

    /// When the node listing last succeeded
    pub last_success_at: Option<DateTime<Utc>>,

    /// Error of the most recent failed listing, cleared on success
    pub last_error: Option<String>,

    /// Classification of `last_error`
    pub last_error_category: Option<ErrorCategory>,
}

impl RefreshStatus {
    /// Whether at least one listing has succeeded
    pub fn has_succeeded(&self) -> bool {
        self.last_success_at.is_some()
    }

    /// Seconds since the last successful listing
    pub fn seconds_since_success(&self) -> Option<i64> {
        self.last_success_at
            .map(|at| (Utc::now() - at).num_seconds())
    }
}
