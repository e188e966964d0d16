//! Node label matching and placement extraction
//!
//! A node matches a filter once for every label *key* that contains the
//! filter as a substring. Each match yields the node's placement record,
//! built from three well-known topology labels.

use crate::models::{Labels, PlacementRecord, Snapshot};

/// Label holding the node hostname
pub const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

/// Label holding the node availability zone
pub const ZONE_LABEL: &str = "failure-domain.beta.kubernetes.io/zone";

/// Label holding the node region
pub const REGION_LABEL: &str = "failure-domain.beta.kubernetes.io/region";

/// Default label filter used when none is configured
pub const DEFAULT_LABEL_FILTER: &str = "node-role.kubernetes.io/node";

/// Build the placement record for a node; absent labels become empty strings
pub fn placement_of(labels: &Labels) -> PlacementRecord {
    let get = |key: &str| labels.get(key).cloned().unwrap_or_default();

    PlacementRecord {
        hostname: get(HOSTNAME_LABEL),
        zone: get(ZONE_LABEL),
        region: get(REGION_LABEL),
    }
}

/// Match one node's labels against `filter`
///
/// Returns one `(matched_key, record)` pair per label key containing
/// `filter`. All pairs of a node carry the same record.
pub fn match_labels(labels: &Labels, filter: &str) -> Vec<(String, PlacementRecord)> {
    let matched: Vec<&String> = labels.keys().filter(|key| key.contains(filter)).collect();
    if matched.is_empty() {
        return Vec::new();
    }

    let record = placement_of(labels);
    matched
        .into_iter()
        .map(|key| (key.clone(), record.clone()))
        .collect()
}

/// Run the extractor over a full node listing and collect a snapshot
pub fn build_snapshot<'a, I>(nodes: I, filter: &str) -> Snapshot
where
    I: IntoIterator<Item = &'a Labels>,
{
    nodes
        .into_iter()
        .flat_map(|labels| match_labels(labels, filter))
        .collect()
}
