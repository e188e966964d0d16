//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use zonewatch::cluster::{ClusterError, ClusterResult, NodeSource};
use zonewatch::models::Labels;

/// Build a label map from pairs
pub fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Labels of a typical worker node in `zone`
pub fn worker_node(hostname: &str, zone: &str, region: &str) -> Labels {
    labels(&[
        ("kubernetes.io/hostname", hostname),
        ("failure-domain.beta.kubernetes.io/zone", zone),
        ("failure-domain.beta.kubernetes.io/region", region),
        ("node-role.kubernetes.io/node", ""),
    ])
}

/// Source that always returns the same nodes
pub struct StaticSource {
    nodes: Vec<Labels>,
}

impl StaticSource {
    pub fn new(nodes: Vec<Labels>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl NodeSource for StaticSource {
    async fn list_nodes(&self) -> ClusterResult<Vec<Labels>> {
        Ok(self.nodes.clone())
    }
}

/// Source that replays scripted results, repeating the last one
pub struct ScriptedSource {
    script: Mutex<VecDeque<ClusterResult<Vec<Labels>>>>,
    last: Vec<Labels>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<ClusterResult<Vec<Labels>>>, last: Vec<Labels>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails `failures` times with a 503, then returns `nodes`
    pub fn failing_then(failures: usize, nodes: Vec<Labels>) -> Self {
        let script = (0..failures)
            .map(|_| {
                Err(ClusterError::Status {
                    status: 503,
                    message: "apiserver unavailable".to_string(),
                })
            })
            .collect();
        Self::new(script, nodes)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeSource for ScriptedSource {
    async fn list_nodes(&self) -> ClusterResult<Vec<Labels>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.last.clone()))
    }
}
