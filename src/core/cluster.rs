//! Type definitions for member clusters of the federation.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::common::ObjectMeta;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub enum ClusterConditionType {
    // Cluster agent is healthy and the cluster accepts new workloads.
    ClusterReady,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClusterCondition {
    // "True", "False" or "Unknown"
    pub status: String,
    pub condition_type: ClusterConditionType,
}

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClusterStatus {
    #[serde(default)]
    pub conditions: Vec<ClusterCondition>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Cluster {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: ClusterStatus,
}

impl Cluster {
    pub fn new(name: String, ready: bool) -> Self {
        let status = if ready { "True" } else { "False" };
        Self {
            metadata: ObjectMeta {
                name,
                ..Default::default()
            },
            status: ClusterStatus {
                conditions: vec![ClusterCondition {
                    status: status.to_string(),
                    condition_type: ClusterConditionType::ClusterReady,
                }],
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn is_ready(&self) -> bool {
        self.status.conditions.iter().any(|condition| {
            condition.condition_type == ClusterConditionType::ClusterReady
                && condition.status == "True"
        })
    }
}

/// Source of the current member cluster roster. The roster producer keeps
/// its implementation synchronized with the control plane; the scheduler
/// cache only reads it when taking a snapshot.
pub trait ClusterLister: Send + Sync {
    /// Returns copies of all member clusters, ordered by name.
    fn list(&self) -> Vec<Cluster>;
}

/// In-process cluster roster updated from cluster membership events.
#[derive(Default)]
pub struct ClusterRoster {
    clusters: RwLock<HashMap<String, Cluster>>,
}

impl ClusterRoster {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_cluster(&self, cluster: Cluster) {
        self.clusters
            .write()
            .insert(cluster.metadata.name.clone(), cluster);
    }

    pub fn update_cluster(&self, cluster: Cluster) {
        self.clusters
            .write()
            .insert(cluster.metadata.name.clone(), cluster);
    }

    pub fn delete_cluster(&self, name: &str) {
        self.clusters.write().remove(name);
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.read().len()
    }
}

impl ClusterLister for ClusterRoster {
    fn list(&self) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = self.clusters.read().values().cloned().collect();
        clusters.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        clusters
    }
}
