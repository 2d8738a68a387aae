//! Point-in-time snapshot of the affinity cache and the cluster roster.
//! The scheduler takes a snapshot at the beginning of each scheduling
//! cycle and uses it for all operations in that cycle.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;

use crate::core::cache::AffinityKey;
use crate::core::cluster::Cluster;

lazy_static! {
    static ref NO_CLUSTERS: HashSet<String> = HashSet::new();
}

/// A snapshot is a value: once taken it never coordinates with the cache
/// again and is safe for unsynchronized reads from any number of workers.
#[derive(Default, Debug, Clone)]
pub struct Snapshot {
    clusters: Vec<Cluster>,
    affinity_groups: HashMap<AffinityKey, Vec<String>>,
    clusters_by_binding: HashMap<String, HashSet<String>>,
}

impl Snapshot {
    pub fn new(
        clusters: Vec<Cluster>,
        affinity_groups: HashMap<AffinityKey, Vec<String>>,
        clusters_by_binding: HashMap<String, HashSet<String>>,
    ) -> Self {
        Self {
            clusters,
            affinity_groups,
            clusters_by_binding,
        }
    }

    /// Snapshot of the roster alone, with the affinity index omitted. Used
    /// when the workload affinity feature is disabled.
    pub fn with_clusters(clusters: Vec<Cluster>) -> Self {
        Self {
            clusters,
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Default::default()
    }

    pub fn num_of_clusters(&self) -> usize {
        self.clusters.len()
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn ready_clusters(&self) -> Vec<&Cluster> {
        self.clusters
            .iter()
            .filter(|cluster| cluster.is_ready())
            .collect()
    }

    pub fn ready_cluster_names(&self) -> HashSet<String> {
        self.clusters
            .iter()
            .filter(|cluster| cluster.is_ready())
            .map(|cluster| cluster.name().to_string())
            .collect()
    }

    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|cluster| cluster.name() == name)
    }

    /// Ids of the bindings indexed under the given affinity group, in no
    /// particular order. Empty for unknown groups.
    pub fn peer_bindings(&self, namespace: &str, label_key: &str, group_value: &str) -> &[String] {
        let key = AffinityKey::new(namespace, label_key, group_value);
        self.affinity_groups
            .get(&key)
            .map(|group| group.as_slice())
            .unwrap_or(&[])
    }

    /// Names of the clusters the given binding occupied when the snapshot
    /// was taken. Empty for unknown bindings.
    pub fn clusters_for_binding(&self, binding_id: &str) -> &HashSet<String> {
        self.clusters_by_binding
            .get(binding_id)
            .unwrap_or(&NO_CLUSTERS)
    }
}
