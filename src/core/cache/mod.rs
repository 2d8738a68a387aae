//! In-memory index of placed resource bindings keyed by their affinity
//! group. The index is updated from the binding event stream and is read
//! by scheduling cycles only through point-in-time snapshots.

pub mod snapshot;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use crate::config::{AffinityLabelKeys, FeatureGates};
use crate::core::binding::ResourceBinding;
use crate::core::cache::snapshot::Snapshot;
use crate::core::cluster::ClusterLister;
use crate::core::events::BindingEvent;

/// Identity of an affinity peer group. Two bindings are peers iff their
/// keys are equal: same namespace, same label key, same group value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AffinityKey {
    pub namespace: String,
    pub label_key: String,
    pub group_value: String,
}

impl AffinityKey {
    pub fn new(namespace: &str, label_key: &str, group_value: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            label_key: label_key.to_string(),
            group_value: group_value.to_string(),
        }
    }
}

#[derive(Default)]
struct AffinityIndex {
    /// Insertion-ordered binding ids sharing one affinity key. No duplicates.
    /// Groups are expected to stay small (HA pairs, shard sets), so removal
    /// is a linear scan.
    affinity_groups: HashMap<AffinityKey, Vec<String>>,
    /// Target clusters of every indexed binding as of its last observed event.
    /// A binding id is present here iff it is present in some affinity group.
    clusters_by_binding: HashMap<String, HashSet<String>>,
}

/// Scheduler-internal cache combining the affinity index with the cluster
/// roster seam. Writers are the binding event handlers; readers take
/// snapshots at the start of each scheduling cycle.
pub struct AffinityCache {
    features: FeatureGates,
    label_keys: AffinityLabelKeys,
    cluster_lister: Arc<dyn ClusterLister>,
    index: RwLock<AffinityIndex>,
}

impl AffinityCache {
    pub fn new(
        features: FeatureGates,
        label_keys: AffinityLabelKeys,
        cluster_lister: Arc<dyn ClusterLister>,
    ) -> Self {
        Self {
            features,
            label_keys,
            cluster_lister,
            index: RwLock::new(Default::default()),
        }
    }

    pub fn on_binding_add(&self, event: &BindingEvent) {
        if !self.features.workload_affinity {
            return;
        }
        let Some(binding) = event.as_binding() else {
            debug!("Dropping binding add event with unrecognized payload");
            return;
        };
        let mut index = self.index.write();
        self.index_binding(&mut index, binding);
    }

    /// Applies an update as unindex-old, index-new under one write lock
    /// acquisition, so no reader observes the binding missing from both
    /// states.
    pub fn on_binding_update(&self, old: &BindingEvent, new: &BindingEvent) {
        if !self.features.workload_affinity {
            return;
        }
        let (Some(old_binding), Some(new_binding)) = (old.as_binding(), new.as_binding()) else {
            debug!("Dropping binding update event with unrecognized payload");
            return;
        };
        let mut index = self.index.write();
        self.unindex_binding(&mut index, old_binding);
        self.index_binding(&mut index, new_binding);
    }

    pub fn on_binding_delete(&self, event: &BindingEvent) {
        if !self.features.workload_affinity {
            return;
        }
        let Some(binding) = event.as_binding() else {
            debug!("Dropping binding delete event with unrecognized payload");
            return;
        };
        let mut index = self.index.write();
        self.unindex_binding(&mut index, binding);
    }

    /// Takes a point-in-time snapshot of the index together with the
    /// current cluster roster. The copy is paid once per scheduling cycle;
    /// when the workload affinity feature is disabled the index maps are
    /// omitted entirely.
    pub fn snapshot(&self) -> Snapshot {
        let clusters = self.cluster_lister.list();
        if !self.features.workload_affinity {
            return Snapshot::with_clusters(clusters);
        }

        let index = self.index.read();
        Snapshot::new(
            clusters,
            index.affinity_groups.clone(),
            index.clusters_by_binding.clone(),
        )
    }

    /// Projects the affinity group key of a binding. None when the binding
    /// carries no honoured workload affinity directive or no group label
    /// value, i.e. when it makes no affinity claim.
    fn affinity_key_of(&self, binding: &ResourceBinding) -> Option<AffinityKey> {
        let term = binding.spec.placement.workload_affinity.as_ref()?;
        let label_key = term.affinity_label_key();
        if label_key.is_empty() || !self.label_keys.allows(label_key) {
            return None;
        }
        let group_value = binding.spec.resource.affinity_group_labels.get(label_key)?;
        if group_value.is_empty() {
            return None;
        }
        Some(AffinityKey::new(
            &binding.metadata.namespace,
            label_key,
            group_value,
        ))
    }

    fn index_binding(&self, index: &mut AffinityIndex, binding: &ResourceBinding) {
        if binding.spec.clusters.is_empty() {
            debug!(
                "Binding {:?} has no target clusters, skipping affinity indexing",
                binding.binding_id()
            );
            return;
        }
        let Some(key) = self.affinity_key_of(binding) else {
            debug!(
                "Binding {:?} makes no affinity claim, skipping affinity indexing",
                binding.binding_id()
            );
            return;
        };

        let binding_id = binding.binding_id();
        let clusters: HashSet<String> = binding
            .spec
            .clusters
            .iter()
            .map(|target| target.name.clone())
            .collect();

        let group = index.affinity_groups.entry(key).or_default();
        if !group.iter().any(|id| id == &binding_id) {
            group.push(binding_id.clone());
        }
        index.clusters_by_binding.insert(binding_id, clusters);
    }

    fn unindex_binding(&self, index: &mut AffinityIndex, binding: &ResourceBinding) {
        let binding_id = binding.binding_id();
        if let Some(key) = self.affinity_key_of(binding) {
            if let Some(group) = index.affinity_groups.get_mut(&key) {
                group.retain(|id| id != &binding_id);
                if group.is_empty() {
                    index.affinity_groups.remove(&key);
                }
            }
        }
        index.clusters_by_binding.remove(&binding_id);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use crate::config::{AffinityLabelKeys, FeatureGates};
    use crate::core::binding::{
        Placement, ResourceBinding, ResourceBindingSpec, TargetCluster, WorkloadAffinity,
        WorkloadReference,
    };
    use crate::core::cache::AffinityCache;
    use crate::core::cluster::ClusterRoster;
    use crate::core::common::ObjectMeta;
    use crate::core::events::BindingEvent;

    const GROUP_KEY: &str = "federatriks.io/group";

    fn make_binding(name: &str, group: &str, clusters: &[&str]) -> ResourceBinding {
        ResourceBinding {
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: "ns1".to_string(),
                ..Default::default()
            },
            spec: ResourceBindingSpec {
                resource: WorkloadReference {
                    namespace: "ns1".to_string(),
                    name: name.to_string(),
                    affinity_group_labels: HashMap::from([(
                        GROUP_KEY.to_string(),
                        group.to_string(),
                    )]),
                },
                placement: Placement {
                    workload_affinity: Some(WorkloadAffinity::Anti {
                        affinity_label_key: GROUP_KEY.to_string(),
                    }),
                },
                clusters: clusters
                    .iter()
                    .map(|name| TargetCluster {
                        name: name.to_string(),
                        replicas: None,
                    })
                    .collect(),
            },
        }
    }

    fn make_cache() -> AffinityCache {
        AffinityCache::new(
            FeatureGates::default(),
            AffinityLabelKeys::any(),
            Arc::new(ClusterRoster::new()),
        )
    }

    #[test]
    fn test_tombstone_unwrapping() {
        let cache = make_cache();
        let binding = make_binding("job-a", "alpha", &["cluster-x"]);
        cache.on_binding_add(&BindingEvent::Binding(binding.clone()));

        cache.on_binding_delete(&BindingEvent::Tombstone {
            last_known: Some(Box::new(binding)),
        });
        let snapshot = cache.snapshot();
        assert!(snapshot.peer_bindings("ns1", GROUP_KEY, "alpha").is_empty());
        assert!(snapshot.clusters_for_binding("ns1/job-a").is_empty());
    }

    #[test]
    fn test_empty_tombstone_is_dropped() {
        let cache = make_cache();
        let binding = make_binding("job-a", "alpha", &["cluster-x"]);
        cache.on_binding_add(&BindingEvent::Binding(binding));

        // A tombstone with no recoverable object must not panic and must
        // leave the index untouched.
        cache.on_binding_delete(&BindingEvent::Tombstone { last_known: None });
        let snapshot = cache.snapshot();
        assert_eq!(
            snapshot.peer_bindings("ns1", GROUP_KEY, "alpha"),
            ["ns1/job-a".to_string()]
        );
    }

    #[test]
    fn test_duplicate_add_keeps_single_group_entry() {
        let cache = make_cache();
        let binding = make_binding("job-a", "alpha", &["cluster-x"]);
        cache.on_binding_add(&BindingEvent::Binding(binding.clone()));
        cache.on_binding_add(&BindingEvent::Binding(binding));

        let snapshot = cache.snapshot();
        assert_eq!(
            snapshot.peer_bindings("ns1", GROUP_KEY, "alpha"),
            ["ns1/job-a".to_string()]
        );
    }

    #[test]
    fn test_eligibility_requires_clusters_term_and_label() {
        let cache = make_cache();

        let pending = make_binding("pending", "alpha", &[]);
        cache.on_binding_add(&BindingEvent::Binding(pending));

        let mut no_term = make_binding("no-term", "alpha", &["cluster-x"]);
        no_term.spec.placement.workload_affinity = None;
        cache.on_binding_add(&BindingEvent::Binding(no_term));

        let mut no_label = make_binding("no-label", "alpha", &["cluster-x"]);
        no_label.spec.resource.affinity_group_labels.clear();
        cache.on_binding_add(&BindingEvent::Binding(no_label));

        let snapshot = cache.snapshot();
        assert!(snapshot.peer_bindings("ns1", GROUP_KEY, "alpha").is_empty());
    }

    #[test]
    fn test_whitelisted_label_keys_only() {
        let cache = AffinityCache::new(
            FeatureGates::default(),
            AffinityLabelKeys::from_csv("example.com/other"),
            Arc::new(ClusterRoster::new()),
        );
        let binding = make_binding("job-a", "alpha", &["cluster-x"]);
        cache.on_binding_add(&BindingEvent::Binding(binding));

        let snapshot = cache.snapshot();
        assert!(snapshot.peer_bindings("ns1", GROUP_KEY, "alpha").is_empty());
    }

    #[test]
    fn test_feature_gate_off_makes_handlers_noops() {
        let cache = AffinityCache::new(
            FeatureGates {
                workload_affinity: false,
            },
            AffinityLabelKeys::any(),
            Arc::new(ClusterRoster::new()),
        );
        let binding = make_binding("job-a", "alpha", &["cluster-x"]);
        cache.on_binding_add(&BindingEvent::Binding(binding));

        let snapshot = cache.snapshot();
        assert!(snapshot.peer_bindings("ns1", GROUP_KEY, "alpha").is_empty());
        assert!(snapshot.clusters_for_binding("ns1/job-a").is_empty());
    }
}
