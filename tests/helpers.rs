use std::collections::HashMap;
use std::sync::Arc;

use federatriks::config::{AffinityLabelKeys, FeatureGates};
use federatriks::core::binding::{
    Placement, ResourceBinding, ResourceBindingSpec, TargetCluster, WorkloadAffinity,
    WorkloadReference,
};
use federatriks::core::cache::AffinityCache;
use federatriks::core::cluster::{Cluster, ClusterRoster};
use federatriks::core::common::ObjectMeta;

pub const GROUP_LABEL_KEY: &str = "federatriks.io/group";

fn make_binding_with_term(
    namespace: &str,
    name: &str,
    term: Option<WorkloadAffinity>,
    group: Option<&str>,
    clusters: &[&str],
) -> ResourceBinding {
    let mut affinity_group_labels = HashMap::new();
    if let Some(group) = group {
        affinity_group_labels.insert(GROUP_LABEL_KEY.to_string(), group.to_string());
    }
    ResourceBinding {
        metadata: ObjectMeta {
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        },
        spec: ResourceBindingSpec {
            resource: WorkloadReference {
                namespace: namespace.to_string(),
                name: name.to_string(),
                affinity_group_labels,
            },
            placement: Placement {
                workload_affinity: term,
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

/// Binding carrying an anti-affinity directive for `group`, placed on the
/// given clusters. Pass no clusters for a pending binding.
pub fn make_binding(namespace: &str, name: &str, group: &str, clusters: &[&str]) -> ResourceBinding {
    make_binding_with_term(
        namespace,
        name,
        Some(WorkloadAffinity::Anti {
            affinity_label_key: GROUP_LABEL_KEY.to_string(),
        }),
        Some(group),
        clusters,
    )
}

/// Binding carrying a required-affinity directive for `group`.
pub fn make_affinity_binding(
    namespace: &str,
    name: &str,
    group: &str,
    clusters: &[&str],
) -> ResourceBinding {
    make_binding_with_term(
        namespace,
        name,
        Some(WorkloadAffinity::Affinity {
            affinity_label_key: GROUP_LABEL_KEY.to_string(),
        }),
        Some(group),
        clusters,
    )
}

/// Binding without any workload affinity directive.
pub fn make_plain_binding(namespace: &str, name: &str, clusters: &[&str]) -> ResourceBinding {
    make_binding_with_term(namespace, name, None, None, clusters)
}

pub fn make_cluster(name: &str, ready: bool) -> Cluster {
    Cluster::new(name.to_string(), ready)
}

/// Cache over a roster of ready clusters, with the affinity feature on and
/// every label key honoured.
pub fn make_cache(cluster_names: &[&str]) -> Arc<AffinityCache> {
    let roster = Arc::new(ClusterRoster::new());
    for name in cluster_names {
        roster.add_cluster(make_cluster(name, true));
    }
    Arc::new(AffinityCache::new(
        FeatureGates::default(),
        AffinityLabelKeys::any(),
        roster,
    ))
}
