//! Filter plugin requiring a binding to co-locate with its affinity group.

use crate::config::{AffinityLabelKeys, FeatureGates};
use crate::core::binding::{ResourceBinding, WorkloadAffinity};
use crate::core::cache::snapshot::Snapshot;
use crate::core::cluster::Cluster;
use crate::core::scheduler::plugin::{FilterPlugin, FilterResult, PluginSettings};

const UNSCHEDULABLE_REASON: &str =
    "cluster does not satisfy this resource binding's affinity term";

/// Affinity is the dual of the AntiAffinity plugin: a cluster is accepted
/// iff the binding's group has no other placed member yet, or at least one
/// other member already occupies the candidate cluster.
pub struct Affinity {
    features: FeatureGates,
    label_keys: AffinityLabelKeys,
}

impl Affinity {
    pub const NAME: &'static str = "Affinity";

    pub fn new(features: FeatureGates, label_keys: AffinityLabelKeys) -> Self {
        Self {
            features,
            label_keys,
        }
    }

    pub fn factory(settings: &PluginSettings) -> Box<dyn FilterPlugin> {
        Box::new(Self::new(settings.features, settings.label_keys.clone()))
    }
}

impl FilterPlugin for Affinity {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn filter(
        &self,
        binding: &ResourceBinding,
        cluster: &Cluster,
        snapshot: Option<&Snapshot>,
    ) -> FilterResult {
        if !self.features.workload_affinity {
            return FilterResult::Success;
        }

        let Some(term) = binding.spec.placement.workload_affinity.as_ref() else {
            return FilterResult::Success;
        };
        let label_key = match term {
            WorkloadAffinity::Affinity { affinity_label_key } => affinity_label_key,
            WorkloadAffinity::Anti { .. } => return FilterResult::Success,
        };
        if !self.label_keys.allows(label_key) {
            return FilterResult::Success;
        }

        let Some(snapshot) = snapshot else {
            return FilterResult::error("affinity snapshot is nil");
        };

        let group_value = match binding.spec.resource.affinity_group_labels.get(label_key) {
            Some(value) if !value.is_empty() => value,
            _ => return FilterResult::Success,
        };

        let self_id = binding.binding_id();
        let peers = snapshot.peer_bindings(&binding.metadata.namespace, label_key, group_value);
        let mut has_placed_peer = false;
        for peer in peers {
            if *peer == self_id {
                continue;
            }
            has_placed_peer = true;
            if snapshot.clusters_for_binding(peer).contains(cluster.name()) {
                return FilterResult::Success;
            }
        }
        if !has_placed_peer {
            // First member of the group constrains nothing.
            return FilterResult::Success;
        }

        FilterResult::unschedulable(UNSCHEDULABLE_REASON)
    }
}
