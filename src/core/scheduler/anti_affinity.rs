//! Filter plugin rejecting clusters that already host an anti-affinity
//! peer of the binding being scheduled.

use crate::config::{AffinityLabelKeys, FeatureGates};
use crate::core::binding::{ResourceBinding, WorkloadAffinity};
use crate::core::cache::snapshot::Snapshot;
use crate::core::cluster::Cluster;
use crate::core::scheduler::plugin::{FilterPlugin, FilterResult, PluginSettings};

const UNSCHEDULABLE_REASON: &str = "cluster violates this resource binding's anti-affinity term";

/// AntiAffinity checks whether scheduling a resource binding to a cluster
/// would co-locate it with a peer of its anti-affinity group. A cluster is
/// rejected iff some other member of the group occupies it in the cycle's
/// snapshot.
pub struct AntiAffinity {
    features: FeatureGates,
    label_keys: AffinityLabelKeys,
}

impl AntiAffinity {
    pub const NAME: &'static str = "AntiAffinity";

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

impl FilterPlugin for AntiAffinity {
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
            // Workload affinity is not being used.
            return FilterResult::Success;
        };
        let label_key = match term {
            WorkloadAffinity::Anti { affinity_label_key } => affinity_label_key,
            // The affinity mode is handled by its own plugin.
            WorkloadAffinity::Affinity { .. } => return FilterResult::Success,
        };
        if !self.label_keys.allows(label_key) {
            // A directive naming a key outside the whitelist is treated as absent.
            return FilterResult::Success;
        }

        let Some(snapshot) = snapshot else {
            return FilterResult::error("anti-affinity snapshot is nil");
        };

        let group_value = match binding.spec.resource.affinity_group_labels.get(label_key) {
            Some(value) if !value.is_empty() => value,
            // The workload opts out by lacking the group label.
            _ => return FilterResult::Success,
        };

        let self_id = binding.binding_id();
        let peers = snapshot.peer_bindings(&binding.metadata.namespace, label_key, group_value);
        for peer in peers {
            if *peer == self_id {
                // The binding re-enters scheduling while still indexed.
                continue;
            }
            if snapshot.clusters_for_binding(peer).contains(cluster.name()) {
                return FilterResult::unschedulable(UNSCHEDULABLE_REASON);
            }
        }

        FilterResult::Success
    }
}
