//! Type definition for the ResourceBinding primitive: a placement request
//! pairing one workload with the member clusters it currently runs on.

use serde::{Deserialize, Serialize};

use std::collections::HashMap;

use crate::core::common::ObjectMeta;

/// Inter-workload affinity directive carried by a binding's placement.
/// The label key names the workload label whose value identifies the
/// affinity group; the mode selects the semantics enforced by the filter.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "mode")]
pub enum WorkloadAffinity {
    /// No two group members may occupy the same cluster.
    #[serde(rename = "anti")]
    Anti { affinity_label_key: String },
    /// Group members must co-locate with at least one already placed member.
    #[serde(rename = "affinity")]
    Affinity { affinity_label_key: String },
}

impl WorkloadAffinity {
    pub fn affinity_label_key(&self) -> &str {
        match self {
            WorkloadAffinity::Anti { affinity_label_key }
            | WorkloadAffinity::Affinity { affinity_label_key } => affinity_label_key,
        }
    }
}

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Placement {
    #[serde(default)]
    pub workload_affinity: Option<WorkloadAffinity>,
}

/// Reference to the workload the binding places, projected down to the
/// fields the scheduler reads.
#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WorkloadReference {
    pub namespace: String,
    pub name: String,
    /// Labels of the referenced workload, the source of affinity group values.
    #[serde(default)]
    pub affinity_group_labels: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TargetCluster {
    pub name: String,
    #[serde(default)]
    pub replicas: Option<u32>,
}

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ResourceBindingSpec {
    pub resource: WorkloadReference,
    #[serde(default)]
    pub placement: Placement,
    /// Clusters the workload is currently placed on. Empty for pending bindings.
    #[serde(default)]
    pub clusters: Vec<TargetCluster>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ResourceBinding {
    pub metadata: ObjectMeta,
    pub spec: ResourceBindingSpec,
}

impl ResourceBinding {
    /// Stable identity of the binding, canonically `namespace/name`.
    pub fn binding_id(&self) -> String {
        format!("{}/{}", self.metadata.namespace, self.metadata.name)
    }
}
