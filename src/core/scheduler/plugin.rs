//! Filter plugin framework for the scheduling cycle.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::config::{AffinityLabelKeys, FeatureGates};
use crate::core::binding::ResourceBinding;
use crate::core::cache::snapshot::Snapshot;
use crate::core::cluster::Cluster;
use crate::core::scheduler::affinity::Affinity;
use crate::core::scheduler::anti_affinity::AntiAffinity;

/// Verdict of one filter plugin for one (binding, cluster) pair.
/// Unschedulable is a normal outcome and does not abort the evaluation of
/// other candidate clusters; Error aborts only this pair.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterResult {
    Success,
    Unschedulable { reason: String },
    Error { message: String },
}

impl FilterResult {
    pub fn unschedulable(reason: &str) -> Self {
        FilterResult::Unschedulable {
            reason: reason.to_string(),
        }
    }

    pub fn error(message: &str) -> Self {
        FilterResult::Error {
            message: message.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FilterResult::Success)
    }
}

/// Process-wide settings plugins receive at construction. Plugins never
/// read feature gates or the label key whitelist from globals.
#[derive(Debug, Clone, Default)]
pub struct PluginSettings {
    pub features: FeatureGates,
    pub label_keys: AffinityLabelKeys,
}

// Filter plugins are stateless: pure functions of their three inputs.
pub trait FilterPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Decides whether placing the binding on the candidate cluster is
    /// acceptable, consulting the scheduling cycle's snapshot.
    fn filter(
        &self,
        binding: &ResourceBinding,
        cluster: &Cluster,
        snapshot: Option<&Snapshot>,
    ) -> FilterResult;
}

type PluginFactory = fn(&PluginSettings) -> Box<dyn FilterPlugin>;

lazy_static! {
    pub static ref PLUGIN_REGISTRY: HashMap<&'static str, PluginFactory> = {
        HashMap::from([
            (AntiAffinity::NAME, AntiAffinity::factory as PluginFactory),
            (Affinity::NAME, Affinity::factory as PluginFactory),
        ])
    };
}
