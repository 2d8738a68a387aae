//! Scheduler running the filter plugin chain over candidate clusters for
//! pending resource bindings.

use std::sync::Arc;

use log::{debug, warn};

use crate::config::{AffinityLabelKeys, SchedulerConfig};
use crate::core::binding::ResourceBinding;
use crate::core::cache::snapshot::Snapshot;
use crate::core::cache::AffinityCache;
use crate::core::cluster::Cluster;
use crate::core::common::CancelFlag;
use crate::core::scheduler::plugin::{FilterPlugin, FilterResult, PluginSettings, PLUGIN_REGISTRY};

#[derive(Debug, PartialEq)]
pub enum ScheduleError {
    UnknownPlugin(String),
    NoClustersInRoster,
    NoFeasibleClusters,
    Cancelled,
}

/// Result of one scheduling cycle for one binding: the ready clusters that
/// passed every filter, and the reason each remaining ready cluster was
/// rejected.
#[derive(Debug, PartialEq)]
pub struct ScheduleOutcome {
    pub feasible: Vec<String>,
    pub diagnosis: Vec<(String, String)>,
}

pub struct Scheduler {
    cache: Arc<AffinityCache>,
    plugins: Vec<Box<dyn FilterPlugin>>,
}

impl Scheduler {
    /// Builds the filter chain named by the config profile from the plugin
    /// registry.
    pub fn new(config: &SchedulerConfig, cache: Arc<AffinityCache>) -> Result<Self, ScheduleError> {
        let settings = PluginSettings {
            features: config.features,
            label_keys: match &config.affinity_label_keys {
                Some(keys) => AffinityLabelKeys::new(Some(keys.clone())),
                None => AffinityLabelKeys::any(),
            },
        };

        let mut plugins = Vec::with_capacity(config.profile.filter_plugins.len());
        for name in &config.profile.filter_plugins {
            let factory = PLUGIN_REGISTRY
                .get(name.as_str())
                .ok_or_else(|| ScheduleError::UnknownPlugin(name.clone()))?;
            plugins.push(factory(&settings));
        }

        Ok(Self { cache, plugins })
    }

    /// Runs one scheduling cycle for a pending binding: takes a snapshot
    /// of the cache and evaluates every ready cluster through the filter
    /// chain. Clusters that are not ready are not considered at all.
    pub fn schedule_one(
        &self,
        binding: &ResourceBinding,
        cancel: &CancelFlag,
    ) -> Result<ScheduleOutcome, ScheduleError> {
        let snapshot = self.cache.snapshot();
        if snapshot.num_of_clusters() == 0 {
            return Err(ScheduleError::NoClustersInRoster);
        }

        let mut feasible = Vec::new();
        let mut diagnosis = Vec::new();
        for cluster in snapshot.ready_clusters() {
            if cancel.is_cancelled() {
                return Err(ScheduleError::Cancelled);
            }
            match self.run_filters(binding, cluster, &snapshot) {
                FilterResult::Success => feasible.push(cluster.name().to_string()),
                FilterResult::Unschedulable { reason } => {
                    diagnosis.push((cluster.name().to_string(), reason));
                }
                FilterResult::Error { message } => {
                    // An error aborts this (binding, cluster) pair only.
                    warn!(
                        "Filter error for binding {:?} on cluster {:?}: {}",
                        binding.binding_id(),
                        cluster.name(),
                        message
                    );
                    diagnosis.push((cluster.name().to_string(), message));
                }
            }
        }

        if feasible.is_empty() {
            debug!(
                "Binding {:?} is unschedulable: {:?}",
                binding.binding_id(),
                diagnosis
            );
            return Err(ScheduleError::NoFeasibleClusters);
        }

        Ok(ScheduleOutcome {
            feasible,
            diagnosis,
        })
    }

    fn run_filters(
        &self,
        binding: &ResourceBinding,
        cluster: &Cluster,
        snapshot: &Snapshot,
    ) -> FilterResult {
        for plugin in self.plugins.iter() {
            let result = plugin.filter(binding, cluster, Some(snapshot));
            if !result.is_success() {
                debug!(
                    "Plugin {:?} filtered out cluster {:?} for binding {:?}",
                    plugin.name(),
                    cluster.name(),
                    binding.binding_id()
                );
                return result;
            }
        }
        FilterResult::Success
    }
}
