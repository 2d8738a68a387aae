//! Config field definitions for the federatriks scheduler.

use std::collections::HashSet;

use log::warn;
use serde::Deserialize;

fn default_workload_affinity() -> bool {
    true
}

fn default_scheduler_name() -> String {
    "default-scheduler".to_string()
}

/// Process-wide feature gates, resolved once at startup and injected into
/// every component that consults them.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct FeatureGates {
    /// Enables the inter-workload affinity subsystem: binding indexing,
    /// snapshot copies of the index and the (anti-)affinity filters.
    #[serde(default = "default_workload_affinity")]
    pub workload_affinity: bool,
}

impl Default for FeatureGates {
    fn default() -> Self {
        Self {
            workload_affinity: true,
        }
    }
}

impl FeatureGates {
    /// Applies command line overrides of the form `WorkloadAffinity=false`,
    /// comma-separated. Unknown gates and malformed pairs are ignored with
    /// a warning.
    pub fn apply_overrides(&mut self, csv: &str) {
        for pair in csv.split(',').filter(|pair| !pair.is_empty()) {
            match pair.split_once('=') {
                Some(("WorkloadAffinity", value)) => match value.parse::<bool>() {
                    Ok(enabled) => self.workload_affinity = enabled,
                    Err(_) => warn!("Invalid value for feature gate WorkloadAffinity: {:?}", value),
                },
                Some((gate, _)) => warn!("Unknown feature gate {:?}", gate),
                None => warn!("Malformed feature gate override {:?}", pair),
            }
        }
    }
}

/// Whitelist of affinity label keys the scheduler honours. A workload
/// affinity directive naming a key outside the whitelist is treated as if
/// the directive were absent.
#[derive(Debug, Clone, Default)]
pub struct AffinityLabelKeys {
    allowed: Option<HashSet<String>>,
}

impl AffinityLabelKeys {
    /// Honour every label key.
    pub fn any() -> Self {
        Default::default()
    }

    pub fn new(allowed: Option<Vec<String>>) -> Self {
        Self {
            allowed: allowed.map(|keys| keys.into_iter().collect()),
        }
    }

    /// Parses the `--affinity-label-keys` comma-separated flag value.
    pub fn from_csv(csv: &str) -> Self {
        Self {
            allowed: Some(
                csv.split(',')
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        }
    }

    pub fn allows(&self, label_key: &str) -> bool {
        match &self.allowed {
            Some(keys) => keys.contains(label_key),
            None => true,
        }
    }
}

/// Filter plugins enabled for a scheduler, run in order for every
/// candidate cluster. Names must be registered in the plugin registry.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PluginProfile {
    pub filter_plugins: Vec<String>,
}

impl Default for PluginProfile {
    fn default() -> Self {
        Self {
            filter_plugins: vec!["AntiAffinity".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_name")]
    pub scheduler_name: String,
    #[serde(default)]
    pub features: FeatureGates,
    /// Whitelist of honoured affinity label keys. If not set all keys are
    /// honoured.
    pub affinity_label_keys: Option<Vec<String>>,
    #[serde(default)]
    pub profile: PluginProfile,
    /// If not set default output of logs is stdout/stderr
    pub logs_filepath: Option<String>,
    /// Path to a YAML list of member clusters loaded into the roster at startup.
    pub cluster_roster_path: Option<String>,
    /// Path to a YAML list of resource bindings replayed through the cache;
    /// bindings without target clusters are scheduled.
    pub bindings_path: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheduler_name: default_scheduler_name(),
            features: Default::default(),
            affinity_label_keys: None,
            profile: Default::default(),
            logs_filepath: None,
            cluster_roster_path: None,
            bindings_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AffinityLabelKeys, FeatureGates, SchedulerConfig};

    #[test]
    fn test_feature_gate_overrides() {
        let mut gates = FeatureGates::default();
        assert!(gates.workload_affinity);

        gates.apply_overrides("WorkloadAffinity=false");
        assert!(!gates.workload_affinity);

        gates.apply_overrides("WorkloadAffinity=true");
        assert!(gates.workload_affinity);

        // Unknown gates and garbage must not panic or change known gates.
        gates.apply_overrides("NoSuchGate=true,WorkloadAffinity=maybe,,oops");
        assert!(gates.workload_affinity);
    }

    #[test]
    fn test_affinity_label_keys_whitelist() {
        let any = AffinityLabelKeys::any();
        assert!(any.allows("federatriks.io/group"));

        let restricted = AffinityLabelKeys::from_csv("federatriks.io/group, example.com/shard");
        assert!(restricted.allows("federatriks.io/group"));
        assert!(restricted.allows("example.com/shard"));
        assert!(!restricted.allows("other.io/group"));
    }

    #[test]
    fn test_scheduler_config_defaults_from_yaml() {
        let config: SchedulerConfig = serde_yaml::from_str("scheduler_name: my-scheduler").unwrap();
        assert_eq!(config.scheduler_name, "my-scheduler");
        assert!(config.features.workload_affinity);
        assert_eq!(config.profile.filter_plugins, vec!["AntiAffinity".to_string()]);
        assert_eq!(config.affinity_label_keys, None);
    }

    #[test]
    fn test_scheduler_config_full_yaml() {
        let config: SchedulerConfig = serde_yaml::from_str(
            r#"
            scheduler_name: federated-scheduler
            features:
              workload_affinity: false
            affinity_label_keys:
              - federatriks.io/group
            profile:
              filter_plugins: ["AntiAffinity", "Affinity"]
            "#,
        )
        .unwrap();
        assert!(!config.features.workload_affinity);
        assert_eq!(
            config.affinity_label_keys,
            Some(vec!["federatriks.io/group".to_string()])
        );
        assert_eq!(config.profile.filter_plugins.len(), 2);
    }
}
