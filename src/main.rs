use std::env;
use std::sync::Arc;

use env_logger::Target;
use file_rotate::{compression::Compression, suffix::AppendCount, ContentLimit, FileRotate};

use clap::Parser;
use log::{info, warn};

use federatriks::config::{AffinityLabelKeys, SchedulerConfig};
use federatriks::core::binding::ResourceBinding;
use federatriks::core::cache::AffinityCache;
use federatriks::core::cluster::{Cluster, ClusterRoster};
use federatriks::core::common::CancelFlag;
use federatriks::core::events::BindingEvent;
use federatriks::core::scheduler::Scheduler;

#[derive(Parser)]
struct Args {
    #[clap(short, long)]
    config_file: std::path::PathBuf,
    /// Comma-separated whitelist of affinity label keys the scheduler honours.
    #[clap(long)]
    affinity_label_keys: Option<String>,
    /// Comma-separated feature gate overrides, e.g. WorkloadAffinity=false.
    #[clap(long)]
    feature_gates: Option<String>,
}

fn main() {
    let args = Args::parse();

    let config_yaml =
        std::fs::read_to_string(&args.config_file).expect("could not read config file");
    let mut config = serde_yaml::from_str::<SchedulerConfig>(&config_yaml).unwrap();

    let mut env_logger_builder = env_logger::builder();
    if env::var("RUST_LOG").is_err() {
        // log level INFO by default
        env_logger_builder.filter_level(log::LevelFilter::Info);
    }

    if let Some(log_filepath) = &config.logs_filepath {
        env_logger_builder.target(Target::Pipe(Box::new(FileRotate::new(
            log_filepath.clone(),
            AppendCount::new(50),
            ContentLimit::Bytes(104857600),
            Compression::None,
            #[cfg(unix)]
            None,
        ))));
    }

    env_logger_builder.init();

    info!(
        "Path to config file: {:?}",
        args.config_file.canonicalize().unwrap()
    );

    if let Some(gates) = &args.feature_gates {
        config.features.apply_overrides(gates);
    }
    let label_keys = match &args.affinity_label_keys {
        Some(csv) => AffinityLabelKeys::from_csv(csv),
        None => AffinityLabelKeys::new(config.affinity_label_keys.clone()),
    };

    let roster = Arc::new(ClusterRoster::new());
    if let Some(roster_path) = &config.cluster_roster_path {
        info!("Reading member cluster roster...");
        let roster_yaml =
            std::fs::read_to_string(roster_path).expect("could not read cluster roster file");
        let clusters = serde_yaml::from_str::<Vec<Cluster>>(&roster_yaml).unwrap();
        for cluster in clusters {
            roster.add_cluster(cluster);
        }
    }

    let cache = Arc::new(AffinityCache::new(
        config.features,
        label_keys,
        roster.clone(),
    ));
    let scheduler = Scheduler::new(&config, cache.clone()).unwrap();

    let mut pending = Vec::new();
    if let Some(bindings_path) = &config.bindings_path {
        info!("Reading resource bindings...");
        let bindings_yaml =
            std::fs::read_to_string(bindings_path).expect("could not read bindings file");
        let bindings = serde_yaml::from_str::<Vec<ResourceBinding>>(&bindings_yaml).unwrap();
        for binding in bindings {
            if binding.spec.clusters.is_empty() {
                pending.push(binding);
            } else {
                cache.on_binding_add(&BindingEvent::Binding(binding));
            }
        }
    }

    info!(
        "Scheduling {} pending resource bindings across {} member clusters",
        pending.len(),
        roster.cluster_count()
    );

    let cancel = CancelFlag::new();
    for binding in pending.iter() {
        match scheduler.schedule_one(binding, &cancel) {
            Ok(outcome) => info!(
                "Binding {:?}: feasible clusters {:?}",
                binding.binding_id(),
                outcome.feasible
            ),
            Err(err) => warn!(
                "Binding {:?} cannot be scheduled: {:?}",
                binding.binding_id(),
                err
            ),
        }
    }
}
