//! vram-planner command-line front end.
//!
//! Runs GPU detection, then answers one question per invocation: what is
//! installed, can a GPU run a model, what configuration fits, or which
//! environment binds a server to a GPU. Results go to stdout, logs to stderr.

use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use vram_planner::config::{Cli, Command, Config};
use vram_planner::gpu::map::DeviceMap;
use vram_planner::gpu::registry::DeviceRegistry;
use vram_planner::planner::ability::CapacityPlanner;
use vram_planner::planner::calculator::GgufEstimator;
use vram_planner::planner::catalog::{CatalogError, ModelCatalog};
use vram_planner::selector::{Environment, RuntimeSelector};

/// Output of `detect`: devices keyed canonically, in detection order.
#[derive(Serialize)]
struct DetectReport<'a> {
    devices: &'a DeviceMap,
    selection: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "vram_planner=debug"
    } else {
        "vram_planner=info"
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(true);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("vram-planner v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let config = Config::load(&cli.config)?;
    let catalog_path = cli
        .catalog
        .clone()
        .unwrap_or_else(|| config.catalog.path.clone());
    let catalog = match ModelCatalog::load(&catalog_path) {
        Ok(catalog) => catalog,
        Err(CatalogError::FileNotFound(path)) => {
            warn!("Model catalog not found at {path}, every model is treated as unknown");
            ModelCatalog::default()
        }
        Err(e) => return Err(e.into()),
    };

    let mut registry = DeviceRegistry::detect(&config.detection);

    match cli.command {
        Command::Detect => {
            let report = DetectReport {
                devices: registry.devices(),
                selection: registry.selection_list(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Check {
            gpu,
            model,
            context,
            parallel,
        } => {
            let planner = CapacityPlanner::new(
                config.planner.clone(),
                catalog,
                GgufEstimator::new(config.planner.batch_size),
            );
            let ability = planner.check_ability(&mut registry, &gpu, &model, context, parallel);
            println!("{}", serde_json::to_string_pretty(&ability)?);
        }
        Command::Recommend { gpu, model } => {
            let planner = CapacityPlanner::new(
                config.planner.clone(),
                catalog,
                GgufEstimator::new(config.planner.batch_size),
            );
            let plan = planner.plan(&registry, &gpu, &model)?;
            info!(args = ?plan.config.server_args(), "Server arguments");
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Env {
            gpu,
            index,
            manual_index,
        } => {
            let selector = RuntimeSelector::new(config.selector.clone());
            let mut env = Environment::new();
            selector.apply(&registry, &mut env, &gpu, index, manual_index);

            let mut vars: Vec<_> = env.into_iter().collect();
            vars.sort();
            for (key, value) in vars {
                println!("{key}={value}");
            }
        }
    }

    Ok(())
}
