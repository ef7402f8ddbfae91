//! Pipe renderer CLI
//!
//! Translates a Pipe into an Integration and runs the trait pipeline offline
//! against an in-memory cluster, printing every produced object as YAML.
//!
//! Usage:
//!   pipe-render pipe.yaml
//!   pipe-render pipe.yaml cluster.yaml
//!   pipe-render pipe.yaml cluster.yaml --phase running

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use pipe_integration::{
    logging, run, EngineConfig, InMemoryCluster, IntegrationPhase, Pipe, Translator,
};

#[derive(Parser, Debug)]
#[command(name = "pipe-render")]
#[command(about = "Render the resources a Pipe produces")]
struct Args {
    /// Pipe definition (YAML or JSON)
    pipe: PathBuf,

    /// Cluster snapshot (YAML); defaults to an empty cluster
    cluster: Option<PathBuf>,

    /// Integration phase to render for
    #[arg(long, short = 'p', default_value = "deploying", value_enum)]
    phase: Phase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Phase {
    Initialization,
    Deploying,
    Running,
}

impl From<Phase> for IntegrationPhase {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Initialization => IntegrationPhase::Initialization,
            Phase::Deploying => IntegrationPhase::Deploying,
            Phase::Running => IntegrationPhase::Running,
        }
    }
}

fn main() -> Result<()> {
    let config = EngineConfig::from_env()?;
    logging::init(&config.log_filter);
    let args = Args::parse();

    let raw = std::fs::read_to_string(&args.pipe)
        .with_context(|| format!("Failed to read pipe {}", args.pipe.display()))?;
    let pipe: Pipe = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse pipe {}", args.pipe.display()))?;
    let cluster = match &args.cluster {
        Some(path) => InMemoryCluster::from_path(path)?,
        None => InMemoryCluster::new().with_namespace(&pipe.metadata.namespace),
    };

    let ctx = config.run_context();
    let mut integration = Translator::new(&cluster, &ctx)
        .with_default_profile(config.default_profile)
        .translate(&pipe)?;
    integration.status.phase = args.phase.into();
    info!(integration = %integration.name(), phase = ?args.phase, "Pipe translated");

    let outcome = run(&cluster, &ctx, &config, integration)?;

    println!("{}", serde_yaml::to_string(&outcome.integration)?);
    for resource in outcome.resources.iter() {
        println!("---");
        println!("{}", serde_yaml::to_string(resource)?);
    }
    info!(
        resources = outcome.resources.len(),
        properties = outcome.application_properties.len(),
        "Render complete"
    );
    Ok(())
}
