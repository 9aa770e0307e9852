use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pulsegraph::compiler::core::Compiler;
use pulsegraph::compiler::loader::{load_config_from_yaml, load_graph_from_yaml};
use pulsegraph::runtime::{CancelToken, Field, NodeRegistry, ReceivedParameter};
use pulsegraph::FieldConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a graph and run its tick loop
    Run {
        /// Path to the graph YAML file
        #[arg(long, short)]
        file: PathBuf,

        /// Path to a field config YAML file
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Parameters pushed into the field after start (name=value)
        #[arg(long = "param", short = 'P', value_parser = parse_param)]
        params: Vec<ReceivedParameter>,

        /// Overrides the configured tick rate
        #[arg(long)]
        tick_rate: Option<f64>,

        /// Stop after this many milliseconds instead of waiting for Ctrl-C
        #[arg(long)]
        duration_ms: Option<u64>,
    },

    /// Compile and validate a graph without running it
    Check {
        /// Path to the graph YAML file
        #[arg(long, short)]
        file: PathBuf,
    },

    /// List the registered node kinds
    Nodes,
}

fn parse_param(s: &str) -> Result<ReceivedParameter, String> {
    ReceivedParameter::parse_assignment(s).ok_or_else(|| format!("invalid name=value: `{}`", s))
}

fn load_field(file: &Path, registry: &NodeRegistry, config: FieldConfig) -> Result<Field> {
    let graph = load_graph_from_yaml(file)?;
    let mut compiler = Compiler::new(registry);
    let blueprint = compiler
        .compile(graph)
        .with_context(|| format!("Failed to compile {}", file.display()))?;
    let field = Field::load(&blueprint, registry, config)
        .with_context(|| format!("Failed to load {}", file.display()))?;
    Ok(field)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();
    let registry = NodeRegistry::with_builtins();

    match cli.command {
        Commands::Run { file, config, params, tick_rate, duration_ms } => {
            let mut config = match config {
                Some(path) => load_config_from_yaml(path)?,
                None => FieldConfig::default(),
            };
            if let Some(rate) = tick_rate {
                config.tick_rate_hz = rate;
            }

            let field = load_field(&file, &registry, config)?;
            field.start();

            for param in params {
                let name = param.name.clone();
                let matched = field.receive_parameter(param).await;
                info!("Parameter {} matched {} listener(s)", name, matched);
            }

            let stop = CancelToken::new();
            let ticker = {
                let field = field.clone();
                let stop = stop.clone();
                tokio::spawn(async move { field.run(stop).await })
            };

            match duration_ms {
                Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
                None => {
                    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
                }
            }

            stop.cancel();
            ticker.await.context("Tick loop panicked")?;
            field.shutdown().await;
            info!("Field {} finished.", field.id());
        }

        Commands::Check { file } => {
            let field = load_field(&file, &registry, FieldConfig::default())?;
            println!("{} ({}): {} nodes OK", field.id(), field.name(), field.node_count());
        }

        Commands::Nodes => {
            for name in registry.names() {
                println!("{}", name);
            }
        }
    }

    Ok(())
}
