//! Sleep-Stage Agent CLI
//!
//! Online sleep-stage inference server for wearable sensor data.

use clap::{Parser, Subcommand};
use sleepstage_agent::{
    config::Config,
    extract::NoopExtractor,
    model::Classifier,
    pipeline::{Pipeline, PipelineConfig, PipelineOutcome},
    session::SessionStore,
    VERSION,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sleepstage")]
#[command(version = VERSION)]
#[command(about = "Online sleep-stage inference for wearable sensor data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the ingestion server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for session logs (overrides config)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Path to the classifier artifact (overrides config)
        #[arg(long)]
        model: Option<PathBuf>,

        /// External feature-extraction command (overrides config)
        #[arg(long)]
        extractor: Option<PathBuf>,
    },

    /// Re-run table building and inference over an existing session's
    /// already-extracted feature series
    Predict {
        /// Session id to predict for
        session_id: String,

        /// Data directory for session logs (overrides config)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Path to the classifier artifact (overrides config)
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sleepstage_agent=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            data_dir,
            model,
            extractor,
        } => cmd_serve(port, data_dir, model, extractor).await,
        Commands::Predict {
            session_id,
            data_dir,
            model,
        } => cmd_predict(&session_id, data_dir, model).await,
        Commands::Config => cmd_config(),
    }
}

async fn cmd_serve(
    port: Option<u16>,
    data_dir: Option<PathBuf>,
    model: Option<PathBuf>,
    extractor: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(data_dir) = data_dir {
        config.data_dir = data_dir;
    }
    if let Some(model) = model {
        config.model_path = model;
    }
    if let Some(extractor) = extractor {
        config.extractor_command = Some(extractor);
    }

    let (addr, shutdown_tx) = sleepstage_agent::server::run(config).await?;
    println!("Sleep-stage agent v{VERSION} listening on http://{addr}");
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    println!();
    println!("Shutting down...");
    let _ = shutdown_tx.send(());

    Ok(())
}

async fn cmd_predict(
    session_id: &str,
    data_dir: Option<PathBuf>,
    model: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(data_dir) = data_dir {
        config.data_dir = data_dir;
    }
    if let Some(model) = model {
        config.model_path = model;
    }

    let classifier = Arc::new(Classifier::load(&config.model_path)?);
    let store = SessionStore::new(&config.data_dir);
    let pipeline = Pipeline::new(
        store,
        Arc::new(NoopExtractor),
        classifier,
        PipelineConfig::from_config(&config),
    );

    match pipeline.predict_existing(session_id).await? {
        PipelineOutcome::Predictions(codes) => {
            println!(
                "{}",
                codes
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            );
        }
        PipelineOutcome::InsufficientData { epochs, required } => {
            eprintln!("Not enough data for session {session_id}: {epochs} epochs, {required} required");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load()?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}
