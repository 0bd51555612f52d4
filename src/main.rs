//! Docflow AI worker entry point.

use clap::{Parser, Subcommand};
use docflow_ai::config::ServiceConfig;
use docflow_ai::fetch::TextFetcher;
use docflow_ai::handlers::Dispatcher;
use docflow_ai::llm::ProviderFactory;
use docflow_ai::logging::init_default_logging;
use docflow_ai::queue::{
    configure_mqtt_options, ChannelAdapter, MqttResultPublisher, TaskPipeline,
};
use rumqttc::v5::AsyncClient;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Queue-driven AI worker for a document workflow platform
#[derive(Parser)]
#[command(name = "docflow-ai")]
#[command(about = "Queue-driven AI worker for document analysis, review and chat")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the worker
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting docflow-ai v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_worker(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(ServiceConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = ["docflow.toml", "config/docflow.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(ServiceConfig::load_from_file(&path)?);
                }
            }

            Err("No configuration file found. Provide one with -c/--config or create docflow.toml"
                .into())
        }
    }
}

fn handle_config_command(
    config: ServiceConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Configuration is valid");
    if show {
        println!("{}", toml::to_string_pretty(&config)?);
    }
    Ok(())
}

/// Optional company background injected into general chat prompts
fn load_company_context(config: &ServiceConfig) -> Option<String> {
    let path = config.chat.context_file.as_ref()?;
    match std::fs::read_to_string(path) {
        Ok(content) => {
            info!(path = %path.display(), "Loaded chat company context");
            Some(content)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read chat context file");
            None
        }
    }
}

async fn run_worker(config: ServiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(service_id = %config.service.id, "Worker starting");

    let options = configure_mqtt_options(&config)?;
    let (client, event_loop) = AsyncClient::new(options, 10);

    let ports = Arc::new(ProviderFactory::new(config.llm.clone()));
    let fetcher = TextFetcher::new()?;
    let company_context = load_company_context(&config);

    let dispatcher = Dispatcher::new(ports, fetcher, company_context);
    let publisher = Arc::new(MqttResultPublisher::new(
        client.clone(),
        config.queues.results.clone(),
    ));
    let pipeline = TaskPipeline::new(dispatcher, publisher);
    let adapter = ChannelAdapter::new(config, pipeline, client, event_loop);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    // The broker event loop is not Send, so the adapter stays on this task
    // and the signal wait runs spawned.
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully");
            }
        }
        let _ = shutdown_tx.send(true);
    });

    info!("Worker is running and waiting for tasks");

    if let Err(e) = adapter.run(shutdown_rx).await {
        error!("Consumer exited with error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
