// src/main.rs
//! Block AI Validator entry point
//! Starts the validation API, or trains / generates data from the command line.
use anyhow::Result;
use block_ai_validator::api::{AppState, ValidatorServer};
use block_ai_validator::cli::{self, Cli, Commands};
use block_ai_validator::service::BlockSimulator;
use block_ai_validator::validator::ValidatorConfig;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize logging
    init_logging()?;

    info!("Starting Block AI Validator v{}", env!("CARGO_PKG_VERSION"));

    let mut config = cli::load_config(args.config_path().as_deref())?;

    match args.command {
        Some(Commands::Train(train_args)) => {
            let outcome = tokio::task::spawn_blocking(move || cli::run_train(&config, &train_args))
                .await??;

            println!("\n=== Training Results ===");
            println!(
                "Samples: {} ({} valid / {} invalid)",
                outcome.dataset.samples_generated,
                outcome.dataset.positive_samples,
                outcome.dataset.negative_samples
            );
            println!("Test Accuracy: {:.4}", outcome.metrics.test_accuracy);
            println!("Test Precision: {:.4}", outcome.metrics.test_precision);
            println!("Test Recall: {:.4}", outcome.metrics.test_recall);
            if let Some(cv) = &outcome.cross_validation {
                println!(
                    "Cross-val Mean Accuracy: {:.4} ± {:.4}",
                    cv.mean_accuracy, cv.std_accuracy
                );
            }
            println!("Model written to {}", outcome.output.display());
        }
        Some(Commands::Generate(generate_args)) => {
            let summary = cli::run_generate(&config, &generate_args)?;
            println!(
                "Wrote {} samples ({} valid / {} invalid) to {}",
                summary.samples_generated,
                summary.positive_samples,
                summary.negative_samples,
                generate_args.output.display()
            );
        }
        Some(Commands::Serve(serve_args)) => {
            serve_args.apply(&mut config);
            serve(config).await?;
        }
        None => {
            info!("No command specified, starting server");
            serve(config).await?;
        }
    }

    Ok(())
}

async fn serve(config: ValidatorConfig) -> Result<()> {
    let state = AppState::from_config(&config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let simulator = if config.simulator.enabled {
        let simulator = BlockSimulator::new(state.service.clone(), config.simulator.interval());
        Some(simulator.spawn(shutdown_rx.clone()))
    } else {
        info!("Block simulator disabled");
        None
    };

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    ValidatorServer::new(state, config.server.clone())
        .start(shutdown_rx)
        .await?;

    if let Some(handle) = simulator {
        if let Err(e) = handle.await {
            warn!("Simulator task ended abnormally: {}", e);
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=info,h2=info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_max_level(tracing::Level::TRACE)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
