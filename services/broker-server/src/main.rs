//! Process entrypoint (C10): loads configuration from the environment,
//! binds the listener, and runs the accept loop until `SIGINT`/`SIGTERM`.

use broker_core::{Config, Core, Listener};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "broker starting");

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let listener = match Listener::bind(&config.bind).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    let core = Core::new(config);

    tokio::select! {
        () = listener.serve(core) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal, stopping");
        }
    }

    ExitCode::SUCCESS
}
