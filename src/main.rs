use anyhow::Context;
use clap::Parser;
use firegate::{
    api::{self, HttpSettings},
    catalog::Catalog,
    config,
    logging::{self, LogFile},
    identity::IdentityToolkitClient,
    service::{BackendService, ServiceSettings},
    storage::FirebaseStorageClient,
    store::FirestoreStore,
};
use std::{net::Ipv4Addr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;

/// Firegate HTTP server.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Port to listen on; overrides `PORT`.
    #[arg(long)]
    port: Option<u16>,
    /// Dotenv file to load before reading the environment.
    #[arg(long, value_name = "PATH", env = "FIREGATE_ENV_FILE")]
    env_file: Option<PathBuf>,
    /// Log file path, or `off`; overrides `FIREGATE_LOG_FILE`.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    config::init_config(cli.env_file.as_deref());
    logging::init_tracing(&LogFile::from_flag_or_env(cli.log_file.as_deref()));
    let config = config::get_config();

    let store = FirestoreStore::new(config).context("Failed to build Firestore client")?;
    let identity =
        IdentityToolkitClient::new(config).context("Failed to build Identity Toolkit client")?;
    let storage =
        FirebaseStorageClient::new(config).context("Failed to build Firebase Storage client")?;

    let service = Arc::new(BackendService::new(
        Arc::new(store),
        Arc::new(identity),
        Arc::new(storage),
        Catalog::default(),
        ServiceSettings::from(config),
    ));
    let app = api::create_router(service, &HttpSettings::from(config));

    let port = cli.port.unwrap_or(config.port);
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server terminated unexpectedly")?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %error, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(error = %error, "Failed to listen for SIGTERM");
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
    tracing::info!("Shutdown signal received");
}
