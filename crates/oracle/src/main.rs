use anyhow::anyhow;
use axum::serve;
use futures::TryFutureExt;
use oracle::{app, build_app_state, get_config_info, Settings};
use rain_oracle_core::setup_logger;
use slog::{error, info, warn, Logger};
use std::{net::SocketAddr, str::FromStr};
use tokio::{net::TcpListener, signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = get_config_info();
    let logger = setup_logger(cli.level.as_deref());

    let db_path = cli.db_path();
    let imputer_path = cli.imputer_path();
    let model_path = cli.model_path();
    let policy = cli.feature_policy();
    let host = cli.host();
    let port = cli.port();

    let socket_addr = SocketAddr::from_str(&format!("{}:{}", host, port))
        .map_err(|e| anyhow!("invalid address: {}", e))?;

    let listener = TcpListener::bind(socket_addr)
        .map_err(|e| anyhow!("error binding to socket: {}", e))
        .await?;

    info!(logger, "Rain Oracle starting...");
    info!(logger, "  Listen: http://{}", socket_addr);
    info!(logger, "  Docs:   http://{}/docs", socket_addr);
    info!(logger, "  Database: {}", db_path);
    info!(logger, "  Imputer: {}", imputer_path.display());
    info!(logger, "  Model: {}", model_path.display());
    info!(logger, "  Feature policy: {}", policy);

    let app_state = build_app_state(
        logger.clone(),
        Settings {
            db_path: &db_path,
            imputer_path: &imputer_path,
            model_path: &model_path,
            policy,
        },
    )
    .await
    .map_err(|e| {
        error!(logger, "error building app: {}", e);
        e
    })?;
    if !app_state.oracle.model_loaded() {
        warn!(logger, "serving without a model, predictions answer 503");
    }

    let app = app(app_state);

    serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(logger.clone()))
    .await?;

    Ok(())
}

async fn shutdown_signal(logger: Logger) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(logger, "failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(logger, "failed to install signal handler: {}", e);
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
    info!(logger, "shutting down");
}
