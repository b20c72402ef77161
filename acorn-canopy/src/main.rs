use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use acorn_canopy::{Canopy, CanopyConfig};
use clap::Parser;
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "acorn-canopy", about = "HTTP sync node with UDP discovery and auto-mesh")]
struct Config {
    #[arg(long, env = "ACORN_PORT", default_value_t = 5000)]
    port: u16,

    #[arg(long, env = "ACORN_DISCOVERY_PORT", default_value_t = 50505)]
    discovery_port: u16,

    #[arg(long, env = "ACORN_AUTO_CONNECT", default_value_t = true)]
    auto_connect: bool,

    #[arg(long, env = "ACORN_STORAGE_PATH")]
    storage_path: Option<String>,

    /// Reject judge-smushed stashes with `409` instead of a silent
    /// `200` (§6 `ACORN_STRICT`).
    #[arg(long, env = "ACORN_STRICT", default_value_t = false)]
    strict: bool,
}

/// Bootstrap exit codes (§6): 0 success, 1 generic failure, 2
/// configuration error, 3 storage unavailable at startup.
#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    std::process::exit(run(config).await);
}

async fn run(config: Config) -> i32 {
    let grove = match acorn_sync_server::build_grove(config.storage_path.as_deref()) {
        Ok(grove) => Arc::new(grove),
        Err(err) => {
            tracing::error!(%err, "failed to bring up storage");
            return 3;
        }
    };

    let canopy_config = CanopyConfig {
        discovery_port: config.discovery_port,
        http_port: config.port,
        auto_connect: config.auto_connect,
        broadcast_interval: Duration::from_secs(5),
    };
    let canopy = Arc::new(Canopy::new(grove.clone(), canopy_config));

    let (stop_tx, stop_rx) = oneshot::channel();
    let canopy_task = {
        let canopy = canopy.clone();
        tokio::spawn(async move {
            if let Err(err) = canopy.run(stop_rx).await {
                tracing::error!(%err, "canopy discovery loop exited with an error");
            }
        })
    };

    let (reconciler_stop_tx, reconciler_stop_rx) = oneshot::channel();
    let reconciler_task = {
        let grove = grove.clone();
        tokio::spawn(async move {
            grove.run_reconciler(Duration::from_secs(3), reconciler_stop_rx).await;
        })
    };

    let app = acorn_sync_server::router(grove, config.strict);
    let addr: SocketAddr = match format!("0.0.0.0:{}", config.port).parse() {
        Ok(addr) => addr,
        Err(err) => {
            tracing::error!(%err, port = config.port, "invalid listen address");
            let _ = stop_tx.send(());
            let _ = reconciler_stop_tx.send(());
            let _ = canopy_task.await;
            let _ = reconciler_task.await;
            return 2;
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%err, %addr, "failed to bind http listener");
            let _ = stop_tx.send(());
            let _ = reconciler_stop_tx.send(());
            let _ = canopy_task.await;
            let _ = reconciler_task.await;
            return 1;
        }
    };

    tracing::info!(%addr, strict = config.strict, "acorn-canopy listening");
    let mut exit_code = 0;
    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            if let Err(err) = result {
                tracing::error!(%err, "http server exited with an error");
                exit_code = 1;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
    }

    let _ = stop_tx.send(());
    let _ = reconciler_stop_tx.send(());
    let _ = canopy_task.await;
    let _ = reconciler_task.await;
    exit_code
}
