use std::net::SocketAddr;
use std::sync::Arc;

use acorn_sync_server::{build_grove, router};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "acorn-sync-server", about = "HTTP sync surface over a Grove")]
struct Config {
    /// HTTP listen port (§6 `ACORN_PORT`).
    #[arg(long, env = "ACORN_PORT", default_value_t = 5000)]
    port: u16,

    /// Directory backing durable trunks (§6 `ACORN_STORAGE_PATH`). When
    /// unset, planted trees use an in-memory trunk instead.
    #[arg(long, env = "ACORN_STORAGE_PATH")]
    storage_path: Option<String>,

    /// Reject judge-smushed stashes with `409` instead of a silent
    /// `200` (§6 `ACORN_STRICT`).
    #[arg(long, env = "ACORN_STRICT", default_value_t = false)]
    strict: bool,
}

/// Bootstrap exit codes (§6): 0 success, 1 generic failure, 2
/// configuration error, 3 storage unavailable at startup. `main` only
/// ever calls `std::process::exit` from here, after tracing has had a
/// chance to flush the failure.
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
    let grove = match build_grove(config.storage_path.as_deref()) {
        Ok(grove) => Arc::new(grove),
        Err(err) => {
            tracing::error!(%err, "failed to bring up storage");
            return 3;
        }
    };
    let app = router(grove, config.strict);

    let addr: SocketAddr = match format!("0.0.0.0:{}", config.port).parse() {
        Ok(addr) => addr,
        Err(err) => {
            tracing::error!(%err, port = config.port, "invalid listen address");
            return 2;
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%err, %addr, "failed to bind http listener");
            return 1;
        }
    };

    tracing::info!(%addr, strict = config.strict, "acorn-sync-server listening");
    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(%err, "http server exited with an error");
        return 1;
    }
    0
}
