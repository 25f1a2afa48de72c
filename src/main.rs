use crate::config::AppConfig;
use crate::server::{run_listener, tls_acceptor_builder, AppContext, Protocol};
use crate::store::ProfileStore;
use clap::Parser;
use log::{error, info};
use std::sync::Arc;
use tokio::net::TcpListener;

mod config;
mod error;
mod file_server;
mod handlers;
mod request;
mod response;
mod routes;
mod server;
mod store;

#[derive(Parser, Debug)]
#[command(version, about = "JSON API server backed by a document store")]
struct Args {
    /// Plaintext listener port
    #[arg(long, default_value_t = 8080)]
    http_port: u16,
    /// TLS listener port, used only when TLS_CERT_FILE/TLS_KEY_FILE are set
    #[arg(long, default_value_t = 8443)]
    https_port: u16,
    #[arg(long, default_value_t = 10000)]
    max_connections: usize,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let _ = env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("info"))
        .try_init();
    let args = Args::parse();

    let config = Arc::new(AppConfig::from_env()?);
    let container_id: Arc<str> = Arc::from(
        gethostname::gethostname()
            .into_string()
            .unwrap_or_else(|_| "unknown".to_string()),
    );
    let store = Arc::new(ProfileStore::new(
        config.store.clone(),
        config.default_name.clone(),
    ));

    info!("namely {} started", env!("CARGO_PKG_VERSION"));
    info!("container id: {}", container_id);
    info!(
        "store: {} db={} collection={}",
        config.store.url, config.store.database, config.store.collection
    );

    let ctx = AppContext {
        config: config.clone(),
        store,
        container_id,
        protocol: Protocol::Http,
    };

    if let Some(tls) = config.tls.as_ref() {
        // A broken certificate kills only the TLS listener, plaintext
        // keeps serving.
        match tls_acceptor_builder(&tls.cert, &tls.key) {
            Ok(acceptor) => {
                let listener = TcpListener::bind(("0.0.0.0", args.https_port)).await?;
                let https_ctx = AppContext {
                    protocol: Protocol::Https,
                    ..ctx.clone()
                };
                let max_connections = args.max_connections;
                tokio::spawn(async move {
                    if let Err(err) =
                        run_listener(listener, Some(acceptor), https_ctx, max_connections).await
                    {
                        error!("https listener failed: {}", err);
                    }
                });
            }
            Err(err) => {
                error!("TLS disabled, certificate load failed: {}", err);
            }
        }
    }

    let listener = TcpListener::bind(("0.0.0.0", args.http_port)).await?;
    run_listener(listener, None, ctx, args.max_connections).await?;
    Ok(())
}
