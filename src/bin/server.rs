use std::sync::Arc;

use tracing::info;

use kirana::backend::sqlite::SqliteBackend;
use kirana::cli::{self, validate_address, DEFAULT_ADDRESS};
use kirana::endpoints::{self, AppState};
use kirana::http::HttpServer;
use kirana::notify::{HttpPushSender, LogNotifier, Notify};

/// Configure tracing once for the whole process. `RUST_LOG` controls
/// verbosity, e.g. `RUST_LOG=kirana=debug`.
fn setup_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_tracing();

    let address = match std::env::args().nth(1) {
        Some(arg) => validate_address(&arg)?.to_string(),
        None => DEFAULT_ADDRESS.to_string(),
    };

    let db_path = cli::database_path();
    let backend = Arc::new(SqliteBackend::open(&db_path)?);
    info!(db = %db_path, "database open");

    let notifier: Arc<dyn Notify> = match cli::push_endpoint() {
        Some((server, path)) => {
            info!(relay = %server, %path, "push relay configured");
            Arc::new(HttpPushSender::new(server, path))
        }
        None => Arc::new(LogNotifier),
    };

    let state = Arc::new(AppState::new(backend, notifier)?);
    let server = HttpServer::bind(&address).await?;
    info!(%address, "kirana server listening");

    server
        .serve(move |request| endpoints::handle(state.clone(), request))
        .await;

    Ok(())
}
