//! Server binary: load config, expose the configured collections, serve.

use doc_rest::{bootstrap, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("doc_rest=info")),
        )
        .init();

    bootstrap::serve(config).await
}
