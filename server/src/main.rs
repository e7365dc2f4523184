use std::sync::Arc;

use hive_server::{build_router, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hive_core::init_tracing();

    let config = hive_core::config::AppConfig::load()?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::build(config).await?);
    let app = build_router(state);

    info!(%addr, "hive server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
