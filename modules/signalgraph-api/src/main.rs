use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use signalgraph_api::{app, relay::Relay, AppState};
use signalgraph_common::Config;
use signalgraph_store::{PgRecordStore, Table};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("signalgraph=info".parse()?))
        .init();

    let config = Config::from_env()?;

    let store = PgRecordStore::connect(&config.database_url).await?;
    store.install_change_feed(Table::Positions).await?;

    if config.relay_upstream_url.is_none() {
        info!("RELAY_UPSTREAM_URL not set, /api/chat will answer 500");
    }

    let relay = Relay::new(&config.relay_jwt_secret, config.relay_upstream_url.clone());
    let state = Arc::new(AppState::new(Arc::new(store), relay));

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("Signal graph API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
