use std::sync::Arc;

use tracing::info;

use mindping_api::auth::AppStateInner;
use mindping_db::Database;
use mindping_gateway::registry::Registry;
use mindping_server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mindping_server=debug,mindping_gateway=debug,mindping_api=debug,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    let db = match &config.db_path {
        Some(path) => Database::open(path)?,
        None => Database::open_in_memory()?,
    };

    // One store and one registry for the whole process
    let state = AppStateInner::new(Arc::new(db), config.jwt_secret.clone(), Registry::new());
    let app = mindping_server::app(state);

    let addr = config.addr()?;
    info!("mindping listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
