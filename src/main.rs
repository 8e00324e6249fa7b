use anyhow::Context;
use talkuu::{AppState, app, config::Config, db};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;

    let db_pool = db::connect(&config.database_url, config.max_db_connections)
        .await
        .context("connecting to the database")?;
    db::migrate(&db_pool).await.context("creating tables")?;
    info!("database ready");

    let app = app(AppState::new(db_pool, &config), &config)?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("talkuu listening on port {}, chat socket at /ws", config.port);
    axum::serve(listener, app).await?;

    Ok(())
}
