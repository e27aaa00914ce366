// HTTP API server binary for player-mapper

use anyhow::Result;
use player_mapper::api::{ApiServer, AppState};
use player_mapper::auth::verifier_from_env;
use player_mapper::database_ops::db::Db;
use player_mapper::logging::{init_tracing, DEFAULT_FILTER};
use player_mapper::util::config::MapperConfig;
use player_mapper::util::env as env_util;

#[actix_web::main]
async fn main() -> Result<()> {
    init_tracing(DEFAULT_FILTER)?;
    tracing::info!("Initializing player-mapper API server");

    // Load dotenv/env once (safe to call multiple times)
    env_util::init_env();
    env_util::preflight_check(
        "api_server",
        &[],
        &[
            "API_HOST",
            "API_PORT",
            "ALLOWED_ORIGINS",
            "AUTH_INTROSPECTION_URL",
            "DB_MAX_CONNS",
            "AUTO_MIGRATE",
            "MAPPER_POSITION_FILTER",
            "MAPPER_FALLBACK_SCAN_LIMIT",
        ],
    )?;

    // Missing auth or database config is fatal before binding.
    let server = ApiServer::from_env()?;
    let verifier = verifier_from_env()?;
    let config = MapperConfig::from_env();

    let database_url = env_util::db_url_prefer_session()?;
    let max_connections: u32 = env_util::env_parse("DB_MAX_CONNS", 10u32);
    let db = Db::connect(&database_url, max_connections).await?;
    if !db.ping().await {
        anyhow::bail!("database did not answer ping");
    }
    tracing::info!("Database connected successfully");

    server.run(AppState::from_db(db, config), verifier).await?;

    Ok(())
}
