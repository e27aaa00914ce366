// API server implementation using actix-web

use std::sync::Arc;

use crate::api::{middleware, routes, state::AppState};
use crate::auth::TokenVerifier;
use crate::util::env::{env_opt, env_parse, init_env};
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub allowed_origins: String,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        init_env();

        let host = env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match env_opt("API_PORT") {
            Some(raw) => raw.trim().parse().context("Invalid API_PORT")?,
            None => 8080,
        };
        let allowed_origins = env_opt("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://localhost:8000".to_string());

        Ok(Self {
            host,
            port,
            allowed_origins,
        })
    }

    /// Start the HTTP server
    pub async fn run(self, state: AppState, verifier: Arc<dyn TokenVerifier>) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);
        let workers: usize = env_parse("API_WORKERS", 0usize);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            position_filter = state.config.position_filter,
            "Starting player-mapper API server"
        );

        let state = web::Data::new(state);
        let allowed_origins = self.allowed_origins.clone();

        let mut server = HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);
            let verifier = verifier.clone();

            App::new()
                .app_data(state.clone())
                .wrap(logger)
                .wrap(compress)
                .wrap(cors)
                .configure(|cfg| routes::configure_routes(cfg, verifier))
        });
        if workers > 0 {
            server = server.workers(workers);
        }

        server
            .bind(&bind_addr)
            .with_context(|| format!("Failed to bind to {}", bind_addr))?
            .run()
            .await
            .context("HTTP server error")?;

        Ok(())
    }
}
