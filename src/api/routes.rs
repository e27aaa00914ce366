// API route configuration

use std::sync::Arc;

use crate::api::{auth::Auth, handlers, middleware};
use crate::auth::TokenVerifier;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig, verifier: Arc<dyn TokenVerifier>) {
    cfg.app_data(middleware::json_config())
        .app_data(middleware::query_config())
        // Health check (no auth required)
        .route("/health", web::get().to(handlers::health_check))
        .service(
            web::scope("/api/v1")
                .route("/mappings/bulk", web::post().to(handlers::run_bulk_mapping))
                .route("/review", web::get().to(handlers::list_for_review))
                // Review mutations require a verified principal
                .service(
                    web::scope("/review")
                        .wrap(Auth::new(verifier))
                        .route("/accept", web::post().to(handlers::accept_mapping))
                        .route("/reject", web::post().to(handlers::reject_mapping)),
                )
                .route("/reports", web::get().to(handlers::get_report)),
        )
        .default_service(web::to(middleware::not_found));
}
