// HTTP request handlers for API endpoints

use actix_web::{web, HttpResponse};

use crate::api::models::*;
use crate::api::state::AppState;
use crate::auth::Principal;
use crate::database_ops::{AcceptRequest, RejectRequest, ReportKind};
use crate::error::MapperError;

type HandlerResult = Result<HttpResponse, MapperError>;

/// Health check endpoint
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let database = if state.store.ping().await {
        "connected"
    } else {
        "disconnected"
    };

    HttpResponse::Ok().json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: database.to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

/// Resolve every unmapped stats record against the draft provider.
pub async fn run_bulk_mapping(state: web::Data<AppState>) -> HandlerResult {
    tracing::info!("bulk mapping requested");
    let summary = state.bulk_job().run().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(summary)))
}

pub async fn list_for_review(
    state: web::Data<AppState>,
    query: web::Query<ReviewQuery>,
) -> HandlerResult {
    let items = state.review().list(query.limit).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(items)))
}

pub async fn accept_mapping(
    state: web::Data<AppState>,
    principal: web::ReqData<Principal>,
    payload: web::Json<AcceptRequest>,
) -> HandlerResult {
    let mapping = state
        .review()
        .accept(&principal, payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(mapping)))
}

pub async fn reject_mapping(
    state: web::Data<AppState>,
    principal: web::ReqData<Principal>,
    payload: web::Json<RejectRequest>,
) -> HandlerResult {
    let req = payload.into_inner();
    let source_a_id = req.source_a_id.trim().to_string();
    state.review().reject(&principal, req).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(RejectResponse {
        source_a_id,
        review_status: "rejected".to_string(),
    })))
}

pub async fn get_report(
    state: web::Data<AppState>,
    query: web::Query<ReportQuery>,
) -> HandlerResult {
    let (kind, warning) = ReportKind::parse_lenient(query.report.as_deref());
    let report = state.analytics().report(kind, query.limit).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(report).with_warning(warning)))
}
