//! Axum request router translating the page-visit HTTP surface onto
//! [`CounterService`] calls. Handlers stay thin: parse/validate the
//! path, call the service, shape the JSON reply.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::json;

use counter_common::PageId;
use counter_core::CounterService;

use crate::api_error::ApiResult;

pub type SharedService = Arc<CounterService>;

pub fn build_router(service: SharedService) -> Router {
    Router::new()
        .route("/visit/{page_id}", post(visit))
        .route("/visits/{page_id}", get(visits))
        .route("/flush", post(flush))
        .route("/buffer", get(buffer))
        .route("/healthz", get(healthz))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(service)
}

async fn visit(
    State(service): State<SharedService>,
    Path(page_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let page = PageId::new(page_id.clone())?;
    service.increment(page);
    Ok(Json(json!({
        "status": "success",
        "message": format!("Visit recorded for page {page_id}"),
    })))
}

#[derive(Serialize)]
struct VisitsBody {
    visits: u64,
    served_via: String,
}

async fn visits(
    State(service): State<SharedService>,
    Path(page_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let page = PageId::new(page_id)?;
    let read = service.get(&page).await?;
    Ok(Json(VisitsBody {
        visits: read.count,
        served_via: read.served_via,
    }))
}

async fn flush(State(service): State<SharedService>) -> ApiResult<impl IntoResponse> {
    service.flush_all().await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Successfully flushed visit counts to Redis",
    })))
}

#[derive(Serialize)]
struct BufferBody {
    buffer_size: usize,
    buffer_contents: std::collections::HashMap<String, u64>,
    time_since_last_flush: f64,
}

async fn buffer(State(service): State<SharedService>) -> impl IntoResponse {
    let status = service.buffer_status();
    Json(BufferBody {
        buffer_size: status.size,
        buffer_contents: status
            .contents
            .into_iter()
            .map(|(page, count)| (page.into_string(), count))
            .collect(),
        time_since_last_flush: status.age_since_last_flush.as_secs_f64(),
    })
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
