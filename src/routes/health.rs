use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::db;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: ServiceHealth,
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub database: String,
    pub cache: String,
    pub cache_backend: String,
}

/// GET /health
///
/// The database is critical; a cache failure only degrades the service.
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let (db_ok, cache_result) =
        tokio::join!(db::health_check(&state.db), state.cache.health_check());

    let status = match (db_ok, cache_result.is_ok()) {
        (true, true) => "healthy",
        (true, false) => "degraded",
        (false, _) => "unhealthy",
    };

    if !db_ok {
        tracing::error!("Database health check failed");
    }
    if let Err(e) = &cache_result {
        tracing::warn!(error = %e, "Cache health check failed");
    }

    let status_code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let label = |ok: bool| if ok { "ok" } else { "error" }.to_string();

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            services: ServiceHealth {
                database: label(db_ok),
                cache: label(cache_result.is_ok()),
                cache_backend: state.cache.backend().to_string(),
            },
        }),
    )
}
