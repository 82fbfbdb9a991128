use crate::{AppState, error::AppError};
use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::{Method, StatusCode, Uri},
    response::IntoResponse,
};
use database::ConnectionManager;
use gateway::envelope::timestamp;
use gateway::{QueryPayload, ResponseEnvelope, TablesPayload, TestPayload};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub sql: Option<String>,
}

/// # GET /
pub async fn root<M: ConnectionManager>(State(state): State<Arc<AppState<M>>>) -> Json<Value> {
    Json(json!({
        "message": "SQLGate query gateway",
        "status": "running",
        "timestamp": timestamp(),
        "endpoints": {
            "health": "/api/health",
            "database": state.route_prefix,
            "mysql": state.route_prefix,
        },
    }))
}

/// # GET /api/health
/// One pool round trip plus a snapshot of pool occupancy. 503 when the
/// database cannot be reached.
pub async fn health<M: ConnectionManager>(
    State(state): State<Arc<AppState<M>>>,
) -> impl IntoResponse {
    let pool = state.gateway.pool();
    let report = pool.health_check().await;
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "success": report.healthy,
        "status": if report.healthy { "ok" } else { "unhealthy" },
        "database": report,
        "pool": pool.status(),
        "timestamp": timestamp(),
    });
    (status, Json(body))
}

/// # GET {prefix}/test
pub async fn test<M: ConnectionManager>(
    State(state): State<Arc<AppState<M>>>,
) -> Result<Json<ResponseEnvelope<TestPayload>>, AppError> {
    Ok(Json(state.gateway.test().await?))
}

/// # GET {prefix}/tables
pub async fn tables<M: ConnectionManager>(
    State(state): State<Arc<AppState<M>>>,
) -> Result<Json<ResponseEnvelope<TablesPayload>>, AppError> {
    Ok(Json(state.gateway.list_tables().await?))
}

/// # GET {prefix}/query?sql=...
pub async fn query<M: ConnectionManager>(
    State(state): State<Arc<AppState<M>>>,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> Result<Json<ResponseEnvelope<QueryPayload>>, AppError> {
    let Query(params) = params?;
    Ok(Json(state.gateway.run_query(params.sql.as_deref()).await?))
}

pub async fn not_found(method: Method, uri: Uri) -> AppError {
    AppError::NotFound {
        method,
        path: uri.path().to_string(),
    }
}
