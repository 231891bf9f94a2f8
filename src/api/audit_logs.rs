//! Audit trail endpoint.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use super::schemas::AuditLogResponse;
use super::AppState;
use crate::domain::errors::ApiError;
use crate::persistence::audit_repository::AuditLogRepository;
use crate::persistence::deed_repository::DeedRepository;

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/api/mortgage-deeds/:deed_id/audit-logs",
        get(list_for_deed),
    )
}

async fn list_for_deed(
    State(state): State<AppState>,
    Path(deed_id): Path<i64>,
) -> Result<Json<Vec<AuditLogResponse>>, ApiError> {
    DeedRepository::new(state.pool.clone())
        .find_deed(deed_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Mortgage deed not found".to_string()))?;

    let entries = AuditLogRepository::new(state.pool.clone())
        .for_deed(deed_id)
        .await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}
