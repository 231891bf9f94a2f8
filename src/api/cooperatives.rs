//! Housing cooperative endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use super::pagination::{PageParams, Pagination};
use super::schemas::{CooperativeCreateRequest, CooperativeResponse, CooperativeUpdateRequest};
use super::AppState;
use crate::auth::CurrentUser;
use crate::domain::errors::ApiError;
use crate::persistence::audit_repository::AuditLogRepository;
use crate::persistence::cooperative_repository::CooperativeRepository;
use crate::persistence::models::{CreateCooperative, UpdateCooperative};

const DEFAULT_PAGE_SIZE: i64 = 10;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/housing-cooperatives",
            post(create_cooperative).get(list_cooperatives),
        )
        .route(
            "/api/housing-cooperatives/:organisation_number",
            get(get_cooperative)
                .put(update_cooperative)
                .delete(delete_cooperative),
        )
}

async fn create_cooperative(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CooperativeCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;

    let repo = CooperativeRepository::new(state.pool.clone());
    if repo
        .find_by_organisation_number(&request.organisation_number)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(format!(
            "Housing cooperative with organisation number {} already exists",
            request.organisation_number
        )));
    }

    let record = repo
        .create(CreateCooperative {
            organisation_number: request.organisation_number,
            name: request.name,
            address: request.address,
            postal_code: request.postal_code,
            city: request.city,
            administrator_company: request.administrator_company,
            administrator_name: request.administrator_name,
            administrator_person_number: request.administrator_person_number,
            administrator_email: request.administrator_email,
            created_by: user.id.clone(),
        })
        .await?;

    AuditLogRepository::new(state.pool.clone())
        .append(
            record.id,
            None,
            "COOPERATIVE_CREATED",
            &user.id,
            &format!(
                "Housing cooperative {} ({}) created",
                record.name, record.organisation_number
            ),
        )
        .await?;

    info!(
        "Housing cooperative {} created by {}",
        record.organisation_number, user.id
    );
    Ok((StatusCode::CREATED, Json(CooperativeResponse::from(record))))
}

async fn list_cooperatives(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let pagination = Pagination::resolve(&params, DEFAULT_PAGE_SIZE)?;
    let repo = CooperativeRepository::new(state.pool.clone());

    let total = repo.count().await?;
    let records = repo.list(pagination.limit(), pagination.offset()).await?;
    let body: Vec<CooperativeResponse> =
        records.into_iter().map(CooperativeResponse::from).collect();

    Ok((pagination.headers(total), Json(body)))
}

async fn get_cooperative(
    State(state): State<AppState>,
    Path(organisation_number): Path<String>,
) -> Result<Json<CooperativeResponse>, ApiError> {
    let record = CooperativeRepository::new(state.pool.clone())
        .find_by_organisation_number(&organisation_number)
        .await?
        .ok_or_else(|| ApiError::NotFound("Housing cooperative not found".to_string()))?;

    Ok(Json(CooperativeResponse::from(record)))
}

async fn update_cooperative(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(organisation_number): Path<String>,
    Json(request): Json<CooperativeUpdateRequest>,
) -> Result<Json<CooperativeResponse>, ApiError> {
    request.validate()?;

    let repo = CooperativeRepository::new(state.pool.clone());
    let existing = repo
        .find_by_organisation_number(&organisation_number)
        .await?
        .ok_or_else(|| ApiError::NotFound("Housing cooperative not found".to_string()))?;

    let update = UpdateCooperative {
        name: request.name,
        address: request.address,
        postal_code: request.postal_code,
        city: request.city,
        administrator_company: request.administrator_company,
        administrator_name: request.administrator_name,
        administrator_person_number: request.administrator_person_number,
        administrator_email: request.administrator_email,
    };

    // Nothing to change: hand back the stored row untouched.
    if update.is_empty() {
        return Ok(Json(CooperativeResponse::from(existing)));
    }

    let record = repo
        .update(&organisation_number, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Housing cooperative not found".to_string()))?;

    AuditLogRepository::new(state.pool.clone())
        .append(
            record.id,
            None,
            "COOPERATIVE_UPDATED",
            &user.id,
            &format!(
                "Housing cooperative {} updated",
                record.organisation_number
            ),
        )
        .await?;

    Ok(Json(CooperativeResponse::from(record)))
}

async fn delete_cooperative(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(organisation_number): Path<String>,
) -> Result<StatusCode, ApiError> {
    let repo = CooperativeRepository::new(state.pool.clone());
    let existing = repo
        .find_by_organisation_number(&organisation_number)
        .await?
        .ok_or_else(|| ApiError::NotFound("Housing cooperative not found".to_string()))?;

    let deed_count = repo.deed_count(existing.id).await?;
    if deed_count > 0 {
        return Err(ApiError::Conflict(format!(
            "Cannot delete housing cooperative: {} mortgage deed(s) reference it",
            deed_count
        )));
    }

    AuditLogRepository::new(state.pool.clone())
        .append(
            existing.id,
            None,
            "COOPERATIVE_DELETED",
            &user.id,
            &format!(
                "Housing cooperative {} ({}) deleted",
                existing.name, existing.organisation_number
            ),
        )
        .await?;

    repo.delete(&organisation_number).await?;
    info!(
        "Housing cooperative {} deleted by {}",
        organisation_number, user.id
    );
    Ok(StatusCode::NO_CONTENT)
}
