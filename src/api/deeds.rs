//! Mortgage deed CRUD endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::pagination::{PageParams, Pagination};
use super::schemas::{BorrowerPayload, DeedCreateRequest, DeedResponse, DeedUpdateRequest, SignerPayload};
use super::AppState;
use crate::auth::CurrentUser;
use crate::domain::deed_status::DeedStatus;
use crate::domain::errors::ApiError;
use crate::domain::reconcile::reconcile;
use crate::domain::validation::is_valid_person_number;
use crate::persistence::audit_repository::AuditLogRepository;
use crate::persistence::cooperative_repository::CooperativeRepository;
use crate::persistence::deed_repository::{
    DeedFilters, DeedRepository, DeedSortField, SortOrder,
};
use crate::persistence::models::{
    CreateBorrower, CreateDeed, CreateSigner, DeedRecord, DeedWithRelations, UpdateDeedScalars,
};

const DEFAULT_PAGE_SIZE: i64 = 50;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/mortgage-deeds",
            axum::routing::post(create_deed).get(list_deeds),
        )
        .route(
            "/api/mortgage-deeds/:deed_id",
            get(get_deed).put(update_deed).delete(delete_deed),
        )
        .route(
            "/api/mortgage-deeds/pending-signatures/:person_number",
            get(pending_signatures),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct DeedListParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub deed_status: Option<DeedStatus>,
    pub housing_cooperative_id: Option<i64>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub borrower_person_number: Option<String>,
    pub apartment_number: Option<String>,
    /// Comma-separated list of credit numbers.
    pub credit_numbers: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

fn parse_sort(params: &DeedListParams) -> Result<(DeedSortField, SortOrder), ApiError> {
    let field = match params.sort_by.as_deref() {
        None | Some("created_at") => DeedSortField::CreatedAt,
        Some("status") => DeedSortField::Status,
        Some("apartment_number") => DeedSortField::ApartmentNumber,
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "Cannot sort by '{}'; valid fields are created_at, status, apartment_number",
                other
            )))
        }
    };
    let order = match params.sort_order.as_deref() {
        None | Some("desc") => SortOrder::Desc,
        Some("asc") => SortOrder::Asc,
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "Invalid sort_order '{}'; use asc or desc",
                other
            )))
        }
    };
    Ok((field, order))
}

/// A deed is visible to users of the owning bank, its borrowers, and the
/// cooperative administrator.
fn ensure_deed_access(user: &CurrentUser, loaded: &DeedWithRelations) -> Result<(), ApiError> {
    if user.bank_id == Some(loaded.deed.bank_id) {
        return Ok(());
    }
    if let Some(person_number) = &user.person_number {
        if loaded
            .borrowers
            .iter()
            .any(|b| &b.person_number == person_number)
        {
            return Ok(());
        }
        if let Some(cooperative) = &loaded.cooperative {
            if &cooperative.administrator_person_number == person_number {
                return Ok(());
            }
        }
    }
    Err(ApiError::Forbidden(
        "Not authorized to access this mortgage deed".to_string(),
    ))
}

async fn load_deed(repo: &DeedRepository, deed_id: i64) -> Result<DeedRecord, ApiError> {
    repo.find_deed(deed_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Mortgage deed not found".to_string()))
}

async fn create_deed(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<DeedCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    let bank_id = user.require_bank_id()?;

    let cooperative = CooperativeRepository::new(state.pool.clone())
        .find_by_id(request.housing_cooperative_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Housing cooperative not found".to_string()))?;

    let repo = DeedRepository::new(state.pool.clone());
    let audit = AuditLogRepository::new(state.pool.clone());

    let deed = repo
        .create_deed(CreateDeed {
            credit_number: request.credit_number,
            housing_cooperative_id: cooperative.id,
            apartment_address: request.apartment_address,
            apartment_postal_code: request.apartment_postal_code,
            apartment_city: request.apartment_city,
            apartment_number: request.apartment_number,
            bank_id,
            created_by: user.id.clone(),
            created_by_email: user.email.clone(),
        })
        .await?;

    for borrower in request.borrowers {
        repo.insert_borrower(
            deed.id,
            CreateBorrower {
                name: borrower.name.clone(),
                person_number: borrower.person_number.clone(),
                email: borrower.email,
                ownership_percentage: borrower.ownership_percentage,
            },
        )
        .await?;
        audit
            .append(
                deed.id,
                Some(deed.id),
                "BORROWER_ADDED",
                &user.id,
                &format!("Borrower {} added", borrower.name),
            )
            .await?;
    }

    for signer in request.housing_cooperative_signers {
        repo.insert_signer(
            deed.id,
            CreateSigner {
                administrator_name: signer.administrator_name.clone(),
                administrator_person_number: signer.administrator_person_number,
                administrator_email: signer.administrator_email,
            },
        )
        .await?;
        audit
            .append(
                deed.id,
                Some(deed.id),
                "COOPERATIVE_SIGNER_ADDED",
                &user.id,
                &format!("Cooperative signer {} added", signer.administrator_name),
            )
            .await?;
    }

    audit
        .append(
            deed.id,
            Some(deed.id),
            "DEED_CREATED",
            &user.id,
            &format!("Mortgage deed created for credit {}", deed.credit_number),
        )
        .await?;

    info!("Mortgage deed {} created by {}", deed.id, user.id);
    let loaded = repo.load_with_relations(deed).await?;
    Ok((StatusCode::CREATED, Json(DeedResponse::from(loaded))))
}

async fn list_deeds(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<DeedListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let bank_id = user.require_bank_id()?;
    let page_params = PageParams {
        page: params.page,
        page_size: params.page_size,
    };
    let pagination = Pagination::resolve(&page_params, DEFAULT_PAGE_SIZE)?;
    let (sort_field, sort_order) = parse_sort(&params)?;

    let repo = DeedRepository::new(state.pool.clone());

    let mut filters = DeedFilters {
        bank_id,
        deed_status: params.deed_status,
        housing_cooperative_id: params.housing_cooperative_id,
        created_after: params.created_after,
        created_before: params.created_before,
        apartment_number: params.apartment_number.clone(),
        credit_numbers: params.credit_numbers.as_ref().map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        }),
        deed_ids: None,
    };

    if let Some(person_number) = &params.borrower_person_number {
        if !is_valid_person_number(person_number) {
            return Err(ApiError::Validation(
                "borrower_person_number must be 12 digits".to_string(),
            ));
        }
        let deed_ids = repo.deed_ids_for_borrower(person_number).await?;
        if deed_ids.is_empty() {
            // No deed can match, skip the main query.
            return Ok((pagination.headers(0), Json(Vec::<DeedResponse>::new())));
        }
        filters.deed_ids = Some(deed_ids);
    }

    let total = repo.count_deeds(&filters).await?;
    let deeds = repo
        .list_deeds(
            &filters,
            sort_field,
            sort_order,
            pagination.limit(),
            pagination.offset(),
        )
        .await?;

    let mut body = Vec::with_capacity(deeds.len());
    for deed in deeds {
        let loaded = repo.load_with_relations(deed).await?;
        body.push(DeedResponse::from(loaded));
    }

    Ok((pagination.headers(total), Json(body)))
}

async fn get_deed(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(deed_id): Path<i64>,
) -> Result<Json<DeedResponse>, ApiError> {
    let repo = DeedRepository::new(state.pool.clone());
    let deed = load_deed(&repo, deed_id).await?;
    let loaded = repo.load_with_relations(deed).await?;
    ensure_deed_access(&user, &loaded)?;
    Ok(Json(DeedResponse::from(loaded)))
}

async fn update_deed(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(deed_id): Path<i64>,
    Json(request): Json<DeedUpdateRequest>,
) -> Result<Json<DeedResponse>, ApiError> {
    request.validate()?;

    let scalars = UpdateDeedScalars {
        apartment_address: request.apartment_address.clone(),
        apartment_postal_code: request.apartment_postal_code.clone(),
        apartment_city: request.apartment_city.clone(),
        apartment_number: request.apartment_number.clone(),
        housing_cooperative_id: request.housing_cooperative_id,
    };
    if scalars.is_empty()
        && request.borrowers.is_none()
        && request.housing_cooperative_signers.is_none()
    {
        return Err(ApiError::BadRequest(
            "No fields provided for update".to_string(),
        ));
    }

    let repo = DeedRepository::new(state.pool.clone());
    let audit = AuditLogRepository::new(state.pool.clone());

    let deed = load_deed(&repo, deed_id).await?;
    let loaded = repo.load_with_relations(deed).await?;
    ensure_deed_access(&user, &loaded)?;

    if let Some(cooperative_id) = request.housing_cooperative_id {
        CooperativeRepository::new(state.pool.clone())
            .find_by_id(cooperative_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Housing cooperative not found".to_string()))?;
    }

    if !scalars.is_empty() {
        repo.update_scalars(deed_id, scalars)
            .await?
            .ok_or_else(|| ApiError::NotFound("Mortgage deed not found".to_string()))?;
    }

    if let Some(desired) = request.borrowers {
        reconcile_borrowers(&repo, &audit, &user, deed_id, loaded.borrowers.clone(), desired)
            .await?;
    }

    if let Some(desired) = request.housing_cooperative_signers {
        reconcile_signers(&repo, &audit, &user, deed_id, loaded.signers.clone(), desired)
            .await?;
    }

    audit
        .append(
            deed_id,
            Some(deed_id),
            "DEED_UPDATED",
            &user.id,
            "Mortgage deed updated",
        )
        .await?;

    let deed = load_deed(&repo, deed_id).await?;
    let loaded = repo.load_with_relations(deed).await?;
    Ok(Json(DeedResponse::from(loaded)))
}

async fn reconcile_borrowers(
    repo: &DeedRepository,
    audit: &AuditLogRepository,
    user: &CurrentUser,
    deed_id: i64,
    existing: Vec<crate::persistence::models::BorrowerRecord>,
    desired: Vec<BorrowerPayload>,
) -> Result<(), ApiError> {
    let diff = reconcile(
        existing,
        desired,
        |stored| stored.person_number.clone(),
        |payload| payload.person_number.clone(),
        |stored, payload| {
            stored.name != payload.name
                || stored.email != payload.email
                || stored.ownership_percentage != payload.ownership_percentage
        },
    );

    let removed: Vec<String> = diff
        .to_remove
        .iter()
        .map(|b| b.person_number.clone())
        .collect();
    repo.delete_borrowers_by_person_numbers(deed_id, &removed)
        .await?;
    for borrower in &diff.to_remove {
        audit
            .append(
                deed_id,
                Some(deed_id),
                "BORROWER_REMOVED",
                &user.id,
                &format!("Borrower {} removed", borrower.name),
            )
            .await?;
    }

    for payload in diff.to_add {
        repo.insert_borrower(
            deed_id,
            CreateBorrower {
                name: payload.name.clone(),
                person_number: payload.person_number,
                email: payload.email,
                ownership_percentage: payload.ownership_percentage,
            },
        )
        .await?;
        audit
            .append(
                deed_id,
                Some(deed_id),
                "BORROWER_ADDED",
                &user.id,
                &format!("Borrower {} added", payload.name),
            )
            .await?;
    }

    for payload in diff.to_update {
        repo.update_borrower(
            deed_id,
            &CreateBorrower {
                name: payload.name.clone(),
                person_number: payload.person_number,
                email: payload.email,
                ownership_percentage: payload.ownership_percentage,
            },
        )
        .await?;
        audit
            .append(
                deed_id,
                Some(deed_id),
                "BORROWER_UPDATED",
                &user.id,
                &format!("Borrower {} updated", payload.name),
            )
            .await?;
    }

    Ok(())
}

async fn reconcile_signers(
    repo: &DeedRepository,
    audit: &AuditLogRepository,
    user: &CurrentUser,
    deed_id: i64,
    existing: Vec<crate::persistence::models::SignerRecord>,
    desired: Vec<SignerPayload>,
) -> Result<(), ApiError> {
    let diff = reconcile(
        existing,
        desired,
        |stored| stored.administrator_person_number.clone(),
        |payload| payload.administrator_person_number.clone(),
        |stored, payload| {
            stored.administrator_name != payload.administrator_name
                || stored.administrator_email != payload.administrator_email
        },
    );

    let removed: Vec<String> = diff
        .to_remove
        .iter()
        .map(|s| s.administrator_person_number.clone())
        .collect();
    repo.delete_signers_by_person_numbers(deed_id, &removed)
        .await?;
    for signer in &diff.to_remove {
        audit
            .append(
                deed_id,
                Some(deed_id),
                "COOPERATIVE_SIGNER_REMOVED",
                &user.id,
                &format!("Cooperative signer {} removed", signer.administrator_name),
            )
            .await?;
    }

    for payload in diff.to_add {
        repo.insert_signer(
            deed_id,
            CreateSigner {
                administrator_name: payload.administrator_name.clone(),
                administrator_person_number: payload.administrator_person_number,
                administrator_email: payload.administrator_email,
            },
        )
        .await?;
        audit
            .append(
                deed_id,
                Some(deed_id),
                "COOPERATIVE_SIGNER_ADDED",
                &user.id,
                &format!("Cooperative signer {} added", payload.administrator_name),
            )
            .await?;
    }

    for payload in diff.to_update {
        repo.update_signer(
            deed_id,
            &CreateSigner {
                administrator_name: payload.administrator_name.clone(),
                administrator_person_number: payload.administrator_person_number,
                administrator_email: payload.administrator_email,
            },
        )
        .await?;
        audit
            .append(
                deed_id,
                Some(deed_id),
                "COOPERATIVE_SIGNER_UPDATED",
                &user.id,
                &format!("Cooperative signer {} updated", payload.administrator_name),
            )
            .await?;
    }

    Ok(())
}

async fn delete_deed(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(deed_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let repo = DeedRepository::new(state.pool.clone());
    let audit = AuditLogRepository::new(state.pool.clone());

    let deed = load_deed(&repo, deed_id).await?;
    let loaded = repo.load_with_relations(deed).await?;
    ensure_deed_access(&user, &loaded)?;

    audit
        .append(
            deed_id,
            Some(deed_id),
            "DEED_DELETION_INITIATED",
            &user.id,
            &format!(
                "Deletion of mortgage deed for credit {} initiated",
                loaded.deed.credit_number
            ),
        )
        .await?;

    // History must survive the row: detach the live reference first.
    audit.null_deed_refs(deed_id).await?;
    repo.delete_borrowers(deed_id).await?;
    repo.delete_signers(deed_id).await?;
    repo.delete_deed(deed_id).await?;

    audit
        .append(
            deed_id,
            None,
            "DEED_DELETED",
            &user.id,
            &format!(
                "Mortgage deed for credit {} deleted",
                loaded.deed.credit_number
            ),
        )
        .await?;

    info!("Mortgage deed {} deleted by {}", deed_id, user.id);
    Ok(StatusCode::NO_CONTENT)
}

async fn pending_signatures(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(person_number): Path<String>,
) -> Result<Json<Vec<DeedResponse>>, ApiError> {
    if user.person_number.as_deref() != Some(person_number.as_str()) {
        return Err(ApiError::Forbidden(
            "Can only view your own pending signatures".to_string(),
        ));
    }

    let repo = DeedRepository::new(state.pool.clone());
    let deed_ids = repo.pending_deed_ids_for_person(&person_number).await?;

    let mut body = Vec::with_capacity(deed_ids.len());
    for deed_id in deed_ids {
        let deed = load_deed(&repo, deed_id).await?;
        let loaded = repo.load_with_relations(deed).await?;
        body.push(DeedResponse::from(loaded));
    }
    Ok(Json(body))
}
