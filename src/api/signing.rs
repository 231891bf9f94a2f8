//! Multi-party signing workflow.
//!
//! A deed moves CREATED → PENDING_BORROWER_SIGNATURE when sent for
//! signing, to PENDING_HOUSING_COOPERATIVE_SIGNATURE when the last
//! borrower signs, and to COMPLETED when the cooperative side is done.
//! Each transition is re-derived from the signature rows by `all_signed`,
//! so the final signer observes the transition.
//!
//! Two concurrent final signatures can both observe "all signed" and
//! trigger the transition twice; the second status write is idempotent
//! but duplicate audit entries and emails are possible.

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::schemas::{DeedResponse, SignResponse};
use super::AppState;
use crate::auth::CurrentUser;
use crate::domain::deed_status::DeedStatus;
use crate::domain::errors::ApiError;
use crate::domain::signing::all_signed;
use crate::notifications::{
    borrower_signing_email, cooperative_signing_email, deed_completed_email, signing_link,
    SUBJECT_BORROWER_SIGNING, SUBJECT_COOPERATIVE_SIGNING, SUBJECT_DEED_COMPLETED,
};
use crate::persistence::audit_repository::AuditLogRepository;
use crate::persistence::deed_repository::DeedRepository;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/mortgage-deeds/deeds/:deed_id/send-for-signing",
            post(send_for_signing),
        )
        .route(
            "/api/mortgage-deeds/:deed_id/signatures/borrower",
            post(sign_as_borrower),
        )
        .route(
            "/api/mortgage-deeds/:deed_id/signatures/cooperative-admin",
            post(sign_as_cooperative_admin),
        )
}

#[derive(Debug, Deserialize)]
pub struct SignatureRequest {
    pub person_number: String,
}

/// Record the outcome of a notification batch in the audit trail.
/// Delivery failures never fail the surrounding request.
async fn audit_notification_outcome(
    audit: &AuditLogRepository,
    deed_id: i64,
    user_id: &str,
    sent: usize,
    failed: &[String],
) -> Result<(), ApiError> {
    if failed.is_empty() {
        audit
            .append(
                deed_id,
                Some(deed_id),
                "NOTIFICATIONS_SENT",
                user_id,
                &format!("{} notification(s) sent", sent),
            )
            .await?;
    } else {
        audit
            .append(
                deed_id,
                Some(deed_id),
                "NOTIFICATION_FAILURE",
                user_id,
                &format!(
                    "{} of {} notification(s) failed; recipients: {}",
                    failed.len(),
                    sent + failed.len(),
                    failed.join(", ")
                ),
            )
            .await?;
    }
    Ok(())
}

async fn send_for_signing(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(deed_id): Path<i64>,
) -> Result<Json<DeedResponse>, ApiError> {
    let repo = DeedRepository::new(state.pool.clone());
    let audit = AuditLogRepository::new(state.pool.clone());

    let deed = repo
        .find_deed(deed_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Mortgage deed not found".to_string()))?;
    let loaded = repo.load_with_relations(deed).await?;

    audit
        .append(
            deed_id,
            Some(deed_id),
            "SIGNING_INITIATED",
            &user.id,
            &format!(
                "Signing initiated for mortgage deed with credit {}",
                loaded.deed.credit_number
            ),
        )
        .await?;

    let status = DeedStatus::PendingBorrowerSignature;
    repo.update_status(deed_id, status).await?;
    audit
        .append(
            deed_id,
            Some(deed_id),
            &status.audit_action(),
            &user.id,
            &format!("Status changed to {}", status),
        )
        .await?;

    let link = signing_link(&state.settings.frontend_url, deed_id);
    let mut sent = 0;
    let mut failed = Vec::new();
    for borrower in &loaded.borrowers {
        let html = borrower_signing_email(
            &borrower.name,
            &loaded.deed.credit_number,
            &loaded.deed.apartment_address,
            &link,
        );
        if state
            .notifier
            .send(&borrower.email, SUBJECT_BORROWER_SIGNING, &html)
            .await
        {
            sent += 1;
        } else {
            failed.push(borrower.email.clone());
        }
    }
    audit_notification_outcome(&audit, deed_id, &user.id, sent, &failed).await?;

    info!("Mortgage deed {} sent for signing by {}", deed_id, user.id);
    let deed = repo
        .find_deed(deed_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Mortgage deed not found".to_string()))?;
    let loaded = repo.load_with_relations(deed).await?;
    Ok(Json(DeedResponse::from(loaded)))
}

async fn sign_as_borrower(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(deed_id): Path<i64>,
    Json(request): Json<SignatureRequest>,
) -> Result<Json<SignResponse>, ApiError> {
    let repo = DeedRepository::new(state.pool.clone());
    let audit = AuditLogRepository::new(state.pool.clone());

    let deed = repo
        .find_deed(deed_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Mortgage deed not found".to_string()))?;

    if deed.status != DeedStatus::PendingBorrowerSignature {
        audit
            .append(
                deed_id,
                Some(deed_id),
                "BORROWER_SIGNATURE_INVALID_STATUS",
                &user.id,
                &format!(
                    "Borrower signature attempted while deed is in status {}",
                    deed.status
                ),
            )
            .await?;
        return Err(ApiError::Conflict(format!(
            "Deed is not awaiting borrower signatures (status: {})",
            deed.status
        )));
    }

    let borrower = repo
        .find_borrower(deed_id, &request.person_number)
        .await?
        .ok_or_else(|| ApiError::NotFound("Borrower not found on this deed".to_string()))?;

    if borrower.signature_timestamp.is_some() {
        audit
            .append(
                deed_id,
                Some(deed_id),
                "BORROWER_SIGNATURE_DUPLICATE_ATTEMPT",
                &user.id,
                &format!("Borrower {} has already signed", borrower.name),
            )
            .await?;
        return Err(ApiError::Conflict(
            "Borrower has already signed this deed".to_string(),
        ));
    }

    repo.set_borrower_signature(borrower.id, Utc::now()).await?;
    audit
        .append(
            deed_id,
            Some(deed_id),
            "BORROWER_SIGNED",
            &user.id,
            &format!("Borrower {} signed", borrower.name),
        )
        .await?;

    let borrowers = repo.borrowers_for_deed(deed_id).await?;
    let timestamps: Vec<_> = borrowers.iter().map(|b| b.signature_timestamp).collect();

    if !all_signed(&timestamps) {
        return Ok(Json(SignResponse {
            deed_id,
            status: DeedStatus::PendingBorrowerSignature,
            message: "Signature recorded successfully. Waiting for other borrowers to sign."
                .to_string(),
        }));
    }

    audit
        .append(
            deed_id,
            Some(deed_id),
            "ALL_BORROWERS_SIGNED",
            &user.id,
            "All borrowers have signed",
        )
        .await?;

    let status = DeedStatus::PendingHousingCooperativeSignature;
    repo.update_status(deed_id, status).await?;
    audit
        .append(
            deed_id,
            Some(deed_id),
            &status.audit_action(),
            &user.id,
            &format!("Status changed to {}", status),
        )
        .await?;

    // Hand over to the cooperative side.
    let deed = repo
        .find_deed(deed_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Mortgage deed not found".to_string()))?;
    let loaded = repo.load_with_relations(deed).await?;
    if let Some(cooperative) = &loaded.cooperative {
        let link = signing_link(&state.settings.frontend_url, deed_id);
        let html = cooperative_signing_email(
            &cooperative.administrator_name,
            &cooperative.name,
            &loaded.deed.credit_number,
            &link,
        );
        let delivered = state
            .notifier
            .send(
                &cooperative.administrator_email,
                SUBJECT_COOPERATIVE_SIGNING,
                &html,
            )
            .await;
        let failed = if delivered {
            Vec::new()
        } else {
            vec![cooperative.administrator_email.clone()]
        };
        audit_notification_outcome(&audit, deed_id, &user.id, usize::from(delivered), &failed)
            .await?;
    }

    Ok(Json(SignResponse {
        deed_id,
        status,
        message:
            "All borrowers have signed. Housing cooperative administrators have been notified."
                .to_string(),
    }))
}

async fn sign_as_cooperative_admin(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(deed_id): Path<i64>,
    Json(request): Json<SignatureRequest>,
) -> Result<Json<SignResponse>, ApiError> {
    let repo = DeedRepository::new(state.pool.clone());
    let audit = AuditLogRepository::new(state.pool.clone());

    let deed = repo
        .find_deed(deed_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Mortgage deed not found".to_string()))?;
    let loaded = repo.load_with_relations(deed).await?;

    if loaded.deed.status != DeedStatus::PendingHousingCooperativeSignature {
        audit
            .append(
                deed_id,
                Some(deed_id),
                "ADMIN_SIGNATURE_INVALID_STATUS",
                &user.id,
                &format!(
                    "Administrator signature attempted while deed is in status {}",
                    loaded.deed.status
                ),
            )
            .await?;
        return Err(ApiError::Conflict(format!(
            "Deed is not awaiting cooperative signatures (status: {})",
            loaded.deed.status
        )));
    }

    let cooperative = loaded
        .cooperative
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("Housing cooperative not found".to_string()))?;

    if cooperative.administrator_person_number != request.person_number {
        audit
            .append(
                deed_id,
                Some(deed_id),
                "ADMIN_SIGNATURE_WRONG_ADMIN",
                &user.id,
                &format!(
                    "Signature attempted by {} who is not the cooperative administrator",
                    request.person_number
                ),
            )
            .await?;
        return Err(ApiError::Forbidden(
            "Only the housing cooperative administrator can sign".to_string(),
        ));
    }

    if let Some(signer) = repo.find_signer(deed_id, &request.person_number).await? {
        repo.set_signer_signature(signer.id, Utc::now()).await?;
    }
    audit
        .append(
            deed_id,
            Some(deed_id),
            "ADMINISTRATOR_SIGNED",
            &user.id,
            &format!(
                "Cooperative administrator {} signed",
                cooperative.administrator_name
            ),
        )
        .await?;

    let signers = repo.signers_for_deed(deed_id).await?;
    let timestamps: Vec<_> = signers.iter().map(|s| s.signature_timestamp).collect();

    if !all_signed(&timestamps) {
        return Ok(Json(SignResponse {
            deed_id,
            status: DeedStatus::PendingHousingCooperativeSignature,
            message:
                "Signature recorded successfully. Waiting for other administrators to sign."
                    .to_string(),
        }));
    }

    audit
        .append(
            deed_id,
            Some(deed_id),
            "ALL_ADMINISTRATORS_SIGNED",
            &user.id,
            "All cooperative administrators have signed",
        )
        .await?;

    let status = DeedStatus::Completed;
    repo.update_status(deed_id, status).await?;
    audit
        .append(
            deed_id,
            Some(deed_id),
            &status.audit_action(),
            &user.id,
            &format!("Status changed to {}", status),
        )
        .await?;

    let mut sent = 0;
    let mut failed = Vec::new();
    for borrower in &loaded.borrowers {
        let html = deed_completed_email(&borrower.name, &loaded.deed.credit_number);
        if state
            .notifier
            .send(&borrower.email, SUBJECT_DEED_COMPLETED, &html)
            .await
        {
            sent += 1;
        } else {
            failed.push(borrower.email.clone());
        }
    }
    let html = deed_completed_email(&cooperative.administrator_name, &loaded.deed.credit_number);
    if state
        .notifier
        .send(&cooperative.administrator_email, SUBJECT_DEED_COMPLETED, &html)
        .await
    {
        sent += 1;
    } else {
        failed.push(cooperative.administrator_email.clone());
    }
    audit_notification_outcome(&audit, deed_id, &user.id, sent, &failed).await?;

    info!("Mortgage deed {} fully signed", deed_id);
    Ok(Json(SignResponse {
        deed_id,
        status,
        message: "All signatures collected. All parties have been notified.".to_string(),
    }))
}
