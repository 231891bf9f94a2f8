//! Request and response bodies.
//!
//! Requests carry a `validate()` that enforces the Swedish number formats
//! and ownership rules before anything touches the database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::deed_status::DeedStatus;
use crate::domain::errors::ApiError;
use crate::domain::validation::{
    is_valid_admin_person_number, is_valid_email, is_valid_organisation_number,
    is_valid_person_number, is_valid_postal_code, validate_ownership_percentages,
};
use crate::persistence::models::{
    AuditLogRecord, BorrowerRecord, CooperativeRecord, DeedWithRelations, SignerRecord,
};

fn invalid(message: impl Into<String>) -> ApiError {
    ApiError::Validation(message.into())
}

// --- Housing cooperatives ---

#[derive(Debug, Clone, Deserialize)]
pub struct CooperativeCreateRequest {
    pub organisation_number: String,
    pub name: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    #[serde(default)]
    pub administrator_company: Option<String>,
    pub administrator_name: String,
    pub administrator_person_number: String,
    pub administrator_email: String,
}

impl CooperativeCreateRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !is_valid_organisation_number(&self.organisation_number) {
            return Err(invalid("organisation_number must match NNNNNN-NNNN"));
        }
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if !is_valid_postal_code(&self.postal_code) {
            return Err(invalid("postal_code must be 5 digits"));
        }
        if !is_valid_admin_person_number(&self.administrator_person_number) {
            return Err(invalid(
                "administrator_person_number must be YYYYMMDDXXXX or YYYYMMDD-XXXX",
            ));
        }
        if !is_valid_email(&self.administrator_email) {
            return Err(invalid("administrator_email is not a valid email address"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CooperativeUpdateRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub administrator_company: Option<String>,
    pub administrator_name: Option<String>,
    pub administrator_person_number: Option<String>,
    pub administrator_email: Option<String>,
}

impl CooperativeUpdateRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(invalid("name must not be empty"));
            }
        }
        if let Some(postal_code) = &self.postal_code {
            if !is_valid_postal_code(postal_code) {
                return Err(invalid("postal_code must be 5 digits"));
            }
        }
        if let Some(person_number) = &self.administrator_person_number {
            if !is_valid_admin_person_number(person_number) {
                return Err(invalid(
                    "administrator_person_number must be YYYYMMDDXXXX or YYYYMMDD-XXXX",
                ));
            }
        }
        if let Some(email) = &self.administrator_email {
            if !is_valid_email(email) {
                return Err(invalid("administrator_email is not a valid email address"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CooperativeResponse {
    pub id: i64,
    pub organisation_number: String,
    pub name: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub administrator_company: Option<String>,
    pub administrator_name: String,
    pub administrator_person_number: String,
    pub administrator_email: String,
}

impl From<CooperativeRecord> for CooperativeResponse {
    fn from(record: CooperativeRecord) -> Self {
        Self {
            id: record.id,
            organisation_number: record.organisation_number,
            name: record.name,
            address: record.address,
            postal_code: record.postal_code,
            city: record.city,
            administrator_company: record.administrator_company,
            administrator_name: record.administrator_name,
            administrator_person_number: record.administrator_person_number,
            administrator_email: record.administrator_email,
        }
    }
}

// --- Mortgage deeds ---

#[derive(Debug, Clone, Deserialize)]
pub struct BorrowerPayload {
    pub name: String,
    pub person_number: String,
    pub email: String,
    pub ownership_percentage: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignerPayload {
    pub administrator_name: String,
    pub administrator_person_number: String,
    pub administrator_email: String,
}

fn validate_borrowers(borrowers: &[BorrowerPayload]) -> Result<(), ApiError> {
    if borrowers.is_empty() {
        return Err(invalid("at least one borrower is required"));
    }
    for borrower in borrowers {
        if borrower.name.trim().is_empty() {
            return Err(invalid("borrower name must not be empty"));
        }
        if !is_valid_person_number(&borrower.person_number) {
            return Err(invalid(format!(
                "borrower person_number must be 12 digits, got '{}'",
                borrower.person_number
            )));
        }
        if !is_valid_email(&borrower.email) {
            return Err(invalid(format!(
                "borrower email '{}' is not a valid email address",
                borrower.email
            )));
        }
    }
    let percentages: Vec<f64> = borrowers.iter().map(|b| b.ownership_percentage).collect();
    validate_ownership_percentages(&percentages).map_err(invalid)
}

fn validate_signers(signers: &[SignerPayload]) -> Result<(), ApiError> {
    for signer in signers {
        if !is_valid_admin_person_number(&signer.administrator_person_number) {
            return Err(invalid(format!(
                "signer person number '{}' must be YYYYMMDDXXXX or YYYYMMDD-XXXX",
                signer.administrator_person_number
            )));
        }
        if !is_valid_email(&signer.administrator_email) {
            return Err(invalid(format!(
                "signer email '{}' is not a valid email address",
                signer.administrator_email
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeedCreateRequest {
    pub credit_number: String,
    pub housing_cooperative_id: i64,
    pub apartment_address: String,
    pub apartment_postal_code: String,
    pub apartment_city: String,
    pub apartment_number: String,
    pub borrowers: Vec<BorrowerPayload>,
    #[serde(default)]
    pub housing_cooperative_signers: Vec<SignerPayload>,
}

impl DeedCreateRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.credit_number.trim().is_empty() {
            return Err(invalid("credit_number must not be empty"));
        }
        if !is_valid_postal_code(&self.apartment_postal_code) {
            return Err(invalid("apartment_postal_code must be 5 digits"));
        }
        validate_borrowers(&self.borrowers)?;
        validate_signers(&self.housing_cooperative_signers)
    }
}

/// Full-replace update. Scalar fields are patched when present; the
/// borrower and signer collections, when present, replace the stored
/// ones via reconciliation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeedUpdateRequest {
    pub apartment_address: Option<String>,
    pub apartment_postal_code: Option<String>,
    pub apartment_city: Option<String>,
    pub apartment_number: Option<String>,
    pub housing_cooperative_id: Option<i64>,
    pub borrowers: Option<Vec<BorrowerPayload>>,
    pub housing_cooperative_signers: Option<Vec<SignerPayload>>,
}

impl DeedUpdateRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(postal_code) = &self.apartment_postal_code {
            if !is_valid_postal_code(postal_code) {
                return Err(invalid("apartment_postal_code must be 5 digits"));
            }
        }
        if let Some(borrowers) = &self.borrowers {
            validate_borrowers(borrowers)?;
        }
        if let Some(signers) = &self.housing_cooperative_signers {
            validate_signers(signers)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BorrowerResponse {
    pub id: i64,
    pub deed_id: i64,
    pub name: String,
    pub person_number: String,
    pub email: String,
    pub ownership_percentage: f64,
    pub signature_timestamp: Option<DateTime<Utc>>,
}

impl From<BorrowerRecord> for BorrowerResponse {
    fn from(record: BorrowerRecord) -> Self {
        Self {
            id: record.id,
            deed_id: record.deed_id,
            name: record.name,
            person_number: record.person_number,
            email: record.email,
            ownership_percentage: record.ownership_percentage,
            signature_timestamp: record.signature_timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SignerResponse {
    pub id: i64,
    pub mortgage_deed_id: i64,
    pub administrator_name: String,
    pub administrator_person_number: String,
    pub administrator_email: String,
    pub signature_timestamp: Option<DateTime<Utc>>,
}

impl From<SignerRecord> for SignerResponse {
    fn from(record: SignerRecord) -> Self {
        Self {
            id: record.id,
            mortgage_deed_id: record.mortgage_deed_id,
            administrator_name: record.administrator_name,
            administrator_person_number: record.administrator_person_number,
            administrator_email: record.administrator_email,
            signature_timestamp: record.signature_timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeedResponse {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub credit_number: String,
    pub housing_cooperative_id: i64,
    pub apartment_address: String,
    pub apartment_postal_code: String,
    pub apartment_city: String,
    pub apartment_number: String,
    pub status: DeedStatus,
    pub bank_id: i64,
    pub created_by: String,
    pub created_by_email: String,
    pub housing_cooperative: Option<CooperativeResponse>,
    pub borrowers: Vec<BorrowerResponse>,
    pub housing_cooperative_signers: Vec<SignerResponse>,
}

impl From<DeedWithRelations> for DeedResponse {
    fn from(loaded: DeedWithRelations) -> Self {
        let deed = loaded.deed;
        Self {
            id: deed.id,
            created_at: deed.created_at,
            credit_number: deed.credit_number,
            housing_cooperative_id: deed.housing_cooperative_id,
            apartment_address: deed.apartment_address,
            apartment_postal_code: deed.apartment_postal_code,
            apartment_city: deed.apartment_city,
            apartment_number: deed.apartment_number,
            status: deed.status,
            bank_id: deed.bank_id,
            created_by: deed.created_by,
            created_by_email: deed.created_by_email,
            housing_cooperative: loaded.cooperative.map(CooperativeResponse::from),
            borrowers: loaded.borrowers.into_iter().map(Into::into).collect(),
            housing_cooperative_signers: loaded.signers.into_iter().map(Into::into).collect(),
        }
    }
}

// --- Signing ---

#[derive(Debug, Clone, Serialize)]
pub struct SignResponse {
    pub deed_id: i64,
    pub status: DeedStatus,
    pub message: String,
}

// --- Audit log ---

#[derive(Debug, Clone, Serialize)]
pub struct AuditLogResponse {
    pub id: i64,
    pub deed_id: Option<i64>,
    pub action_type: String,
    pub user_id: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl From<AuditLogRecord> for AuditLogResponse {
    fn from(record: AuditLogRecord) -> Self {
        Self {
            id: record.id,
            deed_id: record.deed_id,
            action_type: record.action_type,
            user_id: record.user_id,
            description: record.description,
            timestamp: record.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_create() -> DeedCreateRequest {
        DeedCreateRequest {
            credit_number: "K-1001".to_string(),
            housing_cooperative_id: 1,
            apartment_address: "Storgatan 1".to_string(),
            apartment_postal_code: "123 45".to_string(),
            apartment_city: "Stockholm".to_string(),
            apartment_number: "1101".to_string(),
            borrowers: vec![BorrowerPayload {
                name: "Anna Andersson".to_string(),
                person_number: "198001011234".to_string(),
                email: "anna@example.com".to_string(),
                ownership_percentage: 100.0,
            }],
            housing_cooperative_signers: vec![],
        }
    }

    #[test]
    fn test_valid_deed_request_passes() {
        assert!(valid_create().validate().is_ok());
    }

    #[test]
    fn test_ownership_sum_must_be_100() {
        let mut request = valid_create();
        request.borrowers[0].ownership_percentage = 60.0;
        request.borrowers.push(BorrowerPayload {
            name: "Bertil Bengtsson".to_string(),
            person_number: "197502021234".to_string(),
            email: "bertil@example.com".to_string(),
            ownership_percentage: 50.0,
        });
        assert!(matches!(
            request.validate(),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_deed_requires_at_least_one_borrower() {
        let mut request = valid_create();
        request.borrowers.clear();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_bad_person_number_rejected() {
        let mut request = valid_create();
        request.borrowers[0].person_number = "19800101-1234".to_string();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_cooperative_request_checks_organisation_number() {
        let request = CooperativeCreateRequest {
            organisation_number: "1234567890".to_string(),
            name: "Brf Solsidan".to_string(),
            address: "Storgatan 1".to_string(),
            postal_code: "123 45".to_string(),
            city: "Stockholm".to_string(),
            administrator_company: None,
            administrator_name: "Karin".to_string(),
            administrator_person_number: "19650505-1234".to_string(),
            administrator_email: "karin@brf.se".to_string(),
        };
        assert!(request.validate().is_err());
    }
}
