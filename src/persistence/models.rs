//! Row types and insert payloads for the persistence layer.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::domain::deed_status::DeedStatus;

#[derive(Debug, Clone, FromRow)]
pub struct CooperativeRecord {
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
    pub created_by: String,
}

#[derive(Debug, Clone)]
pub struct CreateCooperative {
    pub organisation_number: String,
    pub name: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub administrator_company: Option<String>,
    pub administrator_name: String,
    pub administrator_person_number: String,
    pub administrator_email: String,
    pub created_by: String,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateCooperative {
    pub name: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub administrator_company: Option<String>,
    pub administrator_name: Option<String>,
    pub administrator_person_number: Option<String>,
    pub administrator_email: Option<String>,
}

impl UpdateCooperative {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.address.is_none()
            && self.postal_code.is_none()
            && self.city.is_none()
            && self.administrator_company.is_none()
            && self.administrator_name.is_none()
            && self.administrator_person_number.is_none()
            && self.administrator_email.is_none()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DeedRecord {
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
}

#[derive(Debug, Clone)]
pub struct CreateDeed {
    pub credit_number: String,
    pub housing_cooperative_id: i64,
    pub apartment_address: String,
    pub apartment_postal_code: String,
    pub apartment_city: String,
    pub apartment_number: String,
    pub bank_id: i64,
    pub created_by: String,
    pub created_by_email: String,
}

/// Partial scalar update of a deed; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateDeedScalars {
    pub apartment_address: Option<String>,
    pub apartment_postal_code: Option<String>,
    pub apartment_city: Option<String>,
    pub apartment_number: Option<String>,
    pub housing_cooperative_id: Option<i64>,
}

impl UpdateDeedScalars {
    pub fn is_empty(&self) -> bool {
        self.apartment_address.is_none()
            && self.apartment_postal_code.is_none()
            && self.apartment_city.is_none()
            && self.apartment_number.is_none()
            && self.housing_cooperative_id.is_none()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct BorrowerRecord {
    pub id: i64,
    pub deed_id: i64,
    pub name: String,
    pub person_number: String,
    pub email: String,
    pub ownership_percentage: f64,
    pub signature_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateBorrower {
    pub name: String,
    pub person_number: String,
    pub email: String,
    pub ownership_percentage: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct SignerRecord {
    pub id: i64,
    pub mortgage_deed_id: i64,
    pub administrator_name: String,
    pub administrator_person_number: String,
    pub administrator_email: String,
    pub signature_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateSigner {
    pub administrator_name: String,
    pub administrator_person_number: String,
    pub administrator_email: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct AuditLogRecord {
    pub id: i64,
    pub entity_id: i64,
    pub deed_id: Option<i64>,
    pub action_type: String,
    pub user_id: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// A deed together with everything a response needs.
#[derive(Debug, Clone)]
pub struct DeedWithRelations {
    pub deed: DeedRecord,
    pub cooperative: Option<CooperativeRecord>,
    pub borrowers: Vec<BorrowerRecord>,
    pub signers: Vec<SignerRecord>,
}
