use serde::{Deserialize, Serialize};

/// Lifecycle status of a mortgage deed.
///
/// Transitions are one-directional:
/// CREATED -> PENDING_BORROWER_SIGNATURE -> PENDING_HOUSING_COOPERATIVE_SIGNATURE -> COMPLETED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeedStatus {
    Created,
    PendingBorrowerSignature,
    PendingHousingCooperativeSignature,
    Completed,
}

impl DeedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeedStatus::Created => "CREATED",
            DeedStatus::PendingBorrowerSignature => "PENDING_BORROWER_SIGNATURE",
            DeedStatus::PendingHousingCooperativeSignature => {
                "PENDING_HOUSING_COOPERATIVE_SIGNATURE"
            }
            DeedStatus::Completed => "COMPLETED",
        }
    }

    /// Audit log action tag recorded when a deed enters this status.
    pub fn audit_action(&self) -> String {
        format!("STATUS_CHANGED_TO_{}", self.as_str())
    }
}

impl std::fmt::Display for DeedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_serde() {
        let json = serde_json::to_string(&DeedStatus::PendingBorrowerSignature).unwrap();
        assert_eq!(json, "\"PENDING_BORROWER_SIGNATURE\"");

        let parsed: DeedStatus = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(parsed, DeedStatus::Completed);
    }

    #[test]
    fn test_audit_action_tag() {
        assert_eq!(
            DeedStatus::Completed.audit_action(),
            "STATUS_CHANGED_TO_COMPLETED"
        );
    }
}
