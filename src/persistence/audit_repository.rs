//! Append-only audit trail.
//!
//! Every mutating operation on a deed or cooperative writes an entry here.
//! `entity_id` keeps the original id forever; `deed_id` is a live reference
//! that gets nulled when the deed is deleted so history survives deletion.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::models::AuditLogRecord;
use super::{classify, DatabaseError, DbPool};

/// One status transition as recorded in the audit trail. Input to the
/// per-status duration statistics.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusChangeRow {
    pub deed_id: i64,
    pub action_type: String,
    pub timestamp: DateTime<Utc>,
}

pub struct AuditLogRepository {
    pool: DbPool,
}

impl AuditLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn append(
        &self,
        entity_id: i64,
        deed_id: Option<i64>,
        action_type: &str,
        user_id: &str,
        description: &str,
    ) -> Result<AuditLogRecord, DatabaseError> {
        let record = sqlx::query_as::<_, AuditLogRecord>(
            r#"
            INSERT INTO audit_logs (entity_id, deed_id, action_type, user_id, description, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING *
            "#,
        )
        .bind(entity_id)
        .bind(deed_id)
        .bind(action_type)
        .bind(user_id)
        .bind(description)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify("append audit log entry", e))?;

        debug!("Audit: {} on entity {}", action_type, entity_id);
        Ok(record)
    }

    /// Entries for a deed, newest first. Filters on the live `deed_id`
    /// reference; `entity_id` alone is ambiguous because cooperative
    /// entries share the same id space.
    pub async fn for_deed(&self, deed_id: i64) -> Result<Vec<AuditLogRecord>, DatabaseError> {
        sqlx::query_as::<_, AuditLogRecord>(
            "SELECT * FROM audit_logs WHERE deed_id = ?1 ORDER BY timestamp DESC, id DESC",
        )
        .bind(deed_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify("fetch audit log for deed", e))
    }

    /// Detach entries from a deed about to be deleted.
    pub async fn null_deed_refs(&self, deed_id: i64) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE audit_logs SET deed_id = NULL WHERE deed_id = ?1")
            .bind(deed_id)
            .execute(&self.pool)
            .await
            .map_err(|e| classify("detach audit log entries", e))?;
        Ok(())
    }

    /// All status transitions, ordered per deed by time.
    pub async fn status_changes(&self) -> Result<Vec<StatusChangeRow>, DatabaseError> {
        sqlx::query_as::<_, StatusChangeRow>(
            r#"
            SELECT entity_id AS deed_id, action_type, timestamp
            FROM audit_logs
            WHERE action_type LIKE 'STATUS_CHANGED_TO_%'
            ORDER BY entity_id, timestamp, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify("fetch status changes", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;

    #[tokio::test]
    async fn test_append_and_fetch_newest_first() {
        let pool = init_database("sqlite::memory:", 1).await.unwrap();
        let repo = AuditLogRepository::new(pool);

        repo.append(7, Some(7), "DEED_CREATED", "user-1", "Deed created")
            .await
            .unwrap();
        repo.append(7, Some(7), "SIGNING_INITIATED", "user-1", "Sent for signing")
            .await
            .unwrap();

        let entries = repo.for_deed(7).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action_type, "SIGNING_INITIATED");
    }

    #[tokio::test]
    async fn test_for_deed_excludes_entries_of_other_entity_kinds() {
        let pool = init_database("sqlite::memory:", 1).await.unwrap();
        let repo = AuditLogRepository::new(pool);

        repo.append(7, Some(7), "DEED_CREATED", "user-1", "Deed created")
            .await
            .unwrap();
        // A cooperative entry sharing the same id must not show up
        repo.append(7, None, "COOPERATIVE_CREATED", "user-1", "Cooperative created")
            .await
            .unwrap();

        let entries = repo.for_deed(7).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action_type, "DEED_CREATED");
    }

    #[tokio::test]
    async fn test_null_deed_refs_keeps_history() {
        let pool = init_database("sqlite::memory:", 1).await.unwrap();
        let repo = AuditLogRepository::new(pool.clone());

        repo.append(7, Some(7), "DEED_CREATED", "user-1", "Deed created")
            .await
            .unwrap();
        repo.null_deed_refs(7).await.unwrap();
        repo.append(7, None, "DEED_DELETED", "user-1", "Deed deleted")
            .await
            .unwrap();

        // Detached from the live reference but still on record
        assert!(repo.for_deed(7).await.unwrap().is_empty());
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM audit_logs WHERE entity_id = 7 AND deed_id IS NULL",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_status_changes_only_returns_transitions() {
        let pool = init_database("sqlite::memory:", 1).await.unwrap();
        let repo = AuditLogRepository::new(pool);

        repo.append(1, Some(1), "DEED_CREATED", "user-1", "Deed created")
            .await
            .unwrap();
        repo.append(
            1,
            Some(1),
            "STATUS_CHANGED_TO_PENDING_BORROWER_SIGNATURE",
            "user-1",
            "Sent for signing",
        )
        .await
        .unwrap();

        let changes = repo.status_changes().await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes[0].action_type,
            "STATUS_CHANGED_TO_PENDING_BORROWER_SIGNATURE"
        );
    }
}
