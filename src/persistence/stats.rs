//! Read-only aggregate queries behind the statistics endpoints.

use chrono::{DateTime, Utc};

use super::{classify, DatabaseError, DbPool};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusCountRow {
    pub status: String,
    pub count: i64,
}

/// Count of events on a single calendar day, `day` as `YYYY-MM-DD`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DailyCountRow {
    pub day: String,
    pub count: i64,
}

pub struct StatsRepository {
    pool: DbPool,
}

impl StatsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn total_deeds(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM mortgage_deeds")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify("count deeds", e))?;
        Ok(count)
    }

    pub async fn total_cooperatives(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM housing_cooperatives")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify("count cooperatives", e))?;
        Ok(count)
    }

    pub async fn total_borrowers(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM borrowers")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify("count borrowers", e))?;
        Ok(count)
    }

    pub async fn status_distribution(&self) -> Result<Vec<StatusCountRow>, DatabaseError> {
        sqlx::query_as::<_, StatusCountRow>(
            "SELECT status, COUNT(*) AS count FROM mortgage_deeds GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify("fetch status distribution", e))
    }

    pub async fn deeds_created_per_day(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyCountRow>, DatabaseError> {
        sqlx::query_as::<_, DailyCountRow>(
            r#"
            SELECT date(created_at) AS day, COUNT(*) AS count
            FROM mortgage_deeds
            WHERE created_at >= ?1
            GROUP BY date(created_at)
            ORDER BY day
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify("fetch deeds created per day", e))
    }

    pub async fn completions_per_day(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyCountRow>, DatabaseError> {
        sqlx::query_as::<_, DailyCountRow>(
            r#"
            SELECT date(timestamp) AS day, COUNT(*) AS count
            FROM audit_logs
            WHERE action_type = 'STATUS_CHANGED_TO_COMPLETED' AND timestamp >= ?1
            GROUP BY date(timestamp)
            ORDER BY day
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify("fetch completions per day", e))
    }
}
