//! Housing cooperative data access.

use super::models::{CooperativeRecord, CreateCooperative, UpdateCooperative};
use super::{classify, DatabaseError, DbPool};
use tracing::debug;

pub struct CooperativeRepository {
    pool: DbPool,
}

impl CooperativeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        cooperative: CreateCooperative,
    ) -> Result<CooperativeRecord, DatabaseError> {
        let record = sqlx::query_as::<_, CooperativeRecord>(
            r#"
            INSERT INTO housing_cooperatives (
                organisation_number, name, address, postal_code, city,
                administrator_company, administrator_name,
                administrator_person_number, administrator_email, created_by
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            RETURNING *
            "#,
        )
        .bind(&cooperative.organisation_number)
        .bind(&cooperative.name)
        .bind(&cooperative.address)
        .bind(&cooperative.postal_code)
        .bind(&cooperative.city)
        .bind(&cooperative.administrator_company)
        .bind(&cooperative.administrator_name)
        .bind(&cooperative.administrator_person_number)
        .bind(&cooperative.administrator_email)
        .bind(&cooperative.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify("create housing cooperative", e))?;

        debug!(
            "Created housing cooperative {} ({})",
            record.name, record.organisation_number
        );
        Ok(record)
    }

    pub async fn find_by_organisation_number(
        &self,
        organisation_number: &str,
    ) -> Result<Option<CooperativeRecord>, DatabaseError> {
        sqlx::query_as::<_, CooperativeRecord>(
            "SELECT * FROM housing_cooperatives WHERE organisation_number = ?1",
        )
        .bind(organisation_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify("fetch housing cooperative", e))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<CooperativeRecord>, DatabaseError> {
        sqlx::query_as::<_, CooperativeRecord>("SELECT * FROM housing_cooperatives WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify("fetch housing cooperative by id", e))
    }

    /// Page of cooperatives, newest first.
    pub async fn list(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CooperativeRecord>, DatabaseError> {
        sqlx::query_as::<_, CooperativeRecord>(
            "SELECT * FROM housing_cooperatives ORDER BY id DESC LIMIT ?1 OFFSET ?2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify("list housing cooperatives", e))
    }

    pub async fn count(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM housing_cooperatives")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify("count housing cooperatives", e))?;
        Ok(count)
    }

    /// Apply the provided fields, keeping stored values for absent ones.
    pub async fn update(
        &self,
        organisation_number: &str,
        update: UpdateCooperative,
    ) -> Result<Option<CooperativeRecord>, DatabaseError> {
        sqlx::query_as::<_, CooperativeRecord>(
            r#"
            UPDATE housing_cooperatives SET
                name = COALESCE(?1, name),
                address = COALESCE(?2, address),
                postal_code = COALESCE(?3, postal_code),
                city = COALESCE(?4, city),
                administrator_company = COALESCE(?5, administrator_company),
                administrator_name = COALESCE(?6, administrator_name),
                administrator_person_number = COALESCE(?7, administrator_person_number),
                administrator_email = COALESCE(?8, administrator_email)
            WHERE organisation_number = ?9
            RETURNING *
            "#,
        )
        .bind(&update.name)
        .bind(&update.address)
        .bind(&update.postal_code)
        .bind(&update.city)
        .bind(&update.administrator_company)
        .bind(&update.administrator_name)
        .bind(&update.administrator_person_number)
        .bind(&update.administrator_email)
        .bind(organisation_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify("update housing cooperative", e))
    }

    pub async fn delete(&self, organisation_number: &str) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM housing_cooperatives WHERE organisation_number = ?1")
            .bind(organisation_number)
            .execute(&self.pool)
            .await
            .map_err(|e| classify("delete housing cooperative", e))?;
        Ok(result.rows_affected())
    }

    /// Referencing deed count, used to block deletion.
    pub async fn deed_count(&self, cooperative_id: i64) -> Result<i64, DatabaseError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM mortgage_deeds WHERE housing_cooperative_id = ?1")
                .bind(cooperative_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| classify("count deeds for cooperative", e))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;

    fn sample(org: &str) -> CreateCooperative {
        CreateCooperative {
            organisation_number: org.to_string(),
            name: "Brf Solsidan".to_string(),
            address: "Storgatan 1".to_string(),
            postal_code: "123 45".to_string(),
            city: "Stockholm".to_string(),
            administrator_company: None,
            administrator_name: "Karin Larsson".to_string(),
            administrator_person_number: "196505051234".to_string(),
            administrator_email: "karin@brfsolsidan.se".to_string(),
            created_by: "user-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_cooperative_crud() {
        let pool = init_database("sqlite::memory:", 1).await.unwrap();
        let repo = CooperativeRepository::new(pool);

        let created = repo.create(sample("123456-7890")).await.unwrap();
        assert_eq!(created.organisation_number, "123456-7890");

        let fetched = repo
            .find_by_organisation_number("123456-7890")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.id, created.id);

        let updated = repo
            .update(
                "123456-7890",
                UpdateCooperative {
                    name: Some("Brf Nya Solsidan".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Brf Nya Solsidan");
        // Untouched fields keep their stored values
        assert_eq!(updated.city, "Stockholm");

        assert_eq!(repo.count().await.unwrap(), 1);

        let deleted = repo.delete("123456-7890").await.unwrap();
        assert_eq!(deleted, 1);
        assert!(repo
            .find_by_organisation_number("123456-7890")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_organisation_number_is_a_unique_violation() {
        let pool = init_database("sqlite::memory:", 1).await.unwrap();
        let repo = CooperativeRepository::new(pool);

        repo.create(sample("123456-7890")).await.unwrap();
        let err = repo.create(sample("123456-7890")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let pool = init_database("sqlite::memory:", 1).await.unwrap();
        let repo = CooperativeRepository::new(pool);

        repo.create(sample("111111-1111")).await.unwrap();
        repo.create(sample("222222-2222")).await.unwrap();

        let page = repo.list(10, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].organisation_number, "222222-2222");
    }
}
