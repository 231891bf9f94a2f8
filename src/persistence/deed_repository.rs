//! Mortgage deed data access: deeds, their borrowers and cooperative signers.

use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;
use tracing::debug;

use super::models::{
    BorrowerRecord, CooperativeRecord, CreateBorrower, CreateDeed, CreateSigner, DeedRecord,
    DeedWithRelations, SignerRecord, UpdateDeedScalars,
};
use super::{classify, DatabaseError, DbPool};
use crate::domain::deed_status::DeedStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeedSortField {
    CreatedAt,
    Status,
    ApartmentNumber,
}

impl DeedSortField {
    fn as_column(self) -> &'static str {
        match self {
            DeedSortField::CreatedAt => "created_at",
            DeedSortField::Status => "status",
            DeedSortField::ApartmentNumber => "apartment_number",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filters for deed listing. `bank_id` is always applied; everything else
/// narrows the result further.
#[derive(Debug, Clone, Default)]
pub struct DeedFilters {
    pub bank_id: i64,
    pub deed_status: Option<DeedStatus>,
    pub housing_cooperative_id: Option<i64>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub apartment_number: Option<String>,
    pub credit_numbers: Option<Vec<String>>,
    pub deed_ids: Option<Vec<i64>>,
}

pub struct DeedRepository {
    pool: DbPool,
}

impl DeedRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create_deed(&self, deed: CreateDeed) -> Result<DeedRecord, DatabaseError> {
        let record = sqlx::query_as::<_, DeedRecord>(
            r#"
            INSERT INTO mortgage_deeds (
                created_at, credit_number, housing_cooperative_id,
                apartment_address, apartment_postal_code, apartment_city,
                apartment_number, status, bank_id, created_by, created_by_email
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(&deed.credit_number)
        .bind(deed.housing_cooperative_id)
        .bind(&deed.apartment_address)
        .bind(&deed.apartment_postal_code)
        .bind(&deed.apartment_city)
        .bind(&deed.apartment_number)
        .bind(DeedStatus::Created)
        .bind(deed.bank_id)
        .bind(&deed.created_by)
        .bind(&deed.created_by_email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify("create mortgage deed", e))?;

        debug!("Created mortgage deed {}", record.id);
        Ok(record)
    }

    pub async fn find_deed(&self, deed_id: i64) -> Result<Option<DeedRecord>, DatabaseError> {
        sqlx::query_as::<_, DeedRecord>("SELECT * FROM mortgage_deeds WHERE id = ?1")
            .bind(deed_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify("fetch mortgage deed", e))
    }

    pub async fn load_with_relations(
        &self,
        deed: DeedRecord,
    ) -> Result<DeedWithRelations, DatabaseError> {
        let cooperative = sqlx::query_as::<_, CooperativeRecord>(
            "SELECT * FROM housing_cooperatives WHERE id = ?1",
        )
        .bind(deed.housing_cooperative_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify("fetch cooperative for deed", e))?;

        let borrowers = self.borrowers_for_deed(deed.id).await?;
        let signers = self.signers_for_deed(deed.id).await?;

        Ok(DeedWithRelations {
            deed,
            cooperative,
            borrowers,
            signers,
        })
    }

    fn push_filters(builder: &mut QueryBuilder<'_, sqlx::Sqlite>, filters: &DeedFilters) {
        builder.push(" WHERE bank_id = ").push_bind(filters.bank_id);

        if let Some(status) = filters.deed_status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(cooperative_id) = filters.housing_cooperative_id {
            builder
                .push(" AND housing_cooperative_id = ")
                .push_bind(cooperative_id);
        }
        if let Some(after) = filters.created_after {
            builder.push(" AND created_at >= ").push_bind(after);
        }
        if let Some(before) = filters.created_before {
            builder.push(" AND created_at <= ").push_bind(before);
        }
        if let Some(apartment_number) = &filters.apartment_number {
            builder
                .push(" AND apartment_number = ")
                .push_bind(apartment_number.clone());
        }
        if let Some(credit_numbers) = &filters.credit_numbers {
            builder.push(" AND credit_number IN (");
            let mut separated = builder.separated(", ");
            for credit_number in credit_numbers {
                separated.push_bind(credit_number.clone());
            }
            builder.push(")");
        }
        if let Some(deed_ids) = &filters.deed_ids {
            builder.push(" AND id IN (");
            let mut separated = builder.separated(", ");
            for deed_id in deed_ids {
                separated.push_bind(*deed_id);
            }
            builder.push(")");
        }
    }

    pub async fn list_deeds(
        &self,
        filters: &DeedFilters,
        sort_field: DeedSortField,
        sort_order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DeedRecord>, DatabaseError> {
        let mut builder = QueryBuilder::new("SELECT * FROM mortgage_deeds");
        Self::push_filters(&mut builder, filters);
        // Sort column comes from a fixed enum, never from user input.
        builder.push(format!(
            " ORDER BY {} {}",
            sort_field.as_column(),
            sort_order.as_sql()
        ));
        builder.push(" LIMIT ").push_bind(limit);
        builder.push(" OFFSET ").push_bind(offset);

        builder
            .build_query_as::<DeedRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify("list mortgage deeds", e))
    }

    pub async fn count_deeds(&self, filters: &DeedFilters) -> Result<i64, DatabaseError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM mortgage_deeds");
        Self::push_filters(&mut builder, filters);

        let (count,): (i64,) = builder
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify("count mortgage deeds", e))?;
        Ok(count)
    }

    /// Deed ids with a borrower matching the person number. Used to turn a
    /// borrower filter into an id filter on the main listing query.
    pub async fn deed_ids_for_borrower(
        &self,
        person_number: &str,
    ) -> Result<Vec<i64>, DatabaseError> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT DISTINCT deed_id FROM borrowers WHERE person_number = ?1")
                .bind(person_number)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| classify("fetch deed ids for borrower", e))?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn update_scalars(
        &self,
        deed_id: i64,
        update: UpdateDeedScalars,
    ) -> Result<Option<DeedRecord>, DatabaseError> {
        sqlx::query_as::<_, DeedRecord>(
            r#"
            UPDATE mortgage_deeds SET
                apartment_address = COALESCE(?1, apartment_address),
                apartment_postal_code = COALESCE(?2, apartment_postal_code),
                apartment_city = COALESCE(?3, apartment_city),
                apartment_number = COALESCE(?4, apartment_number),
                housing_cooperative_id = COALESCE(?5, housing_cooperative_id)
            WHERE id = ?6
            RETURNING *
            "#,
        )
        .bind(&update.apartment_address)
        .bind(&update.apartment_postal_code)
        .bind(&update.apartment_city)
        .bind(&update.apartment_number)
        .bind(update.housing_cooperative_id)
        .bind(deed_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify("update mortgage deed", e))
    }

    pub async fn update_status(
        &self,
        deed_id: i64,
        status: DeedStatus,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE mortgage_deeds SET status = ?1 WHERE id = ?2")
            .bind(status)
            .bind(deed_id)
            .execute(&self.pool)
            .await
            .map_err(|e| classify("update deed status", e))?;
        debug!("Deed {} moved to status {}", deed_id, status);
        Ok(())
    }

    pub async fn delete_deed(&self, deed_id: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM mortgage_deeds WHERE id = ?1")
            .bind(deed_id)
            .execute(&self.pool)
            .await
            .map_err(|e| classify("delete mortgage deed", e))?;
        Ok(result.rows_affected())
    }

    // --- Borrowers ---

    pub async fn insert_borrower(
        &self,
        deed_id: i64,
        borrower: CreateBorrower,
    ) -> Result<BorrowerRecord, DatabaseError> {
        sqlx::query_as::<_, BorrowerRecord>(
            r#"
            INSERT INTO borrowers (deed_id, name, person_number, email, ownership_percentage)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING *
            "#,
        )
        .bind(deed_id)
        .bind(&borrower.name)
        .bind(&borrower.person_number)
        .bind(&borrower.email)
        .bind(borrower.ownership_percentage)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify("insert borrower", e))
    }

    pub async fn borrowers_for_deed(
        &self,
        deed_id: i64,
    ) -> Result<Vec<BorrowerRecord>, DatabaseError> {
        sqlx::query_as::<_, BorrowerRecord>(
            "SELECT * FROM borrowers WHERE deed_id = ?1 ORDER BY id",
        )
        .bind(deed_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify("fetch borrowers for deed", e))
    }

    pub async fn find_borrower(
        &self,
        deed_id: i64,
        person_number: &str,
    ) -> Result<Option<BorrowerRecord>, DatabaseError> {
        sqlx::query_as::<_, BorrowerRecord>(
            "SELECT * FROM borrowers WHERE deed_id = ?1 AND person_number = ?2",
        )
        .bind(deed_id)
        .bind(person_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify("fetch borrower", e))
    }

    pub async fn update_borrower(
        &self,
        deed_id: i64,
        borrower: &CreateBorrower,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE borrowers
            SET name = ?1, email = ?2, ownership_percentage = ?3
            WHERE deed_id = ?4 AND person_number = ?5
            "#,
        )
        .bind(&borrower.name)
        .bind(&borrower.email)
        .bind(borrower.ownership_percentage)
        .bind(deed_id)
        .bind(&borrower.person_number)
        .execute(&self.pool)
        .await
        .map_err(|e| classify("update borrower", e))?;
        Ok(())
    }

    pub async fn delete_borrowers_by_person_numbers(
        &self,
        deed_id: i64,
        person_numbers: &[String],
    ) -> Result<(), DatabaseError> {
        if person_numbers.is_empty() {
            return Ok(());
        }
        let mut builder =
            QueryBuilder::new("DELETE FROM borrowers WHERE deed_id = ");
        builder.push_bind(deed_id);
        builder.push(" AND person_number IN (");
        let mut separated = builder.separated(", ");
        for person_number in person_numbers {
            separated.push_bind(person_number.clone());
        }
        builder.push(")");

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| classify("delete borrowers", e))?;
        Ok(())
    }

    pub async fn delete_borrowers(&self, deed_id: i64) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM borrowers WHERE deed_id = ?1")
            .bind(deed_id)
            .execute(&self.pool)
            .await
            .map_err(|e| classify("delete borrowers for deed", e))?;
        Ok(())
    }

    pub async fn set_borrower_signature(
        &self,
        borrower_id: i64,
        signed_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE borrowers SET signature_timestamp = ?1 WHERE id = ?2")
            .bind(signed_at)
            .bind(borrower_id)
            .execute(&self.pool)
            .await
            .map_err(|e| classify("record borrower signature", e))?;
        Ok(())
    }

    // --- Cooperative signers ---

    pub async fn insert_signer(
        &self,
        deed_id: i64,
        signer: CreateSigner,
    ) -> Result<SignerRecord, DatabaseError> {
        sqlx::query_as::<_, SignerRecord>(
            r#"
            INSERT INTO housing_cooperative_signers (
                mortgage_deed_id, administrator_name,
                administrator_person_number, administrator_email
            )
            VALUES (?1, ?2, ?3, ?4)
            RETURNING *
            "#,
        )
        .bind(deed_id)
        .bind(&signer.administrator_name)
        .bind(&signer.administrator_person_number)
        .bind(&signer.administrator_email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify("insert cooperative signer", e))
    }

    pub async fn signers_for_deed(
        &self,
        deed_id: i64,
    ) -> Result<Vec<SignerRecord>, DatabaseError> {
        sqlx::query_as::<_, SignerRecord>(
            "SELECT * FROM housing_cooperative_signers WHERE mortgage_deed_id = ?1 ORDER BY id",
        )
        .bind(deed_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify("fetch signers for deed", e))
    }

    pub async fn find_signer(
        &self,
        deed_id: i64,
        person_number: &str,
    ) -> Result<Option<SignerRecord>, DatabaseError> {
        sqlx::query_as::<_, SignerRecord>(
            "SELECT * FROM housing_cooperative_signers \
             WHERE mortgage_deed_id = ?1 AND administrator_person_number = ?2",
        )
        .bind(deed_id)
        .bind(person_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify("fetch cooperative signer", e))
    }

    pub async fn update_signer(
        &self,
        deed_id: i64,
        signer: &CreateSigner,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE housing_cooperative_signers
            SET administrator_name = ?1, administrator_email = ?2
            WHERE mortgage_deed_id = ?3 AND administrator_person_number = ?4
            "#,
        )
        .bind(&signer.administrator_name)
        .bind(&signer.administrator_email)
        .bind(deed_id)
        .bind(&signer.administrator_person_number)
        .execute(&self.pool)
        .await
        .map_err(|e| classify("update cooperative signer", e))?;
        Ok(())
    }

    pub async fn delete_signers_by_person_numbers(
        &self,
        deed_id: i64,
        person_numbers: &[String],
    ) -> Result<(), DatabaseError> {
        if person_numbers.is_empty() {
            return Ok(());
        }
        let mut builder = QueryBuilder::new(
            "DELETE FROM housing_cooperative_signers WHERE mortgage_deed_id = ",
        );
        builder.push_bind(deed_id);
        builder.push(" AND administrator_person_number IN (");
        let mut separated = builder.separated(", ");
        for person_number in person_numbers {
            separated.push_bind(person_number.clone());
        }
        builder.push(")");

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| classify("delete cooperative signers", e))?;
        Ok(())
    }

    pub async fn delete_signers(&self, deed_id: i64) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM housing_cooperative_signers WHERE mortgage_deed_id = ?1")
            .bind(deed_id)
            .execute(&self.pool)
            .await
            .map_err(|e| classify("delete signers for deed", e))?;
        Ok(())
    }

    pub async fn set_signer_signature(
        &self,
        signer_id: i64,
        signed_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE housing_cooperative_signers SET signature_timestamp = ?1 WHERE id = ?2",
        )
        .bind(signed_at)
        .bind(signer_id)
        .execute(&self.pool)
        .await
        .map_err(|e| classify("record signer signature", e))?;
        Ok(())
    }

    /// Deeds waiting on a signature from the given person, either as an
    /// unsigned borrower or as an unsigned cooperative signer.
    pub async fn pending_deed_ids_for_person(
        &self,
        person_number: &str,
    ) -> Result<Vec<i64>, DatabaseError> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT d.id
            FROM mortgage_deeds d
            LEFT JOIN borrowers b
                ON b.deed_id = d.id
                AND b.person_number = ?1
                AND b.signature_timestamp IS NULL
            LEFT JOIN housing_cooperative_signers s
                ON s.mortgage_deed_id = d.id
                AND s.administrator_person_number = ?1
                AND s.signature_timestamp IS NULL
            WHERE (d.status = 'PENDING_BORROWER_SIGNATURE' AND b.id IS NOT NULL)
               OR (d.status = 'PENDING_HOUSING_COOPERATIVE_SIGNATURE' AND s.id IS NOT NULL)
            ORDER BY d.id
            "#,
        )
        .bind(person_number)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify("fetch pending deeds for person", e))?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
