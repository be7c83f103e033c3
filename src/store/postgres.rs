//! PostgreSQL-backed tender store

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ConversionClaim, StoreError, TenderFilter, TenderStore};
use crate::domain::{Tender, TenderDocument, TenderStatus};

const TENDER_COLUMNS: &str = r#"
    id, organization_id, tender_number, name, location, client,
    tender_amount, emd_amount,
    emd_paid, emd_paid_date, emd_paid_reference,
    emd_returned, emd_return_date, emd_return_reference,
    submission_date, opening_date, status, document_checklist,
    converted_to_site_id, conversion_date,
    notes, description, evaluation_criteria,
    created_at, updated_at, version
"#;

/// Database row for tender
#[derive(Debug, sqlx::FromRow)]
struct TenderRow {
    id: Uuid,
    organization_id: Uuid,
    tender_number: String,
    name: String,
    location: Option<String>,
    client: Option<String>,
    tender_amount: Decimal,
    emd_amount: Decimal,
    emd_paid: bool,
    emd_paid_date: Option<NaiveDate>,
    emd_paid_reference: Option<String>,
    emd_returned: bool,
    emd_return_date: Option<NaiveDate>,
    emd_return_reference: Option<String>,
    submission_date: Option<NaiveDate>,
    opening_date: Option<NaiveDate>,
    status: String,
    document_checklist: Json<Vec<TenderDocument>>,
    converted_to_site_id: Option<Uuid>,
    conversion_date: Option<DateTime<Utc>>,
    notes: Option<String>,
    description: Option<String>,
    evaluation_criteria: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<TenderRow> for Tender {
    type Error = StoreError;

    fn try_from(row: TenderRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TenderStatus>()
            .map_err(StoreError::Serialization)?;

        Ok(Self {
            id: row.id,
            organization_id: row.organization_id,
            tender_number: row.tender_number,
            name: row.name,
            location: row.location,
            client: row.client,
            tender_amount: row.tender_amount,
            emd_amount: row.emd_amount,
            emd_paid: row.emd_paid,
            emd_paid_date: row.emd_paid_date,
            emd_paid_reference: row.emd_paid_reference,
            emd_returned: row.emd_returned,
            emd_return_date: row.emd_return_date,
            emd_return_reference: row.emd_return_reference,
            submission_date: row.submission_date,
            opening_date: row.opening_date,
            status,
            document_checklist: row.document_checklist.0,
            converted_to_site_id: row.converted_to_site_id,
            conversion_date: row.conversion_date,
            notes: row.notes,
            description: row.description,
            evaluation_criteria: row.evaluation_criteria,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version as u64,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgTenderStore {
    pool: PgPool,
}

impl PgTenderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_optional(&self, id: Uuid) -> Result<Option<Tender>, StoreError> {
        let sql = format!("SELECT {} FROM tenders WHERE id = $1", TENDER_COLUMNS);
        sqlx::query_as::<_, TenderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Tender::try_from)
            .transpose()
    }
}

#[async_trait]
impl TenderStore for PgTenderStore {
    async fn insert(&self, tender: &Tender) -> Result<Tender, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO tenders ({columns})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26)
            RETURNING {columns}
            "#,
            columns = TENDER_COLUMNS
        );

        let result = sqlx::query_as::<_, TenderRow>(&sql)
            .bind(tender.id)
            .bind(tender.organization_id)
            .bind(&tender.tender_number)
            .bind(&tender.name)
            .bind(&tender.location)
            .bind(&tender.client)
            .bind(tender.tender_amount)
            .bind(tender.emd_amount)
            .bind(tender.emd_paid)
            .bind(tender.emd_paid_date)
            .bind(&tender.emd_paid_reference)
            .bind(tender.emd_returned)
            .bind(tender.emd_return_date)
            .bind(&tender.emd_return_reference)
            .bind(tender.submission_date)
            .bind(tender.opening_date)
            .bind(tender.status.as_str())
            .bind(Json(&tender.document_checklist))
            .bind(tender.converted_to_site_id)
            .bind(tender.conversion_date)
            .bind(&tender.notes)
            .bind(&tender.description)
            .bind(&tender.evaluation_criteria)
            .bind(tender.created_at)
            .bind(tender.updated_at)
            .bind(tender.version as i64)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(row) => row.try_into(),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateTenderNumber {
                    organization_id: tender.organization_id,
                    tender_number: tender.tender_number.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn load(&self, id: Uuid) -> Result<Tender, StoreError> {
        self.fetch_optional(id)
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    async fn save(&self, tender: &Tender, expected_version: u64) -> Result<Tender, StoreError> {
        let sql = format!(
            r#"
            UPDATE tenders SET
                name = $3, location = $4, client = $5,
                tender_amount = $6, emd_amount = $7,
                emd_paid = $8, emd_paid_date = $9, emd_paid_reference = $10,
                emd_returned = $11, emd_return_date = $12, emd_return_reference = $13,
                submission_date = $14, opening_date = $15, status = $16,
                document_checklist = $17,
                notes = $18, description = $19, evaluation_criteria = $20,
                updated_at = $21, version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING {}
            "#,
            TENDER_COLUMNS
        );

        let row = sqlx::query_as::<_, TenderRow>(&sql)
            .bind(tender.id)
            .bind(expected_version as i64)
            .bind(&tender.name)
            .bind(&tender.location)
            .bind(&tender.client)
            .bind(tender.tender_amount)
            .bind(tender.emd_amount)
            .bind(tender.emd_paid)
            .bind(tender.emd_paid_date)
            .bind(&tender.emd_paid_reference)
            .bind(tender.emd_returned)
            .bind(tender.emd_return_date)
            .bind(&tender.emd_return_reference)
            .bind(tender.submission_date)
            .bind(tender.opening_date)
            .bind(tender.status.as_str())
            .bind(Json(&tender.document_checklist))
            .bind(&tender.notes)
            .bind(&tender.description)
            .bind(&tender.evaluation_criteria)
            .bind(tender.updated_at)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into(),
            // Either the tender vanished or someone else wrote first
            None => match self.fetch_optional(tender.id).await? {
                None => Err(StoreError::NotFound(tender.id)),
                Some(current) => Err(StoreError::VersionConflict {
                    id: tender.id,
                    expected: expected_version,
                    actual: current.version,
                }),
            },
        }
    }

    async fn record_conversion(
        &self,
        id: Uuid,
        site_id: Uuid,
        converted_at: DateTime<Utc>,
    ) -> Result<Tender, StoreError> {
        let sql = format!(
            r#"
            UPDATE tenders SET
                converted_to_site_id = $2, conversion_date = $3,
                updated_at = $3, version = version + 1
            WHERE id = $1 AND status = 'won' AND converted_to_site_id IS NULL
            RETURNING {}
            "#,
            TENDER_COLUMNS
        );

        let row = sqlx::query_as::<_, TenderRow>(&sql)
            .bind(id)
            .bind(site_id)
            .bind(converted_at)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            return row.try_into();
        }

        let current = self.load(id).await?;
        match current.converted_to_site_id {
            Some(existing) => Err(StoreError::AlreadyConverted {
                id,
                site_id: existing,
            }),
            None => Err(StoreError::NotWon {
                id,
                status: current.status,
            }),
        }
    }

    async fn claim_conversion(&self, id: Uuid) -> Result<ConversionClaim, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(conversion_lock_key(id))
            .execute(&mut *tx)
            .await?;

        tracing::debug!(tender_id = %id, "Conversion claim acquired");
        Ok(ConversionClaim::Postgres(tx))
    }

    async fn list(&self, filter: &TenderFilter) -> Result<Vec<Tender>, StoreError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM tenders
            WHERE ($1::uuid IS NULL OR organization_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND (NOT $3 OR (emd_paid AND NOT emd_returned))
              AND ($4::text IS NULL
                   OR tender_number ILIKE $4 ESCAPE '\'
                   OR name ILIKE $4 ESCAPE '\'
                   OR client ILIKE $4 ESCAPE '\')
            ORDER BY created_at DESC
            "#,
            TENDER_COLUMNS
        );

        let pattern = filter.search_term().map(contains_pattern);

        let rows = sqlx::query_as::<_, TenderRow>(&sql)
            .bind(filter.organization_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.emd_outstanding)
            .bind(pattern)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Tender::try_from).collect()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

/// `ILIKE` pattern matching `term` literally anywhere in the column.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Advisory lock key for converting a tender: both halves of the UUID folded together.
fn conversion_lock_key(id: Uuid) -> i64 {
    let bits = id.as_u128();
    ((bits >> 64) as u64 ^ bits as u64) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_pattern_escapes_like_wildcards() {
        assert_eq!(contains_pattern("NH-48"), "%NH-48%");
        assert_eq!(contains_pattern("_"), "%\\_%");
        assert_eq!(contains_pattern("50%"), "%50\\%%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn conversion_lock_key_is_stable_per_tender() {
        let id = Uuid::new_v4();
        assert_eq!(conversion_lock_key(id), conversion_lock_key(id));
        assert_ne!(conversion_lock_key(id), conversion_lock_key(Uuid::new_v4()));
    }
}
