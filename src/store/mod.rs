//! Tender persistence.
//!
//! The store is the single source of truth for tender records. Writes are
//! version-checked: a save only lands if the caller read the latest version.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Tender, TenderListQuery, TenderStatus};

pub use memory::InMemoryTenderStore;
pub use postgres::PgTenderStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tender not found: {0}")]
    NotFound(Uuid),

    #[error("version conflict on tender {id}: expected {expected}, found {actual}")]
    VersionConflict { id: Uuid, expected: u64, actual: u64 },

    #[error("tender number {tender_number} already exists in organization {organization_id}")]
    DuplicateTenderNumber {
        organization_id: Uuid,
        tender_number: String,
    },

    #[error("tender {id} already converted to site {site_id}")]
    AlreadyConverted { id: Uuid, site_id: Uuid },

    #[error("tender {id} is '{status}', not won")]
    NotWon { id: Uuid, status: TenderStatus },

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Listing criteria; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TenderFilter {
    pub organization_id: Option<Uuid>,
    pub status: Option<TenderStatus>,
    /// Only tenders whose EMD is paid and not yet returned
    pub emd_outstanding: bool,
    /// Case-insensitive match on tender number, name or client
    pub search: Option<String>,
}

impl TenderFilter {
    pub fn matches(&self, tender: &Tender) -> bool {
        if self.organization_id.is_some_and(|org| org != tender.organization_id) {
            return false;
        }
        if self.status.is_some_and(|status| status != tender.status) {
            return false;
        }
        if self.emd_outstanding && !tender.emd_outstanding() {
            return false;
        }
        if let Some(needle) = self.search_term() {
            let needle = needle.to_lowercase();
            let hit = [
                Some(tender.tender_number.as_str()),
                Some(tender.name.as_str()),
                tender.client.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }

    pub(crate) fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl From<TenderListQuery> for TenderFilter {
    fn from(q: TenderListQuery) -> Self {
        Self {
            organization_id: q.organization_id,
            status: q.status,
            emd_outstanding: q.emd_outstanding.unwrap_or(false),
            search: q.search,
        }
    }
}

/// Exclusive right to convert one tender, held from the eligibility check
/// until the conversion is recorded.
///
/// Stores shared between processes hand out a database-backed claim; a
/// process-local store has nothing to coordinate beyond the in-process lock.
#[must_use = "a claim must be released once the conversion is recorded"]
pub enum ConversionClaim {
    Local,
    /// Open transaction holding `pg_advisory_xact_lock` for the tender.
    Postgres(sqlx::Transaction<'static, sqlx::Postgres>),
}

impl ConversionClaim {
    /// Give the claim up. Dropping it instead also releases the lock once the
    /// rolled-back connection goes back to the pool.
    pub async fn release(self) -> Result<(), StoreError> {
        match self {
            Self::Local => Ok(()),
            Self::Postgres(tx) => Ok(tx.commit().await?),
        }
    }
}

impl std::fmt::Debug for ConversionClaim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => f.write_str("ConversionClaim::Local"),
            Self::Postgres(_) => f.write_str("ConversionClaim::Postgres"),
        }
    }
}

/// Tender storage trait - can be implemented for different backends
#[async_trait]
pub trait TenderStore: Send + Sync {
    /// Store a freshly created tender. Tender numbers are unique per organization.
    async fn insert(&self, tender: &Tender) -> Result<Tender, StoreError>;

    /// Load the current state of a tender
    async fn load(&self, id: Uuid) -> Result<Tender, StoreError>;

    /// Replace a tender if its stored version still equals `expected_version`.
    /// The returned record carries the bumped version.
    async fn save(&self, tender: &Tender, expected_version: u64) -> Result<Tender, StoreError>;

    /// Atomically set the conversion fields on a won, unconverted tender.
    async fn record_conversion(
        &self,
        id: Uuid,
        site_id: Uuid,
        converted_at: DateTime<Utc>,
    ) -> Result<Tender, StoreError>;

    /// Take the cross-process conversion claim for a tender. Blocks while
    /// another holder converts the same tender.
    async fn claim_conversion(&self, _id: Uuid) -> Result<ConversionClaim, StoreError> {
        Ok(ConversionClaim::Local)
    }

    /// List tenders matching the filter, newest first
    async fn list(&self, filter: &TenderFilter) -> Result<Vec<Tender>, StoreError>;

    /// Check the backend is reachable
    async fn health_check(&self) -> Result<(), StoreError>;
}
