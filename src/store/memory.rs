use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::{StoreError, TenderFilter, TenderStore};
use crate::domain::{Tender, TenderStatus};

/// Process-local tender store, used in development and tests.
#[derive(Debug, Default)]
pub struct InMemoryTenderStore {
    tenders: RwLock<HashMap<Uuid, Tender>>,
}

impl InMemoryTenderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tenders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenders.read().is_empty()
    }
}

#[async_trait]
impl TenderStore for InMemoryTenderStore {
    async fn insert(&self, tender: &Tender) -> Result<Tender, StoreError> {
        let mut tenders = self.tenders.write();

        let duplicate = tenders.values().any(|t| {
            t.organization_id == tender.organization_id && t.tender_number == tender.tender_number
        });
        if duplicate {
            return Err(StoreError::DuplicateTenderNumber {
                organization_id: tender.organization_id,
                tender_number: tender.tender_number.clone(),
            });
        }

        tenders.insert(tender.id, tender.clone());
        Ok(tender.clone())
    }

    async fn load(&self, id: Uuid) -> Result<Tender, StoreError> {
        self.tenders
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn save(&self, tender: &Tender, expected_version: u64) -> Result<Tender, StoreError> {
        let mut tenders = self.tenders.write();
        let stored = tenders
            .get_mut(&tender.id)
            .ok_or(StoreError::NotFound(tender.id))?;

        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                id: tender.id,
                expected: expected_version,
                actual: stored.version,
            });
        }

        let mut next = tender.clone();
        next.version = expected_version + 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn record_conversion(
        &self,
        id: Uuid,
        site_id: Uuid,
        converted_at: DateTime<Utc>,
    ) -> Result<Tender, StoreError> {
        let mut tenders = self.tenders.write();
        let stored = tenders.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if stored.status != TenderStatus::Won {
            return Err(StoreError::NotWon {
                id,
                status: stored.status,
            });
        }
        if let Some(existing) = stored.converted_to_site_id {
            return Err(StoreError::AlreadyConverted {
                id,
                site_id: existing,
            });
        }

        stored.converted_to_site_id = Some(site_id);
        stored.conversion_date = Some(converted_at);
        stored.updated_at = converted_at;
        stored.version += 1;
        Ok(stored.clone())
    }

    async fn list(&self, filter: &TenderFilter) -> Result<Vec<Tender>, StoreError> {
        let mut results: Vec<Tender> = self
            .tenders
            .read()
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();

        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(results)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
