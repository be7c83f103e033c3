//! One-time conversion of a won tender into a project site.
//!
//! The check → create site → record sequence runs under a per-tender lock so
//! concurrent requests in this process create a single site. Across processes
//! the store's conversion claim serializes the same sequence, and the
//! compare-and-set on `converted_to_site_id` refuses a second record.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use super::TenderError;
use crate::domain::{SiteDraft, Tender, TenderStatus};
use crate::services::SiteCreator;
use crate::store::{StoreError, TenderStore};

/// Result of a successful conversion
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub tender: Tender,
    pub site_id: Uuid,
}

/// Build the site payload for a tender that is eligible for conversion.
pub fn site_draft(tender: &Tender) -> Result<SiteDraft, TenderError> {
    if tender.status != TenderStatus::Won {
        return Err(TenderError::NotWon {
            status: tender.status,
        });
    }
    if let Some(site_id) = tender.converted_to_site_id {
        return Err(TenderError::AlreadyConverted { site_id });
    }

    Ok(SiteDraft {
        source_tender_id: tender.id,
        name: tender.name.clone(),
        location: tender.location.clone(),
        budget: tender.tender_amount,
        client: tender.client.clone(),
    })
}

/// Per-tender async locks, dropped once nobody holds or waits on them.
#[derive(Debug, Default)]
struct ConversionLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl ConversionLocks {
    fn lease(&self, id: Uuid) -> LockLease<'_> {
        let handle = self.locks.lock().entry(id).or_default().clone();
        LockLease {
            locks: self,
            id,
            handle,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Reference to one tender's lock. Dropping the last lease removes the table
/// entry, also when the conversion future is cancelled mid-flight.
struct LockLease<'a> {
    locks: &'a ConversionLocks,
    id: Uuid,
    handle: Arc<AsyncMutex<()>>,
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.locks.lock();
        // Leases are only cloned under the table lock: the table's copy plus
        // ours means nobody else is waiting.
        let idle = locks
            .get(&self.id)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.handle) && Arc::strong_count(lock) == 2);
        if idle {
            locks.remove(&self.id);
        }
    }
}

pub struct ConversionService {
    store: Arc<dyn TenderStore>,
    sites: Arc<dyn SiteCreator>,
    locks: ConversionLocks,
}

impl ConversionService {
    pub fn new(store: Arc<dyn TenderStore>, sites: Arc<dyn SiteCreator>) -> Self {
        Self {
            store,
            sites,
            locks: ConversionLocks::default(),
        }
    }

    pub async fn convert(&self, id: Uuid) -> Result<ConversionOutcome, TenderError> {
        let lease = self.locks.lease(id);
        let _guard = lease.handle.lock().await;

        let claim = self.store.claim_conversion(id).await?;
        let result = self.convert_claimed(id).await;
        if let Err(err) = claim.release().await {
            tracing::warn!(tender_id = %id, error = %err, "Failed to release conversion claim");
        }
        result
    }

    async fn convert_claimed(&self, id: Uuid) -> Result<ConversionOutcome, TenderError> {
        let tender = self.store.load(id).await?;
        let draft = site_draft(&tender)?;

        let site = self
            .sites
            .create_site(&draft)
            .await
            .map_err(|e| TenderError::SiteCreation(format!("{:#}", e)))?;

        match self
            .store
            .record_conversion(id, site.site_id, Utc::now())
            .await
        {
            Ok(tender) => {
                tracing::info!(
                    tender_id = %id,
                    site_id = %site.site_id,
                    "Tender converted to site"
                );
                Ok(ConversionOutcome {
                    tender,
                    site_id: site.site_id,
                })
            }
            Err(err) => {
                if let StoreError::AlreadyConverted { site_id, .. } = &err {
                    tracing::warn!(
                        tender_id = %id,
                        orphaned_site_id = %site.site_id,
                        winning_site_id = %site_id,
                        "Tender was converted by another writer; created site is orphaned"
                    );
                }
                Err(err.into())
            }
        }
    }

    #[cfg(test)]
    fn held_locks(&self) -> usize {
        self.locks.len()
    }
}
