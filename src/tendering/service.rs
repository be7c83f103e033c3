//! Tender service façade.
//!
//! Every mutation follows the same path: load the current record, run the
//! pure rule for the operation, re-check invariants and write back with the
//! version that was read. Nothing is written when a check fails.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::conversion::{ConversionOutcome, ConversionService};
use super::{checklist, emd, lifecycle, TenderError};
use crate::domain::{CreateTenderRequest, Tender, UpdateTenderRequest};
use crate::services::{FileStorage, SiteCreator, TenderNumberGenerator};
use crate::store::{StoreError, TenderFilter, TenderStore};

/// Attempts at finding a free generated tender number
const MAX_NUMBER_ATTEMPTS: usize = 5;

pub struct TenderService {
    store: Arc<dyn TenderStore>,
    files: Arc<dyn FileStorage>,
    numbers: TenderNumberGenerator,
    conversion: ConversionService,
}

impl TenderService {
    pub fn new(
        store: Arc<dyn TenderStore>,
        sites: Arc<dyn SiteCreator>,
        files: Arc<dyn FileStorage>,
        numbers: TenderNumberGenerator,
    ) -> Self {
        Self {
            conversion: ConversionService::new(store.clone(), sites),
            store,
            files,
            numbers,
        }
    }

    /// Advance the number generator past every tender already stored.
    pub async fn warm_numbering(&self) -> Result<usize, TenderError> {
        let existing = self.store.list(&TenderFilter::default()).await?;
        for tender in &existing {
            self.numbers.observe(&tender.tender_number);
        }
        Ok(existing.len())
    }

    pub async fn health_check(&self) -> Result<(), TenderError> {
        self.store.health_check().await.map_err(Into::into)
    }

    #[instrument(skip(self, req), fields(organization_id = %req.organization_id))]
    pub async fn create_tender(&self, req: CreateTenderRequest) -> Result<Tender, TenderError> {
        let now = Utc::now();
        let explicit = req
            .tender_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let number = explicit
                .clone()
                .unwrap_or_else(|| self.numbers.next(now.year()));
            let tender = lifecycle::create(req.clone(), number, now)?;

            match self.store.insert(&tender).await {
                Ok(created) => {
                    info!(
                        tender_id = %created.id,
                        tender_number = %created.tender_number,
                        status = %created.status,
                        "Tender created"
                    );
                    return Ok(created);
                }
                Err(StoreError::DuplicateTenderNumber { .. })
                    if explicit.is_none() && attempt < MAX_NUMBER_ATTEMPTS =>
                {
                    continue
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn get_tender(&self, id: Uuid) -> Result<Tender, TenderError> {
        Ok(self.store.load(id).await?)
    }

    pub async fn list_tenders(&self, filter: &TenderFilter) -> Result<Vec<Tender>, TenderError> {
        Ok(self.store.list(filter).await?)
    }

    pub async fn update_tender(
        &self,
        id: Uuid,
        changes: UpdateTenderRequest,
    ) -> Result<Tender, TenderError> {
        self.mutate(id, "update", |t, now| lifecycle::update(t, &changes, now))
            .await
    }

    pub async fn submit_tender(
        &self,
        id: Uuid,
        submission_date: Option<NaiveDate>,
    ) -> Result<Tender, TenderError> {
        self.mutate(id, "submit", |t, now| {
            lifecycle::submit(t, submission_date, now)
        })
        .await
    }

    pub async fn mark_won(&self, id: Uuid) -> Result<Tender, TenderError> {
        self.mutate(id, "mark_won", lifecycle::mark_won).await
    }

    pub async fn mark_lost(&self, id: Uuid, reason: &str) -> Result<Tender, TenderError> {
        self.mutate(id, "mark_lost", |t, now| lifecycle::mark_lost(t, reason, now))
            .await
    }

    pub async fn record_emd_payment(
        &self,
        id: Uuid,
        date: NaiveDate,
        reference: Option<String>,
    ) -> Result<Tender, TenderError> {
        self.mutate(id, "record_emd_payment", |t, now| {
            emd::record_payment(t, date, reference, now)
        })
        .await
    }

    pub async fn mark_emd_returned(
        &self,
        id: Uuid,
        date: Option<NaiveDate>,
        reference: Option<String>,
    ) -> Result<Tender, TenderError> {
        self.mutate(id, "mark_emd_returned", |t, now| {
            emd::mark_returned(t, date, reference, now)
        })
        .await
    }

    pub async fn unmark_emd_returned(&self, id: Uuid) -> Result<Tender, TenderError> {
        self.mutate(id, "unmark_emd_returned", emd::unmark_returned)
            .await
    }

    pub async fn add_document(&self, id: Uuid, name: &str) -> Result<Tender, TenderError> {
        self.mutate(id, "add_document", |t, now| {
            checklist::add_document(t, name, now)
        })
        .await
    }

    pub async fn toggle_document(&self, id: Uuid, doc_id: Uuid) -> Result<Tender, TenderError> {
        self.mutate(id, "toggle_document", |t, now| {
            checklist::toggle_collected(t, doc_id, now)
        })
        .await
    }

    pub async fn attach_document_file(
        &self,
        id: Uuid,
        doc_id: Uuid,
        file_url: &str,
        uploaded_by: &str,
    ) -> Result<Tender, TenderError> {
        self.mutate(id, "attach_document_file", |t, now| {
            checklist::attach_file(t, doc_id, file_url, uploaded_by, now)
        })
        .await
    }

    pub async fn remove_document(&self, id: Uuid, doc_id: Uuid) -> Result<Tender, TenderError> {
        self.mutate(id, "remove_document", |t, now| {
            checklist::remove_document(t, doc_id, now)
        })
        .await
    }

    /// Upload a file and attach it to a checklist entry.
    ///
    /// The upload runs before any write and without holding anything; a
    /// failed upload leaves the tender as it was.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_document_file(
        &self,
        id: Uuid,
        doc_id: Uuid,
        file_name: &str,
        bytes: Vec<u8>,
        uploaded_by: &str,
    ) -> Result<Tender, TenderError> {
        let tender = self.store.load(id).await?;
        checklist::ensure_document(&tender, doc_id)?;

        let stored = self
            .files
            .upload(file_name, bytes)
            .await
            .map_err(|e| TenderError::Upload(format!("{:#}", e)))?;

        self.attach_document_file(id, doc_id, &stored.url, uploaded_by)
            .await
    }

    #[instrument(skip(self))]
    pub async fn convert_to_site(&self, id: Uuid) -> Result<ConversionOutcome, TenderError> {
        self.conversion.convert(id).await
    }

    async fn mutate<F>(&self, id: Uuid, operation: &'static str, apply: F) -> Result<Tender, TenderError>
    where
        F: FnOnce(&Tender, DateTime<Utc>) -> Result<Tender, TenderError> + Send,
    {
        let current = self.store.load(id).await?;
        let next = apply(&current, Utc::now())?;
        next.check_invariants()?;

        let saved = self.store.save(&next, current.version).await?;
        info!(
            tender_id = %id,
            operation,
            status = %saved.status,
            version = saved.version,
            "Tender updated"
        );
        Ok(saved)
    }
}
