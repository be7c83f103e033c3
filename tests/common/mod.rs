#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use tenderdesk_backend::domain::{CreateTenderRequest, TenderStatus};
use tenderdesk_backend::services::{
    FileStorage, InMemorySiteRegistry, LocalFileStorage, SiteCreator, TenderNumberGenerator,
};
use tenderdesk_backend::store::{InMemoryTenderStore, TenderStore};
use tenderdesk_backend::tendering::TenderService;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn draft_request() -> CreateTenderRequest {
    CreateTenderRequest {
        organization_id: Uuid::new_v4(),
        tender_number: None,
        name: "NH-48 Flyover Package 3".to_string(),
        location: Some("Gurugram".to_string()),
        client: Some("NHAI".to_string()),
        tender_amount: Decimal::from(45_000_000),
        emd_amount: Decimal::from(900_000),
        submission_date: None,
        opening_date: None,
        status: TenderStatus::Draft,
        notes: None,
        description: Some("Four-lane elevated corridor".to_string()),
        evaluation_criteria: Some("L1 with technical qualification".to_string()),
        documents: vec![
            "PAN Card".to_string(),
            "GST Registration".to_string(),
            "Experience Certificate".to_string(),
        ],
    }
}

pub struct Harness {
    pub service: TenderService,
    pub store: Arc<InMemoryTenderStore>,
    pub sites: Arc<InMemorySiteRegistry>,
}

pub fn harness() -> Harness {
    harness_with_sites(Arc::new(InMemorySiteRegistry::new()))
}

pub fn harness_with_sites(sites: Arc<InMemorySiteRegistry>) -> Harness {
    let store = Arc::new(InMemoryTenderStore::new());
    let files: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(
        std::env::temp_dir().join("tenderdesk-tests"),
        "/files",
    ));
    let service = TenderService::new(
        store.clone(),
        sites.clone(),
        files,
        TenderNumberGenerator::default(),
    );
    Harness {
        service,
        store,
        sites,
    }
}

pub fn service_with(
    store: Arc<dyn TenderStore>,
    sites: Arc<dyn SiteCreator>,
    files: Arc<dyn FileStorage>,
) -> TenderService {
    TenderService::new(store, sites, files, TenderNumberGenerator::default())
}
