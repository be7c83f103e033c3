mod common;

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{date, draft_request, service_with};
use tenderdesk_backend::domain::{CreatedSite, SiteDraft};
use tenderdesk_backend::services::{InMemorySiteRegistry, LocalFileStorage, SiteCreator};
use tenderdesk_backend::store::{InMemoryTenderStore, TenderStore};
use tenderdesk_backend::tendering::{TenderError, TenderService};

/// Site service that yields a few times before answering, so racing
/// conversions overlap inside the call.
#[derive(Default)]
struct SlowSites {
    registry: InMemorySiteRegistry,
    calls: AtomicUsize,
}

#[async_trait]
impl SiteCreator for SlowSites {
    async fn create_site(&self, draft: &SiteDraft) -> anyhow::Result<CreatedSite> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        self.registry.create_site(draft).await
    }
}

async fn won_tender(service: &TenderService) -> uuid::Uuid {
    let tender = service.create_tender(draft_request()).await.expect("create");
    service
        .submit_tender(tender.id, Some(date(2024, 1, 20)))
        .await
        .expect("submit");
    service.mark_won(tender.id).await.expect("won");
    tender.id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_conversions_create_exactly_one_site() {
    let store = Arc::new(InMemoryTenderStore::new());
    let sites = Arc::new(SlowSites::default());
    let service = Arc::new(service_with(
        store.clone(),
        sites.clone(),
        Arc::new(LocalFileStorage::new(std::env::temp_dir(), "/files")),
    ));
    let id = won_tender(&service).await;

    let attempts = (0..8).map(|_| {
        let service = service.clone();
        tokio::spawn(async move { service.convert_to_site(id).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let mut observed = HashSet::new();
    let mut winners = 0;
    for result in results {
        match result {
            Ok(outcome) => {
                winners += 1;
                observed.insert(outcome.site_id);
            }
            Err(TenderError::AlreadyConverted { site_id }) => {
                observed.insert(site_id);
            }
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(observed.len(), 1, "every caller sees the same site");
    assert_eq!(sites.calls.load(Ordering::SeqCst), 1);
    assert_eq!(sites.registry.sites().len(), 1);

    let stored = store.load(id).await.unwrap();
    assert_eq!(stored.converted_to_site_id, observed.into_iter().next());
    stored.check_invariants().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn conversions_of_different_tenders_do_not_block_each_other() {
    let store = Arc::new(InMemoryTenderStore::new());
    let sites = Arc::new(SlowSites::default());
    let service = Arc::new(service_with(
        store.clone(),
        sites.clone(),
        Arc::new(LocalFileStorage::new(std::env::temp_dir(), "/files")),
    ));

    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(won_tender(&service).await);
    }

    let attempts = ids.iter().copied().map(|id| {
        let service = service.clone();
        tokio::spawn(async move { service.convert_to_site(id).await })
    });
    for joined in join_all(attempts).await {
        joined.expect("task panicked").expect("conversion succeeds");
    }

    assert_eq!(sites.registry.sites().len(), 4);
}
