use anyhow::Result;
use std::sync::Arc;

use tenderdesk_backend::{
    app, config, db, logging,
    services::{
        FileStorage, HttpSiteClient, InMemorySiteRegistry, LocalFileStorage, SiteCreator,
        TenderNumberGenerator,
    },
    store::{InMemoryTenderStore, PgTenderStore, TenderStore},
    tendering::TenderService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = config::Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting tender desk backend"
    );

    // Tender store
    let store: Arc<dyn TenderStore> = match &settings.database_url {
        Some(url) => {
            let pool = db::create_pool(url, settings.database_max_connections).await?;
            Arc::new(PgTenderStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set - tenders are kept in memory only");
            Arc::new(InMemoryTenderStore::new())
        }
    };

    // Site-creation collaborator
    let sites: Arc<dyn SiteCreator> = match &settings.site_service_url {
        Some(url) => Arc::new(HttpSiteClient::new(
            url,
            settings.site_service_token.clone(),
            settings.site_service_timeout_seconds,
        )?),
        None => {
            tracing::warn!("SITE_SERVICE_URL not set - converted sites are registered in memory");
            Arc::new(InMemorySiteRegistry::new())
        }
    };

    let files: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(
        &settings.upload_dir,
        &settings.upload_public_base_url,
    ));

    let tenders = TenderService::new(
        store,
        sites,
        files,
        TenderNumberGenerator::new(settings.tender_number_prefix.clone()),
    );
    let existing = tenders.warm_numbering().await?;
    tracing::info!(existing, "Tender numbering initialized");

    // Create application state
    let state = app::AppState::new(settings.clone(), tenders);

    // Build application
    let app = app::create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
