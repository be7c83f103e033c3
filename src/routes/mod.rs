pub mod health;
pub mod tenders;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        // Tenders
        .route(
            "/tenders",
            post(tenders::create_tender).get(tenders::list_tenders),
        )
        .route(
            "/tenders/:tender_id",
            get(tenders::get_tender).patch(tenders::update_tender),
        )
        // Lifecycle
        .route("/tenders/:tender_id/submit", post(tenders::submit_tender))
        .route("/tenders/:tender_id/won", post(tenders::mark_won))
        .route("/tenders/:tender_id/lost", post(tenders::mark_lost))
        // EMD
        .route(
            "/tenders/:tender_id/emd/payment",
            post(tenders::record_emd_payment),
        )
        .route(
            "/tenders/:tender_id/emd/return",
            post(tenders::mark_emd_returned).delete(tenders::unmark_emd_returned),
        )
        // Document checklist
        .route("/tenders/:tender_id/documents", post(tenders::add_document))
        .route(
            "/tenders/:tender_id/documents/:doc_id",
            axum::routing::delete(tenders::remove_document),
        )
        .route(
            "/tenders/:tender_id/documents/:doc_id/toggle",
            post(tenders::toggle_document),
        )
        .route(
            "/tenders/:tender_id/documents/:doc_id/file",
            put(tenders::attach_document_file),
        )
        .route(
            "/tenders/:tender_id/documents/:doc_id/upload",
            post(tenders::upload_document_file),
        )
        // Conversion
        .route("/tenders/:tender_id/convert", post(tenders::convert_to_site))
}
