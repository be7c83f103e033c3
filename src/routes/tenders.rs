//! Tender routes
//!
//! Lifecycle, EMD, document checklist and conversion endpoints.

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, Paginated, PaginationParams};
use crate::app::AppState;
use crate::domain::{
    AddDocumentRequest, AttachFileRequest, ConversionResponse, CreateTenderRequest,
    EmdPaymentRequest, EmdReturnRequest, MarkLostRequest, SubmitTenderRequest, TenderListQuery,
    TenderResponse, UpdateTenderRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::store::TenderFilter;

type TenderResult = ApiResult<DataResponse<TenderResponse>>;

fn respond(tender: crate::domain::Tender) -> DataResponse<TenderResponse> {
    DataResponse::new(tender.into())
}

/// POST /tenders
pub async fn create_tender(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTenderRequest>,
) -> ApiResult<Created<DataResponse<TenderResponse>>> {
    tracing::info!(
        organization_id = %req.organization_id,
        tender_name = %req.name,
        status = %req.status,
        "Creating tender"
    );

    let tender = state.tenders.create_tender(req).await?;
    Ok(Created(respond(tender)))
}

/// GET /tenders
pub async fn list_tenders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TenderListQuery>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Paginated<TenderResponse>> {
    let filter = TenderFilter::from(query);
    let tenders = state.tenders.list_tenders(&filter).await?;

    tracing::debug!(
        total = tenders.len(),
        page = pagination.page(),
        per_page = pagination.per_page(),
        "Listing tenders"
    );

    let items: Vec<TenderResponse> = tenders.into_iter().map(Into::into).collect();
    Ok(Paginated::from_all(items, &pagination))
}

/// GET /tenders/:tender_id
pub async fn get_tender(
    State(state): State<Arc<AppState>>,
    Path(tender_id): Path<Uuid>,
) -> TenderResult {
    Ok(respond(state.tenders.get_tender(tender_id).await?))
}

/// PATCH /tenders/:tender_id
pub async fn update_tender(
    State(state): State<Arc<AppState>>,
    Path(tender_id): Path<Uuid>,
    Json(req): Json<UpdateTenderRequest>,
) -> TenderResult {
    Ok(respond(state.tenders.update_tender(tender_id, req).await?))
}

/// POST /tenders/:tender_id/submit
pub async fn submit_tender(
    State(state): State<Arc<AppState>>,
    Path(tender_id): Path<Uuid>,
    body: Option<Json<SubmitTenderRequest>>,
) -> TenderResult {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    Ok(respond(
        state
            .tenders
            .submit_tender(tender_id, req.submission_date)
            .await?,
    ))
}

/// POST /tenders/:tender_id/won
pub async fn mark_won(
    State(state): State<Arc<AppState>>,
    Path(tender_id): Path<Uuid>,
) -> TenderResult {
    Ok(respond(state.tenders.mark_won(tender_id).await?))
}

/// POST /tenders/:tender_id/lost
pub async fn mark_lost(
    State(state): State<Arc<AppState>>,
    Path(tender_id): Path<Uuid>,
    Json(req): Json<MarkLostRequest>,
) -> TenderResult {
    Ok(respond(state.tenders.mark_lost(tender_id, &req.reason).await?))
}

/// POST /tenders/:tender_id/emd/payment
pub async fn record_emd_payment(
    State(state): State<Arc<AppState>>,
    Path(tender_id): Path<Uuid>,
    Json(req): Json<EmdPaymentRequest>,
) -> TenderResult {
    Ok(respond(
        state
            .tenders
            .record_emd_payment(tender_id, req.date, req.reference)
            .await?,
    ))
}

/// POST /tenders/:tender_id/emd/return
pub async fn mark_emd_returned(
    State(state): State<Arc<AppState>>,
    Path(tender_id): Path<Uuid>,
    Json(req): Json<EmdReturnRequest>,
) -> TenderResult {
    Ok(respond(
        state
            .tenders
            .mark_emd_returned(tender_id, req.date, req.reference)
            .await?,
    ))
}

/// DELETE /tenders/:tender_id/emd/return
pub async fn unmark_emd_returned(
    State(state): State<Arc<AppState>>,
    Path(tender_id): Path<Uuid>,
) -> TenderResult {
    Ok(respond(state.tenders.unmark_emd_returned(tender_id).await?))
}

/// POST /tenders/:tender_id/documents
pub async fn add_document(
    State(state): State<Arc<AppState>>,
    Path(tender_id): Path<Uuid>,
    Json(req): Json<AddDocumentRequest>,
) -> TenderResult {
    Ok(respond(state.tenders.add_document(tender_id, &req.name).await?))
}

/// POST /tenders/:tender_id/documents/:doc_id/toggle
pub async fn toggle_document(
    State(state): State<Arc<AppState>>,
    Path((tender_id, doc_id)): Path<(Uuid, Uuid)>,
) -> TenderResult {
    Ok(respond(state.tenders.toggle_document(tender_id, doc_id).await?))
}

/// PUT /tenders/:tender_id/documents/:doc_id/file
pub async fn attach_document_file(
    State(state): State<Arc<AppState>>,
    Path((tender_id, doc_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<AttachFileRequest>,
) -> TenderResult {
    Ok(respond(
        state
            .tenders
            .attach_document_file(tender_id, doc_id, &req.file_url, &req.uploaded_by)
            .await?,
    ))
}

/// POST /tenders/:tender_id/documents/:doc_id/upload
///
/// Multipart form with a `file` part and an `uploaded_by` text part.
pub async fn upload_document_file(
    State(state): State<Arc<AppState>>,
    Path((tender_id, doc_id)): Path<(Uuid, Uuid)>,
    mut multipart: Multipart,
) -> TenderResult {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut uploaded_by: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?;
                file = Some((file_name, bytes.to_vec()));
            }
            Some("uploaded_by") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid uploaded_by: {}", e)))?;
                uploaded_by = Some(value);
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| ApiError::bad_request("Missing 'file' part"))?;
    let uploaded_by =
        uploaded_by.ok_or_else(|| ApiError::bad_request("Missing 'uploaded_by' part"))?;

    tracing::info!(
        tender_id = %tender_id,
        doc_id = %doc_id,
        file_name = %file_name,
        size = bytes.len(),
        "Uploading tender document"
    );

    Ok(respond(
        state
            .tenders
            .upload_document_file(tender_id, doc_id, &file_name, bytes, &uploaded_by)
            .await?,
    ))
}

/// DELETE /tenders/:tender_id/documents/:doc_id
pub async fn remove_document(
    State(state): State<Arc<AppState>>,
    Path((tender_id, doc_id)): Path<(Uuid, Uuid)>,
) -> TenderResult {
    Ok(respond(state.tenders.remove_document(tender_id, doc_id).await?))
}

/// POST /tenders/:tender_id/convert
pub async fn convert_to_site(
    State(state): State<Arc<AppState>>,
    Path(tender_id): Path<Uuid>,
) -> ApiResult<Created<DataResponse<ConversionResponse>>> {
    let outcome = state.tenders.convert_to_site(tender_id).await?;
    Ok(Created(DataResponse::new(ConversionResponse {
        site_id: outcome.site_id,
        tender: outcome.tender.into(),
    })))
}
