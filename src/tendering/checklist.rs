//! Compliance document checklist attached to each tender.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::lifecycle::required_text;
use super::TenderError;
use crate::domain::{Tender, TenderDocument};

pub fn add_document(tender: &Tender, name: &str, now: DateTime<Utc>) -> Result<Tender, TenderError> {
    let name = required_text("name", name)?;

    let mut next = tender.clone();
    next.document_checklist.push(TenderDocument::new(name));
    next.updated_at = now;
    Ok(next)
}

/// Flip the collected flag, stamping or clearing the collection time with it.
pub fn toggle_collected(
    tender: &Tender,
    doc_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Tender, TenderError> {
    let mut next = tender.clone();
    let doc = document_mut(&mut next, doc_id)?;

    doc.collected = !doc.collected;
    doc.collected_date = doc.collected.then_some(now);

    next.updated_at = now;
    Ok(next)
}

/// Record the result of an external upload. Collection state is left alone.
pub fn attach_file(
    tender: &Tender,
    doc_id: Uuid,
    file_url: &str,
    uploaded_by: &str,
    now: DateTime<Utc>,
) -> Result<Tender, TenderError> {
    let file_url = required_text("file_url", file_url)?;
    let uploaded_by = required_text("uploaded_by", uploaded_by)?;

    let mut next = tender.clone();
    let doc = document_mut(&mut next, doc_id)?;
    doc.file_url = Some(file_url);
    doc.uploaded_by = Some(uploaded_by);

    next.updated_at = now;
    Ok(next)
}

pub fn remove_document(
    tender: &Tender,
    doc_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Tender, TenderError> {
    ensure_document(tender, doc_id)?;

    let mut next = tender.clone();
    next.document_checklist.retain(|d| d.id != doc_id);
    next.updated_at = now;
    Ok(next)
}

pub fn ensure_document(tender: &Tender, doc_id: Uuid) -> Result<&TenderDocument, TenderError> {
    tender
        .document(doc_id)
        .ok_or_else(|| TenderError::document_not_found(doc_id))
}

fn document_mut(tender: &mut Tender, doc_id: Uuid) -> Result<&mut TenderDocument, TenderError> {
    tender
        .document_checklist
        .iter_mut()
        .find(|d| d.id == doc_id)
        .ok_or_else(|| TenderError::document_not_found(doc_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CreateTenderRequest, TenderStatus};
    use crate::tendering::lifecycle;
    use rust_decimal::Decimal;

    fn tender() -> Tender {
        let req = CreateTenderRequest {
            organization_id: Uuid::new_v4(),
            tender_number: None,
            name: "Bridge Retrofit".to_string(),
            location: None,
            client: None,
            tender_amount: Decimal::from(8_000_000),
            emd_amount: Decimal::from(160_000),
            submission_date: None,
            opening_date: None,
            status: TenderStatus::Draft,
            notes: None,
            description: None,
            evaluation_criteria: None,
            documents: vec!["Solvency Certificate".to_string()],
        };
        lifecycle::create(req, "TND-2024-0011".into(), Utc::now()).unwrap()
    }

    #[test]
    fn toggle_twice_resets_collection_state() {
        let tender = tender();
        let doc_id = tender.document_checklist[0].id;

        let collected = toggle_collected(&tender, doc_id, Utc::now()).unwrap();
        let doc = collected.document(doc_id).unwrap();
        assert!(doc.collected);
        assert!(doc.collected_date.is_some());

        let reset = toggle_collected(&collected, doc_id, Utc::now()).unwrap();
        let doc = reset.document(doc_id).unwrap();
        assert!(!doc.collected);
        assert_eq!(doc.collected_date, None);
    }

    #[test]
    fn unknown_document_is_not_found() {
        let missing = Uuid::new_v4();
        let err = toggle_collected(&tender(), missing, Utc::now()).unwrap_err();
        assert!(matches!(err, TenderError::NotFound { entity: "document", id } if id == missing));
    }

    #[test]
    fn duplicate_names_get_distinct_ids() {
        let tender = tender();
        let once = add_document(&tender, "Solvency Certificate", Utc::now()).unwrap();
        let twice = add_document(&once, "Solvency Certificate", Utc::now()).unwrap();

        assert_eq!(twice.document_checklist.len(), 3);
        let ids: std::collections::HashSet<_> =
            twice.document_checklist.iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn attach_file_preserves_collected_flag() {
        let tender = tender();
        let doc_id = tender.document_checklist[0].id;

        let attached = attach_file(&tender, doc_id, "/files/solvency.pdf", "asha", Utc::now()).unwrap();
        let doc = attached.document(doc_id).unwrap();
        assert_eq!(doc.file_url.as_deref(), Some("/files/solvency.pdf"));
        assert_eq!(doc.uploaded_by.as_deref(), Some("asha"));
        assert!(!doc.collected);
    }

    #[test]
    fn remove_document_drops_entry() {
        let tender = tender();
        let doc_id = tender.document_checklist[0].id;
        let removed = remove_document(&tender, doc_id, Utc::now()).unwrap();
        assert!(removed.document_checklist.is_empty());
        assert!(remove_document(&removed, doc_id, Utc::now()).is_err());
    }
}
