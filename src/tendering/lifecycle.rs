//! Tender status state machine
//!
//! ```text
//! draft ──submit──▶ submitted ─┬─mark_won──▶ won ──convert_to_site (once)
//!                              └─mark_lost─▶ lost
//! under_evaluation ─┬─mark_won──▶ won
//!                   └─mark_lost─▶ lost
//! ```
//!
//! Every function takes the current tender by reference and returns the next
//! version, so a rejected request never touches the stored record.

use chrono::{DateTime, NaiveDate, Utc};

use super::{emd, TenderError};
use crate::domain::{
    check_amounts, check_dates, CreateTenderRequest, Tender, TenderDocument, TenderOperation,
    TenderStatus, UpdateTenderRequest,
};

/// Build a new tender from a creation request.
pub fn create(
    req: CreateTenderRequest,
    tender_number: String,
    now: DateTime<Utc>,
) -> Result<Tender, TenderError> {
    let name = required_text("name", &req.name)?;
    let tender_number = required_text("tender_number", &tender_number)?;

    check_amounts(req.tender_amount, req.emd_amount)?;
    check_dates(req.submission_date, req.opening_date)?;

    match req.status {
        TenderStatus::Draft => {}
        TenderStatus::Submitted if req.submission_date.is_some() => {}
        TenderStatus::Submitted => {
            return Err(TenderError::validation(
                "submission_date",
                "required to create a submitted tender",
            ))
        }
        other => {
            return Err(TenderError::validation(
                "status",
                format!("tenders cannot be created as '{}'", other),
            ))
        }
    }

    let document_checklist = req
        .documents
        .iter()
        .map(|doc| required_text("documents", doc).map(TenderDocument::new))
        .collect::<Result<Vec<_>, _>>()?;

    let tender = Tender {
        id: uuid::Uuid::new_v4(),
        organization_id: req.organization_id,
        tender_number,
        name,
        location: optional_text(req.location),
        client: optional_text(req.client),
        tender_amount: req.tender_amount,
        emd_amount: req.emd_amount,
        emd_paid: false,
        emd_paid_date: None,
        emd_paid_reference: None,
        emd_returned: false,
        emd_return_date: None,
        emd_return_reference: None,
        submission_date: req.submission_date,
        opening_date: req.opening_date,
        status: req.status,
        document_checklist,
        converted_to_site_id: None,
        conversion_date: None,
        notes: optional_text(req.notes),
        description: optional_text(req.description),
        evaluation_criteria: optional_text(req.evaluation_criteria),
        created_at: now,
        updated_at: now,
        version: 1,
    };

    tender.check_invariants()?;
    Ok(tender)
}

/// `draft` → `submitted`. A date given here replaces the stored one.
pub fn submit(
    tender: &Tender,
    submission_date: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> Result<Tender, TenderError> {
    if tender.status != TenderStatus::Draft {
        return Err(TenderError::InvalidTransition {
            from: tender.status,
            op: TenderOperation::Submit,
        });
    }

    let submission_date = submission_date
        .or(tender.submission_date)
        .ok_or_else(|| {
            TenderError::validation("submission_date", "required to submit a tender")
        })?;

    check_amounts(tender.tender_amount, tender.emd_amount)?;
    check_dates(Some(submission_date), tender.opening_date)?;

    let mut next = tender.clone();
    next.submission_date = Some(submission_date);
    next.status = TenderStatus::Submitted;
    next.updated_at = now;
    Ok(next)
}

/// `submitted | under_evaluation` → `won`.
pub fn mark_won(tender: &Tender, now: DateTime<Utc>) -> Result<Tender, TenderError> {
    ensure_awaiting_decision(tender, TenderOperation::MarkWon)?;

    let mut next = tender.clone();
    next.status = TenderStatus::Won;
    next.updated_at = now;
    Ok(next)
}

/// `submitted | under_evaluation` → `lost`, recording the reason in the notes.
pub fn mark_lost(tender: &Tender, reason: &str, now: DateTime<Utc>) -> Result<Tender, TenderError> {
    ensure_awaiting_decision(tender, TenderOperation::MarkLost)?;

    let reason = reason.trim();
    if reason.is_empty() {
        return Err(TenderError::validation("reason", "a loss reason is required"));
    }

    let line = format!("Lost Reason: {}", reason);
    let notes = match tender.notes.as_deref() {
        Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, line),
        _ => line,
    };

    let mut next = tender.clone();
    next.status = TenderStatus::Lost;
    next.notes = Some(notes);
    next.updated_at = now;
    Ok(next)
}

/// Apply a partial edit. Amounts are only editable while the tender is a draft.
pub fn update(
    tender: &Tender,
    changes: &UpdateTenderRequest,
    now: DateTime<Utc>,
) -> Result<Tender, TenderError> {
    let mut next = tender.clone();

    if changes.tender_amount.is_some() || changes.emd_amount.is_some() {
        if changes.tender_amount.is_some() {
            emd::ensure_amounts_editable(tender, "tender_amount")?;
        }
        if changes.emd_amount.is_some() {
            emd::ensure_amounts_editable(tender, "emd_amount")?;
        }
        next.tender_amount = changes.tender_amount.unwrap_or(tender.tender_amount);
        next.emd_amount = changes.emd_amount.unwrap_or(tender.emd_amount);
        check_amounts(next.tender_amount, next.emd_amount)?;
    }

    if let Some(name) = &changes.name {
        next.name = required_text("name", name)?;
    }
    if let Some(opening_date) = changes.opening_date {
        check_dates(tender.submission_date, Some(opening_date))?;
        next.opening_date = Some(opening_date);
    }
    if let Some(location) = &changes.location {
        next.location = optional_text(Some(location.clone()));
    }
    if let Some(client) = &changes.client {
        next.client = optional_text(Some(client.clone()));
    }
    if let Some(notes) = &changes.notes {
        next.notes = optional_text(Some(notes.clone()));
    }
    if let Some(description) = &changes.description {
        next.description = optional_text(Some(description.clone()));
    }
    if let Some(criteria) = &changes.evaluation_criteria {
        next.evaluation_criteria = optional_text(Some(criteria.clone()));
    }

    next.updated_at = now;
    Ok(next)
}

fn ensure_awaiting_decision(tender: &Tender, op: TenderOperation) -> Result<(), TenderError> {
    if tender.status.is_awaiting_decision() {
        Ok(())
    } else {
        Err(TenderError::InvalidTransition {
            from: tender.status,
            op,
        })
    }
}

pub(crate) fn required_text(field: &'static str, value: &str) -> Result<String, TenderError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(TenderError::validation(field, "must not be empty"))
    } else {
        Ok(trimmed.to_string())
    }
}

pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn request(status: TenderStatus) -> CreateTenderRequest {
        CreateTenderRequest {
            organization_id: Uuid::new_v4(),
            tender_number: None,
            name: "Ring Road Phase II".to_string(),
            location: Some("Pune".to_string()),
            client: Some("PWD Maharashtra".to_string()),
            tender_amount: Decimal::from(45_000_000),
            emd_amount: Decimal::from(900_000),
            submission_date: None,
            opening_date: None,
            status,
            notes: None,
            description: None,
            evaluation_criteria: None,
            documents: vec!["PAN Card".to_string(), "GST Certificate".to_string()],
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn draft() -> Tender {
        create(request(TenderStatus::Draft), "TND-2024-0001".into(), Utc::now()).unwrap()
    }

    fn with_status(status: TenderStatus) -> Tender {
        let mut tender = draft();
        tender.status = status;
        tender.submission_date = Some(date(2024, 1, 20));
        tender
    }

    #[test]
    fn create_seeds_checklist_and_starts_at_version_one() {
        let tender = draft();
        assert_eq!(tender.status, TenderStatus::Draft);
        assert_eq!(tender.version, 1);
        assert_eq!(tender.document_checklist.len(), 2);
        assert!(tender.document_checklist.iter().all(|d| !d.collected));
    }

    #[test]
    fn create_rejects_emd_equal_to_tender_amount() {
        let mut req = request(TenderStatus::Draft);
        req.tender_amount = Decimal::from(50_000_000);
        req.emd_amount = Decimal::from(50_000_000);

        let err = create(req, "TND-2024-0002".into(), Utc::now()).unwrap_err();
        assert!(matches!(err, TenderError::Validation { field: "emd_amount", .. }));
    }

    #[test]
    fn create_submitted_requires_submission_date() {
        let err = create(request(TenderStatus::Submitted), "TND-1".into(), Utc::now()).unwrap_err();
        assert!(matches!(err, TenderError::Validation { field: "submission_date", .. }));

        let mut req = request(TenderStatus::Submitted);
        req.submission_date = Some(date(2024, 1, 20));
        assert!(create(req, "TND-1".into(), Utc::now()).is_ok());
    }

    #[test]
    fn create_rejects_terminal_initial_status() {
        let err = create(request(TenderStatus::Won), "TND-1".into(), Utc::now()).unwrap_err();
        assert!(matches!(err, TenderError::Validation { field: "status", .. }));
    }

    #[test]
    fn submit_uses_given_date_and_checks_opening_date() {
        let mut tender = draft();
        tender.opening_date = Some(date(2024, 1, 25));

        let submitted = submit(&tender, Some(date(2024, 1, 20)), Utc::now()).unwrap();
        assert_eq!(submitted.status, TenderStatus::Submitted);
        assert_eq!(submitted.submission_date, Some(date(2024, 1, 20)));

        let err = submit(&tender, Some(date(2024, 1, 25)), Utc::now()).unwrap_err();
        assert!(matches!(err, TenderError::Validation { field: "opening_date", .. }));
    }

    #[test]
    fn submit_without_any_date_fails() {
        let err = submit(&draft(), None, Utc::now()).unwrap_err();
        assert!(matches!(err, TenderError::Validation { field: "submission_date", .. }));
    }

    #[test]
    fn transition_table_is_exhaustive() {
        use TenderStatus::*;

        for status in [Draft, Submitted, UnderEvaluation, Won, Lost, Closed] {
            let tender = with_status(status);
            let now = Utc::now();

            assert_eq!(submit(&tender, None, now).is_ok(), status == Draft, "{status}");
            assert_eq!(
                mark_won(&tender, now).is_ok(),
                status.is_awaiting_decision(),
                "{status}"
            );
            assert_eq!(
                mark_lost(&tender, "price", now).is_ok(),
                status.is_awaiting_decision(),
                "{status}"
            );

            if status != Draft {
                assert!(matches!(
                    submit(&tender, None, now),
                    Err(TenderError::InvalidTransition { op: TenderOperation::Submit, .. })
                ));
            }
            if !status.is_awaiting_decision() {
                assert!(matches!(
                    mark_won(&tender, now),
                    Err(TenderError::InvalidTransition { from, .. }) if from == status
                ));
            }
        }
    }

    #[test]
    fn mark_lost_appends_reason_to_existing_notes() {
        let mut tender = with_status(TenderStatus::Submitted);
        tender.notes = Some("Site visit done".to_string());
        tender.opening_date = Some(date(2024, 2, 1));

        let lost = mark_lost(&tender, "Higher competing bid", Utc::now()).unwrap();
        assert_eq!(lost.status, TenderStatus::Lost);
        assert_eq!(
            lost.notes.as_deref(),
            Some("Site visit done\nLost Reason: Higher competing bid")
        );
        assert_eq!(lost.opening_date, tender.opening_date);
    }

    #[test]
    fn mark_lost_requires_reason() {
        let tender = with_status(TenderStatus::UnderEvaluation);
        let err = mark_lost(&tender, "   ", Utc::now()).unwrap_err();
        assert!(matches!(err, TenderError::Validation { field: "reason", .. }));
    }

    #[test]
    fn amounts_are_frozen_after_draft() {
        let changes = UpdateTenderRequest {
            emd_amount: Some(Decimal::from(1_000_000)),
            ..Default::default()
        };
        assert!(update(&draft(), &changes, Utc::now()).is_ok());

        let err = update(&with_status(TenderStatus::Submitted), &changes, Utc::now()).unwrap_err();
        assert!(matches!(err, TenderError::ImmutableField { field: "emd_amount" }));
    }

    #[test]
    fn update_keeps_amount_invariant() {
        let changes = UpdateTenderRequest {
            tender_amount: Some(Decimal::from(500_000)),
            ..Default::default()
        };
        let err = update(&draft(), &changes, Utc::now()).unwrap_err();
        assert!(matches!(err, TenderError::Validation { field: "emd_amount", .. }));
    }
}
