//! Earnest-money-deposit tracking.
//!
//! Payment and return are one-way flags guarded against repetition; only a
//! return may be undone.

use chrono::{DateTime, NaiveDate, Utc};

use super::lifecycle::optional_text;
use super::TenderError;
use crate::domain::{Tender, TenderStatus};

pub fn record_payment(
    tender: &Tender,
    date: NaiveDate,
    reference: Option<String>,
    now: DateTime<Utc>,
) -> Result<Tender, TenderError> {
    if tender.emd_paid {
        return Err(TenderError::AlreadyPaid);
    }

    let mut next = tender.clone();
    next.emd_paid = true;
    next.emd_paid_date = Some(date);
    next.emd_paid_reference = optional_text(reference);
    next.updated_at = now;
    Ok(next)
}

pub fn mark_returned(
    tender: &Tender,
    date: Option<NaiveDate>,
    reference: Option<String>,
    now: DateTime<Utc>,
) -> Result<Tender, TenderError> {
    if !tender.emd_paid {
        return Err(TenderError::NotPaid);
    }
    if tender.emd_returned {
        return Err(TenderError::AlreadyReturned);
    }
    let date = date.ok_or(TenderError::MissingDate)?;

    let mut next = tender.clone();
    next.emd_returned = true;
    next.emd_return_date = Some(date);
    next.emd_return_reference = optional_text(reference);
    next.updated_at = now;
    Ok(next)
}

pub fn unmark_returned(tender: &Tender, now: DateTime<Utc>) -> Result<Tender, TenderError> {
    if !tender.emd_returned {
        return Err(TenderError::NotReturned);
    }

    let mut next = tender.clone();
    next.emd_returned = false;
    next.emd_return_date = None;
    next.emd_return_reference = None;
    next.updated_at = now;
    Ok(next)
}

/// Tender and EMD amounts are fixed once the bid leaves draft.
pub fn ensure_amounts_editable(tender: &Tender, field: &'static str) -> Result<(), TenderError> {
    if tender.status == TenderStatus::Draft {
        Ok(())
    } else {
        Err(TenderError::ImmutableField { field })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CreateTenderRequest;
    use crate::tendering::lifecycle;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tender() -> Tender {
        let req = CreateTenderRequest {
            organization_id: Uuid::new_v4(),
            tender_number: None,
            name: "Water Treatment Plant".to_string(),
            location: None,
            client: None,
            tender_amount: Decimal::from(12_000_000),
            emd_amount: Decimal::from(240_000),
            submission_date: Some(date(2024, 1, 5)),
            opening_date: None,
            status: TenderStatus::Submitted,
            notes: None,
            description: None,
            evaluation_criteria: None,
            documents: Vec::new(),
        };
        lifecycle::create(req, "TND-2024-0007".into(), Utc::now()).unwrap()
    }

    #[test]
    fn payment_then_return_then_second_return_fails() {
        let now = Utc::now();
        let paid = record_payment(&tender(), date(2024, 1, 10), Some("EMD/2024/001".into()), now)
            .unwrap();
        assert!(paid.emd_paid);
        assert_eq!(paid.emd_paid_reference.as_deref(), Some("EMD/2024/001"));
        paid.check_invariants().unwrap();

        let returned =
            mark_returned(&paid, Some(date(2024, 3, 15)), Some("REMD/2024/001".into()), now)
                .unwrap();
        assert!(returned.emd_paid && returned.emd_returned);
        assert_eq!(returned.emd_return_date, Some(date(2024, 3, 15)));
        returned.check_invariants().unwrap();

        let err = mark_returned(&returned, Some(date(2024, 3, 16)), None, now).unwrap_err();
        assert!(matches!(err, TenderError::AlreadyReturned));
    }

    #[test]
    fn double_payment_is_rejected() {
        let now = Utc::now();
        let paid = record_payment(&tender(), date(2024, 1, 10), None, now).unwrap();
        assert_eq!(paid.emd_paid_reference, None);
        assert!(matches!(
            record_payment(&paid, date(2024, 1, 11), None, now),
            Err(TenderError::AlreadyPaid)
        ));
    }

    #[test]
    fn return_checks_run_in_order() {
        let now = Utc::now();
        let unpaid = tender();
        assert!(matches!(
            mark_returned(&unpaid, None, None, now),
            Err(TenderError::NotPaid)
        ));

        let paid = record_payment(&unpaid, date(2024, 1, 10), None, now).unwrap();
        assert!(matches!(
            mark_returned(&paid, None, Some("REMD".into()), now),
            Err(TenderError::MissingDate)
        ));
    }

    #[test]
    fn unmark_clears_return_fields_only() {
        let now = Utc::now();
        let paid = record_payment(&tender(), date(2024, 1, 10), Some("EMD/1".into()), now).unwrap();
        assert!(matches!(unmark_returned(&paid, now), Err(TenderError::NotReturned)));

        let returned = mark_returned(&paid, Some(date(2024, 2, 1)), Some("R/1".into()), now).unwrap();
        let reverted = unmark_returned(&returned, now).unwrap();
        assert!(reverted.emd_paid);
        assert!(!reverted.emd_returned);
        assert_eq!(reverted.emd_return_date, None);
        assert_eq!(reverted.emd_return_reference, None);
        assert_eq!(reverted.emd_paid_reference.as_deref(), Some("EMD/1"));
    }

    #[test]
    fn blank_reference_is_stored_as_none() {
        let paid = record_payment(&tender(), date(2024, 1, 10), Some("  ".into()), Utc::now())
            .unwrap();
        assert_eq!(paid.emd_paid_reference, None);
    }
}
