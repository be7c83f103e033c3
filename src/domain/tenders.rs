use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tendering::TenderError;

/// Tender status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TenderStatus {
    Draft,
    Submitted,
    #[serde(alias = "under-evaluation")]
    UnderEvaluation,
    Won,
    Lost,
    Closed,
}

impl Default for TenderStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl TenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::UnderEvaluation => "under_evaluation",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Closed => "closed",
        }
    }

    /// Statuses from which an award decision (won/lost) may be recorded.
    pub fn is_awaiting_decision(&self) -> bool {
        matches!(self, Self::Submitted | Self::UnderEvaluation)
    }
}

impl fmt::Display for TenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "submitted" => Ok(Self::Submitted),
            "under_evaluation" | "under-evaluation" => Ok(Self::UnderEvaluation),
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown tender status '{}'", other)),
        }
    }
}

/// Operations that move a tender through its lifecycle
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TenderOperation {
    Submit,
    MarkWon,
    MarkLost,
    ConvertToSite,
}

impl fmt::Display for TenderOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Submit => "submit",
            Self::MarkWon => "mark_won",
            Self::MarkLost => "mark_lost",
            Self::ConvertToSite => "convert_to_site",
        };
        f.write_str(name)
    }
}

/// Compliance document tracked on a tender's checklist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TenderDocument {
    pub id: Uuid,
    pub name: String,
    pub collected: bool,
    pub collected_date: Option<DateTime<Utc>>,
    pub file_url: Option<String>,
    pub uploaded_by: Option<String>,
}

impl TenderDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            collected: false,
            collected_date: None,
            file_url: None,
            uploaded_by: None,
        }
    }
}

/// Tender entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tender {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub tender_number: String,
    pub name: String,
    pub location: Option<String>,
    pub client: Option<String>,
    pub tender_amount: Decimal,
    pub emd_amount: Decimal,
    pub emd_paid: bool,
    pub emd_paid_date: Option<NaiveDate>,
    pub emd_paid_reference: Option<String>,
    pub emd_returned: bool,
    pub emd_return_date: Option<NaiveDate>,
    pub emd_return_reference: Option<String>,
    pub submission_date: Option<NaiveDate>,
    pub opening_date: Option<NaiveDate>,
    pub status: TenderStatus,
    pub document_checklist: Vec<TenderDocument>,
    pub converted_to_site_id: Option<Uuid>,
    pub conversion_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub description: Option<String>,
    pub evaluation_criteria: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Tender {
    /// EMD has been paid and not yet refunded.
    pub fn emd_outstanding(&self) -> bool {
        self.emd_paid && !self.emd_returned
    }

    pub fn document(&self, doc_id: Uuid) -> Option<&TenderDocument> {
        self.document_checklist.iter().find(|d| d.id == doc_id)
    }

    /// Re-checks every field-consistency rule a stored tender must satisfy.
    pub fn check_invariants(&self) -> Result<(), TenderError> {
        check_amounts(self.tender_amount, self.emd_amount)?;
        check_dates(self.submission_date, self.opening_date)?;

        if self.status != TenderStatus::Draft && self.submission_date.is_none() {
            return Err(TenderError::validation(
                "submission_date",
                "required once a tender leaves draft",
            ));
        }

        if self.emd_paid != self.emd_paid_date.is_some() {
            return Err(TenderError::validation(
                "emd_paid_date",
                "must be set exactly when EMD is paid",
            ));
        }
        if !self.emd_paid && self.emd_paid_reference.is_some() {
            return Err(TenderError::validation(
                "emd_paid_reference",
                "must be empty while EMD is unpaid",
            ));
        }
        if self.emd_returned && !self.emd_paid {
            return Err(TenderError::validation(
                "emd_returned",
                "EMD cannot be returned before it is paid",
            ));
        }
        if self.emd_returned != self.emd_return_date.is_some() {
            return Err(TenderError::validation(
                "emd_return_date",
                "must be set exactly when EMD is returned",
            ));
        }
        if !self.emd_returned && self.emd_return_reference.is_some() {
            return Err(TenderError::validation(
                "emd_return_reference",
                "must be empty while EMD is not returned",
            ));
        }

        if self.converted_to_site_id.is_some() && self.status != TenderStatus::Won {
            return Err(TenderError::validation(
                "converted_to_site_id",
                "only won tenders can be converted",
            ));
        }
        if self.converted_to_site_id.is_some() != self.conversion_date.is_some() {
            return Err(TenderError::validation(
                "conversion_date",
                "must be set exactly when the tender is converted",
            ));
        }

        if let Some(doc) = self
            .document_checklist
            .iter()
            .find(|d| d.collected != d.collected_date.is_some())
        {
            return Err(TenderError::validation(
                "document_checklist",
                format!("document {} has inconsistent collection state", doc.id),
            ));
        }

        Ok(())
    }
}

/// Decimal places an amount may carry; matches the `NUMERIC(18, 2)` columns.
pub const AMOUNT_SCALE: u32 = 2;

/// Amounts must stay below 10^16 to fit `NUMERIC(18, 2)`.
const AMOUNT_LIMIT: i64 = 10_000_000_000_000_000;

fn check_amount(field: &'static str, amount: Decimal) -> Result<(), TenderError> {
    if amount <= Decimal::ZERO {
        return Err(TenderError::validation(field, "must be greater than zero"));
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(TenderError::validation(
            field,
            format!("must have at most {} decimal places", AMOUNT_SCALE),
        ));
    }
    if amount >= Decimal::from(AMOUNT_LIMIT) {
        return Err(TenderError::validation(field, "must be less than 10^16"));
    }
    Ok(())
}

/// Amounts must be positive, storable exactly, and the EMD strictly below
/// the tender amount.
pub fn check_amounts(tender_amount: Decimal, emd_amount: Decimal) -> Result<(), TenderError> {
    check_amount("tender_amount", tender_amount)?;
    check_amount("emd_amount", emd_amount)?;
    if emd_amount >= tender_amount {
        return Err(TenderError::validation(
            "emd_amount",
            "must be strictly less than the tender amount",
        ));
    }
    Ok(())
}

/// The opening date, when known, falls strictly after submission.
pub fn check_dates(
    submission_date: Option<NaiveDate>,
    opening_date: Option<NaiveDate>,
) -> Result<(), TenderError> {
    if let (Some(submitted), Some(opening)) = (submission_date, opening_date) {
        if opening <= submitted {
            return Err(TenderError::validation(
                "opening_date",
                "must be after the submission date",
            ));
        }
    }
    Ok(())
}

/// Request DTO for creating a tender
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTenderRequest {
    pub organization_id: Uuid,
    #[serde(default)]
    pub tender_number: Option<String>,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
    pub tender_amount: Decimal,
    pub emd_amount: Decimal,
    #[serde(default)]
    pub submission_date: Option<NaiveDate>,
    #[serde(default)]
    pub opening_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: TenderStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub evaluation_criteria: Option<String>,
    /// Checklist entries to seed the tender with
    #[serde(default)]
    pub documents: Vec<String>,
}

/// Request DTO for updating a tender
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTenderRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub tender_amount: Option<Decimal>,
    #[serde(default)]
    pub emd_amount: Option<Decimal>,
    #[serde(default)]
    pub opening_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub evaluation_criteria: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitTenderRequest {
    #[serde(default)]
    pub submission_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkLostRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmdPaymentRequest {
    pub date: NaiveDate,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmdReturnRequest {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddDocumentRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachFileRequest {
    pub file_url: String,
    pub uploaded_by: String,
}

/// Query parameters for listing tenders
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenderListQuery {
    #[serde(default)]
    pub organization_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<TenderStatus>,
    #[serde(default)]
    pub emd_outstanding: Option<bool>,
    #[serde(default)]
    pub search: Option<String>,
}

/// Response DTO for tender
#[derive(Debug, Clone, Serialize)]
pub struct TenderResponse {
    #[serde(flatten)]
    pub tender: Tender,
    pub emd_outstanding: bool,
    pub documents_collected: usize,
    pub documents_total: usize,
}

impl From<Tender> for TenderResponse {
    fn from(t: Tender) -> Self {
        Self {
            emd_outstanding: t.emd_outstanding(),
            documents_collected: t.document_checklist.iter().filter(|d| d.collected).count(),
            documents_total: t.document_checklist.len(),
            tender: t,
        }
    }
}

/// Response DTO for a completed conversion
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResponse {
    pub site_id: Uuid,
    pub tender: TenderResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    #[test]
    fn emd_must_be_strictly_below_tender_amount() {
        assert!(check_amounts(dec(50_000_000), dec(900_000)).is_ok());
        assert!(check_amounts(dec(50_000_000), dec(50_000_000)).is_err());
        assert!(check_amounts(dec(0), dec(-1)).is_err());
    }

    #[test]
    fn amounts_must_fit_two_decimal_places() {
        let field = |r: Result<(), TenderError>| match r {
            Err(TenderError::Validation { field, .. }) => field,
            other => panic!("expected validation error, got {:?}", other),
        };

        assert_eq!(
            field(check_amounts(Decimal::new(100_004, 3), Decimal::new(100_001, 3))),
            "tender_amount"
        );
        assert_eq!(
            field(check_amounts(Decimal::new(10_000, 2), Decimal::new(5_0001, 3))),
            "emd_amount"
        );
        // Trailing zeros do not count against the scale.
        assert!(check_amounts(Decimal::new(1_000_500, 3), Decimal::new(2_000, 2)).is_ok());
        assert!(check_amounts(Decimal::new(100_25, 2), Decimal::new(10_05, 2)).is_ok());
    }

    #[test]
    fn amounts_must_fit_column_precision() {
        let limit = Decimal::from(AMOUNT_LIMIT);
        assert!(matches!(
            check_amounts(limit, dec(900_000)),
            Err(TenderError::Validation { field: "tender_amount", .. })
        ));
        assert!(check_amounts(limit - Decimal::new(1, 2), dec(900_000)).is_ok());
    }

    #[test]
    fn opening_date_must_follow_submission() {
        let submitted = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
        assert!(check_dates(Some(submitted), submitted.succ_opt()).is_ok());
        assert!(check_dates(Some(submitted), Some(submitted)).is_err());
        assert!(check_dates(None, Some(submitted)).is_ok());
    }

    #[test]
    fn status_accepts_hyphenated_alias() {
        let status: TenderStatus = serde_json::from_str("\"under-evaluation\"").unwrap();
        assert_eq!(status, TenderStatus::UnderEvaluation);
        assert_eq!("under_evaluation".parse::<TenderStatus>(), Ok(status));
    }
}
