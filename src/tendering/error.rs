use thiserror::Error;
use uuid::Uuid;

use crate::domain::{TenderOperation, TenderStatus};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum TenderError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("cannot {op} a tender in status '{from}'")]
    InvalidTransition {
        from: TenderStatus,
        op: TenderOperation,
    },

    #[error("EMD has already been paid")]
    AlreadyPaid,

    #[error("EMD has not been paid")]
    NotPaid,

    #[error("EMD has already been returned")]
    AlreadyReturned,

    #[error("EMD has not been returned")]
    NotReturned,

    #[error("EMD return date is required")]
    MissingDate,

    #[error("only won tenders can be converted (status is '{status}')")]
    NotWon { status: TenderStatus },

    #[error("tender was already converted to site {site_id}")]
    AlreadyConverted { site_id: Uuid },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("tender {id} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict { id: Uuid, expected: u64, actual: u64 },

    #[error("{field} cannot be changed once the tender has left draft")]
    ImmutableField { field: &'static str },

    #[error("store error: {0}")]
    Store(String),

    #[error("site creation failed: {0}")]
    SiteCreation(String),

    #[error("file upload failed: {0}")]
    Upload(String),
}

impl TenderError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn tender_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "tender",
            id,
        }
    }

    pub fn document_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "document",
            id,
        }
    }

    /// Stable machine-readable code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::AlreadyPaid => "EMD_ALREADY_PAID",
            Self::NotPaid => "EMD_NOT_PAID",
            Self::AlreadyReturned => "EMD_ALREADY_RETURNED",
            Self::NotReturned => "EMD_NOT_RETURNED",
            Self::MissingDate => "EMD_MISSING_DATE",
            Self::NotWon { .. } => "TENDER_NOT_WON",
            Self::AlreadyConverted { .. } => "TENDER_ALREADY_CONVERTED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::ImmutableField { .. } => "IMMUTABLE_FIELD",
            Self::Store(_) => "STORE_ERROR",
            Self::SiteCreation(_) => "SITE_CREATION_FAILED",
            Self::Upload(_) => "UPLOAD_FAILED",
        }
    }
}

impl From<StoreError> for TenderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::tender_not_found(id),
            StoreError::VersionConflict {
                id,
                expected,
                actual,
            } => Self::Conflict {
                id,
                expected,
                actual,
            },
            StoreError::DuplicateTenderNumber { tender_number, .. } => Self::validation(
                "tender_number",
                format!("'{}' is already used in this organization", tender_number),
            ),
            StoreError::AlreadyConverted { site_id, .. } => Self::AlreadyConverted { site_id },
            StoreError::NotWon { status, .. } => Self::NotWon { status },
            other => Self::Store(other.to_string()),
        }
    }
}
