//! Tender lifecycle and EMD tracking engine.
//!
//! - [`lifecycle`]: creation, edits and the submit/won/lost state machine
//! - [`emd`]: earnest money payment and return
//! - [`checklist`]: compliance document collection
//! - [`conversion`]: one-time conversion of a won tender into a site
//! - [`service`]: the versioned read-modify-write façade over the store

pub mod checklist;
pub mod conversion;
pub mod emd;
pub mod error;
pub mod lifecycle;
pub mod service;

pub use conversion::{ConversionOutcome, ConversionService};
pub use error::TenderError;
pub use service::TenderService;
