use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Project site payload built from a won tender
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteDraft {
    pub source_tender_id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub budget: Decimal,
    pub client: Option<String>,
}

/// Identifier handed back by the site service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedSite {
    #[serde(alias = "id")]
    pub site_id: Uuid,
}
