//! Service layer modules for external integrations.
//!
//! Contains the site-creation client, upload storage and tender numbering.

pub mod numbering;
pub mod sites;
pub mod storage;

pub use numbering::TenderNumberGenerator;
pub use sites::{HttpSiteClient, InMemorySiteRegistry, SiteCreator};
pub use storage::{FileStorage, LocalFileStorage, StoredFile};
