//! Domain types and DTOs
//!
//! These types define the data structures for tenders and the site drafts they convert into.

pub mod sites;
pub mod tenders;

// Re-export commonly used types
pub use sites::*;
pub use tenders::*;
