//! Domain types for filingsync

pub mod fact;
pub mod quote;
pub mod record;

pub use fact::{CanonicalFact, DisclosureFact, FormType};
pub use quote::{AnchoredQuote, FilingAnchor, PriceQuote};
pub use record::{AlignedRecord, ReturnFlag};
