//! `leadsync-core`: lead record, field validation and business equality.
//!
//! Pure types crate: no IO, no network. Everything that decides whether two
//! leads are "the same" or whether a lead may be sent upstream lives here.

pub mod lead;
pub mod validation;

pub use lead::{business_equal, Lead, LeadSource};
pub use validation::{validate, Field, FieldError, ValidationError};
