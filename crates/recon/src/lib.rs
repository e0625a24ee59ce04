//! `leadsync-recon`: lead reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded leads and a [`LeadApi`], returns
//! one tagged [`Outcome`] per lead plus batch counters. No CLI or file IO.
//!
//! [`LeadApi`]: leadsync_hub_client::LeadApi

pub mod batch;
pub mod dedup;
pub mod engine;
pub mod model;

pub use batch::{BatchOptions, BatchRunner};
pub use dedup::{find_duplicates, DuplicatePolicy};
pub use engine::Reconciler;
pub use model::{BatchReport, LeadReport, Outcome, Tally};
