//! Lead system-of-record client.
//!
//! This crate is the single source of truth for the lead wire contract:
//! lookup by email, create, update. The reconciliation engine only sees the
//! [`LeadApi`] trait; [`HttpLeadApi`] is the production adapter and
//! [`InMemoryLeadApi`] the in-process stand-in used by tests.
//!
//! Blocking reqwest (no Tokio runtime required). Only HTTP 429 is retried.

mod api;
mod client;
mod memory;
mod retry;

pub use api::{ApiError, LeadApi, Lookup, NetworkErrorKind};
pub use client::{HttpLeadApi, DEFAULT_TIMEOUT, USER_AGENT};
pub use memory::{Call, InMemoryLeadApi, Op};
pub use retry::{
    AttemptError, CancelToken, CancellableDelay, Cancelled, Delay, RecordingDelay, RetryPolicy,
};
