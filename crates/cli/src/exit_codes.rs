//! CLI Exit Code Registry
//!
//! Single source of truth for `leadsync` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                          |
//! |------|--------------------------------------------------|
//! | 0    | Batch ran (per-lead failures are in the report)  |
//! | 1    | General error (HTTP client could not be built)   |
//! | 2    | Usage error (bad arguments)                      |
//! | 3    | Lead source unreadable                           |
//! | 4    | Lead source malformed                            |
//! | 5    | Invalid configuration                            |
//!
//! Per-lead outcomes (validation, API, create, update errors) never change
//! the exit code.

/// Success - the batch ran to completion.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
/// clap exits with this code on its own parse failures.
pub const EXIT_USAGE: u8 = 2;

/// Source file missing or unreadable.
pub const EXIT_SOURCE_IO: u8 = 3;

/// Source file readable but not valid lead CSV.
pub const EXIT_SOURCE_FORMAT: u8 = 4;

/// Config file unreadable, malformed, or holding invalid values.
pub const EXIT_CONFIG: u8 = 5;
