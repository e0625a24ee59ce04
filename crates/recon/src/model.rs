use std::fmt;

use serde::{Serialize, Serializer};

use leadsync_core::{Lead, ValidationError};
use leadsync_hub_client::ApiError;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Tagged result of reconciling one lead. One variant per action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// No remote record existed; `created` is what the remote system stored.
    Create { created: Lead },
    /// Remote record differed; `updated` is the post-update remote record.
    Update { updated: Lead },
    /// Remote record is business-equal; nothing sent.
    Skip,
    /// Lead failed local validation; remote never contacted.
    ValidationError {
        #[serde(serialize_with = "as_display")]
        error: ValidationError,
    },
    /// Lookup failed.
    ApiError {
        #[serde(serialize_with = "as_display")]
        error: ApiError,
    },
    CreateError {
        #[serde(serialize_with = "as_display")]
        error: ApiError,
    },
    UpdateError {
        #[serde(serialize_with = "as_display")]
        error: ApiError,
    },
    /// Exact repeat of an earlier row in the batch (0-based index).
    #[serde(rename_all = "camelCase")]
    Duplicate { first_index: usize },
}

impl Outcome {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Create { .. } => "CREATE",
            Self::Update { .. } => "UPDATE",
            Self::Skip => "SKIP",
            Self::ValidationError { .. } => "VALIDATION_ERROR",
            Self::ApiError { .. } => "API_ERROR",
            Self::CreateError { .. } => "CREATE_ERROR",
            Self::UpdateError { .. } => "UPDATE_ERROR",
            Self::Duplicate { .. } => "DUPLICATE",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::ValidationError { .. }
                | Self::ApiError { .. }
                | Self::CreateError { .. }
                | Self::UpdateError { .. }
        )
    }

    /// Lead returned by the remote system, for `Create` / `Update`.
    pub fn result_lead(&self) -> Option<&Lead> {
        match self {
            Self::Create { created } => Some(created),
            Self::Update { updated } => Some(updated),
            _ => None,
        }
    }

    /// Error detail as text, for the error variants.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::ValidationError { error } => Some(error.to_string()),
            Self::ApiError { error } | Self::CreateError { error } | Self::UpdateError { error } => {
                Some(error.to_string())
            }
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

fn as_display<T: fmt::Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Outcome for one input lead, with its position in the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadReport {
    pub index: usize,
    pub lead: Lead,
    pub outcome: Outcome,
}

/// Created / updated / skipped / errored counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl Tally {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Create { .. } => self.created += 1,
            Outcome::Update { .. } => self.updated += 1,
            Outcome::Skip | Outcome::Duplicate { .. } => self.skipped += 1,
            Outcome::ValidationError { .. }
            | Outcome::ApiError { .. }
            | Outcome::CreateError { .. }
            | Outcome::UpdateError { .. } => self.errored += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.skipped + self.errored
    }
}

/// Final batch summary. `leads` is in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    #[serde(flatten)]
    pub tally: Tally,
    pub leads: Vec<LeadReport>,
}

impl BatchReport {
    /// Build from per-lead reports (any order); re-sorts by input index.
    pub fn from_reports(mut leads: Vec<LeadReport>) -> Self {
        leads.sort_by_key(|r| r.index);
        let mut tally = Tally::default();
        for report in &leads {
            tally.record(&report.outcome);
        }
        Self { total: leads.len(), tally, leads }
    }

    pub fn created(&self) -> usize {
        self.tally.created
    }

    pub fn updated(&self) -> usize {
        self.tally.updated
    }

    pub fn skipped(&self) -> usize {
        self.tally.skipped
    }

    pub fn errored(&self) -> usize {
        self.tally.errored
    }
}
