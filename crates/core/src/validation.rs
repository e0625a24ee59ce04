//! Field-level lead validation.
//!
//! Rules are independent and exhaustive: every violated rule is collected so
//! a caller sees all problems in one pass.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lead::{Lead, LeadSource};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern is a valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Email,
    Company,
    Source,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Email => write!(f, "email"),
            Self::Company => write!(f, "company"),
            Self::Source => write!(f, "source"),
        }
    }
}

/// A single violated rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    fn new(field: Field, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Aggregated validation failure. Displays as the rule messages joined by `"; "`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", join_messages(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn has(&self, field: Field) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

fn join_messages(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Run every rule against `lead`. An empty result means the lead is valid.
pub fn validate(lead: &Lead) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if lead.name.trim().is_empty() {
        errors.push(FieldError::new(Field::Name, "name is required"));
    }

    if !is_valid_email(&lead.email) {
        errors.push(FieldError::new(Field::Email, "valid email is required"));
    }

    if lead.company.trim().is_empty() {
        errors.push(FieldError::new(Field::Company, "company is required"));
    }

    if lead.lead_source().is_none() {
        errors.push(FieldError::new(
            Field::Source,
            format!("source must be one of: {}", LeadSource::allowed_list()),
        ));
    }

    errors
}

impl Lead {
    /// `Ok(())` when every rule passes, otherwise all violations at once.
    pub fn check(&self) -> Result<(), ValidationError> {
        let errors = validate(self);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { errors })
        }
    }
}

fn is_valid_email(email: &str) -> bool {
    !email.trim().is_empty() && EMAIL_RE.is_match(email)
}
