use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use leadsync_core::Lead;

/// How repeated emails inside one batch are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Exact repeats of a row already sent become `Duplicate`; rows whose
    /// data changed are still reconciled.
    #[default]
    FirstWins,
    /// Reconcile every row independently.
    Reconcile,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-wins" => Ok(Self::FirstWins),
            "reconcile" => Ok(Self::Reconcile),
            other => Err(format!("unknown duplicate mode '{other}' (expected first-wins or reconcile)")),
        }
    }
}

/// For each lead, the index of the earlier row it repeats exactly.
///
/// Rows are keyed on the email exactly as the lookup sends it. A row is a
/// duplicate only when it is business-equal to the last row reconciled for
/// that email; any change in name, company or source sends it upstream so
/// the remote record follows the latest data. Invalid leads never take
/// part, so they still surface as validation errors.
pub fn find_duplicates(leads: &[Lead]) -> Vec<Option<usize>> {
    let mut last_sent: HashMap<&str, usize> = HashMap::new();

    leads
        .iter()
        .enumerate()
        .map(|(idx, lead)| {
            if lead.check().is_err() {
                return None;
            }
            match last_sent.get(lead.email.as_str()) {
                Some(&earlier) if lead.business_eq(leads.get(earlier)) => Some(earlier),
                _ => {
                    last_sent.insert(&lead.email, idx);
                    None
                }
            }
        })
        .collect()
}

/// Lead indices grouped by exact email, groups in order of first
/// appearance and indices ascending within each group.
pub(crate) fn email_groups(leads: &[Lead]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut by_email: HashMap<&str, usize> = HashMap::new();

    for (idx, lead) in leads.iter().enumerate() {
        match by_email.get(lead.email.as_str()) {
            Some(&group) => groups[group].push(idx),
            None => {
                by_email.insert(&lead.email, groups.len());
                groups.push(vec![idx]);
            }
        }
    }
    groups
}
