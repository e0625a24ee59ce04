use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Source allow-list
// ---------------------------------------------------------------------------

/// Channel a lead came in through. Matching is case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadSource {
    LinkedIn,
    Website,
    Conference,
    Referral,
    Webinar,
    Twitter,
}

impl LeadSource {
    /// Allow-list in display order (used verbatim in validation messages).
    pub const ALL: [LeadSource; 6] = [
        LeadSource::LinkedIn,
        LeadSource::Website,
        LeadSource::Conference,
        LeadSource::Referral,
        LeadSource::Webinar,
        LeadSource::Twitter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinkedIn => "LinkedIn",
            Self::Website => "Website",
            Self::Conference => "Conference",
            Self::Referral => "Referral",
            Self::Webinar => "Webinar",
            Self::Twitter => "Twitter",
        }
    }

    /// Comma-separated allow-list, e.g. `LinkedIn, Website, ...`.
    pub fn allowed_list() -> String {
        Self::ALL
            .iter()
            .map(LeadSource::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for LeadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|src| src.as_str() == s)
            .ok_or_else(|| format!("unknown lead source: {s:?}"))
    }
}

// ---------------------------------------------------------------------------
// Lead
// ---------------------------------------------------------------------------

/// A business contact exchanged with the system of record.
///
/// Values are treated as immutable input: reconciliation never edits a lead
/// in place, the remote system hands back a new one instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    /// Opaque identity. Assigned once, never regenerated on update.
    pub id: String,
    pub name: String,
    pub email: String,
    pub company: String,
    /// Kept as a raw string so out-of-list values can reach the validator.
    pub source: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Lead {
    /// Build a fresh lead with a locally generated id and `created_at = now`.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        company: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            email: email.into(),
            company: company.into(),
            source: source.into(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Parsed source, if it is on the allow-list.
    pub fn lead_source(&self) -> Option<LeadSource> {
        self.source.parse().ok()
    }

    /// Business equality: name, email, company and source only.
    /// Identity and timestamps never participate. An absent counterpart is
    /// never equal.
    pub fn business_eq(&self, other: Option<&Lead>) -> bool {
        match other {
            Some(other) => {
                self.name == other.name
                    && self.email == other.email
                    && self.company == other.company
                    && self.source == other.source
            }
            None => false,
        }
    }
}

/// Free-function form of [`Lead::business_eq`].
pub fn business_equal(a: &Lead, b: &Lead) -> bool {
    a.business_eq(Some(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn alice() -> Lead {
        Lead::new("Alice Johnson", "alice@example.com", "Acme Inc", "LinkedIn")
    }

    #[test]
    fn test_new_assigns_id_and_created_at() {
        let a = alice();
        let b = alice();
        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
        assert!(a.updated_at.is_none());
    }

    #[test]
    fn test_business_eq_ignores_identity_and_timestamps() {
        let a = alice();
        let mut b = a.clone();
        b.id = "remote-42".into();
        b.created_at = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        b.updated_at = Some(Utc::now());
        assert!(a.business_eq(Some(&b)));
        assert!(business_equal(&b, &a));
    }

    #[test]
    fn test_business_eq_none_is_unequal() {
        assert!(!alice().business_eq(None));
    }

    #[test]
    fn test_business_eq_each_field_matters() {
        let a = alice();

        let mut b = a.clone();
        b.name = "Alice J.".into();
        assert!(!business_equal(&a, &b));

        let mut b = a.clone();
        b.email = "alice@example.org".into();
        assert!(!business_equal(&a, &b));

        let mut b = a.clone();
        b.company = "Acme Corp".into();
        assert!(!business_equal(&a, &b));

        let mut b = a.clone();
        b.source = "Website".into();
        assert!(!business_equal(&a, &b));
    }

    #[test]
    fn test_source_round_trip_and_case_sensitivity() {
        for src in LeadSource::ALL {
            assert_eq!(src.as_str().parse::<LeadSource>().unwrap(), src);
        }
        assert!("linkedin".parse::<LeadSource>().is_err());
        assert_eq!(
            LeadSource::allowed_list(),
            "LinkedIn, Website, Conference, Referral, Webinar, Twitter"
        );
    }

    #[test]
    fn test_serde_uses_camel_case_and_omits_missing_updated_at() {
        let json = serde_json::to_value(alice()).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_none());

        let parsed: Lead = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "name": "Bob",
            "email": "bob@example.com",
            "company": "Builders",
            "source": "Website",
            "createdAt": "2024-05-01T10:00:00Z",
            "updatedAt": "2024-05-02T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(parsed.id, "abc");
        assert!(parsed.updated_at.is_some());
    }

    proptest! {
        #[test]
        fn prop_business_eq_reflexive_and_symmetric(
            name in ".{0,12}",
            email in "[a-z]{1,6}@[a-z]{1,6}\\.com",
            company in ".{0,12}",
            idx in 0usize..6,
            other_id in "[a-z0-9]{1,8}",
        ) {
            let a = Lead::new(name, email, company, LeadSource::ALL[idx].as_str());
            let mut b = a.clone();
            b.id = other_id;
            b.updated_at = Some(Utc::now());
            prop_assert!(business_equal(&a, &a));
            prop_assert_eq!(business_equal(&a, &b), business_equal(&b, &a));
            prop_assert!(business_equal(&a, &b));
        }
    }
}
