//! HTTP adapter for the lead system of record.
//!
//! Endpoints (relative to the configured base URL):
//! - `GET  /lookup?email=…` → `{found, lead?}`
//! - `POST /create`         → `{success, lead}`
//! - `POST /update`         → `{success, lead}`

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use leadsync_core::Lead;

use crate::api::{ApiError, LeadApi, Lookup, NetworkErrorKind};
use crate::retry::{AttemptError, CancellableDelay, Delay, RetryPolicy};

// ── Constants ───────────────────────────────────────────────────────

/// Per-attempt bound on every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const USER_AGENT: &str = concat!("leadsync/", env!("CARGO_PKG_VERSION"));

const MAX_ERROR_BODY_CHARS: usize = 200;

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LookupResponse {
    found: bool,
    #[serde(default)]
    lead: Option<Lead>,
}

#[derive(Debug, Deserialize)]
struct MutationResponse {
    #[serde(default = "default_success")]
    success: bool,
    lead: Lead,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct LeadInput<'a> {
    name: &'a str,
    email: &'a str,
    company: &'a str,
    source: &'a str,
}

#[derive(Debug, Serialize)]
struct LeadUpdate<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    company: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
}

// ── Client ──────────────────────────────────────────────────────────

/// Blocking HTTP client for the lead API.
///
/// The rate-limit policy applies to all three operations. The underlying
/// connection pool is shared by clones.
#[derive(Clone)]
pub struct HttpLeadApi {
    http: reqwest::blocking::Client,
    api_base: String,
    policy: RetryPolicy,
    delay: Arc<dyn Delay>,
}

impl HttpLeadApi {
    /// Client with the default 5 s per-attempt timeout and default policy.
    pub fn new(api_base: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(api_base, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(api_base: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            policy: RetryPolicy::default(),
            delay: Arc::new(CancellableDelay::default()),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the backoff wait (e.g. a [`CancellableDelay`] sharing the
    /// caller's token, or a recording delay in tests).
    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    /// Send one attempt and classify the response.
    fn send(
        &self,
        req: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response, AttemptError> {
        let resp = req.send().map_err(|e| AttemptError::Fatal(network_error(&e)))?;
        let status = resp.status().as_u16();

        if status == 429 {
            return Err(AttemptError::RateLimited);
        }

        if !resp.status().is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(AttemptError::Fatal(ApiError::UnexpectedStatus {
                status,
                body: truncate(&body, MAX_ERROR_BODY_CHARS),
            }));
        }

        Ok(resp)
    }

    fn post_mutation<B: Serialize>(&self, operation: &str, body: &B) -> Result<Lead, ApiError> {
        let url = self.url(operation);
        self.policy.execute(&*self.delay, operation, || {
            let resp = self.send(self.http.post(&url).json(body))?;
            let parsed: MutationResponse = decode(resp)?;
            if !parsed.success {
                return Err(ApiError::Decode(format!("{operation} response reported success=false")).into());
            }
            Ok(parsed.lead)
        })
    }
}

impl LeadApi for HttpLeadApi {
    fn lookup(&self, email: &str) -> Result<Lookup, ApiError> {
        let url = self.url("lookup");
        debug!(email, "lookup");
        self.policy.execute(&*self.delay, "lookup", || {
            let resp = self.send(self.http.get(&url).query(&[("email", email)]))?;
            let parsed: LookupResponse = decode(resp)?;
            match (parsed.found, parsed.lead) {
                (true, Some(lead)) => Ok(Lookup::Found(lead)),
                (true, None) => Err(ApiError::Decode("found=true but lead is missing".into()).into()),
                (false, _) => Ok(Lookup::NotFound),
            }
        })
    }

    fn create(&self, lead: &Lead) -> Result<Lead, ApiError> {
        debug!(email = %lead.email, "create");
        self.post_mutation(
            "create",
            &LeadInput {
                name: &lead.name,
                email: &lead.email,
                company: &lead.company,
                source: &lead.source,
            },
        )
    }

    fn update(&self, lead: &Lead) -> Result<Lead, ApiError> {
        debug!(email = %lead.email, "update");
        self.post_mutation(
            "update",
            &LeadUpdate {
                email: &lead.email,
                name: Some(&lead.name),
                company: Some(&lead.company),
                source: Some(&lead.source),
            },
        )
    }
}

// ── Free functions ──────────────────────────────────────────────────

fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::blocking::Response) -> Result<T, ApiError> {
    let text = resp.text().map_err(|e| network_error(&e))?;
    serde_json::from_str(&text).map_err(|e| {
        ApiError::Decode(format!("{} (body: {})", e, truncate(&text, MAX_ERROR_BODY_CHARS)))
    })
}

fn network_error(err: &reqwest::Error) -> ApiError {
    let kind = if err.is_timeout() {
        NetworkErrorKind::Timeout
    } else if err.is_connect() {
        NetworkErrorKind::Connect
    } else {
        NetworkErrorKind::Other
    };
    ApiError::Network { kind, cause: error_chain(err) }
}

/// `Display` of an error followed by each of its sources.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let msg = inner.to_string();
        if !out.contains(&msg) {
            out.push_str(": ");
            out.push_str(&msg);
        }
        source = inner.source();
    }
    out
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
