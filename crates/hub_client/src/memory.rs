//! In-process stand-in for the lead system of record.
//!
//! Mirrors the HTTP contract closely enough for engine tests: 409 on a
//! duplicate create, 404 when updating an unknown email, server-assigned ids
//! and timestamps. Every call is recorded so tests can assert that no remote
//! mutation happened.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use leadsync_core::Lead;

use crate::api::{ApiError, LeadApi, Lookup};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Lookup,
    Create,
    Update,
}

/// A recorded call, keyed by the email it targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Lookup(String),
    Create(String),
    Update(String),
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Self::Lookup(_) => Op::Lookup,
            Self::Create(_) => Op::Create,
            Self::Update(_) => Op::Update,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Self::Lookup(e) | Self::Create(e) | Self::Update(e) => e,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    leads: HashMap<String, Lead>,
    calls: Vec<Call>,
    failures: HashMap<Op, VecDeque<ApiError>>,
}

#[derive(Debug, Default)]
pub struct InMemoryLeadApi {
    state: Mutex<State>,
}

impl InMemoryLeadApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records.
    pub fn with_leads(leads: impl IntoIterator<Item = Lead>) -> Self {
        let api = Self::new();
        for lead in leads {
            api.insert(lead);
        }
        api
    }

    pub fn insert(&self, lead: Lead) {
        self.lock().leads.insert(lead.email.clone(), lead);
    }

    pub fn get(&self, email: &str) -> Option<Lead> {
        self.lock().leads.get(email).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().leads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make the next call of `op` fail with `error`. Queued per operation.
    pub fn fail_next(&self, op: Op, error: ApiError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn calls_for(&self, email: &str) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.email() == email)
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(state: &mut State, call: Call) -> Result<(), ApiError> {
        let op = call.op();
        state.calls.push(call);
        match state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl LeadApi for InMemoryLeadApi {
    fn lookup(&self, email: &str) -> Result<Lookup, ApiError> {
        let mut state = self.lock();
        Self::begin(&mut state, Call::Lookup(email.to_string()))?;
        Ok(match state.leads.get(email) {
            Some(lead) => Lookup::Found(lead.clone()),
            None => Lookup::NotFound,
        })
    }

    fn create(&self, lead: &Lead) -> Result<Lead, ApiError> {
        let mut state = self.lock();
        Self::begin(&mut state, Call::Create(lead.email.clone()))?;
        if state.leads.contains_key(&lead.email) {
            return Err(ApiError::UnexpectedStatus {
                status: 409,
                body: format!("lead with email {} already exists", lead.email),
            });
        }
        let created = Lead {
            id: uuid::Uuid::new_v4().to_string(),
            name: lead.name.clone(),
            email: lead.email.clone(),
            company: lead.company.clone(),
            source: lead.source.clone(),
            created_at: Utc::now(),
            updated_at: None,
        };
        state.leads.insert(created.email.clone(), created.clone());
        Ok(created)
    }

    fn update(&self, lead: &Lead) -> Result<Lead, ApiError> {
        let mut state = self.lock();
        Self::begin(&mut state, Call::Update(lead.email.clone()))?;
        let existing = state.leads.get_mut(&lead.email).ok_or_else(|| ApiError::UnexpectedStatus {
            status: 404,
            body: format!("no lead with email {}", lead.email),
        })?;
        existing.name = lead.name.clone();
        existing.company = lead.company.clone();
        existing.source = lead.source.clone();
        existing.updated_at = Some(Utc::now());
        Ok(existing.clone())
    }
}
