use tracing::{debug, error, info, info_span, warn};

use leadsync_core::Lead;
use leadsync_hub_client::{LeadApi, Lookup};

use crate::model::Outcome;

/// Decides and executes create / update / skip for a single lead.
///
/// Validate → Lookup → Decide. Every branch is terminal and every remote
/// failure becomes an [`Outcome`]; nothing is returned as `Err`.
pub struct Reconciler<A> {
    api: A,
}

impl<A: LeadApi> Reconciler<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn reconcile(&self, lead: &Lead) -> Outcome {
        let span = info_span!("reconcile", email = %lead.email);
        let _entered = span.enter();

        if let Err(error) = lead.check() {
            warn!(name = %lead.name, error = %error, "lead validation failed");
            return Outcome::ValidationError { error };
        }

        debug!("looking up existing lead");
        let existing = match self.api.lookup(&lead.email) {
            Ok(found) => found,
            Err(error) => {
                error!(error = %error, "lookup failed");
                return Outcome::ApiError { error };
            }
        };

        match existing {
            Lookup::NotFound => self.create(lead),
            Lookup::Found(remote) if lead.business_eq(Some(&remote)) => {
                info!(id = %remote.id, "lead unchanged, skipping");
                Outcome::Skip
            }
            Lookup::Found(remote) => {
                debug!(id = %remote.id, "remote lead differs");
                self.update(lead)
            }
        }
    }

    fn create(&self, lead: &Lead) -> Outcome {
        match self.api.create(lead) {
            Ok(created) => {
                info!(id = %created.id, "lead created");
                Outcome::Create { created }
            }
            Err(error) => {
                error!(error = %error, "create failed");
                Outcome::CreateError { error }
            }
        }
    }

    fn update(&self, lead: &Lead) -> Outcome {
        match self.api.update(lead) {
            Ok(updated) => {
                info!(id = %updated.id, "lead updated");
                Outcome::Update { updated }
            }
            Err(error) => {
                error!(error = %error, "update failed");
                Outcome::UpdateError { error }
            }
        }
    }
}
