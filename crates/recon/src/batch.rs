//! Batch orchestration: run the reconciler over an ordered list of leads.
//!
//! Leads are independent. A failure in one never stops the batch. With
//! `concurrency > 1` a fixed pool of scoped threads pulls work off a shared
//! cursor. The unit of work is every row sharing one exact email, run in
//! input order, so a later row always sees an earlier row's write. Reports
//! are collected after join, sorted into input order and tallied once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use tracing::{debug, info, Dispatch};

use leadsync_core::Lead;
use leadsync_hub_client::LeadApi;

use crate::dedup::{email_groups, find_duplicates, DuplicatePolicy};
use crate::engine::Reconciler;
use crate::model::{BatchReport, LeadReport, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Worker threads; 0 and 1 both mean sequential.
    pub concurrency: usize,
    pub duplicates: DuplicatePolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { concurrency: 1, duplicates: DuplicatePolicy::FirstWins }
    }
}

/// Drives a [`Reconciler`] over a batch and tallies the outcomes.
///
/// Log output goes to the runner's own [`Dispatch`] (scoped to the run),
/// never to a process-wide default. A fresh runner logs nowhere.
pub struct BatchRunner<A> {
    reconciler: Reconciler<A>,
    options: BatchOptions,
    dispatch: Dispatch,
}

impl<A: LeadApi> BatchRunner<A> {
    pub fn new(reconciler: Reconciler<A>) -> Self {
        Self {
            reconciler,
            options: BatchOptions::default(),
            dispatch: Dispatch::none(),
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.options.concurrency = concurrency;
        self
    }

    pub fn with_duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.options.duplicates = policy;
        self
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn run(&self, leads: &[Lead]) -> BatchReport {
        self.run_with(leads, |_, _| {})
    }

    /// Like [`run`](Self::run), calling `on_report(report, total)` as each
    /// lead finishes. With a worker pool the callback fires in completion
    /// order, from worker threads.
    pub fn run_with<F>(&self, leads: &[Lead], on_report: F) -> BatchReport
    where
        F: Fn(&LeadReport, usize) + Sync,
    {
        tracing::dispatcher::with_default(&self.dispatch, || {
            let duplicates = match self.options.duplicates {
                DuplicatePolicy::FirstWins => find_duplicates(leads),
                DuplicatePolicy::Reconcile => vec![None; leads.len()],
            };

            let groups = email_groups(leads);
            let workers = self.options.concurrency.clamp(1, groups.len().max(1));
            info!(total = leads.len(), workers, "starting batch");

            let reports = if workers == 1 {
                self.run_sequential(leads, &duplicates, &on_report)
            } else {
                self.run_pool(leads, &duplicates, &groups, workers, &on_report)
            };

            let report = BatchReport::from_reports(reports);
            info!(
                total = report.total,
                created = report.created(),
                updated = report.updated(),
                skipped = report.skipped(),
                errors = report.errored(),
                "batch complete"
            );
            report
        })
    }

    fn process_one(&self, index: usize, lead: &Lead, duplicate_of: Option<usize>) -> LeadReport {
        let outcome = match duplicate_of {
            Some(first_index) => {
                debug!(index, first_index, email = %lead.email, "repeated row in batch");
                Outcome::Duplicate { first_index }
            }
            None => self.reconciler.reconcile(lead),
        };
        LeadReport { index, lead: lead.clone(), outcome }
    }

    fn run_sequential<F>(
        &self,
        leads: &[Lead],
        duplicates: &[Option<usize>],
        on_report: &F,
    ) -> Vec<LeadReport>
    where
        F: Fn(&LeadReport, usize) + Sync,
    {
        let total = leads.len();
        leads
            .iter()
            .enumerate()
            .map(|(idx, lead)| {
                let dup = duplicates.get(idx).copied().flatten();
                let report = self.process_one(idx, lead, dup);
                on_report(&report, total);
                report
            })
            .collect()
    }

    fn run_pool<F>(
        &self,
        leads: &[Lead],
        duplicates: &[Option<usize>],
        groups: &[Vec<usize>],
        workers: usize,
        on_report: &F,
    ) -> Vec<LeadReport>
    where
        F: Fn(&LeadReport, usize) + Sync,
    {
        let total = leads.len();
        let cursor = AtomicUsize::new(0);

        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let cursor = &cursor;
                    scope.spawn(move || {
                        tracing::dispatcher::with_default(&self.dispatch, || {
                            let mut done = Vec::new();
                            loop {
                                let next = cursor.fetch_add(1, Ordering::Relaxed);
                                let Some(group) = groups.get(next) else { break };
                                for &idx in group {
                                    let Some(lead) = leads.get(idx) else { continue };
                                    let dup = duplicates.get(idx).copied().flatten();
                                    let report = self.process_one(idx, lead, dup);
                                    on_report(&report, total);
                                    done.push(report);
                                }
                            }
                            done
                        })
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use leadsync_hub_client::{ApiError, InMemoryLeadApi, Op};

    fn lead(name: &str, email: &str, company: &str, source: &str) -> Lead {
        Lead::new(name, email, company, source)
    }

    fn sample_batch() -> Vec<Lead> {
        vec![
            lead("Alice Johnson", "alice@example.com", "Acme Inc", "LinkedIn"),
            lead("Bob Smith", "bob@example.com", "Builders", "Website"),
            lead("Charlie Brown", "charlie@peanuts.com", "Peanuts Corp", "Conference"),
            lead("", "invalid-email", "", "Fax"),
            lead("Eve Adams", "eve@example.com", "Evil Corp", "Twitter"),
        ]
    }

    fn seeded_api() -> InMemoryLeadApi {
        let mut bob = lead("Bob Smith", "bob@example.com", "Old Builders", "Website");
        bob.id = "srv-bob".into();
        InMemoryLeadApi::with_leads([
            lead("Alice Johnson", "alice@example.com", "Acme Inc", "LinkedIn"),
            bob,
        ])
    }

    #[test]
    fn test_mixed_batch_counts() {
        let api = seeded_api();
        let runner = BatchRunner::new(Reconciler::new(&api));
        let report = runner.run(&sample_batch());

        assert_eq!(report.total, 5);
        assert_eq!(report.created(), 2);
        assert_eq!(report.updated(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.errored(), 1);

        let tags: Vec<_> = report.leads.iter().map(|r| r.outcome.tag()).collect();
        assert_eq!(tags, vec!["SKIP", "UPDATE", "CREATE", "VALIDATION_ERROR", "CREATE"]);
    }

    #[test]
    fn test_failure_does_not_abort_batch() {
        let api = InMemoryLeadApi::new();
        api.fail_next(Op::Lookup, ApiError::RateLimitExhausted { attempts: 4 });
        let runner = BatchRunner::new(Reconciler::new(&api));

        let leads = vec![
            lead("A", "a@example.com", "A Co", "Website"),
            lead("B", "b@example.com", "B Co", "Website"),
            lead("C", "c@example.com", "C Co", "Website"),
        ];
        let report = runner.run(&leads);

        assert_eq!(report.total, 3);
        assert_eq!(report.errored(), 1);
        assert_eq!(report.created(), 2);
        assert_eq!(report.leads[0].outcome.tag(), "API_ERROR");
    }

    #[test]
    fn test_empty_batch() {
        let api = InMemoryLeadApi::new();
        let report = BatchRunner::new(Reconciler::new(&api)).with_concurrency(4).run(&[]);
        assert_eq!(report.total, 0);
        assert!(report.leads.is_empty());
        assert!(api.calls().is_empty());
        assert!(api.is_empty());
    }

    #[test]
    fn test_duplicates_first_wins() {
        let api = InMemoryLeadApi::new();
        let runner = BatchRunner::new(Reconciler::new(&api));
        let leads = vec![
            lead("Dup One", "dup@example.com", "Dup Co", "Referral"),
            lead("Dup One", "dup@example.com", "Dup Co", "Referral"),
        ];

        let report = runner.run(&leads);
        assert_eq!(api.call_count(Op::Lookup), 1);
        assert_eq!(api.call_count(Op::Create), 1);
        assert_eq!(report.leads[0].outcome.tag(), "CREATE");
        assert_eq!(report.leads[1].outcome, Outcome::Duplicate { first_index: 0 });
        assert_eq!(report.skipped(), 1);
    }

    #[test]
    fn test_case_variant_email_is_reconciled_on_its_own() {
        let api = InMemoryLeadApi::new();
        let runner = BatchRunner::new(Reconciler::new(&api));
        let leads = vec![
            lead("Alice Johnson", "alice@example.com", "Acme Inc", "LinkedIn"),
            lead("Alicia Jones", "Alice@Example.com", "Other Corp", "Website"),
        ];

        let report = runner.run(&leads);
        let tags: Vec<_> = report.leads.iter().map(|r| r.outcome.tag()).collect();
        assert_eq!(tags, vec!["CREATE", "CREATE"]);
        assert_eq!(api.calls_for("Alice@Example.com").len(), 2);
        assert_eq!(api.get("Alice@Example.com").unwrap().company, "Other Corp");
        assert_eq!(report.skipped(), 0);
    }

    #[test]
    fn test_corrected_row_updates_instead_of_skipping() {
        let api = InMemoryLeadApi::new();
        let runner = BatchRunner::new(Reconciler::new(&api));
        let leads = vec![
            lead("Dana Cruz", "dana@example.com", "Old Co", "Referral"),
            lead("Dana Cruz", "dana@example.com", "New Co", "Referral"),
        ];

        let report = runner.run(&leads);
        let tags: Vec<_> = report.leads.iter().map(|r| r.outcome.tag()).collect();
        assert_eq!(tags, vec!["CREATE", "UPDATE"]);
        assert_eq!(report.skipped(), 0);
        assert_eq!(api.get("dana@example.com").unwrap().company, "New Co");
    }

    #[test]
    fn test_pool_runs_rows_sharing_an_email_in_order() {
        let mut leads: Vec<Lead> = (0..12)
            .map(|i| lead(&format!("L{i}"), &format!("l{i}@example.com"), "Co", "Website"))
            .collect();
        leads.insert(3, lead("Dana Cruz", "dana@example.com", "Old Co", "Referral"));
        leads.push(lead("Dana Cruz", "dana@example.com", "New Co", "Referral"));
        leads.push(lead("Dana Cruz", "dana@example.com", "New Co", "Referral"));

        let api = InMemoryLeadApi::new();
        let report = BatchRunner::new(Reconciler::new(&api)).with_concurrency(4).run(&leads);

        assert_eq!(report.leads[3].outcome.tag(), "CREATE");
        assert_eq!(report.leads[13].outcome.tag(), "UPDATE");
        assert_eq!(report.leads[14].outcome, Outcome::Duplicate { first_index: 13 });
        assert_eq!(report.errored(), 0);
        assert_eq!(api.get("dana@example.com").unwrap().company, "New Co");
    }

    #[test]
    fn test_duplicates_reconcile_hits_remote_twice() {
        let api = InMemoryLeadApi::new();
        let runner = BatchRunner::new(Reconciler::new(&api)).with_duplicates(DuplicatePolicy::Reconcile);
        let leads = vec![
            lead("Dup One", "dup@example.com", "Dup Co", "Referral"),
            lead("Dup Two", "dup@example.com", "Dup Co", "Referral"),
        ];

        let report = runner.run(&leads);
        // Second row sees the first row's record and updates it.
        assert_eq!(report.leads[0].outcome.tag(), "CREATE");
        assert_eq!(report.leads[1].outcome.tag(), "UPDATE");
        assert_eq!(api.call_count(Op::Lookup), 2);
    }

    #[test]
    fn test_pool_matches_sequential() {
        let leads: Vec<Lead> = (0..40)
            .map(|i| {
                if i % 7 == 3 {
                    lead("", &format!("bad{i}"), "", "Fax")
                } else {
                    lead(&format!("Lead {i}"), &format!("lead{i}@example.com"), "Co", "Webinar")
                }
            })
            .collect();

        let seq_api = InMemoryLeadApi::new();
        let sequential = BatchRunner::new(Reconciler::new(&seq_api)).run(&leads);

        let pool_api = InMemoryLeadApi::new();
        let pooled = BatchRunner::new(Reconciler::new(&pool_api))
            .with_concurrency(4)
            .run(&leads);

        assert_eq!(pooled.tally, sequential.tally);
        assert_eq!(pooled.total, 40);
        let seq_tags: Vec<_> = sequential.leads.iter().map(|r| (r.index, r.outcome.tag())).collect();
        let pool_tags: Vec<_> = pooled.leads.iter().map(|r| (r.index, r.outcome.tag())).collect();
        assert_eq!(pool_tags, seq_tags);
        assert_eq!(pool_api.len(), seq_api.len());
    }

    #[test]
    fn test_on_report_called_once_per_lead() {
        let api = seeded_api();
        let seen = Mutex::new(Vec::new());
        let runner = BatchRunner::new(Reconciler::new(&api));

        runner.run_with(&sample_batch(), |report, total| {
            seen.lock().unwrap().push((report.index, total));
        });

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen, vec![(0, 5), (1, 5), (2, 5), (3, 5), (4, 5)]);
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }

        fn dispatch(&self, level: tracing::Level) -> Dispatch {
            let sink = self.clone();
            Dispatch::new(
                tracing_subscriber::fmt()
                    .with_max_level(level)
                    .with_ansi(false)
                    .with_writer(move || sink.clone())
                    .finish(),
            )
        }
    }

    #[test]
    fn test_runners_keep_their_own_dispatch() {
        let leads = [lead("A", "a@example.com", "A Co", "Website")];

        let verbose = Captured::default();
        let api = InMemoryLeadApi::new();
        BatchRunner::new(Reconciler::new(&api))
            .with_dispatch(verbose.dispatch(tracing::Level::INFO))
            .run(&leads);

        let quiet = Captured::default();
        let api = InMemoryLeadApi::new();
        BatchRunner::new(Reconciler::new(&api))
            .with_dispatch(quiet.dispatch(tracing::Level::ERROR))
            .run(&leads);

        assert!(verbose.text().contains("lead created"));
        assert!(verbose.text().contains("batch complete"));
        assert!(quiet.text().is_empty());
    }

    #[test]
    fn test_pool_workers_log_through_runner_dispatch() {
        let leads: Vec<Lead> = (0..8)
            .map(|i| lead(&format!("L{i}"), &format!("l{i}@example.com"), "Co", "Website"))
            .collect();
        let captured = Captured::default();
        let api = InMemoryLeadApi::new();
        BatchRunner::new(Reconciler::new(&api))
            .with_concurrency(3)
            .with_dispatch(captured.dispatch(tracing::Level::INFO))
            .run(&leads);

        assert_eq!(captured.text().matches("lead created").count(), 8);
    }
}
