//! The reconciliation run.
//!
//! Existing keys are snapshotted once, sources are fetched concurrently, and
//! task creation is serialized. Every candidate ends in exactly one
//! [`Decision`]; nothing is retried within a run. Two overlapping runs can
//! both create the same task since neither sees the other's writes.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::join_all;
use shared::api::RunSummary;
use shared::models::{CalendarSource, CandidateTask, NewTask, NormalizedEvent, TaskRule};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::feed::FeedClient;
use crate::ical;
use crate::loader::load_existing_keys;
use crate::rules::derive;
use crate::store::TaskStore;
use crate::window::ReconciliationWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Due date falls outside the event window
    OutOfWindow,
    /// A task with this key already exists
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Skipped(SkipReason),
    Created { task_id: String },
    CreateFailed { message: String },
}

#[derive(Debug, Clone)]
pub struct CandidateOutcome {
    pub candidate: CandidateTask,
    pub decision: Decision,
}

#[derive(Debug)]
pub struct SourceOutcome {
    pub source: CalendarSource,
    pub result: Result<Vec<NormalizedEvent>>,
}

impl SourceOutcome {
    pub fn events(&self) -> &[NormalizedEvent] {
        self.result.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug)]
pub struct ReconcileReport {
    pub event_window: ReconciliationWindow,
    pub query_window: ReconciliationWindow,
    pub sources: Vec<SourceOutcome>,
    pub outcomes: Vec<CandidateOutcome>,
    /// Set when existing tasks could not be fully listed
    pub store_warning: Option<Error>,
}

impl ReconcileReport {
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for outcome in &self.outcomes {
            match outcome.decision {
                Decision::Skipped(SkipReason::OutOfWindow) => summary.out_of_window += 1,
                Decision::Skipped(SkipReason::Duplicate) => summary.duplicates += 1,
                Decision::Created { .. } => summary.created += 1,
                Decision::CreateFailed { .. } => summary.failed += 1,
            }
        }
        summary
    }
}

/// Before any store call: where a candidate is headed
enum Plan {
    Skip(SkipReason),
    Create,
}

fn plan(candidate: &CandidateTask, window: &ReconciliationWindow, existing: &HashSet<String>) -> Plan {
    if !window.contains_instant(candidate.due) {
        Plan::Skip(SkipReason::OutOfWindow)
    } else if existing.contains(&candidate.idempotency_key) {
        Plan::Skip(SkipReason::Duplicate)
    } else {
        Plan::Create
    }
}

pub struct Reconciler {
    config: Arc<EngineConfig>,
    feed: Arc<dyn FeedClient>,
    store: Arc<dyn TaskStore>,
}

impl Reconciler {
    pub fn new(config: Arc<EngineConfig>, feed: Arc<dyn FeedClient>, store: Arc<dyn TaskStore>) -> Self {
        Self { config, feed, store }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    fn all_rules(&self) -> Vec<TaskRule> {
        let mut rules = self.config.rules.clone();
        for source in &self.config.sources {
            if let Some(ref custom) = source.rules {
                rules.extend(custom.iter().cloned());
            }
        }
        rules
    }

    /// Fetches and parses one source. Failures stay with that source.
    async fn load_source(&self, source: &CalendarSource) -> Result<Vec<NormalizedEvent>> {
        let raw = self
            .feed
            .fetch(&source.feed_url)
            .await
            .map_err(|e| Error::Fetch {
                source_name: source.name.clone(),
                status: e.status,
                message: e.message,
            })?;

        ical::normalize(&raw, source).map_err(|error| Error::Parse {
            source_name: source.name.clone(),
            error,
        })
    }

    /// Runs one reconciliation with `today` as the first day of the window.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, today: NaiveDate) -> ReconcileReport {
        let event_window = ReconciliationWindow::upcoming(today, self.config.event_window_months);
        let query_window = event_window.padded_for(&self.all_rules(), self.config.query_slack_days);

        let existing = load_existing_keys(self.store.as_ref(), &query_window).await;
        let store_warning = existing.warning;
        let mut known = existing.keys;

        let loads = self.config.sources.iter().map(|source| async move {
            let result = self.load_source(source).await;
            SourceOutcome {
                source: source.clone(),
                result,
            }
        });
        let sources = join_all(loads).await;

        let mut outcomes = Vec::new();
        for outcome in &sources {
            let events = match outcome.result {
                Ok(ref events) => events,
                Err(ref e) => {
                    tracing::warn!(source = %outcome.source.name, error = %e, "Source skipped");
                    continue;
                }
            };
            tracing::debug!(source = %outcome.source.name, count = events.len(), "Source loaded");

            let rules = self.config.rules_for(&outcome.source);
            for event in events.iter().filter(|e| event_window.contains_instant(e.start)) {
                for candidate in derive(event, rules, &outcome.source.name, &self.config.key_prefix) {
                    let decision = match plan(&candidate, &event_window, &known) {
                        Plan::Skip(reason) => {
                            tracing::debug!(key = %candidate.idempotency_key, ?reason, "Skipping candidate");
                            Decision::Skipped(reason)
                        }
                        Plan::Create => self.create(&candidate, &mut known).await,
                    };
                    outcomes.push(CandidateOutcome { candidate, decision });
                }
            }
        }

        let report = ReconcileReport {
            event_window,
            query_window,
            sources,
            outcomes,
            store_warning,
        };
        let summary = report.summary();
        tracing::info!(
            created = summary.created,
            duplicates = summary.duplicates,
            out_of_window = summary.out_of_window,
            failed = summary.failed,
            "Reconciliation finished"
        );
        report
    }

    async fn create(&self, candidate: &CandidateTask, known: &mut HashSet<String>) -> Decision {
        match self.store.create_task(&NewTask::from(candidate)).await {
            Ok(task) => {
                tracing::info!(key = %candidate.idempotency_key, task_id = %task.id, "Created task");
                known.insert(candidate.idempotency_key.clone());
                Decision::Created { task_id: task.id }
            }
            Err(e) => {
                let err = Error::Create {
                    key: candidate.idempotency_key.clone(),
                    message: e.message,
                };
                tracing::error!(error = %err, "Task creation failed");
                Decision::CreateFailed {
                    message: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_SOURCES, TODOIST_TOKEN_VAR};
    use crate::memory::{MemoryTaskStore, StaticFeed};
    use crate::rules::{DOOR_CODE, REVIEW_REQUEST, WELCOME_LETTER};
    use shared::models::ExternalTaskRecord;
    use std::collections::HashMap;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    fn feed_url(var: &str) -> String {
        format!("https://feeds.example.com/{}.ics", var.to_lowercase())
    }

    fn config() -> Arc<EngineConfig> {
        let mut vars = HashMap::new();
        vars.insert(TODOIST_TOKEN_VAR.to_string(), "token".to_string());
        for (_, var, _) in DEFAULT_SOURCES {
            vars.insert(var.to_string(), feed_url(var));
        }
        Arc::new(EngineConfig::from_lookup(|k| vars.get(k).cloned()).unwrap())
    }

    fn ics(events: &[(&str, &str, &str)]) -> String {
        let mut out = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n");
        for (uid, start, end) in events {
            out.push_str(&format!(
                "BEGIN:VEVENT\r\nUID:{uid}\r\nSUMMARY:Reserved\r\nDTSTART;VALUE=DATE:{start}\r\nDTEND;VALUE=DATE:{end}\r\nEND:VEVENT\r\n"
            ));
        }
        out.push_str("END:VCALENDAR\r\n");
        out
    }

    /// Every source gets one stay starting Jan 10, with a source-specific UID.
    fn feeds() -> StaticFeed {
        DEFAULT_SOURCES.iter().fold(StaticFeed::new(), |feed, (name, var, _)| {
            let uid = format!("{}-stay", name.to_lowercase().replace(' ', "-"));
            feed.with_feed(feed_url(var), ics(&[(uid.as_str(), "20260110", "20260113")]))
        })
    }

    fn reconciler(feed: StaticFeed, store: Arc<MemoryTaskStore>) -> Reconciler {
        Reconciler::new(config(), Arc::new(feed), store)
    }

    #[tokio::test]
    async fn test_creates_expected_tasks() {
        let store = Arc::new(MemoryTaskStore::new());
        let report = reconciler(feeds(), store.clone()).run(today()).await;

        // 5 sources x 2 rules, plus the door code for Lake Breeze
        assert_eq!(report.summary().created, 11);
        assert_eq!(store.tasks().await.len(), 11);
        assert!(report.store_warning.is_none());

        let door_codes: Vec<_> = store
            .tasks()
            .await
            .into_iter()
            .filter(|t| t.content.starts_with(DOOR_CODE))
            .collect();
        assert_eq!(door_codes.len(), 1);
        assert_eq!(door_codes[0].labels, vec!["Lake Breeze".to_string()]);
        assert_eq!(door_codes[0].description, "booking-lake-breeze-stay-make-door-code");
        assert_eq!(door_codes[0].due_date, NaiveDate::from_ymd_opt(2026, 1, 7));
    }

    #[tokio::test]
    async fn test_second_run_creates_nothing() {
        let store = Arc::new(MemoryTaskStore::new());
        let reconciler = reconciler(feeds(), store.clone());

        let first = reconciler.run(today()).await;
        assert_eq!(first.summary().created, 11);

        let second = reconciler.run(today()).await;
        assert_eq!(second.summary().created, 0);
        assert_eq!(second.summary().duplicates, 11);
        assert_eq!(store.create_calls(), 11);
    }

    #[tokio::test]
    async fn test_completed_task_is_not_recreated() {
        let store = Arc::new(MemoryTaskStore::new());
        store
            .insert(ExternalTaskRecord {
                id: "done-1".to_string(),
                content: "Send Welcome Letter (Reserved)".to_string(),
                description: "booking-red-stay-send-welcome-letter".to_string(),
                completed: true,
                due_date: NaiveDate::from_ymd_opt(2026, 1, 7),
                priority: 1,
                project_id: None,
                labels: vec!["Red".to_string()],
            })
            .await;

        let report = reconciler(feeds(), store.clone()).run(today()).await;

        let red_welcome = report
            .outcomes
            .iter()
            .find(|o| o.candidate.idempotency_key == "booking-red-stay-send-welcome-letter")
            .unwrap();
        assert_eq!(red_welcome.decision, Decision::Skipped(SkipReason::Duplicate));
        assert_eq!(report.summary().created, 10);
    }

    #[tokio::test]
    async fn test_task_completed_between_runs_stays_suppressed() {
        let store = Arc::new(MemoryTaskStore::new());
        let reconciler = reconciler(feeds(), store.clone());

        let first = reconciler.run(today()).await;
        for outcome in &first.outcomes {
            if let Decision::Created { ref task_id } = outcome.decision {
                store.complete(task_id).await;
            }
        }

        let second = reconciler.run(today()).await;
        assert_eq!(second.summary().created, 0);
        assert_eq!(second.summary().duplicates, 11);
    }

    #[tokio::test]
    async fn test_failed_source_is_isolated() {
        let feed = feeds().with_failure(feed_url("RED_ICAL_URL"), 503, "Failed to fetch iCal data: Service Unavailable");
        let store = Arc::new(MemoryTaskStore::new());
        let report = reconciler(feed, store).run(today()).await;

        let red = report.sources.iter().find(|s| s.source.name == "Red").unwrap();
        assert!(matches!(red.result, Err(Error::Fetch { status: Some(503), .. })));
        assert!(red.events().is_empty());

        let healthy = report.sources.iter().filter(|s| s.result.is_ok()).count();
        assert_eq!(healthy, 4);
        assert_eq!(report.summary().created, 9);
        assert!(report.outcomes.iter().all(|o| o.candidate.label != "Red"));
    }

    #[tokio::test]
    async fn test_malformed_feed_is_isolated() {
        let feed = feeds().with_feed(feed_url("BETSIE_ICAL_URL"), "<html>oops</html>");
        let report = reconciler(feed, Arc::new(MemoryTaskStore::new())).run(today()).await;

        let betsie = report.sources.iter().find(|s| s.source.name == "Betsie").unwrap();
        assert!(matches!(betsie.result, Err(Error::Parse { .. })));
        assert_eq!(report.summary().created, 9);
    }

    #[tokio::test]
    async fn test_due_date_before_today_is_skipped() {
        // Starts Jan 2: welcome letter would be due Dec 30, before the window.
        let feed = StaticFeed::new().with_feed(
            feed_url("WAVESONG_ICAL_URL"),
            ics(&[("early", "20260102", "20260105")]),
        );
        let report = reconciler(feed, Arc::new(MemoryTaskStore::new())).run(today()).await;

        let decisions: HashMap<_, _> = report
            .outcomes
            .iter()
            .map(|o| (o.candidate.task_type.as_str(), o.decision.clone()))
            .collect();
        assert_eq!(decisions[WELCOME_LETTER], Decision::Skipped(SkipReason::OutOfWindow));
        assert!(matches!(decisions[REVIEW_REQUEST], Decision::Created { .. }));
    }

    #[tokio::test]
    async fn test_due_dates_on_window_bounds_are_created() {
        // Window is [Jan 1, Feb 1]. "bounds": welcome due Jan 1, review due
        // Feb 1. "late": review due Feb 2.
        let feed = StaticFeed::new().with_feed(
            feed_url("WAVESONG_ICAL_URL"),
            ics(&[("bounds", "20260104", "20260129"), ("late", "20260105", "20260130")]),
        );
        let report = reconciler(feed, Arc::new(MemoryTaskStore::new())).run(today()).await;
        assert_eq!(report.event_window.end, NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());

        let decision = |key: &str| {
            report
                .outcomes
                .iter()
                .find(|o| o.candidate.idempotency_key == key)
                .map(|o| o.decision.clone())
                .unwrap()
        };

        assert_eq!(
            report.outcomes[0].candidate.due.date_naive(),
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
        );
        assert!(matches!(decision("booking-bounds-send-welcome-letter"), Decision::Created { .. }));
        assert!(matches!(decision("booking-bounds-send-review-request"), Decision::Created { .. }));
        assert_eq!(
            decision("booking-late-send-review-request"),
            Decision::Skipped(SkipReason::OutOfWindow)
        );
    }

    #[tokio::test]
    async fn test_events_outside_window_produce_no_candidates() {
        let feed = StaticFeed::new().with_feed(
            feed_url("WAVESONG_ICAL_URL"),
            ics(&[
                ("past", "20251220", "20251224"),
                ("far", "20260301", "20260305"),
            ]),
        );
        let report = reconciler(feed, Arc::new(MemoryTaskStore::new())).run(today()).await;

        let wavesong = report.sources.iter().find(|s| s.source.name == "Wavesong").unwrap();
        assert_eq!(wavesong.events().len(), 2);
        assert!(report.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_create_failure_does_not_stop_batch() {
        let store = Arc::new(MemoryTaskStore::new());
        store.reject_content_containing(REVIEW_REQUEST).await;

        let report = reconciler(feeds(), store.clone()).run(today()).await;
        let summary = report.summary();

        assert_eq!(summary.failed, 5);
        assert_eq!(summary.created, 6);
        let failed = report
            .outcomes
            .iter()
            .find(|o| matches!(o.decision, Decision::CreateFailed { .. }))
            .unwrap();
        assert_eq!(failed.candidate.task_type, REVIEW_REQUEST);
    }

    #[tokio::test]
    async fn test_store_query_failure_is_reported() {
        let store = Arc::new(MemoryTaskStore::new());
        store.set_fail_queries(true);

        let report = reconciler(feeds(), store).run(today()).await;
        assert!(matches!(report.store_warning, Some(Error::StoreQuery(_))));
        assert_eq!(report.summary().created, 11);
    }

    #[tokio::test]
    async fn test_duplicate_key_within_run_created_once() {
        let body = ics(&[("shared", "20260110", "20260113")]);
        let feed = StaticFeed::new()
            .with_feed(feed_url("BETSIE_ICAL_URL"), body.clone())
            .with_feed(feed_url("BETSIE_AIRBNB_ICAL_URL"), body);
        let store = Arc::new(MemoryTaskStore::new());

        let report = reconciler(feed, store.clone()).run(today()).await;
        assert_eq!(report.summary().created, 2);
        assert_eq!(report.summary().duplicates, 2);
        assert_eq!(store.create_calls(), 2);
    }
}
