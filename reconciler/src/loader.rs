//! Existing-state loader: the idempotency keys already present in the store.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate, NaiveTime};
use shared::models::ExternalTaskRecord;

use crate::error::Error;
use crate::store::TaskStore;
use crate::window::ReconciliationWindow;

/// Snapshot of keys taken once per run
#[derive(Debug, Default)]
pub struct ExistingKeys {
    pub keys: HashSet<String>,
    /// Set when a listing failed and the snapshot may be incomplete
    pub warning: Option<Error>,
}

impl ExistingKeys {
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// Store filter for incomplete tasks due within `window`. The store's
/// `after`/`before` bounds are exclusive, so each side is widened by a day.
pub fn filter_query(window: &ReconciliationWindow) -> String {
    let us_date = |d: NaiveDate| d.format("%-m/%-d/%Y").to_string();
    format!(
        "date after: {} & date before: {}",
        us_date(window.start - Duration::days(1)),
        us_date(window.end + Duration::days(1)),
    )
}

/// Loads keys from both incomplete and completed tasks. A task completed
/// since an earlier run must still suppress its candidate.
///
/// A failed listing does not abort the run: keys from whichever listing
/// succeeded are kept and the failure is returned as a warning. Creating
/// against a partial snapshot can duplicate tasks.
#[tracing::instrument(skip(store), fields(start = %window.start, end = %window.end))]
pub async fn load_existing_keys(store: &dyn TaskStore, window: &ReconciliationWindow) -> ExistingKeys {
    let query = filter_query(window);
    let since = window.start.and_time(NaiveTime::MIN).and_utc();
    let until = (window.end + Duration::days(1)).and_time(NaiveTime::MIN).and_utc() - Duration::seconds(1);

    let (incomplete, completed) = futures::join!(
        store.list_tasks_by_filter(&query),
        store.list_completed_by_due_date(since, until),
    );

    let mut existing = ExistingKeys::default();
    let mut failures = Vec::new();

    for (label, result) in [("incomplete", incomplete), ("completed", completed)] {
        match result {
            Ok(tasks) => {
                tracing::debug!(count = tasks.len(), "Loaded {} tasks", label);
                existing.keys.extend(keys_of(&tasks));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Listing {} tasks failed, dedup snapshot is partial", label);
                failures.push(format!("{} tasks: {}", label, e));
            }
        }
    }

    if !failures.is_empty() {
        existing.warning = Some(Error::StoreQuery(failures.join("; ")));
    }

    tracing::info!(keys = existing.keys.len(), "Existing task keys loaded");
    existing
}

fn keys_of(tasks: &[ExternalTaskRecord]) -> impl Iterator<Item = String> + '_ {
    tasks
        .iter()
        .map(|t| t.description.trim())
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}
