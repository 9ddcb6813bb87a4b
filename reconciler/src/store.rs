//! The contract the engine needs from an external task store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::models::{ExternalTaskRecord, NewTask};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct StoreError {
    pub status: Option<u16>,
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

/// Task store operations. Tasks created by the engine carry their
/// idempotency key in `description`; the store itself has no notion of one.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Incomplete tasks matching a store-side filter query
    async fn list_tasks_by_filter(&self, query: &str) -> Result<Vec<ExternalTaskRecord>, StoreError>;

    /// Completed tasks whose due date falls in `[since, until]`
    async fn list_completed_by_due_date(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ExternalTaskRecord>, StoreError>;

    async fn create_task(&self, task: &NewTask) -> Result<ExternalTaskRecord, StoreError>;

    /// `Ok(false)` when the store did not delete anything
    async fn delete_task(&self, id: &str) -> Result<bool, StoreError>;

    async fn list_all_tasks(&self, limit: u32) -> Result<Vec<ExternalTaskRecord>, StoreError>;
}
