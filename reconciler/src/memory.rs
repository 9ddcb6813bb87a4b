//! In-memory feed and task store, for local runs and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::models::{ExternalTaskRecord, NewTask};
use tokio::sync::RwLock;

use crate::feed::{FeedClient, FetchError};
use crate::store::{StoreError, TaskStore};

/// Serves fixed payloads (or failures) by URL.
#[derive(Default)]
pub struct StaticFeed {
    feeds: HashMap<String, Result<Vec<u8>, FetchError>>,
}

impl StaticFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.feeds.insert(url.into(), Ok(body.into()));
        self
    }

    pub fn with_failure(mut self, url: impl Into<String>, status: u16, message: &str) -> Self {
        self.feeds.insert(
            url.into(),
            Err(FetchError {
                status: Some(status),
                message: message.to_string(),
            }),
        );
        self
    }
}

#[async_trait]
impl FeedClient for StaticFeed {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.feeds.get(url).cloned().unwrap_or_else(|| {
            Err(FetchError {
                status: Some(404),
                message: format!("no feed registered for {}", url),
            })
        })
    }
}

/// Task store kept in a `Vec`. The filter query is not interpreted: every
/// incomplete task is returned for it.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<Vec<ExternalTaskRecord>>,
    next_id: AtomicU64,
    create_calls: AtomicUsize,
    fail_queries: AtomicBool,
    /// Creation is rejected for tasks whose content contains any of these
    reject_content: RwLock<Vec<String>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, task: ExternalTaskRecord) {
        self.tasks.write().await.push(task);
    }

    pub async fn tasks(&self) -> Vec<ExternalTaskRecord> {
        self.tasks.read().await.clone()
    }

    pub async fn complete(&self, id: &str) {
        if let Some(task) = self.tasks.write().await.iter_mut().find(|t| t.id == id) {
            task.completed = true;
        }
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub async fn reject_content_containing(&self, needle: impl Into<String>) {
        self.reject_content.write().await.push(needle.into());
    }

    fn check_queries(&self) -> Result<(), StoreError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StoreError {
                status: Some(503),
                message: "task store unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn list_tasks_by_filter(&self, _query: &str) -> Result<Vec<ExternalTaskRecord>, StoreError> {
        self.check_queries()?;
        Ok(self
            .tasks
            .read()
            .await
            .iter()
            .filter(|t| !t.completed)
            .cloned()
            .collect())
    }

    async fn list_completed_by_due_date(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ExternalTaskRecord>, StoreError> {
        self.check_queries()?;
        let (since, until) = (since.date_naive(), until.date_naive());
        Ok(self
            .tasks
            .read()
            .await
            .iter()
            .filter(|t| t.completed)
            .filter(|t| t.due_date.is_some_and(|d| since <= d && d <= until))
            .cloned()
            .collect())
    }

    async fn create_task(&self, task: &NewTask) -> Result<ExternalTaskRecord, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if self
            .reject_content
            .read()
            .await
            .iter()
            .any(|needle| task.content.contains(needle.as_str()))
        {
            return Err(StoreError {
                status: Some(400),
                message: format!("rejected task {}", task.content),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = ExternalTaskRecord {
            id: id.to_string(),
            content: task.content.clone(),
            description: task.description.clone(),
            completed: false,
            due_date: Some(task.due.date_naive()),
            priority: 1,
            project_id: None,
            labels: task.labels.clone(),
        };
        self.tasks.write().await.push(record.clone());
        Ok(record)
    }

    async fn delete_task(&self, id: &str) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        Ok(tasks.len() != before)
    }

    async fn list_all_tasks(&self, limit: u32) -> Result<Vec<ExternalTaskRecord>, StoreError> {
        self.check_queries()?;
        Ok(self
            .tasks
            .read()
            .await
            .iter()
            .filter(|t| !t.completed)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
