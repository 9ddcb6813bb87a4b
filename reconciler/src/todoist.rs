//! Todoist REST client implementing [`TaskStore`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::models::{ExternalTaskRecord, NewTask};

use crate::store::{StoreError, TaskStore};

const PAGE_SIZE: u32 = 200;

pub struct TodoistClient {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct TodoistDue {
    date: String,
}

#[derive(Debug, Deserialize)]
struct TodoistTask {
    id: String,
    content: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    checked: bool,
    #[serde(default)]
    completed_at: Option<String>,
    #[serde(default)]
    due: Option<TodoistDue>,
    #[serde(default = "default_priority")]
    priority: u8,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
}

fn default_priority() -> u8 {
    1
}

impl From<TodoistTask> for ExternalTaskRecord {
    fn from(task: TodoistTask) -> Self {
        // Due dates come back either as `YYYY-MM-DD` or a full date-time.
        let due_date = task
            .due
            .as_ref()
            .and_then(|d| d.date.get(..10))
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        ExternalTaskRecord {
            id: task.id,
            content: task.content,
            description: task.description,
            completed: task.checked || task.completed_at.is_some(),
            due_date,
            priority: task.priority,
            project_id: task.project_id,
            labels: task.labels,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default, alias = "items")]
    results: Vec<TodoistTask>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateTaskBody<'a> {
    content: &'a str,
    description: &'a str,
    due_date: String,
    labels: &'a [String],
}

impl TodoistClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, StoreError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError {
                status: Some(status.as_u16()),
                message: format!("Todoist returned {}: {}", status, body.trim()),
            });
        }
        response.json::<T>().await.map_err(transport_error)
    }

    /// Follows `next_cursor` until exhausted or `limit` tasks are collected.
    async fn paginate(
        &self,
        path: &str,
        params: &[(&str, String)],
        limit: Option<u32>,
    ) -> Result<Vec<ExternalTaskRecord>, StoreError> {
        let mut tasks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page_size = match limit {
                Some(limit) => PAGE_SIZE.min(limit.saturating_sub(tasks.len() as u32)),
                None => PAGE_SIZE,
            };
            if page_size == 0 {
                break;
            }

            let mut request = self
                .get(path)
                .query(params)
                .query(&[("limit", page_size.to_string())]);
            if let Some(ref c) = cursor {
                request = request.query(&[("cursor", c)]);
            }

            let page: Page = Self::send_json(request).await?;
            tasks.extend(page.results.into_iter().map(ExternalTaskRecord::from));

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tasks)
    }
}

fn transport_error(err: reqwest::Error) -> StoreError {
    StoreError {
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}

#[async_trait]
impl TaskStore for TodoistClient {
    async fn list_tasks_by_filter(&self, query: &str) -> Result<Vec<ExternalTaskRecord>, StoreError> {
        self.paginate("/tasks/filter", &[("query", query.to_string())], None)
            .await
    }

    async fn list_completed_by_due_date(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ExternalTaskRecord>, StoreError> {
        let params = [
            ("since", since.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("until", until.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ];
        self.paginate("/tasks/completed/by_due_date", &params, None)
            .await
    }

    async fn create_task(&self, task: &NewTask) -> Result<ExternalTaskRecord, StoreError> {
        let body = CreateTaskBody {
            content: &task.content,
            description: &task.description,
            due_date: task.due.format("%Y-%m-%d").to_string(),
            labels: &task.labels,
        };
        let request = self
            .client
            .post(format!("{}/tasks", self.base_url))
            .bearer_auth(&self.token)
            .json(&body);

        let created: TodoistTask = Self::send_json(request).await?;
        Ok(created.into())
    }

    async fn delete_task(&self, id: &str) -> Result<bool, StoreError> {
        let response = self
            .client
            .delete(format!("{}/tasks/{}", self.base_url, id))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(StoreError {
                status: Some(s.as_u16()),
                message: format!("Todoist returned {}", s),
            }),
        }
    }

    async fn list_all_tasks(&self, limit: u32) -> Result<Vec<ExternalTaskRecord>, StoreError> {
        self.paginate("/tasks", &[], Some(limit)).await
    }
}
