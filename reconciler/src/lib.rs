//! Reconciles booking calendar feeds with an external task store.
//!
//! Each run fetches every configured feed, derives the follow-up tasks each
//! booking needs and creates the ones the store does not have yet. Tasks are
//! matched across runs by an idempotency key stored in the task description.

pub mod config;
pub mod error;
pub mod feed;
pub mod ical;
pub mod loader;
pub mod memory;
pub mod present;
pub mod reconcile;
pub mod rules;
pub mod store;
pub mod todoist;
pub mod window;

pub use config::EngineConfig;
pub use error::{ConfigError, Error, Result};
pub use feed::{FeedClient, FetchError, HttpFeedClient};
pub use reconcile::{Decision, ReconcileReport, Reconciler, SkipReason};
pub use store::{StoreError, TaskStore};
pub use todoist::TodoistClient;
pub use window::ReconciliationWindow;
