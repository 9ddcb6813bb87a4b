use std::sync::Arc;

use reconciler::{Reconciler, TaskStore};

/// Shared by every handler
pub struct AppState {
    pub reconciler: Reconciler,
}

impl AppState {
    pub fn new(reconciler: Reconciler) -> Arc<Self> {
        Arc::new(Self { reconciler })
    }

    pub fn store(&self) -> &dyn TaskStore {
        self.reconciler.store().as_ref()
    }

    pub fn task_list_limit(&self) -> u32 {
        self.reconciler.config().task_list_limit
    }
}

pub type SharedState = Arc<AppState>;
