use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{calendar, health, tasks};
use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))

        // Calendar: runs a reconciliation per request
        .route("/calendar", get(calendar::get_calendar))

        // Task routes
        .route("/tasks", get(tasks::list_tasks))
        .route("/task/:id", delete(tasks::delete_task))
}

pub fn create_app(state: SharedState, cors: CorsLayer) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
