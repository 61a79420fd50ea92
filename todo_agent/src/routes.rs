// src/routes.rs ---------------------------------------------------------------
use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{engine::TodoEngine, error::AppError, models::TaskList};

/// Shared by every request; only the credential file is mutated.
pub type AppState = Arc<TodoEngine>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/todos", get(get_todos))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

// ── GET /todos ─────────────────────────────────────────────────────────
pub async fn get_todos(State(engine): State<AppState>) -> Result<Json<TaskList>, AppError> {
    Ok(Json(engine.run().await?))
}
