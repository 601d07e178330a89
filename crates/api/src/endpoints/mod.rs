//! API endpoints.

mod admin;
mod applications;
mod auth;
mod documents;
mod health;
mod notifications;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/applications", applications::router())
        .nest("/documents", documents::router())
        .nest("/notifications", notifications::router())
        .nest("/admin", admin::router())
        .merge(health::router())
}

fn rfc3339(value: chrono::DateTime<chrono::FixedOffset>) -> String {
    value.to_rfc3339()
}

fn rfc3339_opt(value: Option<chrono::DateTime<chrono::FixedOffset>>) -> Option<String> {
    value.map(rfc3339)
}
