//! API integration tests.
//!
//! These tests drive the router end to end over a mock database.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::redundant_clone)]

use std::sync::Arc;

use admissions_api::{AppState, auth_middleware, router as api_router};
use admissions_common::{
    LocalStorage, StorageBackend,
    config::{
        ApplicationSettings, AuthConfig, Config, DatabaseConfig, NotificationSettings,
        ServerConfig, StorageSettings,
    },
};
use admissions_db::{
    entities::{
        application::ApplicationStatus,
        notification::NotificationStatus,
        user::{self, Role},
    },
    test_utils::fixtures,
};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    middleware,
};
use sea_orm::{DatabaseBackend, MockDatabase};
use serde_json::Value;
use tower::ServiceExt;

/// Create a test configuration.
fn create_test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 5000,
            url: "https://portal.example.org".to_string(),
        },
        database: DatabaseConfig {
            url: "postgres://localhost/test".to_string(),
            max_connections: 10,
            min_connections: 1,
        },
        auth: AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_ttl_hours: 1,
            reset_token_ttl_minutes: 10,
        },
        storage: StorageSettings {
            upload_dir: std::env::temp_dir()
                .join(format!("admissions-api-{}", uuid::Uuid::new_v4())),
            max_upload_bytes: 5 * 1024 * 1024,
        },
        notifications: NotificationSettings {
            from_address: "admissions@example.org".to_string(),
            ..NotificationSettings::default()
        },
        application: ApplicationSettings::default(),
        admin: None,
    }
}

/// Create test app state and router over `db`.
fn create_test_app(db: MockDatabase) -> (Router, AppState) {
    let config = create_test_config();
    let storage: Arc<dyn StorageBackend> =
        Arc::new(LocalStorage::new(config.storage.upload_dir.clone()));
    let state = AppState::build(Arc::new(db.into_connection()), &config, storage).unwrap();

    let app = api_router()
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state.clone());
    (app, state)
}

fn token_for(state: &AppState, user: &user::Model) -> String {
    state.access.issue_token(user).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_unknown_endpoint_returns_404() {
    let (app, _) = create_test_app(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/nonexistent/endpoint")
                .method("GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_reports_database() {
    let (app, _) = create_test_app(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    assert!(status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert!(body.get("database").is_some());
}

#[tokio::test]
async fn test_applications_require_token() {
    let (app, _) = create_test_app(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/applications")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_malformed_token_is_unauthenticated() {
    let (app, _) = create_test_app(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/me")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_with_invalid_email_is_validation_error() {
    let (app, _) = create_test_app(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/login")
                .method("POST")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email":"not-an-email","password":"secret1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_register_with_invalid_json_returns_error() {
    let (app, _) = create_test_app(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/register")
                .method("POST")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("invalid json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(
        response.status() == StatusCode::BAD_REQUEST
            || response.status() == StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn test_applicant_cannot_view_statistics() {
    let applicant = fixtures::user("u1", &[Role::Applicant]);
    let (app, state) = create_test_app(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[applicant.clone()]])
            .append_query_results([[fixtures::audit_log("l1", "UNAUTHORIZED_ACCESS", "u1")]]),
    );
    let token = token_for(&state, &applicant);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/stats")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(
        body["message"],
        "User role applicant is not authorized to access this route"
    );
}

#[tokio::test]
async fn test_review_with_unknown_status_is_rejected() {
    let reviewer = fixtures::user("r1", &[Role::Reviewer]);
    let (app, state) = create_test_app(
        MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[reviewer.clone()]]),
    );
    let token = token_for(&state, &reviewer);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/applications/a1/review")
                .method("PUT")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"status":"pending"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_own_applications() {
    let applicant = fixtures::user("u1", &[Role::Applicant]);
    let (app, state) = create_test_app(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[applicant.clone()]])
            .append_query_results([[fixtures::application(
                "a1",
                "u1",
                ApplicationStatus::Draft,
            )]]),
    );
    let token = token_for(&state, &applicant);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/applications")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["applicationNumber"], "BSU-1234561234");
    assert_eq!(body["data"][0]["status"], "draft");
}

#[tokio::test]
async fn test_notifications_listing() {
    let applicant = fixtures::user("u1", &[Role::Applicant]);
    let (app, state) = create_test_app(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[applicant.clone()]])
            .append_query_results([[fixtures::notification(
                "n1",
                "u1",
                NotificationStatus::Sent,
            )]]),
    );
    let token = token_for(&state, &applicant);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/notifications?limit=5")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"][0]["title"], "Application Submitted");
    assert_eq!(body["data"][0]["type"], "in_app");
}

#[tokio::test]
async fn test_admin_export_returns_csv() {
    let admin = fixtures::user("admin1", &[Role::Admin]);
    let (app, state) = create_test_app(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[admin.clone()]])
            .append_query_results([[(
                fixtures::application("a1", "u1", ApplicationStatus::Submitted),
                fixtures::user("u1", &[Role::Applicant]),
            )]])
            .append_query_results([[fixtures::audit_log("l1", "EXPORT_APPLICATIONS", "a1")]]),
    );
    let token = token_for(&state, &admin);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/export?status=submitted")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "text/csv"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("Application Number,Status"));
    assert!(text.contains("BSU-1234561234"));
}

#[tokio::test]
async fn test_reviewer_cannot_assign_roles() {
    let reviewer = fixtures::user("r1", &[Role::Reviewer]);
    let (app, state) = create_test_app(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[reviewer.clone()]])
            .append_query_results([[fixtures::audit_log("l1", "UNAUTHORIZED_ACCESS", "r1")]]),
    );
    let token = token_for(&state, &reviewer);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/users/r1/roles")
                .method("PUT")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"roles":["admin"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_assigns_reviewer_role() {
    let admin = fixtures::user("a1", &[Role::Admin]);
    let target = fixtures::user("u2", &[Role::Applicant]);
    let mut updated = target.clone();
    updated.roles = user::roles_json(&[Role::Reviewer]);
    let (app, state) = create_test_app(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[admin.clone()]])
            .append_query_results([[target]])
            .append_query_results([[updated]])
            .append_query_results([[fixtures::audit_log("l1", "ASSIGN_ROLES", "u2")]]),
    );
    let token = token_for(&state, &admin);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/users/u2/roles")
                .method("PUT")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"roles":["reviewer"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "User roles updated");
    assert_eq!(body["data"]["roles"], serde_json::json!(["reviewer"]));
}
