//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `admissions_test`)
//!   `TEST_DB_PASSWORD` (default: `admissions_test`)
//!   `TEST_DB_NAME` (default: `admissions_test`)

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use admissions_common::AppError;
use admissions_db::{
    entities::{application::ApplicationStatus, user::Role},
    repositories::{
        ApplicationRepository, DocumentRepository, EducationRepository, UserRepository,
    },
    test_utils::{TestDatabase, TestDbConfig, fixtures},
};
use sea_orm::{ActiveModelTrait, IntoActiveModel};

async fn fresh_db() -> TestDatabase {
    let db = TestDatabase::new().await.expect("Failed to connect");
    db.cleanup().await.expect("Cleanup failed");
    db
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_duplicate_email_is_conflict() {
    let TestDatabase { conn, .. } = fresh_db().await;
    let conn = Arc::new(conn);
    let users = UserRepository::new(conn.clone());

    let user = fixtures::user("u1", &[Role::Applicant]);
    users
        .create_in(conn.as_ref(), user.clone().into_active_model().reset_all())
        .await
        .unwrap();

    let mut duplicate = fixtures::user("u2", &[Role::Applicant]);
    duplicate.email = user.email;
    let err = users
        .create_in(conn.as_ref(), duplicate.into_active_model().reset_all())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)), "got {err:?}");
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_delete_application_cascades_children() {
    let TestDatabase { conn, .. } = fresh_db().await;
    let conn = Arc::new(conn);

    fixtures::user("u1", &[Role::Applicant])
        .into_active_model()
        .reset_all()
        .insert(conn.as_ref())
        .await
        .unwrap();
    fixtures::application("a1", "u1", ApplicationStatus::Draft)
        .into_active_model()
        .reset_all()
        .insert(conn.as_ref())
        .await
        .unwrap();
    fixtures::education("e1", "a1")
        .into_active_model()
        .reset_all()
        .insert(conn.as_ref())
        .await
        .unwrap();
    fixtures::document("d1", "a1")
        .into_active_model()
        .reset_all()
        .insert(conn.as_ref())
        .await
        .unwrap();

    let applications = ApplicationRepository::new(conn.clone());
    applications.delete_in(conn.as_ref(), "a1").await.unwrap();

    let education = EducationRepository::new(conn.clone());
    let documents = DocumentRepository::new(conn.clone());
    assert!(applications.find_by_id("a1").await.unwrap().is_none());
    assert!(education.find_by_application("a1").await.unwrap().is_empty());
    assert!(documents.find_by_application("a1").await.unwrap().is_empty());
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}
