//! Test utilities for database operations.
//!
//! Provides helpers for setting up and tearing down test databases, and
//! model fixtures for `MockDatabase`-backed tests.

use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Statement};
use tracing::info;

/// Test database configuration.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database username.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: std::env::var("TEST_DB_USER")
                .unwrap_or_else(|_| "admissions_test".to_string()),
            password: std::env::var("TEST_DB_PASSWORD")
                .unwrap_or_else(|_| "admissions_test".to_string()),
            database: std::env::var("TEST_DB_NAME")
                .unwrap_or_else(|_| "admissions_test".to_string()),
        }
    }
}

impl TestDbConfig {
    /// Get the database URL.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }

    /// Get URL for connecting to postgres database (for creating test DB).
    #[must_use]
    pub fn postgres_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/postgres",
            self.username, self.password, self.host, self.port
        )
    }
}

/// A test database context that manages the lifecycle of a test database.
pub struct TestDatabase {
    /// Database connection.
    pub conn: DatabaseConnection,
    /// Database configuration.
    pub config: TestDbConfig,
}

impl TestDatabase {
    /// Connect to the configured test database and run migrations.
    pub async fn new() -> Result<Self, DbErr> {
        let config = TestDbConfig::default();
        Self::with_config(config).await
    }

    /// Connect with custom configuration and run migrations.
    pub async fn with_config(config: TestDbConfig) -> Result<Self, DbErr> {
        use sea_orm_migration::MigratorTrait;

        let conn = Database::connect(&config.database_url()).await?;
        crate::migrations::Migrator::up(&conn, None).await?;

        info!(database = %config.database, "Connected to test database");

        Ok(Self { conn, config })
    }

    /// Create a uniquely named, migrated database (for parallel tests).
    pub async fn create_unique() -> Result<Self, DbErr> {
        let mut config = TestDbConfig::default();
        let unique_suffix = uuid::Uuid::new_v4().simple().to_string();
        config.database = format!("admissions_test_{}", &unique_suffix[..8]);

        // Connect to postgres to create the database
        let postgres_conn = Database::connect(&config.postgres_url()).await?;

        let create_db = format!("CREATE DATABASE \"{}\"", config.database);
        postgres_conn
            .execute(Statement::from_string(DatabaseBackend::Postgres, create_db))
            .await?;

        postgres_conn.close().await?;

        info!(database = %config.database, "Created unique test database");

        Self::with_config(config).await
    }

    /// Get the database connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Truncate every table except the migration ledger.
    pub async fn cleanup(&self) -> Result<(), DbErr> {
        let tables = self
            .conn
            .query_all(Statement::from_string(
                DatabaseBackend::Postgres,
                "SELECT tablename FROM pg_tables WHERE schemaname = 'public'".to_string(),
            ))
            .await?;

        for row in tables {
            if let Ok(table_name) = row.try_get::<String>("", "tablename") {
                if table_name == "seaql_migrations" {
                    continue;
                }

                let truncate = format!("TRUNCATE TABLE \"{table_name}\" CASCADE");
                self.conn
                    .execute(Statement::from_string(DatabaseBackend::Postgres, truncate))
                    .await?;
            }
        }

        info!("Cleaned up test database");
        Ok(())
    }

    /// Drop the test database (for unique databases).
    pub async fn drop_database(self) -> Result<(), DbErr> {
        self.conn.close().await?;

        let postgres_conn = Database::connect(&self.config.postgres_url()).await?;

        let terminate = format!(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = '{}'",
            self.config.database
        );
        postgres_conn
            .execute(Statement::from_string(DatabaseBackend::Postgres, terminate))
            .await
            .ok();

        let drop_db = format!("DROP DATABASE IF EXISTS \"{}\"", self.config.database);
        postgres_conn
            .execute(Statement::from_string(DatabaseBackend::Postgres, drop_db))
            .await?;

        postgres_conn.close().await?;

        info!(database = %self.config.database, "Dropped test database");
        Ok(())
    }
}

/// Statements a mock connection executed, one `Vec` per transaction, with
/// parameters inlined. Statements run outside a transaction appear as
/// single-statement entries.
///
/// Every other handle to the connection must be dropped first.
#[cfg(feature = "test-utils")]
#[allow(clippy::panic)]
#[must_use]
pub fn transaction_log(db: std::sync::Arc<DatabaseConnection>) -> Vec<Vec<String>> {
    let Ok(db) = std::sync::Arc::try_unwrap(db) else {
        panic!("mock connection is still shared");
    };
    db.into_transaction_log()
        .iter()
        .map(|txn| txn.statements().iter().map(ToString::to_string).collect())
        .collect()
}

/// Model fixtures with realistic defaults.
pub mod fixtures {
    use chrono::Utc;

    use crate::entities::{
        application::{self, ApplicationStatus, steps_json},
        audit_log,
        document::{self, DocumentType},
        education::{self, InstitutionType},
        notification::{self, NotificationChannel, NotificationStatus},
        user::{self, PreferredLanguage, Role, SettlementSite, roles_json},
    };

    /// An active user holding `roles`.
    #[must_use]
    pub fn user(id: &str, roles: &[Role]) -> user::Model {
        user::Model {
            id: id.to_string(),
            first_name: "Amina".to_string(),
            last_name: "Okello".to_string(),
            email: format!("{id}@example.org"),
            password_hash: String::new(),
            phone: Some("+256700000001".to_string()),
            gender: None,
            date_of_birth: None,
            nationality: Some("Congolese".to_string()),
            settlement_site: SettlementSite::Nakivale,
            refugee_id: Some("RW-0001".to_string()),
            address: None,
            city: None,
            state: None,
            country: Some("Uganda".to_string()),
            postal_code: None,
            preferred_language: PreferredLanguage::English,
            roles: roles_json(roles),
            is_active: true,
            is_verified: true,
            reset_password_token: None,
            reset_password_expires_at: None,
            last_login_at: None,
            created_at: Utc::now().into(),
            updated_at: None,
            deleted_at: None,
        }
    }

    /// An application owned by `user_id` in `status`.
    ///
    /// Drafts start on step 1 with nothing completed; any later status has
    /// every step completed and the program fields filled.
    #[must_use]
    pub fn application(id: &str, user_id: &str, status: ApplicationStatus) -> application::Model {
        let submitted = status != ApplicationStatus::Draft;
        application::Model {
            id: id.to_string(),
            application_number: "BSU-1234561234".to_string(),
            user_id: user_id.to_string(),
            status,
            current_step: if submitted { 4 } else { 1 },
            completed_steps: if submitted {
                steps_json(&[1, 2, 3, 4])
            } else {
                steps_json(&[])
            },
            program: Some("Bachelor of Science in Nursing".to_string()),
            department: Some("Health Sciences".to_string()),
            academic_year: Some("2025/2026".to_string()),
            semester: Some("1".to_string()),
            disability_status: false,
            disability_type: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            emergency_contact_relationship: None,
            submitted_at: submitted.then(|| Utc::now().into()),
            reviewed_at: None,
            reviewed_by: None,
            comments: None,
            rejection_reason: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    /// An education record of `application_id`.
    #[must_use]
    pub fn education(id: &str, application_id: &str) -> education::Model {
        education::Model {
            id: id.to_string(),
            application_id: application_id.to_string(),
            institution_name: "Nakivale Secondary School".to_string(),
            institution_type: Some(InstitutionType::HighSchool),
            country: Some("Uganda".to_string()),
            city: None,
            degree: Some("UACE".to_string()),
            field_of_study: Some("Sciences".to_string()),
            start_date: None,
            end_date: None,
            is_currently_studying: false,
            grade: Some("A".to_string()),
            description: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    /// An unverified transcript of `application_id`.
    #[must_use]
    pub fn document(id: &str, application_id: &str) -> document::Model {
        document::Model {
            id: id.to_string(),
            application_id: application_id.to_string(),
            name: "Secondary school transcript".to_string(),
            document_type: DocumentType::Transcript,
            institution: Some("Nakivale Secondary School".to_string()),
            storage_key: format!("applications/{application_id}/{id}.pdf"),
            original_file_name: "transcript.pdf".to_string(),
            file_size: 1024,
            mime_type: "application/pdf".to_string(),
            verified: false,
            verified_by: None,
            verified_at: None,
            comments: None,
            uploaded_at: Utc::now().into(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    /// An unread in-app notification for `user_id`.
    #[must_use]
    pub fn notification(
        id: &str,
        user_id: &str,
        status: NotificationStatus,
    ) -> notification::Model {
        notification::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            channel: NotificationChannel::InApp,
            title: "Application Submitted".to_string(),
            message: "Your application has been submitted.".to_string(),
            related_to: None,
            status,
            is_read: false,
            sent_at: None,
            read_at: None,
            metadata: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    /// An audit entry for an application.
    #[must_use]
    pub fn audit_log(id: &str, action: &str, application_id: &str) -> audit_log::Model {
        audit_log::Model {
            id: id.to_string(),
            user_id: None,
            action: action.to_string(),
            resource_type: "Application".to_string(),
            resource_id: Some(application_id.to_string()),
            description: format!("{action} {application_id}"),
            ip_address: Some("127.0.0.1".to_string()),
            user_agent: None,
            previous_values: None,
            new_values: None,
            created_at: Utc::now().into(),
        }
    }
}
