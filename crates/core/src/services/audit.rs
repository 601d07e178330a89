//! Audit logger.
//!
//! Every mutating action records one append-only entry. Recording never
//! fails the caller: each write runs in its own savepoint, and a failed write
//! is rolled back to that savepoint and reported through `tracing` only.

use std::sync::Arc;

use admissions_common::{AppResult, IdGenerator};
use admissions_db::{
    entities::audit_log,
    repositories::{AuditLogFilter, AuditLogRepository},
};
use chrono::Utc;
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde_json::Value;

use crate::pagination::{Paginated, Pagination};

/// Audit action names.
pub mod actions {
    pub const REGISTER: &str = "REGISTER";
    pub const LOGIN: &str = "LOGIN";
    pub const UPDATE_PROFILE: &str = "UPDATE_PROFILE";
    pub const RESET_PASSWORD: &str = "RESET_PASSWORD";
    pub const DEACTIVATE_USER: &str = "DEACTIVATE_USER";
    pub const ASSIGN_ROLES: &str = "ASSIGN_ROLES";
    pub const BOOTSTRAP_ADMIN: &str = "BOOTSTRAP_ADMIN";
    pub const CREATE_APPLICATION: &str = "CREATE_APPLICATION";
    pub const UPDATE_APPLICATION: &str = "UPDATE_APPLICATION";
    pub const ADD_EDUCATION: &str = "ADD_EDUCATION";
    pub const SUBMIT_APPLICATION: &str = "SUBMIT_APPLICATION";
    pub const DELETE_APPLICATION: &str = "DELETE_APPLICATION";
    pub const UPLOAD_DOCUMENT: &str = "UPLOAD_DOCUMENT";
    pub const DELETE_DOCUMENT: &str = "DELETE_DOCUMENT";
    pub const REVIEW_APPLICATION: &str = "REVIEW_APPLICATION";
    pub const VERIFY_DOCUMENT: &str = "VERIFY_DOCUMENT";
    pub const EXPORT_APPLICATIONS: &str = "EXPORT_APPLICATIONS";
    pub const UNAUTHORIZED_ACCESS: &str = "UNAUTHORIZED_ACCESS";
}

/// Client details captured per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    /// Client IP address.
    pub ip_address: Option<String>,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
}

/// An entry about to be recorded.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_id: Option<String>,
    pub action: &'static str,
    pub resource_type: &'static str,
    pub resource_id: Option<String>,
    pub description: String,
    pub previous_values: Option<Value>,
    pub new_values: Option<Value>,
}

impl AuditEntry {
    /// Start an entry for `action` on a resource.
    #[must_use]
    pub fn new(
        actor_id: Option<&str>,
        action: &'static str,
        resource_type: &'static str,
        resource_id: Option<&str>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            actor_id: actor_id.map(ToString::to_string),
            action,
            resource_type,
            resource_id: resource_id.map(ToString::to_string),
            description: description.into(),
            previous_values: None,
            new_values: None,
        }
    }

    /// Attach before/after snapshots.
    #[must_use]
    pub fn with_values(mut self, previous: Option<Value>, new: Option<Value>) -> Self {
        self.previous_values = previous;
        self.new_values = new;
        self
    }
}

/// Audit service.
#[derive(Clone)]
pub struct AuditService {
    db: Arc<DatabaseConnection>,
    repo: AuditLogRepository,
    id_gen: IdGenerator,
}

impl AuditService {
    /// Create a new audit service.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>, repo: AuditLogRepository) -> Self {
        Self {
            db,
            repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Record `entry` on `conn` (a pool or an open transaction).
    ///
    /// Failures are logged and swallowed.
    pub async fn record<C: TransactionTrait>(&self, conn: &C, entry: AuditEntry, meta: &RequestMeta) {
        let action = entry.action;
        if let Err(e) = self.try_record(conn, entry, meta).await {
            tracing::warn!(action = action, error = %e, "Failed to write audit log entry");
        }
    }

    /// Record `entry` on its own connection, outside any unit of work.
    pub async fn record_detached(&self, entry: AuditEntry, meta: &RequestMeta) {
        self.record(self.db.as_ref(), entry, meta).await;
    }

    async fn try_record<C: TransactionTrait>(
        &self,
        conn: &C,
        entry: AuditEntry,
        meta: &RequestMeta,
    ) -> AppResult<()> {
        let savepoint = conn.begin().await?;

        let model = audit_log::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(entry.actor_id),
            action: Set(entry.action.to_string()),
            resource_type: Set(entry.resource_type.to_string()),
            resource_id: Set(entry.resource_id),
            description: Set(entry.description),
            ip_address: Set(meta.ip_address.clone()),
            user_agent: Set(meta.user_agent.clone()),
            previous_values: Set(entry.previous_values),
            new_values: Set(entry.new_values),
            created_at: Set(Utc::now().into()),
        };

        self.repo.create_in(&savepoint, model).await?;
        savepoint.commit().await?;
        Ok(())
    }

    /// Audit entries for the admin view, newest first.
    pub async fn list(
        &self,
        filter: &AuditLogFilter,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> AppResult<Paginated<audit_log::Model>> {
        let (page, limit) = Pagination::normalize(page, limit);
        let total = self.repo.count(filter).await?;
        let items = self
            .repo
            .search(filter, Pagination::offset(page, limit), limit)
            .await?;

        Ok(Paginated {
            items,
            pagination: Pagination::new(page, limit, total),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use admissions_db::test_utils::{fixtures, transaction_log};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn service(db: MockDatabase) -> (AuditService, Arc<DatabaseConnection>) {
        let db = Arc::new(db.into_connection());
        let service = AuditService::new(db.clone(), AuditLogRepository::new(db.clone()));
        (service, db)
    }

    #[tokio::test]
    async fn test_record_writes_entry_with_request_meta() {
        let entry = fixtures::audit_log("l1", actions::SUBMIT_APPLICATION, "a1");
        let (service, db) =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[entry]]));

        let meta = RequestMeta {
            ip_address: Some("10.0.0.7".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        };
        service
            .record_detached(
                AuditEntry::new(
                    Some("u1"),
                    actions::SUBMIT_APPLICATION,
                    "Application",
                    Some("a1"),
                    "Submitted application",
                ),
                &meta,
            )
            .await;

        drop(service);
        let statements = transaction_log(db).concat();
        let insert = statements
            .iter()
            .find(|sql| sql.starts_with(r#"INSERT INTO "audit_log""#))
            .unwrap();
        assert!(insert.contains("10.0.0.7"));
        assert!(insert.contains("Mozilla/5.0"));
        assert!(insert.contains(actions::SUBMIT_APPLICATION));
    }

    #[tokio::test]
    async fn test_record_swallows_failure() {
        let (service, _db) = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([sea_orm::DbErr::Custom("audit table locked".to_string())]),
        );

        // Must not panic or propagate.
        service
            .record_detached(
                AuditEntry::new(None, actions::LOGIN, "User", None, "login"),
                &RequestMeta::default(),
            )
            .await;
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let entry = fixtures::audit_log("l1", actions::REVIEW_APPLICATION, "a1");
        let (service, _db) = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(21)),
                }]])
                .append_query_results([[entry]]),
        );

        let page = service
            .list(&AuditLogFilter::default(), Some(2), Some(20))
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.pagination.total_pages, 2);
        assert_eq!(page.pagination.current_page, 2);
    }
}
