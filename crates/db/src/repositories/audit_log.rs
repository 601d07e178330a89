//! Audit log repository.
//!
//! Entries are append-only; the repository exposes no update or delete.

use std::sync::Arc;

use crate::entities::{AuditLog, audit_log};
use admissions_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};

/// Filter for the admin audit view.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    /// Exact action name.
    pub action: Option<String>,
    /// Exact resource type.
    pub resource_type: Option<String>,
    /// Acting user.
    pub user_id: Option<String>,
    /// Affected resource.
    pub resource_id: Option<String>,
}

impl AuditLogFilter {
    fn condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(action) = &self.action {
            condition = condition.add(audit_log::Column::Action.eq(action.as_str()));
        }
        if let Some(resource_type) = &self.resource_type {
            condition = condition.add(audit_log::Column::ResourceType.eq(resource_type.as_str()));
        }
        if let Some(user_id) = &self.user_id {
            condition = condition.add(audit_log::Column::UserId.eq(user_id.as_str()));
        }
        if let Some(resource_id) = &self.resource_id {
            condition = condition.add(audit_log::Column::ResourceId.eq(resource_id.as_str()));
        }
        condition
    }
}

/// Audit log repository for database operations.
#[derive(Clone)]
pub struct AuditLogRepository {
    db: Arc<DatabaseConnection>,
}

impl AuditLogRepository {
    /// Create a new audit log repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Append an entry on `conn`.
    pub async fn create_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: audit_log::ActiveModel,
    ) -> AppResult<audit_log::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Entries matching `filter`, newest first.
    pub async fn search(
        &self,
        filter: &AuditLogFilter,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<audit_log::Model>> {
        AuditLog::find()
            .filter(filter.condition())
            .order_by_desc(audit_log::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count entries matching `filter`.
    pub async fn count(&self, filter: &AuditLogFilter) -> AppResult<u64> {
        AuditLog::find()
            .filter(filter.condition())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_search_returns_entries() {
        let entry = fixtures::audit_log("l1", "REVIEW_APPLICATION", "a1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[entry]])
                .into_connection(),
        );

        let repo = AuditLogRepository::new(db);
        let filter = AuditLogFilter {
            resource_id: Some("a1".to_string()),
            ..Default::default()
        };
        let entries = repo.search(&filter, 0, 20).await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "REVIEW_APPLICATION");
    }
}
