//! Application repository.

use std::sync::Arc;

use super::{like_pattern, map_db_err};
use crate::entities::{
    Application, User, application,
    application::ApplicationStatus,
    user::{self, SettlementSite},
};
use admissions_common::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Expr, Func},
};

/// Admin-side filter over applications and their owners.
#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    /// Exact status.
    pub status: Option<ApplicationStatus>,
    /// Owner's settlement site.
    pub settlement_site: Option<SettlementSite>,
    /// Exact program name.
    pub program: Option<String>,
    /// Case-insensitive match on owner first name, last name or email.
    pub search: Option<String>,
}

impl ApplicationFilter {
    fn condition(&self) -> Condition {
        let mut condition = Condition::all();

        if let Some(status) = self.status {
            condition = condition.add(application::Column::Status.eq(status));
        }
        if let Some(site) = self.settlement_site {
            condition = condition.add(user::Column::SettlementSite.eq(site));
        }
        if let Some(program) = self.program.as_deref().filter(|p| !p.is_empty()) {
            condition = condition.add(application::Column::Program.eq(program));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_pattern(search);
            condition = condition.add(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col((User, user::Column::FirstName))))
                            .like(&pattern),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col((User, user::Column::LastName))))
                            .like(&pattern),
                    )
                    .add(user::Column::Email.like(&pattern)),
            );
        }

        condition
    }
}

/// Application repository for database operations.
#[derive(Clone)]
pub struct ApplicationRepository {
    db: Arc<DatabaseConnection>,
}

impl ApplicationRepository {
    /// Create a new application repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an application by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<application::Model>> {
        self.find_by_id_in(self.db.as_ref(), id).await
    }

    /// Find an application by ID on `conn`.
    pub async fn find_by_id_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<Option<application::Model>> {
        Application::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an application on `conn` and hold its row lock until the
    /// surrounding transaction ends (`SELECT ... FOR UPDATE`).
    pub async fn find_by_id_for_update_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<Option<application::Model>> {
        Application::find_by_id(id)
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an application by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<application::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))
    }

    /// Find an application together with its owner.
    pub async fn find_with_owner(
        &self,
        id: &str,
    ) -> AppResult<Option<(application::Model, Option<user::Model>)>> {
        Application::find_by_id(id)
            .find_also_related(User)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Applications owned by `user_id`, newest first.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<application::Model>> {
        Application::find()
            .filter(application::Column::UserId.eq(user_id))
            .order_by_desc(application::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert an application. A duplicate application number yields `Conflict`.
    pub async fn create_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: application::ActiveModel,
    ) -> AppResult<application::Model> {
        model.insert(conn).await.map_err(map_db_err)
    }

    /// Update an application on `conn`.
    pub async fn update_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: application::ActiveModel,
    ) -> AppResult<application::Model> {
        model.update(conn).await.map_err(map_db_err)
    }

    /// Delete an application. Education and document rows cascade.
    pub async fn delete_in<C: ConnectionTrait>(&self, conn: &C, id: &str) -> AppResult<()> {
        Application::delete_by_id(id)
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Filtered applications with owners, newest first.
    pub async fn search(
        &self,
        filter: &ApplicationFilter,
        offset: u64,
        limit: Option<u64>,
    ) -> AppResult<Vec<(application::Model, Option<user::Model>)>> {
        let mut query = Application::find()
            .find_also_related(User)
            .filter(filter.condition())
            .order_by_desc(application::Column::CreatedAt)
            .offset(offset);

        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        query
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count applications matching `filter`.
    pub async fn count(&self, filter: &ApplicationFilter) -> AppResult<u64> {
        Application::find()
            .inner_join(User)
            .filter(filter.condition())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count applications created at or after `since`.
    pub async fn count_created_since(&self, since: DateTime<Utc>) -> AppResult<u64> {
        Application::find()
            .filter(application::Column::CreatedAt.gte(since))
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
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_find_by_user_returns_applications() {
        let a1 = fixtures::application("a1", "u1", ApplicationStatus::Draft);
        let a2 = fixtures::application("a2", "u1", ApplicationStatus::Submitted);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[a1, a2]])
                .into_connection(),
        );

        let repo = ApplicationRepository::new(db);
        let found = repo.find_by_user("u1").await.unwrap();

        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|a| a.user_id == "u1"));
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<application::Model>::new()])
                .into_connection(),
        );

        let repo = ApplicationRepository::new(db);
        let err = repo.get_by_id("missing").await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(msg) if msg == "Application not found"));
    }

    #[tokio::test]
    async fn test_count_returns_correct_count() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(7)),
                }]])
                .into_connection(),
        );

        let repo = ApplicationRepository::new(db);
        let filter = ApplicationFilter {
            status: Some(ApplicationStatus::Submitted),
            search: Some("okello".to_string()),
            ..Default::default()
        };

        assert_eq!(repo.count(&filter).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_delete_in() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = ApplicationRepository::new(db.clone());
        repo.delete_in(db.as_ref(), "a1").await.unwrap();
    }
}
