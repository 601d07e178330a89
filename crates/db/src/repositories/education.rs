//! Education record repository.

use std::sync::Arc;

use crate::entities::{Education, education};
use admissions_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};

/// Education record repository for database operations.
#[derive(Clone)]
pub struct EducationRepository {
    db: Arc<DatabaseConnection>,
}

impl EducationRepository {
    /// Create a new education repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Education records of an application, oldest first.
    pub async fn find_by_application(
        &self,
        application_id: &str,
    ) -> AppResult<Vec<education::Model>> {
        Education::find()
            .filter(education::Column::ApplicationId.eq(application_id))
            .order_by_asc(education::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert an education record on `conn`.
    pub async fn create_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: education::ActiveModel,
    ) -> AppResult<education::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count education records of an application on `conn`.
    pub async fn count_by_application_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        application_id: &str,
    ) -> AppResult<u64> {
        Education::find()
            .filter(education::Column::ApplicationId.eq(application_id))
            .count(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
