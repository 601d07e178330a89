//! Document repository.

use std::sync::Arc;

use crate::entities::{Document, document};
use admissions_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};

/// Document repository for database operations.
#[derive(Clone)]
pub struct DocumentRepository {
    db: Arc<DatabaseConnection>,
}

impl DocumentRepository {
    /// Create a new document repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Documents of an application, newest upload first.
    pub async fn find_by_application(
        &self,
        application_id: &str,
    ) -> AppResult<Vec<document::Model>> {
        Document::find()
            .filter(document::Column::ApplicationId.eq(application_id))
            .order_by_desc(document::Column::UploadedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a document only if it belongs to `application_id`.
    pub async fn find_in_application(
        &self,
        application_id: &str,
        document_id: &str,
    ) -> AppResult<Option<document::Model>> {
        self.find_in_application_in(self.db.as_ref(), application_id, document_id)
            .await
    }

    /// Find a document of `application_id` on `conn`.
    pub async fn find_in_application_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        application_id: &str,
        document_id: &str,
    ) -> AppResult<Option<document::Model>> {
        Document::find_by_id(document_id)
            .filter(document::Column::ApplicationId.eq(application_id))
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Storage keys of every document of an application, read on `conn`.
    pub async fn storage_keys_for_application_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        application_id: &str,
    ) -> AppResult<Vec<String>> {
        Document::find()
            .filter(document::Column::ApplicationId.eq(application_id))
            .select_only()
            .column(document::Column::StorageKey)
            .into_tuple::<String>()
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a document on `conn`.
    pub async fn create_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: document::ActiveModel,
    ) -> AppResult<document::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a document on `conn`.
    pub async fn update_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: document::ActiveModel,
    ) -> AppResult<document::Model> {
        model
            .update(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a document row on `conn`.
    pub async fn delete_in<C: ConnectionTrait>(&self, conn: &C, id: &str) -> AppResult<()> {
        Document::delete_by_id(id)
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Count documents of an application on `conn`.
    pub async fn count_by_application_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        application_id: &str,
    ) -> AppResult<u64> {
        Document::find()
            .filter(document::Column::ApplicationId.eq(application_id))
            .count(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
