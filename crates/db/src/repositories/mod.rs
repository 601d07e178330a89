//! Repositories, one per aggregate.
//!
//! Every repository holds the shared connection pool. Mutations that take
//! part in a unit of work have an `*_in` variant accepting any
//! [`ConnectionTrait`](sea_orm::ConnectionTrait), so callers can pass a
//! [`DatabaseTransaction`](sea_orm::DatabaseTransaction).

mod application;
mod audit_log;
mod document;
mod education;
mod notification;
mod user;

pub use application::{ApplicationFilter, ApplicationRepository};
pub use audit_log::{AuditLogFilter, AuditLogRepository};
pub use document::DocumentRepository;
pub use education::EducationRepository;
pub use notification::NotificationRepository;
pub use user::UserRepository;

use admissions_common::AppError;
use sea_orm::{DbErr, SqlErr};

/// Map a database error, surfacing unique-key violations as `Conflict`.
pub(crate) fn map_db_err(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => AppError::Conflict(detail),
        _ => AppError::Database(err.to_string()),
    }
}

/// Escape `%` and `_` and wrap in wildcards for a `LIKE` pattern.
pub(crate) fn like_pattern(query: &str) -> String {
    format!(
        "%{}%",
        query
            .to_lowercase()
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Jane"), "%jane%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_map_db_err_defaults_to_database() {
        let err = map_db_err(DbErr::Custom("boom".to_string()));
        assert!(matches!(err, AppError::Database(_)));
    }
}
