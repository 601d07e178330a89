//! Database entities.

pub mod application;
pub mod audit_log;
pub mod document;
pub mod education;
pub mod notification;
pub mod user;

pub use application::Entity as Application;
pub use audit_log::Entity as AuditLog;
pub use document::Entity as Document;
pub use education::Entity as Education;
pub use notification::Entity as Notification;
pub use user::Entity as User;
