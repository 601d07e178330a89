//! Business logic services.

#![allow(missing_docs)]

pub mod access;
pub mod application;
pub mod audit;
pub mod document;
pub mod email;
pub mod notification;
pub mod report;
pub mod review;
pub mod sms;
pub mod user;

pub use access::{AccessService, Claims, Operation, Principal, allowed};
pub use application::{
    ApplicationDetails, ApplicationFields, ApplicationService, ApplicationStatusView,
    EducationInput, UpdateApplicationInput,
};
pub use audit::{AuditEntry, AuditService, RequestMeta, actions};
pub use document::{DocumentDownload, DocumentMetadata, DocumentService, UploadedFile};
pub use email::EmailService;
pub use notification::{DeliveryResult, NotificationService, OutboundNotification};
pub use report::{ApplicationStats, CsvExport, ReportService, SettlementCounts, StatusCounts};
pub use review::{
    ApplicationWithApplicant, ReviewDetails, ReviewInput, ReviewService, VerifyDocumentInput,
};
pub use sms::SmsService;
pub use user::{
    AccountService, AuthSession, LoginInput, RegisterInput, ResetPasswordInput,
    UpdateProfileInput,
};
