//! API middleware and shared state.

#![allow(missing_docs)]

use std::sync::Arc;

use admissions_common::{AppResult, Config, StorageBackend};
use admissions_core::{
    AccessService, AccountService, ApplicationService, AuditService, DocumentService,
    EmailService, NotificationService, ReportService, ReviewService, SmsService,
};
use admissions_db::repositories::{
    ApplicationRepository, AuditLogRepository, DocumentRepository, EducationRepository,
    NotificationRepository, UserRepository,
};
use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use sea_orm::DatabaseConnection;

use crate::extractors::bearer_token;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub access: AccessService,
    pub accounts: AccountService,
    pub applications: ApplicationService,
    pub documents: DocumentService,
    pub reviews: ReviewService,
    pub reports: ReportService,
    pub notifications: NotificationService,
    pub audit: AuditService,
}

impl AppState {
    /// Wire repositories and services over one connection pool.
    pub fn build(
        db: Arc<DatabaseConnection>,
        config: &Config,
        storage: Arc<dyn StorageBackend>,
    ) -> AppResult<Self> {
        let user_repo = UserRepository::new(Arc::clone(&db));
        let application_repo = ApplicationRepository::new(Arc::clone(&db));
        let education_repo = EducationRepository::new(Arc::clone(&db));
        let document_repo = DocumentRepository::new(Arc::clone(&db));
        let notification_repo = NotificationRepository::new(Arc::clone(&db));
        let audit_log_repo = AuditLogRepository::new(Arc::clone(&db));

        let email = EmailService::new(&config.notifications, &config.server.url)?;
        let sms = SmsService::new(config.notifications.sms.clone());

        let audit = AuditService::new(Arc::clone(&db), audit_log_repo);
        let notifications =
            NotificationService::new(notification_repo, user_repo.clone(), email.clone(), sms);
        let access = AccessService::new(user_repo.clone(), audit.clone(), &config.auth);
        let accounts = AccountService::new(
            Arc::clone(&db),
            user_repo.clone(),
            access.clone(),
            audit.clone(),
            email,
            &config.auth,
        );
        let applications = ApplicationService::new(
            Arc::clone(&db),
            application_repo.clone(),
            education_repo.clone(),
            document_repo.clone(),
            user_repo.clone(),
            audit.clone(),
            notifications.clone(),
            Arc::clone(&storage),
            config.application.number_prefix.clone(),
        );
        let documents = DocumentService::new(
            Arc::clone(&db),
            application_repo.clone(),
            document_repo.clone(),
            applications.clone(),
            audit.clone(),
            storage,
            config.storage.max_upload_bytes,
        );
        let reviews = ReviewService::new(
            Arc::clone(&db),
            application_repo.clone(),
            education_repo,
            document_repo,
            user_repo,
            audit.clone(),
            notifications.clone(),
        );
        let reports = ReportService::new(application_repo, audit.clone());

        Ok(Self {
            db,
            access,
            accounts,
            applications,
            documents,
            reviews,
            reports,
            notifications,
            audit,
        })
    }
}

/// Authentication middleware.
///
/// Attaches the [`admissions_core::Principal`] of a valid bearer token to the
/// request. Handlers that need one reject with 401 through
/// [`crate::extractors::AuthUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(req.headers()).map(ToString::to_string) {
        match state.access.authenticate(Some(&token)).await {
            Ok(principal) => {
                req.extensions_mut().insert(principal);
            }
            Err(e) => tracing::debug!(error = %e, "Rejected bearer token"),
        }
    }

    next.run(req).await
}
