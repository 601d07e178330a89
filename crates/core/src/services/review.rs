//! Review workflow for admins and reviewers.

use std::sync::Arc;

use admissions_common::{AppError, AppResult};
use admissions_db::{
    entities::{
        application::{self, ApplicationStatus},
        document, education,
        notification::NotificationChannel,
        user,
    },
    repositories::{
        ApplicationFilter, ApplicationRepository, DocumentRepository, EducationRepository,
        UserRepository,
    },
};
use chrono::Utc;
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::Deserialize;
use serde_json::json;

use super::{
    audit::{AuditEntry, AuditService, RequestMeta, actions},
    notification::{NotificationService, OutboundNotification},
};
use crate::pagination::{Paginated, Pagination};

/// A review decision.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    pub status: ApplicationStatus,
    pub comments: Option<String>,
    pub rejection_reason: Option<String>,
}

/// A document verification decision.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyDocumentInput {
    pub verified: bool,
    pub comments: Option<String>,
}

/// An application row with its applicant.
#[derive(Debug, Clone)]
pub struct ApplicationWithApplicant {
    pub application: application::Model,
    pub applicant: Option<user::Model>,
}

/// Everything a reviewer sees for one application.
#[derive(Debug, Clone)]
pub struct ReviewDetails {
    pub application: application::Model,
    pub applicant: Option<user::Model>,
    pub education: Vec<education::Model>,
    pub documents: Vec<document::Model>,
}

/// Check that `current -> target` is a permitted review decision.
pub fn check_review(current: ApplicationStatus, target: ApplicationStatus) -> AppResult<()> {
    if !target.is_review_outcome() {
        return Err(AppError::Validation(format!(
            "Invalid review status: {target}"
        )));
    }
    if !current.is_reviewable() || !current.can_transition_to(target) {
        return Err(AppError::InvalidState(format!(
            "Cannot review application with status: {current}"
        )));
    }
    Ok(())
}

/// Title and message sent to the applicant for a review decision.
#[must_use]
pub fn review_notification(
    status: ApplicationStatus,
    first_name: &str,
    application_number: &str,
    rejection_reason: Option<&str>,
) -> Option<(&'static str, String)> {
    match status {
        ApplicationStatus::Approved => Some((
            "Application Approved",
            format!(
                "Dear {first_name}, congratulations! Your application #{application_number} has been approved."
            ),
        )),
        ApplicationStatus::Rejected => {
            let mut message = format!(
                "Dear {first_name}, we regret to inform you that your application #{application_number} has been rejected."
            );
            if let Some(reason) = rejection_reason.map(str::trim).filter(|r| !r.is_empty()) {
                message.push_str(&format!(" Reason: {reason}"));
            }
            Some(("Application Rejected", message))
        }
        ApplicationStatus::UnderReview => Some((
            "Application Under Review",
            format!("Dear {first_name}, your application #{application_number} is now under review."),
        )),
        ApplicationStatus::Waitlisted => Some((
            "Application Waitlisted",
            format!("Dear {first_name}, your application #{application_number} has been waitlisted."),
        )),
        ApplicationStatus::Draft | ApplicationStatus::Submitted => None,
    }
}

/// A new free-text value, or the prior one when the new value is absent or blank.
#[must_use]
pub fn merge_text(new: Option<String>, prior: Option<String>) -> Option<String> {
    new.map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or(prior)
}

/// Review service.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
    application_repo: ApplicationRepository,
    education_repo: EducationRepository,
    document_repo: DocumentRepository,
    user_repo: UserRepository,
    audit: AuditService,
    notifications: NotificationService,
}

impl ReviewService {
    /// Create a new review service.
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        application_repo: ApplicationRepository,
        education_repo: EducationRepository,
        document_repo: DocumentRepository,
        user_repo: UserRepository,
        audit: AuditService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            db,
            application_repo,
            education_repo,
            document_repo,
            user_repo,
            audit,
            notifications,
        }
    }

    /// Record a review decision and notify the applicant.
    pub async fn review(
        &self,
        application_id: &str,
        reviewer_id: &str,
        input: ReviewInput,
        meta: &RequestMeta,
    ) -> AppResult<application::Model> {
        let txn = self.db.begin().await?;
        let app = self
            .application_repo
            .find_by_id_in(&txn, application_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;

        let previous = app.status;
        check_review(previous, input.status)?;

        let owner = self.user_repo.find_by_id_in(&txn, &app.user_id).await?;

        let now = Utc::now();
        let comments = merge_text(input.comments, app.comments.clone());
        let rejection_reason = merge_text(input.rejection_reason.clone(), app.rejection_reason.clone());
        let mut active: application::ActiveModel = app.into();
        active.status = Set(input.status);
        active.reviewed_at = Set(Some(now.into()));
        active.reviewed_by = Set(Some(reviewer_id.to_string()));
        active.comments = Set(comments);
        active.rejection_reason = Set(rejection_reason);
        active.updated_at = Set(Some(now.into()));
        let app = self.application_repo.update_in(&txn, active).await?;

        let first_name = owner.as_ref().map_or("", |u| u.first_name.as_str());
        let pending = match review_notification(
            app.status,
            first_name,
            &app.application_number,
            input.rejection_reason.as_deref(),
        ) {
            Some((title, message)) => {
                self.notifications
                    .enqueue(
                        &txn,
                        &OutboundNotification {
                            user_id: app.user_id.clone(),
                            channel: NotificationChannel::Email,
                            title: title.to_string(),
                            message,
                            related_to: Some(app.id.clone()),
                        },
                    )
                    .await
            }
            None => None,
        };

        self.audit
            .record(
                &txn,
                AuditEntry::new(
                    Some(reviewer_id),
                    actions::REVIEW_APPLICATION,
                    "Application",
                    Some(&app.id),
                    format!("Reviewed application: Status changed to {}", app.status),
                )
                .with_values(
                    Some(json!({ "status": previous })),
                    Some(json!({ "status": app.status })),
                ),
                meta,
            )
            .await;
        txn.commit().await?;

        if let Some(pending) = pending {
            self.notifications.dispatch(pending).await;
        }

        tracing::info!(
            application_id = %app.id,
            from = %previous,
            to = %app.status,
            "Application reviewed"
        );
        Ok(app)
    }

    /// Mark a document of an application verified or rejected.
    pub async fn verify_document(
        &self,
        application_id: &str,
        document_id: &str,
        reviewer_id: &str,
        input: VerifyDocumentInput,
        meta: &RequestMeta,
    ) -> AppResult<document::Model> {
        let txn = self.db.begin().await?;
        let document = self
            .document_repo
            .find_in_application_in(&txn, application_id, document_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

        let now = Utc::now();
        let comments = merge_text(input.comments, document.comments.clone());
        let mut active: document::ActiveModel = document.into();
        active.verified = Set(input.verified);
        active.verified_by = Set(Some(reviewer_id.to_string()));
        active.verified_at = Set(Some(now.into()));
        active.comments = Set(comments);
        active.updated_at = Set(Some(now.into()));
        let document = self.document_repo.update_in(&txn, active).await?;

        let outcome = if document.verified { "verified" } else { "rejected" };
        self.audit
            .record(
                &txn,
                AuditEntry::new(
                    Some(reviewer_id),
                    actions::VERIFY_DOCUMENT,
                    "Document",
                    Some(&document.id),
                    format!("Document {outcome}: {}", document.name),
                ),
                meta,
            )
            .await;
        txn.commit().await?;

        Ok(document)
    }

    /// Filtered applications with applicants, newest first.
    pub async fn list(
        &self,
        filter: &ApplicationFilter,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> AppResult<Paginated<ApplicationWithApplicant>> {
        let (page, limit) = Pagination::normalize(page, limit);
        let total = self.application_repo.count(filter).await?;
        let rows = self
            .application_repo
            .search(filter, Pagination::offset(page, limit), Some(limit))
            .await?;

        Ok(Paginated {
            items: rows
                .into_iter()
                .map(|(application, applicant)| ApplicationWithApplicant {
                    application,
                    applicant,
                })
                .collect(),
            pagination: Pagination::new(page, limit, total),
        })
    }

    /// One application with applicant, education and documents.
    pub async fn details(&self, application_id: &str) -> AppResult<ReviewDetails> {
        let (application, applicant) = self
            .application_repo
            .find_with_owner(application_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;
        let education = self.education_repo.find_by_application(&application.id).await?;
        let documents = self.document_repo.find_by_application(&application.id).await?;

        Ok(ReviewDetails {
            application,
            applicant,
            education,
            documents,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::{email::EmailService, sms::SmsService};
    use admissions_common::config::NotificationSettings;
    use admissions_db::{
        entities::{notification::NotificationStatus, user::Role},
        repositories::{AuditLogRepository, NotificationRepository},
        test_utils::{fixtures, transaction_log},
    };
    use sea_orm::{DatabaseBackend, MockDatabase, Value};

    fn service(db: MockDatabase) -> ReviewService {
        service_with_db(db).0
    }

    fn service_with_db(db: MockDatabase) -> (ReviewService, Arc<DatabaseConnection>) {
        let db = Arc::new(db.into_connection());
        let user_repo = UserRepository::new(db.clone());
        let settings = NotificationSettings {
            from_address: "admissions@example.org".to_string(),
            ..NotificationSettings::default()
        };
        let notifications = NotificationService::new(
            NotificationRepository::new(db.clone()),
            user_repo.clone(),
            EmailService::new(&settings, "http://localhost:5000").unwrap(),
            SmsService::new(None),
        );

        let service = ReviewService::new(
            db.clone(),
            ApplicationRepository::new(db.clone()),
            EducationRepository::new(db.clone()),
            DocumentRepository::new(db.clone()),
            user_repo,
            AuditService::new(db.clone(), AuditLogRepository::new(db.clone())),
            notifications,
        );
        (service, db)
    }

    fn inserts_into<'a>(statements: &'a [String], table: &str) -> Vec<&'a String> {
        let prefix = format!(r#"INSERT INTO "{table}""#);
        statements
            .iter()
            .filter(|sql| sql.starts_with(&prefix))
            .collect()
    }

    #[test]
    fn test_check_review_transitions() {
        use ApplicationStatus::*;

        assert!(check_review(Submitted, Approved).is_ok());
        assert!(check_review(Submitted, UnderReview).is_ok());
        assert!(check_review(UnderReview, Waitlisted).is_ok());
        assert!(check_review(UnderReview, Rejected).is_ok());

        assert!(matches!(
            check_review(Draft, Approved),
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            check_review(Approved, Rejected),
            Err(AppError::InvalidState(msg)) if msg == "Cannot review application with status: approved"
        ));
        assert!(matches!(
            check_review(Submitted, Draft),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            check_review(Submitted, Submitted),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_review_notification_texts() {
        let (title, message) =
            review_notification(ApplicationStatus::Approved, "Amina", "BSU-1", None).unwrap();
        assert_eq!(title, "Application Approved");
        assert_eq!(
            message,
            "Dear Amina, congratulations! Your application #BSU-1 has been approved."
        );

        let (title, message) = review_notification(
            ApplicationStatus::Rejected,
            "Amina",
            "BSU-1",
            Some("Missing transcript"),
        )
        .unwrap();
        assert_eq!(title, "Application Rejected");
        assert_eq!(
            message,
            "Dear Amina, we regret to inform you that your application #BSU-1 has been rejected. Reason: Missing transcript"
        );

        let (_, message) =
            review_notification(ApplicationStatus::Rejected, "Amina", "BSU-1", Some("  ")).unwrap();
        assert!(!message.contains("Reason"));

        let (title, message) =
            review_notification(ApplicationStatus::UnderReview, "Amina", "BSU-1", None).unwrap();
        assert_eq!(title, "Application Under Review");
        assert_eq!(message, "Dear Amina, your application #BSU-1 is now under review.");

        let (title, message) =
            review_notification(ApplicationStatus::Waitlisted, "Amina", "BSU-1", None).unwrap();
        assert_eq!(title, "Application Waitlisted");
        assert_eq!(message, "Dear Amina, your application #BSU-1 has been waitlisted.");

        assert!(review_notification(ApplicationStatus::Submitted, "Amina", "BSU-1", None).is_none());
    }

    #[test]
    fn test_merge_text_keeps_prior_on_blank() {
        assert_eq!(
            merge_text(None, Some("prior".to_string())),
            Some("prior".to_string())
        );
        assert_eq!(
            merge_text(Some("   ".to_string()), Some("prior".to_string())),
            Some("prior".to_string())
        );
        assert_eq!(
            merge_text(Some("new".to_string()), Some("prior".to_string())),
            Some("new".to_string())
        );
    }

    #[tokio::test]
    async fn test_review_draft_is_invalid_state() {
        let draft = fixtures::application("a1", "u1", ApplicationStatus::Draft);
        let service =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[draft]]));

        let err = service
            .review(
                "a1",
                "r1",
                ReviewInput {
                    status: ApplicationStatus::Approved,
                    comments: None,
                    rejection_reason: None,
                },
                &RequestMeta::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_review_approves_and_notifies() {
        let submitted = fixtures::application("a1", "u1", ApplicationStatus::Submitted);
        let mut approved = submitted.clone();
        approved.status = ApplicationStatus::Approved;
        approved.reviewed_by = Some("r1".to_string());
        approved.reviewed_at = Some(Utc::now().into());
        let owner = fixtures::user("u1", &[Role::Applicant]);

        let (service, db) = service_with_db(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[submitted]])
                .append_query_results([[owner.clone()]])
                .append_query_results([[approved]])
                .append_query_results([[fixtures::notification(
                    "n1",
                    "u1",
                    NotificationStatus::Pending,
                )]])
                .append_query_results([[fixtures::audit_log(
                    "l1",
                    actions::REVIEW_APPLICATION,
                    "a1",
                )]])
                .append_query_results([[owner]])
                .append_query_results([[fixtures::notification(
                    "n1",
                    "u1",
                    NotificationStatus::Sent,
                )]]),
        );

        let app = service
            .review(
                "a1",
                "r1",
                ReviewInput {
                    status: ApplicationStatus::Approved,
                    comments: Some("Strong candidate".to_string()),
                    rejection_reason: None,
                },
                &RequestMeta::default(),
            )
            .await
            .unwrap();

        assert_eq!(app.status, ApplicationStatus::Approved);
        assert_eq!(app.reviewed_by.as_deref(), Some("r1"));

        drop(service);
        let log = transaction_log(db);
        let unit_of_work = &log[0];
        assert_eq!(unit_of_work.last().map(String::as_str), Some("COMMIT"));

        let notifications = inserts_into(unit_of_work, "notification");
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].contains("Application Approved"));
        assert!(notifications[0].contains("congratulations!"));

        let audits = inserts_into(unit_of_work, "audit_log");
        assert_eq!(audits.len(), 1);
        assert!(audits[0].contains(actions::REVIEW_APPLICATION));

        // Delivery is recorded outside the review's transaction.
        assert!(
            !unit_of_work
                .iter()
                .any(|sql| sql.starts_with(r#"UPDATE "notification""#))
        );
        assert!(
            log[1..]
                .concat()
                .iter()
                .any(|sql| sql.starts_with(r#"UPDATE "notification""#) && sql.contains("'sent'"))
        );
    }

    #[tokio::test]
    async fn test_review_rejection_keeps_reason_and_tells_applicant() {
        let under_review = fixtures::application("a1", "u1", ApplicationStatus::UnderReview);
        let mut rejected = under_review.clone();
        rejected.status = ApplicationStatus::Rejected;
        rejected.rejection_reason = Some("Missing transcript".to_string());
        rejected.reviewed_by = Some("r1".to_string());
        rejected.reviewed_at = Some(Utc::now().into());
        let owner = fixtures::user("u1", &[Role::Applicant]);

        let (service, db) = service_with_db(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[under_review]])
                .append_query_results([[owner.clone()]])
                .append_query_results([[rejected]])
                .append_query_results([[fixtures::notification(
                    "n1",
                    "u1",
                    NotificationStatus::Pending,
                )]])
                .append_query_results([[fixtures::audit_log(
                    "l1",
                    actions::REVIEW_APPLICATION,
                    "a1",
                )]])
                .append_query_results([[owner]])
                .append_query_results([[fixtures::notification(
                    "n1",
                    "u1",
                    NotificationStatus::Sent,
                )]]),
        );

        let app = service
            .review(
                "a1",
                "r1",
                ReviewInput {
                    status: ApplicationStatus::Rejected,
                    comments: None,
                    rejection_reason: Some("Missing transcript".to_string()),
                },
                &RequestMeta::default(),
            )
            .await
            .unwrap();
        assert_eq!(app.rejection_reason.as_deref(), Some("Missing transcript"));

        drop(service);
        let log = transaction_log(db);
        let unit_of_work = &log[0];

        let update = unit_of_work
            .iter()
            .find(|sql| sql.starts_with(r#"UPDATE "application""#))
            .unwrap();
        assert!(update.contains("'Missing transcript'"));
        assert!(update.contains("'rejected'"));

        let notifications = inserts_into(unit_of_work, "notification");
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].contains("Application Rejected"));
        assert!(notifications[0].contains("Reason: Missing transcript"));

        assert_eq!(inserts_into(unit_of_work, "audit_log").len(), 1);
    }

    #[tokio::test]
    async fn test_verify_document_of_other_application_is_not_found() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<document::Model>::new()]),
        );

        let err = service
            .verify_document(
                "a1",
                "d9",
                "r1",
                VerifyDocumentInput {
                    verified: true,
                    comments: None,
                },
                &RequestMeta::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_verify_document_sets_verifier() {
        let document = fixtures::document("d1", "a1");
        let mut verified = document.clone();
        verified.verified = true;
        verified.verified_by = Some("r1".to_string());

        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[document]])
                .append_query_results([[verified]])
                .append_query_results([[fixtures::audit_log(
                    "l1",
                    actions::VERIFY_DOCUMENT,
                    "a1",
                )]]),
        );

        let document = service
            .verify_document(
                "a1",
                "d1",
                "r1",
                VerifyDocumentInput {
                    verified: true,
                    comments: None,
                },
                &RequestMeta::default(),
            )
            .await
            .unwrap();
        assert!(document.verified);
        assert_eq!(document.verified_by.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => Value::BigInt(Some(25)),
                }]])
                .append_query_results([[(
                    fixtures::application("a1", "u1", ApplicationStatus::Submitted),
                    fixtures::user("u1", &[Role::Applicant]),
                )]]),
        );

        let page = service
            .list(&ApplicationFilter::default(), Some(3), Some(10))
            .await
            .unwrap();

        assert_eq!(page.pagination.total, 25);
        assert_eq!(page.pagination.total_pages, 3);
        assert_eq!(page.items.len(), 1);
        assert!(page.items[0].applicant.is_some());
    }
}
