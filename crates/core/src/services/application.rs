//! Application aggregate.
//!
//! An application is owned by one applicant and is editable only while in
//! draft. Every mutation loads the application inside its transaction, checks
//! ownership and status there, and writes its audit entry in the same unit of
//! work.

use std::sync::Arc;

use admissions_common::{AppError, AppResult, IdGenerator, StorageBackend};
use admissions_db::{
    entities::{
        application::{self, ApplicationStatus, steps_json},
        document, education,
        education::InstitutionType,
        notification::NotificationChannel,
    },
    repositories::{
        ApplicationRepository, DocumentRepository, EducationRepository, UserRepository,
    },
};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use super::{
    audit::{AuditEntry, AuditService, RequestMeta, actions},
    notification::{NotificationService, OutboundNotification},
};

/// Wizard steps: personal/program info, education, documents, review.
pub const STEP_PROGRAM: i32 = 1;
pub const STEP_EDUCATION: i32 = 2;
pub const STEP_DOCUMENTS: i32 = 3;
pub const STEP_REVIEW: i32 = 4;
const ALL_STEPS: [i32; 4] = [STEP_PROGRAM, STEP_EDUCATION, STEP_DOCUMENTS, STEP_REVIEW];

/// Program and personal fields of an application.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationFields {
    #[validate(length(max = 200))]
    pub program: Option<String>,
    #[validate(length(max = 200))]
    pub department: Option<String>,
    #[validate(length(max = 20))]
    pub academic_year: Option<String>,
    #[validate(length(max = 20))]
    pub semester: Option<String>,
    pub disability_status: Option<bool>,
    pub disability_type: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relationship: Option<String>,
}

/// Partial update of a draft, including the wizard position.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApplicationInput {
    #[serde(flatten)]
    #[validate(nested)]
    pub fields: ApplicationFields,
    #[validate(range(min = 1, max = 4))]
    pub current_step: Option<i32>,
    pub completed_steps: Option<Vec<i32>>,
}

/// A new education record.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EducationInput {
    #[validate(length(min = 1, max = 200, message = "Institution name is required"))]
    pub institution_name: String,
    pub institution_type: Option<InstitutionType>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_currently_studying: bool,
    pub grade: Option<String>,
    pub description: Option<String>,
}

/// An application with its education records and documents.
#[derive(Debug, Clone)]
pub struct ApplicationDetails {
    pub application: application::Model,
    pub education: Vec<education::Model>,
    pub documents: Vec<document::Model>,
}

/// Status projection shown to the applicant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatusView {
    pub id: String,
    pub application_number: String,
    pub status: ApplicationStatus,
    pub submitted_at: Option<DateTime<FixedOffset>>,
    pub reviewed_at: Option<DateTime<FixedOffset>>,
    pub comments: Option<String>,
    pub rejection_reason: Option<String>,
}

impl From<application::Model> for ApplicationStatusView {
    fn from(app: application::Model) -> Self {
        Self {
            id: app.id,
            application_number: app.application_number,
            status: app.status,
            submitted_at: app.submitted_at,
            reviewed_at: app.reviewed_at,
            comments: app.comments,
            rejection_reason: app.rejection_reason,
        }
    }
}

/// Fail unless `caller_id` owns `app` and it is still a draft.
pub fn ensure_owner_and_draft(
    app: &application::Model,
    caller_id: &str,
    action: &str,
) -> AppResult<()> {
    if app.user_id != caller_id {
        return Err(AppError::Forbidden(format!(
            "Not authorized to {action} this application"
        )));
    }
    if !app.status.is_editable() {
        return Err(AppError::InvalidState(format!(
            "Cannot {action} submitted application"
        )));
    }
    Ok(())
}

/// Steps after completing `step`, and the wizard position after moving to
/// at least `next`.
#[must_use]
pub fn advance_steps(app: &application::Model, step: i32, next: i32) -> (Vec<i32>, i32) {
    let mut steps = app.completed_step_set();
    if !steps.contains(&step) {
        steps.push(step);
        steps.sort_unstable();
    }
    (steps, app.current_step.max(next))
}

/// Submission preconditions.
pub fn check_complete(
    app: &application::Model,
    education_count: u64,
    document_count: u64,
) -> AppResult<()> {
    let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
    if blank(&app.program) || blank(&app.department) || blank(&app.academic_year) {
        return Err(AppError::IncompleteApplication(
            "Application is incomplete".to_string(),
        ));
    }
    if education_count == 0 {
        return Err(AppError::IncompleteApplication(
            "Education records are required".to_string(),
        ));
    }
    if document_count == 0 {
        return Err(AppError::IncompleteApplication(
            "Required documents are missing".to_string(),
        ));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_steps(steps: Vec<i32>) -> Vec<i32> {
    let mut steps: Vec<i32> = steps.into_iter().filter(|s| ALL_STEPS.contains(s)).collect();
    steps.sort_unstable();
    steps.dedup();
    steps
}

/// Application service.
#[derive(Clone)]
pub struct ApplicationService {
    db: Arc<DatabaseConnection>,
    application_repo: ApplicationRepository,
    education_repo: EducationRepository,
    document_repo: DocumentRepository,
    user_repo: UserRepository,
    audit: AuditService,
    notifications: NotificationService,
    storage: Arc<dyn StorageBackend>,
    id_gen: IdGenerator,
    number_prefix: String,
}

impl ApplicationService {
    /// Create a new application service.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        application_repo: ApplicationRepository,
        education_repo: EducationRepository,
        document_repo: DocumentRepository,
        user_repo: UserRepository,
        audit: AuditService,
        notifications: NotificationService,
        storage: Arc<dyn StorageBackend>,
        number_prefix: impl Into<String>,
    ) -> Self {
        Self {
            db,
            application_repo,
            education_repo,
            document_repo,
            user_repo,
            audit,
            notifications,
            storage,
            id_gen: IdGenerator::new(),
            number_prefix: number_prefix.into(),
        }
    }

    /// Load an application on `conn` and check it may be changed by `caller_id`.
    async fn load_draft<C: ConnectionTrait>(
        &self,
        conn: &C,
        application_id: &str,
        caller_id: &str,
        action: &str,
    ) -> AppResult<application::Model> {
        let app = self
            .application_repo
            .find_by_id_for_update_in(conn, application_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;
        ensure_owner_and_draft(&app, caller_id, action)?;
        Ok(app)
    }

    /// Start a draft.
    pub async fn create(
        &self,
        owner_id: &str,
        fields: ApplicationFields,
        meta: &RequestMeta,
    ) -> AppResult<application::Model> {
        fields.validate()?;

        let model = application::ActiveModel {
            id: Set(self.id_gen.generate()),
            application_number: Set(self.id_gen.generate_application_number(&self.number_prefix)),
            user_id: Set(owner_id.to_string()),
            status: Set(ApplicationStatus::Draft),
            current_step: Set(STEP_PROGRAM),
            completed_steps: Set(steps_json(&[])),
            program: Set(non_blank(fields.program)),
            department: Set(non_blank(fields.department)),
            academic_year: Set(non_blank(fields.academic_year)),
            semester: Set(non_blank(fields.semester)),
            disability_status: Set(fields.disability_status.unwrap_or(false)),
            disability_type: Set(non_blank(fields.disability_type)),
            emergency_contact_name: Set(non_blank(fields.emergency_contact_name)),
            emergency_contact_phone: Set(non_blank(fields.emergency_contact_phone)),
            emergency_contact_relationship: Set(non_blank(fields.emergency_contact_relationship)),
            submitted_at: Set(None),
            reviewed_at: Set(None),
            reviewed_by: Set(None),
            comments: Set(None),
            rejection_reason: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let txn = self.db.begin().await?;
        let app = self.application_repo.create_in(&txn, model).await?;
        self.audit
            .record(
                &txn,
                AuditEntry::new(
                    Some(owner_id),
                    actions::CREATE_APPLICATION,
                    "Application",
                    Some(&app.id),
                    "Created new application",
                )
                .with_values(None, Some(json!({ "applicationNumber": app.application_number }))),
                meta,
            )
            .await;
        txn.commit().await?;

        tracing::info!(application_id = %app.id, number = %app.application_number, "Created application");
        Ok(app)
    }

    /// Apply a partial update to a draft.
    pub async fn update(
        &self,
        application_id: &str,
        caller_id: &str,
        input: UpdateApplicationInput,
        meta: &RequestMeta,
    ) -> AppResult<application::Model> {
        input.validate()?;

        let txn = self.db.begin().await?;
        let app = self.load_draft(&txn, application_id, caller_id, "update").await?;

        let fields = input.fields;
        let mut active: application::ActiveModel = app.into();
        for (column, value) in [
            (&mut active.program, fields.program),
            (&mut active.department, fields.department),
            (&mut active.academic_year, fields.academic_year),
            (&mut active.semester, fields.semester),
            (&mut active.disability_type, fields.disability_type),
            (&mut active.emergency_contact_name, fields.emergency_contact_name),
            (&mut active.emergency_contact_phone, fields.emergency_contact_phone),
            (
                &mut active.emergency_contact_relationship,
                fields.emergency_contact_relationship,
            ),
        ] {
            if let Some(value) = non_blank(value) {
                *column = Set(Some(value));
            }
        }
        if let Some(disability_status) = fields.disability_status {
            active.disability_status = Set(disability_status);
        }
        if let Some(step) = input.current_step {
            active.current_step = Set(step);
        }
        if let Some(steps) = input.completed_steps {
            active.completed_steps = Set(steps_json(&normalize_steps(steps)));
        }
        active.updated_at = Set(Some(Utc::now().into()));

        let app = self.application_repo.update_in(&txn, active).await?;
        self.audit
            .record(
                &txn,
                AuditEntry::new(
                    Some(caller_id),
                    actions::UPDATE_APPLICATION,
                    "Application",
                    Some(&app.id),
                    "Updated application",
                ),
                meta,
            )
            .await;
        txn.commit().await?;

        Ok(app)
    }

    /// Add an education record to a draft.
    pub async fn add_education(
        &self,
        application_id: &str,
        caller_id: &str,
        input: EducationInput,
        meta: &RequestMeta,
    ) -> AppResult<education::Model> {
        input.validate()?;

        let txn = self.db.begin().await?;
        let app = self.load_draft(&txn, application_id, caller_id, "update").await?;

        let model = education::ActiveModel {
            id: Set(self.id_gen.generate()),
            application_id: Set(app.id.clone()),
            institution_name: Set(input.institution_name.trim().to_string()),
            institution_type: Set(input.institution_type),
            country: Set(non_blank(input.country)),
            city: Set(non_blank(input.city)),
            degree: Set(non_blank(input.degree)),
            field_of_study: Set(non_blank(input.field_of_study)),
            start_date: Set(input.start_date),
            end_date: Set(input.end_date),
            is_currently_studying: Set(input.is_currently_studying),
            grade: Set(non_blank(input.grade)),
            description: Set(non_blank(input.description)),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };
        let record = self.education_repo.create_in(&txn, model).await?;

        self.complete_step(&txn, app, STEP_EDUCATION, STEP_DOCUMENTS)
            .await?;

        self.audit
            .record(
                &txn,
                AuditEntry::new(
                    Some(caller_id),
                    actions::ADD_EDUCATION,
                    "Education",
                    Some(&record.id),
                    "Added education record",
                ),
                meta,
            )
            .await;
        txn.commit().await?;

        Ok(record)
    }

    /// Insert a document row for a draft on the caller's transaction.
    ///
    /// The blob must already be stored; auditing is left to the caller.
    pub async fn attach_document<C: ConnectionTrait>(
        &self,
        conn: &C,
        application_id: &str,
        caller_id: &str,
        model: document::ActiveModel,
    ) -> AppResult<document::Model> {
        let app = self.load_draft(conn, application_id, caller_id, "update").await?;
        let document = self.document_repo.create_in(conn, model).await?;
        self.complete_step(conn, app, STEP_DOCUMENTS, STEP_REVIEW)
            .await?;
        Ok(document)
    }

    async fn complete_step<C: ConnectionTrait>(
        &self,
        conn: &C,
        app: application::Model,
        step: i32,
        next: i32,
    ) -> AppResult<()> {
        let (steps, current_step) = advance_steps(&app, step, next);
        if steps == app.completed_step_set() && current_step == app.current_step {
            return Ok(());
        }

        let mut active: application::ActiveModel = app.into();
        active.completed_steps = Set(steps_json(&steps));
        active.current_step = Set(current_step);
        active.updated_at = Set(Some(Utc::now().into()));
        self.application_repo.update_in(conn, active).await?;
        Ok(())
    }

    /// Submit a complete draft for review.
    pub async fn submit(
        &self,
        application_id: &str,
        caller_id: &str,
        meta: &RequestMeta,
    ) -> AppResult<application::Model> {
        let txn = self.db.begin().await?;
        let app = self
            .application_repo
            .find_by_id_for_update_in(&txn, application_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;

        if app.user_id != caller_id {
            return Err(AppError::Forbidden(
                "Not authorized to submit this application".to_string(),
            ));
        }
        if !app.status.can_transition_to(ApplicationStatus::Submitted) {
            return Err(AppError::InvalidState(
                "Application already submitted".to_string(),
            ));
        }

        let education_count = self
            .education_repo
            .count_by_application_in(&txn, &app.id)
            .await?;
        let document_count = self
            .document_repo
            .count_by_application_in(&txn, &app.id)
            .await?;
        check_complete(&app, education_count, document_count)?;

        let now = Utc::now();
        let mut active: application::ActiveModel = app.into();
        active.status = Set(ApplicationStatus::Submitted);
        active.submitted_at = Set(Some(now.into()));
        active.completed_steps = Set(steps_json(&ALL_STEPS));
        active.current_step = Set(STEP_REVIEW);
        active.updated_at = Set(Some(now.into()));
        let app = self.application_repo.update_in(&txn, active).await?;

        let first_name = self
            .user_repo
            .find_by_id_in(&txn, caller_id)
            .await?
            .map(|u| u.first_name)
            .unwrap_or_default();

        let pending = self
            .notifications
            .enqueue(
                &txn,
                &OutboundNotification {
                    user_id: caller_id.to_string(),
                    channel: NotificationChannel::Email,
                    title: "Application Submitted".to_string(),
                    message: format!(
                        "Dear {first_name}, your application #{} has been successfully submitted. We will review it shortly.",
                        app.application_number
                    ),
                    related_to: Some(app.id.clone()),
                },
            )
            .await;

        self.audit
            .record(
                &txn,
                AuditEntry::new(
                    Some(caller_id),
                    actions::SUBMIT_APPLICATION,
                    "Application",
                    Some(&app.id),
                    "Submitted application",
                )
                .with_values(
                    Some(json!({ "status": ApplicationStatus::Draft })),
                    Some(json!({ "status": ApplicationStatus::Submitted })),
                ),
                meta,
            )
            .await;
        txn.commit().await?;

        if let Some(pending) = pending {
            self.notifications.dispatch(pending).await;
        }

        tracing::info!(application_id = %app.id, "Application submitted");
        Ok(app)
    }

    /// Delete a draft with its education records, documents and stored files.
    pub async fn delete(
        &self,
        application_id: &str,
        caller_id: &str,
        meta: &RequestMeta,
    ) -> AppResult<()> {
        let txn = self.db.begin().await?;
        let app = self.load_draft(&txn, application_id, caller_id, "delete").await?;

        let storage_keys = self
            .document_repo
            .storage_keys_for_application_in(&txn, &app.id)
            .await?;

        self.application_repo.delete_in(&txn, &app.id).await?;
        self.audit
            .record(
                &txn,
                AuditEntry::new(
                    Some(caller_id),
                    actions::DELETE_APPLICATION,
                    "Application",
                    Some(&app.id),
                    "Deleted application",
                )
                .with_values(Some(json!({ "applicationNumber": app.application_number })), None),
                meta,
            )
            .await;
        txn.commit().await?;

        for key in storage_keys {
            if let Err(e) = self.storage.delete(&key).await {
                tracing::warn!(application_id = %app.id, error = %e, "Failed to remove stored document");
            }
        }

        Ok(())
    }

    /// Applications owned by `owner_id`, newest first.
    pub async fn list_for_owner(&self, owner_id: &str) -> AppResult<Vec<application::Model>> {
        self.application_repo.find_by_user(owner_id).await
    }

    async fn find_owned(
        &self,
        application_id: &str,
        caller_id: &str,
    ) -> AppResult<application::Model> {
        self.application_repo
            .find_by_id(application_id)
            .await?
            .filter(|app| app.user_id == caller_id)
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))
    }

    /// One of the caller's applications with education and documents.
    pub async fn get_for_owner(
        &self,
        application_id: &str,
        caller_id: &str,
    ) -> AppResult<ApplicationDetails> {
        let application = self.find_owned(application_id, caller_id).await?;
        let education = self.education_repo.find_by_application(&application.id).await?;
        let documents = self.document_repo.find_by_application(&application.id).await?;

        Ok(ApplicationDetails {
            application,
            education,
            documents,
        })
    }

    /// Status of one of the caller's applications.
    pub async fn status_for_owner(
        &self,
        application_id: &str,
        caller_id: &str,
    ) -> AppResult<ApplicationStatusView> {
        self.find_owned(application_id, caller_id)
            .await
            .map(ApplicationStatusView::from)
    }

    /// Education records of one of the caller's applications.
    pub async fn list_education(
        &self,
        application_id: &str,
        caller_id: &str,
    ) -> AppResult<Vec<education::Model>> {
        let app = self.find_owned(application_id, caller_id).await?;
        self.education_repo.find_by_application(&app.id).await
    }
}
