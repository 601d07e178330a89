//! Applicant application endpoints.

use admissions_common::AppResult;
use admissions_core::{
    ApplicationDetails, ApplicationFields, ApplicationStatusView, EducationInput,
    UpdateApplicationInput,
};
use admissions_db::entities::{
    application::{ApplicationStatus, Model as ApplicationModel},
    document::{DocumentType, Model as DocumentModel},
    education::{InstitutionType, Model as EducationModel},
};
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::Serialize;

use super::{rfc3339, rfc3339_opt};
use crate::{
    extractors::{AuthUser, ClientMeta},
    middleware::AppState,
    response::ApiResponse,
};

/// Application response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationResponse {
    pub id: String,
    pub application_number: String,
    pub user_id: String,
    pub status: ApplicationStatus,
    pub current_step: i32,
    pub completed_steps: Vec<i32>,
    pub program: Option<String>,
    pub department: Option<String>,
    pub academic_year: Option<String>,
    pub semester: Option<String>,
    pub disability_status: bool,
    pub disability_type: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relationship: Option<String>,
    pub submitted_at: Option<String>,
    pub reviewed_at: Option<String>,
    pub reviewed_by: Option<String>,
    pub comments: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<ApplicationModel> for ApplicationResponse {
    fn from(a: ApplicationModel) -> Self {
        let completed_steps = a.completed_step_set();
        Self {
            id: a.id,
            application_number: a.application_number,
            user_id: a.user_id,
            status: a.status,
            current_step: a.current_step,
            completed_steps,
            program: a.program,
            department: a.department,
            academic_year: a.academic_year,
            semester: a.semester,
            disability_status: a.disability_status,
            disability_type: a.disability_type,
            emergency_contact_name: a.emergency_contact_name,
            emergency_contact_phone: a.emergency_contact_phone,
            emergency_contact_relationship: a.emergency_contact_relationship,
            submitted_at: rfc3339_opt(a.submitted_at),
            reviewed_at: rfc3339_opt(a.reviewed_at),
            reviewed_by: a.reviewed_by,
            comments: a.comments,
            rejection_reason: a.rejection_reason,
            created_at: rfc3339(a.created_at),
            updated_at: rfc3339_opt(a.updated_at),
        }
    }
}

/// Education record response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationResponse {
    pub id: String,
    pub application_id: String,
    pub institution_name: String,
    pub institution_type: Option<InstitutionType>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_currently_studying: bool,
    pub grade: Option<String>,
    pub description: Option<String>,
    pub created_at: String,
}

impl From<EducationModel> for EducationResponse {
    fn from(e: EducationModel) -> Self {
        Self {
            id: e.id,
            application_id: e.application_id,
            institution_name: e.institution_name,
            institution_type: e.institution_type,
            country: e.country,
            city: e.city,
            degree: e.degree,
            field_of_study: e.field_of_study,
            start_date: e.start_date,
            end_date: e.end_date,
            is_currently_studying: e.is_currently_studying,
            grade: e.grade,
            description: e.description,
            created_at: rfc3339(e.created_at),
        }
    }
}

/// Document metadata response. The storage location is never exposed.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: String,
    pub application_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    pub institution: Option<String>,
    pub original_file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub verified: bool,
    pub verified_by: Option<String>,
    pub verified_at: Option<String>,
    pub comments: Option<String>,
    pub uploaded_at: String,
}

impl From<DocumentModel> for DocumentResponse {
    fn from(d: DocumentModel) -> Self {
        Self {
            id: d.id,
            application_id: d.application_id,
            name: d.name,
            document_type: d.document_type,
            institution: d.institution,
            original_file_name: d.original_file_name,
            file_size: d.file_size,
            mime_type: d.mime_type,
            verified: d.verified,
            verified_by: d.verified_by,
            verified_at: rfc3339_opt(d.verified_at),
            comments: d.comments,
            uploaded_at: rfc3339(d.uploaded_at),
        }
    }
}

/// Application with its education records and documents.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDetailsResponse {
    #[serde(flatten)]
    pub application: ApplicationResponse,
    pub education: Vec<EducationResponse>,
    pub documents: Vec<DocumentResponse>,
}

impl From<ApplicationDetails> for ApplicationDetailsResponse {
    fn from(details: ApplicationDetails) -> Self {
        Self {
            application: details.application.into(),
            education: details.education.into_iter().map(Into::into).collect(),
            documents: details.documents.into_iter().map(Into::into).collect(),
        }
    }
}

/// Status summary response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub id: String,
    pub application_number: String,
    pub status: ApplicationStatus,
    pub submitted_at: Option<String>,
    pub reviewed_at: Option<String>,
    pub comments: Option<String>,
    pub rejection_reason: Option<String>,
}

impl From<ApplicationStatusView> for StatusResponse {
    fn from(v: ApplicationStatusView) -> Self {
        Self {
            id: v.id,
            application_number: v.application_number,
            status: v.status,
            submitted_at: rfc3339_opt(v.submitted_at),
            reviewed_at: rfc3339_opt(v.reviewed_at),
            comments: v.comments,
            rejection_reason: v.rejection_reason,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_applications).post(create_application))
        .route(
            "/{id}",
            get(get_application)
                .put(update_application)
                .delete(delete_application),
        )
        .route("/{id}/status", get(get_status))
        .route("/{id}/submit", post(submit_application))
        .route("/{id}/education", get(list_education).post(add_education))
}

/// List the caller's applications.
async fn list_applications(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<ApplicationResponse>>> {
    let applications = state.applications.list_for_owner(&principal.user_id).await?;
    Ok(ApiResponse::list(
        applications.into_iter().map(Into::into).collect(),
    ))
}

/// Start a new draft.
async fn create_application(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Json(fields): Json<ApplicationFields>,
) -> AppResult<ApiResponse<ApplicationResponse>> {
    let application = state
        .applications
        .create(&principal.user_id, fields, &meta)
        .await?;
    Ok(ApiResponse::created(application.into()))
}

async fn get_application(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ApplicationDetailsResponse>> {
    let details = state
        .applications
        .get_for_owner(&id, &principal.user_id)
        .await?;
    Ok(ApiResponse::ok(details.into()))
}

/// Save draft fields and wizard progress.
async fn update_application(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<String>,
    Json(input): Json<UpdateApplicationInput>,
) -> AppResult<ApiResponse<ApplicationResponse>> {
    let application = state
        .applications
        .update(&id, &principal.user_id, input, &meta)
        .await?;
    Ok(ApiResponse::ok(application.into()))
}

async fn delete_application(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state
        .applications
        .delete(&id, &principal.user_id, &meta)
        .await?;
    Ok(ApiResponse::message("Application deleted successfully"))
}

async fn get_status(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<StatusResponse>> {
    let status = state
        .applications
        .status_for_owner(&id, &principal.user_id)
        .await?;
    Ok(ApiResponse::ok(status.into()))
}

/// Submit a complete draft for review.
async fn submit_application(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ApplicationResponse>> {
    let application = state
        .applications
        .submit(&id, &principal.user_id, &meta)
        .await?;
    Ok(ApiResponse::ok(application.into()).with_message("Application submitted successfully"))
}

async fn list_education(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<EducationResponse>>> {
    let records = state
        .applications
        .list_education(&id, &principal.user_id)
        .await?;
    Ok(ApiResponse::list(records.into_iter().map(Into::into).collect()))
}

async fn add_education(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<String>,
    Json(input): Json<EducationInput>,
) -> AppResult<ApiResponse<EducationResponse>> {
    let record = state
        .applications
        .add_education(&id, &principal.user_id, input, &meta)
        .await?;
    Ok(ApiResponse::created(record.into()))
}
