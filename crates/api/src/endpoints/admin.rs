//! Admin and reviewer endpoints.

use admissions_common::{AppError, AppResult};
use admissions_core::{
    ApplicationStats, ApplicationWithApplicant, Operation, ReviewDetails, ReviewInput,
    SettlementCounts, StatusCounts, VerifyDocumentInput,
};
use admissions_db::{
    entities::{
        application::ApplicationStatus,
        audit_log::Model as AuditLogModel,
        user::{Model as UserModel, Role, SettlementSite},
    },
    repositories::{ApplicationFilter, AuditLogFilter},
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, put},
};
use serde::{Deserialize, Serialize};

use super::{
    applications::{ApplicationResponse, DocumentResponse, EducationResponse},
    auth::UserResponse,
    rfc3339,
};
use crate::{
    extractors::{AuthUser, ClientMeta},
    middleware::AppState,
    response::ApiResponse,
};

const AUDIT_LOG_DEFAULT_LIMIT: u64 = 20;

/// Replacement role set for a user.
#[derive(Debug, Deserialize)]
pub struct AssignRolesRequest {
    pub roles: Vec<Role>,
}

/// Admin application listing query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationsQuery {
    pub status: Option<String>,
    pub settlement_site: Option<String>,
    pub program: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl ApplicationsQuery {
    fn filter(&self) -> AppResult<ApplicationFilter> {
        Ok(ApplicationFilter {
            status: parse_optional::<ApplicationStatus>(self.status.as_deref())?,
            settlement_site: parse_optional::<SettlementSite>(self.settlement_site.as_deref())?,
            program: self.program.clone().filter(|p| !p.trim().is_empty()),
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Audit log query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogsQuery {
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub user_id: Option<String>,
    pub resource_id: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Review request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub status: String,
    pub comments: Option<String>,
    pub rejection_reason: Option<String>,
}

/// Application row with a short applicant summary.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationListItem {
    #[serde(flatten)]
    pub application: ApplicationResponse,
    pub user: Option<ApplicantSummary>,
}

/// Applicant fields shown in listings.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub settlement_site: SettlementSite,
}

impl From<UserModel> for ApplicantSummary {
    fn from(u: UserModel) -> Self {
        Self {
            id: u.id,
            first_name: u.first_name,
            last_name: u.last_name,
            email: u.email,
            settlement_site: u.settlement_site,
        }
    }
}

impl From<ApplicationWithApplicant> for ApplicationListItem {
    fn from(row: ApplicationWithApplicant) -> Self {
        Self {
            application: row.application.into(),
            user: row.applicant.map(Into::into),
        }
    }
}

/// Full application view for reviewers.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDetailsResponse {
    #[serde(flatten)]
    pub application: ApplicationResponse,
    pub user: Option<UserResponse>,
    pub education: Vec<EducationResponse>,
    pub documents: Vec<DocumentResponse>,
}

impl From<ReviewDetails> for ReviewDetailsResponse {
    fn from(d: ReviewDetails) -> Self {
        Self {
            application: d.application.into(),
            user: d.applicant.map(Into::into),
            education: d.education.into_iter().map(Into::into).collect(),
            documents: d.documents.into_iter().map(Into::into).collect(),
        }
    }
}

/// Dashboard statistics response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_applications: u64,
    pub by_status: StatusCounts,
    pub by_settlement_site: SettlementCounts,
    pub last_month_applications: u64,
    pub recent_applications: Vec<ApplicationListItem>,
}

impl From<ApplicationStats> for StatsResponse {
    fn from(s: ApplicationStats) -> Self {
        Self {
            total_applications: s.total_applications,
            by_status: s.by_status,
            by_settlement_site: s.by_settlement_site,
            last_month_applications: s.last_month_applications,
            recent_applications: s.recent_applications.into_iter().map(Into::into).collect(),
        }
    }
}

/// Audit log entry response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogResponse {
    pub id: String,
    pub user_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub previous_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub created_at: String,
}

impl From<AuditLogModel> for AuditLogResponse {
    fn from(l: AuditLogModel) -> Self {
        Self {
            id: l.id,
            user_id: l.user_id,
            action: l.action,
            resource_type: l.resource_type,
            resource_id: l.resource_id,
            description: l.description,
            ip_address: l.ip_address,
            user_agent: l.user_agent,
            previous_values: l.previous_values,
            new_values: l.new_values,
            created_at: rfc3339(l.created_at),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/applications", get(list_applications))
        .route("/applications/{id}", get(get_application))
        .route("/applications/{id}/review", put(review_application))
        .route(
            "/applications/{id}/documents/{document_id}/verify",
            put(verify_document),
        )
        .route("/stats", get(get_stats))
        .route("/audit-logs", get(get_audit_logs))
        .route("/export", get(export_applications))
        .route("/users/{id}/deactivate", put(deactivate_user))
        .route("/users/{id}/roles", put(assign_roles))
}

fn parse_optional<T>(value: Option<&str>) -> AppResult<Option<T>>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "all")
        .map(|v| v.parse::<T>().map_err(AppError::Validation))
        .transpose()
}

/// Filtered, paginated applications.
async fn list_applications(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Query(query): Query<ApplicationsQuery>,
) -> AppResult<ApiResponse<Vec<ApplicationListItem>>> {
    state
        .access
        .authorize(&principal, Operation::ListApplications, &meta)
        .await?;

    let filter = query.filter()?;
    let page = state.reviews.list(&filter, query.page, query.limit).await?;
    Ok(ApiResponse::page(page))
}

async fn get_application(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ReviewDetailsResponse>> {
    state
        .access
        .authorize(&principal, Operation::ViewApplication, &meta)
        .await?;

    let details = state.reviews.details(&id).await?;
    Ok(ApiResponse::ok(details.into()))
}

/// Record a review decision.
async fn review_application(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> AppResult<ApiResponse<ApplicationResponse>> {
    state
        .access
        .authorize(&principal, Operation::ReviewApplication, &meta)
        .await?;

    let status = req
        .status
        .trim()
        .parse::<ApplicationStatus>()
        .map_err(AppError::Validation)?;
    let application = state
        .reviews
        .review(
            &id,
            &principal.user_id,
            ReviewInput {
                status,
                comments: req.comments,
                rejection_reason: req.rejection_reason,
            },
            &meta,
        )
        .await?;

    Ok(ApiResponse::ok(application.into())
        .with_message("Application reviewed successfully"))
}

async fn verify_document(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Path((id, document_id)): Path<(String, String)>,
    Json(input): Json<VerifyDocumentInput>,
) -> AppResult<ApiResponse<DocumentResponse>> {
    state
        .access
        .authorize(&principal, Operation::VerifyDocument, &meta)
        .await?;

    let document = state
        .reviews
        .verify_document(&id, &document_id, &principal.user_id, input, &meta)
        .await?;
    Ok(ApiResponse::ok(document.into()))
}

async fn get_stats(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
) -> AppResult<ApiResponse<StatsResponse>> {
    state
        .access
        .authorize(&principal, Operation::ViewStatistics, &meta)
        .await?;

    let stats = state.reports.stats().await?;
    Ok(ApiResponse::ok(stats.into()))
}

async fn get_audit_logs(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Query(query): Query<AuditLogsQuery>,
) -> AppResult<ApiResponse<Vec<AuditLogResponse>>> {
    state
        .access
        .authorize(&principal, Operation::ViewAuditLogs, &meta)
        .await?;

    let filter = AuditLogFilter {
        action: query.action,
        resource_type: query.resource_type,
        user_id: query.user_id,
        resource_id: query.resource_id,
    };
    let page = state
        .audit
        .list(
            &filter,
            query.page,
            Some(query.limit.unwrap_or(AUDIT_LOG_DEFAULT_LIMIT)),
        )
        .await?;
    Ok(ApiResponse::page(page))
}

/// Download matching applications as CSV.
async fn export_applications(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Query(query): Query<ApplicationsQuery>,
) -> AppResult<Response> {
    state
        .access
        .authorize(&principal, Operation::ExportApplications, &meta)
        .await?;

    let filter = ApplicationFilter {
        search: None,
        ..query.filter()?
    };
    let export = state
        .reports
        .export_csv(&filter, &principal.user_id, &meta)
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.file_name),
            ),
        ],
        export.body,
    )
        .into_response())
}

async fn deactivate_user(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<UserResponse>> {
    state
        .access
        .authorize(&principal, Operation::DeactivateUser, &meta)
        .await?;

    let user = state
        .accounts
        .deactivate(&principal.user_id, &id, &meta)
        .await?;
    Ok(ApiResponse::ok(user.into()).with_message("User deactivated"))
}

async fn assign_roles(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<String>,
    Json(input): Json<AssignRolesRequest>,
) -> AppResult<ApiResponse<UserResponse>> {
    state
        .access
        .authorize(&principal, Operation::AssignRoles, &meta)
        .await?;

    let user = state
        .accounts
        .assign_roles(&principal.user_id, &id, input.roles, &meta)
        .await?;
    Ok(ApiResponse::ok(user.into()).with_message("User roles updated"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_applications_query_filter() {
        let query = ApplicationsQuery {
            status: Some("under_review".to_string()),
            settlement_site: Some("nakivale".to_string()),
            program: Some(" ".to_string()),
            ..ApplicationsQuery::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.status, Some(ApplicationStatus::UnderReview));
        assert_eq!(filter.settlement_site, Some(SettlementSite::Nakivale));
        assert!(filter.program.is_none());
    }

    #[test]
    fn test_applications_query_all_means_unfiltered() {
        let query = ApplicationsQuery {
            status: Some("all".to_string()),
            ..ApplicationsQuery::default()
        };
        assert!(query.filter().unwrap().status.is_none());
    }

    #[test]
    fn test_applications_query_rejects_unknown_status() {
        let query = ApplicationsQuery {
            status: Some("pending".to_string()),
            ..ApplicationsQuery::default()
        };
        assert!(matches!(query.filter(), Err(AppError::Validation(_))));
    }
}
