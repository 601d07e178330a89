//! Access control.
//!
//! Bearer tokens are HS256 JWTs whose subject is the user id. Authorization
//! is a pure policy over the caller's roles; denied attempts are audited.

use admissions_common::{AppError, AppResult, config::AuthConfig};
use admissions_db::{
    entities::user::{self, Role},
    repositories::UserRepository,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::audit::{AuditEntry, AuditService, RequestMeta, actions};

/// Token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Expiry (seconds since epoch).
    pub exp: i64,
    /// Issued at (seconds since epoch).
    pub iat: i64,
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub roles: Vec<Role>,
}

impl Principal {
    /// Whether the caller holds `role`.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Admins and reviewers.
    #[must_use]
    pub fn is_staff(&self) -> bool {
        self.has_role(Role::Admin) || self.has_role(Role::Reviewer)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    fn roles_label(&self) -> String {
        self.roles
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl From<&user::Model> for Principal {
    fn from(user: &user::Model) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            roles: user.role_set(),
        }
    }
}

/// Guarded operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Applicant self-service: own profile, applications, documents, notifications.
    ApplicantSelfService,
    ListApplications,
    ViewApplication,
    ReviewApplication,
    VerifyDocument,
    ViewStatistics,
    ViewAuditLogs,
    ExportApplications,
    DeactivateUser,
    AssignRoles,
}

impl Operation {
    /// Name used in audit descriptions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApplicantSelfService => "applicant self-service",
            Self::ListApplications => "list applications",
            Self::ViewApplication => "view application",
            Self::ReviewApplication => "review application",
            Self::VerifyDocument => "verify document",
            Self::ViewStatistics => "view statistics",
            Self::ViewAuditLogs => "view audit logs",
            Self::ExportApplications => "export applications",
            Self::DeactivateUser => "deactivate user",
            Self::AssignRoles => "assign roles",
        }
    }
}

/// Authorization policy.
#[must_use]
pub fn allowed(principal: &Principal, operation: Operation) -> bool {
    match operation {
        Operation::ApplicantSelfService => true,
        Operation::ListApplications
        | Operation::ViewApplication
        | Operation::ReviewApplication
        | Operation::VerifyDocument => principal.is_staff(),
        Operation::ViewStatistics
        | Operation::ViewAuditLogs
        | Operation::ExportApplications
        | Operation::DeactivateUser
        | Operation::AssignRoles => principal.is_admin(),
    }
}

/// Access control service.
#[derive(Clone)]
pub struct AccessService {
    user_repo: UserRepository,
    audit: AuditService,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
}

impl AccessService {
    /// Create a new access control service.
    #[must_use]
    pub fn new(user_repo: UserRepository, audit: AuditService, config: &AuthConfig) -> Self {
        Self {
            user_repo,
            audit,
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            token_ttl: Duration::hours(config.token_ttl_hours),
        }
    }

    /// Issue a bearer token for `user`.
    pub fn issue_token(&self, user: &user::Model) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            exp: (now + self.token_ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Resolve a bearer token to a principal.
    pub async fn authenticate(&self, token: Option<&str>) -> AppResult<Principal> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthenticated)?;

        let data = decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))?;

        let user = self
            .user_repo
            .find_by_id(&data.claims.sub)
            .await?
            .filter(user::Model::is_usable)
            .ok_or(AppError::Unauthenticated)?;

        Ok(Principal::from(&user))
    }

    /// Check `operation` against the policy, auditing denials.
    pub async fn authorize(
        &self,
        principal: &Principal,
        operation: Operation,
        meta: &RequestMeta,
    ) -> AppResult<()> {
        if allowed(principal, operation) {
            return Ok(());
        }

        tracing::info!(
            user_id = %principal.user_id,
            operation = operation.as_str(),
            "Access denied"
        );

        self.audit
            .record_detached(
                AuditEntry::new(
                    Some(&principal.user_id),
                    actions::UNAUTHORIZED_ACCESS,
                    "Route",
                    None,
                    format!(
                        "Unauthorized attempt to {} by user with roles [{}]",
                        operation.as_str(),
                        principal.roles_label()
                    ),
                ),
                meta,
            )
            .await;

        Err(AppError::Forbidden(format!(
            "User role {} is not authorized to access this route",
            principal.roles_label()
        )))
    }
}
