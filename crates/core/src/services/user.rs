//! Accounts: registration, sign-in, profile and password reset.

use std::sync::{Arc, LazyLock};

use admissions_common::{
    AppError, AppResult, IdGenerator,
    config::{AdminBootstrap, AuthConfig},
};
use admissions_db::{
    entities::user::{self, Gender, PreferredLanguage, Role, SettlementSite, roles_json},
    repositories::UserRepository,
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, NaiveDate, Utc};
use regex::Regex;
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::Deserialize;
use validator::{Validate, ValidateEmail};

use super::{
    access::AccessService,
    audit::{AuditEntry, AuditService, RequestMeta, actions},
    email::EmailService,
};

// E.164-style: a plus sign and 10 to 15 digits
#[allow(clippy::unwrap_used)]
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+\d{10,15}$").unwrap());

const INVALID_RESET_TOKEN: &str = "Invalid or expired token";
const MIN_PASSWORD_LEN: usize = 6;

/// Input for registering an applicant account.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 6, max = 128, message = "Password must be at least 6 characters"))]
    pub password: String,

    pub phone: Option<String>,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub settlement_site: Option<SettlementSite>,
    pub refugee_id: Option<String>,
    pub preferred_language: Option<PreferredLanguage>,
}

/// Sign-in credentials.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Partial profile update. Absent or blank fields keep their value.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub preferred_language: Option<PreferredLanguage>,
}

/// Password reset request.
#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordInput {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(min = 6, max = 128, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// A signed-in user and their bearer token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: user::Model,
}

/// Account service.
#[derive(Clone)]
pub struct AccountService {
    db: Arc<DatabaseConnection>,
    user_repo: UserRepository,
    access: AccessService,
    audit: AuditService,
    email: EmailService,
    id_gen: IdGenerator,
    reset_ttl: Duration,
}

impl AccountService {
    /// Create a new account service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        user_repo: UserRepository,
        access: AccessService,
        audit: AuditService,
        email: EmailService,
        config: &AuthConfig,
    ) -> Self {
        Self {
            db,
            user_repo,
            access,
            audit,
            email,
            id_gen: IdGenerator::new(),
            reset_ttl: Duration::minutes(config.reset_token_ttl_minutes),
        }
    }

    /// Register an applicant.
    pub async fn register(&self, input: RegisterInput, meta: &RequestMeta) -> AppResult<AuthSession> {
        input.validate()?;
        validate_phone(input.phone.as_deref())?;

        let email = input.email.trim().to_lowercase();
        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password)?;
        let user_id = self.id_gen.generate();

        let model = user::ActiveModel {
            id: Set(user_id.clone()),
            first_name: Set(input.first_name.trim().to_string()),
            last_name: Set(input.last_name.trim().to_string()),
            email: Set(email),
            password_hash: Set(password_hash),
            phone: Set(non_blank(input.phone)),
            gender: Set(input.gender),
            date_of_birth: Set(input.date_of_birth),
            nationality: Set(non_blank(input.nationality)),
            settlement_site: Set(input.settlement_site.unwrap_or_default()),
            refugee_id: Set(non_blank(input.refugee_id)),
            address: Set(None),
            city: Set(None),
            state: Set(None),
            country: Set(None),
            postal_code: Set(None),
            preferred_language: Set(input.preferred_language.unwrap_or_default()),
            roles: Set(roles_json(&[Role::Applicant])),
            is_active: Set(true),
            is_verified: Set(false),
            reset_password_token: Set(None),
            reset_password_expires_at: Set(None),
            last_login_at: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
            deleted_at: Set(None),
        };

        let txn = self.db.begin().await?;
        let user = self.user_repo.create_in(&txn, model).await?;
        self.audit
            .record(
                &txn,
                AuditEntry::new(
                    Some(&user.id),
                    actions::REGISTER,
                    "User",
                    Some(&user.id),
                    "User registration",
                ),
                meta,
            )
            .await;
        txn.commit().await?;

        tracing::info!(user_id = %user.id, "Registered applicant");

        let token = self.access.issue_token(&user)?;
        Ok(AuthSession { token, user })
    }

    /// Sign in with email and password.
    pub async fn login(&self, input: LoginInput, meta: &RequestMeta) -> AppResult<AuthSession> {
        input.validate()?;

        let user = self
            .user_repo
            .find_by_email(&input.email)
            .await?
            .filter(user::Model::is_usable)
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        let mut active: user::ActiveModel = user.into();
        active.last_login_at = Set(Some(Utc::now().into()));
        let user = self.user_repo.update(active).await?;

        self.audit
            .record_detached(
                AuditEntry::new(Some(&user.id), actions::LOGIN, "User", Some(&user.id), "User login"),
                meta,
            )
            .await;

        let token = self.access.issue_token(&user)?;
        Ok(AuthSession { token, user })
    }

    /// The caller's own account.
    pub async fn me(&self, user_id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(user_id).await
    }

    /// Update the caller's profile.
    pub async fn update_profile(
        &self,
        user_id: &str,
        input: UpdateProfileInput,
        meta: &RequestMeta,
    ) -> AppResult<user::Model> {
        input.validate()?;
        let phone = non_blank(input.phone);
        validate_phone(phone.as_deref())?;

        let user = self.user_repo.get_by_id(user_id).await?;
        let mut active: user::ActiveModel = user.into();

        if let Some(first_name) = non_blank(input.first_name) {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = non_blank(input.last_name) {
            active.last_name = Set(last_name);
        }
        if phone.is_some() {
            active.phone = Set(phone);
        }
        if input.gender.is_some() {
            active.gender = Set(input.gender);
        }
        if input.date_of_birth.is_some() {
            active.date_of_birth = Set(input.date_of_birth);
        }
        for (column, value) in [
            (&mut active.nationality, input.nationality),
            (&mut active.address, input.address),
            (&mut active.city, input.city),
            (&mut active.state, input.state),
            (&mut active.country, input.country),
            (&mut active.postal_code, input.postal_code),
        ] {
            if let Some(value) = non_blank(value) {
                *column = Set(Some(value));
            }
        }
        if let Some(language) = input.preferred_language {
            active.preferred_language = Set(language);
        }
        active.updated_at = Set(Some(Utc::now().into()));

        let txn = self.db.begin().await?;
        let user = self.user_repo.update_in(&txn, active).await?;
        self.audit
            .record(
                &txn,
                AuditEntry::new(
                    Some(&user.id),
                    actions::UPDATE_PROFILE,
                    "User",
                    Some(&user.id),
                    "User updated profile",
                ),
                meta,
            )
            .await;
        txn.commit().await?;

        Ok(user)
    }

    /// Issue a password reset token and email the reset link.
    pub async fn forgot_password(&self, email: &str) -> AppResult<()> {
        let user = self
            .user_repo
            .find_by_email(email)
            .await?
            .filter(user::Model::is_usable)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let secret = self.id_gen.generate_token();
        let token = format!("{}.{secret}", user.id);
        let secret_hash = hash_password(&secret)?;

        let recipient = user.email.clone();
        let first_name = user.first_name.clone();
        let mut active: user::ActiveModel = user.into();
        active.reset_password_token = Set(Some(secret_hash));
        active.reset_password_expires_at = Set(Some((Utc::now() + self.reset_ttl).into()));
        self.user_repo.update(active).await?;

        let link = format!("{}/reset-password?token={token}", self.email.portal_url());
        let body = format!(
            "Dear {first_name},\n\n\
             We received a request to reset your password. Use the link below within {} minutes:\n{link}\n\n\
             If you did not request this, you can ignore this email.",
            self.reset_ttl.num_minutes()
        );
        self.email.send(&recipient, "Password Reset Request", &body).await
    }

    /// Set a new password with a reset token.
    pub async fn reset_password(&self, input: ResetPasswordInput, meta: &RequestMeta) -> AppResult<()> {
        input.validate()?;

        let invalid = || AppError::Validation(INVALID_RESET_TOKEN.to_string());
        let (user_id, secret) = input.token.split_once('.').ok_or_else(invalid)?;

        let user = self.user_repo.find_by_id(user_id).await?.ok_or_else(invalid)?;
        let (Some(secret_hash), Some(expires_at)) =
            (&user.reset_password_token, user.reset_password_expires_at)
        else {
            return Err(invalid());
        };
        if expires_at < Utc::now() || !verify_password(secret, secret_hash)? {
            return Err(invalid());
        }

        let password_hash = hash_password(&input.password)?;
        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(password_hash);
        active.reset_password_token = Set(None);
        active.reset_password_expires_at = Set(None);
        active.updated_at = Set(Some(Utc::now().into()));

        let txn = self.db.begin().await?;
        let user = self.user_repo.update_in(&txn, active).await?;
        self.audit
            .record(
                &txn,
                AuditEntry::new(
                    Some(&user.id),
                    actions::RESET_PASSWORD,
                    "User",
                    Some(&user.id),
                    "User reset password",
                ),
                meta,
            )
            .await;
        txn.commit().await?;

        Ok(())
    }

    /// Make sure the configured administrator exists and holds the admin role.
    ///
    /// A missing account is created active and verified. An existing account
    /// keeps its password and other roles.
    pub async fn ensure_admin(&self, admin: &AdminBootstrap) -> AppResult<user::Model> {
        let email = admin.email.trim().to_lowercase();
        if !email.validate_email() {
            return Err(AppError::Validation(format!("Invalid admin email: {email}")));
        }

        if let Some(existing) = self.user_repo.find_by_email(&email).await? {
            if existing.has_role(Role::Admin) {
                return Ok(existing);
            }
            let previous = existing.role_set();
            let mut roles = previous.clone();
            roles.push(Role::Admin);
            let meta = RequestMeta::default();
            return self
                .write_roles(None, existing, &previous, &roles, actions::BOOTSTRAP_ADMIN, &meta)
                .await;
        }

        if admin.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(
                "Admin password must be at least 6 characters".to_string(),
            ));
        }

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            first_name: Set(admin.first_name.trim().to_string()),
            last_name: Set(admin.last_name.trim().to_string()),
            email: Set(email),
            password_hash: Set(hash_password(&admin.password)?),
            phone: Set(None),
            gender: Set(None),
            date_of_birth: Set(None),
            nationality: Set(None),
            settlement_site: Set(SettlementSite::default()),
            refugee_id: Set(None),
            address: Set(None),
            city: Set(None),
            state: Set(None),
            country: Set(None),
            postal_code: Set(None),
            preferred_language: Set(PreferredLanguage::default()),
            roles: Set(roles_json(&[Role::Admin])),
            is_active: Set(true),
            is_verified: Set(true),
            reset_password_token: Set(None),
            reset_password_expires_at: Set(None),
            last_login_at: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
            deleted_at: Set(None),
        };

        let txn = self.db.begin().await?;
        let user = self.user_repo.create_in(&txn, model).await?;
        self.audit
            .record(
                &txn,
                AuditEntry::new(
                    None,
                    actions::BOOTSTRAP_ADMIN,
                    "User",
                    Some(&user.id),
                    format!("Created administrator {}", user.email),
                ),
                &RequestMeta::default(),
            )
            .await;
        txn.commit().await?;

        tracing::info!(user_id = %user.id, "Created bootstrap administrator");
        Ok(user)
    }

    /// Replace a user's role set.
    pub async fn assign_roles(
        &self,
        actor_id: &str,
        user_id: &str,
        roles: Vec<Role>,
        meta: &RequestMeta,
    ) -> AppResult<user::Model> {
        let mut unique = Vec::with_capacity(roles.len());
        for role in roles {
            if !unique.contains(&role) {
                unique.push(role);
            }
        }
        let roles = unique;
        if roles.is_empty() {
            return Err(AppError::Validation("At least one role is required".to_string()));
        }
        if actor_id == user_id && !roles.contains(&Role::Admin) {
            return Err(AppError::Validation(
                "You cannot remove your own admin role".to_string(),
            ));
        }

        let user = self.user_repo.get_by_id(user_id).await?;
        let previous = user.role_set();
        self.write_roles(Some(actor_id), user, &previous, &roles, actions::ASSIGN_ROLES, meta)
            .await
    }

    async fn write_roles(
        &self,
        actor_id: Option<&str>,
        user: user::Model,
        previous: &[Role],
        roles: &[Role],
        action: &'static str,
        meta: &RequestMeta,
    ) -> AppResult<user::Model> {
        let mut active: user::ActiveModel = user.into();
        active.roles = Set(roles_json(roles));
        active.updated_at = Set(Some(Utc::now().into()));

        let txn = self.db.begin().await?;
        let user = self.user_repo.update_in(&txn, active).await?;
        self.audit
            .record(
                &txn,
                AuditEntry::new(
                    actor_id,
                    action,
                    "User",
                    Some(&user.id),
                    format!("Set roles of {}", user.email),
                )
                .with_values(
                    Some(serde_json::json!({ "roles": previous })),
                    Some(serde_json::json!({ "roles": roles })),
                ),
                meta,
            )
            .await;
        txn.commit().await?;

        tracing::info!(user_id = %user.id, action = action, "Updated user roles");
        Ok(user)
    }

    /// Soft-delete an account.
    pub async fn deactivate(
        &self,
        actor_id: &str,
        user_id: &str,
        meta: &RequestMeta,
    ) -> AppResult<user::Model> {
        if actor_id == user_id {
            return Err(AppError::Validation(
                "You cannot deactivate your own account".to_string(),
            ));
        }

        let user = self.user_repo.get_by_id(user_id).await?;
        let now = Utc::now();
        let mut active: user::ActiveModel = user.into();
        active.is_active = Set(false);
        active.deleted_at = Set(Some(now.into()));
        active.updated_at = Set(Some(now.into()));

        let txn = self.db.begin().await?;
        let user = self.user_repo.update_in(&txn, active).await?;
        self.audit
            .record(
                &txn,
                AuditEntry::new(
                    Some(actor_id),
                    actions::DEACTIVATE_USER,
                    "User",
                    Some(&user.id),
                    format!("Deactivated account {}", user.email),
                ),
                meta,
            )
            .await;
        txn.commit().await?;

        Ok(user)
    }
}

fn validate_phone(phone: Option<&str>) -> AppResult<()> {
    match phone.map(str::trim).filter(|p| !p.is_empty()) {
        Some(phone) if !PHONE_RE.is_match(phone) => Err(AppError::Validation(
            "Phone number must be in international format, e.g. +256700000000".to_string(),
        )),
        _ => Ok(()),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use admissions_common::config::NotificationSettings;
    use admissions_db::{
        repositories::AuditLogRepository,
        test_utils::{fixtures, transaction_log},
    };
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_ttl_hours: 1,
            reset_token_ttl_minutes: 10,
        }
    }

    fn service(db: MockDatabase) -> AccountService {
        service_with_db(db).0
    }

    fn service_with_db(db: MockDatabase) -> (AccountService, Arc<DatabaseConnection>) {
        let db = Arc::new(db.into_connection());
        let user_repo = UserRepository::new(db.clone());
        let audit = AuditService::new(db.clone(), AuditLogRepository::new(db.clone()));
        let access = AccessService::new(user_repo.clone(), audit.clone(), &auth_config());
        let settings = NotificationSettings {
            from_address: "admissions@example.org".to_string(),
            ..NotificationSettings::default()
        };
        let email = EmailService::new(&settings, "https://portal.example.org").unwrap();
        let service = AccountService::new(db.clone(), user_repo, access, audit, email, &auth_config());
        (service, db)
    }

    fn bootstrap(password: &str) -> AdminBootstrap {
        AdminBootstrap {
            email: "Registrar@Example.org".to_string(),
            password: password.to_string(),
            first_name: "Admin".to_string(),
            last_name: "User".to_string(),
        }
    }

    fn user_with_password(password: &str) -> user::Model {
        let mut user = fixtures::user("u1", &[Role::Applicant]);
        user.password_hash = hash_password(password).unwrap();
        user
    }

    fn register_input() -> RegisterInput {
        RegisterInput {
            first_name: "Amina".to_string(),
            last_name: "Okello".to_string(),
            email: "Amina@Example.org".to_string(),
            password: "secret123".to_string(),
            phone: Some("+256700000001".to_string()),
            gender: None,
            date_of_birth: None,
            nationality: None,
            settlement_site: Some(SettlementSite::Nakivale),
            refugee_id: None,
            preferred_language: None,
        }
    }

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("secret123").unwrap();
        assert!(verify_password("secret123", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone(None).is_ok());
        assert!(validate_phone(Some("")).is_ok());
        assert!(validate_phone(Some("+256700000001")).is_ok());
        assert!(validate_phone(Some("0700000001")).is_err());
        assert!(validate_phone(Some("+25670")).is_err());
        assert!(validate_phone(Some("+2567000000012345")).is_err());
    }

    #[test]
    fn test_register_input_validation() {
        let mut input = register_input();
        input.password = "abc".to_string();
        assert!(input.validate().is_err());

        let mut input = register_input();
        input.email = "not-an-email".to_string();
        assert!(input.validate().is_err());
    }

    #[tokio::test]
    async fn test_register_duplicate_email_is_conflict() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[fixtures::user("u1", &[Role::Applicant])]]),
        );

        let err = service
            .register(register_input(), &RequestMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_returns_token() {
        let created = fixtures::user("u1", &[Role::Applicant]);
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .append_query_results([[created]])
                .append_query_results([[fixtures::audit_log("l1", actions::REGISTER, "u1")]]),
        );

        let session = service
            .register(register_input(), &RequestMeta::default())
            .await
            .unwrap();

        assert!(!session.token.is_empty());
        assert_eq!(session.user.id, "u1");
    }

    #[tokio::test]
    async fn test_login_wrong_password_is_invalid_credentials() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user_with_password("secret123")]]),
        );

        let err = service
            .login(
                LoginInput {
                    email: "u1@example.org".to_string(),
                    password: "wrong-password".to_string(),
                },
                &RequestMeta::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_unknown_email_is_invalid_credentials() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()]),
        );

        let err = service
            .login(
                LoginInput {
                    email: "ghost@example.org".to_string(),
                    password: "secret123".to_string(),
                },
                &RequestMeta::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_success() {
        let user = user_with_password("secret123");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user.clone()]])
                .append_query_results([[user]])
                .append_query_results([[fixtures::audit_log("l1", actions::LOGIN, "u1")]]),
        );

        let session = service
            .login(
                LoginInput {
                    email: "u1@example.org".to_string(),
                    password: "secret123".to_string(),
                },
                &RequestMeta::default(),
            )
            .await
            .unwrap();
        assert_eq!(session.user.id, "u1");
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email_is_not_found() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()]),
        );

        let err = service.forgot_password("ghost@example.org").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reset_password_malformed_token() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));

        let err = service
            .reset_password(
                ResetPasswordInput {
                    token: "no-separator".to_string(),
                    password: "newsecret".to_string(),
                },
                &RequestMeta::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == INVALID_RESET_TOKEN));
    }

    #[tokio::test]
    async fn test_reset_password_expired_token() {
        let mut user = fixtures::user("u1", &[Role::Applicant]);
        user.reset_password_token = Some(hash_password("s3cret").unwrap());
        user.reset_password_expires_at = Some((Utc::now() - Duration::minutes(1)).into());
        let service =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[user]]));

        let err = service
            .reset_password(
                ResetPasswordInput {
                    token: "u1.s3cret".to_string(),
                    password: "newsecret".to_string(),
                },
                &RequestMeta::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reset_password_valid_token() {
        let mut user = fixtures::user("u1", &[Role::Applicant]);
        user.reset_password_token = Some(hash_password("s3cret").unwrap());
        user.reset_password_expires_at = Some((Utc::now() + Duration::minutes(5)).into());
        let mut cleared = user.clone();
        cleared.reset_password_token = None;
        cleared.reset_password_expires_at = None;

        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user]])
                .append_query_results([[cleared]])
                .append_query_results([[fixtures::audit_log("l1", actions::RESET_PASSWORD, "u1")]]),
        );

        service
            .reset_password(
                ResetPasswordInput {
                    token: "u1.s3cret".to_string(),
                    password: "newsecret".to_string(),
                },
                &RequestMeta::default(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deactivate_self_is_rejected() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));
        let err = service
            .deactivate("u1", "u1", &RequestMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_ensure_admin_creates_verified_admin() {
        let mut created = fixtures::user("a1", &[Role::Admin]);
        created.email = "registrar@example.org".to_string();
        let (service, db) = service_with_db(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .append_query_results([[created]])
                .append_query_results([[fixtures::audit_log("l1", actions::BOOTSTRAP_ADMIN, "a1")]]),
        );

        let admin = service.ensure_admin(&bootstrap("change-me-now")).await.unwrap();
        assert!(admin.has_role(Role::Admin));
        drop(service);

        let statements = transaction_log(db).concat();
        let insert = statements
            .iter()
            .find(|s| s.starts_with(r#"INSERT INTO "user""#))
            .unwrap();
        assert!(insert.contains("registrar@example.org"));
        assert!(!insert.contains("change-me-now"));
        assert!(
            statements
                .iter()
                .any(|s| s.starts_with(r#"INSERT INTO "audit_log""#) && s.contains("BOOTSTRAP_ADMIN"))
        );
    }

    #[tokio::test]
    async fn test_ensure_admin_promotes_existing_account() {
        let mut existing = fixtures::user("u1", &[Role::Reviewer]);
        existing.email = "registrar@example.org".to_string();
        let mut promoted = existing.clone();
        promoted.roles = roles_json(&[Role::Reviewer, Role::Admin]);
        let (service, db) = service_with_db(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .append_query_results([[promoted]])
                .append_query_results([[fixtures::audit_log("l1", actions::BOOTSTRAP_ADMIN, "u1")]]),
        );

        let admin = service.ensure_admin(&bootstrap("ignored")).await.unwrap();
        assert_eq!(admin.role_set(), vec![Role::Reviewer, Role::Admin]);
        drop(service);

        let statements = transaction_log(db).concat();
        assert!(!statements.iter().any(|s| s.starts_with(r#"INSERT INTO "user""#)));
        assert!(statements.iter().any(|s| s.starts_with(r#"UPDATE "user""#)));
    }

    #[tokio::test]
    async fn test_ensure_admin_leaves_existing_admin_alone() {
        let mut existing = fixtures::user("a1", &[Role::Admin]);
        existing.email = "registrar@example.org".to_string();
        let (service, db) = service_with_db(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[existing]]),
        );

        service.ensure_admin(&bootstrap("ignored")).await.unwrap();
        drop(service);

        assert_eq!(transaction_log(db).concat().len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_admin_rejects_short_password() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()]),
        );

        let err = service.ensure_admin(&bootstrap("abc")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_assign_roles_records_previous_and_new() {
        let target = fixtures::user("u2", &[Role::Applicant]);
        let mut updated = target.clone();
        updated.roles = roles_json(&[Role::Reviewer]);
        let (service, db) = service_with_db(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[target]])
                .append_query_results([[updated]])
                .append_query_results([[fixtures::audit_log("l1", actions::ASSIGN_ROLES, "u2")]]),
        );

        let user = service
            .assign_roles(
                "a1",
                "u2",
                vec![Role::Reviewer, Role::Reviewer],
                &RequestMeta::default(),
            )
            .await
            .unwrap();
        assert_eq!(user.role_set(), vec![Role::Reviewer]);
        drop(service);

        let statements = transaction_log(db).concat();
        let audit = statements
            .iter()
            .find(|s| s.starts_with(r#"INSERT INTO "audit_log""#))
            .unwrap();
        assert!(audit.contains("ASSIGN_ROLES"));
        assert!(audit.contains("applicant"));
        assert!(audit.contains("reviewer"));
    }

    #[tokio::test]
    async fn test_assign_roles_unknown_user_is_not_found() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()]),
        );

        let err = service
            .assign_roles("a1", "missing", vec![Role::Reviewer], &RequestMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_assign_roles_rejects_self_demotion_and_empty_set() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));

        let err = service
            .assign_roles("a1", "a1", vec![Role::Reviewer], &RequestMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service
            .assign_roles("a1", "u2", Vec::new(), &RequestMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
