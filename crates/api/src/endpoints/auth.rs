//! Account endpoints.

use admissions_common::AppResult;
use admissions_core::{
    AuthSession, LoginInput, RegisterInput, ResetPasswordInput, UpdateProfileInput,
};
use admissions_db::entities::user::{
    Gender, Model as UserModel, PreferredLanguage, Role, SettlementSite,
};
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post, put},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{rfc3339, rfc3339_opt};
use crate::{
    extractors::{AuthUser, ClientMeta},
    middleware::AppState,
    response::ApiResponse,
};

/// User profile response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub settlement_site: SettlementSite,
    pub refugee_id: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub preferred_language: PreferredLanguage,
    pub roles: Vec<Role>,
    pub is_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<String>,
    pub created_at: String,
}

impl From<UserModel> for UserResponse {
    fn from(u: UserModel) -> Self {
        let roles = u.role_set();
        Self {
            id: u.id,
            first_name: u.first_name,
            last_name: u.last_name,
            email: u.email,
            phone: u.phone,
            gender: u.gender,
            date_of_birth: u.date_of_birth,
            nationality: u.nationality,
            settlement_site: u.settlement_site,
            refugee_id: u.refugee_id,
            address: u.address,
            city: u.city,
            state: u.state,
            country: u.country,
            postal_code: u.postal_code,
            preferred_language: u.preferred_language,
            roles,
            is_verified: u.is_verified,
            last_login_at: rfc3339_opt(u.last_login_at),
            created_at: rfc3339(u.created_at),
        }
    }
}

/// Token and profile returned on sign-up and sign-in.
#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            token: session.token,
            user: session.user.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/profile", put(update_profile))
}

/// Register an applicant account.
async fn register(
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Json(input): Json<RegisterInput>,
) -> AppResult<ApiResponse<AuthResponse>> {
    let session = state.accounts.register(input, &meta).await?;
    Ok(ApiResponse::created(session.into()))
}

/// Sign in with email and password.
async fn login(
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Json(input): Json<LoginInput>,
) -> AppResult<ApiResponse<AuthResponse>> {
    let session = state.accounts.login(input, &meta).await?;
    Ok(ApiResponse::ok(session.into()))
}

/// Current user's profile.
async fn me(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.accounts.me(&principal.user_id).await?;
    Ok(ApiResponse::ok(user.into()))
}

async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> AppResult<ApiResponse<()>> {
    state.accounts.forgot_password(&req.email).await?;
    Ok(ApiResponse::message("Password reset email sent"))
}

async fn reset_password(
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Json(input): Json<ResetPasswordInput>,
) -> AppResult<ApiResponse<()>> {
    state.accounts.reset_password(input, &meta).await?;
    Ok(ApiResponse::message("Password reset successful"))
}

/// Update the current user's profile.
async fn update_profile(
    AuthUser(principal): AuthUser,
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Json(input): Json<UpdateProfileInput>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state
        .accounts
        .update_profile(&principal.user_id, input, &meta)
        .await?;
    Ok(ApiResponse::ok(user.into()).with_message("Profile updated"))
}
