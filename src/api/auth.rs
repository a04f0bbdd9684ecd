//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::user::{Role, SignupRequest, User},
};

use super::{AppJson, AuthenticatedUser};

/// Login request
#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response with bearer token
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    /// Token lifetime in seconds
    pub expires_in: i64,
    pub user: UserInfo,
}

/// User summary returned at login
#[derive(Serialize, ToSchema)]
pub struct UserInfo {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SignupResponse {
    pub id: i32,
    pub role: Role,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct WalletResponse {
    /// Balance in currency units; negative when fines exceed credit
    pub wallet: i64,
}

/// Register a new account (pending until approved)
#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created, waiting for approval", body = SignupResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already exists")
    )
)]
pub async fn signup(
    State(state): State<crate::AppState>,
    AppJson(request): AppJson<SignupRequest>,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    let user = state.services.users.signup(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            id: user.id,
            role: user.role,
            message: "Signup complete. Waiting for administrator approval.".to_string(),
        }),
    ))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<crate::AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let (token, user) = state
        .services
        .users
        .authenticate(&request.email, &request.password)
        .await?;

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.services.users.token_lifetime_secs(),
        user: UserInfo::from(&user),
    }))
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<User>> {
    let user = state.services.users.get_by_id(claims.user_id).await?;
    Ok(Json(user))
}

/// Current member's wallet balance
#[utoipa::path(
    get,
    path = "/auth/wallet",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Wallet balance", body = WalletResponse),
        (status = 403, description = "Member account required")
    )
)]
pub async fn wallet(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<WalletResponse>> {
    claims.require_member()?;

    let wallet = state.services.users.wallet(claims.user_id).await?;
    Ok(Json(WalletResponse { wallet }))
}
