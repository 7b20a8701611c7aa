use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    handler::{
        error::{ApiJson, ApiResult, ErrorResponse},
        extract::{cleared_cookie, session_cookie, CurrentUser},
    },
    service::{
        auth::{ChangePasswordRequest, LoginRequest, ProfileUpdate, RegisterRequest, UserView},
        provisioning::AccountSummary,
    },
    state::AppState,
};

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    /// Session id, also set as the `sid` cookie.
    pub token: String,
    pub must_change_password: bool,
    pub user: UserView,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/profile", get(profile).put(update_profile))
        .route("/api/v1/auth/change-password", post(change_password))
        .with_state(state)
}

fn signed_in(
    state: &AppState,
    status: StatusCode,
    token: String,
    user: UserView,
) -> Response {
    let jar = CookieJar::new().add(session_cookie(state.config().values(), token.clone()));
    let response = SessionResponse {
        token,
        must_change_password: user.account.must_change_password,
        user,
    };
    (status, jar, Json(response)).into_response()
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Patient account created and signed in", body = SessionResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> ApiResult<Response> {
    let output = state.auth().register(payload).await?;
    Ok(signed_in(&state, StatusCode::CREATED, output.token, output.user))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 401, description = "Invalid credentials or role", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<Response> {
    let output = state.auth().login(payload).await?;
    Ok(signed_in(&state, StatusCode::OK, output.token, output.user))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 204, description = "Signed out"),
        (status = 401, description = "No valid session", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    jar: CookieJar,
) -> ApiResult<Response> {
    state.auth().logout(&user.session_id).await?;
    let jar = jar.add(cleared_cookie(state.config().values()));
    Ok((StatusCode::NO_CONTENT, jar).into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/profile",
    responses(
        (status = 200, description = "Current account", body = UserView),
        (status = 401, description = "No valid session", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn profile(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Json<UserView>> {
    Ok(Json(state.auth().profile(user.caller.account_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/auth/profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated account", body = AccountSummary),
        (status = 401, description = "No valid session", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<AccountSummary>> {
    let updated = state
        .auth()
        .update_profile(user.caller.account_id, payload)
        .await?;
    Ok(Json(updated))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Password policy violated", body = ErrorResponse),
        (status = 401, description = "Wrong current password", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    state
        .auth()
        .change_password(user.caller.account_id, payload)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
