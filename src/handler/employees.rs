use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;

use crate::{
    entities::enums::Role,
    handler::{
        error::{ApiJson, ApiPath, ApiQuery, ApiResult, ErrorResponse},
        extract::CurrentUser,
    },
    service::employees::{
        EmployeeCreateRequest, EmployeeQuery, EmployeeUpdate, EmployeeView, StaffQuery,
    },
    state::AppState,
};

/// `/employees` for administrators and `/staff` for everyone signed in.
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/employees", get(list_employees).post(create_employee))
        .route("/api/v1/employees/me", get(my_employee))
        .route("/api/v1/employees/:id", get(get_employee).put(update_employee))
        .route("/api/v1/staff", get(list_staff).post(create_staff))
        .with_state(state)
}

async fn list_employees(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<EmployeeQuery>,
) -> ApiResult<Json<Vec<EmployeeView>>> {
    user.require_role(&[Role::Admin])?;
    Ok(Json(state.employees().list(query).await?))
}

async fn my_employee(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Json<EmployeeView>> {
    Ok(Json(
        state.employees().for_account(user.caller.account_id).await?,
    ))
}

async fn get_employee(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<EmployeeView>> {
    user.require_role(&[Role::Admin])?;
    Ok(Json(state.employees().get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/employees",
    request_body = EmployeeCreateRequest,
    responses(
        (status = 201, description = "Employee account and profile created"),
        (status = 400, description = "Invalid payload or role", body = ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    tag = "employees"
)]
pub async fn create_employee(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<EmployeeCreateRequest>,
) -> ApiResult<(StatusCode, Json<EmployeeView>)> {
    user.require_role(&[Role::Admin])?;
    let created = state.employees().create(payload, false).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_employee(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<EmployeeUpdate>,
) -> ApiResult<Json<EmployeeView>> {
    user.require_role(&[Role::Admin])?;
    Ok(Json(state.employees().update(id, payload).await?))
}

async fn list_staff(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<StaffQuery>,
) -> ApiResult<Json<Vec<EmployeeView>>> {
    Ok(Json(state.employees().staff(query).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/staff",
    request_body = EmployeeCreateRequest,
    responses(
        (status = 201, description = "Staff account created; password must be changed at first sign-in"),
        (status = 400, description = "Invalid payload or role", body = ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    tag = "employees"
)]
pub async fn create_staff(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<EmployeeCreateRequest>,
) -> ApiResult<(StatusCode, Json<EmployeeView>)> {
    user.require_role(&[Role::Admin])?;
    let created = state.employees().create(payload, true).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
