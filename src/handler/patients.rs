use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use std::sync::Arc;

use crate::{
    entities::enums::{PatientStatus, Role},
    handler::{
        error::{ApiJson, ApiPath, ApiQuery, ApiResult, ErrorResponse},
        extract::CurrentUser,
    },
    service::patients::{PatientIntakeRequest, PatientQuery, PatientUpdate, PatientView},
    state::AppState,
};

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/patients", get(list_patients).post(create_patient))
        .route("/api/v1/patients/:id", get(get_patient).put(update_patient))
        .route("/api/v1/patients/:id/discharge", post(discharge_patient))
        .route("/api/v1/patients/:id/transfer", post(transfer_patient))
        .with_state(state)
}

async fn list_patients(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<PatientQuery>,
) -> ApiResult<Json<Vec<PatientView>>> {
    Ok(Json(state.patients().list(user.caller, query).await?))
}

async fn get_patient(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<PatientView>> {
    Ok(Json(state.patients().get(user.caller, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/patients",
    request_body = PatientIntakeRequest,
    responses(
        (status = 201, description = "Patient account and profile created"),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 403, description = "Caller is not admin or nurse", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    tag = "patients"
)]
pub async fn create_patient(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<PatientIntakeRequest>,
) -> ApiResult<(StatusCode, Json<PatientView>)> {
    user.require_role(&[Role::Admin, Role::Nurse])?;
    let created = state.patients().create(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_patient(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<PatientUpdate>,
) -> ApiResult<Json<PatientView>> {
    user.require_role(&[Role::Admin, Role::Nurse, Role::Doctor])?;
    Ok(Json(state.patients().update(id, payload).await?))
}

async fn discharge_patient(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<PatientView>> {
    user.require_role(&[Role::Admin, Role::Doctor])?;
    let updated = state
        .patients()
        .set_status(id, PatientStatus::Discharged)
        .await?;
    Ok(Json(updated))
}

async fn transfer_patient(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<PatientView>> {
    user.require_role(&[Role::Admin, Role::Doctor])?;
    let updated = state
        .patients()
        .set_status(id, PatientStatus::Transferred)
        .await?;
    Ok(Json(updated))
}
