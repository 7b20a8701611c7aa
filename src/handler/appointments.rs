use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    entities::enums::Role,
    handler::{
        error::{ApiJson, ApiPath, ApiQuery, ApiResult},
        extract::CurrentUser,
    },
    service::appointments::{
        AppointmentCreate, AppointmentQuery, AppointmentUpdate, AppointmentView,
    },
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    pub notes: Option<String>,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/v1/appointments",
            get(list_appointments).post(create_appointment),
        )
        .route(
            "/api/v1/appointments/:id",
            get(get_appointment).put(update_appointment),
        )
        .route("/api/v1/appointments/:id/cancel", post(cancel_appointment))
        .route("/api/v1/appointments/:id/complete", post(complete_appointment))
        .with_state(state)
}

async fn list_appointments(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<AppointmentQuery>,
) -> ApiResult<Json<Vec<AppointmentView>>> {
    Ok(Json(state.appointments().list(user.caller, query).await?))
}

async fn get_appointment(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<AppointmentView>> {
    Ok(Json(state.appointments().get(user.caller, id).await?))
}

async fn create_appointment(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<AppointmentCreate>,
) -> ApiResult<(StatusCode, Json<AppointmentView>)> {
    let caller = user.require_role(&[Role::Admin, Role::Nurse, Role::Doctor, Role::Patient])?;
    let created = state.appointments().create(caller, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_appointment(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<AppointmentUpdate>,
) -> ApiResult<Json<AppointmentView>> {
    let caller = user.require_role(&[Role::Admin, Role::Nurse, Role::Doctor])?;
    Ok(Json(state.appointments().update(caller, id, payload).await?))
}

async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<AppointmentView>> {
    let caller = user.require_role(&[Role::Admin, Role::Nurse, Role::Doctor, Role::Patient])?;
    Ok(Json(state.appointments().cancel(caller, id).await?))
}

async fn complete_appointment(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    payload: Option<ApiJson<CompleteRequest>>,
) -> ApiResult<Json<AppointmentView>> {
    let caller = user.require_role(&[Role::Admin, Role::Doctor])?;
    let notes = payload.and_then(|ApiJson(body)| body.notes);
    Ok(Json(state.appointments().complete(caller, id, notes).await?))
}
