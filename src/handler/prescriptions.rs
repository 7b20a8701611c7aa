use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;

use crate::{
    entities::enums::Role,
    handler::{
        error::{ApiJson, ApiPath, ApiQuery, ApiResult},
        extract::CurrentUser,
    },
    service::prescriptions::{
        PrescriptionCreate, PrescriptionQuery, PrescriptionUpdate, PrescriptionView,
    },
    state::AppState,
};

const PRESCRIBERS: [Role; 2] = [Role::Admin, Role::Doctor];

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/v1/prescriptions",
            get(list_prescriptions).post(create_prescription),
        )
        .route(
            "/api/v1/prescriptions/:id",
            get(get_prescription)
                .put(update_prescription)
                .delete(delete_prescription),
        )
        .with_state(state)
}

async fn list_prescriptions(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<PrescriptionQuery>,
) -> ApiResult<Json<Vec<PrescriptionView>>> {
    Ok(Json(state.prescriptions().list(user.caller, query).await?))
}

async fn get_prescription(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<PrescriptionView>> {
    Ok(Json(state.prescriptions().get(user.caller, id).await?))
}

async fn create_prescription(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<PrescriptionCreate>,
) -> ApiResult<(StatusCode, Json<PrescriptionView>)> {
    let caller = user.require_role(&PRESCRIBERS)?;
    let created = state.prescriptions().create(caller, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_prescription(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<PrescriptionUpdate>,
) -> ApiResult<Json<PrescriptionView>> {
    let caller = user.require_role(&PRESCRIBERS)?;
    Ok(Json(
        state.prescriptions().update(caller, id, payload).await?,
    ))
}

async fn delete_prescription(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    let caller = user.require_role(&PRESCRIBERS)?;
    state.prescriptions().delete(caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
