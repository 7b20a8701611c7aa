use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;

use crate::{
    entities::enums::Role,
    handler::{
        error::{ApiJson, ApiPath, ApiQuery, ApiResult},
        extract::CurrentUser,
    },
    service::medical_records::{RecordCreate, RecordQuery, RecordUpdate, RecordView},
    state::AppState,
};

const AUTHORS: [Role; 2] = [Role::Admin, Role::Doctor];

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/medical-records", get(list_records).post(create_record))
        .route(
            "/api/v1/medical-records/:id",
            get(get_record).put(update_record).delete(delete_record),
        )
        .with_state(state)
}

async fn list_records(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<RecordQuery>,
) -> ApiResult<Json<Vec<RecordView>>> {
    Ok(Json(state.medical_records().list(user.caller, query).await?))
}

async fn get_record(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<RecordView>> {
    Ok(Json(state.medical_records().get(user.caller, id).await?))
}

async fn create_record(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<RecordCreate>,
) -> ApiResult<(StatusCode, Json<RecordView>)> {
    user.require_role(&AUTHORS)?;
    let created = state.medical_records().create(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_record(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<RecordUpdate>,
) -> ApiResult<Json<RecordView>> {
    user.require_role(&AUTHORS)?;
    Ok(Json(state.medical_records().update(id, payload).await?))
}

async fn delete_record(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    user.require_role(&AUTHORS)?;
    state.medical_records().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
