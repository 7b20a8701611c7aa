use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;

use crate::{
    entities::enums::Role,
    handler::{
        error::{ApiJson, ApiPath, ApiResult},
        extract::CurrentUser,
    },
    service::departments::{DepartmentRequest, DepartmentView},
    state::AppState,
};

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/departments", get(list_departments).post(create_department))
        .route(
            "/api/v1/departments/:id",
            get(get_department).put(update_department),
        )
        .with_state(state)
}

async fn list_departments(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<DepartmentView>>> {
    Ok(Json(state.departments().list().await?))
}

async fn get_department(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<DepartmentView>> {
    Ok(Json(state.departments().get(id).await?))
}

async fn create_department(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<DepartmentRequest>,
) -> ApiResult<(StatusCode, Json<DepartmentView>)> {
    user.require_role(&[Role::Admin])?;
    let created = state.departments().create(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_department(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<DepartmentRequest>,
) -> ApiResult<Json<DepartmentView>> {
    user.require_role(&[Role::Admin])?;
    Ok(Json(state.departments().update(id, payload).await?))
}
