use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;

use crate::{
    entities::enums::Role,
    handler::{
        error::{ApiJson, ApiPath, ApiQuery, ApiResult},
        extract::CurrentUser,
    },
    service::notices::{NoticeQuery, NoticeRequest, NoticeView},
    state::AppState,
};

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/notices", get(list_notices).post(create_notice))
        .route(
            "/api/v1/notices/:id",
            get(get_notice).put(update_notice).delete(delete_notice),
        )
        .with_state(state)
}

async fn list_notices(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<NoticeQuery>,
) -> ApiResult<Json<Vec<NoticeView>>> {
    Ok(Json(state.notices().list(user.caller, query).await?))
}

async fn get_notice(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<NoticeView>> {
    Ok(Json(state.notices().get(user.caller, id).await?))
}

async fn create_notice(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<NoticeRequest>,
) -> ApiResult<(StatusCode, Json<NoticeView>)> {
    let caller = user.require_role(&[Role::Admin])?;
    let created = state.notices().create(caller, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_notice(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<NoticeRequest>,
) -> ApiResult<Json<NoticeView>> {
    user.require_role(&[Role::Admin])?;
    Ok(Json(state.notices().update(id, payload).await?))
}

async fn delete_notice(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<StatusCode> {
    user.require_role(&[Role::Admin])?;
    state.notices().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
