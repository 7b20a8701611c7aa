use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use std::sync::Arc;

use crate::{
    entities::enums::Role,
    handler::{
        error::{ApiJson, ApiPath, ApiQuery, ApiResult},
        extract::CurrentUser,
    },
    service::payroll::{PayrollCreate, PayrollQuery, PayrollUpdate, PayrollView},
    state::AppState,
};

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/payroll", get(list_payroll).post(create_payroll))
        .route("/api/v1/payroll/me", get(my_payroll))
        .route("/api/v1/payroll/:id", put(update_payroll))
        .with_state(state)
}

async fn list_payroll(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<PayrollQuery>,
) -> ApiResult<Json<Vec<PayrollView>>> {
    user.require_role(&[Role::Admin])?;
    Ok(Json(state.payroll().list(query).await?))
}

async fn my_payroll(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<PayrollQuery>,
) -> ApiResult<Json<Vec<PayrollView>>> {
    Ok(Json(
        state
            .payroll()
            .for_account(user.caller.account_id, query)
            .await?,
    ))
}

async fn create_payroll(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<PayrollCreate>,
) -> ApiResult<(StatusCode, Json<PayrollView>)> {
    user.require_role(&[Role::Admin])?;
    let created = state.payroll().create(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_payroll(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<PayrollUpdate>,
) -> ApiResult<Json<PayrollView>> {
    user.require_role(&[Role::Admin])?;
    Ok(Json(state.payroll().update(id, payload).await?))
}
