use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

use crate::{
    handler::{
        error::{ApiQuery, ApiResult},
        extract::CurrentUser,
    },
    service::reports::{AppointmentStat, DashboardStats, StatsRange},
    state::AppState,
};

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/reports/dashboard-stats", get(dashboard_stats))
        .route("/api/v1/reports/appointment-stats", get(appointment_stats))
        .with_state(state)
}

async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(state.reports().dashboard(user.caller).await?))
}

async fn appointment_stats(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    ApiQuery(range): ApiQuery<StatsRange>,
) -> ApiResult<Json<Vec<AppointmentStat>>> {
    Ok(Json(state.reports().appointment_stats(range).await?))
}
