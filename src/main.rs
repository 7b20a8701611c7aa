use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod entities;
mod error;
mod handler;
mod openapi;
mod repo;
mod schema;
mod seed;
mod service;
mod state;
#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let state = match state::AppState::new().await {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "startup failed");
            std::process::exit(1);
        }
    };

    if let Err(err) = seed::bootstrap_admin(&state).await {
        tracing::error!(error = %err, "bootstrap admin could not be provisioned");
    }

    let port = state.config().port();
    let app = handler::router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api/v1/openapi.json", openapi::ApiDoc::openapi()))
        .layer(CorsLayer::permissive());

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%bind_addr, error = %err, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(%bind_addr, "healthvault api listening");

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(error = %err, "server error");
    }
}
