use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

pub mod appointments;
pub mod auth;
pub mod departments;
pub mod employees;
pub mod error;
pub mod extract;
pub mod health;
pub mod medical_records;
pub mod notices;
pub mod patients;
pub mod payroll;
pub mod prescriptions;
pub mod reports;

/// Every `/api/v1` route.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::routes(state.clone()))
        .merge(auth::routes(state.clone()))
        .merge(patients::routes(state.clone()))
        .merge(employees::routes(state.clone()))
        .merge(appointments::routes(state.clone()))
        .merge(prescriptions::routes(state.clone()))
        .merge(medical_records::routes(state.clone()))
        .merge(payroll::routes(state.clone()))
        .merge(departments::routes(state.clone()))
        .merge(notices::routes(state.clone()))
        .merge(reports::routes(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, HeaderMap, Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::testing::{employee, test_state, PASSWORD};

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(body) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, value)
    }

    fn registration(email: &str) -> Value {
        json!({
            "email": email,
            "password": PASSWORD,
            "confirmPassword": PASSWORD,
            "first_name": "Ada",
            "last_name": "Lovelace"
        })
    }

    async fn login(app: &Router, email: &str) -> String {
        let (status, _, body) = send(
            app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": email, "password": PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = router(test_state().await);
        let (status, _, body) = send(&app, Method::GET, "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn register_sets_cookie_and_token_opens_profile() {
        let app = router(test_state().await);

        let (status, headers, body) = send(
            &app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(registration("ada@x.com")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let cookie = headers
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap();
        assert!(cookie.starts_with("sid="));
        assert!(cookie.contains("HttpOnly"));
        assert_eq!(body["user"]["role"], "patient");
        assert!(body["user"].get("password_hash").is_none());

        let token = body["token"].as_str().unwrap();
        let (status, _, profile) =
            send(&app, Method::GET, "/api/v1/auth/profile", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["email"], "ada@x.com");
        assert!(profile["patient_id"].as_str().unwrap().starts_with("PAT"));

        let (status, _, _) =
            send(&app, Method::POST, "/api/v1/auth/logout", Some(token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _, body) =
            send(&app, Method::GET, "/api/v1/auth/profile", Some(token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");
    }

    #[tokio::test]
    async fn provisioning_failures_map_to_status_codes() {
        let app = router(test_state().await);
        send(&app, Method::POST, "/api/v1/auth/register", None, Some(registration("a@x.com")))
            .await;

        let (status, _, body) =
            send(&app, Method::POST, "/api/v1/auth/register", None, Some(registration("A@x.com")))
                .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "email_taken");

        let mut mismatched = registration("b@x.com");
        mismatched["confirmPassword"] = json!("something else");
        let (status, _, body) =
            send(&app, Method::POST, "/api/v1/auth/register", None, Some(mismatched)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "password_mismatch");
    }

    #[tokio::test]
    async fn malformed_json_is_reported_as_json() {
        let app = router(test_state().await);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "invalid_body");
    }

    #[tokio::test]
    async fn login_with_wrong_role_is_unauthorized() {
        let app = router(test_state().await);
        send(&app, Method::POST, "/api/v1/auth/register", None, Some(registration("p@x.com")))
            .await;

        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "p@x.com", "password": PASSWORD, "role": "admin" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "invalid_role");
    }

    #[tokio::test]
    async fn roles_gate_routes() {
        let state = test_state().await;
        employee(&state, "admin@x.com", "admin").await;
        let app = router(state);
        send(&app, Method::POST, "/api/v1/auth/register", None, Some(registration("p@x.com")))
            .await;

        let (status, _, _) = send(&app, Method::GET, "/api/v1/patients", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let patient_token = login(&app, "p@x.com").await;
        let intake = json!({
            "email": "new@x.com",
            "password": PASSWORD,
            "first_name": "New",
            "last_name": "Patient",
            "date_of_birth": "1990-04-01"
        });
        let (status, _, body) = send(
            &app,
            Method::POST,
            "/api/v1/patients",
            Some(&patient_token),
            Some(intake.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "forbidden");

        let (status, _, listed) =
            send(&app, Method::GET, "/api/v1/patients", Some(&patient_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let admin_token = login(&app, "admin@x.com").await;
        let (status, _, created) = send(
            &app,
            Method::POST,
            "/api/v1/patients",
            Some(&admin_token),
            Some(intake),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{created}");
        assert_eq!(created["email"], "new@x.com");

        let (status, _, listed) =
            send(&app, Method::GET, "/api/v1/patients", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let state = test_state().await;
        employee(&state, "admin@x.com", "admin").await;
        let app = router(state);
        let token = login(&app, "admin@x.com").await;

        let (status, _, body) =
            send(&app, Method::GET, "/api/v1/departments/4040", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");

        let (status, _, body) =
            send(&app, Method::GET, "/api/v1/departments/abc", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_path");
    }
}
