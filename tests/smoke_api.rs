use reqwest::StatusCode;
use serde::Deserialize;
use std::{env, time::Duration};
use tokio::time::sleep;
use uuid::Uuid;

const PASSWORD: &str = "Abcdef1!";

#[derive(Deserialize)]
struct SessionResponse {
    token: String,
    must_change_password: bool,
    user: UserResponse,
}

#[derive(Deserialize)]
struct UserResponse {
    id: i64,
    email: Option<String>,
    role: String,
    patient_id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    code: Option<String>,
}

#[tokio::test]
async fn smoke_patient_flow() {
    dotenvy::dotenv().ok();

    // Needs a running server with its database. Only runs when explicitly enabled.
    let run_smoke = env::var("RUN_SMOKE_API")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if !run_smoke {
        eprintln!("skipping smoke_patient_flow (set RUN_SMOKE_API=1 to enable)");
        return;
    }

    let base_url = env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3333".to_string());
    let retries: usize = env::var("SMOKE_API_RETRIES")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(30);
    let retry_delay_ms: u64 = env::var("SMOKE_API_RETRY_DELAY_MS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(300);

    let client = reqwest::Client::new();
    wait_for_health(&client, &base_url, retries, retry_delay_ms).await;

    let email = format!("smoke+{}@example.com", Uuid::new_v4().simple());

    let register = client
        .post(format!("{}/api/v1/auth/register", base_url))
        .json(&serde_json::json!({
            "email": email,
            "password": PASSWORD,
            "confirmPassword": PASSWORD,
            "first_name": "Smoke",
            "last_name": "Test",
        }))
        .send()
        .await
        .expect("register request failed");
    assert_eq!(register.status(), StatusCode::CREATED);
    let register_json: serde_json::Value = register.json().await.expect("register json");
    assert!(
        register_json["user"].get("password_hash").is_none(),
        "register response must not expose the password hash: {}",
        register_json
    );
    let register_body: SessionResponse =
        serde_json::from_value(register_json).expect("register response parse");
    assert_eq!(register_body.user.role, "patient");
    assert!(!register_body.must_change_password);
    assert!(register_body
        .user
        .patient_id
        .as_deref()
        .is_some_and(|id| id.starts_with("PAT")));

    let duplicate = client
        .post(format!("{}/api/v1/auth/register", base_url))
        .json(&serde_json::json!({
            "email": email.to_uppercase(),
            "password": PASSWORD,
            "first_name": "Smoke",
            "last_name": "Again",
        }))
        .send()
        .await
        .expect("duplicate register request failed");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    let duplicate_body: ErrorResponse = duplicate.json().await.expect("duplicate error json");
    assert_eq!(duplicate_body.code.as_deref(), Some("email_taken"));

    let wrong_role = client
        .post(format!("{}/api/v1/auth/login", base_url))
        .json(&serde_json::json!({
            "email": email,
            "password": PASSWORD,
            "role": "doctor",
        }))
        .send()
        .await
        .expect("wrong role login failed");
    assert_eq!(wrong_role.status(), StatusCode::UNAUTHORIZED);

    let login = client
        .post(format!("{}/api/v1/auth/login", base_url))
        .json(&serde_json::json!({
            "email": email,
            "password": PASSWORD,
        }))
        .send()
        .await
        .expect("login request failed");
    assert_eq!(login.status(), StatusCode::OK);
    let sid_cookie = extract_sid_cookie(&login);
    let login_body: SessionResponse = login.json().await.expect("login json");
    assert_eq!(login_body.user.id, register_body.user.id);
    assert_ne!(login_body.token, register_body.token);

    let profile = client
        .get(format!("{}/api/v1/auth/profile", base_url))
        .header(reqwest::header::COOKIE, sid_cookie.clone())
        .send()
        .await
        .expect("profile request failed");
    assert_eq!(profile.status(), StatusCode::OK);
    let profile_body: UserResponse = profile.json().await.expect("profile json");
    assert_eq!(profile_body.email.as_deref(), Some(email.as_str()));

    let patients = client
        .get(format!("{}/api/v1/patients", base_url))
        .bearer_auth(&login_body.token)
        .send()
        .await
        .expect("patients request failed");
    assert_eq!(patients.status(), StatusCode::OK);
    let patients_body: Vec<serde_json::Value> = patients.json().await.expect("patients json");
    assert_eq!(patients_body.len(), 1);

    let payroll = client
        .get(format!("{}/api/v1/payroll", base_url))
        .bearer_auth(&login_body.token)
        .send()
        .await
        .expect("payroll request failed");
    assert_eq!(payroll.status(), StatusCode::FORBIDDEN);

    let logout = client
        .post(format!("{}/api/v1/auth/logout", base_url))
        .header(reqwest::header::COOKIE, sid_cookie.clone())
        .send()
        .await
        .expect("logout request failed");
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    let profile_after = client
        .get(format!("{}/api/v1/auth/profile", base_url))
        .header(reqwest::header::COOKIE, sid_cookie)
        .send()
        .await
        .expect("profile after logout request failed");
    assert_eq!(profile_after.status(), StatusCode::UNAUTHORIZED);
}

async fn wait_for_health(client: &reqwest::Client, base_url: &str, retries: usize, delay_ms: u64) {
    let url = format!("{}/api/v1/health", base_url);
    for attempt in 0..retries {
        match client.get(&url).send().await {
            Ok(response) if response.status() == StatusCode::OK => return,
            _ => {
                if attempt + 1 >= retries {
                    panic!(
                        "service not ready after {} attempts (base_url={})",
                        retries, base_url
                    );
                }
                sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

fn extract_sid_cookie(response: &reqwest::Response) -> String {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| {
            let pair = value.split(';').next()?.trim();
            pair.starts_with("sid=").then(|| pair.to_string())
        })
        .expect("sid cookie missing")
}
