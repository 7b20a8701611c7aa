use utoipa::OpenApi;

use crate::{
    entities::enums::Role,
    handler,
    handler::{auth::SessionResponse, error::ErrorResponse, health::Health},
    service::{
        auth::{ChangePasswordRequest, LoginRequest, ProfileUpdate, RegisterRequest, UserView},
        employees::EmployeeCreateRequest,
        patients::PatientIntakeRequest,
        provisioning::{AccountSummary, EmployeeDetails, NewAccount, PatientDetails},
    },
};

#[derive(OpenApi)]
#[openapi(
    paths(
        handler::health::health,
        handler::auth::register,
        handler::auth::login,
        handler::auth::logout,
        handler::auth::profile,
        handler::auth::update_profile,
        handler::auth::change_password,
        handler::patients::create_patient,
        handler::employees::create_employee,
        handler::employees::create_staff
    ),
    components(schemas(
        Health,
        ErrorResponse,
        SessionResponse,
        RegisterRequest,
        LoginRequest,
        ProfileUpdate,
        ChangePasswordRequest,
        UserView,
        AccountSummary,
        NewAccount,
        PatientDetails,
        EmployeeDetails,
        PatientIntakeRequest,
        EmployeeCreateRequest,
        Role
    )),
    tags(
        (name = "health", description = "Health check"),
        (name = "auth", description = "Registration, sessions and profile"),
        (name = "patients", description = "Patient intake"),
        (name = "employees", description = "Employee and staff provisioning")
    )
)]
pub struct ApiDoc;
