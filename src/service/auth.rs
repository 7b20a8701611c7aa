use async_trait::async_trait;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    entities::{enums::Role, users},
    error::{optional, required, ServiceError, ServiceResult},
    repo::{employees::EmployeesRepo, patients::PatientsRepo, users::UsersRepo},
    service::{
        password::{hash_password, validate_password, verify_password},
        provisioning::{
            normalize_email, AccountSummary, NewAccount, ProfileRequest, ProvisionRequest,
            ProvisioningService,
        },
        session::SessionService,
    },
};

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(flatten)]
    pub account: NewAccount,
    #[serde(alias = "confirmPassword")]
    pub confirm_password: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    /// Accepted instead of `email` when `role` is `doctor`.
    pub doctor_id: Option<String>,
    pub password: Option<String>,
    /// When present, must equal the account's role.
    pub role: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    #[serde(alias = "currentPassword")]
    pub current_password: Option<String>,
    #[serde(alias = "newPassword")]
    pub new_password: Option<String>,
}

/// Account summary plus the identifiers of its profile.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct UserView {
    #[serde(flatten)]
    pub account: AccountSummary,
    pub employee_id: Option<String>,
    pub department_id: Option<i32>,
    pub position: Option<String>,
    pub patient_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SignedIn {
    pub token: String,
    pub user: UserView,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, request: RegisterRequest) -> ServiceResult<SignedIn>;
    async fn login(&self, request: LoginRequest) -> ServiceResult<SignedIn>;
    async fn logout(&self, session_id: &str) -> ServiceResult<()>;
    async fn profile(&self, account_id: i32) -> ServiceResult<UserView>;
    async fn update_profile(
        &self,
        account_id: i32,
        update: ProfileUpdate,
    ) -> ServiceResult<AccountSummary>;
    async fn change_password(
        &self,
        account_id: i32,
        request: ChangePasswordRequest,
    ) -> ServiceResult<()>;
}

pub struct AuthServiceImpl {
    users_repo: Arc<dyn UsersRepo>,
    patients_repo: Arc<dyn PatientsRepo>,
    employees_repo: Arc<dyn EmployeesRepo>,
    sessions: Arc<dyn SessionService>,
    provisioning: Arc<dyn ProvisioningService>,
    password_min_length: usize,
}

impl AuthServiceImpl {
    pub fn new(
        users_repo: Arc<dyn UsersRepo>,
        patients_repo: Arc<dyn PatientsRepo>,
        employees_repo: Arc<dyn EmployeesRepo>,
        sessions: Arc<dyn SessionService>,
        provisioning: Arc<dyn ProvisioningService>,
        password_min_length: usize,
    ) -> Self {
        Self {
            users_repo,
            patients_repo,
            employees_repo,
            sessions,
            provisioning,
            password_min_length,
        }
    }

    async fn load_user(&self, account_id: i32) -> ServiceResult<users::Model> {
        self.users_repo
            .find_by_id(account_id)
            .await
            .map_err(ServiceError::db("account lookup"))?
            .ok_or(ServiceError::NotFound("user"))
    }

    async fn user_view(&self, user: &users::Model) -> ServiceResult<UserView> {
        let mut view = UserView {
            account: AccountSummary::from(user),
            employee_id: None,
            department_id: None,
            position: None,
            patient_id: None,
        };
        if user.role.is_employee() {
            let employee = self
                .employees_repo
                .find_by_user_id(user.id)
                .await
                .map_err(ServiceError::db("employee lookup"))?;
            if let Some(employee) = employee {
                view.employee_id = Some(employee.employee_id);
                view.department_id = employee.department_id;
                view.position = Some(employee.position);
            }
        } else {
            let patient = self
                .patients_repo
                .find_by_user_id(user.id)
                .await
                .map_err(ServiceError::db("patient lookup"))?;
            view.patient_id = patient.map(|patient| patient.patient_id);
        }
        Ok(view)
    }

    async fn sign_in(&self, user: &users::Model) -> ServiceResult<SignedIn> {
        let token = self.sessions.create(user.id, user.role).await?;
        Ok(SignedIn {
            token,
            user: self.user_view(user).await?,
        })
    }
}

#[async_trait]
impl AuthService for AuthServiceImpl {
    async fn register(&self, request: RegisterRequest) -> ServiceResult<SignedIn> {
        if let Some(password) = request.account.password.as_deref() {
            if request.confirm_password.as_deref() != Some(password) {
                return Err(ServiceError::PasswordMismatch);
            }
        }

        let provisioned = self
            .provisioning
            .provision(ProvisionRequest {
                account: request.account,
                profile: ProfileRequest::SelfRegistration,
            })
            .await?;

        self.sign_in(&provisioned.account).await
    }

    async fn login(&self, request: LoginRequest) -> ServiceResult<SignedIn> {
        let role = match request.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(value) => Some(
                Role::parse(value).ok_or_else(|| ServiceError::InvalidRole(value.to_string()))?,
            ),
            None => None,
        };
        let password = match request.password {
            Some(password) if !password.is_empty() => password,
            _ => return Err(ServiceError::MissingField("password")),
        };
        let doctor_id = optional(request.doctor_id);

        let user = match (role, doctor_id) {
            (Some(Role::Doctor), Some(doctor_id)) => self
                .users_repo
                .find_by_doctor_id(&doctor_id)
                .await
                .map_err(ServiceError::db("account lookup"))?
                .filter(|user| user.role == Role::Doctor),
            _ => {
                let email = required("email", request.email.as_deref())?;
                let email = normalize_email(&email).map_err(|_| ServiceError::InvalidCredentials)?;
                self.users_repo
                    .find_by_email(&email)
                    .await
                    .map_err(ServiceError::db("account lookup"))?
            }
        };

        let Some(user) = user else {
            return Err(ServiceError::InvalidCredentials);
        };
        verify_password(&user.password_hash, &password)?;

        if role.is_some_and(|role| role != user.role) {
            return Err(ServiceError::RoleMismatch);
        }

        let signed_in = self.sign_in(&user).await?;
        tracing::info!(account_id = user.id, role = user.role.as_str(), "signed in");
        Ok(signed_in)
    }

    async fn logout(&self, session_id: &str) -> ServiceResult<()> {
        self.sessions.delete(session_id).await?;
        Ok(())
    }

    async fn profile(&self, account_id: i32) -> ServiceResult<UserView> {
        let user = self.load_user(account_id).await?;
        self.user_view(&user).await
    }

    async fn update_profile(
        &self,
        account_id: i32,
        update: ProfileUpdate,
    ) -> ServiceResult<AccountSummary> {
        let user = self.load_user(account_id).await?;
        let mut model: users::ActiveModel = user.into();
        if let Some(first_name) = optional(update.first_name) {
            model.first_name = Set(first_name);
        }
        if let Some(last_name) = optional(update.last_name) {
            model.last_name = Set(last_name);
        }
        if let Some(profile_picture) = optional(update.profile_picture) {
            model.profile_picture = Set(Some(profile_picture));
        }
        let updated = self
            .users_repo
            .update(model)
            .await
            .map_err(ServiceError::db("profile update"))?;
        Ok(AccountSummary::from(&updated))
    }

    async fn change_password(
        &self,
        account_id: i32,
        request: ChangePasswordRequest,
    ) -> ServiceResult<()> {
        let current = request
            .current_password
            .filter(|value| !value.is_empty())
            .ok_or(ServiceError::MissingField("current_password"))?;
        let new = request
            .new_password
            .filter(|value| !value.is_empty())
            .ok_or(ServiceError::MissingField("new_password"))?;
        validate_password(&new, self.password_min_length)?;

        let user = self.load_user(account_id).await?;
        verify_password(&user.password_hash, &current)?;

        let password_hash = hash_password(&new)?;
        let mut model: users::ActiveModel = user.into();
        model.password_hash = Set(password_hash);
        model.must_change_password = Set(false);
        self.users_repo
            .update(model)
            .await
            .map_err(ServiceError::db("password update"))?;
        tracing::info!(account_id, "password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{employee, patient, test_state, PASSWORD};

    fn registration(email: &str, password: &str, confirm: &str) -> RegisterRequest {
        RegisterRequest {
            account: NewAccount {
                email: Some(email.to_string()),
                password: Some(password.to_string()),
                first_name: Some("Grace".to_string()),
                last_name: Some("Hopper".to_string()),
            },
            confirm_password: Some(confirm.to_string()),
        }
    }

    fn login_with_email(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn register_signs_in_a_new_patient() {
        let state = test_state().await;

        let signed_in = state
            .auth()
            .register(registration("g@x.com", PASSWORD, PASSWORD))
            .await
            .unwrap();

        assert_eq!(signed_in.user.account.role, Role::Patient);
        assert!(signed_in.user.patient_id.as_deref().is_some_and(|id| id.starts_with("PAT")));
        let session = state.sessions().get(&signed_in.token).await.unwrap().unwrap();
        assert_eq!(session.account_id, signed_in.user.account.id);
    }

    #[tokio::test]
    async fn register_requires_matching_confirmation() {
        let state = test_state().await;
        let err = state
            .auth()
            .register(registration("g@x.com", PASSWORD, "different1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PasswordMismatch));
    }

    #[tokio::test]
    async fn login_by_email_and_wrong_password() {
        let state = test_state().await;
        patient(&state, "p@x.com").await;

        let signed_in = state.auth().login(login_with_email("P@x.com", PASSWORD)).await.unwrap();
        assert_eq!(signed_in.user.account.email.as_deref(), Some("p@x.com"));

        let err = state
            .auth()
            .login(login_with_email("p@x.com", "wrong-password"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));

        let err = state
            .auth()
            .login(login_with_email("nobody@x.com", PASSWORD))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn doctor_logs_in_with_doctor_id() {
        let state = test_state().await;
        let doctor = employee(&state, "doc@x.com", "doctor").await;
        let doctor_id = doctor.account.doctor_id.clone().unwrap();

        let signed_in = state
            .auth()
            .login(LoginRequest {
                doctor_id: Some(doctor_id),
                password: Some(PASSWORD.to_string()),
                role: Some("doctor".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(signed_in.user.account.id, doctor.account.id);
        assert!(signed_in.user.employee_id.is_some());
        assert_eq!(signed_in.user.department_id, Some(1));
    }

    #[tokio::test]
    async fn login_rejects_role_mismatch() {
        let state = test_state().await;
        employee(&state, "nurse@x.com", "nurse").await;

        let mut request = login_with_email("nurse@x.com", PASSWORD);
        request.role = Some("admin".to_string());
        let err = state.auth().login(request).await.unwrap_err();
        assert!(matches!(err, ServiceError::RoleMismatch));
        assert_eq!(err.code(), "invalid_role");
    }

    #[tokio::test]
    async fn logout_drops_the_session() {
        let state = test_state().await;
        patient(&state, "p@x.com").await;
        let signed_in = state.auth().login(login_with_email("p@x.com", PASSWORD)).await.unwrap();

        state.auth().logout(&signed_in.token).await.unwrap();
        assert!(state.sessions().get(&signed_in.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn profile_update_coalesces_blank_fields() {
        let state = test_state().await;
        let created = patient(&state, "p@x.com").await;

        let updated = state
            .auth()
            .update_profile(
                created.account.id,
                ProfileUpdate {
                    first_name: Some("Renamed".to_string()),
                    last_name: Some("  ".to_string()),
                    profile_picture: Some("avatars/p.png".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.first_name, "Renamed");
        assert_eq!(updated.last_name, created.account.last_name);
        assert_eq!(updated.profile_picture.as_deref(), Some("avatars/p.png"));
    }

    #[tokio::test]
    async fn change_password_verifies_current_and_clears_flag() {
        let state = test_state().await;
        let created = patient(&state, "p@x.com").await;
        let id = created.account.id;

        let err = state
            .auth()
            .change_password(
                id,
                ChangePasswordRequest {
                    current_password: Some("not-it-at-all".to_string()),
                    new_password: Some("brand-new-pass".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));

        let err = state
            .auth()
            .change_password(
                id,
                ChangePasswordRequest {
                    current_password: Some(PASSWORD.to_string()),
                    new_password: Some("tiny".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::WeakPassword(8)));

        state
            .auth()
            .change_password(
                id,
                ChangePasswordRequest {
                    current_password: Some(PASSWORD.to_string()),
                    new_password: Some("brand-new-pass".to_string()),
                },
            )
            .await
            .unwrap();

        assert!(state
            .auth()
            .login(login_with_email("p@x.com", "brand-new-pass"))
            .await
            .is_ok());
        let profile = state.auth().profile(id).await.unwrap();
        assert!(!profile.account.must_change_password);
    }
}
