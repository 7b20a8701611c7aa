use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{
    ConnectionTrait, DbBackend, DbErr, EntityTrait, IsolationLevel, Set, SqlErr,
    TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    entities::{
        departments, employees,
        enums::{EmployeeStatus, PatientStatus, Role},
        patients, users,
    },
    error::{date, optional, required, ServiceError, ServiceResult},
    repo::{employees::EmployeesRepo, patients::PatientsRepo, users::UsersRepo},
    service::{
        ids::{IdGenerator, IdKind},
        password::{hash_password, validate_password},
    },
    state::DatabaseClient,
};

/// Credentials and names shared by every provisioning path.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct NewAccount {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Clinical fields captured at patient intake. Blank strings count as absent.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct PatientDetails {
    /// `YYYY-MM-DD`
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub medical_history: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct EmployeeDetails {
    /// One of doctor, nurse, staff, admin.
    pub role: Option<String>,
    pub position: Option<String>,
    /// `YYYY-MM-DD`
    pub hire_date: Option<String>,
    pub department_id: Option<i32>,
    pub specialization: Option<String>,
    pub salary: Option<f64>,
}

#[derive(Clone, Debug)]
pub enum ProfileRequest {
    /// Public sign-up: a patient profile with no clinical data.
    SelfRegistration,
    PatientIntake(PatientDetails),
    Employee {
        details: EmployeeDetails,
        must_change_password: bool,
    },
}

#[derive(Clone, Debug)]
pub struct ProvisionRequest {
    pub account: NewAccount,
    pub profile: ProfileRequest,
}

/// Public view of an account. Never carries the password hash.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct AccountSummary {
    pub id: i32,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub doctor_id: Option<String>,
    pub profile_picture: Option<String>,
    pub must_change_password: bool,
}

impl From<&users::Model> for AccountSummary {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            doctor_id: user.doctor_id.clone(),
            profile_picture: user.profile_picture.clone(),
            must_change_password: user.must_change_password,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Profile {
    Patient(patients::Model),
    Employee(employees::Model),
}

#[derive(Clone, Debug)]
pub struct Provisioned {
    pub account: users::Model,
    pub profile: Profile,
}

#[async_trait]
pub trait ProvisioningService: Send + Sync {
    /// Creates an account and its single profile in one transaction.
    async fn provision(&self, request: ProvisionRequest) -> ServiceResult<Provisioned>;
}

struct ValidAccount {
    email: String,
    password: String,
    first_name: String,
    last_name: String,
}

struct PatientFields {
    date_of_birth: Option<NaiveDate>,
    gender: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    emergency_contact_name: Option<String>,
    emergency_contact_phone: Option<String>,
    blood_type: Option<String>,
    allergies: Option<String>,
    medical_history: Option<String>,
}

impl PatientFields {
    fn empty() -> Self {
        Self {
            date_of_birth: None,
            gender: None,
            phone: None,
            address: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            blood_type: None,
            allergies: None,
            medical_history: None,
        }
    }

    fn into_active_model(self, user_id: i32, patient_id: String) -> patients::ActiveModel {
        patients::ActiveModel {
            user_id: Set(user_id),
            patient_id: Set(patient_id),
            date_of_birth: Set(self.date_of_birth),
            gender: Set(self.gender),
            phone: Set(self.phone),
            address: Set(self.address),
            emergency_contact_name: Set(self.emergency_contact_name),
            emergency_contact_phone: Set(self.emergency_contact_phone),
            blood_type: Set(self.blood_type),
            allergies: Set(self.allergies),
            medical_history: Set(self.medical_history),
            status: Set(PatientStatus::Active),
            assigned_doctor_id: Set(None),
            assigned_nurse_id: Set(None),
            ..Default::default()
        }
    }
}

struct EmployeeFields {
    position: String,
    hire_date: NaiveDate,
    department_id: Option<i32>,
    specialization: Option<String>,
    salary: Option<f64>,
}

impl EmployeeFields {
    fn into_active_model(self, user_id: i32, employee_id: String) -> employees::ActiveModel {
        employees::ActiveModel {
            user_id: Set(user_id),
            employee_id: Set(employee_id),
            department_id: Set(self.department_id),
            position: Set(self.position),
            specialization: Set(self.specialization),
            hire_date: Set(self.hire_date),
            salary: Set(self.salary),
            status: Set(EmployeeStatus::Active),
            ..Default::default()
        }
    }
}

enum ValidProfile {
    Patient(PatientFields),
    Employee(EmployeeFields),
}

struct ValidRequest {
    account: ValidAccount,
    role: Role,
    must_change_password: bool,
    profile: ValidProfile,
}

impl PatientDetails {
    fn validate(self) -> ServiceResult<PatientFields> {
        Ok(PatientFields {
            date_of_birth: date("date_of_birth", self.date_of_birth.as_deref())?,
            gender: optional(self.gender),
            phone: optional(self.phone),
            address: optional(self.address),
            emergency_contact_name: optional(self.emergency_contact_name),
            emergency_contact_phone: optional(self.emergency_contact_phone),
            blood_type: optional(self.blood_type),
            allergies: optional(self.allergies),
            medical_history: optional(self.medical_history),
        })
    }
}

pub(crate) fn normalize_email(email: &str) -> ServiceResult<String> {
    let value = email.trim().to_lowercase();
    let well_formed = value
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !well_formed {
        return Err(ServiceError::InvalidInput("invalid email".to_string()));
    }
    Ok(value)
}

pub struct ProvisioningServiceImpl {
    db: Arc<dyn DatabaseClient>,
    users_repo: Arc<dyn UsersRepo>,
    patients_repo: Arc<dyn PatientsRepo>,
    employees_repo: Arc<dyn EmployeesRepo>,
    ids: Arc<dyn IdGenerator>,
    password_min_length: usize,
}

impl ProvisioningServiceImpl {
    pub fn new(
        db: Arc<dyn DatabaseClient>,
        users_repo: Arc<dyn UsersRepo>,
        patients_repo: Arc<dyn PatientsRepo>,
        employees_repo: Arc<dyn EmployeesRepo>,
        ids: Arc<dyn IdGenerator>,
        password_min_length: usize,
    ) -> Self {
        Self {
            db,
            users_repo,
            patients_repo,
            employees_repo,
            ids,
            password_min_length,
        }
    }

    /// Everything that can be checked without touching the database.
    fn validate(&self, request: ProvisionRequest) -> ServiceResult<ValidRequest> {
        let ProvisionRequest { account, profile } = request;

        let email = required("email", account.email.as_deref())?;
        let password = match account.password {
            Some(password) if !password.is_empty() => password,
            _ => return Err(ServiceError::MissingField("password")),
        };
        let first_name = required("first_name", account.first_name.as_deref())?;
        let last_name = required("last_name", account.last_name.as_deref())?;

        let (role, must_change_password, profile) = match profile {
            ProfileRequest::SelfRegistration => {
                (Role::Patient, false, ValidProfile::Patient(PatientFields::empty()))
            }
            ProfileRequest::PatientIntake(details) => {
                (Role::Patient, false, ValidProfile::Patient(details.validate()?))
            }
            ProfileRequest::Employee {
                details,
                must_change_password,
            } => {
                let role = required("role", details.role.as_deref())?;
                let position = required("position", details.position.as_deref())?;
                let hire_date = date("hire_date", details.hire_date.as_deref())?
                    .ok_or(ServiceError::MissingField("hire_date"))?;
                let role = Role::parse(&role)
                    .filter(Role::is_employee)
                    .ok_or(ServiceError::InvalidRole(role))?;
                if details.salary.is_some_and(|salary| !salary.is_finite() || salary < 0.0) {
                    return Err(ServiceError::InvalidInput(
                        "salary must be a non-negative number".to_string(),
                    ));
                }
                let fields = EmployeeFields {
                    position,
                    hire_date,
                    department_id: details.department_id,
                    specialization: optional(details.specialization),
                    salary: details.salary,
                };
                (role, must_change_password, ValidProfile::Employee(fields))
            }
        };

        let email = normalize_email(&email)?;
        validate_password(&password, self.password_min_length)?;

        Ok(ValidRequest {
            account: ValidAccount {
                email,
                password,
                first_name,
                last_name,
            },
            role,
            must_change_password,
            profile,
        })
    }

    async fn ensure_department_exists(&self, department_id: i32) -> ServiceResult<()> {
        let department = departments::Entity::find_by_id(department_id)
            .one(self.db.conn())
            .await
            .map_err(ServiceError::db("department lookup"))?;
        if department.is_none() {
            return Err(ServiceError::InvalidInput(format!(
                "department {department_id} does not exist"
            )));
        }
        Ok(())
    }

    fn isolation_level(&self) -> Option<IsolationLevel> {
        match self.db.conn().get_database_backend() {
            DbBackend::Postgres => Some(IsolationLevel::ReadCommitted),
            _ => None,
        }
    }
}

/// Unique violations on the email column mean a concurrent sign-up won the
/// race; any other unique violation is a generated identifier collision.
fn classify_write_error(err: DbErr) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) if message.contains("email") => {
            ServiceError::EmailTaken
        }
        Some(SqlErr::UniqueConstraintViolation(message)) => {
            tracing::warn!(%message, "generated identifier collided");
            ServiceError::Conflict("generated identifier already in use, please retry".to_string())
        }
        _ => ServiceError::CreationFailed(err),
    }
}

#[async_trait]
impl ProvisioningService for ProvisioningServiceImpl {
    async fn provision(&self, request: ProvisionRequest) -> ServiceResult<Provisioned> {
        let request = self.validate(request)?;

        let existing = self
            .users_repo
            .find_by_email(&request.account.email)
            .await
            .map_err(ServiceError::db("email lookup"))?;
        if existing.is_some() {
            tracing::debug!(email = %request.account.email, "provisioning rejected, email taken");
            return Err(ServiceError::EmailTaken);
        }
        if let ValidProfile::Employee(EmployeeFields {
            department_id: Some(department_id),
            ..
        }) = &request.profile
        {
            self.ensure_department_exists(*department_id).await?;
        }

        let password_hash = hash_password(&request.account.password)?;
        let isolation = self.isolation_level();
        let users_repo = self.users_repo.clone();
        let patients_repo = self.patients_repo.clone();
        let employees_repo = self.employees_repo.clone();
        let ids = self.ids.clone();
        let ValidRequest {
            account,
            role,
            must_change_password,
            profile,
        } = request;
        let email = account.email.clone();

        let result = self
            .db
            .conn()
            .transaction_with_config::<_, Provisioned, ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let doctor_id = (role == Role::Doctor).then(|| ids.next_id(IdKind::Doctor));
                        let account_model = users::ActiveModel {
                            email: Set(Some(account.email)),
                            password_hash: Set(password_hash),
                            first_name: Set(account.first_name),
                            last_name: Set(account.last_name),
                            role: Set(role),
                            doctor_id: Set(doctor_id),
                            profile_picture: Set(None),
                            must_change_password: Set(must_change_password),
                            ..Default::default()
                        };
                        let account = users_repo
                            .insert_with_txn(txn, account_model)
                            .await
                            .map_err(classify_write_error)?;

                        let profile = match profile {
                            ValidProfile::Patient(fields) => {
                                let model = fields
                                    .into_active_model(account.id, ids.next_id(IdKind::Patient));
                                Profile::Patient(
                                    patients_repo
                                        .insert_with_txn(txn, model)
                                        .await
                                        .map_err(classify_write_error)?,
                                )
                            }
                            ValidProfile::Employee(fields) => {
                                let model = fields
                                    .into_active_model(account.id, ids.next_id(IdKind::Employee));
                                Profile::Employee(
                                    employees_repo
                                        .insert_with_txn(txn, model)
                                        .await
                                        .map_err(classify_write_error)?,
                                )
                            }
                        };

                        Ok(Provisioned { account, profile })
                    })
                },
                isolation,
                None,
            )
            .await;

        match result {
            Ok(provisioned) => {
                tracing::info!(
                    account_id = provisioned.account.id,
                    role = provisioned.account.role.as_str(),
                    "account provisioned"
                );
                Ok(provisioned)
            }
            Err(TransactionError::Connection(err)) => {
                tracing::error!(%email, error = %err, "provisioning transaction failed");
                Err(ServiceError::CreationFailed(err))
            }
            Err(TransactionError::Transaction(err)) => {
                tracing::warn!(%email, code = err.code(), "provisioning rolled back");
                Err(err)
            }
        }
    }
}
