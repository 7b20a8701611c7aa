//! Shared fixtures for unit tests: an in-memory SQLite database with the full
//! schema applied, and an `AppState` wired on top of it.

use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use std::sync::Arc;

use crate::{
    config::Config,
    entities::{appointments, enums::AppointmentStatus},
    repo::{
        employees::{EmployeesRepo, SeaOrmEmployeesRepo},
        patients::{PatientsRepo, SeaOrmPatientsRepo},
        users::{SeaOrmUsersRepo, UsersRepo},
    },
    service::{
        config::ConfigServiceImpl,
        ids::TimestampIdGenerator,
        provisioning::{
            EmployeeDetails, NewAccount, Profile, ProfileRequest, ProvisionRequest, Provisioned,
        },
        scope::Caller,
        session::MemorySessionService,
    },
    state::{AppState, DatabaseClient},
};

pub struct TestDatabaseClient {
    conn: DatabaseConnection,
}

impl DatabaseClient for TestDatabaseClient {
    fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }
}

/// One pooled connection keeps the in-memory database alive for the test.
pub async fn memory_db() -> Arc<dyn DatabaseClient> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let conn = Database::connect(options).await.expect("sqlite connect");
    crate::schema::apply(&conn).await.expect("schema apply");
    Arc::new(TestDatabaseClient { conn })
}

pub struct TestRepos {
    pub db: Arc<dyn DatabaseClient>,
    pub users: Arc<dyn UsersRepo>,
    pub patients: Arc<dyn PatientsRepo>,
    pub employees: Arc<dyn EmployeesRepo>,
}

impl TestRepos {
    pub fn new(db: Arc<dyn DatabaseClient>) -> Self {
        Self {
            users: Arc::new(SeaOrmUsersRepo::new(db.clone())),
            patients: Arc::new(SeaOrmPatientsRepo::new(db.clone())),
            employees: Arc::new(SeaOrmEmployeesRepo::new(db.clone())),
            db,
        }
    }
}

pub async fn test_state() -> Arc<AppState> {
    AppState::from_parts(
        Arc::new(ConfigServiceImpl::from_config(Config::default())),
        memory_db().await,
        Arc::new(MemorySessionService::new(3_600)),
        Arc::new(TimestampIdGenerator),
    )
}

pub const PASSWORD: &str = "longenough1";

fn new_account(email: &str) -> NewAccount {
    let (first, last) = email.split_once('@').unwrap_or((email, "example"));
    NewAccount {
        email: Some(email.to_string()),
        password: Some(PASSWORD.to_string()),
        first_name: Some(first.to_string()),
        last_name: Some(last.to_string()),
    }
}

pub async fn patient(state: &AppState, email: &str) -> Provisioned {
    state
        .provisioning()
        .provision(ProvisionRequest {
            account: new_account(email),
            profile: ProfileRequest::SelfRegistration,
        })
        .await
        .expect("provision patient")
}

pub async fn employee(state: &AppState, email: &str, role: &str) -> Provisioned {
    state
        .provisioning()
        .provision(ProvisionRequest {
            account: new_account(email),
            profile: ProfileRequest::Employee {
                details: EmployeeDetails {
                    role: Some(role.to_string()),
                    position: Some(format!("{role} on duty")),
                    hire_date: Some("2024-01-15".to_string()),
                    department_id: Some(1),
                    specialization: None,
                    salary: Some(5_000.0),
                },
                must_change_password: false,
            },
        })
        .await
        .expect("provision employee")
}

pub fn caller(provisioned: &Provisioned) -> Caller {
    Caller {
        account_id: provisioned.account.id,
        role: provisioned.account.role,
    }
}

pub fn patient_key(provisioned: &Provisioned) -> i32 {
    match &provisioned.profile {
        Profile::Patient(patient) => patient.id,
        Profile::Employee(_) => panic!("not a patient"),
    }
}

pub fn employee_key(provisioned: &Provisioned) -> i32 {
    match &provisioned.profile {
        Profile::Employee(employee) => employee.id,
        Profile::Patient(_) => panic!("not an employee"),
    }
}

/// Inserts an appointment row directly, bypassing service validation.
pub async fn appointment(
    state: &AppState,
    patient_id: i32,
    doctor_id: i32,
    date: &str,
    status: AppointmentStatus,
) -> appointments::Model {
    appointments::ActiveModel {
        patient_id: Set(patient_id),
        doctor_id: Set(doctor_id),
        appointment_date: Set(date.parse().expect("date")),
        appointment_time: Set("09:30:00".parse().expect("time")),
        reason: Set(Some("checkup".to_string())),
        status: Set(status),
        notes: Set(None),
        ..Default::default()
    }
    .insert(state.db().conn())
    .await
    .expect("insert appointment")
}
