use sea_orm::{DatabaseConnection, DbErr};
use std::sync::Arc;

use crate::{
    repo::{
        employees::{EmployeesRepo, SeaOrmEmployeesRepo},
        patients::{PatientsRepo, SeaOrmPatientsRepo},
        users::{SeaOrmUsersRepo, UsersRepo},
    },
    service::{
        appointments::{AppointmentsService, AppointmentsServiceImpl},
        auth::{AuthService, AuthServiceImpl},
        config::{ConfigService, ConfigServiceImpl},
        departments::{DepartmentsService, DepartmentsServiceImpl},
        employees::{EmployeesService, EmployeesServiceImpl},
        ids::{IdGenerator, TimestampIdGenerator},
        medical_records::{MedicalRecordsService, MedicalRecordsServiceImpl},
        notices::{NoticesService, NoticesServiceImpl},
        patients::{PatientsService, PatientsServiceImpl},
        payroll::{PayrollService, PayrollServiceImpl},
        prescriptions::{PrescriptionsService, PrescriptionsServiceImpl},
        provisioning::{ProvisioningService, ProvisioningServiceImpl},
        reports::{ReportsService, ReportsServiceImpl},
        session::{MemorySessionService, RedisSessionService, SessionError, SessionService},
    },
};

pub trait DatabaseClient: Send + Sync {
    fn conn(&self) -> &DatabaseConnection;
}

pub struct SeaOrmDatabaseClient {
    conn: DatabaseConnection,
}

impl SeaOrmDatabaseClient {
    pub async fn connect(database_url: Option<&str>) -> Result<Self, DbErr> {
        let conn = crate::db::connect(database_url).await?;
        crate::schema::apply(&conn).await?;
        Ok(Self { conn })
    }
}

impl DatabaseClient for SeaOrmDatabaseClient {
    fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("database setup failed: {0}")]
    Database(#[from] DbErr),
    #[error("session store unavailable: {0}")]
    Session(#[from] SessionError),
}

pub struct AppState {
    db: Arc<dyn DatabaseClient>,
    config: Arc<dyn ConfigService>,
    sessions: Arc<dyn SessionService>,
    provisioning: Arc<dyn ProvisioningService>,
    auth: Arc<dyn AuthService>,
    patients: Arc<dyn PatientsService>,
    employees: Arc<dyn EmployeesService>,
    appointments: Arc<dyn AppointmentsService>,
    prescriptions: Arc<dyn PrescriptionsService>,
    medical_records: Arc<dyn MedicalRecordsService>,
    payroll: Arc<dyn PayrollService>,
    departments: Arc<dyn DepartmentsService>,
    notices: Arc<dyn NoticesService>,
    reports: Arc<dyn ReportsService>,
}

impl AppState {
    pub async fn new() -> Result<Arc<Self>, StartupError> {
        let config: Arc<dyn ConfigService> = Arc::new(ConfigServiceImpl::new());
        let values = config.values();

        let db: Arc<dyn DatabaseClient> =
            Arc::new(SeaOrmDatabaseClient::connect(values.database_url.as_deref()).await?);

        let sessions: Arc<dyn SessionService> = match values.redis_url.as_deref() {
            Some(redis_url) => Arc::new(
                RedisSessionService::new(
                    redis_url,
                    values.session_ttl_seconds,
                    values.session_key_prefix.clone(),
                )
                .await?,
            ),
            None => {
                tracing::warn!("REDIS_URL not set, sessions are kept in process memory");
                Arc::new(MemorySessionService::new(values.session_ttl_seconds))
            }
        };

        Ok(Self::from_parts(
            config,
            db,
            sessions,
            Arc::new(TimestampIdGenerator),
        ))
    }

    /// Wires every service on top of the given infrastructure.
    pub fn from_parts(
        config: Arc<dyn ConfigService>,
        db: Arc<dyn DatabaseClient>,
        sessions: Arc<dyn SessionService>,
        ids: Arc<dyn IdGenerator>,
    ) -> Arc<Self> {
        let password_min_length = config.values().password_min_length;
        let users_repo: Arc<dyn UsersRepo> = Arc::new(SeaOrmUsersRepo::new(db.clone()));
        let patients_repo: Arc<dyn PatientsRepo> = Arc::new(SeaOrmPatientsRepo::new(db.clone()));
        let employees_repo: Arc<dyn EmployeesRepo> =
            Arc::new(SeaOrmEmployeesRepo::new(db.clone()));

        let provisioning: Arc<dyn ProvisioningService> = Arc::new(ProvisioningServiceImpl::new(
            db.clone(),
            users_repo.clone(),
            patients_repo.clone(),
            employees_repo.clone(),
            ids,
            password_min_length,
        ));
        let auth = Arc::new(AuthServiceImpl::new(
            users_repo.clone(),
            patients_repo.clone(),
            employees_repo.clone(),
            sessions.clone(),
            provisioning.clone(),
            password_min_length,
        ));
        let patients = Arc::new(PatientsServiceImpl::new(
            db.clone(),
            users_repo.clone(),
            patients_repo.clone(),
            provisioning.clone(),
        ));
        let employees = Arc::new(EmployeesServiceImpl::new(
            db.clone(),
            employees_repo.clone(),
            provisioning.clone(),
        ));
        let appointments = Arc::new(AppointmentsServiceImpl::new(
            db.clone(),
            patients_repo.clone(),
        ));
        let prescriptions = Arc::new(PrescriptionsServiceImpl::new(
            db.clone(),
            patients_repo.clone(),
        ));
        let medical_records = Arc::new(MedicalRecordsServiceImpl::new(
            db.clone(),
            patients_repo.clone(),
        ));
        let payroll = Arc::new(PayrollServiceImpl::new(db.clone(), employees_repo.clone()));
        let departments = Arc::new(DepartmentsServiceImpl::new(db.clone()));
        let notices = Arc::new(NoticesServiceImpl::new(db.clone()));
        let reports = Arc::new(ReportsServiceImpl::new(db.clone(), patients_repo));

        Arc::new(Self {
            db,
            config,
            sessions,
            provisioning,
            auth,
            patients,
            employees,
            appointments,
            prescriptions,
            medical_records,
            payroll,
            departments,
            notices,
            reports,
        })
    }

    pub fn db(&self) -> &dyn DatabaseClient {
        self.db.as_ref()
    }

    pub fn config(&self) -> &dyn ConfigService {
        self.config.as_ref()
    }

    pub fn sessions(&self) -> &dyn SessionService {
        self.sessions.as_ref()
    }

    pub fn provisioning(&self) -> &dyn ProvisioningService {
        self.provisioning.as_ref()
    }

    pub fn auth(&self) -> &dyn AuthService {
        self.auth.as_ref()
    }

    pub fn patients(&self) -> &dyn PatientsService {
        self.patients.as_ref()
    }

    pub fn employees(&self) -> &dyn EmployeesService {
        self.employees.as_ref()
    }

    pub fn appointments(&self) -> &dyn AppointmentsService {
        self.appointments.as_ref()
    }

    pub fn prescriptions(&self) -> &dyn PrescriptionsService {
        self.prescriptions.as_ref()
    }

    pub fn medical_records(&self) -> &dyn MedicalRecordsService {
        self.medical_records.as_ref()
    }

    pub fn payroll(&self) -> &dyn PayrollService {
        self.payroll.as_ref()
    }

    pub fn departments(&self) -> &dyn DepartmentsService {
        self.departments.as_ref()
    }

    pub fn notices(&self) -> &dyn NoticesService {
        self.notices.as_ref()
    }

    pub fn reports(&self) -> &dyn ReportsService {
        self.reports.as_ref()
    }
}
