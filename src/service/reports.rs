use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{
    ColumnTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    entities::{
        appointments, departments, employees,
        enums::{AppointmentStatus, EmployeeStatus, PatientStatus, PrescriptionStatus, Role},
        medical_records, patients, prescriptions,
    },
    error::{date, ServiceError, ServiceResult},
    repo::patients::PatientsRepo,
    service::{
        appointments::{appointment_views, AppointmentView},
        scope::{Caller, Scope},
    },
    state::DatabaseClient,
};

const RECENT_APPOINTMENTS: u64 = 5;

/// Counters shown on the dashboard. Only the ones relevant to the caller's
/// role are present.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_patients: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_appointments: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_employees: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_departments: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_appointments: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_patients: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_prescriptions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_records: Option<u64>,
    pub recent_appointments: Vec<AppointmentView>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct StatsRange {
    #[serde(alias = "startDate")]
    pub start_date: Option<String>,
    #[serde(alias = "endDate")]
    pub end_date: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppointmentStat {
    pub date: NaiveDate,
    pub status: AppointmentStatus,
    pub count: i64,
}

fn counted(result: Result<u64, DbErr>) -> ServiceResult<u64> {
    result.map_err(ServiceError::db("dashboard counter"))
}

#[async_trait]
pub trait ReportsService: Send + Sync {
    async fn dashboard(&self, caller: Caller) -> ServiceResult<DashboardStats>;
    async fn appointment_stats(&self, range: StatsRange) -> ServiceResult<Vec<AppointmentStat>>;
}

pub struct ReportsServiceImpl {
    db: Arc<dyn DatabaseClient>,
    patients_repo: Arc<dyn PatientsRepo>,
}

impl ReportsServiceImpl {
    pub fn new(db: Arc<dyn DatabaseClient>, patients_repo: Arc<dyn PatientsRepo>) -> Self {
        Self { db, patients_repo }
    }

    async fn recent(
        &self,
        select: Select<appointments::Entity>,
    ) -> ServiceResult<Vec<AppointmentView>> {
        let rows = select
            .order_by_desc(appointments::Column::AppointmentDate)
            .order_by_desc(appointments::Column::AppointmentTime)
            .limit(RECENT_APPOINTMENTS)
            .all(self.db.conn())
            .await
            .map_err(ServiceError::db("recent appointments"))?;
        appointment_views(self.db.conn(), rows)
            .await
            .map_err(ServiceError::db("recent appointments"))
    }

    fn scheduled() -> Select<appointments::Entity> {
        appointments::Entity::find()
            .filter(appointments::Column::Status.eq(AppointmentStatus::Scheduled))
    }

    fn active_patients() -> Select<patients::Entity> {
        patients::Entity::find().filter(patients::Column::Status.eq(PatientStatus::Active))
    }
}

#[async_trait]
impl ReportsService for ReportsServiceImpl {
    async fn dashboard(&self, caller: Caller) -> ServiceResult<DashboardStats> {
        let conn = self.db.conn();
        let stats = match caller.role {
            Role::Admin => {
                let active_employees = employees::Entity::find()
                    .filter(employees::Column::Status.eq(EmployeeStatus::Active));
                DashboardStats {
                    total_patients: Some(counted(Self::active_patients().count(conn).await)?),
                    total_appointments: Some(counted(Self::scheduled().count(conn).await)?),
                    total_employees: Some(counted(active_employees.count(conn).await)?),
                    total_departments: Some(counted(
                        departments::Entity::find().count(conn).await,
                    )?),
                    recent_appointments: self.recent(appointments::Entity::find()).await?,
                    ..Default::default()
                }
            }
            Role::Nurse => DashboardStats {
                total_patients: Some(counted(Self::active_patients().count(conn).await)?),
                total_appointments: Some(counted(Self::scheduled().count(conn).await)?),
                recent_appointments: self.recent(appointments::Entity::find()).await?,
                ..Default::default()
            },
            Role::Doctor => {
                let own = appointments::Column::DoctorId.eq(caller.account_id);
                let patients_seen = appointments::Entity::find()
                    .select_only()
                    .column(appointments::Column::PatientId)
                    .distinct()
                    .filter(own.clone())
                    .into_tuple::<i32>()
                    .all(conn)
                    .await
                    .map_err(ServiceError::db("dashboard counter"))?;
                let upcoming = Self::scheduled().filter(own.clone());
                let active_prescriptions = prescriptions::Entity::find()
                    .filter(prescriptions::Column::DoctorId.eq(caller.account_id))
                    .filter(prescriptions::Column::Status.eq(PrescriptionStatus::Active));
                DashboardStats {
                    my_appointments: Some(counted(upcoming.count(conn).await)?),
                    my_patients: Some(patients_seen.len() as u64),
                    my_prescriptions: Some(counted(active_prescriptions.count(conn).await)?),
                    recent_appointments: self
                        .recent(appointments::Entity::find().filter(own))
                        .await?,
                    ..Default::default()
                }
            }
            Role::Patient => {
                let scope = Scope::resolve(caller, self.patients_repo.as_ref()).await?;
                let Some(patient_id) = scope.own_patient_id else {
                    return Ok(DashboardStats::default());
                };
                let own = appointments::Column::PatientId.eq(patient_id);
                let upcoming = Self::scheduled().filter(own.clone());
                let active_prescriptions = prescriptions::Entity::find()
                    .filter(prescriptions::Column::PatientId.eq(patient_id))
                    .filter(prescriptions::Column::Status.eq(PrescriptionStatus::Active));
                let records = medical_records::Entity::find()
                    .filter(medical_records::Column::PatientId.eq(patient_id));
                DashboardStats {
                    my_appointments: Some(counted(upcoming.count(conn).await)?),
                    my_prescriptions: Some(counted(active_prescriptions.count(conn).await)?),
                    my_records: Some(counted(records.count(conn).await)?),
                    recent_appointments: self
                        .recent(appointments::Entity::find().filter(own))
                        .await?,
                    ..Default::default()
                }
            }
            Role::Staff => DashboardStats {
                recent_appointments: self.recent(appointments::Entity::find()).await?,
                ..Default::default()
            },
        };
        Ok(stats)
    }

    async fn appointment_stats(&self, range: StatsRange) -> ServiceResult<Vec<AppointmentStat>> {
        let start = date("start_date", range.start_date.as_deref())?;
        let end = date("end_date", range.end_date.as_deref())?;

        let mut select = appointments::Entity::find()
            .select_only()
            .column(appointments::Column::AppointmentDate)
            .column(appointments::Column::Status)
            .column_as(appointments::Column::Id.count(), "count");
        if let Some(start) = start {
            select = select.filter(appointments::Column::AppointmentDate.gte(start));
        }
        if let Some(end) = end {
            select = select.filter(appointments::Column::AppointmentDate.lte(end));
        }
        let rows = select
            .group_by(appointments::Column::AppointmentDate)
            .group_by(appointments::Column::Status)
            .order_by_desc(appointments::Column::AppointmentDate)
            .order_by_asc(appointments::Column::Status)
            .into_tuple::<(NaiveDate, AppointmentStatus, i64)>()
            .all(self.db.conn())
            .await
            .map_err(ServiceError::db("appointment stats"))?;
        Ok(rows
            .into_iter()
            .map(|(date, status, count)| AppointmentStat {
                date,
                status,
                count,
            })
            .collect())
    }
}
