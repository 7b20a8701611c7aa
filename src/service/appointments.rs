use async_trait::async_trait;
use chrono::NaiveTime;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    entities::{
        appointments,
        enums::{AppointmentStatus, Role},
        patients, users,
    },
    error::{date, optional, ServiceError, ServiceResult},
    repo::patients::PatientsRepo,
    service::{
        query::{parties, patients_matching, search_pattern, Parties},
        scope::{Caller, Narrowed, Ownership, Resource, Scope},
    },
    state::DatabaseClient,
};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AppointmentQuery {
    pub search: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub doctor_id: Option<i32>,
    pub patient_id: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AppointmentCreate {
    pub patient_id: Option<i32>,
    pub doctor_id: Option<i32>,
    /// `YYYY-MM-DD`
    pub appointment_date: Option<String>,
    /// `HH:MM` or `HH:MM:SS`
    pub appointment_time: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

/// Absent fields keep their stored value.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AppointmentUpdate {
    pub doctor_id: Option<i32>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub reason: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: appointments::Model,
    #[serde(flatten)]
    pub parties: Parties,
}

#[async_trait]
pub trait AppointmentsService: Send + Sync {
    async fn list(
        &self,
        caller: Caller,
        query: AppointmentQuery,
    ) -> ServiceResult<Vec<AppointmentView>>;
    async fn get(&self, caller: Caller, id: i32) -> ServiceResult<AppointmentView>;
    async fn create(
        &self,
        caller: Caller,
        request: AppointmentCreate,
    ) -> ServiceResult<AppointmentView>;
    async fn update(
        &self,
        caller: Caller,
        id: i32,
        update: AppointmentUpdate,
    ) -> ServiceResult<AppointmentView>;
    async fn cancel(&self, caller: Caller, id: i32) -> ServiceResult<AppointmentView>;
    async fn complete(
        &self,
        caller: Caller,
        id: i32,
        notes: Option<String>,
    ) -> ServiceResult<AppointmentView>;
}

pub(crate) fn time(field: &'static str, value: Option<&str>) -> ServiceResult<Option<NaiveTime>> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => NaiveTime::parse_from_str(value, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
            .map(Some)
            .map_err(|_| ServiceError::InvalidInput(format!("{field} must be HH:MM"))),
    }
}

/// Joins patient codes and the names of both parties onto appointment rows.
pub(crate) async fn appointment_views<C: ConnectionTrait>(
    conn: &C,
    rows: Vec<appointments::Model>,
) -> Result<Vec<AppointmentView>, DbErr> {
    let keys: Vec<(i32, i32)> = rows.iter().map(|row| (row.patient_id, row.doctor_id)).collect();
    let parties = parties(conn, &keys).await?;
    Ok(rows
        .into_iter()
        .zip(parties)
        .map(|(appointment, parties)| AppointmentView {
            appointment,
            parties,
        })
        .collect())
}

pub(crate) async fn ensure_patient<C: ConnectionTrait>(conn: &C, id: i32) -> ServiceResult<()> {
    let found = patients::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db("patient lookup"))?;
    if found.is_none() {
        return Err(ServiceError::InvalidInput(format!("patient {id} does not exist")));
    }
    Ok(())
}

pub(crate) async fn ensure_doctor<C: ConnectionTrait>(conn: &C, id: i32) -> ServiceResult<()> {
    let found = users::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db("doctor lookup"))?;
    match found {
        Some(user) if user.role == Role::Doctor => Ok(()),
        _ => Err(ServiceError::InvalidInput(format!("account {id} is not a doctor"))),
    }
}

pub struct AppointmentsServiceImpl {
    db: Arc<dyn DatabaseClient>,
    patients_repo: Arc<dyn PatientsRepo>,
}

impl AppointmentsServiceImpl {
    pub fn new(db: Arc<dyn DatabaseClient>, patients_repo: Arc<dyn PatientsRepo>) -> Self {
        Self { db, patients_repo }
    }

    async fn load(&self, id: i32) -> ServiceResult<appointments::Model> {
        appointments::Entity::find_by_id(id)
            .one(self.db.conn())
            .await
            .map_err(ServiceError::db("appointment lookup"))?
            .ok_or(ServiceError::NotFound("appointment"))
    }

    async fn load_scoped(&self, caller: Caller, id: i32) -> ServiceResult<appointments::Model> {
        let scope = Scope::resolve(caller, self.patients_repo.as_ref()).await?;
        let appointment = self.load(id).await?;
        let ownership = Ownership {
            patient_id: Some(appointment.patient_id),
            doctor_id: Some(appointment.doctor_id),
        };
        if !scope.permits(Resource::Appointments, ownership) {
            return Err(ServiceError::NotFound("appointment"));
        }
        Ok(appointment)
    }

    async fn single_view(&self, row: appointments::Model) -> ServiceResult<AppointmentView> {
        appointment_views(self.db.conn(), vec![row])
            .await
            .map_err(ServiceError::db("appointment hydration"))?
            .pop()
            .ok_or(ServiceError::NotFound("appointment"))
    }

    async fn save(&self, model: appointments::ActiveModel) -> ServiceResult<AppointmentView> {
        let saved = model
            .update(self.db.conn())
            .await
            .map_err(ServiceError::db("appointment update"))?;
        self.single_view(saved).await
    }
}

#[async_trait]
impl AppointmentsService for AppointmentsServiceImpl {
    async fn list(
        &self,
        caller: Caller,
        query: AppointmentQuery,
    ) -> ServiceResult<Vec<AppointmentView>> {
        let scope = Scope::resolve(caller, self.patients_repo.as_ref()).await?;
        let requested = Ownership {
            patient_id: query.patient_id,
            doctor_id: query.doctor_id,
        };
        let ownership = match scope.narrow(Resource::Appointments, requested) {
            Narrowed::Nothing => return Ok(Vec::new()),
            Narrowed::Rows(ownership) => ownership,
        };

        let mut select = appointments::Entity::find();
        if let Some(patient_id) = ownership.patient_id {
            select = select.filter(appointments::Column::PatientId.eq(patient_id));
        }
        if let Some(doctor_id) = ownership.doctor_id {
            select = select.filter(appointments::Column::DoctorId.eq(doctor_id));
        }
        if let Some(status) = query.status {
            select = select.filter(appointments::Column::Status.eq(status));
        }
        if let Some(pattern) = search_pattern(query.search.as_deref()) {
            select = select.filter(
                appointments::Column::PatientId.in_subquery(patients_matching(&pattern, false)),
            );
        }
        let rows = select
            .order_by_desc(appointments::Column::AppointmentDate)
            .order_by_desc(appointments::Column::AppointmentTime)
            .all(self.db.conn())
            .await
            .map_err(ServiceError::db("appointment list"))?;
        appointment_views(self.db.conn(), rows)
            .await
            .map_err(ServiceError::db("appointment hydration"))
    }

    async fn get(&self, caller: Caller, id: i32) -> ServiceResult<AppointmentView> {
        let appointment = self.load_scoped(caller, id).await?;
        self.single_view(appointment).await
    }

    async fn create(
        &self,
        caller: Caller,
        request: AppointmentCreate,
    ) -> ServiceResult<AppointmentView> {
        let patient_id = request.patient_id.ok_or(ServiceError::MissingField("patient_id"))?;
        let doctor_id = request.doctor_id.ok_or(ServiceError::MissingField("doctor_id"))?;
        let appointment_date = date("appointment_date", request.appointment_date.as_deref())?
            .ok_or(ServiceError::MissingField("appointment_date"))?;
        let appointment_time = time("appointment_time", request.appointment_time.as_deref())?
            .ok_or(ServiceError::MissingField("appointment_time"))?;

        let scope = Scope::resolve(caller, self.patients_repo.as_ref()).await?;
        let ownership = Ownership {
            patient_id: Some(patient_id),
            doctor_id: Some(doctor_id),
        };
        if !scope.permits(Resource::Appointments, ownership) {
            return Err(ServiceError::Forbidden);
        }
        ensure_patient(self.db.conn(), patient_id).await?;
        ensure_doctor(self.db.conn(), doctor_id).await?;

        let created = appointments::ActiveModel {
            patient_id: Set(patient_id),
            doctor_id: Set(doctor_id),
            appointment_date: Set(appointment_date),
            appointment_time: Set(appointment_time),
            reason: Set(optional(request.reason)),
            status: Set(AppointmentStatus::Scheduled),
            notes: Set(optional(request.notes)),
            ..Default::default()
        }
        .insert(self.db.conn())
        .await
        .map_err(ServiceError::db("appointment create"))?;
        tracing::info!(appointment_id = created.id, patient_id, doctor_id, "appointment booked");
        self.single_view(created).await
    }

    async fn update(
        &self,
        caller: Caller,
        id: i32,
        update: AppointmentUpdate,
    ) -> ServiceResult<AppointmentView> {
        let appointment_date = date("appointment_date", update.appointment_date.as_deref())?;
        let appointment_time = time("appointment_time", update.appointment_time.as_deref())?;
        if let Some(doctor_id) = update.doctor_id {
            ensure_doctor(self.db.conn(), doctor_id).await?;
        }

        let mut model: appointments::ActiveModel = self.load_scoped(caller, id).await?.into();
        if let Some(doctor_id) = update.doctor_id {
            model.doctor_id = Set(doctor_id);
        }
        if let Some(value) = appointment_date {
            model.appointment_date = Set(value);
        }
        if let Some(value) = appointment_time {
            model.appointment_time = Set(value);
        }
        if let Some(reason) = optional(update.reason) {
            model.reason = Set(Some(reason));
        }
        if let Some(status) = update.status {
            model.status = Set(status);
        }
        if let Some(notes) = optional(update.notes) {
            model.notes = Set(Some(notes));
        }
        self.save(model).await
    }

    async fn cancel(&self, caller: Caller, id: i32) -> ServiceResult<AppointmentView> {
        let mut model: appointments::ActiveModel = self.load_scoped(caller, id).await?.into();
        model.status = Set(AppointmentStatus::Cancelled);
        let view = self.save(model).await?;
        tracing::info!(appointment_id = id, account_id = caller.account_id, "appointment cancelled");
        Ok(view)
    }

    async fn complete(
        &self,
        caller: Caller,
        id: i32,
        notes: Option<String>,
    ) -> ServiceResult<AppointmentView> {
        let mut model: appointments::ActiveModel = self.load_scoped(caller, id).await?.into();
        model.status = Set(AppointmentStatus::Completed);
        if let Some(notes) = optional(notes) {
            model.notes = Set(Some(notes));
        }
        self.save(model).await
    }
}
