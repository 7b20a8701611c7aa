use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    entities::medical_records,
    error::{date, optional, required, ServiceError, ServiceResult},
    repo::patients::PatientsRepo,
    service::{
        appointments::{ensure_doctor, ensure_patient},
        query::{contains, parties, patients_matching, search_pattern, Parties},
        scope::{Caller, Narrowed, Ownership, Resource, Scope},
    },
    state::DatabaseClient,
};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RecordQuery {
    pub search: Option<String>,
    pub patient_id: Option<i32>,
    pub doctor_id: Option<i32>,
    pub record_type: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RecordCreate {
    pub patient_id: Option<i32>,
    pub doctor_id: Option<i32>,
    pub record_type: Option<String>,
    pub diagnosis: Option<String>,
    pub symptoms: Option<String>,
    pub treatment: Option<String>,
    pub notes: Option<String>,
    pub record_date: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RecordUpdate {
    pub record_type: Option<String>,
    pub diagnosis: Option<String>,
    pub symptoms: Option<String>,
    pub treatment: Option<String>,
    pub notes: Option<String>,
    pub record_date: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RecordView {
    #[serde(flatten)]
    pub record: medical_records::Model,
    #[serde(flatten)]
    pub parties: Parties,
}

#[async_trait]
pub trait MedicalRecordsService: Send + Sync {
    async fn list(&self, caller: Caller, query: RecordQuery) -> ServiceResult<Vec<RecordView>>;
    async fn get(&self, caller: Caller, id: i32) -> ServiceResult<RecordView>;
    async fn create(&self, request: RecordCreate) -> ServiceResult<RecordView>;
    async fn update(&self, id: i32, update: RecordUpdate) -> ServiceResult<RecordView>;
    async fn delete(&self, id: i32) -> ServiceResult<()>;
}

pub struct MedicalRecordsServiceImpl {
    db: Arc<dyn DatabaseClient>,
    patients_repo: Arc<dyn PatientsRepo>,
}

impl MedicalRecordsServiceImpl {
    pub fn new(db: Arc<dyn DatabaseClient>, patients_repo: Arc<dyn PatientsRepo>) -> Self {
        Self { db, patients_repo }
    }

    async fn views(&self, rows: Vec<medical_records::Model>) -> ServiceResult<Vec<RecordView>> {
        let keys: Vec<(i32, i32)> = rows.iter().map(|row| (row.patient_id, row.doctor_id)).collect();
        let parties = parties(self.db.conn(), &keys)
            .await
            .map_err(ServiceError::db("medical record hydration"))?;
        Ok(rows
            .into_iter()
            .zip(parties)
            .map(|(record, parties)| RecordView { record, parties })
            .collect())
    }

    async fn single_view(&self, row: medical_records::Model) -> ServiceResult<RecordView> {
        self.views(vec![row])
            .await?
            .pop()
            .ok_or(ServiceError::NotFound("medical record"))
    }

    async fn load(&self, id: i32) -> ServiceResult<medical_records::Model> {
        medical_records::Entity::find_by_id(id)
            .one(self.db.conn())
            .await
            .map_err(ServiceError::db("medical record lookup"))?
            .ok_or(ServiceError::NotFound("medical record"))
    }
}

#[async_trait]
impl MedicalRecordsService for MedicalRecordsServiceImpl {
    async fn list(&self, caller: Caller, query: RecordQuery) -> ServiceResult<Vec<RecordView>> {
        let scope = Scope::resolve(caller, self.patients_repo.as_ref()).await?;
        let requested = Ownership {
            patient_id: query.patient_id,
            doctor_id: query.doctor_id,
        };
        let ownership = match scope.narrow(Resource::MedicalRecords, requested) {
            Narrowed::Nothing => return Ok(Vec::new()),
            Narrowed::Rows(ownership) => ownership,
        };

        let mut select = medical_records::Entity::find();
        if let Some(patient_id) = ownership.patient_id {
            select = select.filter(medical_records::Column::PatientId.eq(patient_id));
        }
        if let Some(doctor_id) = ownership.doctor_id {
            select = select.filter(medical_records::Column::DoctorId.eq(doctor_id));
        }
        if let Some(record_type) = optional(query.record_type) {
            select = select.filter(medical_records::Column::RecordType.eq(record_type));
        }
        if let Some(pattern) = search_pattern(query.search.as_deref()) {
            select = select.filter(
                Condition::any()
                    .add(contains(Expr::col(medical_records::Column::Diagnosis), &pattern))
                    .add(contains(Expr::col(medical_records::Column::RecordType), &pattern))
                    .add(
                        medical_records::Column::PatientId
                            .in_subquery(patients_matching(&pattern, false)),
                    ),
            );
        }
        let rows = select
            .order_by_desc(medical_records::Column::RecordDate)
            .order_by_desc(medical_records::Column::Id)
            .all(self.db.conn())
            .await
            .map_err(ServiceError::db("medical record list"))?;
        self.views(rows).await
    }

    async fn get(&self, caller: Caller, id: i32) -> ServiceResult<RecordView> {
        let scope = Scope::resolve(caller, self.patients_repo.as_ref()).await?;
        let record = self.load(id).await?;
        let ownership = Ownership {
            patient_id: Some(record.patient_id),
            doctor_id: Some(record.doctor_id),
        };
        if !scope.permits(Resource::MedicalRecords, ownership) {
            return Err(ServiceError::NotFound("medical record"));
        }
        self.single_view(record).await
    }

    async fn create(&self, request: RecordCreate) -> ServiceResult<RecordView> {
        let patient_id = request.patient_id.ok_or(ServiceError::MissingField("patient_id"))?;
        let doctor_id = request.doctor_id.ok_or(ServiceError::MissingField("doctor_id"))?;
        let record_type = required("record_type", request.record_type.as_deref())?;
        let record_date = date("record_date", request.record_date.as_deref())?
            .unwrap_or_else(|| Utc::now().date_naive());
        ensure_patient(self.db.conn(), patient_id).await?;
        ensure_doctor(self.db.conn(), doctor_id).await?;

        let created = medical_records::ActiveModel {
            patient_id: Set(patient_id),
            doctor_id: Set(doctor_id),
            record_type: Set(record_type),
            diagnosis: Set(optional(request.diagnosis)),
            symptoms: Set(optional(request.symptoms)),
            treatment: Set(optional(request.treatment)),
            notes: Set(optional(request.notes)),
            record_date: Set(record_date),
            ..Default::default()
        }
        .insert(self.db.conn())
        .await
        .map_err(ServiceError::db("medical record create"))?;
        tracing::info!(record_id = created.id, patient_id, "medical record created");
        self.single_view(created).await
    }

    async fn update(&self, id: i32, update: RecordUpdate) -> ServiceResult<RecordView> {
        let record_date = date("record_date", update.record_date.as_deref())?;
        let mut model: medical_records::ActiveModel = self.load(id).await?.into();
        if let Some(record_type) = optional(update.record_type) {
            model.record_type = Set(record_type);
        }
        if let Some(diagnosis) = optional(update.diagnosis) {
            model.diagnosis = Set(Some(diagnosis));
        }
        if let Some(symptoms) = optional(update.symptoms) {
            model.symptoms = Set(Some(symptoms));
        }
        if let Some(treatment) = optional(update.treatment) {
            model.treatment = Set(Some(treatment));
        }
        if let Some(notes) = optional(update.notes) {
            model.notes = Set(Some(notes));
        }
        if let Some(record_date) = record_date {
            model.record_date = Set(record_date);
        }
        let updated = model
            .update(self.db.conn())
            .await
            .map_err(ServiceError::db("medical record update"))?;
        self.single_view(updated).await
    }

    async fn delete(&self, id: i32) -> ServiceResult<()> {
        self.load(id)
            .await?
            .delete(self.db.conn())
            .await
            .map_err(ServiceError::db("medical record delete"))?;
        tracing::info!(record_id = id, "medical record deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{caller, employee, patient, patient_key, test_state};

    fn record(patient_id: i32, doctor_id: i32, record_type: &str) -> RecordCreate {
        RecordCreate {
            patient_id: Some(patient_id),
            doctor_id: Some(doctor_id),
            record_type: Some(record_type.to_string()),
            diagnosis: Some("Seasonal influenza".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn records_default_to_today_and_join_parties() {
        let state = test_state().await;
        let doctor = employee(&state, "doc@x.com", "doctor").await;
        let alice = patient(&state, "alice@x.com").await;

        let created = state
            .medical_records()
            .create(record(patient_key(&alice), doctor.account.id, "consultation"))
            .await
            .unwrap();
        assert_eq!(created.record.record_date, Utc::now().date_naive());
        assert_eq!(created.parties.patient_first_name.as_deref(), Some("alice"));
        assert_eq!(created.parties.doctor_first_name.as_deref(), Some("doc"));
    }

    #[tokio::test]
    async fn patients_only_read_their_own_records() {
        let state = test_state().await;
        let doctor = employee(&state, "doc@x.com", "doctor").await;
        let alice = patient(&state, "alice@x.com").await;
        let bob = patient(&state, "bob@x.com").await;
        let service = state.medical_records();
        service
            .create(record(patient_key(&alice), doctor.account.id, "lab"))
            .await
            .unwrap();
        let bobs = service
            .create(record(patient_key(&bob), doctor.account.id, "lab"))
            .await
            .unwrap();

        let mine = service
            .list(
                caller(&alice),
                RecordQuery {
                    patient_id: Some(patient_key(&bob)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].record.patient_id, patient_key(&alice));

        let err = service.get(caller(&alice), bobs.record.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("medical record")));

        let all = service.list(caller(&doctor), RecordQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn filters_by_type_and_searches_diagnosis() {
        let state = test_state().await;
        let doctor = employee(&state, "doc@x.com", "doctor").await;
        let alice = patient(&state, "alice@x.com").await;
        let service = state.medical_records();
        service
            .create(record(patient_key(&alice), doctor.account.id, "lab"))
            .await
            .unwrap();
        service
            .create(RecordCreate {
                diagnosis: Some("Fractured wrist".to_string()),
                ..record(patient_key(&alice), doctor.account.id, "imaging")
            })
            .await
            .unwrap();

        let labs = service
            .list(
                caller(&doctor),
                RecordQuery {
                    record_type: Some("lab".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(labs.len(), 1);

        let wrists = service
            .list(
                caller(&doctor),
                RecordQuery {
                    search: Some("WRIST".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(wrists.len(), 1);
        assert_eq!(wrists[0].record.record_type, "imaging");
    }

    #[tokio::test]
    async fn update_coalesces_and_delete_removes() {
        let state = test_state().await;
        let doctor = employee(&state, "doc@x.com", "doctor").await;
        let alice = patient(&state, "alice@x.com").await;
        let service = state.medical_records();
        let created = service
            .create(record(patient_key(&alice), doctor.account.id, "consultation"))
            .await
            .unwrap();

        let updated = service
            .update(
                created.record.id,
                RecordUpdate {
                    treatment: Some("Rest and fluids".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.record.treatment.as_deref(), Some("Rest and fluids"));
        assert_eq!(updated.record.diagnosis.as_deref(), Some("Seasonal influenza"));

        service.delete(created.record.id).await.unwrap();
        assert!(matches!(
            service.delete(created.record.id).await,
            Err(ServiceError::NotFound("medical record"))
        ));
    }

    #[tokio::test]
    async fn create_requires_a_real_doctor() {
        let state = test_state().await;
        let nurse = employee(&state, "nurse@x.com", "nurse").await;
        let alice = patient(&state, "alice@x.com").await;

        let err = state
            .medical_records()
            .create(record(patient_key(&alice), nurse.account.id, "lab"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
