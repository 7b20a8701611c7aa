use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    entities::{
        enums::{PrescriptionStatus, Role},
        prescriptions,
    },
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
pub struct PrescriptionQuery {
    pub search: Option<String>,
    pub patient_id: Option<i32>,
    pub doctor_id: Option<i32>,
    pub status: Option<PrescriptionStatus>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PrescriptionCreate {
    pub patient_id: Option<i32>,
    /// Defaults to the caller when a doctor prescribes.
    pub doctor_id: Option<i32>,
    pub medication_name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
    /// `YYYY-MM-DD`, defaults to today.
    pub prescribed_date: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PrescriptionUpdate {
    pub medication_name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
    pub status: Option<PrescriptionStatus>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PrescriptionView {
    #[serde(flatten)]
    pub prescription: prescriptions::Model,
    #[serde(flatten)]
    pub parties: Parties,
}

#[async_trait]
pub trait PrescriptionsService: Send + Sync {
    async fn list(
        &self,
        caller: Caller,
        query: PrescriptionQuery,
    ) -> ServiceResult<Vec<PrescriptionView>>;
    async fn get(&self, caller: Caller, id: i32) -> ServiceResult<PrescriptionView>;
    async fn create(
        &self,
        caller: Caller,
        request: PrescriptionCreate,
    ) -> ServiceResult<PrescriptionView>;
    async fn update(
        &self,
        caller: Caller,
        id: i32,
        update: PrescriptionUpdate,
    ) -> ServiceResult<PrescriptionView>;
    async fn delete(&self, caller: Caller, id: i32) -> ServiceResult<()>;
}

pub struct PrescriptionsServiceImpl {
    db: Arc<dyn DatabaseClient>,
    patients_repo: Arc<dyn PatientsRepo>,
}

impl PrescriptionsServiceImpl {
    pub fn new(db: Arc<dyn DatabaseClient>, patients_repo: Arc<dyn PatientsRepo>) -> Self {
        Self { db, patients_repo }
    }

    async fn views(&self, rows: Vec<prescriptions::Model>) -> ServiceResult<Vec<PrescriptionView>> {
        let keys: Vec<(i32, i32)> = rows.iter().map(|row| (row.patient_id, row.doctor_id)).collect();
        let parties = parties(self.db.conn(), &keys)
            .await
            .map_err(ServiceError::db("prescription hydration"))?;
        Ok(rows
            .into_iter()
            .zip(parties)
            .map(|(prescription, parties)| PrescriptionView {
                prescription,
                parties,
            })
            .collect())
    }

    async fn single_view(&self, row: prescriptions::Model) -> ServiceResult<PrescriptionView> {
        self.views(vec![row])
            .await?
            .pop()
            .ok_or(ServiceError::NotFound("prescription"))
    }

    async fn load_scoped(&self, caller: Caller, id: i32) -> ServiceResult<prescriptions::Model> {
        let scope = Scope::resolve(caller, self.patients_repo.as_ref()).await?;
        let prescription = prescriptions::Entity::find_by_id(id)
            .one(self.db.conn())
            .await
            .map_err(ServiceError::db("prescription lookup"))?
            .ok_or(ServiceError::NotFound("prescription"))?;
        let ownership = Ownership {
            patient_id: Some(prescription.patient_id),
            doctor_id: Some(prescription.doctor_id),
        };
        if !scope.permits(Resource::Prescriptions, ownership) {
            return Err(ServiceError::NotFound("prescription"));
        }
        Ok(prescription)
    }
}

#[async_trait]
impl PrescriptionsService for PrescriptionsServiceImpl {
    async fn list(
        &self,
        caller: Caller,
        query: PrescriptionQuery,
    ) -> ServiceResult<Vec<PrescriptionView>> {
        let scope = Scope::resolve(caller, self.patients_repo.as_ref()).await?;
        let requested = Ownership {
            patient_id: query.patient_id,
            doctor_id: query.doctor_id,
        };
        let ownership = match scope.narrow(Resource::Prescriptions, requested) {
            Narrowed::Nothing => return Ok(Vec::new()),
            Narrowed::Rows(ownership) => ownership,
        };

        let mut select = prescriptions::Entity::find();
        if let Some(patient_id) = ownership.patient_id {
            select = select.filter(prescriptions::Column::PatientId.eq(patient_id));
        }
        if let Some(doctor_id) = ownership.doctor_id {
            select = select.filter(prescriptions::Column::DoctorId.eq(doctor_id));
        }
        if let Some(status) = query.status {
            select = select.filter(prescriptions::Column::Status.eq(status));
        }
        if let Some(pattern) = search_pattern(query.search.as_deref()) {
            select = select.filter(
                Condition::any()
                    .add(contains(
                        Expr::col(prescriptions::Column::MedicationName),
                        &pattern,
                    ))
                    .add(
                        prescriptions::Column::PatientId
                            .in_subquery(patients_matching(&pattern, false)),
                    ),
            );
        }
        let rows = select
            .order_by_desc(prescriptions::Column::PrescribedDate)
            .order_by_desc(prescriptions::Column::Id)
            .all(self.db.conn())
            .await
            .map_err(ServiceError::db("prescription list"))?;
        self.views(rows).await
    }

    async fn get(&self, caller: Caller, id: i32) -> ServiceResult<PrescriptionView> {
        let prescription = self.load_scoped(caller, id).await?;
        self.single_view(prescription).await
    }

    async fn create(
        &self,
        caller: Caller,
        request: PrescriptionCreate,
    ) -> ServiceResult<PrescriptionView> {
        let patient_id = request.patient_id.ok_or(ServiceError::MissingField("patient_id"))?;
        let doctor_id = match (request.doctor_id, caller.role) {
            (Some(doctor_id), _) => doctor_id,
            (None, Role::Doctor) => caller.account_id,
            (None, _) => return Err(ServiceError::MissingField("doctor_id")),
        };
        let medication_name = required("medication_name", request.medication_name.as_deref())?;
        let prescribed_date = date("prescribed_date", request.prescribed_date.as_deref())?
            .unwrap_or_else(|| Utc::now().date_naive());

        let scope = Scope::resolve(caller, self.patients_repo.as_ref()).await?;
        let ownership = Ownership {
            patient_id: Some(patient_id),
            doctor_id: Some(doctor_id),
        };
        if !scope.permits(Resource::Prescriptions, ownership) {
            return Err(ServiceError::Forbidden);
        }
        ensure_patient(self.db.conn(), patient_id).await?;
        ensure_doctor(self.db.conn(), doctor_id).await?;

        let created = prescriptions::ActiveModel {
            patient_id: Set(patient_id),
            doctor_id: Set(doctor_id),
            medication_name: Set(medication_name),
            dosage: Set(optional(request.dosage)),
            frequency: Set(optional(request.frequency)),
            duration: Set(optional(request.duration)),
            instructions: Set(optional(request.instructions)),
            status: Set(PrescriptionStatus::Active),
            prescribed_date: Set(prescribed_date),
            ..Default::default()
        }
        .insert(self.db.conn())
        .await
        .map_err(ServiceError::db("prescription create"))?;
        tracing::info!(prescription_id = created.id, patient_id, doctor_id, "prescription issued");
        self.single_view(created).await
    }

    async fn update(
        &self,
        caller: Caller,
        id: i32,
        update: PrescriptionUpdate,
    ) -> ServiceResult<PrescriptionView> {
        let mut model: prescriptions::ActiveModel = self.load_scoped(caller, id).await?.into();
        if let Some(name) = optional(update.medication_name) {
            model.medication_name = Set(name);
        }
        if let Some(dosage) = optional(update.dosage) {
            model.dosage = Set(Some(dosage));
        }
        if let Some(frequency) = optional(update.frequency) {
            model.frequency = Set(Some(frequency));
        }
        if let Some(duration) = optional(update.duration) {
            model.duration = Set(Some(duration));
        }
        if let Some(instructions) = optional(update.instructions) {
            model.instructions = Set(Some(instructions));
        }
        if let Some(status) = update.status {
            model.status = Set(status);
        }
        let updated = model
            .update(self.db.conn())
            .await
            .map_err(ServiceError::db("prescription update"))?;
        self.single_view(updated).await
    }

    async fn delete(&self, caller: Caller, id: i32) -> ServiceResult<()> {
        let prescription = self.load_scoped(caller, id).await?;
        prescription
            .delete(self.db.conn())
            .await
            .map_err(ServiceError::db("prescription delete"))?;
        tracing::info!(prescription_id = id, account_id = caller.account_id, "prescription deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{caller, employee, patient, patient_key, test_state};

    fn prescription(patient_id: i32, doctor_id: Option<i32>, name: &str) -> PrescriptionCreate {
        PrescriptionCreate {
            patient_id: Some(patient_id),
            doctor_id,
            medication_name: Some(name.to_string()),
            dosage: Some("10mg".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn doctors_only_see_their_own_prescriptions() {
        let state = test_state().await;
        let house = employee(&state, "house@x.com", "doctor").await;
        let wilson = employee(&state, "wilson@x.com", "doctor").await;
        let admin = employee(&state, "admin@x.com", "admin").await;
        let alice = patient(&state, "alice@x.com").await;
        let service = state.prescriptions();

        let by_house = service
            .create(caller(&house), prescription(patient_key(&alice), None, "Vicodin"))
            .await
            .unwrap();
        assert_eq!(by_house.prescription.doctor_id, house.account.id);
        service
            .create(
                caller(&admin),
                prescription(patient_key(&alice), Some(wilson.account.id), "Aspirin"),
            )
            .await
            .unwrap();

        let visible = service
            .list(
                caller(&house),
                PrescriptionQuery {
                    doctor_id: Some(wilson.account.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].prescription.medication_name, "Vicodin");

        let everything = service
            .list(caller(&admin), PrescriptionQuery::default())
            .await
            .unwrap();
        assert_eq!(everything.len(), 2);

        let err = service
            .create(
                caller(&house),
                prescription(patient_key(&alice), Some(wilson.account.id), "Forged"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden));
    }

    #[tokio::test]
    async fn patients_see_their_prescriptions_only() {
        let state = test_state().await;
        let doctor = employee(&state, "doc@x.com", "doctor").await;
        let alice = patient(&state, "alice@x.com").await;
        let bob = patient(&state, "bob@x.com").await;
        let service = state.prescriptions();
        let for_bob = service
            .create(caller(&doctor), prescription(patient_key(&bob), None, "Ibuprofen"))
            .await
            .unwrap();
        service
            .create(caller(&doctor), prescription(patient_key(&alice), None, "Insulin"))
            .await
            .unwrap();

        let mine = service
            .list(caller(&alice), PrescriptionQuery::default())
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].prescription.medication_name, "Insulin");

        let err = service
            .get(caller(&alice), for_bob.prescription.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("prescription")));
    }

    #[tokio::test]
    async fn search_update_and_delete() {
        let state = test_state().await;
        let doctor = employee(&state, "doc@x.com", "doctor").await;
        let alice = patient(&state, "alice@x.com").await;
        let service = state.prescriptions();
        let created = service
            .create(caller(&doctor), prescription(patient_key(&alice), None, "Amoxicillin"))
            .await
            .unwrap();

        let found = service
            .list(
                caller(&doctor),
                PrescriptionQuery {
                    search: Some("amoxi".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let updated = service
            .update(
                caller(&doctor),
                created.prescription.id,
                PrescriptionUpdate {
                    status: Some(PrescriptionStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.prescription.status, PrescriptionStatus::Completed);
        assert_eq!(updated.prescription.dosage.as_deref(), Some("10mg"));

        service.delete(caller(&doctor), created.prescription.id).await.unwrap();
        let err = service
            .get(caller(&doctor), created.prescription.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("prescription")));
    }

    #[tokio::test]
    async fn medication_name_is_required() {
        let state = test_state().await;
        let doctor = employee(&state, "doc@x.com", "doctor").await;
        let alice = patient(&state, "alice@x.com").await;

        let err = state
            .prescriptions()
            .create(caller(&doctor), prescription(patient_key(&alice), None, " "))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::MissingField("medication_name")));
    }
}
