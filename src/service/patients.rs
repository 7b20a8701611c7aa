use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use utoipa::ToSchema;

use crate::{
    entities::{
        enums::{PatientStatus, Role},
        patients, users,
    },
    error::{date, optional, ServiceError, ServiceResult},
    repo::{patients::PatientsRepo, users::UsersRepo},
    service::{
        provisioning::{
            NewAccount, PatientDetails, Profile, ProfileRequest, ProvisionRequest,
            ProvisioningService,
        },
        query::{patients_matching, search_pattern, users_by_ids},
        scope::{Caller, Narrowed, Ownership, Resource, Scope},
    },
    state::DatabaseClient,
};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PatientQuery {
    pub search: Option<String>,
    pub status: Option<PatientStatus>,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct PatientIntakeRequest {
    #[serde(flatten)]
    pub account: NewAccount,
    #[serde(flatten)]
    pub details: PatientDetails,
}

/// Absent or blank fields keep their stored value.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PatientUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(flatten)]
    pub details: PatientDetails,
    pub assigned_doctor_id: Option<i32>,
    pub assigned_nurse_id: Option<i32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PatientView {
    #[serde(flatten)]
    pub patient: patients::Model,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub profile_picture: Option<String>,
    pub assigned_doctor_name: Option<String>,
    pub assigned_nurse_name: Option<String>,
}

#[async_trait]
pub trait PatientsService: Send + Sync {
    async fn list(&self, caller: Caller, query: PatientQuery) -> ServiceResult<Vec<PatientView>>;
    async fn get(&self, caller: Caller, id: i32) -> ServiceResult<PatientView>;
    async fn create(&self, request: PatientIntakeRequest) -> ServiceResult<PatientView>;
    async fn update(&self, id: i32, update: PatientUpdate) -> ServiceResult<PatientView>;
    async fn set_status(&self, id: i32, status: PatientStatus) -> ServiceResult<PatientView>;
}

pub struct PatientsServiceImpl {
    db: Arc<dyn DatabaseClient>,
    users_repo: Arc<dyn UsersRepo>,
    patients_repo: Arc<dyn PatientsRepo>,
    provisioning: Arc<dyn ProvisioningService>,
}

impl PatientsServiceImpl {
    pub fn new(
        db: Arc<dyn DatabaseClient>,
        users_repo: Arc<dyn UsersRepo>,
        patients_repo: Arc<dyn PatientsRepo>,
        provisioning: Arc<dyn ProvisioningService>,
    ) -> Self {
        Self {
            db,
            users_repo,
            patients_repo,
            provisioning,
        }
    }

    async fn views(&self, rows: Vec<patients::Model>) -> ServiceResult<Vec<PatientView>> {
        let ids = rows.iter().flat_map(|patient| {
            [
                Some(patient.user_id),
                patient.assigned_doctor_id,
                patient.assigned_nurse_id,
            ]
            .into_iter()
            .flatten()
        });
        let users = users_by_ids(self.db.conn(), ids)
            .await
            .map_err(ServiceError::db("patient hydration"))?;
        Ok(rows
            .into_iter()
            .filter_map(|patient| view(patient, &users))
            .collect())
    }

    async fn single_view(&self, patient: patients::Model) -> ServiceResult<PatientView> {
        self.views(vec![patient])
            .await?
            .pop()
            .ok_or(ServiceError::NotFound("patient"))
    }

    async fn check_assignee(&self, account_id: Option<i32>, role: Role) -> ServiceResult<()> {
        let Some(account_id) = account_id else {
            return Ok(());
        };
        let user = self
            .users_repo
            .find_by_id(account_id)
            .await
            .map_err(ServiceError::db("assignee lookup"))?;
        match user {
            Some(user) if user.role == role => Ok(()),
            _ => Err(ServiceError::InvalidInput(format!(
                "account {account_id} is not a {}",
                role.as_str()
            ))),
        }
    }
}

fn view(patient: patients::Model, users: &HashMap<i32, users::Model>) -> Option<PatientView> {
    let account = users.get(&patient.user_id)?;
    let full_name = |id: Option<i32>| id.and_then(|id| users.get(&id)).map(users::Model::full_name);
    Some(PatientView {
        first_name: account.first_name.clone(),
        last_name: account.last_name.clone(),
        email: account.email.clone(),
        profile_picture: account.profile_picture.clone(),
        assigned_doctor_name: full_name(patient.assigned_doctor_id),
        assigned_nurse_name: full_name(patient.assigned_nurse_id),
        patient,
    })
}

#[async_trait]
impl PatientsService for PatientsServiceImpl {
    async fn list(&self, caller: Caller, query: PatientQuery) -> ServiceResult<Vec<PatientView>> {
        let scope = Scope::resolve(caller, self.patients_repo.as_ref()).await?;
        let ownership = match scope.narrow(Resource::Patients, Ownership::default()) {
            Narrowed::Nothing => return Ok(Vec::new()),
            Narrowed::Rows(ownership) => ownership,
        };

        let mut select = patients::Entity::find();
        if let Some(id) = ownership.patient_id {
            select = select.filter(patients::Column::Id.eq(id));
        }
        if let Some(pattern) = search_pattern(query.search.as_deref()) {
            select = select.filter(patients::Column::Id.in_subquery(patients_matching(&pattern, true)));
        }
        if let Some(status) = query.status {
            select = select.filter(patients::Column::Status.eq(status));
        }
        let rows = select
            .order_by_desc(patients::Column::CreatedAt)
            .order_by_desc(patients::Column::Id)
            .all(self.db.conn())
            .await
            .map_err(ServiceError::db("patient list"))?;
        self.views(rows).await
    }

    async fn get(&self, caller: Caller, id: i32) -> ServiceResult<PatientView> {
        let scope = Scope::resolve(caller, self.patients_repo.as_ref()).await?;
        let patient = self
            .patients_repo
            .find_by_id(id)
            .await
            .map_err(ServiceError::db("patient lookup"))?
            .filter(|patient| {
                scope.permits(
                    Resource::Patients,
                    Ownership {
                        patient_id: Some(patient.id),
                        doctor_id: None,
                    },
                )
            })
            .ok_or(ServiceError::NotFound("patient"))?;
        self.single_view(patient).await
    }

    async fn create(&self, request: PatientIntakeRequest) -> ServiceResult<PatientView> {
        let provisioned = self
            .provisioning
            .provision(ProvisionRequest {
                account: request.account,
                profile: ProfileRequest::PatientIntake(request.details),
            })
            .await?;
        let Profile::Patient(patient) = provisioned.profile else {
            return Err(ServiceError::NotFound("patient"));
        };
        self.single_view(patient).await
    }

    async fn update(&self, id: i32, update: PatientUpdate) -> ServiceResult<PatientView> {
        let date_of_birth = date("date_of_birth", update.details.date_of_birth.as_deref())?;
        self.check_assignee(update.assigned_doctor_id, Role::Doctor).await?;
        self.check_assignee(update.assigned_nurse_id, Role::Nurse).await?;

        let first_name = optional(update.first_name);
        let last_name = optional(update.last_name);
        let details = update.details;
        let assigned_doctor_id = update.assigned_doctor_id;
        let assigned_nurse_id = update.assigned_nurse_id;
        let users_repo = self.users_repo.clone();
        let patients_repo = self.patients_repo.clone();

        let patient = self
            .db
            .conn()
            .transaction::<_, patients::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let patient = patients_repo
                        .find_by_id_with_txn(txn, id)
                        .await
                        .map_err(ServiceError::db("patient lookup"))?
                        .ok_or(ServiceError::NotFound("patient"))?;

                    if first_name.is_some() || last_name.is_some() {
                        let account = users_repo
                            .find_by_id_with_txn(txn, patient.user_id)
                            .await
                            .map_err(ServiceError::db("account lookup"))?
                            .ok_or(ServiceError::NotFound("user"))?;
                        let mut account: users::ActiveModel = account.into();
                        if let Some(first_name) = first_name {
                            account.first_name = Set(first_name);
                        }
                        if let Some(last_name) = last_name {
                            account.last_name = Set(last_name);
                        }
                        users_repo
                            .update_with_txn(txn, account)
                            .await
                            .map_err(ServiceError::db("account update"))?;
                    }

                    let mut model: patients::ActiveModel = patient.into();
                    if let Some(value) = date_of_birth {
                        model.date_of_birth = Set(Some(value));
                    }
                    let text_fields = [
                        (patients::Column::Gender, details.gender),
                        (patients::Column::Phone, details.phone),
                        (patients::Column::Address, details.address),
                        (patients::Column::EmergencyContactName, details.emergency_contact_name),
                        (patients::Column::EmergencyContactPhone, details.emergency_contact_phone),
                        (patients::Column::BloodType, details.blood_type),
                        (patients::Column::Allergies, details.allergies),
                        (patients::Column::MedicalHistory, details.medical_history),
                    ];
                    for (column, value) in text_fields {
                        if let Some(value) = optional(value) {
                            model.set(column, Some(value).into());
                        }
                    }
                    if let Some(doctor_id) = assigned_doctor_id {
                        model.assigned_doctor_id = Set(Some(doctor_id));
                    }
                    if let Some(nurse_id) = assigned_nurse_id {
                        model.assigned_nurse_id = Set(Some(nurse_id));
                    }
                    patients_repo
                        .update_with_txn(txn, model)
                        .await
                        .map_err(ServiceError::db("patient update"))
                })
            })
            .await
            .map_err(|err| match err {
                TransactionError::Connection(source) => ServiceError::Persistence {
                    context: "patient update",
                    source,
                },
                TransactionError::Transaction(err) => err,
            })?;

        tracing::info!(patient_id = patient.id, "patient updated");
        self.single_view(patient).await
    }

    async fn set_status(&self, id: i32, status: PatientStatus) -> ServiceResult<PatientView> {
        let patient = self
            .patients_repo
            .find_by_id(id)
            .await
            .map_err(ServiceError::db("patient lookup"))?
            .ok_or(ServiceError::NotFound("patient"))?;
        let mut model: patients::ActiveModel = patient.into();
        model.status = Set(status);
        let patient = self
            .patients_repo
            .update(model)
            .await
            .map_err(ServiceError::db("patient status update"))?;
        tracing::info!(patient_id = patient.id, status = ?status, "patient status changed");
        self.single_view(patient).await
    }
}
