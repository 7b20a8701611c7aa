use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

use crate::{
    entities::{departments, employees},
    error::{optional, required, ServiceError, ServiceResult},
    service::{
        appointments::ensure_doctor,
        query::{names, users_by_ids},
    },
    state::DatabaseClient,
};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DepartmentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Account key of a doctor.
    pub head_doctor_id: Option<i32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DepartmentView {
    #[serde(flatten)]
    pub department: departments::Model,
    pub head_first_name: Option<String>,
    pub head_last_name: Option<String>,
    pub employee_count: i64,
}

#[async_trait]
pub trait DepartmentsService: Send + Sync {
    async fn list(&self) -> ServiceResult<Vec<DepartmentView>>;
    async fn get(&self, id: i32) -> ServiceResult<DepartmentView>;
    async fn create(&self, request: DepartmentRequest) -> ServiceResult<DepartmentView>;
    async fn update(&self, id: i32, request: DepartmentRequest) -> ServiceResult<DepartmentView>;
}

const NAME_TAKEN: &str = "department name already exists";

pub struct DepartmentsServiceImpl {
    db: Arc<dyn DatabaseClient>,
}

impl DepartmentsServiceImpl {
    pub fn new(db: Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }

    async fn views(&self, rows: Vec<departments::Model>) -> ServiceResult<Vec<DepartmentView>> {
        let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
        let counts: HashMap<i32, i64> = if ids.is_empty() {
            HashMap::new()
        } else {
            employees::Entity::find()
                .select_only()
                .column(employees::Column::DepartmentId)
                .column_as(employees::Column::Id.count(), "employee_count")
                .filter(employees::Column::DepartmentId.is_in(ids))
                .group_by(employees::Column::DepartmentId)
                .into_tuple::<(Option<i32>, i64)>()
                .all(self.db.conn())
                .await
                .map_err(ServiceError::db("department headcount"))?
                .into_iter()
                .filter_map(|(department_id, count)| department_id.map(|id| (id, count)))
                .collect()
        };
        let heads = users_by_ids(
            self.db.conn(),
            rows.iter().filter_map(|row| row.head_doctor_id),
        )
        .await
        .map_err(ServiceError::db("department hydration"))?;

        Ok(rows
            .into_iter()
            .map(|department| {
                let (head_first_name, head_last_name) = names(
                    department
                        .head_doctor_id
                        .and_then(|head| heads.get(&head)),
                );
                DepartmentView {
                    employee_count: counts.get(&department.id).copied().unwrap_or(0),
                    head_first_name,
                    head_last_name,
                    department,
                }
            })
            .collect())
    }

    async fn single_view(&self, row: departments::Model) -> ServiceResult<DepartmentView> {
        self.views(vec![row])
            .await?
            .pop()
            .ok_or(ServiceError::NotFound("department"))
    }

    async fn load(&self, id: i32) -> ServiceResult<departments::Model> {
        departments::Entity::find_by_id(id)
            .one(self.db.conn())
            .await
            .map_err(ServiceError::db("department lookup"))?
            .ok_or(ServiceError::NotFound("department"))
    }
}

#[async_trait]
impl DepartmentsService for DepartmentsServiceImpl {
    async fn list(&self) -> ServiceResult<Vec<DepartmentView>> {
        let rows = departments::Entity::find()
            .order_by_asc(departments::Column::Name)
            .all(self.db.conn())
            .await
            .map_err(ServiceError::db("department list"))?;
        self.views(rows).await
    }

    async fn get(&self, id: i32) -> ServiceResult<DepartmentView> {
        let department = self.load(id).await?;
        self.single_view(department).await
    }

    async fn create(&self, request: DepartmentRequest) -> ServiceResult<DepartmentView> {
        let name = required("name", request.name.as_deref())?;
        if let Some(head) = request.head_doctor_id {
            ensure_doctor(self.db.conn(), head).await?;
        }
        let created = departments::ActiveModel {
            name: Set(name),
            description: Set(optional(request.description)),
            head_doctor_id: Set(request.head_doctor_id),
            ..Default::default()
        }
        .insert(self.db.conn())
        .await
        .map_err(ServiceError::from_write("department create", NAME_TAKEN))?;
        tracing::info!(department_id = created.id, name = %created.name, "department created");
        self.single_view(created).await
    }

    async fn update(&self, id: i32, request: DepartmentRequest) -> ServiceResult<DepartmentView> {
        if let Some(head) = request.head_doctor_id {
            ensure_doctor(self.db.conn(), head).await?;
        }
        let mut model: departments::ActiveModel = self.load(id).await?.into();
        if let Some(name) = optional(request.name) {
            model.name = Set(name);
        }
        if let Some(description) = optional(request.description) {
            model.description = Set(Some(description));
        }
        if let Some(head) = request.head_doctor_id {
            model.head_doctor_id = Set(Some(head));
        }
        let updated = model
            .update(self.db.conn())
            .await
            .map_err(ServiceError::from_write("department update", NAME_TAKEN))?;
        self.single_view(updated).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        schema::DEFAULT_DEPARTMENTS,
        testing::{employee, test_state},
    };

    #[tokio::test]
    async fn list_is_sorted_with_headcount_and_head_name() {
        let state = test_state().await;
        let doctor = employee(&state, "doc@x.com", "doctor").await;
        employee(&state, "nurse@x.com", "nurse").await;
        let service = state.departments();
        service
            .update(
                1,
                DepartmentRequest {
                    head_doctor_id: Some(doctor.account.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let listed = service.list().await.unwrap();
        assert_eq!(listed.len(), DEFAULT_DEPARTMENTS.len());
        let names: Vec<&str> = listed.iter().map(|d| d.department.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);

        let first = service.get(1).await.unwrap();
        assert_eq!(first.employee_count, 2);
        assert_eq!(first.head_first_name.as_deref(), Some("doc"));
        assert!(listed
            .iter()
            .filter(|d| d.department.id != 1)
            .all(|d| d.employee_count == 0));
    }

    #[tokio::test]
    async fn names_are_unique() {
        let state = test_state().await;
        let service = state.departments();
        let created = service
            .create(DepartmentRequest {
                name: Some("Oncology".to_string()),
                description: Some("Cancer care".to_string()),
                head_doctor_id: None,
            })
            .await
            .unwrap();
        assert_eq!(created.employee_count, 0);

        let err = service
            .create(DepartmentRequest {
                name: Some("Oncology".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err = service
            .update(
                created.department.id,
                DepartmentRequest {
                    name: Some(DEFAULT_DEPARTMENTS[0].to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn head_must_be_a_doctor_and_missing_ids_are_not_found() {
        let state = test_state().await;
        let nurse = employee(&state, "nurse@x.com", "nurse").await;
        let service = state.departments();

        let err = service
            .create(DepartmentRequest {
                name: Some("Oncology".to_string()),
                head_doctor_id: Some(nurse.account.id),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(matches!(
            service.get(9_999).await,
            Err(ServiceError::NotFound("department"))
        ));
    }
}
