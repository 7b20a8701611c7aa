use async_trait::async_trait;
use sea_orm::{
    sea_query::{Condition, Expr, Query},
    ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use utoipa::ToSchema;

use crate::{
    entities::{
        departments, employees,
        enums::{EmployeeStatus, Role},
        users,
    },
    error::{optional, ServiceError, ServiceResult},
    repo::employees::EmployeesRepo,
    service::{
        provisioning::{
            EmployeeDetails, NewAccount, Profile, ProfileRequest, ProvisionRequest,
            ProvisioningService,
        },
        query::{contains, search_pattern, users_by_ids},
    },
    state::DatabaseClient,
};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EmployeeQuery {
    pub search: Option<String>,
    pub department_id: Option<i32>,
    pub position: Option<String>,
    pub status: Option<EmployeeStatus>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct StaffQuery {
    pub role: Option<Role>,
    pub department_id: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct EmployeeCreateRequest {
    #[serde(flatten)]
    pub account: NewAccount,
    #[serde(flatten)]
    pub details: EmployeeDetails,
}

/// Absent fields keep their stored value.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EmployeeUpdate {
    pub department_id: Option<i32>,
    pub position: Option<String>,
    pub specialization: Option<String>,
    pub salary: Option<f64>,
    pub status: Option<EmployeeStatus>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EmployeeView {
    #[serde(flatten)]
    pub employee: employees::Model,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub doctor_id: Option<String>,
    pub profile_picture: Option<String>,
    pub department_name: Option<String>,
}

#[async_trait]
pub trait EmployeesService: Send + Sync {
    async fn list(&self, query: EmployeeQuery) -> ServiceResult<Vec<EmployeeView>>;
    async fn get(&self, id: i32) -> ServiceResult<EmployeeView>;
    async fn for_account(&self, account_id: i32) -> ServiceResult<EmployeeView>;
    async fn create(
        &self,
        request: EmployeeCreateRequest,
        must_change_password: bool,
    ) -> ServiceResult<EmployeeView>;
    async fn update(&self, id: i32, update: EmployeeUpdate) -> ServiceResult<EmployeeView>;
    async fn staff(&self, query: StaffQuery) -> ServiceResult<Vec<EmployeeView>>;
}

pub struct EmployeesServiceImpl {
    db: Arc<dyn DatabaseClient>,
    employees_repo: Arc<dyn EmployeesRepo>,
    provisioning: Arc<dyn ProvisioningService>,
}

impl EmployeesServiceImpl {
    pub fn new(
        db: Arc<dyn DatabaseClient>,
        employees_repo: Arc<dyn EmployeesRepo>,
        provisioning: Arc<dyn ProvisioningService>,
    ) -> Self {
        Self {
            db,
            employees_repo,
            provisioning,
        }
    }

    async fn views(&self, rows: Vec<employees::Model>) -> ServiceResult<Vec<EmployeeView>> {
        let users = users_by_ids(self.db.conn(), rows.iter().map(|employee| employee.user_id))
            .await
            .map_err(ServiceError::db("employee hydration"))?;
        let department_ids: Vec<i32> = rows.iter().filter_map(|e| e.department_id).collect();
        let departments: HashMap<i32, String> = if department_ids.is_empty() {
            HashMap::new()
        } else {
            departments::Entity::find()
                .filter(departments::Column::Id.is_in(department_ids))
                .all(self.db.conn())
                .await
                .map_err(ServiceError::db("department lookup"))?
                .into_iter()
                .map(|department| (department.id, department.name))
                .collect()
        };

        Ok(rows
            .into_iter()
            .filter_map(|employee| {
                let user = users.get(&employee.user_id)?;
                Some(EmployeeView {
                    first_name: user.first_name.clone(),
                    last_name: user.last_name.clone(),
                    email: user.email.clone(),
                    role: user.role,
                    doctor_id: user.doctor_id.clone(),
                    profile_picture: user.profile_picture.clone(),
                    department_name: employee
                        .department_id
                        .and_then(|id| departments.get(&id).cloned()),
                    employee,
                })
            })
            .collect())
    }

    async fn single_view(&self, employee: employees::Model) -> ServiceResult<EmployeeView> {
        self.views(vec![employee])
            .await?
            .pop()
            .ok_or(ServiceError::NotFound("employee"))
    }

    async fn load(&self, id: i32) -> ServiceResult<employees::Model> {
        self.employees_repo
            .find_by_id(id)
            .await
            .map_err(ServiceError::db("employee lookup"))?
            .ok_or(ServiceError::NotFound("employee"))
    }
}

#[async_trait]
impl EmployeesService for EmployeesServiceImpl {
    async fn list(&self, query: EmployeeQuery) -> ServiceResult<Vec<EmployeeView>> {
        let mut select = employees::Entity::find();
        if let Some(pattern) = search_pattern(query.search.as_deref()) {
            let matching_users = Query::select()
                .column(users::Column::Id)
                .from(users::Entity)
                .cond_where(
                    Condition::any()
                        .add(contains(Expr::col(users::Column::FirstName), &pattern))
                        .add(contains(Expr::col(users::Column::LastName), &pattern))
                        .add(contains(Expr::col(users::Column::Email), &pattern)),
                )
                .to_owned();
            select = select.filter(
                Condition::any()
                    .add(contains(Expr::col(employees::Column::EmployeeId), &pattern))
                    .add(employees::Column::UserId.in_subquery(matching_users)),
            );
        }
        if let Some(department_id) = query.department_id {
            select = select.filter(employees::Column::DepartmentId.eq(department_id));
        }
        if let Some(position) = optional(query.position) {
            select = select.filter(employees::Column::Position.eq(position));
        }
        if let Some(status) = query.status {
            select = select.filter(employees::Column::Status.eq(status));
        }
        let rows = select
            .order_by_desc(employees::Column::CreatedAt)
            .order_by_desc(employees::Column::Id)
            .all(self.db.conn())
            .await
            .map_err(ServiceError::db("employee list"))?;
        self.views(rows).await
    }

    async fn get(&self, id: i32) -> ServiceResult<EmployeeView> {
        let employee = self.load(id).await?;
        self.single_view(employee).await
    }

    async fn for_account(&self, account_id: i32) -> ServiceResult<EmployeeView> {
        let employee = self
            .employees_repo
            .find_by_user_id(account_id)
            .await
            .map_err(ServiceError::db("employee lookup"))?
            .ok_or(ServiceError::NotFound("employee"))?;
        self.single_view(employee).await
    }

    async fn create(
        &self,
        request: EmployeeCreateRequest,
        must_change_password: bool,
    ) -> ServiceResult<EmployeeView> {
        let provisioned = self
            .provisioning
            .provision(ProvisionRequest {
                account: request.account,
                profile: ProfileRequest::Employee {
                    details: request.details,
                    must_change_password,
                },
            })
            .await?;
        let Profile::Employee(employee) = provisioned.profile else {
            return Err(ServiceError::NotFound("employee"));
        };
        self.single_view(employee).await
    }

    async fn update(&self, id: i32, update: EmployeeUpdate) -> ServiceResult<EmployeeView> {
        if update.salary.is_some_and(|salary| !salary.is_finite() || salary < 0.0) {
            return Err(ServiceError::InvalidInput(
                "salary must be a non-negative number".to_string(),
            ));
        }
        if let Some(department_id) = update.department_id {
            let department = departments::Entity::find_by_id(department_id)
                .one(self.db.conn())
                .await
                .map_err(ServiceError::db("department lookup"))?;
            if department.is_none() {
                return Err(ServiceError::InvalidInput(format!(
                    "department {department_id} does not exist"
                )));
            }
        }

        let employee = self.load(id).await?;
        let mut model: employees::ActiveModel = employee.into();
        if let Some(department_id) = update.department_id {
            model.department_id = Set(Some(department_id));
        }
        if let Some(position) = optional(update.position) {
            model.position = Set(position);
        }
        if let Some(specialization) = optional(update.specialization) {
            model.specialization = Set(Some(specialization));
        }
        if let Some(salary) = update.salary {
            model.salary = Set(Some(salary));
        }
        if let Some(status) = update.status {
            model.status = Set(status);
        }
        let employee = self
            .employees_repo
            .update(model)
            .await
            .map_err(ServiceError::db("employee update"))?;
        tracing::info!(employee_id = employee.id, "employee updated");
        self.single_view(employee).await
    }

    async fn staff(&self, query: StaffQuery) -> ServiceResult<Vec<EmployeeView>> {
        let roles: Vec<Role> = match query.role {
            Some(role) if role.is_employee() => vec![role],
            Some(_) => return Ok(Vec::new()),
            None => Role::EMPLOYEE_ROLES.to_vec(),
        };
        let staff_accounts = Query::select()
            .column(users::Column::Id)
            .from(users::Entity)
            .and_where(Expr::col(users::Column::Role).is_in(roles.iter().map(Role::as_str)))
            .to_owned();

        let mut select =
            employees::Entity::find().filter(employees::Column::UserId.in_subquery(staff_accounts));
        if let Some(department_id) = query.department_id {
            select = select.filter(employees::Column::DepartmentId.eq(department_id));
        }
        let rows = select
            .order_by_desc(employees::Column::CreatedAt)
            .order_by_desc(employees::Column::Id)
            .all(self.db.conn())
            .await
            .map_err(ServiceError::db("staff list"))?;
        self.views(rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{employee, employee_key, patient, test_state};

    fn staff_request(email: &str, role: &str) -> EmployeeCreateRequest {
        EmployeeCreateRequest {
            account: NewAccount {
                email: Some(email.to_string()),
                password: Some("longenough1".to_string()),
                first_name: Some("Sam".to_string()),
                last_name: Some("Porter".to_string()),
            },
            details: EmployeeDetails {
                role: Some(role.to_string()),
                position: Some("Porter".to_string()),
                hire_date: Some("2023-03-01".to_string()),
                department_id: Some(2),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn staff_creation_forces_password_change() {
        let state = test_state().await;

        let created = state
            .employees()
            .create(staff_request("sam@x.com", "staff"), true)
            .await
            .unwrap();

        assert_eq!(created.role, Role::Staff);
        assert_eq!(created.department_name.as_deref(), Some("Neurology"));
        let profile = state.auth().profile(created.employee.user_id).await.unwrap();
        assert!(profile.account.must_change_password);
    }

    #[tokio::test]
    async fn list_filters_and_searches() {
        let state = test_state().await;
        employee(&state, "doc@x.com", "doctor").await;
        employee(&state, "nurse@x.com", "nurse").await;
        state
            .employees()
            .create(staff_request("sam@x.com", "staff"), false)
            .await
            .unwrap();

        let in_first = state
            .employees()
            .list(EmployeeQuery {
                department_id: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(in_first.len(), 2);

        let found = state
            .employees()
            .list(EmployeeQuery {
                search: Some("PORTER".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].email.as_deref(), Some("sam@x.com"));
    }

    #[tokio::test]
    async fn staff_listing_excludes_patients_and_filters_role() {
        let state = test_state().await;
        employee(&state, "doc@x.com", "doctor").await;
        employee(&state, "nurse@x.com", "nurse").await;
        patient(&state, "p@x.com").await;

        let everyone = state.employees().staff(StaffQuery::default()).await.unwrap();
        assert_eq!(everyone.len(), 2);

        let doctors = state
            .employees()
            .staff(StaffQuery {
                role: Some(Role::Doctor),
                department_id: None,
            })
            .await
            .unwrap();
        assert_eq!(doctors.len(), 1);
        assert!(doctors[0].doctor_id.is_some());
    }

    #[tokio::test]
    async fn update_and_lookup_by_account() {
        let state = test_state().await;
        let nurse = employee(&state, "nurse@x.com", "nurse").await;

        let updated = state
            .employees()
            .update(
                employee_key(&nurse),
                EmployeeUpdate {
                    salary: Some(6_500.0),
                    status: Some(EmployeeStatus::OnLeave),
                    position: Some(" ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.employee.salary, Some(6_500.0));
        assert_eq!(updated.employee.status, EmployeeStatus::OnLeave);
        assert_eq!(updated.employee.position, "nurse on duty");

        let mine = state.employees().for_account(nurse.account.id).await.unwrap();
        assert_eq!(mine.employee.id, employee_key(&nurse));

        let err = state
            .employees()
            .update(
                employee_key(&nurse),
                EmployeeUpdate {
                    department_id: Some(9_999),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
