use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

use crate::{
    entities::{employees, enums::PayrollStatus, payroll},
    error::{date, ServiceError, ServiceResult},
    repo::employees::EmployeesRepo,
    service::query::users_by_ids,
    state::DatabaseClient,
};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PayrollQuery {
    pub employee_id: Option<i32>,
    pub month: Option<i32>,
    pub year: Option<i32>,
    pub status: Option<PayrollStatus>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PayrollCreate {
    /// Employee profile key.
    pub employee_id: Option<i32>,
    pub month: Option<i32>,
    pub year: Option<i32>,
    pub base_salary: Option<f64>,
    pub allowances: Option<f64>,
    pub deductions: Option<f64>,
    pub bonus: Option<f64>,
}

/// Absent fields keep their stored value. Net salary is recomputed when any
/// amount is given.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PayrollUpdate {
    pub base_salary: Option<f64>,
    pub allowances: Option<f64>,
    pub deductions: Option<f64>,
    pub bonus: Option<f64>,
    pub status: Option<PayrollStatus>,
    pub payment_date: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PayrollView {
    #[serde(flatten)]
    pub payroll: payroll::Model,
    pub employee_code: Option<String>,
    pub position: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

pub fn net_salary(base: f64, allowances: f64, deductions: f64, bonus: f64) -> f64 {
    base + allowances + bonus - deductions
}

fn amount(field: &'static str, value: Option<f64>) -> ServiceResult<Option<f64>> {
    match value {
        Some(value) if !value.is_finite() || value < 0.0 => Err(ServiceError::InvalidInput(
            format!("{field} must be a non-negative number"),
        )),
        other => Ok(other),
    }
}

#[async_trait]
pub trait PayrollService: Send + Sync {
    async fn list(&self, query: PayrollQuery) -> ServiceResult<Vec<PayrollView>>;
    /// Payroll of the employee profile owned by `account_id`.
    async fn for_account(
        &self,
        account_id: i32,
        query: PayrollQuery,
    ) -> ServiceResult<Vec<PayrollView>>;
    async fn create(&self, request: PayrollCreate) -> ServiceResult<PayrollView>;
    async fn update(&self, id: i32, update: PayrollUpdate) -> ServiceResult<PayrollView>;
}

pub struct PayrollServiceImpl {
    db: Arc<dyn DatabaseClient>,
    employees_repo: Arc<dyn EmployeesRepo>,
}

impl PayrollServiceImpl {
    pub fn new(db: Arc<dyn DatabaseClient>, employees_repo: Arc<dyn EmployeesRepo>) -> Self {
        Self { db, employees_repo }
    }

    async fn views(&self, rows: Vec<payroll::Model>) -> ServiceResult<Vec<PayrollView>> {
        let employee_ids: Vec<i32> = rows.iter().map(|row| row.employee_id).collect();
        let employees: HashMap<i32, employees::Model> = self
            .employees_repo
            .find_by_ids(&employee_ids)
            .await
            .map_err(ServiceError::db("payroll hydration"))?
            .into_iter()
            .map(|employee| (employee.id, employee))
            .collect();
        let users = users_by_ids(self.db.conn(), employees.values().map(|e| e.user_id))
            .await
            .map_err(ServiceError::db("payroll hydration"))?;

        Ok(rows
            .into_iter()
            .map(|payroll| {
                let employee = employees.get(&payroll.employee_id);
                let user = employee.and_then(|employee| users.get(&employee.user_id));
                PayrollView {
                    employee_code: employee.map(|employee| employee.employee_id.clone()),
                    position: employee.map(|employee| employee.position.clone()),
                    first_name: user.map(|user| user.first_name.clone()),
                    last_name: user.map(|user| user.last_name.clone()),
                    email: user.and_then(|user| user.email.clone()),
                    payroll,
                }
            })
            .collect())
    }

    async fn single_view(&self, row: payroll::Model) -> ServiceResult<PayrollView> {
        self.views(vec![row])
            .await?
            .pop()
            .ok_or(ServiceError::NotFound("payroll record"))
    }

    async fn query(&self, query: PayrollQuery) -> ServiceResult<Vec<PayrollView>> {
        let mut select = payroll::Entity::find();
        if let Some(employee_id) = query.employee_id {
            select = select.filter(payroll::Column::EmployeeId.eq(employee_id));
        }
        if let Some(month) = query.month {
            select = select.filter(payroll::Column::Month.eq(month));
        }
        if let Some(year) = query.year {
            select = select.filter(payroll::Column::Year.eq(year));
        }
        if let Some(status) = query.status {
            select = select.filter(payroll::Column::Status.eq(status));
        }
        let rows = select
            .order_by_desc(payroll::Column::Year)
            .order_by_desc(payroll::Column::Month)
            .order_by_desc(payroll::Column::Id)
            .all(self.db.conn())
            .await
            .map_err(ServiceError::db("payroll list"))?;
        self.views(rows).await
    }
}

#[async_trait]
impl PayrollService for PayrollServiceImpl {
    async fn list(&self, query: PayrollQuery) -> ServiceResult<Vec<PayrollView>> {
        self.query(query).await
    }

    async fn for_account(
        &self,
        account_id: i32,
        query: PayrollQuery,
    ) -> ServiceResult<Vec<PayrollView>> {
        let employee = self
            .employees_repo
            .find_by_user_id(account_id)
            .await
            .map_err(ServiceError::db("employee lookup"))?;
        let Some(employee) = employee else {
            return Ok(Vec::new());
        };
        self.query(PayrollQuery {
            employee_id: Some(employee.id),
            status: None,
            ..query
        })
        .await
    }

    async fn create(&self, request: PayrollCreate) -> ServiceResult<PayrollView> {
        let employee_id = request.employee_id.ok_or(ServiceError::MissingField("employee_id"))?;
        let month = request.month.ok_or(ServiceError::MissingField("month"))?;
        let year = request.year.ok_or(ServiceError::MissingField("year"))?;
        let base_salary = amount("base_salary", request.base_salary)?
            .ok_or(ServiceError::MissingField("base_salary"))?;
        if !(1..=12).contains(&month) {
            return Err(ServiceError::InvalidInput(
                "month must be between 1 and 12".to_string(),
            ));
        }
        let allowances = amount("allowances", request.allowances)?.unwrap_or(0.0);
        let deductions = amount("deductions", request.deductions)?.unwrap_or(0.0);
        let bonus = amount("bonus", request.bonus)?.unwrap_or(0.0);

        let employee = self
            .employees_repo
            .find_by_id(employee_id)
            .await
            .map_err(ServiceError::db("employee lookup"))?;
        if employee.is_none() {
            return Err(ServiceError::InvalidInput(format!(
                "employee {employee_id} does not exist"
            )));
        }

        let created = payroll::ActiveModel {
            employee_id: Set(employee_id),
            month: Set(month),
            year: Set(year),
            base_salary: Set(base_salary),
            allowances: Set(allowances),
            deductions: Set(deductions),
            bonus: Set(bonus),
            net_salary: Set(net_salary(base_salary, allowances, deductions, bonus)),
            status: Set(PayrollStatus::Pending),
            payment_date: Set(None),
            ..Default::default()
        }
        .insert(self.db.conn())
        .await
        .map_err(ServiceError::from_write(
            "payroll create",
            "payroll record already exists for this employee, month and year",
        ))?;
        tracing::info!(payroll_id = created.id, employee_id, month, year, "payroll created");
        self.single_view(created).await
    }

    async fn update(&self, id: i32, update: PayrollUpdate) -> ServiceResult<PayrollView> {
        let base_salary = amount("base_salary", update.base_salary)?;
        let allowances = amount("allowances", update.allowances)?;
        let deductions = amount("deductions", update.deductions)?;
        let bonus = amount("bonus", update.bonus)?;
        let payment_date = date("payment_date", update.payment_date.as_deref())?;

        let current = payroll::Entity::find_by_id(id)
            .one(self.db.conn())
            .await
            .map_err(ServiceError::db("payroll lookup"))?
            .ok_or(ServiceError::NotFound("payroll record"))?;
        let recompute =
            base_salary.is_some() || allowances.is_some() || deductions.is_some() || bonus.is_some();
        let net = net_salary(
            base_salary.unwrap_or(current.base_salary),
            allowances.unwrap_or(current.allowances),
            deductions.unwrap_or(current.deductions),
            bonus.unwrap_or(current.bonus),
        );

        let mut model: payroll::ActiveModel = current.into();
        if let Some(base_salary) = base_salary {
            model.base_salary = Set(base_salary);
        }
        if let Some(allowances) = allowances {
            model.allowances = Set(allowances);
        }
        if let Some(deductions) = deductions {
            model.deductions = Set(deductions);
        }
        if let Some(bonus) = bonus {
            model.bonus = Set(bonus);
        }
        if recompute {
            model.net_salary = Set(net);
        }
        if let Some(status) = update.status {
            model.status = Set(status);
        }
        if let Some(payment_date) = payment_date {
            model.payment_date = Set(Some(payment_date));
        }
        let updated = model
            .update(self.db.conn())
            .await
            .map_err(ServiceError::db("payroll update"))?;
        self.single_view(updated).await
    }
}
