use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use crate::{
    entities::departments,
    error::{ServiceError, ServiceResult},
    service::provisioning::{EmployeeDetails, NewAccount, ProfileRequest, ProvisionRequest},
    state::AppState,
};

const ADMIN_DEPARTMENT: &str = "Administration";

/// Provisions the bootstrap admin when `SEED_ADMIN_EMAIL` and
/// `SEED_ADMIN_PASSWORD` are both set. Returns whether an account was created.
pub async fn bootstrap_admin(state: &AppState) -> ServiceResult<bool> {
    let values = state.config().values();
    let (Some(email), Some(password)) = (
        values.seed_admin_email.clone(),
        values.seed_admin_password.clone(),
    ) else {
        return Ok(false);
    };

    let department_id = departments::Entity::find()
        .filter(departments::Column::Name.eq(ADMIN_DEPARTMENT))
        .one(state.db().conn())
        .await
        .map_err(ServiceError::db("load admin department"))?
        .map(|department| department.id);

    let request = ProvisionRequest {
        account: NewAccount {
            email: Some(email.clone()),
            password: Some(password),
            first_name: Some("System".to_string()),
            last_name: Some("Administrator".to_string()),
        },
        profile: ProfileRequest::Employee {
            details: EmployeeDetails {
                role: Some("admin".to_string()),
                position: Some("Administrator".to_string()),
                hire_date: Some(Utc::now().date_naive().to_string()),
                department_id,
                specialization: None,
                salary: None,
            },
            must_change_password: true,
        },
    };

    match state.provisioning().provision(request).await {
        Ok(provisioned) => {
            tracing::info!(
                account_id = provisioned.account.id,
                %email,
                "bootstrap admin created"
            );
            Ok(true)
        }
        Err(ServiceError::EmailTaken) => {
            tracing::debug!(%email, "bootstrap admin already present");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}
