use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
};
use std::sync::Arc;

use crate::{entities::employees, state::DatabaseClient};

#[async_trait]
pub trait EmployeesRepo: Send + Sync {
    async fn insert_with_txn(
        &self,
        txn: &DatabaseTransaction,
        model: employees::ActiveModel,
    ) -> Result<employees::Model, DbErr>;
    async fn find_by_id(&self, id: i32) -> Result<Option<employees::Model>, DbErr>;
    async fn find_by_ids(&self, ids: &[i32]) -> Result<Vec<employees::Model>, DbErr>;
    async fn find_by_user_id(&self, user_id: i32) -> Result<Option<employees::Model>, DbErr>;
    async fn update(&self, model: employees::ActiveModel) -> Result<employees::Model, DbErr>;
}

pub struct SeaOrmEmployeesRepo {
    db: Arc<dyn DatabaseClient>,
}

impl SeaOrmEmployeesRepo {
    pub fn new(db: Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EmployeesRepo for SeaOrmEmployeesRepo {
    async fn insert_with_txn(
        &self,
        txn: &DatabaseTransaction,
        model: employees::ActiveModel,
    ) -> Result<employees::Model, DbErr> {
        model.insert(txn).await
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<employees::Model>, DbErr> {
        employees::Entity::find_by_id(id).one(self.db.conn()).await
    }

    async fn find_by_ids(&self, ids: &[i32]) -> Result<Vec<employees::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        employees::Entity::find()
            .filter(employees::Column::Id.is_in(ids.iter().copied()))
            .all(self.db.conn())
            .await
    }

    async fn find_by_user_id(&self, user_id: i32) -> Result<Option<employees::Model>, DbErr> {
        employees::Entity::find()
            .filter(employees::Column::UserId.eq(user_id))
            .one(self.db.conn())
            .await
    }

    async fn update(&self, model: employees::ActiveModel) -> Result<employees::Model, DbErr> {
        model.update(self.db.conn()).await
    }
}
