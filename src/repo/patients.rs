use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
};
use std::sync::Arc;

use crate::{entities::patients, state::DatabaseClient};

#[async_trait]
pub trait PatientsRepo: Send + Sync {
    async fn insert_with_txn(
        &self,
        txn: &DatabaseTransaction,
        model: patients::ActiveModel,
    ) -> Result<patients::Model, DbErr>;
    async fn find_by_id(&self, id: i32) -> Result<Option<patients::Model>, DbErr>;
    async fn find_by_ids(&self, ids: &[i32]) -> Result<Vec<patients::Model>, DbErr>;
    async fn find_by_user_id(&self, user_id: i32) -> Result<Option<patients::Model>, DbErr>;
    async fn find_by_id_with_txn(
        &self,
        txn: &DatabaseTransaction,
        id: i32,
    ) -> Result<Option<patients::Model>, DbErr>;
    async fn update(&self, model: patients::ActiveModel) -> Result<patients::Model, DbErr>;
    async fn update_with_txn(
        &self,
        txn: &DatabaseTransaction,
        model: patients::ActiveModel,
    ) -> Result<patients::Model, DbErr>;
}

pub struct SeaOrmPatientsRepo {
    db: Arc<dyn DatabaseClient>,
}

impl SeaOrmPatientsRepo {
    pub fn new(db: Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PatientsRepo for SeaOrmPatientsRepo {
    async fn insert_with_txn(
        &self,
        txn: &DatabaseTransaction,
        model: patients::ActiveModel,
    ) -> Result<patients::Model, DbErr> {
        model.insert(txn).await
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<patients::Model>, DbErr> {
        patients::Entity::find_by_id(id).one(self.db.conn()).await
    }

    async fn find_by_ids(&self, ids: &[i32]) -> Result<Vec<patients::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        patients::Entity::find()
            .filter(patients::Column::Id.is_in(ids.iter().copied()))
            .all(self.db.conn())
            .await
    }

    async fn find_by_user_id(&self, user_id: i32) -> Result<Option<patients::Model>, DbErr> {
        patients::Entity::find()
            .filter(patients::Column::UserId.eq(user_id))
            .one(self.db.conn())
            .await
    }

    async fn find_by_id_with_txn(
        &self,
        txn: &DatabaseTransaction,
        id: i32,
    ) -> Result<Option<patients::Model>, DbErr> {
        patients::Entity::find_by_id(id).one(txn).await
    }

    async fn update(&self, model: patients::ActiveModel) -> Result<patients::Model, DbErr> {
        model.update(self.db.conn()).await
    }

    async fn update_with_txn(
        &self,
        txn: &DatabaseTransaction,
        model: patients::ActiveModel,
    ) -> Result<patients::Model, DbErr> {
        model.update(txn).await
    }
}
