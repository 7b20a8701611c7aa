use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
};
use std::sync::Arc;

use crate::{entities::users, state::DatabaseClient};

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn insert_with_txn(
        &self,
        txn: &DatabaseTransaction,
        model: users::ActiveModel,
    ) -> Result<users::Model, DbErr>;
    async fn find_by_id(&self, id: i32) -> Result<Option<users::Model>, DbErr>;
    async fn find_by_ids(&self, ids: &[i32]) -> Result<Vec<users::Model>, DbErr>;
    async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>, DbErr>;
    async fn find_by_doctor_id(&self, doctor_id: &str) -> Result<Option<users::Model>, DbErr>;
    async fn find_by_id_with_txn(
        &self,
        txn: &DatabaseTransaction,
        id: i32,
    ) -> Result<Option<users::Model>, DbErr>;
    async fn update(&self, model: users::ActiveModel) -> Result<users::Model, DbErr>;
    async fn update_with_txn(
        &self,
        txn: &DatabaseTransaction,
        model: users::ActiveModel,
    ) -> Result<users::Model, DbErr>;
}

pub struct SeaOrmUsersRepo {
    db: Arc<dyn DatabaseClient>,
}

impl SeaOrmUsersRepo {
    pub fn new(db: Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UsersRepo for SeaOrmUsersRepo {
    async fn insert_with_txn(
        &self,
        txn: &DatabaseTransaction,
        model: users::ActiveModel,
    ) -> Result<users::Model, DbErr> {
        model.insert(txn).await
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find_by_id(id).one(self.db.conn()).await
    }

    async fn find_by_ids(&self, ids: &[i32]) -> Result<Vec<users::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        users::Entity::find()
            .filter(users::Column::Id.is_in(ids.iter().copied()))
            .all(self.db.conn())
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(self.db.conn())
            .await
    }

    async fn find_by_doctor_id(&self, doctor_id: &str) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::DoctorId.eq(doctor_id))
            .one(self.db.conn())
            .await
    }

    async fn find_by_id_with_txn(
        &self,
        txn: &DatabaseTransaction,
        id: i32,
    ) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find_by_id(id).one(txn).await
    }

    async fn update(&self, model: users::ActiveModel) -> Result<users::Model, DbErr> {
        model.update(self.db.conn()).await
    }

    async fn update_with_txn(
        &self,
        txn: &DatabaseTransaction,
        model: users::ActiveModel,
    ) -> Result<users::Model, DbErr> {
        model.update(txn).await
    }
}
