use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    entities::{
        enums::{NoticeAudience, NoticePriority},
        notices,
    },
    error::{optional, required, ServiceError, ServiceResult},
    service::{
        query::{names, users_by_ids},
        scope::{Caller, Scope},
    },
    state::DatabaseClient,
};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NoticeQuery {
    pub priority: Option<NoticePriority>,
    /// Honored for admins only.
    pub target_audience: Option<NoticeAudience>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NoticeRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub priority: Option<NoticePriority>,
    pub target_audience: Option<NoticeAudience>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NoticeView {
    #[serde(flatten)]
    pub notice: notices::Model,
    pub created_by_first_name: Option<String>,
    pub created_by_last_name: Option<String>,
}

#[async_trait]
pub trait NoticesService: Send + Sync {
    async fn list(&self, caller: Caller, query: NoticeQuery) -> ServiceResult<Vec<NoticeView>>;
    async fn get(&self, caller: Caller, id: i32) -> ServiceResult<NoticeView>;
    async fn create(&self, caller: Caller, request: NoticeRequest) -> ServiceResult<NoticeView>;
    async fn update(&self, id: i32, request: NoticeRequest) -> ServiceResult<NoticeView>;
    async fn delete(&self, id: i32) -> ServiceResult<()>;
}

fn scope(caller: Caller) -> Scope {
    Scope {
        caller,
        own_patient_id: None,
    }
}

pub struct NoticesServiceImpl {
    db: Arc<dyn DatabaseClient>,
}

impl NoticesServiceImpl {
    pub fn new(db: Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }

    async fn views(&self, rows: Vec<notices::Model>) -> ServiceResult<Vec<NoticeView>> {
        let authors = users_by_ids(self.db.conn(), rows.iter().filter_map(|row| row.created_by))
            .await
            .map_err(ServiceError::db("notice hydration"))?;
        Ok(rows
            .into_iter()
            .map(|notice| {
                let (created_by_first_name, created_by_last_name) =
                    names(notice.created_by.and_then(|author| authors.get(&author)));
                NoticeView {
                    notice,
                    created_by_first_name,
                    created_by_last_name,
                }
            })
            .collect())
    }

    async fn single_view(&self, row: notices::Model) -> ServiceResult<NoticeView> {
        self.views(vec![row])
            .await?
            .pop()
            .ok_or(ServiceError::NotFound("notice"))
    }

    async fn load(&self, id: i32) -> ServiceResult<notices::Model> {
        notices::Entity::find_by_id(id)
            .one(self.db.conn())
            .await
            .map_err(ServiceError::db("notice lookup"))?
            .ok_or(ServiceError::NotFound("notice"))
    }
}

#[async_trait]
impl NoticesService for NoticesServiceImpl {
    async fn list(&self, caller: Caller, query: NoticeQuery) -> ServiceResult<Vec<NoticeView>> {
        let mut select = notices::Entity::find();
        if let Some(audiences) = scope(caller).notice_audiences(query.target_audience) {
            select = select.filter(notices::Column::TargetAudience.is_in(audiences));
        }
        if let Some(priority) = query.priority {
            select = select.filter(notices::Column::Priority.eq(priority));
        }
        let rows = select
            .order_by_desc(notices::Column::CreatedAt)
            .order_by_desc(notices::Column::Id)
            .all(self.db.conn())
            .await
            .map_err(ServiceError::db("notice list"))?;
        self.views(rows).await
    }

    async fn get(&self, caller: Caller, id: i32) -> ServiceResult<NoticeView> {
        let notice = self.load(id).await?;
        let visible = scope(caller)
            .notice_audiences(None)
            .map_or(true, |audiences| audiences.contains(&notice.target_audience));
        if !visible {
            return Err(ServiceError::NotFound("notice"));
        }
        self.single_view(notice).await
    }

    async fn create(&self, caller: Caller, request: NoticeRequest) -> ServiceResult<NoticeView> {
        let title = required("title", request.title.as_deref())?;
        let content = required("content", request.content.as_deref())?;
        let created = notices::ActiveModel {
            title: Set(title),
            content: Set(content),
            priority: Set(request.priority.unwrap_or(NoticePriority::Normal)),
            target_audience: Set(request.target_audience.unwrap_or(NoticeAudience::All)),
            created_by: Set(Some(caller.account_id)),
            ..Default::default()
        }
        .insert(self.db.conn())
        .await
        .map_err(ServiceError::db("notice create"))?;
        tracing::info!(notice_id = created.id, author = caller.account_id, "notice published");
        self.single_view(created).await
    }

    async fn update(&self, id: i32, request: NoticeRequest) -> ServiceResult<NoticeView> {
        let mut model: notices::ActiveModel = self.load(id).await?.into();
        if let Some(title) = optional(request.title) {
            model.title = Set(title);
        }
        if let Some(content) = optional(request.content) {
            model.content = Set(content);
        }
        if let Some(priority) = request.priority {
            model.priority = Set(priority);
        }
        if let Some(audience) = request.target_audience {
            model.target_audience = Set(audience);
        }
        let updated = model
            .update(self.db.conn())
            .await
            .map_err(ServiceError::db("notice update"))?;
        self.single_view(updated).await
    }

    async fn delete(&self, id: i32) -> ServiceResult<()> {
        self.load(id)
            .await?
            .delete(self.db.conn())
            .await
            .map_err(ServiceError::db("notice delete"))?;
        tracing::info!(notice_id = id, "notice deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entities::enums::Role,
        testing::{caller, employee, patient, test_state},
    };

    fn notice(title: &str, audience: Option<NoticeAudience>) -> NoticeRequest {
        NoticeRequest {
            title: Some(title.to_string()),
            content: Some(format!("{title} details")),
            priority: None,
            target_audience: audience,
        }
    }

    #[tokio::test]
    async fn defaults_and_author_are_recorded() {
        let state = test_state().await;
        let admin = employee(&state, "admin@x.com", "admin").await;

        let created = state
            .notices()
            .create(caller(&admin), notice("Fire drill", None))
            .await
            .unwrap();
        assert_eq!(created.notice.priority, NoticePriority::Normal);
        assert_eq!(created.notice.target_audience, NoticeAudience::All);
        assert_eq!(created.notice.created_by, Some(admin.account.id));
        assert_eq!(created.created_by_first_name.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn audiences_narrow_by_role() {
        let state = test_state().await;
        let admin = employee(&state, "admin@x.com", "admin").await;
        let nurse = employee(&state, "nurse@x.com", "nurse").await;
        let alice = patient(&state, "alice@x.com").await;
        let service = state.notices();
        service
            .create(caller(&admin), notice("Everyone", None))
            .await
            .unwrap();
        service
            .create(caller(&admin), notice("Nurses", Some(NoticeAudience::Nurses)))
            .await
            .unwrap();
        let doctors_only = service
            .create(caller(&admin), notice("Doctors", Some(NoticeAudience::Doctors)))
            .await
            .unwrap();

        let titles = |views: Vec<NoticeView>| {
            let mut titles: Vec<String> = views.into_iter().map(|v| v.notice.title).collect();
            titles.sort();
            titles
        };
        let for_nurse = service
            .list(
                caller(&nurse),
                NoticeQuery {
                    target_audience: Some(NoticeAudience::Doctors),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(titles(for_nurse), vec!["Everyone", "Nurses"]);

        let for_patient = service.list(caller(&alice), NoticeQuery::default()).await.unwrap();
        assert_eq!(titles(for_patient), vec!["Everyone"]);

        let for_admin = service.list(caller(&admin), NoticeQuery::default()).await.unwrap();
        assert_eq!(for_admin.len(), 3);
        let filtered = service
            .list(
                caller(&admin),
                NoticeQuery {
                    target_audience: Some(NoticeAudience::Doctors),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(titles(filtered), vec!["Doctors"]);

        assert!(matches!(
            service.get(caller(&nurse), doctors_only.notice.id).await,
            Err(ServiceError::NotFound("notice"))
        ));
    }

    #[tokio::test]
    async fn priority_filter_update_and_delete() {
        let state = test_state().await;
        let admin = employee(&state, "admin@x.com", "admin").await;
        let service = state.notices();
        let routine = service
            .create(caller(&admin), notice("Routine", None))
            .await
            .unwrap();
        service
            .create(
                caller(&admin),
                NoticeRequest {
                    priority: Some(NoticePriority::Urgent),
                    ..notice("Outage", None)
                },
            )
            .await
            .unwrap();

        let urgent = service
            .list(
                caller(&admin),
                NoticeQuery {
                    priority: Some(NoticePriority::Urgent),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(urgent.len(), 1);
        assert_eq!(urgent[0].notice.title, "Outage");

        let updated = service
            .update(
                routine.notice.id,
                NoticeRequest {
                    priority: Some(NoticePriority::High),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.notice.priority, NoticePriority::High);
        assert_eq!(updated.notice.title, "Routine");

        service.delete(routine.notice.id).await.unwrap();
        let staff = Caller {
            account_id: admin.account.id,
            role: Role::Staff,
        };
        assert!(matches!(
            service.get(staff, routine.notice.id).await,
            Err(ServiceError::NotFound("notice"))
        ));
    }
}
