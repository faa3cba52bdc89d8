use std::collections::BTreeSet;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::News;
use crate::database::store::Store;
use crate::permissions::Permission;
use crate::services::access::AccessContext;
use crate::services::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewNews {
    pub organization_id: Uuid,
    pub title: String,
    pub body: String,
    #[serde(default = "default_published")]
    pub published: bool,
}

fn default_published() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub published: Option<bool>,
}

pub struct NewsService<'a> {
    store: &'a dyn Store,
}

impl<'a> NewsService<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Published news of the caller's scope and every organization above it.
    /// Drafts show up only for editors who may manage them.
    pub async fn list(&self, ctx: &AccessContext) -> ServiceResult<Vec<News>> {
        ctx.require(Permission::NewsView)?;
        let visible: BTreeSet<Uuid> = if ctx.is_admin() {
            ctx.tree.organizations().map(|o| o.id).collect()
        } else {
            let mut ids = match ctx.scope.org_ids() {
                Some(ids) => ids.into_iter().collect(),
                None => BTreeSet::new(),
            };
            if let Some(org) = ctx.user.organization_id {
                ids.extend(ctx.tree.ancestor_ids(org));
            }
            ids
        };

        let ids: Vec<Uuid> = visible.into_iter().collect();
        let can_manage = ctx.can(Permission::NewsManage);
        let news = self
            .store
            .list_news(&ids)
            .await?
            .into_iter()
            .filter(|n| n.published || (can_manage && ctx.in_scope(n.organization_id)))
            .collect();
        Ok(news)
    }

    pub async fn create(&self, ctx: &AccessContext, input: NewNews) -> ServiceResult<News> {
        ctx.require_in_scope(Permission::NewsManage, input.organization_id)?;
        let title = required(&input.title, "title")?;
        let body = required(&input.body, "body")?;

        let now = Utc::now();
        let news = News {
            id: Uuid::new_v4(),
            organization_id: input.organization_id,
            author_id: ctx.user.id,
            title,
            body,
            published: input.published,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_news(&news).await?;
        tracing::info!("News {} posted to {}", news.id, news.organization_id);
        Ok(news)
    }

    pub async fn update(&self, ctx: &AccessContext, id: Uuid, input: NewsUpdate) -> ServiceResult<News> {
        let mut news = self.load(id).await?;
        ctx.require_in_scope(Permission::NewsManage, news.organization_id)?;

        if let Some(title) = input.title {
            news.title = required(&title, "title")?;
        }
        if let Some(body) = input.body {
            news.body = required(&body, "body")?;
        }
        if let Some(published) = input.published {
            news.published = published;
        }
        news.updated_at = Utc::now();
        self.store.update_news(&news).await?;
        Ok(news)
    }

    pub async fn delete(&self, ctx: &AccessContext, id: Uuid) -> ServiceResult<()> {
        let news = self.load(id).await?;
        ctx.require_in_scope(Permission::NewsManage, news.organization_id)?;
        self.store.delete_news(id).await?;
        tracing::info!("News {} deleted by {}", id, ctx.user.id);
        Ok(())
    }

    async fn load(&self, id: Uuid) -> ServiceResult<News> {
        self.store
            .get_news(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Новость не найдена"))
    }
}

fn required(value: &str, field: &str) -> ServiceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::invalid_field(field, "Обязательное поле"));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Role;
    use crate::testing::TestContext;

    fn post(org: Uuid, title: &str, published: bool) -> NewNews {
        NewNews {
            organization_id: org,
            title: title.into(),
            body: "Текст".into(),
            published,
        }
    }

    #[tokio::test]
    async fn members_see_upstream_news_but_not_drafts() {
        let tc = TestContext::new().await;
        let federal = tc.create_user(Role::FederalChairman, tc.orgs.federal).await;
        let regional = tc.create_user(Role::RegionalChairman, tc.orgs.other_region).await;
        let member = tc.create_user(Role::PrimaryMember, tc.orgs.primary).await;
        let svc = tc.news();

        let federal_ctx = tc.access(&federal).await;
        svc.create(&federal_ctx, post(tc.orgs.federal, "Съезд", true)).await.unwrap();
        svc.create(&federal_ctx, post(tc.orgs.federal, "Черновик", false)).await.unwrap();
        svc.create(&tc.access(&regional).await, post(tc.orgs.other_region, "Соседи", true))
            .await
            .unwrap();

        let titles: Vec<String> = svc
            .list(&tc.access(&member).await)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, vec!["Съезд".to_string()]);

        let editor_view = svc.list(&federal_ctx).await.unwrap();
        assert_eq!(editor_view.len(), 3);
    }

    #[tokio::test]
    async fn members_cannot_post() {
        let tc = TestContext::new().await;
        let member = tc.create_user(Role::PrimaryMember, tc.orgs.primary).await;
        let err = tc
            .news()
            .create(&tc.access(&member).await, post(tc.orgs.primary, "x", true))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }
}
