use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{Notification, NotificationKind, Task, TaskFilter, TaskStatus};
use crate::database::store::Store;
use crate::mail::Mailer;
use crate::permissions::Permission;
use crate::services::access::{AccessContext, FORBIDDEN_MESSAGE};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::notifier::Notifier;

/// Which side of the assignment the caller is looking from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskView {
    #[default]
    Assigned,
    Created,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub assignee_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Defaults to the assignee's organization
    #[serde(default)]
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatusUpdate {
    pub status: TaskStatus,
}

pub struct TaskService<'a> {
    store: &'a dyn Store,
    notifier: Notifier<'a>,
}

impl<'a> TaskService<'a> {
    pub fn new(store: &'a dyn Store, mailer: &'a dyn Mailer) -> Self {
        Self {
            store,
            notifier: Notifier::new(store, mailer),
        }
    }

    pub async fn list(&self, ctx: &AccessContext, view: TaskView) -> ServiceResult<Vec<Task>> {
        ctx.require(Permission::TasksView)?;
        let filter = match view {
            TaskView::Assigned => TaskFilter {
                assignee_id: Some(ctx.user.id),
                ..Default::default()
            },
            TaskView::Created => TaskFilter {
                created_by: Some(ctx.user.id),
                ..Default::default()
            },
        };
        Ok(self.store.list_tasks(filter).await?)
    }

    pub async fn create(&self, ctx: &AccessContext, input: NewTask) -> ServiceResult<Task> {
        ctx.require(Permission::TasksManage)?;
        let title = input.title.trim();
        if title.is_empty() {
            return Err(ServiceError::invalid_field("title", "Обязательное поле"));
        }

        let assignee = self
            .store
            .get_user(input.assignee_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| ServiceError::invalid_field("assignee_id", "Исполнитель не найден"))?;
        let assignee_org = assignee
            .organization_id
            .filter(|&org| ctx.in_scope(org))
            .ok_or_else(|| ServiceError::forbidden("Исполнитель вне вашей организации"))?;

        let organization_id = input.organization_id.unwrap_or(assignee_org);
        ctx.require_scope(organization_id)?;

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            organization_id,
            created_by: ctx.user.id,
            assignee_id: assignee.id,
            title: title.to_string(),
            description: input.description.trim().to_string(),
            status: TaskStatus::Open,
            due_date: input.due_date,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_task(&task).await?;
        tracing::info!("Task {} assigned to {} by {}", task.id, task.assignee_id, ctx.user.id);

        self.notifier
            .notify(Notification::new(
                task.assignee_id,
                NotificationKind::TaskAssigned,
                format!("Вам назначена задача: {}", task.title),
            ))
            .await;
        Ok(task)
    }

    pub async fn update_status(&self, ctx: &AccessContext, id: Uuid, input: TaskStatusUpdate) -> ServiceResult<Task> {
        let mut task = self.load(id).await?;
        if task.assignee_id != ctx.user.id && task.created_by != ctx.user.id {
            return Err(ServiceError::forbidden(FORBIDDEN_MESSAGE));
        }
        task.status = input.status;
        task.updated_at = Utc::now();
        self.store.update_task(&task).await?;
        Ok(task)
    }

    pub async fn delete(&self, ctx: &AccessContext, id: Uuid) -> ServiceResult<()> {
        let task = self.load(id).await?;
        if task.created_by != ctx.user.id && !ctx.is_admin() {
            return Err(ServiceError::forbidden(FORBIDDEN_MESSAGE));
        }
        self.store.delete_task(id).await?;
        tracing::info!("Task {} deleted by {}", id, ctx.user.id);
        Ok(())
    }

    async fn load(&self, id: Uuid) -> ServiceResult<Task> {
        self.store
            .get_task(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Задача не найдена"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Role;
    use crate::testing::TestContext;

    fn task_for(assignee: Uuid) -> NewTask {
        NewTask {
            assignee_id: assignee,
            title: "Собрать взносы".into(),
            description: String::new(),
            due_date: None,
            organization_id: None,
        }
    }

    #[tokio::test]
    async fn assignee_is_notified_and_may_update() {
        let tc = TestContext::new().await;
        let chairman = tc.create_user(Role::LocalChairman, tc.orgs.local).await;
        let member = tc.create_user(Role::PrimaryMember, tc.orgs.primary).await;
        let svc = tc.tasks();

        let task = svc.create(&tc.access(&chairman).await, task_for(member.id)).await.unwrap();
        assert_eq!(task.organization_id, tc.orgs.primary);

        let inbox = tc.store.list_notifications(member.id, true).await.unwrap();
        assert!(inbox.iter().any(|n| n.kind == NotificationKind::TaskAssigned));

        let member_ctx = tc.access(&member).await;
        let assigned = svc.list(&member_ctx, TaskView::Assigned).await.unwrap();
        assert_eq!(assigned.len(), 1);

        let done = svc
            .update_status(&member_ctx, task.id, TaskStatusUpdate { status: TaskStatus::Done })
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Done);

        let err = svc.delete(&member_ctx, task.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn assignee_outside_scope_is_refused() {
        let tc = TestContext::new().await;
        let chairman = tc.create_user(Role::LocalChairman, tc.orgs.local).await;
        let stranger = tc.create_user(Role::PrimaryMember, tc.orgs.other_region).await;

        let err = tc
            .tasks()
            .create(&tc.access(&chairman).await, task_for(stranger.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn bystanders_cannot_touch_tasks() {
        let tc = TestContext::new().await;
        let chairman = tc.create_user(Role::LocalChairman, tc.orgs.local).await;
        let member = tc.create_user(Role::PrimaryMember, tc.orgs.primary).await;
        let bystander = tc.create_user(Role::PrimaryMember, tc.orgs.primary).await;
        let svc = tc.tasks();

        let task = svc.create(&tc.access(&chairman).await, task_for(member.id)).await.unwrap();
        let err = svc
            .update_status(
                &tc.access(&bystander).await,
                task.id,
                TaskStatusUpdate {
                    status: TaskStatus::Cancelled,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }
}
