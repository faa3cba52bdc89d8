use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{Message, MessageFolder, Notification, NotificationKind};
use crate::database::store::Store;
use crate::mail::Mailer;
use crate::permissions::Permission;
use crate::services::access::{AccessContext, FORBIDDEN_MESSAGE};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::notifier::Notifier;

#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub recipient_id: Uuid,
    pub subject: String,
    pub body: String,
}

pub struct MessageService<'a> {
    store: &'a dyn Store,
    notifier: Notifier<'a>,
}

impl<'a> MessageService<'a> {
    pub fn new(store: &'a dyn Store, mailer: &'a dyn Mailer) -> Self {
        Self {
            store,
            notifier: Notifier::new(store, mailer),
        }
    }

    pub async fn list(&self, ctx: &AccessContext, folder: MessageFolder) -> ServiceResult<Vec<Message>> {
        Ok(self.store.list_messages(ctx.user.id, folder).await?)
    }

    pub async fn send(&self, ctx: &AccessContext, input: NewMessage) -> ServiceResult<Message> {
        ctx.require(Permission::MessagesSend)?;
        if input.recipient_id == ctx.user.id {
            return Err(ServiceError::invalid_field("recipient_id", "Нельзя отправить сообщение самому себе"));
        }
        let recipient = self
            .store
            .get_user(input.recipient_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| ServiceError::invalid_field("recipient_id", "Получатель не найден"))?;

        let subject = input.subject.trim();
        if subject.is_empty() {
            return Err(ServiceError::invalid_field("subject", "Обязательное поле"));
        }

        let message = Message {
            id: Uuid::new_v4(),
            sender_id: ctx.user.id,
            recipient_id: recipient.id,
            subject: subject.to_string(),
            body: input.body,
            is_read: false,
            created_at: Utc::now(),
        };
        self.store.insert_message(&message).await?;

        self.notifier
            .notify(Notification::new(
                recipient.id,
                NotificationKind::MessageReceived,
                format!("Новое сообщение от {}: {}", ctx.user.full_name, message.subject),
            ))
            .await;
        Ok(message)
    }

    /// Only the recipient can mark a message as read.
    pub async fn mark_read(&self, ctx: &AccessContext, id: Uuid) -> ServiceResult<()> {
        let message = self
            .store
            .get_message(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Сообщение не найдено"))?;
        if message.recipient_id != ctx.user.id {
            return Err(ServiceError::forbidden(FORBIDDEN_MESSAGE));
        }
        self.store.mark_message_read(id, ctx.user.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Role;
    use crate::testing::TestContext;

    #[tokio::test]
    async fn message_lands_in_both_folders() {
        let tc = TestContext::new().await;
        let alice = tc.create_user(Role::PrimaryMember, tc.orgs.primary).await;
        let bob = tc.create_user(Role::PrimaryChairman, tc.orgs.primary).await;
        let svc = tc.messages();
        let alice_ctx = tc.access(&alice).await;
        let bob_ctx = tc.access(&bob).await;

        let message = svc
            .send(
                &alice_ctx,
                NewMessage {
                    recipient_id: bob.id,
                    subject: "Вопрос".into(),
                    body: "Когда собрание?".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(svc.list(&alice_ctx, MessageFolder::Sent).await.unwrap().len(), 1);
        assert_eq!(svc.list(&bob_ctx, MessageFolder::Inbox).await.unwrap().len(), 1);
        assert!(svc.list(&alice_ctx, MessageFolder::Inbox).await.unwrap().is_empty());

        let err = svc.mark_read(&alice_ctx, message.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        svc.mark_read(&bob_ctx, message.id).await.unwrap();
        let inbox = svc.list(&bob_ctx, MessageFolder::Inbox).await.unwrap();
        assert!(inbox[0].is_read);

        let notifications = tc.store.list_notifications(bob.id, false).await.unwrap();
        assert!(notifications.iter().any(|n| n.kind == NotificationKind::MessageReceived));
    }
}
