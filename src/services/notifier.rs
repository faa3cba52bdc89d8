use futures::future::join_all;
use uuid::Uuid;

use crate::database::models::{Notification, NotificationKind, Organization, User};
use crate::database::store::Store;
use crate::mail::{self, MailMessage, Mailer};
use crate::services::error::ServiceResult;

/// In-app notifications and email, both best-effort.
///
/// A failed insert or send is logged and dropped; the operation that
/// triggered it has already been committed.
pub struct Notifier<'a> {
    store: &'a dyn Store,
    mailer: &'a dyn Mailer,
}

impl<'a> Notifier<'a> {
    pub fn new(store: &'a dyn Store, mailer: &'a dyn Mailer) -> Self {
        Self { store, mailer }
    }

    pub async fn notify(&self, notification: Notification) {
        if let Err(e) = self.store.insert_notification(&notification).await {
            tracing::warn!(
                "Could not store {:?} notification for {}: {}",
                notification.kind,
                notification.recipient_id,
                e
            );
        }
    }

    /// Store a batch of notifications concurrently.
    pub async fn notify_all(&self, notifications: impl IntoIterator<Item = Notification>) {
        join_all(notifications.into_iter().map(|n| self.notify(n))).await;
    }

    pub async fn email(&self, message: MailMessage) {
        mail::send_best_effort(self.mailer, message).await;
    }

    /// Recipient for organization-level events: the recorded chairman, or
    /// failing that any active chairman-rank user of the organization.
    pub async fn chairman_of(&self, org: &Organization) -> Option<Uuid> {
        if let Some(chairman) = org.chairman_id {
            return Some(chairman);
        }
        match self.store.list_users(Some(&[org.id])).await {
            Ok(users) => users
                .into_iter()
                .find(|u| u.is_active && u.role.is_chairman())
                .map(|u| u.id),
            Err(e) => {
                tracing::warn!("Could not look up chairman of {}: {}", org.id, e);
                None
            }
        }
    }

    pub async fn notify_chairman(&self, org: &Organization, notification: impl FnOnce(Uuid) -> Notification) {
        match self.chairman_of(org).await {
            Some(chairman) => self.notify(notification(chairman)).await,
            None => tracing::warn!("Organization {} has no chairman to notify", org.id),
        }
    }

    // Reads for the notifications inbox

    pub async fn list(&self, user: &User, unread_only: bool) -> ServiceResult<Vec<Notification>> {
        Ok(self.store.list_notifications(user.id, unread_only).await?)
    }

    pub async fn mark_read(&self, user: &User, id: Uuid) -> ServiceResult<bool> {
        Ok(self.store.mark_notification_read(id, user.id).await?)
    }

    pub async fn mark_all_read(&self, user: &User) -> ServiceResult<u64> {
        Ok(self.store.mark_all_notifications_read(user.id).await?)
    }
}
