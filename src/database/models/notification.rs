use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "notification_kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    ApplicationSubmitted,
    ApplicationApproved,
    ApplicationRejected,
    NewMember,
    DocumentAssigned,
    DocumentCompleted,
    TaskAssigned,
    MessageReceived,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub application_id: Option<Uuid>,
    pub document_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(recipient_id: Uuid, kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            kind,
            message: message.into(),
            application_id: None,
            document_id: None,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    pub fn for_application(mut self, application_id: Uuid) -> Self {
        self.application_id = Some(application_id);
        self
    }

    pub fn for_document(mut self, document_id: Uuid) -> Self {
        self.document_id = Some(document_id);
        self
    }
}
