use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "membership_document_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipDocumentStatus {
    NotSigned,
    Signed,
}

/// A paper an applicant signs and forwards to the union.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MembershipDocument {
    pub id: Uuid,
    pub application_id: Uuid,
    pub title: String,
    pub status: MembershipDocumentStatus,
    pub file_path: Option<String>,
    pub sent_to_union: bool,
    pub signed_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MembershipDocument {
    pub fn new(application_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            application_id,
            title: title.into(),
            status: MembershipDocumentStatus::NotSigned,
            file_path: None,
            sent_to_union: false,
            signed_at: None,
            sent_at: None,
            created_at: Utc::now(),
        }
    }
}
