use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "workflow_document_kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowDocumentKind {
    Protocol,
    Agenda,
    Resolution,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "workflow_document_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowDocumentStatus {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "participant_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantStatus {
    Pending,
    Signed,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowDocument {
    pub id: Uuid,
    pub title: String,
    pub kind: WorkflowDocumentKind,
    pub organization_id: Uuid,
    pub created_by: Uuid,
    pub status: WorkflowDocumentStatus,
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentParticipant {
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub status: ParticipantStatus,
    pub comment: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentSignature {
    pub id: Uuid,
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub signed_at: DateTime<Utc>,
}
