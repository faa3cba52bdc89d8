use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    ApplicationFilter, DocumentParticipant, DocumentSignature, MembershipApplication, MembershipDocument, Message,
    MessageFolder, News, Notification, Organization, ReviewCommit, Session, Task, TaskFilter, User, WorkflowDocument,
};

/// Persistence seam shared by the Postgres and in-memory backends.
///
/// Methods map one-to-one onto table operations; invariants live in
/// `crate::services`. The exception is [`Store::commit_review`], which must
/// apply atomically.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), DatabaseError>;

    // Organizations
    async fn list_organizations(&self) -> Result<Vec<Organization>, DatabaseError>;
    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>, DatabaseError>;
    async fn insert_organization(&self, org: &Organization) -> Result<(), DatabaseError>;
    async fn update_organization(&self, org: &Organization) -> Result<(), DatabaseError>;
    async fn delete_organization(&self, id: Uuid) -> Result<bool, DatabaseError>;

    // Users
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;
    /// `None` lists every user.
    async fn list_users(&self, organization_ids: Option<&[Uuid]>) -> Result<Vec<User>, DatabaseError>;
    async fn insert_user(&self, user: &User) -> Result<(), DatabaseError>;
    async fn update_user(&self, user: &User) -> Result<(), DatabaseError>;
    async fn delete_user(&self, id: Uuid) -> Result<bool, DatabaseError>;

    // Sessions
    async fn insert_session(&self, session: &Session) -> Result<(), DatabaseError>;
    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, DatabaseError>;
    async fn delete_session(&self, token_hash: &str) -> Result<(), DatabaseError>;
    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64, DatabaseError>;

    // Membership applications
    async fn insert_application(
        &self,
        application: &MembershipApplication,
        documents: &[MembershipDocument],
    ) -> Result<(), DatabaseError>;
    async fn get_application(&self, id: Uuid) -> Result<Option<MembershipApplication>, DatabaseError>;
    /// Writes applicant fields and `fees_status`. Status, reviewer and
    /// `user_id` only change through [`Store::commit_review`].
    async fn update_application(&self, application: &MembershipApplication) -> Result<(), DatabaseError>;
    async fn delete_application(&self, id: Uuid) -> Result<bool, DatabaseError>;
    async fn list_applications(&self, filter: &ApplicationFilter) -> Result<Vec<MembershipApplication>, DatabaseError>;
    /// Apply a status transition only if the application is still in
    /// `review.expected` status. Returns `false` when another writer got
    /// there first.
    async fn commit_review(&self, review: &ReviewCommit) -> Result<bool, DatabaseError>;

    // Membership documents
    async fn insert_membership_document(&self, document: &MembershipDocument) -> Result<(), DatabaseError>;
    async fn get_membership_document(&self, id: Uuid) -> Result<Option<MembershipDocument>, DatabaseError>;
    async fn update_membership_document(&self, document: &MembershipDocument) -> Result<(), DatabaseError>;
    async fn list_membership_documents(&self, application_id: Uuid) -> Result<Vec<MembershipDocument>, DatabaseError>;

    // Workflow documents
    async fn insert_workflow_document(
        &self,
        document: &WorkflowDocument,
        participants: &[DocumentParticipant],
    ) -> Result<(), DatabaseError>;
    async fn get_workflow_document(&self, id: Uuid) -> Result<Option<WorkflowDocument>, DatabaseError>;
    async fn update_workflow_document(&self, document: &WorkflowDocument) -> Result<(), DatabaseError>;
    /// Documents visible to `user_id`: created by or assigned to them, or
    /// owned by one of `organization_ids`. `None` lists everything.
    async fn list_workflow_documents(
        &self,
        user_id: Uuid,
        organization_ids: Option<&[Uuid]>,
    ) -> Result<Vec<WorkflowDocument>, DatabaseError>;
    async fn list_participants(&self, document_id: Uuid) -> Result<Vec<DocumentParticipant>, DatabaseError>;
    async fn upsert_participant(&self, participant: &DocumentParticipant) -> Result<(), DatabaseError>;
    /// Record a signature keyed by (document_id, user_id). Re-signing keeps
    /// and returns the first row.
    async fn upsert_signature(
        &self,
        document_id: Uuid,
        user_id: Uuid,
        signed_at: DateTime<Utc>,
    ) -> Result<DocumentSignature, DatabaseError>;
    async fn list_signatures(&self, document_id: Uuid) -> Result<Vec<DocumentSignature>, DatabaseError>;

    // Notifications
    async fn insert_notification(&self, notification: &Notification) -> Result<(), DatabaseError>;
    async fn list_notifications(&self, recipient_id: Uuid, unread_only: bool) -> Result<Vec<Notification>, DatabaseError>;
    async fn mark_notification_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool, DatabaseError>;
    async fn mark_all_notifications_read(&self, recipient_id: Uuid) -> Result<u64, DatabaseError>;

    // News
    async fn insert_news(&self, news: &News) -> Result<(), DatabaseError>;
    async fn get_news(&self, id: Uuid) -> Result<Option<News>, DatabaseError>;
    async fn update_news(&self, news: &News) -> Result<(), DatabaseError>;
    async fn delete_news(&self, id: Uuid) -> Result<bool, DatabaseError>;
    async fn list_news(&self, organization_ids: &[Uuid]) -> Result<Vec<News>, DatabaseError>;

    // Tasks
    async fn insert_task(&self, task: &Task) -> Result<(), DatabaseError>;
    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, DatabaseError>;
    async fn update_task(&self, task: &Task) -> Result<(), DatabaseError>;
    async fn delete_task(&self, id: Uuid) -> Result<bool, DatabaseError>;
    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, DatabaseError>;

    // Messages
    async fn insert_message(&self, message: &Message) -> Result<(), DatabaseError>;
    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, DatabaseError>;
    async fn mark_message_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool, DatabaseError>;
    async fn list_messages(&self, user_id: Uuid, folder: MessageFolder) -> Result<Vec<Message>, DatabaseError>;
}
