use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    ApplicationFilter, DocumentParticipant, DocumentSignature, MembershipApplication, MembershipDocument, Message,
    MessageFolder, News, Notification, Organization, ReviewCommit, Session, Task, TaskFilter, User, WorkflowDocument,
};
use crate::database::store::Store;

#[derive(Default)]
struct State {
    organizations: HashMap<Uuid, Organization>,
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, Session>,
    applications: HashMap<Uuid, MembershipApplication>,
    membership_documents: HashMap<Uuid, MembershipDocument>,
    workflow_documents: HashMap<Uuid, WorkflowDocument>,
    participants: HashMap<(Uuid, Uuid), DocumentParticipant>,
    signatures: HashMap<(Uuid, Uuid), DocumentSignature>,
    notifications: HashMap<Uuid, Notification>,
    news: HashMap<Uuid, News>,
    tasks: HashMap<Uuid, Task>,
    messages: HashMap<Uuid, Message>,
}

impl State {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn insert_user(&mut self, user: &User) -> Result<(), DatabaseError> {
        if self.users.contains_key(&user.id) || self.email_taken(&user.email, None) {
            return Err(DatabaseError::Conflict(format!("email {} already registered", user.email)));
        }
        self.users.insert(user.id, user.clone());
        Ok(())
    }
}

/// Store kept entirely in process memory. Used by the test suite and by
/// `STORE_BACKEND=memory` for local demos; nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

fn newest_first<T>(items: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    sorted_by(items, |item| std::cmp::Reverse(created_at(item)))
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>, DatabaseError> {
        let state = self.state.read().await;
        Ok(sorted_by(state.organizations.values().cloned().collect(), |o: &Organization| o.name.clone()))
    }

    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>, DatabaseError> {
        Ok(self.state.read().await.organizations.get(&id).cloned())
    }

    async fn insert_organization(&self, org: &Organization) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        if state.organizations.contains_key(&org.id) {
            return Err(DatabaseError::Conflict(format!("organization {} exists", org.id)));
        }
        state.organizations.insert(org.id, org.clone());
        Ok(())
    }

    async fn update_organization(&self, org: &Organization) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        match state.organizations.get_mut(&org.id) {
            Some(existing) => {
                // members_count is only moved by commit_review
                let members_count = existing.members_count;
                *existing = org.clone();
                existing.members_count = members_count;
                Ok(())
            }
            None => Err(DatabaseError::NotFound(format!("organization {}", org.id))),
        }
    }

    async fn delete_organization(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut state = self.state.write().await;
        Ok(state.organizations.remove(&id).is_some())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, organization_ids: Option<&[Uuid]>) -> Result<Vec<User>, DatabaseError> {
        let state = self.state.read().await;
        let users: Vec<User> = state
            .users
            .values()
            .filter(|u| match organization_ids {
                None => true,
                Some(ids) => u.organization_id.map_or(false, |org| ids.contains(&org)),
            })
            .cloned()
            .collect();
        Ok(sorted_by(users, |u: &User| u.full_name.clone()))
    }

    async fn insert_user(&self, user: &User) -> Result<(), DatabaseError> {
        self.state.write().await.insert_user(user)
    }

    async fn update_user(&self, user: &User) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        if state.email_taken(&user.email, Some(user.id)) {
            return Err(DatabaseError::Conflict(format!("email {} already registered", user.email)));
        }
        match state.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(DatabaseError::NotFound(format!("user {}", user.id))),
        }
    }

    /// Mirrors the foreign keys on `users`: authored news, tasks and
    /// documents block the delete; owned rows cascade; review and
    /// applicant links are nulled.
    async fn delete_user(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&id) {
            return Ok(false);
        }
        let referenced = state.news.values().any(|n| n.author_id == id)
            || state.tasks.values().any(|t| t.created_by == id)
            || state.workflow_documents.values().any(|d| d.created_by == id);
        if referenced {
            return Err(DatabaseError::Conflict(format!("user {} is still referenced", id)));
        }

        state.users.remove(&id);
        state.sessions.retain(|_, s| s.user_id != id);
        state.participants.retain(|&(_, user_id), _| user_id != id);
        state.signatures.retain(|&(_, user_id), _| user_id != id);
        state.notifications.retain(|_, n| n.recipient_id != id);
        state.tasks.retain(|_, t| t.assignee_id != id);
        state.messages.retain(|_, m| m.sender_id != id && m.recipient_id != id);
        for application in state.applications.values_mut() {
            if application.user_id == Some(id) {
                application.user_id = None;
            }
            if application.reviewed_by == Some(id) {
                application.reviewed_by = None;
            }
        }
        for org in state.organizations.values_mut() {
            if org.chairman_id == Some(id) {
                org.chairman_id = None;
            }
        }
        Ok(true)
    }

    async fn insert_session(&self, session: &Session) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        state.sessions.insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, DatabaseError> {
        Ok(self.state.read().await.sessions.get(token_hash).cloned())
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), DatabaseError> {
        self.state.write().await.sessions.remove(token_hash);
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64, DatabaseError> {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - state.sessions.len()) as u64)
    }

    async fn insert_application(
        &self,
        application: &MembershipApplication,
        documents: &[MembershipDocument],
    ) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        if !state.organizations.contains_key(&application.organization_id) {
            return Err(DatabaseError::Conflict(format!(
                "organization {} does not exist",
                application.organization_id
            )));
        }
        state.applications.insert(application.id, application.clone());
        for document in documents {
            state.membership_documents.insert(document.id, document.clone());
        }
        Ok(())
    }

    async fn get_application(&self, id: Uuid) -> Result<Option<MembershipApplication>, DatabaseError> {
        Ok(self.state.read().await.applications.get(&id).cloned())
    }

    async fn update_application(&self, application: &MembershipApplication) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        match state.applications.get_mut(&application.id) {
            Some(existing) => {
                let mut updated = application.clone();
                updated.status = existing.status;
                updated.user_id = existing.user_id;
                updated.reviewed_by = existing.reviewed_by;
                updated.reviewed_at = existing.reviewed_at;
                updated.rejection_reason = existing.rejection_reason.clone();
                *existing = updated;
                Ok(())
            }
            None => Err(DatabaseError::NotFound(format!("application {}", application.id))),
        }
    }

    async fn delete_application(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut state = self.state.write().await;
        let removed = state.applications.remove(&id).is_some();
        if removed {
            state.membership_documents.retain(|_, d| d.application_id != id);
            for notification in state.notifications.values_mut() {
                if notification.application_id == Some(id) {
                    notification.application_id = None;
                }
            }
        }
        Ok(removed)
    }

    async fn list_applications(&self, filter: &ApplicationFilter) -> Result<Vec<MembershipApplication>, DatabaseError> {
        let state = self.state.read().await;
        let applications: Vec<MembershipApplication> = state
            .applications
            .values()
            .filter(|a| {
                filter
                    .organization_ids
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&a.organization_id))
            })
            .filter(|a| filter.user_id.map_or(true, |user| a.user_id == Some(user)))
            .filter(|a| filter.status.map_or(true, |status| a.status == status))
            .cloned()
            .collect();
        Ok(newest_first(applications, |a: &MembershipApplication| a.created_at))
    }

    async fn commit_review(&self, review: &ReviewCommit) -> Result<bool, DatabaseError> {
        // One write guard covers the check and every mutation below.
        let mut state = self.state.write().await;
        let application = &review.application;

        match state.applications.get(&application.id) {
            Some(current) if current.status == review.expected => {}
            Some(_) => return Ok(false),
            None => return Err(DatabaseError::NotFound(format!("application {}", application.id))),
        }

        if let Some(user) = &review.provisioned_user {
            state.insert_user(user)?;
        }
        if let Some(user_id) = review.validated_user_id {
            if let Some(user) = state.users.get_mut(&user_id) {
                user.membership_validated = true;
                user.updated_at = application.updated_at;
            }
        }
        if review.increment_members {
            if let Some(org) = state.organizations.get_mut(&application.organization_id) {
                org.members_count += 1;
                org.updated_at = application.updated_at;
            }
        }
        state.applications.insert(application.id, application.clone());
        Ok(true)
    }

    async fn insert_membership_document(&self, document: &MembershipDocument) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        if !state.applications.contains_key(&document.application_id) {
            return Err(DatabaseError::Conflict(format!(
                "application {} does not exist",
                document.application_id
            )));
        }
        state.membership_documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn get_membership_document(&self, id: Uuid) -> Result<Option<MembershipDocument>, DatabaseError> {
        Ok(self.state.read().await.membership_documents.get(&id).cloned())
    }

    async fn update_membership_document(&self, document: &MembershipDocument) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        match state.membership_documents.get_mut(&document.id) {
            Some(existing) => {
                *existing = document.clone();
                Ok(())
            }
            None => Err(DatabaseError::NotFound(format!("membership document {}", document.id))),
        }
    }

    async fn list_membership_documents(&self, application_id: Uuid) -> Result<Vec<MembershipDocument>, DatabaseError> {
        let state = self.state.read().await;
        let documents: Vec<MembershipDocument> = state
            .membership_documents
            .values()
            .filter(|d| d.application_id == application_id)
            .cloned()
            .collect();
        Ok(sorted_by(documents, |d: &MembershipDocument| (d.created_at, d.title.clone())))
    }

    async fn insert_workflow_document(
        &self,
        document: &WorkflowDocument,
        participants: &[DocumentParticipant],
    ) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        state.workflow_documents.insert(document.id, document.clone());
        for participant in participants {
            state
                .participants
                .insert((participant.document_id, participant.user_id), participant.clone());
        }
        Ok(())
    }

    async fn get_workflow_document(&self, id: Uuid) -> Result<Option<WorkflowDocument>, DatabaseError> {
        Ok(self.state.read().await.workflow_documents.get(&id).cloned())
    }

    async fn update_workflow_document(&self, document: &WorkflowDocument) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        match state.workflow_documents.get_mut(&document.id) {
            Some(existing) => {
                *existing = document.clone();
                Ok(())
            }
            None => Err(DatabaseError::NotFound(format!("workflow document {}", document.id))),
        }
    }

    async fn list_workflow_documents(
        &self,
        user_id: Uuid,
        organization_ids: Option<&[Uuid]>,
    ) -> Result<Vec<WorkflowDocument>, DatabaseError> {
        let state = self.state.read().await;
        let documents: Vec<WorkflowDocument> = state
            .workflow_documents
            .values()
            .filter(|d| match organization_ids {
                None => true,
                Some(ids) => {
                    ids.contains(&d.organization_id)
                        || d.created_by == user_id
                        || state.participants.contains_key(&(d.id, user_id))
                }
            })
            .cloned()
            .collect();
        Ok(newest_first(documents, |d: &WorkflowDocument| d.created_at))
    }

    async fn list_participants(&self, document_id: Uuid) -> Result<Vec<DocumentParticipant>, DatabaseError> {
        let state = self.state.read().await;
        let participants: Vec<DocumentParticipant> = state
            .participants
            .values()
            .filter(|p| p.document_id == document_id)
            .cloned()
            .collect();
        Ok(sorted_by(participants, |p: &DocumentParticipant| p.user_id))
    }

    async fn upsert_participant(&self, participant: &DocumentParticipant) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        if !state.workflow_documents.contains_key(&participant.document_id) {
            return Err(DatabaseError::NotFound(format!("workflow document {}", participant.document_id)));
        }
        state
            .participants
            .insert((participant.document_id, participant.user_id), participant.clone());
        Ok(())
    }

    async fn upsert_signature(
        &self,
        document_id: Uuid,
        user_id: Uuid,
        signed_at: DateTime<Utc>,
    ) -> Result<DocumentSignature, DatabaseError> {
        let mut state = self.state.write().await;
        if !state.workflow_documents.contains_key(&document_id) {
            return Err(DatabaseError::NotFound(format!("workflow document {}", document_id)));
        }
        let signature = state
            .signatures
            .entry((document_id, user_id))
            .or_insert_with(|| DocumentSignature {
                id: Uuid::new_v4(),
                document_id,
                user_id,
                signed_at,
            });
        Ok(signature.clone())
    }

    async fn list_signatures(&self, document_id: Uuid) -> Result<Vec<DocumentSignature>, DatabaseError> {
        let state = self.state.read().await;
        let signatures: Vec<DocumentSignature> = state
            .signatures
            .values()
            .filter(|s| s.document_id == document_id)
            .cloned()
            .collect();
        Ok(sorted_by(signatures, |s: &DocumentSignature| s.signed_at))
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        state.notifications.insert(notification.id, notification.clone());
        Ok(())
    }

    async fn list_notifications(&self, recipient_id: Uuid, unread_only: bool) -> Result<Vec<Notification>, DatabaseError> {
        let state = self.state.read().await;
        let notifications: Vec<Notification> = state
            .notifications
            .values()
            .filter(|n| n.recipient_id == recipient_id && (!unread_only || !n.is_read))
            .cloned()
            .collect();
        Ok(newest_first(notifications, |n: &Notification| n.created_at))
    }

    async fn mark_notification_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool, DatabaseError> {
        let mut state = self.state.write().await;
        match state.notifications.get_mut(&id) {
            Some(n) if n.recipient_id == recipient_id => {
                n.is_read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_notifications_read(&self, recipient_id: Uuid) -> Result<u64, DatabaseError> {
        let mut state = self.state.write().await;
        let mut count = 0;
        for n in state.notifications.values_mut() {
            if n.recipient_id == recipient_id && !n.is_read {
                n.is_read = true;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn insert_news(&self, news: &News) -> Result<(), DatabaseError> {
        self.state.write().await.news.insert(news.id, news.clone());
        Ok(())
    }

    async fn get_news(&self, id: Uuid) -> Result<Option<News>, DatabaseError> {
        Ok(self.state.read().await.news.get(&id).cloned())
    }

    async fn update_news(&self, news: &News) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        match state.news.get_mut(&news.id) {
            Some(existing) => {
                *existing = news.clone();
                Ok(())
            }
            None => Err(DatabaseError::NotFound(format!("news {}", news.id))),
        }
    }

    async fn delete_news(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.state.write().await.news.remove(&id).is_some())
    }

    async fn list_news(&self, organization_ids: &[Uuid]) -> Result<Vec<News>, DatabaseError> {
        let state = self.state.read().await;
        let news: Vec<News> = state
            .news
            .values()
            .filter(|n| organization_ids.contains(&n.organization_id))
            .cloned()
            .collect();
        Ok(newest_first(news, |n: &News| n.created_at))
    }

    async fn insert_task(&self, task: &Task) -> Result<(), DatabaseError> {
        self.state.write().await.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, DatabaseError> {
        Ok(self.state.read().await.tasks.get(&id).cloned())
    }

    async fn update_task(&self, task: &Task) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        match state.tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task.clone();
                Ok(())
            }
            None => Err(DatabaseError::NotFound(format!("task {}", task.id))),
        }
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.state.write().await.tasks.remove(&id).is_some())
    }

    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, DatabaseError> {
        let state = self.state.read().await;
        let tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| filter.assignee_id.map_or(true, |id| t.assignee_id == id))
            .filter(|t| filter.created_by.map_or(true, |id| t.created_by == id))
            .cloned()
            .collect();
        // Undated tasks sort last.
        Ok(sorted_by(tasks, |t: &Task| {
            (t.due_date.is_none(), t.due_date, std::cmp::Reverse(t.created_at))
        }))
    }

    async fn insert_message(&self, message: &Message) -> Result<(), DatabaseError> {
        self.state.write().await.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, DatabaseError> {
        Ok(self.state.read().await.messages.get(&id).cloned())
    }

    async fn mark_message_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool, DatabaseError> {
        let mut state = self.state.write().await;
        match state.messages.get_mut(&id) {
            Some(m) if m.recipient_id == recipient_id => {
                m.is_read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_messages(&self, user_id: Uuid, folder: MessageFolder) -> Result<Vec<Message>, DatabaseError> {
        let state = self.state.read().await;
        let messages: Vec<Message> = state
            .messages
            .values()
            .filter(|m| match folder {
                MessageFolder::Inbox => m.recipient_id == user_id,
                MessageFolder::Sent => m.sender_id == user_id,
            })
            .cloned()
            .collect();
        Ok(newest_first(messages, |m: &Message| m.created_at))
    }
}
