use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{
    ApplicationFilter, ApplicationStatus, DocumentParticipant, DocumentSignature, MembershipApplication,
    MembershipDocument, Message, MessageFolder, News, Notification, Organization, ReviewCommit, Session, Task,
    TaskFilter, User, WorkflowDocument,
};
use crate::database::store::Store;

const ORGANIZATION_COLUMNS: &str =
    "id, name, org_type, parent_id, chairman_id, chairman_name, is_active, members_count, created_at, updated_at";

const USER_COLUMNS: &str = "id, email, password_hash, full_name, role, organization_id, is_active, \
     membership_validated, created_at, updated_at";

const APPLICATION_COLUMNS: &str = "id, first_name, last_name, middle_name, birth_date, email, phone, workplace, \
     position, organization_id, user_id, status, fees_status, reviewed_by, reviewed_at, rejection_reason, \
     created_at, updated_at";

const MEMBERSHIP_DOCUMENT_COLUMNS: &str =
    "id, application_id, title, status, file_path, sent_to_union, signed_at, sent_at, created_at";

const WORKFLOW_DOCUMENT_COLUMNS: &str =
    "id, title, kind, organization_id, created_by, status, file_path, created_at, updated_at, completed_at";

/// Postgres-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn insert_user_with<'e, E: PgExecutor<'e>>(executor: E, user: &User) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO users (id, email, password_hash, full_name, role, organization_id, is_active, \
         membership_validated, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.full_name)
    .bind(user.role)
    .bind(user.organization_id)
    .bind(user.is_active)
    .bind(user.membership_validated)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

async fn insert_membership_document_with<'e, E: PgExecutor<'e>>(
    executor: E,
    document: &MembershipDocument,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO membership_documents (id, application_id, title, status, file_path, sent_to_union, \
         signed_at, sent_at, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(document.id)
    .bind(document.application_id)
    .bind(&document.title)
    .bind(document.status)
    .bind(&document.file_path)
    .bind(document.sent_to_union)
    .bind(document.signed_at)
    .bind(document.sent_at)
    .bind(document.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

async fn upsert_participant_with<'e, E: PgExecutor<'e>>(
    executor: E,
    participant: &DocumentParticipant,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO document_participants (document_id, user_id, status, comment, updated_at)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (document_id, user_id)
         DO UPDATE SET status = EXCLUDED.status, comment = EXCLUDED.comment, updated_at = EXCLUDED.updated_at",
    )
    .bind(participant.document_id)
    .bind(participant.user_id)
    .bind(participant.status)
    .bind(&participant.comment)
    .bind(participant.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>, DatabaseError> {
        let sql = format!("SELECT {} FROM organizations ORDER BY name", ORGANIZATION_COLUMNS);
        Ok(sqlx::query_as::<_, Organization>(&sql).fetch_all(&self.pool).await?)
    }

    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>, DatabaseError> {
        let sql = format!("SELECT {} FROM organizations WHERE id = $1", ORGANIZATION_COLUMNS);
        Ok(sqlx::query_as::<_, Organization>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_organization(&self, org: &Organization) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO organizations (id, name, org_type, parent_id, chairman_id, chairman_name, is_active, \
             members_count, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(org.id)
        .bind(&org.name)
        .bind(org.org_type)
        .bind(org.parent_id)
        .bind(org.chairman_id)
        .bind(&org.chairman_name)
        .bind(org.is_active)
        .bind(org.members_count)
        .bind(org.created_at)
        .bind(org.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_organization(&self, org: &Organization) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE organizations SET name = $2, org_type = $3, parent_id = $4, chairman_id = $5, \
             chairman_name = $6, is_active = $7, updated_at = $8
             WHERE id = $1",
        )
        .bind(org.id)
        .bind(&org.name)
        .bind(org.org_type)
        .bind(org.parent_id)
        .bind(org.chairman_id)
        .bind(&org.chairman_name)
        .bind(org.is_active)
        .bind(org.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("organization {}", org.id)));
        }
        Ok(())
    }

    async fn delete_organization(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_users(&self, organization_ids: Option<&[Uuid]>) -> Result<Vec<User>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM users WHERE ($1::uuid[] IS NULL OR organization_id = ANY($1)) ORDER BY full_name",
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(organization_ids.map(|ids| ids.to_vec()))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_user(&self, user: &User) -> Result<(), DatabaseError> {
        insert_user_with(&self.pool, user).await
    }

    async fn update_user(&self, user: &User) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE users SET email = $2, password_hash = $3, full_name = $4, role = $5, organization_id = $6, \
             is_active = $7, membership_validated = $8, updated_at = $9
             WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.role)
        .bind(user.organization_id)
        .bind(user.is_active)
        .bind(user.membership_validated)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("user {}", user.id)));
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_session(&self, session: &Session) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO sessions (token_hash, user_id, expires_at, created_at) VALUES ($1, $2, $3, $4)")
            .bind(&session.token_hash)
            .bind(session.user_id)
            .bind(session.expires_at)
            .bind(session.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, DatabaseError> {
        Ok(sqlx::query_as::<_, Session>(
            "SELECT token_hash, user_id, expires_at, created_at FROM sessions WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_application(
        &self,
        application: &MembershipApplication,
        documents: &[MembershipDocument],
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO membership_applications (id, first_name, last_name, middle_name, birth_date, email, phone, \
             workplace, position, organization_id, user_id, status, fees_status, reviewed_by, reviewed_at, \
             rejection_reason, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(application.id)
        .bind(&application.first_name)
        .bind(&application.last_name)
        .bind(&application.middle_name)
        .bind(application.birth_date)
        .bind(&application.email)
        .bind(&application.phone)
        .bind(&application.workplace)
        .bind(&application.position)
        .bind(application.organization_id)
        .bind(application.user_id)
        .bind(application.status)
        .bind(application.fees_status)
        .bind(application.reviewed_by)
        .bind(application.reviewed_at)
        .bind(&application.rejection_reason)
        .bind(application.created_at)
        .bind(application.updated_at)
        .execute(&mut *tx)
        .await?;

        for document in documents {
            insert_membership_document_with(&mut *tx, document).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_application(&self, id: Uuid) -> Result<Option<MembershipApplication>, DatabaseError> {
        let sql = format!("SELECT {} FROM membership_applications WHERE id = $1", APPLICATION_COLUMNS);
        Ok(sqlx::query_as::<_, MembershipApplication>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_application(&self, application: &MembershipApplication) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE membership_applications SET first_name = $2, last_name = $3, middle_name = $4, birth_date = $5, \
             email = $6, phone = $7, workplace = $8, position = $9, organization_id = $10, fees_status = $11, \
             updated_at = $12
             WHERE id = $1",
        )
        .bind(application.id)
        .bind(&application.first_name)
        .bind(&application.last_name)
        .bind(&application.middle_name)
        .bind(application.birth_date)
        .bind(&application.email)
        .bind(&application.phone)
        .bind(&application.workplace)
        .bind(&application.position)
        .bind(application.organization_id)
        .bind(application.fees_status)
        .bind(application.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("application {}", application.id)));
        }
        Ok(())
    }

    async fn delete_application(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM membership_applications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_applications(&self, filter: &ApplicationFilter) -> Result<Vec<MembershipApplication>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM membership_applications
             WHERE ($1::uuid[] IS NULL OR organization_id = ANY($1))
             AND ($2::uuid IS NULL OR user_id = $2)
             AND ($3::application_status IS NULL OR status = $3)
             ORDER BY created_at DESC",
            APPLICATION_COLUMNS
        );
        Ok(sqlx::query_as::<_, MembershipApplication>(&sql)
            .bind(filter.organization_ids.clone())
            .bind(filter.user_id)
            .bind(filter.status)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn commit_review(&self, review: &ReviewCommit) -> Result<bool, DatabaseError> {
        let application = &review.application;
        let mut tx = self.pool.begin().await?;

        let current: Option<(ApplicationStatus,)> =
            sqlx::query_as("SELECT status FROM membership_applications WHERE id = $1 FOR UPDATE")
                .bind(application.id)
                .fetch_optional(&mut *tx)
                .await?;
        match current {
            Some((status,)) if status == review.expected => {}
            Some(_) => {
                tx.rollback().await?;
                return Ok(false);
            }
            None => return Err(DatabaseError::NotFound(format!("application {}", application.id))),
        }

        if let Some(user) = &review.provisioned_user {
            insert_user_with(&mut *tx, user).await?;
        }

        let updated = sqlx::query(
            "UPDATE membership_applications SET status = $2, user_id = $3, reviewed_by = $4, reviewed_at = $5, \
             rejection_reason = $6, updated_at = $7
             WHERE id = $1 AND status = $8",
        )
        .bind(application.id)
        .bind(application.status)
        .bind(application.user_id)
        .bind(application.reviewed_by)
        .bind(application.reviewed_at)
        .bind(&application.rejection_reason)
        .bind(application.updated_at)
        .bind(review.expected)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(user_id) = review.validated_user_id {
            sqlx::query("UPDATE users SET membership_validated = TRUE, updated_at = $2 WHERE id = $1")
                .bind(user_id)
                .bind(application.updated_at)
                .execute(&mut *tx)
                .await?;
        }

        if review.increment_members {
            sqlx::query("UPDATE organizations SET members_count = members_count + 1, updated_at = $2 WHERE id = $1")
                .bind(application.organization_id)
                .bind(application.updated_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn insert_membership_document(&self, document: &MembershipDocument) -> Result<(), DatabaseError> {
        insert_membership_document_with(&self.pool, document).await
    }

    async fn get_membership_document(&self, id: Uuid) -> Result<Option<MembershipDocument>, DatabaseError> {
        let sql = format!("SELECT {} FROM membership_documents WHERE id = $1", MEMBERSHIP_DOCUMENT_COLUMNS);
        Ok(sqlx::query_as::<_, MembershipDocument>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_membership_document(&self, document: &MembershipDocument) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE membership_documents SET title = $2, status = $3, file_path = $4, sent_to_union = $5, \
             signed_at = $6, sent_at = $7
             WHERE id = $1",
        )
        .bind(document.id)
        .bind(&document.title)
        .bind(document.status)
        .bind(&document.file_path)
        .bind(document.sent_to_union)
        .bind(document.signed_at)
        .bind(document.sent_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("membership document {}", document.id)));
        }
        Ok(())
    }

    async fn list_membership_documents(&self, application_id: Uuid) -> Result<Vec<MembershipDocument>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM membership_documents WHERE application_id = $1 ORDER BY created_at, title",
            MEMBERSHIP_DOCUMENT_COLUMNS
        );
        Ok(sqlx::query_as::<_, MembershipDocument>(&sql)
            .bind(application_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_workflow_document(
        &self,
        document: &WorkflowDocument,
        participants: &[DocumentParticipant],
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO workflow_documents (id, title, kind, organization_id, created_by, status, file_path, \
             created_at, updated_at, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(document.id)
        .bind(&document.title)
        .bind(document.kind)
        .bind(document.organization_id)
        .bind(document.created_by)
        .bind(document.status)
        .bind(&document.file_path)
        .bind(document.created_at)
        .bind(document.updated_at)
        .bind(document.completed_at)
        .execute(&mut *tx)
        .await?;

        for participant in participants {
            upsert_participant_with(&mut *tx, participant).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_workflow_document(&self, id: Uuid) -> Result<Option<WorkflowDocument>, DatabaseError> {
        let sql = format!("SELECT {} FROM workflow_documents WHERE id = $1", WORKFLOW_DOCUMENT_COLUMNS);
        Ok(sqlx::query_as::<_, WorkflowDocument>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_workflow_document(&self, document: &WorkflowDocument) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE workflow_documents SET title = $2, kind = $3, status = $4, file_path = $5, updated_at = $6, \
             completed_at = $7
             WHERE id = $1",
        )
        .bind(document.id)
        .bind(&document.title)
        .bind(document.kind)
        .bind(document.status)
        .bind(&document.file_path)
        .bind(document.updated_at)
        .bind(document.completed_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("workflow document {}", document.id)));
        }
        Ok(())
    }

    async fn list_workflow_documents(
        &self,
        user_id: Uuid,
        organization_ids: Option<&[Uuid]>,
    ) -> Result<Vec<WorkflowDocument>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM workflow_documents d
             WHERE $2::uuid[] IS NULL
                OR d.organization_id = ANY($2)
                OR d.created_by = $1
                OR EXISTS (SELECT 1 FROM document_participants p WHERE p.document_id = d.id AND p.user_id = $1)
             ORDER BY d.created_at DESC",
            WORKFLOW_DOCUMENT_COLUMNS
                .split(", ")
                .map(|c| format!("d.{}", c))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(sqlx::query_as::<_, WorkflowDocument>(&sql)
            .bind(user_id)
            .bind(organization_ids.map(|ids| ids.to_vec()))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_participants(&self, document_id: Uuid) -> Result<Vec<DocumentParticipant>, DatabaseError> {
        Ok(sqlx::query_as::<_, DocumentParticipant>(
            "SELECT document_id, user_id, status, comment, updated_at
             FROM document_participants WHERE document_id = $1 ORDER BY user_id",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn upsert_participant(&self, participant: &DocumentParticipant) -> Result<(), DatabaseError> {
        upsert_participant_with(&self.pool, participant).await
    }

    async fn upsert_signature(
        &self,
        document_id: Uuid,
        user_id: Uuid,
        signed_at: DateTime<Utc>,
    ) -> Result<DocumentSignature, DatabaseError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        Ok(sqlx::query_as::<_, DocumentSignature>(
            "INSERT INTO document_signatures (id, document_id, user_id, signed_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (document_id, user_id) DO UPDATE SET signed_at = document_signatures.signed_at
             RETURNING id, document_id, user_id, signed_at",
        )
        .bind(Uuid::new_v4())
        .bind(document_id)
        .bind(user_id)
        .bind(signed_at)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_signatures(&self, document_id: Uuid) -> Result<Vec<DocumentSignature>, DatabaseError> {
        Ok(sqlx::query_as::<_, DocumentSignature>(
            "SELECT id, document_id, user_id, signed_at FROM document_signatures
             WHERE document_id = $1 ORDER BY signed_at",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO notifications (id, recipient_id, kind, message, application_id, document_id, is_read, \
             created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(notification.id)
        .bind(notification.recipient_id)
        .bind(notification.kind)
        .bind(&notification.message)
        .bind(notification.application_id)
        .bind(notification.document_id)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_notifications(&self, recipient_id: Uuid, unread_only: bool) -> Result<Vec<Notification>, DatabaseError> {
        Ok(sqlx::query_as::<_, Notification>(
            "SELECT id, recipient_id, kind, message, application_id, document_id, is_read, created_at
             FROM notifications
             WHERE recipient_id = $1 AND (NOT $2 OR is_read = FALSE)
             ORDER BY created_at DESC",
        )
        .bind(recipient_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn mark_notification_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND recipient_id = $2")
            .bind(id)
            .bind(recipient_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_notifications_read(&self, recipient_id: Uuid) -> Result<u64, DatabaseError> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE recipient_id = $1 AND is_read = FALSE")
            .bind(recipient_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_news(&self, news: &News) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO news (id, organization_id, author_id, title, body, published, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(news.id)
        .bind(news.organization_id)
        .bind(news.author_id)
        .bind(&news.title)
        .bind(&news.body)
        .bind(news.published)
        .bind(news.created_at)
        .bind(news.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_news(&self, id: Uuid) -> Result<Option<News>, DatabaseError> {
        Ok(sqlx::query_as::<_, News>(
            "SELECT id, organization_id, author_id, title, body, published, created_at, updated_at
             FROM news WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_news(&self, news: &News) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE news SET title = $2, body = $3, published = $4, updated_at = $5 WHERE id = $1")
            .bind(news.id)
            .bind(&news.title)
            .bind(&news.body)
            .bind(news.published)
            .bind(news.updated_at)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("news {}", news.id)));
        }
        Ok(())
    }

    async fn delete_news(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM news WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_news(&self, organization_ids: &[Uuid]) -> Result<Vec<News>, DatabaseError> {
        Ok(sqlx::query_as::<_, News>(
            "SELECT id, organization_id, author_id, title, body, published, created_at, updated_at
             FROM news WHERE organization_id = ANY($1) ORDER BY created_at DESC",
        )
        .bind(organization_ids.to_vec())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_task(&self, task: &Task) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO tasks (id, organization_id, created_by, assignee_id, title, description, status, due_date, \
             created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(task.id)
        .bind(task.organization_id)
        .bind(task.created_by)
        .bind(task.assignee_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.due_date)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, DatabaseError> {
        Ok(sqlx::query_as::<_, Task>(
            "SELECT id, organization_id, created_by, assignee_id, title, description, status, due_date, created_at, \
             updated_at FROM tasks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_task(&self, task: &Task) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE tasks SET title = $2, description = $3, status = $4, due_date = $5, assignee_id = $6, \
             updated_at = $7 WHERE id = $1",
        )
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.due_date)
        .bind(task.assignee_id)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("task {}", task.id)));
        }
        Ok(())
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, DatabaseError> {
        Ok(sqlx::query_as::<_, Task>(
            "SELECT id, organization_id, created_by, assignee_id, title, description, status, due_date, created_at, \
             updated_at FROM tasks
             WHERE ($1::uuid IS NULL OR assignee_id = $1) AND ($2::uuid IS NULL OR created_by = $2)
             ORDER BY due_date NULLS LAST, created_at DESC",
        )
        .bind(filter.assignee_id)
        .bind(filter.created_by)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_message(&self, message: &Message) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO messages (id, sender_id, recipient_id, subject, body, is_read, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(message.id)
        .bind(message.sender_id)
        .bind(message.recipient_id)
        .bind(&message.subject)
        .bind(&message.body)
        .bind(message.is_read)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, DatabaseError> {
        Ok(sqlx::query_as::<_, Message>(
            "SELECT id, sender_id, recipient_id, subject, body, is_read, created_at FROM messages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn mark_message_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE messages SET is_read = TRUE WHERE id = $1 AND recipient_id = $2")
            .bind(id)
            .bind(recipient_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_messages(&self, user_id: Uuid, folder: MessageFolder) -> Result<Vec<Message>, DatabaseError> {
        let column = match folder {
            MessageFolder::Inbox => "recipient_id",
            MessageFolder::Sent => "sender_id",
        };
        let sql = format!(
            "SELECT id, sender_id, recipient_id, subject, body, is_read, created_at FROM messages
             WHERE {} = $1 ORDER BY created_at DESC",
            column
        );
        Ok(sqlx::query_as::<_, Message>(&sql).bind(user_id).fetch_all(&self.pool).await?)
    }
}

