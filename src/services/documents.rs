use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{
    DocumentParticipant, DocumentSignature, Notification, NotificationKind, ParticipantStatus, WorkflowDocument,
    WorkflowDocumentKind, WorkflowDocumentStatus,
};
use crate::database::store::Store;
use crate::mail::Mailer;
use crate::permissions::Permission;
use crate::services::access::{AccessContext, FORBIDDEN_MESSAGE};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::non_empty;
use crate::services::notifier::Notifier;

#[derive(Debug, Clone, Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: WorkflowDocument,
    pub participants: Vec<DocumentParticipant>,
    pub signatures: Vec<DocumentSignature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWorkflowDocument {
    pub title: String,
    pub kind: WorkflowDocumentKind,
    pub organization_id: Uuid,
    #[serde(default)]
    pub participant_ids: Vec<Uuid>,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantUpdate {
    pub status: ParticipantStatus,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A document is complete once it has participants and all of them signed.
pub fn all_signed(participants: &[DocumentParticipant]) -> bool {
    !participants.is_empty() && participants.iter().all(|p| p.status == ParticipantStatus::Signed)
}

pub struct DocumentService<'a> {
    store: &'a dyn Store,
    notifier: Notifier<'a>,
}

impl<'a> DocumentService<'a> {
    pub fn new(store: &'a dyn Store, mailer: &'a dyn Mailer) -> Self {
        Self {
            store,
            notifier: Notifier::new(store, mailer),
        }
    }

    pub async fn create(&self, ctx: &AccessContext, input: NewWorkflowDocument) -> ServiceResult<DocumentDetail> {
        ctx.require_in_scope(Permission::DocumentsManage, input.organization_id)?;
        let title = input.title.trim();
        if title.is_empty() {
            return Err(ServiceError::invalid_field("title", "Обязательное поле"));
        }

        let participant_ids: BTreeSet<Uuid> = input.participant_ids.iter().copied().collect();
        for &user_id in &participant_ids {
            if self.store.get_user(user_id).await?.is_none() {
                return Err(ServiceError::invalid_field(
                    "participant_ids",
                    format!("Пользователь {} не найден", user_id),
                ));
            }
        }

        let now = Utc::now();
        let document = WorkflowDocument {
            id: Uuid::new_v4(),
            title: title.to_string(),
            kind: input.kind,
            organization_id: input.organization_id,
            created_by: ctx.user.id,
            status: WorkflowDocumentStatus::InProgress,
            file_path: non_empty(input.file_path),
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        let participants: Vec<DocumentParticipant> = participant_ids
            .iter()
            .map(|&user_id| DocumentParticipant {
                document_id: document.id,
                user_id,
                status: ParticipantStatus::Pending,
                comment: None,
                updated_at: now,
            })
            .collect();

        self.store.insert_workflow_document(&document, &participants).await?;
        tracing::info!(
            "Document {} created with {} participants",
            document.id,
            participants.len()
        );

        self.notifier
            .notify_all(participants.iter().map(|participant| {
                Notification::new(
                    participant.user_id,
                    NotificationKind::DocumentAssigned,
                    format!("Вам назначен документ на подпись: {}", document.title),
                )
                .for_document(document.id)
            }))
            .await;

        Ok(DocumentDetail {
            document,
            participants,
            signatures: Vec::new(),
        })
    }

    pub async fn list(&self, ctx: &AccessContext) -> ServiceResult<Vec<WorkflowDocument>> {
        let documents = if ctx.can(Permission::DocumentsView) {
            let ids = ctx.scope.org_ids();
            self.store.list_workflow_documents(ctx.user.id, ids.as_deref()).await?
        } else {
            self.store.list_workflow_documents(ctx.user.id, Some(&[])).await?
        };
        Ok(documents)
    }

    pub async fn get(&self, ctx: &AccessContext, id: Uuid) -> ServiceResult<DocumentDetail> {
        let document = self.load(id).await?;
        let detail = self.detail(document).await?;
        if !can_view(ctx, &detail) {
            return Err(ServiceError::forbidden(FORBIDDEN_MESSAGE));
        }
        Ok(detail)
    }

    /// Record a participant's decision. Only the participant may do this.
    ///
    /// Signing is idempotent and final: the signature row is keyed by
    /// (document, user), a signed participant cannot change their answer,
    /// and the completion notification fires only on the transition to
    /// COMPLETED.
    pub async fn set_participant_status(
        &self,
        ctx: &AccessContext,
        document_id: Uuid,
        user_id: Uuid,
        input: ParticipantUpdate,
    ) -> ServiceResult<DocumentDetail> {
        if ctx.user.id != user_id {
            return Err(ServiceError::forbidden(FORBIDDEN_MESSAGE));
        }
        let document = self.load(document_id).await?;
        let participants = self.store.list_participants(document_id).await?;
        let mut participant = participants
            .into_iter()
            .find(|p| p.user_id == user_id)
            .ok_or_else(|| ServiceError::not_found("Участник не найден"))?;

        if document.status == WorkflowDocumentStatus::Completed {
            return match input.status {
                ParticipantStatus::Signed => self.detail(document).await,
                _ => Err(ServiceError::conflict("Документ уже подписан всеми участниками")),
            };
        }
        if participant.status == ParticipantStatus::Signed {
            return match input.status {
                ParticipantStatus::Signed => self.detail(document).await,
                _ => Err(ServiceError::conflict("Подпись уже поставлена и не может быть отозвана")),
            };
        }
        if input.status == ParticipantStatus::Signed {
            ctx.require(Permission::DocumentsSign)?;
        }

        let now = Utc::now();
        participant.status = input.status;
        if input.comment.is_some() {
            participant.comment = non_empty(input.comment);
        }
        participant.updated_at = now;
        self.store.upsert_participant(&participant).await?;

        if input.status == ParticipantStatus::Signed {
            self.store.upsert_signature(document_id, user_id, now).await?;
        }

        let document = self.complete_if_signed(document).await?;
        self.detail(document).await
    }

    /// Move an in-progress document to COMPLETED when every remaining
    /// participant has signed, and tell its creator.
    pub async fn complete_if_signed(&self, document: WorkflowDocument) -> ServiceResult<WorkflowDocument> {
        if document.status == WorkflowDocumentStatus::Completed {
            return Ok(document);
        }
        let participants = self.store.list_participants(document.id).await?;
        if !all_signed(&participants) {
            return Ok(document);
        }

        let now = Utc::now();
        let mut completed = document;
        completed.status = WorkflowDocumentStatus::Completed;
        completed.completed_at = Some(now);
        completed.updated_at = now;
        self.store.update_workflow_document(&completed).await?;
        tracing::info!("Document {} completed", completed.id);

        self.notifier
            .notify(
                Notification::new(
                    completed.created_by,
                    NotificationKind::DocumentCompleted,
                    format!("Документ подписан всеми участниками: {}", completed.title),
                )
                .for_document(completed.id),
            )
            .await;
        Ok(completed)
    }

    async fn load(&self, id: Uuid) -> ServiceResult<WorkflowDocument> {
        self.store
            .get_workflow_document(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Документ не найден"))
    }

    async fn detail(&self, document: WorkflowDocument) -> ServiceResult<DocumentDetail> {
        let participants = self.store.list_participants(document.id).await?;
        let signatures = self.store.list_signatures(document.id).await?;
        Ok(DocumentDetail {
            document,
            participants,
            signatures,
        })
    }
}

fn can_view(ctx: &AccessContext, detail: &DocumentDetail) -> bool {
    detail.document.created_by == ctx.user.id
        || detail.participants.iter().any(|p| p.user_id == ctx.user.id)
        || (ctx.can(Permission::DocumentsView) && ctx.in_scope(detail.document.organization_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Role;
    use crate::testing::TestContext;

    fn participant(status: ParticipantStatus) -> DocumentParticipant {
        DocumentParticipant {
            document_id: Uuid::nil(),
            user_id: Uuid::new_v4(),
            status,
            comment: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn aggregation_needs_every_signature() {
        assert!(!all_signed(&[]));
        assert!(all_signed(&[participant(ParticipantStatus::Signed)]));
        assert!(!all_signed(&[
            participant(ParticipantStatus::Signed),
            participant(ParticipantStatus::Pending)
        ]));
        assert!(!all_signed(&[participant(ParticipantStatus::Rejected)]));
    }

    fn sign() -> ParticipantUpdate {
        ParticipantUpdate {
            status: ParticipantStatus::Signed,
            comment: None,
        }
    }

    #[tokio::test]
    async fn last_signature_completes_document_once() {
        let tc = TestContext::new().await;
        let secretary = tc.create_user(Role::LocalSecretary, tc.orgs.local).await;
        let alice = tc.create_user(Role::PrimaryMember, tc.orgs.primary).await;
        let bob = tc.create_user(Role::PrimaryMember, tc.orgs.primary).await;
        let svc = tc.documents();

        let detail = svc
            .create(
                &tc.access(&secretary).await,
                NewWorkflowDocument {
                    title: "Протокол собрания".into(),
                    kind: WorkflowDocumentKind::Protocol,
                    organization_id: tc.orgs.local,
                    participant_ids: vec![alice.id, bob.id, alice.id],
                    file_path: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(detail.participants.len(), 2);
        let doc_id = detail.document.id;

        let alice_ctx = tc.access(&alice).await;
        let bob_ctx = tc.access(&bob).await;

        let after_alice = svc.set_participant_status(&alice_ctx, doc_id, alice.id, sign()).await.unwrap();
        assert_eq!(after_alice.document.status, WorkflowDocumentStatus::InProgress);

        let after_bob = svc.set_participant_status(&bob_ctx, doc_id, bob.id, sign()).await.unwrap();
        assert_eq!(after_bob.document.status, WorkflowDocumentStatus::Completed);
        assert!(after_bob.document.completed_at.is_some());

        // Signing again changes nothing.
        let again = svc.set_participant_status(&bob_ctx, doc_id, bob.id, sign()).await.unwrap();
        assert_eq!(again.signatures.len(), 2);
        assert_eq!(again.document.completed_at, after_bob.document.completed_at);

        let completed: Vec<_> = tc
            .store
            .list_notifications(secretary.id, false)
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::DocumentCompleted)
            .collect();
        assert_eq!(completed.len(), 1);
    }

    #[tokio::test]
    async fn resigning_before_completion_keeps_one_signature() {
        let tc = TestContext::new().await;
        let secretary = tc.create_user(Role::LocalSecretary, tc.orgs.local).await;
        let alice = tc.create_user(Role::PrimaryMember, tc.orgs.primary).await;
        let bob = tc.create_user(Role::PrimaryMember, tc.orgs.primary).await;
        let svc = tc.documents();

        let detail = svc
            .create(
                &tc.access(&secretary).await,
                NewWorkflowDocument {
                    title: "Повестка".into(),
                    kind: WorkflowDocumentKind::Agenda,
                    organization_id: tc.orgs.local,
                    participant_ids: vec![alice.id, bob.id],
                    file_path: None,
                },
            )
            .await
            .unwrap();
        let alice_ctx = tc.access(&alice).await;

        let first = svc
            .set_participant_status(&alice_ctx, detail.document.id, alice.id, sign())
            .await
            .unwrap();
        let second = svc
            .set_participant_status(&alice_ctx, detail.document.id, alice.id, sign())
            .await
            .unwrap();
        assert_eq!(second.signatures.len(), 1);
        assert_eq!(first.signatures[0].signed_at, second.signatures[0].signed_at);
        assert_eq!(second.document.status, WorkflowDocumentStatus::InProgress);
    }

    #[tokio::test]
    async fn only_the_participant_may_sign() {
        let tc = TestContext::new().await;
        let secretary = tc.create_user(Role::LocalSecretary, tc.orgs.local).await;
        let alice = tc.create_user(Role::PrimaryMember, tc.orgs.primary).await;
        let svc = tc.documents();
        let secretary_ctx = tc.access(&secretary).await;

        let detail = svc
            .create(
                &secretary_ctx,
                NewWorkflowDocument {
                    title: "Решение".into(),
                    kind: WorkflowDocumentKind::Resolution,
                    organization_id: tc.orgs.local,
                    participant_ids: vec![alice.id],
                    file_path: None,
                },
            )
            .await
            .unwrap();

        let err = svc
            .set_participant_status(&secretary_ctx, detail.document.id, alice.id, sign())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn completed_document_refuses_rejection() {
        let tc = TestContext::new().await;
        let secretary = tc.create_user(Role::LocalSecretary, tc.orgs.local).await;
        let alice = tc.create_user(Role::PrimaryMember, tc.orgs.primary).await;
        let svc = tc.documents();

        let detail = svc
            .create(
                &tc.access(&secretary).await,
                NewWorkflowDocument {
                    title: "Протокол".into(),
                    kind: WorkflowDocumentKind::Protocol,
                    organization_id: tc.orgs.local,
                    participant_ids: vec![alice.id],
                    file_path: None,
                },
            )
            .await
            .unwrap();
        let alice_ctx = tc.access(&alice).await;
        svc.set_participant_status(&alice_ctx, detail.document.id, alice.id, sign())
            .await
            .unwrap();

        let err = svc
            .set_participant_status(
                &alice_ctx,
                detail.document.id,
                alice.id,
                ParticipantUpdate {
                    status: ParticipantStatus::Rejected,
                    comment: Some("передумал".into()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn signature_cannot_be_withdrawn() {
        let tc = TestContext::new().await;
        let secretary = tc.create_user(Role::LocalSecretary, tc.orgs.local).await;
        let alice = tc.create_user(Role::PrimaryMember, tc.orgs.primary).await;
        let bob = tc.create_user(Role::PrimaryMember, tc.orgs.primary).await;
        let svc = tc.documents();

        let detail = svc
            .create(
                &tc.access(&secretary).await,
                NewWorkflowDocument {
                    title: "Протокол".into(),
                    kind: WorkflowDocumentKind::Protocol,
                    organization_id: tc.orgs.local,
                    participant_ids: vec![alice.id, bob.id],
                    file_path: None,
                },
            )
            .await
            .unwrap();
        let doc_id = detail.document.id;
        let alice_ctx = tc.access(&alice).await;
        svc.set_participant_status(&alice_ctx, doc_id, alice.id, sign()).await.unwrap();

        for status in [ParticipantStatus::Rejected, ParticipantStatus::Pending] {
            let err = svc
                .set_participant_status(&alice_ctx, doc_id, alice.id, ParticipantUpdate { status, comment: None })
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Conflict(_)));
        }

        let detail = svc.get(&alice_ctx, doc_id).await.unwrap();
        let alice_row = detail.participants.iter().find(|p| p.user_id == alice.id).unwrap();
        assert_eq!(alice_row.status, ParticipantStatus::Signed);
        assert_eq!(detail.signatures.len(), 1);
        assert_eq!(detail.signatures[0].user_id, alice.id);
    }

    #[tokio::test]
    async fn removed_participant_no_longer_blocks_completion() {
        let tc = TestContext::new().await;
        let secretary = tc.create_user(Role::LocalSecretary, tc.orgs.local).await;
        let alice = tc.create_user(Role::PrimaryMember, tc.orgs.primary).await;
        let bob = tc.create_user(Role::PrimaryMember, tc.orgs.primary).await;
        let svc = tc.documents();

        let detail = svc
            .create(
                &tc.access(&secretary).await,
                NewWorkflowDocument {
                    title: "Решение".into(),
                    kind: WorkflowDocumentKind::Resolution,
                    organization_id: tc.orgs.local,
                    participant_ids: vec![alice.id, bob.id],
                    file_path: None,
                },
            )
            .await
            .unwrap();
        let doc_id = detail.document.id;
        svc.set_participant_status(&tc.access(&alice).await, doc_id, alice.id, sign())
            .await
            .unwrap();

        let admin = tc.create_user(Role::SuperAdmin, tc.orgs.federal).await;
        tc.users().delete(&tc.access(&admin).await, bob.id).await.unwrap();

        let detail = svc.get(&tc.access(&secretary).await, doc_id).await.unwrap();
        assert_eq!(detail.document.status, WorkflowDocumentStatus::Completed);
        assert_eq!(detail.participants.len(), 1);
        let completed = tc
            .store
            .list_notifications(secretary.id, false)
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::DocumentCompleted)
            .count();
        assert_eq!(completed, 1);
    }

    #[tokio::test]
    async fn members_cannot_create_documents() {
        let tc = TestContext::new().await;
        let member = tc.create_user(Role::PrimaryMember, tc.orgs.primary).await;
        let err = tc
            .documents()
            .create(
                &tc.access(&member).await,
                NewWorkflowDocument {
                    title: "x".into(),
                    kind: WorkflowDocumentKind::Other,
                    organization_id: tc.orgs.primary,
                    participant_ids: vec![],
                    file_path: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }
}
