use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{ApplicationFilter, Organization, OrganizationType};
use crate::database::store::Store;
use crate::permissions::Permission;
use crate::services::access::{AccessContext, FORBIDDEN_MESSAGE};
use crate::services::deserialize_some;
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::hierarchy::OrgNode;

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrganization {
    pub name: String,
    #[serde(rename = "type")]
    pub org_type: OrganizationType,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub chairman_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganizationUpdate {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub org_type: Option<OrganizationType>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub parent_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub chairman_id: Option<Option<Uuid>>,
    pub is_active: Option<bool>,
}

/// Placement rules: a FEDERAL organization is always a root, and a child
/// never ranks above its parent.
fn check_placement(org_type: OrganizationType, parent: Option<&Organization>) -> ServiceResult<()> {
    match (org_type, parent) {
        (OrganizationType::Federal, Some(_)) => Err(ServiceError::invalid_field(
            "parent_id",
            "Федеральная организация не может иметь вышестоящую",
        )),
        (_, Some(parent)) if org_type.rank() < parent.org_type.rank() => Err(ServiceError::invalid_field(
            "type",
            "Тип организации не может быть выше типа вышестоящей организации",
        )),
        _ => Ok(()),
    }
}

pub struct OrganizationService<'a> {
    store: &'a dyn Store,
}

impl<'a> OrganizationService<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub fn list(&self, ctx: &AccessContext, parent_id: Option<Uuid>) -> ServiceResult<Vec<Organization>> {
        ctx.require(Permission::OrganizationsView)?;
        let mut organizations: Vec<Organization> = match parent_id {
            Some(parent) => ctx
                .tree
                .children_of(parent)
                .iter()
                .filter_map(|&id| ctx.tree.get(id).cloned())
                .collect(),
            None => ctx.tree.organizations().cloned().collect(),
        };
        organizations.sort_by(|a, b| a.org_type.rank().cmp(&b.org_type.rank()).then_with(|| a.name.cmp(&b.name)));
        Ok(organizations)
    }

    pub fn tree(&self, ctx: &AccessContext) -> ServiceResult<Vec<OrgNode>> {
        ctx.require(Permission::OrganizationsView)?;
        Ok(ctx.tree.forest())
    }

    pub fn get(&self, ctx: &AccessContext, id: Uuid) -> ServiceResult<Organization> {
        ctx.require(Permission::OrganizationsView)?;
        ctx.tree
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("Организация не найдена"))
    }

    pub async fn create(&self, ctx: &AccessContext, input: NewOrganization) -> ServiceResult<Organization> {
        ctx.require(Permission::OrganizationsManage)?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ServiceError::invalid_field("name", "Обязательное поле"));
        }

        let parent = match input.parent_id {
            Some(parent_id) => {
                let parent = ctx
                    .tree
                    .get(parent_id)
                    .ok_or_else(|| ServiceError::invalid_field("parent_id", "Вышестоящая организация не найдена"))?;
                ctx.require_scope(parent_id)?;
                Some(parent)
            }
            None if ctx.is_admin() => None,
            None if input.org_type == OrganizationType::Federal => {
                return Err(ServiceError::forbidden(FORBIDDEN_MESSAGE));
            }
            None => {
                return Err(ServiceError::invalid_field(
                    "parent_id",
                    "Укажите вышестоящую организацию",
                ))
            }
        };
        check_placement(input.org_type, parent)?;

        let mut org = Organization::new(name, input.org_type, input.parent_id);
        if let Some(chairman_id) = input.chairman_id {
            self.assign_chairman(ctx, &mut org, chairman_id).await?;
        }
        self.store.insert_organization(&org).await?;
        tracing::info!("Organization {} ({:?}) created by {}", org.id, org.org_type, ctx.user.id);
        Ok(org)
    }

    pub async fn update(&self, ctx: &AccessContext, id: Uuid, input: OrganizationUpdate) -> ServiceResult<Organization> {
        ctx.require(Permission::OrganizationsManage)?;
        let mut org = self.get(ctx, id)?;
        ctx.require_scope(id)?;

        if let Some(name) = input.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ServiceError::invalid_field("name", "Обязательное поле"));
            }
            org.name = name.to_string();
        }
        if let Some(org_type) = input.org_type {
            org.org_type = org_type;
        }
        if let Some(parent_id) = input.parent_id {
            match parent_id {
                Some(parent) => {
                    if !ctx.tree.contains(parent) {
                        return Err(ServiceError::invalid_field(
                            "parent_id",
                            "Вышестоящая организация не найдена",
                        ));
                    }
                    ctx.require_scope(parent)?;
                    if ctx.tree.would_create_cycle(id, parent) {
                        return Err(ServiceError::invalid_field(
                            "parent_id",
                            "Организация не может быть подчинена самой себе или своему подразделению",
                        ));
                    }
                }
                None if !ctx.is_admin() => return Err(ServiceError::forbidden(FORBIDDEN_MESSAGE)),
                None => {}
            }
            org.parent_id = parent_id;
        }

        check_placement(org.org_type, org.parent_id.and_then(|p| ctx.tree.get(p)))?;
        let child_outranks = ctx
            .tree
            .children_of(id)
            .iter()
            .filter_map(|&child| ctx.tree.get(child))
            .any(|child| child.org_type.rank() < org.org_type.rank());
        if child_outranks {
            return Err(ServiceError::invalid_field(
                "type",
                "Тип организации не может быть ниже типа подчинённых организаций",
            ));
        }

        match input.chairman_id {
            Some(Some(chairman_id)) => self.assign_chairman(ctx, &mut org, chairman_id).await?,
            Some(None) => {
                org.chairman_id = None;
                org.chairman_name = None;
            }
            None => {}
        }
        if let Some(is_active) = input.is_active {
            org.is_active = is_active;
        }

        org.updated_at = Utc::now();
        self.store.update_organization(&org).await?;
        tracing::info!("Organization {} updated by {}", org.id, ctx.user.id);
        Ok(self.store.get_organization(id).await?.unwrap_or(org))
    }

    /// Only empty leaves can be removed.
    pub async fn delete(&self, ctx: &AccessContext, id: Uuid) -> ServiceResult<()> {
        ctx.require(Permission::OrganizationsManage)?;
        self.get(ctx, id)?;
        ctx.require_scope(id)?;

        if !ctx.tree.children_of(id).is_empty() {
            return Err(ServiceError::conflict("У организации есть подчинённые организации"));
        }
        if !self.store.list_users(Some(&[id])).await?.is_empty() {
            return Err(ServiceError::conflict("В организации есть пользователи"));
        }
        let applications = self
            .store
            .list_applications(&ApplicationFilter {
                organization_ids: Some(vec![id]),
                ..Default::default()
            })
            .await?;
        if !applications.is_empty() {
            return Err(ServiceError::conflict("В организации есть заявления"));
        }

        if !self.store.delete_organization(id).await? {
            return Err(ServiceError::not_found("Организация не найдена"));
        }
        tracing::info!("Organization {} deleted by {}", id, ctx.user.id);
        Ok(())
    }

    /// The chairman must be an active user of the organization or of one of
    /// its subdivisions. A new organization has no members yet, so there the
    /// caller's scope is the limit.
    async fn assign_chairman(&self, ctx: &AccessContext, org: &mut Organization, chairman_id: Uuid) -> ServiceResult<()> {
        let chairman = self
            .store
            .get_user(chairman_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| ServiceError::invalid_field("chairman_id", "Пользователь не найден"))?;

        let placed = match chairman.organization_id {
            Some(home) if ctx.tree.contains(org.id) => ctx.tree.scope_of(org.id).contains(&home),
            Some(home) => ctx.in_scope(home),
            None => false,
        };
        if !placed {
            return Err(ServiceError::invalid_field(
                "chairman_id",
                "Председатель должен состоять в этой организации или её подразделениях",
            ));
        }

        org.chairman_id = Some(chairman.id);
        org.chairman_name = Some(chairman.full_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Role;
    use crate::testing::TestContext;

    fn update() -> OrganizationUpdate {
        OrganizationUpdate::default()
    }

    #[tokio::test]
    async fn reparenting_under_a_descendant_is_rejected() {
        let tc = TestContext::new().await;
        let admin = tc.create_user(Role::SuperAdmin, tc.orgs.federal).await;
        let ctx = tc.access(&admin).await;

        let err = tc
            .organizations()
            .update(
                &ctx,
                tc.orgs.local,
                OrganizationUpdate {
                    parent_id: Some(Some(tc.orgs.sub_primary)),
                    ..update()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[tokio::test]
    async fn child_cannot_outrank_parent() {
        let tc = TestContext::new().await;
        let chairman = tc.create_user(Role::RegionalChairman, tc.orgs.region).await;
        let ctx = tc.access(&chairman).await;

        let err = tc
            .organizations()
            .create(
                &ctx,
                NewOrganization {
                    name: "Новый регион".into(),
                    org_type: OrganizationType::Regional,
                    parent_id: Some(tc.orgs.local),
                    chairman_id: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));

        let org = tc
            .organizations()
            .create(
                &ctx,
                NewOrganization {
                    name: "Первичка цеха".into(),
                    org_type: OrganizationType::Primary,
                    parent_id: Some(tc.orgs.local),
                    chairman_id: Some(chairman.id),
                },
            )
            .await
            .unwrap();
        assert_eq!(org.chairman_name.as_deref(), Some(chairman.full_name.as_str()));
    }

    #[tokio::test]
    async fn regional_chairman_cannot_create_outside_scope() {
        let tc = TestContext::new().await;
        let chairman = tc.create_user(Role::RegionalChairman, tc.orgs.region).await;
        let ctx = tc.access(&chairman).await;

        let err = tc
            .organizations()
            .create(
                &ctx,
                NewOrganization {
                    name: "Чужая".into(),
                    org_type: OrganizationType::Local,
                    parent_id: Some(tc.orgs.other_region),
                    chairman_id: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn delete_refuses_organizations_in_use() {
        let tc = TestContext::new().await;
        let admin = tc.create_user(Role::SuperAdmin, tc.orgs.federal).await;
        let ctx = tc.access(&admin).await;
        let svc = tc.organizations();

        let err = svc.delete(&ctx, tc.orgs.local).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        tc.create_user(Role::PrimaryMember, tc.orgs.sub_primary).await;
        let err = svc.delete(&ctx, tc.orgs.sub_primary).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let ctx = tc.access(&admin).await;
        svc.delete(&ctx, tc.orgs.other_region).await.unwrap();
        assert!(tc.store.get_organization(tc.orgs.other_region).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn null_chairman_clears_the_pointer() {
        let tc = TestContext::new().await;
        let admin = tc.create_user(Role::SuperAdmin, tc.orgs.federal).await;
        let chairman = tc.create_user(Role::PrimaryChairman, tc.orgs.primary).await;
        let ctx = tc.access(&admin).await;
        let svc = tc.organizations();

        let org = svc
            .update(
                &ctx,
                tc.orgs.primary,
                OrganizationUpdate {
                    chairman_id: Some(Some(chairman.id)),
                    ..update()
                },
            )
            .await
            .unwrap();
        assert_eq!(org.chairman_id, Some(chairman.id));

        let ctx = tc.access(&admin).await;
        let org = svc
            .update(
                &ctx,
                tc.orgs.primary,
                OrganizationUpdate {
                    chairman_id: Some(None),
                    ..update()
                },
            )
            .await
            .unwrap();
        assert!(org.chairman_id.is_none());
        assert!(org.chairman_name.is_none());
    }

    #[tokio::test]
    async fn chairman_must_belong_to_the_organization() {
        let tc = TestContext::new().await;
        let admin = tc.create_user(Role::SuperAdmin, tc.orgs.federal).await;
        let outsider = tc.create_user(Role::RegionalChairman, tc.orgs.other_region).await;
        let nested = tc.create_user(Role::PrimaryChairman, tc.orgs.sub_primary).await;
        let ctx = tc.access(&admin).await;
        let svc = tc.organizations();

        let err = svc
            .update(
                &ctx,
                tc.orgs.primary,
                OrganizationUpdate {
                    chairman_id: Some(Some(outsider.id)),
                    ..update()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));

        let org = svc
            .update(
                &ctx,
                tc.orgs.primary,
                OrganizationUpdate {
                    chairman_id: Some(Some(nested.id)),
                    ..update()
                },
            )
            .await
            .unwrap();
        assert_eq!(org.chairman_id, Some(nested.id));
    }

    #[tokio::test]
    async fn new_organization_chairman_stays_in_caller_scope() {
        let tc = TestContext::new().await;
        let chairman = tc.create_user(Role::RegionalChairman, tc.orgs.region).await;
        let outsider = tc.create_user(Role::LocalChairman, tc.orgs.other_region).await;
        let ctx = tc.access(&chairman).await;

        let err = tc
            .organizations()
            .create(
                &ctx,
                NewOrganization {
                    name: "Новая первичка".into(),
                    org_type: OrganizationType::Primary,
                    parent_id: Some(tc.orgs.local),
                    chairman_id: Some(outsider.id),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[tokio::test]
    async fn rename_keeps_members_approved_after_context_load() {
        let tc = TestContext::new().await;
        let admin = tc.create_user(Role::SuperAdmin, tc.orgs.federal).await;
        let ctx = tc.access(&admin).await;
        assert_eq!(ctx.tree.get(tc.orgs.primary).unwrap().members_count, 0);

        tc.approved_application(tc.orgs.primary).await;

        let org = tc
            .organizations()
            .update(
                &ctx,
                tc.orgs.primary,
                OrganizationUpdate {
                    name: Some("Первичка депо".into()),
                    ..update()
                },
            )
            .await
            .unwrap();
        assert_eq!(org.members_count, 1);

        let stored = tc.store.get_organization(tc.orgs.primary).await.unwrap().unwrap();
        assert_eq!(stored.name, "Первичка депо");
        assert_eq!(stored.members_count, 1);
    }
}
