use std::collections::BTreeSet;

use uuid::Uuid;

use crate::database::models::User;
use crate::database::store::Store;
use crate::permissions::{has_permission, Permission, Role};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::hierarchy::OrgTree;

pub const FORBIDDEN_MESSAGE: &str = "Недостаточно прав";

/// Organizations a user may act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    All,
    Organizations(BTreeSet<Uuid>),
}

impl AccessScope {
    pub fn for_user(user: &User, tree: &OrgTree) -> Self {
        if user.role == Role::SuperAdmin {
            return AccessScope::All;
        }
        match user.organization_id {
            Some(org) => AccessScope::Organizations(tree.scope_of(org)),
            None => AccessScope::Organizations(BTreeSet::new()),
        }
    }

    pub fn contains(&self, org_id: Uuid) -> bool {
        match self {
            AccessScope::All => true,
            AccessScope::Organizations(ids) => ids.contains(&org_id),
        }
    }

    /// Store filter form: `None` means unrestricted.
    pub fn org_ids(&self) -> Option<Vec<Uuid>> {
        match self {
            AccessScope::All => None,
            AccessScope::Organizations(ids) => Some(ids.iter().copied().collect()),
        }
    }
}

/// Caller, hierarchy and scope resolved once for the current request
#[derive(Debug, Clone)]
pub struct AccessContext {
    pub user: User,
    pub tree: OrgTree,
    pub scope: AccessScope,
}

impl AccessContext {
    pub fn new(user: User, tree: OrgTree) -> Self {
        let scope = AccessScope::for_user(&user, &tree);
        Self { user, tree, scope }
    }

    pub async fn load(store: &dyn Store, user: User) -> ServiceResult<Self> {
        let organizations = store.list_organizations().await?;
        Ok(Self::new(user, OrgTree::from_organizations(&organizations)))
    }

    pub fn is_admin(&self) -> bool {
        self.user.role == Role::SuperAdmin
    }

    pub fn can(&self, permission: Permission) -> bool {
        has_permission(self.user.role, permission)
    }

    pub fn require(&self, permission: Permission) -> ServiceResult<()> {
        if self.can(permission) {
            Ok(())
        } else {
            Err(ServiceError::forbidden(FORBIDDEN_MESSAGE))
        }
    }

    pub fn in_scope(&self, org_id: Uuid) -> bool {
        self.scope.contains(org_id)
    }

    pub fn require_scope(&self, org_id: Uuid) -> ServiceResult<()> {
        if self.in_scope(org_id) {
            Ok(())
        } else {
            Err(ServiceError::forbidden(FORBIDDEN_MESSAGE))
        }
    }

    /// Permission plus organization scope in one check.
    pub fn require_in_scope(&self, permission: Permission, org_id: Uuid) -> ServiceResult<()> {
        self.require(permission)?;
        self.require_scope(org_id)
    }

    /// Whether the caller may approve or reject an application filed with
    /// `org_id`.
    pub fn can_review(&self, org_id: Uuid) -> bool {
        match self.user.role {
            Role::SuperAdmin | Role::FederalChairman => true,
            Role::RegionalChairman | Role::LocalChairman => self.in_scope(org_id),
            Role::PrimaryChairman => self.user.organization_id == Some(org_id),
            _ => false,
        }
    }
}
