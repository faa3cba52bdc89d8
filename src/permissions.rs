//! Role → permission table.
//!
//! This is the only copy of the table. Route handlers consult it through
//! [`has_permission`] and UI clients receive it verbatim from
//! `GET /api/auth/permissions`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Every organizational title a user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    FederalChairman,
    FederalDeputyChairman,
    FederalSecretary,
    RegionalChairman,
    RegionalDeputyChairman,
    RegionalSecretary,
    LocalChairman,
    LocalSecretary,
    PrimaryChairman,
    PrimaryDeputyChairman,
    PrimaryMember,
}

impl Role {
    pub const ALL: [Role; 12] = [
        Role::SuperAdmin,
        Role::FederalChairman,
        Role::FederalDeputyChairman,
        Role::FederalSecretary,
        Role::RegionalChairman,
        Role::RegionalDeputyChairman,
        Role::RegionalSecretary,
        Role::LocalChairman,
        Role::LocalSecretary,
        Role::PrimaryChairman,
        Role::PrimaryDeputyChairman,
        Role::PrimaryMember,
    ];

    /// Hierarchy tier of the role; lower is more senior.
    pub fn tier(self) -> u8 {
        match self {
            Role::SuperAdmin => 0,
            Role::FederalChairman | Role::FederalDeputyChairman | Role::FederalSecretary => 1,
            Role::RegionalChairman | Role::RegionalDeputyChairman | Role::RegionalSecretary => 2,
            Role::LocalChairman | Role::LocalSecretary => 3,
            Role::PrimaryChairman | Role::PrimaryDeputyChairman | Role::PrimaryMember => 4,
        }
    }

    pub fn is_chairman(self) -> bool {
        matches!(
            self,
            Role::FederalChairman | Role::RegionalChairman | Role::LocalChairman | Role::PrimaryChairman
        )
    }

    /// Whether a holder of this role may hand `target` to another user.
    pub fn can_assign(self, target: Role) -> bool {
        match self {
            Role::SuperAdmin => true,
            _ => target != Role::SuperAdmin && target.tier() >= self.tier(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::FederalChairman => "FEDERAL_CHAIRMAN",
            Role::FederalDeputyChairman => "FEDERAL_DEPUTY_CHAIRMAN",
            Role::FederalSecretary => "FEDERAL_SECRETARY",
            Role::RegionalChairman => "REGIONAL_CHAIRMAN",
            Role::RegionalDeputyChairman => "REGIONAL_DEPUTY_CHAIRMAN",
            Role::RegionalSecretary => "REGIONAL_SECRETARY",
            Role::LocalChairman => "LOCAL_CHAIRMAN",
            Role::LocalSecretary => "LOCAL_SECRETARY",
            Role::PrimaryChairman => "PRIMARY_CHAIRMAN",
            Role::PrimaryDeputyChairman => "PRIMARY_DEPUTY_CHAIRMAN",
            Role::PrimaryMember => "PRIMARY_MEMBER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named capabilities checked by handlers and UI gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    SystemAdmin,
    OrganizationsView,
    OrganizationsManage,
    UsersView,
    UsersManage,
    ApplicationsView,
    ApplicationsSubmit,
    ApplicationsValidate,
    DocumentsView,
    DocumentsManage,
    DocumentsSign,
    NewsView,
    NewsManage,
    TasksView,
    TasksManage,
    MessagesSend,
    ReportsView,
}

use Permission::*;

const MEMBER: &[Permission] = &[
    OrganizationsView,
    ApplicationsSubmit,
    DocumentsView,
    DocumentsSign,
    NewsView,
    TasksView,
    MessagesSend,
];

const OFFICER: &[Permission] = &[
    OrganizationsView,
    UsersView,
    ApplicationsView,
    ApplicationsSubmit,
    DocumentsView,
    DocumentsManage,
    DocumentsSign,
    NewsView,
    NewsManage,
    TasksView,
    TasksManage,
    MessagesSend,
    ReportsView,
];

const CHAIRMAN: &[Permission] = &[
    OrganizationsView,
    OrganizationsManage,
    UsersView,
    UsersManage,
    ApplicationsView,
    ApplicationsSubmit,
    ApplicationsValidate,
    DocumentsView,
    DocumentsManage,
    DocumentsSign,
    NewsView,
    NewsManage,
    TasksView,
    TasksManage,
    MessagesSend,
    ReportsView,
];

fn table(role: Role) -> &'static [Permission] {
    match role {
        Role::SuperAdmin => &[
            SystemAdmin,
            OrganizationsView,
            OrganizationsManage,
            UsersView,
            UsersManage,
            ApplicationsView,
            ApplicationsSubmit,
            ApplicationsValidate,
            DocumentsView,
            DocumentsManage,
            DocumentsSign,
            NewsView,
            NewsManage,
            TasksView,
            TasksManage,
            MessagesSend,
            ReportsView,
        ],
        Role::FederalChairman | Role::RegionalChairman | Role::LocalChairman => CHAIRMAN,
        // A primary chapter has no sub-organizations to manage.
        Role::PrimaryChairman => &[
            OrganizationsView,
            UsersView,
            UsersManage,
            ApplicationsView,
            ApplicationsSubmit,
            ApplicationsValidate,
            DocumentsView,
            DocumentsManage,
            DocumentsSign,
            NewsView,
            NewsManage,
            TasksView,
            TasksManage,
            MessagesSend,
            ReportsView,
        ],
        Role::FederalDeputyChairman
        | Role::FederalSecretary
        | Role::RegionalDeputyChairman
        | Role::RegionalSecretary
        | Role::LocalSecretary
        | Role::PrimaryDeputyChairman => OFFICER,
        Role::PrimaryMember => MEMBER,
    }
}

pub fn permissions_for(role: Role) -> BTreeSet<Permission> {
    table(role).iter().copied().collect()
}

pub fn has_permission(role: Role, permission: Permission) -> bool {
    table(role).contains(&permission)
}

/// Full table keyed by role, as served to UI clients.
pub fn permission_table() -> BTreeMap<Role, BTreeSet<Permission>> {
    Role::ALL.iter().map(|&role| (role, permissions_for(role))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn super_admin_holds_every_permission() {
        for role in Role::ALL {
            for permission in permissions_for(role) {
                assert!(has_permission(Role::SuperAdmin, permission));
            }
        }
    }

    #[test]
    fn only_chairmen_and_admin_validate_applications() {
        let validators: Vec<Role> = Role::ALL
            .into_iter()
            .filter(|&r| has_permission(r, ApplicationsValidate))
            .collect();
        assert_eq!(
            validators,
            vec![
                Role::SuperAdmin,
                Role::FederalChairman,
                Role::RegionalChairman,
                Role::LocalChairman,
                Role::PrimaryChairman
            ]
        );
    }

    #[test]
    fn member_cannot_manage_users() {
        assert!(!has_permission(Role::PrimaryMember, UsersManage));
        assert!(has_permission(Role::PrimaryMember, DocumentsSign));
    }

    #[test]
    fn role_assignment_respects_tiers() {
        assert!(Role::SuperAdmin.can_assign(Role::SuperAdmin));
        assert!(!Role::FederalChairman.can_assign(Role::SuperAdmin));
        assert!(Role::RegionalChairman.can_assign(Role::LocalChairman));
        assert!(!Role::LocalChairman.can_assign(Role::RegionalSecretary));
        assert!(Role::PrimaryChairman.can_assign(Role::PrimaryMember));
    }

    #[test]
    fn permission_names_serialize_as_snake_case() {
        let json = serde_json::to_string(&ApplicationsValidate).unwrap();
        assert_eq!(json, "\"applications_validate\"");
        let json = serde_json::to_string(&Role::RegionalChairman).unwrap();
        assert_eq!(json, "\"REGIONAL_CHAIRMAN\"");
    }

    #[test]
    fn table_covers_every_role() {
        assert_eq!(permission_table().len(), Role::ALL.len());
    }
}
