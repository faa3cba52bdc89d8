use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use uuid::Uuid;

use crate::database::models::{ApplicationFilter, ApplicationStatus, FeesStatus, OrganizationType};
use crate::database::store::Store;
use crate::permissions::Permission;
use crate::services::access::AccessContext;
use crate::services::error::ServiceResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub draft: u64,
    pub pending_validation: u64,
    pub approved: u64,
    pub rejected: u64,
}

impl StatusCounts {
    fn add(&mut self, status: ApplicationStatus) {
        match status {
            ApplicationStatus::Draft => self.draft += 1,
            ApplicationStatus::PendingValidation => self.pending_validation += 1,
            ApplicationStatus::Approved => self.approved += 1,
            ApplicationStatus::Rejected => self.rejected += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MembershipFigures {
    pub members: u64,
    pub applications: StatusCounts,
    pub fees_paid: u64,
    pub fees_not_paid: u64,
}

impl MembershipFigures {
    fn absorb(&mut self, other: &MembershipFigures) {
        self.members += other.members;
        self.applications.draft += other.applications.draft;
        self.applications.pending_validation += other.applications.pending_validation;
        self.applications.approved += other.applications.approved;
        self.applications.rejected += other.applications.rejected;
        self.fees_paid += other.fees_paid;
        self.fees_not_paid += other.fees_not_paid;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationReport {
    pub organization_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub org_type: OrganizationType,
    #[serde(flatten)]
    pub figures: MembershipFigures,
}

#[derive(Debug, Clone, Serialize)]
pub struct MembershipReport {
    pub organizations: Vec<OrganizationReport>,
    pub totals: MembershipFigures,
}

pub struct ReportService<'a> {
    store: &'a dyn Store,
}

impl<'a> ReportService<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Per-organization membership figures for the caller's scope, or for
    /// the subtree under `organization_id` when given.
    pub async fn membership(&self, ctx: &AccessContext, organization_id: Option<Uuid>) -> ServiceResult<MembershipReport> {
        ctx.require(Permission::ReportsView)?;
        let ids: BTreeSet<Uuid> = match organization_id {
            Some(root) => {
                ctx.require_scope(root)?;
                ctx.tree.scope_of(root)
            }
            None => match ctx.scope.org_ids() {
                Some(ids) => ids.into_iter().collect(),
                None => ctx.tree.organizations().map(|o| o.id).collect(),
            },
        };
        let id_list: Vec<Uuid> = ids.iter().copied().collect();

        let mut figures: HashMap<Uuid, MembershipFigures> = HashMap::new();
        for user in self.store.list_users(Some(&id_list)).await? {
            if let (true, Some(org)) = (user.is_active, user.organization_id) {
                figures.entry(org).or_default().members += 1;
            }
        }
        let applications = self
            .store
            .list_applications(&ApplicationFilter {
                organization_ids: Some(id_list),
                ..Default::default()
            })
            .await?;
        for application in applications {
            let entry = figures.entry(application.organization_id).or_default();
            entry.applications.add(application.status);
            match application.fees_status {
                FeesStatus::Paid => entry.fees_paid += 1,
                FeesStatus::NotPaid => entry.fees_not_paid += 1,
            }
        }

        let mut totals = MembershipFigures::default();
        let mut organizations: Vec<OrganizationReport> = ids
            .iter()
            .filter_map(|&id| ctx.tree.get(id))
            .map(|org| {
                let figures = figures.remove(&org.id).unwrap_or_default();
                totals.absorb(&figures);
                OrganizationReport {
                    organization_id: org.id,
                    name: org.name.clone(),
                    org_type: org.org_type,
                    figures,
                }
            })
            .collect();
        organizations.sort_by(|a, b| a.org_type.rank().cmp(&b.org_type.rank()).then_with(|| a.name.cmp(&b.name)));

        Ok(MembershipReport { organizations, totals })
    }
}
