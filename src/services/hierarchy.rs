//! Organization hierarchy resolver.
//!
//! Organizations form a forest through `parent_id`. The tree is built once
//! per request from a single organization listing and answers every scope
//! question for that request.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use serde::Serialize;
use uuid::Uuid;

use crate::database::models::Organization;

#[derive(Debug, Clone, Default)]
pub struct OrgTree {
    organizations: HashMap<Uuid, Organization>,
    children: HashMap<Uuid, Vec<Uuid>>,
}

/// Nested view served by `GET /api/organizations/tree`
#[derive(Debug, Clone, Serialize)]
pub struct OrgNode {
    #[serde(flatten)]
    pub organization: Organization,
    pub children: Vec<OrgNode>,
}

impl OrgTree {
    pub fn from_organizations(organizations: &[Organization]) -> Self {
        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for org in organizations {
            if let Some(parent) = org.parent_id {
                children.entry(parent).or_default().push(org.id);
            }
        }
        for ids in children.values_mut() {
            ids.sort();
        }

        Self {
            organizations: organizations.iter().map(|o| (o.id, o.clone())).collect(),
            children,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&Organization> {
        self.organizations.get(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.organizations.contains_key(&id)
    }

    pub fn children_of(&self, id: Uuid) -> &[Uuid] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn organizations(&self) -> impl Iterator<Item = &Organization> {
        self.organizations.values()
    }

    /// Breadth-first closure over parent → child links, excluding `root`.
    ///
    /// `depth` bounds how many levels below `root` are walked; `None` walks
    /// the whole subtree. A visited set keeps malformed (cyclic) data from
    /// looping.
    pub fn descendant_org_ids(&self, root: Uuid, depth: Option<usize>) -> BTreeSet<Uuid> {
        let mut found = BTreeSet::new();
        let mut visited = HashSet::from([root]);
        let mut queue = VecDeque::from([(root, 0usize)]);

        while let Some((id, level)) = queue.pop_front() {
            if depth.map_or(false, |max| level >= max) {
                continue;
            }
            for &child in self.children_of(id) {
                if visited.insert(child) {
                    found.insert(child);
                    queue.push_back((child, level + 1));
                }
            }
        }

        found
    }

    /// The organization itself plus everything beneath it. Unknown ids have
    /// an empty scope.
    pub fn scope_of(&self, id: Uuid) -> BTreeSet<Uuid> {
        if !self.contains(id) {
            return BTreeSet::new();
        }
        let mut scope = self.descendant_org_ids(id, None);
        scope.insert(id);
        scope
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestor_ids(&self, id: Uuid) -> Vec<Uuid> {
        let mut ancestors = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.get(id).and_then(|o| o.parent_id);

        while let Some(parent) = current {
            if !seen.insert(parent) {
                break;
            }
            ancestors.push(parent);
            current = self.get(parent).and_then(|o| o.parent_id);
        }

        ancestors
    }

    /// Whether re-parenting `id` under `new_parent` would close a loop.
    pub fn would_create_cycle(&self, id: Uuid, new_parent: Uuid) -> bool {
        id == new_parent || self.descendant_org_ids(id, None).contains(&new_parent)
    }

    /// Roots are organizations without a (known) parent.
    pub fn forest(&self) -> Vec<OrgNode> {
        let mut roots: Vec<&Organization> = self
            .organizations
            .values()
            .filter(|o| o.parent_id.map_or(true, |p| !self.contains(p)))
            .collect();
        roots.sort_by(|a, b| a.name.cmp(&b.name));

        let mut visited = HashSet::new();
        roots
            .into_iter()
            .filter_map(|o| self.build_node(o.id, &mut visited))
            .collect()
    }

    fn build_node(&self, id: Uuid, visited: &mut HashSet<Uuid>) -> Option<OrgNode> {
        if !visited.insert(id) {
            return None;
        }
        let organization = self.get(id)?.clone();
        let mut children: Vec<OrgNode> = self
            .children_of(id)
            .iter()
            .filter_map(|&child| self.build_node(child, visited))
            .collect();
        children.sort_by(|a, b| a.organization.name.cmp(&b.organization.name));
        Some(OrgNode { organization, children })
    }
}
