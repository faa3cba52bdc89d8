use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Level of an organization in the union hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "organization_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrganizationType {
    Federal,
    Regional,
    Local,
    Primary,
}

impl OrganizationType {
    /// Depth rank; a child never ranks above its parent.
    pub fn rank(self) -> u8 {
        match self {
            OrganizationType::Federal => 0,
            OrganizationType::Regional => 1,
            OrganizationType::Local => 2,
            OrganizationType::Primary => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub org_type: OrganizationType,
    pub parent_id: Option<Uuid>,
    pub chairman_id: Option<Uuid>,
    pub chairman_name: Option<String>,
    pub is_active: bool,
    pub members_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: impl Into<String>, org_type: OrganizationType, parent_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            org_type,
            parent_id,
            chairman_id: None,
            chairman_name: None,
            is_active: true,
            members_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
