use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "application_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Draft,
    PendingValidation,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Approved | ApplicationStatus::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "fees_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeesStatus {
    Paid,
    NotPaid,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MembershipApplication {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub email: String,
    pub phone: Option<String>,
    pub workplace: Option<String>,
    pub position: Option<String>,
    pub organization_id: Uuid,
    pub user_id: Option<Uuid>,
    pub status: ApplicationStatus,
    pub fees_status: FeesStatus,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MembershipApplication {
    pub fn full_name(&self) -> String {
        match &self.middle_name {
            Some(middle) if !middle.is_empty() => {
                format!("{} {} {}", self.last_name, self.first_name, middle)
            }
            _ => format!("{} {}", self.last_name, self.first_name),
        }
    }
}

/// Listing criteria; every populated field narrows the result.
#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub organization_ids: Option<Vec<Uuid>>,
    pub user_id: Option<Uuid>,
    pub status: Option<ApplicationStatus>,
}

/// Everything a status transition writes, committed as one unit by the
/// store.
///
/// The store applies it only while the application is still in
/// `expected` status and reports whether it did.
#[derive(Debug, Clone)]
pub struct ReviewCommit {
    pub application: MembershipApplication,
    pub expected: ApplicationStatus,
    pub provisioned_user: Option<User>,
    pub validated_user_id: Option<Uuid>,
    pub increment_members: bool,
}
