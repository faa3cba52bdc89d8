pub mod application;
pub mod document;
pub mod message;
pub mod news;
pub mod notification;
pub mod organization;
pub mod session;
pub mod task;
pub mod user;
pub mod workflow;

pub use application::{ApplicationFilter, ApplicationStatus, FeesStatus, MembershipApplication, ReviewCommit};
pub use document::{MembershipDocument, MembershipDocumentStatus};
pub use message::{Message, MessageFolder};
pub use news::News;
pub use notification::{Notification, NotificationKind};
pub use organization::{Organization, OrganizationType};
pub use session::Session;
pub use task::{Task, TaskFilter, TaskStatus};
pub use user::User;
pub use workflow::{
    DocumentParticipant, DocumentSignature, ParticipantStatus, WorkflowDocument, WorkflowDocumentKind,
    WorkflowDocumentStatus,
};
