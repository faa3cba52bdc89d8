// handlers/protected/mod.rs - Handlers that require a session
//
// Every handler takes `CurrentUser` or `Access`; both reject with 401 when
// the session middleware found no active user.

pub mod applications;
pub mod auth;
pub mod documents;
pub mod messages;
pub mod news;
pub mod notifications;
pub mod organizations;
pub mod reports;
pub mod tasks;
pub mod users;
