pub mod auth;
pub mod extract;
pub mod response;

pub use auth::{session_auth_middleware, Access, CurrentUser, SessionToken};
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use response::{ApiResponse, ApiResult};
