pub mod auth;
pub mod context;
pub mod response;

pub use auth::{authorize_request, AccessRequest, AuthRejection, AuthSettings, Authorizer, Identity};
pub use context::{AuthContext, ANONYMOUS_ROLE};
pub use response::{ApiResponse, ApiResult};
