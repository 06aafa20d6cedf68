pub mod auth;
pub mod response;

pub use auth::{jwt_auth_middleware, require_admin_middleware};
pub use response::{respond, respond_with, ApiResponse, ApiResult};
