pub mod auth;
pub mod errors;
pub mod rate_limit;
pub mod response;
pub mod security_headers;

pub use auth::{authenticated, guarded, protect, restrict_to, Principal};
pub use errors::error_responder;
pub use rate_limit::{rate_limit, RateLimit};
pub use response::{ApiResponse, ApiResult};
pub use security_headers::apply_security_headers;
