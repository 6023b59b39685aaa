// handlers/mod.rs - route handlers
//
// factory: the generic collection operations every resource reuses
// tours, reviews, users: per-resource routing, scopes and joins
// auth: signup, signin and the password flows (mounted under /users)
// system: service info, health and the unmatched-route fallback
pub mod auth;
pub mod factory;
pub mod reviews;
pub mod system;
pub mod tours;
pub mod users;

pub use factory::{ApiJson, Join};
