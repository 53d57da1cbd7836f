//! Country-based access decisions and the HTTP endpoint exposing them

pub mod client_ip;
pub mod decision;
pub mod handlers;
pub mod routes;

pub use client_ip::extract_client_ip;
pub use decision::{decide, Decision, DenyReason, Policy};
pub use handlers::AuthzState;
pub use routes::create_authz_router;
