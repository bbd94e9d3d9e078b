//! HTTP API handlers for nap-audit
//!
//! The HTTP face of the trigger adapter: a scheduler (or an operator) hits
//! `/audit/run`, the run executes inline, and the summary is the response.

pub mod audit;
pub mod health;

pub use audit::audit_routes;
pub use health::health_routes;
