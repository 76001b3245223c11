//! Router Module Index
//!
//! Routing is split by access level so each group gets its access control
//! applied once, as a layer, instead of per handler.

/// Anonymous routes, plus the rate-limited credential endpoints.
pub mod public;

/// Routes behind `auth_middleware`.
pub mod authenticated;

/// Routes behind `admin_middleware`, nested under `/admin`.
pub mod admin;
