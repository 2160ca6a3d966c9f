//! Router Module Index
//!
//! Routing is split by access level so that authentication is applied at the
//! router layer rather than remembered per handler.

/// Routes accessible to anonymous clients: reads, registration and login.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
/// Post mutations additionally pass through the permission gate in the handler.
pub mod authenticated;
