/// Router Module Index
///
/// Organizes the routing surface into security-segregated modules so that
/// access control is applied explicitly at the module level via Axum layers.
///
/// Routes accessible to any client. Read handlers resolve an optional actor
/// per request and apply visibility rules inside the core.
pub mod public;

/// Routes protected by the `Actor` extractor middleware: every post and
/// comment mutation requires a resolved identity.
pub mod authenticated;
