/// Router Module Index
///
/// Splits the HTTP surface by how the session gate applies to it.

/// Routes reachable without a session: health, navigation decisions, login.
pub mod public;

/// Routes that act on the caller's current session.
pub mod session;

/// Portal pages. Every request passes through the gate middleware first.
pub mod portal;
