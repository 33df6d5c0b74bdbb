//! Route gating: maps request paths to modules and decides access from the
//! tenant's module state.

#![warn(clippy::unwrap_used)]

pub mod access;
pub mod routes;

pub use access::{AccessDecision, AccessEnforcer, Denial, DenialStyle, ADMIN_MODULE};
pub use routes::RouteTable;
