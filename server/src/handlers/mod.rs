//! Capability handlers behind the HTTP routes.
//!
//! Each handler takes the shared [`AppState`](crate::AppState) explicitly and
//! returns typed results; the routes only translate to and from HTTP.

mod backup;
mod restore;

pub use backup::*;
pub use restore::*;
