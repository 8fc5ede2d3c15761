//! Classdeck core domain layer.
//!
//! This crate holds the client-side session-and-request-coordination logic
//! of the Classdeck application:
//!
//! - [`session`]: the authentication session state machine, its persistence
//!   seam, and the single-flight session verifier
//! - [`auth`]: the contract with the external authentication service
//! - [`fetch`]: request coalescing for logical resources
//! - [`view`]: the access gate for protected views and the fault-isolating
//!   lazy view loader
//!
//! All I/O happens behind traits (`SessionRepository`, `AuthService`,
//! `Navigator`, `ViewSource`, `BundleCache`) implemented by the
//! infrastructure crate or by the application shell.

pub mod auth;
pub mod config;
pub mod error;
pub mod fetch;
pub mod session;
pub mod view;

// Re-export common error type
pub use error::{ClassdeckError, Result};
