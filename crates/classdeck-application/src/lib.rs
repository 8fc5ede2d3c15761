//! Classdeck application layer.
//!
//! Orchestrates the core session machinery behind a single facade the shell
//! talks to: startup rehydration, the login/sign-out flow, password resets,
//! and gate construction for protected mounts.

mod coordinator;

pub use coordinator::{LoginOutcome, SessionCoordinator};
