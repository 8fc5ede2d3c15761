//! Session domain module.
//!
//! Contains the authentication session state machine, its persistence seam,
//! and the single-flight session verifier.
//!
//! # Module Structure
//!
//! - `model`: session domain models (`Session`, `SessionStatus`,
//!   `UserIdentity`, `AuthToken`, `PersistedSession`)
//! - `store`: the session state machine (`SessionStore`)
//! - `repository`: repository trait for durable session persistence
//! - `verifier`: asynchronous token verification (`SessionVerifier`)

mod model;
mod repository;
mod store;
mod verifier;

// Re-export public API
pub use model::{AuthToken, PersistedSession, Session, SessionStatus, UserIdentity, UserRole};
pub use repository::SessionRepository;
pub use store::SessionStore;
pub use verifier::{SessionVerifier, VerifyOutcome};
