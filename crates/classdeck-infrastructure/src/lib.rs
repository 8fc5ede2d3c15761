//! Classdeck infrastructure adapters.
//!
//! Concrete implementations of the core crate's trait seams:
//!
//! - [`JsonFileSessionRepository`]: the durable session record as a single
//!   namespaced JSON file
//! - [`InMemorySessionRepository`]: ephemeral storage for tests and
//!   private-browsing profiles
//! - [`HttpAuthClient`]: the authentication service over HTTP

mod http_auth_client;
mod json_session_repository;
mod memory_session_repository;

pub use http_auth_client::HttpAuthClient;
pub use json_session_repository::JsonFileSessionRepository;
pub use memory_session_repository::InMemorySessionRepository;
