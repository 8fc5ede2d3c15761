//! Authentication service contract.

mod service;

pub use service::{AuthFailure, AuthService, AuthSuccess, Credentials};
