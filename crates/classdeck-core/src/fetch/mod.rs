//! Request coalescing for logical resources.
//!
//! # Module Structure
//!
//! - `key`: the closed operation and resource-key enums and their mapping
//! - `coalescer`: the per-key admit/complete guard (`RequestCoalescer`)

mod coalescer;
mod key;

pub use coalescer::{Admission, RequestCoalescer};
pub use key::{FetchOperation, ResourceKey};
