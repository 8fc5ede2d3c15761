//! Protected-view access gating and on-demand view loading.
//!
//! # Module Structure
//!
//! - `gate`: per-mount access decision (`AccessGate`, `Navigator`)
//! - `loader`: fault-isolating lazy view loader (`ViewLoader`)

mod gate;
mod loader;

pub use gate::{AccessGate, GateDecision, Navigator};
pub use loader::{
    BundleCache, LoadFailure, RenderedView, SourceError, ViewChunk, ViewLoadState, ViewLoader,
    ViewSource,
};

use serde::{Deserialize, Serialize};
use strum::Display;

/// The closed set of lazily loaded views in the application shell.
///
/// Rendering dispatch is a match over this tag, never a chain of
/// conditionals over strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ViewKind {
    Dashboard,
    Students,
    Teachers,
    Courses,
    Enrollments,
}
