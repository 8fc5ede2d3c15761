//! Fault-isolating lazy view loading.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;

use crate::view::ViewKind;

/// Failure reported by a [`ViewSource`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The view's code artifact is no longer available, typically because a
    /// deployment replaced the bundle the running shell still references.
    #[error("view chunk missing: {detail}")]
    ChunkMissing { detail: String },

    /// Any other fetch failure.
    #[error("view source unavailable: {0}")]
    Unavailable(String),
}

/// A fetched view: the code artifact plus its render entry point.
pub struct ViewChunk {
    render: Box<dyn Fn() -> String + Send + Sync>,
}

impl ViewChunk {
    /// Wraps a render entry point.
    pub fn new(render: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self {
            render: Box::new(render),
        }
    }
}

/// A successfully rendered view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedView {
    pub kind: ViewKind,
    pub markup: String,
}

/// A load failure, classified for recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    /// The code artifact vanished (stale bundle). Retrying also invalidates
    /// local caches that may hold the stale artifact reference.
    StaleBundle { detail: String },
    /// Anything else: fetch faults, render errors, render panics.
    Other(String),
}

impl LoadFailure {
    /// True for the stale-bundle classification.
    pub fn is_stale_bundle(&self) -> bool {
        matches!(self, Self::StaleBundle { .. })
    }

    /// The remediation message to surface to the user.
    pub fn message(&self) -> String {
        match self {
            Self::StaleBundle { .. } => {
                "Classdeck was updated since this page was opened. Retry to load the latest version."
                    .to_string()
            }
            Self::Other(detail) => format!("This view failed to load: {detail}"),
        }
    }
}

/// Load lifecycle of one mounted lazy view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewLoadState {
    #[default]
    Idle,
    /// The code fetch is underway; the caller shows a neutral loading
    /// indicator.
    Loading,
    Ready(RenderedView),
    Failed(LoadFailure),
}

/// Fetches a view's code and rendering logic on demand.
#[async_trait]
pub trait ViewSource: Send + Sync {
    async fn fetch(&self, kind: ViewKind) -> Result<ViewChunk, SourceError>;
}

/// Local caches that may hold stale artifact references.
pub trait BundleCache: Send + Sync {
    fn invalidate(&self, kind: ViewKind);
}

/// Loads one view on demand, isolating its faults from the shell.
///
/// Created per mounted lazy view, dropped on unmount. Any error or panic
/// during loading or rendering becomes a [`ViewLoadState::Failed`] the shell
/// renders as a fallback notice; the application keeps running. The attempt
/// counter serves as the forced-remount key: a retry discards the failed
/// instance entirely and starts a fresh load with no state carried over.
pub struct ViewLoader {
    kind: ViewKind,
    source: Arc<dyn ViewSource>,
    cache: Arc<dyn BundleCache>,
    state: Mutex<ViewLoadState>,
    attempt: AtomicU32,
}

impl ViewLoader {
    /// Creates an idle loader for the given view.
    pub fn new(kind: ViewKind, source: Arc<dyn ViewSource>, cache: Arc<dyn BundleCache>) -> Self {
        Self {
            kind,
            source,
            cache,
            state: Mutex::new(ViewLoadState::Idle),
            attempt: AtomicU32::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ViewLoadState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The current load state.
    pub fn state(&self) -> ViewLoadState {
        self.lock().clone()
    }

    /// The remount key: how many retries have been issued.
    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::SeqCst)
    }

    /// Runs the load. Single-flight per mount: a call while a fetch is
    /// already underway (or the view is ready) returns without starting a
    /// second one.
    pub async fn load(&self) -> ViewLoadState {
        {
            let mut state = self.lock();
            match *state {
                ViewLoadState::Loading | ViewLoadState::Ready(_) | ViewLoadState::Failed(_) => {
                    return state.clone();
                }
                ViewLoadState::Idle => *state = ViewLoadState::Loading,
            }
        }

        let next = self.fetch_and_render().await;
        if let ViewLoadState::Failed(failure) = &next {
            tracing::warn!(kind = %self.kind, failure = %failure.message(), "view load failed");
        }
        let mut state = self.lock();
        *state = next.clone();
        next
    }

    /// Discards a failed attempt and arms a fresh load.
    ///
    /// Acts only when the state is `Failed`: a retry issued while a fetch is
    /// still underway, or after the view is ready, leaves the state alone
    /// and returns the current remount key. Otherwise a mid-fetch retry
    /// would start a second concurrent fetch whose late sibling clobbers the
    /// state.
    ///
    /// For stale-bundle failures the local artifact cache is invalidated
    /// first, so the fresh attempt cannot resolve the same dead reference.
    /// Returns the remount key.
    pub fn retry(&self) -> u32 {
        let mut state = self.lock();
        let ViewLoadState::Failed(failure) = &*state else {
            return self.attempt.load(Ordering::SeqCst);
        };
        if failure.is_stale_bundle() {
            tracing::info!(kind = %self.kind, "invalidating stale bundle before retry");
            self.cache.invalidate(self.kind);
        }
        *state = ViewLoadState::Idle;
        drop(state);
        self.attempt.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn fetch_and_render(&self) -> ViewLoadState {
        let fetched = AssertUnwindSafe(self.source.fetch(self.kind))
            .catch_unwind()
            .await;
        match fetched {
            Err(payload) => ViewLoadState::Failed(LoadFailure::Other(panic_message(payload))),
            Ok(Err(SourceError::ChunkMissing { detail })) => {
                ViewLoadState::Failed(LoadFailure::StaleBundle { detail })
            }
            Ok(Err(SourceError::Unavailable(detail))) => {
                ViewLoadState::Failed(LoadFailure::Other(detail))
            }
            Ok(Ok(chunk)) => {
                // The render entry point is foreign code; contain its panics.
                match panic::catch_unwind(AssertUnwindSafe(|| (chunk.render)())) {
                    Ok(markup) => ViewLoadState::Ready(RenderedView {
                        kind: self.kind,
                        markup,
                    }),
                    Err(payload) => {
                        ViewLoadState::Failed(LoadFailure::Other(panic_message(payload)))
                    }
                }
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "view panicked".to_string()
    }
}
