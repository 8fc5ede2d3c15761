//! Access gating for protected views.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::session::{SessionStore, SessionVerifier};

/// Where a protected-view mount stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Verification is unresolved. The caller renders a neutral loading
    /// indicator - never the protected content and never a redirect.
    Checking,
    /// The session is authenticated; render the protected content.
    Allowed,
    /// The session is not authenticated; a redirect to sign-in was issued.
    Denied,
}

/// Navigation side effects, supplied by the application shell.
pub trait Navigator: Send + Sync {
    /// Navigates to the sign-in view.
    fn redirect_to_sign_in(&self);

    /// Whether the sign-in view is already the current one.
    fn is_on_sign_in(&self) -> bool;
}

/// Per-mount gate for a protected view.
///
/// One `AccessGate` is created per protected-view mount and dropped on
/// unmount. The decision resolves fully before anything protected renders:
/// a mount that finds the session unresolved stays `Checking` until the
/// (coalesced) verification completes, so there is neither a flash of
/// protected content nor a spurious redirect.
///
/// On denial the redirect fires exactly once per gate instance, and never
/// when the shell is already on the sign-in view.
pub struct AccessGate {
    store: Arc<SessionStore>,
    verifier: Arc<SessionVerifier>,
    navigator: Arc<dyn Navigator>,
    decision: Mutex<GateDecision>,
    redirected: AtomicBool,
}

impl AccessGate {
    /// Creates a gate in the `Checking` state.
    pub fn new(
        store: Arc<SessionStore>,
        verifier: Arc<SessionVerifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            store,
            verifier,
            navigator,
            decision: Mutex::new(GateDecision::Checking),
            redirected: AtomicBool::new(false),
        }
    }

    /// The current decision, without advancing the state machine.
    pub fn decision(&self) -> GateDecision {
        *self.decision.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Advances the gate. Called on mount and on every re-render; idempotent
    /// once a terminal decision is reached.
    pub async fn resolve(&self) -> GateDecision {
        match self.decision() {
            GateDecision::Allowed => return GateDecision::Allowed,
            GateDecision::Denied => {
                // Re-render after denial: the redirect guard keeps this from
                // navigating again.
                self.redirect_once();
                return GateDecision::Denied;
            }
            GateDecision::Checking => {}
        }

        // Fast path: a confirmed session needs no re-verification.
        if self.store.session().is_authenticated() {
            self.set_decision(GateDecision::Allowed);
            return GateDecision::Allowed;
        }

        let outcome = self.verifier.verify().await;
        if outcome.is_authenticated() {
            self.set_decision(GateDecision::Allowed);
            GateDecision::Allowed
        } else {
            self.set_decision(GateDecision::Denied);
            self.redirect_once();
            GateDecision::Denied
        }
    }

    fn set_decision(&self, decision: GateDecision) {
        tracing::debug!(?decision, "access gate resolved");
        *self.decision.lock().unwrap_or_else(|e| e.into_inner()) = decision;
    }

    fn redirect_once(&self) {
        if self.redirected.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.navigator.is_on_sign_in() {
            return;
        }
        tracing::info!("access denied, redirecting to sign-in");
        self.navigator.redirect_to_sign_in();
    }
}
