//! Session restoration tracking.
//!
//! The external session provider restores any stored session asynchronously
//! after process start. Until its first change event arrives, "who is signed
//! in" is simply unknown - `SessionStore` holds that tri-state (unknown /
//! none / principal) and lets guards suspend until the answer exists.

use std::sync::Arc;
use tokio::sync::watch;

use crate::provider::SessionProvider;
use crate::types::Principal;

/// Snapshot of the session as last reported by the provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// True once the provider has emitted at least one change event
    pub restored: bool,
    pub principal: Option<Principal>,
}

/// Observes the session provider and exposes current state, change
/// subscription, and a one-shot wait-for-first-state primitive.
///
/// This component never calls the provider to sign in or out - it only
/// records what the provider reports. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<SessionState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Register this store as a listener on the provider. The provider fires
    /// the listener for the initial restoration and every later transition.
    pub fn connect(&self, provider: &dyn SessionProvider) {
        let store = self.clone();
        provider.on_change(Box::new(move |principal| store.publish(principal)));
    }

    /// Record a session transition. `None` covers both "restored with no
    /// stored session" and sign-out.
    pub fn publish(&self, principal: Option<Principal>) {
        tracing::debug!(
            principal_id = principal.as_ref().map(|p| p.id.as_str()).unwrap_or("none"),
            "session state changed"
        );
        let _ = self.tx.send(SessionState {
            restored: true,
            principal,
        });
    }

    /// Drop back to the pre-restoration state. Used when a fresh provider
    /// instance takes over and will re-emit its own restoration event.
    pub fn reset(&self) {
        let _ = self.tx.send(SessionState::default());
    }

    /// The last reported principal. May be stale (always `None`) before the
    /// first restoration event - use `wait_for_ready` when that matters.
    pub fn current_principal(&self) -> Option<Principal> {
        self.tx.borrow().principal.clone()
    }

    /// Receiver that yields every state change, including the initial
    /// restoration event even when it carries no principal
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Suspend until the provider has emitted at least one change event,
    /// then return the last known principal. Returns immediately once the
    /// first event has been observed; idempotent across calls.
    ///
    /// No timeout at this layer: a provider that never emits is a contract
    /// violation, and callers needing a bound apply their own.
    pub async fn wait_for_ready(&self) -> Option<Principal> {
        let mut rx = self.tx.subscribe();
        loop {
            let state = rx.borrow().clone();
            if state.restored {
                return state.principal;
            }
            if rx.changed().await.is_err() {
                // Sender dropped without ever restoring
                return None;
            }
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
