//! Claims resolution.
//!
//! Authorization attributes arrive from two independently-sourced places: the
//! provider's short-lived signed token and the longer-lived persisted tenant
//! profile. The resolver merges them into one `Claims` snapshot, caches it
//! for the session, and guarantees at most one in-flight backend load no
//! matter how many callers ask concurrently.

pub mod merge;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use crate::config;
use crate::provider::{ProfileStore, SessionProvider};
use crate::session::SessionStore;
use crate::types::{Claims, Principal, TokenAttributes, PROFILES_COLLECTION};

use merge::{merge_attributes, AttributeSet};

#[derive(Debug, thiserror::Error)]
pub enum ClaimsError {
    #[error("claims resolution requested for a principal without an id")]
    InvalidPrincipal,
    #[error("no claims resolved within {0:?}")]
    Timeout(Duration),
}

struct Inner {
    session: SessionStore,
    provider: Arc<dyn SessionProvider>,
    profiles: Arc<dyn ProfileStore>,
    force_token_refresh: bool,
    /// Cache and publication channel in one: `Some` holds the claims for the
    /// current session, `None` means unresolved / invalidated.
    published: watch::Sender<Option<Claims>>,
    /// Single-flight slot: whoever holds it performs the backend load.
    /// Everyone else queues here and re-checks the cache on wake.
    load_slot: Mutex<()>,
}

/// Resolves and caches authorization claims for the current session.
/// Cheap to clone; all clones share the cache and single-flight slot.
#[derive(Clone)]
pub struct ClaimsResolver {
    inner: Arc<Inner>,
    /// Default bound for get_claims(). Per-handle so call sites needing a
    /// different bound can clone and adjust without touching shared state.
    resolve_timeout: Duration,
}

impl ClaimsResolver {
    pub fn new(
        session: SessionStore,
        provider: Arc<dyn SessionProvider>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        let cfg = &config::config().claims;
        let (published, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                session,
                provider,
                profiles,
                force_token_refresh: cfg.force_token_refresh,
                published,
                load_slot: Mutex::new(()),
            }),
            resolve_timeout: cfg.resolve_timeout(),
        }
    }

    /// Handle with a different get_claims() bound; shares cache and
    /// single-flight state with the original
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    /// Keep the cache in step with session transitions: sign-out clears it,
    /// a fresh principal is resolved eagerly so guards usually find a warm
    /// cache. Must be called from within a tokio runtime.
    pub fn connect(&self, provider: &dyn SessionProvider) {
        let resolver = self.clone();
        provider.on_change(Box::new(move |principal| {
            resolver.invalidate();
            if let Some(principal) = principal {
                let resolver = resolver.clone();
                tokio::spawn(async move {
                    if let Err(e) = resolver.resolve(&principal).await {
                        tracing::error!("eager claims resolution failed: {}", e);
                    }
                });
            }
        }));
    }

    /// The cached claims, if a resolution has completed for this session
    pub fn cached(&self) -> Option<Claims> {
        self.inner.published.borrow().clone()
    }

    /// Receiver notified exactly once per resolution (and on invalidation)
    pub fn subscribe(&self) -> watch::Receiver<Option<Claims>> {
        self.inner.published.subscribe()
    }

    /// Clear the cache. Called on sign-out; the next resolve starts fresh.
    pub fn invalidate(&self) {
        let _ = self.inner.published.send(None);
    }

    /// Resolve claims for `principal`, returning the cached value without any
    /// backend access when one exists. Concurrent callers share a single
    /// backend load and all observe the identical merged value.
    pub async fn resolve(&self, principal: &Principal) -> Result<Claims, ClaimsError> {
        if principal.id.is_empty() {
            return Err(ClaimsError::InvalidPrincipal);
        }

        if let Some(claims) = self.cached() {
            return Ok(claims);
        }

        let _slot = self.inner.load_slot.lock().await;

        // A load that finished while we queued already published for us
        if let Some(claims) = self.cached() {
            return Ok(claims);
        }

        let claims = self.load(principal).await;
        // Exactly one publication per resolution
        let _ = self.inner.published.send(Some(claims.clone()));
        Ok(claims)
    }

    /// Cached claims immediately if populated; otherwise trigger (or join)
    /// a resolution and await the first published value, bounded by the
    /// default timeout.
    pub async fn get_claims(&self) -> Result<Claims, ClaimsError> {
        self.get_claims_within(self.resolve_timeout).await
    }

    /// get_claims() with a per-caller bound
    pub async fn get_claims_within(&self, bound: Duration) -> Result<Claims, ClaimsError> {
        if let Some(claims) = self.cached() {
            return Ok(claims);
        }

        tokio::time::timeout(bound, self.await_first_claims())
            .await
            .map_err(|_| ClaimsError::Timeout(bound))?
    }

    async fn await_first_claims(&self) -> Result<Claims, ClaimsError> {
        // Session restoration must complete before we know whose claims to
        // load. Unbounded here; the caller's timeout covers the whole wait.
        if let Some(principal) = self.inner.session.wait_for_ready().await {
            return self.resolve(&principal).await;
        }

        // No principal: wait for a resolution published by a later sign-in
        let mut rx = self.inner.published.subscribe();
        loop {
            if let Some(claims) = rx.borrow().clone() {
                return Ok(claims);
            }
            if rx.changed().await.is_err() {
                // Sender dropped without ever publishing; the caller's bound
                // turns this into a timeout
                std::future::pending::<()>().await;
            }
        }
    }

    /// The backend load proper: token attributes plus persisted profile,
    /// merged token-wins. Runs under the single-flight slot only.
    ///
    /// Degrades rather than fails: a token fetch error falls back to
    /// persisted-only values, a profile lookup error (as opposed to a
    /// missing profile) falls back to token-only values.
    async fn load(&self, principal: &Principal) -> Claims {
        let token = match self
            .inner
            .provider
            .get_token_attributes(principal, self.inner.force_token_refresh)
            .await
        {
            Ok(attrs) => attrs,
            Err(e) => {
                tracing::warn!(
                    principal_id = %principal.id,
                    "token attribute fetch failed, using persisted values only: {}",
                    e
                );
                TokenAttributes::default()
            }
        };
        let token = AttributeSet::from_token(&token);

        let mut email = principal.email.clone();

        let persisted = match self
            .inner
            .profiles
            .get(PROFILES_COLLECTION, &principal.id)
            .await
        {
            Ok(doc) => {
                if email.is_empty() {
                    email = doc
                        .get("email")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                }
                AttributeSet::from_profile(&doc)
            }
            Err(e) if e.is_not_found() => {
                // No profile yet: token values stand on their own, with
                // tenant/role left empty for unprovisioned principals
                AttributeSet::default()
            }
            Err(e) => {
                tracing::error!(
                    principal_id = %principal.id,
                    "profile lookup failed, publishing token-derived values: {}",
                    e
                );
                AttributeSet::default()
            }
        };

        let merged = merge_attributes(&token, &persisted);
        tracing::debug!(
            principal_id = %principal.id,
            tenant_id = %merged.tenant_id,
            role = %merged.role,
            "claims resolved"
        );

        Claims {
            principal_id: principal.id.clone(),
            email,
            tenant_id: merged.tenant_id,
            role: merged.role,
            class_id: merged.class_id,
            class_ids: merged.class_ids,
        }
    }
}
