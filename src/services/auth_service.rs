//! Sign-in with approval gating.
//!
//! The session provider owns credentials; this service adds the console's
//! policy on top: a principal whose persisted profile is missing or not yet
//! approved is signed straight back out. Allow-listed admin emails bypass
//! the check entirely.

use std::sync::Arc;

use serde_json::Value;

use crate::config;
use crate::provider::{ProfileStore, ProviderError, SessionProvider, StoreError};
use crate::types::{Principal, PROFILES_COLLECTION};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("sign-in failed: {0}")]
    SignIn(#[source] ProviderError),
    #[error("account is pending approval")]
    PendingApproval,
    #[error("approval check failed: {0}")]
    ApprovalCheck(#[source] StoreError),
}

#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn SessionProvider>,
    profiles: Arc<dyn ProfileStore>,
    admin_allowlist: Vec<String>,
}

impl AuthService {
    pub fn new(provider: Arc<dyn SessionProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            provider,
            profiles,
            admin_allowlist: config::config().access.admin_allowlist.clone(),
        }
    }

    pub fn with_admin_allowlist(mut self, allowlist: Vec<String>) -> Self {
        self.admin_allowlist = allowlist;
        self
    }

    /// Sign in and enforce the approval gate. A missing or unapproved
    /// profile signs the provider back out and fails with PendingApproval.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let principal = self
            .provider
            .sign_in(email, password)
            .await
            .map_err(AuthError::SignIn)?;

        // Admin bypass: allow-listed emails skip the approval gate
        let email_lower = email.trim().to_lowercase();
        if self
            .admin_allowlist
            .iter()
            .any(|a| a.to_lowercase() == email_lower)
        {
            tracing::debug!(principal_id = %principal.id, "admin sign-in, approval gate bypassed");
            return Ok(principal);
        }

        match self.profiles.get(PROFILES_COLLECTION, &principal.id).await {
            Ok(doc) if doc.get("approved").and_then(Value::as_bool) == Some(true) => Ok(principal),
            Ok(_) => {
                tracing::info!(principal_id = %principal.id, "unapproved profile, signing back out");
                self.sign_out_quietly().await;
                Err(AuthError::PendingApproval)
            }
            Err(e) if e.is_not_found() => {
                tracing::info!(principal_id = %principal.id, "no profile yet, signing back out");
                self.sign_out_quietly().await;
                Err(AuthError::PendingApproval)
            }
            Err(e) => {
                self.sign_out_quietly().await;
                Err(AuthError::ApprovalCheck(e))
            }
        }
    }

    pub async fn sign_out(&self) -> Result<(), ProviderError> {
        self.provider.sign_out().await
    }

    async fn sign_out_quietly(&self) {
        if let Err(e) = self.provider.sign_out().await {
            tracing::warn!("sign-out after denied sign-in failed: {}", e);
        }
    }
}
