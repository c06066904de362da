//! Route-access decisions.
//!
//! `evaluate` is the pure decision function over (session state, claims,
//! requirement); `AccessGuard` is the async wrapper that gathers those inputs
//! from the session store and claims resolver. Denial is a decision, not an
//! error: every denial path redirects, and no guard ever mutates session or
//! resolver state.

use crate::claims::ClaimsResolver;
use crate::session::SessionStore;
use crate::types::{Claims, Principal};

/// What a route declares it needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteRequirement {
    /// Any authenticated principal
    Authenticated,
    /// Claims with a non-empty tenant and a role in this set.
    /// Role comparison is ASCII case-insensitive.
    RoleInSet(Vec<String>),
    /// Principal email (lowercased) exactly matching an allow-listed address
    ExactIdentity(Vec<String>),
}

/// Where a denied navigation is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    SignIn,
    /// Dedicated denial surface for exact-identity routes
    AdminSignIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(RedirectTarget),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

/// Pure decision function. No state, no side effects.
pub fn evaluate(
    principal: Option<&Principal>,
    claims: Option<&Claims>,
    requirement: &RouteRequirement,
) -> GuardDecision {
    match requirement {
        RouteRequirement::Authenticated => {
            if principal.is_some() {
                GuardDecision::Allow
            } else {
                GuardDecision::Redirect(RedirectTarget::SignIn)
            }
        }
        RouteRequirement::RoleInSet(roles) => {
            let Some(claims) = claims else {
                return GuardDecision::Redirect(RedirectTarget::SignIn);
            };
            // An unresolved tenant always denies, regardless of role match
            if claims.tenant_id.is_empty() {
                return GuardDecision::Redirect(RedirectTarget::SignIn);
            }
            if roles.iter().any(|r| r.eq_ignore_ascii_case(&claims.role)) {
                GuardDecision::Allow
            } else {
                GuardDecision::Redirect(RedirectTarget::SignIn)
            }
        }
        RouteRequirement::ExactIdentity(allowlist) => {
            let email = principal
                .map(|p| p.email.to_lowercase())
                .unwrap_or_default();
            if !email.is_empty() && allowlist.iter().any(|a| a.to_lowercase() == email) {
                GuardDecision::Allow
            } else {
                GuardDecision::Redirect(RedirectTarget::AdminSignIn)
            }
        }
    }
}

/// Async guard used by route-activation hooks. Suspends at session
/// restoration and claims resolution; a claims timeout becomes a redirect,
/// never an error surfaced to the caller.
#[derive(Clone)]
pub struct AccessGuard {
    session: SessionStore,
    resolver: ClaimsResolver,
}

impl AccessGuard {
    pub fn new(session: SessionStore, resolver: ClaimsResolver) -> Self {
        Self { session, resolver }
    }

    pub async fn check(&self, requirement: &RouteRequirement) -> GuardDecision {
        let (principal, claims) = match requirement {
            // Role guards suspend only at get_claims(), whose timeout bounds
            // the whole wait (session restoration included)
            RouteRequirement::RoleInSet(_) => {
                let claims = match self.resolver.get_claims().await {
                    Ok(claims) => Some(claims),
                    Err(e) => {
                        tracing::warn!("claims unavailable for role guard, denying: {}", e);
                        None
                    }
                };
                (self.session.current_principal(), claims)
            }
            _ => (self.session.wait_for_ready().await, self.resolver.cached()),
        };

        let decision = evaluate(principal.as_ref(), claims.as_ref(), requirement);
        if let GuardDecision::Redirect(target) = decision {
            tracing::debug!(
                principal_id = principal.as_ref().map(|p| p.id.as_str()).unwrap_or("none"),
                ?requirement,
                ?target,
                "route access denied"
            );
        }
        decision
    }
}
