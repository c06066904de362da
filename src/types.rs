/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Role assigned to a tenant administrator when an elevation request is approved
pub const ROLE_PRINCIPAL: &str = "PRINCIPAL";

/// Collection holding persisted tenant profiles in the profile store
pub const PROFILES_COLLECTION: &str = "users";

/// An authenticated actor as reported by the external session provider.
///
/// The core never constructs one of these on its own - it only observes what
/// the provider emits between sign-in and sign-out. An empty `email` means the
/// provider did not report one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub session_verified: bool,
}

/// Resolved authorization attributes for a principal.
///
/// Treated as an immutable snapshot: consumers never mutate claims in place,
/// the resolver replaces the whole value on refresh. An empty `tenant_id`
/// means "not yet assigned / not provisioned".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub principal_id: String,
    pub email: String,
    pub tenant_id: String,
    pub role: String,
    pub class_id: String,
    pub class_ids: Vec<String>,
}

/// Attributes carried on the provider's short-lived signed token.
/// Every field is optional - tokens for freshly provisioned principals
/// typically carry none of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAttributes {
    pub tenant_id: Option<String>,
    pub role: Option<String>,
    pub class_id: Option<String>,
    pub class_ids: Option<Vec<String>>,
}
