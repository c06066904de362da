//! Trait seams for the external collaborators the core consumes but does not
//! implement: the session provider (authentication), the profile store
//! (persisted tenant profiles), and the request store (elevation requests).

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::types::{Principal, TokenAttributes};

/// Keyed document as stored by the backing document store
pub type Document = Map<String, Value>;

/// Listener invoked on every session transition, including the initial
/// restoration event (which may carry no principal)
pub type SessionListener = Box<dyn Fn(Option<Principal>) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    #[error("token attribute fetch failed: {0}")]
    TokenFetch(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// External authentication provider. Owns credentials, session persistence,
/// and token issuance; the core only observes its transitions.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Register a listener fired on every session transition. The provider
    /// must fire it once for the initial restoration, even when no stored
    /// session exists.
    fn on_change(&self, listener: SessionListener);

    /// Fetch the attributes carried on the principal's signed token.
    /// `force_refresh` bypasses any locally-cached stale copy.
    async fn get_token_attributes(
        &self,
        principal: &Principal,
        force_refresh: bool,
    ) -> Result<TokenAttributes, ProviderError>;
}

/// Keyed document store holding persisted tenant profiles
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch a document. A missing document is `StoreError::NotFound`,
    /// distinct from a backend failure.
    async fn get(&self, collection: &str, id: &str) -> Result<Document, StoreError>;

    /// Create or update a document. With `merge_existing` the given fields
    /// are merged over any existing document instead of replacing it.
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
        merge_existing: bool,
    ) -> Result<(), StoreError>;

    async fn query(
        &self,
        collection: &str,
        equality_filters: &[(String, Value)],
    ) -> Result<Vec<Document>, StoreError>;

    async fn count(
        &self,
        collection: &str,
        equality_filters: &[(String, Value)],
    ) -> Result<i64, StoreError>;
}

/// Append-oriented store for elevation requests
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Insert a new request document, returning its assigned id
    async fn insert(&self, fields: Document) -> Result<String, StoreError>;

    /// Merge fields into an existing request document
    async fn update(&self, id: &str, fields: Document) -> Result<(), StoreError>;

    /// All request documents with their ids, in storage order
    async fn list_all(&self) -> Result<Vec<(String, Document)>, StoreError>;
}
