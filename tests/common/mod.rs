//! In-memory fakes for the three external collaborators, shared across the
//! integration test binaries.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use campus_core::provider::{
    Document, ProfileStore, ProviderError, RequestStore, SessionListener, SessionProvider,
    StoreError,
};
use campus_core::types::{Principal, TokenAttributes};

/// Install the test subscriber once per binary; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn principal(id: &str, email: &str) -> Principal {
    Principal {
        id: id.to_string(),
        email: email.to_string(),
        session_verified: true,
    }
}

/// Scripted session provider: accounts for sign-in, configurable token
/// attributes, fault injection, and call counting.
#[derive(Default)]
pub struct FakeSessionProvider {
    listeners: Mutex<Vec<SessionListener>>,
    /// email (lowercased) -> (password, principal)
    accounts: Mutex<HashMap<String, (String, Principal)>>,
    token_attrs: Mutex<TokenAttributes>,
    token_delay: Mutex<Duration>,
    pub token_fetches: AtomicUsize,
    pub fail_token_fetch: AtomicBool,
    pub sign_outs: AtomicUsize,
}

impl FakeSessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, email: &str, password: &str, principal: Principal) {
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_lowercase(), (password.to_string(), principal));
    }

    pub fn set_token_attributes(&self, attrs: TokenAttributes) {
        *self.token_attrs.lock().unwrap() = attrs;
    }

    /// Widen the single-flight window for concurrency tests
    pub fn set_token_delay(&self, delay: Duration) {
        *self.token_delay.lock().unwrap() = delay;
    }

    /// Fire a session transition at every registered listener
    pub fn emit(&self, principal: Option<Principal>) {
        for listener in self.listeners.lock().unwrap().iter() {
            listener(principal.clone());
        }
    }
}

#[async_trait]
impl SessionProvider for FakeSessionProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, ProviderError> {
        let principal = {
            let accounts = self.accounts.lock().unwrap();
            match accounts.get(&email.to_lowercase()) {
                Some((stored, principal)) if stored == password => principal.clone(),
                _ => {
                    return Err(ProviderError::InvalidCredential(
                        "wrong email or password".to_string(),
                    ))
                }
            }
        };
        self.emit(Some(principal.clone()));
        Ok(principal)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.emit(None);
        Ok(())
    }

    fn on_change(&self, listener: SessionListener) {
        self.listeners.lock().unwrap().push(listener);
    }

    async fn get_token_attributes(
        &self,
        _principal: &Principal,
        _force_refresh: bool,
    ) -> Result<TokenAttributes, ProviderError> {
        self.token_fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.token_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_token_fetch.load(Ordering::SeqCst) {
            return Err(ProviderError::TokenFetch("token backend down".to_string()));
        }
        Ok(self.token_attrs.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct InMemoryProfileStore {
    docs: Mutex<HashMap<(String, String), Document>>,
    pub get_calls: AtomicUsize,
    pub fail_get: AtomicBool,
    pub fail_upsert: AtomicBool,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, collection: &str, id: &str, value: Value) {
        let Value::Object(doc) = value else {
            panic!("seed expects a JSON object");
        };
        self.docs
            .lock()
            .unwrap()
            .insert((collection.to_string(), id.to_string()), doc);
    }

    pub fn doc(&self, collection: &str, id: &str) -> Option<Document> {
        self.docs
            .lock()
            .unwrap()
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Document, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("profile backend down".to_string()));
        }
        self.doc(collection, id).ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
        merge_existing: bool,
    ) -> Result<(), StoreError> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("profile backend down".to_string()));
        }
        let mut docs = self.docs.lock().unwrap();
        let key = (collection.to_string(), id.to_string());
        match docs.get_mut(&key) {
            Some(existing) if merge_existing => {
                for (k, v) in fields {
                    existing.insert(k, v);
                }
            }
            _ => {
                docs.insert(key, fields);
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        equality_filters: &[(String, Value)],
    ) -> Result<Vec<Document>, StoreError> {
        let docs = self.docs.lock().unwrap();
        Ok(docs
            .iter()
            .filter(|((coll, _), _)| coll == collection)
            .map(|(_, doc)| doc)
            .filter(|doc| {
                equality_filters
                    .iter()
                    .all(|(field, value)| doc.get(field) == Some(value))
            })
            .cloned()
            .collect())
    }

    async fn count(
        &self,
        collection: &str,
        equality_filters: &[(String, Value)],
    ) -> Result<i64, StoreError> {
        Ok(self.query(collection, equality_filters).await?.len() as i64)
    }
}

#[derive(Default)]
pub struct InMemoryRequestStore {
    docs: Mutex<Vec<(String, Document)>>,
    pub fail_insert: AtomicBool,
    pub fail_update: AtomicBool,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, id: &str, value: Value) {
        let Value::Object(doc) = value else {
            panic!("seed expects a JSON object");
        };
        self.docs.lock().unwrap().push((id.to_string(), doc));
    }

    pub fn doc(&self, id: &str) -> Option<Document> {
        self.docs
            .lock()
            .unwrap()
            .iter()
            .find(|(stored_id, _)| stored_id == id)
            .map(|(_, doc)| doc.clone())
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn insert(&self, fields: Document) -> Result<String, StoreError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("request backend down".to_string()));
        }
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.docs.lock().unwrap().push((id.clone(), fields));
        Ok(id)
    }

    async fn update(&self, id: &str, fields: Document) -> Result<(), StoreError> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("request backend down".to_string()));
        }
        let mut docs = self.docs.lock().unwrap();
        let Some((_, doc)) = docs.iter_mut().find(|(stored_id, _)| stored_id == id) else {
            return Err(StoreError::NotFound {
                collection: "elevation_requests".to_string(),
                id: id.to_string(),
            });
        };
        for (k, v) in fields {
            doc.insert(k, v);
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<(String, Document)>, StoreError> {
        Ok(self.docs.lock().unwrap().clone())
    }
}
