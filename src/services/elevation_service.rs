//! Elevation-request lifecycle.
//!
//! A request to become a tenant administrator moves PENDING -> APPROVED or
//! PENDING -> REJECTED, both terminal. Approval assigns the tenant its
//! identifier and unlocks the requester's profile in two independent writes
//! with no shared transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config;
use crate::provider::{Document, ProfileStore, RequestStore, StoreError};
use crate::types::{PROFILES_COLLECTION, ROLE_PRINCIPAL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElevationStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "APPROVED")]
    Approved,
    #[serde(rename = "REJECTED")]
    Rejected,
}

impl ElevationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElevationStatus::Pending => "PENDING",
            ElevationStatus::Approved => "APPROVED",
            ElevationStatus::Rejected => "REJECTED",
        }
    }

    /// Unknown or missing stored values read back as PENDING
    pub fn parse(s: &str) -> Self {
        match s {
            "APPROVED" => ElevationStatus::Approved,
            "REJECTED" => ElevationStatus::Rejected,
            _ => ElevationStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElevationRequest {
    pub id: String,
    pub principal_id: String,
    pub full_name: String,
    pub email: String,
    pub tenant_name: String,
    pub status: ElevationStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub tenant_id: Option<String>,
}

impl ElevationRequest {
    /// Rehydrate from a stored document. Missing fields default rather than
    /// fail; stored timestamps are RFC 3339 strings.
    pub fn from_document(id: String, doc: &Document) -> Self {
        Self {
            id,
            principal_id: string_field(doc, "principalId"),
            full_name: string_field(doc, "fullName"),
            email: string_field(doc, "email"),
            tenant_name: string_field(doc, "tenantName"),
            status: ElevationStatus::parse(&string_field(doc, "status")),
            created_at: time_field(doc, "createdAt"),
            approved_at: time_field(doc, "approvedAt"),
            rejected_at: time_field(doc, "rejectedAt"),
            tenant_id: doc
                .get("tenantId")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

fn string_field(doc: &Document, key: &str) -> String {
    doc.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn time_field(doc: &Document, key: &str) -> Option<DateTime<Utc>> {
    doc.get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("request write failed: {0}")]
    RequestWrite(#[source] StoreError),
    /// The request committed as APPROVED with `tenant_id` assigned, but the
    /// profile unlock write failed. No automatic rollback or retry; the
    /// caller must re-invoke or reconcile.
    #[error("request {request_id} approved as tenant {tenant_id}, but profile unlock failed: {source}")]
    ProfileUnlock {
        request_id: String,
        tenant_id: String,
        #[source]
        source: StoreError,
    },
}

/// Drives the elevation-request state machine against the request and
/// profile stores.
#[derive(Clone)]
pub struct ElevationService {
    requests: Arc<dyn RequestStore>,
    profiles: Arc<dyn ProfileStore>,
    tenant_id_prefix: String,
    tenant_id_suffix_len: usize,
}

impl ElevationService {
    pub fn new(requests: Arc<dyn RequestStore>, profiles: Arc<dyn ProfileStore>) -> Self {
        let cfg = &config::config().tenancy;
        Self {
            requests,
            profiles,
            tenant_id_prefix: cfg.tenant_id_prefix.clone(),
            tenant_id_suffix_len: cfg.tenant_id_suffix_len,
        }
    }

    /// File a new PENDING request. Name and tenant name are trimmed, the
    /// email lowercased, before persistence. Duplicate pending requests for
    /// the same principal are not rejected here.
    pub async fn submit_request(
        &self,
        principal_id: &str,
        full_name: &str,
        email: &str,
        tenant_name: &str,
    ) -> Result<ElevationRequest, WorkflowError> {
        let created_at = Utc::now();
        let mut fields = Document::new();
        fields.insert("principalId".into(), json!(principal_id));
        fields.insert("fullName".into(), json!(full_name.trim()));
        fields.insert("email".into(), json!(email.trim().to_lowercase()));
        fields.insert("tenantName".into(), json!(tenant_name.trim()));
        fields.insert("status".into(), json!(ElevationStatus::Pending.as_str()));
        fields.insert("createdAt".into(), json!(created_at.to_rfc3339()));

        let id = self
            .requests
            .insert(fields.clone())
            .await
            .map_err(WorkflowError::RequestWrite)?;

        tracing::info!(request_id = %id, principal_id, "elevation request submitted");
        Ok(ElevationRequest::from_document(id, &fields))
    }

    /// Approve a request: assign a freshly generated tenant id, then unlock
    /// the requester's profile.
    ///
    /// The two writes share no transaction. If the profile write fails after
    /// the request write committed, the request stays APPROVED with the
    /// tenant id assigned and no unlocked profile - that partial state is
    /// reported through `WorkflowError::ProfileUnlock`, never rolled back.
    ///
    /// Approving an already-APPROVED request silently reapplies and
    /// generates a fresh tenant id; callers are expected not to re-invoke.
    pub async fn approve_request(
        &self,
        request_id: &str,
        principal_id: &str,
    ) -> Result<String, WorkflowError> {
        let tenant_id = self.generate_tenant_id();

        let mut request_fields = Document::new();
        request_fields.insert("status".into(), json!(ElevationStatus::Approved.as_str()));
        request_fields.insert("tenantId".into(), json!(tenant_id));
        request_fields.insert("approvedAt".into(), json!(Utc::now().to_rfc3339()));
        self.requests
            .update(request_id, request_fields)
            .await
            .map_err(WorkflowError::RequestWrite)?;

        let mut profile_fields = Document::new();
        profile_fields.insert("role".into(), json!(ROLE_PRINCIPAL));
        profile_fields.insert("approved".into(), json!(true));
        profile_fields.insert("tenantId".into(), json!(tenant_id));
        profile_fields.insert("updatedAt".into(), json!(Utc::now().to_rfc3339()));
        self.profiles
            .upsert(PROFILES_COLLECTION, principal_id, profile_fields, true)
            .await
            .map_err(|source| {
                tracing::error!(
                    request_id,
                    principal_id,
                    tenant_id = %tenant_id,
                    "request approved but profile unlock failed: {}",
                    source
                );
                WorkflowError::ProfileUnlock {
                    request_id: request_id.to_string(),
                    tenant_id: tenant_id.clone(),
                    source,
                }
            })?;

        tracing::info!(request_id, principal_id, tenant_id = %tenant_id, "elevation request approved");
        Ok(tenant_id)
    }

    /// Reject a request. Terminal; no profile mutation.
    pub async fn reject_request(&self, request_id: &str) -> Result<(), WorkflowError> {
        let mut fields = Document::new();
        fields.insert("status".into(), json!(ElevationStatus::Rejected.as_str()));
        fields.insert("rejectedAt".into(), json!(Utc::now().to_rfc3339()));
        self.requests
            .update(request_id, fields)
            .await
            .map_err(WorkflowError::RequestWrite)?;

        tracing::info!(request_id, "elevation request rejected");
        Ok(())
    }

    /// All requests, newest first. Requests without a stored creation time
    /// sort last. Re-ordering by status is left to the presentation layer.
    pub async fn list_requests(&self) -> Result<Vec<ElevationRequest>, WorkflowError> {
        let docs = self
            .requests
            .list_all()
            .await
            .map_err(WorkflowError::RequestWrite)?;

        let mut items: Vec<ElevationRequest> = docs
            .into_iter()
            .map(|(id, doc)| ElevationRequest::from_document(id, &doc))
            .collect();

        // Option<DateTime> orders None first ascending, so reversed compare
        // gives newest-first with missing timestamps at the end
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    /// Human-readable tenant token: fixed prefix plus a random uppercase
    /// alphanumeric suffix. Uniqueness is probabilistic - the generator does
    /// not verify against storage.
    fn generate_tenant_id(&self) -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .map(char::from)
            .take(self.tenant_id_suffix_len)
            .collect::<String>()
            .to_uppercase();
        format!("{}{}", self.tenant_id_prefix, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_defaults_unknown_to_pending() {
        assert_eq!(ElevationStatus::parse("APPROVED"), ElevationStatus::Approved);
        assert_eq!(ElevationStatus::parse("REJECTED"), ElevationStatus::Rejected);
        assert_eq!(ElevationStatus::parse("PENDING"), ElevationStatus::Pending);
        assert_eq!(ElevationStatus::parse(""), ElevationStatus::Pending);
        assert_eq!(ElevationStatus::parse("bogus"), ElevationStatus::Pending);
    }

    #[test]
    fn from_document_rehydrates_fields_and_timestamps() {
        let mut doc = Document::new();
        doc.insert("principalId".into(), json!("u1"));
        doc.insert("fullName".into(), json!("Jane Roe"));
        doc.insert("email".into(), json!("jane@x.com"));
        doc.insert("tenantName".into(), json!("Lincoln High"));
        doc.insert("status".into(), json!("APPROVED"));
        doc.insert("createdAt".into(), json!("2025-03-01T10:00:00+00:00"));
        doc.insert("tenantId".into(), json!("SCH-ABC123"));

        let req = ElevationRequest::from_document("r1".into(), &doc);
        assert_eq!(req.principal_id, "u1");
        assert_eq!(req.status, ElevationStatus::Approved);
        assert_eq!(req.tenant_id.as_deref(), Some("SCH-ABC123"));
        assert!(req.created_at.is_some());
        assert!(req.approved_at.is_none());
    }

    #[test]
    fn from_document_tolerates_missing_fields() {
        let doc = Document::new();
        let req = ElevationRequest::from_document("r1".into(), &doc);
        assert_eq!(req.status, ElevationStatus::Pending);
        assert_eq!(req.created_at, None);
        assert_eq!(req.tenant_id, None);
        assert_eq!(req.full_name, "");
    }
}
