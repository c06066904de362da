//! Field-wise merge of the two authorization attribute sources.
//!
//! Token attributes win wherever they are non-empty; persisted profile values
//! fill the gaps. Kept as a pure function so the precedence rule is testable
//! without any backend in the picture.

use serde_json::Value;

use crate::provider::Document;
use crate::types::TokenAttributes;

/// One source's view of the mergeable authorization attributes.
/// Empty string / empty list means "this source has no value".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    pub tenant_id: String,
    pub role: String,
    pub class_id: String,
    pub class_ids: Vec<String>,
}

impl AttributeSet {
    pub fn from_token(attrs: &TokenAttributes) -> Self {
        Self {
            tenant_id: attrs.tenant_id.clone().unwrap_or_default(),
            role: attrs.role.clone().unwrap_or_default(),
            class_id: attrs.class_id.clone().unwrap_or_default(),
            class_ids: attrs.class_ids.clone().unwrap_or_default(),
        }
    }

    /// Extract the mergeable fields from a persisted profile document.
    /// Non-string entries in `class_ids` are skipped rather than failing the
    /// whole resolution.
    pub fn from_profile(doc: &Document) -> Self {
        Self {
            tenant_id: string_field(doc, "tenantId"),
            role: string_field(doc, "role"),
            class_id: string_field(doc, "classId"),
            class_ids: doc
                .get("classIds")
                .and_then(Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

fn string_field(doc: &Document, key: &str) -> String {
    doc.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Merge token-derived attributes over persisted ones: the token value is
/// taken where non-empty, otherwise the persisted value. The list field uses
/// the same precedence, list-aware (non-empty token list wins wholesale).
pub fn merge_attributes(token: &AttributeSet, persisted: &AttributeSet) -> AttributeSet {
    AttributeSet {
        tenant_id: pick(&token.tenant_id, &persisted.tenant_id),
        role: pick(&token.role, &persisted.role),
        class_id: pick(&token.class_id, &persisted.class_id),
        class_ids: if token.class_ids.is_empty() {
            persisted.class_ids.clone()
        } else {
            token.class_ids.clone()
        },
    }
}

fn pick(token: &str, persisted: &str) -> String {
    if token.is_empty() {
        persisted.to_string()
    } else {
        token.to_string()
    }
}
