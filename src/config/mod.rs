use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub claims: ClaimsConfig,
    pub tenancy: TenancyConfig,
    pub access: AccessConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimsConfig {
    /// Bound on how long get_claims() waits for the first resolution.
    /// Individual call sites may override with get_claims_within().
    pub resolve_timeout_secs: u64,
    /// Bypass any locally-cached token copy when fetching token attributes
    pub force_token_refresh: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Human-readable prefix for generated tenant identifiers
    pub tenant_id_prefix: String,
    /// Length of the random uppercase alphanumeric suffix
    pub tenant_id_suffix_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Emails allowed through exact-identity guards and the sign-in
    /// approval bypass. Compared case-insensitively.
    pub admin_allowlist: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::defaults().with_env_overrides()
    }

    pub fn defaults() -> Self {
        Self {
            claims: ClaimsConfig {
                resolve_timeout_secs: 8,
                force_token_refresh: true,
            },
            tenancy: TenancyConfig {
                tenant_id_prefix: "SCH-".to_string(),
                tenant_id_suffix_len: 6,
            },
            access: AccessConfig {
                admin_allowlist: Vec::new(),
            },
        }
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("CLAIMS_RESOLVE_TIMEOUT_SECS") {
            self.claims.resolve_timeout_secs = v.parse().unwrap_or(self.claims.resolve_timeout_secs);
        }
        if let Ok(v) = env::var("CLAIMS_FORCE_TOKEN_REFRESH") {
            self.claims.force_token_refresh = v.parse().unwrap_or(self.claims.force_token_refresh);
        }
        if let Ok(v) = env::var("TENANT_ID_PREFIX") {
            if !v.is_empty() {
                self.tenancy.tenant_id_prefix = v;
            }
        }
        if let Ok(v) = env::var("TENANT_ID_SUFFIX_LEN") {
            self.tenancy.tenant_id_suffix_len = v.parse().unwrap_or(self.tenancy.tenant_id_suffix_len);
        }
        if let Ok(v) = env::var("ADMIN_ALLOWLIST") {
            self.access.admin_allowlist = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        self
    }
}

impl ClaimsConfig {
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }
}

static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

/// Process-wide configuration defaults. Components copy what they need at
/// construction time; nothing reads this after startup.
pub fn config() -> &'static AppConfig {
    &CONFIG
}
