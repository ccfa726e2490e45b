//! Runtime configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.
//! Environment variables override values loaded from JSON.

use serde::{Deserialize, Serialize};

use crate::db::DEFAULT_STORAGE_QUOTA_BYTES;
use crate::triage::MergePolicy;

/// Storage key for the session snapshot.
pub const DEFAULT_STORAGE_KEY: &str = "luniTriage:session";

/// Prefix shared by every key this app writes.
pub const DEFAULT_STORAGE_PREFIX: &str = "luniTriage:";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TriageConfig {
    /// OpenAI-compatible API base URL
    pub api_base_url: String,
    /// Chat model
    pub model: String,
    /// Model for photo analysis
    pub vision_model: String,
    /// Bearer token; also read from `LUNI_API_KEY`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub storage_key: String,
    pub storage_prefix: String,
    pub storage_quota_bytes: usize,
    /// Snapshots larger than this drop images from inactive cases
    pub compress_threshold_bytes: usize,
    pub snapshot_max_age_hours: u32,
    /// Largest accepted photo, decoded
    pub max_image_bytes: usize,
    pub merge_policy: MergePolicy,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            vision_model: "gpt-4o".to_string(),
            api_key: None,
            request_timeout_secs: 60,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            storage_quota_bytes: DEFAULT_STORAGE_QUOTA_BYTES,
            compress_threshold_bytes: 4 * 1024 * 1024,
            snapshot_max_age_hours: 24,
            max_image_bytes: 5 * 1024 * 1024,
            merge_policy: MergePolicy::default(),
            log_filter: "luni_triage_core=info,luni_triage_llm=info".to_string(),
        }
    }
}

impl TriageConfig {
    /// Parse from JSON; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Defaults with environment overrides.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `LUNI_API_BASE_URL`, `LUNI_MODEL`, `LUNI_API_KEY` and `LUNI_LOG`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup("LUNI_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(model) = lookup("LUNI_MODEL") {
            self.model = model;
        }
        if let Some(key) = lookup("LUNI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(filter) = lookup("LUNI_LOG") {
            self.log_filter = filter;
        }
        self
    }

    /// Snapshot freshness window in milliseconds.
    pub fn snapshot_max_age_ms(&self) -> i64 {
        i64::from(self.snapshot_max_age_hours) * 60 * 60 * 1000
    }

    /// Build the HTTP client for the configured endpoint.
    #[cfg(feature = "http")]
    pub fn build_http_client(
        &self,
    ) -> luni_triage_llm::LlmResult<luni_triage_llm::HttpLlmClient> {
        luni_triage_llm::HttpLlmClient::new(
            &self.api_base_url,
            self.api_key.clone(),
            &self.model,
            &self.vision_model,
            self.request_timeout_secs,
        )
    }
}
