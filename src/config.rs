// src/config.rs
//
// Runtime parameters for an `S3Hook`.

use std::env;

use crate::constants::{
    DEFAULT_CONN_ID, ENV_CONN_ID, ENV_DELETE_BATCH_SIZE, ENV_PAGE_SIZE, MAX_DELETE_BATCH_SIZE,
};
use crate::error::{HookError, Result};

/// Hook configuration.
///
/// `delete_batch_size` is the provider's per-request key limit. It defaults
/// to the S3 limit of 1000; other S3-compatible stores may need a smaller one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookConfig {
    pub conn_id: String,
    pub delete_batch_size: usize,
    /// Page size passed to listings that don't set their own. `None` lets the
    /// store pick.
    pub page_size: Option<usize>,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            conn_id: DEFAULT_CONN_ID.to_string(),
            delete_batch_size: MAX_DELETE_BATCH_SIZE,
            page_size: None,
        }
    }
}

impl HookConfig {
    pub fn new(conn_id: impl Into<String>) -> Self {
        Self {
            conn_id: conn_id.into(),
            ..Default::default()
        }
    }

    pub fn with_delete_batch_size(mut self, size: usize) -> Self {
        self.delete_batch_size = size;
        self
    }

    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Build from `S3HOOK_*` environment variables (after loading `.env`).
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`HookConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            conn_id: lookup(ENV_CONN_ID)
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.conn_id),
            delete_batch_size: lookup(ENV_DELETE_BATCH_SIZE)
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.delete_batch_size),
            page_size: lookup(ENV_PAGE_SIZE).and_then(|s| s.parse().ok()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.conn_id.is_empty() {
            return Err(HookError::Config("conn_id must not be empty".into()));
        }
        if self.delete_batch_size == 0 {
            return Err(HookError::Config("delete_batch_size must be at least 1".into()));
        }
        if self.page_size == Some(0) {
            return Err(HookError::Config("page_size must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_s3_limits() {
        let cfg = HookConfig::default();
        assert_eq!(cfg.conn_id, "aws_default");
        assert_eq!(cfg.delete_batch_size, 1000);
        assert_eq!(cfg.page_size, None);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn reads_overrides() {
        let cfg = HookConfig::from_lookup(lookup_from(&[
            ("S3HOOK_CONN_ID", "minio"),
            ("S3HOOK_DELETE_BATCH_SIZE", "250"),
            ("S3HOOK_PAGE_SIZE", "50"),
        ]));
        assert_eq!(cfg.conn_id, "minio");
        assert_eq!(cfg.delete_batch_size, 250);
        assert_eq!(cfg.page_size, Some(50));
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let cfg = HookConfig::from_lookup(lookup_from(&[
            ("S3HOOK_CONN_ID", ""),
            ("S3HOOK_DELETE_BATCH_SIZE", "lots"),
        ]));
        assert_eq!(cfg, HookConfig::default());
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(HookConfig::default().with_delete_batch_size(0).validate().is_err());
        assert!(HookConfig::default().with_page_size(0).validate().is_err());
    }
}
