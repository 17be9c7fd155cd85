use std::{path::PathBuf, time::Duration as StdDuration};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use nahj_client::{ClientConfig, DEFAULT_BASE_URL};
use nahj_core::{ResolverOptions, SubUnitFallback};
use serde::Deserialize;
use time::Duration;

/// Layered settings: defaults, then an optional TOML file, then `NAHJ_*` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    pub language: String,
    pub page_size: u32,
    pub max_pages: u32,
    pub timeout_secs: u64,
    /// Zero keeps disk entries forever.
    pub disk_cache_ttl_hours: i64,
    pub whole_document_fallback: bool,
}

impl Settings {
    pub fn load(file: Option<&std::path::Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("base_url", DEFAULT_BASE_URL)?
            .set_default("language", "en")?
            .set_default("page_size", 25)?
            .set_default("max_pages", 20)?
            .set_default("timeout_secs", 15)?
            .set_default("disk_cache_ttl_hours", 24)?
            .set_default("whole_document_fallback", false)?;
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(Environment::with_prefix("NAHJ"))
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    pub fn client_config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            base_url: self.base_url.clone(),
            api_token: self.api_token.clone().filter(|token| !token.is_empty()),
            cache_dir: self.cache_dir.clone().unwrap_or(defaults.cache_dir),
            disk_cache_ttl: (self.disk_cache_ttl_hours > 0)
                .then(|| Duration::hours(self.disk_cache_ttl_hours)),
            request_timeout: StdDuration::from_secs(self.timeout_secs),
            page_size: self.page_size.max(1),
            max_pages: self.max_pages.max(1),
            ..defaults
        }
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            sub_unit_fallback: if self.whole_document_fallback {
                SubUnitFallback::WholeDocument
            } else {
                SubUnitFallback::Skip
            },
            translation_language: self.language.clone(),
            ..ResolverOptions::default()
        }
    }
}
