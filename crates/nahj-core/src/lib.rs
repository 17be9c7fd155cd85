use std::sync::Arc;

use anyhow::Result;
use nahj_client::{ClientConfig, CmsClient};
use time::OffsetDateTime;
use tracing::{debug, info};

pub mod highlight;
pub mod markdown;
pub mod matcher;
pub mod reference;
pub mod resolver;
pub mod snippet;
pub mod store;
pub mod text_source;

pub use highlight::{render, Segment};
pub use matcher::{find_match, matches, MatchSpan, Script};
pub use reference::{parse, try_parse, Collection, ParsedReference, ReferenceError};
pub use resolver::{
    MatchResult, ResolveReport, Resolver, ResolverOptions, SubUnitFallback,
};
pub use snippet::extract;
pub use store::DocumentStore;

/// Inputs needed to assemble a [`CoreRuntime`].
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub client: ClientConfig,
    pub resolver: ResolverOptions,
    /// Captured at process start for diagnostics.
    pub boot_timestamp: OffsetDateTime,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            resolver: ResolverOptions::default(),
            boot_timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Clone)]
pub struct CoreRuntime {
    client: Arc<CmsClient>,
    resolver: Resolver,
}

impl CoreRuntime {
    pub fn client(&self) -> Arc<CmsClient> {
        self.client.clone()
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }
}

pub fn bootstrap(config: CoreConfig) -> Result<CoreRuntime> {
    let client = Arc::new(CmsClient::with_config(config.client)?);
    debug!(
        target: "nahj_core",
        cache_dir = %client.cache_dir().display(),
        base_url = %client.config().base_url,
        "CMS client initialized"
    );

    let store: Arc<dyn DocumentStore> = client.clone();
    let resolver = Resolver::with_options(store, config.resolver);

    info!(
        target: "nahj_core",
        boot_timestamp = %config.boot_timestamp,
        fallback = ?resolver.options().sub_unit_fallback,
        "core runtime ready"
    );
    Ok(CoreRuntime { client, resolver })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn bootstrap_with_temp_cache_resolves_nothing_offline() {
        let tmp = tempdir().expect("tempdir");
        let mut config = CoreConfig::default();
        config.client.cache_dir = tmp.path().to_path_buf();
        config.client.base_url = "http://127.0.0.1:9".to_string();
        config.client.request_timeout = std::time::Duration::from_millis(500);

        let runtime = bootstrap(config).expect("bootstrap succeeds");
        assert_eq!(runtime.client().cache_dir(), &tmp.path().to_path_buf());

        let results = runtime.resolver().resolve(&["1.1", "bogus"], "justice").await;
        assert!(results.is_empty());
    }
}
