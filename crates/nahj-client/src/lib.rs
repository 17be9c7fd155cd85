pub mod cache;
pub mod types;

pub use cache::CombinedCacheStats;

use std::{path::PathBuf, sync::Arc, time::Duration as StdDuration};

use anyhow::{Context, Result};
use cache::{DiskCache, MemoryCache};
use dashmap::DashMap;
use directories::ProjectDirs;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::types::{introduction_cache_key, Document, DocumentQuery, Introduction, Page};

pub const DEFAULT_BASE_URL: &str = "https://cms.nahj-index.org";
const DOCUMENTS_PATH: &str = "api/posts";
const INTRODUCTIONS_PATH: &str = "api/introductions";

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("unexpected status code {status} from {url}")]
    Status { status: StatusCode, url: String },
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub cache_dir: PathBuf,
    pub memory_cache_ttl: Duration,
    /// `None` keeps disk entries forever.
    pub disk_cache_ttl: Option<Duration>,
    pub request_timeout: StdDuration,
    pub page_size: u32,
    pub max_pages: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let cache_dir = ProjectDirs::from("org", "NahjIndex", "nahj")
            .map_or_else(|| std::env::temp_dir().join("nahj"), |dirs| {
                dirs.cache_dir().to_path_buf()
            });

        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
            cache_dir,
            memory_cache_ttl: Duration::minutes(10),
            disk_cache_ttl: Some(Duration::hours(24)),
            request_timeout: StdDuration::from_secs(15),
            page_size: 25,
            max_pages: 20,
        }
    }
}

/// Read-only client for the corpus CMS.
#[derive(Debug)]
pub struct CmsClient {
    http: Client,
    disk_cache: DiskCache,
    fetch_locks: DashMap<String, Arc<Mutex<()>>>,
    memory_cache: MemoryCache<Vec<u8>>,
    config: ClientConfig,
}

impl CmsClient {
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent("NahjIndex/1.0")
            .timeout(config.request_timeout)
            .gzip(true)
            .build()
            .context("failed to build HTTP client")?;

        if let Err(error) = std::fs::create_dir_all(&config.cache_dir) {
            warn!(
                error = %error,
                cache_dir = %config.cache_dir.display(),
                "failed to create cache directory; disk cache writes may fail"
            );
        }

        Ok(Self {
            http,
            disk_cache: DiskCache::new(&config.cache_dir, config.disk_cache_ttl),
            fetch_locks: DashMap::new(),
            memory_cache: MemoryCache::new(config.memory_cache_ttl),
            config,
        })
    }

    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    pub fn cache_dir(&self) -> &PathBuf {
        &self.config.cache_dir
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// All documents matching the query, walking every page.
    #[instrument(name = "nahj_client.fetch_documents", skip(self), fields(prefix = %query.number_prefix))]
    pub async fn fetch_documents(&self, query: &DocumentQuery) -> Result<Vec<Document>> {
        let file_name = query.cache_key();
        if let Some(entry) = self.disk_cache.load::<Vec<Document>>(&file_name).await? {
            debug!(count = entry.value.len(), "documents served from disk cache");
            return Ok(entry.value);
        }

        let lock = self.fetch_lock(&file_name);
        let _guard = lock.lock().await;
        if let Some(entry) = self.disk_cache.load::<Vec<Document>>(&file_name).await? {
            debug!(count = entry.value.len(), "documents served from disk cache after lock");
            return Ok(entry.value);
        }

        let mut documents = Vec::new();
        let mut page = 1;
        let mut truncated = false;
        loop {
            let params = query.to_params(page, self.config.page_size);
            let response: Page<Document> = self
                .fetch_json(DOCUMENTS_PATH, &params)
                .await
                .with_context(|| {
                    format!("failed to fetch documents with prefix {}", query.number_prefix)
                })?;
            let page_count = response.meta.pagination.page_count;
            documents.extend(response.data);

            if page >= page_count {
                break;
            }
            if page >= self.config.max_pages {
                warn!(
                    page_count,
                    max_pages = self.config.max_pages,
                    "stopping pagination at configured page limit"
                );
                truncated = true;
                break;
            }
            page += 1;
        }

        if !truncated {
            self.persist(&file_name, documents.clone()).await;
        }
        Ok(documents)
    }

    #[instrument(name = "nahj_client.fetch_introduction", skip(self))]
    pub async fn fetch_introduction(&self, section_id: &str) -> Result<Option<Introduction>> {
        let file_name = introduction_cache_key(section_id);
        if let Some(entry) = self
            .disk_cache
            .load::<Option<Introduction>>(&file_name)
            .await?
        {
            debug!(section_id, "introduction served from disk cache");
            return Ok(entry.value);
        }

        let lock = self.fetch_lock(&file_name);
        let _guard = lock.lock().await;
        if let Some(entry) = self
            .disk_cache
            .load::<Option<Introduction>>(&file_name)
            .await?
        {
            debug!(section_id, "introduction served from disk cache after lock");
            return Ok(entry.value);
        }

        let params = vec![
            ("filters[sectionId][$eq]".to_string(), section_id.to_string()),
            ("populate".to_string(), "translations".to_string()),
        ];
        let response: Page<Introduction> = self
            .fetch_json(INTRODUCTIONS_PATH, &params)
            .await
            .with_context(|| format!("failed to fetch introduction {section_id}"))?;
        let introduction = response
            .data
            .into_iter()
            .find(|intro| intro.section_id == section_id);

        self.persist(&file_name, introduction.clone()).await;
        Ok(introduction)
    }

    pub fn clear_memory_cache(&self) {
        self.memory_cache.clear();
    }

    pub async fn purge_disk_cache(&self) -> Result<usize> {
        self.disk_cache.purge().await
    }

    pub async fn disk_entry_count(&self) -> Result<usize> {
        self.disk_cache.entry_count().await
    }

    pub fn cache_stats(&self) -> CombinedCacheStats {
        CombinedCacheStats {
            memory: self.memory_cache.stats().snapshot(),
            disk: self.disk_cache.stats().snapshot(),
        }
    }

    /// One lock per cache file, so concurrent callers share a single fetch.
    fn fetch_lock(&self, file_name: &str) -> Arc<Mutex<()>> {
        self.fetch_locks
            .entry(file_name.to_string())
            .or_default()
            .clone()
    }

    /// Disk writes are best effort; a fetched value is returned either way.
    async fn persist<T>(&self, file_name: &str, value: T)
    where
        T: Serialize + Send + 'static,
    {
        if let Err(error) = self.disk_cache.store(file_name, value).await {
            warn!(
                error = %format!("{error:#}"),
                file = file_name,
                "failed to write disk cache entry"
            );
        }
    }

    async fn fetch_json<T>(&self, path: &str, params: &[(String, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = build_url(&self.config.base_url, path, params);

        if let Some(bytes) = self.memory_cache.get_with_size(&url, Vec::len) {
            return decode(&url, &bytes);
        }

        let mut request = self.http.get(&url);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|err| ClientError::Http(err.to_string()))?;
        if !response.status().is_success() {
            warn!(status = %response.status(), url = %url, "CMS request failed");
            return Err(ClientError::Status {
                status: response.status(),
                url,
            }
            .into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| ClientError::Http(err.to_string()))?;
        let value = decode(&url, &bytes)?;
        self.memory_cache.insert(url, bytes.to_vec());
        Ok(value)
    }
}

fn decode<T: DeserializeOwned>(url: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|err| {
        ClientError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        }
        .into()
    })
}

/// Joins base, path and percent-encoded query pairs into a cache-stable URL.
fn build_url(base: &str, path: &str, params: &[(String, String)]) -> String {
    let mut url = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    for (index, (key, value)) in params.iter().enumerate() {
        url.push(if index == 0 { '?' } else { '&' });
        url.push_str(&urlencoding::encode(key));
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CacheEntry, DocumentKind};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{tempdir, NamedTempFile};
    use time::OffsetDateTime;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    /// Local HTTP endpoint answering every request with `body`; counts requests.
    async fn serve_json(body: serde_json::Value) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();
        let payload = body.to_string();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let counter = counter.clone();
                let payload = payload.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(read) => request.extend_from_slice(&buf[..read]),
                        }
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(StdDuration::from_millis(50)).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{payload}",
                        payload.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        (format!("http://{addr}"), requests)
    }

    fn sermon_page(page_count: u32) -> serde_json::Value {
        json!({
            "data": [{
                "id": 4,
                "number": "1.26",
                "type": "sermon",
                "title": "On Justice",
                "paragraphs": [{"number": "1", "text": "the path of justice is narrow."}]
            }],
            "meta": {"pagination": {"page": 1, "pageSize": 25, "pageCount": page_count, "total": page_count}}
        })
    }

    fn local_client(base_url: String, cache_dir: &std::path::Path) -> CmsClient {
        CmsClient::with_config(ClientConfig {
            base_url,
            cache_dir: cache_dir.to_path_buf(),
            request_timeout: StdDuration::from_secs(5),
            ..ClientConfig::default()
        })
        .expect("client builds")
    }

    fn sermon_query() -> DocumentQuery {
        DocumentQuery::new("1.26").with_kind(DocumentKind::Sermon)
    }

    fn offline_client(dir: &std::path::Path) -> CmsClient {
        CmsClient::with_config(ClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            cache_dir: dir.to_path_buf(),
            request_timeout: StdDuration::from_millis(500),
            ..ClientConfig::default()
        })
        .expect("client builds")
    }

    #[test]
    fn url_encodes_filter_brackets() {
        let url = build_url(
            "https://cms.example.org/",
            "/api/posts",
            &[
                ("filters[number][$startsWith]".to_string(), "1.26".to_string()),
                ("sort".to_string(), "number:asc".to_string()),
            ],
        );
        assert_eq!(
            url,
            "https://cms.example.org/api/posts?filters%5Bnumber%5D%5B%24startsWith%5D=1.26&sort=number%3Aasc"
        );
    }

    #[tokio::test]
    async fn documents_are_served_from_seeded_disk_cache() {
        let dir = tempdir().expect("tempdir");
        let client = offline_client(dir.path());
        let query = DocumentQuery::new("1.26").with_kind(DocumentKind::Sermon);
        let seeded: Vec<Document> = serde_json::from_value(serde_json::json!([
            {"id": 1, "number": "1.26", "type": "sermon", "paragraphs": []}
        ]))
        .expect("documents");
        let entry = CacheEntry {
            value: seeded,
            stored_at: OffsetDateTime::now_utc(),
        };
        std::fs::write(
            dir.path().join(query.cache_key()),
            serde_json::to_vec(&entry).expect("serialize"),
        )
        .expect("write cache");

        let documents = client.fetch_documents(&query).await.expect("cached fetch");
        assert_eq!(documents.len(), 1);
        assert_eq!(client.cache_stats().disk.hits, 1);
    }

    #[tokio::test]
    async fn unreachable_store_surfaces_an_error() {
        let dir = tempdir().expect("tempdir");
        let client = offline_client(dir.path());
        let result = client.fetch_introduction("5").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn fetched_documents_survive_an_unwritable_cache() {
        let blocker = NamedTempFile::new().expect("tempfile");
        let (base_url, _) = serve_json(sermon_page(1)).await;
        let client = local_client(base_url, blocker.path());

        let documents = client
            .fetch_documents(&sermon_query())
            .await
            .expect("fetch succeeds without a disk cache");
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].number.as_deref(), Some("1.26"));
    }

    #[tokio::test]
    async fn fetched_introduction_survives_an_unwritable_cache() {
        let blocker = NamedTempFile::new().expect("tempfile");
        let (base_url, _) = serve_json(json!({
            "data": [{"sectionId": "5", "content": "مقدمة"}],
            "meta": {"pagination": {"page": 1, "pageCount": 1}}
        }))
        .await;
        let client = local_client(base_url, blocker.path());

        let introduction = client
            .fetch_introduction("5")
            .await
            .expect("fetch succeeds without a disk cache");
        assert_eq!(introduction.map(|intro| intro.section_id).as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn corrupt_cache_entry_is_refetched_and_rewritten() {
        let dir = tempdir().expect("tempdir");
        let (base_url, requests) = serve_json(sermon_page(1)).await;
        let client = local_client(base_url, dir.path());
        let query = sermon_query();
        std::fs::write(dir.path().join(query.cache_key()), br#"{"value": ["#).expect("seed");

        let documents = client.fetch_documents(&query).await.expect("refetch");
        assert_eq!(documents.len(), 1);
        assert_eq!(requests.load(Ordering::SeqCst), 1);

        let cached: Option<CacheEntry<Vec<Document>>> = client
            .disk_cache
            .load(&query.cache_key())
            .await
            .expect("load");
        assert_eq!(cached.expect("rewritten entry").value.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_fetches_of_one_query_share_a_request() {
        let dir = tempdir().expect("tempdir");
        let (base_url, requests) = serve_json(sermon_page(1)).await;
        let client = local_client(base_url, dir.path());
        let query = sermon_query();

        let (first, second) = tokio::join!(
            client.fetch_documents(&query),
            client.fetch_documents(&query)
        );
        assert_eq!(first.expect("first").len(), 1);
        assert_eq!(second.expect("second").len(), 1);
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn page_limited_results_are_not_cached() {
        let dir = tempdir().expect("tempdir");
        let (base_url, _) = serve_json(sermon_page(3)).await;
        let client = CmsClient::with_config(ClientConfig {
            base_url,
            cache_dir: dir.path().to_path_buf(),
            max_pages: 1,
            ..ClientConfig::default()
        })
        .expect("client builds");

        let documents = client.fetch_documents(&sermon_query()).await.expect("fetch");
        assert_eq!(documents.len(), 1);
        assert_eq!(client.disk_entry_count().await.expect("count"), 0);
    }
}
