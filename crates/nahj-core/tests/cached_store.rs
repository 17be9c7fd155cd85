use std::{sync::Arc, time::Duration as StdDuration};

use nahj_client::{
    types::{introduction_cache_key, CacheEntry, Document, DocumentKind, DocumentQuery},
    ClientConfig, CmsClient,
};
use nahj_core::{markdown, Resolver};
use serde_json::json;
use tempfile::tempdir;
use time::OffsetDateTime;
use tokio::fs;

fn offline_client(cache_dir: &std::path::Path) -> CmsClient {
    CmsClient::with_config(ClientConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        cache_dir: cache_dir.to_path_buf(),
        request_timeout: StdDuration::from_millis(500),
        ..ClientConfig::default()
    })
    .expect("client builds")
}

async fn seed<T: serde::Serialize>(dir: &std::path::Path, file_name: &str, value: T) {
    let entry = CacheEntry {
        value,
        stored_at: OffsetDateTime::now_utc(),
    };
    fs::write(
        dir.join(file_name),
        serde_json::to_vec(&entry).expect("serialize cache entry"),
    )
    .await
    .expect("write cache entry");
}

fn sermon_page() -> Vec<Document> {
    serde_json::from_value(json!([
        {
            "id": 3,
            "number": "1.26",
            "type": "sermon",
            "title": "test",
            "paragraphs": []
        },
        {
            "id": 4,
            "number": "1.26",
            "type": "sermon",
            "title": "في العدل",
            "titleTranslation": "On Justice",
            "paragraphs": [{
                "number": "1.26.1",
                "text": "إن طريق العدل ضيق.",
                "translations": [{"language": "en", "text": "the path of justice is narrow."}]
            }]
        }
    ]))
    .expect("documents")
}

#[tokio::test]
async fn resolves_from_disk_cache_and_isolates_network_failures() {
    let dir = tempdir().expect("tempdir");
    let client = offline_client(dir.path());
    let query = DocumentQuery::new("1.26").with_kind(DocumentKind::Sermon);
    seed(dir.path(), &query.cache_key(), sermon_page()).await;

    let client = Arc::new(client);
    let resolver = Resolver::new(client.clone());
    let (results, report) = resolver
        .resolve_with_report(&["1.26.1", "0.5"], "justice")
        .await;

    assert_eq!(results.len(), 1, "introduction lookup hits the dead host");
    assert_eq!(results[0].sub_unit_ref.as_deref(), Some("1.26.1"));
    assert_eq!(results[0].title.as_deref(), Some("On Justice"));
    assert_eq!(report.failed, 1);
    assert!(client.cache_stats().disk.hits >= 1);

    insta::assert_snapshot!(
        markdown::result_card(&results[0], "justice"),
        @r"
    ### Sermon 1.26 ¶1.26.1 — On Justice
    the path of **justice** is narrow.
    "
    );
}

#[tokio::test]
async fn cached_missing_introduction_is_not_a_failure() {
    let dir = tempdir().expect("tempdir");
    let client = offline_client(dir.path());
    seed(
        dir.path(),
        &introduction_cache_key("5"),
        Option::<serde_json::Value>::None,
    )
    .await;

    let resolver = Resolver::new(Arc::new(client));
    let (results, report) = resolver.resolve_with_report(&["0.5"], "justice").await;
    assert!(results.is_empty());
    assert_eq!(report.unmatched, 1);
    assert_eq!(report.failed, 0);
}
