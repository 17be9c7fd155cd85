use anyhow::Result;
use async_trait::async_trait;
use nahj_client::{
    types::{Document, DocumentKind, DocumentQuery, Introduction},
    CmsClient,
};

/// Read-only document source the resolver fans out to.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents whose numbering starts with `number_prefix` and whose declared
    /// type is `kind`. May include seed records and near-miss numbers.
    async fn documents(&self, number_prefix: &str, kind: DocumentKind) -> Result<Vec<Document>>;

    async fn introduction(&self, section_id: &str) -> Result<Option<Introduction>>;
}

#[async_trait]
impl DocumentStore for CmsClient {
    async fn documents(&self, number_prefix: &str, kind: DocumentKind) -> Result<Vec<Document>> {
        self.fetch_documents(&DocumentQuery::new(number_prefix).with_kind(kind))
            .await
    }

    async fn introduction(&self, section_id: &str) -> Result<Option<Introduction>> {
        self.fetch_introduction(section_id).await
    }
}
