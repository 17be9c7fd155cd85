use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Declared type of a document family as stored in the CMS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Sermon,
    Letter,
    Saying,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sermon => "sermon",
            Self::Letter => "letter",
            Self::Saying => "saying",
        }
    }

    /// Compares against the raw `type` string returned by the store.
    pub fn matches(self, raw: &str) -> bool {
        raw.trim().eq_ignore_ascii_case(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translation {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub text: String,
}

/// A numbered paragraph inside a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubUnit {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub translations: Vec<Translation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "titleTranslation")]
    pub title_translation: Option<String>,
    #[serde(default)]
    pub paragraphs: Vec<SubUnit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Introduction {
    #[serde(rename = "sectionId")]
    pub section_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub translations: Vec<Translation>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default, rename = "pageSize")]
    pub page_size: u32,
    #[serde(default, rename = "pageCount")]
    pub page_count: u32,
    #[serde(default)]
    pub total: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub pagination: Pagination,
}

/// Collection envelope used by every list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: OffsetDateTime,
}

/// Filter set for the documents endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentQuery {
    pub number_prefix: String,
    pub kind: Option<DocumentKind>,
}

impl DocumentQuery {
    pub fn new(number_prefix: impl Into<String>) -> Self {
        Self {
            number_prefix: number_prefix.into(),
            kind: None,
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: DocumentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Query-string pairs for one page of results.
    pub fn to_params(&self, page: u32, page_size: u32) -> Vec<(String, String)> {
        let mut params = vec![(
            "filters[number][$startsWith]".to_string(),
            self.number_prefix.clone(),
        )];
        if let Some(kind) = self.kind {
            params.push(("filters[type][$eq]".to_string(), kind.as_str().to_string()));
        }
        params.push(("populate".to_string(), "paragraphs.translations".to_string()));
        params.push(("sort".to_string(), "number:asc".to_string()));
        params.push(("pagination[page]".to_string(), page.to_string()));
        params.push(("pagination[pageSize]".to_string(), page_size.to_string()));
        params
    }

    /// Stable file name for the disk cache.
    pub fn cache_key(&self) -> String {
        let kind = self.kind.map_or("any", DocumentKind::as_str);
        format!("posts__{}__{kind}.json", sanitize_key(&self.number_prefix))
    }
}

pub fn introduction_cache_key(section_id: &str) -> String {
    format!("introductions__{}.json", sanitize_key(section_id))
}

fn sanitize_key(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}
