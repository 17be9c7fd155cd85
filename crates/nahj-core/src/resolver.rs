//! Resolves index reference tokens to excerpts of the documents they point at.
//!
//! Every token is looked up concurrently. A token that fails to parse, fails
//! to load, or points at nothing contributes no result; it never fails the
//! batch.

use std::{collections::HashSet, sync::Arc};

use anyhow::Result;
use futures::future::join_all;
use nahj_client::types::{Document, DocumentKind, SubUnit};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::{
    matcher::{detect_script, Script},
    reference::{compare_references, try_parse, Collection, ParsedReference},
    snippet::{extract, leading_excerpt, DEFAULT_EXCERPT_CHARS},
    store::DocumentStore,
    text_source::{preference, select_text, TextFields, TextSource},
};

static CANONICAL_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)*$").expect("canonical number regex"));

/// Seed records known to live in the store. Compared case-insensitively.
const SENTINEL_TITLES: [&str; 5] = ["test", "placeholder", "sample", "lorem ipsum", "untitled"];

/// What to do when a token names a paragraph the document does not have.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubUnitFallback {
    /// The token contributes nothing.
    #[default]
    Skip,
    /// Excerpt the whole document instead.
    WholeDocument,
}

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub sub_unit_fallback: SubUnitFallback,
    /// Translation language preferred for non-Arabic terms.
    pub translation_language: String,
    /// Length of the excerpt used when the term is not found in the text.
    pub excerpt_chars: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            sub_unit_fallback: SubUnitFallback::Skip,
            translation_language: "en".to_string(),
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub token: String,
    pub collection: Collection,
    pub document_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_unit_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub snippet: String,
    /// Script the search term was written in.
    pub language: Script,
    pub source: TextSource,
}

/// Per-batch counters, mostly for logs and CLI output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveReport {
    pub requested: usize,
    pub unique: usize,
    pub unparseable: usize,
    pub failed: usize,
    pub unmatched: usize,
    pub resolved: usize,
}

enum Outcome {
    Resolved(MatchResult),
    Unparseable,
    Failed,
    Unmatched,
}

#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn DocumentStore>,
    options: ResolverOptions,
}

impl Resolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_options(store, ResolverOptions::default())
    }

    pub fn with_options(store: Arc<dyn DocumentStore>, options: ResolverOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub async fn resolve<S: AsRef<str>>(&self, tokens: &[S], term: &str) -> Vec<MatchResult> {
        self.resolve_with_report(tokens, term).await.0
    }

    /// Results ordered by token, at most one per distinct token.
    #[instrument(name = "nahj_core.resolve", skip(self, tokens), fields(tokens = tokens.len()))]
    pub async fn resolve_with_report<S: AsRef<str>>(
        &self,
        tokens: &[S],
        term: &str,
    ) -> (Vec<MatchResult>, ResolveReport) {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = tokens
            .iter()
            .map(|token| token.as_ref().trim())
            .filter(|token| seen.insert(*token))
            .collect();

        let script = detect_script(term);
        let outcomes = join_all(
            unique
                .iter()
                .map(|token| self.resolve_token(token, term, script)),
        )
        .await;

        let mut report = ResolveReport {
            requested: tokens.len(),
            unique: unique.len(),
            ..ResolveReport::default()
        };
        let mut emitted = HashSet::new();
        let mut results = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Resolved(result) => {
                    if emitted.insert(result.token.clone()) {
                        results.push(result);
                    }
                }
                Outcome::Unparseable => report.unparseable += 1,
                Outcome::Failed => report.failed += 1,
                Outcome::Unmatched => report.unmatched += 1,
            }
        }
        results.sort_by(|a, b| compare_references(&a.token, &b.token));
        report.resolved = results.len();

        debug!(
            requested = report.requested,
            resolved = report.resolved,
            failed = report.failed,
            "reference resolution finished"
        );
        (results, report)
    }

    async fn resolve_token(&self, token: &str, term: &str, script: Script) -> Outcome {
        let parsed = match try_parse(token) {
            Ok(parsed) => parsed,
            Err(error) => {
                debug!(token, %error, "skipping unparseable reference");
                return Outcome::Unparseable;
            }
        };

        match self.lookup(token, &parsed, term, script).await {
            Ok(Some(result)) => Outcome::Resolved(result),
            Ok(None) => {
                debug!(token, "reference resolved to nothing");
                Outcome::Unmatched
            }
            Err(error) => {
                warn!(token, error = %format!("{error:#}"), "reference lookup failed");
                Outcome::Failed
            }
        }
    }

    async fn lookup(
        &self,
        token: &str,
        parsed: &ParsedReference,
        term: &str,
        script: Script,
    ) -> Result<Option<MatchResult>> {
        let Some(kind) = parsed.collection.document_kind() else {
            return self.lookup_introduction(token, parsed, term, script).await;
        };

        let (main_id, sub_id) = parsed.split_section();
        let number = format!("{}{main_id}", parsed.collection.number_prefix());
        let candidates = self.store.documents(&number, kind).await?;
        let Some(document) = select_document(candidates, kind, &number) else {
            return Ok(None);
        };

        let title = document_title(&document, script);
        let target = match sub_id {
            Some(sub_id) => match find_sub_unit(&document.paragraphs, main_id, sub_id) {
                Some(unit) => Target::SubUnit(unit),
                None if self.options.sub_unit_fallback == SubUnitFallback::WholeDocument => {
                    debug!(token, sub_id, "paragraph missing, using whole document");
                    Target::Document(&document)
                }
                None => return Ok(None),
            },
            None => Target::Document(&document),
        };

        let sub_unit_ref = match target {
            Target::SubUnit(unit) => unit.number.clone(),
            Target::Document(_) => None,
        };
        let (source, snippet) = match target {
            Target::SubUnit(unit) => self.excerpt(unit, term, script),
            Target::Document(document) => self.excerpt(document, term, script),
        };

        Ok(Some(MatchResult {
            token: token.to_string(),
            collection: parsed.collection,
            document_ref: number,
            sub_unit_ref,
            title,
            snippet,
            language: script,
            source,
        }))
    }

    async fn lookup_introduction(
        &self,
        token: &str,
        parsed: &ParsedReference,
        term: &str,
        script: Script,
    ) -> Result<Option<MatchResult>> {
        let Some(introduction) = self.store.introduction(&parsed.section_id).await? else {
            return Ok(None);
        };
        let (source, snippet) = self.excerpt(&introduction, term, script);
        Ok(Some(MatchResult {
            token: token.to_string(),
            collection: parsed.collection,
            document_ref: introduction.section_id.clone(),
            sub_unit_ref: None,
            title: introduction.title.clone(),
            snippet,
            language: script,
            source,
        }))
    }

    fn excerpt<T: TextFields + ?Sized>(
        &self,
        item: &T,
        term: &str,
        script: Script,
    ) -> (TextSource, String) {
        let Some((source, text)) = select_text(item, script, &self.options.translation_language)
        else {
            return (preference(script)[0], String::new());
        };
        let snippet =
            extract(&text, term).unwrap_or_else(|| leading_excerpt(&text, self.options.excerpt_chars));
        (source, snippet)
    }
}

#[derive(Clone, Copy)]
enum Target<'a> {
    Document(&'a Document),
    SubUnit(&'a SubUnit),
}

/// Rejects seed records: missing or non-canonical numbering, or a sentinel title.
pub fn is_valid_document(document: &Document) -> bool {
    let Some(number) = document.number.as_deref() else {
        return false;
    };
    if !CANONICAL_NUMBER.is_match(number.trim()) {
        return false;
    }
    let is_sentinel = document.title.as_deref().is_some_and(|title| {
        SENTINEL_TITLES
            .iter()
            .any(|sentinel| title.trim().eq_ignore_ascii_case(sentinel))
    });
    !is_sentinel
}

/// First candidate of the right family that is valid and numbered exactly `number`.
fn select_document(candidates: Vec<Document>, kind: DocumentKind, number: &str) -> Option<Document> {
    candidates.into_iter().find(|document| {
        document.kind.as_deref().is_some_and(|raw| kind.matches(raw))
            && is_valid_document(document)
            && document.number.as_deref().map(str::trim) == Some(number)
    })
}

/// Paragraph lookup: exact id, then `*.{sub}`, then `{main}.{sub}`.
pub fn find_sub_unit<'a>(units: &'a [SubUnit], main_id: &str, sub_id: &str) -> Option<&'a SubUnit> {
    let numbered = || {
        units
            .iter()
            .filter_map(|unit| unit.number.as_deref().map(|number| (number.trim(), unit)))
    };
    let suffix = format!(".{sub_id}");
    let qualified = format!("{main_id}.{sub_id}");

    numbered()
        .find(|(number, _)| *number == sub_id)
        .or_else(|| numbered().find(|(number, _)| number.ends_with(&suffix)))
        // Shadowed by the suffix rule, since `{main}.{sub}` always ends with `.{sub}`.
        // Kept so the lookup order stays exact, suffix, qualified.
        .or_else(|| numbered().find(|(number, _)| *number == qualified))
        .map(|(_, unit)| unit)
}

fn document_title(document: &Document, script: Script) -> Option<String> {
    let original = document.title.clone();
    let translated = document.title_translation.clone();
    match script {
        Script::Arabic => original.or(translated),
        Script::Latin => translated.or(original),
    }
}
