//! Storage abstraction for the retrieval engine.
//!
//! Two traits split the persistence surface the engine consumes:
//! [`ChunkStore`] owns the chunk sets derived from parent entities,
//! and [`CatalogStore`] is the read/write view of the parent records
//! themselves. The SQLite implementation lives in the app crate;
//! [`memory::InMemoryStore`] implements both for tests and offline
//! runs.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, Document, Faq, ParentKind, Product, Service};

/// Filters accepted by product keyword search.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Free-text keyword search across name, description, category, tags.
    pub search: Option<String>,
    /// Restrict to a category (substring match, case-insensitive).
    pub category: Option<String>,
    /// Active flag; `None` defaults to active-only.
    pub is_active: Option<bool>,
    /// Cap on returned products.
    pub limit: Option<usize>,
}

/// Articles and determiners that carry no search signal.
///
/// The shop serves an Italian catalog to an international audience, so
/// both languages are represented.
const STOP_WORDS: &[&str] = &[
    "il", "lo", "la", "i", "gli", "le", "un", "uno", "una", "the", "a", "an", "di", "del",
    "della", "dei", "degli", "delle",
];

/// Split a product query into lower-cased keywords, dropping stop
/// words. If every word was a stop word, the raw words are kept so the
/// search still has something to match on.
pub fn product_search_terms(query: &str) -> Vec<String> {
    let raw: Vec<String> = query
        .trim()
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect();

    let filtered: Vec<String> = raw
        .iter()
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .cloned()
        .collect();

    if filtered.is_empty() {
        raw
    } else {
        filtered
    }
}

/// Whether a product matches every given keyword. Each keyword may hit
/// any of name, description, category, or tags. Requiring all keywords
/// is what lets a narrowed retry (first word only) rescue a query that
/// was too specific.
pub fn product_matches(product: &Product, terms: &[String]) -> bool {
    let name = product.name.to_lowercase();
    let description = product.description.to_lowercase();
    let category = product
        .category
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();

    terms.iter().all(|term| {
        name.contains(term.as_str())
            || description.contains(term.as_str())
            || category.contains(term.as_str())
            || product
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(term.as_str()))
    })
}

/// Persistence for the chunk sets derived from parent entities.
///
/// A chunk set is exclusively owned by its parent: replacing it swaps
/// the whole set, deleting the parent's chunks removes every one.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Atomically replace the parent's chunk set with `chunks`.
    async fn replace_chunks(
        &self,
        kind: ParentKind,
        parent_id: &str,
        chunks: &[Chunk],
    ) -> Result<()>;

    /// Delete every chunk belonging to the parent.
    async fn delete_chunks(&self, kind: ParentKind, parent_id: &str) -> Result<()>;

    /// All chunks belonging to any of the given parents, ordered by
    /// parent id and sequence index.
    async fn chunks_for_parents(
        &self,
        kind: ParentKind,
        parent_ids: &[String],
    ) -> Result<Vec<Chunk>>;

    /// Total number of chunks stored for a kind.
    async fn chunk_count(&self, kind: ParentKind) -> Result<u64>;
}

/// Read/write view of the catalog entities the engine retrieves over.
///
/// The engine only reads parents during reindexing and search; the
/// upsert methods exist for catalog import and tests.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn faq(&self, id: &str) -> Result<Option<Faq>>;
    async fn active_faqs(&self) -> Result<Vec<Faq>>;
    async fn upsert_faq(&self, faq: &Faq) -> Result<()>;

    async fn service(&self, id: &str) -> Result<Option<Service>>;
    async fn active_services(&self) -> Result<Vec<Service>>;
    async fn upsert_service(&self, service: &Service) -> Result<()>;

    async fn document(&self, id: &str) -> Result<Option<Document>>;
    /// Documents that are active and fully processed.
    async fn searchable_documents(&self) -> Result<Vec<Document>>;
    async fn upsert_document(&self, document: &Document) -> Result<()>;

    /// Keyword search over products (no embeddings involved).
    async fn search_products(&self, filter: &ProductFilter) -> Result<Vec<Product>>;
    async fn upsert_product(&self, product: &Product) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, description: &str, category: &str, tags: &[&str]) -> Product {
        Product {
            id: "p1".into(),
            name: name.into(),
            description: description.into(),
            price: 12.5,
            category: Some(category.into()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            is_active: true,
        }
    }

    #[test]
    fn stop_words_are_dropped() {
        assert_eq!(
            product_search_terms("il parmigiano della nonna"),
            vec!["parmigiano".to_string(), "nonna".to_string()]
        );
    }

    #[test]
    fn all_stop_words_falls_back_to_raw() {
        assert_eq!(
            product_search_terms("il la le"),
            vec!["il".to_string(), "la".to_string(), "le".to_string()]
        );
    }

    #[test]
    fn matches_name_description_category_and_tags() {
        let p = product(
            "Parmigiano Reggiano",
            "Aged 24 months",
            "Cheese",
            &["premium", "dop"],
        );
        assert!(product_matches(&p, &["parmigiano".to_string()]));
        assert!(product_matches(&p, &["aged".to_string()]));
        assert!(product_matches(&p, &["cheese".to_string()]));
        assert!(product_matches(&p, &["premium".to_string()]));
        assert!(!product_matches(&p, &["chianti".to_string()]));
    }

    #[test]
    fn every_term_must_match() {
        let p = product("Extra Virgin Olive Oil", "Cold pressed", "Oils", &[]);
        assert!(product_matches(
            &p,
            &["extra".to_string(), "olive".to_string()]
        ));
        assert!(!product_matches(
            &p,
            &["extra".to_string(), "deluxe".to_string()]
        ));
    }
}
