//! Per-entity retrieval orchestration.
//!
//! The [`Retriever`] owns the write path (chunk → embed → swap the
//! parent's chunk set) and the read path (embed query → hybrid rank →
//! map back to parent records) for the three chunked entity kinds:
//! FAQs, services, and documents.
//!
//! Eligibility is enforced at both boundaries: an inactive parent (or
//! a document that is not `COMPLETED`) is never chunked, and its
//! chunks are never consulted by a search — reindexing an ineligible
//! parent deletes whatever stale set it left behind.
//!
//! Reindexing a missing parent is a [`Error::ParentNotFound`];
//! searching a collection with zero eligible chunks returns an empty
//! result.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use shop_assist_core::chunk::split_into_chunks;
use shop_assist_core::embedding::EmbeddingProvider;
use shop_assist_core::models::{
    Chunk, Document, Faq, ParentKind, RankCandidate, Service,
};
use shop_assist_core::similarity::rank;
use shop_assist_core::store::{CatalogStore, ChunkStore};
use shop_assist_core::{Error, Result};

/// Characters of chunk content carried on a document search hit.
const SNIPPET_CHARS: usize = 300;

/// A document search hit with its best-matching excerpt.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentHit {
    #[serde(flatten)]
    pub document: Document,
    pub snippet: String,
    pub similarity: f32,
}

/// Orchestrates chunking, embedding, and ranked search per entity kind.
pub struct Retriever {
    chunks: Arc<dyn ChunkStore>,
    catalog: Arc<dyn CatalogStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    max_chunk_chars: usize,
    chunk_overlap: usize,
}

impl Retriever {
    pub fn new(
        chunks: Arc<dyn ChunkStore>,
        catalog: Arc<dyn CatalogStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        max_chunk_chars: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            chunks,
            catalog,
            embedder,
            max_chunk_chars,
            chunk_overlap,
        }
    }

    // ---- write path ----

    /// Rebuild the chunk set for one FAQ. Returns the chunk count.
    pub async fn reindex_faq(&self, id: &str) -> Result<usize> {
        let faq = self
            .catalog
            .faq(id)
            .await?
            .ok_or_else(|| Error::ParentNotFound {
                kind: ParentKind::Faq,
                id: id.to_string(),
            })?;

        if !faq.is_active {
            return self.skip_ineligible(ParentKind::Faq, id).await;
        }

        self.replace_parent_chunks(ParentKind::Faq, id, &faq.source_text())
            .await
    }

    /// Rebuild the chunk set for one service.
    pub async fn reindex_service(&self, id: &str) -> Result<usize> {
        let service = self
            .catalog
            .service(id)
            .await?
            .ok_or_else(|| Error::ParentNotFound {
                kind: ParentKind::Service,
                id: id.to_string(),
            })?;

        if !service.is_active {
            return self.skip_ineligible(ParentKind::Service, id).await;
        }

        self.replace_parent_chunks(ParentKind::Service, id, &service.source_text())
            .await
    }

    /// Rebuild the chunk set for one document.
    pub async fn reindex_document(&self, id: &str) -> Result<usize> {
        let document =
            self.catalog
                .document(id)
                .await?
                .ok_or_else(|| Error::ParentNotFound {
                    kind: ParentKind::Document,
                    id: id.to_string(),
                })?;

        if !document.is_searchable() {
            return self.skip_ineligible(ParentKind::Document, id).await;
        }

        self.replace_parent_chunks(ParentKind::Document, id, &document.source_text())
            .await
    }

    /// Reindex every active FAQ. Returns (parents, chunks) totals.
    pub async fn reindex_all_faqs(&self) -> Result<(usize, usize)> {
        let faqs = self.catalog.active_faqs().await?;
        let mut total_chunks = 0;
        for faq in &faqs {
            total_chunks += self.reindex_faq(&faq.id).await?;
        }
        Ok((faqs.len(), total_chunks))
    }

    /// Reindex every active service.
    pub async fn reindex_all_services(&self) -> Result<(usize, usize)> {
        let services = self.catalog.active_services().await?;
        let mut total_chunks = 0;
        for service in &services {
            total_chunks += self.reindex_service(&service.id).await?;
        }
        Ok((services.len(), total_chunks))
    }

    /// Reindex every searchable document.
    pub async fn reindex_all_documents(&self) -> Result<(usize, usize)> {
        let documents = self.catalog.searchable_documents().await?;
        let mut total_chunks = 0;
        for document in &documents {
            total_chunks += self.reindex_document(&document.id).await?;
        }
        Ok((documents.len(), total_chunks))
    }

    /// An ineligible parent produces no chunks and sheds any stale set
    /// left over from when it was eligible. Not an error.
    async fn skip_ineligible(&self, kind: ParentKind, id: &str) -> Result<usize> {
        info!(%kind, id, "parent not eligible, clearing its chunks");
        self.chunks.delete_chunks(kind, id).await?;
        Ok(0)
    }

    async fn replace_parent_chunks(
        &self,
        kind: ParentKind,
        parent_id: &str,
        source_text: &str,
    ) -> Result<usize> {
        let pieces = split_into_chunks(source_text, self.max_chunk_chars, self.chunk_overlap);

        let mut chunks = Vec::with_capacity(pieces.len());
        for (index, content) in pieces.into_iter().enumerate() {
            let embedding = self.embedder.embed(&content).await?;
            chunks.push(Chunk::new(
                kind,
                parent_id,
                index as i64,
                content,
                Some(embedding),
            ));
        }

        self.chunks.replace_chunks(kind, parent_id, &chunks).await?;
        info!(%kind, parent_id, chunks = chunks.len(), "reindexed parent");
        Ok(chunks.len())
    }

    // ---- read path ----

    /// Search FAQs, returning at most `limit` parent records.
    pub async fn search_faqs(&self, query: &str, limit: usize) -> Result<Vec<Faq>> {
        let faqs = self.catalog.active_faqs().await?;
        let by_id: HashMap<&str, &Faq> = faqs.iter().map(|f| (f.id.as_str(), f)).collect();

        let ranked = self
            .rank_for_kind(
                ParentKind::Faq,
                query,
                limit,
                faqs.iter().map(|f| (f.id.clone(), f.searchable_text())),
            )
            .await?;

        Ok(ranked
            .into_iter()
            .filter_map(|r| by_id.get(r.parent_id.as_str()).map(|&f| f.clone()))
            .collect())
    }

    /// Search services, returning at most `limit` parent records.
    pub async fn search_services(&self, query: &str, limit: usize) -> Result<Vec<Service>> {
        let services = self.catalog.active_services().await?;
        let by_id: HashMap<&str, &Service> =
            services.iter().map(|s| (s.id.as_str(), s)).collect();

        let ranked = self
            .rank_for_kind(
                ParentKind::Service,
                query,
                limit,
                services.iter().map(|s| (s.id.clone(), s.searchable_text())),
            )
            .await?;

        Ok(ranked
            .into_iter()
            .filter_map(|r| by_id.get(r.parent_id.as_str()).map(|&s| s.clone()))
            .collect())
    }

    /// Search documents, returning hits with the best chunk's excerpt.
    pub async fn search_documents(&self, query: &str, limit: usize) -> Result<Vec<DocumentHit>> {
        let documents = self.catalog.searchable_documents().await?;
        let by_id: HashMap<&str, &Document> =
            documents.iter().map(|d| (d.id.as_str(), d)).collect();

        let ranked = self
            .rank_for_kind(
                ParentKind::Document,
                query,
                limit,
                documents
                    .iter()
                    .map(|d| (d.id.clone(), d.searchable_text())),
            )
            .await?;

        Ok(ranked
            .into_iter()
            .filter_map(|r| {
                by_id.get(r.parent_id.as_str()).map(|&d| DocumentHit {
                    document: d.clone(),
                    snippet: r.best_chunk.content.chars().take(SNIPPET_CHARS).collect(),
                    similarity: r.similarity,
                })
            })
            .collect())
    }

    /// Shared read path: gather eligible parents' chunks, embed the
    /// query, run hybrid ranking. Zero chunks means an empty result,
    /// not an error.
    async fn rank_for_kind(
        &self,
        kind: ParentKind,
        query: &str,
        limit: usize,
        parents: impl Iterator<Item = (String, String)>,
    ) -> Result<Vec<shop_assist_core::models::RankedResult>> {
        let searchable: HashMap<String, String> = parents.collect();
        if searchable.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = searchable.keys().cloned().collect();
        let chunks = self.chunks.chunks_for_parents(kind, &ids).await?;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed(query).await?;

        let candidates: Vec<RankCandidate> = chunks
            .into_iter()
            .filter_map(|chunk| {
                searchable
                    .get(chunk.parent_id.as_str())
                    .map(|text| RankCandidate {
                        searchable_text: text.clone(),
                        chunk,
                    })
            })
            .collect();

        Ok(rank(&query_vec, query, &candidates, limit))
    }
}
