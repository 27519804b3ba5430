//! In-memory store implementation for tests and offline runs.
//!
//! `HashMap`s and `Vec`s behind `std::sync::RwLock`. Chunk retrieval
//! is a linear scan — fine at catalog scale, and mirrors what the
//! SQLite store does with an index.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, Document, Faq, ParentKind, Product, Service};

use super::{product_matches, product_search_terms, CatalogStore, ChunkStore, ProductFilter};

/// In-memory implementation of [`ChunkStore`] and [`CatalogStore`].
#[derive(Default)]
pub struct InMemoryStore {
    faqs: RwLock<HashMap<String, Faq>>,
    services: RwLock<HashMap<String, Service>>,
    documents: RwLock<HashMap<String, Document>>,
    products: RwLock<HashMap<String, Product>>,
    chunks: RwLock<Vec<Chunk>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChunkStore for InMemoryStore {
    async fn replace_chunks(
        &self,
        kind: ParentKind,
        parent_id: &str,
        chunks: &[Chunk],
    ) -> Result<()> {
        let mut stored = self.chunks.write().unwrap();
        stored.retain(|c| !(c.parent_kind == kind && c.parent_id == parent_id));
        stored.extend_from_slice(chunks);
        Ok(())
    }

    async fn delete_chunks(&self, kind: ParentKind, parent_id: &str) -> Result<()> {
        let mut stored = self.chunks.write().unwrap();
        stored.retain(|c| !(c.parent_kind == kind && c.parent_id == parent_id));
        Ok(())
    }

    async fn chunks_for_parents(
        &self,
        kind: ParentKind,
        parent_ids: &[String],
    ) -> Result<Vec<Chunk>> {
        let stored = self.chunks.read().unwrap();
        let mut out: Vec<Chunk> = stored
            .iter()
            .filter(|c| c.parent_kind == kind && parent_ids.contains(&c.parent_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.parent_id
                .cmp(&b.parent_id)
                .then(a.sequence_index.cmp(&b.sequence_index))
        });
        Ok(out)
    }

    async fn chunk_count(&self, kind: ParentKind) -> Result<u64> {
        let stored = self.chunks.read().unwrap();
        Ok(stored.iter().filter(|c| c.parent_kind == kind).count() as u64)
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn faq(&self, id: &str) -> Result<Option<Faq>> {
        Ok(self.faqs.read().unwrap().get(id).cloned())
    }

    async fn active_faqs(&self) -> Result<Vec<Faq>> {
        let mut faqs: Vec<Faq> = self
            .faqs
            .read()
            .unwrap()
            .values()
            .filter(|f| f.is_active)
            .cloned()
            .collect();
        faqs.sort_by(|a, b| a.question.cmp(&b.question));
        Ok(faqs)
    }

    async fn upsert_faq(&self, faq: &Faq) -> Result<()> {
        self.faqs
            .write()
            .unwrap()
            .insert(faq.id.clone(), faq.clone());
        Ok(())
    }

    async fn service(&self, id: &str) -> Result<Option<Service>> {
        Ok(self.services.read().unwrap().get(id).cloned())
    }

    async fn active_services(&self) -> Result<Vec<Service>> {
        let mut services: Vec<Service> = self
            .services
            .read()
            .unwrap()
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(services)
    }

    async fn upsert_service(&self, service: &Service) -> Result<()> {
        self.services
            .write()
            .unwrap()
            .insert(service.id.clone(), service.clone());
        Ok(())
    }

    async fn document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.documents.read().unwrap().get(id).cloned())
    }

    async fn searchable_documents(&self) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = self
            .documents
            .read()
            .unwrap()
            .values()
            .filter(|d| d.is_searchable())
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(docs)
    }

    async fn upsert_document(&self, document: &Document) -> Result<()> {
        self.documents
            .write()
            .unwrap()
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn search_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let active_only = filter.is_active.unwrap_or(true);
        let terms = filter.search.as_deref().map(product_search_terms);
        let category = filter.category.as_deref().map(str::to_lowercase);

        let mut products: Vec<Product> = self
            .products
            .read()
            .unwrap()
            .values()
            .filter(|p| p.is_active == active_only)
            .filter(|p| match &category {
                Some(cat) => p
                    .category
                    .as_deref()
                    .map(|c| c.to_lowercase().contains(cat.as_str()))
                    .unwrap_or(false),
                None => true,
            })
            .filter(|p| match &terms {
                Some(terms) => product_matches(p, terms),
                None => true,
            })
            .cloned()
            .collect();

        products.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(limit) = filter.limit {
            products.truncate(limit);
        }
        Ok(products)
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        self.products
            .write()
            .unwrap()
            .insert(product.id.clone(), product.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentStatus;

    fn chunk(kind: ParentKind, parent_id: &str, index: i64) -> Chunk {
        Chunk {
            id: format!("{parent_id}-{index}"),
            parent_kind: kind,
            parent_id: parent_id.to_string(),
            sequence_index: index,
            content: format!("chunk {index}"),
            embedding: None,
            page_number: None,
        }
    }

    #[tokio::test]
    async fn replace_chunks_swaps_the_whole_set() {
        let store = InMemoryStore::new();
        let first = vec![
            chunk(ParentKind::Faq, "f1", 0),
            chunk(ParentKind::Faq, "f1", 1),
            chunk(ParentKind::Faq, "f1", 2),
        ];
        store
            .replace_chunks(ParentKind::Faq, "f1", &first)
            .await
            .unwrap();

        let second = vec![chunk(ParentKind::Faq, "f1", 0)];
        store
            .replace_chunks(ParentKind::Faq, "f1", &second)
            .await
            .unwrap();

        assert_eq!(store.chunk_count(ParentKind::Faq).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn chunks_are_scoped_by_kind() {
        let store = InMemoryStore::new();
        store
            .replace_chunks(ParentKind::Faq, "x", &[chunk(ParentKind::Faq, "x", 0)])
            .await
            .unwrap();
        store
            .replace_chunks(
                ParentKind::Service,
                "x",
                &[chunk(ParentKind::Service, "x", 0)],
            )
            .await
            .unwrap();

        store.delete_chunks(ParentKind::Faq, "x").await.unwrap();
        assert_eq!(store.chunk_count(ParentKind::Faq).await.unwrap(), 0);
        assert_eq!(store.chunk_count(ParentKind::Service).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn searchable_documents_applies_both_filters() {
        let store = InMemoryStore::new();
        let mut doc = Document {
            id: "d1".into(),
            title: "Shipping Rules".into(),
            original_name: None,
            description: None,
            keywords: vec![],
            status: DocumentStatus::Processing,
            is_active: true,
        };
        store.upsert_document(&doc).await.unwrap();
        assert!(store.searchable_documents().await.unwrap().is_empty());

        doc.status = DocumentStatus::Completed;
        store.upsert_document(&doc).await.unwrap();
        assert_eq!(store.searchable_documents().await.unwrap().len(), 1);

        doc.is_active = false;
        store.upsert_document(&doc).await.unwrap();
        assert!(store.searchable_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn product_search_filters_by_keyword() {
        let store = InMemoryStore::new();
        for (id, name, category) in [
            ("p1", "Parmigiano Reggiano", "Cheese"),
            ("p2", "Chianti Classico", "Wine"),
        ] {
            store
                .upsert_product(&Product {
                    id: id.into(),
                    name: name.into(),
                    description: String::new(),
                    price: 20.0,
                    category: Some(category.into()),
                    tags: vec![],
                    is_active: true,
                })
                .await
                .unwrap();
        }

        let hits = store
            .search_products(&ProductFilter {
                search: Some("parmigiano".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "p1");

        let all = store
            .search_products(&ProductFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }
}
