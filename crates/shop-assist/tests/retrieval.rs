//! Integration tests for the retrieval pipeline: reindexing and ranked
//! search over the in-memory store with the deterministic fallback
//! embedder.

use std::sync::Arc;

use shop_assist::retrieval::Retriever;
use shop_assist_core::embedding::FallbackEmbedder;
use shop_assist_core::models::{Document, DocumentStatus, Faq, ParentKind, Service};
use shop_assist_core::store::memory::InMemoryStore;
use shop_assist_core::store::{CatalogStore, ChunkStore};
use shop_assist_core::Error;

const DIMS: usize = 64;

fn retriever(store: Arc<InMemoryStore>) -> Retriever {
    Retriever::new(
        store.clone(),
        store,
        Arc::new(FallbackEmbedder::with_dims(DIMS)),
        1000,
        200,
    )
}

fn faq(id: &str, question: &str, answer: &str) -> Faq {
    Faq {
        id: id.to_string(),
        question: question.to_string(),
        answer: answer.to_string(),
        is_active: true,
    }
}

fn document(id: &str, title: &str, description: &str) -> Document {
    Document {
        id: id.to_string(),
        title: title.to_string(),
        original_name: None,
        description: Some(description.to_string()),
        keywords: vec![],
        status: DocumentStatus::Completed,
        is_active: true,
    }
}

#[tokio::test]
async fn keyword_match_wins_over_similarity() {
    // The shipping FAQ must come back for "shipping time" even though
    // fallback embeddings carry no semantic signal.
    let store = Arc::new(InMemoryStore::new());
    store
        .upsert_faq(&faq(
            "f1",
            "How long does shipping take?",
            "3-5 business days",
        ))
        .await
        .unwrap();
    store
        .upsert_faq(&faq("f2", "What payment methods do you accept?", "Cards and PayPal"))
        .await
        .unwrap();
    store
        .upsert_faq(&faq("f3", "Can I return a product?", "Within 14 days"))
        .await
        .unwrap();

    let retriever = retriever(store);
    retriever.reindex_all_faqs().await.unwrap();

    let hits = retriever.search_faqs("shipping time", 5).await.unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].id, "f1");
}

#[tokio::test]
async fn reindex_missing_parent_is_an_error() {
    let store = Arc::new(InMemoryStore::new());
    let retriever = retriever(store);

    let err = retriever.reindex_faq("nope").await.unwrap_err();
    assert!(matches!(
        err,
        Error::ParentNotFound {
            kind: ParentKind::Faq,
            ..
        }
    ));
}

#[tokio::test]
async fn search_with_nothing_indexed_is_empty_not_an_error() {
    let store = Arc::new(InMemoryStore::new());
    store
        .upsert_faq(&faq("f1", "Anything?", "Something."))
        .await
        .unwrap();

    // Parent exists but was never reindexed: zero chunks, empty result.
    let retriever = retriever(store);
    let hits = retriever.search_faqs("anything", 5).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn inactive_faq_is_skipped_and_sheds_stale_chunks() {
    let store = Arc::new(InMemoryStore::new());
    let mut record = faq("f1", "Old question?", "Old answer");
    store.upsert_faq(&record).await.unwrap();

    let retriever = retriever(store.clone());
    assert!(retriever.reindex_faq("f1").await.unwrap() > 0);

    // Deactivate and reindex: the stale set must disappear.
    record.is_active = false;
    store.upsert_faq(&record).await.unwrap();
    assert_eq!(retriever.reindex_faq("f1").await.unwrap(), 0);
    assert_eq!(store.chunk_count(ParentKind::Faq).await.unwrap(), 0);
}

#[tokio::test]
async fn processing_document_never_surfaces_in_search() {
    let store = Arc::new(InMemoryStore::new());
    let mut doc = document("d1", "Transport Regulations", "Rules for shipping wine abroad");
    store.upsert_document(&doc).await.unwrap();

    let retriever = retriever(store.clone());
    assert!(retriever.reindex_document("d1").await.unwrap() > 0);

    // Chunks exist from the prior pass, but the document slid back to
    // PROCESSING — it must not appear in results.
    doc.status = DocumentStatus::Processing;
    store.upsert_document(&doc).await.unwrap();
    let hits = retriever.search_documents("shipping", 5).await.unwrap();
    assert!(hits.is_empty());

    // Completed again: searchable.
    doc.status = DocumentStatus::Completed;
    store.upsert_document(&doc).await.unwrap();
    let hits = retriever.search_documents("shipping", 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document.id, "d1");
    assert!(!hits[0].snippet.is_empty());
}

#[tokio::test]
async fn reindex_is_idempotent() {
    let store = Arc::new(InMemoryStore::new());
    store
        .upsert_document(&document(
            "d1",
            "Catalog",
            &"A long description of regional products. ".repeat(80),
        ))
        .await
        .unwrap();

    let retriever = retriever(store.clone());
    let first = retriever.reindex_document("d1").await.unwrap();
    assert!(first > 1, "long text must produce multiple chunks");

    let second = retriever.reindex_document("d1").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        store.chunk_count(ParentKind::Document).await.unwrap(),
        second as u64
    );
}

#[tokio::test]
async fn service_search_returns_capped_parent_records() {
    let store = Arc::new(InMemoryStore::new());
    for i in 0..8 {
        store
            .upsert_service(&Service {
                id: format!("s{i}"),
                name: format!("Service number {i}"),
                description: "General assistance".to_string(),
                price: 10.0 + i as f64,
                is_active: true,
            })
            .await
            .unwrap();
    }
    store
        .upsert_service(&Service {
            id: "cook".to_string(),
            name: "Cooking Class".to_string(),
            description: "Hands-on pasta making with a chef".to_string(),
            price: 89.0,
            is_active: true,
        })
        .await
        .unwrap();

    let retriever = retriever(store);
    retriever.reindex_all_services().await.unwrap();

    let hits = retriever.search_services("cooking class", 3).await.unwrap();
    assert!(hits.len() <= 3);
    assert_eq!(hits[0].id, "cook", "keyword match must rank first");

    // One result per parent, no duplicates.
    let mut ids: Vec<&str> = hits.iter().map(|s| s.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), hits.len());
}
