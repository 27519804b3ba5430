//! Catalog import: seed the database from a JSON file.
//!
//! The file carries four optional arrays — `products`, `faqs`,
//! `services`, `documents` — in the shape the admin backend exports.
//! Ids are generated when absent, records default to active, and
//! imported documents default to `COMPLETED` (anything still
//! processing has no business in a seed file).

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use uuid::Uuid;

use shop_assist_core::models::{Document, DocumentStatus, Faq, Product, Service};
use shop_assist_core::store::CatalogStore;

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    products: Vec<ProductSeed>,
    #[serde(default)]
    faqs: Vec<FaqSeed>,
    #[serde(default)]
    services: Vec<ServiceSeed>,
    #[serde(default)]
    documents: Vec<DocumentSeed>,
}

#[derive(Debug, Deserialize)]
struct ProductSeed {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    price: f64,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default = "default_active")]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct FaqSeed {
    #[serde(default)]
    id: Option<String>,
    question: String,
    answer: String,
    #[serde(default = "default_active")]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct ServiceSeed {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    price: f64,
    #[serde(default = "default_active")]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct DocumentSeed {
    #[serde(default)]
    id: Option<String>,
    title: String,
    #[serde(default)]
    original_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default = "default_status")]
    status: DocumentStatus,
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}

fn default_status() -> DocumentStatus {
    DocumentStatus::Completed
}

fn id_or_new(id: Option<String>) -> String {
    id.unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Counts of records written by an import.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImportSummary {
    pub products: usize,
    pub faqs: usize,
    pub services: usize,
    pub documents: usize,
}

/// Import a JSON catalog file into the store.
pub async fn import_catalog(store: &dyn CatalogStore, path: &Path) -> Result<ImportSummary> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
    let catalog: CatalogFile =
        serde_json::from_str(&content).with_context(|| "Failed to parse catalog file")?;

    let mut summary = ImportSummary::default();

    for seed in catalog.products {
        store
            .upsert_product(&Product {
                id: id_or_new(seed.id),
                name: seed.name,
                description: seed.description,
                price: seed.price,
                category: seed.category,
                tags: seed.tags,
                is_active: seed.is_active,
            })
            .await?;
        summary.products += 1;
    }

    for seed in catalog.faqs {
        store
            .upsert_faq(&Faq {
                id: id_or_new(seed.id),
                question: seed.question,
                answer: seed.answer,
                is_active: seed.is_active,
            })
            .await?;
        summary.faqs += 1;
    }

    for seed in catalog.services {
        store
            .upsert_service(&Service {
                id: id_or_new(seed.id),
                name: seed.name,
                description: seed.description,
                price: seed.price,
                is_active: seed.is_active,
            })
            .await?;
        summary.services += 1;
    }

    for seed in catalog.documents {
        store
            .upsert_document(&Document {
                id: id_or_new(seed.id),
                title: seed.title,
                original_name: seed.original_name,
                description: seed.description,
                keywords: seed.keywords,
                status: seed.status,
                is_active: seed.is_active,
            })
            .await?;
        summary.documents += 1;
    }

    Ok(summary)
}
