//! SQLite-backed implementation of the store traits.
//!
//! Maps every [`ChunkStore`] and [`CatalogStore`] operation to SQL
//! against the schema created by [`crate::migrate`]. Embeddings are
//! stored as little-endian `f32` BLOBs; a stored vector that does not
//! decode to the expected dimensionality is logged and surfaced as a
//! missing embedding, so ranking treats it as a zero vector instead of
//! failing the search.

use std::collections::HashSet;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use shop_assist_core::embedding::{decode_embedding, vec_to_blob};
use shop_assist_core::models::{Chunk, Document, DocumentStatus, Faq, ParentKind, Product, Service};
use shop_assist_core::store::{
    product_matches, product_search_terms, CatalogStore, ChunkStore, ProductFilter,
};

/// SQLite implementation of [`ChunkStore`] and [`CatalogStore`].
pub struct SqliteStore {
    pool: SqlitePool,
    dims: usize,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, dims: usize) -> Self {
        Self { pool, dims }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Row counts per table, for `shopctl stats`.
    pub async fn counts(&self) -> Result<Vec<(&'static str, i64)>> {
        let mut out = Vec::new();
        for table in ["products", "faqs", "services", "documents", "chunks"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&self.pool)
                .await?;
            out.push((table, count));
        }
        Ok(out)
    }

    fn row_to_chunk(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Chunk> {
        let kind_str: String = row.try_get("parent_kind")?;
        let kind = parse_parent_kind(&kind_str)?;
        let id: String = row.try_get("id")?;
        let blob: Option<Vec<u8>> = row.try_get("embedding")?;

        let embedding = match blob {
            Some(bytes) => match decode_embedding(&bytes, self.dims) {
                Ok(vec) => Some(vec),
                Err(e) => {
                    warn!(chunk_id = %id, error = %e, "dropping malformed stored embedding");
                    None
                }
            },
            None => None,
        };

        Ok(Chunk {
            id,
            parent_kind: kind,
            parent_id: row.try_get("parent_id")?,
            sequence_index: row.try_get("sequence_index")?,
            content: row.try_get("content")?,
            embedding,
            page_number: row.try_get("page_number")?,
        })
    }
}

fn parse_parent_kind(s: &str) -> Result<ParentKind> {
    match s {
        "faq" => Ok(ParentKind::Faq),
        "service" => Ok(ParentKind::Service),
        "document" => Ok(ParentKind::Document),
        other => Err(anyhow!("unknown parent kind in chunks table: '{other}'")),
    }
}

fn parse_status(s: &str) -> DocumentStatus {
    DocumentStatus::parse(s).unwrap_or(DocumentStatus::Failed)
}

fn tags_from_json(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

#[async_trait]
impl ChunkStore for SqliteStore {
    async fn replace_chunks(
        &self,
        kind: ParentKind,
        parent_id: &str,
        chunks: &[Chunk],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE parent_kind = ? AND parent_id = ?")
            .bind(kind.as_str())
            .bind(parent_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            let blob = chunk.embedding.as_deref().map(vec_to_blob);
            sqlx::query(
                r#"
                INSERT INTO chunks (id, parent_kind, parent_id, sequence_index,
                                    content, embedding, page_number)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(chunk.parent_kind.as_str())
            .bind(&chunk.parent_id)
            .bind(chunk.sequence_index)
            .bind(&chunk.content)
            .bind(blob)
            .bind(chunk.page_number)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_chunks(&self, kind: ParentKind, parent_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM chunks WHERE parent_kind = ? AND parent_id = ?")
            .bind(kind.as_str())
            .bind(parent_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn chunks_for_parents(
        &self,
        kind: ParentKind,
        parent_ids: &[String],
    ) -> Result<Vec<Chunk>> {
        let wanted: HashSet<&str> = parent_ids.iter().map(String::as_str).collect();

        let rows = sqlx::query(
            "SELECT id, parent_kind, parent_id, sequence_index, content, embedding, page_number
             FROM chunks WHERE parent_kind = ?
             ORDER BY parent_id, sequence_index",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut chunks = Vec::new();
        for row in &rows {
            let parent_id: String = row.try_get("parent_id")?;
            if wanted.contains(parent_id.as_str()) {
                chunks.push(self.row_to_chunk(row)?);
            }
        }
        Ok(chunks)
    }

    async fn chunk_count(&self, kind: ParentKind) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE parent_kind = ?")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn faq(&self, id: &str) -> Result<Option<Faq>> {
        let row = sqlx::query("SELECT id, question, answer, is_active FROM faqs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Faq {
            id: r.get("id"),
            question: r.get("question"),
            answer: r.get("answer"),
            is_active: r.get::<i64, _>("is_active") != 0,
        }))
    }

    async fn active_faqs(&self) -> Result<Vec<Faq>> {
        let rows = sqlx::query(
            "SELECT id, question, answer, is_active FROM faqs
             WHERE is_active = 1 ORDER BY question",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| Faq {
                id: r.get("id"),
                question: r.get("question"),
                answer: r.get("answer"),
                is_active: true,
            })
            .collect())
    }

    async fn upsert_faq(&self, faq: &Faq) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO faqs (id, question, answer, is_active)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                question = excluded.question,
                answer = excluded.answer,
                is_active = excluded.is_active
            "#,
        )
        .bind(&faq.id)
        .bind(&faq.question)
        .bind(&faq.answer)
        .bind(faq.is_active as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn service(&self, id: &str) -> Result<Option<Service>> {
        let row =
            sqlx::query("SELECT id, name, description, price, is_active FROM services WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|r| Service {
            id: r.get("id"),
            name: r.get("name"),
            description: r.get("description"),
            price: r.get("price"),
            is_active: r.get::<i64, _>("is_active") != 0,
        }))
    }

    async fn active_services(&self) -> Result<Vec<Service>> {
        let rows = sqlx::query(
            "SELECT id, name, description, price, is_active FROM services
             WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| Service {
                id: r.get("id"),
                name: r.get("name"),
                description: r.get("description"),
                price: r.get("price"),
                is_active: true,
            })
            .collect())
    }

    async fn upsert_service(&self, service: &Service) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO services (id, name, description, price, is_active)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                price = excluded.price,
                is_active = excluded.is_active
            "#,
        )
        .bind(&service.id)
        .bind(&service.name)
        .bind(&service.description)
        .bind(service.price)
        .bind(service.is_active as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, title, original_name, description, keywords_json, status, is_active
             FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Document {
            id: r.get("id"),
            title: r.get("title"),
            original_name: r.get("original_name"),
            description: r.get("description"),
            keywords: tags_from_json(&r.get::<String, _>("keywords_json")),
            status: parse_status(&r.get::<String, _>("status")),
            is_active: r.get::<i64, _>("is_active") != 0,
        }))
    }

    async fn searchable_documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, title, original_name, description, keywords_json, status, is_active
             FROM documents WHERE is_active = 1 AND status = 'COMPLETED' ORDER BY title",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| Document {
                id: r.get("id"),
                title: r.get("title"),
                original_name: r.get("original_name"),
                description: r.get("description"),
                keywords: tags_from_json(&r.get::<String, _>("keywords_json")),
                status: DocumentStatus::Completed,
                is_active: true,
            })
            .collect())
    }

    async fn upsert_document(&self, document: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, title, original_name, description,
                                   keywords_json, status, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                original_name = excluded.original_name,
                description = excluded.description,
                keywords_json = excluded.keywords_json,
                status = excluded.status,
                is_active = excluded.is_active
            "#,
        )
        .bind(&document.id)
        .bind(&document.title)
        .bind(&document.original_name)
        .bind(&document.description)
        .bind(serde_json::to_string(&document.keywords)?)
        .bind(document.status.as_str())
        .bind(document.is_active as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn search_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let active = filter.is_active.unwrap_or(true);
        let rows = sqlx::query(
            "SELECT id, name, description, price, category, tags_json, is_active
             FROM products WHERE is_active = ? ORDER BY name",
        )
        .bind(active as i64)
        .fetch_all(&self.pool)
        .await?;

        let terms = filter.search.as_deref().map(product_search_terms);
        let category = filter.category.as_deref().map(str::to_lowercase);

        let mut products: Vec<Product> = rows
            .iter()
            .map(|r| Product {
                id: r.get("id"),
                name: r.get("name"),
                description: r.get("description"),
                price: r.get("price"),
                category: r.get("category"),
                tags: tags_from_json(&r.get::<String, _>("tags_json")),
                is_active: r.get::<i64, _>("is_active") != 0,
            })
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
            .collect();

        if let Some(limit) = filter.limit {
            products.truncate(limit);
        }
        Ok(products)
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, category, tags_json, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                price = excluded.price,
                category = excluded.category,
                tags_json = excluded.tags_json,
                is_active = excluded.is_active
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.category)
        .bind(serde_json::to_string(&product.tags)?)
        .bind(product.is_active as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
