//! Core data models for the retrieval engine.
//!
//! These types represent the catalog entities (FAQs, services,
//! documents, products), the chunks derived from them, and the ranked
//! results that flow out of a search.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of entity a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentKind {
    Faq,
    Service,
    Document,
}

impl ParentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParentKind::Faq => "faq",
            ParentKind::Service => "service",
            ParentKind::Document => "document",
        }
    }
}

impl fmt::Display for ParentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upload/processing lifecycle of a document.
///
/// Only `Completed` documents are eligible for chunking and search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploading => "UPLOADING",
            DocumentStatus::Processing => "PROCESSING",
            DocumentStatus::Completed => "COMPLETED",
            DocumentStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UPLOADING" => Some(DocumentStatus::Uploading),
            "PROCESSING" => Some(DocumentStatus::Processing),
            "COMPLETED" => Some(DocumentStatus::Completed),
            "FAILED" => Some(DocumentStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A question/answer pair from the store's FAQ list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faq {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub is_active: bool,
}

impl Faq {
    /// The text that gets chunked and embedded for this FAQ.
    pub fn source_text(&self) -> String {
        format!("{}\n{}", self.question, self.answer)
    }

    /// Lower-cased fields used for keyword matching during ranking.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.question, self.answer).to_lowercase()
    }
}

/// A bookable service (cooking class, catering, consultation, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub is_active: bool,
}

impl Service {
    pub fn source_text(&self) -> String {
        format!(
            "{} - {} - Price: €{:.2}",
            self.name, self.description, self.price
        )
    }

    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.name, self.description).to_lowercase()
    }
}

/// An uploaded knowledge-base document.
///
/// Parsing/upload handling lives outside the engine; by the time a
/// document reaches retrieval it carries extracted title, description,
/// and keyword metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub status: DocumentStatus,
    pub is_active: bool,
}

impl Document {
    pub fn source_text(&self) -> String {
        let mut text = self.title.clone();
        if let Some(desc) = &self.description {
            text.push('\n');
            text.push_str(desc);
        }
        if !self.keywords.is_empty() {
            text.push('\n');
            text.push_str(&self.keywords.join(", "));
        }
        text
    }

    pub fn searchable_text(&self) -> String {
        let mut fields = vec![self.title.clone()];
        if let Some(name) = &self.original_name {
            fields.push(name.clone());
        }
        if let Some(desc) = &self.description {
            fields.push(desc.clone());
        }
        fields.extend(self.keywords.iter().cloned());
        fields.join(" ").to_lowercase()
    }

    /// A document is eligible for chunking and search only once its
    /// processing finished and it has not been deactivated.
    pub fn is_searchable(&self) -> bool {
        self.is_active && self.status == DocumentStatus::Completed
    }
}

/// A catalog product. Products are searched by keyword only — they are
/// not chunked or embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_active: bool,
}

/// A bounded, overlapping segment of a parent entity's text.
///
/// `embedding`, when present, has the provider's fixed dimensionality
/// ([`crate::embedding::EMBEDDING_DIMS`]). `sequence_index` is unique
/// within a parent and assigned monotonically at chunk-creation time.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub parent_kind: ParentKind,
    pub parent_id: String,
    pub sequence_index: i64,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub page_number: Option<i64>,
}

impl Chunk {
    /// Create a chunk with a fresh id for the given parent.
    pub fn new(
        parent_kind: ParentKind,
        parent_id: &str,
        sequence_index: i64,
        content: String,
        embedding: Option<Vec<f32>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_kind,
            parent_id: parent_id.to_string(),
            sequence_index,
            content,
            embedding,
            page_number: None,
        }
    }
}

/// A candidate handed to the ranking engine: a chunk plus the
/// lower-cased searchable text of its parent.
#[derive(Debug, Clone)]
pub struct RankCandidate {
    pub chunk: Chunk,
    pub searchable_text: String,
}

/// One ranked search hit. Transient — produced per query, never stored.
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub parent_kind: ParentKind,
    pub parent_id: String,
    pub best_chunk: Chunk,
    pub similarity: f32,
    pub matched_by_keyword: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faq_source_text_combines_question_and_answer() {
        let faq = Faq {
            id: "f1".into(),
            question: "How long does shipping take?".into(),
            answer: "3-5 business days".into(),
            is_active: true,
        };
        assert_eq!(
            faq.source_text(),
            "How long does shipping take?\n3-5 business days"
        );
    }

    #[test]
    fn service_source_text_includes_price() {
        let svc = Service {
            id: "s1".into(),
            name: "Cooking Class".into(),
            description: "Hands-on pasta making".into(),
            price: 89.5,
            is_active: true,
        };
        assert_eq!(
            svc.source_text(),
            "Cooking Class - Hands-on pasta making - Price: €89.50"
        );
    }

    #[test]
    fn document_searchable_only_when_completed_and_active() {
        let mut doc = Document {
            id: "d1".into(),
            title: "Privacy Policy".into(),
            original_name: None,
            description: None,
            keywords: vec![],
            status: DocumentStatus::Completed,
            is_active: true,
        };
        assert!(doc.is_searchable());

        doc.status = DocumentStatus::Processing;
        assert!(!doc.is_searchable());

        doc.status = DocumentStatus::Completed;
        doc.is_active = false;
        assert!(!doc.is_searchable());
    }

    #[test]
    fn document_status_roundtrip() {
        for status in [
            DocumentStatus::Uploading,
            DocumentStatus::Processing,
            DocumentStatus::Completed,
            DocumentStatus::Failed,
        ] {
            assert_eq!(DocumentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DocumentStatus::parse("DELETED"), None);
    }
}
