//! Retrieval tools exposed to the language model.
//!
//! The tool surface is a closed union: every tool the model may call
//! is a [`ToolKind`] variant carrying a typed argument struct, so
//! dispatch is exhaustive at compile time instead of a string-keyed
//! map of loosely typed callables. Argument JSON that fails to parse
//! becomes [`Error::ToolArgumentParse`]; the loop does not repair it.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use shop_assist_core::store::{CatalogStore, ProductFilter};
use shop_assist_core::{Error, Result};

use crate::completion::{ToolDeclaration, ToolSchema};
use crate::retrieval::Retriever;

/// The tools declared to the model, one per retrieval surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    GetProducts,
    GetServices,
    GetFaqs,
    GetDocuments,
}

impl ToolKind {
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::GetProducts => "get-products",
            ToolKind::GetServices => "get-services",
            ToolKind::GetFaqs => "get-faqs",
            ToolKind::GetDocuments => "get-documents",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "get-products" => Some(ToolKind::GetProducts),
            "get-services" => Some(ToolKind::GetServices),
            "get-faqs" => Some(ToolKind::GetFaqs),
            "get-documents" => Some(ToolKind::GetDocuments),
            _ => None,
        }
    }
}

/// Arguments for `get-products`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductArgs {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default, rename = "countOnly")]
    pub count_only: bool,
    #[serde(default, rename = "isActive")]
    pub is_active: Option<bool>,
}

/// Arguments for `get-services`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceArgs {
    #[serde(default)]
    pub search: Option<String>,
}

/// Arguments for `get-faqs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FaqArgs {
    #[serde(default)]
    pub search: Option<String>,
}

/// Arguments for `get-documents`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentArgs {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// A parsed, typed tool call ready to execute.
#[derive(Debug, Clone)]
pub enum ToolInvocation {
    GetProducts(ProductArgs),
    GetServices(ServiceArgs),
    GetFaqs(FaqArgs),
    GetDocuments(DocumentArgs),
}

impl ToolInvocation {
    /// Parse the model-supplied arguments for a named tool.
    pub fn parse(name: &str, arguments: &str) -> Result<Self> {
        let kind = ToolKind::from_name(name).ok_or_else(|| Error::ToolArgumentParse {
            tool: name.to_string(),
            reason: "unknown tool".to_string(),
        })?;

        let parse_err = |e: serde_json::Error| Error::ToolArgumentParse {
            tool: name.to_string(),
            reason: e.to_string(),
        };

        // An empty arguments string means "no arguments".
        let arguments = if arguments.trim().is_empty() {
            "{}"
        } else {
            arguments
        };

        Ok(match kind {
            ToolKind::GetProducts => {
                ToolInvocation::GetProducts(serde_json::from_str(arguments).map_err(parse_err)?)
            }
            ToolKind::GetServices => {
                ToolInvocation::GetServices(serde_json::from_str(arguments).map_err(parse_err)?)
            }
            ToolKind::GetFaqs => {
                ToolInvocation::GetFaqs(serde_json::from_str(arguments).map_err(parse_err)?)
            }
            ToolKind::GetDocuments => {
                ToolInvocation::GetDocuments(serde_json::from_str(arguments).map_err(parse_err)?)
            }
        })
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            ToolInvocation::GetProducts(_) => ToolKind::GetProducts,
            ToolInvocation::GetServices(_) => ToolKind::GetServices,
            ToolInvocation::GetFaqs(_) => ToolKind::GetFaqs,
            ToolInvocation::GetDocuments(_) => ToolKind::GetDocuments,
        }
    }

    /// The free-text search term, if this invocation carries one.
    pub fn search_term(&self) -> Option<&str> {
        match self {
            ToolInvocation::GetProducts(args) => args.search.as_deref(),
            ToolInvocation::GetServices(args) => args.search.as_deref(),
            ToolInvocation::GetFaqs(args) => args.search.as_deref(),
            ToolInvocation::GetDocuments(args) => args.search.as_deref(),
        }
    }

    /// The same invocation with its search term replaced — used by the
    /// alternative-search retry.
    pub fn with_search_term(&self, term: &str) -> Self {
        let mut clone = self.clone();
        match &mut clone {
            ToolInvocation::GetProducts(args) => args.search = Some(term.to_string()),
            ToolInvocation::GetServices(args) => args.search = Some(term.to_string()),
            ToolInvocation::GetFaqs(args) => args.search = Some(term.to_string()),
            ToolInvocation::GetDocuments(args) => args.search = Some(term.to_string()),
        }
        clone
    }
}

/// Result of executing a tool: how many records matched, plus the JSON
/// payload handed back to the model.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub total: usize,
    pub payload: serde_json::Value,
}

/// Executes parsed tool invocations against the retrieval services.
pub struct ToolExecutor {
    retriever: Arc<Retriever>,
    catalog: Arc<dyn CatalogStore>,
    default_limit: usize,
}

impl ToolExecutor {
    pub fn new(
        retriever: Arc<Retriever>,
        catalog: Arc<dyn CatalogStore>,
        default_limit: usize,
    ) -> Self {
        Self {
            retriever,
            catalog,
            default_limit,
        }
    }

    pub async fn execute(&self, invocation: &ToolInvocation) -> Result<ToolOutcome> {
        match invocation {
            ToolInvocation::GetProducts(args) => self.get_products(args).await,
            ToolInvocation::GetServices(args) => self.get_services(args).await,
            ToolInvocation::GetFaqs(args) => self.get_faqs(args).await,
            ToolInvocation::GetDocuments(args) => self.get_documents(args).await,
        }
    }

    async fn get_products(&self, args: &ProductArgs) -> Result<ToolOutcome> {
        let filter = ProductFilter {
            search: args.search.clone(),
            category: args.category.clone(),
            is_active: args.is_active,
            limit: None,
        };
        let products = self.catalog.search_products(&filter).await?;

        if args.count_only {
            let mut categories: Vec<(String, usize)> = Vec::new();
            for product in &products {
                let Some(name) = &product.category else {
                    continue;
                };
                match categories.iter_mut().find(|(n, _)| n == name) {
                    Some((_, count)) => *count += 1,
                    None => categories.push((name.clone(), 1)),
                }
            }
            let categories: Vec<_> = categories
                .into_iter()
                .map(|(name, count)| json!({ "name": name, "count": count }))
                .collect();
            return Ok(ToolOutcome {
                total: products.len(),
                payload: json!({ "total": products.len(), "categories": categories }),
            });
        }

        let listed: Vec<_> = products
            .iter()
            .map(|p| {
                json!({
                    "id": p.id,
                    "name": p.name,
                    "description": p.description,
                    "price": format!("{:.2}", p.price),
                    "category": p.category,
                    "tags": p.tags,
                })
            })
            .collect();

        Ok(ToolOutcome {
            total: products.len(),
            payload: json!({ "total": products.len(), "products": listed }),
        })
    }

    async fn get_services(&self, args: &ServiceArgs) -> Result<ToolOutcome> {
        let services = match args.search.as_deref() {
            Some(query) => {
                self.retriever
                    .search_services(query, self.default_limit)
                    .await?
            }
            None => self.catalog.active_services().await?,
        };

        let listed: Vec<_> = services
            .iter()
            .map(|s| {
                json!({
                    "id": s.id,
                    "name": s.name,
                    "description": s.description,
                    "price": format!("{:.2}", s.price),
                })
            })
            .collect();

        Ok(ToolOutcome {
            total: services.len(),
            payload: json!({ "total": services.len(), "services": listed }),
        })
    }

    async fn get_faqs(&self, args: &FaqArgs) -> Result<ToolOutcome> {
        let faqs = match args.search.as_deref() {
            Some(query) => self.retriever.search_faqs(query, self.default_limit).await?,
            None => self.catalog.active_faqs().await?,
        };

        let listed: Vec<_> = faqs
            .iter()
            .map(|f| {
                json!({
                    "id": f.id,
                    "question": f.question,
                    "answer": f.answer,
                })
            })
            .collect();

        Ok(ToolOutcome {
            total: faqs.len(),
            payload: json!({ "total": faqs.len(), "faqs": listed }),
        })
    }

    async fn get_documents(&self, args: &DocumentArgs) -> Result<ToolOutcome> {
        let limit = args.limit.unwrap_or(self.default_limit);

        match args.search.as_deref() {
            Some(query) => {
                let hits = self.retriever.search_documents(query, limit).await?;
                let listed: Vec<_> = hits
                    .iter()
                    .map(|h| {
                        json!({
                            "id": h.document.id,
                            "title": h.document.title,
                            "content": h.snippet,
                            "similarity": h.similarity,
                        })
                    })
                    .collect();
                Ok(ToolOutcome {
                    total: hits.len(),
                    payload: json!({ "total": hits.len(), "documents": listed }),
                })
            }
            None => {
                let mut documents = self.catalog.searchable_documents().await?;
                documents.truncate(limit);
                let listed: Vec<_> = documents
                    .iter()
                    .map(|d| {
                        json!({
                            "id": d.id,
                            "title": d.title,
                            "description": d.description,
                        })
                    })
                    .collect();
                Ok(ToolOutcome {
                    total: documents.len(),
                    payload: json!({ "total": documents.len(), "documents": listed }),
                })
            }
        }
    }
}

/// Tool schemas declared to the model on every first-pass completion.
pub fn declarations() -> Vec<ToolDeclaration> {
    vec![
        ToolDeclaration {
            kind: "function",
            function: ToolSchema {
                name: ToolKind::GetProducts.name().to_string(),
                description: "Retrieve product information from the Italian specialty foods \
                              catalog. Use when customers ask about products, want to browse \
                              items, or need specific product details."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "category": {
                            "type": "string",
                            "description": "Product category. Examples: \"Cheese\", \"Wine\", \"Pasta\", \"Cured Meats\", \"Oils\""
                        },
                        "search": {
                            "type": "string",
                            "description": "Search products by name/description. Examples: \"parmigiano\", \"chianti\", \"prosciutto\""
                        },
                        "countOnly": {
                            "type": "boolean",
                            "description": "Return only counts per category (for availability checks)"
                        }
                    },
                    "required": []
                }),
            },
        },
        ToolDeclaration {
            kind: "function",
            function: ToolSchema {
                name: ToolKind::GetServices.name().to_string(),
                description: "Retrieve information about services like cooking classes, \
                              catering, and consultations. Use when customers ask about \
                              services."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "search": {
                            "type": "string",
                            "description": "Search services by name/description. Examples: \"cooking\", \"catering\", \"consultation\""
                        }
                    },
                    "required": []
                }),
            },
        },
        ToolDeclaration {
            kind: "function",
            function: ToolSchema {
                name: ToolKind::GetFaqs.name().to_string(),
                description: "Search FAQs using semantic embedding search. Use for policy \
                              questions, shipping, returns, payments, store info."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "search": {
                            "type": "string",
                            "description": "Search query. Examples: \"shipping time\", \"return policy\", \"payment methods\""
                        }
                    },
                    "required": []
                }),
            },
        },
        ToolDeclaration {
            kind: "function",
            function: ToolSchema {
                name: ToolKind::GetDocuments.name().to_string(),
                description: "Search the document knowledge base. Use when customers ask \
                              about policies, regulations, catalogs, or other stored \
                              documents."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "search": {
                            "type": "string",
                            "description": "Search query. Examples: \"privacy policy\", \"transport regulations\", \"GDPR\""
                        },
                        "limit": {
                            "type": "number",
                            "description": "Maximum number of documents to return (default: 5)"
                        }
                    },
                    "required": []
                }),
            },
        },
    ]
}
