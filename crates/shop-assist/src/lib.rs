//! # Shop Assist
//!
//! **The retrieval-augmented assistant engine behind the ShopMefy
//! storefront.**
//!
//! Shop Assist chunks catalog entities (FAQs, services, documents)
//! into overlapping segments, embeds them, and answers customer
//! questions through a tool-calling chat loop backed by hybrid
//! (vector + keyword) search.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌──────────┐
//! │  Catalog  │──▶│   Retriever   │──▶│  SQLite   │
//! │ FAQ/Svc/  │   │ Chunk+Embed  │   │  chunks   │
//! │   Doc     │   └──────┬───────┘   └────┬─────┘
//! └───────────┘          │                │
//!                        ▼                ▼
//!                 ┌────────────┐   ┌────────────┐
//!                 │  Dispatch   │◀──│   Hybrid    │
//!                 │   loop      │   │   ranking   │
//!                 └────────────┘   └────────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. Catalog records are imported ([`import`]) or maintained by the
//!    admin backend.
//! 2. The **retriever** ([`retrieval`]) splits each eligible record
//!    into chunks, embeds them through the configured provider chain
//!    ([`embedding`]), and swaps the parent's chunk set in the store.
//! 3. A chat turn ([`dispatch`]) declares the retrieval tools
//!    ([`tools`]) to the model; a requested tool call runs a hybrid
//!    vector + keyword search, with one alternative-search retry on
//!    empty results.
//! 4. The tool result is fed back for a second completion that
//!    produces the final customer-facing answer.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |
//! | [`sqlite_store`] | SQLite implementation of the store traits |
//! | [`embedding`] | OpenAI-compatible embedder and the fallback chain |
//! | [`completion`] | Chat-completion backend trait and wire types |
//! | [`retrieval`] | Reindexing and ranked search per entity kind |
//! | [`tools`] | Typed tool union, schemas, and execution |
//! | [`dispatch`] | One chat turn's function-dispatch state machine |
//! | [`import`] | JSON catalog import |

pub mod completion;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod embedding;
pub mod import;
pub mod migrate;
pub mod retrieval;
pub mod sqlite_store;
pub mod tools;

pub use shop_assist_core::store;
pub use shop_assist_core::{Error, Result};
