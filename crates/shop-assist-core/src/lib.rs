//! # Shop Assist Core
//!
//! Shared logic for the Shop Assist retrieval engine: data models, text
//! chunking, the embedding provider trait with its deterministic
//! fallback, hybrid similarity ranking, and store abstractions.
//!
//! This crate contains no network clients, no database driver, and no
//! async runtime of its own. The application crate (`shop-assist`)
//! supplies the real embedding and chat-completion backends, the SQLite
//! store, and the CLI.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod models;
pub mod similarity;
pub mod store;

pub use error::{Error, Result};
