//! Error taxonomy for the retrieval engine.
//!
//! Distinguishes the cases callers are expected to branch on:
//! a missing parent entity is an error, an empty search result is not;
//! a corrupt stored vector is recoverable, an unreachable provider with
//! no fallback left is not.

use thiserror::Error;

use crate::models::ParentKind;

/// Errors produced by the retrieval engine and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// A network-backed provider could not be reached or returned an
    /// unusable response, and no fallback absorbed the failure.
    #[error("provider '{provider}' unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// Reindexing was requested for an entity that does not exist.
    /// Distinct from a search returning zero results.
    #[error("{kind} '{id}' not found")]
    ParentNotFound { kind: ParentKind, id: String },

    /// A stored embedding did not decode to the expected dimensionality.
    #[error("malformed stored embedding: expected {expected} dims, found {found}")]
    MalformedEmbedding { expected: usize, found: usize },

    /// The language model supplied tool arguments that failed to parse.
    /// The dispatch loop does not attempt to repair these.
    #[error("invalid arguments for tool '{tool}': {reason}")]
    ToolArgumentParse { tool: String, reason: String },

    /// The chat-completion backend returned a response with no usable
    /// message.
    #[error("empty completion response from '{0}'")]
    EmptyCompletion(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
