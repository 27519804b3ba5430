//! Cosine similarity and hybrid ranking.
//!
//! Pure vector similarity over a small catalog of short texts is
//! unreliable when the embedding backend is a cheap model or the
//! deterministic fallback. The ranking here therefore merges two
//! candidate pools: the top chunks by cosine similarity, and every
//! chunk whose parent's searchable text literally contains a query
//! token. Keyword matches always sort ahead of similarity-only
//! matches; within each group ordering is by similarity, descending.
//!
//! # Algorithm
//!
//! 1. Score every candidate chunk against the query vector; keep the
//!    top `3 × limit` as the similarity pool.
//! 2. Tokenize the query (lower-cased words longer than two
//!    characters); collect every chunk whose parent text contains a
//!    token as the keyword pool.
//! 3. Union the pools, deduplicating by parent — a parent contributes
//!    its best-scoring chunk only.
//! 4. Sort keyword matches first, then by similarity, then by parent
//!    id for a stable order. Truncate to `limit`.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::models::{RankCandidate, RankedResult};

/// How many similarity candidates to keep per requested result.
pub const SIMILARITY_POOL_FACTOR: usize = 3;

/// Cosine similarity of two vectors, in `[-1.0, 1.0]`.
///
/// Returns `0.0` for mismatched lengths, empty vectors, zero norms,
/// or non-finite arithmetic results (corrupted stored vectors must
/// never poison a ranking).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    let sim = dot / denom;
    if sim.is_finite() {
        sim
    } else {
        0.0
    }
}

/// Lower-cased query words longer than two characters, with
/// punctuation trimmed from the edges.
pub fn query_tokens(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() > 2)
        .map(|w| w.to_string())
        .collect()
}

/// Rank candidate chunks against a query using hybrid
/// similarity + keyword scoring.
///
/// Produces at most `limit` results, one per parent entity. An empty
/// candidate set yields an empty ranking, never an error.
pub fn rank(
    query_vec: &[f32],
    query_text: &str,
    candidates: &[RankCandidate],
    limit: usize,
) -> Vec<RankedResult> {
    if candidates.is_empty() || limit == 0 {
        return Vec::new();
    }

    let sims: Vec<f32> = candidates
        .iter()
        .map(|c| {
            c.chunk
                .embedding
                .as_deref()
                .map(|e| cosine_similarity(query_vec, e))
                .unwrap_or(0.0)
        })
        .collect();

    let mut by_similarity: Vec<usize> = (0..candidates.len()).collect();
    by_similarity.sort_by(|&a, &b| sims[b].partial_cmp(&sims[a]).unwrap_or(Ordering::Equal));

    let pool_size = limit.saturating_mul(SIMILARITY_POOL_FACTOR);
    let similarity_pool: HashSet<usize> = by_similarity.into_iter().take(pool_size).collect();

    let tokens = query_tokens(query_text);
    let keyword_pool: HashSet<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| tokens.iter().any(|t| c.searchable_text.contains(t.as_str())))
        .map(|(i, _)| i)
        .collect();

    struct BestOfParent {
        index: usize,
        similarity: f32,
        keyword: bool,
    }

    let mut by_parent: HashMap<&str, BestOfParent> = HashMap::new();
    for &i in similarity_pool.union(&keyword_pool) {
        let candidate = &candidates[i];
        let keyword = keyword_pool.contains(&i);
        let entry = by_parent
            .entry(candidate.chunk.parent_id.as_str())
            .or_insert(BestOfParent {
                index: i,
                similarity: sims[i],
                keyword,
            });
        if sims[i] > entry.similarity {
            entry.index = i;
            entry.similarity = sims[i];
        }
        entry.keyword |= keyword;
    }

    let mut results: Vec<RankedResult> = by_parent
        .into_values()
        .map(|best| {
            let candidate = &candidates[best.index];
            RankedResult {
                parent_kind: candidate.chunk.parent_kind,
                parent_id: candidate.chunk.parent_id.clone(),
                best_chunk: candidate.chunk.clone(),
                similarity: best.similarity,
                matched_by_keyword: best.keyword,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.matched_by_keyword
            .cmp(&a.matched_by_keyword)
            .then_with(|| {
                b.similarity
                    .partial_cmp(&a.similarity)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.parent_id.cmp(&b.parent_id))
    });
    results.truncate(limit);

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, ParentKind};

    fn candidate(parent_id: &str, text: &str, embedding: Vec<f32>) -> RankCandidate {
        RankCandidate {
            chunk: Chunk {
                id: format!("chunk-{parent_id}"),
                parent_kind: ParentKind::Faq,
                parent_id: parent_id.to_string(),
                sequence_index: 0,
                content: text.to_string(),
                embedding: Some(embedding),
                page_number: None,
            },
            searchable_text: text.to_lowercase(),
        }
    }

    #[test]
    fn cosine_is_symmetric() {
        let a = vec![0.3, -0.5, 0.8];
        let b = vec![0.1, 0.9, -0.2];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn cosine_self_similarity_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        let z = vec![0.0, 0.0, 0.0];
        let v = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&z, &v), 0.0);
    }

    #[test]
    fn cosine_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn cosine_opposite_is_negative_one() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_survives_non_finite_components() {
        let a = vec![f32::MAX, f32::MAX];
        let b = vec![f32::MAX, f32::MAX];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.is_finite());
    }

    #[test]
    fn tokens_drop_short_words_and_punctuation() {
        assert_eq!(
            query_tokens("Is my shipping on time?"),
            vec!["shipping".to_string(), "time".to_string()]
        );
        assert!(query_tokens("a b cd").is_empty());
    }

    #[test]
    fn keyword_match_outranks_higher_similarity() {
        // One candidate is semantically close but shares no words with
        // the query; the other is a literal keyword match with a poor
        // similarity score. The keyword match must come first.
        let query_vec = vec![1.0, 0.0, 0.0];
        let candidates = vec![
            candidate("similar", "completely unrelated wording", vec![0.9, 0.1, 0.0]),
            candidate(
                "keyworded",
                "shipping takes 3-5 business days",
                vec![0.0, 0.1, 0.9],
            ),
        ];

        let results = rank(&query_vec, "shipping time", &candidates, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].parent_id, "keyworded");
        assert!(results[0].matched_by_keyword);
        assert!(!results[1].matched_by_keyword);
        assert!(results[1].similarity > results[0].similarity);
    }

    #[test]
    fn one_result_per_parent() {
        let query_vec = vec![1.0, 0.0];
        let mut candidates = vec![
            candidate("p1", "first piece", vec![0.9, 0.1]),
            candidate("p2", "other parent", vec![0.5, 0.5]),
        ];
        let mut second = candidate("p1", "second piece", vec![0.99, 0.0]);
        second.chunk.id = "chunk-p1-b".into();
        second.chunk.sequence_index = 1;
        candidates.push(second);

        let results = rank(&query_vec, "nothing", &candidates, 10);
        assert_eq!(results.len(), 2);
        let p1 = results.iter().find(|r| r.parent_id == "p1").unwrap();
        assert_eq!(p1.best_chunk.sequence_index, 1, "best chunk must win");
    }

    #[test]
    fn truncates_to_limit() {
        let query_vec = vec![1.0, 0.0];
        let candidates: Vec<_> = (0..20)
            .map(|i| candidate(&format!("p{i}"), "text", vec![1.0 - i as f32 * 0.01, 0.0]))
            .collect();
        let results = rank(&query_vec, "query", &candidates, 5);
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn keyword_match_survives_outside_similarity_pool() {
        // With limit 1 the similarity pool keeps only 3 candidates;
        // the keyword match sits far below them but must still surface.
        let query_vec = vec![1.0, 0.0];
        let mut candidates: Vec<_> = (0..6)
            .map(|i| {
                candidate(
                    &format!("filler{i}"),
                    "irrelevant text",
                    vec![0.9 - i as f32 * 0.01, 0.1],
                )
            })
            .collect();
        candidates.push(candidate("match", "prosciutto crudo", vec![-0.5, 0.5]));

        let results = rank(&query_vec, "prosciutto", &candidates, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].parent_id, "match");
    }

    #[test]
    fn empty_candidates_empty_result() {
        assert!(rank(&[1.0], "query", &[], 5).is_empty());
    }

    #[test]
    fn missing_embedding_ranks_as_zero() {
        let query_vec = vec![1.0, 0.0];
        let mut with_vec = candidate("a", "unrelated", vec![0.4, 0.2]);
        with_vec.chunk.id = "a0".into();
        let mut without = candidate("b", "unrelated too", vec![]);
        without.chunk.embedding = None;

        let results = rank(&query_vec, "query", &[with_vec, without], 5);
        assert_eq!(results[0].parent_id, "a");
        assert_eq!(results[1].similarity, 0.0);
    }
}
