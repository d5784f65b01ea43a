//! Similarity ranking over chunk embeddings.
//!
//! Every score handled here is a similarity: higher is better. Store
//! distances are converted before they reach this module.

use crate::types::{Chunk, RetrievalResult};
use regula_core::{AppError, AppResult};
use std::cmp::Ordering;

/// Default number of results returned by a search.
pub const DEFAULT_TOP_K: usize = 5;

/// Options controlling result selection.
#[derive(Debug, Clone, PartialEq)]
pub struct RankOptions {
    /// Maximum number of results
    pub top_k: usize,

    /// Results scoring below this similarity are discarded
    pub min_score: f32,

    /// Results whose text contains any of these phrases (case-insensitive)
    /// are discarded
    pub exclude_phrases: Vec<String>,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_score: 0.0,
            exclude_phrases: Vec::new(),
        }
    }
}

impl RankOptions {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            ..Default::default()
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_exclude_phrases(mut self, phrases: Vec<String>) -> Self {
        self.exclude_phrases = phrases;
        self
    }

    /// Reject option values that cannot produce a meaningful ranking.
    pub fn validate(&self) -> AppResult<()> {
        if self.top_k == 0 {
            return Err(AppError::InvalidArgument(
                "top_k must be greater than 0".to_string(),
            ));
        }

        if self.min_score.is_nan() {
            return Err(AppError::InvalidArgument(
                "min_score must be a number".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether any non-blank exclusion phrase is configured.
    pub fn has_exclusions(&self) -> bool {
        self.exclude_phrases.iter().any(|p| !p.is_empty())
    }
}

/// Rank chunks by dot-product similarity with a query vector.
///
/// `vectors[i]` must be the embedding of `chunks[i]`. Vectors are expected to
/// be L2-normalized, which makes the dot product a cosine similarity.
pub fn rank(
    query: &[f32],
    vectors: &[Vec<f32>],
    chunks: &[Chunk],
    options: &RankOptions,
) -> AppResult<Vec<RetrievalResult>> {
    options.validate()?;

    if vectors.len() != chunks.len() {
        return Err(AppError::Alignment(format!(
            "{} embedding rows but {} chunks",
            vectors.len(),
            chunks.len()
        )));
    }

    let scores = score_all(query, vectors)?;
    let candidates = chunks
        .iter()
        .zip(scores)
        .map(|(chunk, score)| RetrievalResult::from_chunk(chunk, score))
        .collect();

    Ok(select(candidates, options))
}

/// Apply sorting, thresholding, exclusion and truncation to results that
/// already carry a similarity score.
pub fn rank_scored(
    candidates: Vec<RetrievalResult>,
    options: &RankOptions,
) -> AppResult<Vec<RetrievalResult>> {
    options.validate()?;
    Ok(select(candidates, options))
}

/// Dot-product similarity of `query` against every row.
fn score_all(query: &[f32], vectors: &[Vec<f32>]) -> AppResult<Vec<f32>> {
    vectors
        .iter()
        .enumerate()
        .map(|(i, v)| {
            if v.len() != query.len() {
                return Err(AppError::Alignment(format!(
                    "Embedding row {} has dimension {}, query has {}",
                    i,
                    v.len(),
                    query.len()
                )));
            }
            Ok(dot(query, v))
        })
        .collect()
}

fn select(mut candidates: Vec<RetrievalResult>, options: &RankOptions) -> Vec<RetrievalResult> {
    // NaN sorts last
    for candidate in &mut candidates {
        if candidate.score.is_nan() {
            candidate.score = f32::NEG_INFINITY;
        }
    }

    // Stable: equal scores keep corpus order
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let phrases = lowercase_phrases(&options.exclude_phrases);
    let mut results = Vec::with_capacity(options.top_k.min(candidates.len()));

    for candidate in candidates {
        if candidate.score < options.min_score {
            break;
        }

        if contains_any(&candidate.text, &phrases) {
            tracing::debug!("Excluded '{}' by phrase filter", candidate.chunk_id);
            continue;
        }

        results.push(candidate);
        if results.len() >= options.top_k {
            break;
        }
    }

    results
}

fn lowercase_phrases(phrases: &[String]) -> Vec<String> {
    phrases
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| p.to_lowercase())
        .collect()
}

fn contains_any(text: &str, lowercase_phrases: &[String]) -> bool {
    if lowercase_phrases.is_empty() {
        return false;
    }
    let lower = text.to_lowercase();
    lowercase_phrases.iter().any(|p| lower.contains(p.as_str()))
}

/// Dot product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity; 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot(a, b) / (norm_a * norm_b)
}

/// Scale a vector to unit length in place. Zero vectors are left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_and_cosine() {
        assert_eq!(dot(&[1.0, 2.0], &[3.0, 4.0]), 11.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_options_validation() {
        assert!(RankOptions::new(0).validate().is_err());
        assert!(RankOptions::new(3).with_min_score(f32::NAN).validate().is_err());
        assert!(RankOptions::new(3).with_min_score(-1.0).validate().is_ok());
    }

    #[test]
    fn test_empty_phrases_ignored() {
        let options = RankOptions::new(1).with_exclude_phrases(vec![String::new()]);
        assert!(!options.has_exclusions());
        assert!(!contains_any("anything", &lowercase_phrases(&options.exclude_phrases)));
    }

    #[test]
    fn test_whitespace_phrase_is_literal() {
        let options = RankOptions::new(1).with_exclude_phrases(vec!["  ".to_string()]);
        let phrases = lowercase_phrases(&options.exclude_phrases);

        assert!(options.has_exclusions());
        assert!(contains_any("Article 12.  Pets", &phrases));
        assert!(!contains_any("Article 12. Pets", &phrases));
    }
}
