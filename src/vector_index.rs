//! In-memory vector index with exact cosine-similarity search.

use std::cmp::Ordering;

use log::debug;

use crate::chunker::Segment;
use crate::embedder::Embedder;
use crate::error::{RagError, Result};

/// Segment plus its similarity to a query.
#[derive(Debug, Clone)]
pub struct ScoredSegment {
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
    /// Matched segment.
    pub segment: Segment,
}

struct IndexEntry {
    segment: Segment,
    vector: Vec<f32>,
    norm: f32,
}

/// Read-only collection of segment vectors.
///
/// Built once, never mutated afterwards, so concurrent readers need no locking.
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimensions: usize,
}

impl VectorIndex {
    /// Embeds `segments` in batches and indexes the results.
    pub async fn build(segments: Vec<Segment>, embedder: &dyn Embedder) -> Result<Self> {
        let batch_size = embedder.batch_size().max(1);
        let mut vectors = Vec::with_capacity(segments.len());
        for (batch_idx, batch) in segments.chunks(batch_size).enumerate() {
            let inputs: Vec<&str> = batch.iter().map(|segment| segment.text.as_str()).collect();
            let embedded = embedder.embed_batch(&inputs).await?;
            if embedded.len() != inputs.len() {
                return Err(RagError::InvalidResponse {
                    provider: "embedder",
                    message: format!(
                        "returned {} embeddings for {} segments",
                        embedded.len(),
                        inputs.len()
                    ),
                });
            }
            debug!("embedded batch {} ({} segments)", batch_idx + 1, inputs.len());
            vectors.extend(embedded);
        }
        Self::from_entries(segments.into_iter().zip(vectors))
    }

    /// Indexes pre-computed `(segment, vector)` pairs.
    ///
    /// Fails on an empty input or when vector lengths disagree.
    pub fn from_entries<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Segment, Vec<f32>)>,
    {
        let mut entries = Vec::new();
        let mut dimensions = None;
        for (segment, vector) in pairs {
            let expected = *dimensions.get_or_insert(vector.len());
            if vector.len() != expected || expected == 0 {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            let norm = magnitude(&vector);
            entries.push(IndexEntry {
                segment,
                vector,
                norm,
            });
        }
        let dimensions = dimensions.ok_or(RagError::EmptyIndex)?;
        Ok(Self {
            entries,
            dimensions,
        })
    }

    /// Number of indexed segments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector length shared by every entry.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Returns the `k` segments most similar to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredSegment>> {
        if query.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }
        let query_norm = magnitude(query);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (idx, cosine(query, query_norm, &entry.vector, entry.norm)))
            .collect();
        // Ties keep insertion order so results stay deterministic.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(idx, score)| ScoredSegment {
                score,
                segment: self.entries[idx].segment.clone(),
            })
            .collect())
    }
}

fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(id: usize, text: &str) -> Segment {
        Segment {
            chunk_id: id,
            page: 1,
            char_start: 0,
            char_end: text.len(),
            text: text.to_string(),
        }
    }

    fn sample_index() -> VectorIndex {
        VectorIndex::from_entries(vec![
            (segment(0, "east"), vec![1.0, 0.0]),
            (segment(1, "north"), vec![0.0, 1.0]),
            (segment(2, "north-east"), vec![1.0, 1.0]),
        ])
        .expect("index")
    }

    #[test]
    fn search_orders_by_descending_similarity() {
        let index = sample_index();
        let hits = index.search(&[0.9, 0.1], 3).unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.segment.text.as_str()).collect();
        assert_eq!(texts, vec!["east", "north-east", "north"]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn search_truncates_to_k() {
        let index = sample_index();
        assert_eq!(index.search(&[0.0, 1.0], 1).unwrap().len(), 1);
        assert_eq!(index.search(&[0.0, 1.0], 10).unwrap().len(), 3);
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = VectorIndex::from_entries(Vec::<(Segment, Vec<f32>)>::new())
            .err()
            .unwrap();
        assert!(matches!(err, RagError::EmptyIndex));
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let err = VectorIndex::from_entries(vec![
            (segment(0, "a"), vec![1.0, 0.0]),
            (segment(1, "b"), vec![1.0]),
        ])
        .err()
        .unwrap();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));

        let index = sample_index();
        assert!(index.search(&[1.0, 0.0, 0.0], 2).is_err());
    }
}
