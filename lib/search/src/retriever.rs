use crate::encoder::TextEncoder;
use crate::error::QueryError;
use cinex_core::vector::dot;
use cinex_core::{top_k, EntityRecord, InnerProductIndex};
use cinex_storage::CorpusSnapshot;
use std::sync::Arc;
use tracing::debug;

/// One result row: the shared entity and its score against the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntity {
    pub entity: Arc<EntityRecord>,
    pub score: f32,
}

impl ScoredEntity {
    #[inline]
    pub fn id(&self) -> u64 {
        self.entity.id
    }

    #[inline]
    pub fn title(&self) -> &str {
        &self.entity.title
    }
}

/// Reject empty or whitespace-only description text
pub fn validate_description(text: &str) -> Result<&str, QueryError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(QueryError::InvalidInput(
            "Description text must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}

/// Read-only queries over one corpus snapshot
#[derive(Debug, Clone, Copy)]
pub struct Retriever<'a> {
    snapshot: &'a CorpusSnapshot,
}

impl<'a> Retriever<'a> {
    pub fn new(snapshot: &'a CorpusSnapshot) -> Self {
        Self { snapshot }
    }

    /// The `k` entities closest to `entity_id`, excluding itself.
    ///
    /// The query vector is recomposed from the stored row, never read back
    /// from the index.
    pub fn find_by_similarity(&self, entity_id: u64, k: usize) -> Result<Vec<ScoredEntity>, QueryError> {
        let metadata = self.snapshot.metadata();
        let position = metadata
            .position_of(entity_id)
            .ok_or(QueryError::NotFound(entity_id))?;
        let record = metadata
            .get(position)
            .ok_or(QueryError::NotFound(entity_id))?;

        // At most N - 1 other rows exist
        let k = k.min(metadata.len().saturating_sub(1));
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = self.snapshot.composer().compose(record);
        let neighbors = self.snapshot.index().search(query.as_slice(), k.saturating_add(1));

        let mut results: Vec<ScoredEntity> = neighbors
            .into_iter()
            .filter(|n| n.slot != position)
            .take(k)
            .filter_map(|n| {
                metadata.get(n.slot).map(|entity| ScoredEntity {
                    entity: entity.clone(),
                    score: n.score,
                })
            })
            .collect();

        // Stable: equal scores keep the index's order
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        debug!("Similarity query for {} returned {} rows", entity_id, results.len());
        Ok(results)
    }

    pub fn find_by_id(&self, entity_id: u64) -> Result<Arc<EntityRecord>, QueryError> {
        self.snapshot
            .metadata()
            .get_by_id(entity_id)
            .cloned()
            .ok_or(QueryError::NotFound(entity_id))
    }

    /// Fail with `MissingData` when no row carries a summary embedding
    pub fn ensure_summaries(&self) -> Result<(), QueryError> {
        let any = self
            .snapshot
            .metadata()
            .iter()
            .any(|record| record.overview_emb.is_some());
        if any {
            Ok(())
        } else {
            Err(QueryError::MissingData(
                "No summary embeddings are available in the corpus".to_string(),
            ))
        }
    }

    /// Encode `text` in-line and rank rows by summary similarity
    pub fn find_by_description(
        &self,
        text: &str,
        k: usize,
        encoder: &dyn TextEncoder,
    ) -> Result<Vec<ScoredEntity>, QueryError> {
        let text = validate_description(text)?;
        self.ensure_summaries()?;
        let query = encoder.encode(text)?;
        self.find_by_summary_embedding(&query, k)
    }

    /// Rank rows by the dot product of `query` with each stored summary
    /// embedding. The composite index is not consulted.
    pub fn find_by_summary_embedding(&self, query: &[f32], k: usize) -> Result<Vec<ScoredEntity>, QueryError> {
        self.ensure_summaries()?;

        let expected = self.snapshot.composer().embedding_dim();
        if query.len() != expected {
            return Err(QueryError::InvalidInput(format!(
                "Encoder produced {} dimensions, stored summary embeddings have {}",
                query.len(),
                expected
            )));
        }

        let metadata = self.snapshot.metadata();
        let k = k.min(metadata.len());
        let scores = metadata.iter().enumerate().filter_map(|(row, record)| {
            record
                .overview_emb
                .as_deref()
                .map(|embedding| (row, dot(query, embedding)))
        });

        let results = top_k(scores, k)
            .into_iter()
            .filter_map(|n| {
                metadata.get(n.slot).map(|entity| ScoredEntity {
                    entity: entity.clone(),
                    score: n.score,
                })
            })
            .collect();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::HashingEncoder;
    use cinex_core::{ComposerConfig, EmbeddingField, VectorComposer};

    fn composer() -> Arc<VectorComposer> {
        Arc::new(
            VectorComposer::new(ComposerConfig {
                embedding_dim: 2,
                ..ComposerConfig::default()
            })
            .unwrap(),
        )
    }

    fn movie(id: u64, keywords: [f32; 2]) -> EntityRecord {
        EntityRecord::new(id, format!("movie {}", id))
            .with_embedding(EmbeddingField::Keywords, keywords.to_vec())
            .with_embedding(EmbeddingField::CombinedClassification, vec![1.0, 0.0])
    }

    fn snapshot(records: Vec<EntityRecord>) -> CorpusSnapshot {
        CorpusSnapshot::build(records, composer()).unwrap()
    }

    #[test]
    fn test_similarity_excludes_self_and_orders() {
        let corpus = snapshot(vec![
            movie(1, [1.0, 0.0]),
            movie(2, [0.0, 1.0]),
            movie(3, [0.9, 0.1]),
            movie(4, [0.6, 0.4]),
        ]);
        let retriever = Retriever::new(&corpus);

        let results = retriever.find_by_similarity(1, 3).unwrap();
        let ids: Vec<u64> = results.iter().map(ScoredEntity::id).collect();
        assert_eq!(ids, vec![3, 4, 2]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_similarity_unknown_id() {
        let corpus = snapshot(vec![movie(1, [1.0, 0.0])]);
        let err = Retriever::new(&corpus).find_by_similarity(99, 5).unwrap_err();
        assert_eq!(err, QueryError::NotFound(99));
    }

    #[test]
    fn test_similarity_single_entity_is_empty() {
        let corpus = snapshot(vec![movie(1, [1.0, 0.0])]);
        assert!(Retriever::new(&corpus).find_by_similarity(1, 5).unwrap().is_empty());
        assert!(Retriever::new(&corpus).find_by_similarity(1, 0).unwrap().is_empty());
    }

    #[test]
    fn test_similarity_excludes_self_among_duplicates() {
        // identical vectors: self must go even when it is not the first hit
        let corpus = snapshot(vec![movie(1, [1.0, 0.0]), movie(2, [1.0, 0.0]), movie(3, [1.0, 0.0])]);
        let results = Retriever::new(&corpus).find_by_similarity(2, 2).unwrap();
        let ids: Vec<u64> = results.iter().map(ScoredEntity::id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_unbounded_k_returns_whole_corpus() {
        let corpus = snapshot(vec![
            movie(1, [1.0, 0.0]).with_embedding(EmbeddingField::Overview, vec![1.0, 0.0]),
            movie(2, [0.0, 1.0]).with_embedding(EmbeddingField::Overview, vec![0.0, 1.0]),
            movie(3, [0.9, 0.1]),
        ]);
        let retriever = Retriever::new(&corpus);

        for k in [usize::MAX, usize::MAX / 64] {
            let similar = retriever.find_by_similarity(1, k).unwrap();
            let ids: Vec<u64> = similar.iter().map(ScoredEntity::id).collect();
            assert_eq!(ids, vec![3, 2]);

            let described = retriever.find_by_summary_embedding(&[1.0, 0.0], k).unwrap();
            assert_eq!(described.len(), 2);
        }
    }

    #[test]
    fn test_find_by_id() {
        let corpus = snapshot(vec![movie(7, [1.0, 0.0])]);
        let retriever = Retriever::new(&corpus);
        assert_eq!(retriever.find_by_id(7).unwrap().title, "movie 7");
        assert_eq!(retriever.find_by_id(8).unwrap_err().kind(), "not_found");
    }

    #[test]
    fn test_description_ranks_by_summary() {
        let corpus = snapshot(vec![
            movie(1, [1.0, 0.0]).with_embedding(EmbeddingField::Overview, vec![0.0, 1.0]),
            movie(2, [1.0, 0.0]),
            movie(3, [1.0, 0.0]).with_embedding(EmbeddingField::Overview, vec![1.0, 0.0]),
            movie(4, [1.0, 0.0]).with_embedding(EmbeddingField::Overview, vec![0.6, 0.8]),
        ]);
        let retriever = Retriever::new(&corpus);

        let results = retriever.find_by_summary_embedding(&[1.0, 0.0], 5).unwrap();
        let ids: Vec<u64> = results.iter().map(ScoredEntity::id).collect();
        assert_eq!(ids, vec![3, 4, 1]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_description_ties_keep_table_order() {
        let corpus = snapshot(vec![
            movie(5, [1.0, 0.0]).with_embedding(EmbeddingField::Overview, vec![1.0, 0.0]),
            movie(2, [1.0, 0.0]).with_embedding(EmbeddingField::Overview, vec![1.0, 0.0]),
            movie(9, [1.0, 0.0]).with_embedding(EmbeddingField::Overview, vec![1.0, 0.0]),
        ]);
        let results = Retriever::new(&corpus).find_by_summary_embedding(&[1.0, 0.0], 2).unwrap();
        let ids: Vec<u64> = results.iter().map(ScoredEntity::id).collect();
        assert_eq!(ids, vec![2, 5]);
    }

    #[test]
    fn test_description_errors() {
        let without = snapshot(vec![movie(1, [1.0, 0.0])]);
        let encoder = HashingEncoder::new(2);

        let blank = Retriever::new(&without).find_by_description("   ", 5, &encoder);
        assert_eq!(blank.unwrap_err().kind(), "invalid_input");

        let missing = Retriever::new(&without).find_by_description("heist", 5, &encoder);
        assert_eq!(missing.unwrap_err().kind(), "missing_data");

        let with = snapshot(vec![
            movie(1, [1.0, 0.0]).with_embedding(EmbeddingField::Overview, vec![1.0, 0.0]),
        ]);
        let wide = HashingEncoder::new(16);
        let mismatch = Retriever::new(&with).find_by_description("heist", 5, &wide);
        assert_eq!(mismatch.unwrap_err().kind(), "invalid_input");

        let ok = Retriever::new(&with).find_by_description("heist", 5, &encoder).unwrap();
        assert_eq!(ok.len(), 1);
    }
}
