//! Composite vector composer
//!
//! Maps one entity's embeddings and scaled score into a single fixed-width,
//! L2-normalized vector by weighted concatenation. The layout (which fields,
//! in which order, with which weights) must be identical at index build time
//! and at query time, so it is fingerprinted and stored with the artifacts.

use crate::entity::{EmbeddingField, EntityRecord, DEFAULT_EMBEDDING_DIM};
use crate::{Error, Result, Vector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Cow;

pub const OVERVIEW_WEIGHT: f32 = 1.0;
pub const GENRE_WEIGHT: f32 = 2.0;
pub const KEYWORD_WEIGHT: f32 = 3.0;
pub const VOTE_WEIGHT: f32 = 0.2;
pub const ATMOSPHERE_WEIGHT: f32 = 2.0;
pub const NARRATIVE_WEIGHT: f32 = 2.0;
pub const THEMES_WEIGHT: f32 = 2.0;
pub const COMBINED_CLASSIFIED_WEIGHT: f32 = 2.5;

/// Per-field weight constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub overview: f32,
    pub genre: f32,
    pub keyword: f32,
    pub vote: f32,
    pub atmosphere: f32,
    pub narrative: f32,
    pub themes: f32,
    pub combined_classified: f32,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            overview: OVERVIEW_WEIGHT,
            genre: GENRE_WEIGHT,
            keyword: KEYWORD_WEIGHT,
            vote: VOTE_WEIGHT,
            atmosphere: ATMOSPHERE_WEIGHT,
            narrative: NARRATIVE_WEIGHT,
            themes: THEMES_WEIGHT,
            combined_classified: COMBINED_CLASSIFIED_WEIGHT,
        }
    }
}

impl FieldWeights {
    #[inline]
    pub fn for_field(&self, field: EmbeddingField) -> f32 {
        match field {
            EmbeddingField::Overview => self.overview,
            EmbeddingField::Genres => self.genre,
            EmbeddingField::Keywords => self.keyword,
            EmbeddingField::Atmosphere => self.atmosphere,
            EmbeddingField::Narrative => self.narrative,
            EmbeddingField::Themes => self.themes,
            EmbeddingField::CombinedClassification => self.combined_classified,
        }
    }

    fn all(&self) -> [(&'static str, f32); 8] {
        [
            ("overview", self.overview),
            ("genre", self.genre),
            ("keyword", self.keyword),
            ("vote", self.vote),
            ("atmosphere", self.atmosphere),
            ("narrative", self.narrative),
            ("themes", self.themes),
            ("combined_classified", self.combined_classified),
        ]
    }
}

/// Configuration for the composer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Width of every per-field embedding
    pub embedding_dim: usize,
    pub weights: FieldWeights,
    /// Append the combined classification embedding after the themes segment
    pub include_combined: bool,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            weights: FieldWeights::default(),
            include_combined: false,
        }
    }
}

impl ComposerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dim == 0 {
            return Err(Error::InvalidConfig("embedding_dim must be positive".to_string()));
        }
        for (name, weight) in self.weights.all() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "weight '{}' must be a finite non-negative number, got {}",
                    name, weight
                )));
            }
        }
        Ok(())
    }
}

/// One segment of the composite layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Embedding(EmbeddingField),
    /// The weighted scaled score, 1 wide
    Vote,
}

/// Substitute the zero vector for an absent embedding.
///
/// An embedding whose width differs from `width` is treated as absent, so a
/// malformed upstream row dilutes the composite instead of corrupting its layout.
pub fn embedding_or_zero(value: Option<&[f32]>, width: usize) -> Cow<'_, [f32]> {
    match value {
        Some(values) if values.len() == width => Cow::Borrowed(values),
        Some(values) => {
            tracing::debug!(
                "embedding width {} does not match expected {}, substituting zeros",
                values.len(),
                width
            );
            Cow::Owned(vec![0.0; width])
        }
        None => Cow::Owned(vec![0.0; width]),
    }
}

/// Deterministic composite vector builder
#[derive(Debug, Clone)]
pub struct VectorComposer {
    config: ComposerConfig,
    layout: Vec<Segment>,
    dim: usize,
}

impl Default for VectorComposer {
    fn default() -> Self {
        Self::from_valid(ComposerConfig::default())
    }
}

impl VectorComposer {
    pub fn new(config: ComposerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: ComposerConfig) -> Self {
        // overview, genres, keywords, vote, atmosphere, narrative, themes[, combined]
        let mut layout = vec![
            Segment::Embedding(EmbeddingField::Overview),
            Segment::Embedding(EmbeddingField::Genres),
            Segment::Embedding(EmbeddingField::Keywords),
            Segment::Vote,
            Segment::Embedding(EmbeddingField::Atmosphere),
            Segment::Embedding(EmbeddingField::Narrative),
            Segment::Embedding(EmbeddingField::Themes),
        ];
        if config.include_combined {
            layout.push(Segment::Embedding(EmbeddingField::CombinedClassification));
        }

        let dim = layout
            .iter()
            .map(|segment| match segment {
                Segment::Embedding(_) => config.embedding_dim,
                Segment::Vote => 1,
            })
            .sum();

        Self { config, layout, dim }
    }

    #[inline]
    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    #[inline]
    pub fn layout(&self) -> &[Segment] {
        &self.layout
    }

    /// Width of every composite vector
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn embedding_dim(&self) -> usize {
        self.config.embedding_dim
    }

    /// Compose one record into a unit-length vector, or the zero vector when
    /// every weighted field is zero.
    pub fn compose(&self, record: &EntityRecord) -> Vector {
        let width = self.config.embedding_dim;
        let weights = &self.config.weights;
        let mut components: Vec<f32> = Vec::with_capacity(self.dim);

        for segment in &self.layout {
            match *segment {
                Segment::Embedding(field) => {
                    let weight = weights.for_field(field);
                    let values = embedding_or_zero(record.embedding(field), width);
                    components.extend(values.iter().map(|v| v * weight));
                }
                Segment::Vote => components.push(record.vote_average_scaled * weights.vote),
            }
        }

        let mut vector = Vector::new(components);
        vector.normalize();
        vector
    }

    /// Compose many records in parallel, preserving input order.
    pub fn compose_all(&self, records: &[EntityRecord]) -> Vec<Vector> {
        records.par_iter().map(|record| self.compose(record)).collect()
    }

    /// Hex SHA-256 over the layout and weights.
    ///
    /// Artifacts built under one fingerprint are rejected by a composer with another.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"cinex-composer-v1");
        hasher.update((self.config.embedding_dim as u64).to_le_bytes());
        for segment in &self.layout {
            match *segment {
                Segment::Embedding(field) => {
                    hasher.update(field.name().as_bytes());
                    hasher.update(self.config.weights.for_field(field).to_bits().to_le_bytes());
                }
                Segment::Vote => {
                    hasher.update(b"vote_average_scaled");
                    hasher.update(self.config.weights.vote.to_bits().to_le_bytes());
                }
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_composer() -> VectorComposer {
        VectorComposer::new(ComposerConfig {
            embedding_dim: 4,
            ..ComposerConfig::default()
        })
        .unwrap()
    }

    fn full_record(id: u64) -> EntityRecord {
        let mut record = EntityRecord::new(id, format!("movie {}", id)).with_vote(7.0, 0.7);
        for (i, field) in EmbeddingField::ALL.into_iter().enumerate() {
            let base = (id as f32) + i as f32;
            record.set_embedding(field, Some(vec![base, 0.5, -0.25, 1.0 / (base + 1.0)]));
        }
        record
    }

    #[test]
    fn test_dimension_excludes_combined_by_default() {
        let composer = VectorComposer::default();
        assert_eq!(composer.dim(), 6 * DEFAULT_EMBEDDING_DIM + 1);

        let with_combined = VectorComposer::new(ComposerConfig {
            include_combined: true,
            ..ComposerConfig::default()
        })
        .unwrap();
        assert_eq!(with_combined.dim(), 7 * DEFAULT_EMBEDDING_DIM + 1);
    }

    #[test]
    fn test_compose_is_deterministic() {
        let composer = small_composer();
        let record = full_record(3);

        let v1 = composer.compose(&record);
        let v2 = composer.compose(&record);

        let bits1: Vec<u32> = v1.as_slice().iter().map(|x| x.to_bits()).collect();
        let bits2: Vec<u32> = v2.as_slice().iter().map(|x| x.to_bits()).collect();
        assert_eq!(bits1, bits2);
    }

    #[test]
    fn test_compose_is_unit_length() {
        let composer = VectorComposer::default();
        let mut record = EntityRecord::new(1, "Only keywords");
        record.keywords_emb = Some((0..DEFAULT_EMBEDDING_DIM).map(|i| (i as f32).sin()).collect());

        let vector = composer.compose(&record);
        assert_eq!(vector.dim(), composer.dim());

        let norm: f64 = vector
            .as_slice()
            .iter()
            .map(|&x| f64::from(x) * f64::from(x))
            .sum::<f64>()
            .sqrt();
        assert!((norm - 1.0).abs() < 1e-6, "norm was {}", norm);
    }

    #[test]
    fn test_all_absent_yields_zero_vector() {
        let composer = small_composer();
        let record = EntityRecord::new(9, "Nothing computed");

        let vector = composer.compose(&record);
        assert_eq!(vector.dim(), composer.dim());
        assert!(vector.as_slice().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_layout_order_and_weights() {
        let composer = small_composer();
        let mut record = EntityRecord::new(1, "Ordered").with_vote(5.0, 1.0);
        record.keywords_emb = Some(vec![1.0, 0.0, 0.0, 0.0]);

        let vector = composer.compose(&record);
        let slice = vector.as_slice();

        // keywords occupy [8, 12), the vote sits at 12
        let keyword = KEYWORD_WEIGHT;
        let vote = VOTE_WEIGHT;
        let norm = (keyword * keyword + vote * vote).sqrt();
        assert!((slice[8] - keyword / norm).abs() < 1e-6);
        assert!((slice[12] - vote / norm).abs() < 1e-6);
        assert_eq!(slice[0], 0.0);
    }

    #[test]
    fn test_embedding_or_zero_policy() {
        let present = vec![1.0f32, 2.0, 3.0];
        assert_eq!(&*embedding_or_zero(Some(&present[..]), 3), &present[..]);
        assert_eq!(&*embedding_or_zero(None, 2), &[0.0f32, 0.0][..]);
        assert_eq!(&*embedding_or_zero(Some(&present[..]), 4), &[0.0f32; 4][..]);
    }

    #[test]
    fn test_partial_record_is_diluted_not_rejected() {
        // A record missing half its fields still composes; its present fields
        // carry more of the unit norm than in a complete record.
        let composer = small_composer();
        let complete = full_record(2);
        let mut partial = complete.clone();
        partial.atmosphere_emb = None;
        partial.narrative_emb = None;
        partial.themes_emb = None;

        let a = composer.compose(&complete);
        let b = composer.compose(&partial);
        assert!((b.norm() - 1.0).abs() < 1e-6);
        assert!(b.as_slice()[8].abs() > a.as_slice()[8].abs());
    }

    #[test]
    fn test_fingerprint_tracks_weights() {
        let base = small_composer();
        let same = small_composer();
        assert_eq!(base.fingerprint(), same.fingerprint());

        let mut config = base.config().clone();
        config.weights.keyword = 3.5;
        let changed = VectorComposer::new(config).unwrap();
        assert_ne!(base.fingerprint(), changed.fingerprint());
    }

    #[test]
    fn test_compose_all_preserves_order() {
        let composer = small_composer();
        let records: Vec<EntityRecord> = (1..=5).map(full_record).collect();
        let batch = composer.compose_all(&records);
        for (record, vector) in records.iter().zip(&batch) {
            assert_eq!(&composer.compose(record), vector);
        }
    }

    #[test]
    fn test_rejects_negative_weight() {
        let mut config = ComposerConfig::default();
        config.weights.genre = -1.0;
        assert!(VectorComposer::new(config).is_err());
    }
}
