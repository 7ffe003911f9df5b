use serde::{Deserialize, Serialize};
use std::fmt;

/// Default width of every per-field embedding (MiniLM-class sentence encoders).
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// One embedding column. Absent means "not computed yet", never partial.
pub type Embedding = Option<Vec<f32>>;

/// One corpus item as produced by the upstream ETL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityRecord {
    /// Upstream identifier, unique and never reused
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub overview: String,
    /// Raw score on a 0-10 scale
    #[serde(default)]
    pub vote_average: f32,
    /// Min-max scaled score in [0, 1]
    #[serde(default)]
    pub vote_average_scaled: f32,

    #[serde(default)]
    pub overview_emb: Embedding,
    #[serde(default)]
    pub genres_emb: Embedding,
    #[serde(default)]
    pub keywords_emb: Embedding,
    #[serde(default)]
    pub atmosphere_emb: Embedding,
    #[serde(default)]
    pub narrative_emb: Embedding,
    #[serde(default)]
    pub themes_emb: Embedding,
    #[serde(default)]
    pub classified_emb_combined: Embedding,

    // Display-only classification text
    #[serde(default)]
    pub atmosphere: Option<String>,
    #[serde(default)]
    pub narrative: Option<String>,
    #[serde(default)]
    pub themes: Option<String>,
}

/// The seven embedding columns an entity may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddingField {
    Overview,
    Genres,
    Keywords,
    Atmosphere,
    Narrative,
    Themes,
    CombinedClassification,
}

impl EmbeddingField {
    pub const ALL: [EmbeddingField; 7] = [
        EmbeddingField::Overview,
        EmbeddingField::Genres,
        EmbeddingField::Keywords,
        EmbeddingField::Atmosphere,
        EmbeddingField::Narrative,
        EmbeddingField::Themes,
        EmbeddingField::CombinedClassification,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EmbeddingField::Overview => "overview_emb",
            EmbeddingField::Genres => "genres_emb",
            EmbeddingField::Keywords => "keywords_emb",
            EmbeddingField::Atmosphere => "atmosphere_emb",
            EmbeddingField::Narrative => "narrative_emb",
            EmbeddingField::Themes => "themes_emb",
            EmbeddingField::CombinedClassification => "classified_emb_combined",
        }
    }
}

impl fmt::Display for EmbeddingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl EntityRecord {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            overview: String::new(),
            vote_average: 0.0,
            vote_average_scaled: 0.0,
            overview_emb: None,
            genres_emb: None,
            keywords_emb: None,
            atmosphere_emb: None,
            narrative_emb: None,
            themes_emb: None,
            classified_emb_combined: None,
            atmosphere: None,
            narrative: None,
            themes: None,
        }
    }

    #[inline]
    pub fn embedding(&self, field: EmbeddingField) -> Option<&[f32]> {
        let column = match field {
            EmbeddingField::Overview => &self.overview_emb,
            EmbeddingField::Genres => &self.genres_emb,
            EmbeddingField::Keywords => &self.keywords_emb,
            EmbeddingField::Atmosphere => &self.atmosphere_emb,
            EmbeddingField::Narrative => &self.narrative_emb,
            EmbeddingField::Themes => &self.themes_emb,
            EmbeddingField::CombinedClassification => &self.classified_emb_combined,
        };
        column.as_deref()
    }

    pub fn set_embedding(&mut self, field: EmbeddingField, value: Embedding) {
        let column = match field {
            EmbeddingField::Overview => &mut self.overview_emb,
            EmbeddingField::Genres => &mut self.genres_emb,
            EmbeddingField::Keywords => &mut self.keywords_emb,
            EmbeddingField::Atmosphere => &mut self.atmosphere_emb,
            EmbeddingField::Narrative => &mut self.narrative_emb,
            EmbeddingField::Themes => &mut self.themes_emb,
            EmbeddingField::CombinedClassification => &mut self.classified_emb_combined,
        };
        *column = value;
    }

    #[inline]
    #[must_use]
    pub fn with_embedding(mut self, field: EmbeddingField, value: Vec<f32>) -> Self {
        self.set_embedding(field, Some(value));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_overview(mut self, overview: impl Into<String>) -> Self {
        self.overview = overview.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_vote(mut self, average: f32, scaled: f32) -> Self {
        self.vote_average = average;
        self.vote_average_scaled = scaled;
        self
    }

    /// Eligible for the corpus: carries the combined classification embedding.
    #[inline]
    pub fn is_indexable(&self) -> bool {
        self.classified_emb_combined.is_some()
    }

    /// Check every present embedding has width `dim`.
    pub fn validate(&self, dim: usize) -> crate::Result<()> {
        for field in EmbeddingField::ALL {
            if let Some(values) = self.embedding(field) {
                if values.len() != dim {
                    return Err(crate::Error::InvalidDimension {
                        expected: dim,
                        actual: values.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_accessors() {
        let record = EntityRecord::new(7, "Heat")
            .with_embedding(EmbeddingField::Keywords, vec![1.0, 2.0]);

        assert_eq!(record.embedding(EmbeddingField::Keywords), Some(&[1.0, 2.0][..]));
        assert!(record.embedding(EmbeddingField::Overview).is_none());
        assert!(!record.is_indexable());
    }

    #[test]
    fn test_validate_rejects_wrong_width() {
        let record = EntityRecord::new(1, "Alien")
            .with_embedding(EmbeddingField::Themes, vec![0.0; 3]);
        assert!(record.validate(3).is_ok());
        assert!(record.validate(4).is_err());
    }

    #[test]
    fn test_deserialize_sparse_row() {
        let json = r#"{"id": 42, "title": "Solaris", "vote_average": 7.9}"#;
        let record: EntityRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, 42);
        assert!(record.overview.is_empty());
        assert!(record.classified_emb_combined.is_none());
    }
}
