use crate::error::QueryError;
use crate::fuzzy::weighted_ratio;
use cinex_core::MetadataTable;
use tracing::debug;

/// Minimum score a title match must reach
pub const DEFAULT_CUTOFF: u8 = 75;

/// Best fuzzy title match against the corpus
#[derive(Debug, Clone, PartialEq)]
pub struct TitleMatch {
    pub position: usize,
    pub title: String,
    pub score: u8,
}

/// Maps a user-typed title to an entity id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleResolver {
    cutoff: u8,
}

impl Default for TitleResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CUTOFF)
    }
}

impl TitleResolver {
    pub fn new(cutoff: u8) -> Self {
        Self { cutoff: cutoff.min(100) }
    }

    #[inline]
    pub fn cutoff(&self) -> u8 {
        self.cutoff
    }

    /// Highest-scoring title; the first row wins among equal scores.
    pub fn best_match(&self, metadata: &MetadataTable, query: &str) -> Option<TitleMatch> {
        let mut best: Option<TitleMatch> = None;
        for (position, record) in metadata.iter().enumerate() {
            let score = weighted_ratio(query, &record.title);
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(TitleMatch {
                    position,
                    title: record.title.clone(),
                    score,
                });
                if score == 100 {
                    break;
                }
            }
        }
        best
    }

    /// Resolve `query` to the id of the best-matching title.
    ///
    /// When several rows share the winning title, the first of them is returned.
    pub fn resolve(&self, metadata: &MetadataTable, query: &str) -> Result<u64, QueryError> {
        if query.trim().is_empty() {
            return Err(QueryError::InvalidInput("Title must not be empty".to_string()));
        }

        let best = self.best_match(metadata, query).ok_or(QueryError::NoCandidates)?;
        if best.score < self.cutoff {
            return Err(QueryError::NoMatch {
                query: query.to_string(),
                best_title: best.title,
                score: best.score,
                cutoff: self.cutoff,
            });
        }

        let id = metadata
            .iter()
            .find(|record| record.title == best.title)
            .map(|record| record.id)
            .ok_or(QueryError::NoCandidates)?;

        debug!(
            "Resolved '{}' to '{}' (ID: {}, score {})",
            query, best.title, id, best.score
        );
        Ok(id)
    }
}
