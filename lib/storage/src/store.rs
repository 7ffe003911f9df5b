use crate::artifacts::{self, ArtifactHeader, ArtifactPaths, LoadFailure, PersistError};
use crate::source::{EntitySource, SourceError};
use cinex_core::{EntityRecord, FlatIndex, InnerProductIndex, MetadataTable, VectorComposer};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Entity source failed: {0}")]
    Source(#[from] SourceError),

    #[error("Entity source has no indexable records")]
    EmptySource,

    #[error("Index construction failed: {0}")]
    Core(#[from] cinex_core::Error),
}

/// An immutable index + metadata pair, with the composer it was built under.
///
/// Slot `i` of the index and row `i` of the metadata table describe the same
/// entity. A snapshot is never mutated; a rebuild produces a new one.
#[derive(Debug, Clone)]
pub struct CorpusSnapshot {
    header: ArtifactHeader,
    index: FlatIndex,
    metadata: MetadataTable,
    composer: Arc<VectorComposer>,
}

impl CorpusSnapshot {
    /// Build a snapshot from raw records.
    ///
    /// Records without the combined classification embedding are excluded,
    /// as are records with mis-sized embeddings. Survivors are ordered by
    /// ascending id; a repeated id keeps its first occurrence.
    pub fn build(
        records: Vec<EntityRecord>,
        composer: Arc<VectorComposer>,
    ) -> Result<Self, BuildError> {
        let embedding_dim = composer.embedding_dim();
        let mut corpus: Vec<EntityRecord> = Vec::with_capacity(records.len());

        for record in records {
            if !record.is_indexable() {
                continue;
            }
            if let Err(e) = record.validate(embedding_dim) {
                warn!("Skipping entity {} ({}): {}", record.id, record.title, e);
                continue;
            }
            corpus.push(record);
        }

        corpus.sort_by_key(|record| record.id);
        let mut seen = HashSet::with_capacity(corpus.len());
        corpus.retain(|record| {
            let first = seen.insert(record.id);
            if !first {
                warn!("Dropping duplicate entity id {}", record.id);
            }
            first
        });

        if corpus.is_empty() {
            return Err(BuildError::EmptySource);
        }

        let vectors = composer.compose_all(&corpus);
        let index = FlatIndex::from_vectors(composer.dim(), &vectors)?;
        let metadata = MetadataTable::new(corpus)?;
        let header = ArtifactHeader::new(composer.fingerprint(), index.dim(), index.len());

        info!(
            "Built index with {} vectors of dimension {}",
            index.len(),
            index.dim()
        );

        Ok(Self {
            header,
            index,
            metadata,
            composer,
        })
    }

    #[inline]
    pub fn header(&self) -> &ArtifactHeader {
        &self.header
    }

    #[inline]
    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    #[inline]
    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    #[inline]
    pub fn composer(&self) -> &VectorComposer {
        &self.composer
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }
}

/// Build, persist and load the corpus index and its metadata table
#[derive(Debug, Clone)]
pub struct IndexStore {
    paths: ArtifactPaths,
    composer: Arc<VectorComposer>,
}

impl IndexStore {
    pub fn new(paths: ArtifactPaths, composer: Arc<VectorComposer>) -> Self {
        Self { paths, composer }
    }

    #[inline]
    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    #[inline]
    pub fn composer(&self) -> &Arc<VectorComposer> {
        &self.composer
    }

    /// Build a fresh snapshot from the entity source
    pub fn build(&self, source: &dyn EntitySource) -> Result<CorpusSnapshot, BuildError> {
        info!("Reading entities from {}", source.describe());
        let records = source.fetch_indexable()?;
        info!("Loaded {} entities with embeddings", records.len());
        CorpusSnapshot::build(records, self.composer.clone())
    }

    /// Write both artifacts for `snapshot`
    pub fn persist(&self, snapshot: &CorpusSnapshot) -> Result<(), PersistError> {
        artifacts::write_pair(&self.paths, &snapshot.header, &snapshot.index, &snapshot.metadata)?;
        info!(
            "Saved index to {:?} and metadata to {:?}",
            self.paths.index, self.paths.metadata
        );
        Ok(())
    }

    /// Read both artifacts back. Never returns a partial pair.
    pub fn load(&self) -> Result<CorpusSnapshot, LoadFailure> {
        let (header, index, metadata) =
            artifacts::read_pair(&self.paths, &self.composer.fingerprint())?;
        info!(
            "Loaded existing index with {} entities (build {}, built {})",
            header.rows, header.build_id, header.built_at
        );
        Ok(CorpusSnapshot {
            header,
            index,
            metadata,
            composer: self.composer.clone(),
        })
    }

    /// Load the persisted pair, or rebuild and persist it when loading fails.
    ///
    /// A build failure is returned: serving an empty index is never an option.
    /// A persist failure after a good build only costs a rebuild on next start.
    pub fn load_or_build(&self, source: &dyn EntitySource) -> Result<CorpusSnapshot, BuildError> {
        match self.load() {
            Ok(snapshot) => return Ok(snapshot),
            Err(LoadFailure::Missing(path)) => {
                info!("No persisted artifact at {:?}, building index", path);
            }
            Err(e) => {
                warn!("Failed to load persisted index, rebuilding: {}", e);
            }
        }

        let snapshot = self.build(source)?;
        if let Err(e) = self.persist(&snapshot) {
            warn!("Built index could not be persisted: {}", e);
        } else {
            debug!("Persisted build {}", snapshot.header.build_id);
        }
        Ok(snapshot)
    }
}
