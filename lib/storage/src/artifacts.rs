// On-disk artifacts: the composite index and its parallel metadata table.
//
// Each file is written to a temp file and renamed into place. Both files carry
// the same build id, so a pair whose second rename never happened is rejected
// at load time instead of being served.
use atomicwrites::{AtomicFile, OverwriteBehavior};
use chrono::{DateTime, Utc};
use cinex_core::{EntityRecord, FlatIndex, InnerProductIndex, MetadataTable};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

pub const FORMAT_VERSION: u32 = 1;
pub const DEFAULT_INDEX_FILE: &str = "composite.index";
pub const DEFAULT_METADATA_FILE: &str = "metadata.table";

/// Why a persisted pair could not be used
#[derive(Error, Debug)]
pub enum LoadFailure {
    #[error("Artifact missing: {0:?}")]
    Missing(PathBuf),

    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt artifact {path:?}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Unsupported artifact format version {0}")]
    UnsupportedVersion(u32),

    #[error("Row count mismatch: index has {index_rows} rows, metadata has {metadata_rows}")]
    CountMismatch {
        index_rows: usize,
        metadata_rows: usize,
    },

    #[error("Artifacts come from different builds: index {index}, metadata {metadata}")]
    BuildMismatch { index: Uuid, metadata: Uuid },

    #[error("Artifacts were built with composer layout {found}, current layout is {expected}")]
    StaleLayout { expected: String, found: String },

    #[error("Artifacts hold an empty corpus")]
    Empty,
}

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("IO error writing {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Locations of the two artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub index: PathBuf,
    pub metadata: PathBuf,
}

impl ArtifactPaths {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(index: P, metadata: Q) -> Self {
        Self {
            index: index.as_ref().to_path_buf(),
            metadata: metadata.as_ref().to_path_buf(),
        }
    }

    /// Default file names inside `data_dir`
    pub fn in_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        let dir = data_dir.as_ref();
        Self::new(dir.join(DEFAULT_INDEX_FILE), dir.join(DEFAULT_METADATA_FILE))
    }

    pub fn both_exist(&self) -> bool {
        self.index.exists() && self.metadata.exists()
    }
}

/// Shared by both artifacts of one build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub format_version: u32,
    pub build_id: Uuid,
    pub built_at: DateTime<Utc>,
    pub layout_fingerprint: String,
    pub dim: usize,
    pub rows: usize,
}

impl ArtifactHeader {
    pub fn new(layout_fingerprint: String, dim: usize, rows: usize) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            build_id: Uuid::new_v4(),
            built_at: Utc::now(),
            layout_fingerprint,
            dim,
            rows,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexArtifact {
    pub header: ArtifactHeader,
    pub vectors: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetadataArtifact {
    pub header: ArtifactHeader,
    pub records: Vec<EntityRecord>,
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| PersistError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .map_err(|e| PersistError::Io {
            path: path.to_path_buf(),
            source: match e {
                atomicwrites::Error::Internal(err) | atomicwrites::Error::User(err) => err,
            },
        })
}

fn gzip(bytes: &[u8]) -> Result<Vec<u8>, PersistError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| PersistError::Serialization(format!("gzip: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| PersistError::Serialization(format!("gzip: {}", e)))
}

/// Write the index artifact, then the metadata artifact, both under `header`.
pub fn write_pair(
    paths: &ArtifactPaths,
    header: &ArtifactHeader,
    index: &FlatIndex,
    metadata: &MetadataTable,
) -> Result<(), PersistError> {
    let index_artifact = IndexArtifact {
        header: header.clone(),
        vectors: index.as_raw().to_vec(),
    };
    let metadata_artifact = MetadataArtifact {
        header: header.clone(),
        records: metadata.to_records(),
    };

    // Serialize both before touching disk so an encoding failure writes nothing
    let index_bytes = bincode::serialize(&index_artifact)
        .map_err(|e| PersistError::Serialization(e.to_string()))?;
    let metadata_bytes = bincode::serialize(&metadata_artifact)
        .map_err(|e| PersistError::Serialization(e.to_string()))?;
    let metadata_bytes = gzip(&metadata_bytes)?;

    write_atomic(&paths.index, &index_bytes)?;
    write_atomic(&paths.metadata, &metadata_bytes)?;
    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>, LoadFailure> {
    if !path.exists() {
        return Err(LoadFailure::Missing(path.to_path_buf()));
    }
    fs::read(path).map_err(|source| LoadFailure::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_index_artifact(path: &Path) -> Result<IndexArtifact, LoadFailure> {
    let bytes = read_file(path)?;
    bincode::deserialize(&bytes).map_err(|e| LoadFailure::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

pub fn read_metadata_artifact(path: &Path) -> Result<MetadataArtifact, LoadFailure> {
    let bytes = read_file(path)?;
    let decoder = GzDecoder::new(bytes.as_slice());
    bincode::deserialize_from(decoder).map_err(|e| LoadFailure::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Read both artifacts and check they describe the same, current build.
pub fn read_pair(
    paths: &ArtifactPaths,
    expected_fingerprint: &str,
) -> Result<(ArtifactHeader, FlatIndex, MetadataTable), LoadFailure> {
    let index_artifact = read_index_artifact(&paths.index)?;
    let metadata_artifact = read_metadata_artifact(&paths.metadata)?;
    let header = index_artifact.header;

    for version in [header.format_version, metadata_artifact.header.format_version] {
        if version != FORMAT_VERSION {
            return Err(LoadFailure::UnsupportedVersion(version));
        }
    }

    let index = FlatIndex::from_raw(header.dim, index_artifact.vectors).map_err(|e| {
        LoadFailure::Corrupt {
            path: paths.index.clone(),
            message: e.to_string(),
        }
    })?;

    let index_rows = index.len();
    let metadata_rows = metadata_artifact.records.len();
    if index_rows != metadata_rows {
        return Err(LoadFailure::CountMismatch {
            index_rows,
            metadata_rows,
        });
    }

    if header.build_id != metadata_artifact.header.build_id {
        return Err(LoadFailure::BuildMismatch {
            index: header.build_id,
            metadata: metadata_artifact.header.build_id,
        });
    }

    if header.rows != index_rows {
        return Err(LoadFailure::Corrupt {
            path: paths.index.clone(),
            message: format!("header declares {} rows, found {}", header.rows, index_rows),
        });
    }

    if header.layout_fingerprint != expected_fingerprint {
        return Err(LoadFailure::StaleLayout {
            expected: expected_fingerprint.to_string(),
            found: header.layout_fingerprint,
        });
    }

    if index_rows == 0 {
        return Err(LoadFailure::Empty);
    }

    let metadata =
        MetadataTable::new(metadata_artifact.records).map_err(|e| LoadFailure::Corrupt {
            path: paths.metadata.clone(),
            message: e.to_string(),
        })?;

    Ok((header, index, metadata))
}
