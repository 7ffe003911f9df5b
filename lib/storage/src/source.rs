// Entity sources: where the ETL-produced rows are read from at build time
use cinex_core::EntityRecord;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Entity source unreachable: {0}")]
    Unreachable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed record at {location}: {message}")]
    Malformed { location: String, message: String },

    #[error("LMDB error: {0}")]
    Lmdb(#[from] heed::Error),
}

/// Read access to the upstream entity store.
///
/// Both operations only return rows that carry the combined classification
/// embedding, since only those are eligible for the corpus.
pub trait EntitySource: Send + Sync {
    /// Every indexable record, ascending by id
    fn fetch_indexable(&self) -> Result<Vec<EntityRecord>, SourceError>;

    fn fetch_by_id(&self, id: u64) -> Result<Option<EntityRecord>, SourceError>;

    /// Human-readable name for logs
    fn describe(&self) -> String;
}

fn indexable_sorted(records: impl IntoIterator<Item = EntityRecord>) -> Vec<EntityRecord> {
    let mut records: Vec<EntityRecord> = records
        .into_iter()
        .filter(EntityRecord::is_indexable)
        .collect();
    records.sort_by_key(|record| record.id);
    records
}

/// Records held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: Vec<EntityRecord>,
}

impl InMemorySource {
    pub fn new(records: Vec<EntityRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: EntityRecord) {
        self.records.push(record);
    }
}

impl EntitySource for InMemorySource {
    fn fetch_indexable(&self) -> Result<Vec<EntityRecord>, SourceError> {
        Ok(indexable_sorted(self.records.iter().cloned()))
    }

    fn fetch_by_id(&self, id: u64) -> Result<Option<EntityRecord>, SourceError> {
        Ok(self
            .records
            .iter()
            .find(|record| record.id == id && record.is_indexable())
            .cloned())
    }

    fn describe(&self) -> String {
        format!("in-memory source ({} records)", self.records.len())
    }
}

/// One JSON record per line, as dumped by the ETL
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    path: PathBuf,
}

impl JsonLinesSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse every record in the file, indexable or not
    pub fn read_all(&self) -> Result<Vec<EntityRecord>, SourceError> {
        let file = File::open(&self.path).map_err(|e| {
            SourceError::Unreachable(format!("{}: {}", self.path.display(), e))
        })?;

        let mut records = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: EntityRecord =
                serde_json::from_str(&line).map_err(|e| SourceError::Malformed {
                    location: format!("{}:{}", self.path.display(), line_no + 1),
                    message: e.to_string(),
                })?;
            records.push(record);
        }
        Ok(records)
    }
}

impl EntitySource for JsonLinesSource {
    fn fetch_indexable(&self) -> Result<Vec<EntityRecord>, SourceError> {
        Ok(indexable_sorted(self.read_all()?))
    }

    fn fetch_by_id(&self, id: u64) -> Result<Option<EntityRecord>, SourceError> {
        Ok(self
            .read_all()?
            .into_iter()
            .find(|record| record.id == id && record.is_indexable()))
    }

    fn describe(&self) -> String {
        format!("JSON lines source {:?}", self.path)
    }
}
