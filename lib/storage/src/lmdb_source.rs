// LMDB-backed entity store, keyed by big-endian id so iteration is ascending
use crate::source::{EntitySource, SourceError};
use cinex_core::EntityRecord;
use heed::byteorder::BE;
use heed::types::{Bytes, U64};
use heed::{Database, Env, EnvOpenOptions};
use std::path::{Path, PathBuf};

const DB_ENTITIES: &str = "entities";
const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024 * 1024; // 10GB

pub struct LmdbSource {
    env: Env,
    entities_db: Database<U64<BE>, Bytes>,
    path: PathBuf,
}

impl LmdbSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        Self::with_map_size(path, DEFAULT_MAP_SIZE)
    }

    pub fn with_map_size<P: AsRef<Path>>(path: P, map_size: usize) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(4)
                .open(&path)?
        };

        let mut wtxn = env.write_txn()?;
        let entities_db = env.create_database(&mut wtxn, Some(DB_ENTITIES))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            entities_db,
            path,
        })
    }

    fn encode(record: &EntityRecord) -> Result<Vec<u8>, SourceError> {
        bincode::serialize(record).map_err(|e| SourceError::Malformed {
            location: format!("entity {}", record.id),
            message: e.to_string(),
        })
    }

    fn decode(id: u64, data: &[u8]) -> Result<EntityRecord, SourceError> {
        bincode::deserialize(data).map_err(|e| SourceError::Malformed {
            location: format!("entity {}", id),
            message: e.to_string(),
        })
    }

    /// Insert or replace one record
    pub fn put(&self, record: &EntityRecord) -> Result<(), SourceError> {
        let data = Self::encode(record)?;
        let mut wtxn = self.env.write_txn()?;
        self.entities_db.put(&mut wtxn, &record.id, &data)?;
        wtxn.commit()?;
        Ok(())
    }

    /// Insert or replace many records in one transaction
    pub fn put_batch(&self, records: &[EntityRecord]) -> Result<usize, SourceError> {
        let mut wtxn = self.env.write_txn()?;
        for record in records {
            let data = Self::encode(record)?;
            self.entities_db.put(&mut wtxn, &record.id, &data)?;
        }
        wtxn.commit()?;
        Ok(records.len())
    }

    pub fn count(&self) -> Result<u64, SourceError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.entities_db.len(&rtxn)?)
    }
}

impl EntitySource for LmdbSource {
    fn fetch_indexable(&self) -> Result<Vec<EntityRecord>, SourceError> {
        let rtxn = self.env.read_txn()?;
        let mut records = Vec::new();
        for result in self.entities_db.iter(&rtxn)? {
            let (id, data) = result?;
            let record = Self::decode(id, data)?;
            if record.is_indexable() {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn fetch_by_id(&self, id: u64) -> Result<Option<EntityRecord>, SourceError> {
        let rtxn = self.env.read_txn()?;
        match self.entities_db.get(&rtxn, &id)? {
            Some(data) => {
                let record = Self::decode(id, data)?;
                Ok(record.is_indexable().then_some(record))
            }
            None => Ok(None),
        }
    }

    fn describe(&self) -> String {
        format!("LMDB source {:?}", self.path)
    }
}
