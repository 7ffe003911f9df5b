use crate::entity::EntityRecord;
use crate::{Error, Result};
use ahash::AHashMap;
use std::sync::Arc;

/// Ordered entity rows, paired 1:1 by position with index slots.
///
/// Row `i` always describes slot `i`. Identifier lookup goes through an
/// explicit id -> position map rather than scanning.
#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    rows: Vec<Arc<EntityRecord>>,
    positions: AHashMap<u64, usize>,
}

impl MetadataTable {
    /// Build a table from rows already in slot order. Duplicate ids are an error.
    pub fn new(records: Vec<EntityRecord>) -> Result<Self> {
        let mut positions = AHashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if positions.insert(record.id, position).is_some() {
                return Err(Error::DuplicateEntity(record.id));
            }
        }

        Ok(Self {
            rows: records.into_iter().map(Arc::new).collect(),
            positions,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn position_of(&self, id: u64) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    #[inline]
    pub fn get(&self, position: usize) -> Option<&Arc<EntityRecord>> {
        self.rows.get(position)
    }

    #[inline]
    pub fn get_by_id(&self, id: u64) -> Option<&Arc<EntityRecord>> {
        self.position_of(id).and_then(|position| self.rows.get(position))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityRecord>> {
        self.rows.iter()
    }

    /// Owned copies of every row, in slot order
    pub fn to_records(&self) -> Vec<EntityRecord> {
        self.rows.iter().map(|row| EntityRecord::clone(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_follow_row_order() {
        let table = MetadataTable::new(vec![
            EntityRecord::new(30, "C"),
            EntityRecord::new(10, "A"),
            EntityRecord::new(20, "B"),
        ])
        .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.position_of(10), Some(1));
        assert_eq!(table.get_by_id(20).map(|r| r.title.as_str()), Some("B"));
        assert!(table.get_by_id(99).is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = MetadataTable::new(vec![
            EntityRecord::new(1, "First"),
            EntityRecord::new(1, "Second"),
        ]);
        assert!(matches!(result, Err(Error::DuplicateEntity(1))));
    }
}
