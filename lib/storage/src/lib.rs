pub mod source;
pub mod lmdb_source;
pub mod artifacts;
pub mod store;

pub use source::{EntitySource, InMemorySource, JsonLinesSource, SourceError};
pub use lmdb_source::LmdbSource;
pub use artifacts::{ArtifactHeader, ArtifactPaths, LoadFailure, PersistError};
pub use store::{BuildError, CorpusSnapshot, IndexStore};
