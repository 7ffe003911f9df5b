//! # cinex
//!
//! Content-based similarity search over a movie corpus.
//!
//! Each entity carries several sentence embeddings (summary, genres, keywords,
//! atmosphere, narrative, themes) and a scaled audience score. cinex folds
//! them into one weighted, L2-normalized composite vector, indexes the corpus
//! for exact inner-product search, and answers four questions:
//!
//! - which entities are most similar to this one,
//! - what is stored for this id,
//! - which entities best match a free-text description,
//! - which id does this (possibly misspelled) title refer to.
//!
//! ## Quick Start
//!
//! ### As a CLI
//!
//! ```bash
//! cinex --source movies.jsonl build
//! cinex --source movies.jsonl resolve "Inceptoin"
//! cinex --source movies.jsonl similar 27205 -k 10
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use cinex::prelude::*;
//! use std::sync::Arc;
//!
//! let config = SearchConfig::default();
//! let source = JsonLinesSource::new("movies.jsonl");
//! let encoder = Arc::new(HashingEncoder::new(config.composer.embedding_dim));
//! let state = SearchState::open(config, &source, encoder).unwrap();
//!
//! let id = state.resolve_title("Inception").unwrap();
//! for hit in state.find_by_similarity(id, 10).unwrap() {
//!     println!("{} {:.3}", hit.title(), hit.score);
//! }
//! ```
//!
//! ## Crate Structure
//!
//! - `cinex-core` - Entity records, composer, flat index, metadata table
//! - `cinex-storage` - Entity sources (JSON lines, LMDB), artifact persistence, index store
//! - `cinex-search` - Retriever, title resolver, encoder seam, shared search state

pub use cinex_core::{
    ComposerConfig, EmbeddingField, EntityRecord, FieldWeights, FlatIndex, InnerProductIndex,
    MetadataTable, Vector, VectorComposer, Error, Result,
};

pub use cinex_storage::{
    ArtifactPaths, BuildError, CorpusSnapshot, EntitySource, IndexStore, InMemorySource,
    JsonLinesSource, LmdbSource, LoadFailure, SourceError,
};

pub use cinex_search::{
    HashingEncoder, QueryError, Retriever, ScoredEntity, SearchConfig, SearchState, TextEncoder,
    TitleResolver,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ComposerConfig, EmbeddingField, EntityRecord, VectorComposer,
        EntitySource, InMemorySource, JsonLinesSource, LmdbSource, IndexStore, CorpusSnapshot,
        HashingEncoder, TextEncoder, QueryError, Retriever, ScoredEntity, SearchConfig,
        SearchState, TitleResolver,
    };
}
