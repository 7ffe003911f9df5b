//! # cinex Search
//!
//! Query layer over a built corpus snapshot:
//!
//! - [`Retriever`] - Similar entities by composite vector, lookup by id,
//!   ranking by free-text description
//! - [`TitleResolver`] - Fuzzy title to id resolution with a score cutoff
//! - [`SearchState`] - Shared, swappable snapshot with background rebuilds
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use cinex_core::{ComposerConfig, EmbeddingField, EntityRecord, VectorComposer};
//! use cinex_search::{Retriever, TitleResolver};
//! use cinex_storage::CorpusSnapshot;
//!
//! let composer = Arc::new(VectorComposer::new(ComposerConfig {
//!     embedding_dim: 2,
//!     ..ComposerConfig::default()
//! }).unwrap());
//!
//! let movie = |id: u64, title: &str, keywords: Vec<f32>| {
//!     EntityRecord::new(id, title)
//!         .with_embedding(EmbeddingField::Keywords, keywords)
//!         .with_embedding(EmbeddingField::CombinedClassification, vec![1.0, 0.0])
//! };
//! let snapshot = CorpusSnapshot::build(
//!     vec![movie(1, "Heat", vec![1.0, 0.0]), movie(2, "Ronin", vec![0.9, 0.1])],
//!     composer,
//! ).unwrap();
//!
//! let id = TitleResolver::default().resolve(snapshot.metadata(), "heat").unwrap();
//! let similar = Retriever::new(&snapshot).find_by_similarity(id, 5).unwrap();
//! assert_eq!(similar[0].title(), "Ronin");
//! ```

pub mod error;
pub mod encoder;
pub mod fuzzy;
pub mod retriever;
pub mod resolver;
pub mod config;
pub mod background;
pub mod state;

pub use error::{EncoderError, QueryError};
pub use encoder::{encode_with_timeout, HashingEncoder, TextEncoder};
pub use retriever::{Retriever, ScoredEntity};
pub use resolver::{TitleMatch, TitleResolver, DEFAULT_CUTOFF};
pub use config::SearchConfig;
pub use background::{BackgroundJob, BackgroundWorker};
pub use state::{RebuildError, RebuildReport, RebuildTicket, SearchState, StartupError};
