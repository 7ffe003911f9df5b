//! # cinex Core
//!
//! Core library for the cinex similarity engine.
//!
//! This crate provides the fundamental data structures and algorithms:
//!
//! - [`EntityRecord`] - One corpus item with its per-field embeddings
//! - [`VectorComposer`] - Weighted concatenation of embeddings into a composite vector
//! - [`FlatIndex`] - Exact inner-product nearest neighbor index
//! - [`MetadataTable`] - Entity rows paired by position with index slots
//!
//! ## Example
//!
//! ```rust
//! use cinex_core::{ComposerConfig, EmbeddingField, EntityRecord, FlatIndex, InnerProductIndex, VectorComposer};
//!
//! let composer = VectorComposer::new(ComposerConfig {
//!     embedding_dim: 3,
//!     ..ComposerConfig::default()
//! }).unwrap();
//!
//! let record = EntityRecord::new(1, "Inception")
//!     .with_embedding(EmbeddingField::Keywords, vec![0.1, 0.7, 0.2]);
//! let vector = composer.compose(&record);
//!
//! let index = FlatIndex::from_vectors(composer.dim(), &[vector.clone()]).unwrap();
//! let hits = index.search(vector.as_slice(), 1);
//! assert_eq!(hits[0].slot, 0);
//! ```

pub mod error;
pub mod vector;
pub mod entity;
pub mod composer;
pub mod index;
pub mod metadata;

pub use error::{Error, Result};
pub use vector::Vector;
pub use entity::{EmbeddingField, Embedding, EntityRecord, DEFAULT_EMBEDDING_DIM};
pub use composer::{embedding_or_zero, ComposerConfig, FieldWeights, Segment, VectorComposer};
pub use index::{top_k, FlatIndex, InnerProductIndex, Neighbor};
pub use metadata::MetadataTable;
