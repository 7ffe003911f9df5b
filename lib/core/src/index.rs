use crate::vector::dot;
use crate::{Error, Result, Vector};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// A search hit: dense slot in the index plus its inner-product score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub slot: usize,
    pub score: f32,
}

/// Ranked top-k by inner product.
///
/// Results come back in descending score order; equal scores keep ascending
/// slot order. Implementations may be exact or approximate.
pub trait InnerProductIndex: Send + Sync {
    fn len(&self) -> usize;

    fn dim(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<Neighbor>;
}

/// Exact inner-product index over a contiguous row-major buffer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlatIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    /// Stack vectors into slots 0..N-1 in the given order.
    pub fn from_vectors(dim: usize, vectors: &[Vector]) -> Result<Self> {
        let mut index = Self {
            dim,
            data: Vec::with_capacity(dim * vectors.len()),
        };
        for vector in vectors {
            index.add(vector.as_slice())?;
        }
        Ok(index)
    }

    /// Wrap a raw row-major buffer, as read back from an artifact.
    pub fn from_raw(dim: usize, data: Vec<f32>) -> Result<Self> {
        if dim == 0 || data.len() % dim != 0 {
            return Err(Error::InvalidDimension {
                expected: dim,
                actual: data.len(),
            });
        }
        Ok(Self { dim, data })
    }

    /// Append one vector as the next slot
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        if vector.len() != self.dim {
            return Err(Error::InvalidDimension {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        self.data.extend_from_slice(vector);
        Ok(self.len() - 1)
    }

    #[inline]
    pub fn row(&self, slot: usize) -> Option<&[f32]> {
        let start = slot.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    #[inline]
    pub fn as_raw(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn into_raw(self) -> Vec<f32> {
        self.data
    }
}

impl InnerProductIndex for FlatIndex {
    #[inline]
    fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    #[inline]
    fn dim(&self) -> usize {
        self.dim
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        if query.len() != self.dim {
            return Vec::new();
        }

        let k = k.min(self.len());
        let scores = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(slot, row)| (slot, dot(query, row)));
        top_k(scores, k)
    }
}

/// Select the `k` best `(slot, score)` pairs.
///
/// Output is sorted by descending score; equal scores keep ascending slot order.
pub fn top_k(scores: impl IntoIterator<Item = (usize, f32)>, k: usize) -> Vec<Neighbor> {
    if k == 0 {
        return Vec::new();
    }

    // Bounded heap whose top is the current worst hit: lowest score, then highest slot.
    // Grows with the input; never holds more than k + 1 entries.
    let mut heap: BinaryHeap<(Reverse<OrderedFloat<f32>>, usize)> = BinaryHeap::new();

    for (slot, score) in scores {
        heap.push((Reverse(OrderedFloat(score)), slot));
        if heap.len() > k {
            heap.pop();
        }
    }

    let mut hits: Vec<Neighbor> = heap
        .into_iter()
        .map(|(Reverse(OrderedFloat(score)), slot)| Neighbor { slot, score })
        .collect();
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.slot.cmp(&b.slot))
    });
    hits
}
