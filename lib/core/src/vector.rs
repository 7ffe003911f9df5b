use serde::{Deserialize, Serialize};

/// A vector of floating point numbers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    #[inline]
    #[must_use]
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Inner product with another vector. Equals cosine similarity when
    /// both sides are unit length.
    #[inline]
    pub fn dot(&self, other: &Vector) -> f32 {
        dot(&self.data, &other.data)
    }

    #[inline]
    pub fn norm(&self) -> f32 {
        norm(&self.data)
    }

    /// Normalize the vector to unit length.
    ///
    /// The norm is accumulated in f64 so repeated runs over wide composite
    /// vectors stay within 1e-6 of unit length. A zero vector is left as is.
    #[inline]
    pub fn normalize(&mut self) {
        let sum_sq: f64 = self.data.iter().map(|&x| f64::from(x) * f64::from(x)).sum();
        if sum_sq > 0.0 {
            let inv_norm = 1.0 / sum_sq.sqrt();
            for x in &mut self.data {
                *x = (f64::from(*x) * inv_norm) as f32;
            }
        }
    }

    /// Get normalized copy
    #[inline]
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut v = self.clone();
        v.normalize();
        v
    }
}

/// Dot product over two slices. Mismatched lengths score 0.0.
///
/// Two accumulators keep the loop pipelined without reaching for intrinsics.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut sum1 = 0.0f32;
    let mut sum2 = 0.0f32;
    let mut chunks_a = a.chunks_exact(2);
    let mut chunks_b = b.chunks_exact(2);

    for (ca, cb) in (&mut chunks_a).zip(&mut chunks_b) {
        sum1 += ca[0] * cb[0];
        sum2 += ca[1] * cb[1];
    }

    let tail: f32 = chunks_a
        .remainder()
        .iter()
        .zip(chunks_b.remainder())
        .map(|(x, y)| x * y)
        .sum();

    sum1 + sum2 + tail
}

#[inline]
pub fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_of_unit_vectors() {
        let a = Vector::new(vec![3.0, 4.0]).normalized();
        assert!((a.dot(&a) - 1.0).abs() < 1e-6);
        assert!(a.dot(&Vector::new(vec![-4.0, 3.0])).abs() < 1e-6);
    }

    #[test]
    fn test_dot_odd_length() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        assert!((dot(&a, &b) - 32.0).abs() < 1e-6);
        assert_eq!(dot(&a, &b[..2]), 0.0);
    }

    #[test]
    fn test_normalize_unit_and_zero() {
        let mut v = Vector::new(vec![3.0, 4.0]);
        v.normalize();
        assert!((v.norm() - 1.0).abs() < 1e-6);

        let mut z = Vector::new(vec![0.0; 4]);
        z.normalize();
        assert_eq!(z.as_slice(), &[0.0; 4]);
    }
}
