// Text encoders: the external model that maps a free-text description into
// the same space as the stored summary embeddings.

use crate::error::{EncoderError, QueryError};
use ahash::RandomState;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Maps text to a fixed-width embedding
pub trait TextEncoder: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EncoderError>;
}

// Fixed seeds keep the hashing stable from one run to the next.
const SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// Feature-hashing encoder over words and character trigrams.
///
/// Deterministic and model-free, for offline corpora whose summary
/// embeddings were produced by this same encoder, and for tests.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dim: usize,
    hasher: RandomState,
}

impl HashingEncoder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            hasher: RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]),
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    fn bucket(&self, feature: &str) -> usize {
        (self.hasher.hash_one(feature) % self.dim as u64) as usize
    }
}

fn trigrams(text: &str) -> Vec<String> {
    let padded: Vec<char> = format!("  {}  ", text).chars().collect();
    padded.windows(3).map(|w| w.iter().collect()).collect()
}

impl TextEncoder for HashingEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EncoderError> {
        if self.dim == 0 {
            return Err(EncoderError::Failed("encoder dimension is zero".to_string()));
        }

        let mut vector = vec![0.0f32; self.dim];
        let normalized = text.to_lowercase();

        for trigram in trigrams(&normalized) {
            vector[self.bucket(&trigram)] += 1.0;
        }
        // Words contribute more than their trigrams
        for word in normalized.split_whitespace() {
            vector[self.bucket(word)] += 2.0;
        }

        let magnitude = vector.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
        if magnitude > 0.0 {
            for v in &mut vector {
                *v = (*v as f64 / magnitude) as f32;
            }
        }
        Ok(vector)
    }
}

/// Run `encoder` on its own thread and wait at most `budget` for the answer.
///
/// On expiry the worker thread is left to finish on its own; its result is dropped.
pub fn encode_with_timeout(
    encoder: Arc<dyn TextEncoder>,
    text: &str,
    budget: Duration,
) -> Result<Vec<f32>, QueryError> {
    let (tx, rx) = mpsc::channel();
    let text = text.to_string();

    thread::Builder::new()
        .name("cinex-encode".to_string())
        .spawn(move || {
            // The receiver is gone if the caller already timed out
            let _ = tx.send(encoder.encode(&text));
        })
        .map_err(|e| EncoderError::Failed(format!("could not start encoder thread: {}", e)))?;

    match rx.recv_timeout(budget) {
        Ok(result) => {
            debug!("Encoder answered within {:?}", budget);
            result.map_err(QueryError::from)
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!("Encoder exceeded its {:?} budget", budget);
            Err(QueryError::Timeout(budget))
        }
        Err(RecvTimeoutError::Disconnected) => Err(EncoderError::Disconnected.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_encoder_is_deterministic_and_unit() {
        let encoder = HashingEncoder::new(64);
        let a = encoder.encode("A thief who steals corporate secrets").unwrap();
        let b = encoder.encode("A thief who steals corporate secrets").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_encoder_related_text_scores_higher() {
        let encoder = HashingEncoder::new(256);
        let query = encoder.encode("dream heist thriller").unwrap();
        let near = encoder.encode("a heist inside a dream").unwrap();
        let far = encoder.encode("romantic comedy in paris").unwrap();

        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&query, &near) > dot(&query, &far));
    }

    #[test]
    fn test_zero_dimension_fails() {
        assert!(HashingEncoder::new(0).encode("text").is_err());
    }

    struct SlowEncoder(Duration);

    impl TextEncoder for SlowEncoder {
        fn encode(&self, _text: &str) -> Result<Vec<f32>, EncoderError> {
            thread::sleep(self.0);
            Ok(vec![1.0])
        }
    }

    struct FailingEncoder;

    impl TextEncoder for FailingEncoder {
        fn encode(&self, _text: &str) -> Result<Vec<f32>, EncoderError> {
            Err(EncoderError::Failed("model not loaded".to_string()))
        }
    }

    #[test]
    fn test_timeout_expires() {
        let slow: Arc<dyn TextEncoder> = Arc::new(SlowEncoder(Duration::from_millis(500)));
        let result = encode_with_timeout(slow, "anything", Duration::from_millis(20));
        assert!(matches!(result, Err(QueryError::Timeout(_))));
    }

    #[test]
    fn test_encoder_error_is_propagated() {
        let failing: Arc<dyn TextEncoder> = Arc::new(FailingEncoder);
        let result = encode_with_timeout(failing, "anything", Duration::from_secs(1));
        assert!(matches!(result, Err(QueryError::Encoder(EncoderError::Failed(_)))));
    }

    #[test]
    fn test_fast_encoder_answers() {
        let encoder: Arc<dyn TextEncoder> = Arc::new(HashingEncoder::new(8));
        let vector = encode_with_timeout(encoder, "space", Duration::from_secs(5)).unwrap();
        assert_eq!(vector.len(), 8);
    }
}
