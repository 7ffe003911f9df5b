//! Fuzzy string scoring on a 0-100 scale.
//!
//! [`weighted_ratio`] picks the best of several edit-distance views of two
//! strings: the plain ratio, word-order and word-set insensitive ratios, and
//! for strings of very different length, the best-aligned window of the longer one.

use std::collections::BTreeSet;
use strsim::normalized_levenshtein;

const TOKEN_SCALE: f64 = 0.95;
const PARTIAL_SCALE: f64 = 0.9;
const FAR_PARTIAL_SCALE: f64 = 0.6;
const PARTIAL_THRESHOLD: f64 = 1.5;
const FAR_PARTIAL_THRESHOLD: f64 = 8.0;

/// Lowercase, map non-alphanumerics to spaces, collapse whitespace
pub fn preprocess(text: &str) -> String {
    let mapped: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn token_sort(text: &str) -> String {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Normalized edit similarity scaled to 0-100
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    normalized_levenshtein(a, b) * 100.0
}

/// Best [`ratio`] of `shorter` against every same-length window of `longer`
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let short_len = shorter.chars().count();
    if short_len == 0 {
        return 0.0;
    }

    let long_chars: Vec<char> = longer.chars().collect();
    let mut best = 0.0f64;
    for window in long_chars.windows(short_len) {
        let candidate: String = window.iter().collect();
        let score = ratio(shorter, &candidate);
        if score > best {
            best = score;
            if best >= 100.0 {
                break;
            }
        }
    }
    best
}

pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&token_sort(a), &token_sort(b))
}

/// Shared words, then the words only in `a`, then the words only in `b`; each sorted and joined.
fn token_split(a: &str, b: &str) -> (String, String, String) {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    let join = |tokens: Vec<&str>| tokens.join(" ");
    (
        join(tokens_a.intersection(&tokens_b).copied().collect()),
        join(tokens_a.difference(&tokens_b).copied().collect()),
        join(tokens_b.difference(&tokens_a).copied().collect()),
    )
}

/// Ratio that ignores duplicated words and words present on one side only
/// when the other side's words are all shared.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let (shared, only_a, only_b) = token_split(a, b);
    if !shared.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100.0;
    }

    let with_shared = |rest: &str| {
        if shared.is_empty() {
            rest.to_string()
        } else {
            format!("{} {}", shared, rest)
        }
    };
    let combined_a = with_shared(&only_a);
    let combined_b = with_shared(&only_b);

    ratio(&shared, &combined_a)
        .max(ratio(&shared, &combined_b))
        .max(ratio(&combined_a, &combined_b))
}

/// Any shared word scores 100; otherwise the partial ratio of the unshared words.
pub fn partial_token_set_ratio(a: &str, b: &str) -> f64 {
    let (shared, only_a, only_b) = token_split(a, b);
    if !shared.is_empty() {
        return 100.0;
    }
    partial_ratio(&only_a, &only_b)
}

/// Combined score of two raw strings, rounded to 0-100.
pub fn weighted_ratio(a: &str, b: &str) -> u8 {
    let a = preprocess(a);
    let b = preprocess(b);
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let base = ratio(&a, &b);
    let (len_a, len_b) = (a.chars().count() as f64, b.chars().count() as f64);
    let len_ratio = len_a.max(len_b) / len_a.min(len_b);

    let best = if len_ratio < PARTIAL_THRESHOLD {
        let tokens = token_sort_ratio(&a, &b).max(token_set_ratio(&a, &b));
        base.max(tokens * TOKEN_SCALE)
    } else {
        let scale = if len_ratio < FAR_PARTIAL_THRESHOLD {
            PARTIAL_SCALE
        } else {
            FAR_PARTIAL_SCALE
        };
        let partial = partial_ratio(&a, &b) * scale;
        let partial_tokens = partial_ratio(&token_sort(&a), &token_sort(&b))
            .max(partial_token_set_ratio(&a, &b))
            * TOKEN_SCALE
            * scale;
        base.max(partial).max(partial_tokens)
    };

    best.round().clamp(0.0, 100.0) as u8
}
