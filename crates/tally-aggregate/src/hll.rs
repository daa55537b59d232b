#![forbid(unsafe_code)]

//! HyperLogLog sketch backing the approximate distinct-count aggregations.

use crate::error::{AggResult, AggregationError};

pub const MIN_LOG2M: u8 = 4;
pub const MAX_LOG2M: u8 = 16;
pub const DEFAULT_LOG2M: u8 = 8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HyperLogLog {
    p: u8,
    registers: Vec<u8>,
}

impl HyperLogLog {
    /// Callers validate `p` against `MIN_LOG2M..=MAX_LOG2M` at function construction.
    pub fn with_precision(p: u8) -> Self {
        debug_assert!((MIN_LOG2M..=MAX_LOG2M).contains(&p));
        Self {
            p,
            registers: vec![0u8; 1 << p],
        }
    }

    pub fn precision(&self) -> u8 {
        self.p
    }

    pub fn insert_hash(&mut self, hash: u64) {
        let idx = (hash >> (64 - self.p)) as usize;
        let w = hash << self.p;
        let rank = (w.leading_zeros() + 1).min(64 - self.p as u32 + 1) as u8;
        self.registers[idx] = self.registers[idx].max(rank);
    }

    pub fn insert_f64(&mut self, value: f64) {
        self.insert_hash(hash_f64(value));
    }

    pub fn insert_str(&mut self, value: &str) {
        self.insert_hash(hash_str(value));
    }

    /// Register-wise maximum; both sketches must share a precision.
    pub fn merge(&mut self, other: &HyperLogLog) -> AggResult<()> {
        if self.p != other.p {
            return Err(AggregationError::SketchPrecisionMismatch {
                left: self.p,
                right: other.p,
            });
        }
        for (mine, theirs) in self.registers.iter_mut().zip(&other.registers) {
            *mine = (*mine).max(*theirs);
        }
        Ok(())
    }

    pub fn estimate(&self) -> u64 {
        let m = self.registers.len() as f64;
        let alpha = match self.registers.len() {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / m),
        };

        let mut inv_sum = 0.0;
        let mut zeros = 0u32;
        for &r in &self.registers {
            inv_sum += 2f64.powi(-(r as i32));
            if r == 0 {
                zeros += 1;
            }
        }

        let raw = alpha * m * m / inv_sum;

        // Small range correction.
        if raw <= 2.5 * m && zeros > 0 {
            let z = zeros as f64;
            return (m * (m / z).ln()).round().max(0.0) as u64;
        }

        raw.round().max(0.0) as u64
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// `-0.0` and `0.0` hash alike so they count as one value.
pub(crate) fn hash_f64(value: f64) -> u64 {
    let value = if value == 0.0 { 0.0 } else { value };
    splitmix64(value.to_bits())
}

/// FNV-1a, finished with splitmix64. Stable across runs and shards.
pub(crate) fn hash_str(value: &str) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in value.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    splitmix64(h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sketch_estimates_zero() {
        assert_eq!(HyperLogLog::with_precision(DEFAULT_LOG2M).estimate(), 0);
    }

    #[test]
    fn estimate_is_close_for_small_cardinalities() {
        let mut hll = HyperLogLog::with_precision(12);
        for i in 0..1000 {
            hll.insert_f64(i as f64);
        }
        let estimate = hll.estimate() as f64;
        assert!((estimate - 1000.0).abs() / 1000.0 < 0.1, "estimate={estimate}");
    }

    #[test]
    fn merge_equals_union() {
        let mut a = HyperLogLog::with_precision(10);
        let mut b = HyperLogLog::with_precision(10);
        let mut union = HyperLogLog::with_precision(10);
        for i in 0..300 {
            a.insert_f64(i as f64);
            union.insert_f64(i as f64);
        }
        for i in 200..600 {
            b.insert_f64(i as f64);
            union.insert_f64(i as f64);
        }
        a.merge(&b).unwrap();
        assert_eq!(a, union);
    }

    #[test]
    fn merge_rejects_mismatched_precision() {
        let mut a = HyperLogLog::with_precision(8);
        let b = HyperLogLog::with_precision(9);
        assert!(matches!(
            a.merge(&b),
            Err(AggregationError::SketchPrecisionMismatch { left: 8, right: 9 })
        ));
    }

    #[test]
    fn signed_zero_hashes_alike() {
        assert_eq!(hash_f64(-0.0), hash_f64(0.0));
        assert_ne!(hash_str("a"), hash_str("b"));
    }
}
