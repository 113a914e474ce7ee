//! Pure sizing calculator: turns a desired capacity and target false-positive rate
//! into a concrete bucket count, slot count and fingerprint width. Kept free of any
//! filter state so it can be unit-tested in isolation and reused by both
//! [`super::CuckooFilter::new`] and anyone who wants to pre-compute parameters
//! before calling [`super::CuckooFilter::with_parameters`] directly.

use crate::error::CuckooError;

use super::MAX_FINGERPRINT_BYTES;

/// The concrete parameters [`calculate`] derives from a capacity/false-positive-rate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sizing {
    pub bucket_count: usize,
    pub slots_per_bucket: usize,
    pub fingerprint_bytes: usize,
    pub max_kicks: usize,
}

/// Slots per bucket fixed at 4: the point on the size/load-factor curve the
/// original cuckoo filter paper settles on, and the value every semi-sorted or
/// byte-packed variant in the wild defaults to as well.
const SLOTS_PER_BUCKET: usize = 4;

/// Above this load factor (occupied slots / total slots) insertions start failing
/// often enough that doubling the bucket count up front is cheaper than churning
/// through kicks later.
const LOAD_FACTOR_CEILING: f64 = 0.96;

pub(crate) fn calculate(capacity: usize, target_fp_rate: f64) -> Result<Sizing, CuckooError> {
    if capacity == 0 {
        return Err(CuckooError::InvalidParameter {
            expected: "capacity must be non-zero",
            found: capacity.to_string(),
        });
    }
    if !(target_fp_rate.is_finite()) || target_fp_rate <= 0.0 || target_fp_rate >= 1.0 {
        return Err(CuckooError::InvalidParameter {
            expected: "target_fp_rate must lie in (0.0, 1.0)",
            found: target_fp_rate.to_string(),
        });
    }

    let slots = SLOTS_PER_BUCKET as f64;
    let fingerprint_bits = (2.0 * slots / target_fp_rate).log2();
    let fingerprint_bytes = ((fingerprint_bits / 8.0).ceil() as usize).max(1);
    if fingerprint_bytes > MAX_FINGERPRINT_BYTES {
        return Err(CuckooError::InvalidParameter {
            expected: "target_fp_rate must not require a fingerprint wider than 32 bytes",
            found: target_fp_rate.to_string(),
        });
    }

    let mut bucket_count = ((capacity as f64 / slots).ceil() as usize).max(1).next_power_of_two();
    if capacity as f64 / (bucket_count as f64 * slots) > LOAD_FACTOR_CEILING {
        bucket_count *= 2;
    }

    Ok(Sizing {
        bucket_count,
        slots_per_bucket: SLOTS_PER_BUCKET,
        fingerprint_bytes,
        max_kicks: bucket_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_capacity() {
        assert!(calculate(0, 0.01).is_err());
    }

    #[test]
    fn rejects_out_of_range_fp_rate() {
        assert!(calculate(1000, 0.0).is_err());
        assert!(calculate(1000, 1.0).is_err());
        assert!(calculate(1000, -0.1).is_err());
        assert!(calculate(1000, f64::NAN).is_err());
    }

    #[test]
    fn bucket_count_is_power_of_two() {
        for capacity in [1, 2, 3, 100, 1_000, 1_000_000] {
            let sizing = calculate(capacity, 0.01).unwrap();
            assert!(sizing.bucket_count.is_power_of_two(), "capacity {capacity}");
        }
    }

    #[test]
    fn tighter_fp_rate_needs_wider_fingerprint() {
        let loose = calculate(10_000, 0.1).unwrap();
        let tight = calculate(10_000, 0.0001).unwrap();
        assert!(tight.fingerprint_bytes >= loose.fingerprint_bytes);
    }

    #[test]
    fn capacity_fits_within_sized_table() {
        let sizing = calculate(10_000, 0.01).unwrap();
        assert!(sizing.bucket_count * sizing.slots_per_bucket >= 10_000);
    }
}
