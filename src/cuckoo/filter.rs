use std::fmt;
use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::CuckooError;
use crate::hash::{HashPrimitive, XxHashPrimitive};

use super::{bucket, sizing, MAX_FINGERPRINT_BYTES};

/// Domain-separation tags distinguishing the filter's three digest derivations
/// (fingerprint, primary index, alternate index) from one another. `HashPrimitive`
/// itself only ever hashes one input slice per call (see [`crate::hash::HashPrimitive`]),
/// so a tag is not mixed directly into the caller's payload — instead each derivation
/// first hashes the payload alone into a small seed, then hashes `tag ++ seed` to
/// get its final, independent output. Values are arbitrary; only their distinctness
/// matters.
const TAG_FINGERPRINT: u8 = 0xF9;
const TAG_PRIMARY_INDEX: u8 = 0x51;
const TAG_ALTERNATE_INDEX: u8 = 0xA7;

/// Width of the first-stage seed in [`CuckooFilter::domain_digest`]. Small and fixed
/// so the second-stage `tag ++ seed` buffer is always stack-allocated.
const DOMAIN_SEED_BYTES: usize = 8;

/// A fingerprint that collides with the empty-slot sentinel is nudged to this
/// value instead, so a stored fingerprint is never mistaken for an empty slot.
const FINGERPRINT_SENTINEL_REPLACEMENT: u8 = 0xFF;

/// An approximate-membership set with bounded false positives, no false
/// negatives, and support for deletion.
///
/// Items are stored as short fingerprints in one of two candidate buckets,
/// derived from the item's hash and indexed by either that hash directly or by
/// `bucket ^ hash(fingerprint)` — which is why the alternate bucket of the
/// alternate bucket is always the original: `(i ^ h) ^ h == i`.
///
/// Two filters compare equal (`==`) iff their structural parameters and packed
/// bucket bytes match exactly; the hash primitive and the kick RNG are not part
/// of equality, since neither affects what the filter represents.
pub struct CuckooFilter {
    bucket_count: usize,
    slots_per_bucket: usize,
    fingerprint_bytes: usize,
    max_kicks: usize,
    bucket_bytes: Vec<u8>,
    hasher: Box<dyn HashPrimitive>,
    rng: StdRng,
}

impl CuckooFilter {
    /// Builds a filter sized to hold `capacity` items at roughly `target_fp_rate`
    /// false-positive probability, using the default hash primitive and an
    /// OS-seeded RNG.
    pub fn new(capacity: usize, target_fp_rate: f64) -> Result<Self, CuckooError> {
        let sizing = sizing::calculate(capacity, target_fp_rate)?;
        Self::with_parameters(sizing.bucket_count, sizing.slots_per_bucket, sizing.fingerprint_bytes, sizing.max_kicks)
    }

    /// Like [`Self::new`], but `seed` fixes the kick RNG for reproducible runs
    /// (tests, simulations, or any place bit-for-bit replay matters).
    pub fn new_seeded(capacity: usize, target_fp_rate: f64, seed: u64) -> Result<Self, CuckooError> {
        let sizing = sizing::calculate(capacity, target_fp_rate)?;
        Self::with_parameters_seeded(sizing.bucket_count, sizing.slots_per_bucket, sizing.fingerprint_bytes, sizing.max_kicks, seed)
    }

    /// Builds a filter from explicit structural parameters rather than a
    /// capacity/false-positive-rate pair. `bucket_count` must be a non-zero
    /// power of two; `slots_per_bucket`, `fingerprint_bytes` and `max_kicks` must
    /// be non-zero, and `fingerprint_bytes` must not exceed 32.
    pub fn with_parameters(bucket_count: usize, slots_per_bucket: usize, fingerprint_bytes: usize, max_kicks: usize) -> Result<Self, CuckooError> {
        Self::build(bucket_count, slots_per_bucket, fingerprint_bytes, max_kicks, None, Box::new(XxHashPrimitive::default()))
    }

    /// Like [`Self::with_parameters`], but `seed` fixes the kick RNG.
    pub fn with_parameters_seeded(
        bucket_count: usize,
        slots_per_bucket: usize,
        fingerprint_bytes: usize,
        max_kicks: usize,
        seed: u64,
    ) -> Result<Self, CuckooError> {
        Self::build(bucket_count, slots_per_bucket, fingerprint_bytes, max_kicks, Some(seed), Box::new(XxHashPrimitive::default()))
    }

    /// Builds a filter with a caller-supplied [`HashPrimitive`] in place of the
    /// default xxHash-based one — for interoperating with an existing hash
    /// scheme, or for a deterministic test double.
    pub fn with_hash_primitive(
        bucket_count: usize,
        slots_per_bucket: usize,
        fingerprint_bytes: usize,
        max_kicks: usize,
        seed: u64,
        hasher: Box<dyn HashPrimitive>,
    ) -> Result<Self, CuckooError> {
        Self::build(bucket_count, slots_per_bucket, fingerprint_bytes, max_kicks, Some(seed), hasher)
    }

    /// Reconstructs a filter from its packed bucket bytes, as previously
    /// obtained from [`Self::bucket_bytes`]. `bucket_count` is derived from
    /// `bucket_bytes.len() / (slots_per_bucket * fingerprint_bytes)` and must
    /// come out to a non-zero power of two, with no remainder.
    pub fn from_bytes(bucket_bytes: Vec<u8>, slots_per_bucket: usize, fingerprint_bytes: usize, max_kicks: usize) -> Result<Self, CuckooError> {
        if slots_per_bucket == 0 || fingerprint_bytes == 0 {
            return Err(CuckooError::InvalidParameter {
                expected: "slots_per_bucket and fingerprint_bytes must be non-zero",
                found: format!("{slots_per_bucket}, {fingerprint_bytes}"),
            });
        }
        let bucket_byte_len = slots_per_bucket * fingerprint_bytes;
        if bucket_byte_len == 0 || bucket_bytes.len() % bucket_byte_len != 0 {
            return Err(CuckooError::InvalidParameter {
                expected: "bucket_bytes.len() must be a multiple of slots_per_bucket * fingerprint_bytes",
                found: bucket_bytes.len().to_string(),
            });
        }
        let bucket_count = bucket_bytes.len() / bucket_byte_len;
        let mut filter = Self::build(bucket_count, slots_per_bucket, fingerprint_bytes, max_kicks, None, Box::new(XxHashPrimitive::default()))?;
        filter.bucket_bytes = bucket_bytes;
        Ok(filter)
    }

    fn build(
        bucket_count: usize,
        slots_per_bucket: usize,
        fingerprint_bytes: usize,
        max_kicks: usize,
        seed: Option<u64>,
        hasher: Box<dyn HashPrimitive>,
    ) -> Result<Self, CuckooError> {
        if bucket_count == 0 || !bucket_count.is_power_of_two() {
            return Err(CuckooError::InvalidParameter {
                expected: "bucket_count must be a non-zero power of two",
                found: bucket_count.to_string(),
            });
        }
        if slots_per_bucket == 0 {
            return Err(CuckooError::InvalidParameter {
                expected: "slots_per_bucket must be non-zero",
                found: slots_per_bucket.to_string(),
            });
        }
        if fingerprint_bytes == 0 || fingerprint_bytes > MAX_FINGERPRINT_BYTES {
            return Err(CuckooError::InvalidParameter {
                expected: "fingerprint_bytes must be in 1..=32",
                found: fingerprint_bytes.to_string(),
            });
        }
        if max_kicks == 0 {
            return Err(CuckooError::InvalidParameter {
                expected: "max_kicks must be non-zero",
                found: max_kicks.to_string(),
            });
        }

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            bucket_count,
            slots_per_bucket,
            fingerprint_bytes,
            max_kicks,
            bucket_bytes: vec![0u8; bucket_count * slots_per_bucket * fingerprint_bytes],
            hasher,
            rng,
        })
    }

    /// Number of buckets in the table.
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Slots per bucket.
    pub fn slots_per_bucket(&self) -> usize {
        self.slots_per_bucket
    }

    /// Fingerprint width in bytes.
    pub fn fingerprint_bytes(&self) -> usize {
        self.fingerprint_bytes
    }

    /// Kick budget for a single `insert`.
    pub fn max_kicks(&self) -> usize {
        self.max_kicks
    }

    /// The packed bucket table, for persistence via [`Self::from_bytes`].
    pub fn bucket_bytes(&self) -> &[u8] {
        &self.bucket_bytes
    }

    /// Total slot count (`bucket_count * slots_per_bucket`), an upper bound on
    /// how many items can be held regardless of fingerprint collisions.
    pub fn capacity(&self) -> usize {
        self.bucket_count * self.slots_per_bucket
    }

    /// Tests whether `v` is (probably) a member. Never false-negative for an
    /// item previously inserted and not since removed; may rarely false-positive.
    pub fn contains(&self, v: &[u8]) -> bool {
        let fp = self.fingerprint_of(v);
        let fp = &fp[..self.fingerprint_bytes];
        let i1 = self.primary_index(v);
        let i2 = self.alternate_index(i1, fp);
        self.bucket_contains(i1, fp) || self.bucket_contains(i2, fp)
    }

    /// Attempts to insert `v`, returning `false` instead of an error if the kick
    /// budget is exhausted before a free slot is found. Prefer [`Self::insert`]
    /// unless you specifically want to ignore the saturated-filter case.
    pub fn try_insert(&mut self, v: &[u8]) -> bool {
        let mut fp = self.fingerprint_of(v);
        let flen = self.fingerprint_bytes;
        let i1 = self.primary_index(v);
        let i2 = self.alternate_index(i1, &fp[..flen]);

        if self.insert_into_bucket_at(i1, &fp[..flen]) {
            return true;
        }
        if self.insert_into_bucket_at(i2, &fp[..flen]) {
            return true;
        }

        let mut bucket_index = if self.rng.gen_bool(0.5) { i1 } else { i2 };

        for _ in 0..self.max_kicks {
            let slot = self.rng.gen_range(0..self.slots_per_bucket);
            let start = bucket_index * self.slots_per_bucket * flen + slot * flen;
            for i in 0..flen {
                std::mem::swap(&mut fp[i], &mut self.bucket_bytes[start + i]);
            }
            bucket_index = self.alternate_index(bucket_index, &fp[..flen]);
            if self.insert_into_bucket_at(bucket_index, &fp[..flen]) {
                return true;
            }
        }
        false
    }

    /// Inserts `v`, returning [`CuckooError::Full`] if the kick budget is
    /// exhausted. On failure the filter is left in a valid state; see
    /// [`CuckooError::Full`] for what that means for already-stored items.
    pub fn insert(&mut self, v: &[u8]) -> Result<(), CuckooError> {
        if self.try_insert(v) {
            Ok(())
        } else {
            Err(CuckooError::Full)
        }
    }

    /// Removes one occurrence of `v` if present in either candidate bucket.
    /// Returns whether an occurrence was found and removed. Removing an item
    /// that was never inserted (or already removed) is a safe no-op that
    /// returns `false`, though it may — exactly as for `contains` — spuriously
    /// report `true` and clear an unrelated fingerprint that happens to collide.
    pub fn remove(&mut self, v: &[u8]) -> bool {
        let fp = self.fingerprint_of(v);
        let flen = self.fingerprint_bytes;
        let i1 = self.primary_index(v);
        let i2 = self.alternate_index(i1, &fp[..flen]);
        self.remove_from_bucket(i1, &fp[..flen]) || self.remove_from_bucket(i2, &fp[..flen])
    }

    /// A snapshot of which fingerprints occupy which buckets, for debugging and
    /// tests. Not part of the filter's public equality or serialized form.
    pub fn debug_occupied_slots(&self) -> Vec<Vec<Vec<u8>>> {
        (0..self.bucket_count)
            .map(|b| {
                self.bucket_slice(b)
                    .chunks_exact(self.fingerprint_bytes)
                    .filter(|slot| !bucket::is_zero_fingerprint(slot))
                    .map(|slot| slot.to_vec())
                    .collect()
            })
            .collect()
    }

    fn bucket_range(&self, bucket_index: usize) -> std::ops::Range<usize> {
        let bucket_len = self.slots_per_bucket * self.fingerprint_bytes;
        let start = bucket_index * bucket_len;
        start..start + bucket_len
    }

    fn bucket_slice(&self, bucket_index: usize) -> &[u8] {
        let range = self.bucket_range(bucket_index);
        &self.bucket_bytes[range]
    }

    fn bucket_contains(&self, bucket_index: usize, fp: &[u8]) -> bool {
        bucket::find_fingerprint_in_bucket(self.bucket_slice(bucket_index), fp, self.fingerprint_bytes).is_some()
    }

    fn insert_into_bucket_at(&mut self, bucket_index: usize, fp: &[u8]) -> bool {
        let range = self.bucket_range(bucket_index);
        bucket::insert_into_bucket(&mut self.bucket_bytes[range], fp, self.fingerprint_bytes)
    }

    fn remove_from_bucket(&mut self, bucket_index: usize, fp: &[u8]) -> bool {
        let range = self.bucket_range(bucket_index);
        let slot = bucket::find_fingerprint_in_bucket(&self.bucket_bytes[range.clone()], fp, self.fingerprint_bytes);
        match slot {
            Some(slot) => {
                bucket::clear_slot(&mut self.bucket_bytes[range], slot, self.fingerprint_bytes);
                true
            }
            None => false,
        }
    }

    /// Derives a domain-separated digest of `input` into `out`: first hashes `input`
    /// alone into a small seed, then hashes `tag ++ seed` into `out`. Two different
    /// tags applied to the same `input` yield independent outputs even though
    /// `HashPrimitive::hash_into` only ever sees one slice at a time — see the
    /// module-level tag constants for why this is needed instead of concatenating
    /// the tag directly onto `input` (which may be arbitrarily long).
    fn domain_digest(&self, tag: u8, input: &[u8], out: &mut [u8]) {
        let mut seed = [0u8; DOMAIN_SEED_BYTES];
        self.hasher.hash_into(input, &mut seed);
        let mut tagged = [0u8; 1 + DOMAIN_SEED_BYTES];
        tagged[0] = tag;
        tagged[1..].copy_from_slice(&seed);
        self.hasher.hash_into(&tagged, out);
    }

    /// Derives the fingerprint for `v`, replacing an all-zero digest (which
    /// would otherwise be indistinguishable from an empty slot) with a fixed
    /// non-zero sentinel.
    fn fingerprint_of(&self, v: &[u8]) -> [u8; MAX_FINGERPRINT_BYTES] {
        let mut buf = [0u8; MAX_FINGERPRINT_BYTES];
        self.domain_digest(TAG_FINGERPRINT, v, &mut buf[..self.fingerprint_bytes]);
        if bucket::is_zero_fingerprint(&buf[..self.fingerprint_bytes]) {
            buf[..self.fingerprint_bytes].fill(FINGERPRINT_SENTINEL_REPLACEMENT);
        }
        buf
    }

    fn primary_index(&self, v: &[u8]) -> usize {
        let mut buf = [0u8; 4];
        self.domain_digest(TAG_PRIMARY_INDEX, v, &mut buf);
        (u32::from_be_bytes(buf) as usize) & (self.bucket_count - 1)
    }

    /// `i2 = i1 ^ hash(fp)`, and the same formula run again on `i2` and `fp`
    /// recovers `i1`, since XOR is its own inverse — this is what lets a kick
    /// chain walk an evicted fingerprint back toward either of its two buckets
    /// without tracking which bucket it came from.
    fn alternate_index(&self, index: usize, fp: &[u8]) -> usize {
        let mut buf = [0u8; 4];
        self.domain_digest(TAG_ALTERNATE_INDEX, fp, &mut buf);
        index ^ ((u32::from_be_bytes(buf) as usize) & (self.bucket_count - 1))
    }
}

impl PartialEq for CuckooFilter {
    fn eq(&self, other: &Self) -> bool {
        self.bucket_count == other.bucket_count
            && self.slots_per_bucket == other.slots_per_bucket
            && self.fingerprint_bytes == other.fingerprint_bytes
            && self.max_kicks == other.max_kicks
            && self.bucket_bytes == other.bucket_bytes
    }
}

impl Eq for CuckooFilter {}

impl Hash for CuckooFilter {
    /// Combines the structural parameters with a short digest of `bucket_bytes`
    /// (taken via the filter's own [`HashPrimitive`]), so that `a == b` implies
    /// `hash(a) == hash(b)` without hashing the (potentially large) byte table in
    /// full.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bucket_count.hash(state);
        self.slots_per_bucket.hash(state);
        self.fingerprint_bytes.hash(state);
        self.max_kicks.hash(state);
        let mut digest = [0u8; 4];
        self.hasher.hash_into(&self.bucket_bytes, &mut digest);
        digest.hash(state);
    }
}

impl fmt::Debug for CuckooFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CuckooFilter")
            .field("bucket_count", &self.bucket_count)
            .field("slots_per_bucket", &self.slots_per_bucket)
            .field("fingerprint_bytes", &self.fingerprint_bytes)
            .field("max_kicks", &self.max_kicks)
            .field("byte_len", &self.bucket_bytes.len())
            .finish()
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use serde::{Deserialize, Serialize};

    use super::CuckooFilter;

    /// What actually gets (de)serialized: the filter's shape and bucket bytes.
    /// The hash primitive and kick RNG are runtime-only state, rebuilt fresh on
    /// deserialization — exactly as [`CuckooFilter::from_bytes`] already does.
    #[derive(Serialize, Deserialize)]
    struct CuckooFilterData {
        slots_per_bucket: usize,
        fingerprint_bytes: usize,
        max_kicks: usize,
        bucket_bytes: Vec<u8>,
    }

    impl Serialize for CuckooFilter {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            CuckooFilterData {
                slots_per_bucket: self.slots_per_bucket,
                fingerprint_bytes: self.fingerprint_bytes,
                max_kicks: self.max_kicks,
                bucket_bytes: self.bucket_bytes.clone(),
            }
            .serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for CuckooFilter {
        fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let data = CuckooFilterData::deserialize(deserializer)?;
            CuckooFilter::from_bytes(data.bucket_bytes, data.slots_per_bucket, data.fingerprint_bytes, data.max_kicks)
                .map_err(serde::de::Error::custom)
        }
    }
}
