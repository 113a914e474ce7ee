//! # cuckoo-filter
//!
//! A cuckoo filter: a probabilistic set-membership structure, like a Bloom
//! filter, but one that also supports removing items and that stores short
//! fingerprints instead of setting bits in a shared array. An item that was
//! inserted and not since removed is always reported present; an item never
//! inserted is *usually* reported absent, at a false-positive rate tunable at
//! construction time.
//!
//! ```rust
//! use cuckoo_filter::CuckooFilter;
//!
//! let mut filter = CuckooFilter::new(100_000, 0.001).expect("valid parameters");
//!
//! filter.insert(b"alpha").expect("filter has room");
//! assert!(filter.contains(b"alpha"));
//!
//! filter.remove(b"alpha");
//! assert!(!filter.contains(b"alpha"));
//! ```
//!
//! See [`CuckooFilter`] for the full API, and [`hash::HashPrimitive`] for
//! plugging in a different digest function.

pub mod cuckoo;
pub mod error;
pub mod hash;

pub use cuckoo::CuckooFilter;
pub use error::CuckooError;
pub use hash::HashPrimitive;
