mod bucket;
mod filter;
mod sizing;

pub use filter::CuckooFilter;
pub use sizing::Sizing;

/// Hard ceiling on fingerprint width, kept in sync across [`bucket`], [`sizing`] and
/// [`filter`] so a single stack-allocated scratch array (no heap allocation) can
/// back every fingerprint in flight, including the one being carried through a
/// chain of kicks during `insert`.
pub(crate) const MAX_FINGERPRINT_BYTES: usize = 32;
