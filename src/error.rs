use thiserror::Error;

/// An error returned by a [`crate::CuckooFilter`] constructor or mutator.
#[derive(Error, Debug)]
pub enum CuckooError {
    /// A constructor received a parameter that violates one of the filter's
    /// structural invariants (e.g. a non-power-of-two bucket count).
    #[error("invalid parameter '{expected}' (found: {found})")]
    InvalidParameter {
        /// The constraint that was violated.
        expected: &'static str,
        /// The offending value, rendered for display.
        found: String,
    },

    /// `insert` exhausted its kick budget without finding a free slot.
    ///
    /// The filter is left in a valid, but maximally (or near-maximally)
    /// loaded, state: the item that could not be placed is simply not a
    /// member, and some other previously-inserted fingerprint may have been
    /// shuffled to a different one of its two candidate buckets in the
    /// process.
    #[error("filter full: exhausted kick budget without inserting item")]
    Full,
}
