//! # Reader release policy
//!
//! `pop` on a resource whose head is a WRITE request always releases exactly
//! that request. When the head is a READ request a batch of readers is
//! released, and the policy decides how far the batch reaches.
//!
//! ## Invariants
//! - Released requesters are returned in arrival order.
//! - A WRITE request is only ever released alone, once it is the head.

/// Controls which readers a `pop` on a READ head releases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Release the contiguous run of readers starting at the head and stop at
    /// the first writer. Readers queued behind a writer wait for it.
    #[default]
    LeadingReaders,

    /// Release every reader of the resource, leaving interleaved writers
    /// queued in their relative order.
    AllReaders,
}

impl ReleasePolicy {
    /// Whether a release pass continues past a queued writer.
    pub(crate) fn skips_writers(self) -> bool {
        self == ReleasePolicy::AllReaders
    }
}
