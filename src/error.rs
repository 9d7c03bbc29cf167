use thiserror::Error;

/// Error returned by wait queue operations. Both variants are routine
/// outcomes the caller is expected to handle.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Every slot holds a live request (retry after a pop or reject upstream).
    #[error("wait queue full ({capacity} requests queued)")]
    Full { capacity: usize },

    /// Nothing is queued for the requested resource, or nothing at all.
    #[error("no queued requests")]
    Empty,
}
