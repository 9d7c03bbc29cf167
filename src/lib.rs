pub mod error;
pub mod policy;
pub mod shared;
pub mod wait_queues;

pub use error::QueueError;
pub use policy::ReleasePolicy;

/// Identifies the shared resource a request wants access to.
pub type ResourceKey = i64;

/// Index into the fixed-size request table. Unique among live requests,
/// recycled once the request holding it is released.
pub type Slot = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Shared access, may be admitted together with other readers.
    Read,
    /// Exclusive access, always admitted alone.
    Write,
}

impl Mode {
    pub fn from_read_only(read_only: bool) -> Self {
        if read_only {
            Mode::Read
        } else {
            Mode::Write
        }
    }

    pub fn is_read(self) -> bool {
        self == Mode::Read
    }
}

/// Head and tail slot of one resource's chain, as seen right after an `add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub head: Slot,
    pub tail: Slot,
}

/// One row of [`WaitQueue::quick_list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickEntry {
    pub key: ResourceKey,
    pub head: Slot,
    pub tail: Slot,
}

/// Fixed-capacity, per-resource FIFO of access requests, owned by a single
/// thread. Wrap it in [`shared::SharedWaitQueue`] to use it concurrently.
pub trait WaitQueue<R> {
    /// Creates an empty queue able to hold `capacity` live requests.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    fn with_policy(capacity: usize, policy: ReleasePolicy) -> Self
    where
        Self: Sized;

    fn new(capacity: usize) -> Self
    where
        Self: Sized,
    {
        Self::with_policy(capacity, ReleasePolicy::default())
    }

    /// Appends a request to the tail of `key`'s chain in the lowest free slot.
    fn add(&mut self, key: ResourceKey, requester: R, mode: Mode) -> Result<Response, QueueError>;

    /// Releases the requests of `key` that may proceed now, in arrival order.
    fn pop(&mut self, key: ResourceKey) -> Result<Vec<R>, QueueError>;

    /// Every resource with queued requests, sorted by key.
    fn quick_list(&self) -> Result<Vec<QuickEntry>, QueueError>;

    fn peek(&self, key: ResourceKey) -> Option<Response>;

    /// Slots and modes of `key`'s requests, oldest first.
    fn requests(&self, key: ResourceKey) -> Vec<(Slot, Mode)>;

    fn len(&self) -> usize;

    fn capacity(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait ConcurrentWaitQueue<R> {
    /// Returns a thread handle to the queue, which can be used for adds and pops
    fn register(&self) -> impl Handle<R>;
}

pub trait Handle<R> {
    fn add(&mut self, key: ResourceKey, requester: R, mode: Mode) -> Result<Response, QueueError>;

    fn pop(&mut self, key: ResourceKey) -> Result<Vec<R>, QueueError>;

    fn quick_list(&mut self) -> Result<Vec<QuickEntry>, QueueError>;
}
