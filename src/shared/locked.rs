//! Whole-structure locking around a single-owner [`WaitQueue`].
//!
//! `add` and `pop` both relink chains, so they take the write lock. The quick
//! list only reads, so handles take the read lock for it. No operation waits
//! on queue contents, only on the lock itself.

use parking_lot::RwLock;

use crate::{ConcurrentWaitQueue, Handle, Mode, QueueError, QuickEntry, ResourceKey, Response, WaitQueue};

pub struct SharedWaitQueue<Q> {
    queue: RwLock<Q>,
}

impl<Q> SharedWaitQueue<Q> {
    pub fn new(queue: Q) -> Self {
        Self {
            queue: RwLock::new(queue),
        }
    }

    pub fn into_inner(self) -> Q {
        self.queue.into_inner()
    }

    /// Number of live requests at the time of the call.
    pub fn len<R>(&self) -> usize
    where
        Q: WaitQueue<R>,
    {
        self.queue.read().len()
    }
}

impl<R, Q: WaitQueue<R>> ConcurrentWaitQueue<R> for SharedWaitQueue<Q> {
    fn register(&self) -> impl Handle<R> {
        SharedHandle { queue: &self.queue }
    }
}

pub struct SharedHandle<'a, Q> {
    queue: &'a RwLock<Q>,
}

impl<R, Q: WaitQueue<R>> Handle<R> for SharedHandle<'_, Q> {
    fn add(&mut self, key: ResourceKey, requester: R, mode: Mode) -> Result<Response, QueueError> {
        self.queue.write().add(key, requester, mode)
    }

    fn pop(&mut self, key: ResourceKey) -> Result<Vec<R>, QueueError> {
        self.queue.write().pop(key)
    }

    fn quick_list(&mut self) -> Result<Vec<QuickEntry>, QueueError> {
        self.queue.read().quick_list()
    }
}
