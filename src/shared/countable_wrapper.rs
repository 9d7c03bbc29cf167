use std::{
    marker::PhantomData,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::{ConcurrentWaitQueue, Handle, Mode, QueueError, QuickEntry, ResourceKey, Response};

pub struct CountableWrapper<S> {
    queue: S,
    admitted: AtomicUsize,
    rejected: AtomicUsize,
    released: AtomicUsize,
}

impl<S> CountableWrapper<S> {
    pub fn new(queue: S) -> Self {
        Self {
            queue,
            admitted: 0.into(),
            rejected: 0.into(),
            released: 0.into(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.queue
    }

    /// Requests accepted by `add`.
    pub fn admitted(&self) -> usize {
        self.admitted.load(Ordering::Relaxed)
    }

    /// Adds rejected because the queue was full.
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Requesters handed back by `pop`.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::Relaxed)
    }
}

impl<S, R> ConcurrentWaitQueue<R> for CountableWrapper<S>
where
    S: ConcurrentWaitQueue<R>,
{
    fn register(&self) -> impl Handle<R> {
        CountableHandle {
            handle: self.queue.register(),
            wrapper: self,
            _requester: PhantomData,
        }
    }
}

pub struct CountableHandle<'a, H, S, R> {
    handle: H,
    wrapper: &'a CountableWrapper<S>,
    _requester: PhantomData<fn(R)>,
}

impl<H: Handle<R>, S, R> Handle<R> for CountableHandle<'_, H, S, R> {
    fn add(&mut self, key: ResourceKey, requester: R, mode: Mode) -> Result<Response, QueueError> {
        let result = self.handle.add(key, requester, mode);
        match result {
            Ok(_) => self.wrapper.admitted.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.wrapper.rejected.fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    fn pop(&mut self, key: ResourceKey) -> Result<Vec<R>, QueueError> {
        let released = self.handle.pop(key)?;
        self.wrapper
            .released
            .fetch_add(released.len(), Ordering::Relaxed);
        Ok(released)
    }

    fn quick_list(&mut self) -> Result<Vec<QuickEntry>, QueueError> {
        self.handle.quick_list()
    }
}

#[cfg(test)]
mod test {
    use super::CountableWrapper;
    use crate::{
        shared::SharedWaitQueue,
        wait_queues::LinkedWaitQueue,
        ConcurrentWaitQueue, Handle,
        Mode::{Read, Write},
        WaitQueue,
    };

    #[test]
    fn counts_admitted_rejected_and_released() {
        let queue = CountableWrapper::new(SharedWaitQueue::new(LinkedWaitQueue::new(3)));
        let mut handle = ConcurrentWaitQueue::<char>::register(&queue);
        handle.add(1, 'a', Read).unwrap();
        handle.add(1, 'b', Read).unwrap();
        handle.add(1, 'c', Write).unwrap();
        assert!(handle.add(2, 'd', Write).is_err());

        assert_eq!(handle.pop(1), Ok(vec!['a', 'b']));
        assert!(handle.pop(2).is_err());

        assert_eq!(queue.admitted(), 3);
        assert_eq!(queue.rejected(), 1);
        assert_eq!(queue.released(), 2);
        assert_eq!(queue.inner().len::<char>(), 1);
    }
}
