//! Slot arena with one doubly linked chain per resource.
//!
//! Requests live in a fixed table indexed by [`Slot`]. Each live entry
//! carries the slots of its neighbours in its resource's chain, and the queue
//! keeps the head and tail of every chain in an ordered map. Finding a chain
//! never touches requests for other resources, and the ordered map hands out
//! the quick list already sorted. Free slots sit in a min-heap so `add` always
//! takes the lowest one.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BinaryHeap},
};

use log::{debug, trace};

use crate::{Mode, QueueError, QuickEntry, ReleasePolicy, ResourceKey, Response, Slot, WaitQueue};

struct Entry<R> {
    key: ResourceKey,
    requester: R,
    mode: Mode,
    prev: Option<Slot>,
    next: Option<Slot>,
}

#[derive(Clone, Copy)]
struct Chain {
    head: Slot,
    tail: Slot,
}

pub struct LinkedWaitQueue<R> {
    slots: Box<[Option<Entry<R>>]>,
    free: BinaryHeap<Reverse<Slot>>,
    chains: BTreeMap<ResourceKey, Chain>,
    len: usize,
    policy: ReleasePolicy,
}

impl<R> LinkedWaitQueue<R> {
    pub fn policy(&self) -> ReleasePolicy {
        self.policy
    }

    fn entry(&self, slot: Slot) -> &Entry<R> {
        self.slots[slot]
            .as_ref()
            .expect("chains should only link live slots")
    }

    fn entry_mut(&mut self, slot: Slot) -> &mut Entry<R> {
        self.slots[slot]
            .as_mut()
            .expect("chains should only link live slots")
    }

    fn chain_mut(&mut self, key: ResourceKey) -> &mut Chain {
        self.chains
            .get_mut(&key)
            .expect("a key with live requests should have a chain")
    }

    /// Removes the request in `slot`, joins its neighbours and frees the slot.
    fn unlink(&mut self, slot: Slot) -> Entry<R> {
        let entry = self.slots[slot]
            .take()
            .expect("only slots owned by the queue can be unlinked");
        if let Some(prev) = entry.prev {
            self.entry_mut(prev).next = entry.next;
        }
        if let Some(next) = entry.next {
            self.entry_mut(next).prev = entry.prev;
        }
        match (entry.prev, entry.next) {
            (None, None) => {
                self.chains.remove(&entry.key);
            }
            (None, Some(next)) => self.chain_mut(entry.key).head = next,
            (Some(prev), None) => self.chain_mut(entry.key).tail = prev,
            (Some(_), Some(_)) => {}
        }
        self.free.push(Reverse(slot));
        self.len -= 1;
        entry
    }
}

impl<R> WaitQueue<R> for LinkedWaitQueue<R> {
    fn with_policy(capacity: usize, policy: ReleasePolicy) -> Self {
        assert!(capacity > 0, "wait queue capacity must be positive");
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            free: (0..capacity).map(Reverse).collect(),
            chains: BTreeMap::new(),
            len: 0,
            policy,
        }
    }

    fn add(&mut self, key: ResourceKey, requester: R, mode: Mode) -> Result<Response, QueueError> {
        if self.len == self.capacity() {
            debug!("rejected {mode:?} request for resource {key}: queue full");
            return Err(QueueError::Full {
                capacity: self.capacity(),
            });
        }
        let Reverse(slot) = self
            .free
            .pop()
            .expect("a queue below capacity should have a free slot");

        let prev = self.chains.get(&key).map(|chain| chain.tail);
        self.slots[slot] = Some(Entry {
            key,
            requester,
            mode,
            prev,
            next: None,
        });
        let head = match prev {
            Some(prev) => {
                self.entry_mut(prev).next = Some(slot);
                let chain = self.chain_mut(key);
                chain.tail = slot;
                chain.head
            }
            None => {
                self.chains.insert(key, Chain { head: slot, tail: slot });
                slot
            }
        };
        self.len += 1;
        trace!("queued {mode:?} request for resource {key} in slot {slot}");
        Ok(Response { head, tail: slot })
    }

    fn pop(&mut self, key: ResourceKey) -> Result<Vec<R>, QueueError> {
        let head = self.chains.get(&key).ok_or(QueueError::Empty)?.head;
        if !self.entry(head).mode.is_read() {
            return Ok(vec![self.unlink(head).requester]);
        }

        let skips_writers = self.policy.skips_writers();
        let mut released = Vec::new();
        let mut cursor = Some(head);
        while let Some(slot) = cursor {
            let (mode, next) = {
                let entry = self.entry(slot);
                (entry.mode, entry.next)
            };
            cursor = next;
            if mode.is_read() {
                released.push(self.unlink(slot).requester);
            } else if !skips_writers {
                break;
            }
        }
        debug!("released {} readers of resource {key}", released.len());
        Ok(released)
    }

    fn quick_list(&self) -> Result<Vec<QuickEntry>, QueueError> {
        if self.len == 0 {
            return Err(QueueError::Empty);
        }
        Ok(self
            .chains
            .iter()
            .map(|(&key, chain)| QuickEntry {
                key,
                head: chain.head,
                tail: chain.tail,
            })
            .collect())
    }

    fn peek(&self, key: ResourceKey) -> Option<Response> {
        self.chains.get(&key).map(|chain| Response {
            head: chain.head,
            tail: chain.tail,
        })
    }

    fn requests(&self, key: ResourceKey) -> Vec<(Slot, Mode)> {
        let mut requests = Vec::new();
        let mut cursor = self.chains.get(&key).map(|chain| chain.head);
        while let Some(slot) = cursor {
            let entry = self.entry(slot);
            requests.push((slot, entry.mode));
            cursor = entry.next;
        }
        requests
    }

    fn len(&self) -> usize {
        self.len
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod test {
    use super::LinkedWaitQueue;
    use crate::{
        Mode::{Read, Write},
        QueueError, QuickEntry, ReleasePolicy, Response, WaitQueue,
    };

    #[test]
    fn first_request_is_head_and_tail() {
        let mut queue = LinkedWaitQueue::new(4);
        assert_eq!(queue.add(7, 'a', Read), Ok(Response { head: 0, tail: 0 }));
        assert_eq!(queue.add(7, 'b', Write), Ok(Response { head: 0, tail: 1 }));
        assert_eq!(queue.add(9, 'c', Write), Ok(Response { head: 2, tail: 2 }));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn full_queue_rejects_without_mutation() {
        let mut queue = LinkedWaitQueue::new(3);
        queue.add(1, 'a', Write).unwrap();
        queue.add(2, 'b', Read).unwrap();
        queue.add(1, 'c', Write).unwrap();
        let before = queue.quick_list().unwrap();

        assert_eq!(queue.add(3, 'd', Read), Err(QueueError::Full { capacity: 3 }));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.quick_list().unwrap(), before);
        assert_eq!(queue.peek(3), None);

        assert_eq!(queue.pop(1), Ok(vec!['a']));
        assert!(queue.add(3, 'd', Read).is_ok());
        assert_eq!(queue.add(3, 'e', Read), Err(QueueError::Full { capacity: 3 }));
    }

    #[test]
    fn writers_release_one_at_a_time() {
        let mut queue = LinkedWaitQueue::new(4);
        queue.add(5, "w1", Write).unwrap();
        queue.add(5, "w2", Write).unwrap();
        queue.add(5, "w3", Write).unwrap();
        assert_eq!(queue.pop(5), Ok(vec!["w1"]));
        assert_eq!(queue.pop(5), Ok(vec!["w2"]));
        assert_eq!(queue.pop(5), Ok(vec!["w3"]));
        assert_eq!(queue.pop(5), Err(QueueError::Empty));
    }

    #[test]
    fn leading_readers_stop_at_writer() {
        let mut queue = LinkedWaitQueue::new(4);
        queue.add(7, 'a', Read).unwrap();
        queue.add(7, 'b', Read).unwrap();
        queue.add(7, 'c', Write).unwrap();
        queue.add(7, 'd', Read).unwrap();

        assert_eq!(queue.pop(7), Ok(vec!['a', 'b']));
        assert_eq!(queue.requests(7), vec![(2, Write), (3, Read)]);
        assert_eq!(queue.pop(7), Ok(vec!['c']));
        assert_eq!(queue.pop(7), Ok(vec!['d']));
        assert_eq!(queue.pop(7), Err(QueueError::Empty));
        assert!(queue.is_empty());
    }

    #[test]
    fn all_readers_skip_interleaved_writers() {
        let mut queue = LinkedWaitQueue::with_policy(4, ReleasePolicy::AllReaders);
        queue.add(7, 'a', Read).unwrap();
        queue.add(7, 'b', Read).unwrap();
        queue.add(7, 'c', Write).unwrap();
        queue.add(7, 'd', Read).unwrap();

        assert_eq!(queue.pop(7), Ok(vec!['a', 'b', 'd']));
        assert_eq!(queue.peek(7), Some(Response { head: 2, tail: 2 }));
        assert_eq!(queue.pop(7), Ok(vec!['c']));
        assert_eq!(queue.pop(7), Err(QueueError::Empty));
    }

    #[test]
    fn relinks_writers_left_between_released_readers() {
        let mut queue = LinkedWaitQueue::with_policy(5, ReleasePolicy::AllReaders);
        for (requester, mode) in [(0, Read), (1, Write), (2, Read), (3, Write), (4, Read)] {
            queue.add(1, requester, mode).unwrap();
        }
        assert_eq!(queue.pop(1), Ok(vec![0, 2, 4]));
        assert_eq!(queue.requests(1), vec![(1, Write), (3, Write)]);
        assert_eq!(queue.peek(1), Some(Response { head: 1, tail: 3 }));

        // lowest freed slot is reused and appended behind the writers
        assert_eq!(queue.add(1, 5, Read), Ok(Response { head: 1, tail: 0 }));
        assert_eq!(queue.requests(1), vec![(1, Write), (3, Write), (0, Read)]);
        assert_eq!(queue.pop(1), Ok(vec![1]));
        assert_eq!(queue.pop(1), Ok(vec![3]));
        assert_eq!(queue.pop(1), Ok(vec![5]));
    }

    #[test]
    fn resources_are_independent() {
        let mut queue = LinkedWaitQueue::new(6);
        queue.add(1, 'a', Read).unwrap();
        queue.add(2, 'x', Write).unwrap();
        queue.add(1, 'b', Write).unwrap();
        queue.add(2, 'y', Read).unwrap();
        let other = queue.requests(2);

        assert_eq!(queue.pop(1), Ok(vec!['a']));
        assert_eq!(queue.pop(1), Ok(vec!['b']));
        assert_eq!(queue.pop(1), Err(QueueError::Empty));
        assert_eq!(queue.requests(2), other);
        assert_eq!(queue.pop(2), Ok(vec!['x']));
        assert_eq!(queue.pop(2), Ok(vec!['y']));
    }

    #[test]
    fn quick_list_is_sorted_and_matches_peek() {
        let mut queue = LinkedWaitQueue::new(8);
        queue.add(3, 'a', Read).unwrap();
        queue.add(1, 'b', Write).unwrap();
        queue.add(2, 'c', Read).unwrap();
        queue.add(3, 'd', Write).unwrap();
        queue.add(1, 'e', Read).unwrap();

        let list = queue.quick_list().unwrap();
        assert_eq!(
            list,
            vec![
                QuickEntry { key: 1, head: 1, tail: 4 },
                QuickEntry { key: 2, head: 2, tail: 2 },
                QuickEntry { key: 3, head: 0, tail: 3 },
            ]
        );
        for entry in list {
            assert_eq!(
                queue.peek(entry.key),
                Some(Response { head: entry.head, tail: entry.tail })
            );
        }
    }

    #[test]
    fn freed_slot_is_reused() {
        let mut queue = LinkedWaitQueue::new(3);
        queue.add(1, 'a', Write).unwrap();
        queue.add(2, 'b', Write).unwrap();
        assert_eq!(queue.pop(1), Ok(vec!['a']));

        assert_eq!(queue.add(3, 'c', Read), Ok(Response { head: 0, tail: 0 }));
        assert_eq!(queue.add(2, 'd', Read), Ok(Response { head: 1, tail: 2 }));
        assert_eq!(queue.pop(3), Ok(vec!['c']));
        assert_eq!(queue.peek(3), None);
        assert_eq!(queue.pop(2), Ok(vec!['b']));
        assert_eq!(queue.peek(2), Some(Response { head: 2, tail: 2 }));
    }

    #[test]
    fn empty_queue_stays_empty() {
        let mut queue: LinkedWaitQueue<char> = LinkedWaitQueue::new(2);
        for _ in 0..3 {
            assert_eq!(queue.pop(4), Err(QueueError::Empty));
            assert_eq!(queue.quick_list(), Err(QueueError::Empty));
        }
        queue.add(4, 'a', Read).unwrap();
        queue.pop(4).unwrap();
        assert_eq!(queue.pop(4), Err(QueueError::Empty));
        assert_eq!(queue.quick_list(), Err(QueueError::Empty));
    }

    #[test]
    #[should_panic]
    fn zero_capacity_panics() {
        let _: LinkedWaitQueue<char> = LinkedWaitQueue::new(0);
    }
}
