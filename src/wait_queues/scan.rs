//! Fixed slot table plus one arrival-order list of occupied slots.
//!
//! Every lookup walks the arrival list, so each operation costs O(current
//! size) rather than O(chain length). The bookkeeping is much simpler than
//! the linked layout, which is fine for small capacities.

use std::collections::BTreeMap;

use log::{debug, trace};

use crate::{Mode, QueueError, QuickEntry, ReleasePolicy, ResourceKey, Response, Slot, WaitQueue};

struct Entry<R> {
    key: ResourceKey,
    requester: R,
    mode: Mode,
}

pub struct ScanWaitQueue<R> {
    slots: Box<[Option<Entry<R>>]>,
    // occupied slots, oldest first
    arrivals: Vec<Slot>,
    policy: ReleasePolicy,
}

impl<R> ScanWaitQueue<R> {
    pub fn policy(&self) -> ReleasePolicy {
        self.policy
    }

    fn entry(&self, slot: Slot) -> &Entry<R> {
        self.slots[slot]
            .as_ref()
            .expect("arrival list should only hold live slots")
    }

    fn chain(&self, key: ResourceKey) -> impl Iterator<Item = Slot> + '_ {
        self.arrivals
            .iter()
            .copied()
            .filter(move |&slot| self.entry(slot).key == key)
    }
}

impl<R> WaitQueue<R> for ScanWaitQueue<R> {
    fn with_policy(capacity: usize, policy: ReleasePolicy) -> Self {
        assert!(capacity > 0, "wait queue capacity must be positive");
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            arrivals: Vec::with_capacity(capacity),
            policy,
        }
    }

    fn add(&mut self, key: ResourceKey, requester: R, mode: Mode) -> Result<Response, QueueError> {
        let Some(slot) = self.slots.iter().position(Option::is_none) else {
            debug!("rejected {mode:?} request for resource {key}: queue full");
            return Err(QueueError::Full {
                capacity: self.capacity(),
            });
        };
        let head = self.chain(key).next().unwrap_or(slot);
        self.slots[slot] = Some(Entry {
            key,
            requester,
            mode,
        });
        self.arrivals.push(slot);
        trace!("queued {mode:?} request for resource {key} in slot {slot}");
        Ok(Response { head, tail: slot })
    }

    fn pop(&mut self, key: ResourceKey) -> Result<Vec<R>, QueueError> {
        let head = self.chain(key).next().ok_or(QueueError::Empty)?;
        let batch = if self.entry(head).mode.is_read() {
            let skips_writers = self.policy.skips_writers();
            let mut batch = Vec::new();
            for slot in self.chain(key) {
                if self.entry(slot).mode.is_read() {
                    batch.push(slot);
                } else if !skips_writers {
                    break;
                }
            }
            debug!("released {} readers of resource {key}", batch.len());
            batch
        } else {
            vec![head]
        };

        self.arrivals.retain(|slot| !batch.contains(slot));
        Ok(batch
            .into_iter()
            .map(|slot| {
                self.slots[slot]
                    .take()
                    .expect("only slots owned by the queue can be released")
                    .requester
            })
            .collect())
    }

    fn quick_list(&self) -> Result<Vec<QuickEntry>, QueueError> {
        if self.arrivals.is_empty() {
            return Err(QueueError::Empty);
        }
        let mut chains: BTreeMap<ResourceKey, QuickEntry> = BTreeMap::new();
        for &slot in &self.arrivals {
            let key = self.entry(slot).key;
            chains
                .entry(key)
                .and_modify(|entry| entry.tail = slot)
                .or_insert(QuickEntry {
                    key,
                    head: slot,
                    tail: slot,
                });
        }
        Ok(chains.into_values().collect())
    }

    fn peek(&self, key: ResourceKey) -> Option<Response> {
        let head = self.chain(key).next()?;
        let tail = self.chain(key).last()?;
        Some(Response { head, tail })
    }

    fn requests(&self, key: ResourceKey) -> Vec<(Slot, Mode)> {
        self.chain(key)
            .map(|slot| (slot, self.entry(slot).mode))
            .collect()
    }

    fn len(&self) -> usize {
        self.arrivals.len()
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }
}
