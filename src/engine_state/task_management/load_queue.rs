//! # Load Queue
//!
//! Bounded priority queue of chunks waiting to be meshed.
//!
//! Entries live in a preallocated arena of doubly linked nodes addressed by index, with a
//! key to node map beside it. Removal by key is O(1) and no node is allocated after
//! construction. Insertion is a linear scan, which stays cheap because the capacity is
//! bounded and most entries are replaced or removed long before the queue drains.
//!
//! ## Ordering
//! Higher level numbers (coarser meshes) dequeue first. Entries of equal level dequeue in
//! arrival order.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::core::{Result, StreamError};
use crate::engine_state::voxels::chunk::ChunkId;

#[derive(Debug, Clone)]
struct QueueNode<K> {
    key: K,
    level: u8,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Fixed-capacity priority queue keyed by `K`, at most one entry per key.
#[derive(Debug)]
pub struct LoadQueue<K> {
    nodes: Vec<QueueNode<K>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    index: HashMap<K, usize>,
    capacity: usize,
}

impl<K: Copy + Eq + Hash> LoadQueue<K> {
    /// Creates an empty queue holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        LoadQueue {
            nodes: Vec::with_capacity(capacity),
            free: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            index: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Queues `key` at `level`, replacing any entry it already has.
    ///
    /// # Errors
    /// [`StreamError::QueueFull`] when the queue is at capacity. The check happens before
    /// any existing entry is replaced, so a full queue is left untouched.
    pub fn enqueue(&mut self, key: K, level: u8) -> Result<()> {
        if self.len() >= self.capacity {
            return Err(StreamError::QueueFull { capacity: self.capacity });
        }
        self.remove(&key);

        let mut cursor = self.head;
        while let Some(i) = cursor {
            if self.nodes[i].level < level {
                break;
            }
            cursor = self.nodes[i].next;
        }

        let slot = self.allocate(key, level);
        match cursor {
            Some(before) => self.link_before(slot, before),
            None => self.link_back(slot),
        }
        self.index.insert(key, slot);
        Ok(())
    }

    /// Removes and returns the highest priority entry.
    pub fn dequeue(&mut self) -> Option<(K, u8)> {
        let slot = self.head?;
        let (key, level) = (self.nodes[slot].key, self.nodes[slot].level);
        self.index.remove(&key);
        self.unlink(slot);
        self.free.push(slot);
        Some((key, level))
    }

    /// Removes the entry for `key`. Does nothing if it is not queued.
    ///
    /// # Returns
    /// Whether an entry was removed.
    pub fn remove(&mut self, key: &K) -> bool {
        let Some(slot) = self.index.remove(key) else {
            return false;
        };
        self.unlink(slot);
        self.free.push(slot);
        true
    }

    /// Whether `key` is queued at exactly `level`.
    pub fn contains(&self, key: &K, level: u8) -> bool {
        self.index
            .get(key)
            .is_some_and(|&slot| self.nodes[slot].level == level)
    }

    /// Queued level of `key`, if any.
    pub fn level_of(&self, key: &K) -> Option<u8> {
        self.index.get(key).map(|&slot| self.nodes[slot].level)
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    /// Entries in dequeue order.
    pub fn iter(&self) -> impl Iterator<Item = (K, u8)> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let node = &self.nodes[cursor?];
            cursor = node.next;
            Some((node.key, node.level))
        })
    }

    fn allocate(&mut self, key: K, level: u8) -> usize {
        let node = QueueNode {
            key,
            level,
            prev: None,
            next: None,
        };
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn link_before(&mut self, slot: usize, before: usize) {
        let prev = self.nodes[before].prev;
        self.nodes[slot].prev = prev;
        self.nodes[slot].next = Some(before);
        self.nodes[before].prev = Some(slot);
        match prev {
            Some(p) => self.nodes[p].next = Some(slot),
            None => self.head = Some(slot),
        }
    }

    fn link_back(&mut self, slot: usize) {
        self.nodes[slot].prev = self.tail;
        self.nodes[slot].next = None;
        match self.tail {
            Some(t) => self.nodes[t].next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
    }

    fn unlink(&mut self, slot: usize) {
        let QueueNode { prev, next, .. } = self.nodes[slot];
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[slot].prev = None;
        self.nodes[slot].next = None;
    }
}

/// The chunk load queue shared between the coordinator and the meshing workers.
///
/// Every operation holds the lock only for the queue mutation itself. Idle workers park
/// on a condition variable that `enqueue` signals.
#[derive(Debug)]
pub struct SharedLoadQueue {
    queue: Mutex<LoadQueue<ChunkId>>,
    work_available: Condvar,
}

impl SharedLoadQueue {
    /// Creates an empty queue of `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        SharedLoadQueue {
            queue: Mutex::new(LoadQueue::new(capacity)),
            work_available: Condvar::new(),
        }
    }

    /// Queues a chunk and wakes one waiting worker.
    pub fn enqueue(&self, chunk: ChunkId, level: u8) -> Result<()> {
        self.queue.lock().enqueue(chunk, level)?;
        self.work_available.notify_one();
        Ok(())
    }

    /// Removes the highest priority chunk.
    pub fn dequeue(&self) -> Option<(ChunkId, u8)> {
        self.queue.lock().dequeue()
    }

    /// Removes a chunk if it is queued.
    pub fn remove(&self, chunk: &ChunkId) -> bool {
        self.queue.lock().remove(chunk)
    }

    /// Whether `chunk` is queued at exactly `level`.
    pub fn contains(&self, chunk: &ChunkId, level: u8) -> bool {
        self.queue.lock().contains(chunk, level)
    }

    /// Number of queued chunks.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Drops every queued chunk.
    pub fn clear(&self) {
        self.queue.lock().clear();
    }

    /// Blocks until work is queued or `timeout` elapses.
    ///
    /// # Returns
    /// Whether the queue is non-empty on return.
    pub fn wait_for_work(&self, timeout: Duration) -> bool {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            self.work_available.wait_for(&mut queue, timeout);
        }
        !queue.is_empty()
    }

    /// Wakes every waiting worker, used at shutdown.
    pub fn notify_all(&self) {
        self.work_available.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn drain(queue: &mut LoadQueue<u32>) -> Vec<(u32, u8)> {
        std::iter::from_fn(|| queue.dequeue()).collect()
    }

    #[test]
    fn coarse_levels_dequeue_first_and_ties_are_fifo() {
        let mut queue = LoadQueue::new(16);
        queue.enqueue(1, 0).unwrap();
        queue.enqueue(2, 3).unwrap();
        queue.enqueue(3, 1).unwrap();
        queue.enqueue(4, 3).unwrap();
        queue.enqueue(5, 0).unwrap();

        assert_eq!(drain(&mut queue), vec![(2, 3), (4, 3), (3, 1), (1, 0), (5, 0)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn requeue_replaces_the_entry() {
        let mut queue = LoadQueue::new(4);
        queue.enqueue(7, 3).unwrap();
        queue.enqueue(8, 2).unwrap();
        queue.enqueue(7, 0).unwrap();

        assert_eq!(queue.len(), 2);
        assert!(queue.contains(&7, 0));
        assert!(!queue.contains(&7, 3));
        assert_eq!(queue.iter().collect::<Vec<_>>(), vec![(8, 2), (7, 0)]);
    }

    #[test]
    fn remove_and_contains() {
        let mut queue = LoadQueue::new(4);
        assert!(!queue.remove(&1));

        queue.enqueue(1, 2).unwrap();
        assert!(queue.contains(&1, 2));
        assert!(!queue.contains(&1, 1));
        assert_eq!(queue.level_of(&1), Some(2));
        assert!(queue.remove(&1));
        assert!(!queue.contains(&1, 2));
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn full_queue_rejects_without_changes() {
        let mut queue = LoadQueue::new(2);
        queue.enqueue(1, 1).unwrap();
        queue.enqueue(2, 1).unwrap();

        let err = queue.enqueue(3, 4).unwrap_err();
        assert!(matches!(err, StreamError::QueueFull { capacity: 2 }));
        assert!(queue.enqueue(1, 0).is_err());
        assert!(queue.contains(&1, 1));

        queue.dequeue();
        queue.enqueue(3, 4).unwrap();
        assert_eq!(queue.dequeue(), Some((3, 4)));
    }

    #[test]
    fn slots_are_reused() {
        let mut queue = LoadQueue::new(3);
        for round in 0..50u32 {
            queue.enqueue(round, (round % 5) as u8).unwrap();
            queue.enqueue(round + 1000, 0).unwrap();
            queue.remove(&(round + 1000));
            queue.dequeue().unwrap();
        }
        assert!(queue.is_empty());
        assert!(queue.nodes.len() <= 3);
    }

    #[test]
    fn random_operations_keep_priority_order() {
        let mut rng = fastrand::Rng::with_seed(7);
        let mut queue = LoadQueue::new(64);
        for _ in 0..2000 {
            let key = rng.u32(0..40);
            match rng.u8(0..4) {
                0 | 1 => {
                    let _ = queue.enqueue(key, rng.u8(0..5));
                }
                2 => {
                    queue.remove(&key);
                }
                _ => {
                    queue.dequeue();
                }
            }
            let levels: Vec<u8> = queue.iter().map(|(_, level)| level).collect();
            assert!(levels.windows(2).all(|w| w[0] >= w[1]));
            assert_eq!(levels.len(), queue.len());
        }

        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.iter().count(), 0);
    }

    #[test]
    fn waiting_worker_wakes_on_enqueue() {
        let shared = Arc::new(SharedLoadQueue::new(8));
        let waiter = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || shared.wait_for_work(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        shared.enqueue(ChunkId::new(1, 2, 3), 1).unwrap();

        assert!(waiter.join().unwrap());
        assert!(shared.contains(&ChunkId::new(1, 2, 3), 1));
    }

    #[test]
    fn wait_times_out_when_idle() {
        let shared = SharedLoadQueue::new(8);
        assert!(!shared.wait_for_work(Duration::from_millis(5)));
    }
}
