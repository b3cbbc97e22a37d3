//! Entity id allocation.
//!
//! Ids come from two places: a free list of released ids, served oldest
//! first, and a monotonically increasing high-water mark used when the
//! free list is empty. The first fresh id is 1.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicI32, Ordering};

use mineral_protocol::EntityId;
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::SessionError;

/// Default number of released ids the free list can hold.
pub const FREE_LIST_CAPACITY: usize = 65_536;

#[derive(Default)]
struct FreeList {
    queue: VecDeque<i32>,
    /// Mirrors `queue` for O(1) double-release detection.
    members: HashSet<i32>,
}

/// Hands out entity ids that are unique among live entities.
///
/// Thread-safe; share it behind an `Arc`.
pub struct IdAllocator {
    high_water: AtomicI32,
    free: Mutex<FreeList>,
    capacity: usize,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::with_capacity(FREE_LIST_CAPACITY)
    }

    /// An allocator whose free list holds at most `capacity` ids.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            high_water: AtomicI32::new(0),
            free: Mutex::new(FreeList::default()),
            capacity,
        }
    }

    /// Returns a recycled id if one is waiting, otherwise a fresh one.
    ///
    /// Fresh ids wrap from `i32::MAX` back to 0. After that point a fresh
    /// id may collide with a long-lived entity; a server would need two
    /// billion connections to get there.
    pub fn acquire(&self) -> EntityId {
        if let Some(id) = self.pop_free() {
            trace!(id, "recycled entity id");
            return EntityId(id);
        }

        let next = |v: i32| if v == i32::MAX { 0 } else { v + 1 };
        // The closure never returns None, so fetch_update always succeeds.
        let prev = match self
            .high_water
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(next(v)))
        {
            Ok(prev) | Err(prev) => prev,
        };
        let id = next(prev);
        if id == 0 {
            warn!("entity id counter wrapped");
        }
        EntityId(id)
    }

    /// Puts `id` on the back of the free list.
    ///
    /// # Errors
    /// - [`SessionError::InvalidId`] for a negative id.
    /// - [`SessionError::AlreadyReleased`] if `id` is already waiting.
    /// - [`SessionError::FreeListFull`] if the list is at capacity.
    pub fn release(&self, id: EntityId) -> Result<(), SessionError> {
        if id.0 < 0 {
            return Err(SessionError::InvalidId(id));
        }
        let mut free = self.free.lock();
        if free.members.contains(&id.0) {
            return Err(SessionError::AlreadyReleased(id));
        }
        if free.queue.len() >= self.capacity {
            return Err(SessionError::FreeListFull {
                capacity: self.capacity,
            });
        }
        free.queue.push_back(id.0);
        free.members.insert(id.0);
        trace!(%id, "entity id released");
        Ok(())
    }

    /// Number of ids waiting to be recycled.
    pub fn free_len(&self) -> usize {
        self.free.lock().queue.len()
    }

    /// The most recent fresh id handed out, 0 if none.
    pub fn high_water(&self) -> i32 {
        self.high_water.load(Ordering::Acquire)
    }

    fn pop_free(&self) -> Option<i32> {
        let mut free = self.free.lock();
        let id = free.queue.pop_front()?;
        free.members.remove(&id);
        Some(id)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_starts_at_one() {
        let ids = IdAllocator::new();
        assert_eq!(ids.acquire(), EntityId(1));
        assert_eq!(ids.acquire(), EntityId(2));
        assert_eq!(ids.high_water(), 2);
    }

    #[test]
    fn test_release_recycles_oldest_first() {
        let ids = IdAllocator::new();
        let a = ids.acquire();
        let _b = ids.acquire();
        let c = ids.acquire();
        ids.release(c).unwrap();
        ids.release(a).unwrap();

        assert_eq!(ids.acquire(), c);
        assert_eq!(ids.acquire(), a);
        assert_eq!(ids.acquire(), EntityId(4));
    }

    #[test]
    fn test_release_twice_is_rejected() {
        let ids = IdAllocator::new();
        let a = ids.acquire();
        ids.release(a).unwrap();
        assert!(matches!(
            ids.release(a),
            Err(SessionError::AlreadyReleased(id)) if id == a
        ));
        assert_eq!(ids.free_len(), 1);
    }

    #[test]
    fn test_release_negative_is_rejected() {
        let ids = IdAllocator::new();
        assert!(matches!(
            ids.release(EntityId(-4)),
            Err(SessionError::InvalidId(EntityId(-4)))
        ));
    }

    #[test]
    fn test_release_full_free_list_is_rejected() {
        let ids = IdAllocator::with_capacity(2);
        let taken: Vec<_> = (0..3).map(|_| ids.acquire()).collect();
        ids.release(taken[0]).unwrap();
        ids.release(taken[1]).unwrap();
        assert!(matches!(
            ids.release(taken[2]),
            Err(SessionError::FreeListFull { capacity: 2 })
        ));
    }

    #[test]
    fn test_acquire_wraps_to_zero() {
        let ids = IdAllocator::new();
        ids.high_water.store(i32::MAX - 1, Ordering::Release);
        assert_eq!(ids.acquire(), EntityId(i32::MAX));
        assert_eq!(ids.acquire(), EntityId(0));
        assert_eq!(ids.acquire(), EntityId(1));
    }

    #[test]
    fn test_acquire_concurrent_ids_are_unique() {
        use std::sync::Arc;

        let ids = Arc::new(IdAllocator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..500).map(|_| ids.acquire().0).collect::<Vec<_>>())
            })
            .collect();

        let mut all = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(all.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(all.len(), 4000);
    }

    #[test]
    fn test_release_interleaved_with_acquire_keeps_ids_unique() {
        use std::sync::Arc;

        let ids = Arc::new(IdAllocator::new());
        let live = Arc::new(Mutex::new(HashSet::new()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                let live = Arc::clone(&live);
                std::thread::spawn(move || {
                    for _ in 0..2000 {
                        let id = ids.acquire();
                        assert!(live.lock().insert(id.0), "id {} handed out twice", id.0);
                        // Leave the live set before the id can be recycled.
                        live.lock().remove(&id.0);
                        ids.release(id).unwrap();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert!(live.lock().is_empty());
    }
}
