use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

/// Fixed set of exclusively borrowed slots
///
/// `acquire` hands out the first free slot starting from a rotating index, so one long
/// borrow only blocks a caller when every slot is busy.
pub struct Pool<T> {
    slots: Vec<Mutex<T>>,
    next: AtomicUsize,
}

impl<T> Pool<T> {
    /// Panics if `items` is empty
    pub fn new(items: Vec<T>) -> Self {
        assert!(!items.is_empty(), "pool needs at least one slot");
        Self {
            slots: items.into_iter().map(Mutex::new).collect(),
            next: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Borrow a free slot, waiting on one only when all are taken
    ///
    /// Returns `None` when the slot waited on is poisoned.
    pub fn acquire(&self) -> Option<MutexGuard<'_, T>> {
        let len = self.slots.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % len;

        for offset in 0..len {
            match self.slots[(start + offset) % len].try_lock() {
                Ok(guard) => return Some(guard),
                Err(TryLockError::WouldBlock) | Err(TryLockError::Poisoned(_)) => continue,
            }
        }

        self.slots[start].lock().ok()
    }
}
