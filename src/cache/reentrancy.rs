//! Re-entrancy detection for callbacks run under the exclusive lock.
//!
//! `for_each` and `remove_where` call user code while holding the table's
//! write lock. A call back into the same store from that code can never be
//! granted the lock, so it is turned into a panic instead of a deadlock.

use std::cell::RefCell;

thread_local! {
    /// Ids of the stores whose exclusive section is open on this thread.
    static OPEN_SECTIONS: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks a store's exclusive section as open on the current thread until
/// dropped.
#[derive(Debug)]
pub struct ExclusiveSection {
    store_id: usize,
}

impl ExclusiveSection {
    pub fn enter(store_id: usize) -> Self {
        OPEN_SECTIONS.with(|open| open.borrow_mut().push(store_id));
        Self { store_id }
    }
}

impl Drop for ExclusiveSection {
    fn drop(&mut self) {
        OPEN_SECTIONS.with(|open| {
            let mut open = open.borrow_mut();
            if let Some(pos) = open.iter().rposition(|id| *id == self.store_id) {
                open.remove(pos);
            }
        });
    }
}

/// Panics if the current thread is inside an exclusive section of `store_id`.
pub fn assert_not_reentrant(store_id: usize) {
    let reentrant = OPEN_SECTIONS.with(|open| open.borrow().contains(&store_id));
    if reentrant {
        panic!(
            "re-entrant call into ExpiringStore from a for_each/remove_where callback; \
             defer the operation until the iteration returns"
        );
    }
}
