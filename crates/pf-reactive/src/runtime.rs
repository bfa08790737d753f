//! Single-threaded propagation runtime.
//!
//! A [`Runtime`] is shared by every node of one graph. It owns the
//! transaction state: the queue of dirty derived cells waiting to settle and
//! the queue of written cells waiting to notify their observers.

use std::cell::{Cell as StdCell, RefCell};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;

use pf_core::{IdAllocator, NodeId};
use tracing::{trace, warn};

/// Upper bound on settle and notify steps in one transaction.
///
/// Only reachable when `drive` links form a loop between cells.
pub const MAX_SETTLE_STEPS: usize = 1 << 16;

/// Work done while a transaction settles derived state.
pub(crate) trait Settle {
    fn settle(&self);

    /// Bring pending state up to date for a reader, ahead of settle order.
    fn pull(&self) {}

    /// Dropped from the queue without settling.
    fn abandon(&self) {}
}

/// Observer notification for a cell written during the transaction.
pub(crate) trait Notify {
    fn notify(&self);

    /// Dropped from the queue without notifying.
    fn abandon(&self) {}
}

/// Heap entry ordered by `(rank, seq)`, lowest first.
struct Scheduled<T: ?Sized> {
    rank: u32,
    seq: u64,
    task: Rc<T>,
}

impl<T: ?Sized> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank && self.seq == other.seq
    }
}

impl<T: ?Sized> Eq for Scheduled<T> {}

impl<T: ?Sized> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized> Ord for Scheduled<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the lowest rank pops first.
        (other.rank, other.seq).cmp(&(self.rank, self.seq))
    }
}

struct Inner {
    ids: RefCell<IdAllocator>,
    active: StdCell<bool>,
    seq: StdCell<u64>,
    dirty: RefCell<BinaryHeap<Scheduled<dyn Settle>>>,
    changed: RefCell<BinaryHeap<Scheduled<dyn Notify>>>,
    tx_count: StdCell<u64>,
}

/// Handle to the propagation context shared by one graph.
///
/// Cheap to clone. Not `Send`: a graph lives on the thread that built it.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<Inner>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("active", &self.inner.active.get())
            .field("transactions", &self.inner.tx_count.get())
            .finish()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Resets the runtime when a transaction ends, including by unwinding.
struct ActiveGuard<'a>(&'a Inner);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.active.set(false);
        if std::thread::panicking() {
            self.0.abandon_dirty();
            self.0.abandon_changed();
        }
    }
}

impl Inner {
    /// Empty the settle queue, releasing each task so a later write can
    /// schedule it again.
    fn abandon_dirty(&self) {
        let tasks = std::mem::take(&mut *self.dirty.borrow_mut());
        for scheduled in tasks {
            scheduled.task.abandon();
        }
    }

    fn abandon_changed(&self) {
        let tasks = std::mem::take(&mut *self.changed.borrow_mut());
        for scheduled in tasks {
            scheduled.task.abandon();
        }
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                ids: RefCell::new(IdAllocator::new()),
                active: StdCell::new(false),
                seq: StdCell::new(0),
                dirty: RefCell::new(BinaryHeap::new()),
                changed: RefCell::new(BinaryHeap::new()),
                tx_count: StdCell::new(0),
            }),
        }
    }

    /// Run `f` as one transaction.
    ///
    /// Every sink send and cell write inside `f` propagates immediately, but
    /// derived cells settle and observers run only once `f` returns. Nested
    /// calls join the enclosing transaction. Calls made from an observer
    /// callback join the flush that is running it.
    pub fn transaction<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.inner.active.get() {
            return f();
        }
        self.inner.active.set(true);
        let _guard = ActiveGuard(&self.inner);
        let result = f();
        self.flush();
        result
    }

    /// True while a transaction is propagating, settling or notifying.
    pub fn in_transaction(&self) -> bool {
        self.inner.active.get()
    }

    /// Number of top-level transactions completed so far.
    pub fn transaction_count(&self) -> u64 {
        self.inner.tx_count.get()
    }

    pub(crate) fn next_id(&self) -> NodeId {
        self.inner.ids.borrow_mut().next_id()
    }

    pub(crate) fn same_as(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn next_seq(&self) -> u64 {
        let seq = self.inner.seq.get();
        self.inner.seq.set(seq.wrapping_add(1));
        seq
    }

    pub(crate) fn schedule_settle(&self, rank: u32, task: Rc<dyn Settle>) {
        let seq = self.next_seq();
        self.inner
            .dirty
            .borrow_mut()
            .push(Scheduled { rank, seq, task });
    }

    pub(crate) fn schedule_notify(&self, rank: u32, task: Rc<dyn Notify>) {
        let seq = self.next_seq();
        self.inner
            .changed
            .borrow_mut()
            .push(Scheduled { rank, seq, task });
    }

    fn has_pending(&self) -> bool {
        !self.inner.dirty.borrow().is_empty() || !self.inner.changed.borrow().is_empty()
    }

    fn pop_dirty(&self) -> Option<Rc<dyn Settle>> {
        self.inner.dirty.borrow_mut().pop().map(|s| s.task)
    }

    fn pop_changed(&self) -> Option<Rc<dyn Notify>> {
        self.inner.changed.borrow_mut().pop().map(|s| s.task)
    }

    /// Settle all dirty state, then notify one written cell at a time.
    ///
    /// An observer may write or send again; whatever it dirties is settled
    /// before the next observer runs.
    fn flush(&self) {
        let mut settled = 0usize;
        let mut notified = 0usize;
        loop {
            if settled + notified >= MAX_SETTLE_STEPS && self.has_pending() {
                warn!(
                    limit = MAX_SETTLE_STEPS,
                    "settle limit reached; cells driven in a loop were left unsettled"
                );
                self.inner.abandon_dirty();
                self.inner.abandon_changed();
                break;
            }
            if let Some(task) = self.pop_dirty() {
                task.settle();
                settled += 1;
                continue;
            }
            match self.pop_changed() {
                Some(task) => {
                    task.notify();
                    notified += 1;
                }
                None => break,
            }
        }
        let tx = self.inner.tx_count.get() + 1;
        self.inner.tx_count.set(tx);
        trace!(tx, settled, notified, "transaction complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        label: u32,
        log: Rc<RefCell<Vec<u32>>>,
    }

    impl Settle for Recorder {
        fn settle(&self) {
            self.log.borrow_mut().push(self.label);
        }
    }

    #[test]
    fn settles_lowest_rank_first() {
        let rt = Runtime::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        rt.transaction(|| {
            for (rank, label) in [(3, 30), (1, 10), (2, 20), (1, 11)] {
                rt.schedule_settle(
                    rank,
                    Rc::new(Recorder {
                        label,
                        log: log.clone(),
                    }),
                );
            }
        });
        assert_eq!(*log.borrow(), vec![10, 11, 20, 30]);
    }

    #[test]
    fn nested_transactions_flush_once() {
        let rt = Runtime::new();
        rt.transaction(|| {
            rt.transaction(|| assert!(rt.in_transaction()));
            assert!(rt.in_transaction());
        });
        assert!(!rt.in_transaction());
        assert_eq!(rt.transaction_count(), 1);
    }

    #[test]
    fn transaction_returns_value() {
        let rt = Runtime::new();
        assert_eq!(rt.transaction(|| 7), 7);
    }
}
