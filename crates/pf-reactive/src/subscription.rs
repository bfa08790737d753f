//! Scoped links between nodes.

use std::cell::RefCell;

use tracing::debug;

/// A live link in the graph. Dropping it disconnects the link.
#[must_use = "dropping a Subscription disconnects it immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription that holds nothing.
    pub fn empty() -> Self {
        Self { release: None }
    }

    /// Disconnect now.
    pub fn dispose(self) {}

    /// Hand ownership to `bag`; the link lives until the bag is disposed.
    pub fn disposed_by(self, bag: &DisposeBag) {
        bag.insert(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("live", &self.release.is_some())
            .finish()
    }
}

/// Owns the subscriptions of one component; disposes all of them on drop.
#[derive(Default)]
pub struct DisposeBag {
    subscriptions: RefCell<Vec<Subscription>>,
}

impl DisposeBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, subscription: Subscription) {
        self.subscriptions.borrow_mut().push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.borrow().is_empty()
    }

    /// Disconnect everything held so far. The bag stays usable.
    pub fn dispose(&self) {
        let taken = std::mem::take(&mut *self.subscriptions.borrow_mut());
        if !taken.is_empty() {
            debug!(count = taken.len(), "disposing subscriptions");
        }
        drop(taken);
    }
}

impl Drop for DisposeBag {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for DisposeBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposeBag")
            .field("subscriptions", &self.len())
            .finish()
    }
}
