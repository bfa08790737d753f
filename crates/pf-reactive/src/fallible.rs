//! Streams whose producer can fail.
//!
//! A [`Fallible`] stream cannot be held, scanned or emitted into a cell.
//! It only joins the rest of the graph through a fallback (`or_empty`,
//! `or_value`), so a failing producer degrades its own branch and nothing
//! else.

use std::cell::Cell as StdCell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::ReactiveError;
use crate::runtime::Runtime;
use crate::stream::{Stream, StreamNode};

type Item<A> = Result<A, ReactiveError>;

/// Producer side of a [`Fallible`] stream.
pub struct FallibleSink<A> {
    node: Rc<StreamNode<Item<A>>>,
    failed: Rc<StdCell<bool>>,
}

impl<A> Clone for FallibleSink<A> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            failed: self.failed.clone(),
        }
    }
}

impl<A> std::fmt::Debug for FallibleSink<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallibleSink")
            .field("failed", &self.failed.get())
            .finish()
    }
}

impl<A: Clone + 'static> FallibleSink<A> {
    pub fn new(rt: &Runtime) -> Self {
        Self {
            node: StreamNode::new(rt),
            failed: Rc::new(StdCell::new(false)),
        }
    }

    /// Send a value. Ignored once the producer has failed.
    pub fn send(&self, a: A) {
        if self.failed.get() {
            debug!("dropping event from terminated producer");
            return;
        }
        let node = &self.node;
        node.rt.transaction(|| node.fire(&Ok(a)));
    }

    /// Terminate the producer with `error`. Only the first failure is delivered.
    pub fn fail(&self, error: ReactiveError) {
        if self.failed.replace(true) {
            return;
        }
        warn!(%error, "producer failed");
        let node = &self.node;
        node.rt.transaction(|| node.fire(&Err(error)));
    }

    pub fn is_terminated(&self) -> bool {
        self.failed.get()
    }

    pub fn stream(&self) -> Fallible<A> {
        Fallible {
            node: self.node.clone(),
        }
    }
}

/// A stream that may end with an error.
pub struct Fallible<A> {
    node: Rc<StreamNode<Item<A>>>,
}

impl<A> Clone for Fallible<A> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<A: Clone + 'static> Fallible<A> {
    pub fn listener_count(&self) -> usize {
        self.node.listener_count()
    }

    /// Map successful values; an error passes through and terminates.
    pub fn map<B: Clone + 'static>(&self, f: impl Fn(&A) -> B + 'static) -> Fallible<B> {
        let child: Rc<StreamNode<Item<B>>> = StreamNode::new(&self.node.rt);
        let weak = Rc::downgrade(&child);
        let done = StdCell::new(false);
        let link = self.node.listen(move |item| {
            if done.get() {
                return;
            }
            let Some(out) = weak.upgrade() else { return };
            match item {
                Ok(a) => out.fire(&Ok(f(a))),
                Err(e) => {
                    done.set(true);
                    out.fire(&Err(e.clone()));
                }
            }
        });
        child.own(link);
        Fallible { node: child }
    }

    /// On error, end quietly.
    pub fn or_empty(&self) -> Stream<A> {
        self.recover(None)
    }

    /// On error, emit `fallback` once, then end.
    pub fn or_value(&self, fallback: A) -> Stream<A> {
        self.recover(Some(fallback))
    }

    fn recover(&self, fallback: Option<A>) -> Stream<A> {
        let child: Rc<StreamNode<A>> = StreamNode::new(&self.node.rt);
        let weak = Rc::downgrade(&child);
        let done = StdCell::new(false);
        let link = self.node.listen(move |item| {
            if done.get() {
                return;
            }
            let Some(out) = weak.upgrade() else { return };
            match item {
                Ok(a) => out.fire(a),
                Err(error) => {
                    done.set(true);
                    debug!(%error, substituted = fallback.is_some(), "fallback applied");
                    if let Some(v) = &fallback {
                        out.fire(v);
                    }
                }
            }
        });
        child.own(link);
        Stream { node: child }
    }
}
