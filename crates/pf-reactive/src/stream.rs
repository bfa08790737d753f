//! Discrete event streams.

use std::cell::RefCell;
use std::rc::Rc;

use pf_core::{ListenerId, NodeId};

use crate::cell::{Cell, CellNode, CellSink};
use crate::runtime::Runtime;
use crate::subscription::Subscription;

type Listener<A> = Rc<dyn Fn(&A)>;

pub(crate) struct StreamNode<A> {
    pub(crate) rt: Runtime,
    id: NodeId,
    listeners: RefCell<Vec<(ListenerId, Listener<A>)>>,
    upstream: RefCell<Vec<Subscription>>,
}

impl<A: 'static> StreamNode<A> {
    pub(crate) fn new(rt: &Runtime) -> Rc<Self> {
        Rc::new(Self {
            rt: rt.clone(),
            id: rt.next_id(),
            listeners: RefCell::new(Vec::new()),
            upstream: RefCell::new(Vec::new()),
        })
    }

    /// Deliver `a` to every listener, in registration order.
    ///
    /// The listener list is copied first so listeners may subscribe or
    /// unsubscribe while the event is delivered.
    pub(crate) fn fire(&self, a: &A) {
        let listeners: Vec<Listener<A>> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(a);
        }
    }

    pub(crate) fn listen(self: &Rc<Self>, f: impl Fn(&A) + 'static) -> Subscription {
        let id = self.rt.next_id();
        self.listeners.borrow_mut().push((id, Rc::new(f)));
        let node = self.clone();
        Subscription::new(move || node.remove_listener(id))
    }

    fn remove_listener(&self, id: ListenerId) {
        let removed = {
            let mut listeners = self.listeners.borrow_mut();
            listeners
                .iter()
                .position(|(l, _)| *l == id)
                .map(|pos| listeners.remove(pos))
        };
        // Dropped outside the borrow: the listener may own other links.
        drop(removed);
    }

    /// Keep `sub` alive for as long as this node lives.
    pub(crate) fn own(&self, sub: Subscription) {
        self.upstream.borrow_mut().push(sub);
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

/// A stream of discrete events.
///
/// Events are not stored: a listener added later never sees earlier events.
pub struct Stream<A> {
    pub(crate) node: Rc<StreamNode<A>>,
}

impl<A> Clone for Stream<A> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<A> std::fmt::Debug for Stream<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream").field("id", &self.node.id).finish()
    }
}

impl<A: Clone + 'static> Stream<A> {
    /// A stream that never fires.
    pub fn never(rt: &Runtime) -> Self {
        Self {
            node: StreamNode::new(rt),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.node.rt
    }

    /// Number of links currently attached downstream.
    pub fn listener_count(&self) -> usize {
        self.node.listener_count()
    }

    /// New stream fed by this one; the child owns the link to its parent.
    fn derive<B: 'static>(&self, on_event: impl Fn(&StreamNode<B>, &A) + 'static) -> Stream<B> {
        let child = StreamNode::new(&self.node.rt);
        let weak = Rc::downgrade(&child);
        let link = self.node.listen(move |a| {
            if let Some(out) = weak.upgrade() {
                on_event(&out, a);
            }
        });
        child.own(link);
        Stream { node: child }
    }

    pub fn map<B: Clone + 'static>(&self, f: impl Fn(&A) -> B + 'static) -> Stream<B> {
        self.derive(move |out, a| out.fire(&f(a)))
    }

    /// Drop events failing `predicate`.
    pub fn filter(&self, predicate: impl Fn(&A) -> bool + 'static) -> Stream<A> {
        self.derive(move |out, a| {
            if predicate(a) {
                out.fire(a);
            }
        })
    }

    pub fn filter_map<B: Clone + 'static>(
        &self,
        f: impl Fn(&A) -> Option<B> + 'static,
    ) -> Stream<B> {
        self.derive(move |out, a| {
            if let Some(b) = f(a) {
                out.fire(&b);
            }
        })
    }

    pub fn merge(&self, other: &Stream<A>) -> Stream<A> {
        Self::merge_all(&self.node.rt, [self, other])
    }

    /// Fires whenever any input fires, with that input's payload.
    ///
    /// Each input event is delivered separately. Inputs are attached in the
    /// order given, so inputs driven by the same upstream event fire in that
    /// order.
    pub fn merge_all<'a>(rt: &Runtime, streams: impl IntoIterator<Item = &'a Stream<A>>) -> Self {
        let child = StreamNode::new(rt);
        for stream in streams {
            debug_assert!(stream.node.rt.same_as(rt), "merge across runtimes");
            let weak = Rc::downgrade(&child);
            let link = stream.node.listen(move |a| {
                if let Some(out) = weak.upgrade() {
                    out.fire(a);
                }
            });
            child.own(link);
        }
        Stream { node: child }
    }

    /// On each event, read `cell` as it is at that instant and combine.
    ///
    /// Writes to `cell` never make the result fire.
    pub fn gate<B, C>(&self, cell: &Cell<B>, f: impl Fn(&A, &B) -> C + 'static) -> Stream<C>
    where
        B: Clone + 'static,
        C: Clone + 'static,
    {
        debug_assert!(cell.runtime().same_as(&self.node.rt), "gate across runtimes");
        let cell = cell.clone();
        self.derive(move |out, a| {
            let b = cell.sample();
            out.fire(&f(a, &b));
        })
    }

    /// A cell holding the most recent event, `initial` before the first one.
    pub fn hold(&self, initial: A) -> Cell<A> {
        let target = CellNode::held(&self.node.rt, initial);
        let weak = Rc::downgrade(&target);
        let link = self.node.listen(move |a| {
            if let Some(cell) = weak.upgrade() {
                cell.write(a.clone());
            }
        });
        target.own(link);
        Cell { node: target }
    }

    /// Running fold: each event replaces the state with `f(state, event)`.
    ///
    /// The fold reads its own latest value when an event arrives, so several
    /// events in one transaction accumulate instead of overwriting each other.
    pub fn scan<S: Clone + 'static>(&self, seed: S, f: impl Fn(&S, &A) -> S + 'static) -> Cell<S> {
        let state = CellNode::held(&self.node.rt, seed);
        let weak = Rc::downgrade(&state);
        let link = self.node.listen(move |a| {
            if let Some(cell) = weak.upgrade() {
                let next = f(&cell.sample(), a);
                cell.write(next);
            }
        });
        state.own(link);
        Cell { node: state }
    }

    /// Overwrite `target` with every event.
    pub fn emit_into(&self, target: &CellSink<A>) -> Subscription {
        debug_assert!(target.runtime().same_as(&self.node.rt), "emit_into across runtimes");
        let target = target.node.clone();
        self.node.listen(move |a| target.write(a.clone()))
    }

    /// Run `f` for every event.
    pub fn listen(&self, f: impl Fn(&A) + 'static) -> Subscription {
        self.node.listen(f)
    }
}

/// Entry point for events produced outside the graph.
pub struct Sink<A> {
    node: Rc<StreamNode<A>>,
}

impl<A> Clone for Sink<A> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<A> std::fmt::Debug for Sink<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink").field("id", &self.node.id).finish()
    }
}

impl<A: Clone + 'static> Sink<A> {
    pub fn new(rt: &Runtime) -> Self {
        Self {
            node: StreamNode::new(rt),
        }
    }

    /// Fire `a` and propagate it through the graph.
    ///
    /// Outside a transaction this is a transaction of its own.
    pub fn send(&self, a: A) {
        let node = &self.node;
        node.rt.transaction(|| node.fire(&a));
    }

    /// Send each item, one transaction per item.
    pub fn feed(&self, items: impl IntoIterator<Item = A>) {
        for a in items {
            self.send(a);
        }
    }

    pub fn stream(&self) -> Stream<A> {
        Stream {
            node: self.node.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect<A: Clone + 'static>(stream: &Stream<A>) -> (Rc<RefCell<Vec<A>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let sub = stream.listen(move |a| s.borrow_mut().push(a.clone()));
        (seen, sub)
    }

    #[test]
    fn map_and_filter() {
        let rt = Runtime::new();
        let sink = Sink::new(&rt);
        let evens = sink.stream().filter(|x: &i32| x % 2 == 0).map(|x| x * 10);
        let (seen, _sub) = collect(&evens);

        sink.feed([1, 2, 3, 4]);
        assert_eq!(*seen.borrow(), vec![20, 40]);
    }

    #[test]
    fn merge_keeps_each_event() {
        let rt = Runtime::new();
        let a = Sink::new(&rt);
        let b = Sink::new(&rt);
        let merged = a.stream().merge(&b.stream());
        let (seen, _sub) = collect(&merged);

        rt.transaction(|| {
            b.send(2);
            a.send(1);
        });
        assert_eq!(*seen.borrow(), vec![2, 1]);
    }

    #[test]
    fn merge_of_shared_source_follows_argument_order() {
        let rt = Runtime::new();
        let sink = Sink::new(&rt);
        let left = sink.stream().map(|x: &i32| x + 100);
        let right = sink.stream().map(|x: &i32| x + 200);
        let merged = Stream::merge_all(&rt, [&left, &right]);
        let (seen, _sub) = collect(&merged);

        sink.send(1);
        assert_eq!(*seen.borrow(), vec![101, 201]);
    }

    #[test]
    fn no_replay_for_late_listeners() {
        let rt = Runtime::new();
        let sink = Sink::new(&rt);
        sink.send(1);
        let (seen, _sub) = collect(&sink.stream());
        sink.send(2);
        assert_eq!(*seen.borrow(), vec![2]);
    }

    #[test]
    fn gate_reads_live_value() {
        let rt = Runtime::new();
        let trigger = Sink::new(&rt);
        let level = CellSink::new(&rt, 1);
        let gated = trigger.stream().gate(&level, |t: &i32, l: &i32| t * l);
        let (seen, _sub) = collect(&gated);

        trigger.send(5);
        level.set(3);
        trigger.send(5);
        assert_eq!(*seen.borrow(), vec![5, 15]);
    }

    #[test]
    fn gate_does_not_fire_on_cell_writes() {
        let rt = Runtime::new();
        let trigger: Sink<()> = Sink::new(&rt);
        let level = CellSink::new(&rt, 1);
        let gated = trigger.stream().gate(&level, |_, l: &i32| *l);
        let (seen, _sub) = collect(&gated);

        level.set(2);
        level.set(3);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn scan_accumulates_within_one_transaction() {
        let rt = Runtime::new();
        let sink = Sink::new(&rt);
        let total = sink.stream().scan(0, |acc: &i32, x: &i32| acc + x);

        rt.transaction(|| {
            sink.send(2);
            sink.send(3);
        });
        sink.send(5);
        assert_eq!(total.sample(), 10);
    }

    #[test]
    fn hold_keeps_latest() {
        let rt = Runtime::new();
        let sink = Sink::new(&rt);
        let latest = sink.stream().hold("none".to_string());
        assert_eq!(latest.sample(), "none");
        sink.send("a".to_string());
        sink.send("b".to_string());
        assert_eq!(latest.sample(), "b");
    }

    #[test]
    fn dropping_derived_stream_detaches_it() {
        let rt = Runtime::new();
        let sink: Sink<i32> = Sink::new(&rt);
        let mapped = sink.stream().map(|x| x + 1);
        assert_eq!(sink.stream().listener_count(), 1);
        drop(mapped);
        assert_eq!(sink.stream().listener_count(), 0);
    }

    #[test]
    fn never_stays_silent() {
        let rt = Runtime::new();
        let never: Stream<i32> = Stream::never(&rt);
        let (seen, _sub) = collect(&never);
        assert!(seen.borrow().is_empty());
    }
}
