//! Continuously available state cells.

use std::cell::{Cell as StdCell, RefCell};
use std::ops::Deref;
use std::rc::{Rc, Weak};

use pf_core::{ListenerId, NodeId};

use crate::runtime::{Notify, Runtime, Settle};
use crate::subscription::Subscription;

/// Something that must recompute when an input cell is written.
pub(crate) trait Dependent {
    fn invalidate(&self);
}

type Observer<A> = Rc<dyn Fn(&A)>;

pub(crate) struct CellNode<A> {
    rt: Runtime,
    id: NodeId,
    /// 0 for held cells, otherwise one more than the highest input.
    rank: u32,
    me: Weak<CellNode<A>>,
    value: RefCell<A>,
    compute: Option<Box<dyn Fn() -> A>>,
    /// Value is stale; sampling recomputes.
    dirty: StdCell<bool>,
    /// Waiting in the runtime's settle queue.
    scheduled: StdCell<bool>,
    notify_pending: StdCell<bool>,
    /// Drive links writing into this cell, copied in before it is read.
    feeders: RefCell<Vec<Weak<dyn Settle>>>,
    dependents: RefCell<Vec<(ListenerId, Weak<dyn Dependent>)>>,
    observers: RefCell<Vec<(ListenerId, Observer<A>)>>,
    upstream: RefCell<Vec<Subscription>>,
}

impl<A: Clone + 'static> CellNode<A> {
    fn build(rt: &Runtime, rank: u32, value: A, compute: Option<Box<dyn Fn() -> A>>) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            rt: rt.clone(),
            id: rt.next_id(),
            rank,
            me: me.clone(),
            value: RefCell::new(value),
            compute,
            dirty: StdCell::new(false),
            scheduled: StdCell::new(false),
            notify_pending: StdCell::new(false),
            feeders: RefCell::new(Vec::new()),
            dependents: RefCell::new(Vec::new()),
            observers: RefCell::new(Vec::new()),
            upstream: RefCell::new(Vec::new()),
        })
    }

    pub(crate) fn held(rt: &Runtime, value: A) -> Rc<Self> {
        Self::build(rt, 0, value, None)
    }

    fn derived(rt: &Runtime, rank: u32, compute: Box<dyn Fn() -> A>) -> Rc<Self> {
        let value = compute();
        Self::build(rt, rank, value, Some(compute))
    }

    /// Current value; a dirty derived cell recomputes first and a driven
    /// cell takes pending writes from its links.
    pub(crate) fn sample(&self) -> A {
        self.pull_feeders();
        if self.dirty.get() {
            self.recompute();
        }
        self.value.borrow().clone()
    }

    /// Store a new value. Every write notifies, equal or not.
    pub(crate) fn write(&self, value: A) {
        *self.value.borrow_mut() = value;
        self.mark_changed();
        self.invalidate_dependents();
    }

    fn recompute(&self) {
        self.dirty.set(false);
        if let Some(compute) = &self.compute {
            let value = compute();
            *self.value.borrow_mut() = value;
            self.mark_changed();
        }
    }

    fn pull_feeders(&self) {
        let feeders: Vec<Rc<dyn Settle>> = {
            let mut feeders = self.feeders.borrow_mut();
            if feeders.is_empty() {
                return;
            }
            feeders.retain(|f| f.strong_count() > 0);
            feeders.iter().filter_map(Weak::upgrade).collect()
        };
        for feeder in feeders {
            feeder.pull();
        }
    }

    fn mark_changed(&self) {
        if self.notify_pending.get() {
            return;
        }
        if let Some(me) = self.me.upgrade() {
            self.notify_pending.set(true);
            self.rt.schedule_notify(self.rank, me);
        }
    }

    fn invalidate_dependents(&self) {
        let dependents: Vec<Rc<dyn Dependent>> = {
            let mut deps = self.dependents.borrow_mut();
            deps.retain(|(_, d)| d.strong_count() > 0);
            deps.iter().filter_map(|(_, d)| d.upgrade()).collect()
        };
        for dep in dependents {
            dep.invalidate();
        }
    }

    pub(crate) fn add_dependent(self: &Rc<Self>, dep: Weak<dyn Dependent>) -> Subscription {
        let id = self.rt.next_id();
        self.dependents.borrow_mut().push((id, dep));
        let node = self.clone();
        Subscription::new(move || {
            let removed = {
                let mut deps = node.dependents.borrow_mut();
                deps.iter()
                    .position(|(d, _)| *d == id)
                    .map(|pos| deps.remove(pos))
            };
            drop(removed);
        })
    }

    fn add_observer(self: &Rc<Self>, f: Observer<A>) -> Subscription {
        let id = self.rt.next_id();
        self.observers.borrow_mut().push((id, f));
        let node = self.clone();
        Subscription::new(move || {
            let removed = {
                let mut observers = node.observers.borrow_mut();
                observers
                    .iter()
                    .position(|(o, _)| *o == id)
                    .map(|pos| observers.remove(pos))
            };
            drop(removed);
        })
    }

    pub(crate) fn own(&self, sub: Subscription) {
        self.upstream.borrow_mut().push(sub);
    }
}

impl<A: Clone + 'static> Dependent for CellNode<A> {
    fn invalidate(&self) {
        if self.compute.is_none() || (self.dirty.get() && self.scheduled.get()) {
            return;
        }
        self.dirty.set(true);
        if !self.scheduled.get() {
            if let Some(me) = self.me.upgrade() {
                self.scheduled.set(true);
                self.rt.schedule_settle(self.rank, me);
            }
        }
        self.invalidate_dependents();
    }
}

impl<A: Clone + 'static> Settle for CellNode<A> {
    fn settle(&self) {
        self.scheduled.set(false);
        if self.dirty.get() {
            self.recompute();
        }
    }

    // Still dirty, so the next sample recomputes and the next write
    // schedules it again.
    fn abandon(&self) {
        self.scheduled.set(false);
    }
}

impl<A: Clone + 'static> Notify for CellNode<A> {
    fn notify(&self) {
        self.notify_pending.set(false);
        let observers: Vec<Observer<A>> = self
            .observers
            .borrow()
            .iter()
            .map(|(_, o)| o.clone())
            .collect();
        if observers.is_empty() {
            return;
        }
        let value = self.sample();
        for observer in observers {
            observer(&value);
        }
    }

    fn abandon(&self) {
        self.notify_pending.set(false);
    }
}

/// Input edge of a derived cell.
trait Upstream {
    fn rank(&self) -> u32;
    fn add_dependent(&self, dep: Weak<dyn Dependent>) -> Subscription;
}

impl<A: Clone + 'static> Upstream for Cell<A> {
    fn rank(&self) -> u32 {
        self.node.rank
    }

    fn add_dependent(&self, dep: Weak<dyn Dependent>) -> Subscription {
        self.node.add_dependent(dep)
    }
}

fn derive<B: Clone + 'static>(
    rt: &Runtime,
    inputs: &[&dyn Upstream],
    compute: impl Fn() -> B + 'static,
) -> Cell<B> {
    let rank = inputs
        .iter()
        .map(|i| i.rank())
        .max()
        .unwrap_or(0)
        .saturating_add(1);
    let node = CellNode::derived(rt, rank, Box::new(compute));
    let weak: Weak<dyn Dependent> = Rc::downgrade(&node) as Weak<dyn Dependent>;
    for input in inputs {
        node.own(input.add_dependent(weak.clone()));
    }
    Cell { node }
}

/// A value that changes over time and is always available.
pub struct Cell<A> {
    pub(crate) node: Rc<CellNode<A>>,
}

impl<A> Clone for Cell<A> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<A: std::fmt::Debug> std::fmt::Debug for Cell<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.node.id)
            .field("rank", &self.node.rank)
            .field("value", &*self.node.value.borrow())
            .finish()
    }
}

impl<A: Clone + 'static> Cell<A> {
    /// A cell that never changes.
    pub fn constant(rt: &Runtime, value: A) -> Self {
        Self {
            node: CellNode::held(rt, value),
        }
    }

    pub fn sample(&self) -> A {
        self.node.sample()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.node.rt
    }

    /// Depth in the dependency graph; held cells are 0.
    pub fn rank(&self) -> u32 {
        self.node.rank
    }

    pub fn map<B: Clone + 'static>(&self, f: impl Fn(&A) -> B + 'static) -> Cell<B> {
        let a = self.clone();
        derive(&self.node.rt, &[self], move || f(&a.sample()))
    }

    /// Recomputes whenever either input is written, from both latest values.
    pub fn combine<B, C>(&self, other: &Cell<B>, f: impl Fn(&A, &B) -> C + 'static) -> Cell<C>
    where
        B: Clone + 'static,
        C: Clone + 'static,
    {
        debug_assert!(other.runtime().same_as(&self.node.rt), "combine across runtimes");
        let (a, b) = (self.clone(), other.clone());
        derive(&self.node.rt, &[self, other], move || f(&a.sample(), &b.sample()))
    }

    pub fn combine3<B, C, D>(
        &self,
        second: &Cell<B>,
        third: &Cell<C>,
        f: impl Fn(&A, &B, &C) -> D + 'static,
    ) -> Cell<D>
    where
        B: Clone + 'static,
        C: Clone + 'static,
        D: Clone + 'static,
    {
        debug_assert!(second.runtime().same_as(&self.node.rt), "combine across runtimes");
        debug_assert!(third.runtime().same_as(&self.node.rt), "combine across runtimes");
        let (a, b, c) = (self.clone(), second.clone(), third.clone());
        derive(&self.node.rt, &[self, second, third], move || {
            f(&a.sample(), &b.sample(), &c.sample())
        })
    }

    /// Call `f` with the current value now, then after every transaction
    /// that writes this cell.
    pub fn observe(&self, f: impl Fn(&A) + 'static) -> Subscription {
        let f: Observer<A> = Rc::new(f);
        f(&self.sample());
        self.node.add_observer(f)
    }

    /// Keep `target` equal to this cell.
    ///
    /// `target` is written now and whenever this cell settles to a new
    /// value, before any observer runs. Sampling `target` inside a
    /// transaction sees the source's current value.
    pub fn drive(&self, target: &CellSink<A>) -> Subscription {
        debug_assert!(target.runtime().same_as(&self.node.rt), "drive across runtimes");
        let link = Rc::new_cyclic(|me| DriveLink {
            rank: self.node.rank.saturating_add(1),
            me: me.clone(),
            source: self.clone(),
            target: target.node.clone(),
            dirty: StdCell::new(false),
            scheduled: StdCell::new(false),
        });
        let target_node = target.node.clone();
        self.node
            .rt
            .transaction(|| target_node.write(self.sample()));
        let feeder: Weak<dyn Settle> = Rc::downgrade(&link) as Weak<dyn Settle>;
        target_node.feeders.borrow_mut().push(feeder);
        let weak: Weak<dyn Dependent> = Rc::downgrade(&link) as Weak<dyn Dependent>;
        let edge = self.node.add_dependent(weak);
        Subscription::new(move || {
            drop(edge);
            drop(link);
        })
    }
}

/// Combine any number of same-typed cells.
pub fn combine_all<A, B>(
    rt: &Runtime,
    cells: &[Cell<A>],
    f: impl Fn(&[A]) -> B + 'static,
) -> Cell<B>
where
    A: Clone + 'static,
    B: Clone + 'static,
{
    let inputs: Vec<&dyn Upstream> = cells.iter().map(|c| c as &dyn Upstream).collect();
    let cells = cells.to_vec();
    derive(rt, &inputs, move || {
        let values: Vec<A> = cells.iter().map(Cell::sample).collect();
        f(&values)
    })
}

/// Link written by [`Cell::drive`]; copies source into target while settling.
struct DriveLink<A> {
    rank: u32,
    me: Weak<DriveLink<A>>,
    source: Cell<A>,
    target: Rc<CellNode<A>>,
    dirty: StdCell<bool>,
    scheduled: StdCell<bool>,
}

impl<A: Clone + 'static> Dependent for DriveLink<A> {
    fn invalidate(&self) {
        if self.dirty.get() && self.scheduled.get() {
            return;
        }
        self.dirty.set(true);
        if !self.scheduled.get() {
            if let Some(me) = self.me.upgrade() {
                self.scheduled.set(true);
                self.source.node.rt.schedule_settle(self.rank, me);
            }
        }
        // Readers of the target pull the new value through this link.
        self.target.invalidate_dependents();
    }
}

impl<A: Clone + 'static> Settle for DriveLink<A> {
    fn settle(&self) {
        self.scheduled.set(false);
        self.pull();
    }

    fn pull(&self) {
        if self.dirty.get() {
            self.dirty.set(false);
            self.target.write(self.source.sample());
        }
    }

    fn abandon(&self) {
        self.scheduled.set(false);
    }
}

/// A cell written from outside the graph, or by `emit_into`.
pub struct CellSink<A> {
    cell: Cell<A>,
}

impl<A> Clone for CellSink<A> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<A: std::fmt::Debug> std::fmt::Debug for CellSink<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CellSink").field(&self.cell).finish()
    }
}

impl<A> Deref for CellSink<A> {
    type Target = Cell<A>;

    fn deref(&self) -> &Cell<A> {
        &self.cell
    }
}

impl<A: Clone + 'static> CellSink<A> {
    pub fn new(rt: &Runtime, initial: A) -> Self {
        Self {
            cell: Cell {
                node: CellNode::held(rt, initial),
            },
        }
    }

    /// Write a new value and propagate it.
    ///
    /// Outside a transaction this is a transaction of its own.
    pub fn set(&self, value: A) {
        let node = &self.cell.node;
        node.rt.transaction(|| node.write(value));
    }

    /// Read-only view.
    pub fn cell(&self) -> Cell<A> {
        self.cell.clone()
    }
}
