//! Event and state primitives for pumpflow.
//!
//! The graph is built from two node kinds:
//! - [`Stream`]: discrete events with no current value and no replay
//! - [`Cell`]: a value that is always available and notifies on every write
//!
//! External producers push into a [`Sink`] (events) or a [`CellSink`]
//! (state). Everything else is derived with the combinators on those types:
//! `merge`, `filter`, `map`, `gate`, `scan`, `hold`, `emit_into`,
//! `combine`/`combine3`/[`combine_all`] and `drive`.
//!
//! # Propagation
//!
//! All propagation happens on one thread inside a [`Runtime`] transaction:
//! 1. Stream events are delivered depth-first, synchronously, in listener
//!    registration order. A cell written by `emit_into`/`hold`/`scan` takes
//!    its new value immediately, so a later `gate` in the same transaction
//!    reads the live value.
//! 2. Derived cells are only marked dirty while events propagate. At the end
//!    of the transaction they are settled in rank order; sampling a dirty
//!    cell earlier recomputes it on demand. The target of a `drive` link
//!    is brought up to date the same way when it is read.
//! 3. Observers run last, once per written cell, after everything settled.
//!    No observer can see a partially updated graph.
//!
//! # Lifetime
//!
//! Every link between nodes is a [`Subscription`]. Derived nodes own the
//! links to their inputs; terminal links (`emit_into`, `drive`, `observe`,
//! `listen`) are returned to the caller, usually into a [`DisposeBag`].
//! Dropping the bag disconnects the wiring it owns.

pub mod cell;
pub mod error;
pub mod fallible;
pub mod runtime;
pub mod stream;
pub mod subscription;

pub use cell::{Cell, CellSink, combine_all};
pub use error::{ReactiveError, ReactiveResult};
pub use fallible::{Fallible, FallibleSink};
pub use runtime::Runtime;
pub use stream::{Sink, Stream};
pub use subscription::{DisposeBag, Subscription};
