//! Fuel pump propagation graph.
//!
//! Builds the pump's reactive wiring on top of `pf-reactive`:
//! - [`lifecycle`]: which of the three nozzles is filling
//! - [`accumulate`]: delivered volume from metered pulses
//! - [`fill`]: price captured at fill start, and sale cost
//! - [`display`]: formatted LCD strings and delivery mode
//! - [`pump`]: the two assembled pump variants
//! - [`driver`]: host-side event dispatch, cross-thread queue and pulse ticker
//!
//! Rendering, widgets and timers live outside this crate; they only send
//! [`PumpEvent`]s in and read the [`Outputs`] cells.

pub mod accumulate;
pub mod channel;
pub mod display;
pub mod driver;
pub mod error;
pub mod fill;
pub mod io;
pub mod lifecycle;
pub mod pump;

pub use accumulate::{Accumulator, Tally, accumulate};
pub use channel::{Channel, Delivery, Key, NozzleState, PerChannel};
pub use display::{
    DisplaySnapshot, InactivePriceStyle, format_price, format_sale_cost, format_sale_quantity,
};
pub use driver::{EventQueue, EventSender, PulseTicker, PumpEvent, PumpStation};
pub use error::{PumpError, PumpResult};
pub use fill::{Fill, capture_price};
pub use io::{InputSinks, Inputs, Outputs, PumpParams, Sale};
pub use lifecycle::{FillEnded, LifeCycle};
pub use pump::{AccumulatePulsesPump, Pump, PumpVariant, ShowDollarsPump};
