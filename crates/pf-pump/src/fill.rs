//! Price capture and sale cost for one fill.

use pf_core::{Real, Volume, as_liters};
use pf_reactive::{Cell, CellSink, DisposeBag, Stream};
use tracing::debug;

use crate::accumulate::{Accumulator, accumulate};
use crate::channel::{Channel, PerChannel};

/// Price in effect when the most recent fill started.
///
/// Each channel gets its own capture branch that reads that channel's price
/// at the start instant and passes only when the started channel matches.
/// Editing a price later never touches the captured value.
pub fn capture_price(
    start: &Stream<Channel>,
    prices: &PerChannel<Cell<Real>>,
    bag: &DisposeBag,
) -> Cell<Real> {
    let captured = CellSink::new(start.runtime(), 0.0);
    let branches: Vec<Stream<Real>> = prices
        .iter()
        .map(|(channel, price)| {
            start
                .gate(price, move |started, p| (*started == channel).then_some(*p))
                .filter_map(|p| *p)
        })
        .collect();
    let captured_price = Stream::merge_all(start.runtime(), &branches);
    captured_price.emit_into(&captured).disposed_by(bag);
    captured_price
        .listen(|p| debug!(price = *p, "price captured"))
        .disposed_by(bag);
    captured.cell()
}

/// State of the current (or last) fill.
pub struct Fill {
    pub price: Cell<Real>,
    pub liters_delivered: Cell<Volume>,
    /// `liters_delivered * price`.
    pub dollars_delivered: Cell<Real>,
}

impl Fill {
    pub fn new(
        clear: &Stream<()>,
        pulses: &Stream<u32>,
        calibration: &Cell<Volume>,
        prices: &PerChannel<Cell<Real>>,
        start: &Stream<Channel>,
        bag: &DisposeBag,
    ) -> Self {
        let price = capture_price(start, prices, bag);
        let Accumulator {
            liters_delivered, ..
        } = accumulate(clear, pulses, calibration);
        let dollars_delivered = liters_delivered.combine(&price, |q, p| as_liters(*q) * p);
        Self {
            price,
            liters_delivered,
            dollars_delivered,
        }
    }
}
