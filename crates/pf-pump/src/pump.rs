//! The assembled pump variants.
//!
//! A pump is pure wiring: it reads [`Inputs`], registers every terminal link
//! in the caller's [`DisposeBag`] and returns the [`Outputs`] cells. Output
//! cells are driven copies of the internal state, so once the bag is
//! disposed they keep their last value and nothing changes them again.

use pf_reactive::{Cell, CellSink, DisposeBag};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::accumulate::accumulate;
use crate::display::{
    InactivePriceStyle, delivery_for, format_sale_cost, format_sale_quantity, price_lcd,
};
use crate::fill::Fill;
use crate::io::{Inputs, Outputs};
use crate::lifecycle::LifeCycle;

pub trait Pump {
    fn create(&self, inputs: &Inputs, bag: &DisposeBag) -> Outputs;
}

/// Copy `cell` into an output cell owned by `bag`.
fn output<A: Clone + 'static>(cell: &Cell<A>, bag: &DisposeBag) -> Cell<A> {
    let out = CellSink::new(cell.runtime(), cell.sample());
    cell.drive(&out).disposed_by(bag);
    out.cell()
}

/// Full pump: delivery mode, quantity, cost and the three price LCDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShowDollarsPump {
    pub inactive_price: InactivePriceStyle,
}

impl Pump for ShowDollarsPump {
    fn create(&self, inputs: &Inputs, bag: &DisposeBag) -> Outputs {
        let lc = LifeCycle::new(&inputs.nozzles, bag);
        let clear = lc.start.map(|_| ());
        let fill = Fill::new(
            &clear,
            &inputs.fuel_pulses,
            &inputs.calibration,
            &inputs.prices,
            &lc.start,
            bag,
        );

        let delivery = lc.fill_active.map(|active| delivery_for(*active));
        let quantity = fill.liters_delivered.map(|q| format_sale_quantity(*q));
        let cost = fill.dollars_delivered.map(|c| format_sale_cost(*c));
        let style = self.inactive_price;
        let price_lcds = inputs
            .prices
            .map(|ch, idle| output(&price_lcd(&lc.fill_active, &fill.price, idle, ch, style), bag));

        debug!(?style, "show-dollars pump wired");
        Outputs {
            delivery: output(&delivery, bag),
            sale_cost_lcd: output(&cost, bag),
            sale_quantity_lcd: output(&quantity, bag),
            price_lcd: price_lcds,
            ..Outputs::idle(inputs.runtime())
        }
    }
}

/// Accumulate-only pump: delivery mode and quantity, no pricing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccumulatePulsesPump;

impl Pump for AccumulatePulsesPump {
    fn create(&self, inputs: &Inputs, bag: &DisposeBag) -> Outputs {
        let lc = LifeCycle::new(&inputs.nozzles, bag);
        let acc = accumulate(&lc.start.map(|_| ()), &inputs.fuel_pulses, &inputs.calibration);

        let delivery = lc.fill_active.map(|active| delivery_for(*active));
        let quantity = acc.liters_delivered.map(|q| format_sale_quantity(*q));

        debug!("accumulate-pulses pump wired");
        Outputs {
            delivery: output(&delivery, bag),
            sale_quantity_lcd: output(&quantity, bag),
            ..Outputs::idle(inputs.runtime())
        }
    }
}

/// Pump variant selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpVariant {
    #[default]
    ShowDollars,
    AccumulatePulses,
}

impl PumpVariant {
    pub fn pump(self, inactive_price: InactivePriceStyle) -> Box<dyn Pump> {
        match self {
            PumpVariant::ShowDollars => Box::new(ShowDollarsPump { inactive_price }),
            PumpVariant::AccumulatePulses => Box::new(AccumulatePulsesPump),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, Delivery, NozzleState};
    use crate::io::{InputSinks, PumpParams};
    use pf_reactive::Runtime;

    fn wire(pump: &dyn Pump) -> (InputSinks, Outputs, DisposeBag) {
        let rt = Runtime::new();
        let sinks = InputSinks::new(&rt, &PumpParams::default());
        let bag = DisposeBag::new();
        let outputs = pump.create(&sinks.inputs(), &bag);
        (sinks, outputs, bag)
    }

    #[test]
    fn show_dollars_starts_idle() {
        let (_sinks, outputs, _bag) = wire(&ShowDollarsPump::default());
        let snap = outputs.snapshot();
        assert_eq!(snap.delivery, Delivery::Off);
        assert_eq!(snap.quantity, "0.00");
        assert_eq!(snap.cost, "0.00");
        assert_eq!(snap.prices.one, "1.00");
        assert_eq!(snap.prices.two, "2.00");
        assert_eq!(snap.prices.three, "3.00");
        assert_eq!(snap.preset, "");
    }

    #[test]
    fn accumulate_only_leaves_pricing_blank() {
        let (sinks, outputs, _bag) = wire(&AccumulatePulsesPump);
        sinks.nozzle(Channel::Three, NozzleState::Up);
        sinks.pulses(7);
        let snap = outputs.snapshot();
        assert_eq!(snap.delivery, Delivery::Fast3);
        assert_eq!(snap.quantity, "7.00");
        assert_eq!(snap.cost, "");
        assert_eq!(snap.prices.three, "");
    }

    #[test]
    fn variant_builds_matching_pump() {
        let (sinks, outputs, _bag) =
            wire(PumpVariant::AccumulatePulses.pump(InactivePriceStyle::default()).as_ref());
        sinks.nozzle(Channel::One, NozzleState::Up);
        assert_eq!(outputs.sale_cost_lcd.sample(), "");
        assert_eq!(outputs.delivery.sample(), Delivery::Fast1);
    }
}
