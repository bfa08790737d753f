//! Input and output contract between the pump graph and its host.

use pf_core::{Real, Volume, as_liters, ensure_positive, liters};
use pf_reactive::{Cell, CellSink, FallibleSink, ReactiveError, Runtime, Sink, Stream};

use crate::channel::{Channel, Delivery, Key, NozzleState, PerChannel};
use crate::display::DisplaySnapshot;
use crate::error::PumpResult;

/// Initial calibration and price table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpParams {
    /// Volume per metered pulse.
    pub calibration: Volume,
    /// Price per litre, per channel.
    pub prices: PerChannel<Real>,
}

impl PumpParams {
    pub fn new(calibration_l_per_pulse: Real, prices: PerChannel<Real>) -> PumpResult<Self> {
        let calibration = ensure_positive(calibration_l_per_pulse, "calibration")?;
        for (_, price) in prices.iter() {
            ensure_positive(*price, "price")?;
        }
        Ok(Self {
            calibration: liters(calibration),
            prices,
        })
    }

    pub fn calibration_l_per_pulse(&self) -> Real {
        as_liters(self.calibration)
    }
}

impl Default for PumpParams {
    fn default() -> Self {
        Self {
            calibration: liters(1.0),
            prices: PerChannel::new(1.0, 2.0, 3.0),
        }
    }
}

/// Producer handles for every pump input.
///
/// The host owns these and pushes hardware and keypad events into them.
#[derive(Debug, Clone)]
pub struct InputSinks {
    rt: Runtime,
    pub nozzles: PerChannel<Sink<NozzleState>>,
    pub key_pad: Sink<Key>,
    /// The flow meter; it may report a fault, after which no pulse arrives.
    pub fuel_pulses: FallibleSink<u32>,
    pub calibration: CellSink<Volume>,
    pub prices: PerChannel<CellSink<Real>>,
    pub clear_sale: Sink<()>,
}

impl InputSinks {
    pub fn new(rt: &Runtime, params: &PumpParams) -> Self {
        Self {
            rt: rt.clone(),
            nozzles: PerChannel::from_fn(|_| Sink::new(rt)),
            key_pad: Sink::new(rt),
            fuel_pulses: FallibleSink::new(rt),
            calibration: CellSink::new(rt, params.calibration),
            prices: params.prices.map(|_, p| CellSink::new(rt, *p)),
            clear_sale: Sink::new(rt),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.rt
    }

    /// Consumer-side view handed to a [`Pump`](crate::Pump).
    pub fn inputs(&self) -> Inputs {
        Inputs {
            nozzles: self.nozzles.map(|_, s| s.stream()),
            key_pad: self.key_pad.stream(),
            fuel_pulses: self.fuel_pulses.stream().or_empty(),
            calibration: self.calibration.cell(),
            prices: self.prices.map(|_, c| c.cell()),
            clear_sale: self.clear_sale.stream(),
        }
    }

    pub fn nozzle(&self, channel: Channel, state: NozzleState) {
        self.nozzles.get(channel).send(state);
    }

    pub fn pulses(&self, count: u32) {
        self.fuel_pulses.send(count);
    }

    /// Terminate the meter feed. Pulses are ignored from then on; the rest of
    /// the pump keeps working.
    pub fn meter_fault(&self, what: &str) {
        self.fuel_pulses.fail(ReactiveError::producer("fuel meter", what));
    }

    pub fn set_price(&self, channel: Channel, price: Real) -> PumpResult<()> {
        let price = ensure_positive(price, "price")?;
        self.prices.get(channel).set(price);
        Ok(())
    }

    pub fn set_calibration(&self, l_per_pulse: Real) -> PumpResult<()> {
        let k = ensure_positive(l_per_pulse, "calibration")?;
        self.calibration.set(liters(k));
        Ok(())
    }
}

/// Everything a pump reads.
///
/// `key_pad` and `clear_sale` are part of the contract but not read by the
/// current pump variants.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub nozzles: PerChannel<Stream<NozzleState>>,
    pub key_pad: Stream<Key>,
    pub fuel_pulses: Stream<u32>,
    pub calibration: Cell<Volume>,
    pub prices: PerChannel<Cell<Real>>,
    pub clear_sale: Stream<()>,
}

impl Inputs {
    pub fn runtime(&self) -> &Runtime {
        self.fuel_pulses.runtime()
    }
}

/// A completed sale. Reserved: no variant emits it yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Sale {
    pub channel: Channel,
    pub quantity: Volume,
    pub price: Real,
    pub cost: Real,
}

/// Everything a pump shows.
#[derive(Debug, Clone)]
pub struct Outputs {
    pub delivery: Cell<Delivery>,
    pub preset_lcd: Cell<String>,
    pub sale_cost_lcd: Cell<String>,
    pub sale_quantity_lcd: Cell<String>,
    pub price_lcd: PerChannel<Cell<String>>,
    pub beep: Stream<()>,
    pub sale_complete: Stream<Sale>,
}

impl Outputs {
    /// Delivery off, blank LCDs, silent streams.
    pub fn idle(rt: &Runtime) -> Self {
        let blank = || Cell::constant(rt, String::new());
        Self {
            delivery: Cell::constant(rt, Delivery::Off),
            preset_lcd: blank(),
            sale_cost_lcd: blank(),
            sale_quantity_lcd: blank(),
            price_lcd: PerChannel::from_fn(|_| blank()),
            beep: Stream::never(rt),
            sale_complete: Stream::never(rt),
        }
    }

    /// Sample every output cell at once.
    pub fn snapshot(&self) -> DisplaySnapshot {
        DisplaySnapshot {
            delivery: self.delivery.sample(),
            preset: self.preset_lcd.sample(),
            cost: self.sale_cost_lcd.sample(),
            quantity: self.sale_quantity_lcd.sample(),
            prices: self.price_lcd.map(|_, c| c.sample()),
        }
    }
}
