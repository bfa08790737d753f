//! Host side of the pump: event dispatch, cross-thread hand-off, pulse timer.
//!
//! The graph is single-threaded. Hardware and UI threads never touch it
//! directly; they push [`PumpEvent`]s through an [`EventSender`] and the
//! propagation thread drains the [`EventQueue`].

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use pf_core::{Real, ensure_positive};
use pf_reactive::{DisposeBag, Runtime};
use tracing::{debug, trace};

use crate::channel::{Channel, Key, NozzleState};
use crate::display::DisplaySnapshot;
use crate::error::{PumpError, PumpResult};
use crate::io::{InputSinks, Outputs, PumpParams};
use crate::pump::Pump;

/// One external input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PumpEvent {
    Nozzle(Channel, NozzleState),
    Key(Key),
    Pulses(u32),
    SetPrice(Channel, Real),
    SetCalibration(Real),
    ClearSale,
    /// The flow meter stopped working.
    MeterFault,
}

impl PumpEvent {
    /// Reject values the inputs would refuse, without dispatching.
    pub fn check(&self) -> PumpResult<()> {
        match *self {
            PumpEvent::SetPrice(_, price) => {
                ensure_positive(price, "price")?;
            }
            PumpEvent::SetCalibration(k) => {
                ensure_positive(k, "calibration")?;
            }
            _ => {}
        }
        Ok(())
    }
}

impl InputSinks {
    /// Push one event into the matching input.
    pub fn dispatch(&self, event: PumpEvent) -> PumpResult<()> {
        trace!(?event, "dispatch");
        match event {
            PumpEvent::Nozzle(channel, state) => self.nozzle(channel, state),
            PumpEvent::Key(key) => self.key_pad.send(key),
            PumpEvent::Pulses(count) => self.pulses(count),
            PumpEvent::SetPrice(channel, price) => self.set_price(channel, price)?,
            PumpEvent::SetCalibration(k) => self.set_calibration(k)?,
            PumpEvent::ClearSale => self.clear_sale.send(()),
            PumpEvent::MeterFault => self.meter_fault("reported by host"),
        }
        Ok(())
    }
}

/// Producer handle for an [`EventQueue`]; may be moved to other threads.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<PumpEvent>,
}

impl EventSender {
    pub fn send(&self, event: PumpEvent) -> PumpResult<()> {
        self.tx.send(event).map_err(|_| PumpError::QueueDisconnected)
    }
}

/// Single-consumer queue drained on the propagation thread.
#[derive(Debug)]
pub struct EventQueue {
    tx: Sender<PumpEvent>,
    rx: Receiver<PumpEvent>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Dispatch every queued event, one transaction each.
    ///
    /// Stops at the first event the inputs reject; later events stay queued.
    pub fn drain(&self, sinks: &InputSinks) -> PumpResult<usize> {
        let mut count = 0;
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    sinks.dispatch(event)?;
                    count += 1;
                }
                Err(TryRecvError::Empty) => break,
                // Unreachable while `self.tx` lives.
                Err(TryRecvError::Disconnected) => return Err(PumpError::QueueDisconnected),
            }
        }
        Ok(count)
    }

    /// Dispatch every queued event inside a single transaction.
    pub fn drain_batch(&self, sinks: &InputSinks) -> PumpResult<usize> {
        sinks.runtime().transaction(|| self.drain(sinks))
    }
}

/// The host's delivery timer: a burst of pulses per tick while delivering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseTicker {
    pub pulses_per_tick: u32,
}

impl Default for PulseTicker {
    fn default() -> Self {
        Self { pulses_per_tick: 20 }
    }
}

impl PulseTicker {
    /// Send one burst unless delivery is off. Returns the pulses sent.
    pub fn tick(&self, outputs: &Outputs, sinks: &InputSinks) -> u32 {
        if outputs.delivery.sample().is_off() {
            return 0;
        }
        sinks.pulses(self.pulses_per_tick);
        self.pulses_per_tick
    }
}

/// A wired pump together with its inputs and the bag that keeps it alive.
#[derive(Debug)]
pub struct PumpStation {
    sinks: InputSinks,
    outputs: Outputs,
    bag: DisposeBag,
}

impl PumpStation {
    pub fn new(pump: &dyn Pump, params: &PumpParams) -> Self {
        let rt = Runtime::new();
        let sinks = InputSinks::new(&rt, params);
        let bag = DisposeBag::new();
        let outputs = pump.create(&sinks.inputs(), &bag);
        debug!(links = bag.len(), "pump station ready");
        Self { sinks, outputs, bag }
    }

    pub fn runtime(&self) -> &Runtime {
        self.sinks.runtime()
    }

    pub fn sinks(&self) -> &InputSinks {
        &self.sinks
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn dispatch(&self, event: PumpEvent) -> PumpResult<()> {
        self.sinks.dispatch(event)
    }

    /// Dispatch `events` in order inside one transaction.
    ///
    /// Each event still sees the state left by the previous one; observers
    /// run once, after the last. Every event is checked first, so a rejected
    /// event leaves the pump untouched.
    pub fn batch(&self, events: impl IntoIterator<Item = PumpEvent>) -> PumpResult<()> {
        let events: Vec<PumpEvent> = events.into_iter().collect();
        for event in &events {
            event.check()?;
        }
        self.runtime().transaction(|| {
            for event in events {
                self.sinks.dispatch(event)?;
            }
            Ok(())
        })
    }

    pub fn tick(&self, ticker: &PulseTicker) -> u32 {
        ticker.tick(&self.outputs, &self.sinks)
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        self.outputs.snapshot()
    }

    /// Disconnect the wiring. Outputs keep their last values.
    pub fn shutdown(&self) {
        self.bag.dispose();
    }

    pub fn is_shut_down(&self) -> bool {
        self.bag.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Delivery;
    use crate::pump::{AccumulatePulsesPump, ShowDollarsPump};
    use std::thread;

    fn station() -> PumpStation {
        PumpStation::new(&ShowDollarsPump::default(), &PumpParams::default())
    }

    #[test]
    fn dispatch_rejects_bad_price() {
        let st = station();
        let err = st
            .dispatch(PumpEvent::SetPrice(Channel::One, -1.0))
            .unwrap_err();
        assert!(matches!(err, PumpError::InvalidParameter(_)));
        assert_eq!(st.snapshot().prices.one, "1.00");
    }

    #[test]
    fn rejected_batch_changes_nothing() {
        let st = station();
        let seen = std::rc::Rc::new(std::cell::Cell::new(0));
        let s = seen.clone();
        let _sub = st.outputs().delivery.observe(move |_| s.set(s.get() + 1));

        let err = st
            .batch([
                PumpEvent::Nozzle(Channel::One, NozzleState::Up),
                PumpEvent::Pulses(5),
                PumpEvent::SetCalibration(0.0),
            ])
            .unwrap_err();
        assert!(matches!(err, PumpError::InvalidParameter(_)));
        assert_eq!(seen.get(), 1);
        let snap = st.snapshot();
        assert_eq!(snap.delivery, Delivery::Off);
        assert_eq!(snap.quantity, "0.00");
    }

    #[test]
    fn reserved_inputs_are_accepted() {
        let st = station();
        let before = st.snapshot();
        st.dispatch(PumpEvent::Key(Key::digit(4).unwrap())).unwrap();
        st.dispatch(PumpEvent::ClearSale).unwrap();
        assert_eq!(st.snapshot(), before);
    }

    #[test]
    fn ticker_only_pulses_while_delivering() {
        let st = PumpStation::new(&AccumulatePulsesPump, &PumpParams::default());
        let ticker = PulseTicker::default();
        assert_eq!(st.tick(&ticker), 0);

        st.dispatch(PumpEvent::Nozzle(Channel::Two, NozzleState::Up)).unwrap();
        assert_eq!(st.tick(&ticker), 20);
        assert_eq!(st.tick(&ticker), 20);
        assert_eq!(st.snapshot().quantity, "40.00");

        st.dispatch(PumpEvent::Nozzle(Channel::Two, NozzleState::Down)).unwrap();
        assert_eq!(st.tick(&ticker), 0);
        assert_eq!(st.snapshot().quantity, "40.00");
    }

    #[test]
    fn queue_hands_events_across_threads() {
        let st = station();
        let queue = EventQueue::new();
        let tx = queue.sender();
        let producer = thread::spawn(move || {
            tx.send(PumpEvent::Nozzle(Channel::One, NozzleState::Up))?;
            for _ in 0..3 {
                tx.send(PumpEvent::Pulses(5))?;
            }
            Ok::<_, PumpError>(())
        });
        producer.join().unwrap().unwrap();

        assert_eq!(queue.drain(st.sinks()).unwrap(), 4);
        let snap = st.snapshot();
        assert_eq!(snap.delivery, Delivery::Fast1);
        assert_eq!(snap.quantity, "15.00");
        assert_eq!(queue.drain(st.sinks()).unwrap(), 0);
    }

    #[test]
    fn drain_batch_is_one_transaction() {
        let st = station();
        let queue = EventQueue::new();
        let tx = queue.sender();
        tx.send(PumpEvent::Nozzle(Channel::One, NozzleState::Up)).unwrap();
        tx.send(PumpEvent::Nozzle(Channel::Two, NozzleState::Up)).unwrap();
        let before = st.runtime().transaction_count();

        assert_eq!(queue.drain_batch(st.sinks()).unwrap(), 2);
        assert_eq!(st.runtime().transaction_count(), before + 1);
        assert_eq!(st.snapshot().delivery, Delivery::Fast1);
    }

    #[test]
    fn shutdown_freezes_outputs() {
        let st = station();
        st.dispatch(PumpEvent::Nozzle(Channel::One, NozzleState::Up)).unwrap();
        st.dispatch(PumpEvent::Pulses(3)).unwrap();
        st.shutdown();
        assert!(st.is_shut_down());

        st.dispatch(PumpEvent::Pulses(50)).unwrap();
        st.dispatch(PumpEvent::Nozzle(Channel::One, NozzleState::Down)).unwrap();
        let snap = st.snapshot();
        assert_eq!(snap.quantity, "3.00");
        assert_eq!(snap.delivery, Delivery::Fast1);
        assert_eq!(st.sinks().fuel_pulses.stream().listener_count(), 0);
    }
}
