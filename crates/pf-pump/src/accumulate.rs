//! Delivered volume from metered pulses.

use pf_core::Volume;
use pf_reactive::{Cell, Stream};

/// One step of the running pulse count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    Clear,
    Pulses(u32),
}

impl Tally {
    pub fn apply(self, total: u64) -> u64 {
        match self {
            Tally::Clear => 0,
            Tally::Pulses(n) => total.saturating_add(u64::from(n)),
        }
    }
}

pub struct Accumulator {
    /// Pulses counted since the last clear, before calibration.
    pub raw_pulses: Cell<u64>,
    /// `calibration * raw_pulses`.
    pub liters_delivered: Cell<Volume>,
}

/// Count pulses since the last `clear` and scale them by `calibration`.
///
/// The raw count never sees the calibration, so changing it mid-fill
/// rescales everything delivered so far.
pub fn accumulate(
    clear: &Stream<()>,
    pulses: &Stream<u32>,
    calibration: &Cell<Volume>,
) -> Accumulator {
    let tally = clear
        .map(|_| Tally::Clear)
        .merge(&pulses.map(|n| Tally::Pulses(*n)));
    let raw_pulses = tally.scan(0u64, |total, step| step.apply(*total));
    let liters_delivered = raw_pulses.combine(calibration, |raw, k| *k * (*raw as f64));
    Accumulator {
        raw_pulses,
        liters_delivered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_core::{Tolerances, as_liters, liters, nearly_equal};
    use pf_reactive::{CellSink, Runtime, Sink};

    struct Rig {
        clear: Sink<()>,
        pulses: Sink<u32>,
        calibration: CellSink<Volume>,
        acc: Accumulator,
    }

    fn rig(k: f64) -> Rig {
        let rt = Runtime::new();
        let clear = Sink::new(&rt);
        let pulses = Sink::new(&rt);
        let calibration = CellSink::new(&rt, liters(k));
        let acc = accumulate(&clear.stream(), &pulses.stream(), &calibration);
        Rig {
            clear,
            pulses,
            calibration,
            acc,
        }
    }

    fn delivered(r: &Rig) -> f64 {
        as_liters(r.acc.liters_delivered.sample())
    }

    #[test]
    fn counts_and_scales() {
        let r = rig(0.5);
        r.pulses.feed([10, 10, 4]);
        assert_eq!(r.acc.raw_pulses.sample(), 24);
        assert!(nearly_equal(delivered(&r), 12.0, Tolerances::default()));
    }

    #[test]
    fn clear_resets_the_count() {
        let r = rig(1.0);
        r.pulses.send(30);
        r.clear.send(());
        assert_eq!(r.acc.raw_pulses.sample(), 0);
        assert_eq!(delivered(&r), 0.0);
        r.pulses.send(5);
        assert!(nearly_equal(delivered(&r), 5.0, Tolerances::default()));
    }

    #[test]
    fn calibration_change_is_retroactive() {
        let r = rig(1.0);
        r.pulses.feed([3, 4]);
        r.calibration.set(liters(0.1));
        r.pulses.send(3);
        assert!(nearly_equal(delivered(&r), 1.0, Tolerances::default()));
    }

    #[test]
    fn count_saturates() {
        assert_eq!(Tally::Pulses(5).apply(u64::MAX - 1), u64::MAX);
        assert_eq!(Tally::Clear.apply(99), 0);
    }
}
