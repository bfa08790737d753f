//! Replays a [`Scenario`] against a freshly wired pump.

use pf_pump::{
    Channel, DisplaySnapshot, Key, NozzleState, PulseTicker, PumpEvent, PumpStation,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::schema::{ExpectDef, PumpConfig, Scenario, Step};
use crate::validate::validate_scenario;
use crate::{ProjectResult, validate_config};

/// One display field that did not match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpectFailure {
    pub step: usize,
    pub field: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioReport {
    pub scenario: String,
    pub steps_run: usize,
    pub pulses_ticked: u64,
    pub failures: Vec<ExpectFailure>,
    pub display: DisplaySnapshot,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Runner<'a> {
    station: &'a PumpStation,
    ticker: PulseTicker,
    pulses_ticked: u64,
    failures: Vec<ExpectFailure>,
}

impl Runner<'_> {
    fn step(&mut self, idx: usize, step: &Step) -> ProjectResult<()> {
        let st = self.station;
        match step {
            Step::Lift(n) => {
                st.dispatch(PumpEvent::Nozzle(Channel::from_number(*n)?, NozzleState::Up))?
            }
            Step::SetDown(n) => {
                st.dispatch(PumpEvent::Nozzle(Channel::from_number(*n)?, NozzleState::Down))?
            }
            Step::Pulses(count) => st.dispatch(PumpEvent::Pulses(*count))?,
            Step::SetPrice { channel, price } => {
                st.dispatch(PumpEvent::SetPrice(Channel::from_number(*channel)?, *price))?
            }
            Step::SetCalibration(k) => st.dispatch(PumpEvent::SetCalibration(*k))?,
            Step::Key(digit) => st.dispatch(PumpEvent::Key(Key::digit(*digit)?))?,
            Step::ClearSale => st.dispatch(PumpEvent::ClearSale)?,
            Step::MeterFault => st.dispatch(PumpEvent::MeterFault)?,
            Step::Tick(times) => {
                for _ in 0..*times {
                    self.pulses_ticked += u64::from(st.tick(&self.ticker));
                }
            }
            Step::Batch(inner) => {
                st.runtime().transaction(|| {
                    inner.iter().try_for_each(|s| self.step(idx, s))
                })?;
            }
            Step::Expect(expect) => self.check(idx, expect, &st.snapshot()),
        }
        Ok(())
    }

    fn check(&mut self, idx: usize, expect: &ExpectDef, actual: &DisplaySnapshot) {
        let mut compare = |field: &str, expected: Option<String>, actual: String| {
            if let Some(expected) = expected {
                if expected != actual {
                    debug!(step = idx, field, %expected, %actual, "expectation failed");
                    self.failures.push(ExpectFailure {
                        step: idx,
                        field: field.to_string(),
                        expected,
                        actual,
                    });
                }
            }
        };
        compare(
            "delivery",
            expect.delivery.map(|d| d.to_string()),
            actual.delivery.to_string(),
        );
        compare("quantity", expect.quantity.clone(), actual.quantity.clone());
        compare("cost", expect.cost.clone(), actual.cost.clone());
        for channel in Channel::ALL {
            compare(
                &format!("price{channel}"),
                expect.price(channel).cloned(),
                actual.prices.get(channel).clone(),
            );
        }
    }
}

/// Wire the pump described by `config` and replay `scenario` against it.
///
/// Failed expectations are collected in the report; invalid steps abort.
pub fn run_scenario(config: &PumpConfig, scenario: &Scenario) -> ProjectResult<ScenarioReport> {
    validate_config(config)?;
    validate_scenario(scenario)?;

    let station = PumpStation::new(config.pump().as_ref(), &config.params()?);
    let mut runner = Runner {
        station: &station,
        ticker: config.pulse_ticker(),
        pulses_ticked: 0,
        failures: Vec::new(),
    };
    for (idx, step) in scenario.steps.iter().enumerate() {
        runner.step(idx, step)?;
    }

    let report = ScenarioReport {
        scenario: scenario.name.clone(),
        steps_run: scenario.steps.len(),
        pulses_ticked: runner.pulses_ticked,
        failures: runner.failures,
        display: station.snapshot(),
    };
    info!(
        scenario = %report.scenario,
        failures = report.failures.len(),
        "scenario finished"
    );
    station.shutdown();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_pump::{Delivery, PumpVariant};

    #[test]
    fn mismatches_are_reported_not_raised() {
        let scenario = Scenario {
            name: "wrong".into(),
            steps: vec![
                Step::Lift(1),
                Step::Pulses(2),
                Step::Expect(ExpectDef {
                    quantity: Some("3.00".into()),
                    delivery: Some(Delivery::Fast1),
                    ..ExpectDef::default()
                }),
            ],
        };
        let report = run_scenario(&PumpConfig::new("t"), &scenario).unwrap();
        assert!(!report.passed());
        assert_eq!(
            report.failures,
            vec![ExpectFailure {
                step: 2,
                field: "quantity".into(),
                expected: "3.00".into(),
                actual: "2.00".into(),
            }]
        );
    }

    #[test]
    fn tick_in_the_same_batch_as_the_lift_delivers() {
        let scenario = Scenario {
            name: "lift and tick".into(),
            steps: vec![Step::Batch(vec![Step::Lift(1), Step::Tick(1)])],
        };
        let report = run_scenario(&PumpConfig::new("t"), &scenario).unwrap();
        assert_eq!(report.pulses_ticked, 20);
        assert_eq!(report.display.quantity, "20.00");
        assert_eq!(report.display.delivery, Delivery::Fast1);
    }

    #[test]
    fn ticks_follow_the_configured_burst() {
        let mut config = PumpConfig::new("ticker");
        config.variant = PumpVariant::AccumulatePulses;
        config.ticker.pulses_per_tick = 5;
        let scenario = Scenario {
            name: "tick".into(),
            steps: vec![
                Step::Tick(2),
                Step::Lift(3),
                Step::Tick(3),
                Step::SetDown(3),
                Step::Tick(1),
            ],
        };
        let report = run_scenario(&config, &scenario).unwrap();
        assert_eq!(report.pulses_ticked, 15);
        assert_eq!(report.display.quantity, "15.00");
        assert_eq!(report.display.delivery, Delivery::Off);
    }
}
