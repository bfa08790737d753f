//! Config and scenario schema definitions.

use pf_pump::{
    Channel, Delivery, InactivePriceStyle, PerChannel, PulseTicker, Pump, PumpParams, PumpVariant,
};
use serde::{Deserialize, Serialize};

use crate::ProjectResult;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PumpConfig {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub variant: PumpVariant,
    #[serde(default)]
    pub inactive_price: InactivePriceStyle,
    #[serde(default = "default_calibration")]
    pub calibration_l_per_pulse: f64,
    #[serde(default)]
    pub prices: PricesDef,
    /// Version 0 only: one price for every channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default)]
    pub ticker: TickerDef,
}

fn default_calibration() -> f64 {
    1.0
}

impl PumpConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: crate::LATEST_VERSION,
            name: name.into(),
            variant: PumpVariant::default(),
            inactive_price: InactivePriceStyle::default(),
            calibration_l_per_pulse: default_calibration(),
            prices: PricesDef::default(),
            price: None,
            ticker: TickerDef::default(),
        }
    }

    pub fn params(&self) -> ProjectResult<PumpParams> {
        Ok(PumpParams::new(self.calibration_l_per_pulse, self.prices.per_channel())?)
    }

    pub fn pump(&self) -> Box<dyn Pump> {
        self.variant.pump(self.inactive_price)
    }

    pub fn pulse_ticker(&self) -> PulseTicker {
        PulseTicker {
            pulses_per_tick: self.ticker.pulses_per_tick,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PricesDef {
    pub channel1: f64,
    pub channel2: f64,
    pub channel3: f64,
}

impl Default for PricesDef {
    fn default() -> Self {
        Self {
            channel1: 1.0,
            channel2: 2.0,
            channel3: 3.0,
        }
    }
}

impl PricesDef {
    pub fn uniform(price: f64) -> Self {
        Self {
            channel1: price,
            channel2: price,
            channel3: price,
        }
    }

    pub fn per_channel(&self) -> PerChannel<f64> {
        PerChannel::new(self.channel1, self.channel2, self.channel3)
    }
}

/// Host timer that feeds pulses while a nozzle delivers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TickerDef {
    pub pulses_per_tick: u32,
    pub period_ms: u64,
}

impl Default for TickerDef {
    fn default() -> Self {
        Self {
            pulses_per_tick: 20,
            period_ms: 200,
        }
    }
}

/// A scripted sequence of pump events and display checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Lift the nozzle of channel 1..=3.
    Lift(u8),
    SetDown(u8),
    Pulses(u32),
    SetPrice { channel: u8, price: f64 },
    SetCalibration(f64),
    Key(u8),
    ClearSale,
    MeterFault,
    /// Run the pulse ticker this many times.
    Tick(u32),
    /// Dispatch the inner steps inside one transaction.
    Batch(Vec<Step>),
    Expect(ExpectDef),
}

/// Display fields to check; absent fields are not checked.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ExpectDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<Delivery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price3: Option<String>,
}

impl ExpectDef {
    pub fn price(&self, channel: Channel) -> Option<&String> {
        match channel {
            Channel::One => self.price1.as_ref(),
            Channel::Two => self.price2.as_ref(),
            Channel::Three => self.price3.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_takes_defaults() {
        let config: PumpConfig = serde_yaml::from_str("version: 1\nname: forecourt\n").unwrap();
        assert_eq!(config, PumpConfig::new("forecourt"));
        assert_eq!(config.params().unwrap(), PumpParams::default());
        assert_eq!(config.pulse_ticker(), PulseTicker::default());
    }

    #[test]
    fn steps_parse_from_yaml() {
        let yaml = r#"
name: double lift
steps:
  - batch:
      - lift: 1
      - lift: 2
  - pulses: 20
  - set_price: { channel: 2, price: 2.5 }
  - clear_sale
  - expect: { delivery: fast1, quantity: "20.00" }
"#;
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scenario.steps.len(), 5);
        assert_eq!(scenario.steps[0], Step::Batch(vec![Step::Lift(1), Step::Lift(2)]));
        assert_eq!(scenario.steps[2], Step::SetPrice { channel: 2, price: 2.5 });
        assert_eq!(scenario.steps[3], Step::ClearSale);
        let Step::Expect(expect) = &scenario.steps[4] else {
            panic!("expected an expect step");
        };
        assert_eq!(expect.delivery, Some(Delivery::Fast1));
        assert_eq!(expect.price(Channel::One), None);
    }

    #[test]
    fn unknown_expect_field_is_rejected() {
        let yaml = "name: typo\nsteps:\n  - expect: { quantty: \"1.00\" }\n";
        assert!(serde_yaml::from_str::<Scenario>(yaml).is_err());
    }
}
