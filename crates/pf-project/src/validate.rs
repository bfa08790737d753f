//! Config and scenario validation logic.

use pf_pump::{Channel, Key};

use crate::schema::{PumpConfig, Scenario, Step};

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

fn invalid(field: impl Into<String>, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn check_positive(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, value, "must be finite and positive"))
    }
}

pub fn validate_config(config: &PumpConfig) -> Result<(), ValidationError> {
    if config.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: config.version,
        });
    }

    if let Some(price) = config.price {
        return Err(invalid(
            "price",
            price,
            "single price is only valid in version 0; use prices",
        ));
    }

    check_positive("calibration_l_per_pulse", config.calibration_l_per_pulse)?;
    for (channel, price) in config.prices.per_channel().iter() {
        check_positive(&format!("prices.channel{}", channel.number()), *price)?;
    }

    if config.ticker.pulses_per_tick == 0 {
        return Err(invalid("ticker.pulses_per_tick", 0, "must be at least 1"));
    }
    if config.ticker.period_ms == 0 {
        return Err(invalid("ticker.period_ms", 0, "must be at least 1"));
    }

    Ok(())
}

pub fn validate_scenario(scenario: &Scenario) -> Result<(), ValidationError> {
    for (idx, step) in scenario.steps.iter().enumerate() {
        validate_step(step, &format!("steps[{idx}]"), false)?;
    }
    Ok(())
}

fn validate_step(step: &Step, at: &str, in_batch: bool) -> Result<(), ValidationError> {
    match step {
        Step::Lift(n) | Step::SetDown(n) => check_channel(at, *n),
        Step::SetPrice { channel, price } => {
            check_channel(at, *channel)?;
            check_positive(&format!("{at}.price"), *price)
        }
        Step::SetCalibration(k) => check_positive(at, *k),
        Step::Key(digit) => Key::digit(*digit)
            .map(|_| ())
            .map_err(|_| invalid(at, digit, "keypad digits are 0-9")),
        Step::Pulses(_) | Step::ClearSale | Step::MeterFault | Step::Tick(_) => Ok(()),
        Step::Batch(inner) => {
            for (idx, s) in inner.iter().enumerate() {
                validate_step(s, &format!("{at}.batch[{idx}]"), true)?;
            }
            Ok(())
        }
        // Output cells only settle when the batch ends.
        Step::Expect(_) if in_batch => Err(invalid(at, "expect", "not allowed inside a batch")),
        Step::Expect(_) => Ok(()),
    }
}

fn check_channel(at: &str, number: u8) -> Result<(), ValidationError> {
    Channel::from_number(number)
        .map(|_| ())
        .map_err(|_| invalid(at, number, "channels are 1-3"))
}
