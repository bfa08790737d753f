//! Channel identity and the small value types flowing through the pump.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PumpError, PumpResult};

/// One of the three fuel lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    One,
    Two,
    Three,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::One, Channel::Two, Channel::Three];

    /// 1-based number as printed on the pump.
    pub fn number(self) -> u8 {
        match self {
            Channel::One => 1,
            Channel::Two => 2,
            Channel::Three => 3,
        }
    }

    pub fn from_number(number: u8) -> PumpResult<Self> {
        match number {
            1 => Ok(Channel::One),
            2 => Ok(Channel::Two),
            3 => Ok(Channel::Three),
            _ => Err(PumpError::InvalidChannel { number }),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Nozzle sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NozzleState {
    Up,
    Down,
}

/// Keypad digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Key(u8);

impl TryFrom<u8> for Key {
    type Error = PumpError;

    fn try_from(digit: u8) -> PumpResult<Self> {
        Key::digit(digit)
    }
}

impl From<Key> for u8 {
    fn from(key: Key) -> u8 {
        key.0
    }
}

impl Key {
    pub fn digit(digit: u8) -> PumpResult<Self> {
        if digit <= 9 {
            Ok(Self(digit))
        } else {
            Err(PumpError::InvalidKey { digit })
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

/// Delivery mode shown to the customer.
///
/// The slow modes are part of the display contract but not produced by the
/// current wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    #[default]
    Off,
    Slow1,
    Fast1,
    Slow2,
    Fast2,
    Slow3,
    Fast3,
}

impl Delivery {
    pub fn fast(channel: Channel) -> Self {
        match channel {
            Channel::One => Delivery::Fast1,
            Channel::Two => Delivery::Fast2,
            Channel::Three => Delivery::Fast3,
        }
    }

    pub fn slow(channel: Channel) -> Self {
        match channel {
            Channel::One => Delivery::Slow1,
            Channel::Two => Delivery::Slow2,
            Channel::Three => Delivery::Slow3,
        }
    }

    /// Channel being delivered, if any.
    pub fn channel(self) -> Option<Channel> {
        match self {
            Delivery::Off => None,
            Delivery::Slow1 | Delivery::Fast1 => Some(Channel::One),
            Delivery::Slow2 | Delivery::Fast2 => Some(Channel::Two),
            Delivery::Slow3 | Delivery::Fast3 => Some(Channel::Three),
        }
    }

    pub fn is_off(self) -> bool {
        self == Delivery::Off
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Delivery::Off => "off",
            Delivery::Slow1 => "slow1",
            Delivery::Fast1 => "fast1",
            Delivery::Slow2 => "slow2",
            Delivery::Fast2 => "fast2",
            Delivery::Slow3 => "slow3",
            Delivery::Fast3 => "fast3",
        };
        f.write_str(name)
    }
}

/// One value per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerChannel<T> {
    pub one: T,
    pub two: T,
    pub three: T,
}

impl<T> PerChannel<T> {
    pub fn new(one: T, two: T, three: T) -> Self {
        Self { one, two, three }
    }

    pub fn from_fn(mut f: impl FnMut(Channel) -> T) -> Self {
        Self {
            one: f(Channel::One),
            two: f(Channel::Two),
            three: f(Channel::Three),
        }
    }

    pub fn get(&self, channel: Channel) -> &T {
        match channel {
            Channel::One => &self.one,
            Channel::Two => &self.two,
            Channel::Three => &self.three,
        }
    }

    pub fn get_mut(&mut self, channel: Channel) -> &mut T {
        match channel {
            Channel::One => &mut self.one,
            Channel::Two => &mut self.two,
            Channel::Three => &mut self.three,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(Channel, &T) -> U) -> PerChannel<U> {
        PerChannel::from_fn(|ch| f(ch, self.get(ch)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, &T)> {
        Channel::ALL.into_iter().map(move |ch| (ch, self.get(ch)))
    }
}
