//! LCD strings and delivery mode.
//!
//! All numbers are shown fixed-point with two decimals, using Rust's `{:.2}`
//! formatting of the `f64` value.

use pf_core::{Real, Volume, as_liters};
use pf_reactive::Cell;
use serde::{Deserialize, Serialize};

use crate::channel::{Channel, Delivery, PerChannel};

pub fn format_sale_quantity(quantity: Volume) -> String {
    format!("{:.2}", as_liters(quantity))
}

pub fn format_sale_cost(cost: Real) -> String {
    format!("{cost:.2}")
}

pub fn format_price(price: Real) -> String {
    format!("{price:.2}")
}

/// `Off` while idle, the channel's fast mode while it fills.
pub fn delivery_for(fill_active: Option<Channel>) -> Delivery {
    fill_active.map_or(Delivery::Off, Delivery::fast)
}

/// What the price LCD of a channel that is *not* filling shows during a fill.
///
/// `Blank` is the classic show-dollars pump wiring, where only the filling
/// channel's LCD shows a price. `IdlePrice` keeps every price readable so the
/// display always shows numbers in all fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InactivePriceStyle {
    /// Keep showing the channel's own price.
    #[default]
    IdlePrice,
    /// Blank the LCD until the fill ends.
    Blank,
}

/// Price LCD for `channel`.
///
/// Shows the captured price while `channel` fills, otherwise its own current
/// price (or nothing, with [`InactivePriceStyle::Blank`], while another
/// channel fills).
pub fn price_lcd(
    fill_active: &Cell<Option<Channel>>,
    fill_price: &Cell<Real>,
    idle_price: &Cell<Real>,
    channel: Channel,
    style: InactivePriceStyle,
) -> Cell<String> {
    fill_active.combine3(fill_price, idle_price, move |active, fill, idle| match active {
        Some(filling) if *filling == channel => format_price(*fill),
        Some(_) if style == InactivePriceStyle::Blank => String::new(),
        _ => format_price(*idle),
    })
}

/// Every output LCD sampled at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySnapshot {
    pub delivery: Delivery,
    pub preset: String,
    pub cost: String,
    pub quantity: String,
    pub prices: PerChannel<String>,
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn formatting_is_deterministic(v in 0.0_f64..1e7) {
            let first = format_price(v);
            prop_assert_eq!(&first, &format_price(v));
            prop_assert_eq!(format_sale_cost(v), first);
            let decimals = format_price(v).split('.').nth(1).map(str::len);
            prop_assert_eq!(decimals, Some(2));
        }
    }
}
