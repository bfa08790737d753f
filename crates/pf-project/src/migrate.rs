//! Schema migration framework.

use crate::ProjectError;
use crate::schema::{PricesDef, PumpConfig};

pub const LATEST_VERSION: u32 = 1;

pub fn migrate_to_latest(mut config: PumpConfig) -> Result<PumpConfig, ProjectError> {
    while config.version < LATEST_VERSION {
        config = migrate_one_version(config)?;
    }
    Ok(config)
}

fn migrate_one_version(config: PumpConfig) -> Result<PumpConfig, ProjectError> {
    match config.version {
        0 => migrate_v0_to_v1(config),
        v => Err(ProjectError::Migration {
            what: format!("No migration path from version {}", v),
        }),
    }
}

/// Version 0 had a single `price` shared by all channels.
fn migrate_v0_to_v1(mut config: PumpConfig) -> Result<PumpConfig, ProjectError> {
    if let Some(price) = config.price.take() {
        config.prices = PricesDef::uniform(price);
    }
    config.version = 1;
    Ok(config)
}
