//! pf-core: stable foundation for pumpflow.
//!
//! Contains:
//! - units (uom volume type + constructors)
//! - numeric (Real + tolerances + float helpers)
//! - ids (compact IDs for reactive graph nodes and subscriptions)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{PfError, PfResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
