// pf-core/src/units.rs

use uom::si::f64::Volume as UomVolume;

/// Delivered fuel and calibration factors (volume per pulse) are volumes.
pub type Volume = UomVolume;

#[inline]
pub fn liters(v: f64) -> Volume {
    use uom::si::volume::liter;
    Volume::new::<liter>(v)
}

#[inline]
pub fn as_liters(v: Volume) -> f64 {
    use uom::si::volume::liter;
    v.get::<liter>()
}
