use std::f64::consts::{PI, TAU};

pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

/// Wrap an angle difference into `(-PI, PI]` so arcs take the short way around.
pub fn normalize_sweep(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    -((PI - angle).rem_euclid(TAU) - PI)
}

pub(crate) fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}
