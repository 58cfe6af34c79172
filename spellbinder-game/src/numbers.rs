//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Floor a f64 and clamp it into the u64 range, returning 0 for NaN or negatives.
#[must_use]
pub fn floor_f64_to_u64(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    let max = cast::<u64, f64>(u64::MAX).unwrap_or(f64::MAX);
    cast::<f64, u64>(value.min(max).floor()).unwrap_or(u64::MAX)
}

/// Floor a f64 and clamp it into the u32 range, returning 0 for NaN or negatives.
#[must_use]
pub fn floor_f64_to_u32(value: f64) -> u32 {
    u32::try_from(floor_f64_to_u64(value)).unwrap_or(u32::MAX)
}

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(f64::MAX)
}

/// `floor(base * growth^level)`, the shape shared by every experience curve.
#[must_use]
pub fn exp_curve(base: f64, growth: f64, level: u32) -> u64 {
    let exponent = i32::try_from(level).unwrap_or(i32::MAX);
    floor_f64_to_u64(base * growth.powi(exponent))
}
