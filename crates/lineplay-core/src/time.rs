use std::time::Duration;

use fixed::types::I64F64;

/// Simulated time: Q64.64 fixed-point, 64 integer bits, 64 fractional bits.
///
/// Timestamps are parsed straight from their decimal text so that elapsed
/// time sums are exact and reproducible across runs and platforms. Decimal
/// fractions finer than 2^-64 are rounded to the nearest representable value.
pub type SimTime = I64F64;

/// Parse a decimal timestamp such as `"365"`, `"1042.25"` or `"1.5e3"`.
///
/// Surrounding whitespace is ignored.
pub fn parse_sim_time(text: &str) -> Result<SimTime, fixed::ParseFixedError> {
    text.trim().parse::<SimTime>()
}

/// Convert a simulated-time value to f64. Use only for display and pacing.
#[inline]
pub fn sim_to_f64(t: SimTime) -> f64 {
    t.to_num::<f64>()
}

/// Convert an f64 to simulated time. Use only for initialization.
#[inline]
pub fn f64_to_sim(v: f64) -> SimTime {
    SimTime::from_num(v)
}

/// Real-time wait for a simulated gap of `delta` at `pace` real seconds per
/// simulated-time unit.
///
/// Returns `None` when no wait is needed: zero pace, a zero or negative gap,
/// or a product that does not fit in a [`Duration`].
pub fn scaled_wait(pace: f64, delta: SimTime) -> Option<Duration> {
    if pace <= 0.0 || delta <= SimTime::ZERO {
        return None;
    }
    let secs = pace * sim_to_f64(delta);
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
}
