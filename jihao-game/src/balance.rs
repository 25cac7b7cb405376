//! Damping of negative stat deltas near the bottom of a stat's range.
use crate::constants::{
    BALANCE_DIMINISH_THRESHOLD, BALANCE_MIN_EFFECT_FACTOR, BALANCE_SAFETY_FLOOR,
};
use crate::numbers::round_f64_to_i32;

/// Linear damping factor for a negative delta against `current`.
///
/// 1.0 at or above the diminish threshold, falling to the minimum factor at zero.
#[must_use]
pub fn damping_factor(current: i32) -> f64 {
    if current >= BALANCE_DIMINISH_THRESHOLD {
        return 1.0;
    }
    let depth = f64::from(current.max(0)) / f64::from(BALANCE_DIMINISH_THRESHOLD);
    (1.0 - BALANCE_MIN_EFFECT_FACTOR).mul_add(depth, BALANCE_MIN_EFFECT_FACTOR)
}

/// Balance a raw stat delta against the stat's current value.
///
/// Positive deltas pass through. Negative deltas are damped, and a single
/// delta cannot push a stat that sits above the safety floor below it. Once
/// a stat is at or under the floor, the minimum-factor delta still applies so
/// repeated losses can reach zero. The caller clamps the result into range.
#[must_use]
pub fn apply_balanced_effect(current: i32, raw_delta: i32) -> i32 {
    if raw_delta >= 0 {
        return raw_delta;
    }

    let damped = round_f64_to_i32(f64::from(raw_delta) * damping_factor(current));
    if current.saturating_add(damped) >= BALANCE_SAFETY_FLOOR {
        return damped;
    }

    if current > BALANCE_SAFETY_FLOOR {
        BALANCE_SAFETY_FLOOR - current
    } else {
        let escape = round_f64_to_i32(f64::from(raw_delta) * BALANCE_MIN_EFFECT_FACTOR);
        raw_delta.max(escape)
    }
}
