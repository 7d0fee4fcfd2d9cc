//! Conversions between the normalized covering position and raw motor steps.
//!
//! Positions are hundredths of a percent closed (`0..=10000`). Both directions
//! round to nearest by adding half the denominator before dividing; truncation
//! would bias every round trip towards home.

/// Fully closed, in hundredths of a percent.
pub const POSITION_MAX: u16 = 10_000;

/// Travel used when no (valid) calibration exists, and as the divisor fallback.
pub const DEFAULT_TRAVEL_STEPS: u16 = 5000;

#[inline]
fn effective_travel(travel_steps: u16) -> u32 {
    if travel_steps == 0 {
        u32::from(DEFAULT_TRAVEL_STEPS)
    } else {
        u32::from(travel_steps)
    }
}

/// Clamp a position into `[0, POSITION_MAX]`.
#[inline]
pub fn clamp_position(position: u16) -> u16 {
    position.min(POSITION_MAX)
}

/// Steps from home for `position` on a covering with `travel_steps` of travel.
///
/// `position` is clamped first, so the result never exceeds a non-zero travel.
pub fn steps_from_position(position: u16, travel_steps: u16) -> u16 {
    let travel = effective_travel(travel_steps);
    let max = u32::from(POSITION_MAX);
    // u16 * u16 fits in u32 with room for the rounding term
    let scaled = u32::from(clamp_position(position)) * travel + max / 2;
    (scaled / max) as u16
}

/// Position for a raw step count; saturates at `POSITION_MAX` when `steps`
/// lies beyond the travel (bottom search runs past the old limit).
pub fn position_from_steps(steps: u16, travel_steps: u16) -> u16 {
    let travel = effective_travel(travel_steps);
    let scaled = u32::from(steps) * u32::from(POSITION_MAX) + travel / 2;
    let position = scaled / travel;
    u16::try_from(position).map_or(POSITION_MAX, clamp_position)
}
