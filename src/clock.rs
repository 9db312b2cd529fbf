//! Slot / wall-clock conversion.
//!
//! Both directions are advisory approximations for scheduling and display.
//! Slot duration is not guaranteed constant, so the authoritative maturity
//! test is always an integer slot comparison, never a wall-clock one.

use chrono::{DateTime, Duration, Utc};

/// Nominal ledger pace used when the caller has no better estimate.
pub const SLOTS_PER_SECOND: u64 = 2;

/// Estimate the slot at which `target` wall time will be reached.
///
/// `current_slot + floor((target - now) * slots_per_second)`, clamped at
/// slot 0 when the target is far enough in the past to underflow.
pub fn slot_for_time(
    current_slot: u64,
    now: DateTime<Utc>,
    target: DateTime<Utc>,
    slots_per_second: u64,
) -> u64 {
    let delta_ms = (target - now).num_milliseconds();
    // div_euclid keeps the floor semantics for negative deltas.
    let delta_slots = (delta_ms * slots_per_second as i64).div_euclid(1000);
    if delta_slots >= 0 {
        current_slot.saturating_add(delta_slots as u64)
    } else {
        current_slot.saturating_sub(delta_slots.unsigned_abs())
    }
}

/// Estimate the wall time at which `target_slot` will be reached.
pub fn time_for_slot(
    current_slot: u64,
    now: DateTime<Utc>,
    target_slot: u64,
    slots_per_second: u64,
) -> DateTime<Utc> {
    let slot_delta = target_slot as i64 - current_slot as i64;
    let delta_ms = slot_delta * 1000 / slots_per_second as i64;
    now + Duration::milliseconds(delta_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn future_target_adds_slots() {
        let target = t0() + Duration::seconds(30);
        assert_eq!(slot_for_time(1_000, t0(), target, 2), 1_060);
    }

    #[test]
    fn past_target_subtracts_slots() {
        let target = t0() - Duration::seconds(10);
        assert_eq!(slot_for_time(1_000, t0(), target, 2), 980);
    }

    #[test]
    fn far_past_target_clamps_at_slot_zero() {
        let target = t0() - Duration::seconds(10_000);
        assert_eq!(slot_for_time(100, t0(), target, 2), 0);
    }

    #[test]
    fn slot_to_time_and_back_lands_within_one_slot() {
        let target = t0() + Duration::milliseconds(12_345);
        let slot = slot_for_time(5_000, t0(), target, SLOTS_PER_SECOND);
        let recovered = time_for_slot(5_000, t0(), slot, SLOTS_PER_SECOND);
        let error_ms = (recovered - target).num_milliseconds().abs();
        let slot_duration_ms = 1000 / SLOTS_PER_SECOND as i64;
        assert!(
            error_ms <= slot_duration_ms,
            "round trip error {error_ms}ms exceeds one slot ({slot_duration_ms}ms)"
        );
    }
}
