//! Ebbinghaus forgetting curve for memory accessibility.
//!
//! Retention follows:
//!   R = e^(-t/S)
//!
//! Where:
//!   t = days since the memory was last accessed
//!   S = strength = base_strength_days + ln(1 + access_count) * rehearsal_factor
//!
//! A memory's accessibility is `accessibility_at_access * R`. Because decay is
//! measured from the last access anchor, running it twice at the same
//! instant changes nothing, and later instants only ever give lower values.
//! Memories that were never accessed keep their initial accessibility.

use chrono::{DateTime, Utc};

use crate::config::{AccessBoost, DecayConfig};
use crate::memory::MemoryRecord;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Core Ebbinghaus forgetting curve: R = e^(-t/S).
///
/// # Arguments
/// * `delta_days`: Time elapsed in days.
/// * `strength`: Memory strength S (higher = slower decay).
#[must_use]
pub fn ebbinghaus(delta_days: f64, strength: f64) -> f64 {
    if strength <= 0.0 {
        return 0.0;
    }
    (-delta_days.max(0.0) / strength).exp()
}

/// Memory strength S in days. Rehearsal (access count) slows decay.
#[must_use]
pub fn memory_strength(access_count: u32, config: &DecayConfig) -> f64 {
    config.base_strength_days + f64::from(access_count).ln_1p() * config.rehearsal_factor
}

/// Accessibility `record` would have at `now`, without mutating it.
#[must_use]
pub fn decayed_accessibility(record: &MemoryRecord, now: DateTime<Utc>, config: &DecayConfig) -> f32 {
    let Some(last) = record.last_accessed_at else {
        return record.accessibility;
    };
    let elapsed_days = (now - last).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY;
    let retention = ebbinghaus(elapsed_days, memory_strength(record.access_count, config));
    let decayed = (f64::from(record.accessibility_at_access) * retention) as f32;
    // Never raise accessibility here; only an access may do that.
    decayed.min(record.accessibility).max(0.0)
}

/// Decay `record` in place. Returns `true` if accessibility changed.
pub fn apply(record: &mut MemoryRecord, now: DateTime<Utc>, config: &DecayConfig) -> bool {
    let next = decayed_accessibility(record, now, config);
    let changed = (next - record.accessibility).abs() > f32::EPSILON;
    record.accessibility = next;
    changed
}

/// Accessibility after an access, given the already-incremented access count.
#[must_use]
pub fn boosted(current: f32, access_count: u32, boost: AccessBoost) -> f32 {
    match boost {
        AccessBoost::Reset => 1.0,
        AccessBoost::Recover { fraction } => {
            let damping = 1.0 + 0.1 * f64::from(access_count).ln_1p();
            let gain = (f64::from(fraction.max(0.0)) / damping) as f32;
            (current + gain).min(1.0).max(current)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CharacterId, MemoryType};
    use chrono::Duration;

    fn accessed_days_ago(days: i64, count: u32) -> (MemoryRecord, DateTime<Utc>) {
        let now = Utc::now();
        let m = MemoryRecord::new(CharacterId::new(), MemoryType::Episodic, "x", 0.5)
            .accessed(now - Duration::days(days), 1.0, count);
        (m, now)
    }

    #[test]
    fn ebbinghaus_immediate_is_one() {
        let retention = ebbinghaus(0.0, 10.0);
        assert!((retention - 1.0).abs() < 0.001);
    }

    #[test]
    fn ebbinghaus_decays_over_time() {
        let r1 = ebbinghaus(1.0, 7.0);
        let r7 = ebbinghaus(7.0, 7.0);
        let r70 = ebbinghaus(70.0, 7.0);

        assert!(r1 > r7);
        assert!(r7 > r70);
        assert!((r7 - (-1.0_f64).exp()).abs() < 0.001);
    }

    #[test]
    fn rehearsal_strengthens_memory() {
        let config = DecayConfig::default();
        let once = memory_strength(0, &config);
        let many = memory_strength(50, &config);
        assert!((once - 7.0).abs() < 1e-9);
        assert!(many > once, "Frequently accessed memories should be stronger");
    }

    #[test]
    fn never_accessed_memory_keeps_its_value() {
        let config = DecayConfig::default();
        let mut m = MemoryRecord::new(CharacterId::new(), MemoryType::Core, "x", 0.5);
        m.accessibility = 0.8;
        assert!(!apply(&mut m, Utc::now() + Duration::days(365), &config));
        assert!((m.accessibility - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn decay_is_idempotent_and_monotonic() {
        let config = DecayConfig::default();
        let (mut m, now) = accessed_days_ago(7, 0);

        assert!(apply(&mut m, now, &config));
        let first = m.accessibility;
        assert!((f64::from(first) - (-1.0_f64).exp()).abs() < 1e-3);

        apply(&mut m, now, &config);
        assert!((m.accessibility - first).abs() < f32::EPSILON);

        apply(&mut m, now + Duration::days(3), &config);
        assert!(m.accessibility < first);

        // A clock that goes backwards must not restore accessibility.
        apply(&mut m, now - Duration::days(5), &config);
        assert!(m.accessibility < first);
    }

    #[test]
    fn recover_boost_is_damped_and_capped() {
        let low = boosted(0.2, 1, AccessBoost::Recover { fraction: 0.3 });
        let later = boosted(0.2, 100, AccessBoost::Recover { fraction: 0.3 });
        assert!(low > 0.2 && low < 0.5);
        assert!(later < low);
        assert!((boosted(0.95, 1, AccessBoost::Recover { fraction: 0.3 }) - 1.0).abs() < f32::EPSILON);
        assert!((boosted(0.1, 1, AccessBoost::Reset) - 1.0).abs() < f32::EPSILON);
    }
}
