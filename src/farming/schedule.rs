//! Pure decisions of the polling loop.
//!
//! Everything here is a function of server state and the current time, so
//! the timing rules can be tested without a backend.

use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;

use crate::api::models::{AccountInfo, FarmSession, FarmStatus};
use crate::config::DAY_SECS;

/// What to do about the daily grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyAction {
    Claim,
    /// The streak lapsed by more than a full day; reset it first.
    ResetThenClaim,
    /// Not yet eligible.
    Wait { eligible_at: i64 },
}

/// Decides the daily grant action.
///
/// The next grant becomes claimable strictly after
/// `first_claim + day_count * 24h`.
pub fn daily_action(first_claim: Option<i64>, day_count: i64, now: i64) -> DailyAction {
    let Some(first_claim) = first_claim else {
        return DailyAction::Claim;
    };

    // A streak too long to represent is never eligible
    let next_claim = day_count
        .checked_mul(DAY_SECS)
        .and_then(|offset| first_claim.checked_add(offset))
        .unwrap_or(i64::MAX);
    if next_claim >= now {
        return DailyAction::Wait {
            eligible_at: next_claim,
        };
    }

    if next_claim.saturating_add(DAY_SECS) < now {
        DailyAction::ResetThenClaim
    } else {
        DailyAction::Claim
    }
}

/// Multiplier of a boost id such as `"x5"`; 1 without a usable boost.
pub fn boost_multiplier(boost: Option<&str>) -> u64 {
    boost
        .and_then(|id| id.trim().strip_prefix(['x', 'X']))
        .and_then(|factor| factor.parse().ok())
        .filter(|&factor| factor > 0)
        .unwrap_or(1)
}

/// Draws the tap count reported when finishing a session.
pub fn tap_count(rng: &mut impl Rng, range: RangeInclusive<u64>, boost: Option<&str>) -> u64 {
    rng.gen_range(range)
        .saturating_mul(boost_multiplier(boost))
}

/// Whether a new boost should be bought.
pub fn boost_needed(info: &AccountInfo, now: i64) -> bool {
    match (&info.boost, info.active_booster_finish_at) {
        (None, _) => true,
        (Some(_), Some(finish_at)) => finish_at < now,
        (Some(_), None) => false,
    }
}

/// What to do about the farming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FarmAction {
    Start,
    Finish,
    Wait { remaining: Duration },
    /// Status the loop does not act on.
    Ignore,
}

/// Decides the farming action for a session lasting `farm_time` seconds.
pub fn farm_action(session: &FarmSession, farm_time: i64, now: i64) -> FarmAction {
    match session.status {
        FarmStatus::Await => FarmAction::Start,
        FarmStatus::InProgress => {
            let Some(start_at) = session.start_at else {
                return FarmAction::Finish;
            };
            let remaining = start_at + farm_time - now;
            if remaining < 0 {
                FarmAction::Finish
            } else {
                FarmAction::Wait {
                    remaining: Duration::from_secs(remaining.unsigned_abs()),
                }
            }
        }
        FarmStatus::Unknown => FarmAction::Ignore,
    }
}

/// Sleep before the next cycle; never past a running farm's deadline.
pub fn next_sleep(base: Duration, farm_remaining: Option<Duration>) -> Duration {
    match farm_remaining {
        Some(remaining) if remaining < base => remaining.max(Duration::from_secs(1)),
        _ => base,
    }
}

/// Duration drawn uniformly from `[min, max]` seconds.
pub fn random_secs(min: u64, max: u64) -> Duration {
    Duration::from_secs(rand::thread_rng().gen_range(min..=max.max(min)))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    const FIRST: i64 = 1_700_000_000;

    #[test]
    fn test_daily_first_claim() {
        assert_eq!(daily_action(None, 0, FIRST), DailyAction::Claim);
    }

    #[test]
    fn test_daily_exactly_one_day_is_not_eligible() {
        assert_eq!(
            daily_action(Some(FIRST), 1, FIRST + DAY_SECS),
            DailyAction::Wait {
                eligible_at: FIRST + DAY_SECS
            }
        );
        assert_eq!(daily_action(Some(FIRST), 1, FIRST + DAY_SECS + 1), DailyAction::Claim);
    }

    #[test]
    fn test_daily_exactly_two_days_is_plain_claim() {
        assert_eq!(daily_action(Some(FIRST), 1, FIRST + 2 * DAY_SECS), DailyAction::Claim);
        assert_eq!(
            daily_action(Some(FIRST), 1, FIRST + 2 * DAY_SECS + 1),
            DailyAction::ResetThenClaim
        );
    }

    #[test]
    fn test_daily_uses_day_count() {
        assert!(matches!(
            daily_action(Some(FIRST), 3, FIRST + 2 * DAY_SECS + 10),
            DailyAction::Wait { .. }
        ));
        assert_eq!(daily_action(Some(FIRST), 3, FIRST + 3 * DAY_SECS + 10), DailyAction::Claim);
    }

    #[test]
    fn test_daily_huge_day_count_is_not_eligible() {
        assert_eq!(
            daily_action(Some(FIRST), i64::MAX, FIRST + 10),
            DailyAction::Wait {
                eligible_at: i64::MAX
            }
        );
        assert_eq!(
            daily_action(Some(i64::MAX - 10), 1, i64::MAX),
            DailyAction::Wait {
                eligible_at: i64::MAX
            }
        );
    }

    #[test]
    fn test_boost_multiplier() {
        assert_eq!(boost_multiplier(Some("x5")), 5);
        assert_eq!(boost_multiplier(Some("X2")), 2);
        assert_eq!(boost_multiplier(Some("turbo")), 1);
        assert_eq!(boost_multiplier(Some("x0")), 1);
        assert_eq!(boost_multiplier(None), 1);
    }

    #[test]
    fn test_tap_count_within_boosted_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let taps = tap_count(&mut rng, 100..=500, Some("x3"));
            assert!((300..=1500).contains(&taps), "taps {taps} out of range");
        }
        for _ in 0..200 {
            let taps = tap_count(&mut rng, 100..=500, None);
            assert!((100..=500).contains(&taps));
        }
    }

    #[test]
    fn test_tap_count_degenerate_range() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(tap_count(&mut rng, 42..=42, Some("x2")), 84);
    }

    #[test]
    fn test_boost_needed() {
        let none = AccountInfo::default();
        assert!(boost_needed(&none, FIRST));

        let active = AccountInfo {
            boost: Some("x5".to_owned()),
            active_booster_finish_at: Some(FIRST + 10),
        };
        assert!(!boost_needed(&active, FIRST));
        assert!(boost_needed(&active, FIRST + 11));
    }

    fn session(status: FarmStatus, start_at: Option<i64>) -> FarmSession {
        FarmSession {
            status,
            start_at,
            moon_time: None,
        }
    }

    #[test]
    fn test_farm_action() {
        assert_eq!(farm_action(&session(FarmStatus::Await, None), 3600, FIRST), FarmAction::Start);
        assert_eq!(
            farm_action(&session(FarmStatus::InProgress, Some(FIRST)), 3600, FIRST + 600),
            FarmAction::Wait {
                remaining: Duration::from_secs(3000)
            }
        );
        assert_eq!(
            farm_action(&session(FarmStatus::InProgress, Some(FIRST)), 3600, FIRST + 3601),
            FarmAction::Finish
        );
        assert_eq!(
            farm_action(&session(FarmStatus::Unknown, None), 3600, FIRST),
            FarmAction::Ignore
        );
    }

    #[test]
    fn test_next_sleep_caps_at_deadline() {
        let base = Duration::from_secs(3500);
        assert_eq!(next_sleep(base, None), base);
        assert_eq!(next_sleep(base, Some(Duration::from_secs(9000))), base);
        assert_eq!(
            next_sleep(base, Some(Duration::from_secs(120))),
            Duration::from_secs(120)
        );
        assert_eq!(next_sleep(base, Some(Duration::ZERO)), Duration::from_secs(1));
    }

    #[test]
    fn test_random_secs_bounds() {
        for _ in 0..100 {
            let d = random_secs(3, 7);
            assert!((3..=7).contains(&d.as_secs()));
        }
        assert_eq!(random_secs(5, 2), Duration::from_secs(5));
    }
}
