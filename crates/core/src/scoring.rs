//! XP and level rules.

use crate::model::SessionData;

/// XP for an incorrect answer.
pub const PARTICIPATION_XP: u64 = 5;
/// XP for any correct answer before bonuses.
pub const BASE_CORRECT_XP: u64 = 10;
/// Cap on the per-answer streak bonus.
pub const MAX_STREAK_BONUS: u32 = 10;
pub const HOT_HAND_XP: u64 = 5;
pub const HOT_HAND_MIN_ANSWERS: u32 = 5;
pub const HOT_HAND_ACCURACY: f64 = 0.8;
/// Flat bonus for finishing the daily challenge.
pub const DAILY_CHALLENGE_XP: u64 = 50;

const LEVEL_BASE_XP: f64 = 100.0;
const LEVEL_GROWTH: f64 = 1.1;

/// Bonus for answering quickly: +5 under 5s, +3 under 10s, +1 under 15s.
#[must_use]
pub fn speed_bonus(time_spent_secs: f64) -> u64 {
    if time_spent_secs < 5.0 {
        5
    } else if time_spent_secs < 10.0 {
        3
    } else if time_spent_secs < 15.0 {
        1
    } else {
        0
    }
}

/// XP earned for one answer.
///
/// `session` must already count this answer; the hot-hand bonus looks at the
/// session's accuracy including it.
#[must_use]
pub fn xp_award(
    is_correct: bool,
    time_spent_secs: f64,
    current_streak: u32,
    session: &SessionData,
) -> u64 {
    if !is_correct {
        return PARTICIPATION_XP;
    }

    let streak_bonus = u64::from(current_streak.min(MAX_STREAK_BONUS));
    let hot_hand = match session.accuracy() {
        Some(acc)
            if acc >= HOT_HAND_ACCURACY
                && session.questions_answered >= HOT_HAND_MIN_ANSWERS =>
        {
            HOT_HAND_XP
        }
        _ => 0,
    };

    BASE_CORRECT_XP + speed_bonus(time_spent_secs) + streak_bonus + hot_hand
}

/// Cumulative XP needed to reach `level`: `level * 100 * 1.1^(level - 1)`.
#[must_use]
pub fn xp_for_level(level: u32) -> f64 {
    let exponent = i32::try_from(level.saturating_sub(1)).unwrap_or(i32::MAX);
    f64::from(level) * LEVEL_BASE_XP * LEVEL_GROWTH.powi(exponent)
}

/// True when `xp` is enough to move from `level` to `level + 1`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn qualifies_for_next_level(xp: u64, level: u32) -> bool {
    xp as f64 >= xp_for_level(level.saturating_add(1))
}
