//! The streak/status transition applied to a learner's progress on one skill
//! after each judged answer.

use crate::model::SkillStatus;

/// Consecutive correct answers needed before a skill counts as Practicing.
pub const PRACTICING_STREAK: u32 = 3;

/// Applies one judged answer to a progress state.
///
/// - A correct answer extends the streak; an incorrect one resets it to 0.
/// - Once the new streak reaches [`PRACTICING_STREAK`] the status becomes
///   `Practicing`; otherwise the prior status is kept.
///
/// Note the asymmetry: `Practicing` never reverts to `Learning` on a miss;
/// only the streak resets. This mirrors the product's intent that mastery,
/// once reached, is sticky; revisit here if that decision changes.
#[must_use]
pub fn apply_answer(status: SkillStatus, streak_correct: u32, correct: bool) -> (SkillStatus, u32) {
    let streak = if correct { streak_correct + 1 } else { 0 };
    let status = if streak >= PRACTICING_STREAK {
        SkillStatus::Practicing
    } else {
        status
    };
    (status, streak)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_answers_extend_the_streak() {
        let (status, streak) = apply_answer(SkillStatus::Learning, 0, true);
        assert_eq!(status, SkillStatus::Learning);
        assert_eq!(streak, 1);

        let (status, streak) = apply_answer(status, streak, true);
        assert_eq!(status, SkillStatus::Learning);
        assert_eq!(streak, 2);
    }

    #[test]
    fn third_consecutive_correct_promotes_to_practicing() {
        let (status, streak) = apply_answer(SkillStatus::Learning, 2, true);
        assert_eq!(status, SkillStatus::Practicing);
        assert_eq!(streak, 3);
    }

    #[test]
    fn incorrect_answer_resets_streak_only() {
        let (status, streak) = apply_answer(SkillStatus::Practicing, 3, false);
        assert_eq!(status, SkillStatus::Practicing);
        assert_eq!(streak, 0);
    }

    #[test]
    fn learning_stays_learning_below_threshold() {
        let (status, streak) = apply_answer(SkillStatus::Learning, 1, false);
        assert_eq!(status, SkillStatus::Learning);
        assert_eq!(streak, 0);
    }

    #[test]
    fn streak_keeps_growing_past_threshold() {
        let (status, streak) = apply_answer(SkillStatus::Practicing, 5, true);
        assert_eq!(status, SkillStatus::Practicing);
        assert_eq!(streak, 6);
    }

    #[test]
    fn unseen_skill_promotes_on_reaching_threshold() {
        // An Unseen status only occurs if the caller never defaulted to
        // Learning; the transition still promotes once the streak is there.
        let (status, streak) = apply_answer(SkillStatus::Unseen, 2, true);
        assert_eq!(status, SkillStatus::Practicing);
        assert_eq!(streak, 3);
    }
}
