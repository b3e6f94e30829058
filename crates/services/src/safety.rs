//! Input safety gate.
//!
//! Every piece of learner-typed text is screened before it reaches the
//! oracle. The check is a plain lowercase substring match against a fixed
//! blocklist: crude, but it runs offline, costs nothing, and errs on the
//! side of refusing.

use std::fmt;

/// Terms that make learner input unsafe for a children's tutor.
const BLOCKLIST: [&str; 7] = [
    "violence",
    "self-harm",
    "sex",
    "drugs",
    "weapon",
    "terror",
    "gambling",
];

/// Returned when learner input matched the blocklist. Displays as the
/// age-appropriate refusal shown to the learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyRejection {
    matched: &'static str,
}

impl SafetyRejection {
    /// The blocklist term that triggered the rejection. Kept out of the
    /// `Display` text so the learner never sees it echoed back.
    #[must_use]
    pub fn matched_term(&self) -> &'static str {
        self.matched
    }
}

impl fmt::Display for SafetyRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("I can't help you with that. Let's focus on learning topics.")
    }
}

/// Screens learner input. `Ok(())` means the text may be forwarded to the
/// oracle.
///
/// # Errors
///
/// Returns `SafetyRejection` if any blocklist term appears in the text,
/// case-insensitively, including inside longer words.
pub fn check_user_input(text: &str) -> Result<(), SafetyRejection> {
    let lowered = text.to_lowercase();
    for term in BLOCKLIST {
        if lowered.contains(term) {
            return Err(SafetyRejection { matched: term });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_input_passes() {
        assert!(check_user_input("What is 2 + 3?").is_ok());
        assert!(check_user_input("").is_ok());
    }

    #[test]
    fn blocked_terms_are_caught_case_insensitively() {
        for term in BLOCKLIST {
            let upper = term.to_uppercase();
            let err = check_user_input(&format!("tell me about {upper}")).unwrap_err();
            assert_eq!(err.matched_term(), term);
        }
    }

    #[test]
    fn substring_matches_count() {
        // Deliberate over-blocking: terms inside longer words still match.
        assert!(check_user_input("Essex is a county").is_err());
        assert!(check_user_input("weapons of the bronze age").is_err());
    }

    #[test]
    fn rejection_displays_the_refusal_line() {
        let err = check_user_input("violence").unwrap_err();
        assert_eq!(
            err.to_string(),
            "I can't help you with that. Let's focus on learning topics."
        );
    }
}
