//! Positional scoring of operator input against the commitment sentence.
//!
//! Everything here is a pure function of `(input, target)`: no counters survive
//! between calls, so replaying the same text always yields the same result.

use crate::error::InputError;

/// Ratio at which feedback switches from `Far` to `Near`.
pub const NEAR_THRESHOLD: f64 = 0.8;

/// Raw text longer than this is rejected before sanitizing.
pub const MAX_RAW_INPUT_CHARS: usize = 4096;

/// Qualitative feedback bucket derived from the match ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchTier {
    Far,
    Near,
    Complete,
}

impl MatchTier {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 1.0 {
            MatchTier::Complete
        } else if ratio >= NEAR_THRESHOLD {
            MatchTier::Near
        } else {
            MatchTier::Far
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MatchTier::Far => "far",
            MatchTier::Near => "near",
            MatchTier::Complete => "complete",
        }
    }
}

/// Correctness of one sanitized input character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharMark {
    Correct,
    Wrong,
    /// Character past the end of the target; never counts as a match.
    Extra,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub matches: usize,
    pub ratio: f64,
    pub satisfied: bool,
}

/// Keep only printable ASCII (0x20..=0x7E).
pub fn sanitize(raw: &str) -> String {
    raw.chars().filter(|ch| matches!(ch, ' '..='~')).collect()
}

/// Compare `sanitized` against `target` position by position.
///
/// The ratio divides by the target length, so short input cannot reach 1.0 and
/// trailing characters beyond the target never add matches. Satisfaction also
/// requires equal lengths, which keeps `target + garbage` unsatisfied.
pub fn score(sanitized: &str, target: &str) -> Score {
    let target_len = target.chars().count();
    if target_len == 0 {
        return Score {
            matches: 0,
            ratio: 0.0,
            satisfied: false,
        };
    }

    let matches = sanitized
        .chars()
        .zip(target.chars())
        .filter(|(typed, expected)| typed == expected)
        .count();
    let ratio = matches as f64 / target_len as f64;
    let satisfied = matches == target_len && sanitized.chars().count() == target_len;

    Score {
        matches,
        ratio,
        satisfied,
    }
}

/// Per-character correctness for `sanitized`, in input order.
pub fn mark_characters(sanitized: &str, target: &str) -> Vec<CharMark> {
    let mut expected = target.chars();
    sanitized
        .chars()
        .map(|typed| match expected.next() {
            Some(ch) if ch == typed => CharMark::Correct,
            Some(_) => CharMark::Wrong,
            None => CharMark::Extra,
        })
        .collect()
}

/// Progress toward the commitment sentence as of the last input event.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchState {
    pub target: String,
    pub sanitized_input: String,
    pub match_ratio: f64,
    pub satisfied: bool,
    pub marks: Vec<CharMark>,
}

impl MatchState {
    /// State before any input has been received.
    pub fn empty(target: &str) -> Self {
        Self {
            target: target.to_string(),
            sanitized_input: String::new(),
            match_ratio: 0.0,
            satisfied: false,
            marks: Vec::new(),
        }
    }

    /// Whole-number percentage for display.
    ///
    /// Only a satisfied state reads 100; a full prefix followed by extra
    /// characters is capped at 99.
    pub fn percent(&self) -> u8 {
        let rounded = (self.match_ratio * 100.0).round().clamp(0.0, 100.0) as u8;
        if self.satisfied {
            100
        } else {
            rounded.min(99)
        }
    }

    /// Feedback tier, demoting an unsatisfied full-ratio state to `Near`.
    pub fn tier(&self) -> MatchTier {
        match MatchTier::from_ratio(self.match_ratio) {
            MatchTier::Complete if !self.satisfied => MatchTier::Near,
            tier => tier,
        }
    }
}

/// Scorer bound to one immutable target sentence.
#[derive(Debug, Clone)]
pub struct InputMatcher {
    target: String,
}

impl InputMatcher {
    /// Build a matcher for `target`.
    ///
    /// # Errors
    /// Returns `InputError::InvalidTarget` when the target is empty or contains
    /// characters that sanitizing would strip (it could never be satisfied).
    pub fn new(target: impl Into<String>) -> Result<Self, InputError> {
        let target = target.into();
        if target.is_empty() {
            return Err(InputError::InvalidTarget("target sentence is empty".into()));
        }
        if sanitize(&target) != target {
            return Err(InputError::InvalidTarget(
                "target sentence must contain printable ASCII only".into(),
            ));
        }
        Ok(Self { target })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn initial_state(&self) -> MatchState {
        MatchState::empty(&self.target)
    }

    /// Sanitize and score one raw input snapshot.
    pub fn evaluate(&self, raw: &str) -> Result<MatchState, InputError> {
        let raw_len = raw.chars().count();
        if raw_len > MAX_RAW_INPUT_CHARS {
            return Err(InputError::SanitizeFailed(format!(
                "input of {raw_len} characters exceeds the {MAX_RAW_INPUT_CHARS} character limit"
            )));
        }

        let sanitized = sanitize(raw);
        let Score {
            ratio, satisfied, ..
        } = score(&sanitized, &self.target);
        let marks = mark_characters(&sanitized, &self.target);

        Ok(MatchState {
            target: self.target.clone(),
            sanitized_input: sanitized,
            match_ratio: ratio,
            satisfied,
            marks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTENCE: &str = "I will put my computer to sleep at 23:15 every night.";

    #[test]
    fn sanitize_strips_control_and_non_ascii() {
        assert_eq!(sanitize("abc\x01\x7F\u{80}def"), "abcdef");
        assert_eq!(sanitize("tab\there\r\n"), "tabhere");
        assert_eq!(sanitize("caf\u{e9} 23:15"), "caf 23:15");
        assert_eq!(sanitize(" ~"), " ~");
    }

    #[test]
    fn empty_input_scores_zero() {
        let score = score("", "cat");
        assert_eq!(score.matches, 0);
        assert_eq!(score.ratio, 0.0);
        assert!(!score.satisfied);
    }

    #[test]
    fn appended_garbage_reaches_full_ratio_but_stays_unsatisfied() {
        let input = format!("{SENTENCE}EXTRA");
        let score = score(&input, SENTENCE);
        assert_eq!(score.ratio, 1.0);
        assert!(!score.satisfied);

        let exact = super::score(SENTENCE, SENTENCE);
        assert_eq!(exact.ratio, 1.0);
        assert!(exact.satisfied);
    }

    #[test]
    fn scoring_is_pure() {
        let first = score("I will pot", SENTENCE);
        let _ = score("something else entirely", SENTENCE);
        let _ = score(SENTENCE, SENTENCE);
        let second = score("I will pot", SENTENCE);
        assert_eq!(first, second);
    }

    #[test]
    fn ratio_divides_by_target_length() {
        let progress: Vec<f64> = ["c", "ca", "cat"]
            .iter()
            .map(|input| score(input, "cat").ratio)
            .collect();
        assert!((progress[0] - 1.0 / 3.0).abs() < 1e-9);
        assert!((progress[1] - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(progress[2], 1.0);
    }

    #[test]
    fn mismatched_first_character_still_counts_later_positions() {
        let score = score("xat", "cat");
        assert_eq!(score.matches, 2);
        assert_eq!(MatchTier::from_ratio(score.ratio), MatchTier::Far);
        assert_eq!(
            mark_characters("xatz", "cat"),
            vec![
                CharMark::Wrong,
                CharMark::Correct,
                CharMark::Correct,
                CharMark::Extra
            ]
        );
    }

    #[test]
    fn tiers_follow_fixed_thresholds() {
        assert_eq!(MatchTier::from_ratio(0.0), MatchTier::Far);
        assert_eq!(MatchTier::from_ratio(0.79), MatchTier::Far);
        assert_eq!(MatchTier::from_ratio(0.8), MatchTier::Near);
        assert_eq!(MatchTier::from_ratio(0.99), MatchTier::Near);
        assert_eq!(MatchTier::from_ratio(1.0), MatchTier::Complete);
    }

    #[test]
    fn matcher_rejects_unusable_targets() {
        assert!(matches!(
            InputMatcher::new(""),
            Err(InputError::InvalidTarget(_))
        ));
        assert!(matches!(
            InputMatcher::new("caf\u{e9}"),
            Err(InputError::InvalidTarget(_))
        ));
        assert!(InputMatcher::new(SENTENCE).is_ok());
    }

    #[test]
    fn evaluate_rejects_oversized_input() {
        let matcher = InputMatcher::new("cat").unwrap();
        let raw = "c".repeat(MAX_RAW_INPUT_CHARS + 1);
        assert!(matches!(
            matcher.evaluate(&raw),
            Err(InputError::SanitizeFailed(_))
        ));
    }

    #[test]
    fn display_never_reads_full_unless_satisfied() {
        let matcher = InputMatcher::new("cat").unwrap();

        let padded = matcher.evaluate("catnip").unwrap();
        assert_eq!(padded.match_ratio, 1.0);
        assert!(!padded.satisfied);
        assert_eq!(padded.percent(), 99);
        assert_eq!(padded.tier(), MatchTier::Near);

        let exact = matcher.evaluate("c\x07at").unwrap();
        assert_eq!(exact.sanitized_input, "cat");
        assert!(exact.satisfied);
        assert_eq!(exact.percent(), 100);
        assert_eq!(exact.tier(), MatchTier::Complete);

        assert_eq!(matcher.evaluate("ca").unwrap().percent(), 67);
    }
}
