//! Age-text parser: free text to an (age, error) estimate
//!
//! Resolution order, first match wins:
//! 1. `A ± E` (or `A +/- E`): age `A`, error `E`
//! 2. `L - U` (hyphen or en dash): midpoint, half the range
//! 3. a single number: that number with an error of exactly zero
//! 4. no number: `None`
//!
//! The uncertainty form beats a range anywhere in the string, so
//! "300 ± 10 (range 280-320)" reads as 300 ± 10.

use regex::Regex;
use std::sync::LazyLock;

const NUMBER: &str = r"\d+(?:\.\d*)?";

static PLUS_MINUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"({NUMBER})\s*(?:±|\+/-)\s*({NUMBER})")).unwrap()
});
static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"({NUMBER})\s*[-–]\s*({NUMBER})")).unwrap());
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(NUMBER).unwrap());

/// A parsed age with its uncertainty
///
/// `error == 0.0` means the text reported no uncertainty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeEstimate {
    pub age: f64,
    pub error: f64,
}

/// Parse an age description
pub fn parse_age(text: &str) -> Option<AgeEstimate> {
    if let Some(caps) = PLUS_MINUS_RE.captures(text) {
        let age = parse_number(&caps[1])?;
        let error = parse_number(&caps[2])?;
        return Some(AgeEstimate { age, error });
    }

    if let Some(caps) = RANGE_RE.captures(text) {
        let lower = parse_number(&caps[1])?;
        let upper = parse_number(&caps[2])?;
        return Some(AgeEstimate {
            age: (lower + upper) / 2.0,
            error: (upper - lower).abs() / 2.0,
        });
    }

    NUMBER_RE.find(text).and_then(|m| {
        parse_number(m.as_str()).map(|age| AgeEstimate { age, error: 0.0 })
    })
}

// "300." is accepted by the grammar but not by f64::from_str; digit runs
// too long for f64 overflow to infinity
fn parse_number(s: &str) -> Option<f64> {
    s.trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn est(age: f64, error: f64) -> Option<AgeEstimate> {
        Some(AgeEstimate { age, error })
    }

    #[test]
    fn test_plus_minus() {
        assert_eq!(parse_age("300 ± 30"), est(300.0, 30.0));
        assert_eq!(parse_age("~315 ± 34 ka (OSL, quartz)"), est(315.0, 34.0));
        assert_eq!(parse_age("12.5±0.8"), est(12.5, 0.8));
        assert_eq!(parse_age("286 +/- 32 ka"), est(286.0, 32.0));
    }

    #[test]
    fn test_range_midpoint() {
        assert_eq!(parse_age("190 - 320"), est(255.0, 65.0));
        assert_eq!(parse_age("250–500 ka"), est(375.0, 125.0));
        assert_eq!(parse_age("320-190"), est(255.0, 65.0));
    }

    #[test]
    fn test_single_number_has_zero_error() {
        assert_eq!(parse_age("255"), est(255.0, 0.0));
        assert_eq!(parse_age("approx. 100 ka"), est(100.0, 0.0));
        assert_eq!(parse_age("300."), est(300.0, 0.0));
    }

    #[test]
    fn test_no_number() {
        assert_eq!(parse_age("unknown"), None);
        assert_eq!(parse_age(""), None);
        assert_eq!(parse_age("Not dated."), None);
    }

    #[test]
    fn test_overflowing_number_is_not_an_age() {
        let huge = "9".repeat(400);
        assert_eq!(parse_age(&huge), None);
        assert_eq!(parse_age(&format!("{} ± 5", huge)), None);
    }

    #[test]
    fn test_plus_minus_beats_range() {
        assert_eq!(parse_age("300 ± 10 (range 280-320)"), est(300.0, 10.0));
        assert_eq!(parse_age("range 280-320, best 300 ± 10"), est(300.0, 10.0));
    }

    #[test]
    fn test_lone_decimal_point_is_not_a_number() {
        assert_eq!(parse_age(". ka"), None);
        assert_eq!(parse_age("see p. .5"), est(5.0, 0.0));
    }
}
