//! SASLprep (RFC 4013), the stringprep (RFC 3454) profile applied to usernames and passwords
//! before they enter a SCRAM computation.

use std::borrow::Cow;

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

mod tables;

/// Whether unassigned code points are acceptable.
///
/// RFC 3454 section 7: queries may contain unassigned code points, stored strings must not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Unassigned code points pass through.
    Query,
    /// Unassigned code points are rejected.
    Stored,
}

/// The rule a string broke during preparation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Prohibited {
    /// A code point from one of the prohibited output classes.
    #[error("prohibited character U+{:04X}", code_point(.0))]
    Character(char),
    /// A code point unassigned in Unicode 3.2, only rejected in `Mode::Stored`.
    #[error("unassigned code point U+{:04X}", code_point(.0))]
    Unassigned(char),
    /// The string violates the bidirectional text rule.
    #[error("prohibited bidirectional text")]
    Bidi,
}

fn code_point(c: &char) -> u32 {
    u32::from(*c)
}

/// Prepares `input` according to SASLprep.
///
/// Returns the input unchanged (borrowed) when it is printable ASCII, since no step of the
/// profile alters such strings.
///
/// # Errors
///
/// Returns the [`Prohibited`] rule the normalized string violates.
pub fn prepare(input: &str, mode: Mode) -> Result<Cow<'_, str>, Prohibited> {
    if input.bytes().all(|b| (0x20..0x7F).contains(&b)) {
        return Ok(Cow::Borrowed(input));
    }

    let mapped: String = input.chars().filter_map(map).collect();
    let normalized: String = mapped.nfkc().collect();

    if let Some(c) = normalized.chars().find(|&c| prohibited(c)) {
        return Err(Prohibited::Character(c));
    }
    if mode == Mode::Stored {
        if let Some(c) = normalized.chars().find(|&c| tables::unassigned(c)) {
            return Err(Prohibited::Unassigned(c));
        }
    }
    if !bidi_ok(&normalized) {
        return Err(Prohibited::Bidi);
    }

    Ok(Cow::Owned(normalized))
}

// RFC 4013 section 2.1
fn map(c: char) -> Option<char> {
    if tables::non_ascii_space(c) {
        Some(' ')
    } else if tables::commonly_mapped_to_nothing(c) {
        None
    } else {
        Some(c)
    }
}

// RFC 4013 section 2.3
fn prohibited(c: char) -> bool {
    tables::non_ascii_space(c)
        || tables::ascii_control(c)
        || tables::non_ascii_control(c)
        || tables::private_use(c)
        || tables::non_character(c)
        || tables::surrogate(c)
        || tables::inappropriate_for_plain_text(c)
        || tables::inappropriate_for_canonical(c)
        || tables::changes_display(c)
        || tables::tagging(c)
}

/// RFC 3454 section 6: a string holding any RandALCat character holds no LCat character, and
/// starts and ends with a RandALCat character.
fn bidi_ok(s: &str) -> bool {
    if !s.chars().any(tables::bidi_r_or_al) {
        return true;
    }
    if s.chars().any(tables::bidi_l) {
        return false;
    }
    let first = s.chars().next().map_or(false, tables::bidi_r_or_al);
    let last = s.chars().next_back().map_or(false, tables::bidi_r_or_al);
    first && last
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    // RFC 4013 section 3.
    #[rstest]
    #[case("I\u{00AD}X", "IX")]
    #[case("user", "user")]
    #[case("USER", "USER")]
    #[case("\u{00AA}", "a")]
    #[case("\u{2168}", "IX")]
    #[case("a\u{00A0}b", "a b")]
    #[case("pa\u{FE0F}ss", "pass")]
    #[case("\u{0627}\u{0628}", "\u{0627}\u{0628}")]
    #[case("", "")]
    fn prepares(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(prepare(input, Mode::Stored).unwrap(), expected);
    }

    #[rstest]
    #[case("\u{0007}", Prohibited::Character('\u{0007}'))]
    #[case("a\u{0085}", Prohibited::Character('\u{0085}'))]
    #[case("\u{E000}", Prohibited::Character('\u{E000}'))]
    #[case("\u{FFFF}", Prohibited::Character('\u{FFFF}'))]
    #[case("x\u{200E}", Prohibited::Character('\u{200E}'))]
    #[case("\u{E0041}", Prohibited::Character('\u{E0041}'))]
    #[case("\u{2FF0}", Prohibited::Character('\u{2FF0}'))]
    #[case("\u{0627}\u{0031}", Prohibited::Bidi)]
    #[case("\u{0031}\u{0627}", Prohibited::Bidi)]
    #[case("\u{05D0}a\u{05D0}", Prohibited::Bidi)]
    fn rejects(#[case] input: &str, #[case] expected: Prohibited) {
        assert_eq!(prepare(input, Mode::Query).unwrap_err(), expected);
    }

    #[test]
    fn unassigned_only_rejected_when_stored() {
        // U+0221 was unassigned in Unicode 3.2.
        let input = "a\u{0221}";
        assert_eq!(prepare(input, Mode::Query).unwrap(), input);
        assert_eq!(prepare(input, Mode::Stored).unwrap_err(), Prohibited::Unassigned('\u{0221}'));
    }

    #[test]
    fn bidi_rule_uses_unicode_3_2_classes() {
        // U+0221 is a left-to-right letter today, but has no bidi class in Unicode 3.2.
        let input = "\u{05D0}\u{0221}\u{05D0}";
        assert_eq!(prepare(input, Mode::Query).unwrap(), input);
    }

    #[test]
    fn ascii_is_borrowed() {
        assert!(matches!(prepare("pencil", Mode::Stored).unwrap(), Cow::Borrowed("pencil")));
        assert!(prepare("tab\there", Mode::Stored).is_err());
    }

    #[rstest]
    #[case("I\u{00AD}X")]
    #[case("\u{2168}\u{00A0}\u{FB01}")]
    #[case("Stra\u{00DF}e")]
    #[case("\u{212B}ngstr\u{00F6}m")]
    #[case("\u{0627}\u{0644}\u{0639}\u{0631}\u{0628}\u{064A}\u{0629}")]
    #[case("\u{FF21}\u{FF22}\u{3000}c")]
    fn idempotent(#[case] input: &str) {
        let once = prepare(input, Mode::Stored).unwrap().into_owned();
        let twice = prepare(&once, Mode::Stored).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn display_names_code_point() {
        assert_eq!(Prohibited::Character('\u{7}').to_string(), "prohibited character U+0007");
    }
}
