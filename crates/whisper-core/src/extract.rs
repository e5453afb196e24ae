//! Target extraction: find the addressee of a whisper in free-form query text.
//!
//! Matchers run in a fixed priority order and the first one that matches wins.
//! Later matchers are fallbacks, never combined with earlier ones.

use regex::Regex;

use crate::{domain::AddresseeReference, errors::Error, Result};

/// Character that introduces a handle (`@username`).
pub const HANDLE_SIGIL: char = '@';

/// Longest digit run that can still be a numeric id (`i64::MAX` has 19 digits).
const MAX_NUMERIC_LENGTH: usize = 19;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatcherKind {
    /// `@handle` at the very end of the text.
    TrailingHandle,
    /// Digit run at the very end of the text.
    TrailingNumeric,
    /// First `@handle` anywhere.
    AnyHandle,
    /// First qualifying digit run anywhere.
    AnyNumeric,
}

impl MatcherKind {
    pub const DEFAULT_ORDER: [MatcherKind; 4] = [
        MatcherKind::TrailingHandle,
        MatcherKind::TrailingNumeric,
        MatcherKind::AnyHandle,
        MatcherKind::AnyNumeric,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trailing_handle" => Some(Self::TrailingHandle),
            "trailing_numeric" => Some(Self::TrailingNumeric),
            "any_handle" => Some(Self::AnyHandle),
            "any_numeric" => Some(Self::AnyNumeric),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::TrailingHandle => "trailing_handle",
            Self::TrailingNumeric => "trailing_numeric",
            Self::AnyHandle => "any_handle",
            Self::AnyNumeric => "any_numeric",
        }
    }
}

/// Tunable thresholds of the extractor.
///
/// Handle lengths count the characters after the sigil. Digit runs shorter than
/// `min_numeric_length` are never treated as ids, so ordinary numbers in a
/// message ("meet at 5") stay part of the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractorConfig {
    pub min_handle_length: usize,
    pub max_handle_length: usize,
    pub min_numeric_length: usize,
    pub order: Vec<MatcherKind>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_handle_length: 5,
            max_handle_length: 32,
            min_numeric_length: 8,
            order: MatcherKind::DEFAULT_ORDER.to_vec(),
        }
    }
}

impl ExtractorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_handle_length < 2 {
            return Err(Error::Config(format!(
                "min handle length must be at least 2, got {}",
                self.min_handle_length
            )));
        }
        if self.min_handle_length > self.max_handle_length {
            return Err(Error::Config(format!(
                "min handle length {} exceeds max handle length {}",
                self.min_handle_length, self.max_handle_length
            )));
        }
        if self.min_numeric_length == 0 || self.min_numeric_length > MAX_NUMERIC_LENGTH {
            return Err(Error::Config(format!(
                "min numeric length must be within 1..={MAX_NUMERIC_LENGTH}, got {}",
                self.min_numeric_length
            )));
        }
        if self.order.is_empty() {
            return Err(Error::Config("matcher order is empty".to_string()));
        }
        Ok(())
    }
}

/// Result of running the extractor over one query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extraction {
    pub reference: AddresseeReference,
    pub body: String,
}

impl Extraction {
    fn unresolved(text: &str) -> Self {
        Self {
            reference: AddresseeReference::Unresolved,
            body: text.to_string(),
        }
    }
}

pub struct TargetExtractor {
    order: Vec<MatcherKind>,
    trailing_handle: Regex,
    trailing_numeric: Regex,
    any_handle: Regex,
    any_numeric: Regex,
}

impl TargetExtractor {
    pub fn new(cfg: &ExtractorConfig) -> Result<Self> {
        cfg.validate()?;

        // The first handle character is a letter; the rest fill the remaining length.
        let handle = format!(
            "{HANDLE_SIGIL}([A-Za-z][A-Za-z0-9_]{{{},{}}})",
            cfg.min_handle_length - 1,
            cfg.max_handle_length - 1
        );
        let digits = format!("([0-9]{{{},{MAX_NUMERIC_LENGTH}}})", cfg.min_numeric_length);

        Ok(Self {
            order: cfg.order.clone(),
            trailing_handle: compile(&format!(r"(?:^|\s){handle}\s*$"))?,
            trailing_numeric: compile(&format!(r"(?:^|\s){digits}\s*$"))?,
            any_handle: compile(&format!(r"(?:^|\s){handle}\b"))?,
            any_numeric: compile(&format!(r"\b{digits}\b"))?,
        })
    }

    /// Split `text` into an addressee reference and the message body.
    ///
    /// Total and deterministic: every input yields a body, and an input without a
    /// qualifying reference comes back unchanged as `Unresolved`.
    pub fn extract(&self, text: &str) -> Extraction {
        if text.trim().is_empty() {
            return Extraction::unresolved(text);
        }

        self.order
            .iter()
            .find_map(|kind| self.run(*kind, text))
            .unwrap_or_else(|| Extraction::unresolved(text))
    }

    fn run(&self, kind: MatcherKind, text: &str) -> Option<Extraction> {
        match kind {
            MatcherKind::TrailingHandle => {
                let caps = self.trailing_handle.captures(text)?;
                let whole = caps.get(0)?;
                Some(Extraction {
                    reference: AddresseeReference::Handle(caps[1].to_string()),
                    body: text[..whole.start()].trim().to_string(),
                })
            }
            MatcherKind::TrailingNumeric => {
                let caps = self.trailing_numeric.captures(text)?;
                let whole = caps.get(0)?;
                let id = caps[1].parse::<i64>().ok()?;
                Some(Extraction {
                    reference: AddresseeReference::NumericId(id),
                    body: text[..whole.start()].trim().to_string(),
                })
            }
            MatcherKind::AnyHandle => {
                let caps = self.any_handle.captures(text)?;
                let name = caps.get(1)?;
                // Span of `@name`: the sigil sits right before the capture.
                let start = name.start() - HANDLE_SIGIL.len_utf8();
                Some(Extraction {
                    reference: AddresseeReference::Handle(name.as_str().to_string()),
                    body: remove_span(text, start, name.end()),
                })
            }
            MatcherKind::AnyNumeric => {
                // A run too large for an id is skipped, not fatal to the matcher.
                let (run, id) = self.any_numeric.captures_iter(text).find_map(|caps| {
                    let run = caps.get(1)?;
                    let id = run.as_str().parse::<i64>().ok()?;
                    Some((run, id))
                })?;
                Some(Extraction {
                    reference: AddresseeReference::NumericId(id),
                    body: remove_span(text, run.start(), run.end()),
                })
            }
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Config(format!("invalid extractor pattern: {e}")))
}

/// Cut `text[start..end]` out and rejoin the halves with one of the separators
/// that surrounded it (the preceding one if there was any).
fn remove_span(text: &str, start: usize, end: usize) -> String {
    let raw_before = &text[..start];
    let raw_after = &text[end..];
    let before = raw_before.trim_end();
    let after = raw_after.trim_start();
    if before.trim_start().is_empty() {
        return after.trim_end().to_string();
    }
    if after.trim_end().is_empty() {
        return before.trim_start().to_string();
    }

    let sep = match &raw_before[before.len()..] {
        "" => &raw_after[..raw_after.len() - after.len()],
        sep => sep,
    };
    format!("{}{sep}{}", before.trim_start(), after.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> TargetExtractor {
        TargetExtractor::new(&ExtractorConfig::default()).unwrap()
    }

    fn handle(s: &str) -> AddresseeReference {
        AddresseeReference::Handle(s.to_string())
    }

    #[test]
    fn trailing_handle_is_stripped_from_body() {
        let x = extractor().extract("Hello there @shribots");
        assert_eq!(x.reference, handle("shribots"));
        assert_eq!(x.body, "Hello there");
    }

    #[test]
    fn trailing_numeric_id_is_stripped_from_body() {
        let x = extractor().extract("Meet me 81726354");
        assert_eq!(x.reference, AddresseeReference::NumericId(81726354));
        assert_eq!(x.body, "Meet me");
    }

    #[test]
    fn short_number_is_not_an_id() {
        let x = extractor().extract("12");
        assert_eq!(x.reference, AddresseeReference::Unresolved);
        assert_eq!(x.body, "12");

        let x = extractor().extract("see you at 1230");
        assert_eq!(x.reference, AddresseeReference::Unresolved);
        assert_eq!(x.body, "see you at 1230");
    }

    #[test]
    fn empty_and_whitespace_input_is_unresolved_and_kept() {
        for text in ["", "   ", "\n\t"] {
            let x = extractor().extract(text);
            assert_eq!(x.reference, AddresseeReference::Unresolved);
            assert_eq!(x.body, text);
        }
    }

    #[test]
    fn trailing_numeric_beats_handle_in_the_middle() {
        let x = extractor().extract("ping @someone about 123456789");
        assert_eq!(x.reference, AddresseeReference::NumericId(123456789));
        assert_eq!(x.body, "ping @someone about");
    }

    #[test]
    fn handle_anywhere_removes_first_occurrence_only() {
        let x = extractor().extract("@alice_01 see you, @bobby_02 says hi.");
        assert_eq!(x.reference, handle("alice_01"));
        assert_eq!(x.body, "see you, @bobby_02 says hi.");

        let x = extractor().extract("tell @someone, hi");
        assert_eq!(x.reference, handle("someone"));
        assert_eq!(x.body, "tell , hi");
    }

    #[test]
    fn numeric_anywhere_removes_the_digit_run() {
        let x = extractor().extract("for 987654321 only.");
        assert_eq!(x.reference, AddresseeReference::NumericId(987654321));
        assert_eq!(x.body, "for only.");
    }

    #[test]
    fn handle_length_bounds_are_enforced() {
        // Too short (4 chars) and starting with a digit never match.
        assert_eq!(
            extractor().extract("hi @abcd").reference,
            AddresseeReference::Unresolved
        );
        assert_eq!(
            extractor().extract("hi @1abcde").reference,
            AddresseeReference::Unresolved
        );

        let long = "a".repeat(33);
        let x = extractor().extract(&format!("hi @{long}"));
        assert_eq!(x.reference, AddresseeReference::Unresolved);

        let max = "b".repeat(32);
        let x = extractor().extract(&format!("hi @{max}"));
        assert_eq!(x.reference, handle(&max));
    }

    #[test]
    fn email_like_text_is_not_a_handle() {
        let x = extractor().extract("write to me@example.org");
        assert_eq!(x.reference, AddresseeReference::Unresolved);
    }

    #[test]
    fn digit_run_too_large_for_an_id_is_ignored() {
        let x = extractor().extract("code 99999999999999999999");
        assert_eq!(x.reference, AddresseeReference::Unresolved);
    }

    #[test]
    fn oversized_run_does_not_hide_a_later_id() {
        let x = extractor().extract("code 9999999999999999999 for 12345678 now");
        assert_eq!(x.reference, AddresseeReference::NumericId(12345678));
        assert_eq!(x.body, "code 9999999999999999999 for now");
    }

    #[test]
    fn removed_reference_keeps_line_breaks() {
        let x = extractor().extract("line one\n@alice_01\nline two");
        assert_eq!(x.reference, handle("alice_01"));
        assert_eq!(x.body, "line one\nline two");

        let x = extractor().extract("first line\n87654321 second line");
        assert_eq!(x.reference, AddresseeReference::NumericId(87654321));
        assert_eq!(x.body, "first line\nsecond line");
    }

    #[test]
    fn reference_only_yields_empty_body() {
        let x = extractor().extract("@shribots");
        assert_eq!(x.reference, handle("shribots"));
        assert_eq!(x.body, "");
    }

    #[test]
    fn thresholds_are_configurable() {
        let cfg = ExtractorConfig {
            min_numeric_length: 2,
            ..ExtractorConfig::default()
        };
        let x = TargetExtractor::new(&cfg).unwrap().extract("hey 12");
        assert_eq!(x.reference, AddresseeReference::NumericId(12));
        assert_eq!(x.body, "hey");
    }

    #[test]
    fn order_is_configurable() {
        let cfg = ExtractorConfig {
            order: vec![MatcherKind::AnyHandle, MatcherKind::TrailingNumeric],
            ..ExtractorConfig::default()
        };
        let x = TargetExtractor::new(&cfg)
            .unwrap()
            .extract("ping @someone about 123456789");
        assert_eq!(x.reference, handle("someone"));
        assert_eq!(x.body, "ping about 123456789");
    }

    #[test]
    fn extraction_is_deterministic() {
        let ex = extractor();
        for text in ["a @bcdefg b", "x 12345678 y", "nothing", ""] {
            assert_eq!(ex.extract(text), ex.extract(text));
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = ExtractorConfig {
            min_handle_length: 10,
            max_handle_length: 5,
            ..ExtractorConfig::default()
        };
        assert!(TargetExtractor::new(&cfg).is_err());

        let cfg = ExtractorConfig {
            min_numeric_length: 20,
            ..ExtractorConfig::default()
        };
        assert!(TargetExtractor::new(&cfg).is_err());
    }

    #[test]
    fn matcher_names_round_trip() {
        for kind in MatcherKind::DEFAULT_ORDER {
            assert_eq!(MatcherKind::parse(kind.name()), Some(kind));
        }
        assert_eq!(MatcherKind::parse("nope"), None);
    }
}
