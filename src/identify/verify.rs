//! Verification
//!
//! Text normalization and similarity scoring of recognized text against the
//! canonical corpus text of a candidate reference.

use std::collections::HashSet;
use std::str::FromStr;

use unicode_normalization::UnicodeNormalization;

/// Script the normalized text is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Script {
    /// Hebrew consonants (vowel points and cantillation are stripped)
    #[default]
    Hebrew,
    /// ASCII letters and digits
    Latin,
    Greek,
    /// Any alphanumeric character
    Any,
}

impl Script {
    fn contains(self, c: char) -> bool {
        match self {
            Script::Hebrew => matches!(c, '\u{05D0}'..='\u{05EA}' | '\u{05F0}'..='\u{05F2}'),
            Script::Latin => c.is_ascii_alphanumeric(),
            Script::Greek => matches!(c, '\u{0370}'..='\u{03FF}' | '\u{1F00}'..='\u{1FFF}') && c.is_alphabetic(),
            Script::Any => c.is_alphanumeric(),
        }
    }
}

impl FromStr for Script {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hebrew" | "he" => Ok(Script::Hebrew),
            "latin" | "en" => Ok(Script::Latin),
            "greek" | "el" => Ok(Script::Greek),
            "any" | "" => Ok(Script::Any),
            other => Err(format!("unknown script: {}", other)),
        }
    }
}

/// Normalizes text for comparison
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer {
    script: Script,
}

impl TextNormalizer {
    pub fn new(script: Script) -> Self {
        Self { script }
    }

    pub fn script(&self) -> Script {
        self.script
    }

    /// Decompose, drop diacritics, lowercase, keep only script characters and
    /// collapse everything else into single spaces.
    pub fn normalize(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut pending_space = false;
        for c in text
            .nfkd()
            .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
            .flat_map(char::to_lowercase)
        {
            if self.script.contains(c) {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
            } else {
                pending_space = true;
            }
        }
        out
    }
}

fn trigrams(text: &str) -> Vec<[char; 3]> {
    let chars: Vec<char> = text.chars().collect();
    chars.windows(3).map(|w| [w[0], w[1], w[2]]).collect()
}

/// Similarity of `input` to `canonical`, both already normalized.
///
/// 1.0 when the input is a substring of the canonical text, otherwise the
/// fraction of input character trigrams (counted with repetition) that occur
/// anywhere in the canonical text. Empty input scores 0.
pub fn verification_score(input: &str, canonical: &str) -> f64 {
    if input.is_empty() || canonical.is_empty() {
        return 0.0;
    }
    if canonical.contains(input) {
        return 1.0;
    }

    let input_grams = trigrams(input);
    if input_grams.is_empty() {
        return 0.0;
    }
    let canonical_grams: HashSet<[char; 3]> = trigrams(canonical).into_iter().collect();
    let found = input_grams
        .iter()
        .filter(|g| canonical_grams.contains(*g))
        .count();
    found as f64 / input_grams.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hebrew_points_and_punctuation_removed() {
        let n = TextNormalizer::new(Script::Hebrew);
        // Genesis 1:1 opening with vowel points, cantillation and sof pasuq
        assert_eq!(n.normalize("בְּרֵאשִׁ֖ית בָּרָ֣א אֱלֹהִ֑ים׃"), "בראשית ברא אלהים");
        assert_eq!(n.normalize("  ...  "), "");
    }

    #[test]
    fn test_latin_normalization() {
        let n = TextNormalizer::new(Script::Latin);
        assert_eq!(n.normalize("In the Beginning, God   created!"), "in the beginning god created");
        assert_eq!(n.normalize("Café, naïve"), "cafe naive");
    }

    #[test]
    fn test_identical_text_scores_one() {
        assert_eq!(verification_score("abc def", "xx abc def yy"), 1.0);
        assert_eq!(verification_score("abc def", "abc def"), 1.0);
    }

    #[test]
    fn test_disjoint_text_scores_zero() {
        assert_eq!(verification_score("abcdef", "uvwxyz"), 0.0);
        assert_eq!(verification_score("", "abc"), 0.0);
    }

    #[test]
    fn test_score_is_overlap_fraction() {
        // trigrams of "abcxyz": abc bcx cxy xyz; only "abc" occurs in the canonical text
        assert_eq!(verification_score("abcxyz", "abcd"), 0.25);
    }

    #[test]
    fn test_score_monotonic_in_overlap() {
        let canonical = "the quick brown fox jumps over the lazy dog";
        let inputs = [
            "zzzzzzzzzzzzzzzzzz",
            "the quick zzzzzzzz",
            "the quick brown zz",
            "the quick brown fo",
        ];
        let scores: Vec<f64> = inputs.iter().map(|i| verification_score(i, canonical)).collect();
        assert!(scores.windows(2).all(|w| w[0] < w[1]), "{:?}", scores);
        assert_eq!(scores[3], 1.0);
    }

    #[test]
    fn test_script_from_str() {
        assert_eq!("Hebrew".parse::<Script>().unwrap(), Script::Hebrew);
        assert_eq!("any".parse::<Script>().unwrap(), Script::Any);
        assert!("klingon".parse::<Script>().is_err());
    }
}
