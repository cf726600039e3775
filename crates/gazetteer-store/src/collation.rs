//! Collation-aware string comparison.
//!
//! Names are compared the way a case-insensitive database collation would order them:
//! letters are folded to lower case and weighted by their position in the collation's
//! alphabet. Accented letters that are not part of the alphabet sort with their base letter.
//! Swedish and Estonian place their national letters after `z` (or, for Estonian, in the
//! middle of the alphabet) instead of folding them.

use std::cmp::Ordering;

const LETTER_BASE: u32 = 0x1_0000;
const FOREIGN_BASE: u32 = 0x10_0000;

const GENERAL_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";
const SWEDISH_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyzåäö";
const ESTONIAN_ALPHABET: &str = "abcdefghijklmnopqrsšzžtuvwõäöüxy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Collation {
    #[default]
    General,
    Swedish,
    Estonian,
    /// Plain code point order, case sensitive.
    Binary,
}

impl Collation {
    pub const GENERAL_NAME: &'static str = "utf8_general_ci";
    pub const SWEDISH_NAME: &'static str = "utf8_swedish_ci";
    pub const ESTONIAN_NAME: &'static str = "utf8_estonian_ci";
    pub const BINARY_NAME: &'static str = "utf8_bin";

    /// Map a collation name to its comparison rules. Unknown names compare like the
    /// general collation.
    pub fn from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name.contains("swedish") || name.starts_with("sv") {
            Self::Swedish
        } else if name.contains("estonian") || name.starts_with("et") {
            Self::Estonian
        } else if name.ends_with("_bin") || name == "c" || name == "binary" {
            Self::Binary
        } else {
            Self::General
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::General => Self::GENERAL_NAME,
            Self::Swedish => Self::SWEDISH_NAME,
            Self::Estonian => Self::ESTONIAN_NAME,
            Self::Binary => Self::BINARY_NAME,
        }
    }

    const fn alphabet(self) -> &'static str {
        match self {
            Self::Swedish => SWEDISH_ALPHABET,
            Self::Estonian => ESTONIAN_ALPHABET,
            Self::General | Self::Binary => GENERAL_ALPHABET,
        }
    }

    /// Letters treated as another letter of the alphabet rather than folded to ASCII.
    const fn alias(self, c: char) -> Option<char> {
        match (self, c) {
            (Self::Swedish, 'æ') => Some('ä'),
            (Self::Swedish, 'ø') => Some('ö'),
            (Self::Swedish, 'ü') => Some('y'),
            (Self::Estonian, 'ø') => Some('ö'),
            _ => None,
        }
    }

    /// Primary weights of `s`. Two strings with equal weights are equal under the collation.
    pub fn weights(self, s: &str) -> Vec<u32> {
        if self == Self::Binary {
            return s.chars().map(u32::from).collect();
        }
        let alphabet = self.alphabet();
        let mut weights = Vec::with_capacity(s.len());
        for c in s.chars().flat_map(char::to_lowercase) {
            let c = self.alias(c).unwrap_or(c);
            if let Some(position) = alphabet.chars().position(|letter| letter == c) {
                weights.push(LETTER_BASE + position as u32);
            } else if c.is_ascii() {
                weights.push(u32::from(c));
            } else if let Some(folded) = deunicode::deunicode_char(c) {
                for f in folded.chars().flat_map(char::to_lowercase) {
                    match alphabet.chars().position(|letter| letter == f) {
                        Some(position) => weights.push(LETTER_BASE + position as u32),
                        None => weights.push(u32::from(f)),
                    }
                }
            } else {
                weights.push(FOREIGN_BASE + u32::from(c));
            }
        }
        weights
    }

    /// Total order over strings. Strings equal under the collation fall back to code point
    /// order so that sorting is deterministic.
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        if self == Self::Binary {
            return a.cmp(b);
        }
        self.weights(a)
            .cmp(&self.weights(b))
            .then_with(|| a.cmp(b))
    }

    /// Equality under the collation (case insensitive, and accent insensitive where the
    /// collation folds accents).
    pub fn equals(self, a: &str, b: &str) -> bool {
        if self == Self::Binary {
            return a == b;
        }
        a == b || self.weights(a) == self.weights(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(Collation::from_name("utf8_general_ci"), Collation::General);
        assert_eq!(Collation::from_name("utf8_swedish_ci"), Collation::Swedish);
        assert_eq!(Collation::from_name("UTF8_ESTONIAN_CI"), Collation::Estonian);
        assert_eq!(Collation::from_name("utf8_bin"), Collation::Binary);
        assert_eq!(Collation::from_name("something_else"), Collation::General);
    }

    #[test]
    fn test_general_is_case_and_accent_insensitive() {
        let c = Collation::General;
        assert!(c.equals("helsinki", "HELSINKI"));
        assert!(c.equals("Ähtäri", "ahtari"));
        assert_eq!(c.compare("Espoo", "helsinki"), Ordering::Less);
        assert_eq!(c.compare("Äänekoski", "Oulu"), Ordering::Less);
    }

    #[test]
    fn test_swedish_places_national_letters_last() {
        let c = Collation::Swedish;
        assert_eq!(c.compare("Ähtäri", "Zürich"), Ordering::Greater);
        assert_eq!(c.compare("Åbo", "Ähtäri"), Ordering::Less);
        assert_eq!(c.compare("Ähtäri", "Östersund"), Ordering::Less);
        assert!(c.equals("ÅBO", "åbo"));
        assert!(!c.equals("åbo", "abo"));
    }

    #[test]
    fn test_estonian_alphabet() {
        let c = Collation::Estonian;
        // z sorts between s and t
        assert_eq!(c.compare("Zooloogia", "Tartu"), Ordering::Less);
        assert_eq!(c.compare("Saaremaa", "Zooloogia"), Ordering::Less);
        // õ ä ö ü come after w, before x and y
        assert_eq!(c.compare("Õismäe", "Võru"), Ordering::Greater);
        assert_eq!(c.compare("Õismäe", "Xanadu"), Ordering::Less);
    }

    #[test]
    fn test_binary_is_case_sensitive() {
        let c = Collation::Binary;
        assert!(!c.equals("Oulu", "oulu"));
        assert_eq!(c.compare("Oulu", "oulu"), Ordering::Less);
    }

    #[test]
    fn test_compare_is_total_for_collation_equal_strings() {
        let c = Collation::General;
        assert_ne!(c.compare("Kumpula", "kumpula"), Ordering::Equal);
        assert_eq!(c.compare("Kumpula", "Kumpula"), Ordering::Equal);
    }
}
