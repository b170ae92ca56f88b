//! Metaphone phonetic keys.

use rphonetic::{Encoder, Metaphone};

/// Metaphone code for a token; non-letters are ignored.
///
/// Codes are not truncated, so long names keep every consonant group.
/// Returns an empty string when the token has no ASCII letters.
pub fn phonetic_key(token: &str) -> String {
    let letters: String = token
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if letters.is_empty() {
        return String::new();
    }

    let metaphone = Metaphone::new(None);
    metaphone.encode(&letters)
}

/// Two phonetic codes match when they are identical and non-empty.
pub fn codes_match(code1: &str, code2: &str) -> bool {
    !code1.is_empty() && code1 == code2
}
