//! ARPABET phoneme symbol helpers.

/// Strip the numeric stress marker from an ARPABET symbol.
///
/// `AH0` → `AH`, `OW1` → `OW`, `K` → `K`. Stress does not change the mouth
/// shape, so lookups always return bare symbols.
pub fn strip_stress(symbol: &str) -> &str {
    symbol.trim_end_matches(|c: char| c.is_ascii_digit())
}

/// Returns true if `symbol` (after stress stripping) looks like an ARPABET
/// phoneme: one to three ASCII letters.
pub fn is_valid_symbol(symbol: &str) -> bool {
    let bare = strip_stress(symbol);
    (1..=3).contains(&bare.len()) && bare.bytes().all(|b| b.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_single_stress_digit() {
        assert_eq!(strip_stress("AH0"), "AH");
        assert_eq!(strip_stress("OW1"), "OW");
        assert_eq!(strip_stress("ER2"), "ER");
    }

    #[test]
    fn consonants_are_unchanged() {
        assert_eq!(strip_stress("HH"), "HH");
        assert_eq!(strip_stress("K"), "K");
    }

    #[test]
    fn validates_symbols() {
        assert!(is_valid_symbol("AH0"));
        assert!(is_valid_symbol("NG"));
        assert!(!is_valid_symbol("0"));
        assert!(!is_valid_symbol("A-B"));
        assert!(!is_valid_symbol("TOOLONG"));
    }
}
