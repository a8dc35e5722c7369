//! Helpers for comparing free-text names typed by different people.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s]+").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Trailing words dropped from business names, longest first.
const COMPANY_SUFFIXES: &[&str] = &["pty ltd", "pty", "ltd", "limited", "inc", "llc", "co"];

/// Collapses runs of whitespace and trims the ends.
pub fn squash_whitespace(input: &str) -> String {
    WHITESPACE.replace_all(input.trim(), " ").into_owned()
}

/// Canonical form of a business name so "Smith & Sons Pty. Ltd." and
/// "smith and sons" compare equal.
pub fn normalize_business_name(input: &str) -> String {
    let lowered = input.to_lowercase().replace('&', " and ");
    let stripped = NON_ALNUM.replace_all(&lowered, " ");
    let mut name = squash_whitespace(&stripped);

    loop {
        let before = name.len();
        for suffix in COMPANY_SUFFIXES {
            let Some(rest) = name.strip_suffix(suffix) else {
                continue;
            };
            if rest.ends_with(' ') && !rest.trim().is_empty() {
                name = rest.trim_end().to_string();
                break;
            }
        }
        if name.len() == before {
            return name;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_punctuation_and_suffixes() {
        assert_eq!(
            normalize_business_name("  Smith & Sons Pty. Ltd. "),
            "smith and sons"
        );
        assert_eq!(normalize_business_name("SMITH AND SONS"), "smith and sons");
        assert_eq!(normalize_business_name("Acme Earthworks Inc"), "acme earthworks");
    }

    #[test]
    fn keeps_suffix_words_inside_names() {
        assert_eq!(normalize_business_name("Coastal Co Haulage"), "coastal co haulage");
        assert_eq!(normalize_business_name("Costco"), "costco");
    }

    #[test]
    fn keeps_non_ascii_letters() {
        assert_eq!(normalize_business_name("Müller Haulage"), "müller haulage");
        assert_ne!(
            normalize_business_name("Müller Haulage"),
            normalize_business_name("Möller Haulage")
        );
        assert_eq!(normalize_business_name("北京 Pty Ltd"), "北京");
        assert_ne!(
            normalize_business_name("北京 Pty Ltd"),
            normalize_business_name("上海 Pty Ltd")
        );
        assert_eq!(normalize_business_name("Ōtaki Earthmoving Ltd."), "ōtaki earthmoving");
    }

    #[test]
    fn never_strips_to_empty() {
        assert_eq!(normalize_business_name("Co"), "co");
        assert_eq!(normalize_business_name("Pty Ltd"), "pty");
    }
}
