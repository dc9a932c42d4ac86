use std::sync::OnceLock;

use regex::Regex;

fn identifier_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("identifier regex must compile")
    })
}

fn discard_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^_+$").expect("discard regex must compile"))
}

pub fn is_identifier(name: &str) -> bool {
    identifier_regex().is_match(name)
}

/// Assignments to a name made of underscores only are discarded.
pub fn is_discard_name(name: &str) -> bool {
    discard_regex().is_match(name)
}

#[cfg(test)]
mod ident_tests {
    use super::*;

    #[test]
    fn identifier_check_accepts_and_rejects() {
        assert!(is_identifier("state"));
        assert!(is_identifier("_hidden2"));
        assert!(!is_identifier("2start"));
        assert!(!is_identifier("with space"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn discard_names_are_underscores_only() {
        assert!(is_discard_name("_"));
        assert!(is_discard_name("___"));
        assert!(!is_discard_name("_x"));
    }
}
