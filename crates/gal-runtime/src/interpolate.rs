use std::sync::OnceLock;

use regex::Regex;

use gal_vars::VarsFrame;

fn interp_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\$\{([^{}]*)\}").expect("interpolation regex must compile"))
}

/// `\n` becomes a newline and `\\` a literal backslash; other escapes pass
/// through untouched.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Substitutes every `${expr}` with its evaluated value, then applies the
/// escapes. A failed expression records a warning and leaves its text in
/// place.
pub fn interpolate(text: &str, env: &mut VarsFrame, warnings: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for captures in interp_regex().captures_iter(text).collect::<Vec<_>>() {
        let whole = captures.get(0).expect("capture 0 always exists");
        let expr = &captures[1];
        out.push_str(&text[last..whole.start()]);
        match env.evaluate(expr) {
            Ok(value) => out.push_str(&value.to_string()),
            Err(error) => {
                warnings.push(error.message);
                out.push_str(whole.as_str());
            }
        }
        last = whole.end();
    }
    out.push_str(&text[last..]);
    unescape(&out)
}

#[cfg(test)]
mod interpolate_tests {
    use super::*;
    use gal_core::GalValue;
    use gal_vars::Builtins;

    fn frame() -> VarsFrame {
        let mut frame = VarsFrame::new(Builtins::standard_seeded(0));
        frame
            .set_var("name", GalValue::Str("Ada".to_string()))
            .expect("set_var works");
        frame
            .set_var("hp", GalValue::Num(2.5))
            .expect("set_var works");
        frame
    }

    #[test]
    fn expressions_substitute_into_text() {
        let mut warnings = Vec::new();
        let text = interpolate("${name} has ${hp*2} hp", &mut frame(), &mut warnings);
        assert_eq!(text, "Ada has 5 hp");
        assert!(warnings.is_empty());
    }

    #[test]
    fn failed_expressions_stay_and_warn() {
        let mut warnings = Vec::new();
        let text = interpolate("oops ${missing}", &mut frame(), &mut warnings);
        assert_eq!(text, "oops ${missing}");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("missing"));
    }

    #[test]
    fn escapes_apply_after_substitution() {
        let mut warnings = Vec::new();
        let text = interpolate("a\\nb \\\\n", &mut frame(), &mut warnings);
        assert_eq!(text, "a\nb \\n");
    }
}
