/// Byte index of the first `delimiter` that is outside `${...}` interpolation
/// and outside `<...>` tags. User text can nest braces in both, so a literal
/// split character inside either must not count as a delimiter.
pub fn smart_index_of(text: &str, delimiter: char) -> Option<usize> {
    let mut interp_depth = 0usize;
    let mut angle_depth = 0usize;
    let mut previous = '\0';
    for (index, ch) in text.char_indices() {
        if ch == '{' && previous == '$' {
            interp_depth += 1;
        } else if ch == '}' && interp_depth > 0 {
            interp_depth -= 1;
        } else if ch == '<' {
            angle_depth += 1;
        } else if ch == '>' && angle_depth > 0 {
            angle_depth -= 1;
        } else if ch == delimiter && interp_depth == 0 && angle_depth == 0 {
            return Some(index);
        }
        previous = ch;
    }
    None
}

/// Splits at the first smart occurrence of `delimiter`, trimming both halves.
/// When the delimiter is absent the left half is empty and the right half is
/// the whole text.
pub fn split_with(text: &str, delimiter: char) -> (String, String) {
    match smart_index_of(text, delimiter) {
        Some(index) => (
            text[..index].trim().to_string(),
            text[index + delimiter.len_utf8()..].trim().to_string(),
        ),
        None => (String::new(), text.trim().to_string()),
    }
}

#[cfg(test)]
mod split_tests {
    use super::*;

    #[test]
    fn plain_delimiter_splits() {
        assert_eq!(
            split_with("name : value", ':'),
            ("name".to_string(), "value".to_string())
        );
    }

    #[test]
    fn delimiter_inside_interpolation_is_ignored() {
        assert_eq!(smart_index_of("${a:b}", ':'), None);
        assert_eq!(
            split_with("x: ${map:key} rest", ':'),
            ("x".to_string(), "${map:key} rest".to_string())
        );
    }

    #[test]
    fn delimiter_inside_angle_tag_is_ignored() {
        assert_eq!(
            split_with("<ruby:x>label: text", ':'),
            ("<ruby:x>label".to_string(), "text".to_string())
        );
    }

    #[test]
    fn missing_delimiter_yields_empty_left_half() {
        assert_eq!(
            split_with("just text", ':'),
            (String::new(), "just text".to_string())
        );
    }
}
