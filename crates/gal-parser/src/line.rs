use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use gal_core::{
    is_identifier, CaseStatement, GalError, InputKind, JumpKind, MediaPos, MediaStatement,
    Statement, TransformStatement,
};

use crate::split::split_with;

type TagParser = fn(&str) -> Result<Statement, GalError>;

/// `key=value,key=value` configuration lists. Unknown keys are kept here and
/// silently ignored by the per-tag parsers.
pub fn parse_config(configs: &str) -> BTreeMap<String, String> {
    let mut parsed = BTreeMap::new();
    for config in configs.split(',') {
        let Some((key, value)) = config.split_once('=') else {
            continue;
        };
        parsed.insert(key.trim().to_string(), value.trim().to_string());
    }
    parsed
}

/// `f(a,b,c)` -> `("f", ["a", "b", "c"])`; a bare name means no arguments.
pub fn parse_func(text: &str) -> Result<(String, Vec<String>), GalError> {
    let (Some(left), Some(right)) = (text.find('('), text.find(')')) else {
        let name = text.trim().to_string();
        if !is_identifier(&name) {
            return Err(GalError::new(
                "PARSE_FUNC_NAME",
                format!("Invalid func name: {}", name),
            ));
        }
        return Ok((name, Vec::new()));
    };

    let name = text[..left].trim().to_string();
    if !is_identifier(&name) {
        return Err(GalError::new(
            "PARSE_FUNC_NAME",
            format!("Invalid func name: {}", name),
        ));
    }
    let args_part = &text[left + 1..right];
    let args = if args_part.trim().is_empty() {
        Vec::new()
    } else {
        args_part.split(',').map(|arg| arg.trim().to_string()).collect()
    };
    Ok((name, args))
}

fn parse_speech(line: &str) -> Statement {
    match line.find(':') {
        Some(index) => Statement::Speech {
            character: line[..index].to_string(),
            text: line[index + 1..].to_string(),
        },
        None => Statement::Speech {
            character: String::new(),
            text: line.to_string(),
        },
    }
}

fn parse_jump(part: &str) -> Result<Statement, GalError> {
    let (kind, target) = if let Some(rest) = part.strip_prefix('%') {
        (JumpKind::Link, rest.trim())
    } else if let Some(rest) = part.strip_prefix('>') {
        (JumpKind::File, rest.trim())
    } else {
        (JumpKind::Anchor, part)
    };
    Ok(Statement::Jump {
        kind,
        target: target.to_string(),
    })
}

fn parse_case(part: &str) -> Result<Statement, GalError> {
    let (text, configs) = split_with(part, ':');
    let configs = parse_config(&configs);
    let mut case = CaseStatement::new(text);
    if let Some(show) = configs.get("show") {
        case.show = show.clone();
    }
    if let Some(enable) = configs.get("enable") {
        case.enable = enable.clone();
    }
    case.key = configs.get("key").cloned();
    case.timeout = configs.get("timeout").cloned();
    Ok(Statement::Case(case))
}

fn parse_transform(part: &str) -> Result<Statement, GalError> {
    let (image_type, configs) = split_with(part, ':');
    let configs = parse_config(&configs);
    let mut transform = TransformStatement::new(image_type);
    // An axis-less key like `scale` applies to both axes and wins over the
    // axis-specific one.
    let assign = |field: &mut String, full: &str, short: &str| {
        if let Some(value) = configs.get(full) {
            *field = value.clone();
        }
        if let Some(value) = configs.get(short) {
            *field = value.clone();
        }
    };
    assign(&mut transform.translate_x, "translateX", "translate");
    assign(&mut transform.translate_y, "translateY", "translate");
    assign(&mut transform.scale_x, "scaleX", "scale");
    assign(&mut transform.scale_y, "scaleY", "scale");
    assign(&mut transform.skew_x, "skewX", "skew");
    assign(&mut transform.skew_y, "skewY", "skew");
    if let Some(value) = configs.get("rotate") {
        transform.rotate = value.clone();
    }
    Ok(Statement::Transform(transform))
}

fn parse_media(part: &str) -> Result<Statement, GalError> {
    let (source, configs) = split_with(part, ':');
    let configs = parse_config(&configs);
    let mut media = MediaStatement::new(source);
    if let Some(volume) = configs.get("volume").and_then(|value| value.parse().ok()) {
        media.volume = volume;
    }
    match configs.get("pos").map(String::as_str) {
        Some("foreground") => media.pos = MediaPos::Foreground,
        Some("background") => media.pos = MediaPos::Background,
        _ => {}
    }
    if let Some(block) = configs.get("block").and_then(|value| value.parse().ok()) {
        media.block = block;
    }
    if let Some(resisting) = configs.get("resisting").and_then(|value| value.parse().ok()) {
        media.resisting = resisting;
    }
    Ok(Statement::Media(media))
}

fn parse_func_header(part: &str) -> Result<Statement, GalError> {
    let (name, params) = parse_func(part)?;
    let invalid = params
        .iter()
        .filter(|param| !is_identifier(param))
        .cloned()
        .collect::<Vec<_>>();
    if !invalid.is_empty() {
        return Err(GalError::new(
            "PARSE_FUNC_ARG",
            format!("Invalid func arg: {}", invalid.join(",")),
        ));
    }
    Ok(Statement::Func { name, params })
}

fn parse_call(part: &str) -> Result<Statement, GalError> {
    let (call_part, return_var) = if part.contains(':') {
        let (call_part, return_var) = split_with(part, ':');
        (call_part, Some(return_var))
    } else {
        (part.to_string(), None)
    };
    let (name, args) = parse_func(&call_part)?;
    Ok(Statement::Call {
        name,
        args,
        return_var,
    })
}

fn tag_parsers() -> &'static HashMap<&'static str, TagParser> {
    static PARSERS: OnceLock<HashMap<&'static str, TagParser>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut table: HashMap<&'static str, TagParser> = HashMap::new();
        table.insert("Character", |part| {
            Ok(Statement::Character {
                name: part.to_string(),
            })
        });
        table.insert("Part", |part| {
            Ok(Statement::Part {
                label: part.to_string(),
            })
        });
        table.insert("Note", |part| {
            Ok(Statement::Note {
                text: part.to_string(),
            })
        });
        table.insert("Jump", parse_jump);
        table.insert("Anchor", |part| {
            Ok(Statement::Anchor {
                name: part.to_string(),
            })
        });
        table.insert("Select", |_| Ok(Statement::Select));
        table.insert("Switch", |part| {
            Ok(Statement::Switch {
                expr: part.to_string(),
            })
        });
        table.insert("Case", parse_case);
        table.insert("Break", |_| Ok(Statement::Break));
        table.insert("End", |_| Ok(Statement::End));
        table.insert("Var", |part| {
            let (name, expr) = split_with(part, ':');
            Ok(Statement::Var { name, expr })
        });
        table.insert("Enum", |part| {
            let (name, values) = split_with(part, ':');
            Ok(Statement::Enum {
                name,
                values: values.split(',').map(|value| value.trim().to_string()).collect(),
            })
        });
        table.insert("Input", |part| {
            let (value_var, rest) = split_with(part, ',');
            let (first, second) = split_with(&rest, ',');
            let (error_var, kind) = if first.is_empty() {
                (rest, InputKind::Expr)
            } else if second == "text" {
                (first, InputKind::Text)
            } else {
                // Unknown kinds fall back to expression input.
                (first, InputKind::Expr)
            };
            Ok(Statement::Input {
                value_var,
                error_var,
                kind,
            })
        });
        table.insert("Image", |part| {
            let (image_type, image_file) = split_with(part, ':');
            Ok(Statement::Image {
                image_type,
                image_file,
            })
        });
        table.insert("Media", parse_media);
        table.insert("Transform", parse_transform);
        table.insert("Delay", |part| {
            Ok(Statement::Delay {
                seconds: part.to_string(),
            })
        });
        table.insert("Pause", |_| Ok(Statement::Pause));
        table.insert("Eval", |part| {
            Ok(Statement::Eval {
                expr: part.to_string(),
            })
        });
        table.insert("Func", parse_func_header);
        table.insert("Return", |part| {
            Ok(Statement::Return {
                expr: part.to_string(),
            })
        });
        table.insert("Call", parse_call);
        table.insert("Import", |part| {
            let (file, names) = split_with(part, ':');
            Ok(Statement::Import {
                file,
                names: names.split(',').map(|name| name.trim().to_string()).collect(),
            })
        });
        table.insert("Text", |part| {
            Ok(Statement::Text {
                text: part.to_string(),
            })
        });
        table.insert("Code", |part| {
            let (language, code) = split_with(part, ':');
            Ok(Statement::Code { language, code })
        });
        table
    })
}

/// Turns one raw script line into a statement. Comment lines are no-ops; a
/// line without a recognized `[Tag]` falls back to `character: text` speech.
pub fn parse_line(line: &str) -> Result<Statement, GalError> {
    let trimmed = line.trim();
    if trimmed.starts_with("//") {
        return Ok(Statement::Empty);
    }
    let (Some(left), Some(right)) = (line.find('['), line.find(']')) else {
        return Ok(parse_speech(line));
    };
    if !trimmed.starts_with('[') || right < left {
        return Ok(parse_speech(line));
    }
    let tag = line[left + 1..right].trim();
    let part = line[right + 1..].trim();

    match tag_parsers().get(tag) {
        Some(parser) => parser(part),
        None => Ok(parse_speech(line)),
    }
}

#[cfg(test)]
mod line_tests {
    use super::*;

    #[test]
    fn comment_lines_parse_to_empty() {
        assert_eq!(
            parse_line("  // a comment").expect("comment should parse"),
            Statement::Empty
        );
    }

    #[test]
    fn bare_lines_parse_as_speech() {
        let statement = parse_line("Alice: hello").expect("speech should parse");
        assert_eq!(
            statement,
            Statement::Speech {
                character: "Alice".to_string(),
                text: " hello".to_string(),
            }
        );

        let statement = parse_line("no colon here").expect("speech should parse");
        assert_eq!(
            statement,
            Statement::Speech {
                character: String::new(),
                text: "no colon here".to_string(),
            }
        );
    }

    #[test]
    fn input_parses_vars_and_optional_kind() {
        assert_eq!(
            parse_line("[Input] name, bad").expect("input should parse"),
            Statement::Input {
                value_var: "name".to_string(),
                error_var: "bad".to_string(),
                kind: InputKind::Expr,
            }
        );
        assert_eq!(
            parse_line("[Input] name, bad, text").expect("input should parse"),
            Statement::Input {
                value_var: "name".to_string(),
                error_var: "bad".to_string(),
                kind: InputKind::Text,
            }
        );
    }

    #[test]
    fn unknown_tags_fall_back_to_speech() {
        let statement = parse_line("[Nope] text: here").expect("fallback should parse");
        assert!(matches!(statement, Statement::Speech { .. }));
    }

    #[test]
    fn parsing_a_line_twice_is_idempotent() {
        let first = parse_line("[Case] Yes: show=x>1, timeout=3").expect("case should parse");
        let second = parse_line("[Case] Yes: show=x>1, timeout=3").expect("case should parse");
        assert_eq!(first, second);
    }

    #[test]
    fn jump_prefixes_select_the_kind() {
        assert_eq!(
            parse_line("[Jump] intro").expect("anchor jump"),
            Statement::Jump {
                kind: JumpKind::Anchor,
                target: "intro".to_string(),
            }
        );
        assert_eq!(
            parse_line("[Jump] >other.txt").expect("file jump"),
            Statement::Jump {
                kind: JumpKind::File,
                target: "other.txt".to_string(),
            }
        );
        assert_eq!(
            parse_line("[Jump] %https://example.com").expect("link jump"),
            Statement::Jump {
                kind: JumpKind::Link,
                target: "https://example.com".to_string(),
            }
        );
    }

    #[test]
    fn case_config_assigns_known_keys_and_ignores_unknown() {
        let statement = parse_line("[Case] Leave: show=visited, enable=hp>0, color=red")
            .expect("case should parse");
        let Statement::Case(case) = statement else {
            panic!("expected a case statement");
        };
        assert_eq!(case.text, "Leave");
        assert_eq!(case.show, "visited");
        assert_eq!(case.enable, "hp>0");
        assert!(case.key.is_none());
    }

    #[test]
    fn case_without_a_colon_has_empty_text() {
        // The splitter clamps a missing delimiter to an empty left half, so
        // the payload of a colon-less case is read as its (empty) config list.
        let statement = parse_line("[Case] Yes").expect("case should parse");
        let Statement::Case(case) = statement else {
            panic!("expected a case statement");
        };
        assert_eq!(case.text, "");
    }

    #[test]
    fn var_split_ignores_colon_inside_interpolation() {
        let statement = parse_line("[Var] label: '${a:b}'").expect("var should parse");
        assert_eq!(
            statement,
            Statement::Var {
                name: "label".to_string(),
                expr: "'${a:b}'".to_string(),
            }
        );
    }

    #[test]
    fn func_and_call_validate_identifiers() {
        assert_eq!(
            parse_line("[Func] f(a, b)").expect("func should parse"),
            Statement::Func {
                name: "f".to_string(),
                params: vec!["a".to_string(), "b".to_string()],
            }
        );
        let error = parse_line("[Func] f(a, 2b)").expect_err("bad param should fail");
        assert_eq!(error.code, "PARSE_FUNC_ARG");
        let error = parse_line("[Call] 2f(1)").expect_err("bad name should fail");
        assert_eq!(error.code, "PARSE_FUNC_NAME");

        assert_eq!(
            parse_line("[Call] f(5): y").expect("call should parse"),
            Statement::Call {
                name: "f".to_string(),
                args: vec!["5".to_string()],
                return_var: Some("y".to_string()),
            }
        );
    }

    #[test]
    fn media_config_parses_typed_values() {
        let statement =
            parse_line("[Media] rain.mp3: volume=0.4, pos=foreground, block=true, loop=yes")
                .expect("media should parse");
        let Statement::Media(media) = statement else {
            panic!("expected a media statement");
        };
        assert_eq!(media.source, "rain.mp3");
        assert_eq!(media.volume, 0.4);
        assert_eq!(media.pos, MediaPos::Foreground);
        assert!(media.block);
        assert!(!media.resisting);

        let statement = parse_line("[Media] theme.ogg:").expect("media should parse");
        let Statement::Media(media) = statement else {
            panic!("expected a media statement");
        };
        assert_eq!(media.source, "theme.ogg");
        assert_eq!(media.volume, 1.0);
        assert_eq!(media.pos, MediaPos::Background);
    }

    #[test]
    fn transform_short_keys_apply_to_both_axes() {
        let statement =
            parse_line("[Transform] portrait: scale=2, rotate=45").expect("transform parses");
        let Statement::Transform(transform) = statement else {
            panic!("expected a transform statement");
        };
        assert_eq!(transform.scale_x, "2");
        assert_eq!(transform.scale_y, "2");
        assert_eq!(transform.rotate, "45");
        assert_eq!(transform.translate_x, "0px");
    }

    #[test]
    fn text_and_code_parse_as_inert_statements() {
        assert_eq!(
            parse_line("[Text] draft of the ending").expect("text parses"),
            Statement::Text {
                text: "draft of the ending".to_string(),
            }
        );
        assert_eq!(
            parse_line("[Code] lua: print(1)").expect("code parses"),
            Statement::Code {
                language: "lua".to_string(),
                code: "print(1)".to_string(),
            }
        );
    }

    #[test]
    fn import_lists_symbol_names() {
        assert_eq!(
            parse_line("[Import] common.txt: hp, state").expect("import parses"),
            Statement::Import {
                file: "common.txt".to_string(),
                names: vec!["hp".to_string(), "state".to_string()],
            }
        );
    }
}
