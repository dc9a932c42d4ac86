use gal_core::GalError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    Symbol(Symbol),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    Percent,
    Caret,
    Amp,
    Pipe,
    Bang,
    Le,
    Ge,
    Lt,
    Gt,
    EqEq,
    Ne,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
}

fn lex_error(message: impl Into<String>) -> GalError {
    GalError::new("EXPR_LEX", message)
}

fn lex_string(chars: &mut std::iter::Peekable<std::str::Chars>, quote: char) -> Result<Token, GalError> {
    let mut text = String::new();
    loop {
        let Some(ch) = chars.next() else {
            return Err(lex_error("Unterminated string literal"));
        };
        if ch == quote {
            return Ok(Token::Str(text));
        }
        if ch != '\\' {
            text.push(ch);
            continue;
        }
        let Some(escaped) = chars.next() else {
            return Err(lex_error("Unterminated string literal"));
        };
        match escaped {
            'n' => text.push('\n'),
            't' => text.push('\t'),
            'r' => text.push('\r'),
            '0' => text.push('\0'),
            '\\' | '\'' | '"' => text.push(escaped),
            other => return Err(lex_error(format!("Unknown escape: \\{}", other))),
        }
    }
}

fn lex_number(
    chars: &mut std::iter::Peekable<std::str::Chars>,
    first: char,
) -> Result<Token, GalError> {
    let mut text = String::from(first);
    if first == '0' && chars.peek() == Some(&'x') {
        chars.next();
        while let Some(&ch) = chars.peek() {
            if ch.is_ascii_hexdigit() {
                text.push(ch);
                chars.next();
            } else {
                break;
            }
        }
        let digits = &text[1..];
        let value = u64::from_str_radix(digits, 16)
            .map_err(|_| lex_error(format!("Invalid hex literal: 0x{}", digits)))?;
        return Ok(Token::Num(value as f64));
    }
    while let Some(&ch) = chars.peek() {
        if ch.is_ascii_digit() || ch == '.' {
            text.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    let value = text
        .parse::<f64>()
        .map_err(|_| lex_error(format!("Invalid number literal: {}", text)))?;
    Ok(Token::Num(value))
}

/// Splits an expression into tokens. Two-character operators (`//`, `<=`,
/// `>=`, `==`, `!=`) win over their one-character prefixes.
pub fn lex(expr: &str) -> Result<Vec<Token>, GalError> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(ch) = chars.next() {
        let token = match ch {
            _ if ch.is_whitespace() => continue,
            '\'' | '"' => lex_string(&mut chars, ch)?,
            _ if ch.is_ascii_digit() => lex_number(&mut chars, ch)?,
            _ if ch.is_alphanumeric() || ch == '_' => {
                let mut name = String::from(ch);
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Ident(name)
            }
            '+' => Token::Symbol(Symbol::Plus),
            '-' => Token::Symbol(Symbol::Minus),
            '*' => Token::Symbol(Symbol::Star),
            '/' => {
                if chars.peek() == Some(&'/') {
                    chars.next();
                    Token::Symbol(Symbol::SlashSlash)
                } else {
                    Token::Symbol(Symbol::Slash)
                }
            }
            '%' => Token::Symbol(Symbol::Percent),
            '^' => Token::Symbol(Symbol::Caret),
            '&' => Token::Symbol(Symbol::Amp),
            '|' => Token::Symbol(Symbol::Pipe),
            '!' => {
                if chars.peek() == Some(&'=') {
                    chars.next();
                    Token::Symbol(Symbol::Ne)
                } else {
                    Token::Symbol(Symbol::Bang)
                }
            }
            '<' => {
                if chars.peek() == Some(&'=') {
                    chars.next();
                    Token::Symbol(Symbol::Le)
                } else {
                    Token::Symbol(Symbol::Lt)
                }
            }
            '>' => {
                if chars.peek() == Some(&'=') {
                    chars.next();
                    Token::Symbol(Symbol::Ge)
                } else {
                    Token::Symbol(Symbol::Gt)
                }
            }
            '=' => {
                if chars.peek() == Some(&'=') {
                    chars.next();
                    Token::Symbol(Symbol::EqEq)
                } else {
                    return Err(lex_error("Single = is not an operator"));
                }
            }
            '(' => Token::Symbol(Symbol::LParen),
            ')' => Token::Symbol(Symbol::RParen),
            '{' => Token::Symbol(Symbol::LBrace),
            '}' => Token::Symbol(Symbol::RBrace),
            '[' => Token::Symbol(Symbol::LBracket),
            ']' => Token::Symbol(Symbol::RBracket),
            ',' => Token::Symbol(Symbol::Comma),
            '.' => Token::Symbol(Symbol::Dot),
            other => return Err(lex_error(format!("Unexpected character: {}", other))),
        };
        tokens.push(token);
    }
    Ok(tokens)
}

#[cfg(test)]
mod lexer_tests {
    use super::*;

    fn lex_ok(expr: &str) -> Vec<Token> {
        lex(expr).expect("expression should lex")
    }

    #[test]
    fn numbers_strings_and_identifiers() {
        assert_eq!(
            lex_ok("1.5 x 'hi'"),
            vec![
                Token::Num(1.5),
                Token::Ident("x".to_string()),
                Token::Str("hi".to_string()),
            ]
        );
    }

    #[test]
    fn hex_literals_lex_as_numbers() {
        assert_eq!(lex_ok("0x1F"), vec![Token::Num(31.0)]);
    }

    #[test]
    fn two_character_operators_win() {
        assert_eq!(
            lex_ok("a//b<=c!=d"),
            vec![
                Token::Ident("a".to_string()),
                Token::Symbol(Symbol::SlashSlash),
                Token::Ident("b".to_string()),
                Token::Symbol(Symbol::Le),
                Token::Ident("c".to_string()),
                Token::Symbol(Symbol::Ne),
                Token::Ident("d".to_string()),
            ]
        );
    }

    #[test]
    fn string_escapes_unescape() {
        assert_eq!(
            lex_ok(r#""a\nb\\c""#),
            vec![Token::Str("a\nb\\c".to_string())]
        );
        let error = lex("'open").expect_err("unterminated string should fail");
        assert_eq!(error.code, "EXPR_LEX");
    }
}
