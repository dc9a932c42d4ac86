use gal_core::GalError;

use crate::ast::{BinaryOp, CompareOp, Expr, UnaryOp};
use crate::lexer::{lex, Symbol, Token};

/// Parses one expression string into an [`Expr`] tree. Precedence, low to
/// high: logical, comparison chain, `is` matching, additive, multiplicative,
/// power (right-assoc), unary, indexing, primary.
pub fn parse_expr(expr: &str) -> Result<Expr, GalError> {
    let tokens = lex(expr)?;
    let mut parser = Parser { tokens, pos: 0 };
    let parsed = parser.parse_logical()?;
    if parser.pos != parser.tokens.len() {
        return Err(parse_error("Unexpected trailing tokens"));
    }
    Ok(parsed)
}

fn parse_error(message: impl Into<String>) -> GalError {
    GalError::new("EXPR_PARSE", message)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_symbol(&mut self, symbol: Symbol) -> bool {
        if self.peek() == Some(&Token::Symbol(symbol)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: Symbol, context: &str) -> Result<(), GalError> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(parse_error(format!("Expected {:?} in {}", symbol, context)))
        }
    }

    fn parse_logical(&mut self) -> Result<Expr, GalError> {
        let mut left = self.parse_comparing()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol(Symbol::Amp)) => BinaryOp::And,
                Some(Token::Symbol(Symbol::Pipe)) => BinaryOp::Or,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_comparing()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn compare_op(&self) -> Option<CompareOp> {
        match self.peek() {
            Some(Token::Symbol(Symbol::Le)) => Some(CompareOp::Le),
            Some(Token::Symbol(Symbol::Ge)) => Some(CompareOp::Ge),
            Some(Token::Symbol(Symbol::Lt)) => Some(CompareOp::Lt),
            Some(Token::Symbol(Symbol::Gt)) => Some(CompareOp::Gt),
            Some(Token::Symbol(Symbol::EqEq)) => Some(CompareOp::Eq),
            Some(Token::Symbol(Symbol::Ne)) => Some(CompareOp::Ne),
            _ => None,
        }
    }

    fn parse_comparing(&mut self) -> Result<Expr, GalError> {
        let first = self.parse_matching()?;
        let mut rest = Vec::new();
        while let Some(op) = self.compare_op() {
            self.pos += 1;
            rest.push((op, self.parse_matching()?));
        }
        if rest.is_empty() {
            return Ok(first);
        }
        Ok(Expr::Comparing {
            first: Box::new(first),
            rest,
        })
    }

    fn parse_matching(&mut self) -> Result<Expr, GalError> {
        let value = self.parse_additive()?;
        if self.peek() != Some(&Token::Ident("is".to_string())) {
            return Ok(value);
        }
        self.pos += 1;
        let Some(Token::Ident(type_name)) = self.next() else {
            return Err(parse_error("Expected a type name after 'is'"));
        };
        Ok(Expr::Matching {
            value: Box::new(value),
            type_name,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, GalError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol(Symbol::Plus)) => BinaryOp::Add,
                Some(Token::Symbol(Symbol::Minus)) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, GalError> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol(Symbol::Star)) => BinaryOp::Mul,
                Some(Token::Symbol(Symbol::Slash)) => BinaryOp::Div,
                Some(Token::Symbol(Symbol::SlashSlash)) => BinaryOp::FloorDiv,
                Some(Token::Symbol(Symbol::Percent)) => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_power()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_power(&mut self) -> Result<Expr, GalError> {
        let left = self.parse_unary()?;
        if !self.eat_symbol(Symbol::Caret) {
            return Ok(left);
        }
        let right = self.parse_power()?;
        Ok(Expr::Binary {
            op: BinaryOp::Pow,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, GalError> {
        let op = match self.peek() {
            Some(Token::Symbol(Symbol::Plus)) => Some(UnaryOp::Plus),
            Some(Token::Symbol(Symbol::Minus)) => Some(UnaryOp::Minus),
            Some(Token::Symbol(Symbol::Bang)) => Some(UnaryOp::Not),
            _ => None,
        };
        let Some(op) = op else {
            return self.parse_postfix();
        };
        self.pos += 1;
        Ok(Expr::Unary {
            op,
            value: Box::new(self.parse_unary()?),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, GalError> {
        let mut value = self.parse_primary()?;
        while self.eat_symbol(Symbol::LBracket) {
            let index = self.parse_logical()?;
            self.expect_symbol(Symbol::RBracket, "index")?;
            value = Expr::Binary {
                op: BinaryOp::Index,
                left: Box::new(value),
                right: Box::new(index),
            };
        }
        Ok(value)
    }

    fn parse_primary(&mut self) -> Result<Expr, GalError> {
        match self.next() {
            Some(Token::Num(value)) => Ok(Expr::Num(value)),
            Some(Token::Str(value)) => Ok(Expr::Str(value)),
            Some(Token::Symbol(Symbol::LParen)) => {
                let inner = self.parse_logical()?;
                self.expect_symbol(Symbol::RParen, "parenthesized expression")?;
                Ok(inner)
            }
            Some(Token::Symbol(Symbol::LBrace)) => {
                let mut values = Vec::new();
                if self.eat_symbol(Symbol::RBrace) {
                    return Ok(Expr::Array(values));
                }
                loop {
                    values.push(self.parse_logical()?);
                    if !self.eat_symbol(Symbol::Comma) {
                        break;
                    }
                }
                self.expect_symbol(Symbol::RBrace, "array literal")?;
                Ok(Expr::Array(values))
            }
            Some(Token::Ident(name)) => {
                if self.eat_symbol(Symbol::LParen) {
                    let arg = self.parse_logical()?;
                    self.expect_symbol(Symbol::RParen, "function call")?;
                    return Ok(Expr::Call {
                        func: name,
                        arg: Box::new(arg),
                    });
                }
                if self.eat_symbol(Symbol::Dot) {
                    let Some(Token::Ident(value)) = self.next() else {
                        return Err(parse_error(format!(
                            "Expected an enum value name after {}.",
                            name
                        )));
                    };
                    return Ok(Expr::EnumValue {
                        enum_type: name,
                        value,
                    });
                }
                Ok(Expr::Identifier(name))
            }
            Some(token) => Err(parse_error(format!("Unexpected token: {:?}", token))),
            None => Err(parse_error("Unexpected end of expression")),
        }
    }
}

#[cfg(test)]
mod parser_tests {
    use super::*;

    fn parse(expr: &str) -> Expr {
        parse_expr(expr).expect("expression should parse")
    }

    #[test]
    fn additive_is_left_associative() {
        let parsed = parse("1-2-3");
        let Expr::Binary { op: BinaryOp::Sub, left, .. } = parsed else {
            panic!("expected a subtraction at the root");
        };
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Sub, .. }));
    }

    #[test]
    fn power_is_right_associative() {
        let parsed = parse("2^3^2");
        let Expr::Binary { op: BinaryOp::Pow, right, .. } = parsed else {
            panic!("expected a power at the root");
        };
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Pow, .. }));
    }

    #[test]
    fn comparisons_chain() {
        let parsed = parse("1<x<10");
        let Expr::Comparing { rest, .. } = parsed else {
            panic!("expected a comparison chain");
        };
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].0, CompareOp::Lt);
    }

    #[test]
    fn matching_binds_looser_than_additive() {
        let parsed = parse("x+1 is num");
        let Expr::Matching { value, type_name } = parsed else {
            panic!("expected a matching node");
        };
        assert_eq!(type_name, "num");
        assert!(matches!(*value, Expr::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn primaries_cover_calls_enums_and_arrays() {
        assert_eq!(
            parse("state.idle"),
            Expr::EnumValue {
                enum_type: "state".to_string(),
                value: "idle".to_string(),
            }
        );
        assert!(matches!(parse("sin(x)"), Expr::Call { .. }));
        let Expr::Array(values) = parse("{1, 'a', {}}") else {
            panic!("expected an array literal");
        };
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn indexing_is_a_postfix_binary() {
        let parsed = parse("xs[1+1]");
        assert!(matches!(parsed, Expr::Binary { op: BinaryOp::Index, .. }));
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let error = parse_expr("1 2").expect_err("trailing token should fail");
        assert_eq!(error.code, "EXPR_PARSE");
    }
}
