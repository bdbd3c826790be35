//! Logos-based tokenizer for formula text.

use std::fmt;
use std::ops::Range;

use logos::Logos;

use crate::error::ExprError;

/// Formula token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("^")]
    Caret,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Caret => write!(f, "^"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
        }
    }
}

/// A token with its byte span in the source text.
pub type Spanned = (Token, Range<usize>);

/// Tokenizes `source`, failing on the first character that is not part of the grammar.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ExprError> {
    let mut lex = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lex.next() {
        match result {
            Ok(token) => tokens.push((token, lex.span())),
            Err(()) => {
                return Err(ExprError::malformed(
                    format!("unexpected '{}'", lex.slice()),
                    Some(lex.span().start),
                ));
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn lexes_numbers() {
        assert_eq!(
            kinds("6e24 1.5E-3 .5 42"),
            vec![
                Token::Number(6e24),
                Token::Number(1.5e-3),
                Token::Number(0.5),
                Token::Number(42.0),
            ]
        );
    }

    #[test]
    fn lexes_operators_and_idents() {
        assert_eq!(
            kinds("2*M/KM"),
            vec![
                Token::Number(2.0),
                Token::Star,
                Token::Ident("M".to_string()),
                Token::Slash,
                Token::Ident("KM".to_string()),
            ]
        );
        assert_eq!(
            kinds("ceil(dT, -1) ^ 2"),
            vec![
                Token::Ident("ceil".to_string()),
                Token::LParen,
                Token::Ident("dT".to_string()),
                Token::Comma,
                Token::Minus,
                Token::Number(1.0),
                Token::RParen,
                Token::Caret,
                Token::Number(2.0),
            ]
        );
    }

    #[test]
    fn rejects_unknown_operator() {
        let err = tokenize("L % 2").unwrap_err();
        assert!(err.is_malformed());
        assert!(format!("{err}").contains("offset 2"));
    }

    #[test]
    fn spans_point_into_source() {
        let tokens = tokenize("  KM").unwrap();
        assert_eq!(tokens[0].1, 2..4);
    }
}
