//! Recursive-descent parser producing the formula AST.
//!
//! Precedence, lowest first: `+ -`, `* /`, unary sign, `^` (right associative).

use std::fmt;

use crate::error::ExprError;

use super::lexer::{Spanned, Token};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Ceil,
    Floor,
    Round,
    Abs,
    Sqrt,
    Ln,
    Log,
    Exp,
    Min,
    Max,
    Pow,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "ceil" => Self::Ceil,
            "floor" => Self::Floor,
            "round" => Self::Round,
            "abs" => Self::Abs,
            "sqrt" => Self::Sqrt,
            "ln" => Self::Ln,
            "log" => Self::Log,
            "exp" => Self::Exp,
            "min" => Self::Min,
            "max" => Self::Max,
            "pow" => Self::Pow,
            _ => return None,
        })
    }

    /// Number of arguments the function takes.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::Min | Self::Max | Self::Pow => 2,
            _ => 1,
        }
    }

    /// Applies the function, or returns `None` if `args` does not match its
    /// arity.
    #[must_use]
    pub fn apply(self, args: &[f64]) -> Option<f64> {
        let value = match (self, args) {
            (Self::Ceil, [x]) => x.ceil(),
            (Self::Floor, [x]) => x.floor(),
            (Self::Round, [x]) => x.round(),
            (Self::Abs, [x]) => x.abs(),
            (Self::Sqrt, [x]) => x.sqrt(),
            (Self::Ln, [x]) => x.ln(),
            (Self::Log, [x]) => x.log10(),
            (Self::Exp, [x]) => x.exp(),
            (Self::Min, [a, b]) => a.min(*b),
            (Self::Max, [a, b]) => a.max(*b),
            (Self::Pow, [a, b]) => a.powf(*b),
            _ => return None,
        };
        Some(value)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ceil => "ceil",
            Self::Floor => "floor",
            Self::Round => "round",
            Self::Abs => "abs",
            Self::Sqrt => "sqrt",
            Self::Ln => "ln",
            Self::Log => "log",
            Self::Exp => "exp",
            Self::Min => "min",
            Self::Max => "max",
            Self::Pow => "pow",
        };
        f.write_str(name)
    }
}

/// Formula syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        func: Function,
        args: Vec<Expr>,
    },
}

/// Parses a token stream into an expression tree.
pub fn parse(tokens: &[Spanned], source_len: usize) -> Result<Expr, ExprError> {
    if tokens.is_empty() {
        return Err(ExprError::malformed("empty expression", None));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        source_len,
    };
    let expr = parser.expression()?;
    if let Some((token, span)) = parser.peek() {
        return Err(ExprError::malformed(
            format!("unexpected '{token}' after expression"),
            Some(span.start),
        ));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    source_len: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Spanned> {
        let next = self.tokens.get(self.pos);
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if matches!(self.peek(), Some((t, _)) if t == expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.source_len, |(_, span)| span.start)
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExprError> {
        if self.eat(expected) {
            return Ok(());
        }
        let found = self
            .peek()
            .map_or_else(|| "end of input".to_string(), |(t, _)| format!("'{t}'"));
        Err(ExprError::malformed(
            format!("expected '{expected}', found {found}"),
            Some(self.offset()),
        ))
    }

    fn expression(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.eat(&Token::Plus) {
                BinaryOp::Add
            } else if self.eat(&Token::Minus) {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat(&Token::Star) {
                BinaryOp::Mul
            } else if self.eat(&Token::Slash) {
                BinaryOp::Div
            } else {
                return Ok(lhs);
            };
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Negate(Box::new(self.unary()?)));
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, ExprError> {
        let base = self.primary()?;
        if self.eat(&Token::Caret) {
            // `-2^2` is -(2^2); `2^-1` binds the sign to the exponent.
            let exponent = self.unary()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let offset = self.offset();
        let Some((token, span)) = self.advance() else {
            return Err(ExprError::malformed("unexpected end of input", Some(offset)));
        };
        match token {
            Token::Number(n) => Ok(Expr::Number(*n)),
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    self.call(name, span.start)
                } else {
                    Ok(Expr::Variable(name.clone()))
                }
            }
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            other => Err(ExprError::malformed(
                format!("unexpected '{other}'"),
                Some(span.start),
            )),
        }
    }

    fn call(&mut self, name: &str, start: usize) -> Result<Expr, ExprError> {
        let func = Function::lookup(name).ok_or_else(|| {
            ExprError::malformed(format!("unknown function '{name}'"), Some(start))
        })?;

        let mut args = Vec::with_capacity(func.arity());
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.expression()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                self.expect(&Token::RParen)?;
                break;
            }
        }

        if args.len() != func.arity() {
            return Err(ExprError::malformed(
                format!(
                    "function '{func}' takes {} argument(s), got {}",
                    func.arity(),
                    args.len()
                ),
                Some(start),
            ));
        }
        Ok(Expr::Call { func, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::lexer::tokenize;

    fn parse_str(source: &str) -> Result<Expr, ExprError> {
        parse(&tokenize(source)?, source.len())
    }

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Number(n))
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse_str("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                lhs: num(1.0),
                rhs: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    lhs: num(2.0),
                    rhs: num(3.0),
                }),
            }
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        let expr = parse_str("8 - 4 - 2").unwrap();
        let Expr::Binary { op, lhs, rhs } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Sub);
        assert_eq!(*rhs, Expr::Number(2.0));
        assert!(matches!(*lhs, Expr::Binary { op: BinaryOp::Sub, .. }));
    }

    #[test]
    fn power_is_right_associative() {
        let expr = parse_str("2 ^ 3 ^ 2").unwrap();
        let Expr::Binary { op, lhs, rhs } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Pow);
        assert_eq!(*lhs, Expr::Number(2.0));
        assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Pow, .. }));
    }

    #[test]
    fn unbalanced_parentheses_are_malformed() {
        assert!(parse_str("(1 + 2").unwrap_err().is_malformed());
        assert!(parse_str("1 + 2)").unwrap_err().is_malformed());
        assert!(parse_str("()").unwrap_err().is_malformed());
    }

    #[test]
    fn empty_and_dangling_operators_are_malformed() {
        assert!(parse_str("").unwrap_err().is_malformed());
        assert!(parse_str("   ").unwrap_err().is_malformed());
        assert!(parse_str("1 +").unwrap_err().is_malformed());
        assert!(parse_str("* 2").unwrap_err().is_malformed());
        assert!(parse_str("2 3").unwrap_err().is_malformed());
    }

    #[test]
    fn functions_check_name_and_arity() {
        assert!(matches!(
            parse_str("ceil(L / 60)").unwrap(),
            Expr::Call { func: Function::Ceil, .. }
        ));
        assert!(matches!(
            parse_str("max(1, SMA)").unwrap(),
            Expr::Call { func: Function::Max, .. }
        ));

        let unknown = parse_str("frobnicate(1)").unwrap_err();
        assert!(format!("{unknown}").contains("unknown function"));

        let arity = parse_str("ceil(1, 2)").unwrap_err();
        assert!(format!("{arity}").contains("takes 1 argument"));
        assert!(parse_str("min(1)").unwrap_err().is_malformed());
        assert!(parse_str("min(1,)").unwrap_err().is_malformed());
    }

    #[test]
    fn apply_checks_argument_count() {
        assert_eq!(Function::Min.apply(&[]), None);
        assert_eq!(Function::Min.apply(&[3.0]), None);
        assert_eq!(Function::Ceil.apply(&[1.0, 2.0]), None);
        assert_eq!(Function::Min.apply(&[3.0, 1.0]), Some(1.0));
        assert_eq!(Function::Ceil.apply(&[1.2]), Some(2.0));
    }
}
