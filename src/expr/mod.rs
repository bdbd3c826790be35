//! Arithmetic formula evaluation.
//!
//! Formulas are small arithmetic expressions over named variables:
//! the four operators with standard precedence, `^`, parentheses, unary
//! sign, and a fixed set of rounding/transcendental functions. There are no
//! user-defined functions and no control flow.
//!
//! Parsing is separated from evaluation so that a formula is parsed once and
//! evaluated many times. [`Evaluator`] caches parses by [`FormulaId`].

pub(crate) mod lexer;
pub(crate) mod parser;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::ExprError;
use crate::formula::{Formula, FormulaId};
use crate::variables::VariableSet;

use parser::{BinaryOp, Expr};

const PARSE_CACHE_MAX: usize = 1024;

/// A parsed formula, ready to evaluate against any [`VariableSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    root: Expr,
}

impl Expression {
    /// Parses formula text.
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let tokens = lexer::tokenize(source)?;
        let root = parser::parse(&tokens, source.len())?;
        Ok(Self { root })
    }

    /// Evaluates against `vars`.
    ///
    /// Every intermediate value must be finite; an unknown variable is a
    /// malformed expression, not a runtime failure.
    pub fn eval(&self, vars: &VariableSet) -> Result<f64, ExprError> {
        eval_node(&self.root, vars)
    }

    /// Names of the variables the expression references, in first-use order.
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_variables(&self.root, &mut out);
        out
    }
}

fn collect_variables<'a>(node: &'a Expr, out: &mut Vec<&'a str>) {
    match node {
        Expr::Number(_) => {}
        Expr::Variable(name) => {
            if !out.contains(&name.as_str()) {
                out.push(name);
            }
        }
        Expr::Negate(inner) => collect_variables(inner, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_variables(lhs, out);
            collect_variables(rhs, out);
        }
        Expr::Call { args, .. } => {
            for arg in args {
                collect_variables(arg, out);
            }
        }
    }
}

fn finite(value: f64, what: impl FnOnce() -> String) -> Result<f64, ExprError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ExprError::evaluation(format!("{} is not finite", what())))
    }
}

fn eval_node(node: &Expr, vars: &VariableSet) -> Result<f64, ExprError> {
    match node {
        Expr::Number(n) => finite(*n, || format!("literal {n}")),
        Expr::Variable(name) => {
            let value = vars.get(name).ok_or_else(|| {
                ExprError::malformed(format!("unknown variable '{name}'"), None)
            })?;
            finite(value, || format!("variable '{name}'"))
        }
        Expr::Negate(inner) => Ok(-eval_node(inner, vars)?),
        Expr::Binary { op, lhs, rhs } => {
            let a = eval_node(lhs, vars)?;
            let b = eval_node(rhs, vars)?;
            let value = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => {
                    if b == 0.0 {
                        return Err(ExprError::evaluation("division by zero"));
                    }
                    a / b
                }
                BinaryOp::Pow => a.powf(b),
            };
            finite(value, || format!("result of {op:?}"))
        }
        Expr::Call { func, args } => {
            let values = args
                .iter()
                .map(|arg| eval_node(arg, vars))
                .collect::<Result<Vec<_>, _>>()?;
            let value = func.apply(&values).ok_or_else(|| {
                ExprError::evaluation(format!("{func} called with {} argument(s)", values.len()))
            })?;
            finite(value, || format!("{func}(...)"))
        }
    }
}

/// Evaluator with a parse cache keyed by formula id.
///
/// Thread-safe, but the session core drives it from a single thread.
#[derive(Debug, Default)]
pub struct Evaluator {
    cache: RwLock<HashMap<FormulaId, Result<Arc<Expression>, ExprError>>>,
    parses: AtomicUsize,
}

impl Evaluator {
    /// Creates an evaluator with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the parsed form of `formula`, parsing it at most once.
    ///
    /// Parse failures are cached as well.
    pub fn compile(&self, formula: &Formula) -> Result<Arc<Expression>, ExprError> {
        {
            let guard = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = guard.get(&formula.id()) {
                return cached.clone();
            }
        }

        self.parses.fetch_add(1, Ordering::Relaxed);
        let parsed = Expression::parse(formula.text()).map(Arc::new);

        let mut guard = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if guard.len() >= PARSE_CACHE_MAX {
            guard.clear();
        }
        guard
            .entry(formula.id())
            .or_insert_with(|| parsed.clone())
            .clone()
    }

    /// Evaluates `formula` with `vars`.
    pub fn evaluate(&self, formula: &Formula, vars: &VariableSet) -> Result<f64, ExprError> {
        self.compile(formula)?.eval(vars)
    }

    /// Number of parses performed so far.
    #[must_use]
    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::Relaxed)
    }

    /// Number of cached formulas.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Parses and evaluates `formula` once, without caching.
pub fn evaluate(formula: &Formula, vars: &VariableSet) -> Result<f64, ExprError> {
    Expression::parse(formula.text())?.eval(vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_str(source: &str, vars: &VariableSet) -> Result<f64, ExprError> {
        evaluate(&Formula::new(source), vars)
    }

    #[test]
    fn mass_ratio_scenario() {
        let vars = VariableSet::new().with("M", 6e24).with("KM", 6e24);
        assert_eq!(eval_str("2*M/KM", &vars).unwrap(), 2.0);
    }

    #[test]
    fn precedence_and_unary_minus() {
        let vars = VariableSet::new();
        assert_eq!(eval_str("1 + 2 * 3", &vars).unwrap(), 7.0);
        assert_eq!(eval_str("(1 + 2) * 3", &vars).unwrap(), 9.0);
        assert_eq!(eval_str("-2 * -3", &vars).unwrap(), 6.0);
        assert_eq!(eval_str("-2^2", &vars).unwrap(), -4.0);
        assert_eq!(eval_str("2^-1", &vars).unwrap(), 0.5);
        assert_eq!(eval_str("2^3^2", &vars).unwrap(), 512.0);
        assert_eq!(eval_str("10 / 4 / 5", &vars).unwrap(), 0.5);
    }

    #[test]
    fn functions() {
        let vars = VariableSet::new().with("L", 125.0);
        assert_eq!(eval_str("ceil(L/60)", &vars).unwrap(), 3.0);
        assert_eq!(eval_str("floor(L/60)", &vars).unwrap(), 2.0);
        assert_eq!(eval_str("round(2.5)", &vars).unwrap(), 3.0);
        assert_eq!(eval_str("abs(-L)", &vars).unwrap(), 125.0);
        assert_eq!(eval_str("sqrt(16)", &vars).unwrap(), 4.0);
        assert!((eval_str("log(1000)", &vars).unwrap() - 3.0).abs() < 1e-12);
        assert!((eval_str("ln(exp(2))", &vars).unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(eval_str("min(L, 3) + max(L, 3)", &vars).unwrap(), 128.0);
        assert_eq!(eval_str("pow(2, 10)", &vars).unwrap(), 1024.0);
    }

    #[test]
    fn unknown_variable_is_malformed() {
        let vars = VariableSet::new().with("m", 1.0);
        let err = eval_str("M + 1", &vars).unwrap_err();
        assert!(err.is_malformed());
        assert!(format!("{err}").contains("'M'"));
    }

    #[test]
    fn division_by_zero_is_evaluation_error() {
        let vars = VariableSet::new().with("KM", 0.0);
        let err = eval_str("1 / KM", &vars).unwrap_err();
        assert!(!err.is_malformed());
        assert!(format!("{err}").contains("division by zero"));
    }

    #[test]
    fn overflow_is_evaluation_error() {
        let vars = VariableSet::new().with("M", 1e300);
        assert!(!eval_str("M * M", &vars).unwrap_err().is_malformed());
        assert!(!eval_str("sqrt(-1)", &vars).unwrap_err().is_malformed());
        assert!(!eval_str("ln(0)", &vars).unwrap_err().is_malformed());
    }

    #[test]
    fn non_finite_variable_is_evaluation_error() {
        let vars = VariableSet::new().with("L", f64::INFINITY);
        assert!(!eval_str("L", &vars).unwrap_err().is_malformed());
    }

    #[test]
    fn evaluation_is_deterministic() {
        let evaluator = Evaluator::new();
        let formula = Formula::new("L * (1 + A) * SMA ^ 0.5 / 3");
        let vars = VariableSet::new().with("L", 900.0).with("A", 1.0).with("SMA", 2.25);
        let first = evaluator.evaluate(&formula, &vars).unwrap();
        for _ in 0..100 {
            assert_eq!(evaluator.evaluate(&formula, &vars).unwrap().to_bits(), first.to_bits());
        }
    }

    #[test]
    fn cache_parses_each_formula_once() {
        let evaluator = Evaluator::new();
        let formula = Formula::new("L * 2");
        for i in 0..50 {
            let vars = VariableSet::new().with("L", f64::from(i));
            assert_eq!(evaluator.evaluate(&formula, &vars).unwrap(), f64::from(i) * 2.0);
        }
        assert_eq!(evaluator.parse_count(), 1);

        // Same text, new Formula value: still one parse.
        evaluator
            .evaluate(&Formula::new("L * 2"), &VariableSet::new().with("L", 1.0))
            .unwrap();
        assert_eq!(evaluator.parse_count(), 1);
        assert_eq!(evaluator.cached(), 1);
    }

    #[test]
    fn cache_remembers_parse_failures() {
        let evaluator = Evaluator::new();
        let formula = Formula::new("(1 +");
        assert!(evaluator.evaluate(&formula, &VariableSet::new()).is_err());
        assert!(evaluator.evaluate(&formula, &VariableSet::new()).is_err());
        assert_eq!(evaluator.parse_count(), 1);
    }

    #[test]
    fn reports_referenced_variables() {
        let expr = Expression::parse("M / KM + ceil(M * L)").unwrap();
        assert_eq!(expr.variables(), vec!["M", "KM", "L"]);
    }
}
