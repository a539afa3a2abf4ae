//! Arithmetic expressions for virtual variables.
//!
//! A virtual variable stores a formula such as `"a + b"` in its `expression`
//! attribute instead of data. The formula language supports:
//!
//! - numeric literals (`2`, `0.5`, `.5`, `1e-3`),
//! - variable names (letters, digits and underscores, not starting with a digit),
//! - the binary operators `+`, `-`, `*`, `/` and `**` (power),
//! - unary `-` and `+`,
//! - parentheses,
//! - the functions `sqrt`, `exp`, `log`, `log10`, `abs`, `sin`, `cos`, `tan`,
//!   `arcsin`, `arccos` and `arctan` (one argument) and `arctan2`, `minimum` and
//!   `maximum` (two arguments).
//!
//! `**` binds tighter than unary minus and is right associative, so `-2 ** 2`
//! is -4 and `2 ** 3 ** 2` is 512. Trigonometric functions work in radians.
//!
//! Evaluation is done in `f64` and broadcasts by dimension *name* rather than
//! by position: combining a `(y, x)` array with an `(x)` array gives a `(y, x)`
//! result, and combining `(x)` with `(y, x)` gives `(x, y)`. In general the
//! result has the dimensions of the left operand followed by any dimensions
//! only the right operand has. A dimension shared by both operands must have
//! the same length on both sides.
use std::{str::FromStr, sync::LazyLock};

use ndarray::{ArrayD, Axis, IxDyn, Zip};
use pest::{
    error::InputLocation,
    iterators::{Pair, Pairs},
    pratt_parser::{Assoc, Op, PrattParser},
    Parser,
};
use pest_derive::Parser;

use crate::error::DatasetError;

#[derive(Parser)]
#[grammar = "expression.pest"]
struct ExpressionParser;

static PRATT_PARSER: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    // Lowest precedence first
    PrattParser::new()
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left) | Op::infix(Rule::div, Assoc::Left))
        .op(Op::prefix(Rule::neg) | Op::prefix(Rule::pos))
        .op(Op::infix(Rule::pow, Assoc::Right))
});

#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    #[error("syntax error at character {index}: {message}")]
    Syntax { index: usize, message: String },
    #[error("at character {index}, '{name}' is not one of the available functions")]
    UnknownFunction { name: String, index: usize },
    #[error("at character {index}, function {function} takes {expected} argument(s), got {got}")]
    WrongArity { function: String, expected: usize, got: usize, index: usize },
    #[error("at character {index}, '{name}' does not name a variable")]
    UnknownVariable { name: String, index: usize },
    #[error("dimension '{dim}' has length {lhs} on the left side of an operation but {rhs} on the right")]
    DimensionMismatch { dim: String, lhs: usize, rhs: usize },
    #[error("array has {ndims} dimension names but rank {rank}")]
    RankMismatch { ndims: usize, rank: usize },
    #[error("could not get the values of '{name}': {source}")]
    Unresolved { name: String, source: Box<DatasetError> },
}

impl ExpressionError {
    pub(crate) fn unresolved(name: &str, err: DatasetError) -> Self {
        Self::Unresolved { name: name.to_string(), source: Box::new(err) }
    }

    fn syntax(err: pest::error::Error<Rule>) -> Self {
        let index = match err.location {
            InputLocation::Pos(p) => p,
            InputLocation::Span((start, _)) => start,
        };
        Self::Syntax { index, message: err.variant.message().to_string() }
    }
}

/// An `f64` array with named dimensions, the value type of expression evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledArray {
    dims: Vec<String>,
    data: ArrayD<f64>,
}

impl LabeledArray {
    pub fn new(dims: Vec<String>, data: ArrayD<f64>) -> Result<Self, ExpressionError> {
        if dims.len() != data.ndim() {
            return Err(ExpressionError::RankMismatch { ndims: dims.len(), rank: data.ndim() });
        }
        Ok(Self { dims, data })
    }

    pub fn scalar(value: f64) -> Self {
        Self { dims: vec![], data: ArrayD::from_elem(IxDyn(&[]), value) }
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn into_parts(self) -> (Vec<String>, ArrayD<f64>) {
        (self.dims, self.data)
    }

    fn map(mut self, f: impl Fn(f64) -> f64) -> Self {
        self.data.mapv_inplace(f);
        self
    }

    /// Combine two arrays element-wise after broadcasting them against each other by dimension name.
    fn combine(self, rhs: LabeledArray, f: impl Fn(f64, f64) -> f64) -> Result<Self, ExpressionError> {
        let mut dims = self.dims.clone();
        let mut lengths = self.data.shape().to_vec();
        for (dim, &len) in rhs.dims.iter().zip(rhs.data.shape()) {
            match dims.iter().position(|d| d == dim) {
                Some(i) if lengths[i] != len => {
                    return Err(ExpressionError::DimensionMismatch { dim: dim.clone(), lhs: lengths[i], rhs: len });
                }
                Some(_) => {}
                None => {
                    dims.push(dim.clone());
                    lengths.push(len);
                }
            }
        }

        let left = self.expand_to(&dims, &lengths);
        let right = rhs.expand_to(&dims, &lengths);
        let data = Zip::from(&left).and(&right).map_collect(|&a, &b| f(a, b));
        Ok(Self { dims, data })
    }

    /// Reorder, extend and broadcast this array to `dims`, which must contain all of
    /// this array's dimensions with matching lengths.
    fn expand_to(&self, dims: &[String], lengths: &[usize]) -> ArrayD<f64> {
        let mut order: Vec<usize> = (0..self.dims.len()).collect();
        order.sort_by_key(|&i| dims.iter().position(|d| d == &self.dims[i]));
        let mut view = self.data.view().permuted_axes(order);

        for (i, dim) in dims.iter().enumerate() {
            if !self.dims.contains(dim) {
                view = view.insert_axis(Axis(i));
            }
        }

        // Every axis now either matches the target length or has length 1.
        match view.broadcast(IxDyn(lengths)) {
            Some(b) => b.to_owned(),
            None => unreachable!("lengths were checked when the target dimensions were built"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Function {
    Sqrt,
    Exp,
    Log,
    Log10,
    Abs,
    Sin,
    Cos,
    Tan,
    Arcsin,
    Arccos,
    Arctan,
    Arctan2,
    Minimum,
    Maximum,
}

impl Function {
    pub fn arity(&self) -> usize {
        match self {
            Function::Arctan2 | Function::Minimum | Function::Maximum => 2,
            _ => 1,
        }
    }

    fn apply_unary(&self, x: f64) -> f64 {
        match self {
            Function::Sqrt => x.sqrt(),
            Function::Exp => x.exp(),
            Function::Log => x.ln(),
            Function::Log10 => x.log10(),
            Function::Abs => x.abs(),
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Arcsin => x.asin(),
            Function::Arccos => x.acos(),
            Function::Arctan => x.atan(),
            Function::Arctan2 | Function::Minimum | Function::Maximum => f64::NAN,
        }
    }

    fn apply_binary(&self, a: f64, b: f64) -> f64 {
        match self {
            Function::Arctan2 => a.atan2(b),
            // NaN propagates, as in numpy
            Function::Minimum => if a.is_nan() || b.is_nan() { f64::NAN } else { a.min(b) },
            Function::Maximum => if a.is_nan() || b.is_nan() { f64::NAN } else { a.max(b) },
            _ => f64::NAN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Variable { name: String, index: usize },
    Negate(Box<Node>),
    Binary { op: BinaryOp, lhs: Box<Node>, rhs: Box<Node> },
    Call { function: Function, args: Vec<Node> },
}

/// A parsed expression, ready to be evaluated against a set of named arrays.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    /// Parse `source`, checking syntax, function names and argument counts.
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let mut pairs = ExpressionParser::parse(Rule::expression, source).map_err(ExpressionError::syntax)?;
        // The top rule always contains exactly one `expr`, then EOI
        let expr = pairs
            .next()
            .and_then(|top| top.into_inner().next())
            .ok_or_else(|| ExpressionError::Syntax { index: 0, message: "empty expression".to_string() })?;
        let root = parse_expr(expr.into_inner())?;
        Ok(Self { source: source.to_string(), root })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of the variables the expression refers to, in order of first appearance.
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        collect_variables(&self.root, &mut names);
        names
    }

    /// Evaluate the expression.
    ///
    /// `resolve` is called for every variable reference and should return the
    /// variable's values, or `Ok(None)` if no variable of that name exists.
    pub fn evaluate<F>(&self, resolve: &mut F) -> Result<LabeledArray, ExpressionError>
    where
        F: FnMut(&str) -> Result<Option<LabeledArray>, ExpressionError>,
    {
        evaluate_node(&self.root, resolve)
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_expr(pairs: Pairs<'_, Rule>) -> Result<Node, ExpressionError> {
    PRATT_PARSER
        .map_primary(parse_primary)
        .map_prefix(|op, rhs| match op.as_rule() {
            Rule::neg => Ok(Node::Negate(Box::new(rhs?))),
            Rule::pos => rhs,
            rule => unreachable!("{rule:?} is not a prefix operator"),
        })
        .map_infix(|lhs, op, rhs| {
            let op = match op.as_rule() {
                Rule::add => BinaryOp::Add,
                Rule::sub => BinaryOp::Sub,
                Rule::mul => BinaryOp::Mul,
                Rule::div => BinaryOp::Div,
                Rule::pow => BinaryOp::Pow,
                rule => unreachable!("{rule:?} is not an infix operator"),
            };
            Ok(Node::Binary { op, lhs: Box::new(lhs?), rhs: Box::new(rhs?) })
        })
        .parse(pairs)
}

fn parse_primary(pair: Pair<'_, Rule>) -> Result<Node, ExpressionError> {
    let index = pair.as_span().start();
    match pair.as_rule() {
        Rule::number => {
            let value = pair.as_str().parse::<f64>().map_err(|e| ExpressionError::Syntax {
                index,
                message: format!("invalid number '{}': {e}", pair.as_str()),
            })?;
            Ok(Node::Number(value))
        }
        Rule::identifier => Ok(Node::Variable { name: pair.as_str().to_string(), index }),
        Rule::expr => parse_expr(pair.into_inner()),
        Rule::function_call => {
            let mut inner = pair.into_inner();
            // The grammar guarantees the name comes first
            let name = inner.next().map(|p| p.as_str()).unwrap_or_default();
            let function = Function::from_str(name)
                .map_err(|_| ExpressionError::UnknownFunction { name: name.to_string(), index })?;
            let args = inner.map(|arg| parse_expr(arg.into_inner())).collect::<Result<Vec<_>, _>>()?;
            if args.len() != function.arity() {
                return Err(ExpressionError::WrongArity {
                    function: function.to_string(),
                    expected: function.arity(),
                    got: args.len(),
                    index,
                });
            }
            Ok(Node::Call { function, args })
        }
        rule => unreachable!("{rule:?} is not a primary expression"),
    }
}

fn collect_variables<'a>(node: &'a Node, names: &mut Vec<&'a str>) {
    match node {
        Node::Number(_) => {}
        Node::Variable { name, .. } => {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        Node::Negate(inner) => collect_variables(inner, names),
        Node::Binary { lhs, rhs, .. } => {
            collect_variables(lhs, names);
            collect_variables(rhs, names);
        }
        Node::Call { args, .. } => args.iter().for_each(|a| collect_variables(a, names)),
    }
}

fn evaluate_node<F>(node: &Node, resolve: &mut F) -> Result<LabeledArray, ExpressionError>
where
    F: FnMut(&str) -> Result<Option<LabeledArray>, ExpressionError>,
{
    match node {
        Node::Number(v) => Ok(LabeledArray::scalar(*v)),
        Node::Variable { name, index } => {
            resolve(name)?.ok_or_else(|| ExpressionError::UnknownVariable { name: name.clone(), index: *index })
        }
        Node::Negate(inner) => Ok(evaluate_node(inner, resolve)?.map(|v| -v)),
        Node::Binary { op, lhs, rhs } => {
            let lhs = evaluate_node(lhs, resolve)?;
            let rhs = evaluate_node(rhs, resolve)?;
            lhs.combine(rhs, |a, b| op.apply(a, b))
        }
        Node::Call { function, args } => {
            let mut values = args.iter().map(|a| evaluate_node(a, resolve)).collect::<Result<Vec<_>, _>>()?;
            if function.arity() == 2 {
                let rhs = values.pop();
                let lhs = values.pop();
                match (lhs, rhs) {
                    (Some(lhs), Some(rhs)) => lhs.combine(rhs, |a, b| function.apply_binary(a, b)),
                    _ => unreachable!("argument count is checked when parsing"),
                }
            } else {
                match values.pop() {
                    Some(arg) => Ok(arg.map(|x| function.apply_unary(x))),
                    None => unreachable!("argument count is checked when parsing"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::{array, ArrayD};
    use rstest::rstest;

    use super::*;

    fn labeled(dims: &[&str], data: ArrayD<f64>) -> LabeledArray {
        LabeledArray::new(dims.iter().map(|d| d.to_string()).collect(), data).unwrap()
    }

    fn eval_scalar(src: &str) -> f64 {
        let expr = Expression::parse(src).unwrap();
        let result = expr.evaluate(&mut |_: &str| Ok(None)).unwrap();
        assert!(result.dims().is_empty());
        result.data()[[0usize; 0]]
    }

    #[rstest]
    #[case("2 + 3 * 4", 14.0)]
    #[case("(2 + 3) * 4", 20.0)]
    #[case("10 / 4 - 1", 1.5)]
    #[case("-2 ** 2", -4.0)]
    #[case("2 ** 3 ** 2", 512.0)]
    #[case("2 ** -1", 0.5)]
    #[case("--3", 3.0)]
    #[case("+3 - -3", 6.0)]
    #[case("1e3 + .5", 1000.5)]
    #[case("sqrt(16) + abs(-3)", 7.0)]
    #[case("maximum(2, 5) - minimum(2, 5)", 3.0)]
    #[case("log10(100) * exp(0)", 2.0)]
    fn test_scalar_arithmetic(#[case] src: &str, #[case] expected: f64) {
        assert_abs_diff_eq!(eval_scalar(src), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_trig_in_radians() {
        assert_abs_diff_eq!(eval_scalar("arctan2(1, 1)"), std::f64::consts::FRAC_PI_4, epsilon = 1e-12);
        assert_abs_diff_eq!(eval_scalar("cos(0) + sin(0)"), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_variables_in_order() {
        let expr = Expression::parse("a * b + sqrt(a) - c_2").unwrap();
        assert_eq!(expr.variables(), ["a", "b", "c_2"]);
    }

    #[test]
    fn test_broadcast_by_name() {
        let a = labeled(&["y", "x"], array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn());
        let b = labeled(&["x"], array![10.0, 20.0, 30.0].into_dyn());

        let sum = a.clone().combine(b.clone(), |x, y| x + y).unwrap();
        assert_eq!(sum.dims(), ["y", "x"]);
        assert_eq!(sum.data(), &array![[11.0, 22.0, 33.0], [14.0, 25.0, 36.0]].into_dyn());

        let sum = b.combine(a, |x, y| x + y).unwrap();
        assert_eq!(sum.dims(), ["x", "y"]);
        assert_eq!(sum.data(), &array![[11.0, 14.0], [22.0, 25.0], [33.0, 36.0]].into_dyn());
    }

    #[test]
    fn test_broadcast_outer_dimension() {
        let b = labeled(&["x"], array![1.0, 2.0, 3.0].into_dyn());
        let c = labeled(&["z"], array![100.0, 200.0].into_dyn());
        let prod = b.combine(c, |x, y| x * y).unwrap();
        assert_eq!(prod.dims(), ["x", "z"]);
        assert_eq!(prod.data(), &array![[100.0, 200.0], [200.0, 400.0], [300.0, 600.0]].into_dyn());
    }

    #[test]
    fn test_broadcast_length_mismatch() {
        let a = labeled(&["y", "x"], ArrayD::zeros(IxDyn(&[2, 3])));
        let d = labeled(&["x"], ArrayD::zeros(IxDyn(&[2])));
        let err = a.combine(d, |x, y| x + y).unwrap_err();
        assert!(matches!(err, ExpressionError::DimensionMismatch { ref dim, lhs: 3, rhs: 2 } if dim == "x"));
    }

    #[test]
    fn test_evaluate_with_resolver() {
        let expr = Expression::parse("2 * a - 1").unwrap();
        let result = expr
            .evaluate(&mut |name: &str| {
                assert_eq!(name, "a");
                Ok(Some(labeled(&["x"], array![1.0, 2.0].into_dyn())))
            })
            .unwrap();
        assert_eq!(result.data(), &array![1.0, 3.0].into_dyn());
    }

    #[test]
    fn test_unknown_variable_has_position() {
        let expr = Expression::parse("1 + missing").unwrap();
        let err = expr.evaluate(&mut |_: &str| Ok(None)).unwrap_err();
        assert!(matches!(err, ExpressionError::UnknownVariable { ref name, index: 4 } if name == "missing"));
    }

    #[test]
    fn test_unknown_function() {
        let err = Expression::parse("a + frobnicate(b)").unwrap_err();
        assert!(matches!(err, ExpressionError::UnknownFunction { ref name, index: 4 } if name == "frobnicate"));
    }

    #[test]
    fn test_wrong_arity() {
        let err = Expression::parse("sqrt(a, b)").unwrap_err();
        assert!(matches!(err, ExpressionError::WrongArity { expected: 1, got: 2, index: 0, .. }));
        let err = Expression::parse("arctan2(a)").unwrap_err();
        assert!(matches!(err, ExpressionError::WrongArity { expected: 2, got: 1, .. }));
    }

    #[rstest]
    #[case("a +", 3)]
    #[case("(a + b", 6)]
    #[case("a b", 2)]
    #[case("", 0)]
    fn test_syntax_error_position(#[case] src: &str, #[case] index: usize) {
        let err = Expression::parse(src).unwrap_err();
        match err {
            ExpressionError::Syntax { index: i, .. } => assert_eq!(i, index, "wrong index for '{src}'"),
            other => panic!("expected a syntax error for '{src}', got {other:?}"),
        }
    }
}
