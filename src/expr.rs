//! Lazy stat expressions.
//!
//! Applying an operator to a stat reference or to another expression
//! builds an `Expr` tree instead of computing a value. The tree is
//! evaluated against a game object every time it is read, so derived
//! stats always reflect the object's current state.
//!
//! ```rust
//! use gamestat::Expr;
//!
//! let str_ = Expr::stat("STR");
//! let max_hp = (str_ + 1) * 10;
//! assert_eq!(max_hp.to_string(), "((STR + 1) * 10)");
//! assert!(max_hp.dependencies().contains(&gamestat::StatId::new("STR")));
//! ```
//!
//! ## Operand folding
//!
//! Repeating the same operation keeps the tree flat: `a + b + c` is one
//! `Add` node with three operands. Left-associative operations fold their
//! operands left to right, so appending on the left chain is always safe.
//! `Pow` is right-associative and folds right to left; combining anything
//! on the left of an existing `Pow` chain prepends to it, which makes
//! `2 ** (3 ** x)` evaluate as written. Fully associative operations merge
//! chains on either side. Everything else nests.

use crate::error::StatError;
use crate::object::GameObject;
use crate::stat_id::StatId;
use crate::value::{Callable, StatValue};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops;

/// An operation an `Expr::Apply` node performs over its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Min,
    Max,
    Neg,
    Not,
    Abs,
    Field,
    Index,
}

impl Op {
    pub fn symbol(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::FloorDiv => "//",
            Op::Rem => "%",
            Op::Pow => "**",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::And => "and",
            Op::Or => "or",
            Op::BitAnd => "&",
            Op::BitOr => "|",
            Op::BitXor => "^",
            Op::Min => "min",
            Op::Max => "max",
            Op::Neg => "-",
            Op::Not => "not",
            Op::Abs => "abs",
            Op::Field => ".",
            Op::Index => "[]",
        }
    }

    pub fn is_unary(self) -> bool {
        matches!(self, Op::Neg | Op::Not | Op::Abs)
    }

    /// Grouping does not change the result.
    pub fn is_associative(self) -> bool {
        matches!(
            self,
            Op::Add | Op::Mul | Op::And | Op::Or | Op::BitAnd | Op::BitOr | Op::BitXor | Op::Min | Op::Max
        )
    }

    /// Operations whose chains fold right to left (`a ** b ** c`).
    pub fn folds_right(self) -> bool {
        matches!(self, Op::Pow)
    }

    fn merges(self) -> bool {
        !self.is_unary() && !matches!(self, Op::Field | Op::Index)
    }

    fn apply_binary(self, lhs: &StatValue, rhs: &StatValue) -> Result<StatValue, StatError> {
        use std::cmp::Ordering;
        match self {
            Op::Add => lhs.add(rhs),
            Op::Sub => lhs.sub(rhs),
            Op::Mul => lhs.mul(rhs),
            Op::Div => lhs.div(rhs),
            Op::FloorDiv => lhs.floor_div(rhs),
            Op::Rem => lhs.rem(rhs),
            Op::Pow => lhs.pow(rhs),
            Op::Eq => Ok(StatValue::Bool(lhs == rhs)),
            Op::Ne => Ok(StatValue::Bool(lhs != rhs)),
            Op::Lt => Ok(StatValue::Bool(matches!(
                lhs.compare(rhs, "<")?,
                Some(Ordering::Less)
            ))),
            Op::Le => Ok(StatValue::Bool(matches!(
                lhs.compare(rhs, "<=")?,
                Some(Ordering::Less | Ordering::Equal)
            ))),
            Op::Gt => Ok(StatValue::Bool(matches!(
                lhs.compare(rhs, ">")?,
                Some(Ordering::Greater)
            ))),
            Op::Ge => Ok(StatValue::Bool(matches!(
                lhs.compare(rhs, ">=")?,
                Some(Ordering::Greater | Ordering::Equal)
            ))),
            Op::And => Ok(lhs.and(rhs)),
            Op::Or => Ok(lhs.or(rhs)),
            Op::BitAnd => lhs.bitand(rhs),
            Op::BitOr => lhs.bitor(rhs),
            Op::BitXor => lhs.bitxor(rhs),
            Op::Min => Ok(if lhs.compare(rhs, "min")? == Some(Ordering::Greater) {
                rhs.clone()
            } else {
                lhs.clone()
            }),
            Op::Max => Ok(if lhs.compare(rhs, "max")? == Some(Ordering::Less) {
                rhs.clone()
            } else {
                lhs.clone()
            }),
            Op::Field => match rhs {
                StatValue::Str(name) => lhs.field(name),
                other => Err(StatError::BadOperand {
                    op: ".",
                    operand: other.type_name(),
                }),
            },
            Op::Index => lhs.index(rhs),
            Op::Neg | Op::Not | Op::Abs => self.apply_unary(lhs),
        }
    }

    fn apply_unary(self, operand: &StatValue) -> Result<StatValue, StatError> {
        match self {
            Op::Neg => operand.neg(),
            Op::Not => Ok(operand.not()),
            Op::Abs => operand.abs(),
            _ => Err(StatError::EmptyExpression(self.symbol())),
        }
    }
}

/// A deferred computation over stats and literals.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A constant.
    Literal(StatValue),
    /// A reference to a declared stat, read through its effect chain.
    Stat(StatId),
    /// An operation over an ordered operand list.
    Apply { op: Op, args: Vec<Expr> },
    /// A call of whatever `callee` evaluates to.
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
}

impl Expr {
    /// Reference a stat by name.
    pub fn stat(name: impl Into<StatId>) -> Self {
        Expr::Stat(name.into())
    }

    /// A literal operand.
    pub fn lit(value: impl Into<StatValue>) -> Self {
        Expr::Literal(value.into())
    }

    /// Build a binary node, merging into an existing chain where that
    /// preserves meaning.
    pub fn binary(op: Op, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        match (lhs.into(), rhs.into()) {
            (Expr::Apply { op: l, mut args }, rhs)
                if l == op && op.merges() && !op.folds_right() =>
            {
                match rhs {
                    Expr::Apply { op: r, args: more } if r == op && op.is_associative() => {
                        args.extend(more)
                    }
                    rhs => args.push(rhs),
                }
                Expr::Apply { op, args }
            }
            (lhs, Expr::Apply { op: r, mut args })
                if r == op && op.merges() && (op.folds_right() || op.is_associative()) =>
            {
                args.insert(0, lhs);
                Expr::Apply { op, args }
            }
            (lhs, rhs) => Expr::Apply {
                op,
                args: vec![lhs, rhs],
            },
        }
    }

    pub fn unary(op: Op, operand: impl Into<Expr>) -> Self {
        Expr::Apply {
            op,
            args: vec![operand.into()],
        }
    }

    pub fn floor_div(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(Op::FloorDiv, self, rhs)
    }

    pub fn pow(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(Op::Pow, self, rhs)
    }

    pub fn eq(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(Op::Eq, self, rhs)
    }

    pub fn ne(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(Op::Ne, self, rhs)
    }

    pub fn lt(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(Op::Lt, self, rhs)
    }

    pub fn le(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(Op::Le, self, rhs)
    }

    pub fn gt(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(Op::Gt, self, rhs)
    }

    pub fn ge(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(Op::Ge, self, rhs)
    }

    pub fn and(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(Op::And, self, rhs)
    }

    pub fn or(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(Op::Or, self, rhs)
    }

    pub fn min(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(Op::Min, self, rhs)
    }

    pub fn max(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(Op::Max, self, rhs)
    }

    pub fn abs(self) -> Self {
        Self::unary(Op::Abs, self)
    }

    /// Member access on a record value.
    pub fn field(self, name: &str) -> Self {
        Self::binary(Op::Field, self, Expr::lit(name))
    }

    pub fn index(self, key: impl Into<Expr>) -> Self {
        Self::binary(Op::Index, self, key)
    }

    /// Call the value this expression evaluates to.
    pub fn call<I, E>(self, args: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::Call {
            callee: Box::new(self),
            args: args.into_iter().map(Into::into).collect(),
            kwargs: Vec::new(),
        }
    }

    /// Call with positional and keyword operands.
    pub fn call_with<I, E, K>(self, args: I, kwargs: K) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
        K: IntoIterator<Item = (String, Expr)>,
    {
        Expr::Call {
            callee: Box::new(self),
            args: args.into_iter().map(Into::into).collect(),
            kwargs: kwargs.into_iter().collect(),
        }
    }

    /// Evaluate against a game object.
    pub fn eval(&self, object: &GameObject) -> Result<StatValue, StatError> {
        self.eval_with(&|id: &StatId| object.get(id))
    }

    /// Evaluate with an arbitrary stat lookup.
    pub fn eval_with<F>(&self, lookup: &F) -> Result<StatValue, StatError>
    where
        F: Fn(&StatId) -> Result<StatValue, StatError>,
    {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Stat(id) => lookup(id),
            Expr::Apply { op, args } => {
                let values = args
                    .iter()
                    .map(|a| a.eval_with(lookup))
                    .collect::<Result<Vec<_>, _>>()?;
                fold(*op, &values)
            }
            Expr::Call {
                callee,
                args,
                kwargs,
            } => {
                let func = callee.eval_with(lookup)?;
                let values = args
                    .iter()
                    .map(|a| a.eval_with(lookup))
                    .collect::<Result<Vec<_>, _>>()?;
                let named = kwargs
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.eval_with(lookup)?)))
                    .collect::<Result<BTreeMap<_, _>, StatError>>()?;
                func.call(&values, &named)
            }
        }
    }

    /// Names of the stats this expression reads. Named references count
    /// as themselves; nested unnamed nodes contribute their own sets.
    pub fn dependencies(&self) -> BTreeSet<StatId> {
        let mut out = BTreeSet::new();
        self.collect_dependencies(&mut out);
        out
    }

    fn collect_dependencies(&self, out: &mut BTreeSet<StatId>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Stat(id) => {
                out.insert(id.clone());
            }
            Expr::Apply { args, .. } => {
                for a in args {
                    a.collect_dependencies(out);
                }
            }
            Expr::Call {
                callee,
                args,
                kwargs,
            } => {
                callee.collect_dependencies(out);
                for a in args.iter().chain(kwargs.iter().map(|(_, v)| v)) {
                    a.collect_dependencies(out);
                }
            }
        }
    }
}

fn fold(op: Op, values: &[StatValue]) -> Result<StatValue, StatError> {
    let (first, rest) = values
        .split_first()
        .ok_or(StatError::EmptyExpression(op.symbol()))?;
    if op.is_unary() {
        return op.apply_unary(first);
    }
    if op.folds_right() {
        let (last, init) = values
            .split_last()
            .ok_or(StatError::EmptyExpression(op.symbol()))?;
        return init
            .iter()
            .rev()
            .try_fold(last.clone(), |acc, v| op.apply_binary(v, &acc));
    }
    rest.iter()
        .try_fold(first.clone(), |acc, v| op.apply_binary(&acc, v))
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(StatValue::Str(s)) => write!(f, "{s:?}"),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Stat(id) => write!(f, "{id}"),
            Expr::Apply { op, args } if op.is_unary() => match args.first() {
                Some(a) if *op == Op::Neg => write!(f, "-{a}"),
                Some(a) => write!(f, "{}({a})", op.symbol()),
                None => write!(f, "{}()", op.symbol()),
            },
            Expr::Apply {
                op: Op::Field,
                args,
            } => match (args.first(), args.get(1)) {
                (Some(base), Some(Expr::Literal(StatValue::Str(name)))) => {
                    write!(f, "{base}.{name}")
                }
                (Some(base), Some(key)) => write!(f, "{base}.{key}"),
                _ => f.write_str("<field>"),
            },
            Expr::Apply {
                op: Op::Index,
                args,
            } => match (args.first(), args.get(1)) {
                (Some(base), Some(key)) => write!(f, "{base}[{key}]"),
                _ => f.write_str("<index>"),
            },
            Expr::Apply { op, args } => {
                f.write_str("(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", op.symbol())?;
                    }
                    write!(f, "{a}")?;
                }
                f.write_str(")")
            }
            Expr::Call {
                callee,
                args,
                kwargs,
            } => {
                write!(f, "{callee}(")?;
                let positional = args.iter().map(|a| a.to_string());
                let named = kwargs.iter().map(|(k, v)| format!("{k}={v}"));
                let parts: Vec<String> = positional.chain(named).collect();
                write!(f, "{})", parts.join(", "))
            }
        }
    }
}

impl From<StatValue> for Expr {
    fn from(v: StatValue) -> Self {
        Expr::Literal(v)
    }
}

impl From<StatId> for Expr {
    fn from(id: StatId) -> Self {
        Expr::Stat(id)
    }
}

impl From<&Expr> for Expr {
    fn from(e: &Expr) -> Self {
        e.clone()
    }
}

impl From<Callable> for Expr {
    fn from(c: Callable) -> Self {
        Expr::Literal(StatValue::Func(c))
    }
}

macro_rules! literal_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Expr {
                fn from(v: $t) -> Self {
                    Expr::Literal(StatValue::from(v))
                }
            }
        )*
    };
}

literal_from!(bool, i32, i64, u32, f64, &str, String);

macro_rules! binary_operator {
    ($($trait:ident, $method:ident, $op:expr;)*) => {
        $(
            impl<T: Into<Expr>> ops::$trait<T> for Expr {
                type Output = Expr;
                fn $method(self, rhs: T) -> Expr {
                    Expr::binary($op, self, rhs)
                }
            }

            impl<T: Into<Expr>> ops::$trait<T> for &Expr {
                type Output = Expr;
                fn $method(self, rhs: T) -> Expr {
                    Expr::binary($op, self.clone(), rhs)
                }
            }

            binary_operator!(@reflected $trait, $method, $op, i32, i64, f64, bool, &str);
        )*
    };
    (@reflected $trait:ident, $method:ident, $op:expr, $($lit:ty),*) => {
        $(
            impl ops::$trait<Expr> for $lit {
                type Output = Expr;
                fn $method(self, rhs: Expr) -> Expr {
                    Expr::binary($op, self, rhs)
                }
            }

            impl ops::$trait<&Expr> for $lit {
                type Output = Expr;
                fn $method(self, rhs: &Expr) -> Expr {
                    Expr::binary($op, self, rhs.clone())
                }
            }
        )*
    };
}

binary_operator! {
    Add, add, Op::Add;
    Sub, sub, Op::Sub;
    Mul, mul, Op::Mul;
    Div, div, Op::Div;
    Rem, rem, Op::Rem;
    BitAnd, bitand, Op::BitAnd;
    BitOr, bitor, Op::BitOr;
    BitXor, bitxor, Op::BitXor;
}

impl ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(Op::Neg, self)
    }
}

impl ops::Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(Op::Neg, self.clone())
    }
}

impl ops::Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        Expr::unary(Op::Not, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_stats(id: &StatId) -> Result<StatValue, StatError> {
        Err(StatError::UnknownStat {
            type_name: "test".to_string(),
            stat: id.clone(),
        })
    }

    fn lookup(pairs: &[(&str, i64)]) -> impl Fn(&StatId) -> Result<StatValue, StatError> {
        let map: BTreeMap<StatId, StatValue> = pairs
            .iter()
            .map(|(k, v)| (StatId::new(k), StatValue::Int(*v)))
            .collect();
        move |id: &StatId| map.get(id).cloned().ok_or_else(|| no_stats(id).unwrap_err())
    }

    fn arity(expr: &Expr) -> usize {
        match expr {
            Expr::Apply { args, .. } => args.len(),
            _ => 0,
        }
    }

    #[test]
    fn test_derived_formula() {
        let max_hp = (Expr::stat("STR") + 1) * 10;
        let value = max_hp.eval_with(&lookup(&[("STR", 2)])).unwrap();
        assert_eq!(value, StatValue::Int(30));
    }

    #[test]
    fn test_left_chain_is_flat() {
        let chain = Expr::stat("a") + Expr::stat("b") + 3 + 4;
        assert_eq!(arity(&chain), 4);
        let value = chain.eval_with(&lookup(&[("a", 1), ("b", 2)])).unwrap();
        assert_eq!(value, StatValue::Int(10));
    }

    #[test]
    fn test_left_chain_of_subtraction_folds_left() {
        let chain = Expr::lit(20) - Expr::stat("a") - 3;
        assert_eq!(arity(&chain), 3);
        let value = chain.eval_with(&lookup(&[("a", 5)])).unwrap();
        assert_eq!(value, StatValue::Int(12));
    }

    #[test]
    fn test_subtraction_with_chain_on_right_nests() {
        let inner = Expr::stat("x") - 3;
        let outer = 10 - inner;
        assert_eq!(arity(&outer), 2);
        // 10 - (7 - 3)
        let value = outer.eval_with(&lookup(&[("x", 7)])).unwrap();
        assert_eq!(value, StatValue::Int(6));
    }

    #[test]
    fn test_reflected_pow_chain_folds_right() {
        let tower = Expr::lit(2).pow(Expr::lit(3).pow(Expr::stat("x")));
        assert_eq!(arity(&tower), 3);
        // 2 ** (3 ** 2) = 512, not (2 ** 3) ** 2 = 64
        let value = tower.eval_with(&lookup(&[("x", 2)])).unwrap();
        assert_eq!(value, StatValue::Int(512));
    }

    #[test]
    fn test_left_pow_chain_nests() {
        let squared_cube = Expr::stat("x").pow(3).pow(2);
        assert_eq!(arity(&squared_cube), 2);
        let value = squared_cube.eval_with(&lookup(&[("x", 2)])).unwrap();
        assert_eq!(value, StatValue::Int(64));
    }

    #[test]
    fn test_literal_on_left_of_associative_chain_prepends() {
        let chain = 1 + (2 + (3 + Expr::stat("x")));
        assert_eq!(arity(&chain), 4);
        let value = chain.eval_with(&lookup(&[("x", 4)])).unwrap();
        assert_eq!(value, StatValue::Int(10));

        let text = "a" + (Expr::lit("b") + Expr::lit("c"));
        assert_eq!(text.eval_with(&no_stats).unwrap(), StatValue::from("abc"));
    }

    #[test]
    fn test_comparisons_and_logic() {
        let f = Expr::stat("fresh");
        let wilted = f.clone().lt(50).and(f.clone().ge(0));
        let get = lookup(&[("fresh", 30)]);
        assert_eq!(wilted.eval_with(&get).unwrap(), StatValue::Bool(true));
        assert_eq!((!wilted).eval_with(&get).unwrap(), StatValue::Bool(false));
    }

    #[test]
    fn test_nan_orders_false_both_ways() {
        let nan = Expr::lit(f64::NAN);
        for cmp in [nan.clone().gt(0), nan.clone().ge(0), nan.clone().lt(0), nan.clone().le(0)] {
            assert_eq!(cmp.eval_with(&no_stats).unwrap(), StatValue::Bool(false));
        }
        let picked = nan.min(5).eval_with(&no_stats).unwrap();
        assert!(matches!(picked, StatValue::Float(f) if f.is_nan()));
    }

    #[test]
    fn test_runaway_repetition_is_an_error() {
        let huge = Expr::lit("abcd") * Expr::lit(i64::MAX);
        assert_eq!(huge.eval_with(&no_stats), Err(StatError::Overflow("*")));
    }

    #[test]
    fn test_string_times_condition() {
        let label = "apple" + ("(rotten)" * Expr::stat("fresh").lt(0));
        let get = lookup(&[("fresh", -1)]);
        assert_eq!(label.eval_with(&get).unwrap(), StatValue::from("apple(rotten)"));
        let get = lookup(&[("fresh", 5)]);
        assert_eq!(label.eval_with(&get).unwrap(), StatValue::from("apple"));
    }

    #[test]
    fn test_dependencies_flatten_unnamed_nodes() {
        let e = (Expr::stat("STR") + Expr::stat("DEX")) * Expr::stat("LVL") + 5;
        let deps: Vec<String> = e.dependencies().iter().map(|d| d.to_string()).collect();
        assert_eq!(deps, vec!["DEX", "LVL", "STR"]);
        assert!(Expr::lit(3).dependencies().is_empty());
    }

    #[test]
    fn test_call_field_and_index() {
        let pick = Callable::new("pick", |args| args[0].index(&args[1]));
        let e = Expr::from(pick).call([Expr::lit(StatValue::List(vec![
            StatValue::Int(4),
            StatValue::Int(9),
        ])), Expr::lit(1)]);
        assert_eq!(e.eval_with(&no_stats).unwrap(), StatValue::Int(9));

        let mut rec = BTreeMap::new();
        rec.insert("atk".to_string(), StatValue::Int(3));
        let field = Expr::lit(StatValue::Record(rec)).field("atk");
        assert_eq!(field.eval_with(&no_stats).unwrap(), StatValue::Int(3));
    }

    #[test]
    fn test_keyword_call() {
        let scaled = Callable::with_keywords("scaled", |args, kwargs| {
            let factor = kwargs.get("by").cloned().unwrap_or(StatValue::Int(1));
            args[0].mul(&factor)
        });
        let e = Expr::from(scaled).call_with([Expr::stat("a")], [("by".to_string(), Expr::lit(3))]);
        assert_eq!(e.eval_with(&lookup(&[("a", 5)])).unwrap(), StatValue::Int(15));
        assert_eq!(e.to_string(), "<fn scaled>(a, by=3)");
    }

    #[test]
    fn test_unknown_stat_fails_loudly() {
        let e = Expr::stat("ghost") + 1;
        assert!(matches!(
            e.eval_with(&no_stats),
            Err(StatError::UnknownStat { .. })
        ));
    }

    #[test]
    fn test_min_max_and_unary() {
        let e = Expr::stat("a").max(0).min(10);
        assert_eq!(e.eval_with(&lookup(&[("a", 42)])).unwrap(), StatValue::Int(10));
        assert_eq!((-Expr::stat("a")).abs().eval_with(&lookup(&[("a", 4)])).unwrap(), StatValue::Int(4));
    }
}
