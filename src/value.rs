//! Dynamic stat values.
//!
//! Stats are authored by designers, so the values they hold are dynamic:
//! numbers, flags, text, lists, records and callables. `StatValue` is that
//! value type, and its methods implement the operator semantics the
//! expression engine applies. Integers and floats mix freely, booleans
//! count as integers in arithmetic, and integer arithmetic is checked.

use crate::error::StatError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

type NativeFn =
    dyn Fn(&[StatValue], &BTreeMap<String, StatValue>) -> Result<StatValue, StatError> + Send + Sync;

/// A named native function that can be stored in a stat and called from
/// an expression.
///
/// # Examples
///
/// ```rust
/// use gamestat::{Callable, StatValue};
///
/// let double = Callable::new("double", |args| args[0].mul(&StatValue::Int(2)));
/// let result = double.call(&[StatValue::Int(21)], &Default::default()).unwrap();
/// assert_eq!(result, StatValue::Int(42));
/// ```
#[derive(Clone)]
pub struct Callable {
    name: Arc<str>,
    func: Arc<NativeFn>,
}

impl Callable {
    /// Wrap a function of positional arguments.
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[StatValue]) -> Result<StatValue, StatError> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            func: Arc::new(move |args, _kwargs| func(args)),
        }
    }

    /// Wrap a function that also receives keyword arguments.
    pub fn with_keywords<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[StatValue], &BTreeMap<String, StatValue>) -> Result<StatValue, StatError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the function.
    pub fn call(
        &self,
        args: &[StatValue],
        kwargs: &BTreeMap<String, StatValue>,
    ) -> Result<StatValue, StatError> {
        (self.func)(args, kwargs)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name)
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

/// The value of a stat, an expression operand, or an expression result.
///
/// `None` stands for an absent value, e.g. a `Value` stat that nothing
/// seeded. Callables are skipped by serde.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<StatValue>),
    Record(BTreeMap<String, StatValue>),
    #[serde(skip)]
    Func(Callable),
}

#[derive(Clone, Copy)]
enum Num {
    I(i64),
    F(f64),
}

impl Num {
    fn to_f64(self) -> f64 {
        match self {
            Num::I(i) => i as f64,
            Num::F(f) => f,
        }
    }
}

fn mismatch(op: &'static str, lhs: &StatValue, rhs: &StatValue) -> StatError {
    StatError::TypeMismatch {
        op,
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    }
}

fn bad_operand(op: &'static str, operand: &StatValue) -> StatError {
    StatError::BadOperand {
        op,
        operand: operand.type_name(),
    }
}

impl StatValue {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            StatValue::None => "none",
            StatValue::Bool(_) => "bool",
            StatValue::Int(_) => "int",
            StatValue::Float(_) => "float",
            StatValue::Str(_) => "str",
            StatValue::List(_) => "list",
            StatValue::Record(_) => "record",
            StatValue::Func(_) => "function",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, StatValue::None)
    }

    /// Truthiness: zero, empty and `None` are false.
    pub fn truthy(&self) -> bool {
        match self {
            StatValue::None => false,
            StatValue::Bool(b) => *b,
            StatValue::Int(i) => *i != 0,
            StatValue::Float(f) => *f != 0.0,
            StatValue::Str(s) => !s.is_empty(),
            StatValue::List(l) => !l.is_empty(),
            StatValue::Record(r) => !r.is_empty(),
            StatValue::Func(_) => true,
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_num().map(Num::to_f64)
    }

    /// Integer view of the value. Floats are not truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self.as_num()? {
            Num::I(i) => Some(i),
            Num::F(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StatValue::Str(s) => Some(s),
            _ => None,
        }
    }

    fn as_num(&self) -> Option<Num> {
        match self {
            StatValue::Bool(b) => Some(Num::I(i64::from(*b))),
            StatValue::Int(i) => Some(Num::I(*i)),
            StatValue::Float(f) => Some(Num::F(*f)),
            _ => None,
        }
    }

    fn arith(
        &self,
        rhs: &StatValue,
        op: &'static str,
        int: fn(i64, i64) -> Option<i64>,
        float: fn(f64, f64) -> f64,
    ) -> Result<StatValue, StatError> {
        match (self.as_num(), rhs.as_num()) {
            (Some(Num::I(a)), Some(Num::I(b))) => {
                int(a, b).map(StatValue::Int).ok_or(StatError::Overflow(op))
            }
            (Some(a), Some(b)) => Ok(StatValue::Float(float(a.to_f64(), b.to_f64()))),
            _ => Err(mismatch(op, self, rhs)),
        }
    }

    /// `+`: numeric sum, or concatenation of strings and lists.
    pub fn add(&self, rhs: &StatValue) -> Result<StatValue, StatError> {
        match (self, rhs) {
            (StatValue::Str(a), StatValue::Str(b)) => Ok(StatValue::Str(format!("{a}{b}"))),
            (StatValue::List(a), StatValue::List(b)) => {
                Ok(StatValue::List(a.iter().chain(b).cloned().collect()))
            }
            _ => self.arith(rhs, "+", i64::checked_add, |a, b| a + b),
        }
    }

    /// `-`
    pub fn sub(&self, rhs: &StatValue) -> Result<StatValue, StatError> {
        self.arith(rhs, "-", i64::checked_sub, |a, b| a - b)
    }

    /// `*`: numeric product, or repetition of a string or list by an integer.
    pub fn mul(&self, rhs: &StatValue) -> Result<StatValue, StatError> {
        match (self, rhs) {
            (StatValue::Str(s), n) | (n, StatValue::Str(s)) if n.as_i64().is_some() => {
                let count = repeat_count(n)?;
                if s.is_empty() || count == 0 {
                    return Ok(StatValue::Str(String::new()));
                }
                repeated_len(s.len(), 1, count)?;
                Ok(StatValue::Str(s.repeat(count)))
            }
            (StatValue::List(l), n) | (n, StatValue::List(l)) if n.as_i64().is_some() => {
                let count = repeat_count(n)?;
                if l.is_empty() || count == 0 {
                    return Ok(StatValue::List(Vec::new()));
                }
                let mut out = Vec::with_capacity(repeated_len(
                    l.len(),
                    std::mem::size_of::<StatValue>(),
                    count,
                )?);
                for _ in 0..count {
                    out.extend(l.iter().cloned());
                }
                Ok(StatValue::List(out))
            }
            _ => self.arith(rhs, "*", i64::checked_mul, |a, b| a * b),
        }
    }

    /// `/`: true division, always a float.
    pub fn div(&self, rhs: &StatValue) -> Result<StatValue, StatError> {
        match (self.as_num(), rhs.as_num()) {
            (Some(a), Some(b)) => {
                let divisor = b.to_f64();
                if divisor == 0.0 {
                    return Err(StatError::DivisionByZero);
                }
                Ok(StatValue::Float(a.to_f64() / divisor))
            }
            _ => Err(mismatch("/", self, rhs)),
        }
    }

    /// `//`: division rounded toward negative infinity.
    pub fn floor_div(&self, rhs: &StatValue) -> Result<StatValue, StatError> {
        match (self.as_num(), rhs.as_num()) {
            (Some(Num::I(a)), Some(Num::I(b))) => {
                if b == 0 {
                    return Err(StatError::DivisionByZero);
                }
                let q = a.checked_div(b).ok_or(StatError::Overflow("//"))?;
                if a % b != 0 && ((a < 0) != (b < 0)) {
                    Ok(StatValue::Int(q - 1))
                } else {
                    Ok(StatValue::Int(q))
                }
            }
            (Some(a), Some(b)) => {
                let divisor = b.to_f64();
                if divisor == 0.0 {
                    return Err(StatError::DivisionByZero);
                }
                Ok(StatValue::Float((a.to_f64() / divisor).floor()))
            }
            _ => Err(mismatch("//", self, rhs)),
        }
    }

    /// `%`: the result takes the sign of the divisor.
    pub fn rem(&self, rhs: &StatValue) -> Result<StatValue, StatError> {
        match (self.as_num(), rhs.as_num()) {
            (Some(Num::I(a)), Some(Num::I(b))) => {
                if b == 0 {
                    return Err(StatError::DivisionByZero);
                }
                let r = a.checked_rem(b).ok_or(StatError::Overflow("%"))?;
                if r != 0 && ((r < 0) != (b < 0)) {
                    Ok(StatValue::Int(r + b))
                } else {
                    Ok(StatValue::Int(r))
                }
            }
            (Some(a), Some(b)) => {
                let (a, b) = (a.to_f64(), b.to_f64());
                if b == 0.0 {
                    return Err(StatError::DivisionByZero);
                }
                Ok(StatValue::Float(a - b * (a / b).floor()))
            }
            _ => Err(mismatch("%", self, rhs)),
        }
    }

    /// `**`: integer powers stay integral for non-negative exponents.
    pub fn pow(&self, rhs: &StatValue) -> Result<StatValue, StatError> {
        match (self.as_num(), rhs.as_num()) {
            (Some(Num::I(a)), Some(Num::I(b))) if b >= 0 => {
                let exp = u32::try_from(b).map_err(|_| StatError::Overflow("**"))?;
                a.checked_pow(exp)
                    .map(StatValue::Int)
                    .ok_or(StatError::Overflow("**"))
            }
            (Some(a), Some(b)) => {
                let (a, b) = (a.to_f64(), b.to_f64());
                if a == 0.0 && b < 0.0 {
                    return Err(StatError::DivisionByZero);
                }
                Ok(StatValue::Float(a.powf(b)))
            }
            _ => Err(mismatch("**", self, rhs)),
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`. Numbers compare with numbers,
    /// strings with strings.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - If either side is NaN; every ordered comparison is false
    /// * `Err(StatError::TypeMismatch)` - If the operands cannot be ordered
    pub fn compare(
        &self,
        rhs: &StatValue,
        op: &'static str,
    ) -> Result<Option<Ordering>, StatError> {
        match (self.as_num(), rhs.as_num()) {
            (Some(Num::I(a)), Some(Num::I(b))) => Ok(Some(a.cmp(&b))),
            (Some(a), Some(b)) => Ok(a.to_f64().partial_cmp(&b.to_f64())),
            _ => match (self, rhs) {
                (StatValue::Str(a), StatValue::Str(b)) => Ok(Some(a.cmp(b))),
                _ => Err(mismatch(op, self, rhs)),
            },
        }
    }

    /// Returns `self` when falsy, otherwise `rhs`.
    pub fn and(&self, rhs: &StatValue) -> StatValue {
        if self.truthy() {
            rhs.clone()
        } else {
            self.clone()
        }
    }

    /// Returns `self` when truthy, otherwise `rhs`.
    pub fn or(&self, rhs: &StatValue) -> StatValue {
        if self.truthy() {
            self.clone()
        } else {
            rhs.clone()
        }
    }

    fn bitwise(
        &self,
        rhs: &StatValue,
        op: &'static str,
        flag: fn(bool, bool) -> bool,
        int: fn(i64, i64) -> i64,
    ) -> Result<StatValue, StatError> {
        match (self, rhs) {
            (StatValue::Bool(a), StatValue::Bool(b)) => Ok(StatValue::Bool(flag(*a, *b))),
            _ => match (self.as_i64(), rhs.as_i64()) {
                (Some(a), Some(b)) => Ok(StatValue::Int(int(a, b))),
                _ => Err(mismatch(op, self, rhs)),
            },
        }
    }

    /// `&`
    pub fn bitand(&self, rhs: &StatValue) -> Result<StatValue, StatError> {
        self.bitwise(rhs, "&", |a, b| a & b, |a, b| a & b)
    }

    /// `|`
    pub fn bitor(&self, rhs: &StatValue) -> Result<StatValue, StatError> {
        self.bitwise(rhs, "|", |a, b| a | b, |a, b| a | b)
    }

    /// `^`
    pub fn bitxor(&self, rhs: &StatValue) -> Result<StatValue, StatError> {
        self.bitwise(rhs, "^", |a, b| a ^ b, |a, b| a ^ b)
    }

    /// Unary `-`.
    pub fn neg(&self) -> Result<StatValue, StatError> {
        match self.as_num() {
            Some(Num::I(i)) => i
                .checked_neg()
                .map(StatValue::Int)
                .ok_or(StatError::Overflow("unary -")),
            Some(Num::F(f)) => Ok(StatValue::Float(-f)),
            None => Err(bad_operand("unary -", self)),
        }
    }

    /// Logical not, by truthiness.
    pub fn not(&self) -> StatValue {
        StatValue::Bool(!self.truthy())
    }

    pub fn abs(&self) -> Result<StatValue, StatError> {
        match self.as_num() {
            Some(Num::I(i)) => i
                .checked_abs()
                .map(StatValue::Int)
                .ok_or(StatError::Overflow("abs")),
            Some(Num::F(f)) => Ok(StatValue::Float(f.abs())),
            None => Err(bad_operand("abs", self)),
        }
    }

    /// Member access on a record.
    pub fn field(&self, name: &str) -> Result<StatValue, StatError> {
        match self {
            StatValue::Record(r) => r
                .get(name)
                .cloned()
                .ok_or_else(|| StatError::NoSuchField(name.to_string())),
            other => Err(bad_operand(".field", other)),
        }
    }

    /// Indexing. Lists and strings take integer positions, negative ones
    /// counting from the end; records take string keys.
    pub fn index(&self, key: &StatValue) -> Result<StatValue, StatError> {
        match (self, key) {
            (StatValue::Record(_), StatValue::Str(k)) => self.field(k),
            (StatValue::List(items), k) if k.as_i64().is_some() => {
                let pos = resolve_index(k, items.len())?;
                Ok(items[pos].clone())
            }
            (StatValue::Str(s), k) if k.as_i64().is_some() => {
                let chars: Vec<char> = s.chars().collect();
                let pos = resolve_index(k, chars.len())?;
                Ok(StatValue::Str(chars[pos].to_string()))
            }
            _ => Err(mismatch("[]", self, key)),
        }
    }

    /// Call a stored function.
    pub fn call(
        &self,
        args: &[StatValue],
        kwargs: &BTreeMap<String, StatValue>,
    ) -> Result<StatValue, StatError> {
        match self {
            StatValue::Func(f) => f.call(args, kwargs),
            other => Err(StatError::NotCallable(other.type_name())),
        }
    }

    /// Convert parsed JSON into a stat value.
    pub fn from_json(value: &serde_json::Value) -> StatValue {
        match value {
            serde_json::Value::Null => StatValue::None,
            serde_json::Value::Bool(b) => StatValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => StatValue::Int(i),
                None => StatValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => StatValue::Str(s.clone()),
            serde_json::Value::Array(items) => {
                StatValue::List(items.iter().map(StatValue::from_json).collect())
            }
            serde_json::Value::Object(map) => StatValue::Record(
                map.iter()
                    .map(|(k, v)| (k.clone(), StatValue::from_json(v)))
                    .collect(),
            ),
        }
    }
}

fn repeat_count(n: &StatValue) -> Result<usize, StatError> {
    let count = n.as_i64().unwrap_or(0).max(0);
    usize::try_from(count).map_err(|_| StatError::Overflow("*"))
}

/// Element count of `len` items repeated `count` times, rejecting results
/// whose allocation would exceed `isize::MAX` bytes.
fn repeated_len(len: usize, item_size: usize, count: usize) -> Result<usize, StatError> {
    let total = len.checked_mul(count).ok_or(StatError::Overflow("*"))?;
    match total.checked_mul(item_size.max(1)) {
        Some(bytes) if isize::try_from(bytes).is_ok() => Ok(total),
        _ => Err(StatError::Overflow("*")),
    }
}

fn resolve_index(key: &StatValue, len: usize) -> Result<usize, StatError> {
    let raw = key.as_i64().unwrap_or(0);
    let len = i64::try_from(len).map_err(|_| StatError::IndexOutOfRange(raw))?;
    let pos = if raw < 0 { raw + len } else { raw };
    if pos < 0 || pos >= len {
        return Err(StatError::IndexOutOfRange(raw));
    }
    usize::try_from(pos).map_err(|_| StatError::IndexOutOfRange(raw))
}

impl PartialEq for StatValue {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_num(), other.as_num()) {
            (Some(Num::I(a)), Some(Num::I(b))) => a == b,
            (Some(a), Some(b)) => a.to_f64() == b.to_f64(),
            _ => match (self, other) {
                (StatValue::None, StatValue::None) => true,
                (StatValue::Str(a), StatValue::Str(b)) => a == b,
                (StatValue::List(a), StatValue::List(b)) => a == b,
                (StatValue::Record(a), StatValue::Record(b)) => a == b,
                (StatValue::Func(a), StatValue::Func(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::None => f.write_str("None"),
            StatValue::Bool(b) => write!(f, "{b}"),
            StatValue::Int(i) => write!(f, "{i}"),
            StatValue::Float(x) => write!(f, "{x}"),
            StatValue::Str(s) => f.write_str(s),
            StatValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            StatValue::Record(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            StatValue::Func(c) => write!(f, "<fn {}>", c.name()),
        }
    }
}

impl From<bool> for StatValue {
    fn from(b: bool) -> Self {
        StatValue::Bool(b)
    }
}

impl From<i32> for StatValue {
    fn from(i: i32) -> Self {
        StatValue::Int(i64::from(i))
    }
}

impl From<i64> for StatValue {
    fn from(i: i64) -> Self {
        StatValue::Int(i)
    }
}

impl From<u32> for StatValue {
    fn from(i: u32) -> Self {
        StatValue::Int(i64::from(i))
    }
}

impl From<f64> for StatValue {
    fn from(f: f64) -> Self {
        StatValue::Float(f)
    }
}

impl From<&str> for StatValue {
    fn from(s: &str) -> Self {
        StatValue::Str(s.to_string())
    }
}

impl From<String> for StatValue {
    fn from(s: String) -> Self {
        StatValue::Str(s)
    }
}

impl From<Vec<StatValue>> for StatValue {
    fn from(items: Vec<StatValue>) -> Self {
        StatValue::List(items)
    }
}

impl From<BTreeMap<String, StatValue>> for StatValue {
    fn from(map: BTreeMap<String, StatValue>) -> Self {
        StatValue::Record(map)
    }
}

impl From<Callable> for StatValue {
    fn from(c: Callable) -> Self {
        StatValue::Func(c)
    }
}
