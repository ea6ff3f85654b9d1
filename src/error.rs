//! Error types for stat declaration and evaluation.
//!
//! All errors the engine reports are variants of `StatError`. Cycles are
//! definition-time failures; everything else surfaces from reads, writes,
//! actions and turn advances.

use crate::stat_id::StatId;
use thiserror::Error;

/// Format a cycle path as a readable string.
fn format_cycle_path(path: &[StatId]) -> String {
    if path.is_empty() {
        return String::from("(empty cycle)");
    }
    path.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors raised while defining types or evaluating stats.
///
/// # Examples
///
/// ```rust
/// use gamestat::{StatError, StatId};
///
/// let err = StatError::NotSettable(StatId::new("maxHP"));
/// assert_eq!(err.to_string(), "Stat `maxHP` is not settable");
/// ```
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatError {
    /// The declared stats of a type depend on each other in a loop.
    ///
    /// If A reads B, B reads C and C reads A, the path is `[A, B, C, A]`.
    #[error("Cycle detected in {type_name}: {}", format_cycle_path(.path))]
    Cycle {
        type_name: String,
        path: Vec<StatId>,
    },

    /// A stat name was read that the type never declared.
    #[error("Unknown stat `{stat}` on {type_name}")]
    UnknownStat { type_name: String, stat: StatId },

    /// A `Point` was read before anything seeded it.
    #[error("Stat `{0}` has not been initialized")]
    Uninitialized(StatId),

    /// Only `Point` stats accept writes.
    #[error("Stat `{0}` is not settable")]
    NotSettable(StatId),

    /// A target-acting attribute was declared on a type that is not a buff.
    #[error("Target-acting attribute `{stat}` declared on non-buff type {type_name}")]
    TargetOnPlainType { type_name: String, stat: StatId },

    /// A buff was constructed from a plain object type.
    #[error("Type {0} is not a buff type")]
    NotABuffType(String),

    /// A binary operation received operands it cannot combine.
    #[error("Unsupported operand types for {op}: {lhs} and {rhs}")]
    TypeMismatch {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    /// A unary operation received an operand it cannot handle.
    #[error("Bad operand type for {op}: {operand}")]
    BadOperand {
        op: &'static str,
        operand: &'static str,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Integer overflow in {0}")]
    Overflow(&'static str),

    #[error("No field `{0}`")]
    NoSuchField(String),

    #[error("Index {0} out of range")]
    IndexOutOfRange(i64),

    #[error("Value of type {0} is not callable")]
    NotCallable(&'static str),

    /// An operation node was built without operands.
    #[error("Expression `{0}` has no operands")]
    EmptyExpression(&'static str),

    /// Construction arguments could not be interpreted.
    #[error("Invalid initial values: {0}")]
    InvalidInit(String),

    /// Raised by user-supplied handlers and callables.
    #[error("{0}")]
    Custom(String),
}
