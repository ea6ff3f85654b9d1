//! Effect pipeline.
//!
//! A stat is declared with an ordered list of effects. Each effect may
//! register action handlers when the owning type is built (`bind`),
//! transform the running value on every read or write (`apply`), and
//! report the stats it reads (`dependencies`).
//!
//! Effects run strictly in declaration order. The first one receives the
//! stored value, which is `StatValue::None` for a cell nothing seeded.
//!
//! # Examples
//!
//! ```rust
//! use gamestat::effect::{arg, maxim, minim};
//! use gamestat::{GameObject, InitValues, ObjectType, StatValue};
//! use std::sync::Arc;
//!
//! let ty = Arc::new(
//!     ObjectType::builder("Slime")
//!         .point("HP", [arg(100), minim(0), maxim(100)])
//!         .build()
//!         .unwrap(),
//! );
//! let mut slime = GameObject::new(&ty, InitValues::new()).unwrap();
//! slime.set("HP", 250).unwrap();
//! assert_eq!(slime.get("HP").unwrap(), StatValue::Int(100));
//! ```

use crate::action::{handler, ActionTable, Handler, DEFAULT_INIT, GAIN_EXP, GAIN_POT, INIT, TURN_ACT};
use crate::error::StatError;
use crate::expr::Expr;
use crate::object::GameObject;
use crate::stat_id::StatId;
use crate::value::StatValue;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A transformation bound to one stat of one type.
///
/// All methods have pass-through defaults, so an effect only overrides
/// what it participates in.
pub trait Effect: Send + Sync + fmt::Debug {
    /// Called once per owning type while it is built.
    fn bind(&self, binding: &mut Binding<'_>) {
        let _ = binding;
    }

    /// Transform the running value. Runs on every read of a `Value` and
    /// on every write of a `Point`.
    fn apply(
        &self,
        value: StatValue,
        object: &GameObject,
        stat: &StatId,
    ) -> Result<StatValue, StatError> {
        let _ = (object, stat);
        Ok(value)
    }

    /// Stats this effect reads.
    fn dependencies(&self) -> BTreeSet<StatId> {
        BTreeSet::new()
    }
}

/// Whether a stat stores its folded result (`Point`) or folds on read (`Value`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Value,
    Point,
}

/// What an effect sees while it is bound to a stat.
pub struct Binding<'a> {
    type_name: &'a str,
    stat: &'a StatId,
    kind: CellKind,
    actions: &'a mut ActionTable,
}

impl<'a> Binding<'a> {
    pub(crate) fn new(
        type_name: &'a str,
        stat: &'a StatId,
        kind: CellKind,
        actions: &'a mut ActionTable,
    ) -> Self {
        Self {
            type_name,
            stat,
            kind,
            actions,
        }
    }

    pub fn type_name(&self) -> &str {
        self.type_name
    }

    pub fn stat(&self) -> &StatId {
        self.stat
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    /// Register `handler` for `action` on the bound stat.
    pub fn register(&mut self, action: &str, handler: Handler) {
        self.actions.register(action, self.stat.clone(), handler);
    }
}

fn optional_dependencies(expr: &Option<Expr>) -> BTreeSet<StatId> {
    expr.as_ref().map(Expr::dependencies).unwrap_or_default()
}

/// Seeds the stat from a constructor argument, or from `default`.
#[derive(Debug, Clone)]
pub struct Arg {
    default: Option<Expr>,
}

impl Effect for Arg {
    fn bind(&self, binding: &mut Binding<'_>) {
        let stat = binding.stat().clone();
        binding.register(
            INIT,
            handler(move |obj, args| {
                let value = args.first().cloned().unwrap_or_default();
                obj.store_raw(&stat, value)
            }),
        );
        let stat = binding.stat().clone();
        let default = self.default.clone();
        binding.register(
            DEFAULT_INIT,
            handler(move |obj, _| {
                let value = match &default {
                    Some(expr) => expr.eval(obj)?,
                    None => StatValue::None,
                };
                obj.store_raw(&stat, value)
            }),
        );
    }

    fn dependencies(&self) -> BTreeSet<StatId> {
        optional_dependencies(&self.default)
    }
}

/// Settable through the constructor, falling back to `default`.
///
/// `default` may read other stats; they are initialized first.
pub fn arg(default: impl Into<Expr>) -> Arc<dyn Effect> {
    Arc::new(Arg {
        default: Some(default.into()),
    })
}

/// Settable through the constructor, left empty otherwise.
pub fn arg_none() -> Arc<dyn Effect> {
    Arc::new(Arg { default: None })
}

/// Seeds the stat when the constructor does not, without accepting a
/// constructor value.
#[derive(Debug, Clone)]
pub struct DefaultValue {
    value: Expr,
}

impl Effect for DefaultValue {
    fn bind(&self, binding: &mut Binding<'_>) {
        let stat = binding.stat().clone();
        let value = self.value.clone();
        binding.register(
            DEFAULT_INIT,
            handler(move |obj, _| {
                let seed = value.eval(obj)?;
                obj.store_raw(&stat, seed)
            }),
        );
    }

    fn dependencies(&self) -> BTreeSet<StatId> {
        self.value.dependencies()
    }
}

pub fn default(value: impl Into<Expr>) -> Arc<dyn Effect> {
    Arc::new(DefaultValue {
        value: value.into(),
    })
}

/// Lower bound.
#[derive(Debug, Clone)]
pub struct Minim {
    bound: Expr,
}

impl Effect for Minim {
    fn apply(&self, value: StatValue, object: &GameObject, _: &StatId) -> Result<StatValue, StatError> {
        let bound = self.bound.eval(object)?;
        if value.compare(&bound, "minim")? == Some(Ordering::Less) {
            Ok(bound)
        } else {
            Ok(value)
        }
    }

    fn dependencies(&self) -> BTreeSet<StatId> {
        self.bound.dependencies()
    }
}

pub fn minim(bound: impl Into<Expr>) -> Arc<dyn Effect> {
    Arc::new(Minim {
        bound: bound.into(),
    })
}

/// Upper bound.
#[derive(Debug, Clone)]
pub struct Maxim {
    bound: Expr,
}

impl Effect for Maxim {
    fn apply(&self, value: StatValue, object: &GameObject, _: &StatId) -> Result<StatValue, StatError> {
        let bound = self.bound.eval(object)?;
        if value.compare(&bound, "maxim")? == Some(Ordering::Greater) {
            Ok(bound)
        } else {
            Ok(value)
        }
    }

    fn dependencies(&self) -> BTreeSet<StatId> {
        self.bound.dependencies()
    }
}

pub fn maxim(bound: impl Into<Expr>) -> Arc<dyn Effect> {
    Arc::new(Maxim {
        bound: bound.into(),
    })
}

/// Adds another stat or constant to the running value.
#[derive(Debug, Clone)]
pub struct Bonus {
    other: Expr,
}

impl Effect for Bonus {
    fn apply(&self, value: StatValue, object: &GameObject, _: &StatId) -> Result<StatValue, StatError> {
        value.add(&self.other.eval(object)?)
    }

    fn dependencies(&self) -> BTreeSet<StatId> {
        self.other.dependencies()
    }
}

pub fn bonus(other: impl Into<Expr>) -> Arc<dyn Effect> {
    Arc::new(Bonus {
        other: other.into(),
    })
}

/// Experience-driven growth.
///
/// Keeps a second, hidden potential cell next to the value cell.
/// `gainexp(e)` moves `e` out of potential and adds `e * freq` to the
/// value; `gainpot(p)` adds `p` to potential. Both bypass the read
/// pipeline and act on the cells directly.
#[derive(Debug, Clone)]
pub struct Grow {
    freq: StatValue,
}

impl Effect for Grow {
    fn bind(&self, binding: &mut Binding<'_>) {
        let stat = binding.stat().clone();
        let freq = self.freq.clone();
        binding.register(
            GAIN_EXP,
            handler(move |obj, args| {
                let exp = args.first().cloned().unwrap_or_default();
                let value = obj.raw(&stat)?.add(&exp.mul(&freq)?)?;
                let potential = obj.potential(&stat)?.sub(&exp)?;
                obj.store_raw(&stat, value)?;
                obj.store_potential(&stat, potential)
            }),
        );
        let stat = binding.stat().clone();
        binding.register(
            GAIN_POT,
            handler(move |obj, args| {
                let pot = args.first().cloned().unwrap_or_default();
                let potential = obj.potential(&stat)?.add(&pot)?;
                obj.store_potential(&stat, potential)
            }),
        );
    }
}

/// Growth at `freq` value per point of experience (`1.0` in the common case).
pub fn grow(freq: impl Into<StatValue>) -> Arc<dyn Effect> {
    Arc::new(Grow { freq: freq.into() })
}

/// Per-turn accrual.
///
/// On a `Point` the new value is written through the stat's pipeline, so
/// bounds stay in force. On a `Value` the stored cell is updated in place.
#[derive(Debug, Clone)]
pub struct Turn {
    delta: Expr,
}

impl Effect for Turn {
    fn bind(&self, binding: &mut Binding<'_>) {
        let stat = binding.stat().clone();
        let delta = self.delta.clone();
        let kind = binding.kind();
        binding.register(
            TURN_ACT,
            handler(move |obj, _| {
                let step = delta.eval(obj)?;
                match kind {
                    CellKind::Point => {
                        let next = obj.get(&stat)?.add(&step)?;
                        obj.set(&stat, next)
                    }
                    CellKind::Value => {
                        let next = obj.raw(&stat)?.add(&step)?;
                        obj.store_raw(&stat, next)
                    }
                }
            }),
        );
    }

    fn dependencies(&self) -> BTreeSet<StatId> {
        self.delta.dependencies()
    }
}

pub fn turn(delta: impl Into<Expr>) -> Arc<dyn Effect> {
    Arc::new(Turn {
        delta: delta.into(),
    })
}

/// Folds the running value through every attached buff's read modifier,
/// in attachment order.
#[derive(Debug, Clone, Default)]
pub struct Buffed;

impl Effect for Buffed {
    fn apply(&self, value: StatValue, object: &GameObject, stat: &StatId) -> Result<StatValue, StatError> {
        object
            .buffs()
            .iter()
            .try_fold(value, |acc, buff| buff.modify(stat, acc))
    }
}

pub fn buffed() -> Arc<dyn Effect> {
    Arc::new(Buffed)
}
