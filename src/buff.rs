//! Buffs.
//!
//! A buff is a game object of a buff type: it has its own stats (a
//! duration, a magnitude) and, in addition, target-acting attributes that
//! change the object the buff is attached to. Once per turn the target
//! advances each attached buff's own stats and then lets the buff act on
//! it. A `Disable` attribute removes the buff from its target when its
//! condition holds.
//!
//! # Examples
//!
//! ```rust
//! use gamestat::buff::{add, disable};
//! use gamestat::effect::{arg, maxim, minim, turn};
//! use gamestat::{Buff, Expr, GameObject, InitValues, ObjectType, StatValue};
//! use std::sync::Arc;
//!
//! let poison = Arc::new(
//!     ObjectType::buff_builder("Poison")
//!         .point("duration", [arg(2), turn(-1)])
//!         .is_disabled(Expr::stat("duration").lt(0))
//!         .target("HP", add(-1))
//!         .target("expire", disable(Expr::stat("is_disabled")))
//!         .build()
//!         .unwrap(),
//! );
//! let slime = Arc::new(
//!     ObjectType::builder("Slime")
//!         .point("HP", [arg(10), minim(0), maxim(10)])
//!         .build()
//!         .unwrap(),
//! );
//!
//! let mut target = GameObject::new(&slime, InitValues::new()).unwrap();
//! target.attach_buff(Buff::new(&poison, InitValues::new()).unwrap()).unwrap();
//! for _ in 0..3 {
//!     target.turn().unwrap();
//! }
//! assert_eq!(target.get("HP").unwrap(), StatValue::Int(7));
//! assert!(target.buffs().is_empty());
//! ```

use crate::error::StatError;
use crate::expr::Expr;
use crate::init::InitValues;
use crate::object::GameObject;
use crate::object_type::{ObjectType, IS_DISABLED};
use crate::stat_id::StatId;
use crate::value::StatValue;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_BUFF_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a buff instance, unique for the life of the process.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct BuffId(u64);

impl BuffId {
    fn next() -> Self {
        Self(NEXT_BUFF_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BuffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An attribute of a buff type that acts on the buff's target.
///
/// Reading the attribute on the buff yields its `source` evaluated
/// against the buff.
pub trait TargetAction: Send + Sync + fmt::Debug {
    fn source(&self) -> &Expr;

    /// Called once per turn with the attribute's name.
    fn act(&self, stat: &StatId, buff: &Buff, target: &mut GameObject) -> Result<(), StatError> {
        let _ = (stat, buff, target);
        Ok(())
    }

    /// Adjust a read of the target's `stat`, for stats declared with
    /// `buffed()`. Only called while the buff is attached.
    fn modify(&self, value: StatValue, buff: &Buff, stat: &StatId) -> Result<StatValue, StatError> {
        let _ = (buff, stat);
        Ok(value)
    }
}

/// Adds its source, evaluated on the buff, to the target stat of the
/// same name every turn.
#[derive(Debug, Clone)]
pub struct Add {
    source: Expr,
}

impl TargetAction for Add {
    fn source(&self) -> &Expr {
        &self.source
    }

    fn act(&self, stat: &StatId, buff: &Buff, target: &mut GameObject) -> Result<(), StatError> {
        let delta = self.source.eval(buff.object())?;
        let next = target.get(stat)?.add(&delta)?;
        target.set(stat, next)
    }
}

pub fn add(source: impl Into<Expr>) -> Arc<dyn TargetAction> {
    Arc::new(Add {
        source: source.into(),
    })
}

/// Detaches the buff from its target once its condition, evaluated on
/// the buff, is truthy.
#[derive(Debug, Clone)]
pub struct Disable {
    condition: Expr,
}

impl TargetAction for Disable {
    fn source(&self) -> &Expr {
        &self.condition
    }

    fn act(&self, _: &StatId, buff: &Buff, target: &mut GameObject) -> Result<(), StatError> {
        if self.condition.eval(buff.object())?.truthy() {
            target.detach_buff(buff.id());
        }
        Ok(())
    }
}

pub fn disable(condition: impl Into<Expr>) -> Arc<dyn TargetAction> {
    Arc::new(Disable {
        condition: condition.into(),
    })
}

/// Multiplies reads of a `buffed()` target stat.
#[derive(Debug, Clone)]
pub struct Scale {
    factor: Expr,
}

impl TargetAction for Scale {
    fn source(&self) -> &Expr {
        &self.factor
    }

    fn modify(&self, value: StatValue, buff: &Buff, _: &StatId) -> Result<StatValue, StatError> {
        value.mul(&self.factor.eval(buff.object())?)
    }
}

pub fn scale(factor: impl Into<Expr>) -> Arc<dyn TargetAction> {
    Arc::new(Scale {
        factor: factor.into(),
    })
}

/// Adds to reads of a `buffed()` target stat.
#[derive(Debug, Clone)]
pub struct Offset {
    amount: Expr,
}

impl TargetAction for Offset {
    fn source(&self) -> &Expr {
        &self.amount
    }

    fn modify(&self, value: StatValue, buff: &Buff, _: &StatId) -> Result<StatValue, StatError> {
        value.add(&self.amount.eval(buff.object())?)
    }
}

pub fn offset(amount: impl Into<Expr>) -> Arc<dyn TargetAction> {
    Arc::new(Offset {
        amount: amount.into(),
    })
}

/// An instance of a buff type.
#[derive(Debug, Clone)]
pub struct Buff {
    id: BuffId,
    object: GameObject,
}

impl Buff {
    /// Construct a buff.
    ///
    /// # Returns
    ///
    /// * `Err(StatError::NotABuffType)` - If `ty` was not built with
    ///   [`ObjectType::buff_builder`]
    pub fn new(ty: &Arc<ObjectType>, init: InitValues) -> Result<Self, StatError> {
        if !ty.is_buff() {
            return Err(StatError::NotABuffType(ty.name().to_string()));
        }
        Ok(Self {
            id: BuffId::next(),
            object: GameObject::new(ty, init)?,
        })
    }

    pub fn id(&self) -> BuffId {
        self.id
    }

    pub fn type_name(&self) -> &str {
        self.object.type_name()
    }

    /// The buff's own stats.
    pub fn object(&self) -> &GameObject {
        &self.object
    }

    pub fn object_mut(&mut self) -> &mut GameObject {
        &mut self.object
    }

    pub fn get(&self, stat: impl Into<StatId>) -> Result<StatValue, StatError> {
        self.object.get(stat)
    }

    pub fn set(&mut self, stat: impl Into<StatId>, value: impl Into<StatValue>) -> Result<(), StatError> {
        self.object.set(stat, value)
    }

    /// The buff's expiry query. Reads `true` unless the type redeclared it.
    pub fn is_disabled(&self) -> Result<bool, StatError> {
        Ok(self.object.get(IS_DISABLED)?.truthy())
    }

    /// Advance the buff's own stats by one turn.
    pub fn advance(&mut self) -> Result<(), StatError> {
        self.object.turn()
    }

    /// Run every target-acting attribute against `target`, in declaration order.
    pub fn act_on(&self, target: &mut GameObject) -> Result<(), StatError> {
        let ty = Arc::clone(self.object.object_type());
        for (stat, action) in ty.target_actions() {
            action.act(stat, self, target)?;
        }
        Ok(())
    }

    /// Advance the buff's own stats, then act on `target`.
    pub fn turn(&mut self, target: &mut GameObject) -> Result<(), StatError> {
        self.advance()?;
        self.act_on(target)
    }

    /// Fold a read of the target's `stat` through this buff's modifiers.
    pub fn modify(&self, stat: &StatId, value: StatValue) -> Result<StatValue, StatError> {
        self.object
            .object_type()
            .target_actions()
            .filter(|(name, _)| *name == stat)
            .try_fold(value, |acc, (_, action)| action.modify(acc, self, stat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{arg, buffed, maxim, minim, turn};

    fn rage() -> Arc<ObjectType> {
        Arc::new(
            ObjectType::buff_builder("Rage")
                .value("power", [arg(2)])
                .target("ATK", scale(Expr::stat("power")))
                .target("DEF", offset(-3))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_plain_type_is_not_a_buff() {
        let plain = Arc::new(ObjectType::builder("Rock").build().unwrap());
        assert!(matches!(
            Buff::new(&plain, InitValues::new()),
            Err(StatError::NotABuffType(name)) if name == "Rock"
        ));
    }

    #[test]
    fn test_default_expiry_is_one_shot() {
        let ty = Arc::new(ObjectType::buff_builder("Flash").build().unwrap());
        let buff = Buff::new(&ty, InitValues::new()).unwrap();
        assert!(buff.is_disabled().unwrap());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Buff::new(&rage(), InitValues::new()).unwrap();
        let b = Buff::new(&rage(), InitValues::new()).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_target_attribute_reads_its_source() {
        let buff = Buff::new(&rage(), InitValues::new().with("power", 5)).unwrap();
        assert_eq!(buff.get("ATK").unwrap(), StatValue::Int(5));
        assert_eq!(buff.get("DEF").unwrap(), StatValue::Int(-3));
    }

    #[test]
    fn test_buffed_reads_apply_modifiers_while_attached() {
        let ty = Arc::new(
            ObjectType::builder("Knight")
                .value("ATK", [arg(10), buffed()])
                .value("DEF", [arg(5), buffed(), minim(0)])
                .build()
                .unwrap(),
        );
        let mut knight = GameObject::new(&ty, InitValues::new()).unwrap();
        let buff = Buff::new(&rage(), InitValues::new()).unwrap();
        let id = buff.id();
        knight.attach_buff(buff).unwrap();
        assert_eq!(knight.get("ATK").unwrap(), StatValue::Int(20));
        assert_eq!(knight.get("DEF").unwrap(), StatValue::Int(2));

        knight
            .attach_buff(Buff::new(&rage(), InitValues::new()).unwrap())
            .unwrap();
        assert_eq!(knight.get("ATK").unwrap(), StatValue::Int(40));
        assert_eq!(knight.get("DEF").unwrap(), StatValue::Int(0));

        knight.detach_buff(id).unwrap();
        knight.buffs_mut().clear();
        assert_eq!(knight.get("ATK").unwrap(), StatValue::Int(10));
    }

    #[test]
    fn test_reattaching_the_same_buff_fails() {
        let ty = Arc::new(ObjectType::builder("Knight").build().unwrap());
        let mut knight = GameObject::new(&ty, InitValues::new()).unwrap();
        let buff = Buff::new(&rage(), InitValues::new()).unwrap();
        knight.attach_buff(buff.clone()).unwrap();
        assert!(knight.attach_buff(buff).is_err());
    }

    #[test]
    fn test_standalone_turn_advances_then_acts() {
        let regen = Arc::new(
            ObjectType::buff_builder("Regen")
                .point("stacks", [arg(3), turn(-1)])
                .target("HP", add(Expr::stat("stacks")))
                .build()
                .unwrap(),
        );
        let ty = Arc::new(
            ObjectType::builder("T")
                .point("HP", [arg(0), maxim(100)])
                .build()
                .unwrap(),
        );
        let mut target = GameObject::new(&ty, InitValues::new()).unwrap();
        let mut buff = Buff::new(&regen, InitValues::new()).unwrap();
        buff.turn(&mut target).unwrap();
        buff.turn(&mut target).unwrap();
        // 2 + 1
        assert_eq!(target.get("HP").unwrap(), StatValue::Int(3));
        assert!(target.buffs().is_empty());
    }
}
