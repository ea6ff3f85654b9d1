//! Game object instances.
//!
//! A `GameObject` holds the storage cells of one instance of an
//! [`ObjectType`] plus its attached buffs. Reads run a stat's effect
//! chain, writes to `Point` stats run it before storing, and
//! [`GameObject::turn`] advances everything by one game turn.

use crate::action::{DEFAULT_INIT, GAIN_EXP, GAIN_POT, INIT, TURN_ACT};
use crate::buff::{Buff, BuffId};
use crate::error::StatError;
use crate::init::InitValues;
use crate::object_type::{ObjectType, StatDecl, StatKind};
use crate::stat_id::StatId;
use crate::value::StatValue;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Cells {
    value: Option<StatValue>,
    potential: StatValue,
}

impl Default for Cells {
    fn default() -> Self {
        Self {
            value: None,
            potential: StatValue::Int(0),
        }
    }
}

/// An instance of a declared type.
///
/// # Examples
///
/// ```rust
/// use gamestat::effect::{arg, maxim, minim};
/// use gamestat::{Expr, GameObject, InitValues, ObjectType, StatValue};
/// use std::sync::Arc;
///
/// let max_hp = Expr::stat("maxHP");
/// let ty = Arc::new(
///     ObjectType::builder("Character")
///         .value("STR", [arg(1)])
///         .derived("maxHP", (Expr::stat("STR") + 1) * 10)
///         .point("HP", [arg(max_hp.clone()), minim(0), maxim(max_hp)])
///         .build()
///         .unwrap(),
/// );
///
/// let hero = GameObject::new(&ty, InitValues::new().with("STR", 2)).unwrap();
/// assert_eq!(hero.get("maxHP").unwrap(), StatValue::Int(30));
/// assert_eq!(hero.get("HP").unwrap(), StatValue::Int(30));
/// ```
#[derive(Debug, Clone)]
pub struct GameObject {
    ty: Arc<ObjectType>,
    cells: Vec<Cells>,
    buffs: Vec<Buff>,
}

impl GameObject {
    /// Construct an instance with no buffs attached.
    pub fn new(ty: &Arc<ObjectType>, init: InitValues) -> Result<Self, StatError> {
        Self::with_buffs(ty, Vec::new(), init)
    }

    /// Construct an instance.
    ///
    /// Buffs are attached before any stat is seeded. Stats are then walked
    /// in dependency order: those named in `init` get the `init` action
    /// with their value, the rest get `default_init`.
    ///
    /// # Returns
    ///
    /// * `Err(StatError::UnknownStat)` - If `init` names an undeclared stat
    pub fn with_buffs(
        ty: &Arc<ObjectType>,
        buffs: Vec<Buff>,
        init: InitValues,
    ) -> Result<Self, StatError> {
        if let Some(unknown) = init.keys().find(|k| !ty.contains(k)) {
            return Err(StatError::UnknownStat {
                type_name: ty.name().to_string(),
                stat: unknown.clone(),
            });
        }

        let mut object = Self {
            ty: Arc::clone(ty),
            cells: vec![Cells::default(); ty.decls().len()],
            buffs: Vec::with_capacity(buffs.len()),
        };
        for buff in buffs {
            object.attach_buff(buff)?;
        }

        for stat in ty.init_order() {
            match init.get(stat) {
                Some(value) => ty
                    .actions()
                    .invoke(&mut object, INIT, stat, std::slice::from_ref(value))?,
                None => ty.actions().invoke(&mut object, DEFAULT_INIT, stat, &[])?,
            }
        }

        tracing::debug!(
            type_name = ty.name(),
            stats = ty.decls().len(),
            buffs = object.buffs.len(),
            "constructed object"
        );
        Ok(object)
    }

    pub fn object_type(&self) -> &Arc<ObjectType> {
        &self.ty
    }

    pub fn type_name(&self) -> &str {
        self.ty.name()
    }

    fn decl(&self, stat: &StatId) -> Result<&StatDecl, StatError> {
        self.ty.lookup(stat)
    }

    fn cells(&self, stat: &StatId) -> Result<&Cells, StatError> {
        let decl = self.decl(stat)?;
        if !decl.has_cells() {
            return Err(StatError::NotSettable(stat.clone()));
        }
        self.cells
            .get(decl.slot().index())
            .ok_or_else(|| StatError::UnknownStat {
                type_name: self.ty.name().to_string(),
                stat: stat.clone(),
            })
    }

    fn cells_mut(&mut self, stat: &StatId) -> Result<&mut Cells, StatError> {
        let decl = self.ty.lookup(stat)?;
        if !decl.has_cells() {
            return Err(StatError::NotSettable(stat.clone()));
        }
        let index = decl.slot().index();
        let type_name = self.ty.name().to_string();
        self.cells.get_mut(index).ok_or_else(|| StatError::UnknownStat {
            type_name,
            stat: stat.clone(),
        })
    }

    /// Read a stat through its effect chain.
    ///
    /// # Returns
    ///
    /// * `Err(StatError::UnknownStat)` - If the type never declared `stat`
    /// * `Err(StatError::Uninitialized)` - If `stat` is a `Point` nothing seeded
    pub fn get(&self, stat: impl Into<StatId>) -> Result<StatValue, StatError> {
        let stat = stat.into();
        let decl = self.decl(&stat)?;
        match decl.kind() {
            StatKind::Value(effects) => {
                let seed = self.cells(&stat)?.value.clone().unwrap_or_default();
                effects
                    .iter()
                    .try_fold(seed, |acc, effect| effect.apply(acc, self, &stat))
            }
            StatKind::Point(_) => self
                .cells(&stat)?
                .value
                .clone()
                .ok_or(StatError::Uninitialized(stat)),
            StatKind::Derived(expr) => expr.eval(self),
            StatKind::Target(action) => action.source().eval(self),
        }
    }

    /// Write a `Point` stat. The value passes through the stat's effect
    /// chain before it is stored.
    pub fn set(
        &mut self,
        stat: impl Into<StatId>,
        value: impl Into<StatValue>,
    ) -> Result<(), StatError> {
        let stat = stat.into();
        let ty = Arc::clone(&self.ty);
        let StatKind::Point(effects) = ty.lookup(&stat)?.kind() else {
            return Err(StatError::NotSettable(stat));
        };
        let folded = effects
            .iter()
            .try_fold(value.into(), |acc, effect| effect.apply(acc, self, &stat))?;
        self.cells_mut(&stat)?.value = Some(folded);
        Ok(())
    }

    /// The stored value cell, `None` when unseeded.
    pub fn raw(&self, stat: &StatId) -> Result<StatValue, StatError> {
        Ok(self.cells(stat)?.value.clone().unwrap_or_default())
    }

    /// Overwrite the value cell without running the effect chain.
    pub fn store_raw(&mut self, stat: &StatId, value: StatValue) -> Result<(), StatError> {
        self.cells_mut(stat)?.value = Some(value);
        Ok(())
    }

    /// The hidden potential cell maintained by `grow`.
    pub fn potential(&self, stat: impl Into<StatId>) -> Result<StatValue, StatError> {
        let stat = stat.into();
        Ok(self.cells(&stat)?.potential.clone())
    }

    pub fn store_potential(&mut self, stat: &StatId, value: StatValue) -> Result<(), StatError> {
        self.cells_mut(stat)?.potential = value;
        Ok(())
    }

    /// Dispatch `action` for `stat` through the type's action table.
    ///
    /// Stats without a handler fall back to the action's default, which
    /// does nothing unless the action was declared with one.
    pub fn act(
        &mut self,
        action: &str,
        stat: impl Into<StatId>,
        args: &[StatValue],
    ) -> Result<(), StatError> {
        let stat = stat.into();
        let ty = Arc::clone(&self.ty);
        ty.actions().invoke(self, action, &stat, args)
    }

    pub fn gain_exp(&mut self, stat: impl Into<StatId>, amount: impl Into<StatValue>) -> Result<(), StatError> {
        self.act(GAIN_EXP, stat, &[amount.into()])
    }

    pub fn gain_pot(&mut self, stat: impl Into<StatId>, amount: impl Into<StatValue>) -> Result<(), StatError> {
        self.act(GAIN_POT, stat, &[amount.into()])
    }

    /// Attached buffs in attachment order.
    pub fn buffs(&self) -> &[Buff] {
        &self.buffs
    }

    /// The live buff list, for direct manipulation.
    pub fn buffs_mut(&mut self) -> &mut Vec<Buff> {
        &mut self.buffs
    }

    /// Append a buff to the buff list.
    pub fn attach_buff(&mut self, buff: Buff) -> Result<(), StatError> {
        if self.buffs.iter().any(|b| b.id() == buff.id()) {
            return Err(StatError::Custom(format!(
                "buff {} is already attached to {}",
                buff.id(),
                self.ty.name()
            )));
        }
        self.buffs.push(buff);
        Ok(())
    }

    /// Remove a buff by id, returning it if it was attached.
    pub fn detach_buff(&mut self, id: BuffId) -> Option<Buff> {
        let pos = self.buffs.iter().position(|b| b.id() == id)?;
        let buff = self.buffs.remove(pos);
        tracing::debug!(
            type_name = self.ty.name(),
            buff = %id,
            buff_type = buff.type_name(),
            "detached buff"
        );
        Some(buff)
    }

    /// Advance one game turn.
    ///
    /// Runs the pre-turn hook, every stat's `turn_act`, then each buff
    /// attached when the turn began, then the post-turn hook. Each buff
    /// first advances its own stats and then acts on this object, so its
    /// expiry condition sees the current turn. A buff detached by an
    /// earlier one still takes this turn; its advanced state is only kept
    /// while it stays attached.
    ///
    /// A failure part way leaves earlier updates in place.
    pub fn turn(&mut self) -> Result<(), StatError> {
        let ty = Arc::clone(&self.ty);
        tracing::trace!(type_name = ty.name(), buffs = self.buffs.len(), "turn");

        if let Some(hook) = ty.pre_turn() {
            hook(self)?;
        }
        for stat in ty.stat_names() {
            ty.actions().invoke(self, TURN_ACT, stat, &[])?;
        }

        let snapshot = self.buffs.clone();
        for mut buff in snapshot {
            buff.advance()?;
            if let Some(attached) = self.buffs.iter_mut().find(|b| b.id() == buff.id()) {
                *attached = buff.clone();
            }
            buff.act_on(self)?;
        }

        if let Some(hook) = ty.post_turn() {
            hook(self)?;
        }
        Ok(())
    }

    /// Every stat with its current value.
    ///
    /// `Point` stats nothing has seeded yet are left out; any other read
    /// failure is returned.
    pub fn readout(&self) -> Result<BTreeMap<StatId, StatValue>, StatError> {
        let mut out = BTreeMap::new();
        for name in self.ty.stat_names() {
            match self.get(name) {
                Ok(value) => {
                    out.insert(name.clone(), value);
                }
                Err(StatError::Uninitialized(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(out)
    }
}
