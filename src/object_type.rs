//! Object type descriptors.
//!
//! An `ObjectType` is the declaration of a kind of game object: its stats,
//! their effect chains, the action tables the effects registered, and the
//! validated dependency graph that fixes the initialization order.
//! Types are built once through a [`TypeBuilder`] and then shared behind
//! an `Arc` by every instance.
//!
//! # Examples
//!
//! ```rust
//! use gamestat::effect::{arg, maxim, minim};
//! use gamestat::{Expr, ObjectType};
//!
//! let str_ = Expr::stat("STR");
//! let max_hp = Expr::stat("maxHP");
//!
//! let ty = ObjectType::builder("Character")
//!     .point("HP", [arg(max_hp.clone()), minim(0), maxim(max_hp)])
//!     .derived("maxHP", (str_ + 1) * 10)
//!     .value("STR", [arg(1)])
//!     .build()
//!     .unwrap();
//!
//! let order: Vec<_> = ty.init_order().iter().map(|s| s.as_str()).collect();
//! assert_eq!(order, vec!["STR", "maxHP", "HP"]);
//! ```

use crate::action::{ActionTable, DefaultHandler, Handler};
use crate::buff::TargetAction;
use crate::effect::{Binding, CellKind, Effect};
use crate::error::StatError;
use crate::expr::Expr;
use crate::graph::DependencyGraph;
use crate::object::GameObject;
use crate::stat_id::{Slot, StatId};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Name of the expiry query every buff type carries.
pub const IS_DISABLED: &str = "is_disabled";

/// Hook run at the start or end of [`GameObject::turn`].
pub type TurnHook = Arc<dyn Fn(&mut GameObject) -> Result<(), StatError> + Send + Sync>;

/// Plain game objects and buffs share the same descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Object,
    Buff,
}

/// How a declared stat produces its value.
#[derive(Debug, Clone)]
pub enum StatKind {
    /// Folds its effects over the stored cell on every read.
    Value(Vec<Arc<dyn Effect>>),
    /// Folds its effects on every write; reads return the stored cell.
    Point(Vec<Arc<dyn Effect>>),
    /// A named expression, re-evaluated on every read.
    Derived(Expr),
    /// A buff attribute that acts on the buff's target.
    Target(Arc<dyn TargetAction>),
}

impl StatKind {
    pub fn dependencies(&self) -> BTreeSet<StatId> {
        match self {
            StatKind::Value(effects) | StatKind::Point(effects) => effects
                .iter()
                .flat_map(|e| e.dependencies())
                .collect(),
            StatKind::Derived(expr) => expr.dependencies(),
            StatKind::Target(action) => action.source().dependencies(),
        }
    }

    fn cell_kind(&self) -> Option<CellKind> {
        match self {
            StatKind::Value(_) => Some(CellKind::Value),
            StatKind::Point(_) => Some(CellKind::Point),
            StatKind::Derived(_) | StatKind::Target(_) => None,
        }
    }
}

/// One declared stat.
#[derive(Debug, Clone)]
pub struct StatDecl {
    name: StatId,
    slot: Slot,
    kind: StatKind,
}

impl StatDecl {
    pub fn name(&self) -> &StatId {
        &self.name
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn kind(&self) -> &StatKind {
        &self.kind
    }

    /// Whether the stat accepts writes.
    pub fn is_settable(&self) -> bool {
        matches!(self.kind, StatKind::Point(_))
    }

    /// Whether the stat owns storage cells.
    pub fn has_cells(&self) -> bool {
        self.kind.cell_kind().is_some()
    }
}

#[derive(Clone)]
struct CustomAction {
    action: String,
    stat: StatId,
    handler: Handler,
}

/// A validated game object or buff type.
pub struct ObjectType {
    name: String,
    kind: TypeKind,
    decls: Vec<StatDecl>,
    index: HashMap<StatId, Slot>,
    graph: DependencyGraph,
    init_order: Vec<StatId>,
    actions: ActionTable,
    declared: Vec<(String, DefaultHandler)>,
    custom: Vec<CustomAction>,
    pre_turn: Option<TurnHook>,
    post_turn: Option<TurnHook>,
}

impl ObjectType {
    /// Start declaring a plain game object type.
    pub fn builder(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeKind::Object)
    }

    /// Start declaring a buff type.
    ///
    /// Buff types accept target-acting attributes and carry an
    /// `is_disabled` stat that reads `true` until redeclared.
    pub fn buff_builder(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeKind::Buff)
            .derived(IS_DISABLED, Expr::lit(true))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_buff(&self) -> bool {
        self.kind == TypeKind::Buff
    }

    /// Declared stats in declaration order.
    pub fn decls(&self) -> &[StatDecl] {
        &self.decls
    }

    pub fn stat_names(&self) -> impl Iterator<Item = &StatId> {
        self.decls.iter().map(StatDecl::name)
    }

    pub fn contains(&self, stat: &StatId) -> bool {
        self.index.contains_key(stat)
    }

    pub fn slot(&self, stat: &StatId) -> Option<Slot> {
        self.index.get(stat).copied()
    }

    /// The declaration of `stat`, or `UnknownStat`.
    pub fn lookup(&self, stat: &StatId) -> Result<&StatDecl, StatError> {
        self.index
            .get(stat)
            .and_then(|slot| self.decls.get(slot.index()))
            .ok_or_else(|| StatError::UnknownStat {
                type_name: self.name.clone(),
                stat: stat.clone(),
            })
    }

    /// Declared stats ordered so every dependency comes first.
    pub fn init_order(&self) -> &[StatId] {
        &self.init_order
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn actions(&self) -> &ActionTable {
        &self.actions
    }

    /// Target-acting attributes in declaration order.
    pub fn target_actions(&self) -> impl Iterator<Item = (&StatId, &Arc<dyn TargetAction>)> {
        self.decls.iter().filter_map(|d| match &d.kind {
            StatKind::Target(action) => Some((&d.name, action)),
            _ => None,
        })
    }

    pub fn pre_turn(&self) -> Option<&TurnHook> {
        self.pre_turn.as_ref()
    }

    pub fn post_turn(&self) -> Option<&TurnHook> {
        self.post_turn.as_ref()
    }

    /// Register a handler for `action` on `stat`, e.g. a `heal` on `HP`.
    ///
    /// Subtypes built from this type inherit the registration.
    pub fn register_action(&mut self, action: &str, stat: impl Into<StatId>, handler: Handler) {
        let stat = stat.into();
        self.actions.register(action, stat.clone(), Arc::clone(&handler));
        self.custom.push(CustomAction {
            action: action.to_string(),
            stat,
            handler,
        });
    }

    /// Install `default` as the fallback for `action`.
    pub fn declare_action(&mut self, action: &str, default: DefaultHandler) {
        self.actions.declare(action, Arc::clone(&default));
        self.declared.push((action.to_string(), default));
    }
}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectType")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("stats", &self.decls.iter().map(|d| d.name.as_str()).collect::<Vec<_>>())
            .field("init_order", &self.init_order)
            .finish()
    }
}

/// Declares the stats of an [`ObjectType`].
///
/// Declaring a name twice replaces the earlier declaration in place.
pub struct TypeBuilder {
    name: String,
    kind: TypeKind,
    decls: Vec<(StatId, StatKind)>,
    declared: Vec<(String, DefaultHandler)>,
    custom: Vec<CustomAction>,
    pre_turn: Option<TurnHook>,
    post_turn: Option<TurnHook>,
    error: Option<StatError>,
}

impl TypeBuilder {
    fn new(name: String, kind: TypeKind) -> Self {
        Self {
            name,
            kind,
            decls: Vec::new(),
            declared: Vec::new(),
            custom: Vec::new(),
            pre_turn: None,
            post_turn: None,
            error: None,
        }
    }

    /// Inherit the declarations, hooks and action registrations of `parent`.
    ///
    /// Effects are bound again into the new type's own tables; `parent` is
    /// left untouched. A subtype of a buff type is a buff type.
    pub fn extends(mut self, parent: &ObjectType) -> Self {
        if parent.is_buff() {
            self.kind = TypeKind::Buff;
        }
        for decl in &parent.decls {
            self.declare(decl.name.clone(), decl.kind.clone());
        }
        self.declared.extend(parent.declared.iter().cloned());
        self.custom.extend(parent.custom.iter().cloned());
        if self.pre_turn.is_none() {
            self.pre_turn = parent.pre_turn.clone();
        }
        if self.post_turn.is_none() {
            self.post_turn = parent.post_turn.clone();
        }
        self
    }

    fn declare(&mut self, name: StatId, kind: StatKind) {
        match self.decls.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = kind,
            None => self.decls.push((name, kind)),
        }
    }

    /// A stat folded through `effects` on every read.
    pub fn value<I>(mut self, name: impl Into<StatId>, effects: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Effect>>,
    {
        self.declare(name.into(), StatKind::Value(effects.into_iter().collect()));
        self
    }

    /// A settable stat whose writes pass through `effects`.
    pub fn point<I>(mut self, name: impl Into<StatId>, effects: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Effect>>,
    {
        self.declare(name.into(), StatKind::Point(effects.into_iter().collect()));
        self
    }

    /// A named expression.
    pub fn derived(mut self, name: impl Into<StatId>, expr: impl Into<Expr>) -> Self {
        self.declare(name.into(), StatKind::Derived(expr.into()));
        self
    }

    /// A target-acting attribute. Only buff types accept these.
    pub fn target(mut self, name: impl Into<StatId>, action: Arc<dyn TargetAction>) -> Self {
        let name = name.into();
        if self.kind != TypeKind::Buff {
            self.error.get_or_insert(StatError::TargetOnPlainType {
                type_name: self.name.clone(),
                stat: name.clone(),
            });
        }
        self.declare(name, StatKind::Target(action));
        self
    }

    /// The buff's expiry query.
    pub fn is_disabled(self, condition: impl Into<Expr>) -> Self {
        self.derived(IS_DISABLED, condition)
    }

    /// Register a handler for `action` on `stat`.
    pub fn action(mut self, action: &str, stat: impl Into<StatId>, handler: Handler) -> Self {
        self.custom.push(CustomAction {
            action: action.to_string(),
            stat: stat.into(),
            handler,
        });
        self
    }

    /// Declare `action` with a fallback for stats without a handler.
    pub fn declare_action(mut self, action: &str, default: DefaultHandler) -> Self {
        self.declared.push((action.to_string(), default));
        self
    }

    pub fn on_pre_turn<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut GameObject) -> Result<(), StatError> + Send + Sync + 'static,
    {
        self.pre_turn = Some(Arc::new(hook));
        self
    }

    pub fn on_post_turn<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut GameObject) -> Result<(), StatError> + Send + Sync + 'static,
    {
        self.post_turn = Some(Arc::new(hook));
        self
    }

    /// Bind every effect, build the dependency graph and validate it.
    ///
    /// # Returns
    ///
    /// * `Ok(ObjectType)` - The validated type
    /// * `Err(StatError::Cycle)` - If declared stats depend on each other in a loop
    /// * `Err(StatError::TargetOnPlainType)` - If a plain type declared a target attribute
    pub fn build(self) -> Result<ObjectType, StatError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut decls = Vec::with_capacity(self.decls.len());
        let mut index = HashMap::with_capacity(self.decls.len());
        for (i, (name, kind)) in self.decls.into_iter().enumerate() {
            index.insert(name.clone(), Slot(i));
            decls.push(StatDecl {
                name,
                slot: Slot(i),
                kind,
            });
        }

        let mut actions = ActionTable::new();
        for (action, default) in &self.declared {
            actions.declare(action, Arc::clone(default));
        }
        for decl in &decls {
            let (StatKind::Value(effects) | StatKind::Point(effects)) = &decl.kind else {
                continue;
            };
            let cell = if decl.is_settable() {
                CellKind::Point
            } else {
                CellKind::Value
            };
            for effect in effects {
                let mut binding = Binding::new(&self.name, &decl.name, cell, &mut actions);
                effect.bind(&mut binding);
            }
        }
        for custom in &self.custom {
            actions.register(&custom.action, custom.stat.clone(), Arc::clone(&custom.handler));
        }

        let mut graph = DependencyGraph::new(self.name.clone());
        for decl in &decls {
            graph.add_node(decl.name.clone());
        }
        for decl in &decls {
            for dep in decl.kind.dependencies() {
                if !index.contains_key(&dep) {
                    tracing::warn!(
                        type_name = %self.name,
                        stat = %decl.name,
                        dependency = %dep,
                        "dependency on undeclared stat"
                    );
                }
                graph.add_edge(decl.name.clone(), dep);
            }
        }

        let init_order: Vec<StatId> = graph
            .topological_sort()?
            .into_iter()
            .filter(|s| index.contains_key(s))
            .collect();

        tracing::debug!(
            type_name = %self.name,
            kind = ?self.kind,
            stats = decls.len(),
            init_order = ?init_order.iter().map(StatId::as_str).collect::<Vec<_>>(),
            "defined type"
        );

        Ok(ObjectType {
            name: self.name,
            kind: self.kind,
            decls,
            index,
            graph,
            init_order,
            actions,
            declared: self.declared,
            custom: self.custom,
            pre_turn: self.pre_turn,
            post_turn: self.post_turn,
        })
    }
}
