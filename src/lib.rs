//! # gamestat - Declarative Stat Graphs for Game Objects
//!
//! A stat engine where a game object type declares its status values and
//! how they are computed, instead of storing them directly:
//! - **Derived** stats (max HP from strength)
//! - **Clamped** stats (HP bounded to `[0, maxHP]`)
//! - **Growing** stats (experience-driven levelling)
//! - **Turn-based** stats (freshness decay, buff duration)
//! - **Buffs** that change a target's stats every turn and expire themselves
//!
//! ## Core Concepts
//!
//! ### Declaring a type
//!
//! Each stat is a `Value` (folds its effect chain on every read), a `Point`
//! (settable; folds its chain on every write), or a derived expression.
//! Stats may read each other; the type validates the dependency graph
//! once, when it is built, and rejects cycles.
//!
//! ```text
//! [TypeBuilder] → bind effects → [DependencyGraph] → [ObjectType]
//! ```
//!
//! ### Expressions
//!
//! Arithmetic, comparison and call operators on [`Expr`] build lazy trees
//! that are evaluated against an object on every read.
//!
//! ## Example
//!
//! ```rust
//! use gamestat::effect::{arg, maxim, minim};
//! use gamestat::*;
//! use std::sync::Arc;
//!
//! let str_ = Expr::stat("STR");
//! let max_hp = Expr::stat("maxHP");
//!
//! let character = Arc::new(
//!     ObjectType::builder("Character")
//!         .value("STR", [arg(1)])
//!         .derived("maxHP", (str_ + 1) * 10)
//!         .point("HP", [arg(max_hp.clone()), minim(0), maxim(max_hp)])
//!         .build()
//!         .unwrap(),
//! );
//!
//! let mut hero = GameObject::new(&character, InitValues::new().with("STR", 2)).unwrap();
//! assert_eq!(hero.get("HP").unwrap(), StatValue::Int(30));
//!
//! hero.set("HP", 500).unwrap();
//! assert_eq!(hero.get("HP").unwrap(), StatValue::Int(30));
//! ```
//!
//! ## Modules
//!
//! - [`stat_id`] - Stat names and storage slots
//! - [`value`] - Dynamic stat values
//! - [`expr`] - Lazy stat expressions
//! - [`graph`] - Dependency graph management
//! - [`action`] - Per-type action registries
//! - [`effect`] - Effect pipeline and built-in effects
//! - [`object_type`] - Type declarations
//! - [`object`] - Game object instances and turn advance
//! - [`buff`] - Buffs and target-acting attributes
//! - [`init`] - Constructor arguments
//! - [`error`] - Error types

pub mod action;
pub mod buff;
pub mod effect;
pub mod error;
pub mod expr;
pub mod graph;
pub mod init;
pub mod object;
pub mod object_type;
pub mod stat_id;
pub mod value;

// Re-export main types for convenience
pub use action::{ActionRegistry, ActionTable, DefaultHandler, Handler};
pub use buff::{Buff, BuffId, TargetAction};
pub use effect::Effect;
pub use error::StatError;
pub use expr::{Expr, Op};
pub use graph::DependencyGraph;
pub use init::InitValues;
pub use object::GameObject;
pub use object_type::{ObjectType, StatDecl, StatKind, TypeBuilder, TypeKind};
pub use stat_id::{Slot, StatId};
pub use value::{Callable, StatValue};
