//! Per-type action registries.
//!
//! An action is a named operation dispatched per stat: `init` seeds a stat
//! from a constructor argument, `turn_act` advances it one turn, `gainexp`
//! feeds a growing stat, and so on. Each object type owns an
//! [`ActionTable`] mapping action names to an [`ActionRegistry`], which in
//! turn maps stat names to handlers.
//!
//! Lookups that find no handler fall back to the registry's default,
//! which is a no-op unless the registry was declared with one.

use crate::error::StatError;
use crate::object::GameObject;
use crate::stat_id::StatId;
use crate::value::StatValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Seed a stat from an explicit constructor value.
pub const INIT: &str = "init";
/// Seed a stat that received no constructor value.
pub const DEFAULT_INIT: &str = "default_init";
/// Advance a stat by one turn.
pub const TURN_ACT: &str = "turn_act";
/// Convert potential into value on a growing stat.
pub const GAIN_EXP: &str = "gainexp";
/// Add to the potential cell of a growing stat.
pub const GAIN_POT: &str = "gainpot";

/// A registered action handler for one stat.
pub type Handler =
    Arc<dyn Fn(&mut GameObject, &[StatValue]) -> Result<(), StatError> + Send + Sync>;

/// Fallback invoked for stats without their own handler.
pub type DefaultHandler =
    Arc<dyn Fn(&mut GameObject, &StatId, &[StatValue]) -> Result<(), StatError> + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut GameObject, &[StatValue]) -> Result<(), StatError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as a [`DefaultHandler`].
pub fn default_handler<F>(f: F) -> DefaultHandler
where
    F: Fn(&mut GameObject, &StatId, &[StatValue]) -> Result<(), StatError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Handlers for one action, keyed by stat name.
///
/// Registration order is kept so enumeration is deterministic.
///
/// # Examples
///
/// ```rust
/// use gamestat::action::{handler, ActionRegistry};
///
/// let mut registry = ActionRegistry::new();
/// registry.register("HP", handler(|_obj, _args| Ok(())));
/// registry.register("MP", handler(|_obj, _args| Ok(())));
///
/// let names: Vec<_> = registry.keys().map(|k| k.to_string()).collect();
/// assert_eq!(names, vec!["HP", "MP"]);
/// ```
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<StatId, Handler>,
    order: Vec<StatId>,
    default: Option<DefaultHandler>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose fallback runs `default` instead of doing nothing.
    pub fn with_default(default: DefaultHandler) -> Self {
        Self {
            default: Some(default),
            ..Self::default()
        }
    }

    /// Add or replace the handler for `stat`. The last registration wins.
    pub fn register(&mut self, stat: impl Into<StatId>, handler: Handler) {
        let stat = stat.into();
        if self.handlers.insert(stat.clone(), handler).is_none() {
            self.order.push(stat);
        }
    }

    pub fn get(&self, stat: &StatId) -> Option<&Handler> {
        self.handlers.get(stat)
    }

    pub fn contains(&self, stat: &StatId) -> bool {
        self.handlers.contains_key(stat)
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Run the handler for `stat`, or the fallback when there is none.
    pub fn invoke(
        &self,
        object: &mut GameObject,
        stat: &StatId,
        args: &[StatValue],
    ) -> Result<(), StatError> {
        match (self.handlers.get(stat), &self.default) {
            (Some(handler), _) => handler(object, args),
            (None, Some(default)) => default(object, stat, args),
            (None, None) => Ok(()),
        }
    }

    /// Stat names with a handler, in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &StatId> {
        self.order.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &Handler> {
        self.order.iter().filter_map(|k| self.handlers.get(k))
    }

    pub fn items(&self) -> impl Iterator<Item = (&StatId, &Handler)> {
        self.order
            .iter()
            .filter_map(|k| self.handlers.get(k).map(|h| (k, h)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("stats", &self.order)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// All action registries of one object type, keyed by action name.
#[derive(Debug, Clone, Default)]
pub struct ActionTable {
    registries: HashMap<String, ActionRegistry>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry for `action`, created empty on first use.
    pub fn registry_mut(&mut self, action: &str) -> &mut ActionRegistry {
        self.registries.entry(action.to_string()).or_default()
    }

    pub fn registry(&self, action: &str) -> Option<&ActionRegistry> {
        self.registries.get(action)
    }

    /// Install a registry for `action` that falls back to `default`.
    ///
    /// Handlers already registered for the action are kept.
    pub fn declare(&mut self, action: &str, default: DefaultHandler) {
        let registry = self.registry_mut(action);
        registry.default = Some(default);
    }

    pub fn register(&mut self, action: &str, stat: impl Into<StatId>, handler: Handler) {
        self.registry_mut(action).register(stat, handler);
    }

    /// Dispatch `action` for `stat`. Unknown actions are no-ops.
    pub fn invoke(
        &self,
        object: &mut GameObject,
        action: &str,
        stat: &StatId,
        args: &[StatValue],
    ) -> Result<(), StatError> {
        match self.registries.get(action) {
            Some(registry) => {
                if !registry.contains(stat) {
                    tracing::trace!(action, stat = %stat, "no handler, using fallback");
                }
                registry.invoke(object, stat, args)
            }
            None => {
                tracing::trace!(action, stat = %stat, "unknown action, ignored");
                Ok(())
            }
        }
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.registries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop() -> Handler {
        handler(|_, _| Ok(()))
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = ActionRegistry::new();
        registry.register("HP", noop());
        registry.register("MP", noop());
        registry.register("HP", handler(|_, _| Err(StatError::Custom("second".into()))));

        assert_eq!(registry.len(), 2);
        let names: Vec<_> = registry.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["HP", "MP"]);
        assert_eq!(registry.values().count(), 2);
        assert_eq!(registry.items().count(), 2);
    }

    #[test]
    fn test_table_creates_registries_on_demand() {
        let mut table = ActionTable::new();
        assert!(table.registry(INIT).is_none());
        table.register(INIT, "HP", noop());
        assert!(table.registry(INIT).unwrap().contains(&StatId::new("HP")));
        assert!(!table.registry(INIT).unwrap().has_default());
    }

    #[test]
    fn test_declare_keeps_existing_handlers() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let mut table = ActionTable::new();
        table.register("heal", "HP", noop());
        table.declare(
            "heal",
            default_handler(|_, _, _| {
                CALLS.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        let registry = table.registry("heal").unwrap();
        assert!(registry.has_default());
        assert!(registry.contains(&StatId::new("HP")));
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_registry_with_default() {
        let registry = ActionRegistry::with_default(default_handler(|_, _, _| Ok(())));
        assert!(registry.has_default());
        assert!(registry.is_empty());
        assert!(!ActionRegistry::new().has_default());
    }
}
