//! Stat identifier module.
//!
//! Provides `StatId`, the interned name a stat is declared under, and
//! `Slot`, the storage index an object type assigns to each declared stat.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// Interned name of a declared stat.
///
/// Uses `Arc<str>` so expressions, effects and action registries can all
/// hold the same name cheaply.
///
/// # Examples
///
/// ```rust
/// use gamestat::StatId;
///
/// let hp = StatId::new("HP");
/// let hp2: StatId = "HP".into();
/// assert_eq!(hp, hp2);
/// assert_eq!(hp.as_str(), "HP");
/// ```
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct StatId(Arc<str>);

impl Serialize for StatId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StatId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(StatId::from(s))
    }
}

impl StatId {
    /// Create a stat name from a string slice.
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StatId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StatId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&StatId> for StatId {
    fn from(s: &StatId) -> Self {
        s.clone()
    }
}

impl std::fmt::Display for StatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of a stat's storage cells inside a game object.
///
/// Assigned in declaration order when the owning type is built, and
/// stable for the lifetime of that type. Inherited stats keep the slot
/// they had on the parent.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Slot(pub(crate) usize);

impl Slot {
    /// The raw index.
    pub fn index(self) -> usize {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_id_equality() {
        let a = StatId::new("STR");
        let b: StatId = String::from("STR").into();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "STR");
    }

    #[test]
    fn test_stat_id_serde_as_plain_string() {
        let id = StatId::new("maxHP");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"maxHP\"");
        let back: StatId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_slot_ordering() {
        assert!(Slot(0) < Slot(1));
        assert_eq!(Slot(3).index(), 3);
    }
}
