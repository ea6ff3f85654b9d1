//! Constructor arguments.
//!
//! `InitValues` carries keyword-style initial values for some of a type's
//! declared stats. It can be built in code or parsed from a JSON object,
//! so game data authored as JSON can seed objects directly.

use crate::error::StatError;
use crate::stat_id::StatId;
use crate::value::StatValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Initial values keyed by stat name.
///
/// # Examples
///
/// ```rust
/// use gamestat::{InitValues, StatId, StatValue};
///
/// let mut init = InitValues::new();
/// init.set("STR", 12);
/// init.set("name", "Aria");
///
/// assert_eq!(init.get(&StatId::new("STR")), Some(&StatValue::Int(12)));
/// assert!(init.contains_key("name"));
/// assert!(!init.contains_key("DEX"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InitValues {
    values: BTreeMap<StatId, StatValue>,
}

impl InitValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an initial value, replacing any earlier one.
    pub fn set(&mut self, stat: impl Into<StatId>, value: impl Into<StatValue>) {
        self.values.insert(stat.into(), value.into());
    }

    /// Builder form of [`InitValues::set`].
    pub fn with(mut self, stat: impl Into<StatId>, value: impl Into<StatValue>) -> Self {
        self.set(stat, value);
        self
    }

    pub fn get(&self, stat: &StatId) -> Option<&StatValue> {
        self.values.get(stat)
    }

    pub fn contains_key(&self, stat: &str) -> bool {
        self.values.contains_key(&StatId::new(stat))
    }

    pub fn keys(&self) -> impl Iterator<Item = &StatId> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StatId, &StatValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Read initial values from a JSON object.
    ///
    /// # Returns
    ///
    /// * `Err(StatError::InvalidInit)` - If `json` is not an object
    ///
    /// # Examples
    ///
    /// ```rust
    /// use gamestat::{InitValues, StatId, StatValue};
    ///
    /// let json = serde_json::json!({ "STR": 3, "title": "Knight" });
    /// let init = InitValues::from_json(&json).unwrap();
    /// assert_eq!(init.get(&StatId::new("STR")), Some(&StatValue::Int(3)));
    /// ```
    pub fn from_json(json: &serde_json::Value) -> Result<Self, StatError> {
        let object = json.as_object().ok_or_else(|| {
            StatError::InvalidInit(format!("expected a JSON object, got {json}"))
        })?;
        Ok(object
            .iter()
            .map(|(k, v)| (StatId::from(k.as_str()), StatValue::from_json(v)))
            .collect())
    }

    /// Parse initial values from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, StatError> {
        let json: serde_json::Value =
            serde_json::from_str(text).map_err(|e| StatError::InvalidInit(e.to_string()))?;
        Self::from_json(&json)
    }
}

impl<K, V> FromIterator<(K, V)> for InitValues
where
    K: Into<StatId>,
    V: Into<StatValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
