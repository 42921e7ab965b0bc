//! Hierarchical key/value settings shared by the facade and every backend.

use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

/// A primitive settings value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::Int(value.into())
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Value::Int(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// A scoped key/value store.
///
/// Keys are resolved relative to the groups opened with
/// [`begin_group`](SettingsStore::begin_group). Every read names its default,
/// so a missing or mistyped entry never fails.
pub trait SettingsStore {
    /// Enters a nested group.
    fn begin_group(&mut self, name: &str);

    /// Leaves the innermost group.
    fn end_group(&mut self);

    /// Returns the raw value stored under `key` in the current group.
    fn value(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key` in the current group.
    fn set_value(&mut self, key: &str, value: Value);

    fn get_f64(&self, key: &str, default: f64) -> f64 {
        match self.value(key) {
            Some(Value::Double(v)) => v,
            Some(Value::Int(v)) => v as f64,
            Some(Value::Text(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    fn get_i64(&self, key: &str, default: i64) -> i64 {
        match self.value(key) {
            Some(Value::Int(v)) => v,
            Some(Value::Double(v)) if v.is_finite() => v.round() as i64,
            Some(Value::Bool(v)) => v.into(),
            Some(Value::Text(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.value(key) {
            Some(Value::Bool(v)) => v,
            Some(Value::Int(v)) => v != 0,
            Some(Value::Text(s)) => match s.trim() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => default,
            },
            _ => default,
        }
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        match self.value(key) {
            Some(Value::Text(s)) => s,
            Some(Value::Int(v)) => v.to_string(),
            Some(Value::Double(v)) => v.to_string(),
            Some(Value::Bool(v)) => v.to_string(),
            None => default.to_owned(),
        }
    }
}

/// In-memory settings, optionally persisted as a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySettings {
    values: BTreeMap<String, Value>,
    #[serde(skip)]
    groups: Vec<String>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads settings from `path`, returning an empty store when the file
    /// does not exist yet.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }

        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Number of stored keys across all groups.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over fully qualified keys and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn path(&self, key: &str) -> String {
        if self.groups.is_empty() {
            key.to_owned()
        } else {
            format!("{}/{}", self.groups.join("/"), key)
        }
    }
}

impl SettingsStore for MemorySettings {
    fn begin_group(&mut self, name: &str) {
        self.groups.push(name.to_owned());
    }

    fn end_group(&mut self) {
        self.groups.pop();
    }

    fn value(&self, key: &str) -> Option<Value> {
        self.values.get(&self.path(key)).cloned()
    }

    fn set_value(&mut self, key: &str, value: Value) {
        let path = self.path(key);
        self.values.insert(path, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_scope_keys() {
        let mut store = MemorySettings::new();

        store.begin_group("Rotor");
        store.set_value("Type", 2i64.into());
        store.begin_group("SPID");
        store.set_value("Baud", 600u32.into());
        store.end_group();
        store.end_group();

        let keys: Vec<&str> = store.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Rotor/SPID/Baud", "Rotor/Type"]);

        assert_eq!(store.get_i64("Type", 0), 0);
        store.begin_group("Rotor");
        assert_eq!(store.get_i64("Type", 0), 2);
    }

    #[test]
    fn defaults_when_missing() {
        let store = MemorySettings::new();

        assert_eq!(store.get_f64("AzMax", 360.0), 360.0);
        assert!(!store.get_bool("Park", false));
        assert_eq!(store.get_string("Host", "192.168.1.10"), "192.168.1.10");
    }

    #[test]
    fn numeric_getters_accept_either_variant() {
        let mut store = MemorySettings::new();
        store.set_value("a", Value::Int(90));
        store.set_value("b", Value::Double(2.6));
        store.set_value("c", Value::Text(" 12.5 ".into()));
        store.set_value("d", Value::Text("garbage".into()));

        assert_eq!(store.get_f64("a", 0.0), 90.0);
        assert_eq!(store.get_i64("b", 0), 3);
        assert_eq!(store.get_f64("c", 0.0), 12.5);
        assert_eq!(store.get_f64("d", 7.0), 7.0);
        assert!(store.get_bool("a", false));
    }

    #[test]
    fn json_keeps_value_kinds() {
        let mut store = MemorySettings::new();
        store.set_value("flag", true.into());
        store.set_value("count", 4i64.into());
        store.set_value("angle", 360.0.into());
        store.set_value("host", "localhost".into());

        let text = serde_json::to_string(&store).unwrap();
        let back: MemorySettings = serde_json::from_str(&text).unwrap();

        assert_eq!(back.value("flag"), Some(Value::Bool(true)));
        assert_eq!(back.value("count"), Some(Value::Int(4)));
        assert_eq!(back.value("angle"), Some(Value::Double(360.0)));
        assert_eq!(back.value("host"), Some(Value::Text("localhost".into())));
    }
}
