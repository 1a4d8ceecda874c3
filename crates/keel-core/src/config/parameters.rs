use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::error::ConfigError;

/// Startup parameters passed to every plugin's `initialize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters {
    values: BTreeMap<String, Value>,
}

impl Parameters {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create parameters from an existing map
    pub fn from_map(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    /// Parse command-line style tokens.
    ///
    /// `-foo 32` and `--foo 32` give `"foo": 32`, `-foo=32` is the inline form,
    /// and a key not followed by a value is set to `true`. Values are read as
    /// JSON scalars when possible (`32`, `true`, `null`, `-1.5`), otherwise kept
    /// as strings, so `-ids [1,2]` gives the text `"[1,2]"`. Tokens that are
    /// not preceded by a key are ignored.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();
        let mut values = BTreeMap::new();
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            i += 1;

            if !is_key(token) {
                log::warn!("Ignoring positional startup argument '{}'", token);
                continue;
            }
            let key_part = token.trim_start_matches('-');
            if let Some((key, value)) = key_part.split_once('=') {
                if !key.is_empty() {
                    values.insert(key.to_string(), parse_value(value));
                }
                continue;
            }
            if key_part.is_empty() {
                continue;
            }
            let value = match tokens.get(i) {
                Some(next) if !is_key(next) => {
                    i += 1;
                    parse_value(next)
                }
                _ => Value::Bool(true),
            };
            values.insert(key_part.to_string(), value);
        }
        Self { values }
    }

    /// Raw value for `key`
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Typed value for `key`; `None` when absent or of another type.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Typed value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Set a value
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), ConfigError> {
        let json_value = serde_json::to_value(value).map_err(|source| ConfigError::Serialization {
            key: key.to_string(),
            source,
        })?;
        self.values.insert(key.to_string(), json_value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Merge with another set, values from `other` win
    pub fn merge(&mut self, other: &Parameters) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }
}

/// A key token starts with '-' and is not a negative number.
fn is_key(token: &str) -> bool {
    let Some(rest) = token.strip_prefix('-') else {
        return false;
    };
    let looks_numeric = rest.starts_with(|c: char| c.is_ascii_digit() || c == '.');
    !(looks_numeric && token.parse::<f64>().is_ok())
}

/// JSON scalars are parsed, arrays and objects stay text.
fn parse_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_))) => value,
        _ => Value::String(raw.to_string()),
    }
}
