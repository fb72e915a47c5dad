//! Frame transform capability.
//!
//! Field matchers and deinterlacers are supplied from outside as
//! [`FrameTransform`] implementations. They receive a whole input sequence
//! plus a [`TransformConfig`] and return a new lazy sequence; nothing here
//! knows how the pixels are actually produced.

use crate::error::Result;
use crate::sequence::SharedSequence;
use serde_json::Value;
use std::collections::BTreeMap;

/// Open, ordered mapping of named transform options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformConfig {
    options: BTreeMap<String, Value>,
}

impl TransformConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Set an option, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.options.insert(key.into(), value.into());
    }

    /// Get a raw option value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Get an integer option.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Get a boolean option.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Get a float option.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    /// Get a string option.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Whether an option is present.
    pub fn contains(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Whether no options are set.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Overlay `other` on top of `self`; keys in `other` win.
    pub fn merged(mut self, other: &TransformConfig) -> Self {
        for (key, value) in &other.options {
            self.options.insert(key.clone(), value.clone());
        }
        self
    }

    /// Build the effective configuration from defaults, then user options,
    /// then options the caller must control.
    pub fn layered(
        defaults: TransformConfig,
        user: &TransformConfig,
        required: &TransformConfig,
    ) -> Self {
        defaults.merged(user).merged(required)
    }

    /// Iterate over options in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A whole-sequence frame transform such as a field matcher or deinterlacer.
pub trait FrameTransform: Send + Sync {
    /// Transform name, used in logs and errors.
    fn name(&self) -> &str;

    /// Build the transformed sequence.
    ///
    /// Implementations should return quickly and produce frames lazily.
    fn transform(&self, input: SharedSequence, config: &TransformConfig)
        -> Result<SharedSequence>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layered_precedence() {
        let defaults = TransformConfig::new()
            .with("order", 1)
            .with("field", 2)
            .with("mode", 0);
        let user = TransformConfig::new().with("mode", 3).with("order", 0);
        let required = TransformConfig::new().with("order", 1);

        let config = TransformConfig::layered(defaults, &user, &required);
        assert_eq!(config.get_i64("order"), Some(1));
        assert_eq!(config.get_i64("field"), Some(2));
        assert_eq!(config.get_i64("mode"), Some(3));
        assert_eq!(config.len(), 3);
    }

    #[test]
    fn test_typed_getters() {
        let config = TransformConfig::new()
            .with("tff", true)
            .with("sharpness", 0.2)
            .with("preset", "placebo");
        assert_eq!(config.get_bool("tff"), Some(true));
        assert_eq!(config.get_f64("sharpness"), Some(0.2));
        assert_eq!(config.get_str("preset"), Some("placebo"));
        assert_eq!(config.get_i64("preset"), None);
        assert!(!config.contains("missing"));
    }
}
