use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::{error::Result, imaging::text::TextPainter, video::types::Frame};

/// Core trait that all image edits must implement
pub trait ImageEdit: Send + Sync {
    /// Returns the unique name of this edit
    fn name(&self) -> &str;

    /// Returns a human-readable description of this edit
    fn description(&self) -> &str;

    /// Apply the edit to an image
    ///
    /// # Arguments
    ///
    /// * `frame` - The image to modify; edits that change the size replace it
    /// * `context` - The file being edited and the shared text painter
    /// * `config` - Edit-specific parameters
    fn apply(&self, frame: &mut Frame, context: &EditContext<'_>, config: &EditConfig) -> Result<()>;

    /// Validate that the given configuration is valid for this edit
    ///
    /// Called once per pipeline, before any file is touched.
    fn validate_config(&self, config: &EditConfig) -> Result<()> {
        let _ = config;
        Ok(())
    }

    /// Parameters this edit understands, with descriptions
    fn parameters(&self) -> Vec<(&'static str, &'static str)> {
        Vec::new()
    }
}

/// Per-file information available to edits
#[derive(Clone, Copy)]
pub struct EditContext<'a> {
    /// The image being edited
    pub source: &'a Path,

    /// Needed by edits that draw text
    pub painter: Option<&'a TextPainter>,

    /// Subtitle bar height as a fraction of the image height
    pub subtitle_fraction: f32,
}

/// Parameters of one pipeline step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditConfig {
    pub parameters: HashMap<String, ConfigValue>,
}

impl EditConfig {
    /// Set a parameter value
    pub fn set<K: Into<String>, V: Into<ConfigValue>>(mut self, key: K, value: V) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Get a parameter value as a float
    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.parameters.get(key).and_then(|v| v.as_f32())
    }

    /// Get a parameter value as an integer
    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.parameters.get(key).and_then(|v| v.as_i32())
    }

    /// Get a parameter value as a boolean
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.parameters.get(key).and_then(|v| v.as_bool())
    }

    /// Get a parameter value as a string
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_string())
    }

    pub fn get_i32_or(&self, key: &str, default: i32) -> i32 {
        self.get_i32(key).unwrap_or(default)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.parameters.contains_key(key)
    }
}

/// Flexible configuration value that can hold different types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Integer(i32),
    Float(f32),
    Bool(bool),
    String(String),
}

impl ConfigValue {
    /// Read a command-line value: integer, float, boolean, else text
    pub fn parse(raw: &str) -> Self {
        if let Ok(i) = raw.parse::<i32>() {
            ConfigValue::Integer(i)
        } else if let Ok(f) = raw.parse::<f32>() {
            ConfigValue::Float(f)
        } else if let Ok(b) = raw.parse::<bool>() {
            ConfigValue::Bool(b)
        } else {
            ConfigValue::String(raw.to_string())
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Integer(i) => Some(*i as f32),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            ConfigValue::Float(f) if f.fract() == 0.0 => Some(*f as i32),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValue::Integer(i) => write!(f, "{}", i),
            ConfigValue::Float(v) => write!(f, "{}", v),
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<f32> for ConfigValue {
    fn from(value: f32) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Integer(value)
    }
}
