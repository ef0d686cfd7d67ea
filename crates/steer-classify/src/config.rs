//! Declarative classifier provisioning
//!
//! A [`ClassifierSpec`] describes a full classifier layout: the classes,
//! the interface bindings, and the match rules, in the order they should
//! be applied. Specs deserialize from JSON and are applied in sequence
//! by [`Classifier::apply_spec`](crate::Classifier::apply_spec).

use serde::{Deserialize, Serialize};
use steer_common::{MatchField, SteerError, SteerResult};

/// Full classifier layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierSpec {
    /// Classes to create, in listed order
    #[serde(default)]
    pub classes: Vec<ClassSpec>,
    /// Interface bindings, applied once the classes exist
    #[serde(default)]
    pub interfaces: Vec<BindingSpec>,
    /// Match rules, appended in listed order
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl ClassifierSpec {
    /// Load a spec from a JSON file
    pub fn load(path: &str) -> SteerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| SteerError::ConfigError(e.to_string()))
    }

    /// Save the spec to a JSON file
    pub fn save(&self, path: &str) -> SteerResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SteerError::ConfigError(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// One class of service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassSpec {
    /// Unique class name
    pub name: String,
    /// Dispatch queue bound; unbounded when omitted
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    /// Buffer pool; the default pool when omitted
    #[serde(default)]
    pub pool: Option<u32>,
}

/// Default and error classes for one ingress interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingSpec {
    /// Interface name
    pub interface: String,
    /// Class where rule evaluation starts
    pub default_class: String,
    /// Class for unparseable frames; falls back to `default_class`
    #[serde(default)]
    pub error_class: Option<String>,
}

/// One match rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Class whose packets the rule filters
    pub src_class: String,
    /// Destination class on match
    pub dst_class: String,
    /// Field selector
    pub field: MatchField,
    /// Match value
    pub value: u64,
    /// Match mask; the field's full width when omitted
    #[serde(default)]
    pub mask: Option<u64>,
}
