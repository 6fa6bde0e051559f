//! Component parameter registry
//!
//! Components register their parameters with a name, description, default,
//! dynamic flag, declared type, and an allowed-values constraint (an
//! interval with optional step, or a finite allow-list). Values can then be
//! read and written by name, with all lookups canonicalized to lower case.
//! Writes coming in as strings are coerced to the declared type; typed
//! writes must match it exactly.

use crate::error::{RadioError, Result};
use crate::types::value::{Value, ValueKind};
use std::cmp::Ordering;

/// Allowed-values constraint on a parameter
#[derive(Debug, Clone, Default)]
pub enum Allowed {
    #[default]
    Any,
    Interval {
        min: Value,
        max: Value,
        step: Option<Value>,
    },
    List(Vec<Value>),
}

/// Declaration of one component parameter
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub description: String,
    pub default: String,
    pub dynamic: bool,
    pub kind: ValueKind,
    pub allowed: Allowed,
}

impl ParamSpec {
    pub fn new(name: &str, kind: ValueKind, description: &str) -> Self {
        ParamSpec {
            name: name.to_ascii_lowercase(),
            description: description.to_string(),
            default: String::new(),
            dynamic: false,
            kind,
            allowed: Allowed::Any,
        }
    }

    pub fn default_value(mut self, default: &str) -> Self {
        self.default = default.to_string();
        self
    }

    pub fn dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }

    pub fn interval(mut self, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        self.allowed = Allowed::Interval {
            min: min.into(),
            max: max.into(),
            step: None,
        };
        self
    }

    pub fn interval_step(
        mut self,
        min: impl Into<Value>,
        max: impl Into<Value>,
        step: impl Into<Value>,
    ) -> Self {
        self.allowed = Allowed::Interval {
            min: min.into(),
            max: max.into(),
            step: Some(step.into()),
        };
        self
    }

    pub fn list<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.allowed = Allowed::List(values.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Clone)]
struct ParamEntry {
    spec: ParamSpec,
    value: Value,
}

/// The registered parameters of one component
#[derive(Debug, Clone, Default)]
pub struct ParamRegistry {
    entries: Vec<ParamEntry>,
}

impl ParamRegistry {
    pub fn new() -> Self {
        ParamRegistry::default()
    }

    /// Register a parameter and set it to its default value.
    ///
    /// Rejects an empty allow-list, an inverted interval, and constraints
    /// whose type differs from the declared type. String parameters are
    /// stored unconstrained regardless of any given constraint.
    pub fn register(&mut self, mut spec: ParamSpec) -> Result<()> {
        if self.find(&spec.name).is_some() {
            return Err(RadioError::InvalidDataType(format!(
                "parameter {} registered twice",
                spec.name
            )));
        }
        if spec.kind == ValueKind::String {
            // Constraints on string parameters are not supported
            spec.allowed = Allowed::Any;
        }
        match &spec.allowed {
            Allowed::Any => {}
            Allowed::Interval { min, max, step } => {
                if min.kind() != spec.kind || max.kind() != spec.kind {
                    return Err(RadioError::InvalidDataType(format!(
                        "parameter {}: interval bounds are not of type {}",
                        spec.name, spec.kind
                    )));
                }
                if let Some(step) = step {
                    if step.kind() != spec.kind {
                        return Err(RadioError::InvalidDataType(format!(
                            "parameter {}: step is not of type {}",
                            spec.name, spec.kind
                        )));
                    }
                }
                if min.numeric_cmp(max) == Some(Ordering::Greater) {
                    return Err(RadioError::InvalidDataType(format!(
                        "parameter {}: interval minimum exceeds maximum",
                        spec.name
                    )));
                }
            }
            Allowed::List(values) => {
                if values.is_empty() {
                    return Err(RadioError::InvalidDataType(format!(
                        "parameter {}: allow-list must contain at least one value",
                        spec.name
                    )));
                }
                if values.iter().any(|v| v.kind() != spec.kind) {
                    return Err(RadioError::InvalidDataType(format!(
                        "parameter {}: allow-list values are not of type {}",
                        spec.name, spec.kind
                    )));
                }
            }
        }

        let value = Value::parse(spec.kind, &spec.default)?;
        check_allowed(&spec, &value)?;
        self.entries.push(ParamEntry { spec, value });
        Ok(())
    }

    fn find(&self, name: &str) -> Option<&ParamEntry> {
        self.entries.iter().find(|e| e.spec.name == name)
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut ParamEntry> {
        self.entries.iter_mut().find(|e| e.spec.name == name)
    }

    /// Set a parameter from a typed value. A `String` value goes through
    /// coercion; any other value must match the declared type exactly.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        let entry = self
            .find_mut(&name)
            .ok_or_else(|| RadioError::ParameterNotFound(name.clone()))?;
        let value = match value {
            Value::String(s) if entry.spec.kind != ValueKind::String => {
                Value::parse(entry.spec.kind, &s)?
            }
            v => {
                if v.kind() != entry.spec.kind {
                    return Err(RadioError::InvalidDataType(format!(
                        "parameter {} is of type {}, got {}",
                        name,
                        entry.spec.kind,
                        v.kind()
                    )));
                }
                v
            }
        };
        check_allowed(&entry.spec, &value)?;
        entry.value = value;
        Ok(())
    }

    /// Set a parameter from its string form
    pub fn set_str(&mut self, name: &str, value: &str) -> Result<()> {
        self.set(name, Value::String(value.to_string()))
    }

    /// Current value of a parameter
    pub fn get(&self, name: &str) -> Result<Value> {
        let name = name.to_ascii_lowercase();
        self.find(&name)
            .map(|e| e.value.clone())
            .ok_or(RadioError::ParameterNotFound(name))
    }

    /// Current value rendered as a string
    pub fn get_str(&self, name: &str) -> Result<String> {
        Ok(self.get(name)?.to_string())
    }

    pub fn has(&self, name: &str) -> bool {
        self.find(&name.to_ascii_lowercase()).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn spec(&self, name: &str) -> Result<&ParamSpec> {
        let name = name.to_ascii_lowercase();
        self.find(&name)
            .map(|e| &e.spec)
            .ok_or(RadioError::ParameterNotFound(name))
    }

    pub fn is_dynamic(&self, name: &str) -> Result<bool> {
        Ok(self.spec(name)?.dynamic)
    }

    /// Registered parameter names, in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.spec.name.as_str())
    }
}

fn check_allowed(spec: &ParamSpec, value: &Value) -> Result<()> {
    match &spec.allowed {
        Allowed::Any => Ok(()),
        Allowed::List(values) => {
            if values.contains(value) {
                Ok(())
            } else {
                Err(RadioError::ParameterOutOfRange(format!(
                    "{} = {} is not in the allowed list",
                    spec.name, value
                )))
            }
        }
        Allowed::Interval { min, max, step } => {
            let in_bounds = value.numeric_cmp(min) != Some(Ordering::Less)
                && value.numeric_cmp(max) != Some(Ordering::Greater);
            let on_step = match step {
                None => true,
                Some(step) => {
                    let (v, lo, st) = match (value.as_f64(), min.as_f64(), step.as_f64()) {
                        (Some(v), Some(lo), Some(st)) if st != 0.0 => (v, lo, st),
                        _ => return Ok(()),
                    };
                    (v - lo) % st == 0.0 || value.numeric_cmp(max) == Some(Ordering::Equal)
                }
            };
            if in_bounds && on_step {
                Ok(())
            } else {
                Err(RadioError::ParameterOutOfRange(format!(
                    "{} = {} is outside the allowed interval",
                    spec.name, value
                )))
            }
        }
    }
}
