//! Mapping-dependent variables (`set_var`).

use crate::error::VariableError;
use crate::mapping::Mapping;
use std::collections::HashMap;

/// A variable value that may differ per subject or object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variable {
    pub default: String,
    by_subject: HashMap<String, String>,
    by_object: HashMap<String, String>,
}

impl Variable {
    /// Value for a mapping: subject override, then object override, then default.
    pub fn value_for(&self, mapping: &Mapping) -> &str {
        mapping
            .subject_id
            .as_ref()
            .and_then(|id| self.by_subject.get(id))
            .or_else(|| mapping.object_id.as_ref().and_then(|id| self.by_object.get(id)))
            .map_or(self.default.as_str(), String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct VariableManager {
    variables: HashMap<String, Variable>,
}

impl VariableManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable, or reset the default of an existing one (its overrides are kept).
    pub fn declare(&mut self, name: &str, default: &str) {
        self.variables.entry(name.to_string()).or_default().default = default.to_string();
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn set_for_subject(&mut self, name: &str, subject_id: &str, value: &str) -> Result<(), VariableError> {
        self.variable_mut(name)?.by_subject.insert(subject_id.to_string(), value.to_string());
        Ok(())
    }

    pub fn set_for_object(&mut self, name: &str, object_id: &str, value: &str) -> Result<(), VariableError> {
        self.variable_mut(name)?.by_object.insert(object_id.to_string(), value.to_string());
        Ok(())
    }

    pub fn expand(&self, name: &str, mapping: &Mapping) -> Result<&str, VariableError> {
        self.variables
            .get(name)
            .map(|v| v.value_for(mapping))
            .ok_or_else(|| VariableError::Undefined(name.to_string()))
    }

    fn variable_mut(&mut self, name: &str) -> Result<&mut Variable, VariableError> {
        self.variables.get_mut(name).ok_or_else(|| VariableError::Undefined(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(subject: &str, object: &str) -> Mapping {
        Mapping { subject_id: Some(subject.into()), object_id: Some(object.into()), ..Default::default() }
    }

    #[test]
    fn lookup_precedence() {
        let mut vars = VariableManager::new();
        vars.declare("side", "default");
        vars.set_for_object("side", "o1", "by-object").unwrap();
        vars.set_for_subject("side", "s1", "by-subject").unwrap();

        assert_eq!(vars.expand("side", &mapping("s1", "o1")).unwrap(), "by-subject");
        assert_eq!(vars.expand("side", &mapping("s2", "o1")).unwrap(), "by-object");
        assert_eq!(vars.expand("side", &mapping("s2", "o2")).unwrap(), "default");
        assert_eq!(vars.expand("side", &Mapping::default()).unwrap(), "default");
    }

    #[test]
    fn undeclared_variables_are_errors() {
        let mut vars = VariableManager::new();
        assert_eq!(vars.expand("nope", &Mapping::default()), Err(VariableError::Undefined("nope".into())));
        assert_eq!(vars.set_for_subject("nope", "s", "v"), Err(VariableError::Undefined("nope".into())));
        assert!(!vars.is_declared("nope"));
    }

    #[test]
    fn redeclaring_resets_default_only() {
        let mut vars = VariableManager::new();
        vars.declare("v", "one");
        vars.set_for_subject("v", "s1", "special").unwrap();
        vars.declare("v", "two");
        assert_eq!(vars.expand("v", &mapping("s1", "o")).unwrap(), "special");
        assert_eq!(vars.expand("v", &mapping("s2", "o")).unwrap(), "two");
    }
}
