//! Named scope variables and `$name` template interpolation.
//!
//! A [`VariableSet`] is built per page instance. Every effective change bumps
//! its version, which is how consumers notice that scoped queries are out of
//! date.

use std::collections::BTreeMap;

use common::config::{ConfigError, Configuration};

use crate::error::VariableError;

pub const DATASOURCE_VARIABLE: &str = "datasource";
pub const CLUSTER_VARIABLE: &str = "cluster";
pub const NAMESPACE_VARIABLE: &str = "namespace";
pub const SEARCH_VARIABLE: &str = "search";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Fixed for the lifetime of the set
    Constant,
    /// Free-form user input
    Text,
    /// Picked from discovered options (datasources, clusters)
    Query,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub label: String,
    pub kind: VariableKind,
    value: String,
}

impl Variable {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        kind: VariableKind,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            value: value.into(),
        }
    }

    pub fn constant(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(name.clone(), name, VariableKind::Constant, value)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// A picked value that still holds a `$reference` was never resolved.
    /// Text input is taken literally.
    pub fn is_resolved(&self) -> bool {
        self.kind == VariableKind::Text || !self.value.starts_with('$')
    }
}

#[derive(Debug, Clone, Default)]
pub struct VariableSet {
    variables: BTreeMap<String, Variable>,
    version: u64,
}

impl VariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, variable: Variable) -> Self {
        self.insert(variable);
        self
    }

    pub fn insert(&mut self, variable: Variable) {
        self.variables.insert(variable.name.clone(), variable);
        self.version += 1;
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    /// Update the value of an existing variable.
    ///
    /// Returns `Ok(true)` if the value changed. Constants cannot be changed.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<bool, VariableError> {
        let variable = self
            .variables
            .get_mut(name)
            .ok_or_else(|| VariableError::Unknown(name.to_string()))?;
        if variable.kind == VariableKind::Constant {
            return Err(VariableError::Constant(name.to_string()));
        }

        let value = value.into();
        if variable.value == value {
            return Ok(false);
        }
        variable.value = value;
        self.version += 1;
        Ok(true)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// A copy with one extra constant, used to scope templates to a batch of
    /// rows or to a single row.
    pub fn scoped(&self, name: &str, value: impl Into<String>) -> Self {
        let mut scoped = self.clone();
        scoped
            .variables
            .insert(name.to_string(), Variable::constant(name, value));
        scoped
    }

    /// Substitute `$name` and `${name}` references.
    ///
    /// A `$` not followed by a name is kept verbatim (regex anchors).
    pub fn interpolate(&self, template: &str) -> Result<String, VariableError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
                match braced.find('}') {
                    Some(end) => (&braced[..end], end + 2),
                    None => ("", 0),
                }
            } else {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..end], end)
            };

            if name.is_empty() {
                out.push('$');
                rest = after;
                continue;
            }

            let variable = self
                .variables
                .get(name)
                .ok_or_else(|| VariableError::Unknown(name.to_string()))?;
            if !variable.is_resolved() {
                return Err(VariableError::Unresolved(name.to_string()));
            }
            out.push_str(variable.value());
            rest = &after[consumed..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

/// Current value of a named variable.
///
/// `None` when the variable is missing or still holds an unresolved
/// reference; callers must not build a scoped query in that case.
pub fn resolve(variables: &VariableSet, name: &str) -> Option<String> {
    variables
        .get(name)
        .filter(|v| v.is_resolved())
        .map(|v| v.value().to_string())
}

/// Variables shared by every workload page, seeded from configuration.
pub fn top_level(config: &Configuration) -> Result<VariableSet, ConfigError> {
    let datasource = config.datasources.default_datasource()?;

    Ok(VariableSet::new()
        .with(Variable::new(
            DATASOURCE_VARIABLE,
            "Datasource",
            VariableKind::Query,
            datasource.name.clone(),
        ))
        .with(Variable::new(
            CLUSTER_VARIABLE,
            "Cluster",
            VariableKind::Query,
            config.scope.cluster.clone(),
        ))
        .with(Variable::new(
            NAMESPACE_VARIABLE,
            "Namespace",
            VariableKind::Text,
            config.scope.namespace.clone(),
        ))
        .with(Variable::new(
            SEARCH_VARIABLE,
            "Search",
            VariableKind::Text,
            "",
        )))
}
