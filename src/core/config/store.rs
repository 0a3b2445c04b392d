use crate::core::config::statement::{check_identifier, parse_statement, Constructor, Statement};
use crate::core::config::value::ConfigValue;
use crate::core::error::{Result, VizError};
use crate::core::types::Uid;
use log::{debug, error};
use std::collections::HashMap;

/// Default value of one field and whether it is always persisted
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub default: ConfigValue,
    /// Emitted by `dump` even when equal to the default
    pub required: bool,
}

impl FieldSchema {
    pub fn optional(name: &str, default: ConfigValue) -> Self {
        Self {
            name: name.to_string(),
            default,
            required: false,
        }
    }

    pub fn required(name: &str, default: ConfigValue) -> Self {
        Self {
            name: name.to_string(),
            default,
            required: true,
        }
    }
}

#[derive(Debug, Clone)]
struct Instance {
    type_name: String,
    values: HashMap<String, ConfigValue>,
}

/// Live names that config statements are evaluated against
pub trait Namespace {
    /// Bind `uid` to a newly declared component, returning its config type name
    fn declare(&mut self, uid: &str, constructor: &Constructor) -> Result<String>;
}

/// A statement that failed to apply during `load`
#[derive(Debug)]
pub struct LineError {
    /// 1-based line number
    pub line: usize,
    pub text: String,
    pub error: VizError,
}

/// Outcome of a best-effort `load`
#[derive(Debug, Default)]
pub struct LoadReport {
    pub applied: usize,
    pub errors: Vec<LineError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Typed parameter bag keyed by (instance, field)
///
/// Schemas are declared per type name; every registered instance reads the
/// schema default until a value is set for it.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    schemas: HashMap<String, Vec<FieldSchema>>,
    instances: HashMap<Uid, Instance>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register fields for a type; fields already declared keep their schema
    pub fn declare(&mut self, type_name: &str, fields: impl IntoIterator<Item = FieldSchema>) {
        let schema = self.schemas.entry(type_name.to_string()).or_default();
        for field in fields {
            if !schema.iter().any(|f| f.name == field.name) {
                schema.push(field);
            }
        }
    }

    /// Register an instance of a declared type; re-registering with the same type is a no-op
    ///
    /// `uid` must be a statement identifier so the instance survives `dump`.
    pub fn register(&mut self, uid: &str, type_name: &str) -> Result<()> {
        check_identifier(uid)?;
        if !self.schemas.contains_key(type_name) {
            return Err(VizError::UnknownType(type_name.to_string()));
        }
        match self.instances.get(uid) {
            Some(existing) if existing.type_name == type_name => Ok(()),
            Some(existing) => Err(VizError::DuplicateIdentifier(format!(
                "{} (already a {})",
                uid, existing.type_name
            ))),
            None => {
                self.instances.insert(
                    uid.to_string(),
                    Instance {
                        type_name: type_name.to_string(),
                        values: HashMap::new(),
                    },
                );
                Ok(())
            }
        }
    }

    pub fn unregister(&mut self, uid: &str) -> bool {
        self.instances.remove(uid).is_some()
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.instances.contains_key(uid)
    }

    pub fn type_of(&self, uid: &str) -> Option<&str> {
        self.instances.get(uid).map(|i| i.type_name.as_str())
    }

    pub fn instance_uids(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    fn schema_field(&self, type_name: &str, field: &str) -> Result<&FieldSchema> {
        self.schemas
            .get(type_name)
            .and_then(|s| s.iter().find(|f| f.name == field))
            .ok_or_else(|| VizError::UnknownField {
                type_name: type_name.to_string(),
                field: field.to_string(),
            })
    }

    /// Most recent value set for the field, else its default
    pub fn get(&self, uid: &str, field: &str) -> Result<ConfigValue> {
        let instance = self
            .instances
            .get(uid)
            .ok_or_else(|| VizError::UnknownInstance(uid.to_string()))?;
        if let Some(value) = instance.values.get(field) {
            return Ok(value.clone());
        }
        Ok(self.schema_field(&instance.type_name, field)?.default.clone())
    }

    pub fn set(&mut self, uid: &str, field: &str, value: ConfigValue) -> Result<()> {
        let type_name = self
            .type_of(uid)
            .ok_or_else(|| VizError::UnknownInstance(uid.to_string()))?
            .to_string();
        self.schema_field(&type_name, field)?;
        if let Some(instance) = self.instances.get_mut(uid) {
            instance.values.insert(field.to_string(), value);
        }
        Ok(())
    }

    /// Assignment statements for an instance's required and non-default fields
    pub fn statements_for(&self, uid: &str) -> Vec<Statement> {
        let Some(instance) = self.instances.get(uid) else {
            return Vec::new();
        };
        let Some(schema) = self.schemas.get(&instance.type_name) else {
            return Vec::new();
        };
        schema
            .iter()
            .filter_map(|field| {
                let value = instance.values.get(&field.name).unwrap_or(&field.default);
                (field.required || *value != field.default).then(|| Statement::Assign {
                    target: uid.to_string(),
                    field: field.name.clone(),
                    value: value.clone(),
                })
            })
            .collect()
    }

    /// Serialize every instance, ordered by `key`
    pub fn dump<K: Ord>(&self, key: impl Fn(&str) -> K) -> String {
        self.dump_with(key, |_| None)
    }

    /// Like `dump`, emitting `preamble(uid)` ahead of each instance's fields
    pub fn dump_with<K: Ord>(
        &self,
        key: impl Fn(&str) -> K,
        preamble: impl Fn(&str) -> Option<Statement>,
    ) -> String {
        let mut uids: Vec<&str> = self.instance_uids().collect();
        uids.sort_by_cached_key(|uid| (key(uid), uid.to_string()));

        let mut lines = Vec::new();
        for uid in uids {
            if let Some(statement) = preamble(uid) {
                lines.push(statement.to_string());
            }
            lines.extend(self.statements_for(uid).iter().map(Statement::to_string));
        }
        lines.join("\n")
    }

    /// Apply one parsed statement
    pub fn apply(&mut self, statement: Statement, namespace: &mut dyn Namespace) -> Result<()> {
        match statement {
            Statement::Assign { target, field, value } => self.set(&target, &field, value),
            Statement::Declare { uid, constructor } => {
                let type_name = namespace.declare(&uid, &constructor)?;
                self.register(&uid, &type_name)
            }
        }
    }

    /// Apply every statement in `text`; a bad line is reported and skipped
    pub fn load(&mut self, text: &str, namespace: &mut dyn Namespace) -> LoadReport {
        let mut report = LoadReport::default();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_statement(line).and_then(|stmt| self.apply(stmt, namespace)) {
                Ok(()) => report.applied += 1,
                Err(error) => {
                    error!("error parsing config line {}: {:?}: {}", index + 1, line, error);
                    report.errors.push(LineError {
                        line: index + 1,
                        text: line.to_string(),
                        error,
                    });
                }
            }
        }
        debug!(
            "Loaded config: {} applied, {} failed",
            report.applied,
            report.errors.len()
        );
        report
    }
}
