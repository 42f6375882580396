//! Schema - Define type schemas for resources
//!
//! Every resource, data source and the provider configuration itself is
//! described by the same recursive tree: an attribute is a scalar, a list,
//! set or map of values, or a nested block with its own attributes.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::resource::Value;

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// Ordered list
    List(Box<AttributeType>),
    /// Unordered collection of unique elements
    Set(Box<AttributeType>),
    /// Map with string keys
    Map(Box<AttributeType>),
    /// Nested block with its own attribute schema
    Block(BlockSchema),
}

impl AttributeType {
    /// Shorthand for a string enum
    pub fn enum_of(values: &[&str]) -> Self {
        AttributeType::Enum(values.iter().map(|v| v.to_string()).collect())
    }

    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        let mut errors = Vec::new();
        self.check(value, &mut errors);
        match errors.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn check(&self, value: &Value, errors: &mut Vec<TypeError>) {
        // References resolve at apply time; only blocks need their shape now
        if matches!(value, Value::Ref(_) | Value::Template(_))
            && !matches!(self, AttributeType::Block(_))
        {
            return;
        }

        match (self, value) {
            (AttributeType::String, Value::String(_)) => {}
            (AttributeType::Int, Value::Int(_)) => {}
            (AttributeType::Bool, Value::Bool(_)) => {}

            (AttributeType::Enum(variants), Value::String(s)) => {
                if !variants.iter().any(|v| v == s) {
                    errors.push(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    });
                }
            }

            (AttributeType::Custom { validate, base, .. }, v) => {
                if let Err(e) = base.validate(v) {
                    errors.push(e);
                } else if let Err(message) = validate(v) {
                    errors.push(TypeError::ValidationFailed { message });
                }
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    if let Err(e) = inner.validate_all(item) {
                        errors.extend(e.into_iter().map(|inner| TypeError::ListItemError {
                            index: i,
                            inner: Box::new(inner),
                        }));
                    }
                }
            }

            (AttributeType::Set(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    if let Err(e) = inner.validate_all(item) {
                        errors.extend(e.into_iter().map(|inner| TypeError::ListItemError {
                            index: i,
                            inner: Box::new(inner),
                        }));
                    }
                    if items[..i].contains(item) {
                        errors.push(TypeError::DuplicateSetElement { index: i });
                    }
                }
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for k in keys {
                    if let Err(e) = inner.validate(&map[k]) {
                        errors.push(TypeError::MapValueError {
                            key: k.clone(),
                            inner: Box::new(e),
                        });
                    }
                }
            }

            (AttributeType::Block(block), Value::Map(map)) => {
                if let Err(block_errors) = block.validate(map) {
                    errors.extend(block_errors);
                }
            }

            _ => errors.push(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn validate_all(&self, value: &Value) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();
        self.check(value, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Nested block schema, for blocks and collections of blocks
    pub fn block(&self) -> Option<&BlockSchema> {
        match self {
            AttributeType::Block(b) => Some(b),
            AttributeType::List(inner) | AttributeType::Set(inner) => inner.block(),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        match self {
            AttributeType::List(_) | AttributeType::Set(_) => true,
            AttributeType::Custom { base, .. } => base.is_collection(),
            _ => false,
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, AttributeType::Set(_))
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Set(inner) => format!("Set<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Block(_) => "Block".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ComputedAttribute { name: String },

    #[error("'{name}' conflicts with '{other}'")]
    ConflictingAttributes { name: String, other: String },

    #[error("Attribute '{name}' allows at most {max} item(s), got {got}")]
    TooManyItems { name: String, max: usize, got: usize },

    #[error("Attribute '{name}' requires at least {min} item(s), got {got}")]
    TooFewItems { name: String, min: usize, got: usize },

    #[error("Duplicate set element at index {index}")]
    DuplicateSetElement { index: usize },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },

    #[error("Attribute '{name}': {inner}")]
    AttributeError { name: String, inner: Box<TypeError> },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
            Value::Ref(r) => format!("Ref({})", r),
            Value::Template(_) => "Template".to_string(),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    pub optional: bool,
    /// Set by the remote side; read-only unless also optional
    pub computed: bool,
    pub default: Option<Value>,
    /// Environment variables consulted in order when the attribute is absent
    pub env_default: Vec<String>,
    pub description: Option<String>,
    /// Provider-side property name (e.g., "VpcId" for AWS Cloud Control)
    pub provider_name: Option<String>,
    pub max_items: Option<usize>,
    pub min_items: Option<usize>,
    pub conflicts_with: Vec<String>,
    /// Changing this attribute requires replacing the resource
    pub force_new: bool,
    pub sensitive: bool,
    /// Sent to the remote side but never reported back
    pub write_only: bool,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            optional: true,
            computed: false,
            default: None,
            env_default: Vec::new(),
            description: None,
            provider_name: None,
            max_items: None,
            min_items: None,
            conflicts_with: Vec::new(),
            force_new: false,
            sensitive: false,
            write_only: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    /// Read-only attribute reported by the remote side
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self.optional = false;
        self
    }

    /// Attribute that may be set, and is computed when it is not
    pub fn optional_computed(mut self) -> Self {
        self.computed = true;
        self.optional = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_env_default(mut self, vars: &[&str]) -> Self {
        self.env_default = vars.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn min_items(mut self, min: usize) -> Self {
        self.min_items = Some(min);
        self
    }

    pub fn conflicts_with(mut self, names: &[&str]) -> Self {
        self.conflicts_with = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    /// True when the attribute can only be reported, never configured
    pub fn is_read_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    /// Value taken from the first non-empty environment variable in `env_default`
    pub fn env_default_value(&self) -> Option<Value> {
        self.env_default_value_from(|var| std::env::var(var).ok())
    }

    /// Like `env_default_value`, reading variables through `lookup`
    pub fn env_default_value_from(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<Value> {
        let raw = self
            .env_default
            .iter()
            .filter_map(|var| lookup(var))
            .find(|v| !v.is_empty())?;

        match &self.attr_type {
            AttributeType::Int => raw.parse().ok().map(Value::Int),
            AttributeType::Bool => raw.parse().ok().map(Value::Bool),
            _ => Some(Value::String(raw)),
        }
    }

    fn has_default(&self) -> bool {
        self.default.is_some() || self.env_default_value().is_some()
    }
}

/// Nested block schema
#[derive(Debug, Clone, Default)]
pub struct BlockSchema {
    pub attributes: HashMap<String, AttributeSchema>,
}

impl BlockSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        validate_attributes(&self.attributes, attributes)
    }

    pub fn apply_defaults(&self, attributes: &mut HashMap<String, Value>) {
        apply_defaults(&self.attributes, attributes)
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.get(name)
    }

    /// Attribute names in sorted order
    pub fn attribute_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.attributes.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    /// Attributes whose change forces replacement
    pub fn force_new_attributes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .attributes
            .values()
            .filter(|a| a.force_new)
            .map(|a| a.name.as_str())
            .collect();
        names.sort();
        names
    }

    /// Validate resource attributes
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        validate_attributes(&self.attributes, attributes)
    }

    /// Fill absent optional attributes from their defaults
    pub fn apply_defaults(&self, attributes: &mut HashMap<String, Value>) {
        apply_defaults(&self.attributes, attributes)
    }
}

fn validate_attributes(
    schemas: &HashMap<String, AttributeSchema>,
    attributes: &HashMap<String, Value>,
) -> Result<(), Vec<TypeError>> {
    let mut errors = Vec::new();

    let mut schema_names: Vec<&String> = schemas.keys().collect();
    schema_names.sort();

    // Check required attributes
    for name in schema_names {
        let schema = &schemas[name];
        if schema.required && !attributes.contains_key(name) && !schema.has_default() {
            errors.push(TypeError::MissingRequired { name: name.clone() });
        }
    }

    let mut names: Vec<&String> = attributes.keys().collect();
    names.sort();

    let mut reported_conflicts: HashSet<(String, String)> = HashSet::new();

    for name in names {
        // Internal attributes
        if name.starts_with('_') {
            continue;
        }
        let value = &attributes[name];

        let Some(schema) = schemas.get(name) else {
            errors.push(TypeError::UnknownAttribute { name: name.clone() });
            continue;
        };

        if schema.is_read_only() {
            errors.push(TypeError::ComputedAttribute { name: name.clone() });
            continue;
        }

        for other in &schema.conflicts_with {
            if attributes.contains_key(other) {
                let pair = if name < other {
                    (name.clone(), other.clone())
                } else {
                    (other.clone(), name.clone())
                };
                if reported_conflicts.insert(pair.clone()) {
                    errors.push(TypeError::ConflictingAttributes {
                        name: pair.0,
                        other: pair.1,
                    });
                }
            }
        }

        if let Value::List(items) = value {
            if let Some(max) = schema.max_items
                && items.len() > max
            {
                errors.push(TypeError::TooManyItems {
                    name: name.clone(),
                    max,
                    got: items.len(),
                });
            }
            if let Some(min) = schema.min_items
                && items.len() < min
            {
                errors.push(TypeError::TooFewItems {
                    name: name.clone(),
                    min,
                    got: items.len(),
                });
            }
        }

        if let Err(type_errors) = schema.attr_type.validate_all(value) {
            errors.extend(type_errors.into_iter().map(|inner| TypeError::AttributeError {
                name: name.clone(),
                inner: Box::new(inner),
            }));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn apply_defaults(
    schemas: &HashMap<String, AttributeSchema>,
    attributes: &mut HashMap<String, Value>,
) {
    for (name, schema) in schemas {
        if !attributes.contains_key(name) {
            let value = schema
                .default
                .clone()
                .or_else(|| schema.env_default_value());
            if let Some(v) = value {
                attributes.insert(name.clone(), v);
            }
        }

        let Some(block) = schema.attr_type.block() else {
            continue;
        };
        match attributes.get_mut(name) {
            Some(Value::List(items)) => {
                for item in items {
                    if let Value::Map(map) = item {
                        block.apply_defaults(map);
                    }
                }
            }
            Some(Value::Map(map)) => block.apply_defaults(map),
            _ => {}
        }
    }
}

/// Helper functions for common types
pub mod types {
    use std::sync::LazyLock;

    use regex::Regex;

    use super::*;

    static ARN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^arn:[\w-]+:[a-zA-Z0-9\-]+:([a-z]{2}-(gov-)?[a-z]+-\d)?:(\d{12})?:.*$")
            .expect("ARN pattern is valid")
    });

    /// Positive integer type
    pub fn positive_int() -> AttributeType {
        AttributeType::Custom {
            name: "PositiveInt".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| {
                if let Value::Int(n) = value {
                    if *n > 0 {
                        Ok(())
                    } else {
                        Err("Value must be positive".to_string())
                    }
                } else {
                    Ok(())
                }
            },
        }
    }

    /// TCP/UDP port number
    pub fn port() -> AttributeType {
        AttributeType::Custom {
            name: "Port".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| match value {
                Value::Int(n) if (0..=65535).contains(n) => Ok(()),
                Value::Int(n) => Err(format!("Port {} is out of range 0-65535", n)),
                _ => Ok(()),
            },
        }
    }

    /// CIDR block type (e.g., "10.0.0.0/16")
    pub fn cidr() -> AttributeType {
        AttributeType::Custom {
            name: "Cidr".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| {
                if let Value::String(s) = value {
                    validate_cidr(s)
                } else {
                    Ok(())
                }
            },
        }
    }

    /// Amazon Resource Name
    pub fn arn() -> AttributeType {
        AttributeType::Custom {
            name: "Arn".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| {
                if let Value::String(s) = value {
                    validate_arn(s)
                } else {
                    Ok(())
                }
            },
        }
    }

    /// String holding a JSON document
    pub fn json_string() -> AttributeType {
        AttributeType::Custom {
            name: "Json".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| {
                if let Value::String(s) = value {
                    serde_json::from_str::<serde_json::Value>(s)
                        .map(|_| ())
                        .map_err(|e| format!("'{}' is not valid JSON: {}", s, e))
                } else {
                    Ok(())
                }
            },
        }
    }

    pub fn validate_arn(s: &str) -> Result<(), String> {
        if ARN_PATTERN.is_match(s) {
            Ok(())
        } else {
            Err(format!("'{}' is not a valid ARN", s))
        }
    }
}

/// Validate CIDR block format (e.g., "10.0.0.0/16")
pub fn validate_cidr(cidr: &str) -> Result<(), String> {
    let parts: Vec<&str> = cidr.split('/').collect();
    if parts.len() != 2 {
        return Err(format!(
            "Invalid CIDR format '{}': expected IP/prefix",
            cidr
        ));
    }

    let ip = parts[0];
    let prefix = parts[1];

    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() != 4 {
        return Err(format!("Invalid IP address '{}': expected 4 octets", ip));
    }

    for octet in &octets {
        if octet.parse::<u8>().is_err() {
            return Err(format!(
                "Invalid octet '{}' in IP address: must be 0-255",
                octet
            ));
        }
    }

    match prefix.parse::<u8>() {
        Ok(p) if p <= 32 => Ok(()),
        Ok(p) => Err(format!("Invalid prefix length '{}': must be 0-32", p)),
        Err(_) => Err(format!(
            "Invalid prefix length '{}': must be a number",
            prefix
        )),
    }
}
