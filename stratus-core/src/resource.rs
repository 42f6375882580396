//! Resource - Representing resources and their state

use std::collections::HashMap;
use std::fmt;

/// Whether a resource is managed (created/updated/deleted) or only read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceMode {
    Managed,
    Data,
}

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    pub mode: ResourceMode,
    /// Resource type (e.g., "aws_vpc", "aws_ec2_client_vpn_endpoint")
    pub resource_type: String,
    /// Resource name (label given in the configuration)
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode: ResourceMode::Managed,
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    pub fn data(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode: ResourceMode::Data,
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    pub fn is_data(&self) -> bool {
        self.mode == ResourceMode::Data
    }

    /// Address used in references: `aws_vpc.test` or `data.aws_vpc.test`
    pub fn address(&self) -> String {
        match self.mode {
            ResourceMode::Managed => format!("{}.{}", self.resource_type, self.name),
            ResourceMode::Data => format!("data.{}.{}", self.resource_type, self.name),
        }
    }

    /// Parse an address produced by [`ResourceId::address`]
    pub fn parse_address(address: &str) -> Option<Self> {
        let parts: Vec<&str> = address.split('.').collect();
        match parts.as_slice() {
            ["data", resource_type, name] => Some(Self::data(*resource_type, *name)),
            [resource_type, name] => Some(Self::new(*resource_type, *name)),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address())
    }
}

/// Reference to another resource's attribute, e.g. `aws_vpc.test.id`
/// or `data.aws_availability_zones.available.names[0]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Address of the referenced resource (`aws_vpc.test`)
    pub address: String,
    /// Attribute name on the referenced resource
    pub attribute: String,
    /// Optional list index applied to the attribute value
    pub index: Option<usize>,
}

impl Reference {
    /// Parse a dotted reference expression
    pub fn parse(expr: &str) -> Option<Self> {
        let (path, index) = match expr.find('[') {
            Some(open) => {
                let close = expr.rfind(']')?;
                let index = expr[open + 1..close].parse::<usize>().ok()?;
                (&expr[..open], Some(index))
            }
            None => (expr, None),
        };

        let parts: Vec<&str> = path.split('.').collect();
        let (address_len, min_len) = if parts.first() == Some(&"data") {
            (3, 4)
        } else {
            (2, 3)
        };
        if parts.len() != min_len || parts.iter().any(|p| p.is_empty()) {
            return None;
        }

        Some(Self {
            address: parts[..address_len].join("."),
            attribute: parts[address_len].to_string(),
            index,
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.address, self.attribute)?;
        if let Some(i) = self.index {
            write!(f, "[{}]", i)?;
        }
        Ok(())
    }
}

/// Piece of an interpolated string
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Ref(Reference),
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    /// Reference to another resource's attribute, resolved before apply
    Ref(Reference),
    /// String with `${...}` interpolations, resolved before apply
    Template(Vec<TemplatePart>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// True for values that still contain unresolved references
    pub fn is_unresolved(&self) -> bool {
        match self {
            Value::Ref(_) | Value::Template(_) => true,
            Value::List(items) => items.iter().any(Value::is_unresolved),
            Value::Map(map) => map.values().any(Value::is_unresolved),
            _ => false,
        }
    }

    /// Collect every reference contained in this value
    pub fn references(&self) -> Vec<&Reference> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a Reference>) {
        match self {
            Value::Ref(r) => refs.push(r),
            Value::Template(parts) => {
                for part in parts {
                    if let TemplatePart::Ref(r) = part {
                        refs.push(r);
                    }
                }
            }
            Value::List(items) => items.iter().for_each(|v| v.collect_references(refs)),
            Value::Map(map) => map.values().for_each(|v| v.collect_references(refs)),
            _ => {}
        }
    }

    /// Replace references using `lookup`. Returns the first reference that
    /// could not be resolved as the error.
    pub fn resolve<F>(&self, lookup: &F) -> Result<Value, Reference>
    where
        F: Fn(&Reference) -> Option<Value>,
    {
        match self {
            Value::Ref(r) => lookup(r).ok_or_else(|| r.clone()),
            Value::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Literal(s) => out.push_str(s),
                        TemplatePart::Ref(r) => match lookup(r) {
                            Some(v) => out.push_str(&v.to_string()),
                            None => return Err(r.clone()),
                        },
                    }
                }
                Ok(Value::String(out))
            }
            Value::List(items) => items
                .iter()
                .map(|v| v.resolve(lookup))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Value::Map(map) => {
                let mut resolved = HashMap::new();
                for (k, v) in map {
                    resolved.insert(k.clone(), v.resolve(lookup)?);
                }
                Ok(Value::Map(resolved))
            }
            _ => Ok(self.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Map(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let parts: Vec<String> = keys
                    .into_iter()
                    .map(|k| format!("{} = {}", k, map[k]))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Ref(r) => write!(f, "${{{}}}", r),
            Value::Template(parts) => {
                for part in parts {
                    match part {
                        TemplatePart::Literal(s) => write!(f, "{}", s)?,
                        TemplatePart::Ref(r) => write!(f, "${{{}}}", r)?,
                    }
                }
                Ok(())
            }
        }
    }
}

/// Desired state declared in configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: HashMap<String, Value>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: HashMap::new(),
        }
    }

    pub fn data(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::data(resource_type, name),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Returns true if this resource is a data source (read-only)
    pub fn is_data_source(&self) -> bool {
        self.id.is_data()
    }

    /// Addresses of every resource this one references
    pub fn dependencies(&self) -> Vec<String> {
        let mut deps: Vec<String> = self
            .attributes
            .values()
            .flat_map(|v| v.references())
            .map(|r| r.address.clone())
            .filter(|a| *a != self.id.address())
            .collect();
        deps.sort();
        deps.dedup();
        deps
    }
}

/// Current state fetched from actual infrastructure
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    /// Remote identifier (e.g., vpc-xxx, cvpn-endpoint-xxx)
    pub identifier: Option<String>,
    pub attributes: HashMap<String, Value>,
    /// Whether this state exists
    pub exists: bool,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            attributes: HashMap::new(),
            exists: false,
        }
    }

    pub fn existing(id: ResourceId, attributes: HashMap<String, Value>) -> Self {
        Self {
            id,
            identifier: None,
            attributes,
            exists: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_managed_reference() {
        let r = Reference::parse("aws_vpc.test.id").unwrap();
        assert_eq!(r.address, "aws_vpc.test");
        assert_eq!(r.attribute, "id");
        assert_eq!(r.index, None);
    }

    #[test]
    fn parse_data_reference_with_index() {
        let r = Reference::parse("data.aws_availability_zones.available.names[1]").unwrap();
        assert_eq!(r.address, "data.aws_availability_zones.available");
        assert_eq!(r.attribute, "names");
        assert_eq!(r.index, Some(1));
    }

    #[test]
    fn reject_short_reference() {
        assert!(Reference::parse("aws_vpc.test").is_none());
        assert!(Reference::parse("data.aws_vpc.test").is_none());
    }

    #[test]
    fn resolve_template() {
        let value = Value::Template(vec![
            TemplatePart::Ref(Reference::parse("aws_cloudwatch_log_group.lg.name").unwrap()),
            TemplatePart::Literal("-stream".to_string()),
        ]);
        let resolved = value
            .resolve(&|_: &Reference| Some(Value::string("logs")))
            .unwrap();
        assert_eq!(resolved, Value::string("logs-stream"));
    }

    #[test]
    fn resolve_reports_missing_reference() {
        let value = Value::List(vec![Value::Ref(Reference::parse("aws_subnet.a.id").unwrap())]);
        let err = value.resolve(&|_: &Reference| None).unwrap_err();
        assert_eq!(err.address, "aws_subnet.a");
    }

    #[test]
    fn resource_dependencies_are_deduplicated() {
        let vpc_ref = Value::Ref(Reference::parse("aws_vpc.test.id").unwrap());
        let resource = Resource::new("aws_subnet", "a")
            .with_attribute("vpc_id", vpc_ref.clone())
            .with_attribute("tags", Value::Map(HashMap::from([("Vpc".to_string(), vpc_ref)])));
        assert_eq!(resource.dependencies(), vec!["aws_vpc.test".to_string()]);
    }

    #[test]
    fn address_round_trip_for_data_sources() {
        let id = ResourceId::data("aws_region", "current");
        assert_eq!(id.address(), "data.aws_region.current");
        assert_eq!(ResourceId::parse_address(&id.address()), Some(id));
    }
}
