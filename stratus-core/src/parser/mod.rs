//! Parser - Parse fixture configuration files
//!
//! Convert the HCL-like fixture format to resources using pest

use std::collections::{HashMap, HashSet};

use pest::Parser;
use pest::iterators::{Pair, Pairs};
use pest_derive::Parser;

use crate::resource::{Reference, Resource, ResourceId, TemplatePart, Value};

#[derive(Parser)]
#[grammar = "parser/fixture.pest"]
struct FixtureParser;

/// Parse error
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] Box<pest::error::Error<Rule>>),

    #[error("Invalid expression at line {line}: {message}")]
    InvalidExpression { line: usize, message: String },

    #[error("Duplicate attribute '{name}' at line {line}")]
    DuplicateAttribute { name: String, line: usize },

    #[error("Duplicate resource: {0}")]
    DuplicateResource(String),

    #[error("Dependency cycle between: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),
}

/// Provider configuration block
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub name: String,
    pub attributes: HashMap<String, Value>,
}

/// Parse result
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub providers: Vec<ProviderConfig>,
    /// Resources and data sources in declaration order
    pub resources: Vec<Resource>,
}

impl ParsedFile {
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Find a resource by address (`type.name` or `data.type.name`)
    pub fn resource(&self, address: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id.address() == address)
    }

    /// Every `(resource address, referenced address)` pair
    pub fn references(&self) -> Vec<(String, String)> {
        self.resources
            .iter()
            .flat_map(|r| {
                let from = r.id.address();
                r.dependencies().into_iter().map(move |to| (from.clone(), to))
            })
            .collect()
    }

    /// Resources sorted so that every resource comes after the resources it
    /// references. Declaration order is kept among independent resources.
    /// References to undeclared addresses are ignored.
    pub fn dependency_order(&self) -> Result<Vec<&Resource>, ParseError> {
        let declared: HashSet<String> = self.resources.iter().map(|r| r.id.address()).collect();
        let mut pending: Vec<(&Resource, Vec<String>)> = self
            .resources
            .iter()
            .map(|r| {
                let deps = r
                    .dependencies()
                    .into_iter()
                    .filter(|d| declared.contains(d))
                    .collect();
                (r, deps)
            })
            .collect();

        let mut done: HashSet<String> = HashSet::new();
        let mut ordered = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            let ready = pending
                .iter()
                .position(|(_, deps)| deps.iter().all(|d| done.contains(d)));

            match ready {
                Some(i) => {
                    let (resource, _) = pending.remove(i);
                    done.insert(resource.id.address());
                    ordered.push(resource);
                }
                None => {
                    let mut cycle: Vec<String> =
                        pending.iter().map(|(r, _)| r.id.address()).collect();
                    cycle.sort();
                    return Err(ParseError::DependencyCycle(cycle));
                }
            }
        }

        Ok(ordered)
    }
}

/// Parse a fixture file
pub fn parse(input: &str) -> Result<ParsedFile, ParseError> {
    let pairs = FixtureParser::parse(Rule::file, input).map_err(Box::new)?;

    let mut parsed = ParsedFile::default();
    let mut addresses = HashSet::new();

    for pair in pairs {
        if pair.as_rule() != Rule::file {
            continue;
        }
        for stmt in pair.into_inner() {
            match stmt.as_rule() {
                Rule::provider_block => {
                    let mut inner = stmt.into_inner();
                    let name = parse_string(inner.next().unwrap());
                    let attributes = parse_body(inner.next().unwrap())?;
                    parsed.providers.push(ProviderConfig { name, attributes });
                }
                Rule::resource_block | Rule::data_block => {
                    let data = stmt.as_rule() == Rule::data_block;
                    let mut inner = stmt.into_inner();
                    let resource_type = parse_string(inner.next().unwrap());
                    let name = parse_string(inner.next().unwrap());
                    let attributes = parse_body(inner.next().unwrap())?;

                    let id = if data {
                        ResourceId::data(resource_type, name)
                    } else {
                        ResourceId::new(resource_type, name)
                    };
                    if !addresses.insert(id.address()) {
                        return Err(ParseError::DuplicateResource(id.address()));
                    }
                    parsed.resources.push(Resource { id, attributes });
                }
                _ => {}
            }
        }
    }

    Ok(parsed)
}

/// Parse block contents (attributes and nested blocks)
/// Nested blocks with the same name are collected into a list
fn parse_body(pair: Pair<Rule>) -> Result<HashMap<String, Value>, ParseError> {
    let mut attributes: HashMap<String, Value> = HashMap::new();
    let mut nested_blocks: Vec<(String, Vec<Value>)> = Vec::new();

    for content in pair.into_inner() {
        let line = line_of(&content);
        match content.as_rule() {
            Rule::attribute => {
                let mut inner = content.into_inner();
                let key = inner.next().unwrap().as_str().to_string();
                let value = parse_expression(inner.next().unwrap())?;
                if attributes.insert(key.clone(), value).is_some() {
                    return Err(ParseError::DuplicateAttribute { name: key, line });
                }
            }
            Rule::nested_block => {
                let mut inner = content.into_inner();
                let name = inner.next().unwrap().as_str().to_string();
                let block = Value::Map(parse_body(inner.next().unwrap())?);
                match nested_blocks.iter_mut().find(|(n, _)| *n == name) {
                    Some((_, blocks)) => blocks.push(block),
                    None => nested_blocks.push((name, vec![block])),
                }
            }
            _ => {}
        }
    }

    for (name, blocks) in nested_blocks {
        if attributes.contains_key(&name) {
            return Err(ParseError::DuplicateAttribute { name, line: 0 });
        }
        attributes.insert(name, Value::List(blocks));
    }

    Ok(attributes)
}

fn parse_expression(pair: Pair<Rule>) -> Result<Value, ParseError> {
    // For expression, get inner content; otherwise process directly
    let inner = if pair.as_rule() == Rule::expression {
        pair.into_inner().next().unwrap()
    } else {
        pair
    };
    let line = line_of(&inner);

    match inner.as_rule() {
        Rule::string => parse_template(&parse_string(inner), line),
        Rule::number => inner
            .as_str()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| ParseError::InvalidExpression {
                line,
                message: format!("{}: {}", inner.as_str(), e),
            }),
        Rule::boolean => Ok(Value::Bool(inner.as_str() == "true")),
        Rule::list => parse_list(inner.into_inner()),
        Rule::map => {
            let mut map = HashMap::new();
            for entry in inner.into_inner() {
                let mut entry_inner = entry.into_inner();
                let key_pair = entry_inner.next().unwrap();
                let key = match key_pair.as_rule() {
                    Rule::string => parse_string(key_pair),
                    _ => key_pair.as_str().to_string(),
                };
                let value = parse_expression(entry_inner.next().unwrap())?;
                map.insert(key, value);
            }
            Ok(Value::Map(map))
        }
        Rule::reference => parse_reference(inner.as_str(), line).map(Value::Ref),
        _ => Err(ParseError::InvalidExpression {
            line,
            message: inner.as_str().to_string(),
        }),
    }
}

fn parse_list(items: Pairs<Rule>) -> Result<Value, ParseError> {
    items
        .map(parse_expression)
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

fn parse_reference(expr: &str, line: usize) -> Result<Reference, ParseError> {
    Reference::parse(expr.trim()).ok_or_else(|| ParseError::InvalidExpression {
        line,
        message: format!("invalid reference '{}'", expr),
    })
}

/// Split a string on `${...}` interpolations.
///
/// A string that is exactly one interpolation becomes a plain reference.
fn parse_template(s: &str, line: usize) -> Result<Value, ParseError> {
    if !s.contains("${") {
        return Ok(Value::String(s.to_string()));
    }

    let mut parts = Vec::new();
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        if start > 0 {
            parts.push(TemplatePart::Literal(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| ParseError::InvalidExpression {
            line,
            message: format!("unterminated interpolation in \"{}\"", s),
        })?;
        parts.push(TemplatePart::Ref(parse_reference(&after[..end], line)?));
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        parts.push(TemplatePart::Literal(rest.to_string()));
    }

    match parts.as_slice() {
        [TemplatePart::Ref(r)] => Ok(Value::Ref(r.clone())),
        _ => Ok(Value::Template(parts)),
    }
}

fn parse_string(pair: Pair<Rule>) -> String {
    let s = pair.as_str();
    // Remove quotes
    let inner = &s[1..s.len() - 1];
    // Handle escape sequences
    inner
        .replace("\\n", "\n")
        .replace("\\r", "\r")
        .replace("\\t", "\t")
        .replace("\\\"", "\"")
        .replace("\\\\", "\\")
}

fn line_of(pair: &Pair<Rule>) -> usize {
    pair.as_span().start_pos().line_col().0
}
