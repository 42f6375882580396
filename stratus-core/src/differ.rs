//! Differ - Compare desired state with current state to generate a Plan
//!
//! Only configured attributes are compared: values the remote side computes
//! and the configuration never mentions do not produce changes. Nested block
//! collections declared as sets are compared without regard to order, and
//! their elements match on the keys the configuration sets.

use std::collections::HashMap;

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// A force-new attribute changed -> delete and recreate
    Replace {
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
    /// Resource exists but is no longer declared -> needs deletion
    Delete { id: ResourceId, identifier: String },
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Result of comparing two collections of nested blocks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetDiff {
    /// Desired elements with no matching current element
    pub added: Vec<Value>,
    /// Current elements with no matching desired element
    pub removed: Vec<Value>,
    /// (desired, current) pairs that match
    pub unchanged: Vec<(Value, Value)>,
}

impl SetDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State, schema: Option<&ResourceSchema>) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes, schema);

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let replace = schema.is_some_and(|s| {
        changed
            .iter()
            .any(|name| s.get(name).is_some_and(|a| a.force_new))
    });

    if replace {
        Diff::Replace {
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Diff for a resource that exists remotely but is no longer declared
pub fn diff_removed(current: &State) -> Diff {
    if !current.exists {
        return Diff::NoChange(current.id.clone());
    }
    Diff::Delete {
        id: current.id.clone(),
        identifier: current.identifier.clone().unwrap_or_default(),
    }
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
    schema: Option<&ResourceSchema>,
) -> Vec<String> {
    let attr_schemas = schema.map(|s| &s.attributes);
    let mut changed = changed_keys(desired, current, attr_schemas);
    changed.sort();
    changed
}

fn changed_keys(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
    schemas: Option<&HashMap<String, AttributeSchema>>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }
        let attr = schemas.and_then(|s| s.get(key));
        let attr_type = attr.map(|a| &a.attr_type);

        match current.get(key) {
            Some(current_value) if values_match(desired_value, current_value, attr_type) => {}
            None if is_empty(desired_value) => {}
            None if attr.is_some_and(|a| a.write_only) => {}
            _ => changed.push(key.clone()),
        }
    }

    // Configured attributes that were removed from the configuration
    if let Some(schemas) = schemas {
        for (key, current_value) in current {
            if desired.contains_key(key) || key.starts_with('_') || is_empty(current_value) {
                continue;
            }
            if schemas.get(key).is_some_and(|a| !a.computed) {
                changed.push(key.clone());
            }
        }
    }

    changed
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::List(items) => items.is_empty(),
        Value::Map(map) => map.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Whether a desired value is satisfied by a current value.
///
/// Without type information values must be equal. With a block schema,
/// only the keys the configuration sets are compared.
pub fn values_match(desired: &Value, current: &Value, attr_type: Option<&AttributeType>) -> bool {
    match (attr_type, desired, current) {
        (Some(AttributeType::Block(block)), Value::Map(d), Value::Map(c)) => {
            block_matches(d, c, block)
        }
        (Some(AttributeType::List(inner)), Value::List(d), Value::List(c)) => {
            d.len() == c.len()
                && d
                    .iter()
                    .zip(c)
                    .all(|(dv, cv)| values_match(dv, cv, Some(inner)))
        }
        (Some(AttributeType::Set(inner)), Value::List(d), Value::List(c)) => {
            d.len() == c.len() && set_difference(d, c, Some(inner)).is_empty()
        }
        (Some(AttributeType::Custom { base, .. }), _, _) => {
            values_match(desired, current, Some(base))
        }
        _ => desired == current,
    }
}

fn block_matches(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
    block: &BlockSchema,
) -> bool {
    changed_keys(desired, current, Some(&block.attributes)).is_empty()
}

/// Compare two collections element by element, without regard to order.
///
/// Each desired element is paired with at most one current element.
pub fn set_difference(
    desired: &[Value],
    current: &[Value],
    element_type: Option<&AttributeType>,
) -> SetDiff {
    let mut result = SetDiff::default();
    let mut matched = vec![false; current.len()];

    for d in desired {
        let found = current
            .iter()
            .enumerate()
            .find(|(i, c)| !matched[*i] && values_match(d, c, element_type))
            .map(|(i, _)| i);

        match found {
            Some(i) => {
                matched[i] = true;
                result.unchanged.push((d.clone(), current[i].clone()));
            }
            None => result.added.push(d.clone()),
        }
    }

    result.removed = current
        .iter()
        .zip(&matched)
        .filter(|(_, m)| !**m)
        .map(|(c, _)| c.clone())
        .collect();

    result
}

/// Set difference of one nested block attribute between desired and current
pub fn nested_difference(
    attribute: &str,
    desired: &Resource,
    current: &State,
    schema: &ResourceSchema,
) -> SetDiff {
    let element_type = schema.get(attribute).and_then(|a| match &a.attr_type {
        AttributeType::List(inner) | AttributeType::Set(inner) => Some(inner.as_ref()),
        _ => None,
    });
    let list = |v: Option<&Value>| -> Vec<Value> {
        v.and_then(Value::as_list)
            .map(<[Value]>::to_vec)
            .unwrap_or_default()
    };
    set_difference(
        &list(desired.attributes.get(attribute)),
        &list(current.attributes.get(attribute)),
        element_type,
    )
}

/// Compute Diff for multiple resources and generate a Plan.
///
/// `desired` is expected in dependency order. Resources present in
/// `current_states` but absent from `desired` are deleted last, in reverse
/// order of their addresses.
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
    schemas: &HashMap<String, ResourceSchema>,
) -> Plan {
    let mut plan = Plan::new();

    for resource in desired {
        if resource.is_data_source() {
            plan.add(Effect::Read(resource.clone()));
            continue;
        }

        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        match diff(resource, &current, schemas.get(&resource.id.resource_type)) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Update {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::Replace {
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Replace {
                from,
                to,
                changed_attributes,
            }),
            Diff::Delete { id, identifier } => plan.add(Effect::Delete { id, identifier }),
            Diff::NoChange(_) => {}
        }
    }

    let mut orphans: Vec<&State> = current_states
        .values()
        .filter(|s| s.exists && !s.id.is_data())
        .filter(|s| !desired.iter().any(|r| r.id == s.id))
        .collect();
    orphans.sort_by(|a, b| b.id.cmp(&a.id));
    for state in orphans {
        if let Diff::Delete { id, identifier } = diff_removed(state) {
            plan.add(Effect::Delete { id, identifier });
        }
    }

    plan
}

/// Plan deleting every managed resource, in reverse of the given apply order
pub fn destroy_plan(states_in_apply_order: &[State]) -> Plan {
    let mut plan = Plan::new();
    for state in states_in_apply_order.iter().rev() {
        if state.exists && !state.id.is_data() {
            plan.add(Effect::Delete {
                id: state.id.clone(),
                identifier: state.identifier.clone().unwrap_or_default(),
            });
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeSchema;

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    fn block(pairs: &[(&str, Value)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn route_schema() -> ResourceSchema {
        ResourceSchema::new("aws_ec2_client_vpn_endpoint")
            .attribute(AttributeSchema::new("client_cidr_block", AttributeType::String).force_new())
            .attribute(AttributeSchema::new("description", AttributeType::String))
            .attribute(AttributeSchema::new("dns_name", AttributeType::String).computed())
            .attribute(AttributeSchema::new(
                "tags",
                AttributeType::Map(Box::new(AttributeType::String)),
            ))
            .attribute(AttributeSchema::new(
                "route",
                AttributeType::Set(Box::new(AttributeType::Block(
                    BlockSchema::new()
                        .attribute(AttributeSchema::new(
                            "destination_network_cidr",
                            AttributeType::String,
                        ))
                        .attribute(AttributeSchema::new("description", AttributeType::String))
                        .attribute(AttributeSchema::new("id", AttributeType::String).computed()),
                ))),
            ))
    }

    fn existing(attrs: &[(&str, Value)]) -> State {
        State::existing(
            ResourceId::new("aws_ec2_client_vpn_endpoint", "test"),
            attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
        .with_identifier("cvpn-endpoint-1")
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("aws_vpc", "test");
        let current = State::not_found(ResourceId::new("aws_vpc", "test"));

        let result = diff(&desired, &current, None);
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn computed_attributes_do_not_cause_changes() {
        let desired = Resource::new("aws_ec2_client_vpn_endpoint", "test")
            .with_attribute("description", s("vpn"));
        let current = existing(&[("description", s("vpn")), ("dns_name", s("x.example"))]);

        let result = diff(&desired, &current, Some(&route_schema()));
        assert!(matches!(result, Diff::NoChange(_)));
    }

    #[test]
    fn set_elements_match_on_configured_keys_in_any_order() {
        let desired = Resource::new("aws_ec2_client_vpn_endpoint", "test").with_attribute(
            "route",
            Value::List(vec![
                block(&[("destination_network_cidr", s("192.168.2.0/24"))]),
                block(&[("destination_network_cidr", s("192.168.1.0/24"))]),
            ]),
        );
        let current = existing(&[(
            "route",
            Value::List(vec![
                block(&[
                    ("destination_network_cidr", s("192.168.1.0/24")),
                    ("id", s("r-1")),
                ]),
                block(&[
                    ("destination_network_cidr", s("192.168.2.0/24")),
                    ("id", s("r-2")),
                ]),
            ]),
        )]);

        let result = diff(&desired, &current, Some(&route_schema()));
        assert!(matches!(result, Diff::NoChange(_)));
    }

    #[test]
    fn removed_tags_are_a_change() {
        let desired = Resource::new("aws_ec2_client_vpn_endpoint", "test");
        let current = existing(&[(
            "tags",
            Value::Map(HashMap::from([("Usage".to_string(), s("original"))])),
        )]);

        match diff(&desired, &current, Some(&route_schema())) {
            Diff::Update {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["tags".to_string()]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn force_new_attribute_replaces() {
        let desired = Resource::new("aws_ec2_client_vpn_endpoint", "test")
            .with_attribute("client_cidr_block", s("10.1.0.0/16"));
        let current = existing(&[("client_cidr_block", s("10.0.0.0/16"))]);

        assert!(matches!(
            diff(&desired, &current, Some(&route_schema())),
            Diff::Replace { .. }
        ));
    }

    #[test]
    fn nested_difference_finds_added_and_removed() {
        let schema = route_schema();
        let desired = Resource::new("aws_ec2_client_vpn_endpoint", "test").with_attribute(
            "route",
            Value::List(vec![block(&[(
                "destination_network_cidr",
                s("192.168.1.0/24"),
            )])]),
        );
        let current = existing(&[(
            "route",
            Value::List(vec![
                block(&[
                    ("destination_network_cidr", s("192.168.1.0/24")),
                    ("id", s("r-1")),
                ]),
                block(&[
                    ("destination_network_cidr", s("192.168.2.0/24")),
                    ("id", s("r-2")),
                ]),
            ]),
        )]);

        let result = nested_difference("route", &desired, &current, &schema);
        assert!(result.added.is_empty());
        assert_eq!(result.removed.len(), 1);
        assert_eq!(
            result.removed[0].as_map().unwrap().get("id"),
            Some(&s("r-2"))
        );
        assert_eq!(result.unchanged.len(), 1);
    }

    #[test]
    fn set_difference_pairs_each_element_once() {
        let a = block(&[("destination_network_cidr", s("10.0.0.0/8"))]);
        let result = set_difference(&[a.clone(), a.clone()], &[a.clone()], None);
        assert_eq!(result.added, vec![a]);
        assert!(result.removed.is_empty());
    }

    #[test]
    fn create_plan_from_resources() {
        let resources = vec![
            Resource::data("aws_availability_zones", "available"),
            Resource::new("aws_vpc", "new"),
            Resource::new("aws_vpc", "existing").with_attribute("enable_dns_support", Value::Bool(true)),
        ];

        let mut current_states = HashMap::new();
        let mut attrs = HashMap::new();
        attrs.insert("enable_dns_support".to_string(), Value::Bool(false));
        current_states.insert(
            ResourceId::new("aws_vpc", "existing"),
            State::existing(ResourceId::new("aws_vpc", "existing"), attrs),
        );
        current_states.insert(
            ResourceId::new("aws_vpc", "orphan"),
            State::existing(ResourceId::new("aws_vpc", "orphan"), HashMap::new())
                .with_identifier("vpc-9"),
        );

        let plan = create_plan(&resources, &current_states, &HashMap::new());

        assert_eq!(plan.effects().len(), 4);
        assert!(matches!(plan.effects()[0], Effect::Read(_)));
        assert!(matches!(plan.effects()[1], Effect::Create(_)));
        assert!(matches!(plan.effects()[2], Effect::Update { .. }));
        assert_eq!(
            plan.effects()[3],
            Effect::Delete {
                id: ResourceId::new("aws_vpc", "orphan"),
                identifier: "vpc-9".to_string()
            }
        );
    }

    #[test]
    fn destroy_plan_reverses_order() {
        let vpc = State::existing(ResourceId::new("aws_vpc", "test"), HashMap::new())
            .with_identifier("vpc-1");
        let subnet = State::existing(ResourceId::new("aws_subnet", "test"), HashMap::new())
            .with_identifier("subnet-1");
        let zones = State::existing(ResourceId::data("aws_availability_zones", "a"), HashMap::new());

        let plan = destroy_plan(&[zones, vpc, subnet]);
        let order: Vec<String> = plan.effects().iter().map(|e| e.brief()).collect();
        assert_eq!(order, vec!["- aws_subnet.test", "- aws_vpc.test"]);
    }
}
