//! Conversion between attribute values and Cloud Control property documents
//!
//! Attribute names map to property names through `provider_name` when the
//! schema sets one, otherwise through UpperCamelCase (`client_cidr_block` ->
//! `ClientCidrBlock`). Nested blocks become arrays of objects whose keys are
//! converted the same way.

use std::collections::HashMap;

use heck::ToUpperCamelCase;
use serde_json::json;
use stratus_core::resource::Value;
use stratus_core::schema::{AttributeSchema, AttributeType};

/// Provider-side property name of an attribute
pub fn property_name(attr: &AttributeSchema) -> String {
    attr.provider_name
        .clone()
        .unwrap_or_else(|| attr.name.to_upper_camel_case())
}

/// Convert JSON value to Value.
///
/// Numbers that are not integers are kept as their decimal text.
pub fn json_to_value(value: &serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::String(s) => Some(Value::String(s.clone())),
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Value::Int(i)),
            None => Some(Value::String(n.to_string())),
        },
        serde_json::Value::Array(arr) => {
            let items: Vec<Value> = arr.iter().filter_map(json_to_value).collect();
            Some(Value::List(items))
        }
        serde_json::Value::Object(obj) => {
            let map: HashMap<String, Value> = obj
                .iter()
                .filter_map(|(k, v)| json_to_value(v).map(|v| (k.clone(), v)))
                .collect();
            Some(Value::Map(map))
        }
        serde_json::Value::Null => None,
    }
}

/// Convert Value to JSON value. Unresolved references have no JSON form.
pub fn value_to_json(value: &Value) -> Option<serde_json::Value> {
    match value {
        Value::String(s) => Some(json!(s)),
        Value::Bool(b) => Some(json!(b)),
        Value::Int(i) => Some(json!(i)),
        Value::List(items) => {
            let arr: Vec<serde_json::Value> = items.iter().filter_map(value_to_json).collect();
            Some(serde_json::Value::Array(arr))
        }
        Value::Map(map) => {
            let obj: serde_json::Map<String, serde_json::Value> = map
                .iter()
                .filter_map(|(k, v)| value_to_json(v).map(|v| (k.clone(), v)))
                .collect();
            Some(serde_json::Value::Object(obj))
        }
        Value::Ref(_) | Value::Template(_) => None,
    }
}

/// Build a property document from attribute values.
///
/// Read-only attributes and the names in `skip` are left out, as are
/// attributes without a value. Attributes listed in `single_blocks` are
/// sent as one object rather than a one-element array.
pub fn to_properties(
    schemas: &HashMap<String, AttributeSchema>,
    values: &HashMap<String, Value>,
    skip: &[&str],
    single_blocks: &[&str],
) -> serde_json::Map<String, serde_json::Value> {
    let mut props = serde_json::Map::new();

    for (name, attr) in schemas {
        if attr.is_read_only() || skip.contains(&name.as_str()) {
            continue;
        }
        let Some(value) = values.get(name) else {
            continue;
        };
        let Some(json) = attribute_to_json(&attr.attr_type, value) else {
            continue;
        };
        let json = match json {
            serde_json::Value::Array(mut items) if single_blocks.contains(&name.as_str()) => {
                if items.is_empty() {
                    continue;
                }
                items.swap_remove(0)
            }
            other => other,
        };
        props.insert(property_name(attr), json);
    }

    props
}

/// Read attribute values from a property document.
///
/// Properties without a matching attribute are ignored. A single object is
/// accepted wherever a list of blocks is expected.
pub fn from_properties(
    schemas: &HashMap<String, AttributeSchema>,
    props: &serde_json::Value,
    skip: &[&str],
) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();

    for (name, attr) in schemas {
        if skip.contains(&name.as_str()) {
            continue;
        }
        if let Some(json) = props.get(property_name(attr).as_str())
            && let Some(value) = json_to_attribute(&attr.attr_type, json)
        {
            attributes.insert(name.clone(), value);
        }
    }

    attributes
}

fn attribute_to_json(attr_type: &AttributeType, value: &Value) -> Option<serde_json::Value> {
    let Some(block) = attr_type.block() else {
        return value_to_json(value);
    };

    let block_to_json = |v: &Value| -> Option<serde_json::Value> {
        v.as_map()
            .map(|m| serde_json::Value::Object(to_properties(&block.attributes, m, &[], &[])))
    };

    match value {
        Value::List(items) => Some(serde_json::Value::Array(
            items.iter().filter_map(block_to_json).collect(),
        )),
        Value::Map(_) => block_to_json(value),
        _ => None,
    }
}

fn json_to_attribute(attr_type: &AttributeType, json: &serde_json::Value) -> Option<Value> {
    let Some(block) = attr_type.block() else {
        return json_to_value(json);
    };

    let block_from_json =
        |j: &serde_json::Value| Value::Map(from_properties(&block.attributes, j, &[]));

    match (attr_type, json) {
        (AttributeType::Block(_), serde_json::Value::Object(_)) => Some(block_from_json(json)),
        (_, serde_json::Value::Array(items)) => {
            Some(Value::List(items.iter().map(block_from_json).collect()))
        }
        (_, serde_json::Value::Object(_)) => Some(Value::List(vec![block_from_json(json)])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use stratus_core::schema::{BlockSchema, ResourceSchema};

    use super::*;

    fn endpoint_schema() -> ResourceSchema {
        ResourceSchema::new("aws_ec2_client_vpn_endpoint")
            .attribute(AttributeSchema::new("client_cidr_block", AttributeType::String))
            .attribute(AttributeSchema::new(
                "dns_servers",
                AttributeType::List(Box::new(AttributeType::String)),
            ))
            .attribute(
                AttributeSchema::new("destination_network_cidr", AttributeType::String)
                    .with_provider_name("DestinationCidrBlock"),
            )
            .attribute(AttributeSchema::new("dns_name", AttributeType::String).computed())
            .attribute(AttributeSchema::new(
                "connection_log_options",
                AttributeType::List(Box::new(AttributeType::Block(
                    BlockSchema::new()
                        .attribute(AttributeSchema::new("enabled", AttributeType::Bool))
                        .attribute(AttributeSchema::new(
                            "cloudwatch_log_group",
                            AttributeType::String,
                        )),
                ))),
            ))
    }

    #[test]
    fn property_names() {
        let schema = endpoint_schema();
        assert_eq!(
            property_name(schema.get("client_cidr_block").unwrap()),
            "ClientCidrBlock"
        );
        assert_eq!(
            property_name(schema.get("destination_network_cidr").unwrap()),
            "DestinationCidrBlock"
        );
    }

    #[test]
    fn to_properties_skips_read_only_and_unresolved() {
        let schema = endpoint_schema();
        let values = HashMap::from([
            ("client_cidr_block".to_string(), Value::string("10.0.0.0/16")),
            ("dns_name".to_string(), Value::string("vpn.example.com")),
            (
                "dns_servers".to_string(),
                Value::List(vec![Value::string("8.8.8.8")]),
            ),
        ]);
        let props = to_properties(&schema.attributes, &values, &[], &[]);
        assert_eq!(props["ClientCidrBlock"], json!("10.0.0.0/16"));
        assert_eq!(props["DnsServers"], json!(["8.8.8.8"]));
        assert!(!props.contains_key("DnsName"));
    }

    #[test]
    fn single_block_is_sent_as_object() {
        let schema = endpoint_schema();
        let log_options = Value::List(vec![Value::Map(HashMap::from([
            ("enabled".to_string(), Value::Bool(true)),
            ("cloudwatch_log_group".to_string(), Value::string("lg")),
        ]))]);
        let values = HashMap::from([("connection_log_options".to_string(), log_options.clone())]);

        let props = to_properties(&schema.attributes, &values, &[], &["connection_log_options"]);
        assert_eq!(
            props["ConnectionLogOptions"],
            json!({"Enabled": true, "CloudwatchLogGroup": "lg"})
        );

        let read = from_properties(
            &schema.attributes,
            &serde_json::Value::Object(props),
            &[],
        );
        assert_eq!(read["connection_log_options"], log_options);
    }

    #[test]
    fn from_properties_ignores_unknown_and_null() {
        let schema = endpoint_schema();
        let props = json!({
            "ClientCidrBlock": "10.0.0.0/16",
            "DnsName": "*.cvpn-endpoint-1.prod.clientvpn.us-west-2.amazonaws.com",
            "DnsServers": null,
            "VpnPort": 443,
        });
        let attrs = from_properties(&schema.attributes, &props, &[]);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["client_cidr_block"], Value::string("10.0.0.0/16"));
        assert!(attrs.contains_key("dns_name"));
    }

    #[test]
    fn json_integers_become_ints() {
        assert_eq!(json_to_value(&json!(443)), Some(Value::Int(443)));
        assert_eq!(json_to_value(&json!(-1)), Some(Value::Int(-1)));
    }

    #[test]
    fn json_fractions_keep_their_digits() {
        assert_eq!(json_to_value(&json!(0.5)), Some(Value::string("0.5")));
        assert_eq!(json_to_value(&json!(1.75)), Some(Value::string("1.75")));
    }
}
