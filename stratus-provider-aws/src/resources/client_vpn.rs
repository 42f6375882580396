//! Client VPN resources
//!
//! Based on CloudFormation AWS::EC2::ClientVpnEndpoint and its child types.
//! Network associations, authorization rules and routes can be managed as
//! standalone resources or as nested blocks of the endpoint; both forms use
//! the same child definitions.

use std::collections::HashMap;

use serde_json::json;
use stratus_core::resource::Value;
use stratus_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema, types};

use super::{NestedCollection, ResourceDefinition, arn_attribute, string_list};

pub const AUTHENTICATION_TYPES: &[&str] = &[
    "certificate-authentication",
    "directory-service-authentication",
    "federated-authentication",
];

fn authentication_options_block() -> BlockSchema {
    BlockSchema::new()
        .attribute(
            AttributeSchema::new("type", AttributeType::enum_of(AUTHENTICATION_TYPES))
                .required()
                .with_description("The type of client authentication to be used."),
        )
        .attribute(
            AttributeSchema::new("active_directory_id", AttributeType::String)
                .with_description("The ID of the Active Directory to be used for authentication."),
        )
        .attribute(
            AttributeSchema::new("root_certificate_chain_arn", types::arn()).with_description(
                "The ARN of the client certificate. The certificate must be signed by a certificate authority (CA) and it must be provisioned in AWS Certificate Manager (ACM).",
            ),
        )
        .attribute(
            AttributeSchema::new("saml_provider_arn", types::arn())
                .with_description("The ARN of the IAM SAML identity provider."),
        )
}

fn connection_log_options_block() -> BlockSchema {
    BlockSchema::new()
        .attribute(
            AttributeSchema::new("enabled", AttributeType::Bool)
                .required()
                .with_description("Indicates whether connection logging is enabled."),
        )
        .attribute(
            AttributeSchema::new("cloudwatch_log_group", AttributeType::String)
                .with_description("The name of the CloudWatch Logs log group."),
        )
        .attribute(
            AttributeSchema::new("cloudwatch_log_stream", AttributeType::String)
                .with_description("The name of the CloudWatch Logs log stream."),
        )
}

fn network_association_block() -> BlockSchema {
    BlockSchema::new()
        .attribute(AttributeSchema::new("subnet_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("status", AttributeType::String).computed())
}

fn authorization_rule_block() -> BlockSchema {
    BlockSchema::new()
        .attribute(AttributeSchema::new("target_network_cidr", types::cidr()).required())
        .attribute(AttributeSchema::new("access_group_id", AttributeType::String))
        .attribute(AttributeSchema::new("authorize_all_groups", AttributeType::Bool).optional_computed())
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(AttributeSchema::new("id", AttributeType::String).computed())
}

fn route_block() -> BlockSchema {
    BlockSchema::new()
        .attribute(AttributeSchema::new("destination_network_cidr", types::cidr()).required())
        .attribute(AttributeSchema::new("subnet_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(AttributeSchema::new("id", AttributeType::String).computed())
}

fn block_set(block: BlockSchema) -> AttributeType {
    AttributeType::Set(Box::new(AttributeType::Block(block)))
}

/// Returns the definition for aws_ec2_client_vpn_endpoint
pub fn aws_ec2_client_vpn_endpoint_definition() -> ResourceDefinition {
    let schema = ResourceSchema::new("aws_ec2_client_vpn_endpoint")
        .with_description("Provides an AWS Client VPN endpoint for OpenVPN clients.")
        .attribute(
            AttributeSchema::new("description", AttributeType::String)
                .with_description("A brief description of the Client VPN endpoint."),
        )
        .attribute(
            AttributeSchema::new("server_certificate_arn", types::arn())
                .required()
                .with_description("The ARN of the ACM server certificate."),
        )
        .attribute(
            AttributeSchema::new("client_cidr_block", types::cidr())
                .required()
                .force_new()
                .with_description(
                    "The IPv4 address range, in CIDR notation, from which to assign client IP addresses.",
                ),
        )
        .attribute(
            AttributeSchema::new("dns_servers", string_list())
                .max_items(2)
                .with_description(
                    "Information about the DNS servers to be used for DNS resolution. A Client VPN endpoint can have up to two DNS servers.",
                ),
        )
        .attribute(
            AttributeSchema::new("split_tunnel", AttributeType::Bool)
                .with_default(Value::Bool(false))
                .with_description("Indicates whether split-tunnel is enabled on the endpoint."),
        )
        .attribute(
            AttributeSchema::new("transport_protocol", AttributeType::enum_of(&["udp", "tcp"]))
                .with_default(Value::string("udp"))
                .force_new()
                .with_description("The transport protocol to be used by the VPN session."),
        )
        .attribute(
            AttributeSchema::new(
                "authentication_options",
                AttributeType::List(Box::new(AttributeType::Block(
                    authentication_options_block(),
                ))),
            )
            .required()
            .max_items(2)
            .force_new()
            .with_description("Information about the authentication method to be used."),
        )
        .attribute(
            AttributeSchema::new(
                "connection_log_options",
                AttributeType::List(Box::new(AttributeType::Block(
                    connection_log_options_block(),
                ))),
            )
            .required()
            .max_items(1)
            .with_description("Information about the client connection logging options."),
        )
        .attribute(
            AttributeSchema::new("network_association", block_set(network_association_block()))
                .optional_computed()
                .with_description("Subnets to associate with the endpoint."),
        )
        .attribute(
            AttributeSchema::new("authorization_rule", block_set(authorization_rule_block()))
                .optional_computed()
                .with_description("Networks clients are authorized to access."),
        )
        .attribute(
            AttributeSchema::new("route", block_set(route_block()))
                .optional_computed()
                .with_description("Routes added to the endpoint route table."),
        )
        .attribute(arn_attribute())
        .attribute(
            AttributeSchema::new("dns_name", AttributeType::String)
                .computed()
                .with_description("The DNS name to be used by clients when establishing their VPN session."),
        )
        .attribute(
            AttributeSchema::new("status", AttributeType::String)
                .computed()
                .with_description("The current state of the Client VPN endpoint."),
        );

    ResourceDefinition::new("AWS::EC2::ClientVpnEndpoint", schema)
        .with_tag_specifications("client-vpn-endpoint")
        .single_block("connection_log_options")
        .nested(NestedCollection {
            attribute: "network_association",
            resource_type: "aws_ec2_client_vpn_network_association",
            parent_attribute: "client_vpn_endpoint_id",
            renames: &[],
            system_owned: None,
        })
        .nested(NestedCollection {
            attribute: "authorization_rule",
            resource_type: "aws_ec2_client_vpn_authorization_rule",
            parent_attribute: "client_vpn_endpoint_id",
            renames: &[],
            system_owned: None,
        })
        .nested(NestedCollection {
            attribute: "route",
            resource_type: "aws_ec2_client_vpn_route",
            parent_attribute: "client_vpn_endpoint_id",
            renames: &[
                ("destination_network_cidr", "destination_cidr_block"),
                ("subnet_id", "target_vpc_subnet_id"),
            ],
            system_owned: Some(("Origin", "associate")),
        })
        .expand(expand_endpoint)
        .flatten(flatten_endpoint)
}

/// Returns the definition for aws_ec2_client_vpn_network_association
pub fn aws_ec2_client_vpn_network_association_definition() -> ResourceDefinition {
    let schema = ResourceSchema::new("aws_ec2_client_vpn_network_association")
        .with_description("Provides network associations for AWS Client VPN endpoints.")
        .attribute(
            AttributeSchema::new("client_vpn_endpoint_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("subnet_id", AttributeType::String)
                .required()
                .force_new()
                .with_description("The ID of the subnet to associate with the Client VPN endpoint."),
        )
        .attribute(
            AttributeSchema::new("status", AttributeType::String)
                .computed()
                .with_description("The current state of the target network association."),
        )
        .attribute(
            AttributeSchema::new("vpc_id", AttributeType::String)
                .computed()
                .with_description("The ID of the VPC in which the target subnet is located."),
        );

    ResourceDefinition::new("AWS::EC2::ClientVpnTargetNetworkAssociation", schema)
        .lock_on("client_vpn_endpoint_id")
}

/// Returns the definition for aws_ec2_client_vpn_authorization_rule
pub fn aws_ec2_client_vpn_authorization_rule_definition() -> ResourceDefinition {
    let schema = ResourceSchema::new("aws_ec2_client_vpn_authorization_rule")
        .with_description("Provides authorization rules for AWS Client VPN endpoints.")
        .attribute(
            AttributeSchema::new("client_vpn_endpoint_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("target_network_cidr", types::cidr())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("access_group_id", AttributeType::String)
                .force_new()
                .conflicts_with(&["authorize_all_groups"]),
        )
        .attribute(
            AttributeSchema::new("authorize_all_groups", AttributeType::Bool)
                .optional_computed()
                .force_new()
                .conflicts_with(&["access_group_id"]),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String).force_new());

    ResourceDefinition::new("AWS::EC2::ClientVpnAuthorizationRule", schema)
        .lock_on("client_vpn_endpoint_id")
        .expand(expand_authorization_rule)
}

/// Returns the definition for aws_ec2_client_vpn_route
pub fn aws_ec2_client_vpn_route_definition() -> ResourceDefinition {
    let schema = ResourceSchema::new("aws_ec2_client_vpn_route")
        .with_description("Provides additional routes for AWS Client VPN endpoints.")
        .attribute(
            AttributeSchema::new("client_vpn_endpoint_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("destination_cidr_block", types::cidr())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("target_vpc_subnet_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String).force_new())
        .attribute(AttributeSchema::new("origin", AttributeType::String).computed())
        .attribute(AttributeSchema::new("type", AttributeType::String).computed());

    ResourceDefinition::new("AWS::EC2::ClientVpnRoute", schema).lock_on("client_vpn_endpoint_id")
}

/// Authentication options are flat blocks locally and nested objects remotely
fn expand_endpoint(
    attributes: &HashMap<String, Value>,
    props: &mut serde_json::Map<String, serde_json::Value>,
) {
    let Some(options) = attributes
        .get("authentication_options")
        .and_then(Value::as_list)
    else {
        return;
    };

    let expanded: Vec<serde_json::Value> = options
        .iter()
        .filter_map(Value::as_map)
        .map(|option| {
            let field = |name: &str| option.get(name).and_then(Value::as_str);
            let mut obj = serde_json::Map::new();
            if let Some(t) = field("type") {
                obj.insert("Type".to_string(), json!(t));
            }
            if let Some(id) = field("active_directory_id") {
                obj.insert("ActiveDirectory".to_string(), json!({"DirectoryId": id}));
            }
            if let Some(arn) = field("root_certificate_chain_arn") {
                obj.insert(
                    "MutualAuthentication".to_string(),
                    json!({"ClientRootCertificateChainArn": arn}),
                );
            }
            if let Some(arn) = field("saml_provider_arn") {
                obj.insert(
                    "FederatedAuthentication".to_string(),
                    json!({"SAMLProviderArn": arn}),
                );
            }
            serde_json::Value::Object(obj)
        })
        .collect();

    props.insert("AuthenticationOptions".to_string(), json!(expanded));
}

fn flatten_endpoint(props: &serde_json::Value, attributes: &mut HashMap<String, Value>) {
    if let Some(options) = props.get("AuthenticationOptions").and_then(|v| v.as_array()) {
        let flattened = options
            .iter()
            .map(|option| {
                let mut map = HashMap::new();
                let mut copy = |name: &str, value: Option<&serde_json::Value>| {
                    if let Some(s) = value.and_then(|v| v.as_str()) {
                        map.insert(name.to_string(), Value::string(s));
                    }
                };
                copy("type", option.get("Type"));
                copy(
                    "active_directory_id",
                    option.pointer("/ActiveDirectory/DirectoryId"),
                );
                copy(
                    "root_certificate_chain_arn",
                    option.pointer("/MutualAuthentication/ClientRootCertificateChainArn"),
                );
                copy(
                    "saml_provider_arn",
                    option.pointer("/FederatedAuthentication/SAMLProviderArn"),
                );
                Value::Map(map)
            })
            .collect();
        attributes.insert("authentication_options".to_string(), Value::List(flattened));
    }

    // EC2 reports the status as {"Code": "available", "Message": ...}
    if let Some(code) = props.pointer("/Status/Code").and_then(|v| v.as_str()) {
        attributes.insert("status".to_string(), Value::string(code));
    }
}

/// A rule without an access group applies to all groups
fn expand_authorization_rule(
    attributes: &HashMap<String, Value>,
    props: &mut serde_json::Map<String, serde_json::Value>,
) {
    if !attributes.contains_key("access_group_id") && !props.contains_key("AuthorizeAllGroups") {
        props.insert("AuthorizeAllGroups".to_string(), json!(true));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn certificate_option() -> Value {
        Value::Map(HashMap::from([
            (
                "type".to_string(),
                Value::string("certificate-authentication"),
            ),
            (
                "root_certificate_chain_arn".to_string(),
                Value::string("arn:aws:acm:us-west-2:123456789012:certificate/abc"),
            ),
        ]))
    }

    #[test]
    fn authentication_options_round_trip() {
        let attrs = HashMap::from([(
            "authentication_options".to_string(),
            Value::List(vec![certificate_option()]),
        )]);
        let mut props = serde_json::Map::new();
        expand_endpoint(&attrs, &mut props);

        assert_eq!(
            props["AuthenticationOptions"],
            json!([{
                "Type": "certificate-authentication",
                "MutualAuthentication": {
                    "ClientRootCertificateChainArn": "arn:aws:acm:us-west-2:123456789012:certificate/abc"
                }
            }])
        );

        let mut read = HashMap::new();
        flatten_endpoint(&serde_json::Value::Object(props), &mut read);
        assert_eq!(read["authentication_options"], attrs["authentication_options"]);
    }

    #[test]
    fn status_code_is_flattened() {
        let mut read = HashMap::new();
        flatten_endpoint(
            &json!({"Status": {"Code": "pending-associate"}}),
            &mut read,
        );
        assert_eq!(read["status"], Value::string("pending-associate"));
    }

    #[test]
    fn endpoint_schema_validates_fixture_shape() {
        let def = aws_ec2_client_vpn_endpoint_definition();
        let attrs = HashMap::from([
            (
                "server_certificate_arn".to_string(),
                Value::string("arn:aws:acm:us-west-2:123456789012:certificate/abc"),
            ),
            ("client_cidr_block".to_string(), Value::string("10.0.0.0/16")),
            (
                "authentication_options".to_string(),
                Value::List(vec![certificate_option()]),
            ),
            (
                "connection_log_options".to_string(),
                Value::List(vec![Value::Map(HashMap::from([(
                    "enabled".to_string(),
                    Value::Bool(false),
                )]))]),
            ),
            (
                "dns_servers".to_string(),
                Value::List(vec![Value::string("8.8.8.8"), Value::string("8.8.4.4")]),
            ),
        ]);
        assert!(def.schema.validate(&attrs).is_ok());
        assert_eq!(def.nested.len(), 3);
        assert_eq!(def.tag_resource_type, Some("client-vpn-endpoint"));
    }

    #[test]
    fn nested_collections_may_be_managed_elsewhere() {
        let def = aws_ec2_client_vpn_endpoint_definition();
        for nested in &def.nested {
            let attr = def.schema.get(nested.attribute).unwrap();
            assert!(attr.optional && attr.computed, "{}", nested.attribute);
        }
        let route = def.nested.iter().find(|n| n.attribute == "route").unwrap();
        assert!(!route.owns(&serde_json::json!({"Origin": "associate"})));
    }

    #[test]
    fn endpoint_requires_log_options() {
        let def = aws_ec2_client_vpn_endpoint_definition();
        let attrs = HashMap::from([
            (
                "server_certificate_arn".to_string(),
                Value::string("arn:aws:acm:us-west-2:123456789012:certificate/abc"),
            ),
            ("client_cidr_block".to_string(), Value::string("10.0.0.0/16")),
            (
                "authentication_options".to_string(),
                Value::List(vec![certificate_option()]),
            ),
        ]);
        let errors = def.schema.validate(&attrs).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("connection_log_options"));
    }

    #[test]
    fn authorization_rule_defaults_to_all_groups() {
        let mut props = serde_json::Map::new();
        expand_authorization_rule(&HashMap::new(), &mut props);
        assert_eq!(props["AuthorizeAllGroups"], json!(true));

        let mut props = serde_json::Map::new();
        let attrs = HashMap::from([("access_group_id".to_string(), Value::string("g-1"))]);
        expand_authorization_rule(&attrs, &mut props);
        assert!(!props.contains_key("AuthorizeAllGroups"));
    }
}
