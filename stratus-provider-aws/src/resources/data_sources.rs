//! Data source definitions
//!
//! `aws_region`, `aws_availability_zones` and `aws_default_tags` are
//! answered from the provider itself. The others search Cloud Control resources: by `id` when it is
//! configured, otherwise by listing the type and keeping the candidates whose
//! properties match every configured argument.

use std::collections::HashMap;

use stratus_core::resource::Value;
use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{DataSourceDefinition, string_list, string_set, tags_type};

pub const ZONE_STATES: &[&str] = &["available", "information", "impaired", "unavailable"];
pub const CERTIFICATE_STATUSES: &[&str] = &[
    "PENDING_VALIDATION",
    "ISSUED",
    "INACTIVE",
    "EXPIRED",
    "VALIDATION_TIMED_OUT",
    "REVOKED",
    "FAILED",
];

/// Returns the definition for data.aws_availability_zones
pub fn aws_availability_zones_definition() -> DataSourceDefinition {
    let schema = ResourceSchema::new("aws_availability_zones")
        .with_description("Provides a list of Availability Zones which can be used by an AWS account.")
        .attribute(
            AttributeSchema::new("state", AttributeType::enum_of(ZONE_STATES))
                .with_description("Allows to filter list of Availability Zones based on their current state."),
        )
        .attribute(
            AttributeSchema::new("all_availability_zones", AttributeType::Bool)
                .with_default(Value::Bool(false))
                .with_description("Set to true to include all Availability Zones and Local Zones regardless of your opt in status."),
        )
        .attribute(AttributeSchema::new("exclude_names", string_set()))
        .attribute(AttributeSchema::new("exclude_zone_ids", string_set()))
        .attribute(AttributeSchema::new("id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("names", string_list()).computed())
        .attribute(AttributeSchema::new("zone_ids", string_list()).computed())
        .attribute(AttributeSchema::new("group_names", string_set()).computed());

    DataSourceDefinition::new(None, schema)
}

/// Returns the definition for data.aws_region
pub fn aws_region_definition() -> DataSourceDefinition {
    let schema = ResourceSchema::new("aws_region")
        .with_description("Provides details about the region the provider is configured for.")
        .attribute(AttributeSchema::new("name", AttributeType::String).optional_computed())
        .attribute(AttributeSchema::new("endpoint", AttributeType::String).optional_computed())
        .attribute(AttributeSchema::new("id", AttributeType::String).computed());

    DataSourceDefinition::new(None, schema)
}

/// Returns the definition for data.aws_default_tags
pub fn aws_default_tags_definition() -> DataSourceDefinition {
    let schema = ResourceSchema::new("aws_default_tags")
        .with_description("Provides the default tags configured on the provider.")
        .attribute(
            AttributeSchema::new("tags", tags_type())
                .computed()
                .with_description("Tags applied to every taggable resource of the provider."),
        )
        .attribute(AttributeSchema::new("id", AttributeType::String).computed());

    DataSourceDefinition::new(None, schema)
}

/// Returns the definition for data.aws_vpc
pub fn aws_vpc_definition() -> DataSourceDefinition {
    let schema = ResourceSchema::new("aws_vpc")
        .with_description("Provides details about a specific VPC.")
        .attribute(AttributeSchema::new("id", AttributeType::String).optional_computed())
        .attribute(AttributeSchema::new("cidr_block", types::cidr()).optional_computed())
        .attribute(AttributeSchema::new("instance_tenancy", AttributeType::String).computed())
        .attribute(AttributeSchema::new("enable_dns_support", AttributeType::Bool).computed())
        .attribute(AttributeSchema::new("enable_dns_hostnames", AttributeType::Bool).computed())
        .attribute(
            AttributeSchema::new("default_security_group_id", AttributeType::String)
                .computed()
                .with_provider_name("DefaultSecurityGroup"),
        );

    DataSourceDefinition::new(Some("AWS::EC2::VPC"), schema).with_tags()
}

/// Returns the definition for data.aws_subnet
pub fn aws_subnet_definition() -> DataSourceDefinition {
    let schema = ResourceSchema::new("aws_subnet")
        .with_description("Provides details about a specific VPC subnet.")
        .attribute(AttributeSchema::new("id", AttributeType::String).optional_computed())
        .attribute(AttributeSchema::new("vpc_id", AttributeType::String).optional_computed())
        .attribute(AttributeSchema::new("cidr_block", types::cidr()).optional_computed())
        .attribute(AttributeSchema::new("availability_zone", AttributeType::String).optional_computed())
        .attribute(
            AttributeSchema::new("availability_zone_id", AttributeType::String).optional_computed(),
        )
        .attribute(
            AttributeSchema::new("map_public_ip_on_launch", AttributeType::Bool).computed(),
        );

    DataSourceDefinition::new(Some("AWS::EC2::Subnet"), schema).with_tags()
}

/// Returns the definition for data.aws_acm_certificate
pub fn aws_acm_certificate_definition() -> DataSourceDefinition {
    let schema = ResourceSchema::new("aws_acm_certificate")
        .with_description("Get the ARN of a certificate in AWS Certificate Manager.")
        .attribute(
            AttributeSchema::new("domain", AttributeType::String)
                .required()
                .with_provider_name("DomainName")
                .with_description("The domain of the certificate to look up."),
        )
        .attribute(
            AttributeSchema::new(
                "statuses",
                AttributeType::Set(Box::new(AttributeType::enum_of(CERTIFICATE_STATUSES))),
            )
            .with_description("A list of statuses on which to filter the returned list. Defaults to ISSUED."),
        )
        .attribute(
            AttributeSchema::new("most_recent", AttributeType::Bool)
                .with_default(Value::Bool(false))
                .with_description("If set to true, the most recent certificate is returned when several match."),
        )
        .attribute(AttributeSchema::new("id", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("arn", types::arn())
                .computed()
                .with_provider_name("Arn"),
        )
        .attribute(AttributeSchema::new("status", AttributeType::String).computed());

    DataSourceDefinition::new(Some("AWS::CertificateManager::Certificate"), schema)
        .with_tags()
        .filter_only(&["statuses", "most_recent"])
        .matches(certificate_matches)
}

/// Keep certificates whose status is one of `statuses` (ISSUED by default)
fn certificate_matches(attributes: &HashMap<String, Value>, props: &serde_json::Value) -> bool {
    let status = props.get("Status").and_then(|v| v.as_str()).unwrap_or("ISSUED");
    match attributes.get("statuses").and_then(Value::as_list) {
        Some(statuses) if !statuses.is_empty() => statuses.iter().any(|s| s.as_str() == Some(status)),
        _ => status == "ISSUED",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn certificate_status_filter() {
        let issued = json!({"DomainName": "example.com", "Status": "ISSUED"});
        let expired = json!({"DomainName": "example.com", "Status": "EXPIRED"});

        let defaults = HashMap::new();
        assert!(certificate_matches(&defaults, &issued));
        assert!(!certificate_matches(&defaults, &expired));

        let attrs = HashMap::from([(
            "statuses".to_string(),
            Value::List(vec![Value::string("EXPIRED")]),
        )]);
        assert!(certificate_matches(&attrs, &expired));
        assert!(!certificate_matches(&attrs, &issued));
    }

    #[test]
    fn default_tags_take_no_arguments() {
        let def = aws_default_tags_definition();
        assert!(def.schema.get("tags").unwrap().is_read_only());
        let attrs = HashMap::from([(
            "tags".to_string(),
            Value::Map(HashMap::from([("Env".to_string(), Value::string("prod"))])),
        )]);
        assert!(def.schema.validate(&attrs).is_err());
    }

    #[test]
    fn zone_state_is_an_enum() {
        let def = aws_availability_zones_definition();
        let attrs = HashMap::from([("state".to_string(), Value::string("gone"))]);
        assert!(def.schema.validate(&attrs).is_err());
        assert!(def.aws_type_name.is_none());
    }
}
