//! Directory Service directories
//!
//! Only AWS Managed Microsoft AD is backed by a Cloud Control type
//! (AWS::DirectoryService::MicrosoftAD), so `type` accepts just that value.

use std::collections::HashMap;

use stratus_core::resource::Value;
use stratus_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema};

use super::{ResourceDefinition, string_list, string_set};

pub const DIRECTORY_TYPES: &[&str] = &["MicrosoftAD"];
pub const EDITIONS: &[&str] = &["Enterprise", "Standard"];

/// Returns the definition for aws_directory_service_directory
pub fn aws_directory_service_directory_definition() -> ResourceDefinition {
    let vpc_settings = BlockSchema::new()
        .attribute(
            AttributeSchema::new("vpc_id", AttributeType::String)
                .required()
                .with_provider_name("VpcId"),
        )
        .attribute(
            AttributeSchema::new("subnet_ids", string_set())
                .required()
                .min_items(2)
                .with_provider_name("SubnetIds"),
        );

    let schema = ResourceSchema::new("aws_directory_service_directory")
        .with_description("Provides a Simple or Managed Microsoft directory in AWS Directory Service.")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .force_new()
                .with_description("The fully qualified name for the directory, such as corp.example.com"),
        )
        .attribute(
            AttributeSchema::new("password", AttributeType::String)
                .required()
                .force_new()
                .sensitive()
                .write_only()
                .with_description("The password for the directory administrator."),
        )
        .attribute(
            AttributeSchema::new("edition", AttributeType::enum_of(EDITIONS))
                .optional_computed()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("short_name", AttributeType::String)
                .optional_computed()
                .force_new()
                .with_description("The short name of the directory, such as CORP."),
        )
        .attribute(
            AttributeSchema::new("type", AttributeType::enum_of(DIRECTORY_TYPES))
                .with_default(Value::string("MicrosoftAD"))
                .force_new(),
        )
        .attribute(
            AttributeSchema::new(
                "vpc_settings",
                AttributeType::List(Box::new(AttributeType::Block(vpc_settings))),
            )
            .required()
            .max_items(1)
            .force_new()
            .with_provider_name("VpcSettings"),
        )
        .attribute(
            AttributeSchema::new("dns_ip_addresses", string_list())
                .computed()
                .with_provider_name("DnsIpAddresses"),
        )
        .attribute(AttributeSchema::new("alias", AttributeType::String).computed());

    ResourceDefinition::new("AWS::DirectoryService::MicrosoftAD", schema)
        .single_block("vpc_settings")
        .expand(expand_directory)
        .flatten(flatten_directory)
}

fn expand_directory(
    _attributes: &HashMap<String, Value>,
    props: &mut serde_json::Map<String, serde_json::Value>,
) {
    // The directory type is implied by the remote resource type
    props.remove("Type");
}

fn flatten_directory(props: &serde_json::Value, attributes: &mut HashMap<String, Value>) {
    if props.get("Name").is_some() {
        attributes.insert("type".to_string(), Value::string("MicrosoftAD"));
    }
}
