//! EC2 networking resources
//!
//! Based on the CloudFormation AWS::EC2::VPC, Subnet, InternetGateway,
//! RouteTable and SecurityGroup schemas.

use stratus_core::resource::Value;
use stratus_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema, types};

use super::ResourceDefinition;

/// Valid instance tenancy values
pub const INSTANCE_TENANCY: &[&str] = &["default", "dedicated", "host"];

/// Returns the definition for aws_vpc (AWS::EC2::VPC)
pub fn aws_vpc_definition() -> ResourceDefinition {
    let schema = ResourceSchema::new("aws_vpc")
        .with_description("Provides a VPC resource.")
        .attribute(
            AttributeSchema::new("cidr_block", types::cidr())
                .required()
                .force_new()
                .with_description("The IPv4 CIDR block for the VPC."),
        )
        .attribute(
            AttributeSchema::new("instance_tenancy", AttributeType::enum_of(INSTANCE_TENANCY))
                .optional_computed()
                .force_new()
                .with_description("A tenancy option for instances launched into the VPC."),
        )
        .attribute(
            AttributeSchema::new("enable_dns_support", AttributeType::Bool)
                .optional_computed()
                .with_description("A boolean flag to enable/disable DNS support in the VPC."),
        )
        .attribute(
            AttributeSchema::new("enable_dns_hostnames", AttributeType::Bool)
                .optional_computed()
                .with_description("A boolean flag to enable/disable DNS hostnames in the VPC."),
        )
        .attribute(
            AttributeSchema::new("default_network_acl_id", AttributeType::String)
                .computed()
                .with_provider_name("DefaultNetworkAcl"),
        )
        .attribute(
            AttributeSchema::new("default_security_group_id", AttributeType::String)
                .computed()
                .with_provider_name("DefaultSecurityGroup"),
        )
        .attribute(
            AttributeSchema::new(
                "ipv6_cidr_blocks",
                AttributeType::List(Box::new(AttributeType::String)),
            )
            .computed(),
        );

    ResourceDefinition::new("AWS::EC2::VPC", schema).with_tags()
}

/// Returns the definition for aws_subnet (AWS::EC2::Subnet)
pub fn aws_subnet_definition() -> ResourceDefinition {
    let schema = ResourceSchema::new("aws_subnet")
        .with_description("Provides a VPC subnet resource.")
        .attribute(
            AttributeSchema::new("vpc_id", AttributeType::String)
                .required()
                .force_new()
                .with_description("The VPC ID."),
        )
        .attribute(
            AttributeSchema::new("cidr_block", types::cidr())
                .required()
                .force_new()
                .with_description("The IPv4 CIDR block for the subnet."),
        )
        .attribute(
            AttributeSchema::new("availability_zone", AttributeType::String)
                .optional_computed()
                .force_new()
                .with_description("The AZ for the subnet."),
        )
        .attribute(
            AttributeSchema::new("availability_zone_id", AttributeType::String)
                .optional_computed()
                .force_new()
                .with_description("The AZ ID of the subnet."),
        )
        .attribute(
            AttributeSchema::new("map_public_ip_on_launch", AttributeType::Bool)
                .with_default(Value::Bool(false))
                .with_description(
                    "Specify true to indicate that instances launched into the subnet should be assigned a public IP address.",
                ),
        )
        .attribute(
            AttributeSchema::new("network_acl_association_id", AttributeType::String).computed(),
        );

    ResourceDefinition::new("AWS::EC2::Subnet", schema).with_tags()
}

/// Returns the definition for aws_internet_gateway (AWS::EC2::InternetGateway)
pub fn aws_internet_gateway_definition() -> ResourceDefinition {
    let schema = ResourceSchema::new("aws_internet_gateway")
        .with_description("Provides a resource to create a VPC Internet Gateway.");

    ResourceDefinition::new("AWS::EC2::InternetGateway", schema).with_tags()
}

/// Returns the definition for aws_route_table (AWS::EC2::RouteTable)
pub fn aws_route_table_definition() -> ResourceDefinition {
    let schema = ResourceSchema::new("aws_route_table")
        .with_description("Provides a resource to create a VPC routing table.")
        .attribute(
            AttributeSchema::new("vpc_id", AttributeType::String)
                .required()
                .force_new()
                .with_description("The VPC ID."),
        );

    ResourceDefinition::new("AWS::EC2::RouteTable", schema).with_tags()
}

fn security_group_rule() -> AttributeType {
    AttributeType::Set(Box::new(AttributeType::Block(
        BlockSchema::new()
            .attribute(
                AttributeSchema::new("protocol", AttributeType::String)
                    .required()
                    .with_provider_name("IpProtocol"),
            )
            .attribute(AttributeSchema::new("from_port", types::port()))
            .attribute(AttributeSchema::new("to_port", types::port()))
            .attribute(AttributeSchema::new("cidr_ip", types::cidr()))
            .attribute(AttributeSchema::new("description", AttributeType::String)),
    )))
}

/// Returns the definition for aws_security_group (AWS::EC2::SecurityGroup)
pub fn aws_security_group_definition() -> ResourceDefinition {
    let schema = ResourceSchema::new("aws_security_group")
        .with_description("Provides a security group resource.")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .optional_computed()
                .force_new()
                .with_provider_name("GroupName"),
        )
        .attribute(
            AttributeSchema::new("description", AttributeType::String)
                .with_default(Value::string("Managed by Stratus"))
                .force_new()
                .with_provider_name("GroupDescription"),
        )
        .attribute(
            AttributeSchema::new("vpc_id", AttributeType::String)
                .optional_computed()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("ingress", security_group_rule())
                .with_provider_name("SecurityGroupIngress"),
        )
        .attribute(
            AttributeSchema::new("egress", security_group_rule())
                .optional_computed()
                .with_provider_name("SecurityGroupEgress"),
        );

    ResourceDefinition::new("AWS::EC2::SecurityGroup", schema).with_tags()
}
