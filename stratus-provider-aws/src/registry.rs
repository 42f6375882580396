//! Registration tables
//!
//! Resource and data source names map to zero-argument factories producing
//! their definitions. The tables are built once; a duplicate name aborts
//! when a table is first forced.

use std::sync::LazyLock;

use stratus_core::registry::Registry;

use crate::endpoints::ENDPOINT_SERVICES;
use crate::resources::{
    DataSourceDefinition, ResourceDefinition, acm, client_vpn, data_sources, directory, ec2, logs,
};

pub type ResourceFactory = fn() -> ResourceDefinition;
pub type DataSourceFactory = fn() -> DataSourceDefinition;

const RESOURCE_TABLE: &[(&str, ResourceFactory)] = &[
    ("aws_acm_certificate", acm::aws_acm_certificate_definition),
    ("aws_cloudwatch_log_group", logs::aws_cloudwatch_log_group_definition),
    ("aws_cloudwatch_log_stream", logs::aws_cloudwatch_log_stream_definition),
    (
        "aws_directory_service_directory",
        directory::aws_directory_service_directory_definition,
    ),
    (
        "aws_ec2_client_vpn_authorization_rule",
        client_vpn::aws_ec2_client_vpn_authorization_rule_definition,
    ),
    (
        "aws_ec2_client_vpn_endpoint",
        client_vpn::aws_ec2_client_vpn_endpoint_definition,
    ),
    (
        "aws_ec2_client_vpn_network_association",
        client_vpn::aws_ec2_client_vpn_network_association_definition,
    ),
    ("aws_ec2_client_vpn_route", client_vpn::aws_ec2_client_vpn_route_definition),
    ("aws_internet_gateway", ec2::aws_internet_gateway_definition),
    ("aws_route_table", ec2::aws_route_table_definition),
    ("aws_security_group", ec2::aws_security_group_definition),
    ("aws_subnet", ec2::aws_subnet_definition),
    ("aws_vpc", ec2::aws_vpc_definition),
];

const DATA_SOURCE_TABLE: &[(&str, DataSourceFactory)] = &[
    ("aws_acm_certificate", data_sources::aws_acm_certificate_definition),
    ("aws_availability_zones", data_sources::aws_availability_zones_definition),
    ("aws_default_tags", data_sources::aws_default_tags_definition),
    ("aws_region", data_sources::aws_region_definition),
    ("aws_subnet", data_sources::aws_subnet_definition),
    ("aws_vpc", data_sources::aws_vpc_definition),
];

pub static RESOURCES: LazyLock<Registry<ResourceFactory>> =
    LazyLock::new(|| Registry::from_entries("resource", RESOURCE_TABLE.iter().copied()));

pub static DATA_SOURCES: LazyLock<Registry<DataSourceFactory>> =
    LazyLock::new(|| Registry::from_entries("data source", DATA_SOURCE_TABLE.iter().copied()));

/// Force every table so that duplicate registrations abort at startup
pub fn init() {
    LazyLock::force(&RESOURCES);
    LazyLock::force(&DATA_SOURCES);
    LazyLock::force(&ENDPOINT_SERVICES);
}

pub fn resource_definition(resource_type: &str) -> Option<ResourceDefinition> {
    RESOURCES.build(resource_type)
}

pub fn data_source_definition(data_type: &str) -> Option<DataSourceDefinition> {
    DATA_SOURCES.build(data_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_factory_builds_its_own_type() {
        init();
        for (name, factory) in RESOURCES.iter() {
            assert_eq!(factory().schema.resource_type, name);
        }
        for (name, factory) in DATA_SOURCES.iter() {
            assert_eq!(factory().schema.resource_type, name);
        }
    }

    #[test]
    fn nested_collections_name_registered_children() {
        for (_, factory) in RESOURCES.iter() {
            let def = factory();
            for nested in &def.nested {
                let child = resource_definition(nested.resource_type).unwrap();
                assert!(child.schema.get(nested.parent_attribute).is_some());
                let block = def.schema.get(nested.attribute).unwrap().attr_type.block().unwrap();
                for key in block.attributes.keys() {
                    if key == "id" || block.attributes[key].is_read_only() {
                        continue;
                    }
                    assert!(
                        child.schema.get(nested.child_key(key)).is_some(),
                        "{}.{} has no child attribute",
                        nested.attribute,
                        key
                    );
                }
            }
        }
    }

    #[test]
    fn client_vpn_family_is_registered() {
        assert!(RESOURCES.contains("aws_ec2_client_vpn_endpoint"));
        assert!(DATA_SOURCES.contains("aws_availability_zones"));
        assert!(resource_definition("aws_nope").is_none());
        assert_eq!(RESOURCES.len(), 13);
        assert_eq!(DATA_SOURCES.len(), 6);
    }
}
