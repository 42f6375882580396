//! Resource and data source definitions
//!
//! Each registered type is a schema plus the metadata the Cloud Control
//! bridge needs to map it onto a remote resource type.

use std::collections::HashMap;

use stratus_core::resource::Value;
use stratus_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

pub mod acm;
pub mod client_vpn;
pub mod data_sources;
pub mod directory;
pub mod ec2;
pub mod logs;

/// Adjusts a property document after the generic attribute mapping
pub type ExpandFn = fn(&HashMap<String, Value>, &mut serde_json::Map<String, serde_json::Value>);

/// Adjusts attributes read back from a property document
pub type FlattenFn = fn(&serde_json::Value, &mut HashMap<String, Value>);

/// Extra predicate applied to data source candidates
pub type MatchFn = fn(&HashMap<String, Value>, &serde_json::Value) -> bool;

/// A block set on a parent resource whose elements are remote child
/// resources of another registered type
#[derive(Debug, Clone)]
pub struct NestedCollection {
    /// Block attribute on the parent (e.g., "route")
    pub attribute: &'static str,
    /// Registered resource type of each element
    pub resource_type: &'static str,
    /// Attribute of the child that holds the parent identifier
    pub parent_attribute: &'static str,
    /// Block key to child attribute renames
    pub renames: &'static [(&'static str, &'static str)],
    /// Remote property and value marking children the remote side created
    /// on its own; they are not elements of the collection
    pub system_owned: Option<(&'static str, &'static str)>,
}

impl NestedCollection {
    /// Child attribute name for a block key
    pub fn child_key<'a>(&self, block_key: &'a str) -> &'a str {
        self.renames
            .iter()
            .find(|(from, _)| *from == block_key)
            .map(|(_, to)| *to)
            .unwrap_or(block_key)
    }

    /// Whether a remote child with these properties belongs to the collection
    pub fn owns(&self, props: &serde_json::Value) -> bool {
        match self.system_owned {
            Some((property, value)) => props.get(property).and_then(|v| v.as_str()) != Some(value),
            None => true,
        }
    }
}

/// Resource type backed by a Cloud Control resource type
pub struct ResourceDefinition {
    /// AWS CloudFormation type name (e.g., "AWS::EC2::ClientVpnEndpoint")
    pub aws_type_name: &'static str,
    /// Whether this resource type uses tags
    pub has_tags: bool,
    /// Tags are sent as `TagSpecifications` for this EC2 resource type
    /// instead of a `Tags` property
    pub tag_resource_type: Option<&'static str>,
    pub schema: ResourceSchema,
    pub nested: Vec<NestedCollection>,
    /// Block list attributes sent as a single object
    pub single_blocks: Vec<&'static str>,
    /// Attribute whose value names the lock held while this resource is
    /// created or deleted
    pub lock_on: Option<&'static str>,
    /// Attribute that always equals the remote identifier
    pub identifier_attribute: Option<&'static str>,
    pub expand: Option<ExpandFn>,
    pub flatten: Option<FlattenFn>,
}

impl ResourceDefinition {
    pub fn new(aws_type_name: &'static str, schema: ResourceSchema) -> Self {
        Self {
            aws_type_name,
            has_tags: false,
            tag_resource_type: None,
            schema: schema.attribute(id_attribute()),
            nested: Vec::new(),
            single_blocks: Vec::new(),
            lock_on: None,
            identifier_attribute: None,
            expand: None,
            flatten: None,
        }
    }

    /// Add the `tags` and `tags_all` attributes
    pub fn with_tags(mut self) -> Self {
        self.has_tags = true;
        self.schema = self
            .schema
            .attribute(AttributeSchema::new("tags", tags_type()).with_description(
                "A map of tags to assign to the resource.",
            ))
            .attribute(AttributeSchema::new("tags_all", tags_type()).computed().with_description(
                "Tags on the resource, including those inherited from the provider default_tags.",
            ));
        self
    }

    /// Tag through `TagSpecifications` with the given EC2 resource type
    pub fn with_tag_specifications(mut self, resource_type: &'static str) -> Self {
        self.tag_resource_type = Some(resource_type);
        self.with_tags()
    }

    pub fn nested(mut self, collection: NestedCollection) -> Self {
        self.nested.push(collection);
        self
    }

    pub fn single_block(mut self, attribute: &'static str) -> Self {
        self.single_blocks.push(attribute);
        self
    }

    pub fn lock_on(mut self, attribute: &'static str) -> Self {
        self.lock_on = Some(attribute);
        self
    }

    pub fn identifier_attribute(mut self, attribute: &'static str) -> Self {
        self.identifier_attribute = Some(attribute);
        self
    }

    pub fn expand(mut self, f: ExpandFn) -> Self {
        self.expand = Some(f);
        self
    }

    pub fn flatten(mut self, f: FlattenFn) -> Self {
        self.flatten = Some(f);
        self
    }

    /// Attributes not mapped through the generic property conversion
    pub fn unmapped_attributes(&self) -> Vec<&str> {
        let mut names = vec!["id", "tags", "tags_all"];
        names.extend(self.nested.iter().map(|n| n.attribute));
        names
    }
}

/// Data source answered from Cloud Control, or from dedicated calls when
/// `aws_type_name` is `None`
pub struct DataSourceDefinition {
    pub aws_type_name: Option<&'static str>,
    pub has_tags: bool,
    pub schema: ResourceSchema,
    /// Arguments that only narrow the search and are not remote properties
    pub filter_only: Vec<&'static str>,
    pub matches: Option<MatchFn>,
}

impl DataSourceDefinition {
    pub fn new(aws_type_name: Option<&'static str>, schema: ResourceSchema) -> Self {
        Self {
            aws_type_name,
            has_tags: false,
            schema,
            filter_only: Vec::new(),
            matches: None,
        }
    }

    /// Add a `tags` map that filters candidates and reports their tags
    pub fn with_tags(mut self) -> Self {
        self.has_tags = true;
        self.schema = self
            .schema
            .attribute(AttributeSchema::new("tags", tags_type()).optional_computed());
        self
    }

    pub fn filter_only(mut self, attributes: &[&'static str]) -> Self {
        self.filter_only.extend_from_slice(attributes);
        self
    }

    pub fn matches(mut self, f: MatchFn) -> Self {
        self.matches = Some(f);
        self
    }
}

/// Tags type for AWS resources
pub fn tags_type() -> AttributeType {
    AttributeType::Map(Box::new(AttributeType::String))
}

pub fn string_list() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::String))
}

pub fn string_set() -> AttributeType {
    AttributeType::Set(Box::new(AttributeType::String))
}

/// Remote identifier of the resource
pub fn id_attribute() -> AttributeSchema {
    AttributeSchema::new("id", AttributeType::String).computed()
}

pub fn arn_attribute() -> AttributeSchema {
    AttributeSchema::new("arn", types::arn())
        .computed()
        .with_description("Amazon Resource Name of the resource.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_adds_id_and_tags() {
        let def = ResourceDefinition::new("AWS::EC2::VPC", ResourceSchema::new("aws_vpc"))
            .with_tags();
        assert!(def.has_tags);
        assert!(def.schema.get("id").unwrap().is_read_only());
        assert!(def.schema.get("tags_all").unwrap().is_read_only());
        assert!(!def.schema.get("tags").unwrap().computed);
    }

    #[test]
    fn nested_renames_and_ownership() {
        let route = NestedCollection {
            attribute: "route",
            resource_type: "aws_ec2_client_vpn_route",
            parent_attribute: "client_vpn_endpoint_id",
            renames: &[("subnet_id", "target_vpc_subnet_id")],
            system_owned: Some(("Origin", "associate")),
        };
        assert_eq!(route.child_key("subnet_id"), "target_vpc_subnet_id");
        assert_eq!(route.child_key("description"), "description");

        assert!(route.owns(&serde_json::json!({"Origin": "add-route"})));
        assert!(route.owns(&serde_json::json!({"DestinationCidrBlock": "10.2.0.0/16"})));
        assert!(!route.owns(&serde_json::json!({"Origin": "associate"})));
    }
}
