//! AWS provider backed by the Cloud Control API
//!
//! Every registered resource type goes through the same bridge: attributes
//! are mapped to a property document using the type's schema, and the
//! document is sent to Cloud Control. Nested collections (for example the
//! routes of a Client VPN endpoint) are separate remote resources; they are
//! created after their parent, deleted before it, and reconciled by set
//! difference on update while the parent's named lock is held.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use serde_json::json;
use stratus_core::diagnostics::Diagnostics;
use stratus_core::differ::{nested_difference, values_match};
use stratus_core::mutexkv::{MutexKV, MutexKVGuard};
use stratus_core::provider::{BoxFuture, Provider, ProviderError, ProviderResult};
use stratus_core::resource::{Resource, ResourceId, State, Value};
use stratus_core::schema::ResourceSchema;

use crate::client::CloudApi;
use crate::config::{self, Config, REGIONS};
use crate::convert::{from_properties, property_name, to_properties};
use crate::registry::{self, data_source_definition, resource_definition};
use crate::resources::{DataSourceDefinition, NestedCollection, ResourceDefinition};
use crate::tags::{
    DefaultTags, IgnoreTags, filter_ignored, from_tag_list, merge_default_tags, split_remote_tags,
    to_tag_list,
};

/// Named locks shared by every operation of the provider
pub static AWS_MUTEX_KV: LazyLock<MutexKV> = LazyLock::new(MutexKV::new);

/// AWS provider
pub struct AwsProvider {
    api: Box<dyn CloudApi>,
    region: String,
    default_tags: Option<DefaultTags>,
    ignore_tags: Option<IgnoreTags>,
}

impl AwsProvider {
    /// Create a provider over a remote API.
    ///
    /// Forces the registration tables; a duplicate registration aborts here.
    pub fn new(api: Box<dyn CloudApi>, config: &Config) -> Self {
        registry::init();
        Self {
            region: api.region().to_string(),
            api,
            default_tags: config.default_tags.clone(),
            ignore_tags: config.ignore_tags.clone(),
        }
    }

    /// Build a provider from the attributes of a `provider "aws"` block
    pub async fn configure(attributes: &HashMap<String, Value>) -> Result<Self, Diagnostics> {
        let (config, client) = config::configure(attributes).await?;
        Ok(Self::new(Box::new(client), &config))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn definition(&self, id: &ResourceId) -> ProviderResult<ResourceDefinition> {
        resource_definition(&id.resource_type).ok_or_else(|| {
            ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
                .for_resource(id.clone())
        })
    }

    fn child_definition(&self, nested: &NestedCollection) -> ProviderResult<ResourceDefinition> {
        resource_definition(nested.resource_type).ok_or_else(|| {
            ProviderError::new(format!(
                "Unknown resource type for {}: {}",
                nested.attribute, nested.resource_type
            ))
        })
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Read a resource by its remote identifier
    pub async fn read_resource(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        let def = self.definition(id)?;

        let Some(identifier) = identifier else {
            return Ok(State::not_found(id.clone()));
        };

        let Some(props) = self
            .api
            .get_resource(def.aws_type_name, identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
        else {
            log::debug!("{} {} no longer exists", id.address(), identifier);
            return Ok(State::not_found(id.clone()));
        };

        let mut attributes = self.read_attributes(&def, identifier, &props);
        for nested in &def.nested {
            let elements = self
                .read_children(&def, nested, identifier)
                .await
                .map_err(|e| e.for_resource(id.clone()))?;
            attributes.insert(nested.attribute.to_string(), Value::List(elements));
        }

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    /// Create a resource, then the elements of its nested collections
    pub async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let def = self.definition(id)?;

        let props = self.desired_properties(&def, &resource.attributes);
        let identifier = {
            let _guard = self.lock_for(&def, &resource.attributes).await;
            self.api
                .create_resource(def.aws_type_name, serde_json::Value::Object(props))
                .await
                .map_err(|e| e.for_resource(id.clone()))?
        };
        log::debug!("Created {} as {}", id.address(), identifier);

        if let Err(e) = self.create_children(&def, &identifier, resource).await {
            log::warn!(
                "Removing {} {} after a nested element failed to create",
                id.address(),
                identifier
            );
            if let Err(cleanup) = self.delete_resource(id, &identifier).await {
                log::error!(
                    "Could not remove {} {}: {}",
                    id.address(),
                    identifier,
                    cleanup
                );
            }
            return Err(e.for_resource(id.clone()));
        }

        self.read_resource(id, Some(&identifier)).await
    }

    async fn create_children(
        &self,
        def: &ResourceDefinition,
        identifier: &str,
        resource: &Resource,
    ) -> ProviderResult<()> {
        if def.nested.is_empty() {
            return Ok(());
        }
        let _guard = AWS_MUTEX_KV.lock(identifier).await;
        for nested in &def.nested {
            for element in list_of(resource.attributes.get(nested.attribute)) {
                self.create_child(nested, identifier, element).await?;
            }
        }
        Ok(())
    }

    /// Update a resource in place and reconcile its nested collections
    pub async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let def = self.definition(id)?;

        let patch_ops = self.patch_operations(&def, from, to);
        if !patch_ops.is_empty() {
            log::debug!("Patching {}: {}", id.address(), json!(patch_ops));
            self.api
                .update_resource(def.aws_type_name, identifier, patch_ops)
                .await
                .map_err(|e| e.for_resource(id.clone()))?;
        }

        if !def.nested.is_empty() {
            let _guard = AWS_MUTEX_KV.lock(identifier).await;
            // Collections the configuration leaves out may be managed by
            // standalone resources
            let diffs: Vec<_> = def
                .nested
                .iter()
                .filter(|nested| to.attributes.contains_key(nested.attribute))
                .map(|nested| (nested, nested_difference(nested.attribute, to, from, &def.schema)))
                .collect();

            // Later collections may depend on earlier ones (routes need an
            // associated subnet), so removals run in reverse
            for (nested, diff) in diffs.iter().rev() {
                for element in &diff.removed {
                    self.delete_child(nested, element)
                        .await
                        .map_err(|e| e.for_resource(id.clone()))?;
                }
            }
            for (nested, diff) in &diffs {
                for element in &diff.added {
                    self.create_child(nested, identifier, element)
                        .await
                        .map_err(|e| e.for_resource(id.clone()))?;
                }
            }
        }

        self.read_resource(id, Some(identifier)).await
    }

    /// Delete a resource after the elements of its nested collections.
    ///
    /// A resource that is already gone counts as deleted.
    pub async fn delete_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        let def = self.definition(id)?;

        let Some(props) = self
            .api
            .get_resource(def.aws_type_name, identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?
        else {
            log::debug!("{} {} is already deleted", id.address(), identifier);
            return Ok(());
        };

        if !def.nested.is_empty() {
            let _guard = AWS_MUTEX_KV.lock(identifier).await;
            for nested in def.nested.iter().rev() {
                let child_def = self.child_definition(nested)?;
                for (child_identifier, _) in self
                    .list_children(&child_def, nested, identifier)
                    .await
                    .map_err(|e| e.for_resource(id.clone()))?
                {
                    self.api
                        .delete_resource(child_def.aws_type_name, &child_identifier)
                        .await
                        .map_err(|e| e.for_resource(id.clone()))?;
                }
            }
        }

        let lock_key = def.lock_on.and_then(|attribute| {
            let attr = def.schema.get(attribute)?;
            props
                .get(property_name(attr).as_str())
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });
        let _guard = match &lock_key {
            Some(key) => Some(AWS_MUTEX_KV.lock(key).await),
            None => None,
        };

        self.api
            .delete_resource(def.aws_type_name, identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))
    }

    // =========================================================================
    // Property Documents
    // =========================================================================

    /// Property document for the given attribute values, including tags
    fn desired_properties(
        &self,
        def: &ResourceDefinition,
        attributes: &HashMap<String, Value>,
    ) -> serde_json::Map<String, serde_json::Value> {
        let skip = def.unmapped_attributes();
        let mut props = to_properties(&def.schema.attributes, attributes, &skip, &def.single_blocks);
        if let Some(expand) = def.expand {
            expand(attributes, &mut props);
        }

        if def.has_tags {
            let tags = self.desired_tags(attributes);
            if !tags.is_empty() {
                let (path, value) = tags_property(def, &tags);
                props.insert(path.to_string(), value);
            }
        }
        props
    }

    fn desired_tags(&self, attributes: &HashMap<String, Value>) -> BTreeMap<String, String> {
        filter_ignored(
            merge_default_tags(self.default_tags.as_ref(), attributes.get("tags")),
            self.ignore_tags.as_ref(),
        )
    }

    /// JSON patch turning the remote document for `from` into the one for
    /// `to`.
    ///
    /// Keys the configuration no longer sets are removed unless the remote
    /// side computes them. Write-only arguments are never patched.
    fn patch_operations(
        &self,
        def: &ResourceDefinition,
        from: &State,
        to: &Resource,
    ) -> Vec<serde_json::Value> {
        let mut skip = def.unmapped_attributes();
        skip.extend(
            def.schema
                .attributes
                .values()
                .filter(|a| a.write_only)
                .map(|a| a.name.as_str()),
        );

        let current_attrs: HashMap<String, Value> = from
            .attributes
            .iter()
            .filter(|(name, _)| {
                to.attributes.contains_key(*name)
                    || def.schema.get(name).is_some_and(|a| !a.computed)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let mut desired =
            to_properties(&def.schema.attributes, &to.attributes, &skip, &def.single_blocks);
        let mut current =
            to_properties(&def.schema.attributes, &current_attrs, &skip, &def.single_blocks);
        if let Some(expand) = def.expand {
            expand(&to.attributes, &mut desired);
            expand(&current_attrs, &mut current);
        }

        let mut ops = Vec::new();
        for (key, value) in &desired {
            match current.get(key) {
                Some(existing) if existing == value => {}
                Some(_) => ops.push(json!({"op": "replace", "path": format!("/{}", key), "value": value})),
                None => ops.push(json!({"op": "add", "path": format!("/{}", key), "value": value})),
            }
        }
        for key in current.keys().filter(|k| !desired.contains_key(*k)) {
            ops.push(json!({"op": "remove", "path": format!("/{}", key)}));
        }

        if def.has_tags {
            let desired_tags = self.desired_tags(&to.attributes);
            let current_tags = string_map(from.attributes.get("tags_all"));
            if desired_tags != current_tags {
                let (path, value) = tags_property(def, &desired_tags);
                let op = if current_tags.is_empty() { "add" } else { "replace" };
                ops.push(json!({"op": op, "path": format!("/{}", path), "value": value}));
            }
        }

        ops
    }

    /// Attributes of a remote resource, without its nested collections
    fn read_attributes(
        &self,
        def: &ResourceDefinition,
        identifier: &str,
        props: &serde_json::Value,
    ) -> HashMap<String, Value> {
        let skip = def.unmapped_attributes();
        let mut attributes = from_properties(&def.schema.attributes, props, &skip);
        attributes.insert("id".to_string(), Value::string(identifier));

        if let Some(attribute) = def.identifier_attribute {
            attributes
                .entry(attribute.to_string())
                .or_insert_with(|| Value::string(identifier));
        }

        if def.has_tags {
            let (tags, tags_all) = split_remote_tags(
                remote_tags(props),
                self.default_tags.as_ref(),
                self.ignore_tags.as_ref(),
            );
            attributes.insert("tags".to_string(), Value::Map(tags));
            attributes.insert("tags_all".to_string(), Value::Map(tags_all));
        }

        if let Some(flatten) = def.flatten {
            flatten(props, &mut attributes);
        }
        attributes
    }

    // =========================================================================
    // Nested Collections
    // =========================================================================

    /// Remote children of a parent as `(identifier, properties)` pairs
    async fn list_children(
        &self,
        child_def: &ResourceDefinition,
        nested: &NestedCollection,
        parent_identifier: &str,
    ) -> ProviderResult<Vec<(String, serde_json::Value)>> {
        let parent_property = child_def
            .schema
            .get(nested.parent_attribute)
            .map(property_name)
            .ok_or_else(|| {
                ProviderError::new(format!(
                    "{} has no attribute {}",
                    nested.resource_type, nested.parent_attribute
                ))
            })?;

        let mut model = serde_json::Map::new();
        model.insert(parent_property.clone(), json!(parent_identifier));
        let children = self
            .api
            .list_resources(child_def.aws_type_name, Some(serde_json::Value::Object(model)))
            .await?;

        Ok(children
            .into_iter()
            .filter(|c| {
                c.properties.get(parent_property.as_str()).and_then(|v| v.as_str())
                    == Some(parent_identifier)
                    && nested.owns(&c.properties)
            })
            .map(|c| (c.identifier, c.properties))
            .collect())
    }

    /// Children read back as block elements of the parent attribute
    async fn read_children(
        &self,
        def: &ResourceDefinition,
        nested: &NestedCollection,
        parent_identifier: &str,
    ) -> ProviderResult<Vec<Value>> {
        let child_def = self.child_definition(nested)?;
        let Some(block) = def
            .schema
            .get(nested.attribute)
            .and_then(|a| a.attr_type.block())
        else {
            return Ok(Vec::new());
        };

        let children = self
            .list_children(&child_def, nested, parent_identifier)
            .await?;

        Ok(children
            .iter()
            .map(|(identifier, props)| {
                let child = self.read_attributes(&child_def, identifier, props);
                let element = block
                    .attributes
                    .keys()
                    .filter_map(|key| {
                        child
                            .get(nested.child_key(key))
                            .map(|v| (key.clone(), v.clone()))
                    })
                    .collect();
                Value::Map(element)
            })
            .collect())
    }

    async fn create_child(
        &self,
        nested: &NestedCollection,
        parent_identifier: &str,
        element: &Value,
    ) -> ProviderResult<String> {
        let child_def = self.child_definition(nested)?;

        let mut attributes = HashMap::from([(
            nested.parent_attribute.to_string(),
            Value::string(parent_identifier),
        )]);
        if let Some(block) = element.as_map() {
            for (key, value) in block {
                attributes.insert(nested.child_key(key).to_string(), value.clone());
            }
        }
        child_def.schema.apply_defaults(&mut attributes);

        let props = self.desired_properties(&child_def, &attributes);
        let identifier = self
            .api
            .create_resource(child_def.aws_type_name, serde_json::Value::Object(props))
            .await?;
        log::debug!(
            "Created {} {} for {}",
            nested.resource_type,
            identifier,
            parent_identifier
        );
        Ok(identifier)
    }

    async fn delete_child(&self, nested: &NestedCollection, element: &Value) -> ProviderResult<()> {
        let child_def = self.child_definition(nested)?;
        let identifier = element
            .as_map()
            .and_then(|m| m.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::new(format!("{} element has no id", nested.attribute))
            })?;
        self.api
            .delete_resource(child_def.aws_type_name, identifier)
            .await
    }

    /// Lock held while creating a resource whose definition names one
    async fn lock_for(
        &self,
        def: &ResourceDefinition,
        attributes: &HashMap<String, Value>,
    ) -> Option<MutexKVGuard> {
        let key = def
            .lock_on
            .and_then(|attribute| attributes.get(attribute))
            .and_then(Value::as_str)?;
        Some(AWS_MUTEX_KV.lock(key).await)
    }

    // =========================================================================
    // Data Sources
    // =========================================================================

    /// Evaluate a data source query
    pub async fn read_data(&self, query: &Resource) -> ProviderResult<State> {
        let id = &query.id;
        let def = data_source_definition(&id.resource_type).ok_or_else(|| {
            ProviderError::new(format!("Unknown data source: {}", id.resource_type))
                .for_resource(id.clone())
        })?;

        let attributes = match (id.resource_type.as_str(), def.aws_type_name) {
            ("aws_region", _) => self.read_region(&query.attributes)?,
            ("aws_availability_zones", _) => self.read_availability_zones(&query.attributes).await?,
            ("aws_default_tags", _) => self.read_default_tags(),
            (_, Some(type_name)) => self.search(&def, type_name, &query.attributes).await?,
            (other, None) => {
                return Err(ProviderError::new(format!("No reader for data source {}", other)));
            }
        };
        let identifier = attributes
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    fn read_region(&self, query: &HashMap<String, Value>) -> ProviderResult<HashMap<String, Value>> {
        let name = query
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&self.region)
            .to_string();
        let endpoint = format!("ec2.{}.amazonaws.com", name);

        if !REGIONS.contains(&name.as_str()) && name != self.region {
            return Err(ProviderError::new(format!("region {} not found", name)));
        }
        if let Some(wanted) = query.get("endpoint").and_then(Value::as_str)
            && wanted != endpoint
        {
            return Err(ProviderError::new(format!(
                "region not found for endpoint {}",
                wanted
            )));
        }

        Ok(HashMap::from([
            ("id".to_string(), Value::string(&name)),
            ("name".to_string(), Value::string(&name)),
            ("endpoint".to_string(), Value::String(endpoint)),
        ]))
    }

    /// Default tags of the provider, without the ignored keys
    fn read_default_tags(&self) -> HashMap<String, Value> {
        let tags = filter_ignored(
            self.default_tags
                .as_ref()
                .map(|d| d.tags.clone())
                .unwrap_or_default(),
            self.ignore_tags.as_ref(),
        );
        HashMap::from([
            ("id".to_string(), Value::string("aws")),
            (
                "tags".to_string(),
                Value::Map(
                    tags.into_iter()
                        .map(|(k, v)| (k, Value::String(v)))
                        .collect(),
                ),
            ),
        ])
    }

    async fn read_availability_zones(
        &self,
        query: &HashMap<String, Value>,
    ) -> ProviderResult<HashMap<String, Value>> {
        let state = query.get("state").and_then(Value::as_str);
        let all_zones = query
            .get("all_availability_zones")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let exclude_names = strings(query.get("exclude_names"));
        let exclude_zone_ids = strings(query.get("exclude_zone_ids"));

        let mut zones = self.api.availability_zones(state, all_zones).await?;
        zones.retain(|z| !exclude_names.contains(&z.name) && !exclude_zone_ids.contains(&z.zone_id));
        zones.sort_by(|a, b| a.name.cmp(&b.name));

        let mut group_names: Vec<&str> = zones.iter().map(|z| z.group_name.as_str()).collect();
        group_names.sort();
        group_names.dedup();

        let mut attributes = query.clone();
        attributes.insert("id".to_string(), Value::string(&self.region));
        attributes.insert(
            "names".to_string(),
            Value::List(zones.iter().map(|z| Value::string(&z.name)).collect()),
        );
        attributes.insert(
            "zone_ids".to_string(),
            Value::List(zones.iter().map(|z| Value::string(&z.zone_id)).collect()),
        );
        attributes.insert(
            "group_names".to_string(),
            Value::List(group_names.into_iter().map(Value::string).collect()),
        );
        Ok(attributes)
    }

    /// Find the single remote resource matching every configured argument
    async fn search(
        &self,
        def: &DataSourceDefinition,
        type_name: &str,
        query: &HashMap<String, Value>,
    ) -> ProviderResult<HashMap<String, Value>> {
        let candidates: Vec<(String, serde_json::Value)> =
            match query.get("id").and_then(Value::as_str) {
                Some(identifier) => self
                    .api
                    .get_resource(type_name, identifier)
                    .await?
                    .map(|props| (identifier.to_string(), props))
                    .into_iter()
                    .collect(),
                None => self
                    .api
                    .list_resources(type_name, None)
                    .await?
                    .into_iter()
                    .map(|d| (d.identifier, d.properties))
                    .collect(),
            };

        let mut skip = vec!["id", "tags"];
        skip.extend(def.filter_only.iter().copied());

        let wanted_tags = string_map(query.get("tags"));
        let mut matching: Vec<HashMap<String, Value>> = candidates
            .into_iter()
            .filter_map(|(identifier, props)| {
                let mut attributes = from_properties(&def.schema.attributes, &props, &skip);
                let filters_match = query
                    .iter()
                    .filter(|(name, _)| !skip.contains(&name.as_str()))
                    .all(|(name, wanted)| {
                        let attr_type = def.schema.get(name).map(|a| &a.attr_type);
                        attributes
                            .get(name)
                            .is_some_and(|actual| values_match(wanted, actual, attr_type))
                    });
                if !filters_match {
                    return None;
                }

                if def.has_tags {
                    let tags = filter_ignored(remote_tags(&props), self.ignore_tags.as_ref());
                    if wanted_tags.iter().any(|(k, v)| tags.get(k) != Some(v)) {
                        return None;
                    }
                    attributes.insert(
                        "tags".to_string(),
                        Value::Map(
                            tags.into_iter()
                                .map(|(k, v)| (k, Value::String(v)))
                                .collect(),
                        ),
                    );
                }

                if let Some(matches) = def.matches
                    && !matches(query, &props)
                {
                    return None;
                }

                for name in &def.filter_only {
                    if let Some(value) = query.get(*name) {
                        attributes.insert(name.to_string(), value.clone());
                    }
                }
                attributes.insert("id".to_string(), Value::String(identifier));
                Some(attributes)
            })
            .collect();

        let most_recent = query
            .get("most_recent")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        match matching.len() {
            0 => Err(ProviderError::new(format!(
                "no matching {} found",
                def.schema.resource_type
            ))),
            1 => Ok(matching.remove(0)),
            n if most_recent => Ok(matching.remove(n - 1)),
            n => Err(ProviderError::new(format!(
                "{} {} matched; use additional constraints to reduce matches to a single one",
                n, def.schema.resource_type
            ))),
        }
    }
}

/// Tags property of a definition: `Tags`, or `TagSpecifications` for EC2
/// types tagged on creation
fn tags_property(
    def: &ResourceDefinition,
    tags: &BTreeMap<String, String>,
) -> (&'static str, serde_json::Value) {
    match def.tag_resource_type {
        Some(resource_type) => (
            "TagSpecifications",
            json!([{"ResourceType": resource_type, "Tags": to_tag_list(tags)}]),
        ),
        None => ("Tags", json!(to_tag_list(tags))),
    }
}

fn remote_tags(props: &serde_json::Value) -> BTreeMap<String, String> {
    if let Some(tags) = props.get("Tags").and_then(|v| v.as_array()) {
        return from_tag_list(tags);
    }
    props
        .pointer("/TagSpecifications/0/Tags")
        .and_then(|v| v.as_array())
        .map(|tags| from_tag_list(tags))
        .unwrap_or_default()
}

fn list_of(value: Option<&Value>) -> &[Value] {
    value.and_then(Value::as_list).unwrap_or(&[])
}

fn strings(value: Option<&Value>) -> Vec<String> {
    list_of(value)
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_map)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn resource_schema(&self, resource_type: &str) -> Option<ResourceSchema> {
        resource_definition(resource_type).map(|d| d.schema)
    }

    fn data_source_schema(&self, data_type: &str) -> Option<ResourceSchema> {
        data_source_definition(data_type).map(|d| d.schema)
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(|s| s.to_string());
        Box::pin(async move { self.read_resource(&id, identifier.as_deref()).await })
    }

    fn read_data_source(&self, query: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let query = query.clone();
        Box::pin(async move {
            let id = query.id.clone();
            self.read_data(&query).await.map_err(|e| e.for_resource(id))
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(&resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(&id, &identifier, &from, &to).await })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.delete_resource(&id, &identifier).await })
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::FakeApi;

    use super::*;

    fn provider_with(config: Config) -> (AwsProvider, FakeApi) {
        let api = FakeApi::default();
        (AwsProvider::new(Box::new(api.clone()), &config), api)
    }

    fn tagged_config() -> Config {
        Config {
            default_tags: Some(DefaultTags {
                tags: BTreeMap::from([("Env".to_string(), "test".to_string())]),
            }),
            ..Config::default()
        }
    }

    fn endpoint(name: &str) -> Resource {
        let log_options = Value::List(vec![Value::Map(HashMap::from([(
            "enabled".to_string(),
            Value::Bool(false),
        )]))]);
        let auth = Value::List(vec![Value::Map(HashMap::from([
            ("type".to_string(), Value::string("certificate-authentication")),
            (
                "root_certificate_chain_arn".to_string(),
                Value::string("arn:aws:acm:us-west-2:123456789012:certificate/root"),
            ),
        ]))]);
        Resource::new("aws_ec2_client_vpn_endpoint", name)
            .with_attribute(
                "server_certificate_arn",
                Value::string("arn:aws:acm:us-west-2:123456789012:certificate/server"),
            )
            .with_attribute("client_cidr_block", Value::string("10.0.0.0/16"))
            .with_attribute("authentication_options", auth)
            .with_attribute("connection_log_options", log_options)
    }

    fn route(cidr: &str) -> Value {
        Value::Map(HashMap::from([
            ("destination_network_cidr".to_string(), Value::string(cidr)),
            ("subnet_id".to_string(), Value::string("subnet-1")),
        ]))
    }

    #[tokio::test]
    async fn create_sends_tags_and_reads_back() {
        let (provider, api) = provider_with(tagged_config());
        let vpc = Resource::new("aws_vpc", "test")
            .with_attribute("cidr_block", Value::string("10.1.0.0/16"))
            .with_attribute(
                "tags",
                Value::Map(HashMap::from([("Name".to_string(), Value::string("main"))])),
            );

        let state = provider.create_resource(&vpc).await.unwrap();
        let identifier = state.identifier.clone().unwrap();
        assert_eq!(state.attributes["id"], Value::string(&identifier));
        assert_eq!(state.attributes["cidr_block"], Value::string("10.1.0.0/16"));

        let own = state.attributes["tags"].as_map().unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(state.attributes["tags_all"].as_map().unwrap().len(), 2);

        let stored = api.resources.lock().unwrap()[&identifier].1.clone();
        assert_eq!(stored["CidrBlock"], json!("10.1.0.0/16"));
        assert_eq!(
            stored["Tags"],
            json!([{"Key": "Env", "Value": "test"}, {"Key": "Name", "Value": "main"}])
        );
    }

    #[tokio::test]
    async fn read_of_missing_resource_is_not_found() {
        let (provider, _api) = provider_with(Config::default());
        let id = ResourceId::new("aws_vpc", "gone");
        assert!(!provider.read_resource(&id, None).await.unwrap().exists);
        assert!(!provider.read_resource(&id, Some("vpc-0")).await.unwrap().exists);

        let unknown = ResourceId::new("aws_nope", "x");
        assert!(provider.read_resource(&unknown, Some("x")).await.is_err());
    }

    #[tokio::test]
    async fn endpoint_children_follow_the_parent() {
        let (provider, api) = provider_with(Config::default());
        let desired = endpoint("test").with_attribute(
            "route",
            Value::List(vec![route("10.2.0.0/16"), route("10.3.0.0/16")]),
        );

        let created = provider.create_resource(&desired).await.unwrap();
        let identifier = created.identifier.clone().unwrap();
        let routes = created.attributes["route"].as_list().unwrap();
        assert_eq!(routes.len(), 2);
        let stored = api.resources.lock().unwrap()[&identifier].1.clone();
        assert_eq!(
            stored["TagSpecifications"],
            serde_json::Value::Null,
            "no tags configured"
        );
        assert_eq!(stored["ConnectionLogOptions"], json!({"Enabled": false}));

        let fewer = endpoint("test").with_attribute("route", Value::List(vec![route("10.3.0.0/16")]));
        let updated = provider
            .update_resource(&desired.id, &identifier, &created, &fewer)
            .await
            .unwrap();
        assert_eq!(updated.attributes["route"].as_list().unwrap().len(), 1);
        assert_eq!(
            updated.attributes["route"].as_list().unwrap()[0]
                .as_map()
                .unwrap()["destination_network_cidr"],
            Value::string("10.3.0.0/16")
        );

        provider.delete_resource(&desired.id, &identifier).await.unwrap();
        let calls = api.calls();
        let deletes: Vec<&String> = calls.iter().filter(|c| c.starts_with("delete")).collect();
        assert_eq!(deletes.len(), 3);
        assert!(deletes[2].ends_with(&identifier));
        assert!(api.resources.lock().unwrap().is_empty());
    }

    #[test]
    fn patch_replaces_changed_and_removes_unset() {
        let (provider, _api) = provider_with(Config::default());
        let def = resource_definition("aws_ec2_client_vpn_endpoint").unwrap();

        let mut from_attrs = endpoint("test").attributes;
        from_attrs.insert("description".to_string(), Value::string("old"));
        from_attrs.insert(
            "dns_servers".to_string(),
            Value::List(vec![Value::string("8.8.8.8")]),
        );
        from_attrs.insert("dns_name".to_string(), Value::string("*.cvpn.example"));
        from_attrs.insert("tags_all".to_string(), Value::Map(HashMap::new()));
        let from = State::existing(ResourceId::new("aws_ec2_client_vpn_endpoint", "test"), from_attrs)
            .with_identifier("cvpn-endpoint-1");

        let to = endpoint("test")
            .with_attribute("description", Value::string("new"))
            .with_attribute(
                "tags",
                Value::Map(HashMap::from([("Name".to_string(), Value::string("vpn"))])),
            );

        let ops = provider.patch_operations(&def, &from, &to);
        assert!(ops.contains(&json!({"op": "replace", "path": "/Description", "value": "new"})));
        assert!(ops.contains(&json!({"op": "remove", "path": "/DnsServers"})));
        assert!(ops.contains(&json!({
            "op": "add",
            "path": "/TagSpecifications",
            "value": [{"ResourceType": "client-vpn-endpoint", "Tags": [{"Key": "Name", "Value": "vpn"}]}],
        })));
        assert!(!ops.iter().any(|op| op["path"] == json!("/DnsName")));
        assert_eq!(ops.len(), 3);
    }

    #[tokio::test]
    async fn availability_zones_are_sorted_and_filtered() {
        let (provider, _api) = provider_with(Config::default());
        let query = Resource::data("aws_availability_zones", "available").with_attribute(
            "exclude_zone_ids",
            Value::List(vec![Value::string("usw2-az2")]),
        );
        let state = provider.read_data(&query).await.unwrap();
        assert_eq!(
            state.attributes["names"],
            Value::List(vec![Value::string("us-west-2a")])
        );
        assert_eq!(state.identifier.as_deref(), Some("us-west-2"));
    }

    #[tokio::test]
    async fn data_source_search_needs_a_single_match() {
        let (provider, _api) = provider_with(Config::default());
        for cidr in ["10.1.0.0/16", "10.2.0.0/16"] {
            let vpc = Resource::new("aws_vpc", "v").with_attribute("cidr_block", Value::string(cidr));
            provider.create_resource(&vpc).await.unwrap();
        }

        let all = Resource::data("aws_vpc", "any");
        assert!(provider.read_data(&all).await.is_err());

        let one = Resource::data("aws_vpc", "one")
            .with_attribute("cidr_block", Value::string("10.2.0.0/16"));
        let state = provider.read_data(&one).await.unwrap();
        assert_eq!(state.attributes["cidr_block"], Value::string("10.2.0.0/16"));

        let region = provider
            .read_data(&Resource::data("aws_region", "current"))
            .await
            .unwrap();
        assert_eq!(
            region.attributes["endpoint"],
            Value::string("ec2.us-west-2.amazonaws.com")
        );
    }

    fn association(subnet: &str) -> Value {
        Value::Map(HashMap::from([(
            "subnet_id".to_string(),
            Value::string(subnet),
        )]))
    }

    #[tokio::test]
    async fn unconfigured_collections_are_left_to_standalone_resources() {
        let (provider, api) = provider_with(Config::default());
        let desired = endpoint("test").with_attribute("route", Value::List(vec![route("10.2.0.0/16")]));
        let created = provider.create_resource(&desired).await.unwrap();
        let identifier = created.identifier.clone().unwrap();

        let standalone = Resource::new("aws_ec2_client_vpn_network_association", "extra")
            .with_attribute("client_vpn_endpoint_id", Value::string(&identifier))
            .with_attribute("subnet_id", Value::string("subnet-1"));
        let association = provider.create_resource(&standalone).await.unwrap();
        let association_id = association.identifier.clone().unwrap();

        let refreshed = provider
            .read_resource(&desired.id, Some(&identifier))
            .await
            .unwrap();
        assert_eq!(
            refreshed.attributes["network_association"].as_list().unwrap().len(),
            1
        );

        let updated = provider
            .update_resource(&desired.id, &identifier, &refreshed, &desired)
            .await
            .unwrap();
        assert_eq!(
            updated.attributes["network_association"].as_list().unwrap().len(),
            1
        );
        assert!(api.resources.lock().unwrap().contains_key(&association_id));
        assert!(!api.calls().iter().any(|c| c.starts_with("delete")));
    }

    #[tokio::test]
    async fn routes_added_by_associations_are_not_elements() {
        let (provider, api) = provider_with(Config::default());
        let desired = endpoint("test").with_attribute("route", Value::List(vec![route("10.2.0.0/16")]));
        let created = provider.create_resource(&desired).await.unwrap();
        let identifier = created.identifier.clone().unwrap();

        api.resources.lock().unwrap().insert(
            "rtb-associate".to_string(),
            (
                "AWS::EC2::ClientVpnRoute".to_string(),
                json!({
                    "ClientVpnEndpointId": identifier,
                    "DestinationCidrBlock": "10.1.0.0/16",
                    "TargetVpcSubnetId": "subnet-1",
                    "Origin": "associate",
                }),
            ),
        );

        let state = provider
            .read_resource(&desired.id, Some(&identifier))
            .await
            .unwrap();
        let routes = state.attributes["route"].as_list().unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(
            routes[0].as_map().unwrap()["destination_network_cidr"],
            Value::string("10.2.0.0/16")
        );

        let no_routes = endpoint("test").with_attribute("route", Value::List(vec![]));
        provider
            .update_resource(&desired.id, &identifier, &state, &no_routes)
            .await
            .unwrap();
        assert!(api.resources.lock().unwrap().contains_key("rtb-associate"));
    }

    #[tokio::test]
    async fn failed_nested_create_removes_what_was_created() {
        let (provider, api) = provider_with(Config::default());
        api.fail_creates_of("AWS::EC2::ClientVpnRoute");
        let desired = endpoint("test")
            .with_attribute("network_association", Value::List(vec![association("subnet-1")]))
            .with_attribute("route", Value::List(vec![route("10.2.0.0/16")]));

        let err = provider.create_resource(&desired).await.unwrap_err();
        assert!(err.message.contains("rejected"));
        assert_eq!(err.resource_id, Some(desired.id.clone()));

        assert!(api.resources.lock().unwrap().is_empty());
        let calls = api.calls();
        assert_eq!(
            calls.last().map(String::as_str),
            Some("delete AWS::EC2::ClientVpnEndpoint res-1")
        );
        assert!(calls.contains(&"delete AWS::EC2::ClientVpnTargetNetworkAssociation res-2".to_string()));
    }

    #[tokio::test]
    async fn deleting_a_vanished_resource_succeeds() {
        let (provider, api) = provider_with(Config::default());
        let id = ResourceId::new("aws_ec2_client_vpn_endpoint", "gone");
        provider.delete_resource(&id, "cvpn-endpoint-0").await.unwrap();
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn default_tags_data_source_reports_provider_tags() {
        let (provider, _api) = provider_with(tagged_config());
        let state = provider
            .read_data(&Resource::data("aws_default_tags", "current"))
            .await
            .unwrap();
        assert_eq!(state.identifier.as_deref(), Some("aws"));
        assert_eq!(
            state.attributes["tags"],
            Value::Map(HashMap::from([("Env".to_string(), Value::string("test"))]))
        );

        let (untagged, _api) = provider_with(Config::default());
        let state = untagged
            .read_data(&Resource::data("aws_default_tags", "current"))
            .await
            .unwrap();
        assert_eq!(state.attributes["tags"], Value::Map(HashMap::new()));
    }
}
