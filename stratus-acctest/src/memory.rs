//! In-memory cloud
//!
//! [`MemoryCloud`] answers [`CloudApi`] calls from a process-local store so
//! acceptance tests run without AWS. It assigns identifiers, fills the
//! properties AWS would compute for the types the provider registers, drops
//! write-only properties and refuses to delete a resource another one still
//! points at. Associating a subnet with a Client VPN endpoint adds the
//! endpoint route to the subnet's VPC, and disassociating removes it.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde_json::json;
use stratus_core::provider::{BoxFuture, ProviderError, ProviderResult};
use stratus_provider_aws::{AvailabilityZone, CloudApi, ResourceDescription};

/// Account id of the caller, also used in generated ARNs
pub const ACCOUNT_ID: &str = "123456789012";

/// Properties AWS accepts on create but never returns
const WRITE_ONLY_PROPERTIES: &[&str] = &["CertificateBody", "CertificateChain", "PrivateKey", "Password"];

#[derive(Debug, Clone)]
struct StoredResource {
    type_name: String,
    properties: serde_json::Map<String, serde_json::Value>,
}

/// Process-local [`CloudApi`]
pub struct MemoryCloud {
    region: String,
    resources: DashMap<String, StoredResource>,
    counter: AtomicU64,
}

impl MemoryCloud {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            resources: DashMap::new(),
            counter: AtomicU64::new(0),
        }
    }

    /// Number of stored resources of every type
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Identifiers are fixed-width so that sorting them keeps creation order
    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}{n:017x}")
    }

    fn arn(&self, service: &str, resource: &str) -> String {
        format!("arn:aws:{service}:{}:{ACCOUNT_ID}:{resource}", self.region)
    }

    fn zone_id(&self, suffix: usize) -> String {
        let parts: Vec<&str> = self.region.split('-').collect();
        let abbreviation = match parts.as_slice() {
            [area, direction, number] => {
                format!("{area}{}{number}", direction.chars().next().unwrap_or('x'))
            }
            _ => self.region.clone(),
        };
        format!("{abbreviation}-az{suffix}")
    }

    fn property<'a>(
        props: &'a serde_json::Map<String, serde_json::Value>,
        name: &str,
    ) -> Option<&'a str> {
        props.get(name).and_then(|v| v.as_str())
    }

    /// Assign an identifier and fill the computed properties of a new resource
    fn materialize(
        &self,
        type_name: &str,
        props: &mut serde_json::Map<String, serde_json::Value>,
    ) -> ProviderResult<String> {
        let mut fill = |key: &str, value: serde_json::Value| {
            props.entry(key.to_string()).or_insert(value);
        };

        let identifier = match type_name {
            "AWS::EC2::VPC" => {
                fill("InstanceTenancy", json!("default"));
                fill("EnableDnsSupport", json!(true));
                fill("EnableDnsHostnames", json!(false));
                fill("DefaultNetworkAcl", json!(self.next_id("acl-")));
                fill("DefaultSecurityGroup", json!(self.next_id("sg-")));
                fill("Ipv6CidrBlocks", json!([]));
                self.next_id("vpc-")
            }
            "AWS::EC2::Subnet" => {
                fill("AvailabilityZone", json!(format!("{}a", self.region)));
                fill("MapPublicIpOnLaunch", json!(false));
                fill("NetworkAclAssociationId", json!(self.next_id("aclassoc-")));
                let zone_index = Self::property(props, "AvailabilityZone")
                    .and_then(|az| az.chars().last())
                    .map(|c| (c as usize).saturating_sub('a' as usize) + 1)
                    .unwrap_or(1);
                props
                    .entry("AvailabilityZoneId".to_string())
                    .or_insert_with(|| json!(self.zone_id(zone_index)));
                self.next_id("subnet-")
            }
            "AWS::EC2::InternetGateway" => self.next_id("igw-"),
            "AWS::EC2::RouteTable" => self.next_id("rtb-"),
            "AWS::EC2::SecurityGroup" => {
                let identifier = self.next_id("sg-");
                fill("GroupName", json!(format!("stratus-{identifier}")));
                fill(
                    "SecurityGroupEgress",
                    json!([{"IpProtocol": "-1", "CidrIp": "0.0.0.0/0"}]),
                );
                identifier
            }
            "AWS::EC2::ClientVpnEndpoint" => {
                let identifier = self.next_id("cvpn-endpoint-");
                fill(
                    "DnsName",
                    json!(format!("*.{identifier}.prod.clientvpn.{}.amazonaws.com", self.region)),
                );
                fill("Status", json!({"Code": "pending-associate"}));
                fill("Arn", json!(self.arn("ec2", &format!("client-vpn-endpoint/{identifier}"))));
                identifier
            }
            "AWS::EC2::ClientVpnTargetNetworkAssociation" => {
                let vpc_id = Self::property(props, "SubnetId")
                    .and_then(|subnet| self.resources.get(subnet))
                    .and_then(|subnet| Self::property(&subnet.properties, "VpcId").map(str::to_string));
                if let Some(vpc_id) = vpc_id {
                    props.insert("VpcId".to_string(), json!(vpc_id));
                }
                props.insert("Status".to_string(), json!("associated"));
                self.next_id("cvpn-assoc-")
            }
            "AWS::EC2::ClientVpnAuthorizationRule" => self.next_id("cvpn-rule-"),
            "AWS::EC2::ClientVpnRoute" => {
                fill("Origin", json!("add-route"));
                fill("Type", json!("Nat"));
                self.next_id("cvpn-route-")
            }
            "AWS::CertificateManager::Certificate" => {
                let identifier = self.arn(
                    "acm",
                    &format!("certificate/{}", uuid::Uuid::new_v4()),
                );
                fill("DomainName", json!("example.com"));
                fill("Status", json!("ISSUED"));
                fill("Arn", json!(identifier));
                identifier
            }
            "AWS::DirectoryService::MicrosoftAD" => {
                let identifier = self.next_id("d-");
                let short_name = Self::property(props, "Name")
                    .and_then(|name| name.split('.').next())
                    .map(str::to_uppercase)
                    .unwrap_or_default();
                fill("ShortName", json!(short_name));
                fill("Edition", json!("Enterprise"));
                fill("Alias", json!(identifier));
                fill("DnsIpAddresses", json!(["10.0.1.10", "10.0.2.10"]));
                identifier
            }
            "AWS::Logs::LogGroup" => {
                let name = match Self::property(props, "LogGroupName") {
                    Some(name) => name.to_string(),
                    None => self.next_id("stratus-"),
                };
                if self.resources.contains_key(&name) {
                    return Err(ProviderError::new(format!(
                        "ResourceAlreadyExistsException: log group {name} already exists"
                    )));
                }
                props.insert("LogGroupName".to_string(), json!(name));
                props.insert(
                    "Arn".to_string(),
                    json!(self.arn("logs", &format!("log-group:{name}:*"))),
                );
                name
            }
            "AWS::Logs::LogStream" => {
                let group = Self::property(props, "LogGroupName").unwrap_or_default();
                let stream = Self::property(props, "LogStreamName").unwrap_or_default();
                if !self.resources.contains_key(group) {
                    return Err(ProviderError::new(format!(
                        "ResourceNotFoundException: log group {group} does not exist"
                    )));
                }
                format!("{group}|{stream}")
            }
            _ => self.next_id("res-"),
        };

        for name in WRITE_ONLY_PROPERTIES {
            props.remove(*name);
        }
        Ok(identifier)
    }

    fn property_of(&self, identifier: &str, name: &str) -> Option<String> {
        self.resources
            .get(identifier)
            .and_then(|r| Self::property(&r.properties, name).map(str::to_string))
    }

    /// Route to the VPC of an associated subnet, owned by the association
    fn add_association_route(&self, association: &str) {
        let Some(endpoint) = self.property_of(association, "ClientVpnEndpointId") else {
            return;
        };
        let Some(subnet) = self.property_of(association, "SubnetId") else {
            return;
        };
        let Some(cidr) = self
            .property_of(association, "VpcId")
            .and_then(|vpc| self.property_of(&vpc, "CidrBlock"))
        else {
            return;
        };

        let identifier = self.next_id("cvpn-route-");
        log::debug!("memory: {association} added route {identifier} to {cidr}");
        let properties = [
            ("ClientVpnEndpointId", endpoint),
            ("DestinationCidrBlock", cidr),
            ("TargetVpcSubnetId", subnet),
            ("Description", "Default Route".to_string()),
            ("Origin", "associate".to_string()),
            ("Type", "Nat".to_string()),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), json!(value)))
        .collect();
        self.resources.insert(
            identifier,
            StoredResource {
                type_name: "AWS::EC2::ClientVpnRoute".to_string(),
                properties,
            },
        );
    }

    fn remove_association_routes(&self, association: &str) {
        let endpoint = self.property_of(association, "ClientVpnEndpointId");
        let subnet = self.property_of(association, "SubnetId");
        self.resources.retain(|_, r| {
            !(r.type_name == "AWS::EC2::ClientVpnRoute"
                && Self::property(&r.properties, "Origin") == Some("associate")
                && Self::property(&r.properties, "ClientVpnEndpointId") == endpoint.as_deref()
                && Self::property(&r.properties, "TargetVpcSubnetId") == subnet.as_deref())
        });
    }

    /// Address of any other resource with a top-level `*Id` property naming
    /// `identifier`
    fn dependent_of(&self, identifier: &str) -> Option<String> {
        self.resources.iter().find_map(|entry| {
            let depends = entry.key() != identifier
                && entry
                    .properties
                    .iter()
                    .any(|(key, value)| key.ends_with("Id") && value.as_str() == Some(identifier));
            depends.then(|| entry.key().clone())
        })
    }
}

fn patch(
    props: &mut serde_json::Map<String, serde_json::Value>,
    op: &serde_json::Value,
) -> ProviderResult<()> {
    let path = op.get("path").and_then(|v| v.as_str()).unwrap_or_default();
    let key = path.trim_start_matches('/');
    if key.is_empty() || key.contains('/') {
        return Err(ProviderError::new(format!("Unsupported patch path: {path:?}")));
    }
    match op.get("op").and_then(|v| v.as_str()) {
        Some("add") | Some("replace") => {
            let value = op.get("value").cloned().unwrap_or(serde_json::Value::Null);
            props.insert(key.to_string(), value);
        }
        Some("remove") => {
            props.remove(key);
        }
        other => {
            return Err(ProviderError::new(format!("Unsupported patch op: {other:?}")));
        }
    }
    Ok(())
}

impl CloudApi for MemoryCloud {
    fn region(&self) -> &str {
        &self.region
    }

    fn get_resource<'a>(
        &'a self,
        type_name: &'a str,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Option<serde_json::Value>>> {
        Box::pin(async move {
            Ok(self
                .resources
                .get(identifier)
                .filter(|r| r.type_name == type_name)
                .map(|r| serde_json::Value::Object(r.properties.clone())))
        })
    }

    fn create_resource<'a>(
        &'a self,
        type_name: &'a str,
        desired_state: serde_json::Value,
    ) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(async move {
            let serde_json::Value::Object(mut properties) = desired_state else {
                return Err(ProviderError::new(format!(
                    "{type_name}: desired state must be an object"
                )));
            };
            let identifier = self.materialize(type_name, &mut properties)?;
            log::debug!("memory: created {type_name} {identifier}");
            self.resources.insert(
                identifier.clone(),
                StoredResource {
                    type_name: type_name.to_string(),
                    properties,
                },
            );
            if type_name == "AWS::EC2::ClientVpnTargetNetworkAssociation" {
                self.add_association_route(&identifier);
            }
            Ok(identifier)
        })
    }

    fn update_resource<'a>(
        &'a self,
        type_name: &'a str,
        identifier: &'a str,
        patch_ops: Vec<serde_json::Value>,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let mut entry = self
                .resources
                .get_mut(identifier)
                .filter(|r| r.type_name == type_name)
                .ok_or_else(|| {
                    ProviderError::new(format!("NotFound: {type_name} {identifier}"))
                })?;
            let mut properties = entry.properties.clone();
            for op in &patch_ops {
                patch(&mut properties, op)?;
            }
            entry.properties = properties;
            Ok(())
        })
    }

    fn delete_resource<'a>(
        &'a self,
        type_name: &'a str,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            if !self
                .resources
                .get(identifier)
                .is_some_and(|r| r.type_name == type_name)
            {
                return Err(ProviderError::new(format!(
                    "NotFound: {type_name} {identifier}"
                )));
            }
            if let Some(dependent) = self.dependent_of(identifier) {
                return Err(ProviderError::new(format!(
                    "DependencyViolation: {identifier} is still used by {dependent}"
                )));
            }
            if type_name == "AWS::EC2::ClientVpnTargetNetworkAssociation" {
                self.remove_association_routes(identifier);
            }
            self.resources.remove(identifier);
            log::debug!("memory: deleted {type_name} {identifier}");
            Ok(())
        })
    }

    fn list_resources<'a>(
        &'a self,
        type_name: &'a str,
        resource_model: Option<serde_json::Value>,
    ) -> BoxFuture<'a, ProviderResult<Vec<ResourceDescription>>> {
        Box::pin(async move {
            let model = resource_model
                .as_ref()
                .and_then(|m| m.as_object())
                .cloned()
                .unwrap_or_default();
            let mut found: Vec<ResourceDescription> = self
                .resources
                .iter()
                .filter(|entry| entry.type_name == type_name)
                .filter(|entry| {
                    model
                        .iter()
                        .all(|(key, value)| entry.properties.get(key) == Some(value))
                })
                .map(|entry| ResourceDescription {
                    identifier: entry.key().clone(),
                    properties: serde_json::Value::Object(entry.properties.clone()),
                })
                .collect();
            found.sort_by(|a, b| a.identifier.cmp(&b.identifier));
            Ok(found)
        })
    }

    fn availability_zones<'a>(
        &'a self,
        state: Option<&'a str>,
        _all_zones: bool,
    ) -> BoxFuture<'a, ProviderResult<Vec<AvailabilityZone>>> {
        Box::pin(async move {
            if state.is_some_and(|s| s != "available") {
                return Ok(Vec::new());
            }
            Ok(["a", "b", "c"]
                .iter()
                .enumerate()
                .map(|(i, suffix)| AvailabilityZone {
                    name: format!("{}{suffix}", self.region),
                    zone_id: self.zone_id(i + 1),
                    state: "available".to_string(),
                    group_name: self.region.clone(),
                })
                .collect())
        })
    }

    fn caller_account_id(&self) -> BoxFuture<'_, ProviderResult<String>> {
        Box::pin(async move { Ok(ACCOUNT_ID.to_string()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_fills_computed_properties() {
        let cloud = MemoryCloud::new("us-west-2");
        let vpc = cloud
            .create_resource("AWS::EC2::VPC", json!({"CidrBlock": "10.0.0.0/16"}))
            .await
            .unwrap();
        assert!(vpc.starts_with("vpc-"));

        let subnet = cloud
            .create_resource(
                "AWS::EC2::Subnet",
                json!({"VpcId": vpc, "CidrBlock": "10.0.1.0/24", "AvailabilityZone": "us-west-2b"}),
            )
            .await
            .unwrap();
        let props = cloud
            .get_resource("AWS::EC2::Subnet", &subnet)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(props["AvailabilityZoneId"], json!("usw2-az2"));

        let cert = cloud
            .create_resource(
                "AWS::CertificateManager::Certificate",
                json!({"CertificateBody": "pem", "PrivateKey": "key"}),
            )
            .await
            .unwrap();
        let props = cloud
            .get_resource("AWS::CertificateManager::Certificate", &cert)
            .await
            .unwrap()
            .unwrap();
        assert!(props.get("PrivateKey").is_none());
        assert_eq!(props["Arn"], json!(cert));
    }

    #[tokio::test]
    async fn delete_refuses_resources_in_use() {
        let cloud = MemoryCloud::new("us-west-2");
        let vpc = cloud
            .create_resource("AWS::EC2::VPC", json!({"CidrBlock": "10.0.0.0/16"}))
            .await
            .unwrap();
        let subnet = cloud
            .create_resource(
                "AWS::EC2::Subnet",
                json!({"VpcId": vpc, "CidrBlock": "10.0.1.0/24"}),
            )
            .await
            .unwrap();

        let err = cloud.delete_resource("AWS::EC2::VPC", &vpc).await.unwrap_err();
        assert!(err.message.starts_with("DependencyViolation"));

        cloud.delete_resource("AWS::EC2::Subnet", &subnet).await.unwrap();
        cloud.delete_resource("AWS::EC2::VPC", &vpc).await.unwrap();
        assert!(cloud.is_empty());
        assert!(cloud.delete_resource("AWS::EC2::VPC", &vpc).await.is_err());
    }

    #[tokio::test]
    async fn patch_and_list_by_model() {
        let cloud = MemoryCloud::new("us-west-2");
        let endpoint = "cvpn-endpoint-1";
        for cidr in ["192.168.2.0/24", "192.168.1.0/24"] {
            cloud
                .create_resource(
                    "AWS::EC2::ClientVpnRoute",
                    json!({"ClientVpnEndpointId": endpoint, "DestinationCidrBlock": cidr}),
                )
                .await
                .unwrap();
        }
        cloud
            .create_resource(
                "AWS::EC2::ClientVpnRoute",
                json!({"ClientVpnEndpointId": "cvpn-endpoint-2", "DestinationCidrBlock": "10.0.0.0/8"}),
            )
            .await
            .unwrap();

        let routes = cloud
            .list_resources(
                "AWS::EC2::ClientVpnRoute",
                Some(json!({"ClientVpnEndpointId": endpoint})),
            )
            .await
            .unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].properties["DestinationCidrBlock"], json!("192.168.2.0/24"));

        let id = &routes[0].identifier;
        cloud
            .update_resource(
                "AWS::EC2::ClientVpnRoute",
                id,
                vec![
                    json!({"op": "replace", "path": "/Description", "value": "first"}),
                    json!({"op": "remove", "path": "/Type"}),
                ],
            )
            .await
            .unwrap();
        let props = cloud
            .get_resource("AWS::EC2::ClientVpnRoute", id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(props["Description"], json!("first"));
        assert!(props.get("Type").is_none());
    }

    #[tokio::test]
    async fn zones_follow_the_region() {
        let cloud = MemoryCloud::new("eu-central-1");
        let zones = cloud.availability_zones(None, false).await.unwrap();
        let names: Vec<&str> = zones.iter().map(|z| z.name.as_str()).collect();
        assert_eq!(names, ["eu-central-1a", "eu-central-1b", "eu-central-1c"]);
        assert_eq!(zones[0].zone_id, "euc1-az1");
        assert!(cloud.availability_zones(Some("impaired"), false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn associations_own_their_vpc_route() {
        let cloud = MemoryCloud::new("us-west-2");
        let vpc = cloud
            .create_resource("AWS::EC2::VPC", json!({"CidrBlock": "10.0.0.0/16"}))
            .await
            .unwrap();
        let subnet = cloud
            .create_resource(
                "AWS::EC2::Subnet",
                json!({"VpcId": vpc, "CidrBlock": "10.0.1.0/24"}),
            )
            .await
            .unwrap();
        let endpoint = cloud
            .create_resource(
                "AWS::EC2::ClientVpnEndpoint",
                json!({"ClientCidrBlock": "10.20.0.0/22"}),
            )
            .await
            .unwrap();
        let association = cloud
            .create_resource(
                "AWS::EC2::ClientVpnTargetNetworkAssociation",
                json!({"ClientVpnEndpointId": endpoint, "SubnetId": subnet}),
            )
            .await
            .unwrap();

        let model = Some(json!({"ClientVpnEndpointId": endpoint}));
        let routes = cloud
            .list_resources("AWS::EC2::ClientVpnRoute", model.clone())
            .await
            .unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].properties["Origin"], json!("associate"));
        assert_eq!(routes[0].properties["DestinationCidrBlock"], json!("10.0.0.0/16"));
        assert_eq!(routes[0].properties["TargetVpcSubnetId"], json!(subnet));

        cloud
            .delete_resource("AWS::EC2::ClientVpnTargetNetworkAssociation", &association)
            .await
            .unwrap();
        let routes = cloud
            .list_resources("AWS::EC2::ClientVpnRoute", model)
            .await
            .unwrap();
        assert!(routes.is_empty());
        cloud
            .delete_resource("AWS::EC2::ClientVpnEndpoint", &endpoint)
            .await
            .unwrap();
        assert_eq!(cloud.caller_account_id().await.unwrap(), ACCOUNT_ID);
    }
}
