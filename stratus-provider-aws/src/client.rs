//! Remote API access
//!
//! [`CloudApi`] is the narrow surface the provider needs from AWS: the
//! generic Cloud Control resource operations, the few EC2 calls that have
//! no Cloud Control counterpart, and the STS caller identity. [`AwsClient`] implements it against
//! the real service.

use std::time::Duration;

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudcontrol::Client as CloudControlClient;
use aws_sdk_cloudcontrol::config::Credentials;
use aws_sdk_cloudcontrol::types::{OperationStatus, ProgressEvent};
use aws_sdk_ec2::Client as Ec2Client;
use aws_sdk_ec2::types::Filter;
use aws_sdk_sts::Client as StsClient;
use stratus_core::provider::{BoxFuture, ProviderError, ProviderResult};

use crate::config::Config;

const MAX_POLL_ATTEMPTS: u32 = 120;
const POLL_DELAY: Duration = Duration::from_secs(5);

/// An availability zone as reported by EC2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityZone {
    pub name: String,
    pub zone_id: String,
    pub state: String,
    pub group_name: String,
}

/// A resource returned by a list call: its primary identifier and properties
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescription {
    pub identifier: String,
    pub properties: serde_json::Value,
}

/// Remote operations used by the provider
pub trait CloudApi: Send + Sync {
    /// Region requests are sent to
    fn region(&self) -> &str;

    /// Properties of a resource, or `None` if it does not exist
    fn get_resource<'a>(
        &'a self,
        type_name: &'a str,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Option<serde_json::Value>>>;

    /// Create a resource and wait for completion. Returns its identifier.
    fn create_resource<'a>(
        &'a self,
        type_name: &'a str,
        desired_state: serde_json::Value,
    ) -> BoxFuture<'a, ProviderResult<String>>;

    /// Apply a JSON patch and wait for completion
    fn update_resource<'a>(
        &'a self,
        type_name: &'a str,
        identifier: &'a str,
        patch_ops: Vec<serde_json::Value>,
    ) -> BoxFuture<'a, ProviderResult<()>>;

    /// Delete a resource and wait for completion
    fn delete_resource<'a>(
        &'a self,
        type_name: &'a str,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>>;

    /// Every resource of a type, optionally scoped by a partial model
    /// (e.g., `{"ClientVpnEndpointId": "cvpn-endpoint-1"}`)
    fn list_resources<'a>(
        &'a self,
        type_name: &'a str,
        resource_model: Option<serde_json::Value>,
    ) -> BoxFuture<'a, ProviderResult<Vec<ResourceDescription>>>;

    /// Availability zones of the region, optionally filtered by state
    fn availability_zones<'a>(
        &'a self,
        state: Option<&'a str>,
        all_zones: bool,
    ) -> BoxFuture<'a, ProviderResult<Vec<AvailabilityZone>>>;

    /// Account the credentials belong to
    fn caller_account_id(&self) -> BoxFuture<'_, ProviderResult<String>>;
}

/// AWS API client
pub struct AwsClient {
    cloudcontrol: CloudControlClient,
    ec2: Ec2Client,
    sts: StsClient,
    region: String,
}

impl AwsClient {
    /// Load SDK configuration from the provider settings.
    ///
    /// Static credentials and a profile are passed to the SDK loader; every
    /// other credential source is left to its default chain.
    pub async fn from_config(config: &Config) -> Self {
        let max_attempts = u32::try_from(config.max_retries.max(0))
            .unwrap_or(u32::MAX)
            .saturating_add(1);

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .retry_config(RetryConfig::standard().with_max_attempts(max_attempts));

        if !config.profile.is_empty() {
            loader = loader.profile_name(&config.profile);
        }
        if !config.access_key.is_empty() {
            let token = (!config.token.is_empty()).then(|| config.token.clone());
            loader = loader.credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                token,
                None,
                "stratus-provider",
            ));
        }
        if !config.shared_credentials_file.is_empty() {
            log::warn!(
                "shared_credentials_file {:?} is not read; set AWS_SHARED_CREDENTIALS_FILE instead",
                config.shared_credentials_file
            );
        }
        if config.assume_role.is_some() {
            log::warn!("assume_role is not resolved by this provider; using base credentials");
        }
        if config.insecure {
            log::warn!("insecure is set but TLS verification stays enabled");
        }

        let sdk_config = loader.load().await;

        let mut cloudcontrol_config = aws_sdk_cloudcontrol::config::Builder::from(&sdk_config);
        if let Some(url) = custom_endpoint(config, "cloudcontrolapi") {
            cloudcontrol_config = cloudcontrol_config.endpoint_url(url);
        }
        let mut ec2_config = aws_sdk_ec2::config::Builder::from(&sdk_config);
        if let Some(url) = custom_endpoint(config, "ec2") {
            ec2_config = ec2_config.endpoint_url(url);
        }
        let mut sts_config = aws_sdk_sts::config::Builder::from(&sdk_config);
        if let Some(url) = custom_endpoint(config, "sts") {
            sts_config = sts_config.endpoint_url(url);
        }

        Self {
            cloudcontrol: CloudControlClient::from_conf(cloudcontrol_config.build()),
            ec2: Ec2Client::from_conf(ec2_config.build()),
            sts: StsClient::from_conf(sts_config.build()),
            region: config.region.clone(),
        }
    }

    /// Account id of the calling identity using STS
    pub async fn sts_caller_account_id(&self) -> ProviderResult<String> {
        log::debug!("GetCallerIdentity");
        let response = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| ProviderError::new(format!("Failed to get caller identity: {:?}", e)))?;

        response
            .account()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::new("No account returned for the caller identity"))
    }

    /// Get a resource by identifier using Cloud Control API
    pub async fn cc_get_resource(
        &self,
        type_name: &str,
        identifier: &str,
    ) -> ProviderResult<Option<serde_json::Value>> {
        log::debug!("GetResource {} {}", type_name, identifier);
        let result = self
            .cloudcontrol
            .get_resource()
            .type_name(type_name)
            .identifier(identifier)
            .send()
            .await;

        match result {
            Ok(response) => {
                if let Some(desc) = response.resource_description()
                    && let Some(props_str) = desc.properties()
                {
                    let props: serde_json::Value = serde_json::from_str(props_str)
                        .map_err(|e| {
                            ProviderError::new(format!(
                                "Invalid properties returned for {}",
                                type_name
                            ))
                            .with_cause(e)
                        })?;
                    Ok(Some(props))
                } else {
                    Ok(None)
                }
            }
            Err(e) => {
                let err_str = format!("{:?}", e);
                if err_str.contains("ResourceNotFound") || err_str.contains("NotFound") {
                    Ok(None)
                } else {
                    Err(ProviderError::new(format!(
                        "Failed to get resource: {:?}",
                        e
                    )))
                }
            }
        }
    }

    /// Create a resource using Cloud Control API
    pub async fn cc_create_resource(
        &self,
        type_name: &str,
        desired_state: serde_json::Value,
    ) -> ProviderResult<String> {
        log::debug!("CreateResource {} {}", type_name, desired_state);
        let result = self
            .cloudcontrol
            .create_resource()
            .type_name(type_name)
            .desired_state(desired_state.to_string())
            .send()
            .await
            .map_err(|e| ProviderError::new(format!("Failed to create resource: {:?}", e)))?;

        let request_token = result
            .progress_event()
            .and_then(|p| p.request_token())
            .ok_or_else(|| ProviderError::new("No request token returned"))?;

        self.wait_for_operation(request_token).await
    }

    /// Update a resource using Cloud Control API
    pub async fn cc_update_resource(
        &self,
        type_name: &str,
        identifier: &str,
        patch_ops: Vec<serde_json::Value>,
    ) -> ProviderResult<()> {
        if patch_ops.is_empty() {
            return Ok(());
        }

        let patch_document = serde_json::to_string(&patch_ops).map_err(|e| {
            ProviderError::new("Failed to build patch document").with_cause(e)
        })?;
        log::debug!("UpdateResource {} {} {}", type_name, identifier, patch_document);

        let result = self
            .cloudcontrol
            .update_resource()
            .type_name(type_name)
            .identifier(identifier)
            .patch_document(patch_document)
            .send()
            .await
            .map_err(|e| ProviderError::new(format!("Failed to update resource: {:?}", e)))?;

        if let Some(request_token) = result.progress_event().and_then(|p| p.request_token()) {
            self.wait_for_operation(request_token).await?;
        }

        Ok(())
    }

    /// Delete a resource using Cloud Control API
    pub async fn cc_delete_resource(&self, type_name: &str, identifier: &str) -> ProviderResult<()> {
        log::debug!("DeleteResource {} {}", type_name, identifier);
        let result = self
            .cloudcontrol
            .delete_resource()
            .type_name(type_name)
            .identifier(identifier)
            .send()
            .await
            .map_err(|e| ProviderError::new(format!("Failed to delete resource: {:?}", e)))?;

        if let Some(request_token) = result.progress_event().and_then(|p| p.request_token()) {
            self.wait_for_operation(request_token).await?;
        }

        Ok(())
    }

    /// List resources using Cloud Control API, following pagination
    pub async fn cc_list_resources(
        &self,
        type_name: &str,
        resource_model: Option<serde_json::Value>,
    ) -> ProviderResult<Vec<ResourceDescription>> {
        let model = resource_model.map(|m| m.to_string());
        let mut descriptions = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            log::debug!("ListResources {} (token: {:?})", type_name, next_token);
            let response = self
                .cloudcontrol
                .list_resources()
                .type_name(type_name)
                .set_resource_model(model.clone())
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| ProviderError::new(format!("Failed to list resources: {:?}", e)))?;

            for desc in response.resource_descriptions() {
                let Some(identifier) = desc.identifier() else {
                    continue;
                };
                let properties = match desc.properties() {
                    Some(p) => serde_json::from_str(p).map_err(|e| {
                        ProviderError::new(format!(
                            "Invalid properties returned for {}",
                            type_name
                        ))
                        .with_cause(e)
                    })?,
                    None => serde_json::Value::Null,
                };
                descriptions.push(ResourceDescription {
                    identifier: identifier.to_string(),
                    properties,
                });
            }

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(descriptions)
    }

    /// Describe availability zones using the EC2 API
    pub async fn ec2_availability_zones(
        &self,
        state: Option<&str>,
        all_zones: bool,
    ) -> ProviderResult<Vec<AvailabilityZone>> {
        let filters = state.map(|s| vec![Filter::builder().name("state").values(s).build()]);

        let response = self
            .ec2
            .describe_availability_zones()
            .set_filters(filters)
            .all_availability_zones(all_zones)
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!("Failed to describe availability zones: {:?}", e))
            })?;

        Ok(response
            .availability_zones()
            .iter()
            .map(|az| AvailabilityZone {
                name: az.zone_name().unwrap_or_default().to_string(),
                zone_id: az.zone_id().unwrap_or_default().to_string(),
                state: az
                    .state()
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
                group_name: az.group_name().unwrap_or_default().to_string(),
            })
            .collect())
    }

    /// Wait for a Cloud Control operation to complete
    async fn wait_for_operation(&self, request_token: &str) -> ProviderResult<String> {
        for _ in 0..MAX_POLL_ATTEMPTS {
            let status = self
                .cloudcontrol
                .get_resource_request_status()
                .request_token(request_token)
                .send()
                .await
                .map_err(|e| {
                    ProviderError::new(format!("Failed to get operation status: {:?}", e))
                })?;

            if let Some(outcome) = operation_outcome(status.progress_event()) {
                return outcome;
            }
            tokio::time::sleep(POLL_DELAY).await;
        }

        Err(ProviderError::new("Operation timed out"))
    }
}

impl CloudApi for AwsClient {
    fn region(&self) -> &str {
        &self.region
    }

    fn get_resource<'a>(
        &'a self,
        type_name: &'a str,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Option<serde_json::Value>>> {
        Box::pin(self.cc_get_resource(type_name, identifier))
    }

    fn create_resource<'a>(
        &'a self,
        type_name: &'a str,
        desired_state: serde_json::Value,
    ) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(self.cc_create_resource(type_name, desired_state))
    }

    fn update_resource<'a>(
        &'a self,
        type_name: &'a str,
        identifier: &'a str,
        patch_ops: Vec<serde_json::Value>,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(self.cc_update_resource(type_name, identifier, patch_ops))
    }

    fn delete_resource<'a>(
        &'a self,
        type_name: &'a str,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(self.cc_delete_resource(type_name, identifier))
    }

    fn list_resources<'a>(
        &'a self,
        type_name: &'a str,
        resource_model: Option<serde_json::Value>,
    ) -> BoxFuture<'a, ProviderResult<Vec<ResourceDescription>>> {
        Box::pin(self.cc_list_resources(type_name, resource_model))
    }

    fn availability_zones<'a>(
        &'a self,
        state: Option<&'a str>,
        all_zones: bool,
    ) -> BoxFuture<'a, ProviderResult<Vec<AvailabilityZone>>> {
        Box::pin(self.ec2_availability_zones(state, all_zones))
    }

    fn caller_account_id(&self) -> BoxFuture<'_, ProviderResult<String>> {
        Box::pin(self.sts_caller_account_id())
    }
}

/// Final result of an operation, or `None` while it is still running
fn operation_outcome(progress: Option<&ProgressEvent>) -> Option<ProviderResult<String>> {
    let progress = progress?;
    match progress.operation_status()? {
        OperationStatus::Success => Some(Ok(progress.identifier().unwrap_or("").to_string())),
        OperationStatus::Failed => {
            let msg = progress.status_message().unwrap_or("Unknown error");
            Some(Err(ProviderError::new(format!("Operation failed: {}", msg))))
        }
        OperationStatus::CancelComplete => {
            Some(Err(ProviderError::new("Operation was cancelled")))
        }
        _ => None,
    }
}

fn custom_endpoint<'a>(config: &'a Config, service: &str) -> Option<&'a str> {
    let url = config.endpoint_for(service)?;
    log::debug!("Using custom {} endpoint {}", service, url);
    Some(url)
}
