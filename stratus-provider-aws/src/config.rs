//! Provider configuration
//!
//! The provider settings schema consumed by the host runtime, and the
//! [`Config`] built from a configured `provider "aws"` block.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use stratus_core::diagnostics::{Diagnostic, Diagnostics};
use stratus_core::resource::Value;
use stratus_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema, types};

use crate::client::{AwsClient, CloudApi};
use crate::endpoints::{ENDPOINT_SERVICE_NAMES, endpoints_schema};
use crate::tags::{DefaultTags, IgnoreTags};

pub const DEFAULT_MAX_RETRIES: i64 = 25;

/// Publicly known regions, checked unless `skip_region_validation` is set
pub const REGIONS: &[&str] = &[
    "af-south-1",
    "ap-east-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-south-1",
    "ap-south-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ca-central-1",
    "ca-west-1",
    "cn-north-1",
    "cn-northwest-1",
    "eu-central-1",
    "eu-central-2",
    "eu-north-1",
    "eu-south-1",
    "eu-south-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "il-central-1",
    "me-central-1",
    "me-south-1",
    "sa-east-1",
    "us-east-1",
    "us-east-2",
    "us-gov-east-1",
    "us-gov-west-1",
    "us-iso-east-1",
    "us-isob-east-1",
    "us-west-1",
    "us-west-2",
];

static ACCOUNT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{12}$").expect("account id pattern is valid"));

/// Configuration errors raised after the settings have been parsed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid AWS Region: {0}")]
    InvalidRegion(String),

    #[error("AWS account ID not allowed: {0}")]
    AccountNotAllowed(String),

    #[error("AWS account ID forbidden: {0}")]
    AccountForbidden(String),

    #[error("Invalid AWS account ID: {0}")]
    InvalidAccountId(String),
}

/// Settings of an `assume_role` block. Zero and empty values mean unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssumeRole {
    pub duration_seconds: i64,
    pub external_id: String,
    pub policy: String,
    pub policy_arns: Vec<String>,
    pub role_arn: String,
    pub session_name: String,
    pub tags: BTreeMap<String, String>,
    pub transitive_tag_keys: Vec<String>,
}

/// Provider configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    #[serde(skip_serializing)]
    pub access_key: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub profile: String,
    pub shared_credentials_file: String,
    pub region: String,
    pub max_retries: i64,
    pub assume_role: Option<AssumeRole>,
    pub default_tags: Option<DefaultTags>,
    pub ignore_tags: Option<IgnoreTags>,
    /// Endpoint override per service; empty when no `endpoints` block is set
    pub endpoints: BTreeMap<String, String>,
    pub allowed_account_ids: Vec<String>,
    pub forbidden_account_ids: Vec<String>,
    pub insecure: bool,
    pub skip_credentials_validation: bool,
    pub skip_get_ec2_platforms: bool,
    pub skip_region_validation: bool,
    pub skip_requesting_account_id: bool,
    pub skip_metadata_api_check: bool,
    pub s3_force_path_style: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            token: String::new(),
            profile: String::new(),
            shared_credentials_file: String::new(),
            region: String::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            assume_role: None,
            default_tags: None,
            ignore_tags: None,
            endpoints: BTreeMap::new(),
            allowed_account_ids: Vec::new(),
            forbidden_account_ids: Vec::new(),
            insecure: false,
            skip_credentials_validation: false,
            skip_get_ec2_platforms: false,
            skip_region_validation: false,
            skip_requesting_account_id: false,
            skip_metadata_api_check: false,
            s3_force_path_style: false,
        }
    }
}

fn string_setting(name: &str, description: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String)
        .with_default(Value::String(String::new()))
        .with_description(description)
}

fn bool_setting(name: &str, description: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::Bool)
        .with_default(Value::Bool(false))
        .with_description(description)
}

fn string_set() -> AttributeType {
    AttributeType::Set(Box::new(AttributeType::String))
}

fn string_map() -> AttributeType {
    AttributeType::Map(Box::new(AttributeType::String))
}

fn assume_role_schema() -> AttributeSchema {
    let block = BlockSchema::new()
        .attribute(
            AttributeSchema::new("duration_seconds", AttributeType::Int)
                .with_description("Seconds to restrict the assume role session duration."),
        )
        .attribute(
            AttributeSchema::new("external_id", AttributeType::String).with_description(
                "Unique identifier that might be required for assuming a role in another account.",
            ),
        )
        .attribute(
            AttributeSchema::new("policy", types::json_string()).with_description(
                "IAM Policy JSON describing further restricting permissions for the IAM Role being assumed.",
            ),
        )
        .attribute(
            AttributeSchema::new("policy_arns", AttributeType::Set(Box::new(types::arn())))
                .with_description(
                    "Amazon Resource Names (ARNs) of IAM Policies describing further restricting permissions for the IAM Role being assumed.",
                ),
        )
        .attribute(
            AttributeSchema::new("role_arn", types::arn()).with_description(
                "Amazon Resource Name of an IAM Role to assume prior to making API calls.",
            ),
        )
        .attribute(
            AttributeSchema::new("session_name", AttributeType::String)
                .with_description("Identifier for the assumed role session."),
        )
        .attribute(
            AttributeSchema::new("tags", string_map()).with_description("Assume role session tags."),
        )
        .attribute(
            AttributeSchema::new("transitive_tag_keys", string_set()).with_description(
                "Assume role session tag keys to pass to any subsequent sessions.",
            ),
        );

    AttributeSchema::new("assume_role", AttributeType::List(Box::new(AttributeType::Block(block))))
        .max_items(1)
}

/// Schema of the `provider "aws"` block
pub fn provider_schema() -> ResourceSchema {
    ResourceSchema::new("provider.aws")
        .with_description("Settings of the AWS provider")
        .attribute(string_setting(
            "access_key",
            "The access key for API operations.",
        ).sensitive())
        .attribute(string_setting(
            "secret_key",
            "The secret key for API operations.",
        ).sensitive())
        .attribute(string_setting(
            "profile",
            "The profile for API operations. If not set, the default profile will be used.",
        ))
        .attribute(string_setting(
            "shared_credentials_file",
            "The path to the shared credentials file. If not set this defaults to ~/.aws/credentials.",
        ))
        .attribute(string_setting(
            "token",
            "Session token. A session token is only required if you are using temporary security credentials.",
        ).sensitive())
        .attribute(
            AttributeSchema::new("region", AttributeType::String)
                .required()
                .with_env_default(&["AWS_REGION", "AWS_DEFAULT_REGION"])
                .with_description(
                    "The region where AWS operations will take place. Examples are us-east-1, us-west-2, etc.",
                ),
        )
        .attribute(
            AttributeSchema::new("max_retries", AttributeType::Int)
                .with_default(Value::Int(DEFAULT_MAX_RETRIES))
                .with_description(
                    "The maximum number of times an AWS API request is being executed. If the API request still fails, an error is thrown.",
                ),
        )
        .attribute(
            AttributeSchema::new("allowed_account_ids", string_set())
                .conflicts_with(&["forbidden_account_ids"]),
        )
        .attribute(
            AttributeSchema::new("forbidden_account_ids", string_set())
                .conflicts_with(&["allowed_account_ids"]),
        )
        .attribute(assume_role_schema())
        .attribute(
            AttributeSchema::new(
                "default_tags",
                AttributeType::List(Box::new(AttributeType::Block(BlockSchema::new().attribute(
                    AttributeSchema::new("tags", string_map())
                        .with_description("Resource tags to default across all resources"),
                )))),
            )
            .max_items(1)
            .with_description(
                "Configuration block with settings to default resource tags across all resources.",
            ),
        )
        .attribute(
            AttributeSchema::new(
                "ignore_tags",
                AttributeType::List(Box::new(AttributeType::Block(
                    BlockSchema::new()
                        .attribute(
                            AttributeSchema::new("keys", string_set())
                                .with_description("Resource tag keys to ignore across all resources."),
                        )
                        .attribute(
                            AttributeSchema::new("key_prefixes", string_set()).with_description(
                                "Resource tag key prefixes to ignore across all resources.",
                            ),
                        ),
                ))),
            )
            .max_items(1)
            .with_description(
                "Configuration block with settings to ignore resource tags across all resources.",
            ),
        )
        .attribute(AttributeSchema::new(
            "endpoints",
            AttributeType::Set(Box::new(AttributeType::Block(endpoints_schema()))),
        ))
        .attribute(bool_setting(
            "insecure",
            "Explicitly allow the provider to perform \"insecure\" SSL requests.",
        ))
        .attribute(bool_setting(
            "skip_credentials_validation",
            "Skip the credentials validation via STS API.",
        ))
        .attribute(bool_setting(
            "skip_get_ec2_platforms",
            "Skip getting the supported EC2 platforms.",
        ))
        .attribute(bool_setting(
            "skip_region_validation",
            "Skip static validation of region name.",
        ))
        .attribute(bool_setting(
            "skip_requesting_account_id",
            "Skip requesting the account ID.",
        ))
        .attribute(bool_setting(
            "skip_metadata_api_check",
            "Skip the AWS Metadata API check.",
        ))
        .attribute(bool_setting(
            "s3_force_path_style",
            "Set this to true to force the request to use path-style addressing.",
        ))
}

impl Config {
    /// Build a configuration from the attributes of a provider block.
    ///
    /// Attributes are validated against [`provider_schema`] and defaults are
    /// applied before fields are extracted. All problems are reported at
    /// once.
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> Result<Config, Diagnostics> {
        let schema = provider_schema();
        let mut diags = Diagnostics::new();

        for (name, value) in attributes {
            if value.is_unresolved() {
                diags.push(
                    Diagnostic::error("Provider configuration cannot depend on resources")
                        .with_attribute(name.clone()),
                );
            }
        }
        if let Err(errors) = schema.validate(attributes) {
            diags.extend(Diagnostics::from_type_errors(errors));
        }
        diags.clone().into_result()?;

        let mut attrs = attributes.clone();
        schema.apply_defaults(&mut attrs);

        let mut config = Config {
            access_key: get_string(&attrs, "access_key"),
            secret_key: get_string(&attrs, "secret_key"),
            token: get_string(&attrs, "token"),
            profile: get_string(&attrs, "profile"),
            shared_credentials_file: get_string(&attrs, "shared_credentials_file"),
            region: get_string(&attrs, "region"),
            max_retries: attrs
                .get("max_retries")
                .and_then(Value::as_int)
                .unwrap_or(DEFAULT_MAX_RETRIES),
            assume_role: first_block(&attrs, "assume_role").map(expand_assume_role),
            default_tags: first_block(&attrs, "default_tags").map(|m| DefaultTags {
                tags: get_string_map(m, "tags"),
            }),
            ignore_tags: first_block(&attrs, "ignore_tags").map(|m| IgnoreTags {
                keys: get_string_list(m, "keys").into_iter().collect(),
                key_prefixes: get_string_list(m, "key_prefixes")
                    .into_iter()
                    .collect::<BTreeSet<_>>(),
            }),
            endpoints: BTreeMap::new(),
            allowed_account_ids: get_string_list(&attrs, "allowed_account_ids"),
            forbidden_account_ids: get_string_list(&attrs, "forbidden_account_ids"),
            insecure: get_bool(&attrs, "insecure"),
            skip_credentials_validation: get_bool(&attrs, "skip_credentials_validation"),
            skip_get_ec2_platforms: get_bool(&attrs, "skip_get_ec2_platforms"),
            skip_region_validation: get_bool(&attrs, "skip_region_validation"),
            skip_requesting_account_id: get_bool(&attrs, "skip_requesting_account_id"),
            skip_metadata_api_check: get_bool(&attrs, "skip_metadata_api_check"),
            s3_force_path_style: get_bool(&attrs, "s3_force_path_style"),
        };

        if let Some(role) = &config.assume_role {
            log::info!(
                "assume_role configuration set: (ARN: {:?}, SessionID: {:?}, ExternalID: {:?})",
                role.role_arn,
                role.session_name,
                role.external_id
            );
        }

        if let Some(Value::List(blocks)) = attrs.get("endpoints") {
            for block in blocks.iter().filter_map(Value::as_map) {
                for service in ENDPOINT_SERVICE_NAMES {
                    let url = block
                        .get(*service)
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    config.endpoints.insert(service.to_string(), url.to_string());
                }
            }
        }

        if let Err(e) = config.validate_region() {
            diags.push(Diagnostic::error(e.to_string()).with_attribute("region"));
        }
        diags.into_result()?;

        Ok(config)
    }

    /// Check the region against the known region list
    pub fn validate_region(&self) -> Result<(), ConfigError> {
        if self.skip_region_validation || REGIONS.contains(&self.region.as_str()) {
            Ok(())
        } else {
            Err(ConfigError::InvalidRegion(self.region.clone()))
        }
    }

    /// Check an account id against `allowed_account_ids` and
    /// `forbidden_account_ids`
    pub fn validate_account_id(&self, account_id: &str) -> Result<(), ConfigError> {
        if !ACCOUNT_ID.is_match(account_id) {
            return Err(ConfigError::InvalidAccountId(account_id.to_string()));
        }
        if self.forbidden_account_ids.iter().any(|id| id == account_id) {
            return Err(ConfigError::AccountForbidden(account_id.to_string()));
        }
        if !self.allowed_account_ids.is_empty()
            && !self.allowed_account_ids.iter().any(|id| id == account_id)
        {
            return Err(ConfigError::AccountNotAllowed(account_id.to_string()));
        }
        Ok(())
    }

    /// Custom endpoint URL for a service, if one is configured
    pub fn endpoint_for(&self, service: &str) -> Option<&str> {
        self.endpoints
            .get(service)
            .map(String::as_str)
            .filter(|url| !url.is_empty())
    }

    /// Build an authenticated client from this configuration
    pub async fn client(&self) -> AwsClient {
        AwsClient::from_config(self).await
    }

    /// Look up the account the credentials belong to and check it against
    /// `allowed_account_ids` and `forbidden_account_ids`.
    ///
    /// Returns `None` when the lookup is skipped, or when it fails and
    /// `skip_credentials_validation` is set.
    pub async fn verify_account(&self, api: &dyn CloudApi) -> Result<Option<String>, Diagnostics> {
        if self.skip_requesting_account_id {
            if !self.allowed_account_ids.is_empty() || !self.forbidden_account_ids.is_empty() {
                log::warn!(
                    "skip_requesting_account_id is set; allowed_account_ids and forbidden_account_ids are not checked"
                );
            }
            return Ok(None);
        }

        let account_id = match api.caller_account_id().await {
            Ok(id) => id,
            Err(e) if self.skip_credentials_validation => {
                log::warn!("Could not determine the AWS account ID: {}", e);
                return Ok(None);
            }
            Err(e) => {
                let mut diags = Diagnostics::new();
                diags.push(
                    Diagnostic::error("Failed to get the AWS account ID")
                        .with_detail(e.to_string()),
                );
                return Err(diags);
            }
        };

        if let Err(e) = self.validate_account_id(&account_id) {
            let mut diag = Diagnostic::error(e.to_string());
            match e {
                ConfigError::AccountForbidden(_) => {
                    diag = diag.with_attribute("forbidden_account_ids");
                }
                ConfigError::AccountNotAllowed(_) => {
                    diag = diag.with_attribute("allowed_account_ids");
                }
                _ => {}
            }
            let mut diags = Diagnostics::new();
            diags.push(diag);
            return Err(diags);
        }

        log::debug!("Using AWS account {}", account_id);
        Ok(Some(account_id))
    }
}

/// Validate provider settings, build a client and check the account it
/// acts for, reporting failures as diagnostics for the host runtime
pub async fn configure(
    attributes: &HashMap<String, Value>,
) -> Result<(Config, AwsClient), Diagnostics> {
    let config = Config::from_attributes(attributes)?;
    let client = config.client().await;
    config.verify_account(&client).await?;
    Ok((config, client))
}

fn expand_assume_role(m: &HashMap<String, Value>) -> AssumeRole {
    let mut role = AssumeRole::default();

    if let Some(v) = m.get("duration_seconds").and_then(Value::as_int)
        && v != 0
    {
        role.duration_seconds = v;
    }
    role.external_id = get_string(m, "external_id");
    role.policy = get_string(m, "policy");
    role.policy_arns = get_string_list(m, "policy_arns");
    role.role_arn = get_string(m, "role_arn");
    role.session_name = get_string(m, "session_name");
    role.tags = get_string_map(m, "tags");
    role.transitive_tag_keys = get_string_list(m, "transitive_tag_keys");

    role
}

fn first_block<'a>(
    attrs: &'a HashMap<String, Value>,
    name: &str,
) -> Option<&'a HashMap<String, Value>> {
    attrs
        .get(name)
        .and_then(Value::as_list)
        .and_then(|items| items.first())
        .and_then(Value::as_map)
}

fn get_string(attrs: &HashMap<String, Value>, name: &str) -> String {
    attrs
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn get_bool(attrs: &HashMap<String, Value>, name: &str) -> bool {
    attrs.get(name).and_then(Value::as_bool).unwrap_or(false)
}

/// String elements of a list or set; other elements are skipped
fn get_string_list(attrs: &HashMap<String, Value>, name: &str) -> Vec<String> {
    attrs
        .get(name)
        .and_then(Value::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// String entries of a map; other entries are skipped
fn get_string_map(attrs: &HashMap<String, Value>, name: &str) -> BTreeMap<String, String> {
    attrs
        .get(name)
        .and_then(Value::as_map)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
