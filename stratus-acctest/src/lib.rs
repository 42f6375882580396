//! Stratus Acceptance Tests
//!
//! Harness for multi-step acceptance tests of the AWS provider. Tests run
//! against [`MemoryCloud`] unless `STRATUS_ACC` is set, in which case they
//! create real resources in the region named by `AWS_REGION`.
//!
//! ## Module Structure
//!
//! - `harness` - [`TestCase`] and [`TestStep`]
//! - `check` - State checks over flattened attributes
//! - `flatmap` - Dotted-key view of attribute values
//! - `memory` - In-memory [`CloudApi`](stratus_provider_aws::CloudApi)
//! - `fixtures` - Client VPN endpoint configurations

use std::collections::HashMap;

use stratus_core::resource::Value;
use stratus_provider_aws::{AwsProvider, Config};

pub mod check;
pub mod error;
pub mod fixtures;
pub mod flatmap;
pub mod harness;
pub mod memory;

#[cfg(test)]
mod client_vpn_endpoint_test;

pub use check::{
    CheckFn, TestState, check_no_resource_attr, check_resource_attr, check_resource_attr_pair,
    check_resource_attr_set, check_resource_exists, compose,
};
pub use error::AcceptanceError;
pub use harness::{TestCase, TestStep};
pub use memory::MemoryCloud;

/// Region used when `AWS_REGION` is unset
pub const DEFAULT_REGION: &str = "us-west-2";

/// Whether tests run against AWS
pub fn acc_enabled() -> bool {
    std::env::var("STRATUS_ACC").is_ok_and(|v| !v.is_empty())
}

/// Provider over a fresh [`MemoryCloud`]
pub fn memory_provider(region: &str) -> AwsProvider {
    let config = Config {
        region: region.to_string(),
        ..Default::default()
    };
    AwsProvider::new(Box::new(MemoryCloud::new(region)), &config)
}

/// Provider for acceptance tests: AWS when enabled, memory otherwise
pub async fn test_provider() -> Result<AwsProvider, AcceptanceError> {
    test_provider_with(HashMap::new()).await
}

/// Like [`test_provider`], with extra `provider "aws"` settings
pub async fn test_provider_with(
    settings: HashMap<String, Value>,
) -> Result<AwsProvider, AcceptanceError> {
    let region = std::env::var("AWS_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string());
    let mut attributes = settings;
    attributes.insert("region".to_string(), Value::string(&region));

    if !acc_enabled() {
        let config = Config::from_attributes(&attributes).map_err(AcceptanceError::Configure)?;
        return Ok(AwsProvider::new(Box::new(MemoryCloud::new(region)), &config));
    }

    log::info!("Running against AWS in {}", region);
    AwsProvider::configure(&attributes)
        .await
        .map_err(AcceptanceError::Configure)
}
