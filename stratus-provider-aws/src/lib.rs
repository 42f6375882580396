//! Stratus AWS Provider
//!
//! AWS provider implementation over the Cloud Control API.
//!
//! ## Module Structure
//!
//! - `config` - Provider settings schema and [`Config`]
//! - `endpoints` - Endpoint override service names
//! - `client` - [`CloudApi`] and the SDK-backed [`AwsClient`]
//! - `convert` - Attribute values to and from Cloud Control documents
//! - `resources` - Resource and data source definitions
//! - `registry` - Registration tables
//! - `provider` - [`AwsProvider`] implementation
//! - `tags` - Default and ignored tags

pub mod client;
pub mod config;
pub mod convert;
pub mod endpoints;
pub mod provider;
pub mod registry;
pub mod resources;
pub mod tags;

#[cfg(test)]
mod testing;

// Re-export main types
pub use client::{AvailabilityZone, AwsClient, CloudApi, ResourceDescription};
pub use config::{Config, ConfigError, configure, provider_schema};
pub use provider::{AWS_MUTEX_KV, AwsProvider};
pub use registry::{DATA_SOURCES, RESOURCES, data_source_definition, resource_definition};
