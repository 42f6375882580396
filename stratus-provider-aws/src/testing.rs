//! In-process [`CloudApi`] used by unit tests

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::json;
use stratus_core::provider::{BoxFuture, ProviderError, ProviderResult};

use crate::client::{AvailabilityZone, CloudApi, ResourceDescription};

/// Cloud API fake: resources keyed by identifier, with a log of calls.
/// Clones share their state.
#[derive(Default, Clone)]
pub struct FakeApi {
    pub resources: Arc<Mutex<BTreeMap<String, (String, serde_json::Value)>>>,
    calls: Arc<Mutex<Vec<String>>>,
    next_id: Arc<Mutex<u32>>,
    failing_type: Arc<Mutex<Option<String>>>,
    account_id: Option<String>,
}

impl FakeApi {
    pub fn with_account(mut self, account_id: &str) -> Self {
        self.account_id = Some(account_id.to_string());
        self
    }

    /// Make every later create of `type_name` fail
    pub fn fail_creates_of(&self, type_name: &str) {
        *self.failing_type.lock().unwrap() = Some(type_name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CloudApi for FakeApi {
    fn region(&self) -> &str {
        "us-west-2"
    }

    fn get_resource<'a>(
        &'a self,
        _type_name: &'a str,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Option<serde_json::Value>>> {
        let props = self
            .resources
            .lock()
            .unwrap()
            .get(identifier)
            .map(|(_, p)| p.clone());
        Box::pin(async move { Ok(props) })
    }

    fn create_resource<'a>(
        &'a self,
        type_name: &'a str,
        desired_state: serde_json::Value,
    ) -> BoxFuture<'a, ProviderResult<String>> {
        if self.failing_type.lock().unwrap().as_deref() == Some(type_name) {
            let err = ProviderError::new(format!("Operation failed: {} rejected", type_name));
            return Box::pin(async move { Err(err) });
        }

        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let identifier = format!("res-{}", *next);
        self.resources
            .lock()
            .unwrap()
            .insert(identifier.clone(), (type_name.to_string(), desired_state));
        self.calls
            .lock()
            .unwrap()
            .push(format!("create {} {}", type_name, identifier));
        Box::pin(async move { Ok(identifier) })
    }

    fn update_resource<'a>(
        &'a self,
        type_name: &'a str,
        identifier: &'a str,
        patch_ops: Vec<serde_json::Value>,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        self.calls.lock().unwrap().push(format!(
            "update {} {} {}",
            type_name,
            identifier,
            json!(patch_ops)
        ));
        Box::pin(async move { Ok(()) })
    }

    fn delete_resource<'a>(
        &'a self,
        type_name: &'a str,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        self.resources.lock().unwrap().remove(identifier);
        self.calls
            .lock()
            .unwrap()
            .push(format!("delete {} {}", type_name, identifier));
        Box::pin(async move { Ok(()) })
    }

    fn list_resources<'a>(
        &'a self,
        type_name: &'a str,
        _resource_model: Option<serde_json::Value>,
    ) -> BoxFuture<'a, ProviderResult<Vec<ResourceDescription>>> {
        let found = self
            .resources
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, (t, _))| t == type_name)
            .map(|(identifier, (_, props))| ResourceDescription {
                identifier: identifier.clone(),
                properties: props.clone(),
            })
            .collect();
        Box::pin(async move { Ok(found) })
    }

    fn availability_zones<'a>(
        &'a self,
        _state: Option<&'a str>,
        _all_zones: bool,
    ) -> BoxFuture<'a, ProviderResult<Vec<AvailabilityZone>>> {
        let zone = |name: &str, id: &str| AvailabilityZone {
            name: name.to_string(),
            zone_id: id.to_string(),
            state: "available".to_string(),
            group_name: "us-west-2".to_string(),
        };
        let zones = vec![zone("us-west-2b", "usw2-az2"), zone("us-west-2a", "usw2-az1")];
        Box::pin(async move { Ok(zones) })
    }

    fn caller_account_id(&self) -> BoxFuture<'_, ProviderResult<String>> {
        let account = self
            .account_id
            .clone()
            .ok_or_else(|| ProviderError::new("no valid credential sources found"));
        Box::pin(async move { account })
    }
}
