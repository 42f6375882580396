//! State checks run after each configuration step

use std::collections::{BTreeMap, HashMap};

use stratus_core::resource::State;

use crate::error::AcceptanceError;
use crate::flatmap::{flatten, is_count_key};

/// Check over the state after a step
pub type CheckFn = Box<dyn Fn(&TestState) -> Result<(), AcceptanceError> + Send + Sync>;

/// Refreshed states of a step, keyed by address
#[derive(Debug, Clone, Default)]
pub struct TestState {
    resources: HashMap<String, State>,
}

impl TestState {
    pub fn new(resources: HashMap<String, State>) -> Self {
        Self { resources }
    }

    pub fn get(&self, address: &str) -> Option<&State> {
        self.resources.get(address).filter(|s| s.exists)
    }

    /// Flattened attributes of a resource in state
    pub fn attributes(&self, address: &str) -> Result<BTreeMap<String, String>, AcceptanceError> {
        self.get(address)
            .map(|s| flatten(&s.attributes))
            .ok_or_else(|| AcceptanceError::ResourceNotFound(address.to_string()))
    }
}

/// The resource exists and has an identifier
pub fn check_resource_exists(address: &str) -> CheckFn {
    let address = address.to_string();
    Box::new(move |state| match state.get(&address) {
        Some(s) if s.identifier.is_some() => Ok(()),
        _ => Err(AcceptanceError::ResourceNotFound(address.clone())),
    })
}

/// The attribute has exactly `value`. A missing count key matches "0".
pub fn check_resource_attr(address: &str, key: &str, value: &str) -> CheckFn {
    let (address, key, value) = (address.to_string(), key.to_string(), value.to_string());
    Box::new(move |state| {
        let attrs = state.attributes(&address)?;
        match attrs.get(&key) {
            Some(actual) if *actual == value => Ok(()),
            None if is_count_key(&key) && value == "0" => Ok(()),
            actual => Err(AcceptanceError::AttributeMismatch {
                address: address.clone(),
                key: key.clone(),
                expected: value.clone(),
                actual: actual.cloned(),
            }),
        }
    })
}

/// The attribute is present and non-empty
pub fn check_resource_attr_set(address: &str, key: &str) -> CheckFn {
    let (address, key) = (address.to_string(), key.to_string());
    Box::new(move |state| {
        let attrs = state.attributes(&address)?;
        match attrs.get(&key) {
            Some(v) if !v.is_empty() => Ok(()),
            _ => Err(AcceptanceError::AttributeNotSet {
                address: address.clone(),
                key: key.clone(),
            }),
        }
    })
}

/// The attribute is absent (or an empty collection)
pub fn check_no_resource_attr(address: &str, key: &str) -> CheckFn {
    let (address, key) = (address.to_string(), key.to_string());
    Box::new(move |state| {
        let attrs = state.attributes(&address)?;
        match attrs.get(&key) {
            None => Ok(()),
            Some(v) if is_count_key(&key) && v == "0" => Ok(()),
            Some(v) => Err(AcceptanceError::UnexpectedAttribute {
                address: address.clone(),
                key: key.clone(),
                value: v.clone(),
            }),
        }
    })
}

/// Two resources hold the same attribute value
pub fn check_resource_attr_pair(
    address: &str,
    key: &str,
    other_address: &str,
    other_key: &str,
) -> CheckFn {
    let (address, key) = (address.to_string(), key.to_string());
    let (other_address, other_key) = (other_address.to_string(), other_key.to_string());
    Box::new(move |state| {
        let expected = state
            .attributes(&other_address)?
            .get(&other_key)
            .cloned()
            .ok_or_else(|| AcceptanceError::AttributeNotSet {
                address: other_address.clone(),
                key: other_key.clone(),
            })?;
        let actual = state.attributes(&address)?.get(&key).cloned();
        if actual.as_deref() == Some(expected.as_str()) {
            Ok(())
        } else {
            Err(AcceptanceError::AttributeMismatch {
                address: address.clone(),
                key: key.clone(),
                expected,
                actual,
            })
        }
    })
}

/// Run every check in order, stopping at the first failure
pub fn compose(checks: Vec<CheckFn>) -> CheckFn {
    Box::new(move |state| checks.iter().try_for_each(|check| check(state)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use stratus_core::resource::{ResourceId, Value};

    use super::*;

    fn state() -> TestState {
        let id = ResourceId::new("aws_ec2_client_vpn_endpoint", "test");
        let attrs = HashMap::from([
            ("description".to_string(), Value::string("vpn")),
            ("tags".to_string(), Value::Map(HashMap::new())),
            ("route".to_string(), Value::List(vec![])),
        ]);
        TestState::new(HashMap::from([(
            id.address(),
            State::existing(id, attrs).with_identifier("cvpn-endpoint-1"),
        )]))
    }

    #[test]
    fn attribute_checks() {
        let state = state();
        let address = "aws_ec2_client_vpn_endpoint.test";
        let check = compose(vec![
            check_resource_exists(address),
            check_resource_attr(address, "description", "vpn"),
            check_resource_attr(address, "tags.%", "0"),
            check_resource_attr(address, "network_association.#", "0"),
            check_resource_attr_set(address, "description"),
            check_no_resource_attr(address, "dns_name"),
            check_no_resource_attr(address, "route.#"),
        ]);
        check(&state).unwrap();
    }

    #[test]
    fn mismatch_reports_actual_value() {
        let state = state();
        let err = check_resource_attr("aws_ec2_client_vpn_endpoint.test", "description", "other")(
            &state,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AcceptanceError::AttributeMismatch { actual: Some(ref v), .. } if v == "vpn"
        ));

        let err = check_resource_exists("aws_vpc.missing")(&state).unwrap_err();
        assert!(matches!(err, AcceptanceError::ResourceNotFound(_)));
    }
}
