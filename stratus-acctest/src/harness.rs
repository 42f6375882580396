//! Multi-step acceptance test runner
//!
//! A [`TestCase`] applies a sequence of configurations against one provider,
//! carrying state from step to step:
//!
//! 1. The fixture is parsed and every resource validated against its schema
//!    before anything is applied.
//! 2. Resources are applied one at a time in dependency order, each with the
//!    references it makes resolved against the states applied so far.
//! 3. Resources dropped from the configuration are destroyed, most recently
//!    applied first.
//! 4. Every state is refreshed from the provider, the step's checks run, and
//!    planning the same configuration again must produce no changes.
//!
//! Import steps read an applied resource back by its identifier and compare
//! the result with state. Whatever is left is destroyed when the case ends,
//! after which each destroyed resource must read back as not found.

use std::collections::{HashMap, HashSet};

use stratus_core::diagnostics::Diagnostics;
use stratus_core::differ::{Diff, create_plan, destroy_plan, diff};
use stratus_core::interpreter::{Interpreter, resolve_resource};
use stratus_core::parser::parse;
use stratus_core::plan::Plan;
use stratus_core::provider::Provider;
use stratus_core::resource::{Resource, ResourceId, State};
use stratus_core::schema::ResourceSchema;

use crate::check::{CheckFn, TestState};
use crate::error::AcceptanceError;
use crate::flatmap::flatten;

/// Import of an applied resource by its identifier
#[derive(Debug, Clone)]
struct ImportCheck {
    address: String,
    verify: bool,
    ignore: Vec<String>,
}

/// One step of a [`TestCase`]: a configuration to apply or an import
#[derive(Default)]
pub struct TestStep {
    config: Option<String>,
    check: Option<CheckFn>,
    import: Option<ImportCheck>,
    expect_error: Option<String>,
}

impl TestStep {
    /// Apply a configuration
    pub fn config(config: impl Into<String>) -> Self {
        Self {
            config: Some(config.into()),
            ..Default::default()
        }
    }

    /// Import the resource at `address` by the identifier recorded in state
    pub fn import(address: &str) -> Self {
        Self {
            import: Some(ImportCheck {
                address: address.to_string(),
                verify: false,
                ignore: Vec::new(),
            }),
            ..Default::default()
        }
    }

    pub fn check(mut self, check: CheckFn) -> Self {
        self.check = Some(check);
        self
    }

    /// Require the imported attributes to equal the ones in state
    pub fn verify(mut self) -> Self {
        if let Some(import) = &mut self.import {
            import.verify = true;
        }
        self
    }

    /// Attribute prefixes left out of import verification
    pub fn ignore(mut self, keys: &[&str]) -> Self {
        if let Some(import) = &mut self.import {
            import.ignore.extend(keys.iter().map(|k| k.to_string()));
        }
        self
    }

    /// The step must fail with an error whose message contains `fragment`
    pub fn expect_error(mut self, fragment: &str) -> Self {
        self.expect_error = Some(fragment.to_string());
        self
    }
}

/// An ordered list of steps run against one provider
pub struct TestCase {
    steps: Vec<TestStep>,
    check_destroy: bool,
}

impl Default for TestCase {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCase {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            check_destroy: true,
        }
    }

    pub fn step(mut self, step: TestStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Skip reading destroyed resources back at the end
    pub fn without_destroy_check(mut self) -> Self {
        self.check_destroy = false;
        self
    }

    /// Run every step, then destroy what is left even if a step failed
    pub async fn run<P: Provider>(self, provider: P) -> Result<(), AcceptanceError> {
        let mut runner = Runner::new(provider);

        let outcome = runner.run_steps(&self.steps).await;
        let destroyed = runner.destroy().await;

        outcome?;
        let destroyed = destroyed?;
        if self.check_destroy {
            runner.check_destroyed(&destroyed).await?;
        }
        Ok(())
    }
}

struct Runner<P: Provider> {
    interpreter: Interpreter<P>,
    /// States by address
    states: HashMap<String, State>,
    /// Managed addresses in dependency order
    order: Vec<String>,
}

impl<P: Provider> Runner<P> {
    fn new(provider: P) -> Self {
        Self {
            interpreter: Interpreter::new(provider),
            states: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn provider(&self) -> &P {
        self.interpreter.provider()
    }

    async fn run_steps(&mut self, steps: &[TestStep]) -> Result<(), AcceptanceError> {
        for (index, step) in steps.iter().enumerate() {
            let index = index + 1;
            log::info!("Step {}/{}", index, steps.len());

            match (&step.config, &step.import) {
                (Some(config), None) => {
                    let result = self.apply_config(config).await;
                    match (&step.expect_error, result) {
                        (None, result) => result?,
                        (Some(fragment), Err(err)) if err.to_string().contains(fragment) => {
                            log::debug!("Step {} failed as expected: {}", index, err);
                            continue;
                        }
                        (Some(fragment), Err(err)) => {
                            return Err(AcceptanceError::InvalidStep {
                                index,
                                message: format!("expected an error containing {fragment:?}, got: {err}"),
                            });
                        }
                        (Some(fragment), Ok(())) => {
                            return Err(AcceptanceError::InvalidStep {
                                index,
                                message: format!("expected an error containing {fragment:?}"),
                            });
                        }
                    }
                    if let Some(check) = &step.check {
                        check(&TestState::new(self.states.clone()))?;
                    }
                }
                (None, Some(import)) => self.import(import).await?,
                _ => {
                    return Err(AcceptanceError::InvalidStep {
                        index,
                        message: "a step needs either a configuration or an import".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn schema_for(&self, id: &ResourceId) -> Result<ResourceSchema, AcceptanceError> {
        let schema = if id.is_data() {
            self.provider().data_source_schema(&id.resource_type)
        } else {
            self.provider().resource_schema(&id.resource_type)
        };
        schema.ok_or_else(|| AcceptanceError::UnknownType(id.address()))
    }

    /// Validated resources in dependency order, with defaults applied
    fn prepare(&self, config: &str) -> Result<Vec<(Resource, ResourceSchema)>, AcceptanceError> {
        let parsed = parse(config)?;
        let mut prepared = Vec::new();
        for resource in parsed.dependency_order()? {
            let schema = self.schema_for(&resource.id)?;
            schema
                .validate(&resource.attributes)
                .map_err(|errors| AcceptanceError::Validation {
                    address: resource.id.address(),
                    diagnostics: Diagnostics::from_type_errors(errors),
                })?;
            let mut resource = resource.clone();
            schema.apply_defaults(&mut resource.attributes);
            prepared.push((resource, schema));
        }
        Ok(prepared)
    }

    async fn apply_config(&mut self, config: &str) -> Result<(), AcceptanceError> {
        let desired = self.prepare(config)?;

        for (resource, schema) in &desired {
            self.apply_resource(resource, schema).await?;
        }

        let declared: HashSet<String> = desired.iter().map(|(r, _)| r.id.address()).collect();
        self.remove_orphans(&declared).await?;
        self.states.retain(|address, _| declared.contains(address));

        // Resources may have gained references since they were first applied
        self.order = desired
            .iter()
            .filter(|(r, _)| !r.is_data_source())
            .map(|(r, _)| r.id.address())
            .collect();

        self.refresh().await?;
        self.verify_empty_plan(&desired)
    }

    async fn apply_resource(
        &mut self,
        resource: &Resource,
        schema: &ResourceSchema,
    ) -> Result<(), AcceptanceError> {
        let address = resource.id.address();
        let resolved = self.resolve(resource)?;

        let current: HashMap<ResourceId, State> = self
            .states
            .get(&address)
            .filter(|s| !s.id.is_data())
            .map(|s| (s.id.clone(), s.clone()))
            .into_iter()
            .collect();
        let schemas = HashMap::from([(resolved.id.resource_type.clone(), schema.clone())]);
        let plan = create_plan(std::slice::from_ref(&resolved), &current, &schemas);
        if plan.is_empty() {
            return Ok(());
        }
        log::debug!("{}", plan.display());

        self.apply_plan(&plan, &address).await?;
        if !resource.is_data_source() && !self.order.contains(&address) {
            self.order.push(address);
        }
        Ok(())
    }

    fn resolve(&self, resource: &Resource) -> Result<Resource, AcceptanceError> {
        resolve_resource(resource, &self.states).map_err(|e| AcceptanceError::Apply {
            address: resource.id.address(),
            message: e.to_string(),
        })
    }

    async fn apply_plan(&mut self, plan: &Plan, address: &str) -> Result<(), AcceptanceError> {
        let result = self
            .interpreter
            .apply_with_states(plan, self.states.clone())
            .await;
        if let Some(err) = result.first_error() {
            return Err(AcceptanceError::Apply {
                address: address.to_string(),
                message: err.to_string(),
            });
        }
        self.states = result.states;
        Ok(())
    }

    async fn remove_orphans(&mut self, declared: &HashSet<String>) -> Result<(), AcceptanceError> {
        let orphans: Vec<State> = self
            .order
            .iter()
            .filter(|address| !declared.contains(*address))
            .filter_map(|address| self.states.get(address).cloned())
            .collect();
        if orphans.is_empty() {
            return Ok(());
        }

        let addresses: Vec<String> = orphans.iter().map(|s| s.id.address()).collect();
        log::debug!("Destroying resources no longer declared: {}", addresses.join(", "));
        self.apply_plan(&destroy_plan(&orphans), &addresses.join(", "))
            .await?;
        self.order.retain(|address| declared.contains(address));
        Ok(())
    }

    /// Read every managed resource back from the provider
    async fn refresh(&mut self) -> Result<(), AcceptanceError> {
        for address in &self.order {
            let Some(state) = self.states.get(address) else {
                continue;
            };
            let refreshed = self
                .provider()
                .read(&state.id, state.identifier.as_deref())
                .await
                .map_err(|e| AcceptanceError::Apply {
                    address: address.clone(),
                    message: e.to_string(),
                })?;
            if !refreshed.exists {
                return Err(AcceptanceError::Vanished(address.clone()));
            }
            self.states.insert(address.clone(), refreshed);
        }
        Ok(())
    }

    fn verify_empty_plan(
        &self,
        desired: &[(Resource, ResourceSchema)],
    ) -> Result<(), AcceptanceError> {
        for (resource, schema) in desired {
            if resource.is_data_source() {
                continue;
            }
            let address = resource.id.address();
            let resolved = self.resolve(resource)?;
            let current = self
                .states
                .get(&address)
                .cloned()
                .unwrap_or_else(|| State::not_found(resource.id.clone()));
            let attributes = match diff(&resolved, &current, Some(schema)) {
                Diff::NoChange(_) => continue,
                Diff::Update {
                    changed_attributes,
                    ..
                }
                | Diff::Replace {
                    changed_attributes,
                    ..
                } => changed_attributes,
                _ => vec!["(create)".to_string()],
            };
            return Err(AcceptanceError::PlanNotEmpty {
                address,
                attributes,
            });
        }
        Ok(())
    }

    async fn import(&self, import: &ImportCheck) -> Result<(), AcceptanceError> {
        let state = self
            .states
            .get(&import.address)
            .filter(|s| s.exists)
            .ok_or_else(|| AcceptanceError::ResourceNotFound(import.address.clone()))?;
        let identifier = state.identifier.as_deref().ok_or_else(|| {
            AcceptanceError::ResourceNotFound(import.address.clone())
        })?;

        log::debug!("Importing {} as {}", import.address, identifier);
        let imported = self
            .provider()
            .read(&state.id, Some(identifier))
            .await
            .map_err(|e| AcceptanceError::Apply {
                address: import.address.clone(),
                message: e.to_string(),
            })?;
        if !imported.exists {
            return Err(AcceptanceError::ResourceNotFound(import.address.clone()));
        }
        if !import.verify {
            return Ok(());
        }

        let ignored = |key: &str| import.ignore.iter().any(|prefix| key.starts_with(prefix.as_str()));
        let expected = flatten(&state.attributes);
        let actual = flatten(&imported.attributes);
        let keys: HashSet<&String> = expected.keys().chain(actual.keys()).collect();
        let mut keys: Vec<&String> = keys.into_iter().filter(|k| !ignored(k)).collect();
        keys.sort();

        for key in keys {
            if expected.get(key) != actual.get(key) {
                return Err(AcceptanceError::ImportMismatch {
                    address: import.address.clone(),
                    key: key.clone(),
                    expected: expected.get(key).cloned(),
                    actual: actual.get(key).cloned(),
                });
            }
        }
        Ok(())
    }

    /// Destroy every managed resource, most recently applied first. Returns
    /// the states that were destroyed.
    async fn destroy(&mut self) -> Result<Vec<State>, AcceptanceError> {
        let applied: Vec<State> = self
            .order
            .iter()
            .filter_map(|address| self.states.get(address).cloned())
            .collect();
        if applied.is_empty() {
            return Ok(applied);
        }

        log::info!("Destroying {} resources", applied.len());
        let address = applied
            .iter()
            .map(|s| s.id.address())
            .collect::<Vec<_>>()
            .join(", ");
        self.apply_plan(&destroy_plan(&applied), &address).await?;
        self.order.clear();
        Ok(applied)
    }

    async fn check_destroyed(&self, destroyed: &[State]) -> Result<(), AcceptanceError> {
        for state in destroyed {
            let Some(identifier) = state.identifier.as_deref() else {
                continue;
            };
            let current = self
                .provider()
                .read(&state.id, Some(identifier))
                .await
                .map_err(|e| AcceptanceError::Apply {
                    address: state.id.address(),
                    message: e.to_string(),
                })?;
            if current.exists {
                return Err(AcceptanceError::NotDestroyed {
                    address: state.id.address(),
                    identifier: identifier.to_string(),
                });
            }
        }
        Ok(())
    }
}
