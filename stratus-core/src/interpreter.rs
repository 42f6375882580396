//! Interpreter - Execute Effects using a Provider
//!
//! The Interpreter executes Effects contained in a Plan in order,
//! collecting the results. This is where side effects actually occur.
//!
//! References in desired resources are resolved just before each Effect
//! runs, against the states produced by earlier Effects and any states the
//! caller already knows about.

use std::collections::HashMap;

use crate::effect::Effect;
use crate::plan::Plan;
use crate::provider::{Provider, ProviderError, ProviderResult};
use crate::resource::{Reference, Resource, State, Value};

/// Result of executing each Effect
#[derive(Debug)]
pub enum EffectOutcome {
    /// Read succeeded
    Read { state: State },
    /// Create succeeded
    Created { state: State },
    /// Update succeeded
    Updated { state: State },
    /// Replace succeeded (delete followed by create)
    Replaced { state: State },
    /// Delete succeeded
    Deleted,
    /// Skipped (e.g., dry-run)
    Skipped { reason: String },
}

impl EffectOutcome {
    pub fn state(&self) -> Option<&State> {
        match self {
            EffectOutcome::Read { state }
            | EffectOutcome::Created { state }
            | EffectOutcome::Updated { state }
            | EffectOutcome::Replaced { state } => Some(state),
            EffectOutcome::Deleted | EffectOutcome::Skipped { .. } => None,
        }
    }
}

/// Result of executing the entire Plan
#[derive(Debug)]
pub struct ApplyResult {
    pub outcomes: Vec<Result<EffectOutcome, ProviderError>>,
    pub success_count: usize,
    pub failure_count: usize,
    /// States after apply, keyed by resource address. Deleted resources are
    /// removed.
    pub states: HashMap<String, State>,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }

    /// First error encountered, if any
    pub fn first_error(&self) -> Option<&ProviderError> {
        self.outcomes.iter().find_map(|o| o.as_ref().err())
    }
}

/// Interpreter configuration
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    /// If true, skip actual side effects
    pub dry_run: bool,
    /// Continue on error
    pub continue_on_error: bool,
}

/// Interpreter that executes Effects using a Provider
pub struct Interpreter<P: Provider> {
    provider: P,
    config: InterpreterConfig,
}

impl<P: Provider> Interpreter<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: InterpreterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Execute a Plan, interpreting all Effects and causing side effects
    pub async fn apply(&self, plan: &Plan) -> ApplyResult {
        self.apply_with_states(plan, HashMap::new()).await
    }

    /// Execute a Plan, resolving references against `known` states as well as
    /// the states produced while applying
    pub async fn apply_with_states(
        &self,
        plan: &Plan,
        known: HashMap<String, State>,
    ) -> ApplyResult {
        let mut states = known;
        let mut outcomes = Vec::new();
        let mut success_count = 0;
        let mut failure_count = 0;

        for effect in plan.effects() {
            log::info!("{}", effect.brief());
            let result = self.execute_effect(effect, &states).await;

            match &result {
                Ok(outcome) => {
                    success_count += 1;
                    let address = effect.resource_id().address();
                    match outcome {
                        EffectOutcome::Deleted => {
                            states.remove(&address);
                        }
                        other => {
                            if let Some(state) = other.state() {
                                states.insert(address, state.clone());
                            }
                        }
                    }
                }
                Err(e) => {
                    log::error!("{}: {}", effect.brief(), e);
                    failure_count += 1;
                    if !self.config.continue_on_error {
                        outcomes.push(result);
                        break;
                    }
                }
            }

            outcomes.push(result);
        }

        ApplyResult {
            outcomes,
            success_count,
            failure_count,
            states,
        }
    }

    /// Execute a single Effect
    async fn execute_effect(
        &self,
        effect: &Effect,
        states: &HashMap<String, State>,
    ) -> ProviderResult<EffectOutcome> {
        if self.config.dry_run {
            return Ok(EffectOutcome::Skipped {
                reason: "dry-run mode".to_string(),
            });
        }

        match effect {
            Effect::Read(query) => {
                let query = resolve_resource(query, states)?;
                let state = self.provider.read_data_source(&query).await?;
                Ok(EffectOutcome::Read { state })
            }
            Effect::Create(resource) => {
                let resource = resolve_resource(resource, states)?;
                let state = self.provider.create(&resource).await?;
                Ok(EffectOutcome::Created { state })
            }
            Effect::Update { id, from, to, .. } => {
                let identifier = from.identifier.as_deref().ok_or_else(|| {
                    ProviderError::new("Cannot update a resource without an identifier")
                        .for_resource(id.clone())
                })?;
                let to = resolve_resource(to, states)?;
                let state = self.provider.update(id, identifier, from, &to).await?;
                Ok(EffectOutcome::Updated { state })
            }
            Effect::Replace { from, to, .. } => {
                if let Some(identifier) = from.identifier.as_deref() {
                    self.provider.delete(&from.id, identifier).await?;
                }
                let to = resolve_resource(to, states)?;
                let state = self.provider.create(&to).await?;
                Ok(EffectOutcome::Replaced { state })
            }
            Effect::Delete { id, identifier } => {
                self.provider.delete(id, identifier).await?;
                Ok(EffectOutcome::Deleted)
            }
        }
    }
}

/// Look up the value a reference points to.
///
/// `id` falls back to the remote identifier when the state has no `id`
/// attribute.
pub fn lookup_reference(states: &HashMap<String, State>, reference: &Reference) -> Option<Value> {
    let state = states.get(&reference.address)?;
    let value = match state.attributes.get(&reference.attribute) {
        Some(v) => v.clone(),
        None if reference.attribute == "id" => Value::String(state.identifier.clone()?),
        None => return None,
    };
    match reference.index {
        Some(i) => value.as_list()?.get(i).cloned(),
        None => Some(value),
    }
}

/// Replace every reference in a resource with the value it points to
pub fn resolve_resource(
    resource: &Resource,
    states: &HashMap<String, State>,
) -> ProviderResult<Resource> {
    let lookup = |r: &Reference| lookup_reference(states, r);
    let mut resolved = resource.clone();
    for (key, value) in &resource.attributes {
        let value = value.resolve(&lookup).map_err(|r| {
            ProviderError::new(format!("Unresolved reference {} in attribute {}", r, key))
                .for_resource(resource.id.clone())
        })?;
        resolved.attributes.insert(key.clone(), value);
    }
    Ok(resolved)
}
