//! Effect - A single side effect to be performed against a Provider
//!
//! Effects are plain values. Building a Plan of Effects performs no remote
//! calls; only the Interpreter executes them.

use crate::resource::{Resource, ResourceId, State};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Evaluate a data source
    Read(Resource),
    /// Create a resource that does not exist yet
    Create(Resource),
    /// Update a resource in place
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Delete and recreate a resource (a force-new attribute changed)
    Replace {
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Delete a resource by its remote identifier
    Delete { id: ResourceId, identifier: String },
}

impl Effect {
    /// Whether this Effect changes remote state
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Effect::Read(_))
    }

    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Read(r) | Effect::Create(r) => &r.id,
            Effect::Update { id, .. } | Effect::Delete { id, .. } => id,
            Effect::Replace { to, .. } => &to.id,
        }
    }

    /// One-line description (e.g., "+ aws_vpc.test")
    pub fn brief(&self) -> String {
        let symbol = match self {
            Effect::Read(_) => "<=",
            Effect::Create(_) => "+",
            Effect::Update { .. } => "~",
            Effect::Replace { .. } => "-/+",
            Effect::Delete { .. } => "-",
        };
        format!("{} {}", symbol, self.resource_id())
    }
}
