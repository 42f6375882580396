//! Diagnostics - Errors and warnings reported back to the host runtime
//!
//! Configuration problems are collected and returned rather than aborting,
//! so the host can show all of them to the user at once.

use std::fmt;

use crate::schema::TypeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "Error"),
            Severity::Warning => write!(f, "Warning"),
        }
    }
}

/// A single diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: Option<String>,
    /// Attribute the diagnostic refers to, if any (e.g., "assume_role.0.role_arn")
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.summary)?;
        if let Some(attr) = &self.attribute {
            write!(f, " (at {})", attr)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, "\n  {}", detail)?;
        }
        Ok(())
    }
}

/// Ordered collection of diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap any error as a single error diagnostic
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        let mut diag = Diagnostic::error(err.to_string());
        if let Some(source) = err.source() {
            diag = diag.with_detail(source.to_string());
        }
        Self(vec![diag])
    }

    /// Convert schema validation errors into error diagnostics
    pub fn from_type_errors(errors: Vec<TypeError>) -> Self {
        Self(
            errors
                .into_iter()
                .map(|e| {
                    let diag = Diagnostic::error(e.to_string());
                    match attribute_of(&e) {
                        Some(name) => diag.with_attribute(name),
                        None => diag,
                    }
                })
                .collect(),
        )
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.0.push(diag);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Err(self)` when any error is present, `Ok(())` otherwise
    pub fn into_result(self) -> Result<(), Diagnostics> {
        if self.has_errors() { Err(self) } else { Ok(()) }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.0.iter().map(|d| d.to_string()).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

impl std::error::Error for Diagnostics {}

impl From<Diagnostic> for Diagnostics {
    fn from(diag: Diagnostic) -> Self {
        Self(vec![diag])
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

fn attribute_of(err: &TypeError) -> Option<String> {
    match err {
        TypeError::MissingRequired { name }
        | TypeError::UnknownAttribute { name }
        | TypeError::ComputedAttribute { name }
        | TypeError::ConflictingAttributes { name, .. }
        | TypeError::TooManyItems { name, .. }
        | TypeError::TooFewItems { name, .. } => Some(name.clone()),
        TypeError::AttributeError { name, inner } => match inner.as_ref() {
            TypeError::ListItemError { index, inner } => match attribute_of(inner) {
                Some(nested) => Some(format!("{}.{}.{}", name, index, nested)),
                None => Some(format!("{}.{}", name, index)),
            },
            other => match attribute_of(other) {
                Some(nested) => Some(format!("{}.{}", name, nested)),
                None => Some(name.clone()),
            },
        },
        _ => None,
    }
}
