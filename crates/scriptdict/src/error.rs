use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::resource::ResourceError;

/// Result type alias for dictionary operations that can fail.
pub type DictResult<T> = Result<T, DictError>;

/// Category of a dictionary failure.
///
/// The host surfaces these to the end user as the category code of a scripting error.
/// Uses strum derives for `Display`, `FromStr` and `Into<&'static str>`; the string form
/// matches the variant name exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ErrorKind {
    /// An allocation (container or entry) was refused by the resource tracker.
    OutOfMemory,
    /// The key is already present in the dictionary.
    DuplicateKey,
    /// The key is absent.
    KeyNotFound,
    /// The stored value (or the handle) has the wrong type for the operation.
    TypeMismatch,
    /// A lock level, read-only or fixed attribute forbids the mutation.
    MutationDenied,
    /// A key is not a valid variable name for a scope dictionary.
    InvalidIdentifier,
    /// A function value would replace or shadow a protected name.
    ProtectedName,
    /// A collaborator asked for something that cannot happen in a consistent heap.
    InternalConsistency,
    /// The host interrupt flag aborted a long-running enumeration.
    Interrupted,
    /// Containers are nested deeper than the configured limit.
    NestingTooDeep,
    /// Malformed dictionary literal.
    Syntax,
}

/// Which mutation-policy attribute rejected a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize)]
pub enum Denial {
    /// The value or container is locked.
    #[strum(serialize = "locked")]
    Locked,
    /// The entry or container is fixed: it cannot be added to or removed from.
    #[strum(serialize = "fixed")]
    Fixed,
    /// The entry is read-only.
    #[strum(serialize = "read-only")]
    ReadOnly,
}

/// A failed dictionary operation: a category plus a human-readable message.
///
/// `subject` carries the key or name the failure is about, when there is one, so callers
/// can report it without parsing the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictError {
    kind: ErrorKind,
    message: String,
    subject: Option<String>,
}

impl DictError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            subject: None,
        }
    }

    fn with_subject(kind: ErrorKind, message: String, subject: &str) -> Self {
        Self {
            kind,
            message,
            subject: Some(subject.to_owned()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The key or name this error is about, if any.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub(crate) fn duplicate_key(key: &str) -> Self {
        Self::with_subject(ErrorKind::DuplicateKey, format!("key already exists: {key}"), key)
    }

    pub(crate) fn key_not_found(key: &str) -> Self {
        Self::with_subject(ErrorKind::KeyNotFound, format!("key not present in dictionary: {key}"), key)
    }

    pub(crate) fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }

    pub(crate) fn mutation_denied(denial: Denial, name: &str) -> Self {
        let message = match denial {
            Denial::Locked => format!("value is locked: {name}"),
            Denial::Fixed => format!("cannot change fixed value: {name}"),
            Denial::ReadOnly => format!("variable is read-only: {name}"),
        };
        Self::with_subject(ErrorKind::MutationDenied, message, name)
    }

    pub(crate) fn invalid_identifier(name: &str) -> Self {
        Self::with_subject(ErrorKind::InvalidIdentifier, format!("illegal variable name: {name}"), name)
    }

    pub(crate) fn protected_name(name: &str) -> Self {
        Self::with_subject(
            ErrorKind::ProtectedName,
            format!("variable name conflicts with existing function: {name}"),
            name,
        )
    }

    pub(crate) fn internal(what: &str) -> Self {
        Self::new(ErrorKind::InternalConsistency, format!("internal error: {what}"))
    }

    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, message)
    }
}

impl fmt::Display for DictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for DictError {}

impl From<ResourceError> for DictError {
    fn from(err: ResourceError) -> Self {
        let kind = match err {
            ResourceError::Allocation { .. } | ResourceError::Memory { .. } => ErrorKind::OutOfMemory,
            ResourceError::Nesting { .. } => ErrorKind::NestingTooDeep,
            ResourceError::Interrupted => ErrorKind::Interrupted,
        };
        Self::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn kind_round_trips_through_its_name() {
        let name: &'static str = ErrorKind::MutationDenied.into();
        assert_eq!(name, "MutationDenied");
        assert_eq!(ErrorKind::from_str("DuplicateKey").unwrap(), ErrorKind::DuplicateKey);
    }

    #[test]
    fn resource_errors_map_to_categories() {
        let oom: DictError = ResourceError::Allocation { limit: 1, count: 2 }.into();
        assert_eq!(oom.kind(), ErrorKind::OutOfMemory);
        let int: DictError = ResourceError::Interrupted.into();
        assert_eq!(int.kind(), ErrorKind::Interrupted);
        assert_eq!(int.to_string(), "Interrupted: interrupted");
    }

    #[test]
    fn subject_names_the_offending_key() {
        let err = DictError::mutation_denied(Denial::ReadOnly, "b");
        assert_eq!(err.subject(), Some("b"));
        assert_eq!(err.message(), "variable is read-only: b");
    }
}
