//! Resource and alias selectors for hook registration.

use core::fmt;

/// Matches either one name or every name (`"*"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Every resource or alias.
    Any,
    /// One exact name.
    Named(String),
}

impl Scope {
    /// Returns true if `name` falls within this scope.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Scope::Any => true,
            Scope::Named(own) => own == name,
        }
    }

    /// Returns true if some name falls within both scopes.
    #[must_use]
    pub fn overlaps(&self, other: &Scope) -> bool {
        match (self, other) {
            (Scope::Named(a), Scope::Named(b)) => a == b,
            _ => true,
        }
    }

    /// The exact name, if this scope is not a wildcard.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Scope::Any => None,
            Scope::Named(name) => Some(name),
        }
    }
}

impl From<&str> for Scope {
    fn from(value: &str) -> Self {
        if value == "*" {
            Scope::Any
        } else {
            Scope::Named(value.to_string())
        }
    }
}

impl From<String> for Scope {
    fn from(value: String) -> Self {
        if value == "*" {
            Scope::Any
        } else {
            Scope::Named(value)
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Any => f.write_str("*"),
            Scope::Named(name) => f.write_str(name),
        }
    }
}
