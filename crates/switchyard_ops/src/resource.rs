//! Resources and their operation namespaces.

use indexmap::IndexMap;

use crate::resolver::RegistrationError;
use crate::spec::OperationSpec;
use crate::target::Target;

/// A typed handle for a resource, so callers can resolve by type instead of
/// by string.
///
/// ```
/// use switchyard_ops::Model;
///
/// struct Widget;
///
/// impl Model for Widget {
///     const NAME: &'static str = "Widget";
/// }
/// ```
pub trait Model: 'static {
    /// The registered resource name.
    const NAME: &'static str;
}

/// An entity type exposing a namespace of operations.
///
/// Aliases are unique within a resource and keep their registration order,
/// which is the order introspection reports them in.
#[derive(Debug, Clone)]
pub struct ResourceDef {
    name: String,
    path: String,
    ops: IndexMap<String, OperationSpec>,
}

impl ResourceDef {
    /// Creates an empty resource. The REST path segment defaults to the
    /// lowercased name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let path = name.to_lowercase();
        Self {
            name,
            path,
            ops: IndexMap::new(),
        }
    }

    /// Creates an empty resource named after a [`Model`].
    #[must_use]
    pub fn of<M: Model>() -> Self {
        Self::new(M::NAME)
    }

    /// Overrides the REST path segment.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into().trim_matches('/').to_string();
        self
    }

    /// Registers all thirteen canonical verbs under their own names.
    ///
    /// # Errors
    ///
    /// Fails if any canonical alias is already taken.
    pub fn with_canonical_ops(mut self) -> Result<Self, RegistrationError> {
        for target in Target::CANONICAL {
            self.add_op(OperationSpec::canonical(target))?;
        }
        Ok(self)
    }

    /// Registers one operation.
    ///
    /// # Errors
    ///
    /// Fails with [`RegistrationError::DuplicateAlias`] if the alias exists,
    /// or [`RegistrationError::InvalidAlias`] if it is empty or contains a
    /// `.`, `/` or `*`.
    pub fn with_op(mut self, spec: OperationSpec) -> Result<Self, RegistrationError> {
        self.add_op(spec)?;
        Ok(self)
    }

    /// In-place form of [`with_op`](Self::with_op).
    ///
    /// # Errors
    ///
    /// See [`with_op`](Self::with_op).
    pub fn add_op(&mut self, spec: OperationSpec) -> Result<(), RegistrationError> {
        let alias = spec.alias();
        if alias.is_empty() || alias.contains(['.', '/', '*']) {
            return Err(RegistrationError::InvalidAlias {
                resource: self.name.clone(),
                alias: alias.to_string(),
            });
        }
        if self.ops.contains_key(alias) {
            return Err(RegistrationError::DuplicateAlias {
                resource: self.name.clone(),
                alias: alias.to_string(),
            });
        }
        let spec = spec.bind(&self.name);
        self.ops.insert(spec.alias().to_string(), spec);
        Ok(())
    }

    /// The resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The REST path segment, without slashes.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Looks up an alias.
    #[must_use]
    pub fn op(&self, alias: &str) -> Option<&OperationSpec> {
        self.ops.get(alias)
    }

    /// All operations, in registration order.
    pub fn ops(&self) -> impl Iterator<Item = &OperationSpec> {
        self.ops.values()
    }

    /// Number of registered operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if no operations are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_ops_are_bound_to_resource() {
        let widget = ResourceDef::new("Widget")
            .with_canonical_ops()
            .expect("canonical ops should register");
        assert_eq!(widget.len(), 13);
        assert!(widget.ops().all(|op| op.resource() == "Widget"));
        assert_eq!(widget.path(), "widget");
    }

    #[test]
    fn duplicate_alias_is_rejected() {
        let err = ResourceDef::new("Widget")
            .with_op(OperationSpec::custom("rotate"))
            .and_then(|r| r.with_op(OperationSpec::custom("rotate")))
            .expect_err("duplicate alias should fail");
        assert!(matches!(err, RegistrationError::DuplicateAlias { .. }));
    }

    #[test]
    fn alias_may_not_contain_separators() {
        for alias in ["", "a.b", "a/b", "*"] {
            let err = ResourceDef::new("Widget")
                .with_op(OperationSpec::new(alias, Target::Create))
                .expect_err("invalid alias should fail");
            assert!(matches!(err, RegistrationError::InvalidAlias { .. }));
        }
    }

    #[test]
    fn ops_keep_registration_order() {
        let r = ResourceDef::new("Gadget")
            .with_op(OperationSpec::custom("zeta"))
            .and_then(|r| r.with_op(OperationSpec::canonical(Target::Create)))
            .and_then(|r| r.with_op(OperationSpec::custom("alpha")))
            .expect("ops should register");
        let aliases: Vec<_> = r.ops().map(OperationSpec::alias).collect();
        assert_eq!(aliases, vec!["zeta", "create", "alpha"]);
    }

    #[test]
    fn path_override_strips_slashes() {
        let r = ResourceDef::new("Widget").with_path("/things/");
        assert_eq!(r.path(), "things");
    }
}
