//! The shared `(resource, alias) -> OperationSpec` lookup.

use indexmap::IndexMap;
use thiserror::Error;

use crate::resource::{Model, ResourceDef};
use crate::spec::OperationSpec;

/// Returned when a `(resource, alias)` pair has no registered operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("operation '{alias}' not found on resource '{resource}'")]
pub struct OperationNotFound {
    /// The requested resource name.
    pub resource: String,
    /// The requested alias.
    pub alias: String,
}

/// Errors raised while registering resources and operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A resource with this name is already registered.
    #[error("resource '{0}' is already registered")]
    DuplicateResource(String),
    /// Two REST path segments collide.
    #[error("resource '{resource}' reuses path segment '{path}'")]
    DuplicatePath {
        /// The second resource to claim the path.
        resource: String,
        /// The contested path segment.
        path: String,
    },
    /// An alias is registered twice on one resource.
    #[error("alias '{alias}' is already registered on resource '{resource}'")]
    DuplicateAlias {
        /// The owning resource.
        resource: String,
        /// The duplicated alias.
        alias: String,
    },
    /// An alias is empty or contains a reserved character.
    #[error("alias '{alias}' on resource '{resource}' is empty or contains '.', '/' or '*'")]
    InvalidAlias {
        /// The owning resource.
        resource: String,
        /// The rejected alias.
        alias: String,
    },
}

/// Resource registry shared by both transports.
///
/// Resources keep their registration order so that introspection output is
/// stable.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    resources: IndexMap<String, ResourceDef>,
}

impl Resolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource.
    ///
    /// # Errors
    ///
    /// Fails if the name or REST path segment is already taken.
    pub fn register(&mut self, resource: ResourceDef) -> Result<(), RegistrationError> {
        if self.resources.contains_key(resource.name()) {
            return Err(RegistrationError::DuplicateResource(
                resource.name().to_string(),
            ));
        }
        if self.resources.values().any(|r| r.path() == resource.path()) {
            return Err(RegistrationError::DuplicatePath {
                resource: resource.name().to_string(),
                path: resource.path().to_string(),
            });
        }
        self.resources.insert(resource.name().to_string(), resource);
        Ok(())
    }

    /// Looks up the [`OperationSpec`] for `alias` on `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationNotFound`] if the resource or alias is unknown.
    pub fn resolve(&self, resource: &str, alias: &str) -> Result<&OperationSpec, OperationNotFound> {
        self.resources
            .get(resource)
            .and_then(|r| r.op(alias))
            .ok_or_else(|| OperationNotFound {
                resource: resource.to_string(),
                alias: alias.to_string(),
            })
    }

    /// Typed form of [`resolve`](Self::resolve).
    ///
    /// # Errors
    ///
    /// Returns [`OperationNotFound`] if the alias is unknown.
    pub fn resolve_model<M: Model>(&self, alias: &str) -> Result<&OperationSpec, OperationNotFound> {
        self.resolve(M::NAME, alias)
    }

    /// Looks up a resource by name.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&ResourceDef> {
        self.resources.get(name)
    }

    /// All resources, in registration order.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceDef> {
        self.resources.values()
    }

    /// Every registered operation, resource by resource.
    pub fn operations(&self) -> impl Iterator<Item = &OperationSpec> {
        self.resources.values().flat_map(ResourceDef::ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Target;

    struct Widget;

    impl Model for Widget {
        const NAME: &'static str = "Widget";
    }

    fn resolver() -> Resolver {
        let mut resolver = Resolver::new();
        resolver
            .register(
                ResourceDef::of::<Widget>()
                    .with_canonical_ops()
                    .and_then(|r| r.with_op(OperationSpec::custom("rotate")))
                    .expect("widget ops should register"),
            )
            .expect("widget should register");
        resolver
    }

    #[test]
    fn resolves_canonical_and_custom_aliases() {
        let resolver = resolver();
        let create = resolver
            .resolve("Widget", "create")
            .expect("create should resolve");
        assert_eq!(create.target(), &Target::Create);
        assert_eq!(create.resource(), "Widget");

        let rotate = resolver
            .resolve_model::<Widget>("rotate")
            .expect("rotate should resolve");
        assert_eq!(rotate.target(), &Target::Custom("rotate".into()));
    }

    #[test]
    fn unknown_alias_or_resource_is_not_found() {
        let resolver = resolver();
        let err = resolver
            .resolve("Widget", "explode")
            .expect_err("unknown alias should fail");
        assert_eq!(err.alias, "explode");
        assert!(resolver.resolve("Gizmo", "create").is_err());
    }

    #[test]
    fn duplicate_resource_is_rejected() {
        let mut resolver = resolver();
        let err = resolver
            .register(ResourceDef::new("Widget"))
            .expect_err("duplicate resource should fail");
        assert_eq!(err, RegistrationError::DuplicateResource("Widget".into()));
    }

    #[test]
    fn colliding_path_is_rejected() {
        let mut resolver = resolver();
        let err = resolver
            .register(ResourceDef::new("WIDGET"))
            .expect_err("colliding path should fail");
        assert!(matches!(err, RegistrationError::DuplicatePath { .. }));
    }

    #[test]
    fn operations_iterate_in_registration_order() {
        let resolver = resolver();
        let last = resolver.operations().last().map(OperationSpec::alias);
        assert_eq!(last, Some("rotate"));
        assert_eq!(resolver.operations().count(), 14);
    }
}
