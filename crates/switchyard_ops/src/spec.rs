//! Static description of one operation.

use serde::Serialize;

use crate::target::{Arity, HttpMethod, Persist, Target};

/// One operation on one resource.
///
/// Built with the `with_*` methods and frozen once it is added to a
/// [`ResourceDef`](crate::ResourceDef). The owning resource name is filled in
/// at that point, so a spec is never observed without one.
///
/// # Example
///
/// ```
/// use switchyard_ops::{Arity, OperationSpec, Persist, Target};
///
/// let spec = OperationSpec::custom("rotate")
///     .with_arity(Arity::Member)
///     .with_persist(Persist::Skip);
///
/// assert_eq!(spec.alias(), "rotate");
/// assert_eq!(spec.target(), &Target::Custom("rotate".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationSpec {
    alias: String,
    target: Target,
    arity: Arity,
    persist: Persist,
    resource: String,
    http_method: Option<HttpMethod>,
    path_suffix: Option<String>,
    status: Option<u16>,
    expose_rest: bool,
    expose_rpc: bool,
}

impl OperationSpec {
    /// Creates a spec with an explicit alias and target.
    #[must_use]
    pub fn new(alias: impl Into<String>, target: Target) -> Self {
        let arity = target.default_arity();
        Self {
            alias: alias.into(),
            target,
            arity,
            persist: Persist::Default,
            resource: String::new(),
            http_method: None,
            path_suffix: None,
            status: None,
            expose_rest: true,
            expose_rpc: true,
        }
    }

    /// A canonical verb exposed under its own name (`create`, `bulk_merge`, ...).
    #[must_use]
    pub fn canonical(target: Target) -> Self {
        Self::new(target.name().to_string(), target)
    }

    /// A custom operation whose alias and target name coincide.
    #[must_use]
    pub fn custom(alias: impl Into<String>) -> Self {
        let alias = alias.into();
        Self::new(alias.clone(), Target::Custom(alias))
    }

    /// Overrides the arity.
    #[must_use]
    pub fn with_arity(mut self, arity: Arity) -> Self {
        self.arity = arity;
        self
    }

    /// Sets the transaction policy.
    #[must_use]
    pub fn with_persist(mut self, persist: Persist) -> Self {
        self.persist = persist;
        self
    }

    /// Overrides the REST method.
    #[must_use]
    pub fn with_http_method(mut self, method: HttpMethod) -> Self {
        self.http_method = Some(method);
        self
    }

    /// Overrides the REST path suffix. Custom operations default to `/{alias}`.
    #[must_use]
    pub fn with_path_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.path_suffix = Some(suffix.into());
        self
    }

    /// Overrides the success status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Hides the operation from the REST adapter.
    #[must_use]
    pub fn without_rest(mut self) -> Self {
        self.expose_rest = false;
        self
    }

    /// Hides the operation from the RPC adapter.
    #[must_use]
    pub fn without_rpc(mut self) -> Self {
        self.expose_rpc = false;
        self
    }

    pub(crate) fn bind(mut self, resource: &str) -> Self {
        self.resource = resource.to_string();
        self
    }

    /// The externally visible name.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The verb backing this alias.
    #[must_use]
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Member or collection.
    #[must_use]
    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// The declared transaction policy.
    #[must_use]
    pub fn persist(&self) -> Persist {
        self.persist
    }

    /// The owning resource name.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Returns true when the invoker wraps this operation in a transaction.
    ///
    /// `Persist::Default` follows the target: read-only targets never open
    /// one. `Persist::Always` and `Persist::Skip` override it.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        match self.persist {
            Persist::Default => !self.target.is_read_only(),
            Persist::Always => true,
            Persist::Skip => false,
        }
    }

    /// REST method, falling back to the target's default.
    #[must_use]
    pub fn http_method(&self) -> HttpMethod {
        self.http_method
            .unwrap_or_else(|| self.target.default_http_method())
    }

    /// REST path suffix appended after the resource (and item id) segments.
    #[must_use]
    pub fn path_suffix(&self) -> String {
        match (&self.path_suffix, &self.target) {
            (Some(suffix), _) => suffix.clone(),
            (None, Target::Custom(_)) => format!("/{}", self.alias),
            (None, _) => String::new(),
        }
    }

    /// Success status, falling back to the target's default.
    #[must_use]
    pub fn success_status(&self) -> u16 {
        self.status.unwrap_or_else(|| self.target.default_status())
    }

    /// Whether the REST adapter routes to this operation.
    #[must_use]
    pub fn exposes_rest(&self) -> bool {
        self.expose_rest
    }

    /// Whether the RPC adapter dispatches to this operation.
    #[must_use]
    pub fn exposes_rpc(&self) -> bool {
        self.expose_rpc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_and_list_are_never_persistent() {
        assert!(!OperationSpec::canonical(Target::Read).is_persistent());
        assert!(!OperationSpec::canonical(Target::List).is_persistent());
        assert!(OperationSpec::canonical(Target::Create).is_persistent());
        assert!(OperationSpec::canonical(Target::BulkDelete).is_persistent());
    }

    #[test]
    fn persist_skip_disables_transaction() {
        let spec = OperationSpec::canonical(Target::Create).with_persist(Persist::Skip);
        assert!(!spec.is_persistent());
    }

    #[test]
    fn persist_always_wraps_read_only_targets() {
        let spec = OperationSpec::canonical(Target::List).with_persist(Persist::Always);
        assert!(spec.is_persistent());
        let search = OperationSpec::new("search", Target::Read).with_persist(Persist::Always);
        assert!(search.is_persistent());
    }

    #[test]
    fn custom_ops_are_persistent_by_default() {
        assert!(OperationSpec::custom("rotate").is_persistent());
    }

    #[test]
    fn custom_ops_default_suffix_is_alias() {
        assert_eq!(OperationSpec::custom("rotate").path_suffix(), "/rotate");
        assert_eq!(OperationSpec::canonical(Target::Read).path_suffix(), "");
        assert_eq!(
            OperationSpec::custom("rotate")
                .with_path_suffix("/spin")
                .path_suffix(),
            "/spin"
        );
    }

    #[test]
    fn overrides_win_over_target_defaults() {
        let spec = OperationSpec::custom("search")
            .with_http_method(HttpMethod::Get)
            .with_status(202);
        assert_eq!(spec.http_method(), HttpMethod::Get);
        assert_eq!(spec.success_status(), 202);
    }
}
