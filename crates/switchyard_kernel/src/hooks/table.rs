//! Ordered hook storage.

use core::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::scope::Scope;
use crate::label;
use crate::phase::Phase;
use crate::step::Step;

// ─────────────────────────────────────────────────────────────────────────────
// HookEntry
// ─────────────────────────────────────────────────────────────────────────────

/// How an entry was registered. Decides its label prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// `register_secdep`, always `PRE_TX_SECDEP`.
    Secdep,
    /// `register_dep`, always `PRE_TX_DEP`.
    Dep,
    /// `register_hook`, any phase.
    Hook,
    /// `register_handler`, always `HANDLER`, replaces the canonical handler.
    Handler,
}

/// One registered step with its selectors.
#[derive(Clone)]
pub struct HookEntry {
    resource: Scope,
    alias: Scope,
    phase: Phase,
    kind: HookKind,
    name: String,
    label: String,
    step: Arc<dyn Step>,
}

impl HookEntry {
    /// The resource selector.
    #[must_use]
    pub fn resource(&self) -> &Scope {
        &self.resource
    }

    /// The alias selector.
    #[must_use]
    pub fn alias(&self) -> &Scope {
        &self.alias
    }

    /// The phase the step runs in.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// How the entry was registered.
    #[must_use]
    pub fn kind(&self) -> HookKind {
        self.kind
    }

    /// The name given at registration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The trace label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The step itself.
    #[must_use]
    pub fn step(&self) -> &Arc<dyn Step> {
        &self.step
    }

    /// Returns true if this entry applies to `(resource, alias)`.
    #[must_use]
    pub fn applies_to(&self, resource: &str, alias: &str) -> bool {
        self.resource.matches(resource) && self.alias.matches(alias)
    }
}

impl fmt::Debug for HookEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookEntry")
            .field("resource", &self.resource)
            .field("alias", &self.alias)
            .field("phase", &self.phase)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HookRegistrationError
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during hook registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookRegistrationError {
    /// The same label is already registered in the same phase for selectors
    /// that share at least one operation.
    #[error("hook '{label}' is already registered for {resource}.{alias}")]
    DuplicateName {
        /// The duplicated label.
        label: String,
        /// Resource selector.
        resource: String,
        /// Alias selector.
        alias: String,
    },
    /// A second handler for one operation.
    #[error("{resource}.{alias} already has a handler")]
    DuplicateHandler {
        /// Resource name.
        resource: String,
        /// Alias.
        alias: String,
    },
    /// Handlers must name one resource and one alias.
    #[error("handlers cannot use wildcard selectors")]
    WildcardHandler,
    /// Hook names may not be empty.
    #[error("hook names cannot be empty")]
    EmptyName,
}

// ─────────────────────────────────────────────────────────────────────────────
// HookTable
// ─────────────────────────────────────────────────────────────────────────────

/// Every user-registered step, in registration order.
///
/// Entries are kept in one sequence rather than bucketed by key, so that
/// exact and wildcard registrations interleave in the order they were made
/// when a plan is assembled.
#[derive(Default, Clone)]
pub struct HookTable {
    entries: Vec<HookEntry>,
}

impl HookTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hook for `(resource, alias, phase)`.
    ///
    /// Either selector may be `"*"`.
    ///
    /// # Errors
    ///
    /// Returns [`HookRegistrationError::DuplicateName`] if the same name is
    /// already registered in this phase for any operation these selectors
    /// also cover.
    pub fn register_hook(
        &mut self,
        resource: impl Into<Scope>,
        alias: impl Into<Scope>,
        phase: Phase,
        name: &str,
        step: impl Step,
    ) -> Result<(), HookRegistrationError> {
        let label = label::hook(name, phase);
        self.push(resource.into(), alias.into(), phase, HookKind::Hook, name, label, Arc::new(step))
    }

    /// Appends a security dependency. Its phase is fixed to `PRE_TX_SECDEP`.
    ///
    /// # Errors
    ///
    /// See [`register_hook`](Self::register_hook).
    pub fn register_secdep(
        &mut self,
        resource: impl Into<Scope>,
        alias: impl Into<Scope>,
        name: &str,
        step: impl Step,
    ) -> Result<(), HookRegistrationError> {
        let label = label::secdep(name);
        self.push(
            resource.into(),
            alias.into(),
            Phase::PreTxSecdep,
            HookKind::Secdep,
            name,
            label,
            Arc::new(step),
        )
    }

    /// Appends a plain dependency. Its phase is fixed to `PRE_TX_DEP`.
    ///
    /// # Errors
    ///
    /// See [`register_hook`](Self::register_hook).
    pub fn register_dep(
        &mut self,
        resource: impl Into<Scope>,
        alias: impl Into<Scope>,
        name: &str,
        step: impl Step,
    ) -> Result<(), HookRegistrationError> {
        let label = label::dep(name);
        self.push(
            resource.into(),
            alias.into(),
            Phase::PreTxDep,
            HookKind::Dep,
            name,
            label,
            Arc::new(step),
        )
    }

    /// Sets the handler for one operation, replacing the canonical handler
    /// atom if the alias has one.
    ///
    /// # Errors
    ///
    /// Fails on wildcard selectors or if the operation already has a handler.
    pub fn register_handler(
        &mut self,
        resource: &str,
        alias: &str,
        name: &str,
        step: impl Step,
    ) -> Result<(), HookRegistrationError> {
        let (resource, alias) = (Scope::from(resource), Scope::from(alias));
        let (Some(r), Some(a)) = (resource.name(), alias.name()) else {
            return Err(HookRegistrationError::WildcardHandler);
        };
        if self.handler(r, a).is_some() {
            return Err(HookRegistrationError::DuplicateHandler {
                resource: r.to_string(),
                alias: a.to_string(),
            });
        }
        let label = label::handler(name);
        self.push(resource, alias, Phase::Handler, HookKind::Handler, name, label, Arc::new(step))
    }

    fn push(
        &mut self,
        resource: Scope,
        alias: Scope,
        phase: Phase,
        kind: HookKind,
        name: &str,
        label: String,
        step: Arc<dyn Step>,
    ) -> Result<(), HookRegistrationError> {
        if name.is_empty() {
            return Err(HookRegistrationError::EmptyName);
        }
        let duplicate = self.entries.iter().any(|e| {
            e.phase == phase
                && e.label == label
                && e.resource.overlaps(&resource)
                && e.alias.overlaps(&alias)
        });
        if duplicate {
            return Err(HookRegistrationError::DuplicateName {
                label,
                resource: resource.to_string(),
                alias: alias.to_string(),
            });
        }
        tracing::debug!(%resource, %alias, %phase, %label, "hook registered");
        self.entries.push(HookEntry {
            resource,
            alias,
            phase,
            kind,
            name: name.to_string(),
            label,
            step,
        });
        Ok(())
    }

    /// Non-handler entries applying to `(resource, alias, phase)`, in
    /// registration order.
    pub fn matching<'a>(
        &'a self,
        resource: &'a str,
        alias: &'a str,
        phase: Phase,
    ) -> impl Iterator<Item = &'a HookEntry> + 'a {
        self.entries.iter().filter(move |e| {
            e.kind != HookKind::Handler && e.phase == phase && e.applies_to(resource, alias)
        })
    }

    /// The registered handler for one operation.
    #[must_use]
    pub fn handler(&self, resource: &str, alias: &str) -> Option<&HookEntry> {
        self.entries.iter().find(|e| {
            e.kind == HookKind::Handler
                && e.resource.name() == Some(resource)
                && e.alias.name() == Some(alias)
        })
    }

    /// Every entry, in registration order.
    #[must_use]
    pub fn entries(&self) -> &[HookEntry] {
        &self.entries
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::from_sync;

    fn noop() -> impl Step {
        from_sync(|_| Ok(()))
    }

    #[test]
    fn hooks_match_in_registration_order_across_wildcards() {
        let mut table = HookTable::new();
        table
            .register_hook("Widget", "create", Phase::PreHandler, "first", noop())
            .expect("first should register");
        table
            .register_hook("*", "*", Phase::PreHandler, "global", noop())
            .expect("global should register");
        table
            .register_hook("Widget", "*", Phase::PreHandler, "third", noop())
            .expect("third should register");
        table
            .register_hook("Gadget", "create", Phase::PreHandler, "other", noop())
            .expect("other should register");

        let labels: Vec<_> = table
            .matching("Widget", "create", Phase::PreHandler)
            .map(HookEntry::label)
            .collect();
        assert_eq!(
            labels,
            vec![
                "hook:first@PRE_HANDLER",
                "hook:global@PRE_HANDLER",
                "hook:third@PRE_HANDLER"
            ]
        );
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut table = HookTable::new();
        table
            .register_hook("Widget", "create", Phase::PreHandler, "audit", noop())
            .expect("first should register");
        let result = table.register_hook("Widget", "create", Phase::PreHandler, "audit", noop());
        assert!(matches!(
            result,
            Err(HookRegistrationError::DuplicateName { .. })
        ));

        table
            .register_hook("Widget", "create", Phase::PostHandler, "audit", noop())
            .expect("same name in another phase is allowed");
    }

    #[test]
    fn duplicate_name_under_a_wildcard_is_rejected() {
        let mut table = HookTable::new();
        table
            .register_hook("Widget", "create", Phase::PreHandler, "audit", noop())
            .expect("exact hook should register");
        assert!(matches!(
            table.register_hook("*", "*", Phase::PreHandler, "audit", noop()),
            Err(HookRegistrationError::DuplicateName { .. })
        ));
        assert!(matches!(
            table.register_secdep("Widget", "create", "bearer", noop()).and_then(|()| {
                table.register_secdep("Widget", "*", "bearer", noop())
            }),
            Err(HookRegistrationError::DuplicateName { .. })
        ));

        table
            .register_hook("Gadget", "*", Phase::PreHandler, "audit", noop())
            .expect("disjoint selectors may reuse the name");
        table
            .register_hook("Widget", "read", Phase::PreHandler, "audit", noop())
            .expect("another alias may reuse the name");
        let labels: Vec<_> = table
            .matching("Widget", "create", Phase::PreHandler)
            .map(HookEntry::label)
            .collect();
        assert_eq!(labels, vec!["hook:audit@PRE_HANDLER"]);
    }

    #[test]
    fn secdeps_and_deps_have_fixed_phases() {
        let mut table = HookTable::new();
        table
            .register_secdep("Widget", "*", "bearer", noop())
            .expect("secdep should register");
        table
            .register_dep("*", "*", "db", noop())
            .expect("dep should register");

        let secdeps: Vec<_> = table
            .matching("Widget", "read", Phase::PreTxSecdep)
            .map(HookEntry::label)
            .collect();
        assert_eq!(secdeps, vec!["secdep:bearer"]);

        let deps: Vec<_> = table
            .matching("Widget", "read", Phase::PreTxDep)
            .map(HookEntry::label)
            .collect();
        assert_eq!(deps, vec!["dep:db"]);
    }

    #[test]
    fn handlers_are_exact_and_unique() {
        let mut table = HookTable::new();
        assert_eq!(
            table.register_handler("*", "rotate", "rotate", noop()),
            Err(HookRegistrationError::WildcardHandler)
        );
        table
            .register_handler("Widget", "rotate", "rotate", noop())
            .expect("handler should register");
        assert!(matches!(
            table.register_handler("Widget", "rotate", "again", noop()),
            Err(HookRegistrationError::DuplicateHandler { .. })
        ));
        assert!(table.handler("Widget", "rotate").is_some());
        assert_eq!(
            table.matching("Widget", "rotate", Phase::Handler).count(),
            0
        );
    }

    #[test]
    fn empty_names_are_rejected() {
        let mut table = HookTable::new();
        assert_eq!(
            table.register_hook("*", "*", Phase::OnError, "", noop()),
            Err(HookRegistrationError::EmptyName)
        );
    }
}
