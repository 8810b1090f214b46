//! Kernel assembly and the invocation entry point.
//!
//! A [`KernelBuilder`] collects resources, hooks, atoms, validators and
//! plugins. [`KernelBuilder::finish`] runs the plugin lifecycle, validates
//! the registrations and freezes everything into a [`Kernel`], which is
//! immutable and cheap to clone.
//!
//! # Example
//!
//! ```
//! use switchyard_kernel::phase::Phase;
//! use switchyard_kernel::step::from_sync;
//! use switchyard_kernel::{BuildError, Kernel};
//! use switchyard_ops::ResourceDef;
//!
//! let mut builder = Kernel::builder();
//! builder.register_resource(ResourceDef::new("Widget").with_canonical_ops()?)?;
//! builder.register_hook("Widget", "create", Phase::PreHandler, "stamp", from_sync(|_| Ok(())))?;
//! let kernel = builder.finish()?;
//!
//! let labels = kernel.plan_labels("Widget", "create")?;
//! assert!(labels.contains(&"PRE_HANDLER:hook:stamp@PRE_HANDLER".to_string()));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::{Arc, OnceLock};

use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use switchyard_ops::{
    Arity, OperationNotFound, OperationSpec, RegistrationError, Resolver, ResourceDef, Target,
};
use thiserror::Error;
use tracing::Instrument;

use crate::atoms::{Atom, AtomRegistry, DuplicateAtom};
use crate::config::KernelConfig;
use crate::context::{OpContext, RequestMeta};
use crate::error::ErrorEnvelope;
use crate::hooks::{HookRegistrationError, HookTable, Scope};
use crate::invoker::Invoker;
use crate::persistence::Persistence;
use crate::phase::Phase;
use crate::plan::Plan;
use crate::plugin::{Plugin, PluginEntry, PluginId, Plugins, sort_by_dependencies};
use crate::step::Step;
use crate::trace::{Trace, TraceArchive};
use crate::validate::Validator;

// ─────────────────────────────────────────────────────────────────────────────
// BuildError
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised while assembling a kernel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Resource or operation registration failed.
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    /// Hook registration failed.
    #[error(transparent)]
    Hook(#[from] HookRegistrationError),
    /// Atom registration failed.
    #[error(transparent)]
    Atom(#[from] DuplicateAtom),
    /// A unique plugin was added twice.
    #[error("plugin '{0}' is unique and was already added")]
    DuplicatePlugin(String),
    /// A plugin depends on one that was never added.
    #[error("plugin '{plugin}' depends on '{dependency}', which was not added")]
    MissingDependency {
        /// The dependent plugin.
        plugin: String,
        /// The absent dependency.
        dependency: String,
    },
    /// Plugins depend on each other in a cycle.
    #[error("circular plugin dependency among: {}", .0.join(", "))]
    CircularDependency(Vec<String>),
    /// A hook names a resource or alias that is not registered.
    #[error("hook '{label}' targets unknown operation {resource}.{alias}")]
    UnknownHookTarget {
        /// The hook label.
        label: String,
        /// Resource selector.
        resource: String,
        /// Alias selector.
        alias: String,
    },
    /// A custom operation has no handler to run.
    #[error("custom operation {resource}.{alias} has no registered handler")]
    MissingHandler {
        /// Resource name.
        resource: String,
        /// Alias.
        alias: String,
    },
    /// A plugin failed for its own reasons.
    #[error("plugin '{plugin}' failed: {message}")]
    Plugin {
        /// Plugin name.
        plugin: String,
        /// What went wrong.
        message: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// KernelBuilder
// ─────────────────────────────────────────────────────────────────────────────

/// Mutable registration surface, consumed by [`finish`](Self::finish).
pub struct KernelBuilder {
    resolver: Resolver,
    hooks: HookTable,
    atoms: AtomRegistry,
    validators: HashMap<String, Arc<dyn Validator>>,
    config: KernelConfig,
    pending: Vec<PluginEntry>,
    plugin_ids: HashSet<PluginId>,
    built_ids: Vec<PluginId>,
    deferred: Option<BuildError>,
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelBuilder {
    /// A builder seeded with the canonical atoms and default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolver: Resolver::new(),
            hooks: HookTable::new(),
            atoms: AtomRegistry::canonical(),
            validators: HashMap::new(),
            config: KernelConfig::default(),
            pending: Vec::new(),
            plugin_ids: HashSet::new(),
            built_ids: Vec::new(),
            deferred: None,
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    /// Queues one plugin or a tuple of plugins.
    ///
    /// Plugins added from inside another plugin's `build` are built in the
    /// same `finish` call, after the current batch.
    #[must_use]
    pub fn add_plugins<P: Plugins>(mut self, plugins: P) -> Self {
        plugins.add_to_kernel(&mut self);
        self
    }

    /// Like [`add_plugins`](Self::add_plugins), for use inside
    /// [`Plugin::build`](crate::Plugin::build).
    pub fn add_nested_plugins<P: Plugins>(&mut self, plugins: P) -> &mut Self {
        plugins.add_to_kernel(self);
        self
    }

    pub(crate) fn add_plugin_boxed(&mut self, id: PluginId, plugin: Box<dyn Plugin>) {
        if plugin.is_unique() && self.plugin_ids.contains(&id) {
            if self.deferred.is_none() {
                self.deferred = Some(BuildError::DuplicatePlugin(plugin.name().to_string()));
            }
            return;
        }
        self.plugin_ids.insert(id);
        self.pending.push(PluginEntry { id, plugin });
    }

    /// Returns true if a plugin of this type was added.
    #[must_use]
    pub fn has_plugin<P: Plugin>(&self) -> bool {
        self.plugin_ids.contains(&PluginId::of::<P>())
    }

    /// Registers a resource and its operations.
    ///
    /// # Errors
    ///
    /// Duplicate names or paths.
    pub fn register_resource(&mut self, resource: ResourceDef) -> Result<(), BuildError> {
        tracing::debug!(resource = resource.name(), ops = resource.len(), "resource registered");
        self.resolver.register(resource)?;
        Ok(())
    }

    /// Registers a hook. Either selector may be `"*"`.
    ///
    /// # Errors
    ///
    /// Duplicate or empty names.
    pub fn register_hook(
        &mut self,
        resource: impl Into<Scope>,
        alias: impl Into<Scope>,
        phase: Phase,
        name: &str,
        step: impl Step,
    ) -> Result<(), BuildError> {
        self.hooks.register_hook(resource, alias, phase, name, step)?;
        Ok(())
    }

    /// Registers a security dependency (`PRE_TX_SECDEP`).
    ///
    /// # Errors
    ///
    /// Duplicate or empty names.
    pub fn register_secdep(
        &mut self,
        resource: impl Into<Scope>,
        alias: impl Into<Scope>,
        name: &str,
        step: impl Step,
    ) -> Result<(), BuildError> {
        self.hooks.register_secdep(resource, alias, name, step)?;
        Ok(())
    }

    /// Registers a plain dependency (`PRE_TX_DEP`).
    ///
    /// # Errors
    ///
    /// Duplicate or empty names.
    pub fn register_dep(
        &mut self,
        resource: impl Into<Scope>,
        alias: impl Into<Scope>,
        name: &str,
        step: impl Step,
    ) -> Result<(), BuildError> {
        self.hooks.register_dep(resource, alias, name, step)?;
        Ok(())
    }

    /// Registers the handler for one operation.
    ///
    /// # Errors
    ///
    /// Wildcards, or a second handler for the same operation.
    pub fn register_handler(
        &mut self,
        resource: &str,
        alias: &str,
        name: &str,
        step: impl Step,
    ) -> Result<(), BuildError> {
        self.hooks.register_handler(resource, alias, name, step)?;
        Ok(())
    }

    /// Adds a framework atom after the canonical ones.
    ///
    /// # Errors
    ///
    /// Duplicate labels.
    pub fn register_atom(&mut self, atom: Atom) -> Result<(), BuildError> {
        self.atoms.register(atom)?;
        Ok(())
    }

    /// Sets the validator for one resource, replacing any previous one.
    pub fn set_validator(&mut self, resource: &str, validator: impl Validator) {
        self.validators
            .insert(resource.to_string(), Arc::new(validator));
    }

    /// Registered resources so far.
    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// The configuration the kernel will be built with.
    #[must_use]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Runs the plugin lifecycle, checks the registrations and freezes the
    /// kernel.
    ///
    /// # Errors
    ///
    /// Any plugin failure, a plugin dependency problem, a hook aimed at an
    /// unknown operation, or a custom operation without a handler.
    pub fn finish(mut self) -> Result<Kernel, BuildError> {
        let mut built = Vec::new();
        while !self.pending.is_empty() {
            if let Some(err) = self.deferred.take() {
                return Err(err);
            }
            let batch = sort_by_dependencies(core::mem::take(&mut self.pending), &self.built_ids)?;
            for entry in batch {
                tracing::debug!(plugin = entry.plugin.name(), "building plugin");
                entry.plugin.build(&mut self)?;
                self.built_ids.push(entry.id);
                built.push(entry);
            }
        }
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        for entry in &built {
            entry.plugin.ready(&mut self)?;
        }

        self.check_hook_targets()?;
        self.check_handlers()?;

        let mut plans: HashMap<String, HashMap<String, PlanSlot>> = HashMap::new();
        for spec in self.resolver.operations() {
            plans
                .entry(spec.resource().to_string())
                .or_default()
                .insert(
                    spec.alias().to_string(),
                    PlanSlot {
                        spec: Arc::new(spec.clone()),
                        plan: OnceLock::new(),
                    },
                );
        }

        tracing::info!(
            resources = self.resolver.resources().count(),
            hooks = self.hooks.len(),
            plugins = built.len(),
            "kernel ready"
        );

        Ok(Kernel {
            inner: Arc::new(KernelInner {
                archive: TraceArchive::new(self.config.trace_capacity()),
                resolver: self.resolver,
                hooks: self.hooks,
                atoms: self.atoms,
                validators: self.validators,
                config: self.config,
                plans,
            }),
        })
    }

    fn check_hook_targets(&self) -> Result<(), BuildError> {
        for entry in self.hooks.entries() {
            let Some(resource) = entry.resource().name() else {
                if let Some(alias) = entry.alias().name() {
                    let known = self.resolver.operations().any(|spec| spec.alias() == alias);
                    if !known {
                        return Err(unknown_target(entry.label(), "*", alias));
                    }
                }
                continue;
            };
            let Some(def) = self.resolver.resource(resource) else {
                return Err(unknown_target(entry.label(), resource, &entry.alias().to_string()));
            };
            if let Some(alias) = entry.alias().name() {
                if def.op(alias).is_none() {
                    return Err(unknown_target(entry.label(), resource, alias));
                }
            }
        }
        Ok(())
    }

    fn check_handlers(&self) -> Result<(), BuildError> {
        for spec in self.resolver.operations() {
            if matches!(spec.target(), Target::Custom(_))
                && self.hooks.handler(spec.resource(), spec.alias()).is_none()
            {
                return Err(BuildError::MissingHandler {
                    resource: spec.resource().to_string(),
                    alias: spec.alias().to_string(),
                });
            }
        }
        Ok(())
    }
}

fn unknown_target(label: &str, resource: &str, alias: &str) -> BuildError {
    BuildError::UnknownHookTarget {
        label: label.to_string(),
        resource: resource.to_string(),
        alias: alias.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Kernel
// ─────────────────────────────────────────────────────────────────────────────

/// A lazily built plan and the operation it is built from.
struct PlanSlot {
    spec: Arc<OperationSpec>,
    plan: OnceLock<Arc<Plan>>,
}

struct KernelInner {
    resolver: Resolver,
    hooks: HookTable,
    atoms: AtomRegistry,
    validators: HashMap<String, Arc<dyn Validator>>,
    config: KernelConfig,
    plans: HashMap<String, HashMap<String, PlanSlot>>,
    archive: TraceArchive,
}

/// The frozen operation-dispatch kernel.
///
/// Cloning shares the same registries, plan cache and trace archive.
#[derive(Clone)]
pub struct Kernel {
    inner: Arc<KernelInner>,
}

/// The result of one [`Kernel::invoke`] call.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Identifier under which the trace is archived.
    pub correlation_id: String,
    /// Every step that ran, in order.
    pub trace: Trace,
    /// The handler result, or the client-facing error.
    pub outcome: Result<Value, ErrorEnvelope>,
}

/// One operation as exposed over JSON-RPC, for `methodz`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodDescriptor {
    /// `"<Resource>.<alias>"`
    pub method: String,
    /// Resource name.
    pub resource: String,
    /// Alias.
    pub alias: String,
    /// Canonical verb or custom alias.
    pub target: String,
    /// Member or collection.
    pub arity: Arity,
    /// Whether the operation runs inside a transaction.
    pub persistent: bool,
}

impl Kernel {
    /// Starts a new builder.
    #[must_use]
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    /// The plan for `(resource, alias)`, built on first use.
    ///
    /// # Errors
    ///
    /// [`OperationNotFound`] if the pair is not registered.
    pub fn plan(&self, resource: &str, alias: &str) -> Result<Arc<Plan>, OperationNotFound> {
        let slot = self
            .inner
            .plans
            .get(resource)
            .and_then(|ops| ops.get(alias))
            .ok_or_else(|| OperationNotFound {
                resource: resource.to_string(),
                alias: alias.to_string(),
            })?;
        let plan = slot.plan.get_or_init(|| {
            Arc::new(Plan::build(
                Arc::clone(&slot.spec),
                &self.inner.atoms,
                &self.inner.hooks,
            ))
        });
        Ok(Arc::clone(plan))
    }

    /// `"PHASE:label"` strings of one plan, in execution order.
    ///
    /// # Errors
    ///
    /// [`OperationNotFound`] if the pair is not registered.
    pub fn plan_labels(
        &self,
        resource: &str,
        alias: &str,
    ) -> Result<Vec<String>, OperationNotFound> {
        Ok(self.plan(resource, alias)?.labels())
    }

    /// Every plan, as `resource -> alias -> labels`, in registration order.
    #[must_use]
    pub fn kernelz(&self) -> IndexMap<String, IndexMap<String, Vec<String>>> {
        let mut out = IndexMap::new();
        for def in self.inner.resolver.resources() {
            let mut ops = IndexMap::new();
            for spec in def.ops() {
                if let Ok(labels) = self.plan_labels(def.name(), spec.alias()) {
                    ops.insert(spec.alias().to_string(), labels);
                }
            }
            out.insert(def.name().to_string(), ops);
        }
        out
    }

    /// Operations reachable over JSON-RPC.
    #[must_use]
    pub fn methodz(&self) -> Vec<MethodDescriptor> {
        self.inner
            .resolver
            .operations()
            .filter(|spec| spec.exposes_rpc())
            .map(|spec| MethodDescriptor {
                method: format!("{}.{}", spec.resource(), spec.alias()),
                resource: spec.resource().to_string(),
                alias: spec.alias().to_string(),
                target: spec.target().name().to_string(),
                arity: spec.arity(),
                persistent: spec.is_persistent(),
            })
            .collect()
    }

    /// Runs one operation.
    ///
    /// `persistence` is the per-invocation handle the transaction runs on.
    /// Failures inside the plan are reported in [`Invocation::outcome`]; only
    /// an unknown operation is an `Err` here.
    ///
    /// # Errors
    ///
    /// [`OperationNotFound`] if the pair is not registered.
    pub async fn invoke(
        &self,
        resource: &str,
        alias: &str,
        payload: Value,
        persistence: Arc<dyn Persistence>,
        mut meta: RequestMeta,
    ) -> Result<Invocation, OperationNotFound> {
        let plan = self.plan(resource, alias)?;
        let correlation_id = meta
            .take_correlation_id()
            .unwrap_or_else(|| nanoid::nanoid!());
        let cancel = meta.take_cancel();
        let ctx = OpContext::new(
            plan.spec_arc(),
            correlation_id.clone(),
            payload,
            meta,
            Arc::clone(&persistence),
            self.validator_for(resource),
        );

        let span = tracing::info_span!("invoke", resource, alias, correlation_id = %correlation_id);
        let (trace, outcome) = Invoker::new(&self.inner.config)
            .run(&plan, ctx, persistence, cancel)
            .instrument(span)
            .await;

        self.inner.archive.record(&correlation_id, trace.clone());
        Ok(Invocation {
            correlation_id,
            trace,
            outcome,
        })
    }

    /// The archived trace of a recent invocation.
    #[must_use]
    pub fn trace(&self, correlation_id: &str) -> Option<Trace> {
        self.inner.archive.get(correlation_id)
    }

    /// The resource registry.
    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }

    /// The configuration the kernel was built with.
    #[must_use]
    pub fn config(&self) -> &KernelConfig {
        &self.inner.config
    }

    /// The validator registered for a resource.
    #[must_use]
    pub fn validator_for(&self, resource: &str) -> Option<Arc<dyn Validator>> {
        self.inner.validators.get(resource).cloned()
    }
}

impl core::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Kernel")
            .field("resources", &self.inner.resolver.resources().count())
            .field("hooks", &self.inner.hooks.len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
