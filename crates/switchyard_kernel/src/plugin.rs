//! Plugin system for composing kernels.
//!
//! Plugins are the unit of composition: a resource catalog, a security
//! policy, an audit trail or a logging setup is each delivered as a plugin
//! that registers into a [`KernelBuilder`].
//!
//! # Example
//!
//! ```
//! use switchyard_kernel::error::StepError;
//! use switchyard_kernel::plugin::Plugin;
//! use switchyard_kernel::step::from_sync;
//! use switchyard_kernel::{BuildError, Kernel, KernelBuilder};
//!
//! struct BearerAuth;
//!
//! impl Plugin for BearerAuth {
//!     fn build(&self, kernel: &mut KernelBuilder) -> Result<(), BuildError> {
//!         kernel.register_secdep(
//!             "*",
//!             "*",
//!             "bearer",
//!             from_sync(|ctx| match ctx.header("authorization") {
//!                 Some(value) if value.starts_with("Bearer ") => Ok(()),
//!                 _ => Err(StepError::unauthorized("missing bearer token")),
//!             }),
//!         )?;
//!         Ok(())
//!     }
//! }
//!
//! let kernel = Kernel::builder().add_plugins(BearerAuth).finish()?;
//! # let _ = kernel;
//! # Ok::<(), BuildError>(())
//! ```

use core::any::TypeId;

use variadics_please::all_tuples;

use crate::kernel::{BuildError, KernelBuilder};

// ─────────────────────────────────────────────────────────────────────────────
// PluginId
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier for a plugin type.
///
/// Used for dependency resolution and duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PluginId {
    type_id: TypeId,
    type_name: &'static str,
}

impl PluginId {
    /// Creates a `PluginId` for the given plugin type.
    #[must_use]
    pub fn of<P: Plugin>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            type_name: core::any::type_name::<P>(),
        }
    }

    /// Returns the type name for debugging.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugin Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A bundle of registrations applied to a [`KernelBuilder`].
///
/// Lifecycle, driven by [`KernelBuilder::finish`]:
///
/// 1. plugins are sorted so that dependencies come first
/// 2. `build()` runs on each, in that order
/// 3. `ready()` runs on each, in that order, once every plugin is built
///
/// After that the builder is frozen into an immutable
/// [`Kernel`](crate::Kernel).
pub trait Plugin: Send + Sync + 'static {
    /// Registers resources, hooks, atoms and validators.
    ///
    /// # Errors
    ///
    /// Any registration failure aborts `finish()`.
    fn build(&self, kernel: &mut KernelBuilder) -> Result<(), BuildError>;

    /// Called after every plugin has been built.
    ///
    /// Use this for registrations that depend on what other plugins added,
    /// or for one-time process setup such as installing a log subscriber.
    ///
    /// # Errors
    ///
    /// Any failure aborts `finish()`.
    fn ready(&self, _kernel: &mut KernelBuilder) -> Result<(), BuildError> {
        Ok(())
    }

    /// Returns the plugin's name for debugging and error messages.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Declares plugins that must be built before this one.
    fn dependencies(&self) -> Vec<PluginId> {
        Vec::new()
    }

    /// Returns true if this plugin can only be added once.
    fn is_unique(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugins Trait (for add_plugins polymorphism)
// ─────────────────────────────────────────────────────────────────────────────

/// Types that can be passed to [`KernelBuilder::add_plugins`]: a single
/// [`Plugin`] or a tuple of them.
pub trait Plugins {
    /// Queues these plugins on the builder.
    fn add_to_kernel(self, kernel: &mut KernelBuilder);
}

impl<P: Plugin> Plugins for P {
    fn add_to_kernel(self, kernel: &mut KernelBuilder) {
        kernel.add_plugin_boxed(PluginId::of::<P>(), Box::new(self));
    }
}

macro_rules! impl_plugins_for_tuple {
    ($($P:ident),*) => {
        impl<$($P: Plugins),*> Plugins for ($($P,)*) {
            #[expect(non_snake_case, reason = "tuple fields are bound by their type names")]
            fn add_to_kernel(self, kernel: &mut KernelBuilder) {
                let ($($P,)*) = self;
                $($P.add_to_kernel(kernel);)*
            }
        }
    };
}

all_tuples!(impl_plugins_for_tuple, 1, 12, P);

// ─────────────────────────────────────────────────────────────────────────────
// PluginEntry
// ─────────────────────────────────────────────────────────────────────────────

/// A boxed plugin with its captured [`PluginId`].
pub(crate) struct PluginEntry {
    pub(crate) id: PluginId,
    pub(crate) plugin: Box<dyn Plugin>,
}

/// Orders plugins so that every plugin follows its dependencies, keeping
/// insertion order otherwise (Kahn's algorithm).
pub(crate) fn sort_by_dependencies(
    entries: Vec<PluginEntry>,
    already_built: &[PluginId],
) -> Result<Vec<PluginEntry>, BuildError> {
    let ids: Vec<PluginId> = entries.iter().map(|e| e.id).collect();

    let mut deps: Vec<Vec<usize>> = Vec::with_capacity(entries.len());
    for entry in &entries {
        let mut own = Vec::new();
        for dep in entry.plugin.dependencies() {
            if let Some(index) = ids.iter().position(|id| *id == dep) {
                own.push(index);
            } else if !already_built.contains(&dep) {
                return Err(BuildError::MissingDependency {
                    plugin: entry.plugin.name().to_string(),
                    dependency: dep.type_name().to_string(),
                });
            }
        }
        deps.push(own);
    }

    let mut in_degree: Vec<usize> = deps.iter().map(Vec::len).collect();
    let mut order = Vec::with_capacity(entries.len());
    let mut done = vec![false; entries.len()];
    while order.len() < entries.len() {
        let Some(next) = (0..entries.len()).find(|&i| !done[i] && in_degree[i] == 0) else {
            let cycle = (0..entries.len())
                .filter(|&i| !done[i])
                .map(|i| entries[i].plugin.name().to_string())
                .collect();
            return Err(BuildError::CircularDependency(cycle));
        };
        done[next] = true;
        order.push(next);
        for (i, own) in deps.iter().enumerate() {
            in_degree[i] -= own.iter().filter(|&&d| d == next).count();
        }
    }

    let mut slots: Vec<Option<PluginEntry>> = entries.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect())
}
