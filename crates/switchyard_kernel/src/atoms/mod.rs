//! Framework-seeded steps.
//!
//! Atoms are injected into every plan whose operation they apply to,
//! independently of user hooks. Within a phase they always run before user
//! hooks, in the order they were added to the registry.
//!
//! The canonical set:
//!
//! | label | applies to |
//! |-------|------------|
//! | `atom:wire:build_in@PRE_TX_BEGIN` | canonical verbs |
//! | `atom:wire:validate_in@PRE_HANDLER` | write verbs |
//! | `atom:crud:<verb>@HANDLER` | the matching canonical verb |
//! | `atom:wire:dump@POST_HANDLER` | canonical verbs |

mod crud;
mod wire;

use core::fmt;
use std::sync::Arc;

use switchyard_ops::{OperationSpec, Target};
use thiserror::Error;

use crate::label;
use crate::phase::Phase;
use crate::step::{Step, from_fn, from_sync};

pub use crud::{ITEM_ID, id_of};

/// Decides whether an atom applies to an operation.
pub type AtomFilter = Arc<dyn Fn(&OperationSpec) -> bool + Send + Sync>;

/// One framework step and the operations it is injected into.
#[derive(Clone)]
pub struct Atom {
    phase: Phase,
    label: String,
    filter: AtomFilter,
    step: Arc<dyn Step>,
}

impl Atom {
    /// Creates an atom labeled `atom:<domain>:<subject>@<PHASE>`.
    pub fn new<F>(domain: &str, subject: &str, phase: Phase, filter: F, step: impl Step) -> Self
    where
        F: Fn(&OperationSpec) -> bool + Send + Sync + 'static,
    {
        Self {
            phase,
            label: label::atom(domain, subject, phase),
            filter: Arc::new(filter),
            step: Arc::new(step),
        }
    }

    /// The phase the atom runs in.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
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

    /// Returns true if the atom is injected into `spec`'s plan.
    #[must_use]
    pub fn applies_to(&self, spec: &OperationSpec) -> bool {
        (self.filter)(spec)
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("phase", &self.phase)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Returned when two atoms share a label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("atom '{0}' is already registered")]
pub struct DuplicateAtom(pub String);

/// Ordered atom storage.
#[derive(Debug, Clone, Default)]
pub struct AtomRegistry {
    atoms: Vec<Atom>,
}

impl AtomRegistry {
    /// A registry with no atoms. Plans built from it contain only hooks and
    /// transaction markers.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The canonical wire and CRUD atoms.
    #[must_use]
    pub fn canonical() -> Self {
        let mut atoms = vec![
            Atom::new(
                "wire",
                "build_in",
                Phase::PreTxBegin,
                |spec: &OperationSpec| spec.target().is_canonical(),
                from_sync(wire::build_in),
            ),
            Atom::new(
                "wire",
                "validate_in",
                Phase::PreHandler,
                |spec: &OperationSpec| spec.target().is_write(),
                from_sync(wire::validate_in),
            ),
        ];
        for target in Target::CANONICAL {
            let subject = target.name().to_string();
            atoms.push(Atom::new(
                "crud",
                &subject,
                Phase::Handler,
                move |spec: &OperationSpec| spec.target() == &target,
                from_fn(|ctx| Box::pin(crud::handle(ctx))),
            ));
        }
        atoms.push(Atom::new(
            "wire",
            "dump",
            Phase::PostHandler,
            |spec: &OperationSpec| spec.target().is_canonical(),
            from_sync(wire::dump),
        ));
        Self { atoms }
    }

    /// Appends an atom.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateAtom`] if the label is taken.
    pub fn register(&mut self, atom: Atom) -> Result<(), DuplicateAtom> {
        if self.atoms.iter().any(|a| a.label == atom.label) {
            return Err(DuplicateAtom(atom.label));
        }
        self.atoms.push(atom);
        Ok(())
    }

    /// Atoms for `spec` in `phase`, in registration order.
    pub fn matching<'a>(
        &'a self,
        spec: &'a OperationSpec,
        phase: Phase,
    ) -> impl Iterator<Item = &'a Atom> + 'a {
        self.atoms
            .iter()
            .filter(move |a| a.phase == phase && a.applies_to(spec))
    }

    /// Every atom.
    #[must_use]
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }
}
