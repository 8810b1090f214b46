//! Plan assembly.
//!
//! A [`Plan`] is the materialized, ordered step list for one operation. It
//! is built from three sources:
//!
//! 1. transaction markers, for persistent operations
//! 2. atoms from the [`AtomRegistry`]
//! 3. hooks from the [`HookTable`]
//!
//! Within a phase the order is always marker, then atoms, then hooks. The
//! registered handler, when there is one, stands in for the `HANDLER` atoms.
//! Given the same registries a plan is always identical.

use core::fmt;
use std::sync::Arc;

use switchyard_ops::OperationSpec;

use crate::atoms::AtomRegistry;
use crate::hooks::HookTable;
use crate::label;
use crate::phase::Phase;
use crate::step::Step;

/// What a plan entry does when reached.
#[derive(Clone)]
pub enum StepKind {
    /// Run a step.
    Run(Arc<dyn Step>),
    /// Open the transaction.
    Begin,
    /// Commit the transaction.
    Commit,
}

impl fmt::Debug for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Run(_) => f.write_str("Run(..)"),
            StepKind::Begin => f.write_str("Begin"),
            StepKind::Commit => f.write_str("Commit"),
        }
    }
}

/// One labeled plan entry.
#[derive(Debug, Clone)]
pub struct PlannedStep {
    phase: Phase,
    label: String,
    kind: StepKind,
}

impl PlannedStep {
    /// The phase the entry runs in.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The trace label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// What the entry does.
    #[must_use]
    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    /// The `"PHASE:label"` introspection form.
    #[must_use]
    pub fn qualified(&self) -> String {
        label::qualified(self.phase, &self.label)
    }
}

/// The ordered step list for one `(resource, alias)`.
#[derive(Debug, Clone)]
pub struct Plan {
    spec: Arc<OperationSpec>,
    steps: Vec<PlannedStep>,
}

impl Plan {
    /// Assembles the plan for `spec`.
    #[must_use]
    pub fn build(spec: Arc<OperationSpec>, atoms: &AtomRegistry, hooks: &HookTable) -> Self {
        let resource = spec.resource();
        let alias = spec.alias();
        let persistent = spec.is_persistent();
        let handler = hooks.handler(resource, alias);
        let mut steps = Vec::new();

        for phase in Phase::ALL {
            match phase {
                Phase::StartTx if persistent => steps.push(PlannedStep {
                    phase,
                    label: label::TXN_BEGIN.to_string(),
                    kind: StepKind::Begin,
                }),
                Phase::EndTx if persistent => steps.push(PlannedStep {
                    phase,
                    label: label::TXN_COMMIT.to_string(),
                    kind: StepKind::Commit,
                }),
                _ => {}
            }

            match (phase, handler) {
                (Phase::Handler, Some(entry)) => steps.push(PlannedStep {
                    phase,
                    label: entry.label().to_string(),
                    kind: StepKind::Run(Arc::clone(entry.step())),
                }),
                _ => steps.extend(atoms.matching(&spec, phase).map(|atom| PlannedStep {
                    phase,
                    label: atom.label().to_string(),
                    kind: StepKind::Run(Arc::clone(atom.step())),
                })),
            }

            steps.extend(hooks.matching(resource, alias, phase).map(|entry| PlannedStep {
                phase,
                label: entry.label().to_string(),
                kind: StepKind::Run(Arc::clone(entry.step())),
            }));
        }

        tracing::debug!(
            resource,
            alias,
            persistent,
            steps = steps.len(),
            "plan built"
        );

        Self { spec, steps }
    }

    /// The operation this plan executes.
    #[must_use]
    pub fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    pub(crate) fn spec_arc(&self) -> Arc<OperationSpec> {
        Arc::clone(&self.spec)
    }

    /// Every entry, in execution order.
    #[must_use]
    pub fn steps(&self) -> &[PlannedStep] {
        &self.steps
    }

    /// Entries of one phase.
    pub fn phase_steps(&self, phase: Phase) -> impl Iterator<Item = &PlannedStep> {
        self.steps.iter().filter(move |s| s.phase == phase)
    }

    /// Returns true if the plan contains transaction markers.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s.kind, StepKind::Begin))
    }

    /// `"PHASE:label"` strings, in execution order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.steps.iter().map(PlannedStep::qualified).collect()
    }
}
