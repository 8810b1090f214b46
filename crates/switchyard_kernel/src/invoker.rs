//! Plan execution.
//!
//! The invoker walks a [`Plan`] phase by phase against one [`OpContext`],
//! owns the transaction boundary, and turns the first failure into an
//! [`ErrorEnvelope`].

use core::panic::AssertUnwindSafe;
use core::time::Duration;
use std::any::Any;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;

use crate::config::KernelConfig;
use crate::context::{CancelSignal, OpContext};
use crate::error::{ErrorCode, ErrorEnvelope, StepError};
use crate::persistence::{Persistence, StoreError};
use crate::phase::Phase;
use crate::plan::{Plan, PlannedStep, StepKind};
use crate::step::{Step, StepResult};
use crate::trace::{Outcome, Trace};

// ─────────────────────────────────────────────────────────────────────────────
// Transaction guard
// ─────────────────────────────────────────────────────────────────────────────

/// Tracks whether a transaction is open. If the invocation future is dropped
/// while one is, the rollback is spawned onto the current runtime.
struct TxGuard {
    persistence: Arc<dyn Persistence>,
    open: bool,
}

impl TxGuard {
    fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self {
            persistence,
            open: false,
        }
    }

    async fn begin(&mut self) -> StepResult {
        self.persistence
            .begin()
            .await
            .map_err(|err| StepError::internal("transaction begin failed").with_source(err))?;
        self.open = true;
        Ok(())
    }

    /// A failed commit leaves the guard open so the error path rolls back.
    /// A conflict detected at commit keeps its taxonomy code.
    async fn commit(&mut self) -> StepResult {
        self.persistence.commit().await.map_err(|err| match err {
            StoreError::Conflict { .. } => StepError::from(err),
            other => StepError::internal("transaction commit failed").with_source(other),
        })?;
        self.open = false;
        Ok(())
    }

    async fn rollback(&mut self, correlation_id: &str) {
        if !self.open {
            return;
        }
        self.open = false;
        match self.persistence.rollback().await {
            Ok(()) => tracing::warn!(correlation_id, "transaction rolled back"),
            Err(err) => tracing::error!(correlation_id, error = %err, "rollback failed"),
        }
    }
}

impl Drop for TxGuard {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        let persistence = Arc::clone(&self.persistence);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!("invocation dropped inside a transaction, rolling back");
                handle.spawn(async move {
                    if let Err(err) = persistence.rollback().await {
                        tracing::error!(error = %err, "rollback after drop failed");
                    }
                });
            }
            Err(_) => {
                tracing::error!("invocation dropped inside a transaction outside a runtime");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Invoker
// ─────────────────────────────────────────────────────────────────────────────

/// How the fatal part of a plan ended.
enum Halt {
    Failed(StepError),
    Cancelled,
}

/// Executes plans with one configuration.
pub(crate) struct Invoker<'k> {
    config: &'k KernelConfig,
}

impl<'k> Invoker<'k> {
    pub(crate) fn new(config: &'k KernelConfig) -> Self {
        Self { config }
    }

    /// Runs `plan` to completion and returns the trace with the outcome.
    pub(crate) async fn run(
        &self,
        plan: &Plan,
        mut ctx: OpContext,
        persistence: Arc<dyn Persistence>,
        mut cancel: Option<CancelSignal>,
    ) -> (Trace, Result<Value, ErrorEnvelope>) {
        let mut trace = Trace::default();
        let mut tx = TxGuard::new(persistence);
        let correlation_id = ctx.correlation_id().to_string();

        let halt = self
            .run_fatal(plan, &mut ctx, &mut tx, &mut cancel, &mut trace)
            .await;

        match halt {
            None => {
                for phase in [Phase::PostResponse, Phase::OnSuccess] {
                    self.run_nonfatal(plan, phase, &mut ctx, &mut trace).await;
                }
                let result = ctx.take_result().unwrap_or(Value::Null);
                tracing::debug!(%correlation_id, steps = trace.len(), "invocation succeeded");
                (trace, Ok(result))
            }
            Some(Halt::Cancelled) => {
                tx.rollback(&correlation_id).await;
                tracing::warn!(%correlation_id, "invocation cancelled");
                (trace, Err(ErrorEnvelope::cancelled(&correlation_id)))
            }
            Some(Halt::Failed(error)) => {
                tx.rollback(&correlation_id).await;
                if error.code() == ErrorCode::Internal {
                    tracing::error!(
                        %correlation_id,
                        detail = %error.detail_chain(),
                        fields = ?error.details(),
                        "invocation failed"
                    );
                } else {
                    tracing::debug!(%correlation_id, code = %error.code(), "invocation failed");
                }
                let envelope = ErrorEnvelope::from_step(
                    &error,
                    &correlation_id,
                    self.config.expose_error_detail(),
                );
                ctx.set_failure(envelope.clone());
                self.run_nonfatal(plan, Phase::OnError, &mut ctx, &mut trace)
                    .await;
                (trace, Err(envelope))
            }
        }
    }

    /// PRE_TX_SECDEP through END_TX. Stops at the first failure.
    async fn run_fatal(
        &self,
        plan: &Plan,
        ctx: &mut OpContext,
        tx: &mut TxGuard,
        cancel: &mut Option<CancelSignal>,
        trace: &mut Trace,
    ) -> Option<Halt> {
        for planned in plan.steps().iter().filter(|s| s.phase().is_fatal()) {
            let outcome = match cancel {
                Some(signal) => {
                    tokio::select! {
                        biased;
                        () = signal.cancelled() => None,
                        result = self.execute(planned, ctx, tx) => Some(result),
                    }
                }
                None => Some(self.execute(planned, ctx, tx).await),
            };

            match outcome {
                Some(Ok(())) => {
                    tracing::trace!(phase = %planned.phase(), label = planned.label(), "step ok");
                    trace.push(planned.phase(), planned.label(), Outcome::Ok);
                }
                Some(Err(error)) => {
                    tracing::debug!(
                        phase = %planned.phase(),
                        label = planned.label(),
                        code = %error.code(),
                        "step failed"
                    );
                    trace.push(planned.phase(), planned.label(), Outcome::Error);
                    return Some(Halt::Failed(error));
                }
                None => {
                    trace.push(planned.phase(), planned.label(), Outcome::Error);
                    return Some(Halt::Cancelled);
                }
            }
        }
        None
    }

    /// Runs one phase whose failures are logged and recorded as skipped.
    async fn run_nonfatal(
        &self,
        plan: &Plan,
        phase: Phase,
        ctx: &mut OpContext,
        trace: &mut Trace,
    ) {
        for planned in plan.phase_steps(phase) {
            let StepKind::Run(step) = planned.kind() else {
                continue;
            };
            match self.run_step(step, ctx).await {
                Ok(()) => trace.push(phase, planned.label(), Outcome::Ok),
                Err(error) => {
                    tracing::warn!(
                        correlation_id = ctx.correlation_id(),
                        %phase,
                        label = planned.label(),
                        error = %error.detail_chain(),
                        "nonfatal step failed"
                    );
                    trace.push(phase, planned.label(), Outcome::Skipped);
                }
            }
        }
    }

    async fn execute(
        &self,
        planned: &PlannedStep,
        ctx: &mut OpContext,
        tx: &mut TxGuard,
    ) -> StepResult {
        match planned.kind() {
            StepKind::Begin => tx.begin().await,
            StepKind::Commit => tx.commit().await,
            StepKind::Run(step) => {
                let result = self.run_step(step, ctx).await;
                if planned.phase().is_pre_tx() {
                    result.map_err(StepError::into_authorization)
                } else {
                    result
                }
            }
        }
    }

    /// Runs a step with panic capture and the configured timeout.
    async fn run_step(&self, step: &Arc<dyn Step>, ctx: &mut OpContext) -> StepResult {
        // The call to `run` sits inside the future so synchronous panics are
        // caught too.
        let guarded = AssertUnwindSafe(async { step.run(ctx).await }).catch_unwind();
        let caught = match self.config.step_timeout() {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(caught) => caught,
                Err(_) => return Err(timed_out(limit)),
            },
            None => guarded.await,
        };
        caught.unwrap_or_else(|panic| {
            Err(StepError::internal(format!(
                "step panicked: {}",
                panic_message(&*panic)
            )))
        })
    }
}

fn timed_out(limit: Duration) -> StepError {
    StepError::internal(format!("step timed out after {limit:?}"))
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
