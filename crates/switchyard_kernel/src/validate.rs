//! Validation and serialization collaborator.

use serde_json::Value;
use switchyard_ops::OperationSpec;

use crate::error::{FieldError, StepError};

/// Per-resource payload validation and result shaping.
///
/// `validate_in` is called by the `atom:wire:validate_in` step at
/// `PRE_HANDLER` for write verbs, once per item for bulk verbs.
/// `serialize_out` is called by `atom:wire:dump` at `POST_HANDLER`.
pub trait Validator: Send + Sync + 'static {
    /// Checks one inbound item.
    ///
    /// # Errors
    ///
    /// Every field-level failure found.
    fn validate_in(&self, spec: &OperationSpec, item: &Value) -> Result<(), Vec<FieldError>>;

    /// Shapes the handler's result before it is returned. Identity by
    /// default.
    ///
    /// # Errors
    ///
    /// Any failure aborts the invocation before commit.
    fn serialize_out(&self, _spec: &OperationSpec, result: Value) -> Result<Value, StepError> {
        Ok(result)
    }
}
