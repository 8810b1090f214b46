//! Payload shaping atoms: `build_in`, `validate_in`, `dump`.

use serde_json::{Map, Value};
use switchyard_ops::{Arity, Target};

use super::crud::{ITEM_ID, id_of};
use crate::context::OpContext;
use crate::error::{FieldError, StepError};
use crate::step::StepResult;

/// Normalizes the payload and enforces its shape before the transaction
/// opens.
///
/// - bulk verbs need an array; `bulk_delete` also takes `{"ids": [...]}`
/// - everything else needs an object (`null` becomes `{}`)
/// - member verbs need an item id, from the path or from `payload.id`
pub(crate) fn build_in(ctx: &mut OpContext) -> StepResult {
    let target = ctx.target().clone();

    if target == Target::BulkDelete
        && let Some(ids) = ctx.payload_mut().get_mut("ids").map(Value::take)
    {
        ctx.set_payload(ids);
    }

    if target.is_bulk() {
        if !ctx.payload().is_array() {
            return Err(StepError::validation("expected an array payload")
                .with_detail("", "type", "bulk operations take a list of items"));
        }
    } else if ctx.payload().is_null() {
        ctx.set_payload(Value::Object(Map::new()));
    } else if !ctx.payload().is_object() {
        return Err(StepError::validation("expected an object payload")
            .with_detail("", "type", "payload must be an object"));
    }

    if ctx.spec().arity() == Arity::Member && ctx.path_param(ITEM_ID).is_none() {
        let Some(id) = ctx.payload().get("id").and_then(id_of) else {
            return Err(StepError::validation("missing item id")
                .with_detail("id", "required", "item id is required"));
        };
        ctx.set_path_param(ITEM_ID, id);
    }
    Ok(())
}

/// Runs the resource validator over the payload, item by item for bulk verbs.
pub(crate) fn validate_in(ctx: &mut OpContext) -> StepResult {
    let Some(validator) = ctx.validator() else {
        return Ok(());
    };
    let spec = ctx.spec();
    let errors: Vec<FieldError> = match ctx.payload() {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .flat_map(|(index, item)| {
                let prefix = format!("[{index}]");
                validator
                    .validate_in(spec, item)
                    .err()
                    .unwrap_or_default()
                    .into_iter()
                    .map(move |e| e.prefixed(&prefix))
            })
            .collect(),
        item => validator.validate_in(spec, item).err().unwrap_or_default(),
    };
    if errors.is_empty() {
        Ok(())
    } else {
        Err(StepError::validation("payload failed validation").with_details(errors))
    }
}

/// Passes the handler's result through the resource serializer.
pub(crate) fn dump(ctx: &mut OpContext) -> StepResult {
    let Some(result) = ctx.take_result() else {
        return Ok(());
    };
    let shaped = match ctx.validator() {
        Some(validator) => validator.serialize_out(ctx.spec(), result)?,
        None => result,
    };
    ctx.set_result(shaped);
    Ok(())
}
