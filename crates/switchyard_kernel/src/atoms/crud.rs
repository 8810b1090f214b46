//! Canonical handlers over the [`Store`] primitives.
//!
//! Items are JSON objects keyed by an `id` field. Bulk verbs run item by
//! item; the invoker's single transaction makes them all-or-nothing.

use core::cmp::Ordering;

use serde_json::{Map, Value, json};
use switchyard_ops::Target;

use crate::context::OpContext;
use crate::error::StepError;
use crate::persistence::{Store, StoreError};
use crate::step::StepResult;

/// Path parameter carrying the addressed item id.
pub const ITEM_ID: &str = "item_id";

const SORT: &str = "sort";
const SKIP: &str = "skip";
const LIMIT: &str = "limit";

/// Returns the string form of a scalar id.
#[must_use]
pub fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Dispatches to the handler for the context's target.
pub(crate) async fn handle(ctx: &mut OpContext) -> StepResult {
    let resource = ctx.resource().to_string();
    let payload = ctx.payload().clone();
    let store = ctx.store();

    let result = match ctx.target() {
        Target::Create => create(store, &resource, payload).await?,
        Target::Read => store.fetch(&resource, &item_id(ctx)?).await?,
        Target::Update => update(store, &resource, &item_id(ctx)?, payload).await?,
        Target::Replace => replace(store, &resource, &item_id(ctx)?, payload).await?,
        Target::Merge => merge(store, &resource, &item_id(ctx)?, payload).await?,
        Target::Delete => {
            store.remove(&resource, &item_id(ctx)?).await?;
            json!({ "deleted": 1 })
        }
        Target::List => Value::Array(list(store, &resource, &payload).await?),
        Target::Clear => clear(store, &resource, &payload).await?,
        Target::BulkCreate => {
            let mut out = Vec::new();
            for item in items(payload) {
                out.push(create(store, &resource, item).await?);
            }
            Value::Array(out)
        }
        Target::BulkUpdate | Target::BulkReplace | Target::BulkMerge => {
            let mut out = Vec::new();
            for (index, item) in items(payload).into_iter().enumerate() {
                let Some(id) = item.get("id").and_then(id_of) else {
                    return Err(StepError::validation("bulk item is missing an id")
                        .with_detail(format!("[{index}].id"), "required", "id is required"));
                };
                let written = match ctx.target() {
                    Target::BulkUpdate => update(store, &resource, &id, item).await?,
                    Target::BulkReplace => replace(store, &resource, &id, item).await?,
                    _ => merge(store, &resource, &id, item).await?,
                };
                out.push(written);
            }
            Value::Array(out)
        }
        Target::BulkDelete => {
            let mut deleted = 0_u64;
            for entry in items(payload) {
                let id = match &entry {
                    Value::Object(obj) => obj.get("id").and_then(id_of),
                    scalar => id_of(scalar),
                };
                let Some(id) = id else {
                    return Err(StepError::validation("bulk_delete takes a list of ids"));
                };
                match store.remove(&resource, &id).await {
                    Ok(_) => deleted += 1,
                    Err(StoreError::NotFound { .. }) => {}
                    Err(err) => return Err(err.into()),
                }
            }
            json!({ "deleted": deleted })
        }
        Target::Custom(name) => {
            return Err(StepError::internal(format!(
                "custom operation '{name}' has no handler"
            )));
        }
    };

    ctx.set_result(result);
    Ok(())
}

fn item_id(ctx: &OpContext) -> Result<String, StepError> {
    ctx.path_param(ITEM_ID)
        .map(str::to_string)
        .ok_or_else(|| {
            StepError::validation("missing item id").with_detail("id", "required", "item id is required")
        })
}

fn items(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn object(value: Value) -> Result<Map<String, Value>, StepError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StepError::validation("expected an object").with_detail(
            "",
            "type",
            "item must be an object",
        )),
    }
}

async fn create(store: &dyn Store, resource: &str, item: Value) -> Result<Value, StepError> {
    let mut item = object(item)?;
    let id = match item.get("id").and_then(id_of) {
        Some(id) => id,
        None => {
            let id = nanoid::nanoid!();
            item.insert("id".to_string(), Value::String(id.clone()));
            id
        }
    };
    Ok(store.insert(resource, &id, Value::Object(item)).await?)
}

async fn update(
    store: &dyn Store,
    resource: &str,
    id: &str,
    patch: Value,
) -> Result<Value, StepError> {
    let patch = object(patch)?;
    let mut current = object(store.fetch(resource, id).await?)?;
    for (key, value) in patch {
        if key != "id" {
            current.insert(key, value);
        }
    }
    Ok(store.write(resource, id, Value::Object(current)).await?)
}

async fn replace(
    store: &dyn Store,
    resource: &str,
    id: &str,
    body: Value,
) -> Result<Value, StepError> {
    let mut body = object(body)?;
    let current = store.fetch(resource, id).await?;
    let stored_id = current.get("id").cloned().unwrap_or_else(|| Value::String(id.to_string()));
    body.insert("id".to_string(), stored_id);
    Ok(store.write(resource, id, Value::Object(body)).await?)
}

async fn merge(
    store: &dyn Store,
    resource: &str,
    id: &str,
    patch: Value,
) -> Result<Value, StepError> {
    match store.fetch(resource, id).await {
        Ok(mut current) => {
            let stored_id = current.get("id").cloned();
            merge_patch(&mut current, &patch);
            if let (Some(stored_id), Value::Object(map)) = (stored_id, &mut current) {
                map.insert("id".to_string(), stored_id);
            }
            Ok(store.write(resource, id, current).await?)
        }
        Err(StoreError::NotFound { .. }) => {
            let mut fresh = Value::Object(Map::new());
            merge_patch(&mut fresh, &patch);
            if let Value::Object(map) = &mut fresh {
                map.insert("id".to_string(), Value::String(id.to_string()));
            }
            Ok(store.insert(resource, id, fresh).await?)
        }
        Err(err) => Err(err.into()),
    }
}

/// RFC 7396 JSON merge patch.
pub(crate) fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

async fn list(store: &dyn Store, resource: &str, query: &Value) -> Result<Vec<Value>, StepError> {
    let filters = filters(query);
    let mut rows: Vec<Value> = store
        .scan(resource)
        .await?
        .into_iter()
        .filter(|row| matches_filters(row, &filters))
        .collect();

    if let Some(sort) = query.get(SORT).and_then(Value::as_str) {
        let (field, descending) = match sort.strip_prefix('-') {
            Some(field) => (field, true),
            None => (sort, false),
        };
        rows.sort_by(|a, b| {
            let ord = compare(a.get(field), b.get(field));
            if descending { ord.reverse() } else { ord }
        });
    }

    let skip = query.get(SKIP).and_then(as_count).unwrap_or(0);
    let limit = query.get(LIMIT).and_then(as_count).unwrap_or(usize::MAX);
    Ok(rows.into_iter().skip(skip).take(limit).collect())
}

async fn clear(store: &dyn Store, resource: &str, query: &Value) -> Result<Value, StepError> {
    let filters = filters(query);
    let mut deleted = 0_u64;
    for row in store.scan(resource).await? {
        if !matches_filters(&row, &filters) {
            continue;
        }
        if let Some(id) = row.get("id").and_then(id_of) {
            store.remove(resource, &id).await?;
            deleted += 1;
        }
    }
    Ok(json!({ "deleted": deleted }))
}

fn filters(query: &Value) -> Vec<(&str, &Value)> {
    query
        .as_object()
        .map(|map| {
            map.iter()
                .filter(|(key, _)| !matches!(key.as_str(), SORT | SKIP | LIMIT))
                .map(|(key, value)| (key.as_str(), value))
                .collect()
        })
        .unwrap_or_default()
}

fn matches_filters(row: &Value, filters: &[(&str, &Value)]) -> bool {
    filters
        .iter()
        .all(|(field, expected)| row.get(*field).is_some_and(|actual| loosely_equal(actual, expected)))
}

/// Equality that tolerates query-string filters: `"7"` matches `7`.
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::Number(n), Value::String(s)) => n.to_string() == *s,
        (Value::Bool(b), Value::String(s)) => b.to_string() == *s,
        _ => false,
    }
}

/// Non-negative count from a number or numeric string. Negatives clamp to 0.
fn as_count(value: &Value) -> Option<usize> {
    let n = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    Some(usize::try_from(n.max(0)).unwrap_or(usize::MAX))
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
