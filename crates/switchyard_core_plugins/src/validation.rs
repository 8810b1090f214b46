//! A field-presence [`Validator`] and the plugin that installs it.

use serde_json::Value;
use switchyard_kernel::{BuildError, FieldError, KernelBuilder, Plugin, Validator};
use switchyard_ops::{OperationSpec, Target};

/// Requires fields on inbound items.
///
/// Creating and replacing verbs need every required field present and
/// non-null. Partial verbs (`update`, `merge` and their bulk forms) may
/// omit a required field but may not set it to `null`.
///
/// ```
/// use serde_json::json;
/// use switchyard_core_plugins::RequiredFields;
/// use switchyard_kernel::Validator;
/// use switchyard_ops::{OperationSpec, Target};
///
/// let validator = RequiredFields::new(["name"]);
/// let create = OperationSpec::canonical(Target::Create);
/// let errors = validator
///     .validate_in(&create, &json!({"colour": "red"}))
///     .expect_err("name is missing");
/// assert_eq!(errors[0].field, "name");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequiredFields {
    fields: Vec<String>,
}

impl RequiredFields {
    /// Requires each of `fields`.
    #[must_use]
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// The required field names.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

fn is_partial(target: &Target) -> bool {
    matches!(
        target,
        Target::Update | Target::Merge | Target::BulkUpdate | Target::BulkMerge
    )
}

impl Validator for RequiredFields {
    fn validate_in(&self, spec: &OperationSpec, item: &Value) -> Result<(), Vec<FieldError>> {
        let Some(object) = item.as_object() else {
            return Err(vec![FieldError::new("", "type", "expected an object")]);
        };
        let partial = is_partial(spec.target());
        let errors: Vec<FieldError> = self
            .fields
            .iter()
            .filter_map(|field| match object.get(field) {
                None if partial => None,
                None => Some(FieldError::new(field, "missing", "field is required")),
                Some(Value::Null) => Some(FieldError::new(field, "null", "field may not be null")),
                Some(_) => None,
            })
            .collect();
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ValidationPlugin
// ─────────────────────────────────────────────────────────────────────────────

/// Installs [`RequiredFields`] validators per resource.
///
/// Validators are set during `build()`. `ready()` then checks that every
/// named resource was registered by some plugin or by the host.
#[derive(Debug, Clone, Default)]
pub struct ValidationPlugin {
    rules: Vec<(String, RequiredFields)>,
}

impl ValidationPlugin {
    /// A plugin with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `fields` on `resource`. A later call for the same resource
    /// replaces the earlier one.
    #[must_use]
    pub fn require<I, S>(mut self, resource: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let resource = resource.into();
        self.rules.retain(|(name, _)| *name != resource);
        self.rules.push((resource, RequiredFields::new(fields)));
        self
    }
}

impl Plugin for ValidationPlugin {
    fn build(&self, kernel: &mut KernelBuilder) -> Result<(), BuildError> {
        for (resource, rule) in &self.rules {
            kernel.set_validator(resource, rule.clone());
        }
        Ok(())
    }

    fn ready(&self, kernel: &mut KernelBuilder) -> Result<(), BuildError> {
        for (resource, _) in &self.rules {
            if kernel.resolver().resource(resource).is_none() {
                return Err(BuildError::Plugin {
                    plugin: self.name().to_string(),
                    message: format!("validator for unknown resource {resource}"),
                });
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "switchyard::validation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codes(result: Result<(), Vec<FieldError>>) -> Vec<String> {
        result
            .err()
            .unwrap_or_default()
            .into_iter()
            .map(|e| format!("{}:{}", e.field, e.code))
            .collect()
    }

    #[test]
    fn create_requires_every_field() {
        let validator = RequiredFields::new(["name", "colour"]);
        let spec = OperationSpec::canonical(Target::Create);
        assert_eq!(
            codes(validator.validate_in(&spec, &json!({"colour": null}))),
            vec!["name:missing", "colour:null"]
        );
        assert!(validator.validate_in(&spec, &json!({"name": "w", "colour": "red"})).is_ok());
    }

    #[test]
    fn partial_verbs_allow_omission_but_not_null() {
        let validator = RequiredFields::new(["name"]);
        let spec = OperationSpec::canonical(Target::Merge);
        assert!(validator.validate_in(&spec, &json!({"colour": "red"})).is_ok());
        assert_eq!(
            codes(validator.validate_in(&spec, &json!({"name": null}))),
            vec!["name:null"]
        );
    }

    #[test]
    fn replace_is_not_partial() {
        let validator = RequiredFields::new(["name"]);
        let spec = OperationSpec::canonical(Target::Replace);
        assert_eq!(codes(validator.validate_in(&spec, &json!({}))), vec!["name:missing"]);
    }

    #[test]
    fn plugin_rejects_unknown_resources() {
        let result = switchyard_kernel::Kernel::builder()
            .add_plugins(ValidationPlugin::new().require("Gadget", ["name"]))
            .finish();
        assert!(matches!(result, Err(BuildError::Plugin { .. })));
    }

    #[test]
    fn plugin_installs_validators() {
        let mut builder = switchyard_kernel::Kernel::builder();
        builder
            .register_resource(
                switchyard_ops::ResourceDef::new("Widget")
                    .with_canonical_ops()
                    .expect("canonical ops should register"),
            )
            .expect("Widget should register");
        let kernel = builder
            .add_plugins(ValidationPlugin::new().require("Widget", ["name"]))
            .finish()
            .expect("kernel should build");
        assert!(kernel.validator_for("Widget").is_some());
        assert!(kernel.validator_for("Gadget").is_none());
    }

    #[test]
    fn non_objects_are_rejected() {
        let validator = RequiredFields::default();
        let spec = OperationSpec::canonical(Target::Create);
        assert_eq!(codes(validator.validate_in(&spec, &json!([1]))), vec![":type"]);
    }
}
