//! Step template merging
//!
//! A Task may declare a step template: container defaults that every step
//! inherits unless it overrides them.

use k8s_openapi::api::core::v1::Container;
use serde_json::{Map, Value};
use steprun_common::crd::Step;

/// A step could not be merged onto the template
#[derive(Debug, thiserror::Error)]
#[error("failed to merge step template into step {step}: {source}")]
pub struct StepTemplateError {
    /// Index of the step that failed
    pub step: usize,
    #[source]
    pub source: serde_json::Error,
}

/// Applies a step template to every step
pub trait StepTemplateMerger: Send + Sync {
    /// Merge each step onto `template`, returning the steps in the same order
    fn merge(
        &self,
        template: Option<&Container>,
        steps: Vec<Step>,
    ) -> Result<Vec<Step>, StepTemplateError>;
}

/// Array fields merged element-wise by a key instead of replaced
const KEYED_ARRAYS: &[(&str, &str)] = &[
    ("env", "name"),
    ("volumeMounts", "mountPath"),
    ("ports", "containerPort"),
];

/// Deep-merges steps onto the template through their JSON form
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonStepTemplateMerger;

impl StepTemplateMerger for JsonStepTemplateMerger {
    fn merge(
        &self,
        template: Option<&Container>,
        steps: Vec<Step>,
    ) -> Result<Vec<Step>, StepTemplateError> {
        let Some(template) = template else {
            return Ok(steps);
        };

        let base = serde_json::to_value(template)
            .map_err(|source| StepTemplateError { step: 0, source })?;

        steps
            .into_iter()
            .enumerate()
            .map(|(index, step)| {
                let wrap = |source| StepTemplateError {
                    step: index,
                    source,
                };
                let script = step.script.clone();
                let overlay = serde_json::to_value(&step.container).map_err(wrap)?;
                let mut merged = base.clone();
                merge_value(&mut merged, overlay);
                let container: Container = serde_json::from_value(merged).map_err(wrap)?;
                Ok(Step { container, script })
            })
            .collect()
    }
}

fn merge_value(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => merge_object(base, overlay),
        (base, overlay) => *base = overlay,
    }
}

fn merge_object(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (field, value) in overlay {
        let key = KEYED_ARRAYS
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, key)| *key);

        match (base.get_mut(&field), key, value) {
            (Some(Value::Array(existing)), Some(key), Value::Array(items)) => {
                merge_keyed(existing, items, key);
            }
            (Some(existing), _, value) => merge_value(existing, value),
            (None, _, value) => {
                base.insert(field, value);
            }
        }
    }
}

/// Items with a matching key merge into the template entry in place; the rest
/// are appended in step order.
fn merge_keyed(existing: &mut Vec<Value>, items: Vec<Value>, key: &str) {
    for item in items {
        let position = item
            .get(key)
            .and_then(|k| existing.iter().position(|e| e.get(key) == Some(k)));
        match position {
            Some(i) => merge_value(&mut existing[i], item),
            None => existing.push(item),
        }
    }
}
