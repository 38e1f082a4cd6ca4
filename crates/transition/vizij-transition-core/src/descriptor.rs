//! Transition descriptors returned by enter/update/leave providers.
//!
//! A descriptor is either nothing, a single step, or an ordered list of steps
//! played back to back. Each step maps attribute names to targets and may carry
//! step-level timing plus per-attribute overrides.

use hashbrown::HashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::interp::Easing;
use crate::value::Value;

/// Optional timing; unset fields fall through to the next level
/// (attribute → step → [`crate::Config`]).
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub easing: Option<Easing>,
}

impl Timing {
    /// Field-wise fallback.
    #[inline]
    pub fn or(self, fallback: Timing) -> Timing {
        Timing {
            duration: self.duration.or(fallback.duration),
            delay: self.delay.or(fallback.delay),
            easing: self.easing.or(fallback.easing),
        }
    }

    fn from_json(json: &JsonValue) -> Timing {
        let num = |name: &str| json.get(name).and_then(JsonValue::as_f64).map(|v| v as f32);
        Timing {
            duration: num("duration"),
            delay: num("delay"),
            easing: json
                .get("easing")
                .or_else(|| json.get("ease"))
                .and_then(Easing::from_json),
        }
    }
}

/// How one attribute reaches its target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Target {
    /// Applied when the step starts, no interpolation.
    Set(Value),
    /// Tween from the attribute's current value.
    To(Value),
    /// Snap to the first value, then tween to the second.
    FromTo(Value, Value),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub targets: IndexMap<String, Target>,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub attr_timing: HashMap<String, Timing>,
}

impl Step {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, attr: &str, value: impl Into<Value>) -> Self {
        self.targets.insert(attr.to_string(), Target::Set(value.into()));
        self
    }

    pub fn to(mut self, attr: &str, value: impl Into<Value>) -> Self {
        self.targets.insert(attr.to_string(), Target::To(value.into()));
        self
    }

    pub fn from_to(mut self, attr: &str, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        self.targets
            .insert(attr.to_string(), Target::FromTo(from.into(), to.into()));
        self
    }

    pub fn duration(mut self, seconds: f32) -> Self {
        self.timing.duration = Some(seconds);
        self
    }

    pub fn delay(mut self, seconds: f32) -> Self {
        self.timing.delay = Some(seconds);
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.timing.easing = Some(easing);
        self
    }

    /// Override timing for a single attribute of this step.
    pub fn attr(mut self, attr: &str, timing: Timing) -> Self {
        self.attr_timing.insert(attr.to_string(), timing);
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Effective timing for `attr`, before config defaults are applied.
    pub fn timing_for(&self, attr: &str) -> Timing {
        match self.attr_timing.get(attr) {
            Some(t) => t.or(self.timing),
            None => self.timing,
        }
    }

    /// Parse one step object. Returns `None` if `json` is not an object or an
    /// attribute value cannot be understood.
    ///
    /// Shape: `{ "x": [10], "label": "a", "y": [0, 5], "timing": { .. } }` where
    /// a bare value is `Set`, a one-element array is `To` and a two-element
    /// array is `FromTo`. `timing` may hold `duration`, `delay`, `easing` and an
    /// `attributes` object of per-attribute overrides.
    pub fn from_json(json: &JsonValue) -> Option<Step> {
        let obj = json.as_object()?;
        let mut step = Step::new();
        for (name, raw) in obj {
            if name == "timing" {
                step.timing = Timing::from_json(raw);
                if let Some(attrs) = raw.get("attributes").and_then(JsonValue::as_object) {
                    for (attr, t) in attrs {
                        step.attr_timing.insert(attr.clone(), Timing::from_json(t));
                    }
                }
                continue;
            }
            let target = match raw {
                JsonValue::Array(parts) if parts.len() == 1 => {
                    Target::To(Value::from_json(&parts[0])?)
                }
                JsonValue::Array(parts) if parts.len() == 2 => Target::FromTo(
                    Value::from_json(&parts[0])?,
                    Value::from_json(&parts[1])?,
                ),
                other => Target::Set(Value::from_json(other)?),
            };
            step.targets.insert(name.clone(), target);
        }
        Some(step)
    }
}

/// What a record should animate toward.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Descriptor {
    /// Nothing to animate; the transition completes immediately.
    #[default]
    None,
    Single(Step),
    Steps(Vec<Step>),
}

impl Descriptor {
    /// Normalized view: every descriptor is an ordered list of steps.
    pub fn steps(&self) -> &[Step] {
        match self {
            Descriptor::None => &[],
            Descriptor::Single(step) => std::slice::from_ref(step),
            Descriptor::Steps(steps) => steps,
        }
    }

    /// True when no step has any target.
    pub fn is_empty(&self) -> bool {
        self.steps().iter().all(Step::is_empty)
    }

    /// Build a descriptor from caller-supplied JSON: an object is one step, an
    /// array of objects is a step sequence. Malformed input degrades to
    /// [`Descriptor::None`] so a bad provider cannot stall a record.
    pub fn from_json(json: &JsonValue) -> Descriptor {
        let parsed = match json {
            JsonValue::Object(_) => Step::from_json(json).map(Descriptor::Single),
            JsonValue::Array(items) => items
                .iter()
                .map(Step::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Descriptor::Steps),
            JsonValue::Null => return Descriptor::None,
            _ => None,
        };
        parsed.unwrap_or_else(|| {
            log::warn!("ignoring malformed transition descriptor: {json}");
            Descriptor::None
        })
    }
}

impl From<Step> for Descriptor {
    fn from(step: Step) -> Self {
        Descriptor::Single(step)
    }
}

impl From<Vec<Step>> for Descriptor {
    fn from(steps: Vec<Step>) -> Self {
        Descriptor::Steps(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_and_sequence_normalize_to_steps() {
        let single: Descriptor = Step::new().to("x", 1.0).into();
        assert_eq!(single.steps().len(), 1);

        let seq: Descriptor = vec![Step::new().to("x", 1.0), Step::new().to("x", 2.0)].into();
        assert_eq!(seq.steps().len(), 2);

        assert!(Descriptor::None.steps().is_empty());
        assert!(Descriptor::None.is_empty());
    }

    #[test]
    fn attribute_timing_overrides_step_timing() {
        let step = Step::new()
            .to("x", 1.0)
            .to("y", 1.0)
            .duration(2.0)
            .delay(0.5)
            .attr(
                "y",
                Timing {
                    duration: Some(1.0),
                    ..Timing::default()
                },
            );
        assert_eq!(step.timing_for("x").duration, Some(2.0));
        let y = step.timing_for("y");
        assert_eq!(y.duration, Some(1.0));
        assert_eq!(y.delay, Some(0.5));
    }

    #[test]
    fn parses_json_object_as_single_step() {
        let d = Descriptor::from_json(&json!({
            "opacity": [1.0],
            "x": [0.0, 10.0],
            "label": "hello",
            "timing": { "duration": 0.5, "easing": "ease-out", "attributes": { "x": { "delay": 0.1 } } }
        }));
        let Descriptor::Single(step) = d else {
            panic!("expected single step");
        };
        assert_eq!(step.targets["opacity"], Target::To(Value::Float(1.0)));
        assert_eq!(
            step.targets["x"],
            Target::FromTo(Value::Float(0.0), Value::Float(10.0))
        );
        assert_eq!(step.targets["label"], Target::Set(Value::Text("hello".into())));
        assert_eq!(step.timing.duration, Some(0.5));
        assert_eq!(step.timing.easing, Some(Easing::EaseOut));
        assert_eq!(step.timing_for("x").delay, Some(0.1));
    }

    #[test]
    fn parses_json_array_as_sequence() {
        let d = Descriptor::from_json(&json!([{ "x": [1.0] }, { "x": [2.0] }]));
        assert_eq!(d.steps().len(), 2);
    }

    #[test]
    fn malformed_json_degrades_to_none() {
        assert_eq!(Descriptor::from_json(&json!(42)), Descriptor::None);
        assert_eq!(Descriptor::from_json(&json!([1, 2])), Descriptor::None);
        assert_eq!(Descriptor::from_json(&json!({ "x": null })), Descriptor::None);
        assert_eq!(Descriptor::from_json(&json!(null)), Descriptor::None);
    }
}
