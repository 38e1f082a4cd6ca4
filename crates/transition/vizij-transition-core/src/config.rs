//! Core configuration for vizij-transition-core.

use serde::{Deserialize, Serialize};

use crate::descriptor::Timing;
use crate::diff::EnterPlacement;
use crate::interp::Easing;

/// Group-wide defaults and sizing hints.
///
/// Descriptor steps that omit timing fall back to `duration`, `delay` and
/// `easing`. Times are in seconds, matching the `dt` passed to
/// [`crate::NodeGroup::tick`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default tween duration in seconds.
    pub duration: f32,
    /// Default tween delay in seconds.
    pub delay: f32,
    pub easing: Easing,

    /// Approximate tick count requested by `NodeGroup::set_scale`.
    pub tick_count: usize,

    /// Where newly entering records land relative to tracked ones.
    pub placement: EnterPlacement,

    /// Capacity hint for per-frame event buffers.
    pub max_events_per_tick: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            duration: 0.25,
            delay: 0.0,
            easing: Easing::Linear,
            tick_count: 10,
            placement: EnterPlacement::Append,
            max_events_per_tick: 1024,
        }
    }
}

impl Config {
    /// Parse a (possibly partial) JSON config; missing fields use defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Timing used when neither the attribute nor the step specify one.
    pub fn default_timing(&self) -> Timing {
        Timing {
            duration: Some(self.duration.max(0.0)),
            delay: Some(self.delay.max(0.0)),
            easing: Some(self.easing),
        }
    }
}
