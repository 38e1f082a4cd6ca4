//! Easing curves and value interpolation.
//!
//! Named curves are cubic-bezier presets (CSS control points) shaped by the
//! same solver used for arbitrary `CubicBezier` curves.

pub mod functions;

use serde::{Deserialize, Serialize};

use self::functions::bezier_ease_t;

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    /// Control points (x1, y1, x2, y2).
    CubicBezier([f32; 4]),
    /// Holds the start value until the tween finishes.
    Step,
}

impl Easing {
    /// Map linear progress `t` in [0, 1] to eased progress.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => bezier_ease_t(t, 0.42, 0.0, 1.0, 1.0),
            Easing::EaseOut => bezier_ease_t(t, 0.0, 0.0, 0.58, 1.0),
            Easing::EaseInOut => bezier_ease_t(t, 0.42, 0.0, 0.58, 1.0),
            Easing::CubicBezier([x1, y1, x2, y2]) => bezier_ease_t(t, x1, y1, x2, y2),
            Easing::Step => {
                if t >= 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Parse a curve name (`"ease-in"`, `"ease_out"`, ...) or a 4-element
    /// control point array.
    pub fn from_json(json: &serde_json::Value) -> Option<Easing> {
        match json {
            serde_json::Value::String(name) => {
                match name.to_lowercase().replace('-', "_").as_str() {
                    "linear" => Some(Easing::Linear),
                    "ease_in" => Some(Easing::EaseIn),
                    "ease_out" => Some(Easing::EaseOut),
                    "ease_in_out" | "ease" => Some(Easing::EaseInOut),
                    "step" => Some(Easing::Step),
                    _ => None,
                }
            }
            serde_json::Value::Array(points) if points.len() == 4 => {
                let mut ctrl = [0.0f32; 4];
                for (slot, p) in ctrl.iter_mut().zip(points) {
                    *slot = p.as_f64()? as f32;
                }
                Some(Easing::CubicBezier(ctrl))
            }
            _ => None,
        }
    }
}
