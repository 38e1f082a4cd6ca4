//! Zooms a linear axis and prints each frame of the tick transitions.
//!
//! `cargo run -p vizij-transition-core --example axis_ticks`

use anyhow::Result;
use vizij_transition::{
    tick_group, AttributeMap, Config, Descriptor, GroupEvent, LinearScale, RecordType,
    RemovalHandle, Step, Tick, Transitions, Value,
};

/// Ticks slide to their screen position and fade; leaving ticks fade out and
/// are removed by the host once the exit ends.
struct Axis {
    scale: std::cell::Cell<LinearScale>,
}

impl Axis {
    fn y(&self, t: &Tick) -> f32 {
        self.scale.get().scale(t.val) as f32
    }
}

impl Transitions<Tick> for Axis {
    fn start(&self, t: &Tick) -> AttributeMap {
        [
            ("opacity".to_string(), Value::Float(0.0)),
            ("y".to_string(), Value::Float(self.y(t))),
        ]
        .into_iter()
        .collect()
    }

    fn enter(&self, _t: &Tick, _removal: RemovalHandle) -> Descriptor {
        Step::new().to("opacity", 1.0).into()
    }

    fn update(&self, t: &Tick, _removal: RemovalHandle) -> Descriptor {
        Step::new().to("opacity", 1.0).to("y", self.y(t)).into()
    }

    fn leave(&self, t: &Tick, _removal: RemovalHandle) -> Descriptor {
        Step::new().to("opacity", 0.0).to("y", self.y(t)).into()
    }
}

fn print_frame(label: &str, rows: Vec<String>) {
    println!("{label}: {}", rows.join("  "));
}

fn main() -> Result<()> {
    let cfg = Config::from_json_str(r#"{ "duration": 0.3, "easing": "ease_out", "tick_count": 5 }"#)?;
    let first = LinearScale::new([0.0, 100.0], [0.0, 400.0]);
    let mut group = tick_group(
        cfg,
        Axis {
            scale: std::cell::Cell::new(first),
        },
    );
    group.set_scale(first)?;

    let render = |key: &str, _t: &Tick, state: &AttributeMap| {
        let y = state.get("y").and_then(Value::as_float).unwrap_or(0.0);
        let a = state.get("opacity").and_then(Value::as_float).unwrap_or(0.0);
        format!("{key}@{y:.0}({a:.2})")
    };

    for (step, domain) in [[0.0, 50.0], [20.0, 40.0]].into_iter().enumerate() {
        let scale = LinearScale::new(domain, [0.0, 400.0]);
        group.transitions().scale.set(scale);
        group.set_scale(scale)?;

        for frame in 0..4 {
            let out = group.tick(0.1);
            let done: Vec<String> = out
                .events
                .iter()
                .filter_map(|e| match e {
                    GroupEvent::TransitionEnded {
                        key,
                        record_type: RecordType::Exit,
                    } => Some(key.clone()),
                    _ => None,
                })
                .collect();
            for key in done {
                group.remove_key(&key);
            }
            print_frame(&format!("zoom {step} frame {frame}"), group.render(&render));
        }
    }
    Ok(())
}
