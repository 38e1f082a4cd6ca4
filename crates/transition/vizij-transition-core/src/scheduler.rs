//! Scheduler: cooperative, frame-stepped interpolation of attribute maps.
//!
//! Each `run` owns a working copy of a record's state and the remaining steps
//! of its descriptor. `advance(dt)` is one frame: every live run moves forward
//! by `dt` seconds and reports its merged state, and runs that finish their last
//! step report completion once and are released. Nothing blocks; the host
//! decides when frames happen.

use std::collections::VecDeque;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::descriptor::{Descriptor, Step, Target, Timing};
use crate::ids::{HandleId, IdAllocator};
use crate::interp::functions::interpolate;
use crate::interp::Easing;
use crate::value::{AttributeMap, Value};

/// Opaque, cancellable reference to one in-flight run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnimationHandle(HandleId);

impl AnimationHandle {
    #[inline]
    pub fn id(self) -> HandleId {
        self.0
    }
}

/// Per-frame notifications produced by [`Scheduler::advance`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SchedulerEvent {
    /// Interpolated attributes merged into the run's prior state.
    Step {
        handle: AnimationHandle,
        state: AttributeMap,
    },
    /// Emitted exactly once, after the last `Step` of a run.
    Complete { handle: AnimationHandle },
}

impl SchedulerEvent {
    #[inline]
    pub fn handle(&self) -> AnimationHandle {
        match self {
            SchedulerEvent::Step { handle, .. } | SchedulerEvent::Complete { handle } => *handle,
        }
    }
}

#[derive(Debug)]
struct Tween {
    from: Value,
    to: Value,
    delay: f32,
    duration: f32,
    easing: Easing,
}

impl Tween {
    #[inline]
    fn end(&self) -> f32 {
        self.delay + self.duration
    }

    fn progress(&self, elapsed: f32) -> f32 {
        if elapsed < self.delay {
            return 0.0;
        }
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((elapsed - self.delay) / self.duration).clamp(0.0, 1.0)
    }
}

#[derive(Debug)]
struct ActiveStep {
    tweens: IndexMap<String, Tween>,
    elapsed: f32,
    span: f32,
}

impl ActiveStep {
    /// Resolve timing, apply `Set`/`FromTo` snaps to `state` and capture tween origins.
    fn begin(step: Step, state: &mut AttributeMap, defaults: Timing) -> Self {
        let mut tweens = IndexMap::with_capacity(step.targets.len());
        for (attr, target) in &step.targets {
            let timing = step.timing_for(attr).or(defaults);
            let (from, to) = match target {
                Target::Set(v) => {
                    state.insert(attr.clone(), v.clone());
                    continue;
                }
                Target::To(v) => {
                    let from = state.get(attr).cloned().unwrap_or_else(|| v.clone());
                    (from, v.clone())
                }
                Target::FromTo(a, b) => {
                    state.insert(attr.clone(), a.clone());
                    (a.clone(), b.clone())
                }
            };
            if from.kind() != to.kind() {
                log::debug!(
                    "attribute '{attr}' changes kind {:?} -> {:?}; stepping at the end of the tween",
                    from.kind(),
                    to.kind()
                );
            }
            tweens.insert(
                attr.clone(),
                Tween {
                    from,
                    to,
                    delay: timing.delay.unwrap_or(0.0).max(0.0),
                    duration: timing.duration.unwrap_or(0.0).max(0.0),
                    easing: timing.easing.unwrap_or_default(),
                },
            );
        }
        let span = tweens.values().map(Tween::end).fold(0.0f32, f32::max);
        Self {
            tweens,
            elapsed: 0.0,
            span,
        }
    }

    /// Move forward by `dt`. Returns the unused time once the step has finished.
    fn advance(&mut self, dt: f32, state: &mut AttributeMap) -> Option<f32> {
        self.elapsed += dt;
        for (attr, tween) in &self.tweens {
            if self.elapsed < tween.delay {
                continue;
            }
            let p = tween.progress(self.elapsed);
            let value = if p >= 1.0 {
                tween.to.clone()
            } else {
                interpolate(&tween.from, &tween.to, tween.easing.apply(p))
            };
            state.insert(attr.clone(), value);
        }
        if self.elapsed >= self.span {
            Some(self.elapsed - self.span)
        } else {
            None
        }
    }
}

#[derive(Debug)]
struct Run {
    handle: AnimationHandle,
    pending: VecDeque<Step>,
    active: Option<ActiveStep>,
    state: AttributeMap,
}

impl Run {
    /// Returns true once the final step has finished.
    fn advance(&mut self, dt: f32, defaults: Timing) -> bool {
        let mut remaining = dt;
        loop {
            if self.active.is_none() {
                match self.pending.pop_front() {
                    Some(step) => {
                        self.active = Some(ActiveStep::begin(step, &mut self.state, defaults))
                    }
                    None => return true,
                }
            }
            let Some(active) = self.active.as_mut() else {
                return true;
            };
            match active.advance(remaining, &mut self.state) {
                Some(rest) => {
                    self.active = None;
                    remaining = rest;
                    if self.pending.is_empty() {
                        return true;
                    }
                }
                None => return false,
            }
        }
    }
}

/// Owns every live run. At most one run exists per handle; callers enforce
/// one handle per record by cancelling before starting.
#[derive(Debug)]
pub struct Scheduler {
    defaults: Timing,
    ids: IdAllocator,
    runs: Vec<Run>,
    events: Vec<SchedulerEvent>,
}

impl Scheduler {
    pub fn new(cfg: &Config) -> Self {
        Self {
            defaults: cfg.default_timing(),
            ids: IdAllocator::new(),
            runs: Vec::new(),
            events: Vec::with_capacity(cfg.max_events_per_tick),
        }
    }

    /// Start interpolating `from` through the steps of `descriptor`.
    ///
    /// Returns `None` when the descriptor has nothing to animate; the caller
    /// should treat that as an immediate completion.
    pub fn run(&mut self, from: &AttributeMap, descriptor: &Descriptor) -> Option<AnimationHandle> {
        let pending: VecDeque<Step> = descriptor
            .steps()
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect();
        if pending.is_empty() {
            log::trace!("empty descriptor, no run started");
            return None;
        }
        let handle = AnimationHandle(self.ids.alloc_handle());
        log::trace!("run {:?} started with {} step(s)", handle.id(), pending.len());
        self.runs.push(Run {
            handle,
            pending,
            active: None,
            state: from.clone(),
        });
        Some(handle)
    }

    /// Stop a run. No further events are produced for `handle`, including any
    /// already buffered for the current frame. Returns false if it was not live.
    pub fn cancel(&mut self, handle: AnimationHandle) -> bool {
        let before = self.runs.len();
        self.runs.retain(|r| r.handle != handle);
        self.events.retain(|e| e.handle() != handle);
        let cancelled = self.runs.len() != before;
        if cancelled {
            log::trace!("run {:?} cancelled", handle.id());
        }
        cancelled
    }

    #[inline]
    pub fn is_live(&self, handle: AnimationHandle) -> bool {
        self.runs.iter().any(|r| r.handle == handle)
    }

    #[inline]
    pub fn live_count(&self) -> usize {
        self.runs.len()
    }

    /// Advance every live run by `dt` seconds (one frame).
    pub fn advance(&mut self, dt: f32) -> &[SchedulerEvent] {
        self.events.clear();
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let defaults = self.defaults;
        let events = &mut self.events;
        self.runs.retain_mut(|run| {
            let done = run.advance(dt, defaults);
            events.push(SchedulerEvent::Step {
                handle: run.handle,
                state: run.state.clone(),
            });
            if done {
                events.push(SchedulerEvent::Complete { handle: run.handle });
            }
            !done
        });
        &self.events
    }

    /// Drain the events of the last frame; the buffer keeps its capacity.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, SchedulerEvent> {
        self.events.drain(..)
    }

    #[inline]
    pub fn event_capacity(&self) -> usize {
        self.events.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(pairs: &[(&str, f32)]) -> AttributeMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Float(*v)))
            .collect()
    }

    fn float(events: &[SchedulerEvent], attr: &str) -> Option<f32> {
        events.iter().find_map(|e| match e {
            SchedulerEvent::Step { state, .. } => state.get(attr).and_then(Value::as_float),
            _ => None,
        })
    }

    #[test]
    fn linear_tween_reaches_target_and_completes_once() {
        let mut sched = Scheduler::new(&Config::default());
        let d: Descriptor = Step::new().to("x", 10.0).duration(1.0).into();
        let h = sched.run(&state(&[("x", 0.0)]), &d).unwrap();

        let ev = sched.advance(0.5).to_vec();
        assert_eq!(float(&ev, "x"), Some(5.0));
        assert_eq!(ev.len(), 1);

        let ev = sched.advance(0.5).to_vec();
        assert_eq!(float(&ev, "x"), Some(10.0));
        assert_eq!(ev.last(), Some(&SchedulerEvent::Complete { handle: h }));

        assert!(sched.advance(0.5).is_empty());
        assert!(!sched.is_live(h));
    }

    #[test]
    fn step_merges_into_prior_state() {
        let mut sched = Scheduler::new(&Config::default());
        let d: Descriptor = Step::new().to("x", 1.0).duration(1.0).into();
        sched.run(&state(&[("x", 0.0), ("y", 7.0)]), &d).unwrap();
        let ev = sched.advance(0.25).to_vec();
        assert_eq!(float(&ev, "y"), Some(7.0));
    }

    #[test]
    fn empty_descriptor_starts_nothing() {
        let mut sched = Scheduler::new(&Config::default());
        assert!(sched.run(&AttributeMap::new(), &Descriptor::None).is_none());
        assert!(sched
            .run(&AttributeMap::new(), &Descriptor::Single(Step::new()))
            .is_none());
        assert_eq!(sched.live_count(), 0);
    }

    #[test]
    fn cancel_is_immediate_and_idempotent() {
        let mut sched = Scheduler::new(&Config::default());
        let d: Descriptor = Step::new().to("x", 1.0).duration(1.0).into();
        let h = sched.run(&state(&[("x", 0.0)]), &d).unwrap();
        sched.advance(0.1);
        assert!(sched.cancel(h));
        assert!(!sched.cancel(h));
        assert_eq!(sched.drain_events().count(), 0);
        assert!(sched.advance(0.1).is_empty());
    }

    #[test]
    fn sequential_steps_chain_from_previous_result() {
        let mut sched = Scheduler::new(&Config::default());
        let d: Descriptor = vec![
            Step::new().to("x", 10.0).duration(1.0),
            Step::new().to("x", 0.0).duration(1.0),
        ]
        .into();
        let h = sched.run(&state(&[("x", 0.0)]), &d).unwrap();

        let ev = sched.advance(1.5).to_vec();
        assert_eq!(float(&ev, "x"), Some(5.0));
        assert!(sched.is_live(h));

        let ev = sched.advance(0.5).to_vec();
        assert_eq!(float(&ev, "x"), Some(0.0));
        assert!(matches!(ev.last(), Some(SchedulerEvent::Complete { .. })));
    }

    #[test]
    fn delay_holds_value_then_animates() {
        let mut sched = Scheduler::new(&Config::default());
        let d: Descriptor = Step::new().to("x", 4.0).delay(1.0).duration(2.0).into();
        sched.run(&state(&[("x", 0.0)]), &d).unwrap();
        assert_eq!(float(&sched.advance(0.5).to_vec(), "x"), Some(0.0));
        assert_eq!(float(&sched.advance(1.0).to_vec(), "x"), Some(1.0));
    }

    #[test]
    fn set_and_from_to_snap_at_step_start() {
        let mut sched = Scheduler::new(&Config::default());
        let d: Descriptor = Step::new()
            .set("label", "on")
            .from_to("x", 100.0, 200.0)
            .duration(1.0)
            .into();
        sched.run(&state(&[("x", 0.0)]), &d).unwrap();
        let ev = sched.advance(0.0).to_vec();
        assert_eq!(float(&ev, "x"), Some(100.0));
        let SchedulerEvent::Step { state, .. } = &ev[0] else {
            panic!("expected step event");
        };
        assert_eq!(state["label"], Value::Text("on".into()));
    }

    #[test]
    fn config_defaults_apply_when_step_has_no_timing() {
        let cfg = Config {
            duration: 2.0,
            ..Config::default()
        };
        let mut sched = Scheduler::new(&cfg);
        let d: Descriptor = Step::new().to("x", 2.0).into();
        sched.run(&state(&[("x", 0.0)]), &d).unwrap();
        assert_eq!(float(&sched.advance(1.0).to_vec(), "x"), Some(1.0));
    }

    #[test]
    fn missing_attribute_jumps_to_target() {
        let mut sched = Scheduler::new(&Config::default());
        let d: Descriptor = Step::new().to("opacity", 1.0).duration(1.0).into();
        sched.run(&AttributeMap::new(), &d).unwrap();
        assert_eq!(float(&sched.advance(0.1).to_vec(), "opacity"), Some(1.0));
    }

    #[test]
    fn draining_keeps_the_event_buffer() {
        let cfg = Config {
            max_events_per_tick: 64,
            ..Config::default()
        };
        let mut sched = Scheduler::new(&cfg);
        let d: Descriptor = Step::new().to("x", 1.0).duration(1.0).into();
        sched.run(&state(&[("x", 0.0)]), &d).unwrap();
        for _ in 0..3 {
            sched.advance(0.1);
            assert_eq!(sched.drain_events().count(), 1);
            assert!(sched.event_capacity() >= 64);
        }
    }

    #[test]
    fn kind_change_steps_at_the_end() {
        let mut sched = Scheduler::new(&Config::default());
        let d: Descriptor = Step::new().to("x", "done").duration(1.0).into();
        sched.run(&state(&[("x", 1.0)]), &d).unwrap();
        let ev = sched.advance(0.5).to_vec();
        assert_eq!(float(&ev, "x"), Some(1.0));
        let ev = sched.advance(0.5).to_vec();
        let last = ev.iter().find_map(|e| match e {
            SchedulerEvent::Step { state, .. } => state.get("x").cloned(),
            _ => None,
        });
        assert_eq!(last, Some(Value::Text("done".into())));
    }
}
