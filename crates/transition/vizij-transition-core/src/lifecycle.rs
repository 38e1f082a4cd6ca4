//! Per-record lifecycle: owns a record's interpolated state and its single
//! in-flight run, and reacts to attach / source change / detach events.
//!
//! Phases: `Initializing → Animating(type) ⇄ Idle(type) → Unmounted`.
//! Every new run cancels the previous one first, and detaching cancels the
//! current one, so a record never has two live handles and never changes after
//! it is unmounted.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::descriptor::Descriptor;
use crate::diff::{RecordType, TrackedRecord};
use crate::scheduler::{AnimationHandle, Scheduler, SchedulerEvent};
use crate::transitions::Transitions;
use crate::value::AttributeMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalKind {
    /// Hide from presentation; the record stays tracked.
    Lazy,
    /// Delete from the tracked set.
    Hard,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalRequest {
    pub key: String,
    pub kind: RemovalKind,
}

/// Requests queued by removal handles, drained by the owning group.
#[derive(Clone, Debug, Default)]
pub(crate) struct RemovalQueue(Rc<RefCell<Vec<RemovalRequest>>>);

impl RemovalQueue {
    fn push(&self, request: RemovalRequest) {
        self.0.borrow_mut().push(request);
    }

    pub(crate) fn take(&self) -> Vec<RemovalRequest> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    fn len(&self) -> usize {
        self.0.borrow().len()
    }
}

/// Key-bound removal callbacks handed to descriptor providers.
///
/// Cheap to clone and safe to keep: requests are queued and applied by the
/// group at the end of the current `set_source` or `tick`, never re-entrantly.
#[derive(Clone, Debug)]
pub struct RemovalHandle {
    key: String,
    queue: RemovalQueue,
}

impl RemovalHandle {
    pub(crate) fn new(key: &str, queue: RemovalQueue) -> Self {
        Self {
            key: key.to_string(),
            queue,
        }
    }

    /// A handle bound to a private queue, for exercising providers in isolation.
    pub fn detached(key: &str) -> Self {
        Self::new(key, RemovalQueue::default())
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Request hard removal of this record.
    pub fn remove(&self) {
        self.queue.push(RemovalRequest {
            key: self.key.clone(),
            kind: RemovalKind::Hard,
        });
    }

    /// Request that this record be hidden from presentation.
    pub fn lazy_remove(&self) {
        self.queue.push(RemovalRequest {
            key: self.key.clone(),
            kind: RemovalKind::Lazy,
        });
    }

    /// Number of requests waiting in this handle's queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Initializing,
    Animating(RecordType),
    Idle(RecordType),
    Unmounted,
}

/// What a scheduler event meant for this record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The event belongs to a handle this record no longer owns.
    Ignored,
    Stepped,
    Completed,
}

#[derive(Debug)]
pub struct RecordLifecycle {
    key: String,
    phase: Phase,
    record_type: RecordType,
    revision: u64,
    state: AttributeMap,
    handle: Option<AnimationHandle>,
}

impl RecordLifecycle {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            phase: Phase::Initializing,
            record_type: RecordType::Enter,
            revision: 0,
            state: AttributeMap::new(),
            handle: None,
        }
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    #[inline]
    pub fn state(&self) -> &AttributeMap {
        &self.state
    }

    #[inline]
    pub fn handle(&self) -> Option<AnimationHandle> {
        self.handle
    }

    /// First association with a record: seed state from `start` and play the
    /// descriptor for the record's type (normally `enter`).
    pub fn on_attach<I, T>(
        &mut self,
        record: &TrackedRecord<I>,
        transitions: &T,
        removal: RemovalHandle,
        scheduler: &mut Scheduler,
    ) where
        T: Transitions<I> + ?Sized,
    {
        if self.phase != Phase::Initializing {
            log::warn!("record '{}' attached twice; ignoring", self.key);
            return;
        }
        self.state = transitions.start(&record.item);
        self.record_type = record.record_type;
        self.revision = record.revision;
        let descriptor = transitions.describe(record.record_type, &record.item, removal);
        self.begin(&descriptor, scheduler);
    }

    /// React to a diff. Restarts from the current interpolated state when the
    /// type changed, or when the same type arrives with a newly delivered item.
    /// Returns true if a new descriptor was requested.
    pub fn on_source_changed<I, T>(
        &mut self,
        record: &TrackedRecord<I>,
        transitions: &T,
        removal: RemovalHandle,
        scheduler: &mut Scheduler,
    ) -> bool
    where
        T: Transitions<I> + ?Sized,
    {
        match self.phase {
            Phase::Unmounted => return false,
            Phase::Initializing => {
                self.on_attach(record, transitions, removal, scheduler);
                return true;
            }
            _ => {}
        }
        let type_changed = record.record_type != self.record_type;
        if !type_changed && record.revision == self.revision {
            return false;
        }
        self.record_type = record.record_type;
        self.revision = record.revision;
        let descriptor = transitions.describe(record.record_type, &record.item, removal);
        self.begin(&descriptor, scheduler);
        true
    }

    /// Apply one scheduler event. Events for handles other than the current one
    /// are dropped, so a superseded run can never write state.
    pub fn on_frame(&mut self, event: &SchedulerEvent) -> FrameOutcome {
        if self.handle != Some(event.handle()) {
            return FrameOutcome::Ignored;
        }
        match event {
            SchedulerEvent::Step { state, .. } => {
                self.state.clone_from(state);
                FrameOutcome::Stepped
            }
            SchedulerEvent::Complete { .. } => {
                self.handle = None;
                self.phase = Phase::Idle(self.record_type);
                FrameOutcome::Completed
            }
        }
    }

    /// Cancel any in-flight run and stop reacting to events.
    pub fn on_detach(&mut self, scheduler: &mut Scheduler) {
        if let Some(handle) = self.handle.take() {
            scheduler.cancel(handle);
        }
        self.phase = Phase::Unmounted;
    }

    fn begin(&mut self, descriptor: &Descriptor, scheduler: &mut Scheduler) {
        if let Some(previous) = self.handle.take() {
            scheduler.cancel(previous);
        }
        self.handle = scheduler.run(&self.state, descriptor);
        self.phase = match self.handle {
            Some(_) => Phase::Animating(self.record_type),
            None => Phase::Idle(self.record_type),
        };
        log::debug!(
            "record '{}' -> {:?} ({})",
            self.key,
            self.record_type,
            if self.handle.is_some() { "animating" } else { "idle" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::descriptor::Step;
    use crate::value::Value;

    struct Fade;

    impl Transitions<u32> for Fade {
        fn start(&self, _item: &u32) -> AttributeMap {
            [("opacity".to_string(), Value::Float(0.0))].into_iter().collect()
        }
        fn enter(&self, _item: &u32, _removal: RemovalHandle) -> Descriptor {
            Step::new().to("opacity", 1.0).duration(1.0).into()
        }
        fn update(&self, item: &u32, _removal: RemovalHandle) -> Descriptor {
            Step::new().to("x", *item as f32).duration(1.0).into()
        }
        fn leave(&self, _item: &u32, removal: RemovalHandle) -> Descriptor {
            removal.lazy_remove();
            Step::new().to("opacity", 0.0).duration(1.0).into()
        }
    }

    fn record(record_type: RecordType, item: u32, revision: u64) -> TrackedRecord<u32> {
        TrackedRecord {
            key: "a".into(),
            record_type,
            item,
            order: 0,
            revision,
        }
    }

    #[test]
    fn attach_seeds_start_state_and_animates_enter() {
        let mut sched = Scheduler::new(&Config::default());
        let mut lc = RecordLifecycle::new("a");
        lc.on_attach(&record(RecordType::Enter, 1, 1), &Fade, RemovalHandle::detached("a"), &mut sched);
        assert_eq!(lc.phase(), Phase::Animating(RecordType::Enter));
        assert_eq!(lc.state()["opacity"], Value::Float(0.0));

        for ev in sched.advance(0.5).to_vec() {
            lc.on_frame(&ev);
        }
        assert_eq!(lc.state()["opacity"], Value::Float(0.5));
    }

    #[test]
    fn redirect_starts_from_interpolated_state_and_supersedes_handle() {
        let mut sched = Scheduler::new(&Config::default());
        let mut lc = RecordLifecycle::new("a");
        lc.on_attach(&record(RecordType::Enter, 1, 1), &Fade, RemovalHandle::detached("a"), &mut sched);
        for ev in sched.advance(0.5).to_vec() {
            lc.on_frame(&ev);
        }
        let first = lc.handle().unwrap();

        let removal = RemovalHandle::detached("a");
        assert!(lc.on_source_changed(&record(RecordType::Exit, 1, 1), &Fade, removal.clone(), &mut sched));
        assert_eq!(removal.pending(), 1);
        let second = lc.handle().unwrap();
        assert_ne!(first, second);
        assert!(!sched.is_live(first));
        assert_eq!(sched.live_count(), 1);

        for ev in sched.advance(0.5).to_vec() {
            assert_ne!(ev.handle(), first);
            lc.on_frame(&ev);
        }
        // 0.5 -> 0.0 over one second, half way
        assert_eq!(lc.state()["opacity"], Value::Float(0.25));
    }

    #[test]
    fn same_type_restarts_only_on_new_revision() {
        let mut sched = Scheduler::new(&Config::default());
        let mut lc = RecordLifecycle::new("a");
        lc.on_attach(&record(RecordType::Enter, 1, 1), &Fade, RemovalHandle::detached("a"), &mut sched);
        assert!(lc.on_source_changed(&record(RecordType::Update, 2, 2), &Fade, RemovalHandle::detached("a"), &mut sched));
        assert!(!lc.on_source_changed(&record(RecordType::Update, 2, 2), &Fade, RemovalHandle::detached("a"), &mut sched));
        assert!(lc.on_source_changed(&record(RecordType::Update, 3, 3), &Fade, RemovalHandle::detached("a"), &mut sched));
        assert_eq!(sched.live_count(), 1);
    }

    #[test]
    fn empty_descriptor_goes_idle_immediately() {
        struct Nothing;
        impl Transitions<u32> for Nothing {}

        let mut sched = Scheduler::new(&Config::default());
        let mut lc = RecordLifecycle::new("a");
        lc.on_attach(&record(RecordType::Enter, 1, 1), &Nothing, RemovalHandle::detached("a"), &mut sched);
        assert_eq!(lc.phase(), Phase::Idle(RecordType::Enter));
        assert!(lc.handle().is_none());
        assert!(lc.state().is_empty());
    }

    #[test]
    fn detach_cancels_and_freezes() {
        let mut sched = Scheduler::new(&Config::default());
        let mut lc = RecordLifecycle::new("a");
        lc.on_attach(&record(RecordType::Enter, 1, 1), &Fade, RemovalHandle::detached("a"), &mut sched);
        let handle = lc.handle().unwrap();
        lc.on_detach(&mut sched);
        assert_eq!(lc.phase(), Phase::Unmounted);
        assert!(!sched.is_live(handle));
        assert!(!lc.on_source_changed(&record(RecordType::Update, 2, 2), &Fade, RemovalHandle::detached("a"), &mut sched));
        assert_eq!(sched.live_count(), 0);
    }
}
