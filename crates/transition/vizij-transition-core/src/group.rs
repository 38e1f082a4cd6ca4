//! NodeGroup: owns the tracked set, one lifecycle per key, the shared scheduler
//! and the current upstream source.
//!
//! Methods:
//! - new, mount / set_source (diff on source identity change), tick (one frame)
//! - remove_key / lazy_remove_key (two-phase removal), flush_removals
//! - visible / render (ordered, non-hidden records joined with their state)
//! - unmount

use std::rc::Rc;

use hashbrown::{HashMap, HashSet};

use crate::config::Config;
use crate::diff::{diff, DiffOptions, RecordType, TrackedSet};
use crate::error::JoinError;
use crate::ids::IdAllocator;
use crate::lifecycle::{FrameOutcome, RecordLifecycle, RemovalHandle, RemovalKind, RemovalQueue};
use crate::outputs::{GroupEvent, Outputs};
use crate::scheduler::{AnimationHandle, Scheduler};
use crate::transitions::{Render, Transitions};
use crate::value::AttributeMap;

/// Upstream item provider. `None` means the capability is absent and is
/// treated as an empty sequence.
pub trait Source<I> {
    fn items(&self) -> Option<Vec<I>>;
}

impl<I: Clone> Source<I> for Vec<I> {
    fn items(&self) -> Option<Vec<I>> {
        Some(self.clone())
    }
}

/// One record as handed to the render pass.
#[derive(Debug)]
pub struct VisibleRecord<'a, I> {
    pub key: &'a str,
    pub item: &'a I,
    pub state: &'a AttributeMap,
    pub record_type: RecordType,
    pub order: usize,
}

pub struct NodeGroup<I, T, K = fn(&I) -> String> {
    cfg: Config,
    key_fn: K,
    transitions: T,

    source: Option<Rc<dyn Source<I>>>,
    tracked: TrackedSet<I>,
    /// Keys of the current source (everything tracked that is not exiting).
    present: HashSet<String>,

    lifecycles: HashMap<String, RecordLifecycle>,
    owners: HashMap<AnimationHandle, String>,
    scheduler: Scheduler,
    removals: RemovalQueue,
    ids: IdAllocator,

    // Events raised outside of tick(), reported with the next frame.
    pending: Vec<GroupEvent>,
    outputs: Outputs,
}

impl<I, T, K> NodeGroup<I, T, K>
where
    I: Clone,
    T: Transitions<I>,
    K: Fn(&I) -> String,
{
    pub fn new(cfg: Config, key_fn: K, transitions: T) -> Self {
        Self {
            scheduler: Scheduler::new(&cfg),
            cfg,
            key_fn,
            transitions,
            source: None,
            tracked: TrackedSet::new(),
            present: HashSet::new(),
            lifecycles: HashMap::new(),
            owners: HashMap::new(),
            removals: RemovalQueue::default(),
            ids: IdAllocator::new(),
            pending: Vec::new(),
            outputs: Outputs::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    #[inline]
    pub fn transitions(&self) -> &T {
        &self.transitions
    }

    #[inline]
    pub fn is_mounted(&self) -> bool {
        self.source.is_some()
    }

    /// Initial join against `source`.
    pub fn mount(&mut self, source: Rc<dyn Source<I>>) -> Result<(), JoinError> {
        if self.is_mounted() {
            log::warn!("mount on an already mounted group; treating as set_source");
        }
        self.set_source(source).map(|_| ())
    }

    /// Re-join against `source` if it is a different object from the current one.
    ///
    /// Identity is pointer equality of the `Rc`; an equal but distinct source
    /// still triggers a diff. Returns whether a diff ran. On a key collision
    /// nothing changes, including the current source.
    pub fn set_source(&mut self, source: Rc<dyn Source<I>>) -> Result<bool, JoinError> {
        if let Some(current) = &self.source {
            if Rc::ptr_eq(current, &source) {
                log::trace!("set_source: same source, skipping diff");
                return Ok(false);
            }
        }

        let items = source.items().unwrap_or_else(|| {
            log::debug!("source provides no items; joining against an empty sequence");
            Vec::new()
        });
        let revision = self.ids.next_revision();
        let next = diff(
            items,
            &self.tracked,
            &self.key_fn,
            DiffOptions {
                placement: self.cfg.placement,
                revision,
            },
        )?;

        let mut entered = 0;
        let mut exiting = 0;
        self.present.clear();
        for record in next.records() {
            match record.record_type {
                RecordType::Enter => entered += 1,
                RecordType::Exit => exiting += 1,
                RecordType::Update => {}
            }
            if record.record_type != RecordType::Exit {
                self.present.insert(record.key.clone());
            }
        }
        self.tracked = next;
        self.source = Some(source);
        self.pending.push(GroupEvent::SourceChanged {
            revision,
            entered,
            exiting,
        });

        self.sync_lifecycles();
        self.flush_removals();
        Ok(true)
    }

    /// Deliver the new tracked set to every lifecycle, creating one per new key.
    fn sync_lifecycles(&mut self) {
        for record in self.tracked.records() {
            let removal = RemovalHandle::new(&record.key, self.removals.clone());
            let lifecycle = self
                .lifecycles
                .entry(record.key.clone())
                .or_insert_with(|| RecordLifecycle::new(&record.key));
            let previous = lifecycle.handle();
            let restarted =
                lifecycle.on_source_changed(record, &self.transitions, removal, &mut self.scheduler);
            if !restarted {
                continue;
            }
            if let Some(old) = previous {
                self.owners.remove(&old);
            }
            self.pending.push(GroupEvent::TransitionStarted {
                key: record.key.clone(),
                record_type: record.record_type,
            });
            match lifecycle.handle() {
                Some(handle) => {
                    self.owners.insert(handle, record.key.clone());
                }
                None => self.pending.push(GroupEvent::TransitionEnded {
                    key: record.key.clone(),
                    record_type: record.record_type,
                }),
            }
        }
    }

    /// Advance every in-flight transition by `dt` seconds and report the frame.
    pub fn tick(&mut self, dt: f32) -> &Outputs {
        self.outputs.clear();
        self.outputs.events.append(&mut self.pending);

        self.scheduler.advance(dt);
        for event in self.scheduler.drain_events() {
            let handle = event.handle();
            let Some(key) = self.owners.get(&handle).cloned() else {
                continue;
            };
            let Some(lifecycle) = self.lifecycles.get_mut(&key) else {
                continue;
            };
            match lifecycle.on_frame(&event) {
                FrameOutcome::Stepped => self.outputs.push_change(key),
                FrameOutcome::Completed => {
                    let record_type = lifecycle.record_type();
                    self.owners.remove(&handle);
                    self.outputs
                        .push_event(GroupEvent::TransitionEnded { key, record_type });
                }
                FrameOutcome::Ignored => {}
            }
        }

        self.flush_removals();
        self.outputs.events.append(&mut self.pending);
        &self.outputs
    }

    /// Apply removal requests queued through [`RemovalHandle`]s.
    pub fn flush_removals(&mut self) {
        loop {
            let requests = self.removals.take();
            if requests.is_empty() {
                break;
            }
            for request in requests {
                match request.kind {
                    RemovalKind::Hard => {
                        self.remove_key(&request.key);
                    }
                    RemovalKind::Lazy => {
                        self.lazy_remove_key(&request.key);
                    }
                }
            }
        }
    }

    /// Hard-delete `key`. Only takes effect when the key is tracked and no
    /// longer present upstream; otherwise a no-op. Returns whether it removed.
    pub fn remove_key(&mut self, key: &str) -> bool {
        if !self.tracked.contains(key) {
            log::debug!("remove_key('{key}'): not tracked");
            return false;
        }
        if self.present.contains(key) {
            log::warn!("remove_key('{key}') ignored: key is still present upstream");
            self.pending.push(GroupEvent::RemovalRejected {
                key: key.to_string(),
            });
            return false;
        }
        self.tracked.hard_remove(key);
        if let Some(mut lifecycle) = self.lifecycles.remove(key) {
            if let Some(handle) = lifecycle.handle() {
                self.owners.remove(&handle);
            }
            lifecycle.on_detach(&mut self.scheduler);
        }
        self.pending.push(GroupEvent::Removed {
            key: key.to_string(),
        });
        true
    }

    /// Hide `key` from presentation; it stays tracked, diffed and animated.
    pub fn lazy_remove_key(&mut self, key: &str) -> bool {
        if self.tracked.is_removed(key) {
            return true;
        }
        if !self.tracked.mark_removed(key) {
            log::debug!("lazy_remove_key('{key}'): not tracked");
            return false;
        }
        self.pending.push(GroupEvent::Hidden {
            key: key.to_string(),
        });
        true
    }

    /// Detach every record and forget the source.
    pub fn unmount(&mut self) {
        for lifecycle in self.lifecycles.values_mut() {
            lifecycle.on_detach(&mut self.scheduler);
        }
        self.lifecycles.clear();
        self.owners.clear();
        self.tracked = TrackedSet::new();
        self.present.clear();
        self.source = None;
        self.removals.take();
        self.pending.clear();
    }

    #[inline]
    pub fn tracked(&self) -> &TrackedSet<I> {
        &self.tracked
    }

    #[inline]
    pub fn is_present(&self, key: &str) -> bool {
        self.present.contains(key)
    }

    #[inline]
    pub fn lifecycle(&self, key: &str) -> Option<&RecordLifecycle> {
        self.lifecycles.get(key)
    }

    #[inline]
    pub fn state(&self, key: &str) -> Option<&AttributeMap> {
        self.lifecycles.get(key).map(RecordLifecycle::state)
    }

    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Ordered, non-hidden records joined with their current state.
    pub fn visible(&self) -> impl Iterator<Item = VisibleRecord<'_, I>> + '_ {
        self.tracked.visible().filter_map(move |record| {
            let lifecycle = self.lifecycles.get(&record.key)?;
            Some(VisibleRecord {
                key: &record.key,
                item: &record.item,
                state: lifecycle.state(),
                record_type: record.record_type,
                order: record.order,
            })
        })
    }

    pub fn visible_keys(&self) -> Vec<&str> {
        self.visible().map(|v| v.key).collect()
    }

    /// Run the render projection once per visible record, in order.
    pub fn render<R>(&self, renderer: &R) -> Vec<R::Output>
    where
        R: Render<I> + ?Sized,
    {
        self.visible()
            .map(|v| renderer.render(v.key, v.item, v.state))
            .collect()
    }
}
