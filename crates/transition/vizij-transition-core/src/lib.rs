//! Vizij Transition Core (engine-agnostic)
//!
//! Keeps a keyed set of visual records in sync with an evolving item sequence and
//! animates every record through its enter/update/exit lifecycle.
//!
//! - [`diff`] joins a new item sequence against the tracked set by key.
//! - [`scheduler`] interpolates attribute maps frame by frame; runs are cancellable.
//! - [`lifecycle`] drives one record: descriptor requests, redirection, detach.
//! - [`group`] owns all of the above and exposes removal plus the render pass.
//! - [`ticks`] adapts scale-like tick generators into a keyed item source.

pub mod config;
pub mod descriptor;
pub mod diff;
pub mod error;
pub mod group;
pub mod ids;
pub mod interp;
pub mod lifecycle;
pub mod outputs;
pub mod scheduler;
pub mod ticks;
pub mod transitions;
pub mod value;

// Re-exports for consumers (adapters)
pub use config::Config;
pub use descriptor::{Descriptor, Step, Target, Timing};
pub use diff::{diff, DiffOptions, EnterPlacement, RecordType, TrackedRecord, TrackedSet};
pub use error::JoinError;
pub use group::{NodeGroup, Source, VisibleRecord};
pub use ids::HandleId;
pub use interp::Easing;
pub use lifecycle::{Phase, RecordLifecycle, RemovalHandle, RemovalKind, RemovalRequest};
pub use outputs::{GroupEvent, Outputs};
pub use scheduler::{AnimationHandle, Scheduler, SchedulerEvent};
pub use ticks::{tick_group, tick_key, LinearScale, ScaleTicks, Tick, TickGroup, TickScale};
pub use transitions::{Render, Transitions};
pub use value::{AttributeMap, Value, ValueKind};
