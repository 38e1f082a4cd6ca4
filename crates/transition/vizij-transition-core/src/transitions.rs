//! Caller-supplied collaborators: descriptor providers and the render projection.

use crate::descriptor::Descriptor;
use crate::diff::RecordType;
use crate::lifecycle::RemovalHandle;
use crate::value::AttributeMap;

/// Start state and enter/update/leave descriptors for items of type `I`.
///
/// Every method has a do-nothing default, so an implementation only overrides
/// the phases it animates. The removal handle is bound to the record's key; a
/// `leave` implementation usually keeps it and calls
/// [`RemovalHandle::remove`] once its exit animation is far enough along.
pub trait Transitions<I> {
    fn start(&self, _item: &I) -> AttributeMap {
        AttributeMap::new()
    }

    fn enter(&self, _item: &I, _removal: RemovalHandle) -> Descriptor {
        Descriptor::None
    }

    fn update(&self, _item: &I, _removal: RemovalHandle) -> Descriptor {
        Descriptor::None
    }

    fn leave(&self, _item: &I, _removal: RemovalHandle) -> Descriptor {
        Descriptor::None
    }

    /// Dispatch on record type.
    fn describe(&self, record_type: RecordType, item: &I, removal: RemovalHandle) -> Descriptor {
        match record_type {
            RecordType::Enter => self.enter(item, removal),
            RecordType::Update => self.update(item, removal),
            RecordType::Exit => self.leave(item, removal),
        }
    }
}

/// Pure projection of one record into host output. Must not mutate state.
pub trait Render<I> {
    type Output;

    fn render(&self, key: &str, item: &I, state: &AttributeMap) -> Self::Output;
}

impl<I, O, F> Render<I> for F
where
    F: Fn(&str, &I, &AttributeMap) -> O,
{
    type Output = O;

    fn render(&self, key: &str, item: &I, state: &AttributeMap) -> O {
        self(key, item, state)
    }
}
