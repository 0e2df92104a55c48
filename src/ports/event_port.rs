//! Presentation-layer notification port trait.

use crate::domain::event::EngineEvent;

/// Receives engine events. Publishing must not block the caller.
pub trait EventPort {
    fn publish(&self, event: EngineEvent);
}
