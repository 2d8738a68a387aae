//! Binding event payloads delivered to the scheduler cache by the resource
//! event producer.

use crate::core::binding::ResourceBinding;

/// Payload of a binding create/update/delete notification. A deletion may
/// arrive as a tombstone wrapping the last known state of the object when
/// the producer missed the final watch event.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingEvent {
    Binding(ResourceBinding),
    Tombstone {
        last_known: Option<Box<ResourceBinding>>,
    },
}

impl BindingEvent {
    /// Unwraps the binding carried by the event, looking through tombstones.
    /// Returns None for tombstones with no recoverable object.
    pub fn as_binding(&self) -> Option<&ResourceBinding> {
        match self {
            BindingEvent::Binding(binding) => Some(binding),
            BindingEvent::Tombstone { last_known } => last_known.as_deref(),
        }
    }
}
