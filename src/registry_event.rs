/// Events emitted by a handler registry during operations.
///
/// These events are passed to the tracing callback set via
/// [`KeyedHandlerRegistry::set_trace_callback`](crate::KeyedHandlerRegistry::set_trace_callback)
/// and mirrored to `tracing` at `trace` level. Keys are rendered with their
/// `Debug` form; `None` stands for the catch-all channel.
///
/// # Examples
///
/// ```rust
/// use stateful_core::RegistryEvent;
///
/// let event = RegistryEvent::Register { key: Some("\"Name\"".to_string()), id: 1 };
/// assert_eq!(event.to_string(), "register { key: \"Name\", id: 1 }");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A handler was appended to a list.
    Register {
        /// The key the handler was registered under.
        key: Option<String>,
        /// The id assigned to the registration.
        id: u64,
    },

    /// A registration was removed, or looked up and not found.
    Unregister {
        /// The id that was requested.
        id: u64,
        /// Whether a handler with that id existed.
        found: bool,
    },

    /// An event was dispatched to a live source.
    Dispatch {
        /// The event's key.
        key: Option<String>,
        /// How many handlers were invoked (keyed and catch-all).
        handlers: usize,
    },

    /// A dispatch found the source already dropped and did nothing.
    SourceDropped,
}

impl std::fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryEvent::Register { key, id } => {
                write!(f, "register {{ key: {}, id: {} }}", display_key(key), id)
            }
            RegistryEvent::Unregister { id, found } => {
                write!(f, "unregister {{ id: {}, found: {} }}", id, found)
            }
            RegistryEvent::Dispatch { key, handlers } => {
                write!(
                    f,
                    "dispatch {{ key: {}, handlers: {} }}",
                    display_key(key),
                    handlers
                )
            }
            RegistryEvent::SourceDropped => write!(f, "source dropped"),
        }
    }
}

fn display_key(key: &Option<String>) -> &str {
    key.as_deref().unwrap_or("*")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_event_display() {
        let event = RegistryEvent::Register {
            key: Some("Add".to_string()),
            id: 3,
        };
        assert_eq!(event.to_string(), "register { key: Add, id: 3 }");

        let event = RegistryEvent::Register { key: None, id: 4 };
        assert_eq!(event.to_string(), "register { key: *, id: 4 }");

        let event = RegistryEvent::Dispatch {
            key: Some("Remove".to_string()),
            handlers: 1,
        };
        assert_eq!(event.to_string(), "dispatch { key: Remove, handlers: 1 }");

        let event = RegistryEvent::Unregister { id: 9, found: false };
        assert_eq!(event.to_string(), "unregister { id: 9, found: false }");

        assert_eq!(RegistryEvent::SourceDropped.to_string(), "source dropped");
    }

    #[test]
    fn test_registry_event_clone() {
        let event = RegistryEvent::Unregister { id: 1, found: true };
        let cloned = event.clone();
        assert_eq!(event, cloned);
    }
}
