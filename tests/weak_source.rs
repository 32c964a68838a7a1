//! Integration tests for the weak back-reference to the notification source.
//!
//! A registry must never keep its source alive, and dispatching after the
//! source is gone must invoke nothing and report no error.

use stateful_core::{
    Error, KeyedHandlerRegistry, PropertyChanged, PropertyHandlerRegistry, RegistryEvent,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

struct Document {
    title: Mutex<String>,
    changes: PropertyHandlerRegistry<Document>,
}

impl Document {
    fn new(title: &str) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Document>| Document {
            title: Mutex::new(title.to_string()),
            changes: KeyedHandlerRegistry::from_weak(weak.clone())
                .expect("cyclic handle is not null"),
        })
    }

    fn set_title(&self, title: &str) -> Result<(), Error> {
        *self.title.lock().unwrap() = title.to_string();
        self.changes.dispatch(&PropertyChanged::new("Title"))
    }
}

#[test]
fn test_source_owning_its_registry_is_freed() {
    let doc = Document::new("draft");
    let weak = Arc::downgrade(&doc);

    let titles = Arc::new(Mutex::new(Vec::new()));
    let log = titles.clone();
    doc.changes.register_for("Title".into(), move |doc, _| {
        log.lock().unwrap().push(doc.title.lock().unwrap().clone());
        Ok(())
    });

    doc.set_title("final").unwrap();
    assert_eq!(*titles.lock().unwrap(), vec!["final"]);

    drop(doc);
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_dispatch_after_drop_invokes_nothing() {
    let source = Arc::new(String::from("source"));
    let registry = Arc::new(PropertyHandlerRegistry::new(&source));
    let calls = Arc::new(AtomicUsize::new(0));

    for key in ["", "Name", "Age"] {
        let calls = calls.clone();
        registry.register_for(key.into(), move |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    registry.dispatch(&PropertyChanged::new("Name")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    drop(source);
    for name in ["", "Name", "Age", "Unknown"] {
        assert!(registry.dispatch(&PropertyChanged::new(name)).is_ok());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_failing_handlers_are_not_reached_after_drop() {
    let source = Arc::new(0u8);
    let registry = PropertyHandlerRegistry::new(&source);
    registry.register(|_, _| Err("should never run".into()));

    drop(source);
    assert!(registry.dispatch(&PropertyChanged::all()).is_ok());
}

#[test]
fn test_source_dropped_is_traced() {
    let source = Arc::new(0u8);
    let registry = PropertyHandlerRegistry::new(&source);
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    registry.set_trace_callback(move |event| events_clone.lock().unwrap().push(event.clone()));

    drop(source);
    registry.dispatch(&PropertyChanged::all()).unwrap();

    assert_eq!(*events.lock().unwrap(), vec![RegistryEvent::SourceDropped]);
}

#[test]
fn test_null_weak_source_is_rejected() {
    let result = PropertyHandlerRegistry::<String>::from_weak(Weak::new());
    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: `source` is absent");
}

#[test]
fn test_handlers_do_not_extend_source_lifetime() {
    let source = Arc::new(String::from("source"));
    let registry = PropertyHandlerRegistry::new(&source);

    registry.register(|source, _| {
        assert!(!source.is_empty());
        Ok(())
    });
    registry.dispatch(&PropertyChanged::all()).unwrap();

    assert_eq!(Arc::strong_count(&source), 1);
    assert_eq!(Arc::weak_count(&source), 1);
}
