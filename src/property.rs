//! Property-change events keyed by property name.
//!
//! The empty name is the "every property" sentinel: handlers registered under
//! it land on the catch-all list, and an event carrying it reaches only the
//! catch-all handlers.

use std::borrow::Cow;
use std::sync::Arc;

use crate::{BoxError, Error, HandlerId, KeyedEvent, KeyedHandlerRegistry};

/// A named property of the source changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyChanged {
    name: Cow<'static, str>,
}

impl PropertyChanged {
    /// The property `name` changed.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into() }
    }

    /// Every property may have changed.
    pub fn all() -> Self {
        Self::new("")
    }

    /// The property name; empty when all properties changed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this event stands for every property.
    pub fn is_all(&self) -> bool {
        self.name.is_empty()
    }
}

impl KeyedEvent for PropertyChanged {
    type Key = Cow<'static, str>;

    fn key(&self) -> Option<&Self::Key> {
        Some(&self.name)
    }

    fn is_catch_all_key(key: &Self::Key) -> bool {
        key.is_empty()
    }
}

/// Registry dispatching [`PropertyChanged`] events by property name.
pub type PropertyHandlerRegistry<S> = KeyedHandlerRegistry<S, PropertyChanged>;

impl<S: 'static> KeyedHandlerRegistry<S, PropertyChanged> {
    /// Register `handler` for property `name`, optionally firing it once now.
    ///
    /// With `execute` set and the source alive, the handler is invoked right
    /// after registration with `PropertyChanged::new(name)`, so it can pick up
    /// the current value. An empty `name` registers on the catch-all list.
    ///
    /// # Errors
    ///
    /// [`Error::Handler`] if the immediate invocation fails. The handler stays
    /// registered.
    pub fn register_property(
        &self,
        name: impl Into<Cow<'static, str>>,
        handler: impl Fn(&Arc<S>, &PropertyChanged) -> Result<(), BoxError> + Send + Sync + 'static,
        execute: bool,
    ) -> Result<HandlerId, Error> {
        let name = name.into();
        let handler = Arc::new(handler);
        let id = self.register_handler(Some(name.clone()), handler.clone());

        if execute {
            if let Some(source) = self.source() {
                handler(&source, &PropertyChanged::new(name)).map_err(Error::Handler)?;
            }
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Person {
        name: Mutex<String>,
    }

    fn person() -> Arc<Person> {
        Arc::new(Person {
            name: Mutex::new("Ada".to_string()),
        })
    }

    #[test]
    fn test_empty_name_is_catch_all() {
        let source = person();
        let registry = PropertyHandlerRegistry::new(&source);
        let count = Arc::new(Mutex::new(0));

        let counter = count.clone();
        registry.register_for(Cow::Borrowed(""), move |_, _| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });
        registry.register_for("Name".into(), |_, _| Err("keyed tier must not run".into()));

        assert_eq!(registry.catch_all().len(), 1);
        assert!(registry.snapshot().iter().all(|(key, _)| key != ""));

        registry.dispatch(&PropertyChanged::all()).unwrap();
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_named_property_runs_keyed_then_catch_all() {
        let source = person();
        let registry = PropertyHandlerRegistry::new(&source);
        let log = Arc::new(Mutex::new(Vec::new()));

        let keyed = log.clone();
        registry.register_for("Name".into(), move |_, event| {
            keyed.lock().unwrap().push(format!("keyed:{}", event.name()));
            Ok(())
        });
        let all = log.clone();
        registry.register(move |_, event| {
            all.lock().unwrap().push(format!("all:{}", event.name()));
            Ok(())
        });

        registry.dispatch(&PropertyChanged::new("Name")).unwrap();
        registry.dispatch(&PropertyChanged::new("Age")).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["keyed:Name", "all:Name", "all:Age"]
        );
    }

    #[test]
    fn test_register_property_executes_immediately() {
        let source = person();
        let registry = PropertyHandlerRegistry::new(&source);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        registry
            .register_property(
                "Name",
                move |source: &Arc<Person>, _| {
                    let name = source.name.lock().unwrap().clone();
                    seen_clone.lock().unwrap().push(name);
                    Ok(())
                },
                true,
            )
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["Ada"]);

        *source.name.lock().unwrap() = "Grace".to_string();
        registry.dispatch(&PropertyChanged::new("Name")).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["Ada", "Grace"]);
    }

    #[test]
    fn test_register_property_without_execute() {
        let source = person();
        let registry = PropertyHandlerRegistry::new(&source);
        let count = Arc::new(Mutex::new(0));

        let counter = count.clone();
        registry
            .register_property(
                "Name",
                move |_, _| {
                    *counter.lock().unwrap() += 1;
                    Ok(())
                },
                false,
            )
            .unwrap();

        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn test_register_property_execute_error_keeps_registration() {
        let source = person();
        let registry = PropertyHandlerRegistry::new(&source);

        let result = registry.register_property("Name", |_, _| Err("not ready".into()), true);

        assert!(matches!(result, Err(Error::Handler(_))));
        assert_eq!(registry.handler_count(), 1);
    }

    #[test]
    fn test_register_property_skips_execute_when_source_dropped() {
        let source = person();
        let registry = PropertyHandlerRegistry::new(&source);
        drop(source);

        let id = registry.register_property("Name", |_, _| Err("must not run".into()), true);
        assert!(id.is_ok());
    }
}
