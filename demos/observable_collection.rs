//! Observable collection example for stateful-core.
//!
//! Demonstrates:
//! - A source that owns its own registry through a weak back-reference
//! - Keyed handlers (per change kind) and catch-all handlers
//! - Scoped subscriptions torn down by a `ResourceGroup`
//! - Marshaling handler work through a `SynchronizationRouter`
//! - Dispatch after the source is dropped being a silent no-op
//!
//! Run with: `cargo run --example observable_collection`

use stateful_core::{
    CollectionAction, CollectionChanged, CollectionHandlerRegistry, Error, ResourceGroup,
    SynchronizationRouter, Work,
};
use std::sync::{Arc, Mutex, Weak};

/// A list that announces its changes.
struct ObservableList {
    items: Mutex<Vec<String>>,
    changes: Arc<CollectionHandlerRegistry<ObservableList, String>>,
}

impl ObservableList {
    fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<ObservableList>| ObservableList {
            items: Mutex::new(Vec::new()),
            changes: Arc::new(
                CollectionHandlerRegistry::from_weak(weak.clone())
                    .expect("a new_cyclic handle is never null"),
            ),
        })
    }

    fn push(&self, item: &str) -> Result<(), Error> {
        let index = {
            let mut items = self.items.lock().unwrap_or_else(|p| p.into_inner());
            items.push(item.to_string());
            items.len() - 1
        };
        self.changes
            .dispatch(&CollectionChanged::added(vec![item.to_string()], index))
    }

    fn remove(&self, index: usize) -> Result<(), Error> {
        let removed = self
            .items
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(index);
        self.changes
            .dispatch(&CollectionChanged::removed(vec![removed], index))
    }

    fn clear(&self) -> Result<(), Error> {
        self.items.lock().unwrap_or_else(|p| p.into_inner()).clear();
        self.changes.dispatch(&CollectionChanged::reset())
    }
}

fn main() -> Result<(), Error> {
    println!("=== stateful-core: Observable Collection ===\n");

    // -------------------------------------------------------------------------
    // 1. Build a source that owns its registry
    // -------------------------------------------------------------------------
    println!("1. Creating an observable list...");

    let list = ObservableList::new();

    // -------------------------------------------------------------------------
    // 2. Subscribe, keeping the handles in a group
    // -------------------------------------------------------------------------
    println!("\n2. Subscribing handlers...");

    // Stand-in for a UI thread: deferred work is queued and pumped below.
    let queue: Arc<Mutex<Vec<Work>>> = Arc::default();
    let pending = queue.clone();
    let router = SynchronizationRouter::for_async(move |work| {
        pending.lock().unwrap_or_else(|p| p.into_inner()).push(work)
    });

    let group: ResourceGroup<()> = ResourceGroup::new(Vec::new());

    group.listeners().add(list.changes.subscribe_for(
        CollectionAction::Add,
        |_, event| {
            println!("   [add] {:?} at {:?}", event.new_items, event.new_index);
            Ok(())
        },
    ));

    group.listeners().add(list.changes.subscribe_for(
        CollectionAction::Remove,
        move |list, event| {
            let remaining = list.items.lock().unwrap_or_else(|p| p.into_inner()).len();
            let removed = event.old_items.clone();
            router.run_later(move || {
                println!("   [remove, deferred] {:?}, {} left", removed, remaining)
            })?;
            Ok(())
        },
    ));

    group.listeners().add(list.changes.subscribe(|_, event| {
        println!("   [any] {}", event.action);
        Ok(())
    }));

    println!("   {} handlers registered", list.changes.handler_count());

    // -------------------------------------------------------------------------
    // 3. Mutate the list
    // -------------------------------------------------------------------------
    println!("\n3. Mutating the list...");

    list.push("alpha")?;
    list.push("beta")?;
    list.remove(0)?;
    list.clear()?;

    println!("\n   Pumping deferred work:");
    let work: Vec<Work> = queue
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .drain(..)
        .collect();
    for item in work {
        item();
    }

    // -------------------------------------------------------------------------
    // 4. Dispose the group
    // -------------------------------------------------------------------------
    println!("\n4. Disposing the group...");

    group.dispose()?;
    println!(
        "   {} handlers registered after dispose",
        list.changes.handler_count()
    );
    list.push("gamma")?;

    // -------------------------------------------------------------------------
    // 5. Drop the source
    // -------------------------------------------------------------------------
    println!("\n5. Dropping the source...");

    let changes = list.changes.clone();
    changes.register(|_, _| Err("never reached".into()));
    drop(list);
    changes.dispatch(&CollectionChanged::reset())?;
    println!("   dispatch after drop: no handlers ran, no error");

    println!("\n=== Done ===");
    Ok(())
}
