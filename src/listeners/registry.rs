//! # Listener registry - type-keyed store of listeners.
//!
//! The registry maps an entity type to the ordered list of listeners registered for it.
//!
//! ## Architecture
//! ```text
//! register::<E>(listener) ──► write lock ──► slots[TypeId::of::<E>()].push(listener)
//! lookup::<E>()           ──► read lock  ──► clone of slots[TypeId::of::<E>()]
//! ```
//!
//! ## Rules
//! - Insertion order is preserved; the same listener instance may be registered twice.
//! - Single-listener mode rejects a second registration for a type (`AlreadyRegistered`).
//!   The check and the append happen under one write lock.
//! - Entries are never removed; listeners live as long as the registry.
//! - `lookup` returns a snapshot; later registrations do not change it.
//! - Each slot stores a non-empty `Vec<ListenerRef<E>>` for its own `E`. Typed access goes
//!   through the generic entry points only, so the stored type always matches the key;
//!   counts are read from that list.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use tokio::sync::RwLock;

use super::listener::ListenerRef;
use crate::error::EngineError;

/// Listeners for one entity type.
struct Slot {
    entity: &'static str,
    /// `Vec<ListenerRef<E>>` for the `E` this slot is keyed by.
    listeners: Box<dyn Any + Send + Sync>,
}

impl Slot {
    fn new<E: Send + Sync + 'static>() -> Self {
        Self {
            entity: std::any::type_name::<E>(),
            listeners: Box::new(Vec::<ListenerRef<E>>::new()),
        }
    }

    fn push<E: Send + Sync + 'static>(&mut self, listener: ListenerRef<E>) {
        let list = self.listeners.downcast_mut::<Vec<ListenerRef<E>>>();
        debug_assert!(list.is_some(), "slot type mismatch for {}", self.entity);
        if let Some(list) = list {
            list.push(listener);
        }
    }

    fn len<E: Send + Sync + 'static>(&self) -> usize {
        self.listeners
            .downcast_ref::<Vec<ListenerRef<E>>>()
            .map_or(0, Vec::len)
    }

    fn snapshot<E: Send + Sync + 'static>(&self) -> Vec<ListenerRef<E>> {
        self.listeners
            .downcast_ref::<Vec<ListenerRef<E>>>()
            .cloned()
            .unwrap_or_default()
    }
}

/// Type-keyed registry of listeners.
pub struct ListenerRegistry {
    slots: RwLock<HashMap<TypeId, Slot>>,
    multi: bool,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    ///
    /// `multi = false` allows at most one listener per entity type.
    pub fn new(multi: bool) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            multi,
        }
    }

    /// True if more than one listener per type is accepted.
    pub fn is_multi(&self) -> bool {
        self.multi
    }

    /// Appends `listener` to the list for `E`.
    ///
    /// Returns the number of listeners registered for `E` afterwards.
    ///
    /// ### Errors
    /// [`EngineError::AlreadyRegistered`] if multi mode is off and `E` already has a listener.
    pub async fn register<E>(&self, listener: ListenerRef<E>) -> Result<usize, EngineError>
    where
        E: Send + Sync + 'static,
    {
        let mut slots = self.slots.write().await;
        append(&mut slots, self.multi, listener)
    }

    /// Same as [`register`](Self::register) through exclusive access, without locking.
    pub fn insert<E>(&mut self, listener: ListenerRef<E>) -> Result<usize, EngineError>
    where
        E: Send + Sync + 'static,
    {
        let multi = self.multi;
        append(self.slots.get_mut(), multi, listener)
    }

    /// Returns a snapshot of the listeners for `E` in registration order.
    ///
    /// Empty when nothing is registered.
    pub async fn lookup<E>(&self) -> Vec<ListenerRef<E>>
    where
        E: Send + Sync + 'static,
    {
        let slots = self.slots.read().await;
        slots
            .get(&TypeId::of::<E>())
            .map(Slot::snapshot::<E>)
            .unwrap_or_default()
    }

    /// Number of listeners registered for `E`.
    pub async fn len<E>(&self) -> usize
    where
        E: Send + Sync + 'static,
    {
        let slots = self.slots.read().await;
        slots.get(&TypeId::of::<E>()).map_or(0, Slot::len::<E>)
    }

    /// Number of entity types with at least one listener.
    pub async fn type_count(&self) -> usize {
        self.slots.read().await.len()
    }

    /// Sorted names of entity types with at least one listener.
    pub async fn entities(&self) -> Vec<&'static str> {
        let slots = self.slots.read().await;
        let mut names: Vec<&'static str> = slots.values().map(|s| s.entity).collect();
        names.sort_unstable();
        names
    }
}

/// Single-mode check and append; the caller holds exclusive access to `slots`.
fn append<E>(
    slots: &mut HashMap<TypeId, Slot>,
    multi: bool,
    listener: ListenerRef<E>,
) -> Result<usize, EngineError>
where
    E: Send + Sync + 'static,
{
    let slot = slots.entry(TypeId::of::<E>()).or_insert_with(Slot::new::<E>);

    if !multi && slot.len::<E>() > 0 {
        return Err(EngineError::AlreadyRegistered {
            entity: slot.entity,
        });
    }

    slot.push(listener);
    Ok(slot.len::<E>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listeners::{Listener, ListenerFn};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Ping;
    #[derive(Debug)]
    struct Pong;

    fn noop<E: Send + Sync + 'static>(name: &'static str) -> ListenerRef<E> {
        Arc::new(ListenerFn::new(|_: &E| Ok(())).with_name(name))
    }

    #[tokio::test]
    async fn test_single_mode_rejects_second_registration() {
        let reg = ListenerRegistry::new(false);
        assert_eq!(reg.register::<Ping>(noop("a")).await, Ok(1));

        let err = reg.register::<Ping>(noop("b")).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyRegistered { .. }));
        assert_eq!(reg.len::<Ping>().await, 1);

        // Other types are unaffected.
        assert_eq!(reg.register::<Pong>(noop("c")).await, Ok(1));
    }

    #[tokio::test]
    async fn test_multi_mode_keeps_insertion_order() {
        let reg = ListenerRegistry::new(true);
        for name in ["first", "second", "third"] {
            reg.register::<Ping>(noop(name)).await.unwrap();
        }

        let names: Vec<String> = reg
            .lookup::<Ping>()
            .await
            .iter()
            .map(|l| l.name().to_string())
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_same_instance_twice_is_allowed_in_multi_mode() {
        let reg = ListenerRegistry::new(true);
        let l: ListenerRef<Ping> = noop("dup");
        reg.register(l.clone()).await.unwrap();
        reg.register(l).await.unwrap();
        assert_eq!(reg.len::<Ping>().await, 2);
    }

    #[tokio::test]
    async fn test_lookup_unknown_type_is_empty() {
        let reg = ListenerRegistry::new(true);
        assert!(reg.lookup::<Pong>().await.is_empty());
        assert_eq!(reg.type_count().await, 0);
    }

    #[tokio::test]
    async fn test_lookup_is_a_snapshot() {
        let reg = ListenerRegistry::new(true);
        reg.register::<Ping>(noop("a")).await.unwrap();

        let snapshot = reg.lookup::<Ping>().await;
        reg.register::<Ping>(noop("b")).await.unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(reg.lookup::<Ping>().await.len(), 2);
    }

    #[tokio::test]
    async fn test_entities_lists_registered_types() {
        let reg = ListenerRegistry::new(true);
        reg.register::<Pong>(noop("a")).await.unwrap();
        reg.register::<Ping>(noop("b")).await.unwrap();

        let entities = reg.entities().await;
        assert_eq!(entities.len(), 2);
        assert!(entities.iter().any(|e| e.ends_with("Ping")));
        assert_eq!(reg.type_count().await, 2);
    }

    #[tokio::test]
    async fn test_insert_follows_registration_rules() {
        let mut reg = ListenerRegistry::new(false);
        assert_eq!(reg.insert::<Ping>(noop("a")), Ok(1));
        assert!(reg.insert::<Ping>(noop("b")).is_err());
        assert_eq!(reg.lookup::<Ping>().await.len(), 1);
    }

    #[tokio::test]
    async fn test_count_tracks_stored_listeners() {
        let reg = ListenerRegistry::new(true);
        for expected in 1..=3 {
            assert_eq!(reg.register::<Ping>(noop("a")).await, Ok(expected));
            assert_eq!(reg.len::<Ping>().await, reg.lookup::<Ping>().await.len());
        }
        assert_eq!(reg.len::<Pong>().await, 0);
        assert_eq!(reg.type_count().await, 1);
    }

    #[test]
    fn test_slot_len_reads_stored_list() {
        let mut slot = Slot::new::<Ping>();
        assert_eq!(slot.len::<Ping>(), 0);
        slot.push::<Ping>(noop("a"));
        slot.push::<Ping>(noop("b"));
        assert_eq!(slot.len::<Ping>(), 2);
        assert_eq!(slot.snapshot::<Ping>().len(), 2);
        // A different type never reads this slot's list.
        assert_eq!(slot.len::<Pong>(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_single_mode_registration_admits_one() {
        let reg = Arc::new(ListenerRegistry::new(false));
        let mut joins = Vec::new();
        for _ in 0..16 {
            let reg = reg.clone();
            joins.push(tokio::spawn(async move { reg.register::<Ping>(noop("x")).await }));
        }

        let mut ok = 0;
        for j in joins {
            if j.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(reg.len::<Ping>().await, 1);
    }
}
