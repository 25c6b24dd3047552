//! The type → store registry and component lifecycle.

use std::any::TypeId;
use std::rc::Rc;

use ahash::AHashMap as HashMap;
use shrev::{EventChannel, EventIterator, ReaderId};

use crate::{
    component::Component,
    error::{DeadHandle, Error, NoSuchStore},
    handle::{ComponentRef, HandlePool, UntypedRef},
    storage::{ComponentStore, Store, StoreConfig},
    EntityId,
};

#[cfg(test)]
mod tests;

/// A component lifecycle event.
///
/// Events carry the handle's identity fields captured before any
/// invalidation, which is all a consumer of a `Removed` event can still rely
/// on: by the time the channel is drained the pooled handle body may already
/// serve a different slot. Consumers of `Created` events that want live
/// access should refetch a handle through the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentEvent {
    /// A component was created and its slot is live.
    Created {
        /// The owning entity.
        entity: EntityId,
        /// The element type of the store the component lives in.
        component_type: TypeId,
        /// The slot offset at creation time.
        offset: i32,
        /// The slot version at creation time.
        version: u32,
    },
    /// A component was destroyed and its handle invalidated.
    Removed {
        /// The entity that owned the component.
        entity: EntityId,
        /// The element type of the store the component lived in.
        component_type: TypeId,
        /// The slot offset at destruction time.
        offset: i32,
        /// The slot version at destruction time.
        version: u32,
    },
}

/// Registry of one [`ComponentStore`] per component type, with lifecycle
/// events.
///
/// Stores are created lazily on first use and share one [`HandlePool`].
/// Destruction paths that hold only an untyped handle resolve their store
/// through the handle's locator; both the typed and the dynamic lookup key
/// the registry by the element's `TypeId`.
///
/// ## Examples
///
/// ```
/// use sparsecs::prelude::*;
///
/// #[derive(Default)]
/// struct Health(u32);
/// impl Component for Health {}
///
/// let mut manager = ComponentManager::new();
/// let mut reader = manager.track();
///
/// let health = manager.create_component_with(7, Health(100));
/// assert_eq!(health.entity(), 7);
///
/// let events: Vec<_> = manager.events(&mut reader).collect();
/// assert_eq!(events.len(), 1);
/// ```
pub struct ComponentManager {
    stores: HashMap<TypeId, Box<dyn Store>>,
    pool: Rc<HandlePool>,
    events: EventChannel<ComponentEvent>,
}

impl ComponentManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        ComponentManager {
            stores: HashMap::new(),
            pool: Rc::new(HandlePool::new()),
            events: EventChannel::new(),
        }
    }

    /// Registers a store for `T` with the default [`StoreConfig`]. Does
    /// nothing if `T` is already registered.
    pub fn register<T: Component>(&mut self) {
        self.register_with_config::<T>(StoreConfig::default());
    }

    /// Registers a store for `T` sized by `config`. Does nothing if `T` is
    /// already registered; the config of an existing store is never changed.
    pub fn register_with_config<T: Component>(&mut self, config: StoreConfig) {
        let pool = Rc::clone(&self.pool);
        self.stores
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(ComponentStore::<T>::with_pool(config, pool)));
    }

    /// The store for `T`, or `None` if none has been created yet.
    pub fn store<T: Component>(&self) -> Option<&ComponentStore<T>> {
        self.stores.get(&TypeId::of::<T>()).map(|store| {
            // The registry is keyed by the element type; a mapped store of
            // any other element type is registry corruption.
            store
                .as_any()
                .downcast_ref::<ComponentStore<T>>()
                .expect("store registered under a foreign element type")
        })
    }

    /// The store for `T`, created with the default config if missing.
    pub fn store_mut<T: Component>(&mut self) -> &mut ComponentStore<T> {
        self.register::<T>();
        self.stores
            .get_mut(&TypeId::of::<T>())
            .expect("store registered above")
            .as_any_mut()
            .downcast_mut::<ComponentStore<T>>()
            .expect("store registered under a foreign element type")
    }

    /// The type-erased store for `component_type`, or `None`. Never creates:
    /// a store cannot be constructed from a bare `TypeId`.
    pub fn store_dyn(&mut self, component_type: TypeId) -> Option<&mut (dyn Store + '_)> {
        match self.stores.get_mut(&component_type) {
            Some(store) => Some(&mut **store),
            None => None,
        }
    }

    /// Number of stores in the registry.
    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    /// Total allocated slots across all stores (live plus pending cleanup).
    pub fn total_components(&self) -> usize {
        self.stores.values().map(|store| store.len()).sum()
    }

    /// Creates a default-valued `T` component for `entity` and returns its
    /// handle. Emits [`ComponentEvent::Created`].
    pub fn create_component<T: Component>(&mut self, entity: EntityId) -> ComponentRef<T> {
        self.create_component_with(entity, T::default())
    }

    /// Creates a `T` component for `entity` from `value` and returns its
    /// handle. Emits [`ComponentEvent::Created`].
    pub fn create_component_with<T: Component>(
        &mut self,
        entity: EntityId,
        value: T,
    ) -> ComponentRef<T> {
        let store = self.store_mut::<T>();
        let offset = store.fix_with(entity, value);
        // A freshly fixed slot always holds a handle.
        let handle = store.handle_at(offset).unwrap();
        let version = handle.core().version();
        self.events.single_write(ComponentEvent::Created {
            entity,
            component_type: TypeId::of::<T>(),
            offset,
            version,
        });
        handle
    }

    /// Destroys the component `handle` points at.
    ///
    /// Fails with [`Error::DeadHandle`] if the handle is already invalid and
    /// [`Error::NoSuchStore`] if its store is not in this registry. On
    /// success the handle body is invalidated and pooled, and
    /// [`ComponentEvent::Removed`] is emitted carrying the identity the
    /// handle had before invalidation.
    pub fn destroy_component(&mut self, handle: &UntypedRef) -> Result<(), Error> {
        let core = handle.core();
        let offset = core.offset();
        let version = core.version();

        let dead = || DeadHandle {
            action: "destroy component",
            offset,
            version,
        };

        let locator = core.locator().ok_or_else(dead)?;
        if !locator.not_null(version, offset) {
            log::debug!(
                "destroy through a stale handle (offset {}, version {})",
                offset,
                version
            );
            return Err(dead().into());
        }

        let component_type = locator.component_type();
        let entity = locator.entity_id(offset);
        let store = self
            .stores
            .get_mut(&component_type)
            .ok_or(NoSuchStore { component_type })?;

        if !store.release(offset) {
            return Err(dead().into());
        }
        self.events.single_write(ComponentEvent::Removed {
            entity,
            component_type,
            offset,
            version,
        });
        Ok(())
    }

    /// Compacts every store. Call at a world tick boundary, never
    /// concurrently with component creation or destruction.
    pub fn cleanup_components(&mut self) {
        for store in self.stores.values_mut() {
            store.rearrange();
        }
    }

    /// Subscribes to lifecycle events.
    pub fn track(&mut self) -> ReaderId<ComponentEvent> {
        self.events.register_reader()
    }

    /// Drains the events written since `reader` last read.
    pub fn events(&self, reader: &mut ReaderId<ComponentEvent>) -> EventIterator<ComponentEvent> {
        self.events.read(reader)
    }

    /// The lifecycle event channel itself.
    pub fn event_channel(&self) -> &EventChannel<ComponentEvent> {
        &self.events
    }

    /// The handle pool shared by this manager's stores.
    pub fn pool(&self) -> &Rc<HandlePool> {
        &self.pool
    }
}

impl Default for ComponentManager {
    fn default() -> Self {
        ComponentManager::new()
    }
}
