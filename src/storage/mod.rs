//! Per-type dense component storage.
//!
//! A [`ComponentStore`] keeps every component of one type in a single
//! growable array with no holes among the live entries. Destruction is
//! two-phase: [`ComponentStore::release`] only marks the slot, and
//! [`ComponentStore::rearrange`] later swaps live tail slots into the marked
//! holes, rewriting the moved handles' offsets in place.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::cmp;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use hibitset::{BitSet, BitSetLike};

use crate::{
    component::Component,
    handle::{ComponentRef, HandlePool, RefCore},
    locator::Locator,
    EntityId,
};


/// Constructor-time sizing knobs for one store.
///
/// Note that the default trigger edge of `1.2` means the fractional-fill
/// test `pos > floor(capacity * edge)` can never fire before the hard
/// `pos >= capacity` guard does; growth then happens exactly when the array
/// is full. An edge below `1.0` makes growth fire early to amortize it.
#[derive(Clone, Copy, Debug)]
pub struct StoreConfig {
    /// Initial capacity of the dense array.
    pub initial_size: usize,
    /// Multiplier applied to capacity when growth triggers.
    pub auto_increase_rate: f64,
    /// Fractional fill of capacity that pre-triggers growth.
    pub auto_increase_trigger_edge: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            initial_size: 100,
            auto_increase_rate: 2.0,
            auto_increase_trigger_edge: 1.2,
        }
    }
}

/// One element of the dense array: a component plus its bookkeeping.
struct Slot<T> {
    data: T,
    handle: Option<Rc<RefCore>>,
    entity: EntityId,
    version: u32,
    revision: u32,
}

impl<T: Default> Default for Slot<T> {
    fn default() -> Self {
        Slot {
            data: T::default(),
            handle: None,
            entity: 0,
            version: 0,
            revision: 0,
        }
    }
}

/// The slot array plus the dense/free boundary and the cleanup mask.
///
/// Shared between the store facade (strongly) and its locator (weakly);
/// slots `[0, allocated)` are live or marked, `[allocated, len)` are free.
struct Inner<T> {
    slots: Vec<Slot<T>>,
    allocated: usize,
    marked: BitSet,
}

/// Bumps a slot counter, wrapping from `u32::MAX` to 1 and never yielding 0.
fn bump_wrapping(value: u32) -> u32 {
    value % u32::MAX + 1
}

fn slot_index(offset: i32, allocated: usize) -> Option<usize> {
    if offset < 0 {
        return None;
    }
    let pos = offset as usize;
    if pos < allocated {
        Some(pos)
    } else {
        None
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "opaque panic payload"
    }
}

/// Runs a component lifecycle hook, logging and swallowing any panic. The
/// triggering operation completes either way.
fn run_hook(hook: &'static str, entity: EntityId, body: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(body)) {
        log::error!(
            "{} hook panicked for entity {}: {}",
            hook,
            entity,
            panic_message(payload.as_ref())
        );
    }
}

/// Object-safe store interface.
///
/// This is the seam the [`ComponentManager`](crate::ComponentManager) boxes
/// stores behind; paths that know the element type should use
/// [`ComponentStore`] directly and dispatch statically.
pub trait Store {
    /// The store's type-erased access gateway.
    fn locator(&self) -> Rc<dyn Locator>;

    /// The `TypeId` of the element type.
    fn component_type(&self) -> TypeId;

    /// Fixes a default-valued component for `entity`, returning its offset.
    fn fix_default(&mut self, entity: EntityId) -> i32;

    /// Releases the slot at `offset`; see [`ComponentStore::release`].
    fn release(&mut self, offset: i32) -> bool;

    /// Compacts the store; see [`ComponentStore::rearrange`].
    fn rearrange(&mut self);

    /// Number of allocated slots (live plus marked-for-cleanup).
    fn len(&self) -> usize;

    /// Whether no slots are allocated.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current capacity of the dense array.
    fn capacity(&self) -> usize;

    /// Upcast for downcasting to the concrete store.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete store.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Dense growable storage for every component of type `T`.
///
/// Live slots are packed at offsets `[0, allocated)`. Each live slot owns
/// the single [`RefCore`] all outside handles to it share, which is what
/// lets [`ComponentStore::rearrange`] relocate a slot with one offset
/// rewrite instead of a scan.
pub struct ComponentStore<T: Component> {
    inner: Rc<RefCell<Inner<T>>>,
    locator: Rc<StoreLocator<T>>,
    pool: Rc<HandlePool>,
    config: StoreConfig,
}

impl<T: Component> ComponentStore<T> {
    /// Creates a store with the default [`StoreConfig`] and a private
    /// handle pool.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a store with `config` and a private handle pool.
    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_pool(config, Rc::new(HandlePool::new()))
    }

    /// Creates a store sharing an existing handle pool.
    pub fn with_pool(config: StoreConfig, pool: Rc<HandlePool>) -> Self {
        let mut slots = Vec::new();
        slots.resize_with(config.initial_size, Slot::default);
        let inner = Rc::new(RefCell::new(Inner {
            slots,
            allocated: 0,
            marked: BitSet::new(),
        }));
        let locator = Rc::new(StoreLocator {
            inner: Rc::downgrade(&inner),
        });
        ComponentStore {
            inner,
            locator,
            pool,
            config,
        }
    }

    /// Fixes a default-valued component for `entity`, returning the new
    /// slot's offset.
    pub fn fix(&mut self, entity: EntityId) -> i32 {
        self.fix_with(entity, T::default())
    }

    /// Fixes `value` into a fresh slot owned by `entity` and returns the
    /// slot's offset.
    ///
    /// The slot's version is bumped (wrapping `u32::MAX` to 1, never 0), its
    /// revision resets to 0, and a pooled [`RefCore`] is allocated onto it.
    /// `value.on_create(entity)` runs synchronously at the end; a panic in
    /// the hook is logged and swallowed, and the slot is live regardless.
    pub fn fix_with(&mut self, entity: EntityId, value: T) -> i32 {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;

        let pos = inner.allocated;
        let capacity = inner.slots.len();
        let trigger = (capacity as f64 * self.config.auto_increase_trigger_edge).floor() as usize;
        if pos > trigger || pos >= capacity {
            let grown = cmp::max(
                pos + 1,
                (capacity as f64 * self.config.auto_increase_rate).round() as usize,
            );
            inner.slots.resize_with(grown, Slot::default);
        }

        let version = {
            let slot = &mut inner.slots[pos];
            slot.data = value;
            slot.entity = entity;
            slot.version = bump_wrapping(slot.version);
            slot.revision = 0;
            slot.version
        };

        let core = self.pool.acquire();
        core.allocate(
            Rc::clone(&self.locator) as Rc<dyn Locator>,
            pos as i32,
            version,
        );
        inner.slots[pos].handle = Some(core);
        inner.allocated += 1;

        run_hook("on_create", entity, || {
            inner.slots[pos].data.on_create(entity)
        });

        pos as i32
    }

    /// Marks the slot at `offset` dead.
    ///
    /// Returns false without side effects if `offset` is out of range or the
    /// slot was already released. Otherwise runs `on_destroy` (panics logged
    /// and swallowed), zeroes the slot's entity and revision, parks its
    /// [`RefCore`] in the pool, and queues the offset for the next
    /// [`ComponentStore::rearrange`]. The slot stays physically present and
    /// `len` is unchanged until then.
    pub fn release(&mut self, offset: i32) -> bool {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;

        let pos = match slot_index(offset, inner.allocated) {
            Some(pos) => pos,
            None => {
                log::debug!("release of out-of-range offset {} ignored", offset);
                return false;
            }
        };
        if inner.slots[pos].handle.is_none() {
            log::debug!("double release of offset {} ignored", offset);
            return false;
        }

        let entity = inner.slots[pos].entity;
        run_hook("on_destroy", entity, || {
            inner.slots[pos].data.on_destroy(entity)
        });

        let slot = &mut inner.slots[pos];
        slot.revision = 0;
        slot.entity = 0;
        let core = slot.handle.take();
        inner.marked.add(pos as u32);

        if let Some(core) = core {
            self.pool.release(core);
        }
        true
    }

    /// Compacts the store: every slot marked by [`ComponentStore::release`]
    /// since the last pass is backfilled with a live slot from the tail, and
    /// the moved slots' handles are relocated in place.
    ///
    /// Afterwards live slots occupy exactly `[0, len)`. Offsets held inside
    /// handles survive this; raw offsets cached outside a handle do not.
    pub fn rearrange(&mut self) {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;

        let marked: Vec<u32> = (&inner.marked).iter().collect();
        let count = marked.len();
        if count == 0 {
            return;
        }

        // Walk dead offsets from highest down while the tail cursor moves
        // inward; each swap lands a live slot in a dead one.
        for i in 0..count {
            let empty = marked[count - 1 - i] as usize;
            let last = inner.allocated - 1 - i;
            if empty >= last {
                continue;
            }
            inner.slots.swap(empty, last);
            if let Some(core) = &inner.slots[empty].handle {
                core.relocate(empty as i32);
            }
        }

        inner.allocated -= count;
        inner.marked.clear();
    }

    /// Grows capacity by `max(0, count)` slots without touching the
    /// allocated region. Returns the new capacity.
    pub fn expand(&mut self, count: i32) -> usize {
        let grow = cmp::max(0, count) as usize;
        let mut inner = self.inner.borrow_mut();
        let target = inner.slots.len() + grow;
        inner.slots.resize_with(target, Slot::default);
        target
    }

    /// Number of allocated slots (live plus marked-for-cleanup).
    pub fn len(&self) -> usize {
        self.inner.borrow().allocated
    }

    /// Whether no slots are allocated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current capacity of the dense array.
    pub fn capacity(&self) -> usize {
        self.inner.borrow().slots.len()
    }

    /// Number of slots released since the last [`ComponentStore::rearrange`].
    pub fn pending_cleanup(&self) -> usize {
        (&self.inner.borrow().marked).iter().count()
    }

    /// The store's type-erased access gateway.
    pub fn locator(&self) -> Rc<dyn Locator> {
        Rc::clone(&self.locator) as Rc<dyn Locator>
    }

    /// The entity owning the slot at `offset`, or `0` if out of range or
    /// released.
    pub fn entity_at(&self, offset: i32) -> EntityId {
        let inner = self.inner.borrow();
        match slot_index(offset, inner.allocated) {
            Some(pos) => inner.slots[pos].entity,
            None => 0,
        }
    }

    /// A typed handle to the slot at `offset`, or `None` if out of range or
    /// released.
    pub fn handle_at(&self, offset: i32) -> Option<ComponentRef<T>> {
        let inner = self.inner.borrow();
        let pos = slot_index(offset, inner.allocated)?;
        inner.slots[pos]
            .handle
            .clone()
            .map(ComponentRef::from_core)
    }

    /// A typed handle to the first live slot owned by `entity`, or `None`.
    ///
    /// Linear in the number of allocated slots; the entity table that would
    /// make this lookup constant-time lives outside this crate.
    pub fn find(&self, entity: EntityId) -> Option<ComponentRef<T>> {
        let inner = self.inner.borrow();
        inner.slots[..inner.allocated]
            .iter()
            .find(|slot| slot.handle.is_some() && slot.entity == entity)
            .and_then(|slot| slot.handle.clone())
            .map(ComponentRef::from_core)
    }

    /// Visits every live component in offset order, read-only.
    pub fn for_each(&self, mut f: impl FnMut(EntityId, &T)) {
        let inner = self.inner.borrow();
        for slot in &inner.slots[..inner.allocated] {
            if slot.handle.is_some() {
                f(slot.entity, &slot.data);
            }
        }
    }

    /// Visits every live component in offset order, mutably.
    ///
    /// Every visited slot's revision is bumped, whether or not `f` changed
    /// it; visit read-only via [`ComponentStore::for_each`] when revisions
    /// matter.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(EntityId, &mut T)) {
        let mut inner = self.inner.borrow_mut();
        let allocated = inner.allocated;
        for slot in &mut inner.slots[..allocated] {
            if slot.handle.is_some() {
                f(slot.entity, &mut slot.data);
                slot.revision = bump_wrapping(slot.revision);
            }
        }
    }

    /// The `TypeId` of the element type.
    pub fn component_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    /// The pool this store draws handle bodies from.
    pub fn pool(&self) -> &Rc<HandlePool> {
        &self.pool
    }
}

impl<T: Component> Default for ComponentStore<T> {
    fn default() -> Self {
        ComponentStore::new()
    }
}

impl<T: Component> Store for ComponentStore<T> {
    fn locator(&self) -> Rc<dyn Locator> {
        ComponentStore::locator(self)
    }

    fn component_type(&self) -> TypeId {
        ComponentStore::component_type(self)
    }

    fn fix_default(&mut self, entity: EntityId) -> i32 {
        self.fix(entity)
    }

    fn release(&mut self, offset: i32) -> bool {
        ComponentStore::release(self, offset)
    }

    fn rearrange(&mut self) {
        ComponentStore::rearrange(self)
    }

    fn len(&self) -> usize {
        ComponentStore::len(self)
    }

    fn capacity(&self) -> usize {
        ComponentStore::capacity(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The per-type [`Locator`] implementation: a non-owning window onto one
/// store's slot array.
///
/// Every operation degrades to the safe empty result when the offset is out
/// of range or the owning store has been dropped.
pub(crate) struct StoreLocator<T> {
    inner: Weak<RefCell<Inner<T>>>,
}

impl<T: Component> StoreLocator<T> {
    /// Validated read-only element access; `None` on a stale version, an
    /// out-of-range offset, or a dropped store.
    pub(crate) fn read<R>(&self, version: u32, offset: i32, f: impl FnOnce(&T) -> R) -> Option<R> {
        let inner = self.inner.upgrade()?;
        let inner = inner.borrow();
        let pos = slot_index(offset, inner.allocated)?;
        let slot = &inner.slots[pos];
        if slot.version != version {
            return None;
        }
        Some(f(&slot.data))
    }

    /// Validated read-write element access; bumps the slot revision after a
    /// successful call.
    pub(crate) fn write<R>(
        &self,
        version: u32,
        offset: i32,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let inner = self.inner.upgrade()?;
        let mut inner = inner.borrow_mut();
        let pos = slot_index(offset, inner.allocated)?;
        let slot = &mut inner.slots[pos];
        if slot.version != version {
            return None;
        }
        let result = f(&mut slot.data);
        slot.revision = bump_wrapping(slot.revision);
        Some(result)
    }
}

impl<T: Component> Locator for StoreLocator<T> {
    fn not_null(&self, version: u32, offset: i32) -> bool {
        let inner = match self.inner.upgrade() {
            Some(inner) => inner,
            None => return false,
        };
        let inner = inner.borrow();
        match slot_index(offset, inner.allocated) {
            Some(pos) => inner.slots[pos].version == version,
            None => false,
        }
    }

    fn component_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn entity_id(&self, offset: i32) -> EntityId {
        let inner = match self.inner.upgrade() {
            Some(inner) => inner,
            None => return 0,
        };
        let inner = inner.borrow();
        match slot_index(offset, inner.allocated) {
            Some(pos) => inner.slots[pos].entity,
            None => 0,
        }
    }

    fn ref_core(&self, offset: i32) -> Option<Rc<RefCore>> {
        let inner = self.inner.upgrade()?;
        let inner = inner.borrow();
        let pos = slot_index(offset, inner.allocated)?;
        inner.slots[pos].handle.clone()
    }

    fn revision(&self, offset: i32) -> u32 {
        let inner = match self.inner.upgrade() {
            Some(inner) => inner,
            None => return 0,
        };
        let inner = inner.borrow();
        match slot_index(offset, inner.allocated) {
            Some(pos) => inner.slots[pos].revision,
            None => 0,
        }
    }

    fn change_revision(&self, offset: i32) -> u32 {
        let inner = match self.inner.upgrade() {
            Some(inner) => inner,
            None => return 0,
        };
        let mut inner = inner.borrow_mut();
        match slot_index(offset, inner.allocated) {
            Some(pos) => {
                let slot = &mut inner.slots[pos];
                slot.revision = bump_wrapping(slot.revision);
                slot.revision
            }
            None => 0,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
