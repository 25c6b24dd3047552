//! Handle bodies, the pool that recycles them, and the typed/untyped
//! wrappers user code holds.

use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::marker::PhantomData;
use std::rc::Rc;

use crossbeam_queue::SegQueue;

use crate::{component::Component, locator::Locator, storage::StoreLocator, EntityId};

/// Offset value of an invalid handle body.
pub const INVALID_OFFSET: i32 = -1;

/// Version value of an invalid handle body; live slots never have version 0.
pub const INVALID_VERSION: u32 = 0;

/// The body of a handle: `(locator, offset, version)`.
///
/// A `RefCore` is shared between the slot that owns it and any number of
/// user-held [`ComponentRef`] / [`UntypedRef`] wrappers. The owning store
/// rewrites `offset` in place during compaction, which is what keeps every
/// outside wrapper valid without scanning for them. When the slot is
/// released the body is reset to the invalid triple and parked in a
/// [`HandlePool`], so lingering wrappers observe a dead handle from that
/// point on.
pub struct RefCore {
    locator: RefCell<Option<Rc<dyn Locator>>>,
    offset: Cell<i32>,
    version: Cell<u32>,
}

impl RefCore {
    fn new() -> Self {
        RefCore {
            locator: RefCell::new(None),
            offset: Cell::new(INVALID_OFFSET),
            version: Cell::new(INVALID_VERSION),
        }
    }

    /// Points this body at a freshly fixed slot. The body must be freshly
    /// acquired from its pool or previously invalidated.
    pub(crate) fn allocate(&self, locator: Rc<dyn Locator>, offset: i32, version: u32) {
        *self.locator.borrow_mut() = Some(locator);
        self.offset.set(offset);
        self.version.set(version);
    }

    /// Rewrites only the offset; used when the slot moves during compaction.
    pub(crate) fn relocate(&self, offset: i32) {
        self.offset.set(offset);
    }

    /// Resets to the invalid triple.
    pub(crate) fn invalidate(&self) {
        *self.locator.borrow_mut() = None;
        self.offset.set(INVALID_OFFSET);
        self.version.set(INVALID_VERSION);
    }

    /// The slot offset this body currently points at, [`INVALID_OFFSET`] if
    /// invalid.
    pub fn offset(&self) -> i32 {
        self.offset.get()
    }

    /// The slot version this body was allocated against,
    /// [`INVALID_VERSION`] if invalid.
    pub fn version(&self) -> u32 {
        self.version.get()
    }

    /// The locator of the owning store, `None` if invalid.
    pub fn locator(&self) -> Option<Rc<dyn Locator>> {
        self.locator.borrow().clone()
    }

    /// Whether this body holds the invalid triple.
    pub fn is_null(&self) -> bool {
        self.locator.borrow().is_none()
    }

    /// Whether this body currently validates against its store: the offset
    /// is in range and the slot's version matches.
    pub fn is_alive(&self) -> bool {
        match self.locator.borrow().as_ref() {
            Some(locator) => locator.not_null(self.version.get(), self.offset.get()),
            None => false,
        }
    }
}

impl Default for RefCore {
    fn default() -> Self {
        RefCore::new()
    }
}

impl Debug for RefCore {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("RefCore")
            .field("offset", &self.offset.get())
            .field("version", &self.version.get())
            .field("null", &self.is_null())
            .finish()
    }
}

/// A pool of reusable handle bodies.
///
/// Bodies are parked here on slot release and handed back out on the next
/// fixation, already reset to the invalid triple. The pool is shared (via
/// `Rc`) by every store a [`ComponentManager`](crate::ComponentManager)
/// creates; a store constructed standalone owns a private one.
pub struct HandlePool {
    idle: SegQueue<Rc<RefCore>>,
}

impl HandlePool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        HandlePool {
            idle: SegQueue::new(),
        }
    }

    /// Pops a parked body, or mints a fresh one if the pool is empty.
    pub(crate) fn acquire(&self) -> Rc<RefCore> {
        self.idle.pop().unwrap_or_else(|| Rc::new(RefCore::new()))
    }

    /// Invalidates `core` and parks it for reuse.
    pub(crate) fn release(&self, core: Rc<RefCore>) {
        core.invalidate();
        self.idle.push(core);
    }

    /// Number of bodies currently parked.
    pub fn idle(&self) -> usize {
        self.idle.len()
    }
}

impl Default for HandlePool {
    fn default() -> Self {
        HandlePool::new()
    }
}

/// A typed, read-write reference to one component.
///
/// The wrapper borrows its [`RefCore`] from the owning slot: cloning it is
/// cheap, and once the component is destroyed every clone observes the dead
/// body and fails fast by returning `None` / `0` / `false`. A dead body is
/// parked in the pool and a later fixation may recycle it into a new slot,
/// at which point lingering wrappers follow it there; drop wrappers to dead
/// components rather than holding them across further creation.
///
/// Read access leaves the slot's revision untouched; write access bumps it,
/// which is what downstream change-detection keys on.
pub struct ComponentRef<T> {
    core: Rc<RefCore>,
    marker: PhantomData<T>,
}

impl<T: Component> ComponentRef<T> {
    pub(crate) fn from_core(core: Rc<RefCore>) -> Self {
        ComponentRef {
            core,
            marker: PhantomData,
        }
    }

    /// Whether this handle still addresses a live slot.
    pub fn is_alive(&self) -> bool {
        self.core.is_alive()
    }

    /// The entity owning the component, or `0` if the handle is dead.
    pub fn entity(&self) -> EntityId {
        match self.core.locator() {
            Some(locator) => locator.entity_id(self.core.offset()),
            None => 0,
        }
    }

    /// The slot's current revision, or `0` if the handle is dead.
    pub fn revision(&self) -> u32 {
        match self.core.locator() {
            Some(locator) => locator.revision(self.core.offset()),
            None => 0,
        }
    }

    /// Read-only access. Runs `f` against the component and returns its
    /// result, or `None` if the handle is dead. The slot revision is left
    /// unchanged.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let locator = self.core.locator()?;
        let locator = locator.as_any().downcast_ref::<StoreLocator<T>>()?;
        locator.read(self.core.version(), self.core.offset(), f)
    }

    /// Read-write access. Runs `f` against the component and returns its
    /// result, or `None` if the handle is dead. Bumps the slot revision.
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let locator = self.core.locator()?;
        let locator = locator.as_any().downcast_ref::<StoreLocator<T>>()?;
        locator.write(self.core.version(), self.core.offset(), f)
    }

    /// Copies the component out, or `None` if the handle is dead.
    pub fn cloned(&self) -> Option<T>
    where
        T: Clone,
    {
        self.read(T::clone)
    }

    /// Replaces the component wholesale. Bumps the slot revision. Returns
    /// false if the handle is dead.
    pub fn set(&self, value: T) -> bool {
        self.write(|data| *data = value).is_some()
    }

    /// Drops the type parameter.
    pub fn untyped(&self) -> UntypedRef {
        UntypedRef {
            core: Rc::clone(&self.core),
        }
    }

    /// The shared handle body.
    pub fn core(&self) -> &Rc<RefCore> {
        &self.core
    }
}

impl<T> Clone for ComponentRef<T> {
    fn clone(&self) -> Self {
        ComponentRef {
            core: Rc::clone(&self.core),
            marker: PhantomData,
        }
    }
}

impl<T> Debug for ComponentRef<T> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_tuple("ComponentRef").field(&self.core).finish()
    }
}

/// An untyped reference to one component.
///
/// Carries the element type as a tag readable through the locator; convert
/// back to a typed handle with [`UntypedRef::typed`], which checks the tag.
pub struct UntypedRef {
    core: Rc<RefCore>,
}

impl UntypedRef {
    /// Whether this handle still addresses a live slot.
    pub fn is_alive(&self) -> bool {
        self.core.is_alive()
    }

    /// The entity owning the component, or `0` if the handle is dead.
    pub fn entity(&self) -> EntityId {
        match self.core.locator() {
            Some(locator) => locator.entity_id(self.core.offset()),
            None => 0,
        }
    }

    /// The slot's current revision, or `0` if the handle is dead.
    pub fn revision(&self) -> u32 {
        match self.core.locator() {
            Some(locator) => locator.revision(self.core.offset()),
            None => 0,
        }
    }

    /// The element type of the owning store, or `None` if the handle is
    /// dead.
    pub fn component_type(&self) -> Option<TypeId> {
        self.core.locator().map(|locator| locator.component_type())
    }

    /// Whether the owning store's element type is `T`.
    pub fn is_type<T: Component>(&self) -> bool {
        match self.core.locator() {
            Some(locator) => locator.is_type(TypeId::of::<T>()),
            None => false,
        }
    }

    /// Converts back to a typed handle, or `None` if the element type is not
    /// `T` or the handle is dead.
    pub fn typed<T: Component>(&self) -> Option<ComponentRef<T>> {
        if self.is_type::<T>() {
            Some(ComponentRef::from_core(Rc::clone(&self.core)))
        } else {
            None
        }
    }

    /// The shared handle body.
    pub fn core(&self) -> &Rc<RefCore> {
        &self.core
    }
}

impl Clone for UntypedRef {
    fn clone(&self) -> Self {
        UntypedRef {
            core: Rc::clone(&self.core),
        }
    }
}

impl Debug for UntypedRef {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_tuple("UntypedRef").field(&self.core).finish()
    }
}
