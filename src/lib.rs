#![warn(missing_docs)]

//! # sparsecs
//!
//! A sparse-component ECS storage core. Components of each type live in a
//! densely packed, growable array owned by a [`ComponentStore`]; user code
//! reaches them through pooled, versioned handles ([`ComponentRef`] /
//! [`UntypedRef`]) that stay valid while the store compacts itself in place;
//! a [`ComponentManager`] multiplexes any number of component types through
//! one registry and emits lifecycle events.
//!
//! Destruction is deferred: releasing a component only marks its slot, and a
//! later [`ComponentManager::cleanup_components`] pass (one per world tick)
//! swaps live tail slots into the holes. Handles are rewritten by the store
//! during that pass, so they keep working across compaction; raw offsets
//! cached outside a handle do not.
//!
//! ```
//! use sparsecs::prelude::*;
//!
//! #[derive(Default)]
//! struct Position {
//!     x: f32,
//!     y: f32,
//! }
//! impl Component for Position {}
//!
//! let mut manager = ComponentManager::new();
//! let pos = manager.create_component_with(1, Position { x: 15.0, y: 25.0 });
//!
//! assert_eq!(pos.read(|p| p.x), Some(15.0));
//! pos.write(|p| p.x = 30.0);
//! assert_eq!(pos.read(|p| p.x), Some(30.0));
//!
//! manager.destroy_component(&pos.untyped()).unwrap();
//! manager.cleanup_components();
//! assert!(!pos.is_alive());
//! ```
//!
//! The core is single-threaded by design: none of its types are `Send` or
//! `Sync`, and all mutation is expected to happen on the world tick thread.

pub use shrev::ReaderId;

pub use crate::{
    component::Component,
    error::{DeadHandle, Error, NoSuchStore},
    handle::{ComponentRef, HandlePool, RefCore, UntypedRef, INVALID_OFFSET, INVALID_VERSION},
    locator::Locator,
    manager::{ComponentEvent, ComponentManager},
    storage::{ComponentStore, Store, StoreConfig},
};

mod component;
mod error;
mod handle;
mod locator;
mod manager;
pub mod prelude;
mod storage;

/// An entity id, assigned by an external entity table.
///
/// The core treats it as a pure tag; `0` doubles as the "no entity" result
/// of out-of-range lookups.
pub type EntityId = u64;
