//! Prelude module
//!
//! Contains all of the most common traits and structures.

pub use shrev::ReaderId;

pub use crate::{
    component::Component,
    error::Error,
    handle::{ComponentRef, HandlePool, UntypedRef},
    locator::Locator,
    manager::{ComponentEvent, ComponentManager},
    storage::{ComponentStore, Store, StoreConfig},
    EntityId,
};
