//! Error types for the storage core.
//!
//! There are specific types for errors (e.g. `DeadHandle`) and additionally
//! one `Error` type that can represent them all. Each error in this module
//! has an `Into<Error>` implementation.

use std::any::TypeId;
use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// The sparsecs error type, able to represent all error types of this
/// library.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Dead handle error.
    DeadHandle(DeadHandle),
    /// Missing store error.
    NoSuchStore(NoSuchStore),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Error::DeadHandle(e) => write!(f, "Dead handle: {}", e),
            Error::NoSuchStore(e) => write!(f, "No such store: {}", e),
        }
    }
}

impl From<DeadHandle> for Error {
    fn from(e: DeadHandle) -> Self {
        Error::DeadHandle(e)
    }
}

impl From<NoSuchStore> for Error {
    fn from(e: NoSuchStore) -> Self {
        Error::NoSuchStore(e)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::DeadHandle(e) => Some(e),
            Error::NoSuchStore(e) => Some(e),
        }
    }
}

/// An operation was attempted through a handle that is no longer valid,
/// either because it was never allocated or because its component has been
/// destroyed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeadHandle {
    /// The action that failed because the handle was dead.
    pub action: &'static str,
    /// The offset the handle carried when the action was attempted.
    pub offset: i32,
    /// The version the handle carried when the action was attempted.
    pub version: u32,
}

impl Display for DeadHandle {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(
            f,
            "tried to {} through a dead handle (offset {}, version {})",
            self.action, self.offset, self.version
        )
    }
}

impl StdError for DeadHandle {}

/// A handle's component type has no registered store in the manager it was
/// passed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoSuchStore {
    /// The component type the lookup was keyed by.
    pub component_type: TypeId,
}

impl Display for NoSuchStore {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "no store registered for {:?}", self.component_type)
    }
}

impl StdError for NoSuchStore {}
