//! Read-write lock guarding each shard.
//!
//! `parking_lot` is used in regular builds. The `loom` feature swaps in the `loom` lock so that
//! model tests can explore every interleaving of shard accesses.

#[cfg(not(feature = "loom"))]
pub(crate) use parking_lot::RwLock;

#[cfg(feature = "loom")]
pub(crate) use self::model::RwLock;

#[cfg(feature = "loom")]
mod model {
    use std::sync::PoisonError;

    use loom::sync::{RwLockReadGuard, RwLockWriteGuard};

    /// `loom` lock with the `parking_lot` calling convention.
    pub(crate) struct RwLock<T>(loom::sync::RwLock<T>);

    impl<T> RwLock<T> {
        pub(crate) fn new(data: T) -> Self {
            Self(loom::sync::RwLock::new(data))
        }

        /// `loom` readers never queue behind writers, so every read is recursive.
        pub(crate) fn read_recursive(&self) -> RwLockReadGuard<'_, T> {
            self.0.read().unwrap_or_else(PoisonError::into_inner)
        }

        pub(crate) fn write(&self) -> RwLockWriteGuard<'_, T> {
            self.0.write().unwrap_or_else(PoisonError::into_inner)
        }
    }
}
