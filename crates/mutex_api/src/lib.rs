//! Lock-type injection for kernel libraries.
//!
//! Library crates in this workspace never name a concrete lock. They are
//! generic over these traits, so the kernel supplies its spin or sleep locks
//! while host tests supply `std` locks (see the `std` feature).
#![cfg_attr(not(any(test, feature = "std")), no_std)]

use core::ops::DerefMut;

/// A mutex.
pub trait Mutex {
    /// The type of the data that the mutex protects.
    type Data;

    /// The type of the guard that the `lock` method returns.
    type Guard<'a>: DerefMut<Target = Self::Data>
    where
        Self: 'a;

    /// Creates a new mutex.
    fn new(data: Self::Data) -> Self;

    /// Locks the mutex.
    fn lock(&self) -> Self::Guard<'_>;
}

/// A mutex that can additionally be acquired without blocking.
pub trait TryMutex: Mutex {
    /// Attempts to lock the mutex without blocking.
    ///
    /// Returns `None` if the lock is held elsewhere. Callers that must not
    /// sleep use this and treat `None` as contention, not as an error.
    fn try_lock(&self) -> Option<Self::Guard<'_>>;
}

/// A family of lock types, one per protected data type.
///
/// A single family parameter threads through a whole data structure, so
/// swapping the lock implementation is one type argument rather than one per
/// field.
pub trait MutexFamily {
    /// The family's plain mutex for data of type `T`.
    type Mutex<T>: Mutex<Data = T>;
    /// The family's try-lockable mutex for data of type `T`.
    type TryMutex<T>: TryMutex<Data = T>;
}

#[cfg(any(test, feature = "std"))]
mod std_impl {
    use core::ops::{Deref, DerefMut};

    use super::{Mutex, MutexFamily, TryMutex};

    /// [`std::sync::Mutex`] adapter.
    ///
    /// Poisoning is treated as a bug in the protected code, so `lock`
    /// unwraps.
    pub struct StdMutex<T>(std::sync::Mutex<T>);

    pub struct StdMutexGuard<'a, T>(std::sync::MutexGuard<'a, T>);

    impl<T> Mutex for StdMutex<T> {
        type Data = T;

        type Guard<'a>
            = StdMutexGuard<'a, T>
        where
            Self: 'a;

        fn new(data: Self::Data) -> Self {
            Self(std::sync::Mutex::new(data))
        }

        fn lock(&self) -> Self::Guard<'_> {
            StdMutexGuard(self.0.lock().unwrap())
        }
    }

    impl<T> TryMutex for StdMutex<T> {
        fn try_lock(&self) -> Option<Self::Guard<'_>> {
            self.0.try_lock().ok().map(StdMutexGuard)
        }
    }

    impl<T> Deref for StdMutexGuard<'_, T> {
        type Target = T;

        fn deref(&self) -> &Self::Target {
            &self.0
        }
    }

    impl<T> DerefMut for StdMutexGuard<'_, T> {
        fn deref_mut(&mut self) -> &mut Self::Target {
            &mut self.0
        }
    }

    /// The family of `std` locks, for host tests.
    pub struct StdFamily;

    impl MutexFamily for StdFamily {
        type Mutex<T> = StdMutex<T>;
        type TryMutex<T> = StdMutex<T>;
    }
}

#[cfg(any(test, feature = "std"))]
pub use std_impl::{StdFamily, StdMutex, StdMutexGuard};
