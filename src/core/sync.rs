//! Lock poisoning helpers
//!
//! Convert a poisoned lock into a domain error instead of panicking.

use std::sync::{LockResult, RwLockReadGuard, RwLockWriteGuard};

/// Map a poisoned RwLock read to an application error
///
/// The coordinator reads its partitions map through this, turning poisoning
/// into `CoordinatorError::LockPoisoned`.
///
/// # Examples
/// ```
/// use std::sync::RwLock;
/// use queuestate::coordinator::api::CoordinatorError;
/// use queuestate::core::sync::handle_rwlock_read;
///
/// let lock = RwLock::new(42);
/// let guard = handle_rwlock_read(lock.read(), |message| CoordinatorError::LockPoisoned { message })
///     .unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_rwlock_read<T, E>(
    result: LockResult<RwLockReadGuard<T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockReadGuard<T>, E> {
    result.map_err(|poison_err| {
        error_constructor(
            format!(
                "Internal synchronisation error (RwLock read poisoned). This indicates a panic occurred while holding a write lock. PoisonError: {:?}",
                poison_err
            )
        )
    })
}

/// Map a poisoned RwLock write to an application error
pub fn handle_rwlock_write<T, E>(
    result: LockResult<RwLockWriteGuard<T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockWriteGuard<T>, E> {
    result.map_err(|poison_err| {
        error_constructor(
            format!(
                "Internal synchronisation error (RwLock write poisoned). This indicates a panic occurred while holding the lock. PoisonError: {:?}",
                poison_err
            )
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, RwLock};
    use std::thread;

    #[derive(Debug, PartialEq)]
    struct TestError {
        message: String,
    }

    #[test]
    fn test_handle_rwlock_read_success() {
        let rwlock = RwLock::new(42);

        let result = handle_rwlock_read(rwlock.read(), |msg| TestError { message: msg });

        assert!(result.is_ok());
        assert_eq!(*result.unwrap(), 42);
    }

    #[test]
    fn test_handle_rwlock_read_with_poisoned_lock() {
        let rwlock = Arc::new(RwLock::new(42));
        let rwlock_clone = Arc::clone(&rwlock);

        let _ = thread::spawn(move || {
            let _guard = rwlock_clone.write().unwrap();
            panic!("Intentional panic to poison rwlock");
        })
        .join();

        let result = handle_rwlock_read(rwlock.read(), |msg| TestError { message: msg });
        let error = result.unwrap_err();
        assert!(error.message.contains("RwLock read poisoned"));
    }

    #[test]
    fn test_handle_rwlock_write_success() {
        let rwlock = RwLock::new(42);

        let result = handle_rwlock_write(rwlock.write(), |msg| TestError { message: msg });

        assert!(result.is_ok());
        *result.unwrap() = 100;
        assert_eq!(*rwlock.read().unwrap(), 100);
    }
}
