//! A reentrant mutex built on [`std::sync::Mutex`] and [`std::sync::Condvar`].
//!
//! The LSM engine lock must be reentrant: `delete` journals then mutates
//! the memtable through the same locked path `set` uses, so a plain
//! `Mutex` would deadlock a thread against itself. No crate in this
//! project's dependency graph provides one, so it's hand-rolled here the
//! same way the page and WAL formats are hand-rolled elsewhere in this
//! crate: a small, dependency-free primitive over stable std APIs.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex};
use std::thread::{self, ThreadId};

struct Owner {
    thread: ThreadId,
    depth: usize,
}

/// A mutex that the thread currently holding it may lock again without
/// blocking on itself.
pub struct ReentrantMutex<T> {
    owner: Mutex<Option<Owner>>,
    released: Condvar,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is only ever granted through a `Guard`, which
// is only constructed while `owner` attests that the calling thread holds
// the lock.
unsafe impl<T: Send> Send for ReentrantMutex<T> {}
unsafe impl<T: Send> Sync for ReentrantMutex<T> {}

impl<T> ReentrantMutex<T> {
    pub fn new(data: T) -> Self {
        ReentrantMutex {
            owner: Mutex::new(None),
            released: Condvar::new(),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquire the lock, blocking until it's available. Safe to call again
    /// from a thread that already holds it.
    pub fn lock(&self) -> ReentrantMutexGuard<'_, T> {
        let me = thread::current().id();
        let mut owner = self.owner.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            match owner.as_mut() {
                Some(held) if held.thread == me => {
                    held.depth += 1;
                    break;
                }
                None => {
                    *owner = Some(Owner { thread: me, depth: 1 });
                    break;
                }
                Some(_) => {
                    owner = self
                        .released
                        .wait(owner)
                        .unwrap_or_else(|e| e.into_inner());
                }
            }
        }
        ReentrantMutexGuard { lock: self }
    }

    fn release(&self) {
        let mut owner = self.owner.lock().unwrap_or_else(|e| e.into_inner());
        match owner.as_mut() {
            Some(held) if held.depth > 1 => held.depth -= 1,
            _ => {
                *owner = None;
                self.released.notify_one();
            }
        }
    }
}

/// RAII guard returned by [`ReentrantMutex::lock`].
pub struct ReentrantMutexGuard<'a, T> {
    lock: &'a ReentrantMutex<T>,
}

impl<T> Deref for ReentrantMutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: holding the guard means the owner table names this
        // thread, which is the only thread allowed to read through here.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for ReentrantMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: see `Deref`; exclusive access is further guaranteed
        // because only one guard per thread exists at a given recursion
        // depth and callers never hand out `&mut T` derived from `&self`.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for ReentrantMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
