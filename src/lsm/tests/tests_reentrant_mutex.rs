use std::sync::Arc;
use std::thread;

use crate::lsm::reentrant_mutex::ReentrantMutex;

#[test]
fn same_thread_can_reacquire_without_deadlock() {
    let lock = ReentrantMutex::new(0);
    let outer = lock.lock();
    {
        let inner = lock.lock();
        assert_eq!(*inner, 0);
    }
    assert_eq!(*outer, 0);
}

#[test]
fn mutation_through_nested_guards_is_visible_after_release() {
    let lock = ReentrantMutex::new(vec![1]);
    {
        let mut outer = lock.lock();
        outer.push(2);
        {
            let mut inner = lock.lock();
            inner.push(3);
        }
        outer.push(4);
    }
    let guard = lock.lock();
    assert_eq!(*guard, vec![1, 2, 3, 4]);
}

#[test]
fn other_threads_block_until_the_full_recursion_releases() {
    let lock = Arc::new(ReentrantMutex::new(0));
    let outer = lock.lock();
    let inner = lock.lock(); // reentrant, same thread

    let other = {
        let lock = Arc::clone(&lock);
        thread::spawn(move || {
            let guard = lock.lock();
            *guard
        })
    };

    // The other thread cannot have made progress while both guards are
    // live; dropping one still leaves the lock held (depth 1).
    drop(inner);
    thread::sleep(std::time::Duration::from_millis(20));
    assert!(!other.is_finished());

    drop(outer);
    assert_eq!(other.join().unwrap(), 0);
}
