//! Stack message buffer
//!
//! The per-port inbox of a stack component: a FIFO of owned
//! [`StackDataSet`]s with a soft capacity. `push` blocks while the queue is
//! at capacity, `pop` blocks while it is empty, and both are interruptible
//! for shutdown.

use crate::buffer::dataset::StackDataSet;
use crate::error::{RadioError, Result};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Default soft capacity of a stack buffer
pub const DEFAULT_STACK_CAPACITY: usize = 10;

struct Inner {
    queue: VecDeque<StackDataSet>,
    interrupted: bool,
}

/// Blocking bounded FIFO of stack data sets
pub struct StackBuffer {
    capacity: usize,
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl StackBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_STACK_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        StackBuffer {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                interrupted: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_data(&self) -> bool {
        !self.is_empty()
    }

    /// Append a message, blocking while the queue is at capacity
    pub fn push(&self, set: StackDataSet) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        while inner.queue.len() >= self.capacity {
            if inner.interrupted {
                return Err(RadioError::Interrupted);
            }
            inner = self.not_full.wait(inner).unwrap();
        }
        if inner.interrupted {
            return Err(RadioError::Interrupted);
        }
        inner.queue.push_back(set);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Take the oldest message, blocking while the queue is empty
    pub fn pop(&self) -> Result<StackDataSet> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.interrupted {
                return Err(RadioError::Interrupted);
            }
            if let Some(set) = inner.queue.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return Ok(set);
            }
            inner = self.not_empty.wait(inner).unwrap();
        }
    }

    /// Wake every blocked pusher and popper with `Interrupted`
    pub fn interrupt(&self) {
        self.inner.lock().unwrap().interrupted = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Re-arm after an interruption; anything still queued stays queued
    pub fn reset(&self) {
        self.inner.lock().unwrap().interrupted = false;
    }
}

impl Default for StackBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let buf = StackBuffer::new();
        for i in 0..3u8 {
            buf.push(StackDataSet::from_bytes(&[i])).unwrap();
        }
        for i in 0..3u8 {
            assert_eq!(buf.pop().unwrap().data[0], i);
        }
    }

    #[test]
    fn test_push_blocks_at_capacity() {
        let buf = Arc::new(StackBuffer::with_capacity(2));
        buf.push(StackDataSet::new()).unwrap();
        buf.push(StackDataSet::new()).unwrap();
        assert_eq!(buf.len(), buf.capacity());

        let pusher = {
            let buf = Arc::clone(&buf);
            thread::spawn(move || buf.push(StackDataSet::new()))
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!pusher.is_finished());

        buf.pop().unwrap();
        pusher.join().unwrap().unwrap();
        // Never exceeds the soft capacity
        assert!(buf.len() <= buf.capacity());
    }

    #[test]
    fn test_interrupt_wakes_blocked_popper() {
        let buf = Arc::new(StackBuffer::new());
        let popper = {
            let buf = Arc::clone(&buf);
            thread::spawn(move || buf.pop().err())
        };
        thread::sleep(Duration::from_millis(20));
        buf.interrupt();
        assert!(matches!(
            popper.join().unwrap(),
            Some(RadioError::Interrupted)
        ));

        buf.reset();
        buf.push(StackDataSet::new()).unwrap();
        assert!(buf.pop().is_ok());
    }
}
