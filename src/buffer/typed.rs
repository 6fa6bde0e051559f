//! Blocking typed buffer
//!
//! The buffer that exists on every link between components in different
//! engines (and on external engine inputs/outputs). It is a circular array
//! of at least two data sets. Writers block while the buffer is full,
//! readers block while it is empty, and at most one write slot and one read
//! slot may be outstanding at a time. Waits are interruptible: engine
//! shutdown calls [`TypedBuffer::interrupt`], which wakes every waiter with
//! `RadioError::Interrupted`.

use crate::buffer::dataset::DataSet;
use crate::error::{RadioError, Result};
use crate::radio::descriptors::LinkDescription;
use crate::types::{Sample, TypeId};
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex};

/// Smallest allowed slot count
pub const MIN_BUFFER_LEN: usize = 2;

struct State {
    read_idx: usize,
    write_idx: usize,
    not_empty: bool,
    not_full: bool,
    read_locked: bool,
    write_locked: bool,
    interrupted: bool,
}

/// Thread-safe bounded circular buffer of [`DataSet`]s
pub struct TypedBuffer<T: Sample> {
    type_id: TypeId,
    capacity: usize,
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
    link: Mutex<LinkDescription>,
    // Slot storage. The vector itself is never grown or shrunk after
    // construction; a slot is only touched by the thread holding the
    // corresponding read/write lock flag in `state`.
    slots: UnsafeCell<Vec<DataSet<T>>>,
}

// Slot access is serialized through the lock flags in `state`; the Vec
// structure is immutable after construction.
unsafe impl<T: Sample> Send for TypedBuffer<T> {}
unsafe impl<T: Sample> Sync for TypedBuffer<T> {}

impl<T: Sample> TypedBuffer<T> {
    /// Create a buffer with the default slot count, tagged with the
    /// canonical type id of `T`
    pub fn new() -> Self {
        Self::with_capacity(MIN_BUFFER_LEN)
    }

    /// Create a buffer with `capacity` slots (clamped to the minimum)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_BUFFER_LEN);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, DataSet::new);
        TypedBuffer {
            type_id: T::TYPE_ID,
            capacity,
            state: Mutex::new(State {
                read_idx: 0,
                write_idx: 0,
                not_empty: false,
                not_full: true,
                read_locked: false,
                write_locked: false,
                interrupted: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            link: Mutex::new(LinkDescription::default()),
            slots: UnsafeCell::new(slots),
        }
    }

    /// Create a buffer tagged with an explicit type id, which must be one of
    /// the ids stored as `T`
    pub fn with_type_id(type_id: TypeId) -> Result<Self> {
        if !T::accepts(type_id) {
            return Err(RadioError::InvalidDataType(format!(
                "buffer of {} cannot be tagged {}",
                T::TYPE_ID,
                type_id
            )));
        }
        let mut buf = Self::new();
        buf.type_id = type_id;
        Ok(buf)
    }

    /// The element type id this buffer was tagged with at construction
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_link(&self, link: LinkDescription) {
        *self.link.lock().unwrap() = link;
    }

    pub fn link(&self) -> LinkDescription {
        self.link.lock().unwrap().clone()
    }

    /// Whether a data set is ready to read
    pub fn has_data(&self) -> bool {
        self.state.lock().unwrap().not_empty
    }

    /// Acquire the next data set to write, blocking while the buffer is
    /// full. The slot's sequence is resized to `size` and its timestamp
    /// zeroed. At most one write slot may be outstanding.
    pub fn acquire_write(&self, size: usize) -> Result<WriteGuard<'_, T>> {
        let mut st = self.state.lock().unwrap();
        if st.write_locked {
            return Err(RadioError::DataBufferRelease(
                "acquire_write called before previous data set was released".into(),
            ));
        }
        while !st.not_full {
            if st.interrupted {
                return Err(RadioError::Interrupted);
            }
            st = self.not_full.wait(st).unwrap();
        }
        if st.interrupted {
            return Err(RadioError::Interrupted);
        }
        st.write_locked = true;
        let idx = st.write_idx;
        drop(st);

        // Exclusive slot access: write_locked is set and idx is the write
        // cursor, which no reader touches while the buffer is not full.
        let slot = unsafe { (&mut *self.slots.get()).get_unchecked_mut(idx) };
        if let Err(e) = slot.data.resize(size) {
            self.state.lock().unwrap().write_locked = false;
            return Err(e);
        }
        slot.timestamp = 0.0;
        Ok(WriteGuard { buffer: self, slot })
    }

    /// Acquire the next data set to read, blocking while the buffer is
    /// empty. At most one read slot may be outstanding.
    pub fn acquire_read(&self) -> Result<ReadGuard<'_, T>> {
        let mut st = self.state.lock().unwrap();
        if st.read_locked {
            return Err(RadioError::DataBufferRelease(
                "acquire_read called before previous data set was released".into(),
            ));
        }
        while !st.not_empty {
            if st.interrupted {
                return Err(RadioError::Interrupted);
            }
            st = self.not_empty.wait(st).unwrap();
        }
        if st.interrupted {
            return Err(RadioError::Interrupted);
        }
        st.read_locked = true;
        let idx = st.read_idx;
        drop(st);

        let slot = unsafe { (&*self.slots.get()).get_unchecked(idx) };
        Ok(ReadGuard { buffer: self, slot })
    }

    /// Wake every blocked reader and writer with `Interrupted` and make
    /// subsequent acquires fail until [`reset`](Self::reset)
    pub fn interrupt(&self) {
        self.state.lock().unwrap().interrupted = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Clear the interruption flag, re-arming the buffer for a restart
    pub fn reset(&self) {
        self.state.lock().unwrap().interrupted = false;
    }

    fn release_write(&self) {
        let mut st = self.state.lock().unwrap();
        st.write_idx = (st.write_idx + 1) % self.capacity;
        if st.read_idx == st.write_idx {
            st.not_full = false;
        }
        st.not_empty = true;
        st.write_locked = false;
        drop(st);
        self.not_empty.notify_one();
    }

    fn release_read(&self) {
        let mut st = self.state.lock().unwrap();
        st.read_idx = (st.read_idx + 1) % self.capacity;
        if st.read_idx == st.write_idx {
            st.not_empty = false;
        }
        st.not_full = true;
        st.read_locked = false;
        drop(st);
        self.not_full.notify_one();
    }
}

impl<T: Sample> Default for TypedBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Outstanding write slot; releasing happens on drop and wakes one reader
pub struct WriteGuard<'a, T: Sample> {
    buffer: &'a TypedBuffer<T>,
    slot: *mut DataSet<T>,
}

impl<T: Sample> Deref for WriteGuard<'_, T> {
    type Target = DataSet<T>;

    fn deref(&self) -> &DataSet<T> {
        unsafe { &*self.slot }
    }
}

impl<T: Sample> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut DataSet<T> {
        unsafe { &mut *self.slot }
    }
}

impl<T: Sample> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.buffer.release_write();
    }
}

/// Outstanding read slot; releasing happens on drop and wakes one writer
pub struct ReadGuard<'a, T: Sample> {
    buffer: &'a TypedBuffer<T>,
    slot: *const DataSet<T>,
}

impl<T: Sample> Deref for ReadGuard<'_, T> {
    type Target = DataSet<T>;

    fn deref(&self) -> &DataSet<T> {
        unsafe { &*self.slot }
    }
}

impl<T: Sample> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.buffer.release_read();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_write_then_read_cycle() {
        let buf: TypedBuffer<f32> = TypedBuffer::with_capacity(4);
        {
            let mut w = buf.acquire_write(100).unwrap();
            assert_eq!(w.data.len(), 100);
            assert_eq!(w.timestamp, 0.0);
            w.data[0] = 1.5;
        }
        assert!(buf.has_data());
        {
            let r = buf.acquire_read().unwrap();
            assert_eq!(r.data[0], 1.5);
        }
        assert!(!buf.has_data());
    }

    #[test]
    fn test_double_acquire_fails() {
        let buf: TypedBuffer<f32> = TypedBuffer::with_capacity(4);
        let w = buf.acquire_write(10).unwrap();
        assert!(matches!(
            buf.acquire_write(10),
            Err(RadioError::DataBufferRelease(_))
        ));
        drop(w);

        let r = buf.acquire_read().unwrap();
        assert!(matches!(
            buf.acquire_read(),
            Err(RadioError::DataBufferRelease(_))
        ));
        drop(r);
    }

    #[test]
    fn test_explicit_type_id_checked() {
        assert!(TypedBuffer::<f64>::with_type_id(TypeId::Float80).is_ok());
        assert!(TypedBuffer::<f32>::with_type_id(TypeId::Int32).is_err());
        let buf = TypedBuffer::<f64>::with_type_id(TypeId::Float80).unwrap();
        assert_eq!(buf.type_id(), TypeId::Float80);
    }

    #[test]
    fn test_spsc_order_preserved() {
        let buf: Arc<TypedBuffer<i32>> = Arc::new(TypedBuffer::with_capacity(8));
        let n = 10_000;

        let writer = {
            let buf = Arc::clone(&buf);
            thread::spawn(move || {
                for i in 0..n {
                    let mut w = buf.acquire_write(1).unwrap();
                    w.data[0] = i;
                }
            })
        };
        let reader = {
            let buf = Arc::clone(&buf);
            thread::spawn(move || {
                let mut seen = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    let r = buf.acquire_read().unwrap();
                    seen.push(r.data[0]);
                }
                seen
            })
        };

        writer.join().unwrap();
        let seen = reader.join().unwrap();
        assert_eq!(seen, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn test_interrupt_wakes_blocked_reader() {
        let buf: Arc<TypedBuffer<u8>> = Arc::new(TypedBuffer::new());
        let reader = {
            let buf = Arc::clone(&buf);
            thread::spawn(move || buf.acquire_read().err())
        };
        // Give the reader time to block, then interrupt
        thread::sleep(std::time::Duration::from_millis(20));
        buf.interrupt();
        let err = reader.join().unwrap();
        assert!(matches!(err, Some(RadioError::Interrupted)));

        // Re-armed after reset
        buf.reset();
        drop(buf.acquire_write(1).unwrap());
        assert!(buf.acquire_read().is_ok());
    }

    #[test]
    fn test_writer_blocks_until_read() {
        let buf: Arc<TypedBuffer<u16>> = Arc::new(TypedBuffer::with_capacity(2));
        drop(buf.acquire_write(1).unwrap());
        drop(buf.acquire_write(1).unwrap());
        // Buffer now full; third write must wait for a read
        let writer = {
            let buf = Arc::clone(&buf);
            thread::spawn(move || {
                drop(buf.acquire_write(1).unwrap());
            })
        };
        thread::sleep(std::time::Duration::from_millis(20));
        assert!(!writer.is_finished());
        drop(buf.acquire_read().unwrap());
        writer.join().unwrap();
    }
}
