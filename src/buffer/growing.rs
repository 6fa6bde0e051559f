//! Growing typed buffer
//!
//! The buffer used between components inside a single data-flow engine.
//! Unlike [`TypedBuffer`](crate::buffer::typed::TypedBuffer) it never
//! blocks: when a writer finds the ring full, a fresh slot is spliced in at
//! the write position instead. All accesses happen from the owning engine's
//! scheduler thread, so the buffer carries no locks; the acquire/release
//! flags still catch double acquisition.

use crate::buffer::dataset::DataSet;
use crate::error::{RadioError, Result};
use crate::radio::descriptors::LinkDescription;
use crate::types::{Sample, TypeId};
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};

struct Inner<T: Sample> {
    // Boxed so slot addresses survive ring growth
    slots: Vec<Box<DataSet<T>>>,
    read_idx: usize,
    write_idx: usize,
    not_empty: bool,
    not_full: bool,
    read_locked: bool,
    write_locked: bool,
    link: LinkDescription,
}

/// Non-blocking, growing circular buffer of [`DataSet`]s.
///
/// Confined to a single engine scheduler thread; the `Send`/`Sync`
/// implementations exist only so the owning engine can move between its
/// load thread and its scheduler thread.
pub struct GrowingBuffer<T: Sample> {
    type_id: TypeId,
    inner: UnsafeCell<Inner<T>>,
}

// One engine thread at a time touches the buffer; the scheduler never hands
// references across threads.
unsafe impl<T: Sample> Send for GrowingBuffer<T> {}
unsafe impl<T: Sample> Sync for GrowingBuffer<T> {}

impl<T: Sample> GrowingBuffer<T> {
    pub fn new() -> Self {
        Self::with_capacity(2)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Box::new(DataSet::new()));
        GrowingBuffer {
            type_id: T::TYPE_ID,
            inner: UnsafeCell::new(Inner {
                slots,
                read_idx: 0,
                write_idx: 0,
                not_empty: false,
                not_full: true,
                read_locked: false,
                write_locked: false,
                link: LinkDescription::default(),
            }),
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

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[allow(clippy::mut_from_ref)]
    fn inner(&self) -> &mut Inner<T> {
        unsafe { &mut *self.inner.get() }
    }

    pub fn set_link(&self, link: LinkDescription) {
        self.inner().link = link;
    }

    pub fn link(&self) -> LinkDescription {
        self.inner().link.clone()
    }

    pub fn has_data(&self) -> bool {
        self.inner().not_empty
    }

    /// Current slot count (grows on demand, never shrinks)
    pub fn len(&self) -> usize {
        self.inner().slots.len()
    }

    /// Acquire the next data set to write. Never blocks: a full ring gains
    /// a new slot at the write position so FIFO order is preserved.
    pub fn acquire_write(&self, size: usize) -> Result<GrowWriteGuard<'_, T>> {
        // The slots are boxed, so the pointer stays valid across later
        // ring growth and state updates
        let slot: *mut DataSet<T> = {
            let inner = self.inner();
            if inner.write_locked {
                return Err(RadioError::DataBufferRelease(
                    "acquire_write called before previous data set was released".into(),
                ));
            }
            if !inner.not_full {
                // Full means the cursors coincide; splice a slot in at the
                // write position and shift the read cursor past it.
                inner
                    .slots
                    .insert(inner.write_idx, Box::new(DataSet::new()));
                inner.read_idx += 1;
                inner.not_full = true;
            }
            inner.write_locked = true;
            let idx = inner.write_idx;
            &mut *inner.slots[idx]
        };
        let slot_ref = unsafe { &mut *slot };
        if let Err(e) = slot_ref.data.resize(size) {
            self.inner().write_locked = false;
            return Err(e);
        }
        slot_ref.timestamp = 0.0;
        Ok(GrowWriteGuard { buffer: self, slot })
    }

    /// Acquire the next data set to read. Fails if the ring is empty; the
    /// scheduler only calls this after checking [`has_data`](Self::has_data).
    pub fn acquire_read(&self) -> Result<GrowReadGuard<'_, T>> {
        let slot: *const DataSet<T> = {
            let inner = self.inner();
            if inner.read_locked {
                return Err(RadioError::DataBufferRelease(
                    "acquire_read called before previous data set was released".into(),
                ));
            }
            if !inner.not_empty {
                return Err(RadioError::DataBufferRelease(
                    "acquire_read called on an empty growing buffer".into(),
                ));
            }
            inner.read_locked = true;
            &*inner.slots[inner.read_idx]
        };
        Ok(GrowReadGuard { buffer: self, slot })
    }

    fn release_write(&self) {
        let inner = self.inner();
        inner.write_idx = (inner.write_idx + 1) % inner.slots.len();
        if inner.read_idx == inner.write_idx {
            inner.not_full = false;
        }
        inner.not_empty = true;
        inner.write_locked = false;
    }

    fn release_read(&self) {
        let inner = self.inner();
        inner.read_idx = (inner.read_idx + 1) % inner.slots.len();
        if inner.read_idx == inner.write_idx {
            inner.not_empty = false;
        }
        inner.not_full = true;
        inner.read_locked = false;
    }
}

impl<T: Sample> Default for GrowingBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Outstanding write slot on a growing buffer
pub struct GrowWriteGuard<'a, T: Sample> {
    buffer: &'a GrowingBuffer<T>,
    slot: *mut DataSet<T>,
}

impl<T: Sample> Deref for GrowWriteGuard<'_, T> {
    type Target = DataSet<T>;

    fn deref(&self) -> &DataSet<T> {
        unsafe { &*self.slot }
    }
}

impl<T: Sample> DerefMut for GrowWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut DataSet<T> {
        unsafe { &mut *self.slot }
    }
}

impl<T: Sample> Drop for GrowWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.buffer.release_write();
    }
}

/// Outstanding read slot on a growing buffer
pub struct GrowReadGuard<'a, T: Sample> {
    buffer: &'a GrowingBuffer<T>,
    slot: *const DataSet<T>,
}

impl<T: Sample> Deref for GrowReadGuard<'_, T> {
    type Target = DataSet<T>;

    fn deref(&self) -> &DataSet<T> {
        unsafe { &*self.slot }
    }
}

impl<T: Sample> Drop for GrowReadGuard<'_, T> {
    fn drop(&mut self) {
        self.buffer.release_read();
    }
}
