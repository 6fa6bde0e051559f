//! Data-flow components
//!
//! A phy component consumes data sets from its input ports and produces
//! data sets on its output ports when the engine scheduler invokes its
//! `process` step. Port buffers are bound by the engine at build time into
//! a [`PhyIo`], which `process` receives on every call; acquiring a set
//! returns a guard that releases the slot when dropped.

use crate::buffer::any::{AnyBuffer, AnyGrowingBuffer, BufferCast};
use crate::buffer::dataset::DataSet;
use crate::buffer::growing::{GrowReadGuard, GrowWriteGuard};
use crate::buffer::typed::{ReadGuard, WriteGuard};
use crate::component::ComponentCore;
use crate::error::{RadioError, Result};
use crate::types::TypeId;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

/// An input binding: an inter-engine buffer or an intra-engine growing one
#[derive(Debug, Clone)]
pub enum ReadConnection {
    External(AnyBuffer),
    Internal(AnyGrowingBuffer),
}

impl ReadConnection {
    pub fn type_id(&self) -> TypeId {
        match self {
            ReadConnection::External(b) => b.type_id(),
            ReadConnection::Internal(b) => b.type_id(),
        }
    }

    pub fn has_data(&self) -> bool {
        match self {
            ReadConnection::External(b) => b.has_data(),
            ReadConnection::Internal(b) => b.has_data(),
        }
    }
}

/// An output binding: an inter-engine buffer or an intra-engine growing one
#[derive(Debug, Clone)]
pub enum WriteConnection {
    External(AnyBuffer),
    Internal(AnyGrowingBuffer),
}

impl WriteConnection {
    pub fn type_id(&self) -> TypeId {
        match self {
            WriteConnection::External(b) => b.type_id(),
            WriteConnection::Internal(b) => b.type_id(),
        }
    }
}

/// An acquired input data set; the slot is released when this drops
pub enum ReadSet<'a, T: crate::types::Sample> {
    External(ReadGuard<'a, T>),
    Internal(GrowReadGuard<'a, T>),
}

impl<T: crate::types::Sample> Deref for ReadSet<'_, T> {
    type Target = DataSet<T>;

    fn deref(&self) -> &DataSet<T> {
        match self {
            ReadSet::External(g) => g,
            ReadSet::Internal(g) => g,
        }
    }
}

/// An acquired output data set; the slot is released when this drops
pub enum WriteSet<'a, T: crate::types::Sample> {
    External(WriteGuard<'a, T>),
    Internal(GrowWriteGuard<'a, T>),
}

impl<T: crate::types::Sample> Deref for WriteSet<'_, T> {
    type Target = DataSet<T>;

    fn deref(&self) -> &DataSet<T> {
        match self {
            WriteSet::External(g) => g,
            WriteSet::Internal(g) => g,
        }
    }
}

impl<T: crate::types::Sample> DerefMut for WriteSet<'_, T> {
    fn deref_mut(&mut self) -> &mut DataSet<T> {
        match self {
            WriteSet::External(g) => g,
            WriteSet::Internal(g) => g,
        }
    }
}

/// The port buffers bound to one phy component
#[derive(Debug, Default)]
pub struct PhyIo {
    inputs: Vec<(String, ReadConnection)>,
    outputs: Vec<(String, WriteConnection)>,
}

impl PhyIo {
    pub fn new(
        inputs: Vec<(String, ReadConnection)>,
        outputs: Vec<(String, WriteConnection)>,
    ) -> Self {
        PhyIo { inputs, outputs }
    }

    fn input(&self, port: &str) -> Result<&ReadConnection> {
        let port = port.to_ascii_lowercase();
        self.inputs
            .iter()
            .find(|(name, _)| *name == port)
            .map(|(_, c)| c)
            .ok_or_else(|| {
                RadioError::ResourceNotFound(format!("no buffer bound to input port {}", port))
            })
    }

    fn output(&self, port: &str) -> Result<&WriteConnection> {
        let port = port.to_ascii_lowercase();
        self.outputs
            .iter()
            .find(|(name, _)| *name == port)
            .map(|(_, c)| c)
            .ok_or_else(|| {
                RadioError::ResourceNotFound(format!("no buffer bound to output port {}", port))
            })
    }

    /// Acquire the next data set on an input port. Blocks on an external
    /// buffer until data (or shutdown) arrives.
    pub fn read<T: BufferCast>(&self, port: &str) -> Result<ReadSet<'_, T>> {
        match self.input(port)? {
            ReadConnection::External(any) => Ok(ReadSet::External(any.typed::<T>()?.acquire_read()?)),
            ReadConnection::Internal(any) => Ok(ReadSet::Internal(any.typed::<T>()?.acquire_read()?)),
        }
    }

    /// Acquire a data set of `len` samples on an output port. Blocks on an
    /// external buffer while it is full.
    pub fn write<T: BufferCast>(&self, port: &str, len: usize) -> Result<WriteSet<'_, T>> {
        match self.output(port)? {
            WriteConnection::External(any) => {
                Ok(WriteSet::External(any.typed::<T>()?.acquire_write(len)?))
            }
            WriteConnection::Internal(any) => {
                Ok(WriteSet::Internal(any.typed::<T>()?.acquire_write(len)?))
            }
        }
    }

    /// Whether any input port has a data set pending
    pub fn any_input_pending(&self) -> bool {
        self.inputs.iter().any(|(_, c)| c.has_data())
    }

    pub fn input_type(&self, port: &str) -> Result<TypeId> {
        Ok(self.input(port)?.type_id())
    }

    pub fn output_type(&self, port: &str) -> Result<TypeId> {
        Ok(self.output(port)?.type_id())
    }

    pub fn inputs(&self) -> &[(String, ReadConnection)] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[(String, WriteConnection)] {
        &self.outputs
    }
}

/// A data-flow component.
///
/// `calculate_output_types` maps the input types chosen by the graph
/// builder to the component's output types. Components generic over their
/// element type implement `specialize` and return a monomorphised
/// replacement; the engine re-applies the described parameter values to the
/// replacement instance.
pub trait PhyComponent: Send {
    fn base(&self) -> &ComponentCore;
    fn base_mut(&mut self) -> &mut ComponentCore;

    /// Map concrete input port types to output port types
    fn calculate_output_types(
        &self,
        input_types: &BTreeMap<String, TypeId>,
    ) -> Result<BTreeMap<String, TypeId>>;

    /// Offer the concrete type vectors; return a replacement instance to
    /// monomorphise, or `None` to continue with this instance
    fn specialize(
        &self,
        _input_types: &[TypeId],
        _output_types: &[TypeId],
    ) -> Result<Option<Box<dyn PhyComponent>>> {
        Ok(None)
    }

    /// Called once after buffers are bound, before the engine starts
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called when the engine starts
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// One scheduling step: consume pending input sets, produce output sets
    fn process(&mut self, io: &PhyIo) -> Result<()>;

    /// Called when the engine stops
    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called after a parameter was reconfigured between process steps
    fn parameter_changed(&mut self, _name: &str) {}
}

impl dyn PhyComponent {
    pub fn name(&self) -> String {
        self.base().name().to_string()
    }
}
