//! Stack-engine boundary translators
//!
//! Translators are the only bridge between the typed-buffer world and the
//! byte-message world. An `InTranslator` drains an inter-engine `u8`
//! buffer and pushes stack data sets up into a component inbox; an
//! `OutTranslator` drains its own stack buffer and writes the bytes into
//! an inter-engine `u8` buffer. Each runs one thread. Only `u8` external
//! buffers are legal at a stack-engine boundary.

use crate::buffer::any::AnyBuffer;
use crate::buffer::dataset::{Direction, StackDataSet};
use crate::buffer::stack::StackBuffer;
use crate::buffer::typed::TypedBuffer;
use crate::error::{RadioError, Result};
use log::{error, info};
use std::sync::Arc;
use std::thread::JoinHandle;

fn require_u8(buffer: &AnyBuffer) -> Result<Arc<TypedBuffer<u8>>> {
    if buffer.type_id() != crate::types::TypeId::Uint8 {
        return Err(RadioError::InvalidDataType(format!(
            "only u8 buffers are valid at a stack engine boundary, got {}",
            buffer.type_id()
        )));
    }
    Ok(Arc::clone(buffer.typed::<u8>()?))
}

/// Reads an inter-engine buffer and feeds a component inbox
pub struct InTranslator {
    input: Arc<TypedBuffer<u8>>,
    inbox: Arc<StackBuffer>,
    dest_port: String,
    thread: Option<JoinHandle<()>>,
}

impl InTranslator {
    pub fn new(input: &AnyBuffer, inbox: Arc<StackBuffer>, dest_port: &str) -> Result<Self> {
        Ok(InTranslator {
            input: require_u8(input)?,
            inbox,
            dest_port: dest_port.to_ascii_lowercase(),
            thread: None,
        })
    }

    pub fn start(&mut self) {
        self.input.reset();
        let input = Arc::clone(&self.input);
        let inbox = Arc::clone(&self.inbox);
        let dest_port = self.dest_port.clone();
        self.thread = Some(std::thread::spawn(move || {
            loop {
                let result = (|| -> Result<()> {
                    let read = input.acquire_read()?;
                    let mut set = StackDataSet::from_bytes(&read.data);
                    set.metadata = read.metadata.clone();
                    set.timestamp = read.timestamp;
                    set.direction = Direction::FromBelow;
                    set.dest_port = dest_port.clone();
                    drop(read);
                    inbox.push(set)
                })();
                match result {
                    Ok(()) => {}
                    Err(e) if e.is_interrupted() => {
                        info!("thread in stack input translator interrupted");
                        return;
                    }
                    Err(e) => {
                        error!("error in stack translator: {} - translator thread exiting", e);
                        return;
                    }
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        self.input.interrupt();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Drains its own stack buffer into an inter-engine buffer
pub struct OutTranslator {
    buffer: Arc<StackBuffer>,
    output: Arc<TypedBuffer<u8>>,
    thread: Option<JoinHandle<()>>,
}

impl OutTranslator {
    pub fn new(output: &AnyBuffer) -> Result<Self> {
        Ok(OutTranslator {
            buffer: Arc::new(StackBuffer::new()),
            output: require_u8(output)?,
            thread: None,
        })
    }

    /// The stack buffer a component sends downward into
    pub fn buffer(&self) -> Arc<StackBuffer> {
        Arc::clone(&self.buffer)
    }

    pub fn start(&mut self) {
        self.buffer.reset();
        self.output.reset();
        let buffer = Arc::clone(&self.buffer);
        let output = Arc::clone(&self.output);
        self.thread = Some(std::thread::spawn(move || {
            loop {
                let result = (|| -> Result<()> {
                    let set = buffer.pop()?;
                    let mut write = output.acquire_write(set.data.len())?;
                    for (dst, src) in write.data.iter_mut().zip(set.data.iter()) {
                        *dst = *src;
                    }
                    write.timestamp = set.timestamp;
                    write.sample_rate = 0.0;
                    write.metadata = set.metadata.clone();
                    Ok(())
                })();
                match result {
                    Ok(()) => {}
                    Err(e) if e.is_interrupted() => {
                        info!("thread in stack output translator interrupted");
                        return;
                    }
                    Err(e) => {
                        error!("error in stack translator: {} - translator thread exiting", e);
                        return;
                    }
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        self.buffer.interrupt();
        self.output.interrupt();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
