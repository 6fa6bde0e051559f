//! Skywave - reconfigurable software-defined-radio runtime
//!
//! A radio is a directed graph of signal-processing components partitioned
//! into engines. Each engine schedules its components concurrently, bounded
//! buffers connect components within and across engines, and controllers
//! observe runtime events and reconfigure the running graph.
//!
//! # Architecture
//!
//! - **Buffers**: blocking typed buffers across engines, growing buffers
//!   inside a data-flow engine, byte-message FIFOs between stack
//!   components, and a named rendezvous for command waits
//! - **Engines**: a topological data-flow scheduler (phy) and a per-port
//!   message-loop scheduler with boundary translators (stack)
//! - **Managers**: the engine manager composes engines over inter-engine
//!   buffers; the controller manager fans events out to subscribers
//! - **Radio model**: descriptions, graphs, XML ingest, parametric
//!   reconfiguration and the reconfiguration differ
//! - **Plug-ins**: shared-library components/controllers behind a strict
//!   three-symbol ABI, plus builtin factories for embedded use

pub mod buffer;
pub mod component;
pub mod controller;
pub mod engine;
pub mod error;
pub mod logging;
pub mod plugin;
pub mod radio;
pub mod system;
pub mod types;
pub mod util;

// Re-export commonly used types
pub use error::{RadioError, Result};
pub use system::System;
