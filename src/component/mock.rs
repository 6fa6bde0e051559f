//! Mock components
//!
//! Small builtin components used by the test suite and for smoke-testing a
//! deployment without real signal-processing plug-ins: a counting source, a
//! counting sink, a two-way fork, a type-generic passthrough, and a stack
//! reflector. Factories taking a probe let tests observe what flowed
//! through a running radio.

use crate::buffer::any::BufferCast;
use crate::buffer::dataset::StackDataSet;
use crate::component::phy::{PhyComponent, PhyIo};
use crate::component::stack::{StackComponent, StackIo};
use crate::component::ComponentCore;
use crate::component::params::ParamSpec;
use crate::error::Result;
use crate::types::value::ValueKind;
use crate::types::TypeId;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared observation point for mock sinks and reflectors
#[derive(Debug, Default)]
pub struct Probe {
    pub sets: AtomicUsize,
    pub values: Mutex<Vec<i64>>,
}

impl Probe {
    pub fn shared() -> Arc<Probe> {
        Arc::new(Probe::default())
    }

    pub fn record(&self, value: i64) {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.values.lock().unwrap().push(value);
    }

    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

fn single_output(type_id: TypeId) -> BTreeMap<String, TypeId> {
    let mut out = BTreeMap::new();
    out.insert("output1".to_string(), type_id);
    out
}

/// Emits a fixed number of `i32` data sets, then idles
pub struct CounterSource {
    core: ComponentCore,
    emitted: usize,
    count: usize,
    block_size: usize,
    random: bool,
    rng: SmallRng,
}

impl CounterSource {
    pub fn new(name: &str) -> Self {
        let mut core = ComponentCore::new(
            name,
            "mocksource",
            "emits counting data sets",
            "skywave",
            "1.0",
        );
        core.ports.register_output("output1", vec![TypeId::Int32]);
        core.register_parameter(
            ParamSpec::new("count", ValueKind::Uint32, "number of sets to emit")
                .default_value("10")
                .dynamic(true),
        )
        .expect("mock parameter registration");
        core.register_parameter(
            ParamSpec::new("blocksize", ValueKind::Uint32, "samples per set")
                .default_value("1")
                .interval(1u32, 65536u32),
        )
        .expect("mock parameter registration");
        core.register_parameter(
            ParamSpec::new("pattern", ValueKind::String, "ramp or random samples")
                .default_value("ramp"),
        )
        .expect("mock parameter registration");
        let mut source = CounterSource {
            core,
            emitted: 0,
            count: 0,
            block_size: 1,
            random: false,
            rng: SmallRng::seed_from_u64(0),
        };
        source.refresh();
        source
    }

    fn refresh(&mut self) {
        self.count = self
            .core
            .params
            .get("count")
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0) as usize;
        self.block_size = self
            .core
            .params
            .get("blocksize")
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(1.0)
            .max(1.0) as usize;
        self.random = self
            .core
            .params
            .get_str("pattern")
            .map(|p| p == "random")
            .unwrap_or(false);
    }
}

impl PhyComponent for CounterSource {
    fn base(&self) -> &ComponentCore {
        &self.core
    }

    fn base_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn calculate_output_types(
        &self,
        _input_types: &BTreeMap<String, TypeId>,
    ) -> Result<BTreeMap<String, TypeId>> {
        Ok(single_output(TypeId::Int32))
    }

    fn initialize(&mut self) -> Result<()> {
        self.emitted = 0;
        self.refresh();
        Ok(())
    }

    fn process(&mut self, io: &PhyIo) -> Result<()> {
        if self.emitted >= self.count {
            // Nothing left to emit; yield so the scheduler pass does not spin
            std::thread::sleep(Duration::from_millis(1));
            return Ok(());
        }
        let mut set = io.write::<i32>("output1", self.block_size)?;
        let base = (self.emitted * self.block_size) as i32;
        for (i, sample) in set.data.iter_mut().enumerate() {
            *sample = if self.random {
                self.rng.gen()
            } else {
                base + i as i32
            };
        }
        set.sample_rate = 0.0;
        drop(set);
        self.emitted += 1;
        Ok(())
    }

    fn parameter_changed(&mut self, _name: &str) {
        self.refresh();
    }
}

/// Counts and records every `i32` data set it receives
pub struct CounterSink {
    core: ComponentCore,
    probe: Option<Arc<Probe>>,
}

impl CounterSink {
    pub fn new(name: &str) -> Self {
        let mut core = ComponentCore::new(
            name,
            "mocksink",
            "absorbs and counts data sets",
            "skywave",
            "1.0",
        );
        core.ports.register_input("input1", vec![TypeId::Int32]);
        core.register_event("setreceived", "first sample of a received set", TypeId::Int32);
        CounterSink { core, probe: None }
    }

    pub fn with_probe(name: &str, probe: Arc<Probe>) -> Self {
        let mut sink = CounterSink::new(name);
        sink.probe = Some(probe);
        sink
    }
}

impl PhyComponent for CounterSink {
    fn base(&self) -> &ComponentCore {
        &self.core
    }

    fn base_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn calculate_output_types(
        &self,
        _input_types: &BTreeMap<String, TypeId>,
    ) -> Result<BTreeMap<String, TypeId>> {
        Ok(BTreeMap::new())
    }

    fn process(&mut self, io: &PhyIo) -> Result<()> {
        let set = io.read::<i32>("input1")?;
        let first = set.data.first().copied().unwrap_or(0);
        drop(set);
        if let Some(probe) = &self.probe {
            probe.record(first as i64);
        }
        self.core.activate_event("setreceived", vec![first.into()])?;
        Ok(())
    }
}

/// Copies each input set to two outputs
pub struct Fork {
    core: ComponentCore,
}

impl Fork {
    pub fn new(name: &str) -> Self {
        let mut core = ComponentCore::new(name, "mockfork", "duplicates a stream", "skywave", "1.0");
        core.ports.register_input("input1", vec![TypeId::Int32]);
        core.ports.register_output("output1", vec![TypeId::Int32]);
        core.ports.register_output("output2", vec![TypeId::Int32]);
        Fork { core }
    }
}

impl PhyComponent for Fork {
    fn base(&self) -> &ComponentCore {
        &self.core
    }

    fn base_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn calculate_output_types(
        &self,
        input_types: &BTreeMap<String, TypeId>,
    ) -> Result<BTreeMap<String, TypeId>> {
        let tid = input_types
            .values()
            .next()
            .copied()
            .unwrap_or(TypeId::Int32);
        let mut out = BTreeMap::new();
        out.insert("output1".to_string(), tid);
        out.insert("output2".to_string(), tid);
        Ok(out)
    }

    fn process(&mut self, io: &PhyIo) -> Result<()> {
        let input = io.read::<i32>("input1")?;
        for port in ["output1", "output2"] {
            let mut out = io.write::<i32>(port, input.data.len())?;
            out.data.copy_from_slice(&input.data);
            out.sample_rate = input.sample_rate;
            out.timestamp = input.timestamp;
            out.metadata = input.metadata.clone();
        }
        Ok(())
    }
}

/// Forwards sets unchanged; generic over the element type and specialised
/// by the graph builder to whatever type its input carries
pub struct Passthrough<T: BufferCast> {
    core: ComponentCore,
    _marker: std::marker::PhantomData<T>,
}

impl<T: BufferCast> Passthrough<T> {
    pub fn new(name: &str) -> Self {
        let mut core = ComponentCore::new(
            name,
            "mockpassthrough",
            "forwards data sets unchanged",
            "skywave",
            "1.0",
        );
        core.ports.register_input("input1", crate::types::ALL_TYPE_IDS.to_vec());
        core.ports.register_output("output1", crate::types::ALL_TYPE_IDS.to_vec());
        Passthrough {
            core,
            _marker: std::marker::PhantomData,
        }
    }
}

fn passthrough_for(name: &str, tid: TypeId) -> Box<dyn PhyComponent> {
    use crate::types::Complex;
    match tid {
        TypeId::Uint8 => Box::new(Passthrough::<u8>::new(name)),
        TypeId::Uint16 => Box::new(Passthrough::<u16>::new(name)),
        TypeId::Uint32 => Box::new(Passthrough::<u32>::new(name)),
        TypeId::Uint64 => Box::new(Passthrough::<u64>::new(name)),
        TypeId::Int8 => Box::new(Passthrough::<i8>::new(name)),
        TypeId::Int16 => Box::new(Passthrough::<i16>::new(name)),
        TypeId::Int32 => Box::new(Passthrough::<i32>::new(name)),
        TypeId::Int64 => Box::new(Passthrough::<i64>::new(name)),
        TypeId::Float32 => Box::new(Passthrough::<f32>::new(name)),
        TypeId::Float64 | TypeId::Float80 => Box::new(Passthrough::<f64>::new(name)),
        TypeId::ComplexFloat32 => Box::new(Passthrough::<Complex<f32>>::new(name)),
        TypeId::ComplexFloat64 | TypeId::ComplexFloat80 => {
            Box::new(Passthrough::<Complex<f64>>::new(name))
        }
    }
}

impl<T: BufferCast> PhyComponent for Passthrough<T> {
    fn base(&self) -> &ComponentCore {
        &self.core
    }

    fn base_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn calculate_output_types(
        &self,
        input_types: &BTreeMap<String, TypeId>,
    ) -> Result<BTreeMap<String, TypeId>> {
        let tid = input_types
            .values()
            .next()
            .copied()
            .unwrap_or(T::TYPE_ID);
        Ok(single_output(tid))
    }

    fn specialize(
        &self,
        input_types: &[TypeId],
        _output_types: &[TypeId],
    ) -> Result<Option<Box<dyn PhyComponent>>> {
        let wanted = input_types.first().copied().unwrap_or(T::TYPE_ID);
        if T::accepts(wanted) {
            Ok(None)
        } else {
            Ok(Some(passthrough_for(self.core.name(), wanted)))
        }
    }

    fn process(&mut self, io: &PhyIo) -> Result<()> {
        let input = io.read::<T>("input1")?;
        let mut out = io.write::<T>("output1", input.data.len())?;
        out.data.copy_from_slice(&input.data);
        out.sample_rate = input.sample_rate;
        out.timestamp = input.timestamp;
        out.metadata = input.metadata.clone();
        Ok(())
    }
}

/// Stack component that bounces frames back the way they came
pub struct StackReflector {
    core: ComponentCore,
    probe: Option<Arc<Probe>>,
}

impl StackReflector {
    pub fn new(name: &str) -> Self {
        let mut core = ComponentCore::new(
            name,
            "mockstackreflect",
            "reflects stack frames back to their sender",
            "skywave",
            "1.0",
        );
        core.ports.register_input("topport1", vec![TypeId::Uint8]);
        core.ports.register_input("bottomport1", vec![TypeId::Uint8]);
        StackReflector { core, probe: None }
    }

    pub fn with_probe(name: &str, probe: Arc<Probe>) -> Self {
        let mut comp = StackReflector::new(name);
        comp.probe = Some(probe);
        comp
    }

    fn record(&self, set: &StackDataSet) {
        if let Some(probe) = &self.probe {
            probe.record(set.data.front().copied().unwrap_or(0) as i64);
        }
    }
}

impl StackComponent for StackReflector {
    fn base(&self) -> &ComponentCore {
        &self.core
    }

    fn base_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn handle_from_above(&mut self, set: StackDataSet, io: &StackIo) -> Result<()> {
        self.record(&set);
        io.send_up(set)
    }

    fn handle_from_below(&mut self, set: StackDataSet, io: &StackIo) -> Result<()> {
        self.record(&set);
        io.send_down(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::any::AnyGrowingBuffer;
    use crate::component::phy::{ReadConnection, WriteConnection};

    #[test]
    fn test_source_emits_exactly_count_sets() {
        let buf = AnyGrowingBuffer::create(TypeId::Int32).unwrap();
        let io = PhyIo::new(
            vec![],
            vec![("output1".into(), WriteConnection::Internal(buf.clone()))],
        );
        let mut src = CounterSource::new("src1");
        src.base_mut().params.set_str("count", "3").unwrap();
        src.initialize().unwrap();
        for _ in 0..5 {
            src.process(&io).unwrap();
        }
        let reader = buf.typed::<i32>().unwrap();
        for expected in 0..3 {
            assert_eq!(reader.acquire_read().unwrap().data[0], expected);
        }
        assert!(!buf.has_data());
    }

    #[test]
    fn test_fork_duplicates_sets() {
        let input = AnyGrowingBuffer::create(TypeId::Int32).unwrap();
        let out1 = AnyGrowingBuffer::create(TypeId::Int32).unwrap();
        let out2 = AnyGrowingBuffer::create(TypeId::Int32).unwrap();
        let io = PhyIo::new(
            vec![("input1".into(), ReadConnection::Internal(input.clone()))],
            vec![
                ("output1".into(), WriteConnection::Internal(out1.clone())),
                ("output2".into(), WriteConnection::Internal(out2.clone())),
            ],
        );
        input
            .typed::<i32>()
            .unwrap()
            .acquire_write(2)
            .unwrap()
            .data
            .copy_from_slice(&[8, 9]);

        Fork::new("fork1").process(&io).unwrap();
        for out in [out1, out2] {
            let typed = out.typed::<i32>().unwrap();
            assert_eq!(typed.acquire_read().unwrap().data.as_slice(), &[8, 9]);
        }
    }

    #[test]
    fn test_passthrough_specializes_to_input_type() {
        let p = Passthrough::<i32>::new("pass1");
        let specialized = p
            .specialize(&[TypeId::Float32], &[TypeId::Float32])
            .unwrap();
        assert!(specialized.is_some());
        assert!(p.specialize(&[TypeId::Int32], &[TypeId::Int32]).unwrap().is_none());
        // Alias lane needs no respin on a 64-bit float passthrough
        let p64 = Passthrough::<f64>::new("pass2");
        assert!(p64
            .specialize(&[TypeId::Float80], &[TypeId::Float80])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_sink_records_into_probe() {
        let probe = Probe::shared();
        let buf = AnyGrowingBuffer::create(TypeId::Int32).unwrap();
        let io = PhyIo::new(
            vec![("input1".into(), ReadConnection::Internal(buf.clone()))],
            vec![],
        );
        buf.typed::<i32>().unwrap().acquire_write(1).unwrap().data[0] = 41;
        CounterSink::with_probe("snk1", probe.clone())
            .process(&io)
            .unwrap();
        assert_eq!(probe.set_count(), 1);
        assert_eq!(*probe.values.lock().unwrap(), vec![41]);
    }
}
