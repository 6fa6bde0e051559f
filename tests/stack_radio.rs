//! A radio spanning a stack engine: phy bytes up through a reflector and
//! back down into another phy engine

use skywave::component::mock::{Probe, StackReflector};
use skywave::component::phy::{PhyComponent, PhyIo};
use skywave::component::ComponentCore;
use skywave::error::Result;
use skywave::types::value::ValueKind;
use skywave::types::TypeId;
use skywave::System;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Emits `count` one-byte frames, each carrying its sequence number
struct ByteSource {
    core: ComponentCore,
    emitted: u8,
    count: u8,
}

impl ByteSource {
    fn new(name: &str) -> Self {
        let mut core = ComponentCore::new(name, "bytesource", "emits byte frames", "", "1.0");
        core.ports.register_output("output1", vec![TypeId::Uint8]);
        core.register_parameter(
            skywave::component::params::ParamSpec::new(
                "count",
                ValueKind::Uint8,
                "frames to emit",
            )
            .default_value("10"),
        )
        .unwrap();
        ByteSource {
            core,
            emitted: 0,
            count: 0,
        }
    }
}

impl PhyComponent for ByteSource {
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
        let mut out = BTreeMap::new();
        out.insert("output1".to_string(), TypeId::Uint8);
        Ok(out)
    }

    fn initialize(&mut self) -> Result<()> {
        self.emitted = 0;
        self.count = self
            .core
            .params
            .get("count")?
            .as_f64()
            .unwrap_or(0.0) as u8;
        Ok(())
    }

    fn process(&mut self, io: &PhyIo) -> Result<()> {
        if self.emitted >= self.count {
            std::thread::sleep(Duration::from_millis(1));
            return Ok(());
        }
        let mut set = io.write::<u8>("output1", 1)?;
        set.data[0] = self.emitted;
        drop(set);
        self.emitted += 1;
        Ok(())
    }
}

/// Records each received byte frame into a probe
struct ByteSink {
    core: ComponentCore,
    probe: Arc<Probe>,
}

impl ByteSink {
    fn new(name: &str, probe: Arc<Probe>) -> Self {
        let mut core = ComponentCore::new(name, "bytesink", "absorbs byte frames", "", "1.0");
        core.ports.register_input("input1", vec![TypeId::Uint8]);
        ByteSink { core, probe }
    }
}

impl PhyComponent for ByteSink {
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
        let set = io.read::<u8>("input1")?;
        let first = set.data.first().copied().unwrap_or(0);
        self.probe.record(first as i64);
        Ok(())
    }
}

fn write_radio(dir: &tempfile::TempDir, xml: &str) -> PathBuf {
    let path = dir.path().join("radio.xml");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(xml.as_bytes())
        .unwrap();
    path
}

#[test]
fn test_bytes_cross_the_stack_boundary_and_return() {
    let dir = tempfile::tempdir().unwrap();
    let radio = write_radio(
        &dir,
        r#"
        <softwareradio>
          <engine name="phyengine1" class="phyengine">
            <component name="bsrc" class="bytesource">
              <parameter name="count" value="20"/>
              <port name="output1" class="output"/>
            </component>
          </engine>
          <engine name="stackengine1" class="stackengine">
            <component name="mac" class="mockstackreflect">
              <port name="topport1" class="input"/>
              <port name="bottomport1" class="input"/>
            </component>
          </engine>
          <engine name="phyengine2" class="phyengine">
            <component name="bsnk" class="bytesink">
              <port name="input1" class="input"/>
            </component>
          </engine>
          <link source="bsrc.output1" sink="mac.bottomport1"/>
          <link source="mac.bottomport1" sink="bsnk.input1"/>
        </softwareradio>
        "#,
    );

    let mac_probe = Probe::shared();
    let sink_probe = Probe::shared();
    let mut system = System::new();
    {
        let repos = system.repositories_mut();
        repos
            .phy
            .register_builtin_phy("bytesource", |name| Box::new(ByteSource::new(name)));
        let sp = Arc::clone(&sink_probe);
        repos.phy.register_builtin_phy("bytesink", move |name| {
            Box::new(ByteSink::new(name, Arc::clone(&sp)))
        });
        let mp = Arc::clone(&mac_probe);
        repos.stack.register_builtin_stack("mockstackreflect", move |name| {
            Box::new(StackReflector::with_probe(name, Arc::clone(&mp)))
        });
    }

    assert!(system.load_radio(&radio));
    assert!(system.start_radio());

    let deadline = Instant::now() + Duration::from_secs(10);
    while sink_probe.set_count() < 20 {
        assert!(
            Instant::now() < deadline,
            "timed out: mac saw {}, sink saw {}",
            mac_probe.set_count(),
            sink_probe.set_count()
        );
        std::thread::sleep(Duration::from_millis(5));
    }

    assert!(system.stop_radio());
    assert!(system.unload_radio());

    // Every frame went up through the reflector and back down, in order
    assert_eq!(mac_probe.set_count(), 20);
    assert_eq!(sink_probe.set_count(), 20);
    let values = sink_probe.values.lock().unwrap();
    assert_eq!(*values, (0..20).collect::<Vec<i64>>());
}
