//! Event flow from components up to a subscribed controller, and the
//! controller's callbacks back down into the radio

use skywave::component::events::Event;
use skywave::component::mock::{CounterSink, CounterSource};
use skywave::controller::{Controller, ControllerCore, ControllerServices};
use skywave::error::Result;
use skywave::System;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct ControllerProbe {
    events: AtomicUsize,
    last_value: Mutex<Option<String>>,
}

/// Counts sink events and samples a parameter value through the callback
struct ProbeController {
    core: ControllerCore,
    probe: Arc<ControllerProbe>,
}

impl ProbeController {
    fn new(probe: Arc<ControllerProbe>) -> Self {
        ProbeController {
            core: ControllerCore::new("probecontroller", "records sink activity", "", "1.0"),
            probe,
        }
    }
}

impl Controller for ProbeController {
    fn base(&self) -> &ControllerCore {
        &self.core
    }

    fn base_mut(&mut self) -> &mut ControllerCore {
        &mut self.core
    }

    fn subscribe_to_events(&mut self, services: &ControllerServices) -> Result<()> {
        services.subscribe_to_event("setreceived", "snk1");
        Ok(())
    }

    fn process_event(&mut self, event: Event, services: &ControllerServices) -> Result<()> {
        assert_eq!(event.name, "setreceived");
        assert_eq!(event.component_name, "snk1");
        self.probe.events.fetch_add(1, Ordering::SeqCst);
        let value = services.parameter_value("count", "src1");
        *self.probe.last_value.lock().unwrap() = Some(value);
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
fn test_subscribed_controller_receives_component_events() {
    let dir = tempfile::tempdir().unwrap();
    let radio = write_radio(
        &dir,
        r#"
        <softwareradio>
          <controller class="probecontroller"/>
          <engine name="phyengine1" class="phyengine">
            <component name="src1" class="mocksource">
              <parameter name="count" value="15"/>
              <port name="output1" class="output"/>
            </component>
            <component name="snk1" class="mocksink">
              <port name="input1" class="input"/>
            </component>
          </engine>
          <link source="src1.output1" sink="snk1.input1"/>
        </softwareradio>
        "#,
    );

    let probe = Arc::new(ControllerProbe::default());
    let mut system = System::new();
    {
        let repos = system.repositories_mut();
        repos
            .phy
            .register_builtin_phy("mocksource", |name| Box::new(CounterSource::new(name)));
        repos
            .phy
            .register_builtin_phy("mocksink", |name| Box::new(CounterSink::new(name)));
        let probe = Arc::clone(&probe);
        repos
            .controller
            .register_builtin_controller("probecontroller", move || {
                Box::new(ProbeController::new(Arc::clone(&probe)))
            });
    }

    assert!(system.load_radio(&radio));
    assert!(system.start_radio());

    let deadline = Instant::now() + Duration::from_secs(10);
    while probe.events.load(Ordering::SeqCst) < 15 {
        assert!(
            Instant::now() < deadline,
            "controller saw {} events",
            probe.events.load(Ordering::SeqCst)
        );
        std::thread::sleep(Duration::from_millis(5));
    }

    assert!(system.stop_radio());
    assert!(system.unload_radio());

    assert_eq!(probe.events.load(Ordering::SeqCst), 15);
    assert_eq!(
        probe.last_value.lock().unwrap().as_deref(),
        Some("15")
    );
}

#[test]
fn test_unsubscribed_events_are_dropped_silently() {
    let dir = tempfile::tempdir().unwrap();
    let radio = write_radio(
        &dir,
        r#"
        <softwareradio>
          <engine name="phyengine1" class="phyengine">
            <component name="src1" class="mocksource">
              <parameter name="count" value="5"/>
              <port name="output1" class="output"/>
            </component>
            <component name="snk1" class="mocksink">
              <port name="input1" class="input"/>
            </component>
          </engine>
          <link source="src1.output1" sink="snk1.input1"/>
        </softwareradio>
        "#,
    );

    let mut system = System::new();
    {
        let repos = system.repositories_mut();
        repos
            .phy
            .register_builtin_phy("mocksource", |name| Box::new(CounterSource::new(name)));
        repos
            .phy
            .register_builtin_phy("mocksink", |name| Box::new(CounterSink::new(name)));
    }

    // No controller is subscribed; the sink's events go nowhere and the
    // radio still runs to completion
    assert!(system.load_radio(&radio));
    assert!(system.start_radio());
    std::thread::sleep(Duration::from_millis(100));
    assert!(system.stop_radio());
    assert!(system.unload_radio());
}
