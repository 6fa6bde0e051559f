//! End-to-end data-flow radios driven through the `System` facade

use skywave::component::mock::{CounterSink, CounterSource, Fork, Probe};
use skywave::System;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn write_radio(dir: &tempfile::TempDir, name: &str, xml: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(xml.as_bytes()).unwrap();
    path
}

fn wait_for(probe: &Probe, n: usize) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while probe.set_count() < n {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {} sets, saw {}",
            n,
            probe.set_count()
        );
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_minimal_pipeline_delivers_all_sets_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let radio = write_radio(
        &dir,
        "radio.xml",
        r#"
        <softwareradio>
          <engine name="phyengine1" class="phyengine">
            <component name="src1" class="mocksource">
              <parameter name="count" value="40"/>
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

    let probe = Probe::shared();
    let mut system = System::new();
    {
        let repos = system.repositories_mut();
        repos
            .phy
            .register_builtin_phy("mocksource", |name| Box::new(CounterSource::new(name)));
        let probe = Arc::clone(&probe);
        repos.phy.register_builtin_phy("mocksink", move |name| {
            Box::new(CounterSink::with_probe(name, Arc::clone(&probe)))
        });
    }

    assert!(system.load_radio(&radio));
    assert!(system.is_loaded());
    assert!(system.start_radio());
    assert!(system.is_running());

    wait_for(&probe, 40);
    assert!(system.stop_radio());
    assert!(system.unload_radio());

    assert_eq!(probe.set_count(), 40);
    let values = probe.values.lock().unwrap();
    assert_eq!(*values, (0..40).collect::<Vec<i64>>());
}

#[test]
fn test_two_engine_fork_feeds_both_sinks() {
    let dir = tempfile::tempdir().unwrap();
    let radio = write_radio(
        &dir,
        "radio.xml",
        r#"
        <softwareradio>
          <engine name="phyengine1" class="phyengine">
            <component name="src1" class="mocksource">
              <parameter name="count" value="30"/>
              <port name="output1" class="output"/>
            </component>
            <component name="fork1" class="mockfork">
              <port name="input1" class="input"/>
              <port name="output1" class="output"/>
              <port name="output2" class="output"/>
            </component>
          </engine>
          <engine name="phyengine2" class="phyengine">
            <component name="snk1" class="mocksink">
              <port name="input1" class="input"/>
            </component>
            <component name="snk2" class="mocksink">
              <port name="input1" class="input"/>
            </component>
          </engine>
          <link source="src1.output1" sink="fork1.input1"/>
          <link source="fork1.output1" sink="snk1.input1"/>
          <link source="fork1.output2" sink="snk2.input1"/>
        </softwareradio>
        "#,
    );

    let probe1 = Probe::shared();
    let probe2 = Probe::shared();
    let mut system = System::new();
    {
        let repos = system.repositories_mut();
        repos
            .phy
            .register_builtin_phy("mocksource", |name| Box::new(CounterSource::new(name)));
        repos
            .phy
            .register_builtin_phy("mockfork", |name| Box::new(Fork::new(name)));
        let p1 = Arc::clone(&probe1);
        let p2 = Arc::clone(&probe2);
        repos.phy.register_builtin_phy("mocksink", move |name| {
            let probe = if name == "snk1" { &p1 } else { &p2 };
            Box::new(CounterSink::with_probe(name, Arc::clone(probe)))
        });
    }

    assert!(system.load_radio(&radio));
    assert!(system.start_radio());
    wait_for(&probe1, 30);
    wait_for(&probe2, 30);
    assert!(system.stop_radio());
    assert!(system.unload_radio());

    // Each sink received every forked set, in emit order
    assert_eq!(probe1.set_count() + probe2.set_count(), 60);
    for probe in [probe1, probe2] {
        let values = probe.values.lock().unwrap();
        assert_eq!(*values, (0..30).collect::<Vec<i64>>());
    }
}

#[test]
fn test_start_stop_terminates_promptly() {
    let dir = tempfile::tempdir().unwrap();
    let radio = write_radio(
        &dir,
        "radio.xml",
        r#"
        <softwareradio>
          <engine name="phyengine1" class="phyengine">
            <component name="src1" class="mocksource">
              <parameter name="count" value="1000000"/>
              <port name="output1" class="output"/>
            </component>
          </engine>
          <engine name="phyengine2" class="phyengine">
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

    assert!(system.load_radio(&radio));
    assert!(system.start_radio());

    // Stop immediately; every engine and buffer wait must unwind fast
    let begin = Instant::now();
    assert!(system.stop_radio());
    assert!(begin.elapsed() < Duration::from_secs(5));
    assert!(system.unload_radio());
}

#[test]
fn test_unknown_component_class_fails_load() {
    let dir = tempfile::tempdir().unwrap();
    let radio = write_radio(
        &dir,
        "radio.xml",
        r#"
        <softwareradio>
          <engine name="phyengine1" class="phyengine">
            <component name="src1" class="doesnotexist">
              <port name="output1" class="output"/>
            </component>
          </engine>
        </softwareradio>
        "#,
    );

    let mut system = System::new();
    assert!(!system.load_radio(&radio));
    assert!(!system.is_loaded());
}
