//! Reconfiguration: diffing two radio descriptions and applying the
//! result to a running radio

use skywave::component::mock::{CounterSink, CounterSource, Probe};
use skywave::radio::reconfig::compare_radios;
use skywave::radio::xml;
use skywave::System;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn radio_xml(p1: &str, p2: &str, p3: &str) -> String {
    format!(
        r#"
        <softwareradio>
          <engine name="phyengine1" class="phyengine">
            <component name="src1" class="mocksource">
              <parameter name="param1" value="{}"/>
              <parameter name="param2" value="{}"/>
              <parameter name="param3" value="{}"/>
              <port name="output1" class="output"/>
            </component>
            <component name="snk1" class="mocksink">
              <port name="input1" class="input"/>
            </component>
          </engine>
          <link source="src1.output1" sink="snk1.input1"/>
        </softwareradio>
        "#,
        p1, p2, p3
    )
}

#[test]
fn test_diff_emits_one_reconfig_per_changed_parameter() {
    let before = xml::parse_str(&radio_xml("1", "1", "1")).unwrap();
    let after = xml::parse_str(&radio_xml("2", "2", "2")).unwrap();

    let set = compare_radios(&before, &after);
    assert_eq!(set.params.len(), 3);
    for reconfig in &set.params {
        assert_eq!(reconfig.engine_name, "phyengine1");
        assert_eq!(reconfig.component_name, "src1");
        assert_eq!(reconfig.parameter_value, "2");
    }
    let mut names: Vec<_> = set.params.iter().map(|p| p.parameter_name.clone()).collect();
    names.sort();
    assert_eq!(names, ["param1", "param2", "param3"]);
}

#[test]
fn test_diff_ignores_identical_and_one_sided_parameters() {
    let before = xml::parse_str(&radio_xml("1", "1", "1")).unwrap();
    let after = xml::parse_str(&radio_xml("1", "5", "1")).unwrap();
    let set = compare_radios(&before, &after);
    assert_eq!(set.params.len(), 1);
    assert_eq!(set.params[0].parameter_name, "param2");

    // Applying the diff to the current radio adopts the target's values
    before.reconfigure(&set);
    assert_eq!(before.parameter_value("param2", "src1"), "5");
    assert_eq!(before.parameter_value("param1", "src1"), "1");
}

fn write_file(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::File::create(&path)
        .unwrap()
        .write_all(text.as_bytes())
        .unwrap();
    path
}

fn counting_radio(count: u32) -> String {
    format!(
        r#"
        <softwareradio>
          <engine name="phyengine1" class="phyengine">
            <component name="src1" class="mocksource">
              <parameter name="count" value="{}"/>
              <port name="output1" class="output"/>
            </component>
            <component name="snk1" class="mocksink">
              <port name="input1" class="input"/>
            </component>
          </engine>
          <link source="src1.output1" sink="snk1.input1"/>
        </softwareradio>
        "#,
        count
    )
}

#[test]
fn test_live_reconfigure_reaches_component_and_representation() {
    let dir = tempfile::tempdir().unwrap();
    let before = write_file(&dir, "before.xml", &counting_radio(5));
    let after = write_file(&dir, "after.xml", &counting_radio(12));

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

    assert!(system.load_radio(&before));
    assert!(system.start_radio());

    let deadline = Instant::now() + Duration::from_secs(10);
    while probe.set_count() < 5 {
        assert!(Instant::now() < deadline);
        std::thread::sleep(Duration::from_millis(5));
    }

    // The new description only differs in src1.count; the source picks the
    // change up between process steps and emits the remaining sets
    assert!(system.reconfigure_radio(&after));
    while probe.set_count() < 12 {
        assert!(Instant::now() < deadline, "saw {}", probe.set_count());
        std::thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(system.parameter_value("count", "src1"), "12");
    assert!(system.stop_radio());
    assert!(system.unload_radio());
    assert_eq!(probe.set_count(), 12);
}

#[test]
fn test_reconfigure_from_unloaded_falls_back_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let radio = write_file(&dir, "radio.xml", &counting_radio(3));

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

    assert!(system.reconfigure_radio(&radio));
    assert!(system.is_loaded());
    assert!(system.unload_radio());
}
