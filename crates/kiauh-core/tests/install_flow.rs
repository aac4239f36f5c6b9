mod common;

use std::fs;

use common::{scratch_paths, unit_names, RecordingServices};
use kiauh_core::input::ScriptedPrompter;
use kiauh_core::instance_manager::find_instances;
use kiauh_core::klipper::{apply_klipper_install, plan_klipper_install, KlipperInstallPlan};
use kiauh_core::{Answer, Component, InstanceManager, SystemdInstanceManager};

#[test]
fn discovery_ignores_reserved_and_foreign_units() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = scratch_paths(tmp.path());
    for unit in [
        "klipper.service",
        "klipper-2.service",
        "klipper-10.service",
        "klipper-voron.service",
        "klipper-mcu.service",
        "klipper_mcu.service",
        "KlipperScreen.service",
        "klipperscreen.service",
        "moonraker-obico.service",
        "moonraker-1.service",
        "moonraker.env",
    ] {
        fs::write(paths.systemd_dir.join(unit), "").unwrap();
    }

    let klipper = find_instances(&paths, Component::Klipper).unwrap();
    let suffixes: Vec<&str> = klipper.iter().map(|i| i.suffix.as_str()).collect();
    assert_eq!(suffixes, vec!["", "2", "10", "voron"]);

    let moonraker = find_instances(&paths, Component::Moonraker).unwrap();
    assert_eq!(moonraker.len(), 1);
    assert_eq!(moonraker[0].service_name(), "moonraker-1");
}

#[test]
fn adding_to_single_install_converts_then_creates() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = scratch_paths(tmp.path());
    let mut im = SystemdInstanceManager::new(&paths, RecordingServices::default());
    let single = im.instance(Component::Klipper, "");
    im.create(&single).unwrap();

    let mut prompter = ScriptedPrompter::new(["y", "2", "n", "n"]);
    let plan = match plan_klipper_install(&im, &mut prompter).unwrap() {
        Answer::Value(plan) => plan,
        Answer::Back => panic!("unexpected go-back"),
    };
    assert_eq!(
        plan,
        KlipperInstallPlan {
            names: vec!["1".into(), "2".into(), "3".into()],
            install_count: 2,
            example_cfg: false,
        }
    );
    assert_eq!(prompter.remaining(), 0);

    let created = apply_klipper_install(&mut im, &plan).unwrap();
    let created: Vec<String> = created.iter().map(|i| i.service_name()).collect();
    assert_eq!(created, vec!["klipper-2", "klipper-3"]);
    assert_eq!(
        unit_names(&paths),
        vec!["klipper-1.service", "klipper-2.service", "klipper-3.service"]
    );
    assert!(tmp.path().join("printer_1_data").is_dir());
    assert!(!tmp.path().join("printer_data").exists());
}

#[test]
fn klipper_adopts_larger_moonraker_family() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = scratch_paths(tmp.path());
    let mut im = SystemdInstanceManager::new(&paths, RecordingServices::default());
    for suffix in ["1", "2", "3"] {
        let instance = im.instance(Component::Moonraker, suffix);
        im.create(&instance).unwrap();
    }

    // asks for custom names, but the Moonraker family wins and no name is prompted
    let mut prompter = ScriptedPrompter::new(["3", "y", "y"]);
    let Answer::Value(plan) = plan_klipper_install(&im, &mut prompter).unwrap() else {
        panic!("unexpected go-back");
    };
    assert_eq!(plan.names, vec!["1", "2", "3"]);
    assert!(!prompter.asked.iter().any(|q| q.starts_with("Enter name")));

    apply_klipper_install(&mut im, &plan).unwrap();
    let klipper = im.instances(Component::Klipper).unwrap();
    let suffixes: Vec<&str> = klipper.iter().map(|i| i.suffix.as_str()).collect();
    assert_eq!(suffixes, vec!["1", "2", "3"]);
    assert!(tmp
        .path()
        .join("printer_2_data")
        .join("config")
        .join("printer.cfg")
        .is_file());
}

#[test]
fn fresh_custom_install_prompts_every_name() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = scratch_paths(tmp.path());
    let im = SystemdInstanceManager::new(&paths, RecordingServices::default());

    let mut prompter = ScriptedPrompter::new(["2", "y", "voron", "mcu", "Voron", "ender", "n"]);
    let Answer::Value(plan) = plan_klipper_install(&im, &mut prompter).unwrap() else {
        panic!("unexpected go-back");
    };
    assert_eq!(plan.names, vec!["voron", "ender"]);
    assert!(!plan.example_cfg);
    assert_eq!(prompter.remaining(), 0);
}

#[test]
fn declining_to_add_goes_back() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = scratch_paths(tmp.path());
    let mut im = SystemdInstanceManager::new(&paths, RecordingServices::default());
    let existing = im.instance(Component::Klipper, "1");
    im.create(&existing).unwrap();

    let mut prompter = ScriptedPrompter::new(["n"]);
    assert_eq!(plan_klipper_install(&im, &mut prompter).unwrap(), Answer::Back);
}

#[test]
fn single_named_instance_keeps_custom_naming() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = scratch_paths(tmp.path());
    let mut im = SystemdInstanceManager::new(&paths, RecordingServices::default());
    let voron = im.instance(Component::Klipper, "voron");
    im.create(&voron).unwrap();

    let mut prompter = ScriptedPrompter::new(["y", "1", "Voron", "ender", "n"]);
    let Answer::Value(plan) = plan_klipper_install(&im, &mut prompter).unwrap() else {
        panic!("unexpected go-back");
    };
    assert_eq!(plan.names, vec!["voron", "ender"]);
    let name_prompts = prompter
        .asked
        .iter()
        .filter(|q| q.as_str() == "Enter name for instance 2")
        .count();
    assert_eq!(name_prompts, 2);
    assert!(!prompter.asked.iter().any(|q| q.as_str() == "Assign custom names?"));

    let created = apply_klipper_install(&mut im, &plan).unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].service_name(), "klipper-ender");
}

#[test]
fn single_indexed_instance_gets_the_next_index() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = scratch_paths(tmp.path());
    let mut im = SystemdInstanceManager::new(&paths, RecordingServices::default());
    let first = im.instance(Component::Klipper, "1");
    im.create(&first).unwrap();

    let mut prompter = ScriptedPrompter::new(["y", "1", "n"]);
    let Answer::Value(plan) = plan_klipper_install(&im, &mut prompter).unwrap() else {
        panic!("unexpected go-back");
    };
    assert_eq!(plan.names, vec!["1", "2"]);
    assert_eq!(prompter.remaining(), 0);
}

#[test]
fn indexed_family_with_gap_gets_an_unused_index() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = scratch_paths(tmp.path());
    let mut im = SystemdInstanceManager::new(&paths, RecordingServices::default());
    for suffix in ["1", "3"] {
        let instance = im.instance(Component::Klipper, suffix);
        im.create(&instance).unwrap();
    }

    let mut prompter = ScriptedPrompter::new(["y", "1", "n"]);
    let Answer::Value(plan) = plan_klipper_install(&im, &mut prompter).unwrap() else {
        panic!("unexpected go-back");
    };
    assert_eq!(plan.names, vec!["1", "3", "4"]);

    let created = apply_klipper_install(&mut im, &plan).unwrap();
    assert_eq!(created.len(), plan.install_count);
    assert_eq!(
        unit_names(&paths),
        vec!["klipper-1.service", "klipper-3.service", "klipper-4.service"]
    );
}
