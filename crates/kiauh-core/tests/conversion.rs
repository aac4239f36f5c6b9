mod common;

use std::fs;

use common::{scratch_paths, unit_names, RecordingServices};
use kiauh_core::config_file::ConfigFile;
use kiauh_core::conversion::{convert_single_to_multi, handle_to_multi_instance_conversion};
use kiauh_core::{Component, Error, InstanceManager, SystemdInstanceManager};

#[test]
fn converting_to_custom_name_moves_data_and_units() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = scratch_paths(tmp.path());
    let mut im = SystemdInstanceManager::new(&paths, RecordingServices::default());

    let klipper = im.instance(Component::Klipper, "");
    let moonraker = im.instance(Component::Moonraker, "");
    im.create(&klipper).unwrap();
    im.create(&moonraker).unwrap();
    fs::write(klipper.cfg_file(), "[printer]\nkinematics: corexy\n").unwrap();
    fs::write(
        moonraker.cfg_file(),
        format!(
            "[server]\nhost: 0.0.0.0\nklippy_uds_address: {}\n",
            klipper.klippy_socket().display()
        ),
    )
    .unwrap();

    handle_to_multi_instance_conversion(&mut im, "foo").unwrap();

    assert_eq!(unit_names(&paths), vec!["klipper-foo.service", "moonraker-foo.service"]);
    let foo_data = tmp.path().join("foo_data");
    assert!(!tmp.path().join("printer_data").exists());
    assert_eq!(
        fs::read_to_string(foo_data.join("config").join("printer.cfg")).unwrap(),
        "[printer]\nkinematics: corexy\n"
    );

    let conf = ConfigFile::load(&foo_data.join("config").join("moonraker.conf")).unwrap();
    assert_eq!(
        conf.get("server", "klippy_uds_address"),
        Some(foo_data.join("comms").join("klippy.sock").to_string_lossy().to_string())
    );
    assert_eq!(conf.get("server", "host").as_deref(), Some("0.0.0.0"));

    let env = fs::read_to_string(foo_data.join("systemd").join("klipper.env")).unwrap();
    assert!(env.contains(&*foo_data.join("config").join("printer.cfg").to_string_lossy()));

    let calls = im.services().calls();
    let stop = calls.iter().position(|c| c == "stop klipper").unwrap();
    let disable = calls.iter().position(|c| c == "disable klipper").unwrap();
    let start = calls.iter().position(|c| c == "start klipper-foo").unwrap();
    assert!(stop < disable && disable < start);
    assert!(calls.contains(&"enable moonraker-foo".to_string()));
}

#[test]
fn existing_destination_is_left_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = scratch_paths(tmp.path());
    let mut im = SystemdInstanceManager::new(&paths, RecordingServices::default());

    let single = im.instance(Component::Klipper, "");
    im.create(&single).unwrap();
    fs::write(single.cfg_file(), "old").unwrap();
    let taken = tmp.path().join("foo_data").join("config");
    fs::create_dir_all(&taken).unwrap();
    fs::write(taken.join("printer.cfg"), "new").unwrap();

    let converted = convert_single_to_multi(&mut im, Component::Klipper, "foo").unwrap();

    assert_eq!(converted.suffix, "foo");
    assert_eq!(fs::read_to_string(single.cfg_file()).unwrap(), "old");
    assert_eq!(fs::read_to_string(taken.join("printer.cfg")).unwrap(), "new");
    assert_eq!(unit_names(&paths), vec!["klipper-foo.service"]);
}

#[test]
fn only_a_single_unsuffixed_family_converts() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = scratch_paths(tmp.path());
    let mut im = SystemdInstanceManager::new(&paths, RecordingServices::default());

    let err = convert_single_to_multi(&mut im, Component::Klipper, "foo").unwrap_err();
    assert!(matches!(err, Error::NotSingleInstance { count: 0, .. }));

    let indexed = im.instance(Component::Klipper, "1");
    im.create(&indexed).unwrap();
    let err = convert_single_to_multi(&mut im, Component::Klipper, "foo").unwrap_err();
    assert!(matches!(err, Error::NotSingleInstance { count: 1, .. }));
    assert_eq!(unit_names(&paths), vec!["klipper-1.service"]);
}

#[test]
fn moonraker_without_single_install_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = scratch_paths(tmp.path());
    let mut im = SystemdInstanceManager::new(&paths, RecordingServices::default());
    let single = im.instance(Component::Klipper, "");
    im.create(&single).unwrap();

    handle_to_multi_instance_conversion(&mut im, "1").unwrap();

    assert_eq!(unit_names(&paths), vec!["klipper-1.service"]);
    assert!(tmp.path().join("printer_1_data").is_dir());
}
