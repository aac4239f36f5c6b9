mod common;

use std::fs;

use common::{scratch_paths, unit_names, RecordingServices};
use kiauh_core::backup::BackupManager;
use kiauh_core::input::ScriptedPrompter;
use kiauh_core::moonraker::backup_moonraker_dir;
use kiauh_core::remove::{run_klipper_removal, run_moonraker_removal};
use kiauh_core::{Color, Component, InstanceManager, SystemdInstanceManager};

#[test]
fn directory_backup_skips_ignored_folders() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("printer_data");
    fs::create_dir_all(source.join("config")).unwrap();
    fs::create_dir_all(source.join("gcodes").join("nested")).unwrap();
    fs::create_dir_all(source.join("comms")).unwrap();
    fs::write(source.join("config").join("printer.cfg"), "[printer]\n").unwrap();
    fs::write(source.join("gcodes").join("nested").join("part.gcode"), "G28\n").unwrap();
    fs::write(source.join("comms").join("klippy.serial"), "").unwrap();

    let bm =
        BackupManager::new(&tmp.path().join("backups")).with_ignore_folders(["gcodes", "comms"]);
    let dest = bm.backup_directory("Printer_Data", &source, None).unwrap().unwrap();

    let name = dest.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("printer_data-"), "{name}");
    assert_eq!(
        fs::read_to_string(dest.join("config").join("printer.cfg")).unwrap(),
        "[printer]\n"
    );
    assert!(!dest.join("gcodes").exists());
    assert!(!dest.join("comms").exists());
    assert!(source.join("gcodes").join("nested").join("part.gcode").is_file());
}

#[test]
fn moonraker_backup_covers_instance_data() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = scratch_paths(tmp.path());
    let mut im = SystemdInstanceManager::new(&paths, RecordingServices::default());
    let instance = im.instance(Component::Moonraker, "voron");
    im.create(&instance).unwrap();
    fs::write(instance.cfg_file(), "[server]\n").unwrap();
    fs::write(instance.gcodes_dir().join("part.gcode"), "G28\n").unwrap();

    backup_moonraker_dir(&im).unwrap();

    let target = paths.backup_root.join("moonraker");
    let entries: Vec<_> = fs::read_dir(&target).unwrap().map(|e| e.unwrap().path()).collect();
    // repo and virtualenv are missing and skipped
    assert_eq!(entries.len(), 1);
    let backup = &entries[0];
    assert!(backup
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("voron_data-"));
    assert!(backup.join("config").join("moonraker.conf").is_file());
    assert!(!backup.join("gcodes").exists());
}

#[test]
fn removing_all_instances_also_removes_repo_and_env() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = scratch_paths(tmp.path());
    let mut im = SystemdInstanceManager::new(&paths, RecordingServices::default());
    for suffix in ["1", "2"] {
        let instance = im.instance(Component::Klipper, suffix);
        im.create(&instance).unwrap();
    }
    fs::create_dir_all(paths.klipper_dir.join("klippy")).unwrap();
    fs::create_dir_all(paths.klipper_env_dir.join("bin")).unwrap();

    let mut prompter = ScriptedPrompter::new(["a"]);
    let msg = run_klipper_removal(&mut im, &mut prompter, true, true, true).unwrap();

    assert_eq!(msg.color, Color::Green);
    assert_eq!(msg.text[0], "The following actions were performed:");
    assert!(msg.text.contains(&"● Klipper instances removed: klipper-1, klipper-2".to_string()));
    assert!(msg.text.contains(&"● Klipper local repository removed".to_string()));
    assert!(unit_names(&paths).is_empty());
    assert!(!paths.klipper_dir.exists());
    assert!(!paths.klipper_env_dir.exists());
    // data stays, only the env file goes
    let data = tmp.path().join("printer_1_data");
    assert!(data.join("config").is_dir());
    assert!(!data.join("systemd").join("klipper.env").exists());
}

#[test]
fn repo_is_kept_while_units_remain() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = scratch_paths(tmp.path());
    let mut im = SystemdInstanceManager::new(&paths, RecordingServices::default());
    for suffix in ["1", "2"] {
        let instance = im.instance(Component::Moonraker, suffix);
        im.create(&instance).unwrap();
    }
    fs::create_dir_all(&paths.moonraker_dir).unwrap();

    let mut prompter = ScriptedPrompter::new(["1"]);
    let msg = run_moonraker_removal(&mut im, &mut prompter, true, true, false, false).unwrap();

    assert_eq!(unit_names(&paths), vec!["moonraker-2.service"]);
    assert!(paths.moonraker_dir.is_dir());
    assert!(msg.text.contains(&"Some Moonraker services are still installed:".to_string()));
    assert!(im.services().calls().contains(&"stop moonraker-1".to_string()));
}

#[test]
fn nothing_to_remove() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = scratch_paths(tmp.path());
    let mut im = SystemdInstanceManager::new(&paths, RecordingServices::default());
    let mut prompter = ScriptedPrompter::new(Vec::<String>::new());

    let msg = run_moonraker_removal(&mut im, &mut prompter, true, false, false, false).unwrap();
    assert_eq!(msg.color, Color::Yellow);
    assert!(msg.centered);
    assert_eq!(msg.text, vec!["Nothing to remove."]);
}
