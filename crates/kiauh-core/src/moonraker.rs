//! Installing, updating and backing up Moonraker.

use std::fs;
use std::path::Path;
use std::process::Command;

use log::{error, info};
use serde::Deserialize;

use crate::answer;
use crate::backup::BackupManager;
use crate::cmd;
use crate::error::{Error, Result};
use crate::git;
use crate::input::{select_instances, Answer, Prompter};
use crate::instance::{Component, Instance};
use crate::instance_manager::InstanceManager;
use crate::klipper::service_names;
use crate::paths::Paths;
use crate::settings::Settings;
use crate::sys;

const MOONRAKER_CONF: &str = include_str!("../assets/moonraker.conf");
pub const DEFAULT_PORT: u16 = 7125;

/// `scripts/system-dependencies.json` of the Moonraker repository.
#[derive(Debug, Deserialize)]
struct SystemDependencies {
    #[serde(default)]
    debian: Vec<String>,
}

/// Klipper instances that have no Moonraker instance with the same suffix, paired with
/// their position in the Klipper family.
pub fn instances_without_moonraker(
    klipper: &[Instance],
    moonraker: &[Instance],
) -> Vec<(usize, Instance)> {
    klipper
        .iter()
        .enumerate()
        .filter(|(_, k)| !moonraker.iter().any(|m| m.suffix == k.suffix))
        .map(|(pos, k)| (pos, k.clone()))
        .collect()
}

pub fn port_for_position(position: usize) -> u16 {
    DEFAULT_PORT.saturating_add(u16::try_from(position).unwrap_or(u16::MAX))
}

/// API address of an instance listening on `port`.
pub fn moonraker_url(ip: &str, port: u16) -> String {
    format!("http://{ip}:{port}")
}

/// Set up one Moonraker instance per selected Klipper instance that still lacks one.
pub fn install_moonraker(
    im: &mut dyn InstanceManager,
    settings: &Settings,
    prompter: &mut dyn Prompter,
) -> Result<Answer<()>> {
    let klipper = im.instances(Component::Klipper)?;
    if klipper.is_empty() {
        return Err(Error::MissingPrerequisite(
            "Klipper is not installed. Install Klipper before Moonraker".into(),
        ));
    }
    let moonraker = im.instances(Component::Moonraker)?;
    let missing = instances_without_moonraker(&klipper, &moonraker);
    if missing.is_empty() {
        info!("Every Klipper instance already has a Moonraker instance.");
        return Ok(Answer::Value(()));
    }

    let selected: Vec<(usize, Instance)> = if missing.len() > 1 {
        let candidates: Vec<Instance> = missing.iter().map(|(_, i)| i.clone()).collect();
        let picked = answer!(select_instances(
            prompter,
            "Select Klipper instance to set up Moonraker for",
            &candidates
        )?);
        missing
            .into_iter()
            .filter(|(_, k)| picked.contains(k))
            .collect()
    } else {
        let (_, only) = &missing[0];
        let question = format!("Install Moonraker for {}?", only.service_name());
        if !answer!(prompter.confirm(&question, true)?) {
            return Ok(Answer::Back);
        }
        missing
    };

    let paths = im.paths().clone();
    if moonraker.is_empty() {
        answer!(setup_moonraker_prerequisites(&paths, settings, prompter)?);
    }

    let mut created = Vec::new();
    for (position, klipper_instance) in selected {
        let instance = im.instance(Component::Moonraker, &klipper_instance.suffix);
        let port = port_for_position(position);
        im.create(&instance)?;
        create_moonraker_conf(&instance, port)?;
        im.enable(&instance)?;
        im.start(&instance)?;
        created.push((instance, port));
    }
    let instances: Vec<Instance> = created.iter().map(|(i, _)| i.clone()).collect();
    info!("Moonraker instance(s) created: {}", service_names(&instances));

    let ip = sys::get_ipv4_addr();
    for (instance, port) in &created {
        info!("{}: {}", instance.service_name(), moonraker_url(&ip, *port));
    }
    Ok(Answer::Value(()))
}

/// Clone the repository, install system packages, set up the virtualenv and polkit rules.
pub fn setup_moonraker_prerequisites(
    paths: &Paths,
    settings: &Settings,
    prompter: &mut dyn Prompter,
) -> Result<Answer<()>> {
    let repo = settings.repo(Component::Moonraker);
    git::clone_or_update(&repo.url, &repo.branch, &paths.moonraker_dir)?;

    info!("Installing dependencies ...");
    let packages = parse_system_dependencies(
        &paths
            .moonraker_dir
            .join("scripts")
            .join("system-dependencies.json"),
    )?;
    sys::update_system_package_lists(false, false)?;
    sys::install_system_packages(&sys::check_package_install(&packages))?;

    answer!(sys::create_python_venv(&paths.moonraker_env_dir, prompter)?);
    sys::install_python_requirements(
        &paths.moonraker_env_dir,
        &paths
            .moonraker_dir
            .join("scripts")
            .join("moonraker-requirements.txt"),
    )?;
    install_polkit_rules(paths)?;
    Ok(Answer::Value(()))
}

/// Debian package list of a `system-dependencies.json` file.
pub fn parse_system_dependencies(source: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(source)
        .map_err(|e| Error::io(format!("unable to read {}", source.display()), e))?;
    let deps: SystemDependencies = serde_json::from_str(&raw).map_err(|e| Error::Config {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(deps.debian)
}

pub fn install_polkit_rules(paths: &Paths) -> Result<()> {
    let script = paths.moonraker_dir.join("scripts").join("set-policykit-rules.sh");
    if !script.is_file() {
        return Err(Error::MissingPrerequisite(format!(
            "{} not found",
            script.display()
        )));
    }
    info!("Installing Moonraker policykit rules ...");
    cmd::run(Command::new(&script).arg("--disable-systemctl"))
        .inspect_err(|e| error!("Error while installing policykit rules: {e}"))?;
    info!("Moonraker policykit rules successfully installed!");
    Ok(())
}

/// Write `moonraker.conf` for `instance` unless it already has one.
pub fn create_moonraker_conf(instance: &Instance, port: u16) -> Result<()> {
    let target = instance.cfg_file();
    if target.is_file() {
        info!("'{}' already exists.", target.display());
        return Ok(());
    }
    fs::create_dir_all(instance.cfg_dir()).map_err(|e| {
        Error::io(format!("unable to create {}", instance.cfg_dir().display()), e)
    })?;
    let conf = MOONRAKER_CONF
        .replace("%PORT%", &port.to_string())
        .replace("%UDS%", &instance.klippy_socket().to_string_lossy());
    fs::write(&target, conf)
        .map_err(|e| Error::io(format!("unable to write {}", target.display()), e))?;
    info!("Created '{}' (port {port})", target.display());
    Ok(())
}

/// Stop every instance, pull the repository, refresh requirements and start them again.
pub fn update_moonraker(im: &mut dyn InstanceManager, settings: &Settings) -> Result<()> {
    let paths = im.paths().clone();
    if !paths.moonraker_dir.is_dir() {
        return Err(Error::MissingPrerequisite("Moonraker is not installed".into()));
    }
    if settings.backup_before_update {
        backup_moonraker_dir(im)?;
    }

    let instances = im.instances(Component::Moonraker)?;
    for instance in &instances {
        im.stop(instance)?;
    }
    git::pull(&paths.moonraker_dir)?;
    sys::install_python_requirements(
        &paths.moonraker_env_dir,
        &paths
            .moonraker_dir
            .join("scripts")
            .join("moonraker-requirements.txt"),
    )?;
    for instance in &instances {
        im.start(instance)?;
    }
    Ok(())
}

/// Back up the repository, the virtualenv and every instance's data dir (without gcodes
/// and sockets) below `<backup root>/moonraker`.
pub fn backup_moonraker_dir(im: &dyn InstanceManager) -> Result<()> {
    let paths = im.paths();
    let target = paths.backup_root.join("moonraker");
    let bm = BackupManager::new(&paths.backup_root);
    bm.backup_directory("moonraker", &paths.moonraker_dir, Some(&target))?;
    bm.backup_directory("moonraker-env", &paths.moonraker_env_dir, Some(&target))?;

    let data = bm.clone().with_ignore_folders(["gcodes", "comms"]);
    for instance in im.instances(Component::Moonraker)? {
        let name = instance
            .data_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| instance.service_name());
        data.backup_directory(&name, &instance.data_dir, Some(&target))?;
    }
    Ok(())
}
