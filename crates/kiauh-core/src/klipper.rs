//! Installing, updating and backing up Klipper.

use std::fs;

use log::{info, warn};

use crate::answer;
use crate::backup::BackupManager;
use crate::config_file::ConfigFile;
use crate::conversion::handle_to_multi_instance_conversion;
use crate::error::{Error, Result};
use crate::git;
use crate::input::{get_number_input, Answer, Prompter};
use crate::instance::{suffixes, Component, Instance};
use crate::instance_manager::InstanceManager;
use crate::naming::{
    check_is_single_to_multi_conversion, detect_name_scheme, handle_instance_naming,
    init_name_scheme, update_name_dict, update_name_scheme, NameDict, NameScheme,
};
use crate::paths::Paths;
use crate::service::ServiceControl;
use crate::settings::Settings;
use crate::sys;

const EXAMPLE_PRINTER_CFG: &str = include_str!("../assets/printer.cfg");

/// Client config checkouts and the include section each adds to a new `printer.cfg`.
const CLIENT_CONFIGS: [(&str, &str); 2] = [
    ("mainsail-config", "include mainsail.cfg"),
    ("fluidd-config", "include fluidd.cfg"),
];

/// Names chosen for a Klipper install, before anything is touched on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlipperInstallPlan {
    /// Every position of the family after the install, existing names included.
    pub names: Vec<String>,
    pub install_count: usize,
    pub example_cfg: bool,
}

/// Ask how many instances to add and what to call them.
pub fn plan_klipper_install(
    im: &dyn InstanceManager,
    prompter: &mut dyn Prompter,
) -> Result<Answer<KlipperInstallPlan>> {
    let klipper = im.instances(Component::Klipper)?;
    let moonraker = im.instances(Component::Moonraker)?;

    if !klipper.is_empty() {
        info!("Existing Klipper instances: {}", service_names(&klipper));
        let add = answer!(prompter.confirm("Add new instances?", false)?);
        if !add {
            return Ok(Answer::Back);
        }
    }

    let question = if klipper.is_empty() {
        "Number of Klipper instances to set up"
    } else {
        "Number of additional Klipper instances to set up"
    };
    let install_count = answer!(get_number_input(prompter, question, 1, Some(1))?);

    let mut name_dict: NameDict = (0..klipper.len() + install_count)
        .map(|k| (k, String::new()))
        .collect();
    let scheme = answer!(init_name_scheme(&klipper, install_count, prompter)?);
    let mut scheme = update_name_scheme(scheme, &mut name_dict, &klipper, &moonraker);
    if scheme == NameScheme::Single && !klipper.is_empty() {
        // adding to a family of one named instance: follow that instance's naming
        update_name_dict(&mut name_dict, &klipper);
        scheme = detect_name_scheme(&suffixes(&klipper));
    }
    answer!(handle_instance_naming(
        &mut name_dict,
        scheme,
        Component::Klipper,
        prompter
    )?);

    let example_cfg = answer!(prompter.confirm("Create example printer.cfg?", true)?);
    Ok(Answer::Value(KlipperInstallPlan {
        names: name_dict.into_values().collect(),
        install_count,
        example_cfg,
    }))
}

/// Create the planned instances, converting a single install first when needed.
///
/// Returns the instances created. A conversion does not count toward `install_count`.
pub fn apply_klipper_install(
    im: &mut dyn InstanceManager,
    plan: &KlipperInstallPlan,
) -> Result<Vec<Instance>> {
    let mut created = Vec::new();
    for name in &plan.names {
        // re-read after every step, a conversion replaces the single instance
        let existing = im.instances(Component::Klipper)?;
        if existing.iter().any(|i| &i.suffix == name) {
            continue;
        }
        if check_is_single_to_multi_conversion(&existing) {
            handle_to_multi_instance_conversion(im, name)?;
            continue;
        }
        created.push(create_klipper_instance(im, name, plan.example_cfg)?);
        if created.len() == plan.install_count {
            break;
        }
    }
    im.daemon_reload()?;
    Ok(created)
}

/// Interactive Klipper install: naming, prerequisites on first install, instance creation
/// and the serial-port checks.
pub fn install_klipper(
    im: &mut dyn InstanceManager,
    services: &dyn ServiceControl,
    settings: &Settings,
    prompter: &mut dyn Prompter,
) -> Result<Answer<()>> {
    let plan = answer!(plan_klipper_install(im, prompter)?);

    if im.instances(Component::Klipper)?.is_empty() {
        let paths = im.paths().clone();
        answer!(setup_klipper_prerequisites(&paths, settings, prompter)?);
    }
    let created = apply_klipper_install(im, &plan)?;
    info!("{} Klipper instance(s) created.", created.len());

    let user = im.paths().user.clone();
    answer!(sys::check_user_groups(&user, prompter)?);
    sys::handle_disruptive_system_packages(services);
    Ok(Answer::Value(()))
}

/// Clone the repository, install system packages and set up the virtualenv.
pub fn setup_klipper_prerequisites(
    paths: &Paths,
    settings: &Settings,
    prompter: &mut dyn Prompter,
) -> Result<Answer<()>> {
    sys::update_system_package_lists(false, false)?;
    sys::install_system_packages(&sys::check_package_install(&["git".to_string()]))?;

    let repo = settings.repo(Component::Klipper);
    git::clone_or_update(&repo.url, &repo.branch, &paths.klipper_dir)?;

    info!("Installing dependencies ...");
    let packages = sys::parse_packages_from_file(
        &paths.klipper_dir.join("scripts").join("install-debian.sh"),
    )?;
    sys::install_system_packages(&sys::check_package_install(&packages))?;

    answer!(sys::create_python_venv(&paths.klipper_env_dir, prompter)?);
    sys::install_python_requirements(
        &paths.klipper_env_dir,
        &paths
            .klipper_dir
            .join("scripts")
            .join("klippy-requirements.txt"),
    )?;
    Ok(Answer::Value(()))
}

/// Create, optionally seed with an example config, enable and start one instance.
pub fn create_klipper_instance(
    im: &mut dyn InstanceManager,
    name: &str,
    example_cfg: bool,
) -> Result<Instance> {
    let instance = im.instance(Component::Klipper, name);
    im.create(&instance)?;
    if example_cfg {
        let home = im.paths().home.clone();
        let sections: Vec<&str> = CLIENT_CONFIGS
            .iter()
            .filter(|(dir, _)| home.join(dir).is_dir())
            .map(|(_, section)| *section)
            .collect();
        create_example_printer_cfg(&instance, &sections)?;
    }
    im.enable(&instance)?;
    im.start(&instance)?;
    Ok(instance)
}

/// Write the example `printer.cfg` unless the instance already has one.
pub fn create_example_printer_cfg(instance: &Instance, client_sections: &[&str]) -> Result<()> {
    let target = instance.cfg_file();
    info!("Creating example printer.cfg in '{}'", instance.cfg_dir().display());
    if target.is_file() {
        info!("'{}' already exists.", target.display());
        return Ok(());
    }
    fs::create_dir_all(instance.cfg_dir()).map_err(|e| {
        Error::io(format!("unable to create {}", instance.cfg_dir().display()), e)
    })?;

    let mut cfg = ConfigFile::parse(&target, EXAMPLE_PRINTER_CFG);
    cfg.set_value(
        "virtual_sdcard",
        "path",
        &instance.gcodes_dir().to_string_lossy(),
    );
    for section in client_sections {
        cfg.add_section(section);
    }
    cfg.write()?;
    info!("Example printer.cfg created in '{}'", instance.cfg_dir().display());
    Ok(())
}

/// Stop every instance, pull the repository, refresh requirements and start them again.
pub fn update_klipper(im: &mut dyn InstanceManager, settings: &Settings) -> Result<()> {
    let paths = im.paths().clone();
    if !paths.klipper_dir.is_dir() {
        return Err(Error::MissingPrerequisite("Klipper is not installed".into()));
    }
    if settings.backup_before_update {
        backup_klipper_dir(&paths)?;
    }

    let instances = im.instances(Component::Klipper)?;
    for instance in &instances {
        im.stop(instance)?;
    }
    git::pull(&paths.klipper_dir)?;
    sys::install_python_requirements(
        &paths.klipper_env_dir,
        &paths
            .klipper_dir
            .join("scripts")
            .join("klippy-requirements.txt"),
    )?;
    for instance in &instances {
        im.start(instance)?;
    }
    Ok(())
}

/// Back up the repository and the virtualenv below `<backup root>/klipper`.
pub fn backup_klipper_dir(paths: &Paths) -> Result<()> {
    let bm = BackupManager::new(&paths.backup_root);
    let target = paths.backup_root.join("klipper");
    if bm
        .backup_directory("klipper", &paths.klipper_dir, Some(&target))?
        .is_none()
    {
        warn!("Nothing to back up at {}", paths.klipper_dir.display());
    }
    bm.backup_directory("klippy-env", &paths.klipper_env_dir, Some(&target))?;
    Ok(())
}

pub(crate) fn service_names(instances: &[Instance]) -> String {
    instances
        .iter()
        .map(Instance::service_name)
        .collect::<Vec<_>>()
        .join(", ")
}
