//! Removal of instances, repositories and virtualenvs.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

use log::{error, info, warn};

use crate::cmd;
use crate::error::{Error, Result};
use crate::input::{select_instances, Answer, Prompter};
use crate::instance::{Component, Instance};
use crate::instance_manager::{unit_file_exists, InstanceManager};
use crate::message::{Color, Message};

/// What to take away besides the selected instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalOptions {
    pub remove_service: bool,
    pub remove_dir: bool,
    pub remove_env: bool,
    /// Moonraker only.
    pub remove_polkit: bool,
}

pub fn run_klipper_removal(
    im: &mut dyn InstanceManager,
    prompter: &mut dyn Prompter,
    remove_service: bool,
    remove_dir: bool,
    remove_env: bool,
) -> Result<Message> {
    run_removal(
        im,
        prompter,
        Component::Klipper,
        RemovalOptions {
            remove_service,
            remove_dir,
            remove_env,
            remove_polkit: false,
        },
    )
}

pub fn run_moonraker_removal(
    im: &mut dyn InstanceManager,
    prompter: &mut dyn Prompter,
    remove_service: bool,
    remove_dir: bool,
    remove_env: bool,
    remove_polkit: bool,
) -> Result<Message> {
    run_removal(
        im,
        prompter,
        Component::Moonraker,
        RemovalOptions {
            remove_service,
            remove_dir,
            remove_env,
            remove_polkit,
        },
    )
}

/// Remove instances of `component`, then its repository, virtualenv and polkit rules when
/// no unit of the component is left.
pub fn run_removal(
    im: &mut dyn InstanceManager,
    prompter: &mut dyn Prompter,
    component: Component,
    opts: RemovalOptions,
) -> Result<Message> {
    let name = component.display_name();
    let mut msg = Message::new(format!("{name} Removal Process completed"), Color::Green);

    if opts.remove_service {
        info!("Removing {name} instances ...");
        let instances = im.instances(component)?;
        if instances.is_empty() {
            info!("No {name} Services installed! Skipped ...");
        } else {
            let question = format!("Select {name} instance to remove");
            if let Answer::Value(selected) = select_instances(prompter, &question, &instances)? {
                remove_instances(im, &selected)?;
                let names: Vec<String> = selected.iter().map(Instance::service_name).collect();
                msg.push(format!("● {name} instances removed: {}", names.join(", ")));
            }
        }
    }

    let paths = im.paths().clone();
    let repo_dir = component.repo_dir(&paths);
    let env_dir = component.env_dir(&paths);
    let polkit = opts.remove_polkit && component == Component::Moonraker;
    let delete_remaining = polkit || opts.remove_dir || opts.remove_env;

    if delete_remaining && unit_file_exists(&paths, component) {
        msg.push("");
        msg.push(format!("Some {name} services are still installed:"));
        if polkit {
            msg.push(format!("● {name} PolicyKit rules were not removed."));
        }
        msg.push(format!("● '{}' was not removed.", repo_dir.display()));
        msg.push(format!("● '{}' was not removed.", env_dir.display()));
    } else {
        if polkit {
            info!("Removing all {name} policykit rules ...");
            if remove_polkit_rules(&repo_dir) {
                msg.push(format!("● {name} PolicyKit rules removed"));
            }
        }
        if opts.remove_dir {
            info!("Removing {name} local repository ...");
            if remove_path(&repo_dir)? {
                msg.push(format!("● {name} local repository removed"));
            }
        }
        if opts.remove_env {
            info!("Removing {name} Python environment ...");
            if remove_path(&env_dir)? {
                msg.push(format!("● {name} Python environment removed"));
            }
        }
    }

    if msg.is_empty() {
        msg.color = Color::Yellow;
        msg.centered = true;
        msg.push("Nothing to remove.");
    } else {
        msg.text.insert(0, "The following actions were performed:".to_string());
    }
    Ok(msg)
}

/// Remove each instance's service and its env file. The data directory stays.
pub fn remove_instances(im: &mut dyn InstanceManager, instances: &[Instance]) -> Result<()> {
    if instances.is_empty() {
        info!("No instances found. Skipped ...");
        return Ok(());
    }
    for instance in instances {
        info!("Removing instance {} ...", instance.service_name());
        im.remove(instance)?;
        let env_file = instance.env_file();
        info!("Remove '{}'", env_file.display());
        if !env_file.exists() {
            info!("Env file in {} not found. Skipped ...", instance.sysd_dir().display());
            continue;
        }
        remove_path(&env_file)?;
    }
    Ok(())
}

fn remove_polkit_rules(moonraker_dir: &Path) -> bool {
    if !moonraker_dir.exists() {
        warn!("Cannot remove policykit rules. Moonraker directory not found.");
        return false;
    }
    let script = moonraker_dir.join("scripts").join("set-policykit-rules.sh");
    match cmd::run(Command::new(script).arg("--clear")) {
        Ok(_) => {
            info!("Policykit rules successfully removed!");
            true
        }
        Err(e) => {
            error!("Error while removing policykit rules: {e}");
            false
        }
    }
}

/// Delete a file or directory tree, escalating with `sudo` when permissions require it.
/// Returns whether something was removed.
pub fn remove_path(path: &Path) -> Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("'{}' does not exist. Skipped ...", path.display());
            return Ok(false);
        }
        Err(e) => return Err(Error::io(format!("unable to stat {}", path.display()), e)),
    };
    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match removed {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            cmd::run(Command::new("sudo").args(["rm", "-rf"]).arg(path))?;
        }
        Err(e) => return Err(Error::io(format!("unable to remove {}", path.display()), e)),
    }
    info!("Successfully removed '{}'", path.display());
    Ok(true)
}
