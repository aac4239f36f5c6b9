//! Building MCU firmware from the Klipper checkout.

use std::process::Command;

use log::info;

use crate::cmd;
use crate::error::{Error, Result};
use crate::paths::Paths;
use crate::sys;

pub const BUILD_DEPENDENCIES: [&str; 3] = ["build-essential", "dpkg-dev", "make"];

/// Build dependencies that are not installed yet.
pub fn missing_build_dependencies() -> Vec<String> {
    let deps: Vec<String> = BUILD_DEPENDENCIES.iter().map(|d| d.to_string()).collect();
    sys::check_package_install(&deps)
}

pub fn install_build_dependencies(missing: &[String]) -> Result<()> {
    sys::update_system_package_lists(false, false)?;
    info!("Installing system packages...");
    sys::install_system_packages(missing)
}

/// `make clean`, `make menuconfig` on the operator's terminal, then `make`.
pub fn build_firmware(paths: &Paths) -> Result<()> {
    let dir = &paths.klipper_dir;
    if !dir.is_dir() {
        return Err(Error::MissingPrerequisite(format!(
            "Klipper repository not found at {}",
            dir.display()
        )));
    }
    info!("Cleaning previous build ...");
    cmd::run(Command::new("make").arg("clean").current_dir(dir))?;
    cmd::run_attached(Command::new("make").arg("menuconfig").current_dir(dir))?;
    info!("Building firmware ...");
    cmd::run_attached(Command::new("make").current_dir(dir))?;
    info!("Firmware successfully built!");
    info!("Firmware file located in '{}'!", dir.join("out").display());
    Ok(())
}
