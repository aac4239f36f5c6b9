//! Turning an unsuffixed single install into the first member of a suffixed family.

use std::fs;

use log::{info, warn};

use crate::config_file::ConfigFile;
use crate::error::{Error, Result};
use crate::instance::{Component, Instance};
use crate::instance_manager::InstanceManager;

/// Replace the single unsuffixed instance of `component` with one named `new_name`,
/// carrying its data directory over.
///
/// Fails with [`Error::NotSingleInstance`] unless the family is exactly one unsuffixed
/// instance. Errors abort the conversion where they happen; nothing is rolled back.
pub fn convert_single_to_multi(
    im: &mut dyn InstanceManager,
    component: Component,
    new_name: &str,
) -> Result<Instance> {
    info!("Convert {component} single to multi instance ...");
    let instances = im.instances(component)?;
    let old = match instances.as_slice() {
        [only] if only.is_single() => only.clone(),
        _ => {
            return Err(Error::NotSingleInstance {
                component: component.display_name().to_string(),
                count: instances.len(),
            })
        }
    };

    let old_data_dir = old.data_dir.clone();
    im.stop(&old)?;
    im.disable(&old)?;
    im.delete(&old)?;

    let new = im.instance(component, new_name);
    info!(
        "Rename '{}' to '{}' ...",
        old_data_dir.display(),
        new.data_dir.display()
    );
    if new.data_dir.exists() {
        warn!("'{}' already exists. Skipped ...", new.data_dir.display());
    } else if old_data_dir.is_dir() {
        fs::rename(&old_data_dir, &new.data_dir).map_err(|e| {
            Error::io(
                format!(
                    "unable to rename '{}' to '{}'",
                    old_data_dir.display(),
                    new.data_dir.display()
                ),
                e,
            )
        })?;
    }

    if component == Component::Moonraker {
        repoint_klippy_socket(&new)?;
    }

    im.create(&new)?;
    im.enable(&new)?;
    im.start(&new)?;
    Ok(new)
}

/// Point `[server] klippy_uds_address` of a Moonraker instance at its own data dir.
fn repoint_klippy_socket(instance: &Instance) -> Result<()> {
    let cfg_file = instance.cfg_file();
    if !cfg_file.is_file() {
        return Ok(());
    }
    let mut cfg = ConfigFile::load(&cfg_file)?;
    cfg.set_value(
        "server",
        "klippy_uds_address",
        &instance.klippy_socket().to_string_lossy(),
    );
    cfg.write()
}

/// Convert Klipper, then Moonraker when it is still a single install, so both families
/// keep matching suffixes.
pub fn handle_to_multi_instance_conversion(
    im: &mut dyn InstanceManager,
    new_name: &str,
) -> Result<()> {
    info!("Converting single instance to multi instances ...");
    convert_single_to_multi(im, Component::Klipper, new_name)?;

    let moonraker = im.instances(Component::Moonraker)?;
    if matches!(moonraker.as_slice(), [only] if only.is_single()) {
        convert_single_to_multi(im, Component::Moonraker, new_name)?;
    } else {
        info!("No single Moonraker instance to convert. Skipped ...");
    }
    Ok(())
}
