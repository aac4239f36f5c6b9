use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::Command;

use log::{debug, info};

use crate::cmd;
use crate::error::{Error, Result};
use crate::instance::{compare_suffixes, Component, Instance};
use crate::paths::Paths;
use crate::service::{ServiceAction, ServiceControl};

const KLIPPER_UNIT: &str = include_str!("../assets/klipper.service");
const KLIPPER_ENV: &str = include_str!("../assets/klipper.env");
const MOONRAKER_UNIT: &str = include_str!("../assets/moonraker.service");
const MOONRAKER_ENV: &str = include_str!("../assets/moonraker.env");

/// Lifecycle of component instances. Every operation names its target explicitly.
pub trait InstanceManager {
    fn paths(&self) -> &Paths;

    /// Installed instances of `component`, unsuffixed first, then by name.
    fn instances(&self, component: Component) -> Result<Vec<Instance>>;

    fn create(&mut self, instance: &Instance) -> Result<()>;
    fn delete(&mut self, instance: &Instance) -> Result<()>;
    fn service(&mut self, instance: &Instance, action: ServiceAction) -> Result<()>;
    fn daemon_reload(&mut self) -> Result<()>;

    fn start(&mut self, instance: &Instance) -> Result<()> {
        self.service(instance, ServiceAction::Start)
    }

    fn stop(&mut self, instance: &Instance) -> Result<()> {
        self.service(instance, ServiceAction::Stop)
    }

    fn restart(&mut self, instance: &Instance) -> Result<()> {
        self.service(instance, ServiceAction::Restart)
    }

    fn enable(&mut self, instance: &Instance) -> Result<()> {
        self.service(instance, ServiceAction::Enable)
    }

    fn disable(&mut self, instance: &Instance) -> Result<()> {
        self.service(instance, ServiceAction::Disable)
    }

    /// Stop, disable and delete, then reload the unit definitions.
    fn remove(&mut self, instance: &Instance) -> Result<()> {
        self.stop(instance)?;
        self.disable(instance)?;
        self.delete(instance)?;
        self.daemon_reload()
    }

    fn instance(&self, component: Component, suffix: &str) -> Instance {
        Instance::new(component, suffix, self.paths())
    }
}

/// Instances backed by systemd unit files.
pub struct SystemdInstanceManager<'a, S: ServiceControl> {
    paths: &'a Paths,
    services: S,
}

impl<'a, S: ServiceControl> SystemdInstanceManager<'a, S> {
    pub fn new(paths: &'a Paths, services: S) -> Self {
        Self { paths, services }
    }

    pub fn services(&self) -> &S {
        &self.services
    }
}

impl<S: ServiceControl> InstanceManager for SystemdInstanceManager<'_, S> {
    fn paths(&self) -> &Paths {
        self.paths
    }

    fn instances(&self, component: Component) -> Result<Vec<Instance>> {
        find_instances(self.paths, component)
    }

    fn create(&mut self, instance: &Instance) -> Result<()> {
        info!(
            "Creating {} instance '{}' ...",
            instance.component,
            instance.service_name()
        );
        for dir in instance.data_subdirs() {
            fs::create_dir_all(&dir)
                .map_err(|e| Error::io(format!("unable to create {}", dir.display()), e))?;
        }
        let env = render_env_file(self.paths, instance);
        fs::write(instance.env_file(), env).map_err(|e| {
            Error::io(format!("unable to write {}", instance.env_file().display()), e)
        })?;
        write_privileged(&instance.unit_file, &render_unit_file(self.paths, instance))?;
        info!("Service file created: {}", instance.unit_file.display());
        self.services.daemon_reload()
    }

    fn delete(&mut self, instance: &Instance) -> Result<()> {
        info!("Deleting {} instance: {}", instance.component, instance.service_name());
        remove_privileged(&instance.unit_file)?;
        info!("Service file deleted: {}", instance.unit_file.display());
        Ok(())
    }

    fn service(&mut self, instance: &Instance, action: ServiceAction) -> Result<()> {
        self.services.control(&instance.service_name(), action)
    }

    fn daemon_reload(&mut self) -> Result<()> {
        self.services.daemon_reload()
    }
}

/// Scan the systemd directory for unit files belonging to `component`.
pub fn find_instances(paths: &Paths, component: Component) -> Result<Vec<Instance>> {
    let pattern = format!(
        "{}/{}*.service",
        glob::Pattern::escape(&paths.systemd_dir.to_string_lossy()),
        component.service_base()
    );
    let entries = glob::glob(&pattern)
        .map_err(|e| Error::Unsupported(format!("bad unit file pattern {pattern}: {e}")))?;

    let mut instances: Vec<Instance> = entries
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .filter_map(|path| {
            let file_name = path.file_name()?.to_string_lossy().to_string();
            component.suffix_from_unit(&file_name)
        })
        .map(|suffix| Instance::new(component, &suffix, paths))
        .collect();
    instances.sort_by(|a, b| compare_suffixes(&a.suffix, &b.suffix));
    debug!("found {} {} instance(s)", instances.len(), component);
    Ok(instances)
}

/// Whether any unit of `component` is still installed.
pub fn unit_file_exists(paths: &Paths, component: Component) -> bool {
    find_instances(paths, component)
        .map(|i| !i.is_empty())
        .unwrap_or(false)
}

// --- Templates ---

pub fn render_unit_file(paths: &Paths, instance: &Instance) -> String {
    let component = instance.component;
    let template = match component {
        Component::Klipper => KLIPPER_UNIT,
        Component::Moonraker => MOONRAKER_UNIT,
    };
    template
        .replace("%USER%", &paths.user)
        .replace("%KLIPPER_DIR%", &paths.klipper_dir.to_string_lossy())
        .replace("%MOONRAKER_DIR%", &paths.moonraker_dir.to_string_lossy())
        .replace("%ENV%", &component.env_dir(paths).to_string_lossy())
        .replace("%ENV_FILE%", &instance.env_file().to_string_lossy())
}

pub fn render_env_file(paths: &Paths, instance: &Instance) -> String {
    match instance.component {
        Component::Klipper => KLIPPER_ENV
            .replace("%KLIPPER_DIR%", &paths.klipper_dir.to_string_lossy())
            .replace("%CFG%", &instance.cfg_file().to_string_lossy())
            .replace("%SERIAL%", &instance.klippy_serial().to_string_lossy())
            .replace("%LOG%", &instance.log_file().to_string_lossy())
            .replace("%UDS%", &instance.klippy_socket().to_string_lossy()),
        Component::Moonraker => MOONRAKER_ENV
            .replace("%MOONRAKER_DIR%", &paths.moonraker_dir.to_string_lossy())
            .replace("%PRINTER_DATA%", &instance.data_dir.to_string_lossy()),
    }
}

// --- Privileged file access ---

/// Write `content` to `target`, going through `sudo cp` when the directory is not ours.
fn write_privileged(target: &Path, content: &str) -> Result<()> {
    match fs::write(target, content) {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {}
        Err(e) => return Err(Error::io(format!("unable to write {}", target.display()), e)),
    }
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| Error::io("unable to create temporary file", e))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| Error::io("unable to write temporary file", e))?;
    cmd::run(Command::new("sudo").arg("cp").arg(tmp.path()).arg(target))?;
    cmd::run(Command::new("sudo").args(["chmod", "644"]).arg(target))?;
    Ok(())
}

fn remove_privileged(target: &Path) -> Result<()> {
    match fs::remove_file(target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            cmd::run(Command::new("sudo").args(["rm", "-f"]).arg(target))?;
            Ok(())
        }
        Err(e) => Err(Error::io(format!("unable to remove {}", target.display()), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_klipper_templates() {
        let paths = Paths::from_home(Path::new("/home/pi"), "pi");
        let instance = Instance::new(Component::Klipper, "2", &paths);
        let unit = render_unit_file(&paths, &instance);
        assert!(unit.contains("User=pi"));
        assert!(unit.contains("WorkingDirectory=/home/pi/klipper"));
        assert!(unit.contains("EnvironmentFile=/home/pi/printer_2_data/systemd/klipper.env"));
        assert!(unit.contains("ExecStart=/home/pi/klippy-env/bin/python $KLIPPER_ARGS"));
        assert!(!unit.contains('%'));

        let env = render_env_file(&paths, &instance);
        assert!(env.contains("/home/pi/printer_2_data/config/printer.cfg"));
        assert!(env.contains("-a /home/pi/printer_2_data/comms/klippy.sock"));
    }

    #[test]
    fn renders_moonraker_env() {
        let paths = Paths::from_home(Path::new("/home/pi"), "pi");
        let instance = Instance::new(Component::Moonraker, "", &paths);
        let env = render_env_file(&paths, &instance);
        assert_eq!(
            env.trim(),
            "MOONRAKER_ARGS=\"/home/pi/moonraker/moonraker/moonraker.py -d /home/pi/printer_data\""
        );
    }
}
