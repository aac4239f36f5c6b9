use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::paths::Paths;

// --- Components ---

/// The two instance families managed side by side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Klipper,
    Moonraker,
}

impl Component {
    pub const ALL: [Component; 2] = [Component::Klipper, Component::Moonraker];

    /// Base name of the systemd unit (`klipper`, `moonraker`).
    pub fn service_base(self) -> &'static str {
        match self {
            Component::Klipper => "klipper",
            Component::Moonraker => "moonraker",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Component::Klipper => "Klipper",
            Component::Moonraker => "Moonraker",
        }
    }

    /// Names an instance of this component may never take.
    pub fn blacklist(self) -> &'static [&'static str] {
        match self {
            Component::Klipper => &["None", "mcu"],
            // moonraker-obico ships its own unit that must not be mistaken for an instance
            Component::Moonraker => &["None", "mcu", "obico"],
        }
    }

    /// The family whose names must stay aligned with this one.
    pub fn other(self) -> Component {
        match self {
            Component::Klipper => Component::Moonraker,
            Component::Moonraker => Component::Klipper,
        }
    }

    pub fn cfg_file_name(self) -> &'static str {
        match self {
            Component::Klipper => "printer.cfg",
            Component::Moonraker => "moonraker.conf",
        }
    }

    pub fn log_file_name(self) -> &'static str {
        match self {
            Component::Klipper => "klippy.log",
            Component::Moonraker => "moonraker.log",
        }
    }

    pub fn env_file_name(self) -> &'static str {
        match self {
            Component::Klipper => "klipper.env",
            Component::Moonraker => "moonraker.env",
        }
    }

    pub fn repo_dir(self, paths: &Paths) -> PathBuf {
        match self {
            Component::Klipper => paths.klipper_dir.clone(),
            Component::Moonraker => paths.moonraker_dir.clone(),
        }
    }

    pub fn env_dir(self, paths: &Paths) -> PathBuf {
        match self {
            Component::Klipper => paths.klipper_env_dir.clone(),
            Component::Moonraker => paths.moonraker_env_dir.clone(),
        }
    }

    /// Parse an instance suffix out of a unit file name.
    ///
    /// `klipper.service` yields `""`, `klipper-2.service` yields `"2"`. Foreign units and
    /// blacklisted suffixes (e.g. `moonraker-obico.service`) yield `None`.
    pub fn suffix_from_unit(self, file_name: &str) -> Option<String> {
        let stem = file_name.strip_suffix(".service")?;
        let rest = stem.strip_prefix(self.service_base())?;
        if rest.is_empty() {
            return Some(String::new());
        }
        let suffix = rest.strip_prefix('-')?;
        if !is_valid_name(suffix) || self.blacklist().contains(&suffix) {
            return None;
        }
        Some(suffix.to_string())
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Instance names are restricted to what the unit-file pattern can carry.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn is_index_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_digit())
}

// --- Instances ---

/// One configured copy of a component. Every path is derived from the suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub component: Component,
    pub suffix: String,
    pub data_dir: PathBuf,
    pub unit_file: PathBuf,
}

impl Instance {
    pub fn new(component: Component, suffix: &str, paths: &Paths) -> Self {
        let service_name = service_name(component, suffix);
        Self {
            component,
            suffix: suffix.to_string(),
            data_dir: paths.home.join(format!("{}_data", data_dir_name(suffix))),
            unit_file: paths.systemd_dir.join(format!("{service_name}.service")),
        }
    }

    pub fn is_single(&self) -> bool {
        self.suffix.is_empty()
    }

    pub fn service_name(&self) -> String {
        service_name(self.component, &self.suffix)
    }

    pub fn cfg_dir(&self) -> PathBuf {
        self.data_dir.join("config")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn comms_dir(&self) -> PathBuf {
        self.data_dir.join("comms")
    }

    /// Holds the env file the unit reads its arguments from.
    pub fn sysd_dir(&self) -> PathBuf {
        self.data_dir.join("systemd")
    }

    pub fn gcodes_dir(&self) -> PathBuf {
        self.data_dir.join("gcodes")
    }

    pub fn cfg_file(&self) -> PathBuf {
        self.cfg_dir().join(self.component.cfg_file_name())
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir().join(self.component.log_file_name())
    }

    pub fn env_file(&self) -> PathBuf {
        self.sysd_dir().join(self.component.env_file_name())
    }

    pub fn klippy_socket(&self) -> PathBuf {
        self.comms_dir().join("klippy.sock")
    }

    pub fn klippy_serial(&self) -> PathBuf {
        self.comms_dir().join("klippy.serial")
    }

    pub fn data_subdirs(&self) -> [PathBuf; 5] {
        [
            self.cfg_dir(),
            self.log_dir(),
            self.comms_dir(),
            self.sysd_dir(),
            self.gcodes_dir(),
        ]
    }
}

fn service_name(component: Component, suffix: &str) -> String {
    if suffix.is_empty() {
        component.service_base().to_string()
    } else {
        format!("{}-{}", component.service_base(), suffix)
    }
}

/// `printer` for the single install, `printer_<n>` for indexed names, the name itself otherwise.
fn data_dir_name(suffix: &str) -> String {
    if suffix.is_empty() {
        "printer".to_string()
    } else if is_index_name(suffix) {
        format!("printer_{suffix}")
    } else {
        suffix.to_string()
    }
}

/// Unsuffixed first, then indexed names numerically, then custom names alphabetically.
pub fn compare_suffixes(a: &str, b: &str) -> Ordering {
    let rank = |s: &str| {
        if s.is_empty() {
            0
        } else if is_index_name(s) {
            1
        } else {
            2
        }
    };
    rank(a).cmp(&rank(b)).then_with(|| {
        if is_index_name(a) && is_index_name(b) {
            a.len().cmp(&b.len()).then_with(|| a.cmp(b))
        } else {
            a.cmp(b)
        }
    })
}

pub fn suffixes(instances: &[Instance]) -> Vec<&str> {
    instances.iter().map(|i| i.suffix.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn paths() -> Paths {
        Paths::from_home(Path::new("/home/pi"), "pi")
    }

    #[test]
    fn derives_paths_from_suffix() {
        let p = paths();
        assert_eq!(
            Instance::new(Component::Klipper, "", &p).data_dir,
            PathBuf::from("/home/pi/printer_data")
        );
        assert_eq!(
            Instance::new(Component::Klipper, "2", &p).data_dir,
            PathBuf::from("/home/pi/printer_2_data")
        );
        let foo = Instance::new(Component::Moonraker, "foo", &p);
        assert_eq!(foo.data_dir, PathBuf::from("/home/pi/foo_data"));
        assert_eq!(foo.service_name(), "moonraker-foo");
        assert_eq!(foo.cfg_file(), PathBuf::from("/home/pi/foo_data/config/moonraker.conf"));
        assert_eq!(
            foo.env_file(),
            PathBuf::from("/home/pi/foo_data/systemd/moonraker.env")
        );
    }

    #[test]
    fn parses_unit_file_names() {
        let k = Component::Klipper;
        assert_eq!(k.suffix_from_unit("klipper.service").as_deref(), Some(""));
        assert_eq!(k.suffix_from_unit("klipper-3.service").as_deref(), Some("3"));
        assert_eq!(k.suffix_from_unit("klipper-voron.service").as_deref(), Some("voron"));
        assert_eq!(k.suffix_from_unit("klipper_mcu.service"), None);
        assert_eq!(k.suffix_from_unit("klipper-mcu.service"), None);
        assert_eq!(k.suffix_from_unit("klipperscreen.service"), None);
        assert_eq!(
            Component::Moonraker.suffix_from_unit("moonraker-obico.service"),
            None
        );
    }

    #[test]
    fn orders_suffixes() {
        let mut names = vec!["b", "10", "", "2", "a"];
        names.sort_by(|a, b| compare_suffixes(a, b));
        assert_eq!(names, vec!["", "2", "10", "a", "b"]);
    }
}
