use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const SYSTEMD_DIR: &str = "/etc/systemd/system";

/// Filesystem locations used by every collaborator.
///
/// Built once at startup and handed around by reference; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub home: PathBuf,
    pub user: String,
    pub klipper_dir: PathBuf,
    pub klipper_env_dir: PathBuf,
    pub moonraker_dir: PathBuf,
    pub moonraker_env_dir: PathBuf,
    pub backup_root: PathBuf,
    pub systemd_dir: PathBuf,
    pub settings_file: PathBuf,
}

impl Paths {
    /// Resolve paths for the current user (`$HOME`, `$USER`).
    pub fn detect() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::MissingPrerequisite("unable to resolve home directory".into()))?;
        let user = std::env::var("USER")
            .ok()
            .filter(|u| !u.is_empty())
            .or_else(|| {
                home.file_name()
                    .map(|n| n.to_string_lossy().to_string())
            })
            .ok_or_else(|| Error::MissingPrerequisite("unable to resolve current user".into()))?;
        let mut paths = Self::from_home(&home, &user);
        paths.systemd_dir = PathBuf::from(SYSTEMD_DIR);
        Ok(paths)
    }

    /// Lay out every path below `home`. The systemd dir lands in `home` too,
    /// which keeps scratch installs away from `/etc`.
    pub fn from_home(home: &Path, user: &str) -> Self {
        Self {
            home: home.to_path_buf(),
            user: user.to_string(),
            klipper_dir: home.join("klipper"),
            klipper_env_dir: home.join("klippy-env"),
            moonraker_dir: home.join("moonraker"),
            moonraker_env_dir: home.join("moonraker-env"),
            backup_root: home.join("kiauh-backups"),
            systemd_dir: home.join("systemd"),
            settings_file: home.join(".kiauh").join("kiauh.toml"),
        }
    }
}
