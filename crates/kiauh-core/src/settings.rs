use std::fs;

use serde::Serialize;
use toml_edit::{value, DocumentMut, Item, Table};

use crate::error::{Error, Result};
use crate::instance::Component;
use crate::paths::Paths;

pub const DEFAULT_KLIPPER_REPO: &str = "https://github.com/Klipper3d/klipper";
pub const DEFAULT_MOONRAKER_REPO: &str = "https://github.com/Arksine/moonraker";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RepoSettings {
    pub url: String,
    pub branch: String,
}

/// Operator preferences, persisted as TOML.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Settings {
    pub backup_before_update: bool,
    pub klipper: RepoSettings,
    pub moonraker: RepoSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backup_before_update: false,
            klipper: RepoSettings {
                url: DEFAULT_KLIPPER_REPO.to_string(),
                branch: "master".to_string(),
            },
            moonraker: RepoSettings {
                url: DEFAULT_MOONRAKER_REPO.to_string(),
                branch: "master".to_string(),
            },
        }
    }
}

impl Settings {
    pub fn repo(&self, component: Component) -> &RepoSettings {
        match component {
            Component::Klipper => &self.klipper,
            Component::Moonraker => &self.moonraker,
        }
    }

    pub fn repo_mut(&mut self, component: Component) -> &mut RepoSettings {
        match component {
            Component::Klipper => &mut self.klipper,
            Component::Moonraker => &mut self.moonraker,
        }
    }
}

/// Read settings, falling back to defaults for a missing file or missing keys.
pub fn read_settings(paths: &Paths) -> Result<Settings> {
    let path = &paths.settings_file;
    if !path.exists() {
        return Ok(Settings::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::io(format!("unable to read {}", path.display()), e))?;
    let doc: DocumentMut = raw
        .parse()
        .map_err(|e| Error::Settings(format!("{}: {e}", path.display())))?;

    let mut settings = Settings::default();
    if let Some(b) = doc
        .get("kiauh")
        .and_then(|t| t.get("backup_before_update"))
        .and_then(|v| v.as_bool())
    {
        settings.backup_before_update = b;
    }
    for component in Component::ALL {
        let Some(table) = doc.get(component.service_base()) else {
            continue;
        };
        let repo = settings.repo_mut(component);
        if let Some(url) = table.get("repo_url").and_then(|v| v.as_str()) {
            repo.url = url.to_string();
        }
        if let Some(branch) = table.get("branch").and_then(|v| v.as_str()) {
            repo.branch = branch.to_string();
        }
    }
    Ok(settings)
}

/// Write settings, keeping comments and unknown keys of an existing file.
///
/// An existing file that does not parse is left untouched and reported.
pub fn write_settings(paths: &Paths, settings: &Settings) -> Result<()> {
    let path = &paths.settings_file;
    let mut doc: DocumentMut = if path.exists() {
        fs::read_to_string(path)
            .map_err(|e| Error::io(format!("unable to read {}", path.display()), e))?
            .parse()
            .map_err(|e| Error::Settings(format!("{}: {e}", path.display())))?
    } else {
        DocumentMut::new()
    };

    if !doc.contains_table("kiauh") {
        doc["kiauh"] = Item::Table(Table::new());
    }
    doc["kiauh"]["backup_before_update"] = value(settings.backup_before_update);

    for component in Component::ALL {
        let key = component.service_base();
        if !doc.contains_table(key) {
            doc[key] = Item::Table(Table::new());
        }
        let repo = settings.repo(component);
        doc[key]["repo_url"] = value(repo.url.as_str());
        doc[key]["branch"] = value(repo.branch.as_str());
    }

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .map_err(|e| Error::io(format!("unable to create {}", dir.display()), e))?;
    }
    fs::write(path, doc.to_string())
        .map_err(|e| Error::io(format!("unable to write {}", path.display()), e))
}
