use serde::Serialize;

use crate::error::Result;
use crate::git;
use crate::instance::Component;
use crate::instance_manager::InstanceManager;
use crate::paths::Paths;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    Installed,
    Incomplete,
    NotInstalled,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ComponentStatus {
    pub component: Component,
    pub status: InstallStatus,
    pub instances: usize,
    pub repo: String,
    pub local: String,
    pub remote: String,
}

pub fn install_status(repo_exists: bool, env_exists: bool, instances: usize) -> InstallStatus {
    match (repo_exists, env_exists, instances > 0) {
        (true, true, true) => InstallStatus::Installed,
        (false, false, false) => InstallStatus::NotInstalled,
        _ => InstallStatus::Incomplete,
    }
}

/// Installation state of `component`. Looking up the remote commit fetches from origin.
pub fn component_status(
    paths: &Paths,
    im: &dyn InstanceManager,
    component: Component,
) -> Result<ComponentStatus> {
    let repo_dir = component.repo_dir(paths);
    let instances = im.instances(component)?.len();
    Ok(ComponentStatus {
        component,
        status: install_status(repo_dir.is_dir(), component.env_dir(paths).is_dir(), instances),
        instances,
        repo: git::repo_name(&repo_dir),
        local: git::local_commit(&repo_dir),
        remote: git::remote_commit(&repo_dir),
    })
}
