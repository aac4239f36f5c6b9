use std::fmt;
use std::process::Command;

use log::info;

use crate::cmd;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Reload,
    Enable,
    Disable,
    Mask,
    Unmask,
}

impl ServiceAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
            ServiceAction::Reload => "reload",
            ServiceAction::Enable => "enable",
            ServiceAction::Disable => "disable",
            ServiceAction::Mask => "mask",
            ServiceAction::Unmask => "unmask",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control over system services by name.
pub trait ServiceControl {
    fn control(&self, name: &str, action: ServiceAction) -> Result<()>;
    fn daemon_reload(&self) -> Result<()>;
    fn is_enabled(&self, name: &str) -> bool;
}

/// `sudo systemctl`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Systemctl;

impl ServiceControl for Systemctl {
    fn control(&self, name: &str, action: ServiceAction) -> Result<()> {
        info!("{} {name} ...", capitalize(action.as_str()));
        cmd::run(Command::new("sudo").args(["systemctl", action.as_str(), name]))?;
        info!("OK!");
        Ok(())
    }

    fn daemon_reload(&self) -> Result<()> {
        cmd::run(Command::new("sudo").args(["systemctl", "daemon-reload"]))?;
        Ok(())
    }

    fn is_enabled(&self, name: &str) -> bool {
        // `is-enabled` exits non-zero for disabled units, so only look at stdout
        Command::new("systemctl")
            .args(["is-enabled", name])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).trim() == "enabled")
            .unwrap_or(false)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
