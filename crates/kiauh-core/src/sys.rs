//! Blocking wrappers around the OS tools an install needs: apt, python venvs, pip,
//! user groups.

use std::fs;
use std::net::UdpSocket;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, SystemTime};

use log::{error, info, warn};

use crate::answer;
use crate::cmd;
use crate::error::{Error, Result};
use crate::input::{Answer, Prompter};
use crate::service::{ServiceAction, ServiceControl};

const APT_CACHE_FILES: [&str; 2] = [
    "/var/lib/apt/periodic/update-success-stamp",
    "/var/lib/apt/lists",
];
const APT_UPDATE_INTERVAL: Duration = Duration::from_secs(6 * 3600);

/// Services known to grab serial ports that Klipper needs.
const DISRUPTIVE_SERVICES: [&str; 3] = ["brltty", "brltty-udev", "ModemManager"];

// --- Python ---

/// `python3 --version` is at least `major.minor`.
pub fn check_python_version(major: u32, minor: u32) -> Result<bool> {
    let python = which::which("python3")
        .map_err(|_| Error::MissingPrerequisite("python3 not found in PATH".into()))?;
    let output = cmd::run(Command::new(python).arg("--version"))?;
    // older interpreters print the version to stderr
    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).to_string()
    };
    let Some((found_major, found_minor)) = parse_python_version(&text) else {
        return Err(Error::Unsupported(format!("unrecognized python version: {}", text.trim())));
    };
    if (found_major, found_minor) < (major, minor) {
        error!("Versioncheck failed!");
        error!("Python {major}.{minor} or newer required.");
        return Ok(false);
    }
    Ok(true)
}

fn parse_python_version(text: &str) -> Option<(u32, u32)> {
    let version = text.trim().strip_prefix("Python ")?;
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

/// Create a virtualenv at `target`; an existing one is only re-created when confirmed.
pub fn create_python_venv(target: &Path, prompter: &mut dyn Prompter) -> Result<Answer<()>> {
    info!("Set up Python virtual environment ...");
    if target.exists() {
        let recreate = answer!(prompter.confirm("Virtualenv already exists. Re-create?", false)?);
        if !recreate {
            info!("Skipping re-creation of virtualenv ...");
            return Ok(Answer::Value(()));
        }
        fs::remove_dir_all(target).map_err(|e| {
            error!("Error removing existing virtualenv: {e}");
            Error::io(format!("unable to remove {}", target.display()), e)
        })?;
    }
    cmd::run(Command::new("python3").args(["-m", "venv"]).arg(target)).inspect_err(|e| {
        error!("Error setting up virtualenv:\n{e}");
    })?;
    info!("Setup of virtualenv successful!");
    Ok(Answer::Value(()))
}

pub fn update_python_pip(target: &Path) -> Result<()> {
    info!("Updating pip ...");
    let pip = target.join("bin").join("pip");
    if !pip.is_file() {
        error!("Error updating pip! Not found.");
        return Err(Error::MissingPrerequisite(format!("{} not found", pip.display())));
    }
    cmd::run(Command::new(&pip).args(["install", "-U", "pip"])).inspect_err(|_| {
        error!("Updating pip failed!");
    })?;
    info!("Updating pip successful!");
    Ok(())
}

/// Install a requirements file into the virtualenv at `target` (pip is updated first).
pub fn install_python_requirements(target: &Path, requirements: &Path) -> Result<()> {
    update_python_pip(target)?;
    info!("Installing Python requirements ...");
    cmd::run(
        Command::new(target.join("bin").join("pip"))
            .args(["install", "-r"])
            .arg(requirements),
    )
    .inspect_err(|_| error!("Installing Python requirements failed!"))?;
    info!("Installing Python requirements successful!");
    Ok(())
}

// --- System packages ---

/// Refresh apt package lists unless they were refreshed within the last six hours.
pub fn update_system_package_lists(silent: bool, rls_info_change: bool) -> Result<()> {
    let newest = APT_CACHE_FILES
        .iter()
        .filter_map(|p| fs::metadata(p).ok()?.modified().ok())
        .max();
    if let Some(mtime) = newest {
        let age = SystemTime::now().duration_since(mtime).unwrap_or_default();
        if age <= APT_UPDATE_INTERVAL {
            return Ok(());
        }
    }
    if !silent {
        info!("Updating package list...");
    }
    let mut command = Command::new("sudo");
    command.args(["apt-get", "update"]);
    if rls_info_change {
        command.arg("--allow-releaseinfo-change");
    }
    cmd::run(&mut command).inspect_err(|_| error!("Updating system package list failed!"))?;
    info!("System package list update successful!");
    Ok(())
}

/// Packages from `packages` that dpkg does not report as installed.
pub fn check_package_install(packages: &[String]) -> Vec<String> {
    packages
        .iter()
        .filter(|pkg| {
            let status = cmd::query(Command::new("dpkg-query").args([
                "-f'${Status}'",
                "--show",
                pkg.as_str(),
            ]))
            .unwrap_or_default();
            !status.trim_matches('\'').split_whitespace().any(|w| w == "installed")
        })
        .cloned()
        .collect()
}

pub fn install_system_packages(packages: &[String]) -> Result<()> {
    if packages.is_empty() {
        return Ok(());
    }
    cmd::run(Command::new("sudo").args(["apt-get", "install", "-y"]).args(packages))
        .inspect_err(|e| error!("Error installing packages:\n{e}"))?;
    info!("Packages installed successfully.");
    Ok(())
}

/// Package names from `PKGLIST="..."` lines of a shell install script.
pub fn parse_packages_from_file(source: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(source)
        .map_err(|e| Error::io(format!("unable to read {}", source.display()), e))?;
    Ok(parse_pkglist(&raw))
}

fn parse_pkglist(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("PKGLIST="))
        .flat_map(|rest| {
            rest.replace('"', "")
                .replace("${PKGLIST}", "")
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

// --- Network ---

/// IPv4 address of the interface that routes outward, `127.0.0.1` if there is none.
pub fn get_ipv4_addr() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|s| {
            // nothing is sent; connecting only selects the outgoing interface
            s.connect("192.255.255.255:1")?;
            s.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

// --- Users and services ---

/// Make sure the current user is in the `tty` and `dialout` groups.
pub fn check_user_groups(user: &str, prompter: &mut dyn Prompter) -> Result<Answer<()>> {
    let groups = cmd::query(Command::new("id").arg("-Gn")).unwrap_or_default();
    let missing: Vec<&str> = ["tty", "dialout"]
        .into_iter()
        .filter(|g| !groups.split_whitespace().any(|have| have == *g))
        .collect();
    if missing.is_empty() {
        return Ok(Answer::Value(()));
    }

    warn!(
        "The current user is not in group(s): {}. Klipper needs them to access serial devices.",
        missing.join(", ")
    );
    let add = answer!(prompter.confirm(&format!("Add user '{user}' to group(s) now?"), true)?);
    if !add {
        warn!("Skipped adding user to required groups. You might encounter issues.");
        return Ok(Answer::Value(()));
    }
    for group in missing {
        info!("Adding user '{user}' to group {group} ...");
        cmd::run(Command::new("sudo").args(["usermod", "-a", "-G", group, user]))
            .inspect_err(|e| error!("Unable to add user to usergroups: {e}"))?;
        info!("Group {group} assigned to user '{user}'.");
    }
    warn!("Remember to relog/restart this machine for the group(s) to be applied!");
    Ok(Answer::Value(()))
}

/// Mask enabled services that interfere with serial devices. Failures are reported, not
/// propagated.
pub fn handle_disruptive_system_packages(services: &dyn ServiceControl) {
    for service in DISRUPTIVE_SERVICES {
        if !services.is_enabled(service) {
            continue;
        }
        info!("{service} service detected! Masking {service} service ...");
        match services.control(service, ServiceAction::Mask) {
            Ok(()) => info!("{service} service masked!"),
            Err(e) => warn!(
                "Unable to mask the {service} system service ({e}). Please fix the problem \
                 manually. Otherwise, this may have undesirable effects on the operation \
                 of Klipper."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pkglist_lines() {
        let script = r#"
install_packages()
{
    PKGLIST="virtualenv python3-dev libffi-dev"
    PKGLIST="${PKGLIST} libncurses-dev"
    # comment PKGLIST="ignored"
}
"#;
        assert_eq!(
            parse_pkglist(script),
            vec!["virtualenv", "python3-dev", "libffi-dev", "libncurses-dev"]
        );
    }

    #[test]
    fn parses_python_versions() {
        assert_eq!(parse_python_version("Python 3.11.2\n"), Some((3, 11)));
        assert_eq!(parse_python_version("Python 3.8"), Some((3, 8)));
        assert_eq!(parse_python_version("pypy"), None);
    }

    #[test]
    fn finds_an_ipv4_address() {
        let addr = get_ipv4_addr();
        assert!(addr.parse::<std::net::Ipv4Addr>().is_ok(), "{addr}");
    }
}
