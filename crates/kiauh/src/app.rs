use colored::{ColoredString, Colorize};
use kiauh_core::settings::write_settings;
use kiauh_core::spinner::with_spinner;
use kiauh_core::status::{component_status, ComponentStatus, InstallStatus};
use kiauh_core::{
    firmware, klipper, moonraker, remove, Answer, Color, Component, Message,
    Paths, Prompter, Result, Settings, Systemctl, SystemdInstanceManager,
};
use log::info;

use crate::prompt::InquirePrompter;

const BOX_WIDTH: usize = 57;

/// Everything the commands and menus share.
pub struct App {
    pub paths: Paths,
    pub settings: Settings,
    pub prompter: InquirePrompter,
}

impl App {
    pub fn new(paths: Paths, settings: Settings) -> Self {
        Self {
            paths,
            settings,
            prompter: InquirePrompter,
        }
    }

    pub fn install(&mut self, component: Component) -> Result<()> {
        let mut im = SystemdInstanceManager::new(&self.paths, Systemctl);
        let done = match component {
            Component::Klipper => {
                klipper::install_klipper(&mut im, &Systemctl, &self.settings, &mut self.prompter)?
            }
            Component::Moonraker => {
                moonraker::install_moonraker(&mut im, &self.settings, &mut self.prompter)?
            }
        };
        match done {
            Answer::Value(()) => info!("{component} installation complete."),
            Answer::Back => info!("{component} installation aborted."),
        }
        Ok(())
    }

    pub fn update(&mut self, component: Component) -> Result<()> {
        let mut im = SystemdInstanceManager::new(&self.paths, Systemctl);
        match component {
            Component::Klipper => klipper::update_klipper(&mut im, &self.settings)?,
            Component::Moonraker => moonraker::update_moonraker(&mut im, &self.settings)?,
        }
        info!("{component} updated.");
        Ok(())
    }

    pub fn remove(&mut self, component: Component) -> Result<()> {
        let p = &mut self.prompter;
        let Answer::Value(remove_service) = p.confirm("Remove services?", true)? else {
            return Ok(());
        };
        let Answer::Value(remove_dir) = p.confirm("Remove local repository?", true)? else {
            return Ok(());
        };
        let Answer::Value(remove_env) = p.confirm("Remove Python environment?", true)? else {
            return Ok(());
        };

        let mut im = SystemdInstanceManager::new(&self.paths, Systemctl);
        let msg = match component {
            Component::Klipper => {
                remove::run_klipper_removal(&mut im, p, remove_service, remove_dir, remove_env)?
            }
            Component::Moonraker => {
                let Answer::Value(remove_polkit) = p.confirm("Remove PolicyKit rules?", true)?
                else {
                    return Ok(());
                };
                remove::run_moonraker_removal(
                    &mut im,
                    p,
                    remove_service,
                    remove_dir,
                    remove_env,
                    remove_polkit,
                )?
            }
        };
        render_message(&msg);
        Ok(())
    }

    pub fn backup(&mut self, component: Component) -> Result<()> {
        match component {
            Component::Klipper => klipper::backup_klipper_dir(&self.paths)?,
            Component::Moonraker => {
                let im = SystemdInstanceManager::new(&self.paths, Systemctl);
                moonraker::backup_moonraker_dir(&im)?
            }
        }
        info!("Backups stored in '{}'", self.paths.backup_root.display());
        Ok(())
    }

    pub fn build_firmware(&mut self) -> Result<()> {
        let missing = firmware::missing_build_dependencies();
        println!("{}", "The following dependencies are required:".cyan());
        for dep in firmware::BUILD_DEPENDENCIES {
            let state = if missing.iter().any(|m| m == dep) {
                "*MISSING*".red()
            } else {
                "*INSTALLED*".green()
            };
            println!("  {} {state}", format!("● {dep:<20}").cyan());
        }

        if !missing.is_empty() {
            println!("{}", "Dependencies are missing!".red());
            let install = self.prompter.confirm("Install missing dependencies?", true)?;
            if install == Answer::Value(true) {
                firmware::install_build_dependencies(&missing)?;
            }
            return Ok(());
        }
        println!("{}", "All dependencies are met!".green());
        if self.prompter.confirm("Start the build?", true)? == Answer::Value(true) {
            firmware::build_firmware(&self.paths)?;
        }
        Ok(())
    }

    pub fn status(&self, json: bool) -> Result<()> {
        let im = SystemdInstanceManager::new(&self.paths, Systemctl);
        let statuses = with_spinner("Fetching status", || {
            Component::ALL
                .into_iter()
                .map(|c| component_status(&self.paths, &im, c))
                .collect::<Result<Vec<_>>>()
        })?;

        if json {
            match serde_json::to_string_pretty(&statuses) {
                Ok(out) => println!("{out}"),
                Err(e) => return Err(kiauh_core::Error::Unsupported(e.to_string())),
            }
            return Ok(());
        }
        for status in &statuses {
            print_status(status);
        }
        Ok(())
    }

    /// Show and edit the persisted settings until the operator goes back.
    pub fn settings_menu(&mut self) -> Result<()> {
        let options: Vec<String> = [
            "Toggle backup before update",
            "Klipper repository",
            "Moonraker repository",
            "Back",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        loop {
            print_settings(&self.settings);
            let choice = match self.prompter.select("Settings", &options)? {
                Answer::Value(choice) => choice,
                Answer::Back => return Ok(()),
            };
            match choice.as_str() {
                "Toggle backup before update" => {
                    self.settings.backup_before_update = !self.settings.backup_before_update;
                }
                "Klipper repository" => self.edit_repo(Component::Klipper)?,
                "Moonraker repository" => self.edit_repo(Component::Moonraker)?,
                _ => return Ok(()),
            }
            write_settings(&self.paths, &self.settings)?;
            info!("Settings saved to '{}'", self.paths.settings_file.display());
        }
    }

    /// Empty input keeps the current value.
    fn edit_repo(&mut self, component: Component) -> Result<()> {
        let current = self.settings.repo(component).clone();
        let question = format!("{component} repository URL [{}]", current.url);
        let Answer::Value(url) = self.prompter.text(&question)? else {
            return Ok(());
        };
        let question = format!("{component} branch [{}]", current.branch);
        let Answer::Value(branch) = self.prompter.text(&question)? else {
            return Ok(());
        };
        let repo = self.settings.repo_mut(component);
        if !url.trim().is_empty() {
            repo.url = url.trim().to_string();
        }
        if !branch.trim().is_empty() {
            repo.branch = branch.trim().to_string();
        }
        Ok(())
    }
}

fn paint(text: &str, color: Color) -> ColoredString {
    match color {
        Color::Green => text.green(),
        Color::Yellow => text.yellow(),
        Color::Red => text.red(),
    }
}

pub fn render_message(msg: &Message) {
    let inner = BOX_WIDTH - 2;
    println!("{}", paint(&format!("╔{}╗", "═".repeat(BOX_WIDTH)), msg.color));
    println!(
        "{}",
        paint(&format!("║ {:^inner$} ║", msg.title), msg.color).bold()
    );
    println!("{}", paint(&format!("╟{}╢", "─".repeat(BOX_WIDTH)), msg.color));
    for line in &msg.text {
        let text = if msg.centered {
            format!("{line:^inner$}")
        } else {
            format!("{line:<inner$}")
        };
        println!("{} {text} {}", paint("║", msg.color), paint("║", msg.color));
    }
    println!("{}", paint(&format!("╚{}╝", "═".repeat(BOX_WIDTH)), msg.color));
}

fn print_status(status: &ComponentStatus) {
    let state = match status.status {
        InstallStatus::Installed => format!("{:<14}", "Installed").green(),
        InstallStatus::Incomplete => format!("{:<14}", "Incomplete").yellow(),
        InstallStatus::NotInstalled => format!("{:<14}", "Not installed").red(),
    };
    println!(
        "{:<10} {state} instances: {:<3} repo: {:<22} local: {:<9} remote: {}",
        status.component.display_name(),
        status.instances,
        status.repo,
        status.local,
        status.remote
    );
}

fn print_settings(settings: &Settings) {
    let backup = if settings.backup_before_update {
        "enabled".green()
    } else {
        "disabled".red()
    };
    println!("{}", "[ Settings ]".cyan().bold());
    println!("  Backup before update: {backup}");
    for component in Component::ALL {
        let repo = settings.repo(component);
        println!(
            "  {:<10} {} ({})",
            component.display_name(),
            repo.url,
            repo.branch.as_str().cyan()
        );
    }
}
