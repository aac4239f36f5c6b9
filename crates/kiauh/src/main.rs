mod app;
mod menu;
mod prompt;

use std::io::Write;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use env_logger::Env;
use kiauh_core::settings::read_settings;
use kiauh_core::{sys, Component, Paths, Settings};
use log::{warn, Level};

use crate::app::App;

#[derive(Parser)]
#[command(name = "kiauh", version, about = "Klipper Installation And Update Helper")]
struct Cli {
    /// Show debug output, including the output of every command run
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show installation state, instances and commits
    Status {
        #[arg(long)]
        json: bool,
    },
    Install { component: ComponentArg },
    Update { component: ComponentArg },
    Remove { component: ComponentArg },
    Backup { component: ComponentArg },
    /// Build MCU firmware from the Klipper checkout
    BuildFirmware,
    /// Show and edit persisted settings
    Settings,
}

#[derive(Clone, Copy, ValueEnum)]
enum ComponentArg {
    Klipper,
    Moonraker,
}

impl From<ComponentArg> for Component {
    fn from(arg: ComponentArg) -> Self {
        match arg {
            ComponentArg::Klipper => Component::Klipper,
            ComponentArg::Moonraker => Component::Moonraker,
        }
    }
}

fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            let tag = match record.level() {
                Level::Error => "[ERROR]".red().bold(),
                Level::Warn => "[WARN]".yellow().bold(),
                Level::Info => "###".green(),
                Level::Debug | Level::Trace => "[DEBUG]".dimmed(),
            };
            writeln!(buf, "{tag} {}", record.args())
        })
        .init();
}

fn fatal(message: &str) -> ! {
    eprintln!("{} {}", "[ERROR]".red().bold(), message.red());
    std::process::exit(1);
}

#[cfg(unix)]
fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    if is_root() {
        fatal("Running as root is not allowed! Run kiauh as a regular user with sudo rights.");
    }
    match sys::check_python_version(3, 8) {
        Ok(true) => {}
        Ok(false) => fatal("Python 3.8 or newer is required."),
        Err(e) => fatal(&e.to_string()),
    }

    let paths = Paths::detect().unwrap_or_else(|e| fatal(&e.to_string()));
    let settings = read_settings(&paths).unwrap_or_else(|e| {
        warn!("{e}. Using default settings.");
        Settings::default()
    });
    let mut app = App::new(paths, settings);

    let result = match cli.command {
        None => {
            menu::main_menu(&mut app);
            Ok(())
        }
        Some(Commands::Status { json }) => app.status(json),
        Some(Commands::Install { component }) => app.install(component.into()),
        Some(Commands::Update { component }) => app.update(component.into()),
        Some(Commands::Remove { component }) => app.remove(component.into()),
        Some(Commands::Backup { component }) => app.backup(component.into()),
        Some(Commands::BuildFirmware) => app.build_firmware(),
        Some(Commands::Settings) => app.settings_menu(),
    };
    if let Err(e) = result {
        fatal(&e.to_string());
    }
}
