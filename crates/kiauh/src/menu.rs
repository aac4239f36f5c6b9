use colored::Colorize;
use kiauh_core::{Answer, Component, Error, Prompter, Result};
use log::error;

use crate::app::App;

const MAIN_OPTIONS: [&str; 8] = [
    "Install",
    "Update",
    "Remove",
    "Backup",
    "Build firmware",
    "Settings",
    "Status",
    "Quit",
];

/// Interactive main menu. Errors of an action are reported and the menu is shown again.
pub fn main_menu(app: &mut App) {
    let options: Vec<String> = MAIN_OPTIONS.iter().map(|s| s.to_string()).collect();
    loop {
        println!();
        println!("{}", "~~~~~~~~~~~~~~ [ KIAUH ] ~~~~~~~~~~~~~~".cyan().bold());
        println!("{}", "Klipper Installation And Update Helper".cyan());

        let choice = match app.prompter.select("Main menu", &options) {
            Ok(Answer::Value(choice)) => choice,
            Ok(Answer::Back) => break,
            Err(e) => {
                error!("{e}");
                break;
            }
        };
        let result = match choice.as_str() {
            "Install" => with_component(app, "install", App::install),
            "Update" => with_component(app, "update", App::update),
            "Remove" => with_component(app, "remove", App::remove),
            "Backup" => with_component(app, "back up", App::backup),
            "Build firmware" => app.build_firmware(),
            "Settings" => app.settings_menu(),
            "Status" => app.status(false),
            _ => break,
        };
        match result {
            Ok(()) => {}
            Err(Error::Prompt(reason)) if reason == "interrupted" => break,
            Err(e) => error!("{e}"),
        }
    }
    println!("{}", "Happy printing!".green());
}

fn with_component(
    app: &mut App,
    verb: &str,
    action: fn(&mut App, Component) -> Result<()>,
) -> Result<()> {
    let options: Vec<String> = Component::ALL
        .iter()
        .map(|c| c.display_name().to_string())
        .chain(std::iter::once("Back".to_string()))
        .collect();
    let question = format!("What do you want to {verb}?");
    let Answer::Value(choice) = app.prompter.select(&question, &options)? else {
        return Ok(());
    };
    match Component::ALL.into_iter().find(|c| c.display_name() == choice) {
        Some(component) => action(app, component),
        None => Ok(()),
    }
}
