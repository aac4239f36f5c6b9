//! Core of the Klipper installation helper: the instance model, naming and
//! single-to-multi conversion, and the install, update, backup and removal flows built on
//! top of systemd, apt, pip and git.

pub mod backup;
mod cmd;
pub mod config_file;
pub mod conversion;
pub mod error;
pub mod firmware;
pub mod git;
pub mod input;
pub mod instance;
pub mod instance_manager;
pub mod klipper;
pub mod message;
pub mod moonraker;
pub mod naming;
pub mod paths;
pub mod remove;
pub mod service;
pub mod settings;
pub mod spinner;
pub mod status;
pub mod sys;

pub use error::{Error, Result};
pub use input::{Answer, Prompter};
pub use instance::{Component, Instance};
pub use instance_manager::{InstanceManager, SystemdInstanceManager};
pub use message::{Color, Message};
pub use naming::{NameDict, NameScheme};
pub use paths::Paths;
pub use service::{ServiceAction, ServiceControl, Systemctl};
pub use settings::Settings;
