#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use kiauh_core::{Paths, Result, ServiceAction, ServiceControl};

/// Records every systemctl call instead of running it.
#[derive(Debug, Default)]
pub struct RecordingServices {
    pub calls: RefCell<Vec<String>>,
}

impl RecordingServices {
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl ServiceControl for RecordingServices {
    fn control(&self, name: &str, action: ServiceAction) -> Result<()> {
        self.calls.borrow_mut().push(format!("{action} {name}"));
        Ok(())
    }

    fn daemon_reload(&self) -> Result<()> {
        self.calls.borrow_mut().push("daemon-reload".to_string());
        Ok(())
    }

    fn is_enabled(&self, _name: &str) -> bool {
        false
    }
}

/// Paths below `home` with the systemd dir already in place.
pub fn scratch_paths(home: &Path) -> Paths {
    let paths = Paths::from_home(home, "pi");
    fs::create_dir_all(&paths.systemd_dir).unwrap();
    paths
}

pub fn unit_names(paths: &Paths) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(&paths.systemd_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
