use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors returned by kiauh-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` failed ({status}){}", stderr_suffix(.stderr))]
    Command {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("invalid config file {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
    #[error("invalid settings: {0}")]
    Settings(String),
    #[error("input aborted: {0}")]
    Prompt(String),
    #[error("{component} is not a single unsuffixed install ({count} instance(s) found)")]
    NotSingleInstance { component: String, count: usize },
    #[error("missing prerequisite: {0}")]
    MissingPrerequisite(String),
    #[error("{0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an `io::Error` with a short description of what was being done.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn command(command: impl Into<String>, status: ExitStatus, stderr: &[u8]) -> Self {
        Error::Command {
            command: command.into(),
            status: status
                .code()
                .map(|c| format!("exit code {c}"))
                .unwrap_or_else(|| "terminated by signal".to_string()),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}
