use std::process::{Command, Output, Stdio};

use log::debug;

use crate::error::{Error, Result};

/// Render a command line for logs and error messages.
pub(crate) fn describe(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run to completion with stdout/stderr captured; non-zero exit is an error.
pub(crate) fn run(cmd: &mut Command) -> Result<Output> {
    let line = describe(cmd);
    debug!("running `{line}`");
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::io(format!("failed to spawn `{line}`"), e))?;
    if !output.stdout.is_empty() {
        debug!("{}", String::from_utf8_lossy(&output.stdout).trim_end());
    }
    if !output.status.success() {
        return Err(Error::command(line, output.status, &output.stderr));
    }
    Ok(output)
}

/// Run with the terminal attached (interactive tools such as `make menuconfig`).
pub(crate) fn run_attached(cmd: &mut Command) -> Result<()> {
    let line = describe(cmd);
    debug!("running `{line}` attached");
    let status = cmd
        .status()
        .map_err(|e| Error::io(format!("failed to spawn `{line}`"), e))?;
    if !status.success() {
        return Err(Error::command(line, status, &[]));
    }
    Ok(())
}

/// Run and return trimmed stdout, or `None` when the command fails for any reason.
pub(crate) fn query(cmd: &mut Command) -> Option<String> {
    let output = cmd.stdin(Stdio::null()).stderr(Stdio::null()).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let out = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Some(out)
}
