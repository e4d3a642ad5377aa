// Standard library
use std::ffi::OsStr;
use std::io::{BufRead, BufReader};

// External crates
use crate::error::{Result, WspError};
use duct::cmd;
use tracing::{debug, info};
use which::which;

fn display_command<A: AsRef<OsStr>>(command: &str, args: &[A]) -> String {
    let mut parts = vec![command.to_string()];
    parts.extend(args.iter().map(|a| a.as_ref().to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Stream command output into the log at info level.
///
/// Output is hidden from the user unless logging is enabled, which keeps
/// `docker compose` chatter out of normal CLI output.
pub fn stream_command<A: AsRef<OsStr>>(command: &str, args: &[A]) -> Result<()> {
    let full_command = display_command(command, args);
    debug!(command = %full_command, "Streaming command");

    let reader = cmd(command, args)
        .stderr_to_stdout()
        .reader()
        .map_err(|e| WspError::Command(format!("Failed to start '{}': {}", full_command, e)))?;

    for line in BufReader::new(reader).lines() {
        let line = line.map_err(|e| WspError::Command(format!("'{}': {}", full_command, e)))?;
        info!("{}", line);
    }
    Ok(())
}

/// Stream command output directly to stdout, bypassing the logging system.
/// Use this for long-running commands where user needs progress feedback.
pub fn stream_command_visible<A: AsRef<OsStr>>(command: &str, args: &[A]) -> Result<()> {
    let full_command = display_command(command, args);
    let reader = cmd(command, args)
        .stderr_to_stdout()
        .reader()
        .map_err(|e| WspError::Command(format!("Failed to start '{}': {}", full_command, e)))?;

    for line in BufReader::new(reader).lines() {
        let line = line.map_err(|e| WspError::Command(format!("'{}': {}", full_command, e)))?;
        println!("{}", line);
    }
    Ok(())
}

/// Run a command to completion and return its trimmed stdout.
pub fn run_command<A: AsRef<OsStr>>(command: &str, args: &[A]) -> Result<String> {
    let full_command = display_command(command, args);
    let output = cmd(command, args)
        .stderr_capture()
        .stdout_capture()
        .unchecked()
        .run()
        .map_err(|e| WspError::Command(format!("Failed to start '{}': {}", full_command, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WspError::Command(format!(
            "'{}' exited with {}: {}",
            full_command,
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Check that a binary is on PATH.
pub fn is_tool_installed(tool: &str) -> bool {
    which(tool).is_ok()
}

/// Check that the docker CLI is installed and the daemon answers.
pub fn ensure_docker_available() -> Result<()> {
    if !is_tool_installed("docker") {
        return Err(WspError::Dependency("docker".to_string()));
    }

    let status = cmd!("docker", "info")
        .stdout_null()
        .stderr_null()
        .unchecked()
        .run()
        .map_err(|e| WspError::Command(format!("Failed to run 'docker info': {}", e)))?;

    if !status.status.success() {
        return Err(WspError::DockerNotRunning);
    }
    Ok(())
}
