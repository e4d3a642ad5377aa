//! Proxy container management: compose up and admin API readiness.

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use duct::cmd;
use tracing::{debug, info};
use wsp_core::command_stream::{ensure_docker_available, run_command, stream_command, stream_command_visible};

use crate::config::IngressSettings;
use crate::control_api::ControlApiClient;
use crate::error::{IngressError, Result};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);
const START_ATTEMPTS: u32 = 2;

/// Make sure the external network from the compose file exists.
fn ensure_network(network: &str) -> Result<()> {
    if run_command("docker", &["network", "inspect", network]).is_ok() {
        return Ok(());
    }
    debug!(network = %network, "Creating docker network");
    run_command("docker", &["network", "create", network])?;
    Ok(())
}

fn compose_up(settings: &IngressSettings, dir: &Path, verbose: bool) -> Result<()> {
    let compose_file = dir.join("docker-compose.yml");
    let compose_file = compose_file.to_string_lossy();
    let args = [
        "compose",
        "-p",
        settings.compose_project.as_str(),
        "-f",
        &*compose_file,
        "up",
        "-d",
    ];
    if verbose {
        stream_command_visible("docker", &args)?;
    } else {
        stream_command("docker", &args)?;
    }

    // A clean exit from compose does not mean the container stayed up.
    let running = cmd!(
        "docker",
        "ps",
        "--filter",
        format!("name=^{}$", settings.container_name),
        "--format",
        "{{.Names}}"
    )
    .stderr_null()
    .read()
    .map_err(|e| IngressError::Container(format!("failed to query containers: {}", e)))?;
    if running.trim().is_empty() {
        return Err(IngressError::Container(format!(
            "container '{}' is not running after compose up",
            settings.container_name
        )));
    }
    Ok(())
}

/// Start the proxy container described by the compose file in `dir`.
pub fn start_ingress(settings: &IngressSettings, dir: &Path, verbose: bool) -> Result<()> {
    ensure_docker_available()?;
    ensure_network(&settings.network)?;

    let mut last_error = None;
    for attempt in 1..=START_ATTEMPTS {
        match compose_up(settings, dir, verbose) {
            Ok(()) => {
                info!(project = %settings.compose_project, attempt, "Ingress container started");
                return Ok(());
            }
            Err(e) => {
                debug!(attempt, error = %e, "Starting ingress container failed");
                last_error = Some(e);
                if attempt < START_ATTEMPTS {
                    thread::sleep(Duration::from_secs(2));
                }
            }
        }
    }
    Err(last_error.unwrap_or_else(|| {
        IngressError::Container("failed to start ingress container".to_string())
    }))
}

/// Poll until the admin API answers or `timeout` passes.
pub fn wait_for_admin(client: &ControlApiClient, timeout: Duration) -> Result<()> {
    let start = Instant::now();
    loop {
        if client.is_reachable() {
            debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Admin API is ready");
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(IngressError::Container(format!(
                "admin API at {} did not become ready within {}s",
                client.base_url(),
                timeout.as_secs()
            )));
        }
        thread::sleep(READY_POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::RetryPolicy;

    #[test]
    fn test_wait_for_admin_times_out() {
        // Port 9 (discard) is closed on test machines; connects fail fast.
        let client = ControlApiClient::new(
            "http://127.0.0.1:9",
            Duration::from_millis(200),
            RetryPolicy::none(),
        )
        .unwrap();
        let err = wait_for_admin(&client, Duration::from_millis(300)).unwrap_err();
        assert!(matches!(err, IngressError::Container(_)));
    }
}
