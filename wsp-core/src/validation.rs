//! Centralized validation logic for user inputs.
//!
//! Hostnames end up inside proxy resource ids and URL paths, upstreams end up
//! in the proxy's dial configuration, and workspace names end up in both, so
//! all three are checked before anything is sent to the control API.

use std::net::{IpAddr, Ipv6Addr};

use crate::error::{Result, WspError};

/// Validate a hostname according to RFC 1123 rules
pub fn validate_hostname(hostname: &str) -> Result<()> {
    // Basic length check (DNS hostname max is 253 characters)
    if hostname.is_empty() || hostname.len() > 253 {
        return Err(WspError::Validation(
            "Hostname must be between 1 and 253 characters".to_string(),
        ));
    }

    if hostname.starts_with('.') || hostname.ends_with('.') {
        return Err(WspError::Validation(
            "Hostname cannot start or end with a dot".to_string(),
        ));
    }

    for label in hostname.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(WspError::Validation(
                "Hostname labels must be between 1 and 63 characters".to_string(),
            ));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(WspError::Validation(
                "Hostname labels cannot start or end with a hyphen".to_string(),
            ));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(WspError::Validation(format!(
                "Hostname label '{}' contains invalid characters (only alphanumeric and '-' allowed)",
                label
            )));
        }
    }

    Ok(())
}

/// Lower-case and validate a hostname.
///
/// Host matching is case-insensitive, so `App.Example.com` and
/// `app.example.com` name the same route.
pub fn normalize_hostname(hostname: &str) -> Result<String> {
    let normalized = hostname.trim().to_ascii_lowercase();
    validate_hostname(&normalized)?;
    Ok(normalized)
}

/// Validate an upstream dial address of the form `host:port`.
///
/// The host part may be an IP address (IPv6 in brackets), a DNS name, or a
/// container name, which may contain underscores.
pub fn validate_upstream(upstream: &str) -> Result<()> {
    if upstream.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(WspError::Validation(format!(
            "Upstream '{}' contains whitespace or control characters",
            upstream.escape_debug()
        )));
    }

    let (host, port) = upstream.rsplit_once(':').ok_or_else(|| {
        WspError::Validation(format!(
            "Upstream '{}' must have the form host:port",
            upstream
        ))
    })?;

    match port.parse::<u16>() {
        Ok(p) if p > 0 => {}
        _ => {
            return Err(WspError::Validation(format!(
                "Upstream '{}' has an invalid port '{}'",
                upstream, port
            )))
        }
    }

    if host.is_empty() {
        return Err(WspError::Validation(format!(
            "Upstream '{}' is missing a host",
            upstream
        )));
    }

    if let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        return inner.parse::<Ipv6Addr>().map(|_| ()).map_err(|_| {
            WspError::Validation(format!("Upstream '{}' has an invalid IPv6 host", upstream))
        });
    }

    if host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    if host.len() > 253
        || !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
    {
        return Err(WspError::Validation(format!(
            "Upstream host '{}' contains invalid characters",
            host
        )));
    }

    Ok(())
}

/// Validate a workspace name.
///
/// Workspace names are used as hostname prefixes, TLS tags and resource id
/// suffixes: lower-case ASCII letters, digits and single hyphens only.
pub fn validate_workspace_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 63 {
        return Err(WspError::Validation(
            "Workspace name must be between 1 and 63 characters".to_string(),
        ));
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(WspError::Validation(
            "Workspace name cannot start or end with a hyphen".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(WspError::Validation(format!(
            "Workspace name '{}' may only contain lower-case letters, digits and '-'",
            name
        )));
    }

    Ok(())
}
