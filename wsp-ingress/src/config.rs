//! Ingress settings (`ingress.yaml`) and generated container files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tera::{Context as TeraContext, Tera};
use tracing::debug;

use crate::backoff::RetryPolicy;
use crate::error::{IngressError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressSettings {
    /// Base URL of the proxy's admin API.
    pub admin_url: String,
    /// Name of the HTTP server whose routes are managed.
    pub server_name: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
    /// Addresses the HTTP server listens on after bootstrap.
    pub listen: Vec<String>,
    /// Directory the certificate volume is mounted at inside the container.
    pub tls_dir: String,
    /// ACME account email written into the Caddyfile.
    pub email: String,
    pub image: String,
    pub container_name: String,
    pub compose_project: String,
    /// External docker network shared with workspace containers.
    pub network: String,
    /// How long `init` waits for the admin API after starting the container.
    pub ready_timeout_secs: u64,
    /// Domain given to the last `init`; used when `register` omits `--domain`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl Default for IngressSettings {
    fn default() -> Self {
        Self {
            admin_url: crate::DEFAULT_ADMIN_URL.to_string(),
            server_name: crate::DEFAULT_SERVER_NAME.to_string(),
            timeout_secs: crate::DEFAULT_TIMEOUT_SECS,
            retry: RetryPolicy::default(),
            listen: crate::DEFAULT_LISTEN.iter().map(|s| s.to_string()).collect(),
            tls_dir: crate::DEFAULT_TLS_DIR.to_string(),
            email: "admin@localhost".to_string(),
            image: crate::DEFAULT_IMAGE.to_string(),
            container_name: crate::CONTAINER_NAME.to_string(),
            compose_project: crate::COMPOSE_PROJECT.to_string(),
            network: crate::DEFAULT_NETWORK.to_string(),
            ready_timeout_secs: 30,
            domain: None,
        }
    }
}

impl IngressSettings {
    /// Load settings from `path`, falling back to defaults when it is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No ingress settings file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: IngressSettings = serde_yaml_ng::from_str(&content)
            .map_err(|e| IngressError::Config(format!("{}: {}", path.display(), e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml_ng::to_string(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.admin_url.starts_with("http://") || self.admin_url.starts_with("https://")) {
            return Err(IngressError::Config(format!(
                "admin_url must be an http(s) URL, got '{}'",
                self.admin_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(IngressError::Config("timeout_secs must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(IngressError::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.server_name.is_empty() || self.server_name.contains('/') {
            return Err(IngressError::Config(format!(
                "invalid server_name '{}'",
                self.server_name
            )));
        }
        Ok(())
    }

    /// Port part of the admin URL, used for the published container port.
    pub fn admin_port(&self) -> u16 {
        self.admin_url
            .rsplit(':')
            .next()
            .and_then(|p| p.trim_end_matches('/').parse().ok())
            .unwrap_or(2019)
    }
}

const CADDYFILE_TEMPLATE: &str = r#"{
	email {{ email }}
	admin 0.0.0.0:2019
}
"#;

const COMPOSE_TEMPLATE: &str = r#"services:
  {{ service }}:
    image: {{ image }}
    restart: always
    container_name: {{ container_name }}
    ports:
{%- for port in ports %}
      - "{{ port }}"
{%- endfor %}
    networks:
      - {{ network }}
    volumes:
      - {{ dir }}/Caddyfile:/etc/caddy/Caddyfile:z
      - {{ dir }}/data:/data:z
      - {{ dir }}/config:/config:z
      - {{ dir }}/certs:{{ tls_dir }}:z
    entrypoint: ["caddy", "run", "--resume", "--config", "/etc/caddy/Caddyfile", "--adapter", "caddyfile"]

networks:
  {{ network }}:
    external: true
"#;

fn render(name: &str, template: &str, context: &TeraContext) -> Result<String> {
    Tera::one_off(template, context, false)
        .map_err(|e| IngressError::Config(format!("failed to render {}: {}", name, e)))
}

/// Generate the proxy's Caddyfile (global options only; routes come from the API).
pub fn generate_caddyfile(settings: &IngressSettings) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("email", &settings.email);
    render("Caddyfile", CADDYFILE_TEMPLATE, &context)
}

/// Generate the compose file that runs the proxy container from `dir`.
pub fn generate_compose(settings: &IngressSettings, dir: &Path) -> Result<String> {
    let admin_port = settings.admin_port();
    let ports = vec![
        "80:80".to_string(),
        "443:443".to_string(),
        format!("127.0.0.1:{}:2019", admin_port),
    ];

    let mut context = TeraContext::new();
    context.insert("service", "caddy");
    context.insert("image", &settings.image);
    context.insert("container_name", &settings.container_name);
    context.insert("ports", &ports);
    context.insert("network", &settings.network);
    context.insert("dir", &dir.display().to_string());
    context.insert("tls_dir", &settings.tls_dir);
    render("docker-compose.yml", COMPOSE_TEMPLATE, &context)
}

/// Write the Caddyfile and compose file into `dir` and create the volume
/// directories. Returns the files written.
pub fn write_config_files(settings: &IngressSettings, dir: &Path) -> Result<Vec<PathBuf>> {
    for sub in ["certs", "data", "config"] {
        fs::create_dir_all(dir.join(sub))?;
    }

    let caddyfile = dir.join("Caddyfile");
    fs::write(&caddyfile, generate_caddyfile(settings)?)?;

    let compose = dir.join("docker-compose.yml");
    fs::write(&compose, generate_compose(settings, dir)?)?;

    debug!(dir = %dir.display(), "Wrote ingress container files");
    Ok(vec![caddyfile, compose])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = IngressSettings::default();
        assert_eq!(settings.admin_url, "http://localhost:2019");
        assert_eq!(settings.server_name, "srv0");
        assert_eq!(settings.timeout_secs, 10);
        assert_eq!(settings.listen, vec![":80".to_string(), ":443".to_string()]);
        assert_eq!(settings.admin_port(), 2019);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ingress.yaml");
        fs::write(
            &path,
            "admin_url: http://127.0.0.1:3019\nretry:\n  max_attempts: 5\n",
        )
        .unwrap();

        let settings = IngressSettings::load_or_default(&path).unwrap();
        assert_eq!(settings.admin_url, "http://127.0.0.1:3019");
        assert_eq!(settings.admin_port(), 3019);
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.base_delay_ms, 200);
        assert_eq!(settings.server_name, "srv0");
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let settings = IngressSettings::load_or_default(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(settings, IngressSettings::default());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ingress.yaml");
        fs::write(&path, "admin_url: localhost:2019\n").unwrap();
        assert!(matches!(
            IngressSettings::load_or_default(&path),
            Err(IngressError::Config(_))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ingress.yaml");
        let settings = IngressSettings {
            domain: Some("example.com".into()),
            ..Default::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(IngressSettings::load_or_default(&path).unwrap(), settings);
    }

    #[test]
    fn test_write_config_files() {
        let dir = TempDir::new().unwrap();
        let settings = IngressSettings {
            email: "ops@example.com".into(),
            ..Default::default()
        };
        let written = write_config_files(&settings, dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(dir.path().join("certs").is_dir());

        let caddyfile = fs::read_to_string(dir.path().join("Caddyfile")).unwrap();
        assert!(caddyfile.contains("email ops@example.com"));
        assert!(caddyfile.contains("admin 0.0.0.0:2019"));

        let compose = fs::read_to_string(dir.path().join("docker-compose.yml")).unwrap();
        assert!(compose.contains("image: caddy:2.9"));
        assert!(compose.contains("- \"127.0.0.1:2019:2019\""));
        assert!(!compose.contains("- \"2019:2019\""));
        assert!(compose.contains(&format!("{}/certs:/tls:z", dir.path().display())));
        assert!(compose.contains("external: true"));

        let parsed: serde_yaml_ng::Value = serde_yaml_ng::from_str(&compose).unwrap();
        assert_eq!(
            parsed["services"]["caddy"]["container_name"].as_str(),
            Some("wsp-ingress")
        );
    }
}
