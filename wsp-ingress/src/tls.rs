//! TLS certificate loading and SNI policies per workspace.
//!
//! A workspace's certificate pair is loaded from
//! `<tls_dir>/<domain>/full-chain.pem` and `private-key.pem` and tagged with
//! the workspace name; the policy selects certificates by that tag for
//! `*.<domain>`.

use tracing::{info, warn};

use crate::control_api::{append_path, to_payload, ConfigPaths, ControlPlane};
use crate::error::Result;
use crate::ownership::TlsIds;
use crate::routes::normalize_hostname;
use crate::types::{
    CertificateSelection, FailedRemoval, SniMatch, TeardownReport, TlsCertificateLoad, TlsPolicy,
};

pub fn tls_certs_id(workspace: &str) -> String {
    format!("tls_certs_{}", workspace)
}

pub fn tls_policy_id(workspace: &str) -> String {
    format!("tls_policy_{}", workspace)
}

pub fn tls_ids(workspace: &str) -> TlsIds {
    TlsIds {
        certs: tls_certs_id(workspace),
        policy: tls_policy_id(workspace),
    }
}

/// Ids used by earlier releases, removed by legacy cleanup.
pub fn legacy_tls_ids(workspace: &str) -> TlsIds {
    TlsIds {
        certs: format!("{}_tlscerts", workspace),
        policy: format!("{}_tlspolicy", workspace),
    }
}

pub fn build_certificate_load(workspace: &str, domain: &str, tls_dir: &str) -> TlsCertificateLoad {
    let base = format!("{}/{}", tls_dir.trim_end_matches('/'), domain);
    TlsCertificateLoad {
        id: tls_certs_id(workspace),
        certificate: format!("{}/full-chain.pem", base),
        key: format!("{}/private-key.pem", base),
        tags: vec![workspace.to_string()],
    }
}

pub fn build_policy(workspace: &str, domain: &str) -> TlsPolicy {
    TlsPolicy {
        id: tls_policy_id(workspace),
        matcher: SniMatch {
            sni: vec![format!("*.{}", domain)],
        },
        certificate_selection: CertificateSelection {
            any_tag: vec![workspace.to_string()],
        },
    }
}

pub struct TlsManager<'a> {
    plane: &'a dyn ControlPlane,
    paths: ConfigPaths,
    tls_dir: String,
}

impl<'a> TlsManager<'a> {
    pub fn new(plane: &'a dyn ControlPlane, paths: ConfigPaths, tls_dir: impl Into<String>) -> Self {
        Self {
            plane,
            paths,
            tls_dir: tls_dir.into(),
        }
    }

    /// Load the domain's certificate pair and attach an SNI policy for it.
    ///
    /// Certificates go first, then the policy. Each object replaces any
    /// previous one with the same id. Stops at the first failure.
    pub fn install_certs(&self, workspace: &str, domain: &str) -> Result<TlsIds> {
        let domain = normalize_hostname(domain)?;

        let certs = build_certificate_load(workspace, &domain, &self.tls_dir);
        self.plane
            .delete_id(&certs.id)
            .and_then(|_| {
                let payload = to_payload("certificate load", &vec![&certs])?;
                self.plane
                    .post(&append_path(&self.paths.tls_load_files()), &payload)
            })
            .map_err(|e| e.during("load certificates for", &domain))?;

        let policy = build_policy(workspace, &domain);
        self.plane
            .delete_id(&policy.id)
            .and_then(|_| {
                let payload = to_payload("TLS policy", &vec![&policy])?;
                self.plane
                    .post(&append_path(&self.paths.tls_connection_policies()), &payload)
            })
            .map_err(|e| e.during("add TLS policy for", &domain))?;

        info!(workspace = %workspace, domain = %domain, "TLS certificates installed");
        Ok(TlsIds {
            certs: certs.id,
            policy: policy.id,
        })
    }

    /// Remove a workspace's policy and certificate load, tolerating absence.
    pub fn uninstall_certs(&self, workspace: &str) -> TeardownReport {
        self.uninstall_ids(&tls_ids(workspace))
    }

    /// Remove the given TLS objects, policy first. Failures are collected.
    pub fn uninstall_ids(&self, ids: &TlsIds) -> TeardownReport {
        let mut report = TeardownReport::default();
        for id in [&ids.policy, &ids.certs] {
            match self.plane.delete_id(id) {
                Ok(()) => report.removed.push(id.clone()),
                Err(e) => {
                    warn!(id = %id, error = %e, "Failed to remove TLS object");
                    report.failed.push(FailedRemoval {
                        id: id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngressError;
    use crate::fake::InMemoryControlPlane;
    use serde_json::json;

    fn bootstrapped() -> InMemoryControlPlane {
        let plane = InMemoryControlPlane::new();
        let paths = ConfigPaths::default();
        plane.put(&paths.tls_load_files(), &json!([])).unwrap();
        plane.put(&paths.tls_connection_policies(), &json!([])).unwrap();
        plane
    }

    #[test]
    fn test_wire_shapes() {
        let certs = serde_json::to_value(build_certificate_load("alpha", "example.com", "/tls/")).unwrap();
        assert_eq!(
            certs,
            json!({
                "@id": "tls_certs_alpha",
                "certificate": "/tls/example.com/full-chain.pem",
                "key": "/tls/example.com/private-key.pem",
                "tags": ["alpha"]
            })
        );

        let policy = serde_json::to_value(build_policy("alpha", "example.com")).unwrap();
        assert_eq!(
            policy,
            json!({
                "@id": "tls_policy_alpha",
                "match": { "sni": ["*.example.com"] },
                "certificate_selection": { "any_tag": ["alpha"] }
            })
        );
    }

    #[test]
    fn test_install_posts_certs_then_policy() {
        let plane = bootstrapped();
        plane.clear_requests();
        let tls = TlsManager::new(&plane, ConfigPaths::default(), "/tls");

        let ids = tls.install_certs("alpha", "example.com").unwrap();
        assert_eq!(ids, tls_ids("alpha"));

        let posts: Vec<String> = plane
            .requests()
            .into_iter()
            .filter(|r| r.method == "POST")
            .map(|r| r.path)
            .collect();
        assert_eq!(
            posts,
            vec![
                "/config/apps/tls/certificates/load_files/...".to_string(),
                "/config/apps/http/servers/srv0/tls_connection_policies/...".to_string(),
            ]
        );
    }

    #[test]
    fn test_reinstall_does_not_duplicate() {
        let plane = bootstrapped();
        let tls = TlsManager::new(&plane, ConfigPaths::default(), "/tls");
        tls.install_certs("alpha", "example.com").unwrap();
        tls.install_certs("alpha", "example.com").unwrap();

        let snapshot = plane.snapshot();
        let loads = snapshot["apps"]["tls"]["certificates"]["load_files"]
            .as_array()
            .map(Vec::len);
        assert_eq!(loads, Some(1));
    }

    #[test]
    fn test_install_stops_when_certs_fail() {
        // No load_files collection: the certificate append fails.
        let plane = InMemoryControlPlane::new();
        let tls = TlsManager::new(&plane, ConfigPaths::default(), "/tls");
        let err = tls.install_certs("alpha", "example.com").unwrap_err();
        assert_eq!(err.status_code(), Some(400));
        assert!(plane
            .requests()
            .iter()
            .all(|r| !r.path.contains("tls_connection_policies")));
    }

    #[test]
    fn test_install_rejects_bad_domain() {
        let plane = bootstrapped();
        let tls = TlsManager::new(&plane, ConfigPaths::default(), "/tls");
        assert!(matches!(
            tls.install_certs("alpha", "not a domain"),
            Err(IngressError::InvalidHostname { .. })
        ));
    }

    #[test]
    fn test_uninstall_tolerates_absence() {
        let plane = bootstrapped();
        let tls = TlsManager::new(&plane, ConfigPaths::default(), "/tls");
        tls.install_certs("alpha", "example.com").unwrap();

        let report = tls.uninstall_certs("alpha");
        assert!(report.is_clean());
        assert_eq!(report.removed, vec!["tls_policy_alpha", "tls_certs_alpha"]);
        assert!(plane.ids().is_empty());

        assert!(tls.uninstall_certs("alpha").is_clean());
    }
}
