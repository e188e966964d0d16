//! Loading cluster settings from files on disk

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde_json::json;
use serial_test::serial;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zonewatch::cluster::{
    default_kubeconfig_path, Auth, ClusterConfig, ClusterError, KubeNodeClient, NodeSource,
};

fn write_kubeconfig(dir: &Path, server: &str, user: &str) -> std::path::PathBuf {
    let path = dir.join("config");
    let yaml = format!(
        r#"apiVersion: v1
kind: Config
current-context: test
clusters:
- name: test-cluster
  cluster:
    server: {server}
contexts:
- name: test
  context:
    cluster: test-cluster
    user: test-user
users:
- name: test-user
  user:
{user}
"#
    );
    fs::write(&path, yaml).unwrap();
    path
}

#[test]
fn test_relative_paths_resolve_against_kubeconfig_dir() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("certs")).unwrap();
    fs::write(dir.path().join("certs/client.crt"), "CERT").unwrap();
    fs::write(dir.path().join("certs/client.key"), "KEY").unwrap();

    let path = write_kubeconfig(
        dir.path(),
        "https://api.example.com",
        "    client-certificate: certs/client.crt\n    client-key: certs/client.key",
    );

    let config = ClusterConfig::from_kubeconfig(&path).unwrap();

    assert_eq!(
        config.auth,
        Auth::ClientCertificate {
            cert_pem: b"CERT".to_vec(),
            key_pem: b"KEY".to_vec(),
        }
    );
}

#[test]
fn test_token_file_reference() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_kubeconfig(dir.path(), "https://api.example.com", "    tokenFile: token");

    let config = ClusterConfig::from_kubeconfig(&path).unwrap();

    assert_eq!(config.auth, Auth::TokenFile(dir.path().join("token")));
}

#[test]
fn test_missing_referenced_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_kubeconfig(
        dir.path(),
        "https://api.example.com",
        "    client-certificate: missing.crt\n    client-key: missing.key",
    );

    let result = ClusterConfig::from_kubeconfig(&path);

    assert!(matches!(result, Err(ClusterError::InvalidCredentials(_))));
}

#[test]
fn test_missing_kubeconfig_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope");

    let err = ClusterConfig::from_kubeconfig(&path).unwrap_err();

    match err {
        ClusterError::InvalidKubeconfig { path: reported, .. } => {
            assert_eq!(reported, path.display().to_string());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_malformed_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config");
    fs::write(&path, "clusters: [unterminated").unwrap();

    assert!(matches!(
        ClusterConfig::from_kubeconfig(&path),
        Err(ClusterError::InvalidKubeconfig { .. })
    ));
}

#[test]
fn test_service_account_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("token"), "sa-token").unwrap();
    fs::write(dir.path().join("ca.crt"), "CA").unwrap();

    let config = ClusterConfig::from_service_account("10.96.0.1", "443", dir.path()).unwrap();

    assert_eq!(config.server, "https://10.96.0.1:443");
    assert_eq!(config.ca_pem.as_deref(), Some(b"CA".as_slice()));
    assert_eq!(config.auth, Auth::TokenFile(dir.path().join("token")));
}

#[test]
fn test_service_account_ipv6_host() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("token"), "sa-token").unwrap();
    fs::write(dir.path().join("ca.crt"), "CA").unwrap();

    let config = ClusterConfig::from_service_account("fd00::1", "443", dir.path()).unwrap();

    assert_eq!(config.server, "https://[fd00::1]:443");
}

#[test]
fn test_service_account_without_token() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("ca.crt"), "CA").unwrap();

    assert!(matches!(
        ClusterConfig::from_service_account("10.96.0.1", "443", dir.path()),
        Err(ClusterError::InClusterUnavailable(_))
    ));
}

#[test]
#[serial]
fn test_in_cluster_without_environment() {
    std::env::remove_var("KUBERNETES_SERVICE_HOST");
    std::env::remove_var("KUBERNETES_SERVICE_PORT");

    assert!(matches!(
        ClusterConfig::resolve(true, None),
        Err(ClusterError::InClusterUnavailable(_))
    ));
    // An empty kubeconfig path falls back to in-cluster as well
    assert!(matches!(
        ClusterConfig::resolve(false, Some(Path::new(""))),
        Err(ClusterError::InClusterUnavailable(_))
    ));
}

#[test]
#[serial]
fn test_default_path_prefers_kubeconfig_env() {
    let saved = std::env::var_os("KUBECONFIG");

    let list = if cfg!(windows) { "C:\\a;C:\\b" } else { "/etc/a:/etc/b" };
    std::env::set_var("KUBECONFIG", list);
    let first = if cfg!(windows) { "C:\\a" } else { "/etc/a" };
    assert_eq!(default_kubeconfig_path(), Some(first.into()));

    std::env::remove_var("KUBECONFIG");
    if let Some(home) = std::env::var_os("HOME") {
        assert_eq!(
            default_kubeconfig_path(),
            Some(Path::new(&home).join(".kube").join("config"))
        );
    }

    if let Some(value) = saved {
        std::env::set_var("KUBECONFIG", value);
    }
}

/// Kubeconfig credentials reach the API server
#[tokio::test]
async fn test_kubeconfig_drives_client() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/nodes"))
        .and(header("authorization", "Bearer from-kubeconfig"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "metadata": {
                    "name": "n1",
                    "labels": {
                        "kubernetes.io/hostname": "n1",
                        "node-role.kubernetes.io/node": ""
                    }
                }
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = write_kubeconfig(dir.path(), &mock_server.uri(), "    token: from-kubeconfig");

    let config = ClusterConfig::from_kubeconfig(&path).unwrap();
    let client = KubeNodeClient::new(config, Duration::from_secs(5)).unwrap();
    let nodes = client.list_nodes().await.unwrap();

    assert_eq!(nodes.len(), 1);
    assert!(nodes[0].contains_key("node-role.kubernetes.io/node"));
}
