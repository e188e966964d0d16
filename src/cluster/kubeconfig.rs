//! Cluster connection settings
//!
//! Resolves where the Kubernetes API server lives and how to authenticate
//! against it, either from the pod's service account (in-cluster) or from
//! an external kubeconfig file.

use base64::Engine;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::error::{ClusterError, ClusterResult};

/// Directory where the service account token and CA are mounted
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// How requests authenticate against the API server
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// Anonymous requests
    None,

    /// Static bearer token
    BearerToken(String),

    /// Bearer token re-read from a file on every request (rotated tokens)
    TokenFile(PathBuf),

    /// Basic authentication
    Basic { username: String, password: String },

    /// Client certificate (PEM certificate chain and PEM private key)
    ClientCertificate { cert_pem: Vec<u8>, key_pem: Vec<u8> },
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::BearerToken(_) => write!(f, "BearerToken(<redacted>)"),
            Self::TokenFile(path) => write!(f, "TokenFile({})", path.display()),
            Self::Basic { username, .. } => write!(f, "Basic({username})"),
            Self::ClientCertificate { .. } => write!(f, "ClientCertificate(<redacted>)"),
        }
    }
}

/// Resolved connection settings for one cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    /// API server base URL, e.g. `https://10.0.0.1:443`
    pub server: String,

    /// PEM bundle of the cluster certificate authority
    pub ca_pem: Option<Vec<u8>>,

    /// Skip server certificate verification
    pub insecure_skip_tls_verify: bool,

    /// Authentication method
    pub auth: Auth,
}

impl ClusterConfig {
    /// Plain config pointing at `server` without TLS material or credentials
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ca_pem: None,
            insecure_skip_tls_verify: false,
            auth: Auth::None,
        }
    }

    /// Set the authentication method
    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    /// Pick the config source the way the CLI flags describe it
    ///
    /// `in_cluster` wins. Otherwise the kubeconfig path is loaded; an
    /// empty path falls back to the in-cluster config.
    pub fn resolve(in_cluster: bool, kubeconfig: Option<&Path>) -> ClusterResult<Self> {
        if in_cluster {
            tracing::info!("Using in cluster config to connect to the cluster");
            return Self::in_cluster();
        }

        match kubeconfig {
            Some(path) if !path.as_os_str().is_empty() => {
                tracing::info!(kubeconfig = %path.display(), "Using kubeconfig to connect to the cluster");
                Self::from_kubeconfig(path)
            }
            _ => {
                tracing::warn!("No kubeconfig given, trying in cluster config");
                Self::in_cluster()
            }
        }
    }

    /// Config from the service account mounted into the pod
    pub fn in_cluster() -> ClusterResult<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
            ClusterError::InClusterUnavailable("KUBERNETES_SERVICE_HOST is not set".to_string())
        })?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").map_err(|_| {
            ClusterError::InClusterUnavailable("KUBERNETES_SERVICE_PORT is not set".to_string())
        })?;

        Self::from_service_account(&host, &port, Path::new(SERVICE_ACCOUNT_DIR))
    }

    /// Config from an explicit API host/port and service account directory
    pub fn from_service_account(host: &str, port: &str, dir: &Path) -> ClusterResult<Self> {
        if host.is_empty() || port.is_empty() {
            return Err(ClusterError::InClusterUnavailable(
                "KUBERNETES_SERVICE_HOST and KUBERNETES_SERVICE_PORT must be non-empty".to_string(),
            ));
        }

        let token_path = dir.join("token");
        if !token_path.is_file() {
            return Err(ClusterError::InClusterUnavailable(format!(
                "service account token not found at {}",
                token_path.display()
            )));
        }

        let ca_path = dir.join("ca.crt");
        let ca_pem = std::fs::read(&ca_path).map_err(|e| {
            ClusterError::InClusterUnavailable(format!(
                "failed to read {}: {e}",
                ca_path.display()
            ))
        })?;

        // IPv6 hosts need brackets in the authority
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.to_string()
        };

        Ok(Self {
            server: format!("https://{host}:{port}"),
            ca_pem: Some(ca_pem),
            insecure_skip_tls_verify: false,
            auth: Auth::TokenFile(token_path),
        })
    }

    /// Config from the current context of a kubeconfig file
    pub fn from_kubeconfig(path: &Path) -> ClusterResult<Self> {
        let invalid = |reason: String| ClusterError::InvalidKubeconfig {
            path: path.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let kubeconfig: Kubeconfig =
            serde_yaml::from_str(&content).map_err(|e| invalid(e.to_string()))?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        kubeconfig
            .into_cluster_config(base_dir)
            .map_err(|e| match e {
                ClusterError::InvalidKubeconfig { reason, .. } => invalid(reason),
                other => other,
            })
    }
}

/// Default kubeconfig location: `$KUBECONFIG`, else `~/.kube/config`
pub fn default_kubeconfig_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("KUBECONFIG") {
        // KUBECONFIG may list several files; the first one wins here
        let separator = if cfg!(windows) { ';' } else { ':' };
        if let Some(first) = path.split(separator).find(|p| !p.is_empty()) {
            return Some(PathBuf::from(first));
        }
    }

    home_dir().map(|home| home.join(".kube").join("config"))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .or_else(|| std::env::var_os("USERPROFILE").filter(|h| !h.is_empty()))
        .map(PathBuf::from)
}

// ============================================================================
// Kubeconfig file format
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Kubeconfig {
    #[serde(default)]
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    users: Vec<NamedUser>,
    #[serde(default)]
    contexts: Vec<NamedContext>,
    #[serde(default)]
    current_context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedCluster {
    name: String,
    cluster: ClusterEntry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ClusterEntry {
    server: String,
    #[serde(default)]
    certificate_authority: Option<String>,
    #[serde(default)]
    certificate_authority_data: Option<String>,
    #[serde(default)]
    insecure_skip_tls_verify: bool,
}

#[derive(Debug, Deserialize)]
struct NamedUser {
    name: String,
    #[serde(default)]
    user: UserEntry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct UserEntry {
    #[serde(default)]
    token: Option<String>,
    #[serde(default, rename = "tokenFile")]
    token_file: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    client_certificate: Option<String>,
    #[serde(default)]
    client_certificate_data: Option<String>,
    #[serde(default)]
    client_key: Option<String>,
    #[serde(default)]
    client_key_data: Option<String>,
    #[serde(default)]
    exec: Option<serde_yaml::Value>,
    #[serde(default)]
    auth_provider: Option<serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct NamedContext {
    name: String,
    context: ContextEntry,
}

#[derive(Debug, Deserialize)]
struct ContextEntry {
    cluster: String,
    #[serde(default)]
    user: Option<String>,
}

impl Kubeconfig {
    fn into_cluster_config(self, base_dir: &Path) -> ClusterResult<ClusterConfig> {
        let invalid = |reason: String| ClusterError::InvalidKubeconfig {
            path: String::new(),
            reason,
        };

        let context_name = self
            .current_context
            .filter(|c| !c.is_empty())
            .ok_or_else(|| invalid("current-context is not set".to_string()))?;

        let context = self
            .contexts
            .into_iter()
            .find(|c| c.name == context_name)
            .ok_or_else(|| invalid(format!("context '{context_name}' not found")))?
            .context;

        let cluster = self
            .clusters
            .into_iter()
            .find(|c| c.name == context.cluster)
            .ok_or_else(|| invalid(format!("cluster '{}' not found", context.cluster)))?
            .cluster;

        if cluster.server.is_empty() {
            return Err(invalid(format!(
                "cluster '{}' has no server",
                context.cluster
            )));
        }

        let user = match context.user.filter(|u| !u.is_empty()) {
            Some(name) => {
                self.users
                    .into_iter()
                    .find(|u| u.name == name)
                    .ok_or_else(|| invalid(format!("user '{name}' not found")))?
                    .user
            }
            None => UserEntry::default(),
        };

        let ca_pem = load_material(
            cluster.certificate_authority_data.as_deref(),
            cluster.certificate_authority.as_deref(),
            base_dir,
        )?;

        Ok(ClusterConfig {
            server: cluster.server.trim_end_matches('/').to_string(),
            ca_pem,
            insecure_skip_tls_verify: cluster.insecure_skip_tls_verify,
            auth: user.into_auth(base_dir)?,
        })
    }
}

impl UserEntry {
    fn into_auth(self, base_dir: &Path) -> ClusterResult<Auth> {
        if let Some(token) = self.token.filter(|t| !t.is_empty()) {
            return Ok(Auth::BearerToken(token));
        }

        if let Some(file) = self.token_file.filter(|f| !f.is_empty()) {
            return Ok(Auth::TokenFile(resolve_path(&file, base_dir)));
        }

        let cert_pem = load_material(
            self.client_certificate_data.as_deref(),
            self.client_certificate.as_deref(),
            base_dir,
        )?;
        let key_pem = load_material(
            self.client_key_data.as_deref(),
            self.client_key.as_deref(),
            base_dir,
        )?;

        match (cert_pem, key_pem) {
            (Some(cert_pem), Some(key_pem)) => {
                return Ok(Auth::ClientCertificate { cert_pem, key_pem });
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(ClusterError::InvalidCredentials(
                    "client certificate and client key must be given together".to_string(),
                ));
            }
            (None, None) => {}
        }

        if let (Some(username), Some(password)) = (self.username, self.password) {
            return Ok(Auth::Basic { username, password });
        }

        if self.exec.is_some() || self.auth_provider.is_some() {
            return Err(ClusterError::InvalidCredentials(
                "exec and auth-provider credential plugins are not supported".to_string(),
            ));
        }

        Ok(Auth::None)
    }
}

/// Inline base64 data wins over a file reference
fn load_material(
    data: Option<&str>,
    file: Option<&str>,
    base_dir: &Path,
) -> ClusterResult<Option<Vec<u8>>> {
    if let Some(data) = data.filter(|d| !d.is_empty()) {
        let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
        return base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map(Some)
            .map_err(|e| ClusterError::InvalidCredentials(format!("invalid base64 data: {e}")));
    }

    if let Some(file) = file.filter(|f| !f.is_empty()) {
        let path = resolve_path(file, base_dir);
        return std::fs::read(&path).map(Some).map_err(|e| {
            ClusterError::InvalidCredentials(format!("failed to read {}: {e}", path.display()))
        });
    }

    Ok(None)
}

/// Relative paths in a kubeconfig are relative to the file itself
fn resolve_path(file: &str, base_dir: &Path) -> PathBuf {
    let path = PathBuf::from(file);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}
