//! Kubernetes API client for listing nodes
//!
//! Talks to the core `v1` nodes endpoint directly over reqwest. Only the
//! node labels are decoded; everything else in the node objects is ignored.

use async_trait::async_trait;
use reqwest::{Client, Identity, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::models::Labels;

use super::error::{ClusterError, ClusterResult};
use super::kubeconfig::{Auth, ClusterConfig};
use super::NodeSource;

/// Default number of nodes requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Longest error body kept in a `ClusterError::Status`
const MAX_ERROR_BODY: usize = 512;

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct NodeList {
    #[serde(default)]
    metadata: ListMeta,
    #[serde(default)]
    items: Vec<Node>,
}

#[derive(Debug, Default, Deserialize)]
struct ListMeta {
    #[serde(default, rename = "continue")]
    continue_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Node {
    #[serde(default)]
    metadata: ObjectMeta,
}

#[derive(Debug, Default, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    labels: Option<Labels>,
}

/// `Status` object returned by the API server on errors
#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: Option<String>,
}

// ============================================================================
// Kube Node Client
// ============================================================================

/// Lists nodes from a Kubernetes API server
pub struct KubeNodeClient {
    http_client: Client,
    nodes_url: Url,
    auth: Auth,
    page_size: u32,
}

impl KubeNodeClient {
    /// Create a client for the cluster described by `config`
    ///
    /// `timeout` bounds every HTTP request made by the client.
    pub fn new(config: ClusterConfig, timeout: Duration) -> ClusterResult<Self> {
        let base = format!("{}/", config.server.trim_end_matches('/'));
        let nodes_url = Url::parse(&base)
            .and_then(|base| base.join("api/v1/nodes"))
            .map_err(|e| ClusterError::InvalidUrl(format!("{}: {e}", config.server)))?;

        let mut builder = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .user_agent(format!("zonewatch/{}", env!("CARGO_PKG_VERSION")));

        if let Some(ca_pem) = &config.ca_pem {
            let certs = reqwest::Certificate::from_pem_bundle(ca_pem).map_err(|e| {
                ClusterError::InvalidCredentials(format!("invalid certificate authority: {e}"))
            })?;
            if certs.is_empty() {
                return Err(ClusterError::InvalidCredentials(
                    "certificate authority contains no certificates".to_string(),
                ));
            }
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        if config.insecure_skip_tls_verify {
            tracing::warn!(server = %config.server, "TLS verification disabled for API server");
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Auth::ClientCertificate { cert_pem, key_pem } = &config.auth {
            let mut pem = key_pem.clone();
            pem.push(b'\n');
            pem.extend_from_slice(cert_pem);
            let identity = Identity::from_pem(&pem).map_err(|e| {
                ClusterError::InvalidCredentials(format!("invalid client certificate: {e}"))
            })?;
            builder = builder.identity(identity);
        }

        let http_client = builder.build()?;

        Ok(Self {
            http_client,
            nodes_url,
            auth: config.auth,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Set the page size used when listing nodes (0 disables paging)
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// URL of the nodes collection
    pub fn nodes_url(&self) -> &Url {
        &self.nodes_url
    }

    async fn authorize(&self, request: RequestBuilder) -> ClusterResult<RequestBuilder> {
        Ok(match &self.auth {
            Auth::None | Auth::ClientCertificate { .. } => request,
            Auth::BearerToken(token) => request.bearer_auth(token),
            Auth::TokenFile(path) => {
                // Projected service account tokens rotate; read on every call
                let token = tokio::fs::read_to_string(path).await.map_err(|e| {
                    ClusterError::InvalidCredentials(format!(
                        "failed to read token file {}: {e}",
                        path.display()
                    ))
                })?;
                request.bearer_auth(token.trim())
            }
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
        })
    }

    async fn list_page(&self, continue_token: Option<&str>) -> ClusterResult<NodeList> {
        let mut url = self.nodes_url.clone();
        {
            let mut query = url.query_pairs_mut();
            if self.page_size > 0 {
                query.append_pair("limit", &self.page_size.to_string());
            }
            if let Some(token) = continue_token {
                query.append_pair("continue", token);
            }
        }

        let request = self
            .http_client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        let response = self.authorize(request).await?.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClusterError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ClusterError::Decode(e.to_string()))
    }
}

#[async_trait]
impl NodeSource for KubeNodeClient {
    async fn list_nodes(&self) -> ClusterResult<Vec<Labels>> {
        let mut nodes = Vec::new();
        let mut continue_token: Option<String> = None;

        loop {
            let page = self.list_page(continue_token.as_deref()).await?;
            tracing::debug!(count = page.items.len(), "Received node page");

            for node in page.items {
                if let Some(name) = &node.metadata.name {
                    tracing::trace!(node = %name, "Listed node");
                }
                nodes.push(node.metadata.labels.unwrap_or_default());
            }

            match page.metadata.continue_token.filter(|t| !t.is_empty()) {
                Some(token) => continue_token = Some(token),
                None => break,
            }
        }

        Ok(nodes)
    }
}

/// Prefer the `message` of a Kubernetes `Status` body, else the raw text
fn error_message(body: &str) -> String {
    if let Ok(ApiStatus {
        message: Some(message),
    }) = serde_json::from_str::<ApiStatus>(body)
    {
        return message;
    }

    let mut message = body.trim().to_string();
    if message.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    message
}
