use std::collections::BTreeMap;

use reqwest::{Client, Method, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ServerRequest<'a> {
    url: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerList {
    pub servers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub queue_lengths: BTreeMap<String, usize>,
    pub health: BTreeMap<String, bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("request to proxy failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("proxy returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Talks to `/servers` and `/queue-lengths` on a running proxy.
#[derive(Debug, Clone)]
pub struct AdminClient {
    client: Client,
    proxy_url: String,
}

impl AdminClient {
    pub fn new(proxy_url: &str) -> Self {
        Self::with_client(Client::new(), proxy_url)
    }

    pub fn with_client(client: Client, proxy_url: &str) -> Self {
        Self {
            client,
            proxy_url: proxy_url.trim_end_matches('/').to_string(),
        }
    }

    /// Register a backend. Registering twice is harmless.
    pub async fn register(&self, url: &str) -> Result<ServerList, AdminError> {
        self.send_url(Method::POST, url).await
    }

    /// Deregister a backend. Unknown URLs are ignored by the proxy.
    pub async fn deregister(&self, url: &str) -> Result<ServerList, AdminError> {
        self.send_url(Method::DELETE, url).await
    }

    pub async fn list(&self) -> Result<ServerList, AdminError> {
        let resp = self.client.get(self.endpoint("/servers")).send().await?;
        decode(resp).await
    }

    /// Outstanding counts and health per backend.
    pub async fn load(&self) -> Result<LoadReport, AdminError> {
        let resp = self.client.get(self.endpoint("/queue-lengths")).send().await?;
        decode(resp).await
    }

    async fn send_url(&self, method: Method, url: &str) -> Result<ServerList, AdminError> {
        let resp = self
            .client
            .request(method, self.endpoint("/servers"))
            .json(&ServerRequest { url })
            .send()
            .await?;
        decode(resp).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.proxy_url, path)
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, AdminError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AdminError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.json().await?)
}
