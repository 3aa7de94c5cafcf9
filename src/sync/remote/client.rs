use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{RemoteContent, RemoteError, RemoteFile, Result};
use crate::sync::config::{SyncConfig, SyncCredentials};

const USER_AGENT: &str = concat!("stocksync/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github.v3+json";

/// Client for a GitHub-style repository contents API.
///
/// Documents live at `{api}/repos/{owner}/{repo}/contents/{path}` on one
/// branch; the blob `sha` the server reports is used as the version tag.
pub struct ContentApiClient {
    client: Client,
    base_url: String,
    branch: String,
    credentials: SyncCredentials,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl ContentApiClient {
    pub fn new(config: &SyncConfig, credentials: SyncCredentials) -> Result<Self> {
        let api = config.api_base_url.trim_end_matches('/');
        if !api.starts_with("http://") && !api.starts_with("https://") {
            return Err(RemoteError::InvalidUrl(
                "URL must start with http:// or https://".to_string(),
            ));
        }
        if config.owner.is_empty() || config.repo.is_empty() {
            return Err(RemoteError::InvalidUrl("owner and repo are required".to_string()));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(300))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: format!(
                "{}/repos/{}/{}",
                api,
                urlencoding::encode(&config.owner),
                urlencoding::encode(&config.repo)
            ),
            branch: config.branch.clone(),
            credentials,
        })
    }

    /// Build the contents URL for a document path
    fn url(&self, path: &str) -> String {
        let path = path
            .trim_start_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/contents/{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("token {}", self.credentials.token))
            .header("Accept", ACCEPT)
    }

    /// Check that the repository is reachable with the configured token
    pub async fn test_connection(&self) -> Result<bool> {
        let response = self
            .authorized(self.client.get(&self.base_url))
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::Auth),
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(server_error(status, response).await),
        }
    }
}

async fn server_error(status: StatusCode, response: Response) -> RemoteError {
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or(text);
    RemoteError::Server {
        status: status.as_u16(),
        message,
    }
}

fn decode_content(encoded: &str) -> Result<Vec<u8>> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| RemoteError::Transport(format!("invalid base64 content: {}", e)))
}

#[async_trait]
impl RemoteContent for ContentApiClient {
    async fn get(&self, path: &str) -> Result<RemoteFile> {
        let response = self
            .authorized(self.client.get(self.url(path)))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(RemoteError::Auth);
            }
            StatusCode::NOT_FOUND => {
                return Err(RemoteError::NotFound(path.to_string()));
            }
            status if !status.is_success() => {
                return Err(server_error(status, response).await);
            }
            _ => {}
        }

        let body: ContentResponse = response.json().await?;
        if !body.encoding.is_empty() && body.encoding != "base64" {
            return Err(RemoteError::Transport(format!(
                "unsupported content encoding '{}' for {}",
                body.encoding, path
            )));
        }

        log::debug!("Remote: GET {} ({})", path, body.sha);
        Ok(RemoteFile {
            content: decode_content(&body.content)?,
            version: body.sha,
        })
    }

    async fn put(
        &self,
        path: &str,
        content: &[u8],
        version: Option<&str>,
        message: &str,
    ) -> Result<String> {
        let body = PutRequest {
            message,
            content: base64::engine::general_purpose::STANDARD.encode(content),
            branch: &self.branch,
            sha: version,
        };

        let response = self
            .authorized(self.client.put(self.url(path)))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let body: PutResponse = response.json().await?;
                log::debug!("Remote: PUT {} ({})", path, body.content.sha);
                Ok(body.content.sha)
            }
            StatusCode::CONFLICT
            | StatusCode::PRECONDITION_FAILED
            | StatusCode::UNPROCESSABLE_ENTITY => Err(RemoteError::Conflict(path.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::Auth),
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound(path.to_string())),
            status => Err(server_error(status, response).await),
        }
    }
}
