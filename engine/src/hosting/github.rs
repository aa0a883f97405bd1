use super::{HostError, PageBuild, RepoFileHandle, RepoHost, RepoSummary, VersionToken};
use crate::config::GitHubConfig;
use crate::secrets::{scrub, SecretString};
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct ContentResponse {
    sha: String,
    content: String,
    encoding: String,
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    sha: String,
}

/// GitHub REST implementation of [`RepoHost`]
pub struct GitHubHost {
    config: GitHubConfig,
    token: SecretString,
    client: reqwest::Client,
}

impl GitHubHost {
    pub fn new(config: GitHubConfig, token: SecretString) -> Result<Self, HostError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("pagecraft/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HostError::Network(e.to_string()))?;

        Ok(Self {
            config,
            token,
            client,
        })
    }

    /// API URL built from path segments; each segment is percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url, HostError> {
        let mut url = Url::parse(&self.config.api_base_url)
            .map_err(|e| HostError::Network(format!("invalid api base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| HostError::Network("api base url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn contents_url(&self, repo: &str, path: &str) -> Result<Url, HostError> {
        let mut segments = vec!["repos", self.config.owner.as_str(), repo, "contents"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        self.url(&segments)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token.expose()))
            .header("X-GitHub-Api-Version", &self.config.api_version)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, HostError> {
        let response = builder
            .send()
            .await
            .map_err(|e| HostError::Network(scrub(&e.to_string())))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = scrub(&response.text().await.unwrap_or_default());
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => HostError::Unauthorized(body),
            StatusCode::NOT_FOUND => HostError::NotFound(body),
            _ => HostError::Api {
                status: status.as_u16(),
                message: body,
            },
        })
    }

    async fn json<T: for<'de> Deserialize<'de>>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, HostError> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| HostError::Decode(e.to_string()))
    }

    async fn put_contents(
        &self,
        repo: &str,
        path: &str,
        content: &[u8],
        message: &str,
        token: Option<&VersionToken>,
    ) -> Result<(), HostError> {
        let mut body = json!({
            "message": message,
            "committer": {
                "name": self.config.committer_name,
                "email": self.config.committer_email,
            },
            "content": base64::engine::general_purpose::STANDARD.encode(content),
            "branch": self.config.pages_branch,
        });
        if let Some(token) = token {
            body["sha"] = json!(token.as_str());
        }

        let url = self.contents_url(repo, path)?;
        match self.send(self.request(Method::PUT, url).json(&body)).await {
            Ok(_) => Ok(()),
            Err(HostError::Api { status: 409, .. }) => Err(HostError::VersionConflict {
                path: path.to_string(),
            }),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl RepoHost for GitHubHost {
    async fn check_connectivity(&self) -> Result<(), HostError> {
        let repos = self.list_repositories().await?;
        if repos.is_empty() {
            return Err(HostError::Unavailable(format!(
                "no repositories visible for {}",
                self.config.owner
            )));
        }
        Ok(())
    }

    async fn list_repositories(&self) -> Result<Vec<RepoSummary>, HostError> {
        let url = self.url(&["users", &self.config.owner, "repos"])?;
        let mut repos = Vec::new();

        for page in 1.. {
            let builder = self
                .request(Method::GET, url.clone())
                .query(&[("per_page", PAGE_SIZE), ("page", page)]);
            let batch: Vec<RepoSummary> = self.json(builder).await?;
            let last = batch.len() < PAGE_SIZE;
            repos.extend(batch);
            if last {
                break;
            }
        }

        Ok(repos)
    }

    async fn create_repository(&self, name: &str) -> Result<(), HostError> {
        let url = self.url(&["user", "repos"])?;
        let body = json!({ "name": name, "private": false });
        self.send(self.request(Method::POST, url).json(&body))
            .await?;
        tracing::info!(repo = name, "Created repository");
        Ok(())
    }

    async fn delete_repository(&self, name: &str) -> Result<(), HostError> {
        let url = self.url(&["repos", &self.config.owner, name])?;
        self.send(self.request(Method::DELETE, url)).await?;
        tracing::info!(repo = name, "Deleted repository");
        Ok(())
    }

    async fn create_file(
        &self,
        repo: &str,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<(), HostError> {
        self.put_contents(repo, path, content, message, None).await
    }

    async fn read_file(&self, repo: &str, path: &str) -> Result<RepoFileHandle, HostError> {
        let url = self.contents_url(repo, path)?;
        let response: ContentResponse = self
            .json(
                self.request(Method::GET, url)
                    .query(&[("ref", self.config.pages_branch.as_str())]),
            )
            .await?;

        if response.encoding != "base64" {
            return Err(HostError::Decode(format!(
                "unexpected encoding '{}' for {}",
                response.encoding, path
            )));
        }

        // the API wraps base64 content at 60 columns
        let packed: String = response
            .content
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(packed)
            .map_err(|e| HostError::Decode(format!("{}: {}", path, e)))?;
        let content = String::from_utf8(bytes)
            .map_err(|e| HostError::Decode(format!("{} is not utf-8: {}", path, e)))?;

        Ok(RepoFileHandle {
            filename: path.to_string(),
            version_token: VersionToken::new(response.sha),
            content,
        })
    }

    async fn update_file(
        &self,
        repo: &str,
        path: &str,
        content: &[u8],
        message: &str,
        token: &VersionToken,
    ) -> Result<(), HostError> {
        self.put_contents(repo, path, content, message, Some(token))
            .await
    }

    async fn enable_pages(&self, repo: &str) -> Result<(), HostError> {
        let url = self.url(&["repos", &self.config.owner, repo, "pages"])?;
        let body = json!({
            "source": { "branch": self.config.pages_branch, "path": "/" }
        });
        self.send(self.request(Method::POST, url).json(&body))
            .await?;
        Ok(())
    }

    async fn latest_commit(&self, repo: &str) -> Result<String, HostError> {
        let url = self.url(&["repos", &self.config.owner, repo, "commits"])?;
        let commits: Vec<CommitEntry> = self
            .json(self.request(Method::GET, url).query(&[("per_page", "1")]))
            .await?;

        commits
            .into_iter()
            .next()
            .map(|c| c.sha)
            .ok_or_else(|| HostError::NotFound(format!("no commits in {}", repo)))
    }

    async fn page_builds(&self, repo: &str) -> Result<Vec<PageBuild>, HostError> {
        let url = self.url(&["repos", &self.config.owner, repo, "pages", "builds"])?;
        self.json(self.request(Method::GET, url)).await
    }

    fn repo_url(&self, repo: &str) -> String {
        format!("https://github.com/{}/{}", self.config.owner, repo)
    }

    fn pages_url(&self, repo: &str) -> String {
        format!(
            "https://{}.github.io/{}/",
            self.config.owner.to_lowercase(),
            repo
        )
    }
}
