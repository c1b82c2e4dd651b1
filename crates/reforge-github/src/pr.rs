//! Pull-request service contract and its GitHub REST implementation

use async_trait::async_trait;
use reforge_core::{ReforgeError, Result};
use serde::Deserialize;
use std::sync::Mutex;
use tracing::debug;

use crate::token::TokenCache;

const GITHUB_API_URL: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "reforge";

/// Parameters for opening a pull request
#[derive(Debug, Clone)]
pub struct OpenPullRequestParams {
    pub owner: String,
    pub repo: String,
    pub head_branch: String,
    /// Defaults to `main` when absent
    pub base_branch: Option<String>,
    pub title: String,
    pub body: Option<String>,
    pub draft: bool,
}

/// An opened or retrieved pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestInfo {
    pub id: u64,
    pub number: u64,
    pub url: String,
    /// False when an existing pull request was returned instead
    pub created: bool,
    pub base_branch: String,
}

/// Merge status of a pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestStatus {
    pub merged: bool,
    /// `open` or `closed`
    pub state: String,
    pub url: String,
    pub title: String,
}

/// Port for the pull-request collaborator
#[async_trait]
pub trait PullRequestService: Send + Sync {
    /// Create a pull request from `head_branch` into the base branch
    async fn open_pull_request(&self, params: &OpenPullRequestParams) -> Result<PullRequestInfo>;

    /// Return the existing open pull request for `head_branch`, or create
    /// one (idempotent)
    async fn open_or_get_pull_request(
        &self,
        params: &OpenPullRequestParams,
    ) -> Result<PullRequestInfo>;

    /// Query merge status by number
    async fn get_pull_request_status(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<PullRequestStatus>;
}

#[derive(Debug, Deserialize)]
struct PrResponse {
    id: u64,
    number: u64,
    html_url: String,
    state: String,
    title: String,
    #[serde(default)]
    merged: Option<bool>,
    #[serde(default)]
    merged_at: Option<String>,
    base: BaseRef,
}

#[derive(Debug, Deserialize)]
struct BaseRef {
    #[serde(rename = "ref")]
    base_ref: String,
}

/// Pull-request service backed by the GitHub REST API
pub struct GithubPrService {
    client: reqwest::Client,
    token: String,
    api_url: String,
}

impl GithubPrService {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            api_url: GITHUB_API_URL.to_string(),
        }
    }

    /// Construct from the environment through the shared token cache
    pub fn from_env(tokens: &TokenCache) -> Result<Self> {
        let token = tokens
            .resolve(true)?
            .ok_or_else(|| ReforgeError::Config("GITHUB_TOKEN environment variable is not set".to_string()))?;
        Ok(Self::new(token))
    }

    /// Override the API endpoint (test servers)
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_url, path))
            .bearer_auth(&self.token)
            .header("accept", "application/vnd.github+json")
            .header("x-github-api-version", GITHUB_API_VERSION)
            .header("user-agent", USER_AGENT)
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| ReforgeError::PullRequestService(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown".to_string());
            return Err(ReforgeError::PullRequestService(format!(
                "GitHub API error {}: {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ReforgeError::PullRequestService(format!("failed to parse response: {}", e)))
    }

    fn to_info(pr: PrResponse, created: bool) -> PullRequestInfo {
        PullRequestInfo {
            id: pr.id,
            number: pr.number,
            url: pr.html_url,
            created,
            base_branch: pr.base.base_ref,
        }
    }
}

#[async_trait]
impl PullRequestService for GithubPrService {
    async fn open_pull_request(&self, params: &OpenPullRequestParams) -> Result<PullRequestInfo> {
        let base_branch = params.base_branch.as_deref().unwrap_or("main");

        let body = serde_json::json!({
            "title": params.title,
            "head": params.head_branch,
            "base": base_branch,
            "body": params.body,
            "draft": params.draft,
        });

        let pr: PrResponse = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/repos/{}/{}/pulls", params.owner, params.repo),
                )
                .json(&body),
            )
            .await?;

        Ok(Self::to_info(pr, true))
    }

    async fn open_or_get_pull_request(
        &self,
        params: &OpenPullRequestParams,
    ) -> Result<PullRequestInfo> {
        let head = format!("{}:{}", params.owner, params.head_branch);
        let existing: Vec<PrResponse> = self
            .send(
                self.request(
                    reqwest::Method::GET,
                    &format!("/repos/{}/{}/pulls", params.owner, params.repo),
                )
                .query(&[("head", head.as_str()), ("state", "open")]),
            )
            .await?;

        if let Some(pr) = existing.into_iter().next() {
            debug!(
                "Reusing existing PR #{} for {}:{}",
                pr.number, params.owner, params.head_branch
            );
            return Ok(Self::to_info(pr, false));
        }

        self.open_pull_request(params).await
    }

    async fn get_pull_request_status(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<PullRequestStatus> {
        let pr: PrResponse = self
            .send(self.request(
                reqwest::Method::GET,
                &format!("/repos/{}/{}/pulls/{}", owner, repo, pr_number),
            ))
            .await?;

        let merged = pr.merged.unwrap_or(pr.merged_at.is_some());
        let state = if pr.state == "open" { "open" } else { "closed" };

        Ok(PullRequestStatus {
            merged,
            state: state.to_string(),
            url: pr.html_url,
            title: pr.title,
        })
    }
}

/// Scriptable pull-request service for workflow tests
#[derive(Default)]
pub struct MockPullRequestService {
    /// PR number handed out on open
    pub next_number: u64,
    /// Existing open PR returned by `open_or_get`, keyed by head branch
    pub existing: Mutex<std::collections::HashMap<String, PullRequestInfo>>,
    /// Merge status keyed by PR number
    pub statuses: Mutex<std::collections::HashMap<u64, PullRequestStatus>>,
    /// Recorded `(operation, head-or-number)` pairs
    pub calls: Mutex<Vec<(String, String)>>,
    /// When set, every call fails with this message
    pub fail_with: Option<String>,
}

impl MockPullRequestService {
    pub fn new(next_number: u64) -> Self {
        Self {
            next_number,
            ..Self::default()
        }
    }

    pub fn with_status(self, number: u64, merged: bool) -> Self {
        self.statuses.lock().unwrap().insert(
            number,
            PullRequestStatus {
                merged,
                state: if merged { "closed" } else { "open" }.to_string(),
                url: format!("https://github.com/mock/pull/{}", number),
                title: format!("PR #{}", number),
            },
        );
        self
    }

    pub fn call_log(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn check_failure(&self) -> Result<()> {
        if let Some(message) = &self.fail_with {
            return Err(ReforgeError::PullRequestService(message.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl PullRequestService for MockPullRequestService {
    async fn open_pull_request(&self, params: &OpenPullRequestParams) -> Result<PullRequestInfo> {
        self.calls
            .lock()
            .unwrap()
            .push(("open".to_string(), params.head_branch.clone()));
        self.check_failure()?;

        Ok(PullRequestInfo {
            id: self.next_number * 10,
            number: self.next_number,
            url: format!("https://github.com/mock/pull/{}", self.next_number),
            created: true,
            base_branch: params
                .base_branch
                .clone()
                .unwrap_or_else(|| "main".to_string()),
        })
    }

    async fn open_or_get_pull_request(
        &self,
        params: &OpenPullRequestParams,
    ) -> Result<PullRequestInfo> {
        self.calls
            .lock()
            .unwrap()
            .push(("open_or_get".to_string(), params.head_branch.clone()));
        self.check_failure()?;

        if let Some(existing) = self.existing.lock().unwrap().get(&params.head_branch) {
            return Ok(existing.clone());
        }

        Ok(PullRequestInfo {
            id: self.next_number * 10,
            number: self.next_number,
            url: format!("https://github.com/mock/pull/{}", self.next_number),
            created: true,
            base_branch: params
                .base_branch
                .clone()
                .unwrap_or_else(|| "main".to_string()),
        })
    }

    async fn get_pull_request_status(
        &self,
        _owner: &str,
        _repo: &str,
        pr_number: u64,
    ) -> Result<PullRequestStatus> {
        self.calls
            .lock()
            .unwrap()
            .push(("status".to_string(), pr_number.to_string()));
        self.check_failure()?;

        self.statuses
            .lock()
            .unwrap()
            .get(&pr_number)
            .cloned()
            .ok_or_else(|| {
                ReforgeError::PullRequestService(format!("no status scripted for #{}", pr_number))
            })
    }
}
