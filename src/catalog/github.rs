//! GitHub REST implementation of the catalog transport.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{CatalogTransport, FetchError, FetchErrorKind};
use crate::models::{MetadataRecord, RepoIdentifier};

const USER_AGENT_VALUE: &str = concat!("challenge-hub/", env!("CARGO_PKG_VERSION"));
const CONTRIBUTORS_PAGE_SIZE: u32 = 100;
const VIEWER: &str = "viewer";

#[derive(Debug, Deserialize)]
struct RepoPayload {
    id: u64,
    name: String,
    #[serde(default)]
    description: Option<String>,
    owner: OwnerPayload,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct OwnerPayload {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ContributorPayload {
    /// Absent for anonymous contributors.
    #[serde(default)]
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ViewerPayload {
    login: String,
}

/// Catalog client speaking the GitHub REST API.
pub struct GithubCatalog {
    http: reqwest::Client,
    base_url: String,
    credential: RwLock<Option<String>>,
}

impl GithubCatalog {
    pub fn new(base_url: &str, credential: Option<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credential: RwLock::new(credential.filter(|c| !c.trim().is_empty())),
        })
    }

    fn credential(&self) -> Option<String> {
        self.credential
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, USER_AGENT_VALUE);
        match self.credential() {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Send a request, classifying every failure. `None` is an empty listing.
    async fn send(&self, label: &str, request: RequestBuilder) -> Result<Option<Response>, FetchError> {
        let resp = request
            .send()
            .await
            .map_err(|e| FetchError::new(label, FetchErrorKind::Transport, e.to_string()))?;

        let status = resp.status();
        // An empty project answers 204 on contributors and 409 on commits.
        if status == StatusCode::NO_CONTENT || status == StatusCode::CONFLICT {
            return Ok(None);
        }
        if let Some(kind) = classify_status(status, resp.headers()) {
            return Err(FetchError::new(label, kind, format!("status {}", status)));
        }
        Ok(Some(resp))
    }

    /// Send a request and decode a JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        label: &str,
        request: RequestBuilder,
    ) -> Result<Option<T>, FetchError> {
        let Some(resp) = self.send(label, request).await? else {
            return Ok(None);
        };
        resp.json::<T>()
            .await
            .map(Some)
            .map_err(|e| FetchError::new(label, FetchErrorKind::Transport, e.to_string()))
    }

    /// Count the items of a listing by requesting one per page and reading
    /// the last page number off the `Link` header.
    async fn count_items(&self, label: &str, path: &str) -> Result<u64, FetchError> {
        let separator = if path.contains('?') { '&' } else { '?' };
        let request = self.get(&format!("{}{}per_page=1", path, separator));
        let Some(resp) = self.send(label, request).await? else {
            return Ok(0);
        };
        if let Some(last) = last_page(resp.headers()) {
            return Ok(last);
        }
        // Single page: zero or one item.
        let items: Vec<serde_json::Value> = resp
            .json()
            .await
            .map_err(|e| FetchError::new(label, FetchErrorKind::Transport, e.to_string()))?;
        Ok(items.len() as u64)
    }
}

#[async_trait]
impl CatalogTransport for GithubCatalog {
    async fn fetch_record(
        &self,
        identifier: &RepoIdentifier,
        requested_at: DateTime<Utc>,
        activity_since: Option<DateTime<Utc>>,
    ) -> Result<MetadataRecord, FetchError> {
        let label = identifier.key();
        let repo_path = format!("/repos/{}/{}", identifier.owner, identifier.name);

        let repo: RepoPayload = self
            .get_json(&label, self.get(&repo_path))
            .await?
            .ok_or_else(|| {
                FetchError::new(&label, FetchErrorKind::Transport, "empty project response")
            })?;

        // An empty project answers 204 with no contributor list.
        let contributors: Vec<ContributorPayload> = self
            .get_json(
                &label,
                self.get(&format!(
                    "{}/contributors?per_page={}",
                    repo_path, CONTRIBUTORS_PAGE_SIZE
                )),
            )
            .await?
            .unwrap_or_default();

        let pull_request_count = self
            .count_items(&label, &format!("{}/pulls?state=all", repo_path))
            .await?;
        // The issues listing includes pull requests.
        let issue_count = self
            .count_items(&label, &format!("{}/issues?state=all", repo_path))
            .await?
            .saturating_sub(pull_request_count);
        let commits_path = match activity_since {
            Some(since) => format!(
                "{}/commits?since={}",
                repo_path,
                since.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            None => format!("{}/commits", repo_path),
        };
        let commit_count = self.count_items(&label, &commits_path).await?;

        Ok(MetadataRecord {
            identifier: identifier.clone(),
            resolved_name: repo.name,
            resolved_description: repo.description,
            owner: repo.owner.login,
            remote_id: repo.id.to_string(),
            html_url: repo.html_url,
            primary_language: repo.language,
            stargazer_count: repo.stargazers_count,
            fork_count: repo.forks_count,
            pull_request_count,
            issue_count,
            commit_count,
            last_updated_at: repo.pushed_at.max(repo.updated_at),
            fetched_at: requested_at,
            contributors: contributors.into_iter().filter_map(|c| c.login).collect(),
        })
    }

    async fn viewer_login(&self) -> Result<Option<String>, FetchError> {
        if self.credential().is_none() {
            return Ok(None);
        }
        let viewer: Option<ViewerPayload> = self.get_json(VIEWER, self.get("/user")).await?;
        viewer
            .map(|v| Some(v.login))
            .ok_or_else(|| FetchError::new(VIEWER, FetchErrorKind::Transport, "empty viewer"))
    }

    fn has_credential(&self) -> bool {
        self.credential().is_some()
    }

    fn clear_credential(&self) {
        *self
            .credential
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

/// Map an HTTP status to a failure kind; `None` means success.
///
/// A 403 is a rate limit only when the catalog says the quota is spent.
pub fn classify_status(status: StatusCode, headers: &HeaderMap) -> Option<FetchErrorKind> {
    if status.is_success() {
        return None;
    }
    let quota_spent = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false);
    let kind = match status {
        StatusCode::TOO_MANY_REQUESTS => FetchErrorKind::RateLimited,
        StatusCode::FORBIDDEN if quota_spent || headers.contains_key("retry-after") => {
            FetchErrorKind::RateLimited
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchErrorKind::Unauthorized,
        StatusCode::NOT_FOUND => FetchErrorKind::NotFound,
        _ => FetchErrorKind::Transport,
    };
    Some(kind)
}

/// Page number of the `rel="last"` link, if the listing spans pages.
fn last_page(headers: &HeaderMap) -> Option<u64> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        if !params.contains("rel=\"last\"") {
            return None;
        }
        let target = target.trim().trim_start_matches('<').trim_end_matches('>');
        let url = Url::parse(target).ok()?;
        let page = url
            .query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok());
        page
    })
}
