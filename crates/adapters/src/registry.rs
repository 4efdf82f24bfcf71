// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OCI registry tag listing.
//!
//! Speaks the `/v2/<repo>/tags/list` endpoint with the anonymous
//! Bearer-token handshake most public registries require: an
//! unauthenticated request answered with 401 carries a
//! `Www-Authenticate` challenge naming the token realm; a token fetched
//! from the realm unlocks the retry.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

/// Deadline for each registry HTTP request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors from registry tag listing
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("repository is required")]
    EmptyRepository,
    #[error("repository path is required")]
    MissingPath,
    #[error("registry authentication required for {repository}")]
    Unauthorized { repository: String },
    #[error("registry returned HTTP {status} for {repository}")]
    Http { status: u16, repository: String },
    #[error("failed to query registry tags for {repository}: {message}")]
    Request { repository: String, message: String },
    #[error("unsupported auth challenge")]
    UnsupportedChallenge,
    #[error("auth challenge missing realm")]
    MissingRealm,
    #[error("token endpoint returned HTTP {0}")]
    TokenHttp(u16),
    #[error("token response missing token")]
    MissingToken,
}

/// Adapter that lists the tags published for a repository
#[async_trait]
pub trait TagLister: Clone + Send + Sync + 'static {
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, RegistryError>;
}

/// HTTP implementation of [`TagLister`]
#[derive(Clone)]
pub struct RegistryTagLister {
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct TagListBody {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct TokenBody {
    #[serde(default)]
    token: String,
    #[serde(default)]
    access_token: String,
}

impl Default for RegistryTagLister {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryTagLister {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn fetch_tags(
        &self,
        host: &str,
        path: &str,
        token: Option<&str>,
    ) -> Result<Vec<String>, (Option<String>, RegistryError)> {
        let endpoint = format!("https://{host}/v2/{path}/tags/list");
        let mut request = self.client.get(&endpoint);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            (
                None,
                RegistryError::Request {
                    repository: path.to_string(),
                    message: e.to_string(),
                },
            )
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            let challenge = response
                .headers()
                .get("www-authenticate")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string());
            return Err((
                challenge,
                RegistryError::Unauthorized {
                    repository: path.to_string(),
                },
            ));
        }
        if !status.is_success() {
            return Err((
                None,
                RegistryError::Http {
                    status: status.as_u16(),
                    repository: path.to_string(),
                },
            ));
        }

        let body: TagListBody = response.json().await.map_err(|e| {
            (
                None,
                RegistryError::Request {
                    repository: path.to_string(),
                    message: format!("failed to decode tag response: {e}"),
                },
            )
        })?;
        Ok(body.tags)
    }

    async fn fetch_bearer_token(
        &self,
        challenge: &str,
        repository_path: &str,
    ) -> Result<String, RegistryError> {
        let (realm, service, scope) = parse_bearer_challenge(challenge)?;
        let scope = if scope.is_empty() {
            format!("repository:{repository_path}:pull")
        } else {
            scope
        };

        let mut query: Vec<(&str, &str)> = Vec::new();
        if !service.is_empty() {
            query.push(("service", service.as_str()));
        }
        query.push(("scope", scope.as_str()));

        let response = self
            .client
            .get(&realm)
            .query(&query)
            .send()
            .await
            .map_err(|e| RegistryError::Request {
                repository: repository_path.to_string(),
                message: format!("failed to fetch registry token: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::TokenHttp(status.as_u16()));
        }

        let body: TokenBody = response.json().await.map_err(|e| RegistryError::Request {
            repository: repository_path.to_string(),
            message: format!("failed to decode token response: {e}"),
        })?;

        if !body.token.is_empty() {
            return Ok(body.token);
        }
        if !body.access_token.is_empty() {
            return Ok(body.access_token);
        }
        Err(RegistryError::MissingToken)
    }
}

#[async_trait]
impl TagLister for RegistryTagLister {
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, RegistryError> {
        let (host, path) = parse_repository(repository)?;

        let (challenge, err) = match self.fetch_tags(&host, &path, None).await {
            Ok(tags) => return Ok(tags),
            Err(pair) => pair,
        };
        let Some(challenge) = challenge else {
            return Err(err);
        };

        let token = self.fetch_bearer_token(&challenge, &path).await?;
        self.fetch_tags(&host, &path, Some(&token))
            .await
            .map_err(|(_, err)| err)
    }
}

static BEARER_CHALLENGE_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z_]+)="([^"]*)""#).expect("constant regex pattern is valid")
});

/// Parse a `Bearer realm="...",service="...",scope="..."` challenge.
fn parse_bearer_challenge(challenge: &str) -> Result<(String, String, String), RegistryError> {
    let Some((prefix, rest)) = challenge.split_once(' ') else {
        return Err(RegistryError::UnsupportedChallenge);
    };
    if !prefix.eq_ignore_ascii_case("bearer") {
        return Err(RegistryError::UnsupportedChallenge);
    }

    let mut realm = String::new();
    let mut service = String::new();
    let mut scope = String::new();
    for captures in BEARER_CHALLENGE_PARAM.captures_iter(rest) {
        let value = captures[2].to_string();
        match captures[1].to_ascii_lowercase().as_str() {
            "realm" => realm = value,
            "service" => service = value,
            "scope" => scope = value,
            _ => {}
        }
    }

    if realm.is_empty() {
        return Err(RegistryError::MissingRealm);
    }
    Ok((realm, service, scope))
}

/// Split a repository into registry host and path.
///
/// The first path component is a registry host when it contains `.` or
/// `:` or is `localhost`; everything else goes to Docker Hub, with bare
/// names prefixed by `library/`.
fn parse_repository(repository: &str) -> Result<(String, String), RegistryError> {
    if repository.is_empty() {
        return Err(RegistryError::EmptyRepository);
    }

    let (first, rest) = match repository.split_once('/') {
        Some((first, rest)) => (first, Some(rest)),
        None => (repository, None),
    };

    if is_registry_host(first) {
        let Some(rest) = rest.filter(|r| !r.is_empty()) else {
            return Err(RegistryError::MissingPath);
        };
        return Ok((first.to_string(), rest.to_string()));
    }

    let path = if repository.contains('/') {
        repository.to_string()
    } else {
        format!("library/{repository}")
    };
    Ok(("registry-1.docker.io".to_string(), path))
}

fn is_registry_host(part: &str) -> bool {
    part == "localhost" || part.contains('.') || part.contains(':')
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{RegistryError, TagLister};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Fake tag lister scripted per repository
    #[derive(Clone, Default)]
    pub struct FakeTagLister {
        inner: Arc<Mutex<FakeState>>,
    }

    #[derive(Default)]
    struct FakeState {
        tags: HashMap<String, Vec<String>>,
        errors: HashMap<String, u16>,
        requests: Vec<String>,
    }

    impl FakeTagLister {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script the tags returned for a repository
        pub fn add_tags(&self, repository: &str, tags: &[&str]) {
            self.inner.lock().tags.insert(
                repository.to_string(),
                tags.iter().map(|t| t.to_string()).collect(),
            );
        }

        /// Script an HTTP error status for a repository
        pub fn fail_with_status(&self, repository: &str, status: u16) {
            self.inner
                .lock()
                .errors
                .insert(repository.to_string(), status);
        }

        /// Repositories that were queried, in order
        pub fn requests(&self) -> Vec<String> {
            self.inner.lock().requests.clone()
        }
    }

    #[async_trait]
    impl TagLister for FakeTagLister {
        async fn list_tags(&self, repository: &str) -> Result<Vec<String>, RegistryError> {
            let mut state = self.inner.lock();
            state.requests.push(repository.to_string());
            if let Some(status) = state.errors.get(repository) {
                return Err(RegistryError::Http {
                    status: *status,
                    repository: repository.to_string(),
                });
            }
            Ok(state.tags.get(repository).cloned().unwrap_or_default())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeTagLister;

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
