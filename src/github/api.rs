use crate::process::SystemRunner;
use serde_json::Value;
use std::cell::OnceCell;
use std::time::Duration;
use thiserror::Error;

const API_ROOT: &str = "https://api.github.com";
const TIMEOUT: Duration = Duration::from_secs(3);

/// Everything that can go wrong talking to GitHub. Callers in the cache
/// layers turn these into "no data".
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("no GitHub token available")]
    NoToken,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("GitHub returned HTTP {0}")]
    Status(u16),

    #[error("unexpected payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait GitHubApi {
    /// Run a GraphQL query and return its `data` member.
    fn graphql(&self, query: &str, variables: Value) -> Result<Value, ApiError>;

    /// `GET` a REST path such as `/repos/o/r/branches/main`. Non-2xx
    /// statuses are returned, not raised.
    fn get(&self, path: &str) -> Result<ApiResponse, ApiError>;
}

/// Blocking GitHub client. No retries; every request shares a short global
/// timeout.
pub struct UreqApi {
    agent: ureq::Agent,
    token: OnceCell<Option<String>>,
}

impl UreqApi {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(TIMEOUT))
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            agent,
            token: OnceCell::new(),
        }
    }

    fn token(&self) -> Option<&str> {
        self.token
            .get_or_init(|| {
                super::cli::discover_token(&SystemRunner, &|key: &str| std::env::var(key).ok())
            })
            .as_deref()
    }
}

impl Default for UreqApi {
    fn default() -> Self {
        Self::new()
    }
}

impl GitHubApi for UreqApi {
    fn graphql(&self, query: &str, variables: Value) -> Result<Value, ApiError> {
        let token = self.token().ok_or(ApiError::NoToken)?;
        let payload = serde_json::json!({ "query": query, "variables": variables });

        let mut resp = self
            .agent
            .post(&format!("{}/graphql", API_ROOT))
            .header("Authorization", &format!("bearer {}", token))
            .header("User-Agent", "git-branches")
            .header("Content-Type", "application/json")
            .send(payload.to_string())
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(ApiError::Status(status));
        }
        let body = resp
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let mut envelope: Value = serde_json::from_str(&body)?;
        if let Some(errors) = envelope.get("errors") {
            log::debug!("graphql errors: {}", errors);
        }
        match envelope.get_mut("data").map(Value::take) {
            Some(data) if !data.is_null() => Ok(data),
            _ => Err(ApiError::Transport("response carried no data".to_string())),
        }
    }

    fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", API_ROOT, path);
        log::debug!("GET {}", url);

        let mut request = self
            .agent
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "git-branches");
        if let Some(token) = self.token() {
            request = request.header("Authorization", &format!("token {}", token));
        }

        let mut resp = request
            .call()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp.body_mut().read_to_string().unwrap_or_default();
        Ok(ApiResponse { status, body })
    }
}
