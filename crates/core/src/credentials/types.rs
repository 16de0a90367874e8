//! Credential types and curl header extraction.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while handling credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential index {index} out of range (pool has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("credential is empty")]
    Empty,

    #[error("credential has no authorization header")]
    MissingAuthorization,

    #[error("no {0} credential configured")]
    NotConfigured(CredentialKind),

    #[error("credential store error: {0}")]
    Store(String),
}

/// The two independent credential pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Raw curl text captured from the generation backend.
    Generation,
    /// OAuth access token for the publishing platform.
    Publishing,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::Generation => "generation",
            CredentialKind::Publishing => "publishing",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CredentialKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generation" => Ok(CredentialKind::Generation),
            "publishing" => Ok(CredentialKind::Publishing),
            other => Err(format!("unknown credential kind: {}", other)),
        }
    }
}

/// An opaque credential and its position in the pool it was taken from.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEntry {
    /// Zero-based position in the persisted pool.
    pub position: usize,
    pub secret: String,
}

impl CredentialEntry {
    pub fn new(position: usize, secret: impl Into<String>) -> Self {
        Self {
            position,
            secret: secret.into(),
        }
    }

    /// Short, log-safe form of the secret.
    pub fn redacted(&self) -> String {
        let prefix: String = self.secret.chars().take(5).collect();
        format!("#{} {}...", self.position + 1, prefix)
    }
}

impl fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("position", &self.position)
            .field("secret", &self.redacted())
            .finish()
    }
}

static SINGLE_QUOTED_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:-H|--header)\s+'([^':]+):\s*([^']*)'"#).expect("valid regex")
});

static DOUBLE_QUOTED_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:-H|--header)\s+"([^":]+):\s*([^"]*)""#).expect("valid regex")
});

static BARE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:-H|--header)\s+([^:\s'"]+):\s*([^'"\s]+)"#).expect("valid regex")
});

/// Extract `-H 'name: value'` pairs from a curl command line.
///
/// Header names are lower-cased. Quoted headers take precedence; the bare
/// form is only consulted when no quoted header is present.
pub fn parse_curl_headers(curl: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();

    for re in [&*SINGLE_QUOTED_HEADER, &*DOUBLE_QUOTED_HEADER] {
        for caps in re.captures_iter(curl) {
            headers.insert(caps[1].trim().to_lowercase(), caps[2].trim().to_string());
        }
    }

    if headers.is_empty() {
        for caps in BARE_HEADER.captures_iter(curl) {
            headers.insert(caps[1].trim().to_lowercase(), caps[2].trim().to_string());
        }
    }

    headers
}

/// Headers needed to talk to the generation backend.
#[derive(Clone, PartialEq, Eq)]
pub struct GenerationAuth {
    pub authorization: String,
    pub sentinel_token: Option<String>,
    /// Pool position the headers were parsed from (for diagnostics).
    pub position: usize,
}

impl GenerationAuth {
    /// Build auth headers from a generation credential.
    ///
    /// Accepts either a captured curl command or a bare `Bearer ...` value.
    pub fn from_entry(entry: &CredentialEntry) -> Result<Self, CredentialError> {
        let raw = entry.secret.trim();
        if raw.is_empty() {
            return Err(CredentialError::Empty);
        }

        if raw.starts_with("Bearer ") {
            return Ok(Self {
                authorization: raw.to_string(),
                sentinel_token: None,
                position: entry.position,
            });
        }

        let mut headers = parse_curl_headers(raw);
        let authorization = headers
            .remove("authorization")
            .filter(|v| !v.is_empty())
            .ok_or(CredentialError::MissingAuthorization)?;

        Ok(Self {
            authorization,
            sentinel_token: headers.remove("openai-sentinel-token"),
            position: entry.position,
        })
    }

    /// Human-facing account label, 1-based.
    pub fn account_label(&self) -> String {
        format!("#{}", self.position + 1)
    }
}

impl fmt::Debug for GenerationAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationAuth")
            .field("position", &self.position)
            .field("sentinel_token", &self.sentinel_token.is_some())
            .finish_non_exhaustive()
    }
}
