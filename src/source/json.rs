//! JSON-over-HTTP boundary.
//!
//! [`JsonTransport`] is the only place network I/O happens.  Everything it
//! returns is a parsed [`Document`] whose accessors turn a missing or
//! mistyped field into [`FetchError::Parse`] instead of a default value.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use super::FetchError;

/// Fetches a URL and parses the body as JSON.
#[async_trait]
pub trait JsonTransport: Send + Sync {
    async fn fetch_json(&self, url: &Url) -> Result<Document, FetchError>;
}

/// [`JsonTransport`] backed by a shared [`reqwest::Client`].
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl JsonTransport for HttpTransport {
    async fn fetch_json(&self, url: &Url) -> Result<Document, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        Document::parse(&body)
    }
}

/// Build `base` with the given query parameters appended.
pub fn build_url(base: &str, params: &[(&str, &str)]) -> Result<Url, FetchError> {
    Url::parse_with_params(base, params)
        .map_err(|e| FetchError::Config(format!("invalid url `{base}`: {e}")))
}

// ---------------------------------------------------------------------------
// Parsed documents
// ---------------------------------------------------------------------------

/// A parsed JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Value,
}

impl Document {
    pub fn parse(bytes: &[u8]) -> Result<Self, FetchError> {
        serde_json::from_slice(bytes)
            .map(Self::from_value)
            .map_err(|e| FetchError::Parse(e.to_string()))
    }

    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> Node<'_> {
        Node(&self.root)
    }

    pub fn number(&self, path: &str) -> Result<f64, FetchError> {
        self.root().number(path)
    }

    pub fn integer(&self, path: &str) -> Result<i64, FetchError> {
        self.root().integer(path)
    }

    pub fn string(&self, path: &str) -> Result<&str, FetchError> {
        self.root().string(path)
    }
}

/// A borrowed view into a [`Document`].
///
/// Paths are dot separated; numeric segments index into arrays, so
/// `weather.0.icon` reads the `icon` of the first `weather` entry.  The empty
/// path is the node itself.
#[derive(Debug, Clone, Copy)]
pub struct Node<'a>(&'a Value);

impl<'a> Node<'a> {
    pub fn get(&self, path: &str) -> Option<&'a Value> {
        if path.is_empty() {
            return Some(self.0);
        }
        self.0.pointer(&format!("/{}", path.replace('.', "/")))
    }

    pub fn node(&self, path: &str) -> Result<Node<'a>, FetchError> {
        self.get(path).map(Node).ok_or_else(|| FetchError::missing(path))
    }

    pub fn number(&self, path: &str) -> Result<f64, FetchError> {
        self.get(path)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .ok_or_else(|| FetchError::missing(path))
    }

    pub fn integer(&self, path: &str) -> Result<i64, FetchError> {
        self.get(path)
            .and_then(Value::as_i64)
            .ok_or_else(|| FetchError::missing(path))
    }

    pub fn string(&self, path: &str) -> Result<&'a str, FetchError> {
        self.get(path)
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::missing(path))
    }

    /// A non-negative count, sent either as a JSON number or a numeric string.
    pub fn count(&self, path: &str) -> Result<u64, FetchError> {
        match self.get(path) {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| FetchError::missing(path))
    }

    pub fn items(&self, path: &str) -> Result<Vec<Node<'a>>, FetchError> {
        self.get(path)
            .and_then(Value::as_array)
            .map(|items| items.iter().map(Node).collect())
            .ok_or_else(|| FetchError::missing(path))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
