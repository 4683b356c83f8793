//! Request/reply transport for enveloped RQL.
//!
//! [`Transport`] is the seam between the session and the network: it knows
//! the server's version and delivers one enveloped query at a time.
//! [`HttpTransport`] is the real implementation over SOAP/HTTP.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use reddot_core::ServerVersion;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};

use crate::envelope::{self, Credentials, IoDataFormat};
use crate::error::{Result, RqlError};
use crate::probe::{self, VERSION_INFO_PATH};
use crate::redact::redact;
use crate::soap::SoapDialect;

/// Delivers RQL to one server.
///
/// Calls block until the server answers or the transport gives up. Nothing
/// is retried.
pub trait Transport: Send + Sync {
    /// Name of the server, for error messages and logs
    fn server_name(&self) -> &str;

    /// The server's build version
    fn server_version(&self) -> Result<ServerVersion>;

    /// Send a complete `IODATA` payload and return the raw reply
    fn send(&self, payload: &str) -> Result<String>;

    /// Wrap `query` in the envelope `format` and send it
    fn execute(&self, query: &str, format: IoDataFormat, credentials: Credentials<'_>) -> Result<String> {
        self.send(&envelope::wrap(query, format, credentials))
    }
}

/// Configuration for the HTTP transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Send/receive timeout per call
    pub timeout: Duration,
    /// Replies larger than this are rejected
    pub max_response_bytes: usize,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10 * 60),
            max_response_bytes: 20 * 1024 * 1024,
            user_agent: concat!("reddot/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// SOAP over HTTP.
pub struct HttpTransport {
    name: String,
    base_url: String,
    config: TransportConfig,
    client: Client,
    version: Mutex<Option<ServerVersion>>,
}

impl HttpTransport {
    /// Create a transport for the server at `base_url` (e.g. `http://cms/cms/`).
    pub fn new(name: impl Into<String>, base_url: &str, config: TransportConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let mut base_url = base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            name: name.into(),
            base_url,
            config,
            client,
            version: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn connection_error(&self, url: &str, message: impl Into<String>) -> RqlError {
        RqlError::Connection {
            url: url.to_string(),
            message: message.into(),
        }
    }

    fn map_send_error(&self, url: &str, err: reqwest::Error) -> RqlError {
        if err.is_connect() || err.is_timeout() {
            tracing::error!("Server not found: {}", url);
            self.connection_error(url, err.to_string())
        } else {
            RqlError::Http(err)
        }
    }

    fn read_body(&self, url: &str, response: reqwest::blocking::Response) -> Result<String> {
        let limit = self.config.max_response_bytes;
        if response.content_length().is_some_and(|len| len as usize > limit) {
            return Err(self.connection_error(url, format!("response exceeds {limit} bytes")));
        }
        let body = response.text().map_err(|e| self.map_send_error(url, e))?;
        if body.len() > limit {
            return Err(self.connection_error(url, format!("response exceeds {limit} bytes")));
        }
        Ok(body)
    }

    fn probe_version(&self) -> Result<ServerVersion> {
        let url = format!("{}{}", self.base_url, VERSION_INFO_PATH);
        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, &self.config.user_agent)
            .send()
            .map_err(|e| self.map_send_error(&url, e))?;

        if !response.status().is_success() {
            return Err(self.connection_error(&url, format!("HTTP {}", response.status())));
        }

        let html = self.read_body(&url, response)?;
        probe::parse_version_info(&html)
            .ok_or_else(|| self.connection_error(&url, "could not determine server version"))
    }
}

impl Transport for HttpTransport {
    fn server_name(&self) -> &str {
        &self.name
    }

    fn server_version(&self) -> Result<ServerVersion> {
        let mut cached = self.version.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(version) = *cached {
            return Ok(version);
        }
        let version = self.probe_version()?;
        tracing::debug!("server {} reports version {}", self.name, version);
        *cached = Some(version);
        Ok(version)
    }

    fn send(&self, payload: &str) -> Result<String> {
        let dialect = SoapDialect::for_version(&self.server_version()?);
        let url = format!("{}{}", self.base_url, dialect.path());

        tracing::debug!("Sending RQL [{}]: {}", self.name, redact(payload));

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", format!("\"{}\"", dialect.soap_action()))
            .header(USER_AGENT, &self.config.user_agent)
            .body(dialect.request(payload))
            .send()
            .map_err(|e| self.map_send_error(&url, e))?;

        let status = response.status();
        let body = self.read_body(&url, response)?;

        let result = match dialect.parse_response(&self.name, &body) {
            Err(RqlError::Soap(message)) if !status.is_success() => {
                return Err(self.connection_error(&url, format!("HTTP {status}: {message}")));
            }
            other => other?,
        };

        tracing::debug!("Received RQL [{}]: {}", self.name, result);
        Ok(result)
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("config", &self.config)
            .finish()
    }
}
