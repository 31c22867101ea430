//! Layered reachability probes
//!
//! A target is probed in two steps:
//!
//! 1. **Transport**: a TCP connection to `host:port`, bounded by a timeout
//! 2. **Application**: a plain `GET http://host:port`, sent only if step 1 succeeded
//!
//! Any HTTP response counts as reachable; the status code is kept for logging.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// Layer at which a probe failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeLayer {
    Transport,
    Application,
}

impl fmt::Display for ProbeLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeLayer::Transport => write!(f, "TCP"),
            ProbeLayer::Application => write!(f, "HTTP"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("TCP connection failed: {0}")]
    Transport(String),

    #[error("HTTP request failed: {0}")]
    Application(String),
}

impl ProbeError {
    pub fn layer(&self) -> ProbeLayer {
        match self {
            ProbeError::Transport(_) => ProbeLayer::Transport,
            ProbeError::Application(_) => ProbeLayer::Application,
        }
    }
}

/// Checks whether an address is reachable
///
/// Returns the HTTP status code on success.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, address: &str) -> Result<u16, ProbeError>;
}

/// [`Prober`] that talks to the network
pub struct NetworkProber {
    client: reqwest::Client,
    timeout: Duration,
}

impl NetworkProber {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    async fn probe_transport(&self, address: &str) -> Result<(), ProbeError> {
        let stream = timeout(self.timeout, TcpStream::connect(address))
            .await
            .map_err(|_| {
                ProbeError::Transport(format!("timed out after {}ms", self.timeout.as_millis()))
            })?
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        // only reachability matters, the HTTP probe opens its own connection
        drop(stream);
        Ok(())
    }

    async fn probe_application(&self, address: &str) -> Result<u16, ProbeError> {
        let url = format!("http://{address}");
        trace!("requesting {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProbeError::Application(e.to_string()))?;

        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl Prober for NetworkProber {
    async fn probe(&self, address: &str) -> Result<u16, ProbeError> {
        self.probe_transport(address).await?;
        self.probe_application(address).await
    }
}
