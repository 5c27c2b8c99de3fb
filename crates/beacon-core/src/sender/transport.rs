//! HTTP transport seam.
//!
//! The sender only needs "POST these bytes with these headers and tell me the
//! status". Keeping that behind a trait lets tests count attempts and record
//! backoff delays without a network or real sleeps.

use std::time::Duration;

use thiserror::Error;

/// Status line of a collector response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    /// Raw `Retry-After` header, if present.
    pub retry_after: Option<String>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
}

pub trait Transport: Send + Sync {
    fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<HttpReply, TransportError>;

    /// Wait between attempts.
    fn pause(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Blocking transport with a per-request timeout.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        UreqTransport {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Transport for UreqTransport {
    fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<HttpReply, TransportError> {
        let mut request = self.agent.post(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }
        match request.send_bytes(body) {
            Ok(response) => Ok(reply(response.status(), &response)),
            Err(ureq::Error::Status(status, response)) => Ok(reply(status, &response)),
            Err(ureq::Error::Transport(e)) => Err(TransportError::Network(e.to_string())),
        }
    }
}

fn reply(status: u16, response: &ureq::Response) -> HttpReply {
    HttpReply {
        status,
        retry_after: response.header("Retry-After").map(str::to_string),
    }
}
