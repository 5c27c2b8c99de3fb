//! In-process fake collector for no-mock delivery tests.
//!
//! Listens on an ephemeral localhost port, records every request, and
//! answers from a script of status codes (200 once the script runs out).

#![allow(dead_code)]
// Shared by several test binaries; not every one uses every helper.

use std::collections::VecDeque;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value;

/// One request as the collector saw it.
#[derive(Debug, Clone)]
pub struct Received {
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Received {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parsed body (uncompressed deliveries only).
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("body is JSON")
    }

    pub fn event_count(&self) -> usize {
        self.json()["events"].as_array().map_or(0, Vec::len)
    }
}

/// Scripted reply.
#[derive(Debug, Clone, Copy)]
pub struct Reply {
    pub status: u16,
    pub retry_after: Option<u64>,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Reply {
            status,
            retry_after: None,
        }
    }
}

pub struct FakeCollector {
    url: String,
    received: Arc<Mutex<Vec<Received>>>,
    shutdown: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl FakeCollector {
    pub fn start() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn scripted(replies: Vec<Reply>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind fake collector");
        let addr = server
            .server_addr()
            .to_ip()
            .expect("fake collector listens on TCP");

        let received = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let script = Mutex::new(VecDeque::from(replies));

        let thread = {
            let received = Arc::clone(&received);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                while !shutdown.load(Ordering::SeqCst) {
                    let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                        Ok(Some(request)) => request,
                        Ok(None) => continue,
                        Err(_) => break,
                    };

                    let mut body = Vec::new();
                    let _ = request.as_reader().read_to_end(&mut body);
                    let headers = request
                        .headers()
                        .iter()
                        .map(|h| (h.field.as_str().to_string(), h.value.as_str().to_string()))
                        .collect();
                    received.lock().unwrap().push(Received {
                        path: request.url().to_string(),
                        headers,
                        body,
                    });

                    let reply = script
                        .lock()
                        .unwrap()
                        .pop_front()
                        .unwrap_or(Reply::status(200));
                    let mut response =
                        tiny_http::Response::from_string("{}").with_status_code(reply.status);
                    if let Some(secs) = reply.retry_after {
                        let header = tiny_http::Header::from_bytes(
                            &b"Retry-After"[..],
                            secs.to_string().as_bytes(),
                        )
                        .expect("valid header");
                        response = response.with_header(header);
                    }
                    let _ = request.respond(response);
                }
            })
        };

        FakeCollector {
            url: format!("http://{}/ingest", addr),
            received,
            shutdown,
            thread: Some(thread),
        }
    }

    /// Ingest endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    pub fn total_events(&self) -> usize {
        self.received().iter().map(Received::event_count).sum()
    }
}

impl Drop for FakeCollector {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// A localhost URL nothing is listening on.
pub fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe port");
    let addr = listener.local_addr().expect("probe address");
    drop(listener);
    format!("http://{}/ingest", addr)
}
