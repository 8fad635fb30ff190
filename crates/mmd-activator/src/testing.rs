//! Test doubles: fake loaders and libraries, and an HTTP stub for the
//! network backends.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use mmd_dom::Document;

use crate::activator::CONTAINER_SELECTOR;
use crate::config::LibraryConfig;
use crate::error::LoadError;
use crate::library::{DiagramLibrary, RenderSummary};
use crate::loader::LibraryLoader;

/// Library that records calls and counts containers as rendered.
#[derive(Default)]
pub(crate) struct RecordingLibrary {
    pub configs: Mutex<Vec<LibraryConfig>>,
    /// Number of containers seen by each render pass.
    pub passes: Mutex<Vec<usize>>,
    /// Thread each render pass ran on.
    pub threads: Mutex<Vec<thread::ThreadId>>,
}

impl DiagramLibrary for RecordingLibrary {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn initialize(&self, config: &LibraryConfig) {
        self.configs.lock().unwrap().push(*config);
    }

    fn init(&self, document: &mut Document) -> RenderSummary {
        let containers = document.select_outermost(&CONTAINER_SELECTOR).len();
        self.passes.lock().unwrap().push(containers);
        self.threads.lock().unwrap().push(thread::current().id());
        RenderSummary {
            rendered: containers,
            ..RenderSummary::default()
        }
    }
}

/// Loader handing out one shared [`RecordingLibrary`], counting loads.
#[derive(Clone, Default)]
pub(crate) struct CountingLoader {
    pub library: Arc<RecordingLibrary>,
    pub loads: Arc<AtomicUsize>,
    /// Loads that fail before the first success.
    pub failures: usize,
}

impl CountingLoader {
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LibraryLoader for CountingLoader {
    fn describe(&self) -> String {
        "counting".to_owned()
    }

    async fn load(&self) -> Result<Arc<dyn DiagramLibrary>, LoadError> {
        let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if attempt < self.failures {
            return Err(LoadError::Status {
                url: "https://cdn.example/mermaid.mjs".to_owned(),
                status: 503,
            });
        }
        Ok(Arc::clone(&self.library) as Arc<dyn DiagramLibrary>)
    }
}

/// Loader that never completes.
pub(crate) struct PendingLoader;

#[async_trait]
impl LibraryLoader for PendingLoader {
    fn describe(&self) -> String {
        "pending".to_owned()
    }

    async fn load(&self) -> Result<Arc<dyn DiagramLibrary>, LoadError> {
        std::future::pending().await
    }
}

/// Request as seen by the stub.
#[derive(Debug)]
pub(crate) struct Recorded {
    /// Request line, e.g. `POST /mermaid/svg HTTP/1.1`.
    pub line: String,
    /// Header lines, names lowercased.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Stub server answering one connection per queued response, in order.
pub(crate) struct StubServer {
    pub url: String,
    requests: mpsc::Receiver<Recorded>,
}

impl StubServer {
    pub fn start(responses: Vec<(u16, Vec<u8>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let (tx, requests) = mpsc::channel();

        thread::spawn(move || {
            for (status, body) in responses {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                let Some(recorded) = answer(stream, status, &body) else {
                    return;
                };
                if tx.send(recorded).is_err() {
                    return;
                }
            }
        });

        Self { url, requests }
    }

    /// Next request the stub answered, waiting briefly for the handler.
    pub fn next_request(&self) -> Recorded {
        self.requests.recv_timeout(Duration::from_secs(5)).unwrap()
    }
}

/// URL of a port nothing listens on.
pub(crate) fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    format!("http://{}", listener.local_addr().unwrap())
}

fn answer(stream: TcpStream, status: u16, body: &[u8]) -> Option<Recorded> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;

    let mut headers = Vec::new();
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_owned()));
        }
    }

    let length = headers
        .iter()
        .find(|(name, _)| name == "content-length")
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut request_body = vec![0; length];
    reader.read_exact(&mut request_body).ok()?;

    let reason = if status < 400 { "OK" } else { "Error" };
    let mut stream = reader.into_inner();
    let head = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).ok()?;
    stream.write_all(body).ok()?;
    stream.flush().ok()?;

    Some(Recorded {
        line: line.trim_end().to_owned(),
        headers,
        body: request_body,
    })
}
