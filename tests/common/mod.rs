//! Minimal in-process Pushgateway stand-in.
//!
//! Speaks just enough HTTP/1.1 (keep-alive, `content-length` bodies) to
//! record each request and answer with a scripted status code.

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

struct State {
    /// Answered in order; the last one repeats once the script runs out.
    statuses: Vec<u16>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl State {
    fn record(&self, request: RecordedRequest) -> u16 {
        let mut requests = self.requests.lock().unwrap();
        let index = requests.len().min(self.statuses.len() - 1);
        requests.push(request);
        self.statuses[index]
    }
}

pub struct StubGateway {
    url: String,
    state: Arc<State>,
}

impl StubGateway {
    pub async fn start(statuses: &[u16]) -> Self {
        assert!(!statuses.is_empty());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(State {
            statuses: statuses.to_vec(),
            requests: Mutex::new(Vec::new()),
        });

        let accept_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = accept_state.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, state).await;
                });
            }
        });

        Self { url, state }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn serve(stream: TcpStream, state: Arc<State>) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    loop {
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).await? == 0 {
            return Ok(());
        }
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default().to_string();
        let path = parts.next().unwrap_or_default().to_string();

        let mut content_length = 0usize;
        let mut content_type = None;
        loop {
            let mut header = String::new();
            if reader.read_line(&mut header).await? == 0 {
                return Ok(());
            }
            let header = header.trim_end();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                match name.trim().to_ascii_lowercase().as_str() {
                    "content-length" => content_length = value.trim().parse().unwrap_or(0),
                    "content-type" => content_type = Some(value.trim().to_string()),
                    _ => {}
                }
            }
        }

        let mut body = vec![0; content_length];
        reader.read_exact(&mut body).await?;

        let status = state.record(RecordedRequest {
            method,
            path,
            content_type,
            body,
        });

        let reply = format!("status {}", status);
        let response = format!(
            "HTTP/1.1 {} Stub\r\ncontent-type: text/plain\r\ncontent-length: {}\r\n\r\n{}",
            status,
            reply.len(),
            reply
        );
        write.write_all(response.as_bytes()).await?;
        write.flush().await?;
    }
}
