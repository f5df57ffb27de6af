//! Mock upstreams for transport and pipeline tests
//!
//! [MockUpstream] is a jsonrpsee server with per-method handlers that records every call.
//! [RawUpstream] answers with canned HTTP status codes and bodies, for cases a JSON-RPC server
//! cannot produce (rate limiting, gateway errors, error objects on a 5xx).

use jsonrpsee::{
    server::{ServerBuilder, ServerHandle},
    types::ErrorObjectOwned,
    RpcModule,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

pub type Handler = Box<dyn Fn(Value) -> Result<Value, ErrorObjectOwned> + Send + Sync>;

/// JSON-RPC upstream recording every call it serves
pub struct MockUpstream {
    pub url: String,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
    _handle: ServerHandle,
}

impl MockUpstream {
    pub fn builder() -> MockUpstreamBuilder {
        MockUpstreamBuilder { methods: Vec::new() }
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(method, _)| method.clone()).collect()
    }

    /// Params of the first call to `method`
    pub fn params(&self, method: &str) -> Option<Value> {
        self.calls.lock().iter().find(|(m, _)| m == method).map(|(_, params)| params.clone())
    }
}

pub struct MockUpstreamBuilder {
    methods: Vec<(&'static str, Handler)>,
}

impl MockUpstreamBuilder {
    /// Serves `name` with `handler`, replacing an earlier handler for the same method
    pub fn method<F>(mut self, name: &'static str, handler: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ErrorObjectOwned> + Send + Sync + 'static,
    {
        self.methods.retain(|(existing, _)| *existing != name);
        self.methods.push((name, Box::new(handler)));
        self
    }

    pub async fn start(self) -> MockUpstream {
        let server = ServerBuilder::default().build("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", server.local_addr().unwrap());
        let calls = Arc::new(Mutex::new(Vec::new()));

        let mut module = RpcModule::new(calls.clone());
        for (name, handler) in self.methods {
            module
                .register_method(name, move |params, calls| {
                    let params: Value = params.parse().unwrap_or(Value::Null);
                    calls.lock().push((name.to_string(), params.clone()));
                    handler(params)
                })
                .unwrap();
        }

        MockUpstream { url, calls, _handle: server.start(module) }
    }
}

pub fn rpc_error(code: i32, message: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, message.to_string(), None::<()>)
}

pub fn handler<F>(f: F) -> Handler
where
    F: Fn(Value) -> Result<Value, ErrorObjectOwned> + Send + Sync + 'static,
{
    Box::new(f)
}

/// Plain HTTP upstream answering with canned `(status, body)` pairs in order (the last one
/// repeats) and recording raw requests
pub struct RawUpstream {
    pub url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl RawUpstream {
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            let mut served = 0usize;
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { return };
                let request = read_request(&mut socket).await;
                recorded.lock().push(request);

                let (status, body) = responses[served.min(responses.len() - 1)].clone();
                served += 1;
                let response = format!(
                    "HTTP/1.1 {status} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    if status == 200 { "OK" } else { "Error" },
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { url, requests }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}
