//!
//! src/test_support.rs  Andrew Belles  Oct 16th, 2026
//!
//! Canned http server on loopback so fetch paths run against real sockets
//!

use std::{collections::HashMap, sync::{Arc, Mutex}};

use tokio::{io::{AsyncReadExt, AsyncWriteExt}, net::TcpListener};
use url::Url;

/// Loopback requests must never go through an ambient proxy
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

#[derive(Clone)]
pub struct Canned {
    pub status: u16,
    pub body: String,
    pub content_length: bool,
    pub location: Option<String>
}

impl Canned {
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: 200, body: body.into(), content_length: true, location: None }
    }

    pub fn status(status: u16) -> Self {
        Self { status, body: String::new(), content_length: true, location: None }
    }

    /// Body delimited by connection close only
    pub fn streamed(body: impl Into<String>) -> Self {
        Self { status: 200, body: body.into(), content_length: false, location: None }
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        Self { location: Some(location.into()), ..Self::status(302) }
    }
}

pub struct CannedServer {
    pub base: Url,
    hits: Arc<Mutex<Vec<(String, String)>>>
}

impl CannedServer {
    /// Every request seen, as `path?query`, in arrival order
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().iter().map(|(_, target)| target.clone()).collect()
    }

    /// Same as hits, prefixed with the method: `HEAD /s/abc`
    pub fn requests(&self) -> Vec<String> {
        self.hits.lock().unwrap().iter().map(|(m, target)| format!("{m} {target}")).collect()
    }

    pub fn paths(&self) -> Vec<String> {
        self.hits().into_iter()
            .map(|h| h.split('?').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn url(&self, path: &str) -> Url {
        self.base.join(path).unwrap()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        302 => "Found",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _   => "Status",
    }
}

/// Serves routes keyed by `METHOD /path` or plain `/path`, the
/// method specific key winning; unknown paths get a 404
pub async fn serve(routes: Vec<(&str, Canned)>) -> CannedServer {
    let routes: HashMap<String, Canned> = routes.into_iter()
        .map(|(p, c)| (p.to_string(), c))
        .collect();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(Mutex::new(Vec::new()));

    let seen = hits.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { return };

            let mut request = Vec::new();
            let mut buf = [0u8; 2048];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let head = String::from_utf8_lossy(&request).to_string();
            let mut parts = head.split_whitespace();
            let method = parts.next().unwrap_or_default().to_string();
            let target = parts.next().unwrap_or("/").to_string();
            seen.lock().unwrap().push((method.clone(), target.clone()));

            let path = target.split('?').next().unwrap_or("/");
            let canned = routes.get(&format!("{method} {path}"))
                .or_else(|| routes.get(path))
                .cloned()
                .unwrap_or_else(|| Canned::status(404));

            let mut response = format!("HTTP/1.1 {} {}\r\n", canned.status, reason(canned.status));
            if canned.content_length {
                response.push_str(&format!("Content-Length: {}\r\n", canned.body.len()));
            }
            if let Some(location) = &canned.location {
                response.push_str(&format!("Location: {location}\r\n"));
            }
            response.push_str("Connection: close\r\n\r\n");
            if method != "HEAD" {
                response.push_str(&canned.body);
            }
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    CannedServer {
        base: Url::parse(&format!("http://{addr}/")).unwrap(),
        hits
    }
}
