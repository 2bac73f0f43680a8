//! Scripted collaborators shared by the protocol tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use session_auth::{Credentials, TokenRefresher};

use crate::notify::SessionNotifier;
use crate::request::{RequestDescriptor, Transport, TransportError, TransportResponse};

/// Refresher that sleeps for `delay`, counts calls, and returns a fixed result.
pub struct MockRefresher {
    pub calls: AtomicUsize,
    delay: Duration,
    result: Result<Credentials, String>,
}

impl MockRefresher {
    pub fn succeeding(credentials: Credentials, delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
            result: Ok(credentials),
        }
    }

    pub fn failing(reason: &str, delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
            result: Err(reason.to_string()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TokenRefresher for MockRefresher {
    fn refresh<'a>(
        &'a self,
        _refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = session_auth::Result<Credentials>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.result
                .clone()
                .map_err(session_auth::Error::InvalidCredentials)
        })
    }
}

/// Notifier that counts each notification.
#[derive(Default)]
pub struct CountingNotifier {
    pub login_required: AtomicUsize,
    pub subscription_required: AtomicUsize,
    pub logout: AtomicUsize,
}

impl CountingNotifier {
    pub fn logouts(&self) -> usize {
        self.logout.load(Ordering::SeqCst)
    }

    pub fn login_prompts(&self) -> usize {
        self.login_required.load(Ordering::SeqCst)
    }

    pub fn subscription_prompts(&self) -> usize {
        self.subscription_required.load(Ordering::SeqCst)
    }
}

impl SessionNotifier for CountingNotifier {
    fn notify_login_required(&self) {
        self.login_required.fetch_add(1, Ordering::SeqCst);
    }

    fn notify_subscription_required(&self) {
        self.subscription_required.fetch_add(1, Ordering::SeqCst);
    }

    fn notify_logout(&self) {
        self.logout.fetch_add(1, Ordering::SeqCst);
    }
}

type Responder =
    Box<dyn Fn(&RequestDescriptor) -> Result<TransportResponse, TransportError> + Send + Sync>;

/// Transport that answers from a closure after an optional delay and
/// records every request it was given.
pub struct ScriptedTransport {
    responder: Responder,
    delay: Duration,
    pub requests: Mutex<Vec<RequestDescriptor>>,
}

impl ScriptedTransport {
    pub fn new(
        responder: impl Fn(&RequestDescriptor) -> Result<TransportResponse, TransportError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// `Authorization` header values, in send order.
    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| {
                r.headers()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn send<'a>(
        &'a self,
        request: &'a RequestDescriptor,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + Send + 'a>>
    {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            (self.responder)(request)
        })
    }
}

/// The bearer value a request was sent with, if any.
pub fn bearer_of(request: &RequestDescriptor) -> Option<&str> {
    request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Raw HTTP server that answers every request with a 500 carrying
/// `x-anonymous-user-id: anon-srv`, announces a 100-byte body, sends five
/// bytes of it and closes the connection.
pub async fn start_truncated_body_server() -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                // Drain the request head so closing sends FIN rather than RST
                let mut head = Vec::new();
                let mut chunk = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&chunk[..n]),
                    }
                }
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 500 Internal Server Error\r\n\
                          x-anonymous-user-id: anon-srv\r\n\
                          content-length: 100\r\n\
                          \r\n\
                          short",
                    )
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{addr}")
}
