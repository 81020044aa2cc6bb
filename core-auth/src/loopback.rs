//! Loopback redirect receiver for the installed-application consent flow.
//!
//! Binds `127.0.0.1:<port>`, waits for the browser to be redirected back
//! with `code`/`state` (or `error`) in the query string, answers with a short
//! HTML page and hands the parameters to the caller.

use crate::error::{AuthError, Result};
use core_async::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use core_async::net::{TcpListener, TcpStream};
use core_async::sync::mpsc;
use core_async::time::{timeout, Duration};
use std::net::{Ipv4Addr, SocketAddr};
use tracing::{debug, info};

const SUCCESS_PAGE: &str = "<html><body><p>The authentication flow has completed. \
You may close this window.</p></body></html>";

const DENIED_PAGE: &str = "<html><body><p>Authorization was not granted. \
You may close this window.</p></body></html>";

/// Upper bound on the request line plus headers read from one connection.
const MAX_REQUEST_HEAD: u64 = 16 * 1024;

/// How long a single connection may take to deliver its request.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Query parameters carried by the consent redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl AuthorizationCallback {
    /// Parse the request target of `GET <target> HTTP/1.1`.
    ///
    /// Returns `None` for requests that are not the redirect (e.g. the
    /// browser asking for `/favicon.ico`).
    pub fn from_request_target(target: &str) -> Option<Self> {
        let query = target.split_once('?').map(|(_, query)| query)?;

        let mut callback = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "code" => callback.code = Some(value.into_owned()),
                "state" => callback.state = Some(value.into_owned()),
                "error" => callback.error = Some(value.into_owned()),
                _ => {}
            }
        }

        (callback.code.is_some() || callback.error.is_some()).then_some(callback)
    }
}

/// One-shot listener for the consent redirect.
#[derive(Debug)]
pub struct LoopbackListener {
    listener: TcpListener,
    port: u16,
}

impl LoopbackListener {
    /// Bind on the loopback interface. Port 0 picks an ephemeral port.
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).await?;
        let port = listener.local_addr()?.port();
        debug!(port = port, "Listening for consent redirect");
        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Redirect URI registered with the authorization request.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/", self.port)
    }

    /// Wait for the redirect and reply to the browser.
    ///
    /// Each connection is served on its own task, so an idle or malformed
    /// connection never holds up the redirect. Unrelated requests are answered
    /// with `404` and ignored. Runs until the redirect arrives; callers bound
    /// it with a timeout.
    pub async fn accept_callback(self) -> Result<AuthorizationCallback> {
        let (tx, mut rx) = mpsc::channel(1);

        loop {
            core_async::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!(peer = %peer, "Accepted loopback connection");

                    let tx = tx.clone();
                    core_async::spawn(async move {
                        match timeout(CONNECTION_TIMEOUT, handle_connection(stream)).await {
                            Ok(Ok(Some(callback))) => {
                                let _ = tx.send(callback).await;
                            }
                            Ok(Ok(None)) => {}
                            Ok(Err(e)) => {
                                debug!(peer = %peer, error = %e, "Ignoring malformed loopback request")
                            }
                            Err(_) => debug!(peer = %peer, "Dropping idle loopback connection"),
                        }
                    });
                }
                Some(callback) = rx.recv() => {
                    info!(denied = callback.error.is_some(), "Received consent redirect");
                    return Ok(callback);
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream) -> Result<Option<AuthorizationCallback>> {
    let mut reader = BufReader::new(stream);
    let request_line = read_request_head(&mut reader).await?;

    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    let callback = AuthorizationCallback::from_request_target(target);

    let mut stream = reader.into_inner();
    match &callback {
        Some(cb) if cb.error.is_some() => write_response(&mut stream, "200 OK", DENIED_PAGE).await?,
        Some(_) => write_response(&mut stream, "200 OK", SUCCESS_PAGE).await?,
        None => write_response(&mut stream, "404 Not Found", "").await?,
    }

    Ok(callback)
}

/// Read the request line and drain the headers, never buffering more than
/// [`MAX_REQUEST_HEAD`] bytes.
async fn read_request_head<R: AsyncBufRead + Unpin>(reader: R) -> Result<String> {
    let mut limited = reader.take(MAX_REQUEST_HEAD);
    let mut line = Vec::new();
    let mut request_line = None;

    loop {
        line.clear();
        limited.read_until(b'\n', &mut line).await?;
        if !line.ends_with(b"\n") {
            if limited.limit() == 0 {
                return Err(AuthError::InvalidCallback("Request too large".to_string()));
            }
            // Peer closed before the blank line.
            break;
        }

        if request_line.is_none() {
            let text = String::from_utf8(line.clone())
                .map_err(|_| AuthError::InvalidCallback("Request line is not UTF-8".to_string()))?;
            request_line = Some(text);
        } else if line == b"\r\n" || line == b"\n" {
            break;
        }
    }

    request_line.ok_or_else(|| AuthError::InvalidCallback("Empty request".to_string()))
}

async fn write_response(stream: &mut TcpStream, status: &str, body: &str) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}
