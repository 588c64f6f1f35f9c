use std::collections::{HashMap, VecDeque};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::time::Duration;

use crate::buffer::{RecvCallback, WriteBuffer};
use crate::executor::{HttpExecutor, NetworkExecutor, PreparedRequest, Transfer};
use crate::global;
use crate::params::{append_params, UrlParam};
use crate::types::{Method, ResultCode, TransferResult};
use crate::Error;

/// User-Agent sent by [`HttpClient::set_default_headers`].
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Conventional cookie file name for callers that need one.
pub const DEFAULT_COOKIES_PATH: &str = "cookies.txt";

/// Chainable request builder that performs a single transfer.
///
/// Every setter returns the same builder so calls can be chained; `execute`
/// finalizes headers and URL and runs the transfer. A builder executes once.
///
/// # Example
///
/// ```no_run
/// use httpchain::HttpClient;
///
/// let _http = httpchain::scoped();
///
/// let result = HttpClient::build()
///     .get("https://example.com/search")
///     .set_default_headers()
///     .add_url_param("q", "rust lang")
///     .set_cookie_filepath(httpchain::DEFAULT_COOKIES_PATH)
///     .execute();
///
/// if result.is_ok() {
///     println!("{}", result.output);
/// } else {
///     eprintln!("{}: {}", result.code, result.error);
/// }
/// ```
///
/// Streaming with a receive callback:
///
/// ```no_run
/// use httpchain::HttpClient;
///
/// let mut replies = Vec::new();
/// let result = HttpClient::build()
///     .set_url("wss://echo.websocket.org")
///     .set_on_recv_callback(|buffer| {
///         replies.push(buffer.take());
///         if replies.len() == 2 {
///             buffer.stream_close();
///         } else {
///             buffer.stream_write("hello from client");
///         }
///     })
///     .stream()
///     .execute();
/// ```
pub struct HttpClient<'a> {
    executor: Box<dyn HttpExecutor + 'a>,
    method: Method,
    url: String,
    headers: Vec<String>,
    body: Option<Vec<u8>>,
    params: VecDeque<UrlParam>,
    cookie_path: Option<PathBuf>,
    verbosity: u64,
    timeout: Option<Duration>,
    streaming: bool,
    on_recv: Option<RecvCallback<'a>>,
    buffer: WriteBuffer,
    response_headers: HashMap<String, String>,
    executed: bool,
}

impl<'a> HttpClient<'a> {
    /// Start building a request executed over the network.
    pub fn build() -> Self {
        Self::with_executor(NetworkExecutor::new())
    }

    /// Start building a request executed by `executor`.
    pub fn with_executor(executor: impl HttpExecutor + 'a) -> Self {
        Self {
            executor: Box::new(executor),
            method: Method::GET,
            url: String::new(),
            headers: Vec::new(),
            body: None,
            params: VecDeque::new(),
            cookie_path: None,
            verbosity: 0,
            timeout: None,
            streaming: false,
            on_recv: None,
            buffer: WriteBuffer::new(),
            response_headers: HashMap::new(),
            executed: false,
        }
    }

    /// Make this a GET request on `url`.
    pub fn get(&mut self, url: impl Into<String>) -> &mut Self {
        self.url = url.into();
        self.method = Method::GET;
        self
    }

    pub fn set_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.url = url.into();
        self
    }

    pub fn set_method(&mut self, method: Method) -> &mut Self {
        self.method = method;
        self
    }

    /// Append a raw `Key: Value` header line. Repeated names are all sent.
    pub fn set_header(&mut self, header_entry: impl Into<String>) -> &mut Self {
        self.headers.push(header_entry.into());
        self
    }

    /// Attach a request body, switching to POST unless the method already
    /// carries one.
    pub fn set_raw_body(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.body = Some(body.into());
        if !self.method.carries_body() {
            self.method = Method::POST;
        }
        self
    }

    /// Append an `Authorization: Bearer <token>` header.
    pub fn set_authority_header(&mut self, token: &str) -> &mut Self {
        self.set_header(format!("Authorization: Bearer {}", token))
    }

    /// Append a desktop browser User-Agent and `Accept: */*`.
    pub fn set_default_headers(&mut self) -> &mut Self {
        self.set_header(format!("user-agent: {}", DEFAULT_USER_AGENT))
            .set_header("accept: */*")
    }

    /// Read and write cookies from `path`, creating an empty file if needed.
    pub fn set_cookie_filepath(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        let path = path.into();

        if !path.exists() {
            // Creation failures resurface when the jar is used.
            if let Err(e) = OpenOptions::new().create(true).append(true).open(&path) {
                log::debug!("Could not create cookie file {}: {}", path.display(), e);
            }
        }

        self.cookie_path = Some(path);
        self
    }

    /// Non-zero values trace the transfer through the `log` facade.
    pub fn set_verbosity(&mut self, value: u64) -> &mut Self {
        self.verbosity = value;
        self
    }

    /// Limit the whole transfer to `timeout`.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Append a URL parameter, encoded and added to the URL at execute time.
    pub fn add_url_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.push_back(UrlParam::new(key, value));
        self
    }

    /// Register the callback run after each chunk received while streaming.
    pub fn set_on_recv_callback(&mut self, cb: impl FnMut(&mut WriteBuffer) + 'a) -> &mut Self {
        self.on_recv = Some(Box::new(cb));
        self
    }

    /// Switch to a long-lived bidirectional stream (WebSocket upgrade).
    pub fn stream(&mut self) -> &mut Self {
        self.streaming = true;
        self
    }

    /// Queue a message for the stream. Valid UTF-8 is sent as text.
    ///
    /// Inside a receive callback use [`WriteBuffer::stream_write`] instead.
    pub fn stream_write(&mut self, buffer: impl Into<Vec<u8>>) -> &mut Self {
        if !self.streaming {
            log::warn!("stream_write called on a request that is not streaming");
        }
        self.buffer.stream_write(buffer);
        self
    }

    /// Ask for the stream to close, which ends `execute`.
    ///
    /// Inside a receive callback use [`WriteBuffer::stream_close`] instead.
    pub fn stream_close(&mut self) -> &mut Self {
        self.buffer.stream_close();
        self
    }

    /// Finalize the request and run the transfer.
    ///
    /// Transport failures are reported through the result's `code` and
    /// `error`; whatever was received before the failure is kept.
    pub fn execute(&mut self) -> TransferResult {
        if self.executed {
            return self.result(Err(Error::AlreadyExecuted));
        }
        self.executed = true;

        if !global::is_initialized() {
            log::warn!("Executing request before httpchain::init()");
        }
        if !self.streaming && self.buffer.pending_outgoing() > 0 {
            log::warn!(
                "Discarding {} stream messages queued on a non-streaming request",
                self.buffer.pending_outgoing()
            );
        }

        let request = PreparedRequest {
            method: self.method,
            url: append_params(&self.url, &mut self.params),
            headers: self.headers.clone(),
            body: self.body.clone(),
            cookie_path: self.cookie_path.clone(),
            verbosity: self.verbosity,
            timeout: self.timeout,
        };

        let mut transfer = Transfer::new(
            &mut self.buffer,
            &mut self.response_headers,
            self.on_recv.as_deref_mut(),
            self.streaming,
        );

        let outcome = if self.streaming {
            self.executor.stream(&request, &mut transfer)
        } else {
            self.executor.perform(&request, &mut transfer)
        };

        if let Err(e) = &outcome {
            log::debug!("Transfer to {} failed: {}", request.url, e);
        }
        self.result(outcome)
    }

    fn result(&self, outcome: Result<Option<u16>, Error>) -> TransferResult {
        let (code, status, error) = match outcome {
            Ok(status) => (ResultCode::Ok, status, ResultCode::Ok.description().to_string()),
            Err(e) => (e.code(), None, e.to_string()),
        };

        TransferResult {
            code,
            status,
            output: self.buffer.text().into_owned(),
            error,
            response_headers: self.response_headers.clone(),
        }
    }
}

impl std::fmt::Debug for HttpClient<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("params", &self.params)
            .field("streaming", &self.streaming)
            .field("executed", &self.executed)
            .finish_non_exhaustive()
    }
}
