//! Transfer execution abstraction.
//!
//! The builder never talks to the network itself. It hands a
//! [`PreparedRequest`] and a [`Transfer`] sink to an [`HttpExecutor`], which
//! reports response header lines and body chunks back through the sink. This
//! keeps the engine swappable and lets tests run without network calls.

use std::collections::HashMap;
use std::io::{self, Read};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use http::header::{HeaderMap, COOKIE, SET_COOKIE};
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use tungstenite::client::IntoClientRequest;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};
use url::Url;

use crate::buffer::WriteBuffer;
use crate::cookies::FileCookieJar;
use crate::error::Error;
use crate::header::{header_map, parse_header_line};
use crate::types::Method;

/// Redirects followed before giving up.
pub const MAX_REDIRECTS: usize = 30;

const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Finalized request handed to an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub method: Method,
    /// Final URL with all parameters appended.
    pub url: String,
    /// Raw `Key: Value` header lines in the order they were set.
    pub headers: Vec<String>,
    pub body: Option<Vec<u8>>,
    /// Cookie file read before and written after the transfer.
    pub cookie_path: Option<PathBuf>,
    pub verbosity: u64,
    pub timeout: Option<Duration>,
}

/// Engine-facing sink for one transfer.
///
/// Header lines go through the header parser into the response header map.
/// Body chunks are appended to the write buffer; when streaming, the receive
/// callback runs after each chunk, before the next one is read.
pub struct Transfer<'t, 'cb> {
    buffer: &'t mut WriteBuffer,
    headers: &'t mut HashMap<String, String>,
    on_recv: Option<&'t mut (dyn FnMut(&mut WriteBuffer) + 'cb)>,
    streaming: bool,
}

impl<'t, 'cb> Transfer<'t, 'cb> {
    pub fn new(
        buffer: &'t mut WriteBuffer,
        headers: &'t mut HashMap<String, String>,
        on_recv: Option<&'t mut (dyn FnMut(&mut WriteBuffer) + 'cb)>,
        streaming: bool,
    ) -> Self {
        Self {
            buffer,
            headers,
            on_recv,
            streaming,
        }
    }

    /// Feed one raw header line. Returns the number of bytes consumed.
    pub fn header_line(&mut self, raw: &[u8]) -> usize {
        if let Some((key, value)) = parse_header_line(raw) {
            self.headers.insert(key, value);
        }
        raw.len()
    }

    /// Feed one chunk of received data. Returns the number of bytes consumed.
    pub fn write(&mut self, chunk: &[u8]) -> usize {
        log::trace!("Received {} bytes", chunk.len());
        self.buffer.append(chunk);

        if self.streaming {
            if let Some(on_recv) = self.on_recv.as_deref_mut() {
                on_recv(&mut *self.buffer);
            }
        }
        chunk.len()
    }

    /// Drain the messages queued for sending on the stream.
    pub fn take_outgoing(&mut self) -> Vec<Vec<u8>> {
        self.buffer.take_outgoing().into()
    }

    pub fn close_requested(&self) -> bool {
        self.buffer.close_requested()
    }
}

/// Trait for executing transfers.
///
/// Implementations return the HTTP status of the final response when one was
/// received. Errors are turned into result codes by the caller.
pub trait HttpExecutor {
    /// Perform one request/response exchange.
    fn perform(&self, request: &PreparedRequest, transfer: &mut Transfer<'_, '_>)
        -> Result<Option<u16>, Error>;

    /// Run a bidirectional stream until it is closed.
    fn stream(&self, request: &PreparedRequest, transfer: &mut Transfer<'_, '_>)
        -> Result<Option<u16>, Error>;
}

/// Cookie jar attached to one transfer.
struct SessionJar<'p> {
    jar: Arc<FileCookieJar>,
    path: &'p Path,
    /// False when an existing file could not be read; it is then left as is.
    writable: bool,
}

impl<'p> SessionJar<'p> {
    fn open(path: &'p Path) -> Self {
        let (jar, writable) = match FileCookieJar::load(path) {
            Ok(jar) => (jar, true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => (FileCookieJar::new(), true),
            Err(e) => {
                log::warn!(
                    "Could not read cookie file {}: {}; it will not be updated",
                    path.display(),
                    e
                );
                (FileCookieJar::new(), false)
            }
        };

        Self {
            jar: Arc::new(jar),
            path,
            writable,
        }
    }

    fn save(&self) {
        if !self.writable {
            return;
        }
        if let Err(e) = self.jar.save(self.path) {
            log::warn!("Could not write cookie file {}: {}", self.path.display(), e);
        }
    }
}

/// Production executor: `reqwest` for request/response, `tungstenite` for
/// streaming.
#[derive(Debug, Clone, Default)]
pub struct NetworkExecutor;

impl NetworkExecutor {
    pub fn new() -> Self {
        Self
    }

    fn client(request: &PreparedRequest, jar: Option<&SessionJar<'_>>) -> Result<Client, Error> {
        // The blocking client defaults to 30 seconds; `None` means no limit.
        let mut builder = Client::builder()
            .redirect(Policy::limited(MAX_REDIRECTS))
            .connection_verbose(request.verbosity > 0)
            .timeout(request.timeout);

        if let Some(session) = jar {
            builder = builder.cookie_provider(Arc::clone(&session.jar));
        }

        Ok(builder.build()?)
    }

    fn check_scheme(url: &Url, allowed: &[&str]) -> Result<(), Error> {
        if allowed.contains(&url.scheme()) {
            Ok(())
        } else {
            Err(Error::UnsupportedScheme {
                scheme: url.scheme().to_string(),
            })
        }
    }

    /// Feed a response header block to the transfer. Names arrive lowercased
    /// from the engine.
    fn report_headers(
        transfer: &mut Transfer<'_, '_>,
        status_line: &str,
        headers: &HeaderMap,
        verbose: bool,
    ) {
        if verbose {
            log::debug!("< {}", status_line);
        }
        transfer.header_line(format!("{}\r\n", status_line).as_bytes());

        for (name, value) in headers {
            let mut line = Vec::with_capacity(name.as_str().len() + value.len() + 4);
            line.extend_from_slice(name.as_str().as_bytes());
            line.extend_from_slice(b": ");
            line.extend_from_slice(value.as_bytes());
            if verbose {
                log::debug!("< {}", String::from_utf8_lossy(&line));
            }
            line.extend_from_slice(b"\r\n");
            transfer.header_line(&line);
        }
        transfer.header_line(b"\r\n");
    }

    fn log_request(request: &PreparedRequest) {
        if request.verbosity == 0 {
            return;
        }
        let method: http::Method = request.method.into();
        log::debug!("> {} {}", method, request.url);
        for line in &request.headers {
            log::debug!("> {}", line);
        }
        if let Some(body) = &request.body {
            log::debug!("> [{} byte body]", body.len());
        }
    }

    fn flush_outgoing(
        socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
        transfer: &mut Transfer<'_, '_>,
        closing: bool,
    ) -> Result<(), Error> {
        for payload in transfer.take_outgoing() {
            if closing {
                log::warn!("Dropping {} byte message queued after close", payload.len());
                continue;
            }
            log::trace!("Sending {} bytes", payload.len());
            let message = match String::from_utf8(payload) {
                Ok(text) => Message::text(text),
                Err(e) => Message::binary(e.into_bytes()),
            };
            socket.send(message)?;
        }
        Ok(())
    }
}

impl HttpExecutor for NetworkExecutor {
    fn perform(
        &self,
        request: &PreparedRequest,
        transfer: &mut Transfer<'_, '_>,
    ) -> Result<Option<u16>, Error> {
        let url = Url::parse(&request.url)?;
        Self::check_scheme(&url, &["http", "https"])?;

        let headers = header_map(&request.headers)?;
        let jar = request.cookie_path.as_deref().map(SessionJar::open);
        let client = Self::client(request, jar.as_ref())?;

        Self::log_request(request);

        let mut req_builder = client.request(request.method.into(), url).headers(headers);
        if let Some(body) = &request.body {
            req_builder = req_builder.body(body.clone());
        }

        // Redirects are followed inside the engine, so only the final
        // response's header block is reported.
        let result = req_builder.send().map_err(Error::from).and_then(|mut response| {
            let status = response.status();
            let status_line = format!("{:?} {}", response.version(), status);
            Self::report_headers(transfer, &status_line, response.headers(), request.verbosity > 0);

            let mut chunk = vec![0u8; READ_CHUNK_SIZE];
            loop {
                let read = response.read(&mut chunk).map_err(Error::Body)?;
                if read == 0 {
                    break;
                }
                transfer.write(&chunk[..read]);
            }

            Ok(Some(status.as_u16()))
        });

        // Cookies received before a failure are kept, as the engine would.
        if let Some(session) = &jar {
            session.save();
        }
        result
    }

    fn stream(
        &self,
        request: &PreparedRequest,
        transfer: &mut Transfer<'_, '_>,
    ) -> Result<Option<u16>, Error> {
        let url = Url::parse(&request.url)?;
        Self::check_scheme(&url, &["ws", "wss"])?;

        let jar = request.cookie_path.as_deref().map(SessionJar::open);

        let mut handshake = request
            .url
            .as_str()
            .into_client_request()
            .map_err(Error::Handshake)?;
        let extra = header_map(&request.headers)?;
        for (name, value) in &extra {
            handshake.headers_mut().append(name.clone(), value.clone());
        }
        if let Some(cookie) = jar.as_ref().and_then(|session| session.jar.request_header(&url)) {
            handshake.headers_mut().append(COOKIE, cookie.parse()?);
        }

        Self::log_request(request);

        let (mut socket, response) = tungstenite::connect(handshake).map_err(Error::Handshake)?;
        let status = response.status();
        Self::report_headers(
            transfer,
            &format!("{:?} {}", response.version(), status),
            response.headers(),
            request.verbosity > 0,
        );

        if let Some(session) = &jar {
            let set_cookies = response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok());
            session.jar.store_set_cookies(set_cookies, &url);
            session.save();
        }

        let mut closing = false;
        loop {
            Self::flush_outgoing(&mut socket, transfer, closing)?;

            if transfer.close_requested() && !closing {
                log::debug!("Closing stream to {}", request.url);
                socket.close(None)?;
                closing = true;
            }

            match socket.read() {
                Ok(message @ (Message::Text(_) | Message::Binary(_))) => {
                    transfer.write(&message.into_data());
                }
                Ok(Message::Close(frame)) => {
                    log::debug!("Peer closed stream: {:?}", frame);
                    closing = true;
                }
                Ok(_) => {}
                Err(tungstenite::Error::ConnectionClosed) => break,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Some(status.as_u16()))
    }
}

/// Mock HTTP executor for testing.
///
/// Records every request and replays scripted header lines and chunks.
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    pub struct MockExecutor {
        recorded_requests: Arc<Mutex<Vec<PreparedRequest>>>,
        header_lines: Vec<String>,
        chunks: Vec<Vec<u8>>,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        status: Option<u16>,
        fail_with: Option<fn() -> Error>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self {
                status: Some(200),
                ..Default::default()
            }
        }

        pub fn with_header_line(mut self, line: &str) -> Self {
            self.header_lines.push(line.to_string());
            self
        }

        pub fn with_chunk(mut self, chunk: &[u8]) -> Self {
            self.chunks.push(chunk.to_vec());
            self
        }

        pub fn with_status(mut self, status: u16) -> Self {
            self.status = Some(status);
            self
        }

        pub fn fail_with(mut self, error: fn() -> Error) -> Self {
            self.fail_with = Some(error);
            self
        }

        pub fn recorded_requests(&self) -> Vec<PreparedRequest> {
            self.recorded_requests.lock().unwrap().clone()
        }

        /// Messages the stream loop sent, in order.
        pub fn sent_messages(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }

        fn replay_headers(&self, transfer: &mut Transfer<'_, '_>) {
            for line in &self.header_lines {
                transfer.header_line(line.as_bytes());
            }
        }
    }

    impl HttpExecutor for MockExecutor {
        fn perform(
            &self,
            request: &PreparedRequest,
            transfer: &mut Transfer<'_, '_>,
        ) -> Result<Option<u16>, Error> {
            self.recorded_requests.lock().unwrap().push(request.clone());
            self.replay_headers(transfer);
            for chunk in &self.chunks {
                transfer.write(chunk);
            }
            match self.fail_with {
                Some(error) => Err(error()),
                None => Ok(self.status),
            }
        }

        fn stream(
            &self,
            request: &PreparedRequest,
            transfer: &mut Transfer<'_, '_>,
        ) -> Result<Option<u16>, Error> {
            self.recorded_requests.lock().unwrap().push(request.clone());
            if let Some(error) = self.fail_with {
                return Err(error());
            }
            self.replay_headers(transfer);

            // Each scripted chunk is delivered once; the loop then waits for
            // a close request the way a live peer would keep the socket open.
            let mut chunks = self.chunks.iter();
            loop {
                self.sent.lock().unwrap().extend(transfer.take_outgoing());
                if transfer.close_requested() {
                    break;
                }
                match chunks.next() {
                    Some(chunk) => {
                        transfer.write(chunk);
                    }
                    None => return Err(Error::WebSocket(tungstenite::Error::ConnectionClosed)),
                }
            }

            Ok(Some(101))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_cookie_file_is_created_on_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.txt");

        let session = SessionJar::open(&path);
        assert!(session.writable);
        session.save();

        assert!(fs::read_to_string(&path)
            .unwrap()
            .starts_with("# Netscape HTTP Cookie File"));
    }

    #[test]
    fn unreadable_cookie_file_is_left_untouched() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be read as a file.
        let path = dir.path().join("jar");
        fs::create_dir(&path).unwrap();

        let session = SessionJar::open(&path);
        assert!(!session.writable);
        assert!(session.jar.is_empty());
        session.save();

        assert!(path.is_dir());
    }

    #[test]
    fn failed_transfer_keeps_stored_cookies() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.txt");
        let mut contents = b"example.com\tFALSE\t/\tFALSE\t0\tsid\tabc\n".to_vec();
        contents.extend_from_slice(b"example.com\tFALSE\t/\tFALSE\t0\tcity\tcaf\xe9\n");
        fs::write(&path, contents).unwrap();

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = PreparedRequest {
            method: Method::GET,
            url: format!("http://{}/", addr),
            headers: Vec::new(),
            body: None,
            cookie_path: Some(path.clone()),
            verbosity: 0,
            timeout: None,
        };
        let mut buffer = WriteBuffer::new();
        let mut headers = HashMap::new();
        let mut transfer = Transfer::new(&mut buffer, &mut headers, None, false);

        let outcome = NetworkExecutor::new().perform(&request, &mut transfer);
        assert!(outcome.is_err());

        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.contains("sid\tabc"));
        assert!(saved.contains("city\t"));
    }
}
