use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// HTTP method for requests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl Method {
    /// Whether a request with this method is expected to carry a body.
    pub fn carries_body(&self) -> bool {
        matches!(
            self,
            Method::POST | Method::PUT | Method::DELETE | Method::PATCH
        )
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => http::Method::GET,
            Method::POST => http::Method::POST,
            Method::PUT => http::Method::PUT,
            Method::DELETE => http::Method::DELETE,
            Method::PATCH => http::Method::PATCH,
            Method::HEAD => http::Method::HEAD,
            Method::OPTIONS => http::Method::OPTIONS,
        }
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "DELETE" => Ok(Method::DELETE),
            "PATCH" => Ok(Method::PATCH),
            "HEAD" => Ok(Method::HEAD),
            "OPTIONS" => Ok(Method::OPTIONS),
            other => Err(format!("unsupported HTTP method: {}", other)),
        }
    }
}

/// Outcome of a transfer.
///
/// Numeric values follow the classic transfer-library codes so callers that
/// log or exit with `code.as_i32()` keep familiar numbers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    Ok,
    UnsupportedProtocol,
    UrlMalformat,
    CouldntConnect,
    OperationTimedout,
    SslConnectError,
    BadFunctionArgument,
    TooManyRedirects,
    SendError,
    RecvError,
    Failed,
    WebSocketError,
}

impl ResultCode {
    pub fn is_ok(&self) -> bool {
        *self == ResultCode::Ok
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            ResultCode::Ok => 0,
            ResultCode::UnsupportedProtocol => 1,
            ResultCode::UrlMalformat => 3,
            ResultCode::CouldntConnect => 7,
            ResultCode::OperationTimedout => 28,
            ResultCode::SslConnectError => 35,
            ResultCode::BadFunctionArgument => 43,
            ResultCode::TooManyRedirects => 47,
            ResultCode::SendError => 55,
            ResultCode::RecvError => 56,
            ResultCode::Failed => 99,
            ResultCode::WebSocketError => 100,
        }
    }

    /// Human-readable description of the code.
    pub fn description(&self) -> &'static str {
        match self {
            ResultCode::Ok => "No error",
            ResultCode::UnsupportedProtocol => "Unsupported protocol",
            ResultCode::UrlMalformat => "URL using bad/illegal format or missing URL",
            ResultCode::CouldntConnect => "Couldn't connect to server",
            ResultCode::OperationTimedout => "Timeout was reached",
            ResultCode::SslConnectError => "SSL connect error",
            ResultCode::BadFunctionArgument => "A function was given a bad argument",
            ResultCode::TooManyRedirects => "Number of redirects hit maximum amount",
            ResultCode::SendError => "Failed sending data to the peer",
            ResultCode::RecvError => "Failure when receiving data from the peer",
            ResultCode::Failed => "Transfer failed",
            ResultCode::WebSocketError => "WebSocket protocol error",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}

impl From<&reqwest::Error> for ResultCode {
    fn from(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            ResultCode::OperationTimedout
        } else if error.is_connect() {
            ResultCode::CouldntConnect
        } else if error.is_redirect() {
            ResultCode::TooManyRedirects
        } else if error.is_builder() {
            ResultCode::UrlMalformat
        } else if error.is_body() || error.is_decode() {
            ResultCode::RecvError
        } else if error.is_request() {
            ResultCode::SendError
        } else {
            ResultCode::Failed
        }
    }
}

/// Result of executing an [`HttpClient`](crate::HttpClient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    /// Completion code of the transfer
    pub code: ResultCode,

    /// HTTP status of the final response (or of the upgrade handshake)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Response body, decoded lossily as UTF-8
    pub output: String,

    /// Human-readable description of the outcome
    pub error: String,

    /// Response headers, last value wins on duplicate names
    pub response_headers: HashMap<String, String>,
}

impl TransferResult {
    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }

    /// Check if the response status indicates success (2xx)
    pub fn is_success(&self) -> bool {
        self.code.is_ok() && matches!(self.status, Some(s) if (200..300).contains(&s))
    }
}
