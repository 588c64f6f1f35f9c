use crate::types::ResultCode;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Unsupported URL scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("Failed reading response body: {0}")]
    Body(#[source] std::io::Error),

    #[error("WebSocket handshake failed: {0}")]
    Handshake(#[source] tungstenite::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("request already executed")]
    AlreadyExecuted,
}

impl Error {
    /// The transfer outcome this error is reported as.
    pub fn code(&self) -> ResultCode {
        match self {
            Error::Http(e) => ResultCode::from(e),
            Error::UrlParse(_) => ResultCode::UrlMalformat,
            Error::UnsupportedScheme { .. } => ResultCode::UnsupportedProtocol,
            Error::InvalidHeaderName(_) | Error::InvalidHeaderValue(_) => {
                ResultCode::BadFunctionArgument
            }
            Error::Body(_) => ResultCode::RecvError,
            Error::Handshake(e) => match e {
                tungstenite::Error::Url(tungstenite::error::UrlError::UnsupportedUrlScheme) => {
                    ResultCode::UnsupportedProtocol
                }
                tungstenite::Error::Url(_) => ResultCode::UrlMalformat,
                tungstenite::Error::Io(_) => ResultCode::CouldntConnect,
                tungstenite::Error::Tls(_) => ResultCode::SslConnectError,
                _ => ResultCode::WebSocketError,
            },
            Error::WebSocket(e) => match e {
                tungstenite::Error::Io(_) => ResultCode::RecvError,
                _ => ResultCode::WebSocketError,
            },
            Error::AlreadyExecuted => ResultCode::BadFunctionArgument,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_error_maps_to_unsupported_protocol() {
        let e = Error::UnsupportedScheme {
            scheme: "ftp".to_string(),
        };
        assert_eq!(e.code(), ResultCode::UnsupportedProtocol);
        assert!(e.to_string().contains("ftp"));
    }

    #[test]
    fn url_parse_maps_to_malformat() {
        let e = Error::from(url::Url::parse("not a url").unwrap_err());
        assert_eq!(e.code(), ResultCode::UrlMalformat);
    }

    #[test]
    fn header_errors_map_to_bad_argument() {
        let e = Error::from(http::header::HeaderName::from_bytes(b"bad name").unwrap_err());
        assert_eq!(e.code(), ResultCode::BadFunctionArgument);
    }

    #[test]
    fn handshake_io_maps_to_couldnt_connect() {
        let io = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        let e = Error::Handshake(tungstenite::Error::Io(io));
        assert_eq!(e.code(), ResultCode::CouldntConnect);
    }

    #[test]
    fn session_errors_map_to_websocket_or_recv() {
        let e = Error::WebSocket(tungstenite::Error::AlreadyClosed);
        assert_eq!(e.code(), ResultCode::WebSocketError);

        let io = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        let e = Error::WebSocket(tungstenite::Error::Io(io));
        assert_eq!(e.code(), ResultCode::RecvError);
    }

    #[test]
    fn already_executed_display() {
        assert_eq!(Error::AlreadyExecuted.to_string(), "request already executed");
    }
}
