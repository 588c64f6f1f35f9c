//! # httpchain
//!
//! A fluent, single-shot HTTP client builder.
//!
//! Configuration calls are chained on an [`HttpClient`] and a final
//! [`execute`](HttpClient::execute) performs the transfer, returning a
//! [`TransferResult`] with the completion code, body, error text and response
//! headers. The transfer itself is delegated to an external engine
//! (`reqwest` for request/response, `tungstenite` for streams) behind the
//! [`HttpExecutor`] trait.
//!
//! ## Request/response
//!
//! ```no_run
//! use httpchain::HttpClient;
//!
//! let _http = httpchain::scoped();
//!
//! let result = HttpClient::build()
//!     .get("https://ddg.gg")
//!     .set_default_headers()
//!     .set_verbosity(1)
//!     .set_cookie_filepath(httpchain::DEFAULT_COOKIES_PATH)
//!     .execute();
//!
//! println!("{} {:?}", result.code, result.status);
//! ```
//!
//! ## Streaming
//!
//! After [`stream`](HttpClient::stream), `execute` upgrades to a WebSocket
//! and blocks, invoking the receive callback once per message until the
//! callback (or the peer) closes the stream. See [`WriteBuffer`].
//!
//! ## Helpers
//!
//! - [`params`]: `encode` and `parse_url_params` for query strings.
//! - [`header`]: `parse_header_line` for raw header lines.
//! - [`scope`]: the [`Scoped`] enter/exit guard.
//! - [`cookies`]: the Netscape-format [`FileCookieJar`].

pub mod buffer;
pub mod client;
pub mod cookies;
pub mod error;
pub mod executor;
pub mod header;
pub mod params;
pub mod scope;
pub mod types;

mod global;

pub use buffer::{RecvCallback, WriteBuffer};
pub use client::{HttpClient, DEFAULT_COOKIES_PATH, DEFAULT_USER_AGENT};
pub use cookies::{Cookie, FileCookieJar};
pub use error::Error;
pub use executor::{HttpExecutor, NetworkExecutor, PreparedRequest, Transfer, MAX_REDIRECTS};
pub use global::{cleanup, init, is_initialized, scoped};
pub use header::parse_header_line;
pub use params::{encode, parse_url_params, UrlParam};
pub use scope::Scoped;
pub use types::{Method, ResultCode, TransferResult};
