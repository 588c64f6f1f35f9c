//! Flat-file cookie jar.
//!
//! Cookies are kept in memory while a transfer runs and persisted in the
//! Netscape cookie-file format, one tab-separated cookie per line:
//!
//! ```text
//! # Netscape HTTP Cookie File
//! .example.com	TRUE	/	FALSE	1767225600	session	abc123
//! #HttpOnly_example.com	FALSE	/api	TRUE	0	token	xyz
//! ```
//!
//! Columns are domain, include-subdomains, path, secure, expiry (unix
//! seconds, `0` for session cookies), name and value. The jar implements
//! [`reqwest::cookie::CookieStore`] so the engine reads and updates it
//! directly during a transfer.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use http::HeaderValue;
use url::Url;

const FILE_HEADER: &str = "# Netscape HTTP Cookie File\n# This file was generated by httpchain. Edit at your own risk.\n\n";
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Domain without a leading dot.
    pub domain: String,
    /// Whether subdomains of `domain` also receive the cookie.
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Expiry as unix seconds; `0` marks a session cookie.
    pub expires: i64,
    pub name: String,
    pub value: String,
}

impl Cookie {
    fn is_expired(&self, now: i64) -> bool {
        self.expires != 0 && self.expires <= now
    }

    fn matches(&self, url: &Url, now: i64) -> bool {
        let host = url.host_str().unwrap_or_default();
        let domain_ok = if self.include_subdomains {
            domain_matches(host, &self.domain)
        } else {
            host.eq_ignore_ascii_case(&self.domain)
        };
        let secure_ok = !self.secure || matches!(url.scheme(), "https" | "wss");

        domain_ok && secure_ok && path_matches(url.path(), &self.path) && !self.is_expired(now)
    }

    /// Parse one line of a cookie file. Comments and malformed lines give `None`.
    fn from_line(line: &str) -> Option<Self> {
        let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(rest) => (rest, true),
            None => (line, false),
        };
        if line.trim().is_empty() || line.starts_with('#') {
            return None;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 7 {
            return None;
        }

        let domain = fields[0];
        Some(Self {
            domain: domain.trim_start_matches('.').to_string(),
            include_subdomains: fields[1].eq_ignore_ascii_case("TRUE"),
            path: fields[2].to_string(),
            secure: fields[3].eq_ignore_ascii_case("TRUE"),
            http_only,
            expires: fields[4].parse().ok()?,
            name: fields[5].to_string(),
            value: fields[6].trim_end_matches(['\r', '\n']).to_string(),
        })
    }

    fn to_line(&self) -> String {
        let flag = |b: bool| if b { "TRUE" } else { "FALSE" };
        format!(
            "{}{}{}\t{}\t{}\t{}\t{}\t{}\t{}",
            if self.http_only { HTTP_ONLY_PREFIX } else { "" },
            if self.include_subdomains { "." } else { "" },
            self.domain,
            flag(self.include_subdomains),
            self.path,
            flag(self.secure),
            self.expires,
            self.name,
            self.value
        )
    }

    /// Build a cookie from a `Set-Cookie` header value received from `url`.
    fn from_set_cookie(header: &str, url: &Url, now: i64) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Self {
            domain: url.host_str()?.to_string(),
            include_subdomains: false,
            path: default_path(url.path()),
            secure: false,
            http_only: false,
            expires: 0,
            name: name.to_string(),
            value: value.trim().to_string(),
        };

        let mut max_age = None;
        for attribute in parts {
            let attribute = attribute.trim();
            let (key, val) = match attribute.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (attribute, ""),
            };

            match key.to_ascii_lowercase().as_str() {
                "domain" if !val.is_empty() => {
                    let domain = val.trim_start_matches('.').to_ascii_lowercase();
                    if !domain_matches(&cookie.domain, &domain) {
                        log::debug!("{} may not set cookies for {}", cookie.domain, domain);
                        return None;
                    }
                    cookie.domain = domain;
                    cookie.include_subdomains = true;
                }
                "path" if val.starts_with('/') => cookie.path = val.to_string(),
                "expires" => {
                    if let Ok(at) = DateTime::parse_from_rfc2822(val) {
                        cookie.expires = at.timestamp().max(1);
                    }
                }
                "max-age" => max_age = val.parse::<i64>().ok(),
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                _ => {}
            }
        }

        if let Some(seconds) = max_age {
            cookie.expires = if seconds <= 0 { 1 } else { now + seconds };
        }

        Some(cookie)
    }
}

/// Whether `host` is `domain` or one of its subdomains.
fn domain_matches(host: &str, domain: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => request_path[..i].to_string(),
    }
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

fn now() -> i64 {
    Utc::now().timestamp()
}

/// Cookie jar backed by a Netscape-format file.
#[derive(Debug, Default)]
pub struct FileCookieJar {
    cookies: RwLock<Vec<Cookie>>,
}

impl FileCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the jar stored at `path`. An empty file gives an empty jar.
    ///
    /// Invalid UTF-8 is replaced rather than rejected so one bad line never
    /// costs the rest of the file.
    pub fn load(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let contents = String::from_utf8_lossy(&bytes);
        let cookies: Vec<Cookie> = contents.lines().filter_map(Cookie::from_line).collect();
        log::debug!("Loaded {} cookies from {}", cookies.len(), path.display());

        Ok(Self {
            cookies: RwLock::new(cookies),
        })
    }

    /// Write every unexpired cookie to `path`, replacing its contents.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let now = now();
        let mut contents = String::from(FILE_HEADER);
        for cookie in self.read().iter().filter(|c| !c.is_expired(now)) {
            contents.push_str(&cookie.to_line());
            contents.push('\n');
        }

        log::debug!("Writing cookie file {}...", path.display());
        fs::write(path, contents)
    }

    /// Snapshot of all cookies currently held.
    pub fn cookies(&self) -> Vec<Cookie> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Store the cookies from `Set-Cookie` header values received from `url`.
    pub fn store_set_cookies<'h>(&self, headers: impl Iterator<Item = &'h str>, url: &Url) {
        let now = now();
        let mut cookies = self.write();

        for header in headers {
            let Some(cookie) = Cookie::from_set_cookie(header, url, now) else {
                log::warn!("Ignoring Set-Cookie header from {}: {:?}", url, header);
                continue;
            };

            cookies.retain(|c| {
                !(c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path)
            });
            if !cookie.is_expired(now) {
                cookies.push(cookie);
            }
        }
    }

    /// The `Cookie` request header value to send to `url`, if any.
    pub fn request_header(&self, url: &Url) -> Option<String> {
        let now = now();
        let header = self
            .read()
            .iter()
            .filter(|c| c.matches(url, now))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            None
        } else {
            Some(header)
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Cookie>> {
        self.cookies.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Cookie>> {
        self.cookies.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl reqwest::cookie::CookieStore for FileCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.store_set_cookies(cookie_headers.filter_map(|v| v.to_str().ok()), url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.request_header(url)
            .and_then(|header| HeaderValue::from_str(&header).ok())
    }
}
